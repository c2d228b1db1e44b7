//! Settings read from the environment.

use std::fmt::{self, Debug};
use std::str::FromStr;

use nexus_openai_model::{
    DEFAULT_BASE_URL, DEFAULT_MODEL, OpenAIConfig, OpenAIConfigBuilder,
    OpenAIProvider, StructuredOutputMode,
};
use thiserror::Error;

use crate::tools::{PythonTool, WebSearchTool};
use crate::workflow::WorkflowBuilder;

/// Rejections the validator may issue before a run gives up, unless
/// configured otherwise.
pub const DEFAULT_MAX_ROUNDS: u32 = 5;

/// Node visits a run may make before it gives up, unless configured
/// otherwise.
pub const DEFAULT_MAX_VISITS: usize = 40;

/// Errors in the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No model API key is set.
    #[error("neither GROQ_API_KEY nor NEXUS_API_KEY is set")]
    MissingApiKey,

    /// A variable is set to something that can't be used.
    #[error("invalid value `{value}` for {name}: {reason}")]
    Invalid {
        /// Name of the variable.
        name: &'static str,
        /// The rejected value.
        value: String,
        /// Why it was rejected.
        reason: String,
    },
}

/// Everything needed to assemble a [`Workflow`](crate::Workflow) backed by
/// real services.
#[derive(Clone)]
pub struct Config {
    /// Key for the chat completions API.
    pub api_key: String,
    /// Base URL of the chat completions API.
    pub base_url: String,
    /// Model used by every role.
    pub model: String,
    /// How routing decisions are requested from the model.
    pub structured_output: StructuredOutputMode,
    /// Key for Tavily. The researcher gets no search tool without it.
    pub tavily_api_key: Option<String>,
    /// Key for Riza. The coder gets no code tool without it.
    pub riza_api_key: Option<String>,
    /// See [`Workflow::max_rounds`](crate::Workflow::max_rounds).
    pub max_rounds: Option<u32>,
    /// See [`Workflow::max_visits`](crate::Workflow::max_visits).
    pub max_visits: Option<usize>,
    /// Number of results per web search.
    pub search_results: usize,
}

impl Config {
    /// Reads the configuration from the process environment.
    #[inline]
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads the configuration through `lookup`, which returns the value of
    /// a variable if it is set.
    ///
    /// Empty values count as unset. `NEXUS_MAX_ROUNDS` and
    /// `NEXUS_MAX_VISITS` accept `none` to lift the limit.
    /// `NEXUS_STRUCTURED_OUTPUT` is one of `json_schema`, `json_object` or
    /// `none`, and defaults to `none`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
        };

        let api_key = lookup("GROQ_API_KEY")
            .or_else(|| lookup("NEXUS_API_KEY"))
            .ok_or(ConfigError::MissingApiKey)?;
        let structured_output = match lookup("NEXUS_STRUCTURED_OUTPUT") {
            Some(value) => StructuredOutputMode::from_name(&value)
                .ok_or_else(|| ConfigError::Invalid {
                    name: "NEXUS_STRUCTURED_OUTPUT",
                    value,
                    reason: "expected json_schema, json_object or none"
                        .to_owned(),
                })?,
            None => StructuredOutputMode::default(),
        };

        Ok(Self {
            api_key,
            base_url: lookup("NEXUS_BASE_URL")
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_owned()),
            model: lookup("NEXUS_MODEL")
                .unwrap_or_else(|| DEFAULT_MODEL.to_owned()),
            structured_output,
            tavily_api_key: lookup("TAVILY_API_KEY"),
            riza_api_key: lookup("RIZA_API_KEY"),
            max_rounds: parse_limit(
                "NEXUS_MAX_ROUNDS",
                lookup("NEXUS_MAX_ROUNDS"),
                DEFAULT_MAX_ROUNDS,
            )?,
            max_visits: parse_limit(
                "NEXUS_MAX_VISITS",
                lookup("NEXUS_MAX_VISITS"),
                DEFAULT_MAX_VISITS,
            )?,
            search_results: parse_number(
                "NEXUS_SEARCH_RESULTS",
                lookup("NEXUS_SEARCH_RESULTS"),
            )?
            .unwrap_or(crate::tools::DEFAULT_SEARCH_RESULTS),
        })
    }

    /// Returns the settings of the chat completions provider.
    pub fn openai_config(&self) -> OpenAIConfig {
        OpenAIConfigBuilder::with_api_key(self.api_key.clone())
            .with_base_url(self.base_url.clone())
            .with_model(self.model.clone())
            .with_structured_output(self.structured_output)
            .build()
    }

    /// Creates the chat completions provider.
    #[inline]
    pub fn model_provider(&self) -> OpenAIProvider {
        OpenAIProvider::new(self.openai_config())
    }

    /// Creates a workflow builder with the provider, the tools and the
    /// limits configured.
    pub fn workflow_builder(&self) -> WorkflowBuilder {
        let mut builder =
            WorkflowBuilder::with_model_provider(self.model_provider())
                .max_rounds(self.max_rounds)
                .max_visits(self.max_visits);

        match &self.tavily_api_key {
            Some(api_key) => {
                builder = builder.with_search_tool(
                    WebSearchTool::new(api_key.clone())
                        .with_max_results(self.search_results),
                );
            }
            None => warn!("TAVILY_API_KEY is not set, searching is disabled"),
        }
        match &self.riza_api_key {
            Some(api_key) => {
                builder =
                    builder.with_code_tool(PythonTool::new(api_key.clone()));
            }
            None => warn!("RIZA_API_KEY is not set, running code is disabled"),
        }

        builder
    }
}

impl Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redacted =
            |key: &Option<String>| key.as_ref().map(|_| "<redacted>");
        f.debug_struct("Config")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("structured_output", &self.structured_output)
            .field("tavily_api_key", &redacted(&self.tavily_api_key))
            .field("riza_api_key", &redacted(&self.riza_api_key))
            .field("max_rounds", &self.max_rounds)
            .field("max_visits", &self.max_visits)
            .field("search_results", &self.search_results)
            .finish()
    }
}

fn parse_number<T: FromStr>(
    name: &'static str,
    value: Option<String>,
) -> Result<Option<T>, ConfigError>
where
    T::Err: fmt::Display,
{
    value
        .map(|value| {
            value.parse().map_err(|err: T::Err| ConfigError::Invalid {
                name,
                reason: format!("{err}"),
                value,
            })
        })
        .transpose()
}

fn parse_limit<T: FromStr>(
    name: &'static str,
    value: Option<String>,
    default: T,
) -> Result<Option<T>, ConfigError>
where
    T::Err: fmt::Display,
{
    match value {
        Some(value) if value.eq_ignore_ascii_case("none") => Ok(None),
        value => Ok(Some(parse_number(name, value)?.unwrap_or(default))),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<_, _> = vars
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[("GROQ_API_KEY", "gsk_test")]).unwrap();
        assert_eq!(config.api_key, "gsk_test");
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.model, "llama-3.3-70b-versatile");
        // Streamed requests to the default model take no response format.
        assert_eq!(config.structured_output, StructuredOutputMode::Disabled);
        assert_eq!(config.max_rounds, Some(DEFAULT_MAX_ROUNDS));
        assert_eq!(config.max_visits, Some(DEFAULT_MAX_VISITS));
        assert_eq!(config.search_results, 2);
        assert!(config.tavily_api_key.is_none());
        assert!(config.riza_api_key.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("GROQ_API_KEY", ""),
            ("NEXUS_API_KEY", "sk_other"),
            ("NEXUS_MODEL", "llama-3.1-8b-instant"),
            ("NEXUS_MAX_ROUNDS", "none"),
            ("NEXUS_MAX_VISITS", "12"),
            ("NEXUS_SEARCH_RESULTS", " 5 "),
            ("TAVILY_API_KEY", "tvly_test"),
        ])
        .unwrap();
        assert_eq!(config.api_key, "sk_other");
        assert_eq!(config.model, "llama-3.1-8b-instant");
        assert_eq!(config.max_rounds, None);
        assert_eq!(config.max_visits, Some(12));
        assert_eq!(config.search_results, 5);
        assert_eq!(config.tavily_api_key.as_deref(), Some("tvly_test"));
    }

    #[test]
    fn test_structured_output() {
        let object = config(&[
            ("GROQ_API_KEY", "k"),
            ("NEXUS_STRUCTURED_OUTPUT", " json_object "),
        ])
        .unwrap();
        assert_eq!(object.structured_output, StructuredOutputMode::JsonObject);
        assert_eq!(
            object.openai_config(),
            OpenAIConfigBuilder::with_api_key("k")
                .with_structured_output(StructuredOutputMode::JsonObject)
                .build()
        );

        let schema = config(&[
            ("GROQ_API_KEY", "k"),
            ("NEXUS_STRUCTURED_OUTPUT", "json_schema"),
        ])
        .unwrap();
        assert_eq!(schema.structured_output, StructuredOutputMode::JsonSchema);

        let disabled = config(&[
            ("GROQ_API_KEY", "k"),
            ("NEXUS_STRUCTURED_OUTPUT", "none"),
        ])
        .unwrap();
        assert_eq!(disabled.structured_output, StructuredOutputMode::Disabled);

        let err = config(&[
            ("GROQ_API_KEY", "k"),
            ("NEXUS_STRUCTURED_OUTPUT", "tools"),
        ])
        .unwrap_err();
        let ConfigError::Invalid { name, value, .. } = &err else {
            panic!("unexpected error: {err:?}");
        };
        assert_eq!(*name, "NEXUS_STRUCTURED_OUTPUT");
        assert_eq!(value, "tools");
    }

    #[test]
    fn test_errors() {
        assert!(matches!(config(&[]), Err(ConfigError::MissingApiKey)));

        let err = config(&[("GROQ_API_KEY", "k"), ("NEXUS_MAX_ROUNDS", "-1")])
            .unwrap_err();
        let ConfigError::Invalid { name, value, .. } = &err else {
            panic!("unexpected error: {err:?}");
        };
        assert_eq!(*name, "NEXUS_MAX_ROUNDS");
        assert_eq!(value, "-1");
    }

    #[test]
    fn test_debug_redacts_keys() {
        let config = config(&[
            ("GROQ_API_KEY", "gsk_secret"),
            ("RIZA_API_KEY", "riza_secret"),
        ])
        .unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains("secret"));
        assert!(debug.contains("llama-3.3-70b-versatile"));
    }
}

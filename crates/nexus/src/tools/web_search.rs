use std::fmt::Write as _;

use nexus_core::tool::{Tool, ToolResult};
use schemars::{JsonSchema, schema_for};
use serde::{Deserialize, Serialize};
use serde_json::Value;

const TAVILY_SEARCH_URL: &str = "https://api.tavily.com/search";

/// Number of results a search returns by default.
pub const DEFAULT_SEARCH_RESULTS: usize = 2;

#[derive(Deserialize, JsonSchema)]
pub struct WebSearchToolParameters {
    #[schemars(description = "The search query.")]
    query: String,
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    max_results: usize,
}

#[derive(Debug, Default, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Default, Deserialize)]
struct SearchResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
}

/// A tool for searching the web through Tavily.
pub struct WebSearchTool {
    client: reqwest::Client,
    api_key: String,
    max_results: usize,
    endpoint: String,
    parameter_schema: Value,
}

impl WebSearchTool {
    /// Creates a new search tool authenticating with `api_key`.
    pub fn new<S: Into<String>>(api_key: S) -> Self {
        WebSearchTool {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            max_results: DEFAULT_SEARCH_RESULTS,
            endpoint: TAVILY_SEARCH_URL.to_owned(),
            parameter_schema: schema_for!(WebSearchToolParameters).to_value(),
        }
    }

    /// Sets how many results a search returns. At least one is returned.
    #[inline]
    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results.max(1);
        self
    }

    /// Sends searches to another endpoint of the same API.
    #[inline]
    pub fn with_endpoint<S: Into<String>>(mut self, endpoint: S) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

impl Tool for WebSearchTool {
    type Input = WebSearchToolParameters;

    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Searches the web. Useful for current events and facts you are not \
         sure about. Returns the best matching pages with a short excerpt of \
         each."
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    #[allow(clippy::manual_async_fn)]
    fn execute(
        &self,
        input: WebSearchToolParameters,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        let client = self.client.clone();
        let api_key = self.api_key.clone();
        let endpoint = self.endpoint.clone();
        let max_results = self.max_results;
        async move {
            debug!("searching the web for: {}", input.query);
            let body = SearchRequest {
                query: &input.query,
                max_results,
            };
            let resp: SearchResponse =
                super::post_json(&client, &endpoint, &api_key, &body).await?;
            Ok(format_results(&resp.results))
        }
    }
}

fn format_results(results: &[SearchResult]) -> String {
    if results.is_empty() {
        return "No results found.".to_owned();
    }

    let mut output = String::new();
    for (idx, result) in results.iter().enumerate() {
        if idx > 0 {
            output.push('\n');
        }
        _ = writeln!(output, "{}. {}", idx + 1, result.title.trim());
        _ = writeln!(output, "   {}", result.url);
        _ = writeln!(output, "   {}", result.content.trim());
    }
    output
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_format_results() {
        let resp: SearchResponse = serde_json::from_value(json!({
            "query": "capital of France",
            "results": [
                {
                    "title": "Paris - Wikipedia",
                    "url": "https://en.wikipedia.org/wiki/Paris",
                    "content": "Paris is the capital of France. ",
                    "score": 0.98
                },
                {
                    "title": "France",
                    "url": "https://example.com/france",
                    "content": "Its capital is Paris."
                }
            ]
        }))
        .unwrap();

        assert_eq!(
            format_results(&resp.results),
            "1. Paris - Wikipedia\n\
             \x20  https://en.wikipedia.org/wiki/Paris\n\
             \x20  Paris is the capital of France.\n\
             \n\
             2. France\n\
             \x20  https://example.com/france\n\
             \x20  Its capital is Paris.\n"
        );
    }

    #[test]
    fn test_no_results() {
        let resp: SearchResponse = serde_json::from_value(json!({})).unwrap();
        assert_eq!(format_results(&resp.results), "No results found.");
    }

    #[test]
    fn test_definition() {
        let tool = WebSearchTool::new("key").with_max_results(0);
        assert_eq!(tool.max_results, 1);
        assert_eq!(tool.name(), "web_search");
        let schema = tool.parameter_schema();
        assert_eq!(schema["required"], json!(["query"]));
        assert!(schema["properties"]["query"].is_object());
    }
}

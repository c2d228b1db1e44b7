use nexus_core::tool::{Error as ToolError, Tool, ToolResult};
use schemars::{JsonSchema, schema_for};
use serde::{Deserialize, Serialize};
use serde_json::Value;

const RIZA_EXECUTE_URL: &str = "https://api.riza.io/v1/execute";

#[derive(Deserialize, JsonSchema)]
pub struct PythonToolParameters {
    #[schemars(
        description = "The Python code to run. Use print() to output results."
    )]
    code: String,
}

#[derive(Serialize)]
struct ExecuteRequest<'a> {
    language: &'static str,
    code: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct ExecuteResponse {
    #[serde(default)]
    exit_code: i32,
    #[serde(default)]
    stdout: String,
    #[serde(default)]
    stderr: String,
}

/// A tool for running Python code in a Riza sandbox.
pub struct PythonTool {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
    parameter_schema: Value,
}

impl PythonTool {
    /// Creates a new code tool authenticating with `api_key`.
    pub fn new<S: Into<String>>(api_key: S) -> Self {
        PythonTool {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            endpoint: RIZA_EXECUTE_URL.to_owned(),
            parameter_schema: schema_for!(PythonToolParameters).to_value(),
        }
    }

    /// Sends code to another endpoint of the same API.
    #[inline]
    pub fn with_endpoint<S: Into<String>>(mut self, endpoint: S) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

impl Tool for PythonTool {
    type Input = PythonToolParameters;

    fn name(&self) -> &str {
        "python"
    }

    fn description(&self) -> &str {
        r#"
Runs Python code in a sandbox and returns what it printed.
Only the standard library is available. The code has no network or file system access, so compute everything from values written in the code."#
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    #[allow(clippy::manual_async_fn)]
    fn execute(
        &self,
        input: PythonToolParameters,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        let client = self.client.clone();
        let api_key = self.api_key.clone();
        let endpoint = self.endpoint.clone();
        async move {
            trace!("running code:\n{}", input.code);
            let body = ExecuteRequest {
                language: "python",
                code: &input.code,
            };
            let resp: ExecuteResponse =
                super::post_json(&client, &endpoint, &api_key, &body).await?;
            render_output(resp)
        }
    }
}

fn render_output(resp: ExecuteResponse) -> ToolResult {
    if resp.exit_code != 0 {
        return Err(ToolError::execution_error().with_reason(format!(
            "exit code {}, stderr:\n{}",
            resp.exit_code, resp.stderr
        )));
    }
    if resp.stdout.trim().is_empty() {
        return Ok(
            "The code ran without printing anything. Use print() to see \
             values."
                .to_owned(),
        );
    }
    Ok(resp.stdout)
}

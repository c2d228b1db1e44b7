//! The tools the researcher and the coder can use.

mod python;
mod web_search;

use nexus_core::tool::Error as ToolError;
use serde::Serialize;
use serde::de::DeserializeOwned;

pub use python::PythonTool;
pub use web_search::{DEFAULT_SEARCH_RESULTS, WebSearchTool};

/// Posts `body` as JSON with bearer authentication and decodes the JSON
/// reply. Every failure is reported as an execution error, so the model can
/// see what went wrong.
async fn post_json<B: Serialize, R: DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
    api_key: &str,
    body: &B,
) -> Result<R, ToolError> {
    let resp = client
        .post(url)
        .bearer_auth(api_key)
        .json(body)
        .send()
        .await
        .map_err(|err| {
            ToolError::execution_error()
                .with_reason(format!("request failed: {err}"))
        })?;

    let status = resp.status();
    if !status.is_success() {
        let text = resp.text().await.unwrap_or_default();
        warn!("tool request failed with {status}: {text}");
        return Err(ToolError::execution_error()
            .with_reason(format!("service replied {status}: {text}")));
    }

    resp.json().await.map_err(|err| {
        ToolError::execution_error()
            .with_reason(format!("unreadable reply: {err}"))
    })
}

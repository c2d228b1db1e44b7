use std::collections::HashMap;
use std::pin::Pin;

use futures_util::future::join_all;
use nexus_model::{ModelTool, ToolCallRequest, ToolCallResult};
use tracing::Instrument;

use crate::tool::{Error, ToolObject, ToolResult};

type BoxedToolFuture = Pin<Box<dyn Future<Output = ToolResult> + Send>>;

/// An executor that handles tool call requests from the model.
#[derive(Default)]
pub struct Executor {
    tools: HashMap<String, Box<dyn ToolObject>>,
}

impl Executor {
    /// Creates an executor serving the given tools. A tool replaces any
    /// earlier one with the same name.
    pub fn with_tools(tools: Vec<Box<dyn ToolObject>>) -> Self {
        let mut tool_map = HashMap::with_capacity(tools.len());
        for tool in tools {
            let name = tool.name();
            tool_map.insert(name.to_owned(), tool);
        }
        let tools = tool_map;
        Self { tools }
    }

    /// Returns the definitions sorted by name, so that requests are stable.
    pub fn definitions(&self) -> Vec<ModelTool> {
        let mut definitions: Vec<_> =
            self.tools.values().map(|tool| tool.definition()).collect();
        definitions.sort_by(|a, b| a.name.cmp(&b.name));
        definitions
    }

    /// Runs all requested calls concurrently. Results are in request order,
    /// one per request; failures are rendered as text.
    pub async fn execute_all(
        &self,
        requests: &[ToolCallRequest],
    ) -> Vec<ToolCallResult> {
        let futures = requests.iter().map(|req| {
            let fut: BoxedToolFuture = match self.tools.get(&req.name) {
                Some(tool) => {
                    trace!(
                        "spawning a tool ({}) with args: {:?}",
                        req.id, req.arguments
                    );
                    tool.execute(req.arguments.clone())
                }
                None => {
                    warn!("tool not found: {}", req.name);
                    let err = Error::not_found().with_reason(format!(
                        "no tool named `{}` is available",
                        req.name
                    ));
                    Box::pin(std::future::ready(ToolResult::Err(err)))
                }
            };
            let id = req.id.clone();
            async move {
                let content = match fut.await {
                    Ok(output) => output,
                    Err(err) => {
                        debug!("tool call {id} failed: {err}");
                        format!("Error: {err}")
                    }
                };
                ToolCallResult { id, content }
            }
            .instrument(debug_span!("tool execute", name = %req.name))
        });
        join_all(futures).await
    }
}

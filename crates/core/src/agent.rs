mod builder;
#[cfg(test)]
mod tests;

use std::sync::Arc;

use nexus_model::{ModelMessage, ModelRequest, ToolCallRequest, ToolCallResult};

pub use builder::{AgentBuilder, DEFAULT_MAX_ITERATIONS};

use crate::model_client::ModelClient;
use crate::retry::RetryPolicy;
use crate::tool::Executor as ToolExecutor;
use crate::Error;

/// Something that happened while an agent was working.
#[derive(Clone, Debug)]
pub enum AgentEvent {
    /// A piece of reply text streamed from the model.
    Transcript(String),
    /// A failed model turn is being retried. Reply text streamed since the
    /// turn started is void, the retried turn streams it again.
    TurnRestarted,
    /// The model asked for a tool call.
    ToolCall(ToolCallRequest),
    /// A tool call finished; failures are already rendered as text.
    ToolResult(ToolCallResult),
}

type EventCallback = Arc<dyn Fn(AgentEvent) + Send + Sync>;

/// A role-bound model with a set of tools.
///
/// Running the agent is a loop: the model is asked for a reply, the tool
/// calls it requests are executed and their results appended, and the model
/// is asked again. The loop stops once the model answers without calling any
/// tool, or fails once the iteration budget is used up.
pub struct Agent {
    model_client: ModelClient,
    instructions: String,
    tool_executor: ToolExecutor,
    max_iterations: usize,
    retry_policy: RetryPolicy,
    on_event: Option<EventCallback>,
}

/// The outcome of a finished agent run.
#[derive(Clone, Debug)]
pub struct AgentOutput {
    /// The final reply text.
    pub answer: String,
    /// Messages produced during the run, tool calls and results included.
    pub transcript: Vec<ModelMessage>,
    /// Number of tool calls made.
    pub tool_calls: usize,
}

impl Agent {
    /// Runs the agent over `history` and returns its final answer.
    ///
    /// `history` is sent as is, behind the agent's instructions.
    pub async fn run(
        &self,
        history: Vec<ModelMessage>,
    ) -> Result<AgentOutput, Error> {
        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(ModelMessage::system(self.instructions.clone()));
        messages.extend(history);
        let first_produced = messages.len();
        let tools = self.tool_executor.definitions();
        let mut tool_calls = 0;

        for iteration in 0..self.max_iterations {
            let req = ModelRequest {
                messages: messages.clone(),
                tools: tools.clone(),
                response_format: None,
            };
            let mut attempt = 0;
            let resp = self
                .retry_policy
                .run("agent turn", || {
                    attempt += 1;
                    if attempt > 1 {
                        self.emit(AgentEvent::TurnRestarted);
                    }
                    let on_event = self.on_event.clone();
                    self.model_client.send_request(req.clone(), move |delta| {
                        if let Some(on_event) = &on_event {
                            on_event(AgentEvent::Transcript(delta));
                        }
                    })
                })
                .await?;
            messages.push(resp.to_message());

            if resp.tool_calls.is_empty() {
                debug!("finished after {} model turns", iteration + 1);
                return Ok(AgentOutput {
                    answer: resp.transcript,
                    transcript: messages.split_off(first_produced),
                    tool_calls,
                });
            }

            for call in &resp.tool_calls {
                self.emit(AgentEvent::ToolCall(call.clone()));
            }
            tool_calls += resp.tool_calls.len();
            let results = self.tool_executor.execute_all(&resp.tool_calls).await;
            for result in results {
                self.emit(AgentEvent::ToolResult(result.clone()));
                messages.push(ModelMessage::Tool(result));
            }
        }

        warn!("gave up after {} model turns", self.max_iterations);
        Err(Error::IterationsExhausted(self.max_iterations))
    }

    #[inline]
    fn emit(&self, event: AgentEvent) {
        if let Some(on_event) = &self.on_event {
            on_event(event);
        }
    }
}

use std::sync::Arc;

use nexus_model::ModelProvider;

use super::{Agent, AgentEvent};
use crate::model_client::ModelClient;
use crate::retry::RetryPolicy;
use crate::tool::{AnyTool, Executor as ToolExecutor, Tool, ToolObject};

/// The number of model turns an agent gets by default.
pub const DEFAULT_MAX_ITERATIONS: usize = 8;

/// [`Agent`] builder.
pub struct AgentBuilder {
    model_client: ModelClient,
    instructions: String,
    tools: Vec<Box<dyn ToolObject>>,
    max_iterations: usize,
    retry_policy: RetryPolicy,
    on_event: Option<Arc<dyn Fn(AgentEvent) + Send + Sync>>,
}

impl AgentBuilder {
    /// Creates a new builder with the specified model provider.
    #[inline]
    pub fn with_model_provider<P: ModelProvider + 'static>(
        provider: P,
    ) -> Self {
        Self::with_model_client(ModelClient::new(provider))
    }

    /// Creates a new builder sharing an existing model client.
    #[inline]
    pub fn with_model_client(model_client: ModelClient) -> Self {
        Self {
            model_client,
            instructions: String::new(),
            tools: vec![],
            max_iterations: DEFAULT_MAX_ITERATIONS,
            retry_policy: RetryPolicy::default(),
            on_event: None,
        }
    }

    /// Sets the role instructions, sent as the system message.
    #[inline]
    pub fn with_instructions<S: Into<String>>(mut self, instructions: S) -> Self {
        self.instructions = instructions.into();
        self
    }

    /// Registers a tool.
    #[inline]
    pub fn with_tool<T: Tool>(mut self, tool: T) -> Self {
        self.tools.push(Box::new(AnyTool(tool)));
        self
    }

    /// Limits the number of model turns. At least one turn is always made.
    #[inline]
    pub fn max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    /// Sets how failed model turns are retried.
    #[inline]
    pub fn retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Attaches a callback to observe the agent's progress.
    #[inline]
    pub fn on_event(
        mut self,
        on_event: impl Fn(AgentEvent) + Send + Sync + 'static,
    ) -> Self {
        self.on_event = Some(Arc::new(on_event));
        self
    }

    /// Builds the agent.
    #[inline]
    pub fn build(self) -> Agent {
        let AgentBuilder {
            model_client,
            instructions,
            tools,
            max_iterations,
            retry_policy,
            on_event,
        } = self;
        Agent {
            model_client,
            instructions,
            tool_executor: ToolExecutor::with_tools(tools),
            max_iterations,
            retry_policy,
            on_event,
        }
    }
}

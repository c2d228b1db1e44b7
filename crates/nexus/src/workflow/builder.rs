use std::sync::Arc;

use nexus_core::tool::Tool;
use nexus_core::{
    AgentBuilder, AgentEvent, DEFAULT_MAX_ITERATIONS, ModelClient, RetryPolicy,
};
use nexus_model::ModelProvider;

use super::{Nodes, Transition, TransitionCallback, Workflow};
use crate::graph::Node;
use crate::roles::{Enhancer, Specialist, Supervisor, Validator};

type AgentEventCallback = Arc<dyn Fn(Node, AgentEvent) + Send + Sync>;

/// [`Workflow`] builder, wiring every role to one model.
pub struct WorkflowBuilder {
    model_client: ModelClient,
    researcher: AgentBuilder,
    coder: AgentBuilder,
    retry_policy: RetryPolicy,
    agent_max_iterations: usize,
    max_rounds: Option<u32>,
    max_visits: Option<usize>,
    on_transition: Option<TransitionCallback>,
    on_agent_event: Option<AgentEventCallback>,
}

impl WorkflowBuilder {
    /// Creates a new builder with the specified model provider.
    #[inline]
    pub fn with_model_provider<P: ModelProvider + 'static>(
        provider: P,
    ) -> Self {
        Self::with_model_client(ModelClient::new(provider))
    }

    /// Creates a new builder sharing an existing model client.
    pub fn with_model_client(model_client: ModelClient) -> Self {
        let researcher = AgentBuilder::with_model_client(model_client.clone())
            .with_instructions(Specialist::RESEARCHER_INSTRUCTIONS);
        let coder = AgentBuilder::with_model_client(model_client.clone())
            .with_instructions(Specialist::CODER_INSTRUCTIONS);
        Self {
            model_client,
            researcher,
            coder,
            retry_policy: RetryPolicy::default(),
            agent_max_iterations: DEFAULT_MAX_ITERATIONS,
            max_rounds: None,
            max_visits: None,
            on_transition: None,
            on_agent_event: None,
        }
    }

    /// Gives the researcher a tool, typically a web search.
    #[inline]
    pub fn with_search_tool<T: Tool>(mut self, tool: T) -> Self {
        self.researcher = self.researcher.with_tool(tool);
        self
    }

    /// Gives the coder a tool, typically a code interpreter.
    #[inline]
    pub fn with_code_tool<T: Tool>(mut self, tool: T) -> Self {
        self.coder = self.coder.with_tool(tool);
        self
    }

    /// Sets how failed model calls of every role are retried.
    #[inline]
    pub fn retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Limits the model turns of the researcher and the coder.
    #[inline]
    pub fn agent_max_iterations(mut self, max_iterations: usize) -> Self {
        self.agent_max_iterations = max_iterations;
        self
    }

    /// See [`Workflow::max_rounds`].
    #[inline]
    pub fn max_rounds(mut self, max_rounds: Option<u32>) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    /// See [`Workflow::max_visits`].
    #[inline]
    pub fn max_visits(mut self, max_visits: Option<usize>) -> Self {
        self.max_visits = max_visits;
        self
    }

    /// See [`Workflow::on_transition`].
    #[inline]
    pub fn on_transition(
        mut self,
        on_transition: impl Fn(Transition<'_>) + Send + Sync + 'static,
    ) -> Self {
        self.on_transition = Some(Box::new(on_transition));
        self
    }

    /// Attaches a callback that observes the tool calls and streamed text of
    /// the researcher and the coder.
    #[inline]
    pub fn on_agent_event(
        mut self,
        on_agent_event: impl Fn(Node, AgentEvent) + Send + Sync + 'static,
    ) -> Self {
        self.on_agent_event = Some(Arc::new(on_agent_event));
        self
    }

    /// Builds the workflow.
    pub fn build(self) -> Workflow {
        let WorkflowBuilder {
            model_client,
            researcher,
            coder,
            retry_policy,
            agent_max_iterations,
            max_rounds,
            max_visits,
            on_transition,
            on_agent_event,
        } = self;

        let specialist = |node: Node, agent: AgentBuilder| {
            let mut agent = agent
                .max_iterations(agent_max_iterations)
                .retry_policy(retry_policy.clone());
            if let Some(on_agent_event) = on_agent_event.clone() {
                agent =
                    agent.on_event(move |event| on_agent_event(node, event));
            }
            Box::new(Specialist::new(agent.build()))
        };

        let nodes = Nodes {
            supervisor: Box::new(Supervisor::new(
                model_client.clone(),
                retry_policy.clone(),
            )),
            enhancer: Box::new(Enhancer::new(
                model_client.clone(),
                retry_policy.clone(),
            )),
            researcher: specialist(Node::Researcher, researcher),
            coder: specialist(Node::Coder, coder),
            validator: Box::new(Validator::new(
                model_client,
                retry_policy.clone(),
            )),
        };

        Workflow {
            nodes,
            max_rounds,
            max_visits,
            on_transition,
        }
    }
}

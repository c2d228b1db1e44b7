//! Running a query through the routing graph.

mod builder;

use thiserror::Error;
use tracing::Instrument;

pub use builder::WorkflowBuilder;

use crate::conversation::{Conversation, Message};
use crate::graph::{Node, Step, SupervisorRoute, ValidatorRoute};
use crate::roles::{Router, Worker};

/// The roles a workflow dispatches to, one per node.
pub struct Nodes {
    /// Runs in [`Node::Supervisor`].
    pub supervisor: Box<dyn Router<SupervisorRoute>>,
    /// Runs in [`Node::Enhancer`].
    pub enhancer: Box<dyn Worker>,
    /// Runs in [`Node::Researcher`].
    pub researcher: Box<dyn Worker>,
    /// Runs in [`Node::Coder`].
    pub coder: Box<dyn Worker>,
    /// Runs in [`Node::Validator`].
    pub validator: Box<dyn Router<ValidatorRoute>>,
}

/// A node has appended its message and declared where the run goes next.
#[derive(Clone, Copy, Debug)]
pub struct Transition<'a> {
    /// The node that just ran.
    pub node: Node,
    /// The message it appended.
    pub message: &'a Message,
    /// Where the run goes next.
    pub next: Step,
}

type TransitionCallback = Box<dyn Fn(Transition<'_>) + Send + Sync>;

/// A finished run.
#[derive(Clone, Debug)]
pub struct RunOutcome {
    /// Everything appended during the run, starting with the question.
    pub conversation: Conversation,
    /// Number of node visits.
    pub visits: usize,
    /// Number of times the validator sent the run back to the supervisor.
    pub rounds: u32,
}

impl RunOutcome {
    /// Returns the content of the last researcher or coder message.
    ///
    /// Validator text that follows it is not part of the answer.
    #[inline]
    pub fn final_answer(&self) -> Option<&str> {
        self.conversation.final_answer().map(Message::content)
    }
}

/// A failed run. Every variant carries the conversation up to the failure.
#[derive(Debug, Error)]
pub enum RunError {
    /// A role's model or agent call failed for good.
    #[error("{node} failed: {source}")]
    Node {
        /// The node that failed.
        node: Node,
        /// What went wrong.
        source: nexus_core::Error,
        /// The conversation before the failed visit.
        conversation: Box<Conversation>,
    },

    /// The validator kept rejecting answers.
    #[error("answer rejected {rounds} times, giving up")]
    RoundLimit {
        /// Number of rejections.
        rounds: u32,
        /// The conversation, ending with the last rejection.
        conversation: Box<Conversation>,
    },

    /// The run kept going without reaching the validator's approval.
    #[error("no approved answer after {visits} node visits")]
    VisitLimit {
        /// Number of node visits.
        visits: usize,
        /// The conversation so far.
        conversation: Box<Conversation>,
    },
}

impl RunError {
    /// Returns the conversation up to the failure.
    pub fn conversation(&self) -> &Conversation {
        match self {
            RunError::Node { conversation, .. }
            | RunError::RoundLimit { conversation, .. }
            | RunError::VisitLimit { conversation, .. } => conversation,
        }
    }
}

/// The routing state machine.
///
/// A run starts in the supervisor with a fresh conversation holding only the
/// question. Each visited node reads the whole conversation, exactly one
/// message is appended for it, and its declared step is followed until the
/// validator approves an answer. Nodes run strictly one at a time.
pub struct Workflow {
    nodes: Nodes,
    max_rounds: Option<u32>,
    max_visits: Option<usize>,
    on_transition: Option<TransitionCallback>,
}

impl Workflow {
    /// Creates a workflow over custom roles, without any limits.
    #[inline]
    pub fn from_nodes(nodes: Nodes) -> Self {
        Self {
            nodes,
            max_rounds: None,
            max_visits: None,
            on_transition: None,
        }
    }

    /// Limits how many times the validator may send the run back to the
    /// supervisor. One rejection more fails the run with
    /// [`RunError::RoundLimit`].
    #[inline]
    pub fn max_rounds(mut self, max_rounds: Option<u32>) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    /// Limits the total number of node visits, which also bounds cycles
    /// between the supervisor and the enhancer.
    #[inline]
    pub fn max_visits(mut self, max_visits: Option<usize>) -> Self {
        self.max_visits = max_visits;
        self
    }

    /// Attaches a callback that observes every transition.
    #[inline]
    pub fn on_transition(
        mut self,
        on_transition: impl Fn(Transition<'_>) + Send + Sync + 'static,
    ) -> Self {
        self.on_transition = Some(Box::new(on_transition));
        self
    }

    /// Runs `question` through the graph until the validator approves an
    /// answer.
    pub async fn run<S: Into<String>>(
        &self,
        question: S,
    ) -> Result<RunOutcome, RunError> {
        let conversation = Conversation::new(question);
        self.drive(conversation).instrument(info_span!("run")).await
    }

    async fn drive(
        &self,
        mut conversation: Conversation,
    ) -> Result<RunOutcome, RunError> {
        let mut node = Node::START;
        let mut visits = 0;
        let mut rounds = 0;

        loop {
            if self.max_visits.is_some_and(|max| visits >= max) {
                warn!("giving up after {visits} node visits");
                return Err(RunError::VisitLimit {
                    visits,
                    conversation: Box::new(conversation),
                });
            }
            visits += 1;

            let (content, next) = match self.visit(node, &conversation).await {
                Ok(visited) => visited,
                Err(source) => {
                    error!("{node} failed: {source}");
                    return Err(RunError::Node {
                        node,
                        source,
                        conversation: Box::new(conversation),
                    });
                }
            };

            let message =
                conversation.append(Message::new(node.origin(), content));
            info!("{node} -> {next}");
            if let Some(on_transition) = &self.on_transition {
                on_transition(Transition {
                    node,
                    message,
                    next,
                });
            }

            match next {
                Step::End => break,
                Step::Goto(next_node) => {
                    if node == Node::Validator {
                        rounds += 1;
                        if self.max_rounds.is_some_and(|max| rounds > max) {
                            warn!("answer rejected {rounds} times");
                            return Err(RunError::RoundLimit {
                                rounds,
                                conversation: Box::new(conversation),
                            });
                        }
                    }
                    node = next_node;
                }
            }
        }

        Ok(RunOutcome {
            conversation,
            visits,
            rounds,
        })
    }

    async fn visit(
        &self,
        node: Node,
        conversation: &Conversation,
    ) -> Result<(String, Step), nexus_core::Error> {
        let nodes = &self.nodes;
        Ok(match node {
            Node::Supervisor => {
                let decision = nodes.supervisor.decide(conversation).await?;
                (decision.reason, Step::Goto(decision.next.into()))
            }
            Node::Enhancer => (
                nodes.enhancer.work(conversation).await?,
                Step::Goto(Node::Supervisor),
            ),
            Node::Researcher => (
                nodes.researcher.work(conversation).await?,
                Step::Goto(Node::Validator),
            ),
            Node::Coder => (
                nodes.coder.work(conversation).await?,
                Step::Goto(Node::Validator),
            ),
            Node::Validator => {
                let decision = nodes.validator.decide(conversation).await?;
                (decision.reason, decision.next.step())
            }
        })
    }
}

//! The roles that fill the nodes of the routing graph.
//!
//! Workers ([`Enhancer`] and [`Specialist`]) reply with text; routers
//! ([`Supervisor`] and [`Validator`]) reply with a [`RoutingDecision`].
//! Every role reads the conversation but never writes to it, the workflow
//! appends what they return.

mod prompts;

use async_trait::async_trait;
use nexus_core::{Agent, Error, ModelClient, RetryPolicy};
use nexus_model::ModelMessage;

use crate::conversation::Conversation;
use crate::graph::{RoutingDecision, SupervisorRoute, ValidatorRoute};

/// A role that answers with text.
#[async_trait]
pub trait Worker: Send + Sync {
    /// Produces the text to append for this visit.
    async fn work(&self, conversation: &Conversation) -> Result<String, Error>;
}

/// A role that decides where the run goes next.
#[async_trait]
pub trait Router<R>: Send + Sync {
    /// Produces the decision for this visit.
    async fn decide(
        &self,
        conversation: &Conversation,
    ) -> Result<RoutingDecision<R>, Error>;
}

/// Dispatches the conversation to the best suited worker.
pub struct Supervisor {
    model_client: ModelClient,
    retry_policy: RetryPolicy,
}

impl Supervisor {
    /// Creates a supervisor backed by `model_client`.
    #[inline]
    pub fn new(model_client: ModelClient, retry_policy: RetryPolicy) -> Self {
        Self {
            model_client,
            retry_policy,
        }
    }
}

#[async_trait]
impl Router<SupervisorRoute> for Supervisor {
    async fn decide(
        &self,
        conversation: &Conversation,
    ) -> Result<RoutingDecision<SupervisorRoute>, Error> {
        let messages = behind_prompt(prompts::SUPERVISOR, conversation);
        self.retry_policy
            .run("supervisor decision", || {
                self.model_client.request_structured(messages.clone())
            })
            .await
    }
}

/// Rewrites the query into a more precise one.
pub struct Enhancer {
    model_client: ModelClient,
    retry_policy: RetryPolicy,
}

impl Enhancer {
    /// Creates an enhancer backed by `model_client`.
    #[inline]
    pub fn new(model_client: ModelClient, retry_policy: RetryPolicy) -> Self {
        Self {
            model_client,
            retry_policy,
        }
    }
}

#[async_trait]
impl Worker for Enhancer {
    async fn work(&self, conversation: &Conversation) -> Result<String, Error> {
        let messages = behind_prompt(prompts::ENHANCER, conversation);
        self.retry_policy
            .run("query enhancement", || {
                self.model_client.complete(messages.clone())
            })
            .await
    }
}

/// A tool-using agent working on the whole conversation.
///
/// The researcher and the coder are both specialists, they only differ in
/// instructions and tools.
pub struct Specialist {
    agent: Agent,
}

impl Specialist {
    /// Wraps an already configured agent.
    #[inline]
    pub fn new(agent: Agent) -> Self {
        Self { agent }
    }

    /// Instructions for an agent that gathers information.
    pub const RESEARCHER_INSTRUCTIONS: &'static str = prompts::RESEARCHER;

    /// Instructions for an agent that calculates and runs code.
    pub const CODER_INSTRUCTIONS: &'static str = prompts::CODER;
}

#[async_trait]
impl Worker for Specialist {
    async fn work(&self, conversation: &Conversation) -> Result<String, Error> {
        let output = self.agent.run(conversation.to_model_messages()).await?;
        debug!("specialist made {} tool calls", output.tool_calls);
        Ok(output.answer)
    }
}

/// Judges the latest answer against the original question.
pub struct Validator {
    model_client: ModelClient,
    retry_policy: RetryPolicy,
}

impl Validator {
    /// Creates a validator backed by `model_client`.
    #[inline]
    pub fn new(model_client: ModelClient, retry_policy: RetryPolicy) -> Self {
        Self {
            model_client,
            retry_policy,
        }
    }
}

#[async_trait]
impl Router<ValidatorRoute> for Validator {
    async fn decide(
        &self,
        conversation: &Conversation,
    ) -> Result<RoutingDecision<ValidatorRoute>, Error> {
        // Only the question and the answer under review are judged, not the
        // path that led to the answer.
        let messages = vec![
            ModelMessage::system(prompts::VALIDATOR),
            ModelMessage::user(conversation.question().content()),
            ModelMessage::assistant(conversation.latest().content()),
        ];
        self.retry_policy
            .run("validator decision", || {
                self.model_client.request_structured(messages.clone())
            })
            .await
    }
}

fn behind_prompt(
    prompt: &str,
    conversation: &Conversation,
) -> Vec<ModelMessage> {
    let mut messages = Vec::with_capacity(conversation.messages().len() + 1);
    messages.push(ModelMessage::system(prompt));
    messages.extend(conversation.to_model_messages());
    messages
}

#[cfg(test)]
mod tests {
    use nexus_test_model::{PresetResponse, TestModelProvider};
    use serde_json::json;

    use super::*;
    use crate::conversation::{Message, Origin};

    fn conversation() -> Conversation {
        let mut conversation = Conversation::new("What is 17 * 23?");
        conversation.append(Message::new(Origin::Supervisor, "Arithmetic."));
        conversation.append(Message::new(Origin::Coder, "17 * 23 = 391"));
        conversation
    }

    #[tokio::test]
    async fn test_supervisor_sees_everything() {
        let provider = TestModelProvider::default();
        provider.add_response(PresetResponse::json(
            json!({ "next": "coder", "reason": "Arithmetic." }),
        ));
        let supervisor = Supervisor::new(
            ModelClient::new(provider.clone()),
            RetryPolicy::never(),
        );

        let decision = supervisor.decide(&conversation()).await.unwrap();
        assert_eq!(decision.next, SupervisorRoute::Coder);

        let requests = provider.requests();
        let messages = &requests[0].messages;
        assert_eq!(messages.len(), 4);
        assert!(messages[0].content().starts_with(prompts::SUPERVISOR));
        assert_eq!(messages[1], ModelMessage::user("What is 17 * 23?"));
        assert_eq!(
            messages[3],
            ModelMessage::named_user("coder", "17 * 23 = 391")
        );
    }

    #[tokio::test]
    async fn test_validator_sees_question_and_answer() {
        let provider = TestModelProvider::default();
        provider.add_response(PresetResponse::json(
            json!({ "next": "FINISH", "reason": "Correct." }),
        ));
        let validator = Validator::new(
            ModelClient::new(provider.clone()),
            RetryPolicy::never(),
        );

        let decision = validator.decide(&conversation()).await.unwrap();
        assert_eq!(decision.next, ValidatorRoute::Finish);
        assert_eq!(decision.reason, "Correct.");

        let requests = provider.requests();
        let messages = &requests[0].messages;
        assert_eq!(messages.len(), 3);
        assert!(messages[0].content().starts_with(prompts::VALIDATOR));
        assert_eq!(messages[1], ModelMessage::user("What is 17 * 23?"));
        assert_eq!(messages[2], ModelMessage::assistant("17 * 23 = 391"));
    }

    #[tokio::test]
    async fn test_enhancer_replies_with_text() {
        let provider = TestModelProvider::default();
        provider.add_response(PresetResponse::text("Explain Rust ownership."));
        let enhancer = Enhancer::new(
            ModelClient::new(provider.clone()),
            RetryPolicy::never(),
        );

        let text = enhancer
            .work(&Conversation::new("tell me about it"))
            .await
            .unwrap();
        assert_eq!(text, "Explain Rust ownership.");
        assert_eq!(
            provider.requests()[0].messages[0],
            ModelMessage::system(prompts::ENHANCER)
        );
    }
}

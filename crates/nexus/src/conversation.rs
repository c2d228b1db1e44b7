//! The shared, append-only history of one run.

use std::fmt::{self, Display};

use nexus_model::ModelMessage;
use serde::Serialize;

/// Who wrote a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    /// The human asking the question.
    User,
    /// Host-provided instructions.
    System,
    /// The supervisor's routing justification.
    Supervisor,
    /// The rewritten query.
    Enhancer,
    /// The researcher's answer.
    Researcher,
    /// The coder's answer.
    Coder,
    /// The validator's verdict justification.
    Validator,
}

impl Origin {
    /// Returns the lowercase name, which is also the participant name sent
    /// to the model.
    pub fn as_str(self) -> &'static str {
        match self {
            Origin::User => "user",
            Origin::System => "system",
            Origin::Supervisor => "supervisor",
            Origin::Enhancer => "enhancer",
            Origin::Researcher => "researcher",
            Origin::Coder => "coder",
            Origin::Validator => "validator",
        }
    }

    /// Returns `true` for roles whose messages are answers to the question.
    #[inline]
    pub fn is_answer(self) -> bool {
        matches!(self, Origin::Researcher | Origin::Coder)
    }
}

impl Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One turn of the conversation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Message {
    origin: Origin,
    content: String,
}

impl Message {
    /// Creates a message.
    #[inline]
    pub fn new<S: Into<String>>(origin: Origin, content: S) -> Self {
        Self {
            origin,
            content: content.into(),
        }
    }

    /// Returns who wrote the message.
    #[inline]
    pub fn origin(&self) -> Origin {
        self.origin
    }

    /// Returns the text of the message.
    #[inline]
    pub fn content(&self) -> &str {
        &self.content
    }

    fn to_model_message(&self) -> ModelMessage {
        match self.origin {
            Origin::User => ModelMessage::user(self.content.clone()),
            Origin::System => ModelMessage::system(self.content.clone()),
            origin => {
                ModelMessage::named_user(origin.as_str(), self.content.clone())
            }
        }
    }
}

/// The ordered history of one run.
///
/// A conversation always starts with the user's question, and only grows:
/// messages can't be removed or edited once appended. Only the workflow
/// appends, one message per visited state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    /// Starts a conversation with the user's question.
    pub fn new<S: Into<String>>(question: S) -> Self {
        Self {
            messages: vec![Message::new(Origin::User, question)],
        }
    }

    /// Returns the message the run was started with.
    #[inline]
    pub fn question(&self) -> &Message {
        &self.messages[0]
    }

    /// Returns the most recent message.
    #[inline]
    pub fn latest(&self) -> &Message {
        // Never empty, see `new`.
        &self.messages[self.messages.len() - 1]
    }

    /// Returns all messages, oldest first.
    #[inline]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Returns the last researcher or coder message, which is what the run
    /// presents as its answer.
    pub fn final_answer(&self) -> Option<&Message> {
        self.messages
            .iter()
            .rev()
            .find(|msg| msg.origin().is_answer())
    }

    /// Converts the history to model messages, tagging every role's turn
    /// with its name.
    pub fn to_model_messages(&self) -> Vec<ModelMessage> {
        self.messages.iter().map(Message::to_model_message).collect()
    }

    pub(crate) fn append(&mut self, message: Message) -> &Message {
        self.messages.push(message);
        self.latest()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_question_and_latest() {
        let mut conversation = Conversation::new("What is 17 * 23?");
        assert_eq!(conversation.question(), conversation.latest());

        conversation.append(Message::new(Origin::Supervisor, "Math."));
        conversation.append(Message::new(Origin::Coder, "391"));
        conversation.append(Message::new(Origin::Validator, "Correct."));

        assert_eq!(conversation.question().content(), "What is 17 * 23?");
        assert_eq!(conversation.question().origin(), Origin::User);
        assert_eq!(conversation.latest().origin(), Origin::Validator);
        assert_eq!(conversation.final_answer().unwrap().content(), "391");
        assert_eq!(conversation.messages().len(), 4);
    }

    #[test]
    fn test_no_answer_yet() {
        let mut conversation = Conversation::new("tell me about it");
        conversation.append(Message::new(Origin::Supervisor, "Too vague."));
        conversation.append(Message::new(Origin::Enhancer, "About Rust?"));
        assert!(conversation.final_answer().is_none());
    }

    #[test]
    fn test_to_model_messages() {
        let mut conversation = Conversation::new("Capital of France?");
        conversation.append(Message::new(Origin::Supervisor, "Needs lookup."));
        assert_eq!(
            conversation.to_model_messages(),
            vec![
                ModelMessage::user("Capital of France?"),
                ModelMessage::named_user("supervisor", "Needs lookup."),
            ]
        );
    }
}

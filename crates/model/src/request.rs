use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::response::ToolCallRequest;

/// A request to be sent to the model provider.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelRequest {
    /// The input messages.
    pub messages: Vec<ModelMessage>,
    /// Tools that are available to the model.
    pub tools: Vec<ModelTool>,
    /// Constrains the reply to a JSON value of the given shape.
    pub response_format: Option<ResponseFormat>,
}

impl ModelRequest {
    /// Creates a plain text request from the given messages.
    #[inline]
    pub fn with_messages(messages: impl Into<Vec<ModelMessage>>) -> Self {
        Self {
            messages: messages.into(),
            ..Default::default()
        }
    }
}

/// A complete message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum ModelMessage {
    /// The system instructions.
    System {
        /// Instruction text.
        content: String,
    },
    /// A user turn.
    User {
        /// Text of the turn.
        content: String,
        /// Who wrote the turn, if it is not the human user. Providers that
        /// support participant names forward it as is.
        name: Option<String>,
    },
    /// An assistant turn, optionally requesting tool calls.
    Assistant {
        /// Text of the turn.
        content: String,
        /// Tool calls requested in this turn.
        tool_calls: Vec<ToolCallRequest>,
    },
    /// A tool call result.
    Tool(ToolCallResult),
}

impl ModelMessage {
    /// Creates a system message.
    #[inline]
    pub fn system<S: Into<String>>(content: S) -> Self {
        Self::System {
            content: content.into(),
        }
    }

    /// Creates an anonymous user message.
    #[inline]
    pub fn user<S: Into<String>>(content: S) -> Self {
        Self::User {
            content: content.into(),
            name: None,
        }
    }

    /// Creates a user message attributed to `name`.
    #[inline]
    pub fn named_user<N: Into<String>, S: Into<String>>(
        name: N,
        content: S,
    ) -> Self {
        Self::User {
            content: content.into(),
            name: Some(name.into()),
        }
    }

    /// Creates an assistant message without tool calls.
    #[inline]
    pub fn assistant<S: Into<String>>(content: S) -> Self {
        Self::Assistant {
            content: content.into(),
            tool_calls: vec![],
        }
    }

    /// Returns the text content of this message.
    pub fn content(&self) -> &str {
        match self {
            ModelMessage::System { content }
            | ModelMessage::User { content, .. }
            | ModelMessage::Assistant { content, .. } => content,
            ModelMessage::Tool(result) => &result.content,
        }
    }
}

/// The result of calling a tool.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ToolCallResult {
    /// The unique identifier for the tool call request.
    pub id: String,
    /// The result of the tool call.
    pub content: String,
}

/// Describes a tool that can be used by the model.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelTool {
    /// Name of the tool.
    pub name: String,
    /// Description of the tool.
    pub description: String,
    /// Parameters definition of the tool.
    ///
    /// For most model providers, the parameters should typically be
    /// defined by a [JSON schema](https://json-schema.org/).
    pub parameters: Value,
}

/// Asks the model to reply with a single JSON value instead of prose.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseFormat {
    /// A short identifier of the expected value, e.g. `routing_decision`.
    pub name: String,
    /// The [JSON schema](https://json-schema.org/) the reply must match.
    pub schema: Value,
}

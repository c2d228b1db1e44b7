use nexus_model::ToolCallRequest;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The events in a preset response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum PresetEvent {
    #[serde(rename = "message_delta")]
    MessageDelta(String),
    #[serde(rename = "tool_call")]
    ToolCall(ToolCallRequest),
}

/// The preset response for one request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresetResponse {
    /// Events in this response.
    pub events: Vec<PresetEvent>,
    /// If set, the request fails `failures` times before the events are
    /// delivered. `Some(0)` means the request always fails.
    pub failures: Option<u64>,
    /// Number of deliveries whose stream breaks off with a transport error
    /// after the events, instead of completing.
    #[serde(default)]
    pub broken_streams: u64,
}

impl PresetResponse {
    /// Creates a `PresetResponse` with the specified events.
    #[inline]
    pub fn with_events(events: impl Into<Vec<PresetEvent>>) -> Self {
        Self {
            events: events.into(),
            failures: None,
            broken_streams: 0,
        }
    }

    /// A response that streams `text` in a single delta.
    #[inline]
    pub fn text<S: Into<String>>(text: S) -> Self {
        Self::with_events([PresetEvent::MessageDelta(text.into())])
    }

    /// A response that streams `value` serialized as JSON, which is what a
    /// model honoring a response format would send.
    #[inline]
    pub fn json(value: Value) -> Self {
        Self::text(value.to_string())
    }

    /// A response that requests a single tool call.
    #[inline]
    pub fn tool_call<I: Into<String>, N: Into<String>>(
        id: I,
        name: N,
        arguments: Value,
    ) -> Self {
        Self::with_events([PresetEvent::ToolCall(ToolCallRequest {
            id: id.into(),
            name: name.into(),
            arguments,
        })])
    }

    /// Sets failure times before a successful response. `0` means the
    /// response will always be a failure.
    #[inline]
    pub fn with_failures(mut self, failures: u64) -> Self {
        self.failures = Some(failures);
        self
    }

    /// Makes the first `times` deliveries stream all events and then fail
    /// with a transport error. The response stays queued until delivered
    /// intact.
    #[inline]
    pub fn with_broken_streams(mut self, times: u64) -> Self {
        self.broken_streams = times;
        self
    }

    #[inline]
    pub(crate) fn has_tool_call(&self) -> bool {
        self.events
            .iter()
            .any(|event| matches!(event, PresetEvent::ToolCall(_)))
    }
}

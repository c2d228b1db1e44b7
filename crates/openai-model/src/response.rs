use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use nexus_model::{
    ErrorKind, ModelFinishReason, ModelResponse, ModelResponseEvent,
    ToolCallRequest,
};
use pin_project_lite::pin_project;
use serde_json::Value;

use crate::Error;
use crate::io::{Sse, SseError};
use crate::proto::{ChatCompletionChunk, ToolCall};

struct PartialState {
    sse: Sse,
    id: Option<String>,
    tool_calls: Vec<ToolCall>,
    // Indices of tool calls that started streaming but are not yet handed
    // out. Tool calls are only handed out once the finish reason arrives,
    // since their arguments are streamed in pieces.
    pending_tool_call_idx: VecDeque<usize>,
    // Cleared after the response returns the complete event.
    pending_finish_reason: Option<ModelFinishReason>,
    stream_ended: bool,
}

type PinnedFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;
type NextEvent = Result<(Option<ModelResponseEvent>, PartialState), Error>;

pin_project! {
    pub struct OpenAIResponse {
        next_event_fut: Option<PinnedFuture<NextEvent>>,
    }
}

impl OpenAIResponse {
    #[inline]
    pub fn from_sse(sse: Sse) -> Self {
        let partial_state = PartialState {
            sse,
            id: None,
            tool_calls: Default::default(),
            pending_tool_call_idx: Default::default(),
            pending_finish_reason: Default::default(),
            stream_ended: false,
        };
        let next_event_fut = async move { next_event(partial_state).await };
        Self {
            next_event_fut: Some(Box::pin(next_event_fut)),
        }
    }
}

impl ModelResponse for OpenAIResponse {
    type Error = crate::Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
        let this = self.project();
        let Some(next_event_fut) = this.next_event_fut else {
            return Poll::Ready(Ok(None));
        };
        let (event, partial_state) =
            match ready!(next_event_fut.as_mut().poll(cx)) {
                Ok((Some(event), partial_state)) => (event, partial_state),
                Ok((None, _)) => {
                    *this.next_event_fut = None;
                    return Poll::Ready(Ok(None));
                }
                Err(err) => {
                    *this.next_event_fut = None;
                    return Poll::Ready(Err(err));
                }
            };

        // The stream may still have more data to pull, create a new future for
        // the next event.
        let next_event_fut = async move { next_event(partial_state).await };
        *this.next_event_fut = Some(Box::pin(next_event_fut));

        Poll::Ready(Ok(Some(event)))
    }
}

fn finish_reason_from_str(reason: &str) -> ModelFinishReason {
    match reason {
        "tool_calls" | "function_call" => ModelFinishReason::ToolCalls,
        "length" => ModelFinishReason::Length,
        _ => ModelFinishReason::Stop,
    }
}

fn merge_tool_call(tool_calls: &mut Vec<ToolCall>, delta: ToolCall) -> bool {
    let Some(partial) = tool_calls.iter_mut().find(|t| t.index == delta.index)
    else {
        tool_calls.push(delta);
        return true;
    };
    if let Some(id) = delta.id {
        partial.id.get_or_insert_default().push_str(&id);
    }
    if let Some(ty) = delta.r#type {
        partial.r#type.get_or_insert_default().push_str(&ty);
    }
    if let Some(function) = delta.function {
        match partial.function {
            Some(ref mut partial_func) => {
                if let Some(name) = function.name {
                    partial_func.name.get_or_insert_default().push_str(&name);
                }
                if let Some(arguments) = function.arguments {
                    partial_func
                        .arguments
                        .get_or_insert_default()
                        .push_str(&arguments);
                }
            }
            None => partial.function = Some(function),
        }
    }
    false
}

fn complete_tool_call(tool_call: &ToolCall) -> ToolCallRequest {
    let id = tool_call.id.clone().unwrap_or_default();
    let function = tool_call.function.as_ref();
    let name = function.and_then(|f| f.name.clone()).unwrap_or_default();
    let arguments = function
        .and_then(|f| f.arguments.as_deref())
        .filter(|args| !args.trim().is_empty())
        .map(|args| {
            serde_json::from_str::<Value>(args)
                .unwrap_or_else(|_| Value::String(args.to_owned()))
        })
        .unwrap_or_else(|| Value::Object(Default::default()));
    ToolCallRequest {
        id,
        name,
        arguments,
    }
}

async fn next_event(
    mut partial_state: PartialState,
) -> Result<(Option<ModelResponseEvent>, PartialState), Error> {
    loop {
        // The order of events is important. Message deltas go out as they
        // arrive, tool calls after the finish reason is known, and the
        // complete event last.
        if partial_state.pending_finish_reason.is_some() {
            if let Some(idx) = partial_state.pending_tool_call_idx.pop_front() {
                let event = ModelResponseEvent::ToolCall(complete_tool_call(
                    &partial_state.tool_calls[idx],
                ));
                return Ok((Some(event), partial_state));
            }
            let reason = partial_state.pending_finish_reason.take();
            return Ok((reason.map(ModelResponseEvent::Completed), partial_state));
        }
        if partial_state.stream_ended {
            return Ok((None, partial_state));
        }

        let sse_event = match partial_state.sse.next_event().await {
            Ok(Some(event)) if event != "[DONE]" => event,
            Ok(_) => {
                partial_state.stream_ended = true;
                // The stream ended without a finish reason, flush what we
                // have.
                if !partial_state.pending_tool_call_idx.is_empty() {
                    partial_state.pending_finish_reason =
                        Some(ModelFinishReason::ToolCalls);
                }
                continue;
            }
            Err(SseError::ChunksError(err)) => {
                return Err(Error::new(err.0, ErrorKind::Transport));
            }
            Err(err) => {
                return Err(Error::new(
                    format!("{err:?}"),
                    ErrorKind::InvalidResponse,
                ));
            }
        };
        trace!("got sse event: {sse_event}");

        let mut chunk = serde_json::from_str::<ChatCompletionChunk>(&sse_event)
            .map_err(|err| {
                Error::new(format!("{err}"), ErrorKind::InvalidResponse)
            })?;
        if partial_state.id.get_or_insert_with(|| chunk.id.clone()) != &chunk.id
        {
            return Err(Error::new(
                "chunk id mismatch",
                ErrorKind::InvalidResponse,
            ));
        };

        // Trailing usage chunks carry no choices.
        let Some(choice) = chunk.choices.pop() else {
            continue;
        };

        for tool_call in choice.delta.tool_calls.into_iter().flatten() {
            if merge_tool_call(&mut partial_state.tool_calls, tool_call) {
                partial_state
                    .pending_tool_call_idx
                    .push_back(partial_state.tool_calls.len() - 1);
            }
        }
        if let Some(finish_reason) = choice.finish_reason {
            partial_state.pending_finish_reason =
                Some(finish_reason_from_str(&finish_reason));
        }
        if let Some(content) = choice.delta.content.filter(|c| !c.is_empty()) {
            return Ok((
                Some(ModelResponseEvent::MessageDelta(content)),
                partial_state,
            ));
        }
    }
}

use std::future::poll_fn;
use std::pin::{Pin, pin};
use std::sync::Arc;

use nexus_model::{
    ModelFinishReason, ModelMessage, ModelProvider, ModelProviderError,
    ModelRequest, ModelResponse, ModelResponseEvent, ToolCallRequest,
};
use tracing::Instrument;

use crate::Error;

type SendRequestResult = Result<ModelClientResponse, Error>;
type BoxedSendRequestFuture =
    Pin<Box<dyn Future<Output = SendRequestResult> + Send>>;
#[rustfmt::skip]
type HandlerFn = Arc<
    dyn Fn(ModelRequest, Box<dyn Fn(String) + Send + 'static>)
        -> BoxedSendRequestFuture + Send + Sync
>;

/// A wrapper around a model provider that provides a type-erased interface
/// for the other modules.
///
/// Cloning is cheap, all roles of a pipeline share the same client.
#[derive(Clone)]
pub struct ModelClient {
    handler_fn: HandlerFn,
}

impl ModelClient {
    /// Wraps the given provider.
    #[inline]
    pub fn new<P: ModelProvider + 'static>(provider: P) -> Self {
        // We have to erase the type `P`, since `ModelClient` doesn't have a
        // generic parameter and we don't want it either.
        let handler_fn: HandlerFn = Arc::new(move |req, on_transcript| {
            let fut = provider.send_request(&req);
            Box::pin(
                async move {
                    trace!("got a request: {:?}", req);
                    let resp_or_err = fut.await;
                    handle_response::<P>(resp_or_err, on_transcript).await
                }
                .instrument(trace_span!("model client req")),
            )
        });
        Self { handler_fn }
    }

    /// Sends a request and returns the completely received response.
    ///
    /// `on_transcript` is called with every text delta as it streams in.
    ///
    /// # Cancel safety
    ///
    /// This method is cancel safe. The response stops streaming further
    /// events when this operation is cancelled.
    #[inline]
    pub async fn send_request(
        &self,
        req: ModelRequest,
        on_transcript: impl Fn(String) + Send + 'static,
    ) -> Result<ModelClientResponse, Error> {
        (self.handler_fn)(req, Box::new(on_transcript)).await
    }

    /// Sends a plain text request and returns the reply text.
    #[inline]
    pub async fn complete(
        &self,
        messages: Vec<ModelMessage>,
    ) -> Result<String, Error> {
        let resp = self
            .send_request(ModelRequest::with_messages(messages), |_| {})
            .await?;
        Ok(resp.transcript)
    }
}

/// A completely received response from the model client.
#[derive(Clone, Debug)]
pub struct ModelClientResponse {
    /// The whole reply text.
    pub transcript: String,
    /// Tool calls requested by the model.
    pub tool_calls: Vec<ToolCallRequest>,
    /// The reason the model finished generating.
    pub finish_reason: Option<ModelFinishReason>,
}

impl ModelClientResponse {
    /// Converts the response into a history message, so that it can be
    /// sent back to the model in the next request.
    #[inline]
    pub fn to_message(&self) -> ModelMessage {
        ModelMessage::Assistant {
            content: self.transcript.clone(),
            tool_calls: self.tool_calls.clone(),
        }
    }
}

async fn handle_response<P: ModelProvider + 'static>(
    resp_or_err: Result<P::Response, P::Error>,
    on_transcript: Box<dyn Fn(String) + Send + 'static>,
) -> SendRequestResult {
    let resp = resp_or_err.map_err(model_error)?;
    let mut resp = pin!(resp);
    let mut collected = Collected::default();

    trace!("start receiving events");
    while let Some(event) = poll_fn(|cx| resp.as_mut().poll_next_event(cx))
        .await
        .map_err(model_error)?
    {
        trace!("got an event: {event:?}");
        if let ModelResponseEvent::MessageDelta(delta) = &event {
            on_transcript(delta.clone());
        }
        collected.push(event);
    }
    trace!("finished a request");

    Ok(collected.into())
}

fn model_error<E: ModelProviderError>(err: E) -> Error {
    error!("got an error: {err:?}");
    Error::Model(Box::new(err))
}

/// Accumulates the events of a streamed response.
#[derive(Default)]
struct Collected {
    transcript: String,
    tool_calls: Vec<ToolCallRequest>,
    finish_reason: Option<ModelFinishReason>,
}

impl Collected {
    fn push(&mut self, event: ModelResponseEvent) {
        match event {
            ModelResponseEvent::MessageDelta(delta) => {
                self.transcript.push_str(&delta)
            }
            ModelResponseEvent::ToolCall(req) => self.tool_calls.push(req),
            ModelResponseEvent::Completed(reason) => {
                self.finish_reason = Some(reason)
            }
        }
    }
}

impl From<Collected> for ModelClientResponse {
    fn from(collected: Collected) -> Self {
        let Collected {
            transcript,
            tool_calls,
            finish_reason,
        } = collected;
        Self {
            transcript,
            tool_calls,
            finish_reason,
        }
    }
}

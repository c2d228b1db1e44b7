use std::collections::VecDeque;
use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::future::{poll_fn, ready};
use std::pin::Pin;
use std::task::{self, Poll, ready};
use std::time::Duration;

use nexus_model::{
    ErrorKind, ModelFinishReason, ModelMessage, ModelProvider,
    ModelProviderError, ModelRequest, ModelResponse, ModelResponseEvent,
    ResponseFormat,
};
use serde_json::json;
use tokio::time::{Sleep, sleep};

#[derive(Debug)]
struct EchoError(ErrorKind);

impl Display for EchoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

impl Error for EchoError {}

impl ModelProviderError for EchoError {
    fn kind(&self) -> ErrorKind {
        self.0
    }
}

/// Streams the last user turn back word by word, or as a JSON object when
/// a response format is requested.
struct EchoResponse {
    words: VecDeque<String>,
    completed: bool,
    sleep: Option<Pin<Box<Sleep>>>,
}

impl ModelResponse for EchoResponse {
    type Error = EchoError;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut task::Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
        // SAFETY: This type does not require to be pinned.
        let this = unsafe { self.get_unchecked_mut() };
        let sleep = this
            .sleep
            .get_or_insert_with(|| Box::pin(sleep(Duration::from_millis(1))));
        ready!(sleep.as_mut().poll(cx));
        this.sleep = None;

        if let Some(mut word) = this.words.pop_front() {
            if !this.words.is_empty() {
                word.push(' ');
            }
            return Poll::Ready(Ok(Some(ModelResponseEvent::MessageDelta(
                word,
            ))));
        }
        if !this.completed {
            this.completed = true;
            return Poll::Ready(Ok(Some(ModelResponseEvent::Completed(
                ModelFinishReason::Stop,
            ))));
        }
        Poll::Ready(Ok(None))
    }
}

struct EchoProvider;

impl ModelProvider for EchoProvider {
    type Error = EchoError;
    type Response = EchoResponse;

    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        let last_user = req.messages.iter().rev().find_map(|msg| match msg {
            ModelMessage::User { content, .. } => Some(content.clone()),
            _ => None,
        });
        let result = match (last_user, &req.response_format) {
            (None, _) => Err(EchoError(ErrorKind::InvalidResponse)),
            (Some(text), Some(_)) => Ok(EchoResponse {
                words: [json!({ "echo": text }).to_string()].into(),
                completed: false,
                sleep: None,
            }),
            (Some(text), None) => Ok(EchoResponse {
                words: format!("You said {text}")
                    .split(' ')
                    .map(ToString::to_string)
                    .collect(),
                completed: false,
                sleep: None,
            }),
        };
        ready(result)
    }
}

async fn collect(mut resp: EchoResponse) -> (String, Option<ModelFinishReason>) {
    let mut text = String::new();
    let mut finish = None;
    loop {
        let event = poll_fn(|cx| Pin::new(&mut resp).poll_next_event(cx))
            .await
            .unwrap();
        match event {
            Some(ModelResponseEvent::MessageDelta(delta)) => {
                text.push_str(&delta)
            }
            Some(ModelResponseEvent::Completed(reason)) => {
                finish = Some(reason)
            }
            Some(event) => unreachable!("unexpected event: {event:?}"),
            None => break,
        }
    }
    (text, finish)
}

#[tokio::test]
async fn test_text_completion() {
    let req = ModelRequest::with_messages([
        ModelMessage::system("Be brief."),
        ModelMessage::user("Good morning"),
    ]);
    let resp = EchoProvider.send_request(&req).await.unwrap();
    let (text, finish) = collect(resp).await;
    assert_eq!(text, "You said Good morning");
    assert_eq!(finish, Some(ModelFinishReason::Stop));
}

#[tokio::test]
async fn test_structured_completion() {
    let mut req =
        ModelRequest::with_messages([ModelMessage::named_user("coder", "391")]);
    req.response_format = Some(ResponseFormat {
        name: "echo".to_owned(),
        schema: json!({ "type": "object" }),
    });
    let resp = EchoProvider.send_request(&req).await.unwrap();
    let (text, _) = collect(resp).await;
    let value: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(value, json!({ "echo": "391" }));
}

#[tokio::test]
async fn test_error() {
    let req = ModelRequest::with_messages([ModelMessage::system("Hi")]);
    let err = EchoProvider.send_request(&req).await.err().unwrap();
    assert_eq!(err.kind(), ErrorKind::InvalidResponse);
    assert!(!err.kind().is_transient());
}

#[test]
fn test_message_content() {
    assert_eq!(ModelMessage::assistant("391").content(), "391");
    let named = ModelMessage::named_user("enhancer", "What is 17 * 23?");
    assert_eq!(
        named,
        ModelMessage::User {
            content: "What is 17 * 23?".to_owned(),
            name: Some("enhancer".to_owned()),
        }
    );
}

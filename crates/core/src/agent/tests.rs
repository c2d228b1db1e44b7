use std::future::ready;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use nexus_model::{ModelMessage, ToolCallResult};
use nexus_test_model::{PresetEvent, PresetResponse, TestModelProvider};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::tool::{Error as ToolError, Tool, ToolResult};
use crate::{AgentBuilder, AgentEvent, Error, RetryPolicy};

#[derive(Deserialize)]
struct EvalInput {
    code: String,
}

/// Pretends to run code: knows a single product.
struct FakeEvalTool {
    schema: Value,
}

impl FakeEvalTool {
    fn new() -> Self {
        Self {
            schema: json!({
                "type": "object",
                "properties": { "code": { "type": "string" } },
                "required": ["code"]
            }),
        }
    }
}

impl Tool for FakeEvalTool {
    type Input = EvalInput;

    fn name(&self) -> &str {
        "python"
    }

    fn description(&self) -> &str {
        "Runs Python code"
    }

    fn parameter_schema(&self) -> &Value {
        &self.schema
    }

    fn execute(
        &self,
        input: Self::Input,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        ready(match input.code.as_str() {
            "print(17 * 23)" => Ok("391\n".to_owned()),
            _ => Err(ToolError::execution_error().with_reason("SyntaxError")),
        })
    }
}

fn quick_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        initial_interval: Duration::from_millis(1),
        max_interval: Duration::from_millis(2),
    }
}

#[tokio::test]
async fn test_answer_without_tools() {
    let model_provider = TestModelProvider::default();
    model_provider.add_response(PresetResponse::with_events([
        PresetEvent::MessageDelta("Paris ".to_owned()),
        PresetEvent::MessageDelta("is the capital.".to_owned()),
    ]));

    let agent = AgentBuilder::with_model_provider(model_provider.clone())
        .with_instructions("You are a researcher.")
        .build();
    let output = agent
        .run(vec![ModelMessage::user("What is the capital of France?")])
        .await
        .unwrap();

    assert_eq!(output.answer, "Paris is the capital.");
    assert_eq!(output.tool_calls, 0);
    assert_eq!(output.transcript.len(), 1);

    let requests = model_provider.requests();
    assert_eq!(
        requests[0].messages[0],
        ModelMessage::system("You are a researcher.")
    );
    assert!(requests[0].tools.is_empty());
}

#[tokio::test]
async fn test_tool_loop() {
    let model_provider = TestModelProvider::default();
    model_provider.add_response(PresetResponse::tool_call(
        "call_0",
        "python",
        json!({ "code": "print(17 * 23)" }),
    ));
    model_provider.add_response(PresetResponse::text("391"));

    let events = Arc::new(Mutex::new(vec![]));
    let agent = AgentBuilder::with_model_provider(model_provider.clone())
        .with_instructions("You are a coder.")
        .with_tool(FakeEvalTool::new())
        .on_event({
            let events = Arc::clone(&events);
            move |event| events.lock().unwrap().push(event)
        })
        .build();
    let output = agent
        .run(vec![ModelMessage::user("What is 17 * 23?")])
        .await
        .unwrap();

    assert_eq!(output.answer, "391");
    assert_eq!(output.tool_calls, 1);
    // Tool call, tool result, answer.
    assert_eq!(output.transcript.len(), 3);

    let requests = model_provider.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].tools[0].name, "python");
    assert_eq!(
        requests[1].messages.last(),
        Some(&ModelMessage::Tool(ToolCallResult {
            id: "call_0".to_owned(),
            content: "391\n".to_owned(),
        }))
    );

    let events = events.lock().unwrap();
    assert!(matches!(events[0], AgentEvent::ToolCall(_)));
    assert!(matches!(events[1], AgentEvent::ToolResult(_)));
    assert!(matches!(&events[2], AgentEvent::Transcript(t) if t == "391"));
}

#[tokio::test]
async fn test_tool_failure_is_fed_back() {
    let model_provider = TestModelProvider::default();
    model_provider.add_response(PresetResponse::tool_call(
        "call_0",
        "python",
        json!({ "code": "17 *" }),
    ));
    model_provider
        .add_response(PresetResponse::text("The code failed to run."));

    let agent = AgentBuilder::with_model_provider(model_provider.clone())
        .with_tool(FakeEvalTool::new())
        .build();
    let output = agent.run(vec![ModelMessage::user("17 *")]).await.unwrap();
    assert_eq!(output.answer, "The code failed to run.");

    let requests = model_provider.requests();
    let last = requests[1].messages.last().unwrap();
    assert_eq!(last.content(), "Error: Execution error: SyntaxError");
}

#[tokio::test]
async fn test_iterations_exhausted() {
    let model_provider = TestModelProvider::default();
    for i in 0..2 {
        model_provider.add_response(PresetResponse::tool_call(
            format!("call_{i}"),
            "python",
            json!({ "code": "print(17 * 23)" }),
        ));
    }

    let agent = AgentBuilder::with_model_provider(model_provider.clone())
        .with_tool(FakeEvalTool::new())
        .max_iterations(2)
        .build();
    let err = agent
        .run(vec![ModelMessage::user("loop forever")])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::IterationsExhausted(2)));
    assert_eq!(model_provider.remaining(), 0);
}

#[tokio::test]
async fn test_transient_failure_is_retried() {
    let model_provider = TestModelProvider::default();
    model_provider.add_response(PresetResponse::text("Paris").with_failures(2));

    let agent = AgentBuilder::with_model_provider(model_provider.clone())
        .retry_policy(quick_retry())
        .build();
    let output = agent.run(vec![ModelMessage::user("Capital?")]).await.unwrap();
    assert_eq!(output.answer, "Paris");
    assert_eq!(model_provider.requests().len(), 3);

    let model_provider = TestModelProvider::default();
    model_provider.add_response(PresetResponse::text("Paris").with_failures(0));
    let agent = AgentBuilder::with_model_provider(model_provider.clone())
        .retry_policy(quick_retry())
        .build();
    let err = agent.run(vec![ModelMessage::user("Capital?")]).await;
    assert!(matches!(err, Err(Error::Model(_))));
    // Permanent provider errors are not retried.
    assert_eq!(model_provider.requests().len(), 1);
}

#[tokio::test]
async fn test_broken_stream_restarts_turn() {
    let model_provider = TestModelProvider::default();
    model_provider.add_response(
        PresetResponse::with_events([
            PresetEvent::MessageDelta("Paris ".to_owned()),
            PresetEvent::MessageDelta("it is.".to_owned()),
        ])
        .with_broken_streams(1),
    );

    let events = Arc::new(Mutex::new(vec![]));
    let agent = AgentBuilder::with_model_provider(model_provider.clone())
        .retry_policy(quick_retry())
        .on_event({
            let events = Arc::clone(&events);
            move |event| events.lock().unwrap().push(event)
        })
        .build();
    let output = agent.run(vec![ModelMessage::user("Capital?")]).await.unwrap();
    assert_eq!(output.answer, "Paris it is.");
    assert_eq!(model_provider.requests().len(), 2);

    // Text before the restart is void, what follows it is the answer.
    let events = events.lock().unwrap();
    let restart = events
        .iter()
        .position(|event| matches!(event, AgentEvent::TurnRestarted))
        .unwrap();
    assert_eq!(restart, 2);
    let after_restart: String = events[restart + 1..]
        .iter()
        .filter_map(|event| match event {
            AgentEvent::Transcript(delta) => Some(delta.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(after_restart, output.answer);
    assert_eq!(
        events
            .iter()
            .filter(|event| matches!(event, AgentEvent::TurnRestarted))
            .count(),
        1
    );
}

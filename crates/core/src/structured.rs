use nexus_model::{ModelMessage, ModelRequest, ResponseFormat};
use schemars::{JsonSchema, schema_for};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{Error, ModelClient};

/// A value the model can be asked to reply with instead of prose.
///
/// The JSON schema of the type is sent along with the request, and the reply
/// is deserialized into the type. Anything that doesn't deserialize is an
/// [`Error::Schema`], so closed enumerations are enforced on receipt.
pub trait StructuredOutput: DeserializeOwned + JsonSchema {
    /// Identifier of the structure, sent to the provider with the schema.
    const NAME: &'static str;
}

impl ModelClient {
    /// Sends `messages` and parses the reply as `T`.
    ///
    /// The schema is both attached as the response format and spelled out
    /// in the instructions, since some providers only guarantee that the
    /// reply is JSON, not that it has the right shape.
    pub async fn request_structured<T: StructuredOutput>(
        &self,
        messages: Vec<ModelMessage>,
    ) -> Result<T, Error> {
        let schema = schema_for!(T).to_value();
        let mut req = ModelRequest::with_messages(with_schema_instructions(
            messages,
            &schema.to_string(),
        ));
        req.response_format = Some(ResponseFormat {
            name: T::NAME.to_owned(),
            schema,
        });

        let resp = self.send_request(req, |_| {}).await?;
        parse_reply(&resp.transcript)
    }
}

fn with_schema_instructions(
    mut messages: Vec<ModelMessage>,
    schema: &str,
) -> Vec<ModelMessage> {
    let instructions = format!(
        "Reply with a single JSON object that conforms to the following \
         JSON schema, and nothing else:\n{schema}"
    );
    match messages.first_mut() {
        Some(ModelMessage::System { content }) => {
            content.push_str("\n\n");
            content.push_str(&instructions);
        }
        _ => messages.insert(0, ModelMessage::system(instructions)),
    }
    messages
}

/// Parses a model reply as `T`.
///
/// Markdown code fences and prose around the JSON object are tolerated,
/// braces in the prose included. The first complete object that
/// deserializes as `T` wins.
pub(crate) fn parse_reply<T: StructuredOutput>(reply: &str) -> Result<T, Error> {
    let trimmed = reply.trim();
    let mut first_err = None;
    for (start, _) in trimmed.match_indices('{') {
        let mut values = serde_json::Deserializer::from_str(&trimmed[start..])
            .into_iter::<Value>();
        let Some(Ok(object @ Value::Object(_))) = values.next() else {
            continue;
        };
        match serde_json::from_value(object) {
            Ok(parsed) => return Ok(parsed),
            Err(err) => {
                first_err.get_or_insert(err);
            }
        }
    }

    let err = match first_err {
        Some(err) => err,
        None => match serde_json::from_str(trimmed) {
            Ok(parsed) => return Ok(parsed),
            Err(err) => err,
        },
    };
    Err(Error::Schema {
        name: T::NAME,
        reason: format!("{err}"),
        reply: reply.to_owned(),
    })
}

#[cfg(test)]
mod tests {
    use nexus_test_model::{PresetResponse, TestModelProvider};
    use serde::Deserialize;
    use serde_json::json;

    use super::*;

    #[derive(Debug, PartialEq, Deserialize, JsonSchema)]
    #[serde(rename_all = "lowercase")]
    enum Color {
        Red,
        Blue,
    }

    #[derive(Debug, PartialEq, Deserialize, JsonSchema)]
    struct Pick {
        color: Color,
        why: String,
    }

    impl StructuredOutput for Pick {
        const NAME: &'static str = "pick";
    }

    #[test]
    fn test_parse_reply() {
        let expected = Pick {
            color: Color::Red,
            why: "warm".to_owned(),
        };
        let plain = r#"{"color": "red", "why": "warm"}"#;
        assert_eq!(parse_reply::<Pick>(plain).unwrap(), expected);

        let fenced = "```json\n{\"color\": \"red\", \"why\": \"warm\"}\n```";
        assert_eq!(parse_reply::<Pick>(fenced).unwrap(), expected);

        let chatty = "Sure! {\"color\": \"red\", \"why\": \"warm\"} Hope it helps.";
        assert_eq!(parse_reply::<Pick>(chatty).unwrap(), expected);

        let braces_after =
            "{\"color\": \"red\", \"why\": \"warm\"}\nI picked {red}.";
        assert_eq!(parse_reply::<Pick>(braces_after).unwrap(), expected);

        let braces_before =
            "Options {red, blue}: {\"color\": \"red\", \"why\": \"warm\"}";
        assert_eq!(parse_reply::<Pick>(braces_before).unwrap(), expected);

        // An object of another shape doesn't shadow the answer.
        let quoted = "You sent {\"q\": 1}, so {\"color\": \"red\", \"why\": \"warm\"}";
        assert_eq!(parse_reply::<Pick>(quoted).unwrap(), expected);
    }

    #[test]
    fn test_reject_outside_enumeration() {
        let err = parse_reply::<Pick>(r#"{"color": "green", "why": "?"}"#)
            .unwrap_err();
        let Error::Schema { name, reply, .. } = &err else {
            panic!("unexpected error: {err:?}");
        };
        assert_eq!(*name, "pick");
        assert!(reply.contains("green"));
        assert!(err.is_retryable());

        assert!(parse_reply::<Pick>("I don't know").is_err());
    }

    #[tokio::test]
    async fn test_request_structured() {
        let provider = TestModelProvider::default();
        provider.add_response(PresetResponse::json(
            json!({ "color": "blue", "why": "calm" }),
        ));
        let client = ModelClient::new(provider.clone());

        let pick: Pick = client
            .request_structured(vec![
                ModelMessage::system("Pick a color."),
                ModelMessage::user("Something calm"),
            ])
            .await
            .unwrap();
        assert_eq!(pick.color, Color::Blue);

        let requests = provider.requests();
        let req = &requests[0];
        let format = req.response_format.as_ref().unwrap();
        assert_eq!(format.name, "pick");
        assert_eq!(req.messages.len(), 2);
        let ModelMessage::System { content } = &req.messages[0] else {
            panic!("expected a system message first");
        };
        assert!(content.starts_with("Pick a color."));
        assert!(content.contains("JSON schema"));
    }
}

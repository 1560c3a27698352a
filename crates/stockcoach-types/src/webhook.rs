//! Wire types for the AI webhook protocol.
//!
//! Request: `POST <webhook_url>` with a JSON [`WebhookRequest`].
//! Response: a JSON object whose content lives in the first present of
//! `response`, `output`, `message`, `content`. Transcription uses a
//! multipart upload and answers with [`TranscriptionReply`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::MalformedResponse;

/// Reply used when the webhook answers 2xx without a recognized content field.
pub const FALLBACK_REPLY: &str =
    "I received your message, but I couldn't put together a response just now. Could you try rephrasing your question?";

/// Reply used when the webhook is unreachable, errors, or times out.
pub const LOST_CONNECTION_REPLY: &str =
    "Sorry, I lost my connection to the market desk for a moment. Please try sending your message again.";

/// JSON body posted to the chat webhook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookRequest {
    pub message: String,
    pub user_id: String,
    pub user_name: String,
    pub user_email: String,
    pub timestamp: DateTime<Utc>,
}

/// Accepted shapes of a chat webhook reply.
///
/// Unknown fields are ignored. Each candidate must be a string when present.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookReply {
    #[serde(default)]
    pub response: Option<String>,
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

impl WebhookReply {
    /// Validate a decoded JSON body into a reply.
    pub fn from_value(value: serde_json::Value) -> Result<Self, MalformedResponse> {
        if !value.is_object() {
            return Err(MalformedResponse::NotAnObject);
        }
        serde_json::from_value(value).map_err(|e| MalformedResponse::InvalidField(e.to_string()))
    }

    /// Resolve the reply content in field priority order.
    pub fn into_content(self) -> Result<String, MalformedResponse> {
        self.response
            .or(self.output)
            .or(self.message)
            .or(self.content)
            .ok_or(MalformedResponse::MissingContent)
    }
}

/// Reply of the transcription webhook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TranscriptionReply {
    Text { text: String },
    Error { error: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_uses_camel_case() {
        let req = WebhookRequest {
            message: "Is AAPL overbought?".to_string(),
            user_id: "u1".to_string(),
            user_name: "Ada".to_string(),
            user_email: "ada@example.com".to_string(),
            timestamp: Utc::now(),
        };
        let value = serde_json::to_value(&req).unwrap();
        for key in ["message", "userId", "userName", "userEmail", "timestamp"] {
            assert!(value.get(key).is_some(), "missing {key}");
        }
    }

    #[test]
    fn test_reply_field_priority() {
        let reply = WebhookReply::from_value(json!({
            "content": "d",
            "message": "c",
            "output": "b",
        }))
        .unwrap();
        assert_eq!(reply.into_content().unwrap(), "b");

        let reply = WebhookReply::from_value(json!({"response": "a", "output": "b"})).unwrap();
        assert_eq!(reply.into_content().unwrap(), "a");
    }

    #[test]
    fn test_reply_without_known_field_is_malformed() {
        let reply = WebhookReply::from_value(json!({"foo": "bar"})).unwrap();
        assert_eq!(
            reply.into_content().unwrap_err(),
            MalformedResponse::MissingContent
        );
    }

    #[test]
    fn test_reply_non_object_is_malformed() {
        let err = WebhookReply::from_value(json!(["response"])).unwrap_err();
        assert_eq!(err, MalformedResponse::NotAnObject);
    }

    #[test]
    fn test_reply_non_string_field_is_malformed() {
        let err = WebhookReply::from_value(json!({"response": 42})).unwrap_err();
        assert!(matches!(err, MalformedResponse::InvalidField(_)));
    }

    #[test]
    fn test_transcription_reply_shapes() {
        let ok: TranscriptionReply = serde_json::from_str(r#"{"text":"buy the dip"}"#).unwrap();
        assert_eq!(
            ok,
            TranscriptionReply::Text {
                text: "buy the dip".to_string()
            }
        );
        let err: TranscriptionReply = serde_json::from_str(r#"{"error":"too long"}"#).unwrap();
        assert!(matches!(err, TranscriptionReply::Error { .. }));
    }
}

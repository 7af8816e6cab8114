//! Messages API request/response types.

use serde::{Deserialize, Serialize};

use framesight_models::NormalizedImage;

/// Request body for `POST /v1/messages`.
#[derive(Debug, Clone, Serialize)]
pub struct MessagesRequest {
    pub model: String,
    pub max_tokens: u32,
    pub system: String,
    pub messages: Vec<Message>,
    pub stream: bool,
}

/// One conversation turn.
#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub role: Role,
    pub content: Vec<ContentBlock>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Message {
    /// User turn: the prompt followed by one block per image.
    pub fn user(prompt: &str, images: &[NormalizedImage]) -> Self {
        let mut content = Vec::with_capacity(images.len() + 1);
        content.push(ContentBlock::Text {
            text: prompt.to_string(),
        });
        content.extend(images.iter().map(|image| ContentBlock::Image {
            source: ImageSourceBlock {
                kind: "base64".to_string(),
                media_type: image.media_type.clone(),
                data: image.data.clone(),
            },
        }));
        Self {
            role: Role::User,
            content,
        }
    }

    /// Assistant prefill turn.
    pub fn assistant(text: &str) -> Self {
        Self {
            role: Role::Assistant,
            content: vec![ContentBlock::Text {
                text: text.to_string(),
            }],
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },
    Image { source: ImageSourceBlock },
}

#[derive(Debug, Clone, Serialize)]
pub struct ImageSourceBlock {
    #[serde(rename = "type")]
    pub kind: String,
    pub media_type: String,
    pub data: String,
}

/// Non-streaming response body.
#[derive(Debug, Clone, Deserialize)]
pub struct MessagesResponse {
    #[serde(default)]
    pub content: Vec<ResponseBlock>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResponseBlock {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: Option<String>,
}

impl MessagesResponse {
    /// Text of the first text block.
    pub fn first_text(&self) -> Option<&str> {
        self.content
            .iter()
            .find(|block| block.kind == "text")
            .and_then(|block| block.text.as_deref())
    }
}

/// Error body returned with non-success statuses and `error` stream events.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorDetail {
    #[serde(rename = "type", default)]
    pub kind: String,
    pub message: String,
}

/// Server-sent event payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    ContentBlockDelta { delta: TextDelta },
    MessageStop,
    Error { error: ApiErrorDetail },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TextDelta {
    #[serde(default)]
    pub text: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_layout() {
        let image = NormalizedImage {
            data: "aGVsbG8=".to_string(),
            media_type: "image/png".to_string(),
            width: 1,
            height: 1,
            estimated_tokens: 0,
        };
        let value = serde_json::to_value(Message::user("describe", &[image])).unwrap();

        assert_eq!(value["role"], "user");
        assert_eq!(value["content"][0]["type"], "text");
        assert_eq!(value["content"][0]["text"], "describe");
        assert_eq!(value["content"][1]["type"], "image");
        assert_eq!(value["content"][1]["source"]["type"], "base64");
        assert_eq!(value["content"][1]["source"]["media_type"], "image/png");
        assert_eq!(value["content"][1]["source"]["data"], "aGVsbG8=");
    }

    #[test]
    fn test_stream_events() {
        let delta: StreamEvent =
            serde_json::from_str(r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Hi"}}"#)
                .unwrap();
        assert!(matches!(delta, StreamEvent::ContentBlockDelta { delta } if delta.text.as_deref() == Some("Hi")));

        let ping: StreamEvent = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert!(matches!(ping, StreamEvent::Other));

        let stop: StreamEvent = serde_json::from_str(r#"{"type":"message_stop"}"#).unwrap();
        assert!(matches!(stop, StreamEvent::MessageStop));
    }
}

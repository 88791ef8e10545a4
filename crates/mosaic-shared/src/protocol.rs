use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::models::Message;

/// Frame pushed by the server on a conversation's live channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LiveEnvelope {
    pub message: Message,
}

impl LiveEnvelope {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// Which listing a publish request goes to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DraftKind {
    Post,
    Reel,
}

/// A finished piece of media ready to be sent as one multipart file part.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaUpload {
    pub file_name: String,
    pub mime: String,
    pub bytes: Bytes,
    pub meta: MediaMeta,
}

/// Per-item metadata sent alongside each file part.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MediaMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trim_start: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trim_end: Option<f64>,
}

/// Content of a post or reel submission.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishDraft {
    pub kind: DraftKind,
    pub content: String,
    pub media: Vec<MediaUpload>,
}

impl PublishDraft {
    /// Text parts of the multipart form, in submission order.
    pub fn text_fields(&self) -> Result<Vec<(String, String)>, serde_json::Error> {
        let mut fields = vec![("content".to_string(), self.content.clone())];
        for (i, upload) in self.media.iter().enumerate() {
            fields.push((format!("media_meta[{i}]"), serde_json::to_string(&upload.meta)?));
        }
        Ok(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MessageId, UserId};
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_envelope_parses_server_frame() {
        let frame = r#"{"message":{"id":3,"sender":1,"receiver":2,"content":"hey","timestamp":"2024-05-01T10:00:00Z"}}"#;
        let env = LiveEnvelope::from_json(frame).unwrap();
        assert_eq!(env.message.id, MessageId(3));
        assert_eq!(env.message.sender, UserId(1));
        assert_eq!(
            env.message.timestamp,
            Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_envelope_rejects_bare_message() {
        let frame = r#"{"id":3,"sender":1,"receiver":2,"content":"hey","timestamp":"2024-05-01T10:00:00Z"}"#;
        assert!(LiveEnvelope::from_json(frame).is_err());
    }

    #[test]
    fn test_text_fields_carry_per_item_meta() {
        let draft = PublishDraft {
            kind: DraftKind::Reel,
            content: "clip".into(),
            media: vec![MediaUpload {
                file_name: "a.mp4".into(),
                mime: "video/mp4".into(),
                bytes: Bytes::from_static(b"\x00\x01"),
                meta: MediaMeta {
                    filter: None,
                    trim_start: Some(1.5),
                    trim_end: Some(4.0),
                },
            }],
        };

        let fields = draft.text_fields().unwrap();
        assert_eq!(fields[0], ("content".into(), "clip".into()));
        assert_eq!(fields[1].0, "media_meta[0]");
        assert_eq!(fields[1].1, r#"{"trim_start":1.5,"trim_end":4.0}"#);
    }
}

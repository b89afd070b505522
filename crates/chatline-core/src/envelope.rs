//! Wire envelope model.
//!
//! Inbound frames are JSON objects of the form
//! `{ id, type, content?, media_url?, author fields..., timestamp? }`.
//! They are classified into messages for the visible list, transient notices,
//! or ignored frames. Outbound frames are either `{ "content": <text> }` or a
//! structured object passed through unchanged.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ChatError;

/// Recognized envelope kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvelopeKind {
    Message,
    Media,
    Join,
    Disconnect,
}

impl EnvelopeKind {
    pub fn from_wire(raw: &str) -> Option<Self> {
        match raw {
            "message" => Some(Self::Message),
            "media" => Some(Self::Media),
            "join" => Some(Self::Join),
            "disconnect" => Some(Self::Disconnect),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::Media => "media",
            Self::Join => "join",
            Self::Disconnect => "disconnect",
        }
    }

    /// Kinds that carry a dedup identifier and belong in the visible list.
    pub fn is_identified(self) -> bool {
        matches!(self, Self::Message | Self::Media)
    }
}

impl fmt::Display for EnvelopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub id: Option<String>,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
}

/// Entry of the application's visible message list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub kind: EnvelopeKind,
    pub content: String,
    pub media_url: Option<String>,
    pub author: Author,
    pub timestamp: Option<DateTime<Utc>>,
}

/// Transient `join`/`disconnect` notification. Never deduplicated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub kind: EnvelopeKind,
    pub author: Author,
    pub content: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnoreReason {
    MissingKind,
    UnknownKind(String),
    MissingId(EnvelopeKind),
}

impl fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingKind => f.write_str("envelope has no type"),
            Self::UnknownKind(kind) => write!(f, "unrecognized envelope type {kind:?}"),
            Self::MissingId(kind) => write!(f, "{kind} envelope has no id"),
        }
    }
}

/// Result of classifying one inbound envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Visible(ChatMessage),
    Notice(Notice),
    Ignored(IgnoreReason),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WireAuthor {
    pub id: Option<Value>,
    #[serde(alias = "username")]
    pub name: Option<String>,
    #[serde(alias = "avatar")]
    pub avatar_url: Option<String>,
}

/// Inbound envelope exactly as it appears on the wire.
///
/// Identifiers may be strings or numbers; author metadata may be flat
/// (`author_id`, `author_name`, `author_avatar`) or nested under `author`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WireEnvelope {
    pub id: Option<Value>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub content: Option<String>,
    pub media_url: Option<String>,
    pub author_id: Option<Value>,
    #[serde(alias = "username")]
    pub author_name: Option<String>,
    pub author_avatar: Option<String>,
    pub author: Option<WireAuthor>,
    #[serde(alias = "created_at")]
    pub timestamp: Option<Value>,
}

impl WireEnvelope {
    pub fn classify(self) -> Inbound {
        let WireEnvelope {
            id,
            kind,
            content,
            media_url,
            author_id,
            author_name,
            author_avatar,
            author,
            timestamp,
        } = self;

        let media_url = media_url.filter(|url| !url.trim().is_empty());
        let kind = if media_url.is_some() {
            EnvelopeKind::Media
        } else {
            match kind.as_deref().map(str::trim).filter(|k| !k.is_empty()) {
                None => return Inbound::Ignored(IgnoreReason::MissingKind),
                Some(raw) => match EnvelopeKind::from_wire(raw) {
                    Some(kind) => kind,
                    None => return Inbound::Ignored(IgnoreReason::UnknownKind(raw.to_string())),
                },
            }
        };

        let nested = author.unwrap_or_default();
        let author = Author {
            id: author_id
                .as_ref()
                .and_then(id_string)
                .or_else(|| nested.id.as_ref().and_then(id_string)),
            name: author_name.or(nested.name),
            avatar_url: author_avatar.or(nested.avatar_url),
        };

        if !kind.is_identified() {
            return Inbound::Notice(Notice {
                kind,
                author,
                content,
            });
        }

        let Some(id) = id.as_ref().and_then(id_string) else {
            return Inbound::Ignored(IgnoreReason::MissingId(kind));
        };
        Inbound::Visible(ChatMessage {
            id,
            kind,
            content: content.unwrap_or_default(),
            media_url,
            author,
            timestamp: timestamp.as_ref().and_then(parse_timestamp),
        })
    }
}

fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Number(n) => n.as_i64().and_then(DateTime::<Utc>::from_timestamp_millis),
        _ => None,
    }
}

/// Parses and classifies one inbound text frame.
pub fn parse_inbound(text: &str) -> Result<Inbound, ChatError> {
    let value: Value =
        serde_json::from_str(text).map_err(|err| ChatError::MalformedEnvelope(err.to_string()))?;
    classify_value(value)
}

/// Classifies an already-decoded JSON value (e.g. one item of a history page).
pub fn classify_value(value: Value) -> Result<Inbound, ChatError> {
    if !value.is_object() {
        return Err(ChatError::MalformedEnvelope(
            "expected a JSON object".to_string(),
        ));
    }
    let wire: WireEnvelope = serde_json::from_value(value)
        .map_err(|err| ChatError::MalformedEnvelope(err.to_string()))?;
    Ok(wire.classify())
}

/// Payload accepted by the send gateway.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundPayload {
    /// Plain text, wrapped as `{ "content": ... }`.
    Text(String),
    /// Structured object written as-is.
    Structured(Map<String, Value>),
}

#[derive(Serialize)]
struct ContentFrame<'a> {
    content: &'a str,
}

#[derive(Serialize)]
struct AuthFrame<'a> {
    token: &'a str,
}

impl OutboundPayload {
    pub fn text(content: impl Into<String>) -> Self {
        Self::Text(content.into())
    }

    pub fn to_frame(&self) -> Result<String, ChatError> {
        let encoded = match self {
            Self::Text(content) => serde_json::to_string(&ContentFrame { content }),
            Self::Structured(object) => serde_json::to_string(object),
        };
        encoded.map_err(|err| ChatError::Encode(err.to_string()))
    }
}

impl From<&str> for OutboundPayload {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for OutboundPayload {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Map<String, Value>> for OutboundPayload {
    fn from(value: Map<String, Value>) -> Self {
        Self::Structured(value)
    }
}

impl TryFrom<Value> for OutboundPayload {
    type Error = ChatError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::String(text) => Ok(Self::Text(text)),
            Value::Object(object) => Ok(Self::Structured(object)),
            other => Err(ChatError::Encode(format!(
                "payload must be a string or an object, got {other}"
            ))),
        }
    }
}

/// The single authentication frame sent right after the transport opens.
pub fn auth_frame(token: &str) -> Result<String, ChatError> {
    serde_json::to_string(&AuthFrame { token }).map_err(|err| ChatError::Encode(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn visible(text: &str) -> ChatMessage {
        match parse_inbound(text).expect("frame should parse") {
            Inbound::Visible(message) => message,
            other => panic!("expected visible message, got {other:?}"),
        }
    }

    #[test]
    fn parses_plain_message() {
        let message = visible(
            r#"{"id":"m1","type":"message","content":"hi","author_id":"u1","author_name":"ada","timestamp":"2025-01-01T10:00:00Z"}"#,
        );
        assert_eq!(message.id, "m1");
        assert_eq!(message.kind, EnvelopeKind::Message);
        assert_eq!(message.content, "hi");
        assert_eq!(message.author.id.as_deref(), Some("u1"));
        assert_eq!(message.author.name.as_deref(), Some("ada"));
        assert_eq!(
            message.timestamp.map(|t| t.to_rfc3339()),
            Some("2025-01-01T10:00:00+00:00".to_string())
        );
    }

    #[test]
    fn media_reference_wins_over_reported_kind() {
        let message = visible(r#"{"id":"m2","type":"message","media_url":"https://cdn/x.png"}"#);
        assert_eq!(message.kind, EnvelopeKind::Media);
        assert_eq!(message.media_url.as_deref(), Some("https://cdn/x.png"));

        let message = visible(r#"{"id":"m3","type":"join","media_url":"https://cdn/y.gif"}"#);
        assert_eq!(message.kind, EnvelopeKind::Media);
    }

    #[test]
    fn blank_media_url_does_not_normalize() {
        let message = visible(r#"{"id":"m4","type":"message","content":"x","media_url":"  "}"#);
        assert_eq!(message.kind, EnvelopeKind::Message);
        assert_eq!(message.media_url, None);
    }

    #[test]
    fn numeric_ids_and_nested_author_are_accepted() {
        let message = visible(
            r#"{"id":42,"type":"message","content":"n","author":{"id":7,"username":"bob","avatar":"a.png"},"created_at":1735725600000}"#,
        );
        assert_eq!(message.id, "42");
        assert_eq!(message.author.id.as_deref(), Some("7"));
        assert_eq!(message.author.name.as_deref(), Some("bob"));
        assert_eq!(message.author.avatar_url.as_deref(), Some("a.png"));
        assert!(message.timestamp.is_some());
    }

    #[test]
    fn unparsable_timestamp_is_dropped_not_fatal() {
        let message = visible(r#"{"id":"m5","type":"message","timestamp":"yesterday"}"#);
        assert_eq!(message.timestamp, None);
    }

    #[test]
    fn join_and_disconnect_are_notices() {
        let inbound = parse_inbound(r#"{"type":"join","author_name":"eve"}"#).expect("parse");
        match inbound {
            Inbound::Notice(notice) => {
                assert_eq!(notice.kind, EnvelopeKind::Join);
                assert_eq!(notice.author.name.as_deref(), Some("eve"));
            }
            other => panic!("expected notice, got {other:?}"),
        }
        assert!(matches!(
            parse_inbound(r#"{"id":"x","type":"disconnect"}"#),
            Ok(Inbound::Notice(_))
        ));
    }

    #[test]
    fn unknown_and_unidentified_envelopes_are_ignored() {
        assert_eq!(
            parse_inbound(r#"{"id":"t","type":"typing"}"#).expect("parse"),
            Inbound::Ignored(IgnoreReason::UnknownKind("typing".into()))
        );
        assert_eq!(
            parse_inbound(r#"{"content":"no type"}"#).expect("parse"),
            Inbound::Ignored(IgnoreReason::MissingKind)
        );
        assert_eq!(
            parse_inbound(r#"{"type":"message","content":"no id"}"#).expect("parse"),
            Inbound::Ignored(IgnoreReason::MissingId(EnvelopeKind::Message))
        );
        assert_eq!(
            parse_inbound(r#"{"id":"","type":"message"}"#).expect("parse"),
            Inbound::Ignored(IgnoreReason::MissingId(EnvelopeKind::Message))
        );
    }

    #[test]
    fn malformed_frames_are_errors() {
        for text in ["not json", "[1,2]", "\"str\"", r#"{"id":"x","type":"message","content":5}"#]
        {
            assert!(
                matches!(parse_inbound(text), Err(ChatError::MalformedEnvelope(_))),
                "{text} should be malformed"
            );
        }
    }

    #[test]
    fn text_payload_is_wrapped_as_content() {
        let frame = OutboundPayload::from("hello \"world\"")
            .to_frame()
            .expect("encode");
        let decoded: Value = serde_json::from_str(&frame).expect("json");
        assert_eq!(decoded, json!({ "content": "hello \"world\"" }));
    }

    #[test]
    fn structured_payload_passes_through() {
        let payload = OutboundPayload::try_from(json!({ "type": "media", "media_url": "u" }))
            .expect("object payload");
        let decoded: Value = serde_json::from_str(&payload.to_frame().expect("encode")).expect("json");
        assert_eq!(decoded, json!({ "type": "media", "media_url": "u" }));
    }

    #[test]
    fn non_object_structured_payload_is_rejected() {
        assert!(OutboundPayload::try_from(json!([1, 2])).is_err());
        assert_eq!(
            OutboundPayload::try_from(json!("plain")).expect("string payload"),
            OutboundPayload::Text("plain".into())
        );
    }

    #[test]
    fn auth_frame_carries_token_only() {
        let decoded: Value =
            serde_json::from_str(&auth_frame("secret").expect("encode")).expect("json");
        assert_eq!(decoded, json!({ "token": "secret" }));
    }
}

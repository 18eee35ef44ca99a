//! Wire records: the newline-delimited JSON schema turnpost consumes.
//!
//! Each line is an [`Envelope`]:
//!
//! ```json
//! {"type": "assistant", "message": {...}, "session_id": "..."}
//! ```
//!
//! The `message` payload stays raw until the envelope's `type` is known,
//! because its shape depends on it. Decoding is strict about JSON syntax and
//! lenient about shape: absent or `null` fields become empty values, unknown
//! fields and unknown content tags are ignored. The envelope, the payload and
//! every content item must be JSON objects.

use serde::de::{DeserializeOwned, Error as _, Unexpected};
use serde::{Deserialize, Deserializer};
use serde_json::value::RawValue;

use crate::error::DecodeError;

/// Record kind carrying an [`AssistantPayload`].
pub const KIND_ASSISTANT: &str = "assistant";
/// Record kind carrying a [`UserPayload`].
pub const KIND_USER: &str = "user";

/// Outer wrapper of every input line.
#[derive(Debug, Deserialize)]
pub struct Envelope {
    /// Record kind (`"assistant"`, `"user"`, or anything else).
    #[serde(rename = "type", default, deserialize_with = "nullable")]
    pub kind: String,

    /// Undecoded payload; its schema depends on `kind`. `None` only when
    /// the field is absent; an explicit `null` is kept as raw `null`.
    #[serde(rename = "message", default, deserialize_with = "present")]
    pub payload: Option<Box<RawValue>>,

    #[serde(default, deserialize_with = "nullable")]
    pub session_id: String,
}

/// An assistant turn.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssistantPayload {
    #[serde(default, deserialize_with = "nullable")]
    pub id: String,
    #[serde(rename = "type", default, deserialize_with = "nullable")]
    pub message_type: String,
    #[serde(default, deserialize_with = "nullable")]
    pub role: String,
    #[serde(default, deserialize_with = "nullable")]
    pub model: String,
    #[serde(default, deserialize_with = "nullable")]
    pub content: Vec<ContentItem>,
    #[serde(default, deserialize_with = "nullable")]
    pub stop_reason: String,
}

/// A user turn. In practice this mostly carries tool results.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserPayload {
    #[serde(default, deserialize_with = "nullable")]
    pub role: String,
    #[serde(default, deserialize_with = "nullable")]
    pub content: Vec<ContentItem>,
}

/// One unit of a turn's content.
#[derive(Debug, Clone)]
pub enum ContentItem {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        /// Tool input exactly as it appeared on the wire.
        input: Option<Box<RawValue>>,
    },
    ToolResult {
        tool_use_id: String,
        /// Tool output flattened to text.
        content: String,
    },
    /// Any tag we do not render (`thinking`, `image`, ...).
    Other {
        kind: String,
    },
}

/// Flat wire shape of a content item; every field is optional and only the
/// ones relevant to `type` are read.
#[derive(Deserialize)]
struct WireContentItem {
    #[serde(rename = "type", default, deserialize_with = "nullable")]
    kind: String,
    #[serde(default, deserialize_with = "nullable")]
    text: String,
    #[serde(default, deserialize_with = "nullable")]
    id: String,
    #[serde(default, deserialize_with = "nullable")]
    name: String,
    #[serde(default)]
    input: Option<Box<RawValue>>,
    #[serde(default)]
    content: Option<serde_json::Value>,
    #[serde(default, deserialize_with = "nullable")]
    tool_use_id: String,
}

impl<'de> Deserialize<'de> for ContentItem {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Box::<RawValue>::deserialize(deserializer)?;
        from_object::<WireContentItem>(&raw)
            .map(Self::from)
            .map_err(D::Error::custom)
    }
}

impl From<WireContentItem> for ContentItem {
    fn from(wire: WireContentItem) -> Self {
        match wire.kind.as_str() {
            "text" => ContentItem::Text { text: wire.text },
            "tool_use" => ContentItem::ToolUse {
                id: wire.id,
                name: wire.name,
                input: wire.input,
            },
            "tool_result" => ContentItem::ToolResult {
                tool_use_id: wire.tool_use_id,
                content: wire.content.map(flatten_tool_output).unwrap_or_default(),
            },
            _ => ContentItem::Other { kind: wire.kind },
        }
    }
}

/// Flatten a `tool_result` content value to plain text.
///
/// Claude emits either a bare string or a list of content blocks; text blocks
/// are joined with newlines and other blocks are skipped. Any other JSON
/// value is kept as compact JSON.
pub fn flatten_tool_output(value: serde_json::Value) -> String {
    use serde_json::Value;

    match value {
        Value::Null => String::new(),
        Value::String(s) => s,
        Value::Array(blocks) => blocks
            .iter()
            .filter_map(|block| match block {
                Value::String(s) => Some(s.as_str()),
                Value::Object(map) if map.get("type").and_then(Value::as_str) == Some("text") => {
                    map.get("text").and_then(Value::as_str)
                }
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n"),
        other => other.to_string(),
    }
}

/// A decoded, typed record.
#[derive(Debug, Clone)]
pub enum Record {
    Assistant(AssistantPayload),
    User(UserPayload),
    /// A record kind turnpost does not act on (`system`, `result`, ...).
    Ignored { kind: String },
}

impl Record {
    /// Content items of the record; empty for ignored kinds.
    pub fn content(&self) -> &[ContentItem] {
        match self {
            Record::Assistant(payload) => &payload.content,
            Record::User(payload) => &payload.content,
            Record::Ignored { .. } => &[],
        }
    }

    pub fn kind(&self) -> &str {
        match self {
            Record::Assistant(_) => KIND_ASSISTANT,
            Record::User(_) => KIND_USER,
            Record::Ignored { kind } => kind,
        }
    }
}

/// A record together with the session it belongs to.
#[derive(Debug, Clone)]
pub struct DecodedRecord {
    pub session_id: String,
    pub record: Record,
}

impl Envelope {
    /// Parse the envelope of one line.
    pub fn parse(line: &str) -> Result<Self, DecodeError> {
        serde_json::from_str::<&RawValue>(line)
            .and_then(from_object::<Self>)
            .map_err(DecodeError::Envelope)
    }

    /// Decode the payload according to `kind`.
    pub fn into_record(self) -> Result<DecodedRecord, DecodeError> {
        let record = match self.kind.as_str() {
            KIND_ASSISTANT => Record::Assistant(decode_payload(&self.kind, self.payload.as_deref())?),
            KIND_USER => Record::User(decode_payload(&self.kind, self.payload.as_deref())?),
            _ => Record::Ignored { kind: self.kind },
        };
        Ok(DecodedRecord {
            session_id: self.session_id,
            record,
        })
    }
}

/// Decode one framed line into a typed record.
pub fn decode_record(frame: &[u8]) -> Result<DecodedRecord, DecodeError> {
    let line = std::str::from_utf8(frame)?;
    Envelope::parse(line)?.into_record()
}

fn decode_payload<T>(kind: &str, payload: Option<&RawValue>) -> Result<T, DecodeError>
where
    T: DeserializeOwned + Default,
{
    let raw = payload.ok_or_else(|| DecodeError::MissingPayload { kind: kind.into() })?;
    if raw.get() == "null" {
        return Ok(T::default());
    }
    from_object(raw).map_err(|source| DecodeError::Payload {
        kind: kind.into(),
        source,
    })
}

/// Derived struct decoders also accept arrays; only objects are records.
fn from_object<T: DeserializeOwned>(raw: &RawValue) -> Result<T, serde_json::Error> {
    let json = raw.get();
    let found = match json.as_bytes().first() {
        Some(b'{') => return serde_json::from_str(json),
        Some(b'[') => Unexpected::Seq,
        Some(b'"') => Unexpected::Other("string"),
        Some(b'n') => Unexpected::Unit,
        Some(b't' | b'f') => Unexpected::Other("boolean"),
        _ => Unexpected::Other("number"),
    };
    Err(serde_json::Error::invalid_type(found, &"a JSON object"))
}

/// Keep an explicit `null` as a raw value so it can be told apart from an
/// absent field.
fn present<'de, D>(deserializer: D) -> Result<Option<Box<RawValue>>, D::Error>
where
    D: Deserializer<'de>,
{
    Box::<RawValue>::deserialize(deserializer).map(Some)
}

/// Treat an explicit `null` the same as an absent field.
fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A server-side conversation container.
///
/// Timestamps arrive as milliseconds since the epoch. The wire names are the
/// snake_case ones the thread service emits; camelCase spellings are accepted
/// too so a proxy that re-cases keys still decodes.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Thread {
    #[serde(rename = "thread_id", alias = "threadId", alias = "id", deserialize_with = "id_string")]
    pub id: String,
    #[serde(
        rename = "thread_name",
        alias = "threadName",
        alias = "name",
        default,
        deserialize_with = "null_as_default"
    )]
    pub name: String,
    #[serde(
        rename = "created_on",
        alias = "createdOn",
        alias = "createdAt",
        default,
        serialize_with = "chrono::serde::ts_milliseconds::serialize",
        deserialize_with = "nullable_millis"
    )]
    pub created_at: DateTime<Utc>,
    #[serde(
        rename = "updated_on",
        alias = "updatedOn",
        alias = "updatedAt",
        default,
        serialize_with = "chrono::serde::ts_milliseconds::serialize",
        deserialize_with = "nullable_millis"
    )]
    pub updated_at: DateTime<Utc>,
    #[serde(
        rename = "origin_application",
        alias = "originApplication",
        default,
        deserialize_with = "null_as_default"
    )]
    pub origin_application: String,
}

/// Reads an optional field where an explicit `null` means the same as a
/// missing key.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Millisecond timestamps; `null` decodes to the epoch.
fn nullable_millis<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match Option::<i64>::deserialize(deserializer)? {
        Some(ms) => DateTime::from_timestamp_millis(ms)
            .ok_or_else(|| serde::de::Error::custom(format!("timestamp out of range: {ms}"))),
        None => Ok(DateTime::default()),
    }
}

/// Thread ids are opaque: some deployments send them as numbers.
fn id_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected a thread id, got {other}"
        ))),
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A stored message, as read back from the thread service.
///
/// `payload` is kept raw here; `cortex::payload` turns it into
/// [`ContentBlock`]s when a message is replayed.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Message {
    #[serde(rename = "message_id", alias = "messageId", alias = "id")]
    pub id: i64,
    pub role: Role,
    #[serde(rename = "message_payload", alias = "messagePayload", alias = "payload", default)]
    pub payload: Value,
    #[serde(
        rename = "created_on",
        alias = "createdOn",
        alias = "createdAt",
        default,
        serialize_with = "chrono::serde::ts_milliseconds::serialize",
        deserialize_with = "nullable_millis"
    )]
    pub created_at: DateTime<Utc>,
}

/// Result of the get-thread call.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ThreadMessages {
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub metadata: Value,
}

/// A citation tied to a character offset in a text block.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    /// 1-based, sequential within one response.
    pub number: usize,
    pub document_ref: String,
    /// Character offset into the paired text. Not trusted; see
    /// `payload::annotate_text` for the clamp policy.
    pub position: i64,
}

/// A table decoded from a result set. Rows keep column order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<serde_json::Map<String, Value>>,
}

/// One typed unit of a message payload.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentBlock {
    Text {
        text: String,
        annotations: Vec<Annotation>,
    },
    Table(Table),
    Chart {
        spec: Value,
    },
    Annotations {
        items: Vec<Annotation>,
    },
}

/// The document a streamed citation points to.
#[derive(Deserialize, Debug, Clone, PartialEq, Default)]
pub struct CitedDocument {
    #[serde(
        alias = "docId",
        alias = "documentRef",
        default,
        deserialize_with = "null_as_default"
    )]
    pub doc_id: String,
    #[serde(alias = "docTitle", default)]
    pub doc_title: Option<String>,
    /// Offset into the response text, when the service supplies one.
    #[serde(default)]
    pub index: Option<i64>,
}

/// A decoded agent stream event.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    ThinkingDelta { text: String },
    TextDelta { text: String },
    TextAnnotation { annotation: CitedDocument, index: i64 },
}

/// One `(is_final, content)` pair handed to the renderer while streaming.
///
/// `is_final == false` marks thinking text (transient status); `true` marks
/// response text or a citation appended to the running text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderChunk {
    pub is_final: bool,
    pub content: String,
}

impl RenderChunk {
    pub fn thinking(content: impl Into<String>) -> Self {
        Self {
            is_final: false,
            content: content.into(),
        }
    }

    pub fn text(content: impl Into<String>) -> Self {
        Self {
            is_final: true,
            content: content.into(),
        }
    }
}

//! Historical message payloads.
//!
//! Stored messages carry a `message_payload` whose `content` array holds
//! typed items. This module decodes those items into [`ContentBlock`]s for
//! replay. The payload usually arrives as a JSON *string*; an already
//! decoded object is accepted too.
//!
//! ```json
//! {"content": [
//!   {"type": "text", "text": "...", "annotations": [{"doc_id": "...", "index": 12}]},
//!   {"type": "table", "table": {"result_set": {"data": [[..]], "resultSetMetaData": {"rowType": [{"name": ".."}]}}}},
//!   {"type": "chart", "chart": {"chart_spec": "{...vega-lite...}"}},
//!   {"type": "tool_use", ...}
//! ]}
//! ```

use log::{debug, warn};
use serde::Deserialize;
use serde_json::Value;

use crate::cortex::assembler::format_citation;
use crate::cortex::types::null_as_default;
use crate::cortex::{Annotation, ContentBlock, Message, Role, Table};

// ============================================================================
// Payload Wire Types
// ============================================================================

/// One item of a payload's `content` array.
#[derive(Deserialize, Debug)]
#[serde(tag = "type", rename_all = "lowercase")]
enum PayloadItem {
    Text {
        #[serde(default, deserialize_with = "null_as_default")]
        text: String,
        #[serde(default, deserialize_with = "null_as_default")]
        annotations: Vec<RawAnnotation>,
    },
    Table {
        table: RawTable,
    },
    Chart {
        chart: RawChart,
    },
    Annotations {
        #[serde(default, deserialize_with = "null_as_default")]
        annotations: Vec<RawAnnotation>,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Deserialize, Debug)]
struct RawAnnotation {
    #[serde(
        alias = "docId",
        alias = "documentRef",
        default,
        deserialize_with = "null_as_default"
    )]
    doc_id: String,
    /// Untrusted; a `null` offset lands at the start of the text.
    #[serde(alias = "position", default, deserialize_with = "null_as_default")]
    index: i64,
}

#[derive(Deserialize, Debug)]
struct RawTable {
    #[serde(alias = "resultSet")]
    result_set: ResultSet,
}

#[derive(Deserialize, Debug)]
struct ResultSet {
    #[serde(default)]
    data: Vec<Vec<Value>>,
    #[serde(rename = "resultSetMetaData", alias = "result_set_meta_data")]
    meta: ResultSetMeta,
}

#[derive(Deserialize, Debug)]
struct ResultSetMeta {
    #[serde(rename = "rowType", alias = "row_type", default)]
    row_type: Vec<ColumnMeta>,
}

#[derive(Deserialize, Debug)]
struct ColumnMeta {
    name: String,
}

#[derive(Deserialize, Debug)]
struct RawChart {
    #[serde(alias = "chartSpec")]
    chart_spec: Value,
}

// ============================================================================
// Decoding
// ============================================================================

/// Returns the `content` array of a payload, decoding a string payload first.
fn content_items(payload: &Value) -> Vec<Value> {
    let decoded;
    let payload = match payload {
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(v) => {
                decoded = v;
                &decoded
            }
            Err(e) => {
                warn!("Message payload is not valid JSON: {}", e);
                return Vec::new();
            }
        },
        other => other,
    };

    match payload.get("content") {
        Some(Value::Array(items)) => items.clone(),
        _ => {
            debug!("Message payload has no content array");
            Vec::new()
        }
    }
}

fn number_annotations(raw: Vec<RawAnnotation>) -> Vec<Annotation> {
    raw.into_iter()
        .enumerate()
        .map(|(i, a)| Annotation {
            number: i + 1,
            document_ref: a.doc_id,
            position: a.index,
        })
        .collect()
}

/// Builds a table whose rows follow the metadata column order exactly.
/// Short rows are padded with nulls; extra cells are dropped.
fn build_table(raw: RawTable) -> Table {
    let columns: Vec<String> = raw
        .result_set
        .meta
        .row_type
        .into_iter()
        .map(|c| c.name)
        .collect();

    let rows = raw
        .result_set
        .data
        .into_iter()
        .map(|cells| {
            let mut cells = cells.into_iter();
            columns
                .iter()
                .map(|col| (col.clone(), cells.next().unwrap_or(Value::Null)))
                .collect()
        })
        .collect();

    Table { columns, rows }
}

fn chart_spec(raw: RawChart) -> Value {
    match raw.chart_spec {
        Value::String(s) => serde_json::from_str(&s).unwrap_or(Value::String(s)),
        other => other,
    }
}

fn decode_item(item: PayloadItem) -> Option<ContentBlock> {
    match item {
        PayloadItem::Text { text, annotations } => Some(ContentBlock::Text {
            text,
            annotations: number_annotations(annotations),
        }),
        PayloadItem::Table { table } => Some(ContentBlock::Table(build_table(table))),
        PayloadItem::Chart { chart } => Some(ContentBlock::Chart {
            spec: chart_spec(chart),
        }),
        PayloadItem::Annotations { annotations } => Some(ContentBlock::Annotations {
            items: number_annotations(annotations),
        }),
        PayloadItem::Unknown => None,
    }
}

/// Decodes a raw payload into content blocks, in payload order.
///
/// Items of unknown type are dropped; malformed items are skipped with a
/// warning instead of failing the whole message.
pub fn parse_payload(payload: &Value) -> Vec<ContentBlock> {
    content_items(payload)
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<PayloadItem>(item) {
            Ok(item) => decode_item(item),
            Err(e) => {
                warn!("Skipping malformed payload item: {}", e);
                None
            }
        })
        .collect()
}

/// Decodes a stored message. User turns only keep their text.
pub fn message_blocks(message: &Message) -> Vec<ContentBlock> {
    let blocks = parse_payload(&message.payload);
    match message.role {
        Role::User => blocks
            .into_iter()
            .filter(|b| matches!(b, ContentBlock::Text { .. }))
            .collect(),
        Role::Assistant => blocks,
    }
}

// ============================================================================
// Annotated Text
// ============================================================================

/// Inserts citation markers into `text` at each annotation's position.
///
/// Positions count characters. Anything past the end is clamped to the end
/// and negative positions to the start; markers sharing a position keep
/// ascending number order.
pub fn annotate_text(text: &str, annotations: &[Annotation]) -> String {
    if annotations.is_empty() {
        return text.to_string();
    }

    let char_len = text.chars().count();
    let mut placed: Vec<(usize, &Annotation)> = annotations
        .iter()
        .map(|a| (a.position.clamp(0, char_len as i64) as usize, a))
        .collect();
    placed.sort_by_key(|(pos, a)| (*pos, a.number));

    let mut out = String::with_capacity(text.len() + annotations.len() * 8);
    let mut markers = placed.into_iter().peekable();
    for (i, ch) in text.chars().enumerate() {
        while let Some((_, a)) = markers.next_if(|(pos, _)| *pos == i) {
            out.push_str(&format_citation(a.number, &a.document_ref));
        }
        out.push(ch);
    }
    for (_, a) in markers {
        out.push_str(&format_citation(a.number, &a.document_ref));
    }
    out
}

// ============================================================================
// Renderer Dispatch
// ============================================================================

/// A sink for historical content blocks, one method per block kind.
pub trait BlockRenderer {
    fn text(&mut self, text: &str, annotations: &[Annotation]);
    fn table(&mut self, table: &Table);
    fn chart(&mut self, spec: &Value);
    fn annotations(&mut self, items: &[Annotation]);
}

/// Dispatches one block to the matching renderer method.
pub fn render_block<R: BlockRenderer + ?Sized>(renderer: &mut R, block: &ContentBlock) {
    match block {
        ContentBlock::Text { text, annotations } => renderer.text(text, annotations),
        ContentBlock::Table(table) => renderer.table(table),
        ContentBlock::Chart { spec } => renderer.chart(spec),
        ContentBlock::Annotations { items } => renderer.annotations(items),
    }
}

//! Live response assembly.
//!
//! Maps each [`StreamEvent`] to exactly one [`RenderChunk`], in arrival order:
//!
//! ```text
//! ThinkingDelta(t)   → (false, t)
//! TextDelta(t)       → (true,  t)
//! TextAnnotation(a)  → (true,  " [n](doc) ")   n = 1, 2, 3 … per assembler
//! ```
//!
//! Nothing is buffered or reordered. The assembler also keeps the final text
//! it has emitted so far, so the caller can show the finished message without
//! re-concatenating.

use log::debug;

use crate::cortex::{Annotation, RenderChunk, StreamEvent};

/// Formats a citation marker for annotation `number` pointing at `document_ref`.
///
/// The position is not part of the marker: it is where the marker is
/// inserted, and it stays available through [`ResponseAssembler::annotations`].
pub fn format_citation(number: usize, document_ref: &str) -> String {
    format!(" [{number}]({document_ref}) ")
}

#[derive(Debug, Default)]
pub struct ResponseAssembler {
    annotations: Vec<Annotation>,
    text: String,
    text_chars: usize,
}

impl ResponseAssembler {
    /// A fresh assembler; the annotation counter starts at 1.
    pub fn new() -> Self {
        Self::default()
    }

    /// Classifies one event and returns the chunk to render.
    pub fn push(&mut self, event: StreamEvent) -> RenderChunk {
        match event {
            StreamEvent::ThinkingDelta { text } => RenderChunk::thinking(text),
            StreamEvent::TextDelta { text } => {
                self.append(&text);
                RenderChunk::text(text)
            }
            StreamEvent::TextAnnotation { annotation, index } => {
                let number = self.annotations.len() + 1;
                let position = annotation.index.unwrap_or(self.text_chars as i64);
                debug!(
                    "Annotation #{} (service index {}) -> {} at {}",
                    number, index, annotation.doc_id, position
                );
                let citation = format_citation(number, &annotation.doc_id);
                self.annotations.push(Annotation {
                    number,
                    document_ref: annotation.doc_id,
                    position,
                });
                self.append(&citation);
                RenderChunk::text(citation)
            }
        }
    }

    /// Final text emitted so far, citations included.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    fn append(&mut self, s: &str) {
        self.text.push_str(s);
        self.text_chars += s.chars().count();
    }
}

/// Runs a whole event sequence through a fresh assembler.
pub fn assemble(events: impl IntoIterator<Item = StreamEvent>) -> Vec<RenderChunk> {
    let mut assembler = ResponseAssembler::new();
    events.into_iter().map(|e| assembler.push(e)).collect()
}

/// Concatenates the final (non-thinking) chunks.
pub fn final_text(chunks: &[RenderChunk]) -> String {
    chunks
        .iter()
        .filter(|c| c.is_final)
        .map(|c| c.content.as_str())
        .collect()
}

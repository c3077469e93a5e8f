//! Agent-run client.
//!
//! Opens one streaming POST per turn and decodes the SSE body into
//! [`StreamEvent`]s. Only three event types matter:
//! - `response.thinking.delta` → thinking text
//! - `response.text.delta`     → response text
//! - `response.text.annotation` → a citation
//!
//! Everything else (status, tool, metadata events) is skipped so newer
//! service versions don't break older clients.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::Sender;
use tokio_util::sync::CancellationToken;

use crate::core::config::Endpoints;
use crate::cortex::sse::{SseDecoder, SseFrame};
use crate::cortex::{CitedDocument, CortexError, StreamEvent};

pub const THINKING_DELTA: &str = "response.thinking.delta";
pub const TEXT_DELTA: &str = "response.text.delta";
pub const TEXT_ANNOTATION: &str = "response.text.annotation";

// ============================================================================
// Wire Types
// ============================================================================

#[derive(Serialize, Debug)]
struct ContentItem<'a> {
    #[serde(rename = "type")]
    item_type: &'static str, // always "text"
    text: &'a str,
}

#[derive(Serialize, Debug)]
struct InputMessage<'a> {
    role: &'static str,
    content: Vec<ContentItem<'a>>,
}

/// Body of the agent-run request.
#[derive(Serialize, Debug)]
struct RunRequest<'a> {
    messages: Vec<InputMessage<'a>>,
    stream: bool,
    thread_id: &'a str,
    parent_message_id: i64,
}

/// Everything one turn needs from the caller.
#[derive(Debug, Clone, Copy)]
pub struct AgentRequest<'a> {
    pub prompt: &'a str,
    pub thread_id: &'a str,
    pub parent_message_id: i64,
}

impl<'a> AgentRequest<'a> {
    fn to_body(self) -> RunRequest<'a> {
        RunRequest {
            messages: vec![InputMessage {
                role: "user",
                content: vec![ContentItem {
                    item_type: "text",
                    text: self.prompt,
                }],
            }],
            stream: true,
            thread_id: self.thread_id,
            parent_message_id: self.parent_message_id,
        }
    }
}

/// Only used to find the type when the frame has no `event:` line.
#[derive(Deserialize, Debug)]
struct TypedEvent {
    #[serde(rename = "type")]
    event_type: String,
}

#[derive(Deserialize, Debug)]
struct DeltaEvent {
    text: String,
}

#[derive(Deserialize, Debug)]
struct AnnotationEvent {
    annotation: CitedDocument,
    #[serde(alias = "annotationIndex", default)]
    annotation_index: i64,
}

// ============================================================================
// Frame Classification
// ============================================================================

/// Turns one SSE frame into a stream event.
///
/// Returns `None` for event types the caller doesn't care about and for
/// malformed frames; neither aborts the stream.
pub fn classify(frame: &SseFrame) -> Option<StreamEvent> {
    let data = frame.data.trim();
    if data == "[DONE]" {
        debug!("Received [DONE] marker");
        return None;
    }

    let event_type = frame.event.clone().or_else(|| {
        serde_json::from_str::<TypedEvent>(data)
            .ok()
            .map(|e| e.event_type)
    });

    match event_type.as_deref() {
        Some(THINKING_DELTA) => match serde_json::from_str::<DeltaEvent>(data) {
            Ok(event) => Some(StreamEvent::ThinkingDelta { text: event.text }),
            Err(e) => {
                debug!("Skipping malformed thinking delta: {}", e);
                None
            }
        },
        Some(TEXT_DELTA) => match serde_json::from_str::<DeltaEvent>(data) {
            Ok(event) => Some(StreamEvent::TextDelta { text: event.text }),
            Err(e) => {
                debug!("Skipping malformed text delta: {}", e);
                None
            }
        },
        Some(TEXT_ANNOTATION) => match serde_json::from_str::<AnnotationEvent>(data) {
            Ok(event) => Some(StreamEvent::TextAnnotation {
                annotation: event.annotation,
                index: event.annotation_index,
            }),
            Err(e) => {
                debug!("Skipping malformed annotation: {}", e);
                None
            }
        },
        Some("error") => {
            warn!("Agent stream reported an error event: {}", data);
            None
        }
        Some(other) => {
            debug!("Ignoring event type '{}': {} bytes", other, data.len());
            None
        }
        None => {
            debug!("Could not determine event type from data: {}", data);
            None
        }
    }
}

// ============================================================================
// Pull-Based Event Stream
// ============================================================================

/// A finite, non-restartable sequence of agent events.
///
/// Each [`next_event`](Self::next_event) suspends until the next event is
/// decoded. Reads are bounded by an idle timeout and observe a cancellation
/// token. Once the body ends, a read fails, or the token fires, every later
/// call returns `Ok(None)`.
pub struct AgentEventStream {
    body: BoxStream<'static, Result<Vec<u8>, String>>,
    decoder: SseDecoder,
    pending: VecDeque<SseFrame>,
    idle_timeout: Duration,
    cancel: CancellationToken,
    done: bool,
}

impl AgentEventStream {
    /// Wraps any byte stream. The HTTP client passes the response body; tests
    /// pass in-memory streams.
    pub fn new(
        body: BoxStream<'static, Result<Vec<u8>, String>>,
        idle_timeout: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            body,
            decoder: SseDecoder::new(),
            pending: VecDeque::new(),
            idle_timeout,
            cancel,
            done: false,
        }
    }

    pub async fn next_event(&mut self) -> Result<Option<StreamEvent>, CortexError> {
        loop {
            while let Some(frame) = self.pending.pop_front() {
                if let Some(event) = classify(&frame) {
                    return Ok(Some(event));
                }
            }
            if self.done {
                return Ok(None);
            }

            let read = tokio::select! {
                _ = self.cancel.cancelled() => {
                    self.done = true;
                    return Err(CortexError::Cancelled);
                }
                read = tokio::time::timeout(self.idle_timeout, self.body.next()) => read,
            };

            match read {
                Err(_) => {
                    self.done = true;
                    return Err(CortexError::Stream(format!(
                        "no data for {}s",
                        self.idle_timeout.as_secs()
                    )));
                }
                Ok(Some(Err(e))) => {
                    self.done = true;
                    return Err(CortexError::Stream(e));
                }
                Ok(Some(Ok(bytes))) => {
                    debug!("Raw chunk received: {} bytes", bytes.len());
                    self.pending.extend(self.decoder.feed(&bytes));
                }
                Ok(None) => {
                    debug!("Agent stream body ended");
                    self.done = true;
                    self.pending.extend(self.decoder.finish());
                }
            }
        }
    }
}

// ============================================================================
// Runner Seam
// ============================================================================

/// Drives one agent turn into a channel of events.
#[async_trait]
pub trait AgentRunner: Send + Sync {
    /// Streams the agent response for `request`, sending each event in
    /// arrival order. Returns once the stream ends; events already sent stay
    /// valid if an error is returned.
    async fn stream_response(
        &self,
        request: AgentRequest<'_>,
        sender: Sender<StreamEvent>,
        cancel: CancellationToken,
    ) -> Result<(), CortexError>;
}

/// Agent client over HTTP.
pub struct CortexAgentClient {
    endpoint: String,
    auth_header: String,
    idle_timeout: Duration,
    client: reqwest::Client,
}

impl CortexAgentClient {
    /// Builds a client for the endpoints in `endpoints`.
    ///
    /// There is no whole-request timeout: a long answer is fine as long as
    /// bytes keep arriving within `idle_timeout`.
    pub fn new(
        endpoints: &Endpoints,
        connect_timeout: Duration,
        idle_timeout: Duration,
    ) -> Result<Self, CortexError> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| CortexError::Network(e.to_string()))?;
        Ok(Self {
            endpoint: endpoints.agent_endpoint.clone(),
            auth_header: endpoints.auth_header.clone(),
            idle_timeout,
            client,
        })
    }

    /// Opens the stream. A non-2xx status fails here, before any event.
    pub async fn open_stream(
        &self,
        request: AgentRequest<'_>,
        cancel: CancellationToken,
    ) -> Result<AgentEventStream, CortexError> {
        let body = request.to_body();
        info!(
            "Agent run request: thread_id={}, parent_message_id={}, prompt_len={}",
            request.thread_id,
            request.parent_message_id,
            request.prompt.len()
        );

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", &self.auth_header)
            .header("Accept", "text/event-stream")
            .json(&body)
            .send()
            .await
            .map_err(|e| CortexError::Network(e.to_string()))?;

        debug!("Agent response status: {}", response.status());

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            warn!("Agent API error: {} - {}", status, body);
            return Err(CortexError::Http { status, body });
        }

        let bytes = response
            .bytes_stream()
            .map(|chunk| chunk.map(|b| b.to_vec()).map_err(|e| e.to_string()))
            .boxed();
        Ok(AgentEventStream::new(bytes, self.idle_timeout, cancel))
    }
}

#[async_trait]
impl AgentRunner for CortexAgentClient {
    async fn stream_response(
        &self,
        request: AgentRequest<'_>,
        sender: Sender<StreamEvent>,
        cancel: CancellationToken,
    ) -> Result<(), CortexError> {
        let mut stream = self.open_stream(request, cancel).await?;
        let mut event_count = 0usize;

        while let Some(event) = stream.next_event().await? {
            event_count += 1;
            if sender.send(event).await.is_err() {
                warn!("Event send failed: receiver dropped");
                return Err(CortexError::Cancelled);
            }
        }

        info!("Agent stream ended: {} events", event_count);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn frame(event: Option<&str>, data: &str) -> SseFrame {
        SseFrame {
            event: event.map(str::to_string),
            data: data.to_string(),
        }
    }

    fn body_of(chunks: Vec<&'static str>) -> BoxStream<'static, Result<Vec<u8>, String>> {
        stream::iter(chunks.into_iter().map(|c| Ok(c.as_bytes().to_vec()))).boxed()
    }

    #[test]
    fn test_request_body_shape() {
        let request = AgentRequest {
            prompt: "hello",
            thread_id: "t-1",
            parent_message_id: 0,
        };
        let json = serde_json::to_value(request.to_body()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "messages": [{"role": "user", "content": [{"type": "text", "text": "hello"}]}],
                "stream": true,
                "thread_id": "t-1",
                "parent_message_id": 0
            })
        );
    }

    #[test]
    fn test_classify_uses_event_name() {
        let event = classify(&frame(Some(TEXT_DELTA), r#"{"text":"Hi"}"#));
        assert_eq!(event, Some(StreamEvent::TextDelta { text: "Hi".into() }));
    }

    #[test]
    fn test_classify_falls_back_to_type_field() {
        let event = classify(&frame(
            None,
            r#"{"type":"response.thinking.delta","text":"hmm"}"#,
        ));
        assert_eq!(event, Some(StreamEvent::ThinkingDelta { text: "hmm".into() }));
    }

    #[test]
    fn test_classify_annotation() {
        let event = classify(&frame(
            Some(TEXT_ANNOTATION),
            r#"{"annotation":{"doc_id":"doc-9","index":12},"annotation_index":3}"#,
        ));
        match event {
            Some(StreamEvent::TextAnnotation { annotation, index }) => {
                assert_eq!(annotation.doc_id, "doc-9");
                assert_eq!(annotation.index, Some(12));
                assert_eq!(index, 3);
            }
            other => panic!("expected annotation, got {other:?}"),
        }
    }

    #[test]
    fn test_classify_ignores_unknown_and_malformed() {
        assert_eq!(classify(&frame(Some("response.status"), r#"{"status":"planning"}"#)), None);
        assert_eq!(classify(&frame(None, "not json")), None);
        assert_eq!(classify(&frame(None, r#"{"text":"no type"}"#)), None);
        assert_eq!(classify(&frame(Some(TEXT_DELTA), r#"{"nope":1}"#)), None);
        assert_eq!(classify(&frame(Some("error"), r#"{"message":"x"}"#)), None);
        assert_eq!(classify(&frame(None, "[DONE]")), None);
    }

    #[tokio::test]
    async fn test_stream_yields_events_in_order_and_ends() {
        let body = body_of(vec![
            "event: response.thinking.delta\ndata: {\"text\":\"a\"}\n\n",
            "event: response.status\ndata: {}\n\nevent: response.text.delta\n",
            "data: {\"text\":\"b\"}\n\n",
        ]);
        let mut stream =
            AgentEventStream::new(body, Duration::from_secs(5), CancellationToken::new());

        assert_eq!(
            stream.next_event().await.unwrap(),
            Some(StreamEvent::ThinkingDelta { text: "a".into() })
        );
        assert_eq!(
            stream.next_event().await.unwrap(),
            Some(StreamEvent::TextDelta { text: "b".into() })
        );
        assert_eq!(stream.next_event().await.unwrap(), None);
        assert_eq!(stream.next_event().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_transport_failure_surfaces_at_next_pull() {
        let body = stream::iter(vec![
            Ok(b"data: {\"type\":\"response.text.delta\",\"text\":\"partial\"}\n\n".to_vec()),
            Err("connection reset".to_string()),
        ])
        .boxed();
        let mut stream =
            AgentEventStream::new(body, Duration::from_secs(5), CancellationToken::new());

        assert_eq!(
            stream.next_event().await.unwrap(),
            Some(StreamEvent::TextDelta { text: "partial".into() })
        );
        assert_eq!(
            stream.next_event().await,
            Err(CortexError::Stream("connection reset".into()))
        );
        // Not restartable
        assert_eq!(stream.next_event().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_idle_timeout_fails_the_stream() {
        let body = stream::pending::<Result<Vec<u8>, String>>().boxed();
        let mut stream =
            AgentEventStream::new(body, Duration::from_millis(20), CancellationToken::new());

        assert!(matches!(stream.next_event().await, Err(CortexError::Stream(_))));
        assert_eq!(stream.next_event().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_cancellation_stops_a_blocked_read() {
        let body = stream::pending::<Result<Vec<u8>, String>>().boxed();
        let cancel = CancellationToken::new();
        let mut stream = AgentEventStream::new(body, Duration::from_secs(60), cancel.clone());

        cancel.cancel();
        assert_eq!(stream.next_event().await, Err(CortexError::Cancelled));
        assert_eq!(stream.next_event().await.unwrap(), None);
    }
}

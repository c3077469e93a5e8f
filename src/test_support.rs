//! Test utilities shared across the crate.
//!
//! This module is only compiled during tests (`#[cfg(test)]`).

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use tokio::sync::mpsc::Sender;
use tokio_util::sync::CancellationToken;

use crate::core::state::App;
use crate::cortex::{
    AgentRequest, AgentRunner, CortexError, Message, Role, StreamEvent, Thread, ThreadMessages,
    ThreadStore,
};

/// Creates a test App for application "test-app".
pub fn test_app() -> App {
    App::new("test-app", "TEST_AGENT")
}

fn millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

/// A stored message whose payload holds one text item.
pub fn message(id: i64, role: Role, created_ms: i64, text: &str) -> Message {
    Message {
        id,
        role,
        payload: serde_json::Value::String(
            json!({"content": [{"type": "text", "text": text}]}).to_string(),
        ),
        created_at: millis(created_ms),
    }
}

pub fn thread(id: &str, updated_ms: i64) -> Thread {
    Thread {
        id: id.to_string(),
        name: format!("thread {id}"),
        created_at: millis(updated_ms),
        updated_at: millis(updated_ms),
        origin_application: "test-app".to_string(),
    }
}

/// In-memory thread store that records every call.
#[derive(Default)]
pub struct FakeThreadStore {
    pub create_calls: AtomicUsize,
    pub renamed: Mutex<Vec<(String, String)>>,
    pub deleted: Mutex<Vec<String>>,
    pub messages: Mutex<Vec<Message>>,
    pub threads: Mutex<Vec<Thread>>,
    /// When set, every call fails with this error.
    pub failure: Mutex<Option<CortexError>>,
}

impl FakeThreadStore {
    pub fn failing(error: CortexError) -> Self {
        let store = Self::default();
        *store.failure.lock().unwrap() = Some(error);
        store
    }

    fn check(&self) -> Result<(), CortexError> {
        match self.failure.lock().unwrap().clone() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ThreadStore for FakeThreadStore {
    async fn create_thread(&self, _application: &str) -> Result<String, CortexError> {
        self.check()?;
        let n = self.create_calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("t-{n}"))
    }

    async fn list_threads(&self, _application: &str) -> Result<Vec<Thread>, CortexError> {
        self.check()?;
        Ok(self.threads.lock().unwrap().clone())
    }

    async fn get_thread_messages(&self, _thread_id: &str) -> Result<ThreadMessages, CortexError> {
        self.check()?;
        Ok(ThreadMessages {
            messages: self.messages.lock().unwrap().clone(),
            metadata: serde_json::Value::Null,
        })
    }

    async fn rename_thread(&self, thread_id: &str, name: &str) -> Result<(), CortexError> {
        self.check()?;
        self.renamed
            .lock()
            .unwrap()
            .push((thread_id.to_string(), name.to_string()));
        Ok(())
    }

    async fn delete_thread(&self, thread_id: &str) -> Result<(), CortexError> {
        self.check()?;
        self.deleted.lock().unwrap().push(thread_id.to_string());
        Ok(())
    }
}

/// Agent that replays a fixed list of events, then optionally fails.
#[derive(Default)]
pub struct ScriptedAgent {
    pub events: Vec<StreamEvent>,
    pub error: Option<CortexError>,
    /// (thread_id, parent_message_id, prompt) of every run.
    pub requests: Mutex<Vec<(String, i64, String)>>,
}

impl ScriptedAgent {
    pub fn new(events: Vec<StreamEvent>) -> Self {
        Self {
            events,
            ..Default::default()
        }
    }
}

#[async_trait]
impl AgentRunner for ScriptedAgent {
    async fn stream_response(
        &self,
        request: AgentRequest<'_>,
        sender: Sender<StreamEvent>,
        _cancel: CancellationToken,
    ) -> Result<(), CortexError> {
        self.requests.lock().unwrap().push((
            request.thread_id.to_string(),
            request.parent_message_id,
            request.prompt.to_string(),
        ));
        for event in self.events.clone() {
            if sender.send(event).await.is_err() {
                return Err(CortexError::Cancelled);
            }
        }
        match &self.error {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }
}

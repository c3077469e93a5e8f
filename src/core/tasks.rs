//! # Background Tasks
//!
//! The async side of the app. Each function here runs inside a spawned
//! tokio task, talks to the remote services, and reports back by sending
//! `Action`s. None of them touch `App` directly, so a failed call can only
//! surface as an error action.
//!
//! ```text
//! update() ──Effect──▶ adapter ──spawn──▶ run_turn / load_thread / ...
//!    ▲                                              │
//!    └──────────────────── Action ◀─────────────────┘
//! ```

use std::sync::Arc;
use std::sync::mpsc::Sender;

use log::{debug, error, info, warn};
use tokio_util::sync::CancellationToken;

use crate::core::action::Action;
use crate::cortex::{AgentRequest, AgentRunner, CortexError, ResponseAssembler, ThreadStore};

/// Longest title given to a thread created from a prompt.
const TITLE_MAX_CHARS: usize = 60;

/// Everything one turn needs, captured when the prompt is submitted.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnRequest {
    pub prompt: String,
    /// `None` means a thread is created first.
    pub thread_id: Option<String>,
    pub parent_message_id: i64,
    pub application: String,
}

/// The two remote services, shared by every task.
#[derive(Clone)]
pub struct Services {
    pub threads: Arc<dyn ThreadStore>,
    pub agent: Arc<dyn AgentRunner>,
}

/// Builds a thread title from the first line of a prompt.
pub fn derive_title(prompt: &str) -> String {
    let first_line = prompt.trim().lines().next().unwrap_or("").trim();
    if first_line.chars().count() > TITLE_MAX_CHARS {
        let cut: String = first_line.chars().take(TITLE_MAX_CHARS - 3).collect();
        format!("{}...", cut.trim_end())
    } else {
        first_line.to_string()
    }
}

/// Runs one full turn: create the thread if needed, stream the answer, then
/// reload the thread and the thread list.
pub async fn run_turn(
    services: Services,
    request: TurnRequest,
    tx: Sender<Action>,
    cancel: CancellationToken,
) {
    let thread_id = match request.thread_id {
        Some(id) => id,
        None => match create_named_thread(&services, &request).await {
            Ok(id) => {
                let _ = tx.send(Action::ThreadCreated(id.clone()));
                id
            }
            Err(e) => {
                error!("Thread creation failed: {}", e);
                let _ = tx.send(Action::StreamEnded {
                    error: Some(format!("Could not start a thread: {e}")),
                });
                return;
            }
        },
    };

    let (event_tx, mut event_rx) = tokio::sync::mpsc::channel(100);
    let agent_request = AgentRequest {
        prompt: &request.prompt,
        thread_id: &thread_id,
        parent_message_id: request.parent_message_id,
    };
    let stream = services
        .agent
        .stream_response(agent_request, event_tx, cancel);

    let forward = async {
        let mut assembler = ResponseAssembler::new();
        while let Some(event) = event_rx.recv().await {
            if tx.send(Action::Chunk(assembler.push(event))).is_err() {
                debug!("UI gone; dropping remaining chunks");
            }
        }
        assembler.text().chars().count()
    };

    let (result, text_chars) = tokio::join!(stream, forward);
    info!("Turn on thread {} produced {} chars", thread_id, text_chars);

    let error = match result {
        Ok(()) => None,
        Err(CortexError::Cancelled) => Some("Response cancelled".to_string()),
        Err(e) => {
            warn!("Agent stream failed: {}", e);
            Some(format!("Response failed: {e}"))
        }
    };
    let _ = tx.send(Action::StreamEnded { error });

    load_thread(&services, &thread_id, &tx).await;
    refresh_threads(&services, &request.application, &tx).await;
}

async fn create_named_thread(
    services: &Services,
    request: &TurnRequest,
) -> Result<String, CortexError> {
    let id = services.threads.create_thread(&request.application).await?;
    let title = derive_title(&request.prompt);
    // A thread without a title is still usable
    if !title.is_empty()
        && let Err(e) = services.threads.rename_thread(&id, &title).await
    {
        warn!("Could not name thread {}: {}", id, e);
    }
    Ok(id)
}

/// Fetches a thread's messages and reports them back.
pub async fn load_thread(services: &Services, thread_id: &str, tx: &Sender<Action>) {
    let action = match services.threads.get_thread_messages(thread_id).await {
        Ok(messages) => {
            debug!(
                "Loaded {} messages for thread {}",
                messages.messages.len(),
                thread_id
            );
            Action::ThreadLoaded {
                thread_id: thread_id.to_string(),
                messages,
            }
        }
        Err(e) => {
            warn!("Loading thread {} failed: {}", thread_id, e);
            Action::ThreadLoadFailed {
                thread_id: thread_id.to_string(),
                not_found: e.is_not_found(),
                error: format!("Could not load thread: {e}"),
            }
        }
    };
    let _ = tx.send(action);
}

pub async fn refresh_threads(services: &Services, application: &str, tx: &Sender<Action>) {
    let action = match services.threads.list_threads(application).await {
        Ok(threads) => Action::ThreadsListed(threads),
        Err(e) => {
            warn!("Listing threads failed: {}", e);
            Action::RequestFailed(format!("Could not list threads: {e}"))
        }
    };
    let _ = tx.send(action);
}

/// Deletes a thread. A thread that is already gone counts as deleted.
pub async fn delete_thread(services: &Services, thread_id: &str, tx: &Sender<Action>) {
    let action = match services.threads.delete_thread(thread_id).await {
        Ok(()) => Action::ThreadDeleted(thread_id.to_string()),
        Err(e) if e.is_not_found() => {
            info!("Thread {} was already gone", thread_id);
            Action::ThreadDeleted(thread_id.to_string())
        }
        Err(e) => {
            warn!("Deleting thread {} failed: {}", thread_id, e);
            Action::RequestFailed(format!("Could not delete thread: {e}"))
        }
    };
    let _ = tx.send(action);
}

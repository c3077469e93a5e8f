//! # Actions
//!
//! Everything that can happen in the app becomes an `Action`.
//! User presses Enter? That's `Action::Submit(text)`.
//! The agent streams a delta? That's `Action::Chunk(chunk)`.
//!
//! The `update()` function takes the current state and an action, mutates
//! the state, and returns an `Effect` describing any I/O the adapter should
//! start. No side effects here. I/O happens in `core::tasks`.
//!
//! ```text
//! State + Action  →  update()  →  New State + Effect
//! ```
//!
//! Background tasks only ever report results back as actions, so a failed
//! remote call can't change session state: only the success action does.

use log::{debug, info, warn};

use crate::core::state::{App, LiveTurn, TranscriptEntry};
use crate::core::tasks::TurnRequest;
use crate::cortex::{ContentBlock, RenderChunk, Role, Thread, ThreadMessages};

#[derive(Debug, Clone)]
pub enum Action {
    // User intents
    Submit(String),
    CancelGeneration,
    NewThread,
    SelectThread(String),
    DeleteThread(String),
    RefreshThreads,
    DismissError,
    Quit,

    // Results from background tasks
    ThreadCreated(String),
    Chunk(RenderChunk),
    StreamEnded {
        error: Option<String>,
    },
    ThreadLoaded {
        thread_id: String,
        messages: ThreadMessages,
    },
    ThreadLoadFailed {
        thread_id: String,
        error: String,
        not_found: bool,
    },
    ThreadsListed(Vec<Thread>),
    ThreadDeleted(String),
    RequestFailed(String),
}

/// I/O the adapter must start after an update.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    None,
    Quit,
    SpawnTurn(TurnRequest),
    CancelStream,
    LoadThread(String),
    RefreshThreads,
    DeleteThread(String),
}

const BUSY: &str = "Still answering (Esc to cancel)";

pub fn update(app: &mut App, action: Action) -> Effect {
    match action {
        Action::Submit(text) => {
            if text.trim().is_empty() {
                return Effect::None;
            }
            if app.is_streaming {
                app.status_message = BUSY.to_string();
                return Effect::None;
            }
            app.session.submit_prompt(text);
            let Some(prompt) = app.session.take_prompt() else {
                return Effect::None;
            };
            info!(
                "Submitting prompt (thread={:?}, parent={})",
                app.session.current_thread_id, app.session.parent_message_id
            );

            app.error = None;
            app.is_streaming = true;
            app.transcript.push(TranscriptEntry::user_text(prompt.clone()));
            app.live = Some(LiveTurn::new(prompt.clone()));
            app.status_message = "Thinking...".to_string();

            Effect::SpawnTurn(TurnRequest {
                prompt,
                thread_id: app.session.current_thread_id.clone(),
                parent_message_id: app.session.parent_message_id,
                application: app.application.clone(),
            })
        }
        Action::CancelGeneration => {
            if !app.is_streaming {
                return Effect::None;
            }
            app.status_message = "Cancelling...".to_string();
            Effect::CancelStream
        }
        Action::NewThread => {
            if app.is_streaming {
                app.status_message = BUSY.to_string();
                return Effect::None;
            }
            app.session.clear_thread();
            app.transcript.clear();
            app.live = None;
            app.error = None;
            app.status_message = "New thread".to_string();
            Effect::None
        }
        Action::SelectThread(id) => {
            if app.is_streaming {
                app.status_message = BUSY.to_string();
                return Effect::None;
            }
            app.session.select_thread(id.clone());
            app.transcript.clear();
            app.live = None;
            app.error = None;
            app.status_message = "Loading thread...".to_string();
            Effect::LoadThread(id)
        }
        Action::DeleteThread(id) => {
            if app.is_streaming && app.session.is_current(&id) {
                app.status_message = BUSY.to_string();
                return Effect::None;
            }
            app.status_message = "Deleting thread...".to_string();
            Effect::DeleteThread(id)
        }
        Action::RefreshThreads => Effect::RefreshThreads,
        Action::DismissError => {
            app.error = None;
            Effect::None
        }
        Action::Quit => Effect::Quit,

        Action::ThreadCreated(id) => {
            if app.session.current_thread_id.is_none() {
                app.session.select_thread(id);
            } else {
                warn!(
                    "Thread {} created while {:?} is active; ignoring",
                    id, app.session.current_thread_id
                );
            }
            Effect::None
        }
        Action::Chunk(chunk) => {
            if let Some(live) = app.live.as_mut() {
                if chunk.is_final {
                    live.text.push_str(&chunk.content);
                    app.status_message = "Answering...".to_string();
                } else {
                    live.thinking.push_str(&chunk.content);
                }
            }
            Effect::None
        }
        Action::StreamEnded { error } => {
            app.is_streaming = false;
            // Partial output stays on screen even when the stream failed
            if let Some(live) = app.live.take()
                && !live.text.is_empty()
            {
                app.transcript.push(TranscriptEntry {
                    role: Role::Assistant,
                    blocks: vec![ContentBlock::Text {
                        text: live.text,
                        annotations: Vec::new(),
                    }],
                });
            }
            match error {
                Some(e) => {
                    warn!("Turn ended with error: {}", e);
                    app.status_message = "Response interrupted".to_string();
                    app.error = Some(e);
                }
                None => app.status_message = "Ready".to_string(),
            }
            Effect::None
        }
        Action::ThreadLoaded {
            thread_id,
            messages,
        } => {
            if !app.session.is_current(&thread_id) || app.is_streaming {
                debug!("Discarding stale load of thread {}", thread_id);
                return Effect::None;
            }
            app.session.record_turn(&messages.messages);
            app.set_history(&messages.messages);
            app.status_message = "Ready".to_string();
            Effect::None
        }
        Action::ThreadLoadFailed {
            thread_id,
            error,
            not_found,
        } => {
            if not_found && app.session.is_current(&thread_id) && !app.is_streaming {
                app.session.clear_thread();
                app.transcript.clear();
                app.status_message = "Thread is gone; starting a new one".to_string();
            }
            app.error = Some(error);
            Effect::None
        }
        Action::ThreadsListed(threads) => {
            if threads.is_empty() && !app.is_streaming && app.session.current_thread_id.is_some() {
                app.session.clear_thread();
                app.transcript.clear();
            }
            app.set_threads(threads);
            Effect::None
        }
        Action::ThreadDeleted(id) => {
            app.threads.retain(|t| t.id != id);
            if app.session.thread_deleted(&id) {
                app.transcript.clear();
                app.live = None;
            }
            app.status_message = "Thread deleted".to_string();
            Effect::RefreshThreads
        }
        Action::RequestFailed(message) => {
            app.status_message = "Request failed".to_string();
            app.error = Some(message);
            Effect::None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{message, test_app, thread};

    fn loaded(thread_id: &str, ids: &[i64]) -> Action {
        Action::ThreadLoaded {
            thread_id: thread_id.to_string(),
            messages: ThreadMessages {
                messages: ids
                    .iter()
                    .map(|id| message(*id, Role::User, *id * 1_000, "m"))
                    .collect(),
                metadata: serde_json::Value::Null,
            },
        }
    }

    #[test]
    fn test_submit_without_thread_spawns_turn() {
        let mut app = test_app();
        let effect = update(&mut app, Action::Submit("hello".to_string()));

        assert_eq!(
            effect,
            Effect::SpawnTurn(TurnRequest {
                prompt: "hello".to_string(),
                thread_id: None,
                parent_message_id: 0,
                application: "test-app".to_string(),
            })
        );
        assert!(app.is_streaming);
        assert_eq!(app.session.pending_prompt, None);
        assert_eq!(app.transcript, vec![TranscriptEntry::user_text("hello")]);
    }

    #[test]
    fn test_submit_carries_thread_and_parent() {
        let mut app = test_app();
        app.session.select_thread("t-1");
        app.session.parent_message_id = 41;
        match update(&mut app, Action::Submit("next".to_string())) {
            Effect::SpawnTurn(req) => {
                assert_eq!(req.thread_id.as_deref(), Some("t-1"));
                assert_eq!(req.parent_message_id, 41);
            }
            other => panic!("expected SpawnTurn, got {other:?}"),
        }
    }

    #[test]
    fn test_submit_while_streaming_is_refused() {
        let mut app = test_app();
        update(&mut app, Action::Submit("first".to_string()));
        let effect = update(&mut app, Action::Submit("second".to_string()));
        assert_eq!(effect, Effect::None);
        assert_eq!(app.transcript.len(), 1);
        assert_eq!(app.status_message, BUSY);
    }

    #[test]
    fn test_blank_submit_ignored() {
        let mut app = test_app();
        assert_eq!(update(&mut app, Action::Submit("  \n".to_string())), Effect::None);
        assert!(!app.is_streaming);
    }

    #[test]
    fn test_chunks_accumulate_into_live_turn() {
        let mut app = test_app();
        update(&mut app, Action::Submit("hello".to_string()));
        for chunk in [
            RenderChunk::thinking("Loo"),
            RenderChunk::thinking("king up..."),
            RenderChunk::text("Hi "),
            RenderChunk::text("there!"),
        ] {
            update(&mut app, Action::Chunk(chunk));
        }
        let live = app.live.as_ref().unwrap();
        assert_eq!(live.thinking, "Looking up...");
        assert_eq!(live.text, "Hi there!");
    }

    #[test]
    fn test_stream_error_keeps_partial_output() {
        let mut app = test_app();
        update(&mut app, Action::Submit("hello".to_string()));
        update(&mut app, Action::Chunk(RenderChunk::text("partial")));
        update(
            &mut app,
            Action::StreamEnded {
                error: Some("stream error: reset".to_string()),
            },
        );
        assert!(!app.is_streaming);
        assert!(app.live.is_none());
        assert_eq!(app.transcript.len(), 2);
        assert_eq!(app.error.as_deref(), Some("stream error: reset"));
    }

    #[test]
    fn test_thread_created_selects_new_thread() {
        let mut app = test_app();
        update(&mut app, Action::Submit("hello".to_string()));
        update(&mut app, Action::ThreadCreated("t-new".to_string()));
        assert_eq!(app.session.current_thread_id.as_deref(), Some("t-new"));
        assert_eq!(app.session.parent_message_id, 0);
    }

    #[test]
    fn test_thread_loaded_records_turn() {
        let mut app = test_app();
        app.session.select_thread("t-1");
        update(&mut app, loaded("t-1", &[1, 2, 3, 4]));
        assert_eq!(app.session.parent_message_id, 3);
        assert_eq!(app.transcript.len(), 4);
    }

    #[test]
    fn test_stale_thread_load_is_discarded() {
        let mut app = test_app();
        app.session.select_thread("t-2");
        update(&mut app, loaded("t-1", &[1, 2]));
        assert_eq!(app.session.parent_message_id, 0);
        assert!(app.transcript.is_empty());
    }

    #[test]
    fn test_select_thread_resets_and_loads() {
        let mut app = test_app();
        app.session.select_thread("t-1");
        app.session.parent_message_id = 8;
        let effect = update(&mut app, Action::SelectThread("t-2".to_string()));
        assert_eq!(effect, Effect::LoadThread("t-2".to_string()));
        assert_eq!(app.session.parent_message_id, 0);
    }

    #[test]
    fn test_thread_switch_refused_while_streaming() {
        let mut app = test_app();
        update(&mut app, Action::Submit("hello".to_string()));
        assert_eq!(update(&mut app, Action::SelectThread("t-2".to_string())), Effect::None);
        assert_eq!(update(&mut app, Action::NewThread), Effect::None);
    }

    #[test]
    fn test_new_thread_matches_fresh_session() {
        let mut app = test_app();
        app.session.select_thread("t-1");
        app.session.parent_message_id = 3;
        update(&mut app, Action::NewThread);
        assert_eq!(app.session, crate::core::session::SessionState::new());
    }

    #[test]
    fn test_deleting_active_thread_clears_session() {
        let mut app = test_app();
        app.set_threads(vec![thread("t-1", 1_000), thread("t-2", 2_000)]);
        app.session.select_thread("t-1");
        app.session.parent_message_id = 5;
        let effect = update(&mut app, Action::ThreadDeleted("t-1".to_string()));
        assert_eq!(effect, Effect::RefreshThreads);
        assert_eq!(app.session.current_thread_id, None);
        assert_eq!(app.session.parent_message_id, 0);
        assert_eq!(app.threads.len(), 1);
    }

    #[test]
    fn test_deleting_other_thread_keeps_session() {
        let mut app = test_app();
        app.session.select_thread("t-1");
        app.session.parent_message_id = 5;
        let before = app.session.clone();
        update(&mut app, Action::ThreadDeleted("t-2".to_string()));
        assert_eq!(app.session, before);
    }

    #[test]
    fn test_failed_request_leaves_session_untouched() {
        let mut app = test_app();
        app.session.select_thread("t-1");
        app.session.parent_message_id = 5;
        let before = app.session.clone();
        update(&mut app, Action::RequestFailed("HTTP 500: boom".to_string()));
        assert_eq!(app.session, before);
        assert_eq!(app.error.as_deref(), Some("HTTP 500: boom"));
    }

    #[test]
    fn test_missing_thread_falls_back_to_new_thread() {
        let mut app = test_app();
        app.session.select_thread("t-gone");
        update(
            &mut app,
            Action::ThreadLoadFailed {
                thread_id: "t-gone".to_string(),
                error: "thread t-gone no longer exists".to_string(),
                not_found: true,
            },
        );
        assert_eq!(app.session.current_thread_id, None);
        assert!(app.error.is_some());
    }

    #[test]
    fn test_cancel_only_while_streaming() {
        let mut app = test_app();
        assert_eq!(update(&mut app, Action::CancelGeneration), Effect::None);
        update(&mut app, Action::Submit("hello".to_string()));
        assert_eq!(update(&mut app, Action::CancelGeneration), Effect::CancelStream);
    }
}

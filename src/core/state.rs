//! # Application State
//!
//! Core business state for the chat client. This module contains domain
//! logic only - no TUI-specific types. Presentation state lives in the `tui`
//! module.
//!
//! ```text
//! App
//! ├── session: SessionState          // thread / parent / pending prompt
//! ├── application: String            // origin application tag
//! ├── agent_name: String             // shown in the title bar
//! ├── threads: Vec<Thread>           // sidebar, newest first
//! ├── transcript: Vec<TranscriptEntry>
//! ├── live: Option<LiveTurn>         // the turn being streamed
//! ├── is_streaming: bool             // input gate
//! ├── status_message: String         // status bar text
//! └── error: Option<String>          // last user-visible failure
//! ```
//!
//! State changes only happen through `update(state, action)` in action.rs.
//! This keeps things predictable, so no surprise mutations.

use crate::core::config::ResolvedConfig;
use crate::core::session::SessionState;
use crate::cortex::payload::message_blocks;
use crate::cortex::{ContentBlock, Message, Role, Thread};

/// One rendered message in the conversation view.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptEntry {
    pub role: Role,
    pub blocks: Vec<ContentBlock>,
}

impl TranscriptEntry {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            blocks: vec![ContentBlock::Text {
                text: text.into(),
                annotations: Vec::new(),
            }],
        }
    }

    pub fn from_message(message: &Message) -> Self {
        Self {
            role: message.role,
            blocks: message_blocks(message),
        }
    }
}

/// The turn currently streaming: the prompt plus text accumulated so far.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LiveTurn {
    pub prompt: String,
    pub thinking: String,
    pub text: String,
}

impl LiveTurn {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }
}

pub struct App {
    pub session: SessionState,
    pub application: String,
    pub agent_name: String,
    pub threads: Vec<Thread>,
    pub transcript: Vec<TranscriptEntry>,
    pub live: Option<LiveTurn>,
    pub is_streaming: bool,
    pub status_message: String,
    pub error: Option<String>,
}

impl App {
    pub fn new(application: impl Into<String>, agent_name: impl Into<String>) -> Self {
        Self {
            session: SessionState::new(),
            application: application.into(),
            agent_name: agent_name.into(),
            threads: Vec::new(),
            transcript: Vec::new(),
            live: None,
            is_streaming: false,
            status_message: String::from("Ask me anything"),
            error: None,
        }
    }

    pub fn from_config(config: &ResolvedConfig) -> Self {
        Self::new(config.application.clone(), config.agent_name.clone())
    }

    /// Name of the active thread, if it is in the sidebar list.
    pub fn current_thread_name(&self) -> Option<&str> {
        let id = self.session.current_thread_id.as_deref()?;
        self.threads
            .iter()
            .find(|t| t.id == id)
            .map(|t| t.name.as_str())
    }

    /// Replaces the transcript with a thread's stored messages, oldest first.
    pub fn set_history(&mut self, messages: &[Message]) {
        let mut ordered: Vec<&Message> = messages.iter().collect();
        ordered.sort_by_key(|m| (m.created_at, m.id));
        self.transcript = ordered
            .into_iter()
            .map(TranscriptEntry::from_message)
            .collect();
    }

    /// Sorts threads newest first by `updated_at`, then `created_at`.
    pub fn set_threads(&mut self, mut threads: Vec<Thread>) {
        threads.sort_by(|a, b| {
            b.updated_at
                .cmp(&a.updated_at)
                .then(b.created_at.cmp(&a.created_at))
        });
        self.threads = threads;
    }
}

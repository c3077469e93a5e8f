//! # Conversation Session
//!
//! Which thread the user is talking in, which message the next turn hangs
//! off, and the prompt waiting to be sent. Pure state: no I/O.
//!
//! ```text
//! SessionState
//! ├── current_thread_id: Option<String>   // None = next prompt creates a thread
//! ├── parent_message_id: i64              // 0 = start of thread
//! └── pending_prompt: Option<String>      // set on submit, taken on send
//! ```
//!
//! `current_thread_id` and `parent_message_id` always change together when
//! a thread is selected or cleared.

use log::debug;

use crate::cortex::Message;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub current_thread_id: Option<String>,
    pub parent_message_id: i64,
    pub pending_prompt: Option<String>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select_thread(&mut self, id: impl Into<String>) {
        self.current_thread_id = Some(id.into());
        self.parent_message_id = 0;
    }

    pub fn clear_thread(&mut self) {
        self.current_thread_id = None;
        self.parent_message_id = 0;
        self.pending_prompt = None;
    }

    /// Points the next turn at the second-to-last message of `messages`.
    /// With fewer than two messages nothing changes.
    pub fn record_turn(&mut self, messages: &[Message]) {
        if let Some(parent) = messages.len().checked_sub(2).map(|i| &messages[i]) {
            debug!(
                "parent_message_id {} -> {}",
                self.parent_message_id, parent.id
            );
            self.parent_message_id = parent.id;
        }
    }

    pub fn submit_prompt(&mut self, text: impl Into<String>) {
        self.pending_prompt = Some(text.into());
    }

    /// Consumes the pending prompt.
    pub fn take_prompt(&mut self) -> Option<String> {
        self.pending_prompt.take()
    }

    pub fn is_current(&self, thread_id: &str) -> bool {
        self.current_thread_id.as_deref() == Some(thread_id)
    }

    /// Applies the delete contract: deleting the active thread clears it and
    /// resets the parent. Returns whether the active thread was cleared.
    pub fn thread_deleted(&mut self, thread_id: &str) -> bool {
        if !self.is_current(thread_id) {
            return false;
        }
        self.current_thread_id = None;
        self.parent_message_id = 0;
        true
    }
}

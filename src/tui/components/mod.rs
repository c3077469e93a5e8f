//! # TUI Components
//!
//! ### Stateless Components (Props-Based Rendering)
//!
//! - `TitleBar`: agent, active thread, unseen-content indicator
//! - `Message`: one transcript entry, rendered through the content-block
//!   renderer (markdown text, tables, chart summaries, sources)
//!
//! ### Stateful Components (Event-Driven)
//!
//! - `InputBox`: prompt editor, disabled while an answer streams
//! - `MessageList`: scrollable transcript with layout caching
//! - `ThreadList`: "Recent Chats" sidebar with open/new/delete
//!
//! Components receive external data as props, never by reaching into the
//! global `App`, and persistent state lives in `TuiState`.
//!
//! ```rust,ignore
//! // Dependencies are explicit
//! TitleBar::new(app.agent_name.clone(), thread_name, unseen).render(frame, area);
//! ```

mod title_bar;
pub use title_bar::TitleBar;

pub mod input_box;
pub mod message;
pub mod message_list;
pub mod thread_list;

pub use input_box::{InputBox, InputEvent};
pub use message_list::{MessageList, MessageListState};
pub use thread_list::{ThreadEvent, ThreadList, ThreadListState};

//! # Core Application Logic
//!
//! The chat client's business logic. It knows nothing about any specific
//! UI technology.
//!
//! ```text
//!                    ┌─────────────────────────┐
//!                    │         CORE            │
//!                    │  (this module)          │
//!                    │                         │
//!                    │  • State (app data)     │
//!                    │  • Action (events)      │
//!                    │  • update() (reducer)   │
//!                    │  • tasks (remote calls) │
//!                    └───────────┬─────────────┘
//!                                │
//!                    ┌───────────┴───────────┐
//!                    ▼                       ▼
//!             ┌────────────┐          ┌────────────┐
//!             │    TUI     │          │   cortex   │
//!             │  Adapter   │          │  clients   │
//!             │ (ratatui)  │          │  (reqwest) │
//!             └────────────┘          └────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`config`]: config file, environment and CLI layering
//! - [`session`]: current thread and parent message
//! - [`state`]: The `App` struct, all application state in one place
//! - [`action`]: The `Action` enum and the `update()` reducer
//! - [`tasks`]: async work spawned for each `Effect`

pub mod action;
pub mod config;
pub mod session;
pub mod state;
pub mod tasks;

//! # Cortex Service Clients
//!
//! Everything that talks to, or decodes data from, the remote agent and
//! thread services. No UI and no application state lives here.
//!
//! - [`threads`]: thread CRUD (`ThreadStore` + HTTP client)
//! - [`agent`]: agent-run streaming (`AgentRunner` + HTTP client)
//! - [`sse`]: Server-Sent Events framing
//! - [`assembler`]: live events → render chunks
//! - [`payload`]: stored message payloads → content blocks

pub mod agent;
pub mod assembler;
pub mod error;
pub mod payload;
pub mod sse;
pub mod threads;
pub mod types;

pub use agent::{AgentEventStream, AgentRequest, AgentRunner, CortexAgentClient};
pub use assembler::ResponseAssembler;
pub use error::CortexError;
pub use threads::{CortexThreadsClient, ThreadStore};
pub use types::{
    Annotation, CitedDocument, ContentBlock, Message, RenderChunk, Role, StreamEvent, Table,
    Thread, ThreadMessages,
};

//! Actor System for the watch loop
//!
//! Message-passing concurrency for watch mode:
//!
//! ```text
//! FsActor --Change--> Orchestrator --Reload--> WsActor --> browser agents
//! (watch)             (compile)                (broadcast)
//! ```
//!
//! # Module Structure
//!
//! - `messages` - Message types for inter-actor communication
//! - `fs` - File system watcher and relevance filter
//! - `orchestrator` - Serialized, coalescing compile loop
//! - `ws` - WebSocket connection set and broadcast
//! - `coordinator` - Wires up and runs actors

pub mod coordinator;
pub mod fs;
pub mod messages;
pub mod orchestrator;
pub mod ws;

pub use coordinator::Coordinator;

//! Actor Message Definitions
//!
//! ```text
//! FsActor --Change--> Orchestrator --Reload--> WsActor
//! HTTP server --AddClient--> WsActor
//! ```

use super::fs::ChangeEvent;
use super::ws::Duplex;

// =============================================================================
// Orchestrator Messages
// =============================================================================

/// Messages to the compile Orchestrator
#[derive(Debug)]
pub enum OrchestratorMsg {
    /// A relevant file changed
    Change(ChangeEvent),
    /// Compile regardless of changes (initial build)
    Rebuild,
    /// Shutdown
    Shutdown,
}

// =============================================================================
// WsActor Messages
// =============================================================================

/// Messages to WebSocket Actor
pub enum WsMsg {
    /// Upgraded connection handed over by the HTTP server
    AddClient(Box<dyn Duplex>),
    /// Broadcast `{"type":"reload"}` to every open connection
    Reload,
    /// Shutdown
    Shutdown,
}

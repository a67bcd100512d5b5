//! Notification Service
//!
//! One local port serves both halves of the preview loop:
//!
//! ```text
//! GET /view[?t=…]  → current artifact bytes (HEAD + Range supported)
//! GET /ws          → WebSocket upgrade, handed to WsActor
//! ```
//!
//! # Modules
//!
//! - `message` - Push message types (`reload`, `connected`)
//! - `response` - HTTP responses for the artifact endpoint
//! - `server` - Binding, request loop and upgrade handling

pub mod message;
pub mod response;
pub mod server;

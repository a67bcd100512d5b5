//! Push Message Protocol
//!
//! JSON messages sent over the `/ws` channel.
//!
//! # Message Types
//!
//! - `reload`: a new artifact is ready, refresh the preview
//! - `connected`: greeting written when a connection opens
//!
//! Any other `type` deserializes to `Unknown` and is ignored by agents.

use serde::{Deserialize, Serialize};

/// Message sent over the push channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PushMessage {
    /// Artifact rebuilt successfully
    Reload,

    /// Connection established
    Connected {
        /// Server version for compatibility check
        version: String,
    },

    /// Unrecognized message type
    #[serde(other)]
    Unknown,
}

impl PushMessage {
    pub fn connected() -> Self {
        Self::Connected {
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Serialize to the wire format.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Parse a text frame.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

//! `[serve]` section configuration.
//!
//! Contains preview server settings used in watch mode.
//!
//! # Example
//!
//! ```toml
//! [serve]
//! interface = "127.0.0.1"     # Network interface (127.0.0.1 = localhost only)
//! port = 4848                 # HTTP + WebSocket port
//! open = true                 # Open the preview in a browser on start
//! ```

use std::net::{IpAddr, Ipv4Addr};

use serde::{Deserialize, Serialize};

/// Preview server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServeConfig {
    /// Network interface to bind.
    pub interface: IpAddr,

    /// Port serving both `/view` and the `/ws` push channel.
    pub port: u16,

    /// Open the view URL in the default browser when watching starts.
    pub open: bool,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            interface: IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)),
            port: 4848,
            open: true,
        }
    }
}

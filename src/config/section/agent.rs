//! `[agent]` section configuration.
//!
//! The browser agent keeps the preview tab current. It drives a browser
//! started with remote debugging enabled (`--remote-debugging-port`).
//!
//! # Example
//!
//! ```toml
//! [agent]
//! devtools = "http://127.0.0.1:9222"   # DevTools endpoint, or a ws:// browser URL
//! ```

use serde::{Deserialize, Serialize};
use url::Url;

/// Browser agent settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// DevTools endpoint of the browser to drive. Unset disables the agent.
    pub devtools: Option<String>,
}

impl AgentConfig {
    /// Parsed endpoint, if one is configured and valid.
    pub fn endpoint(&self) -> Option<Url> {
        let url = Url::parse(self.devtools.as_deref()?).ok()?;
        matches!(url.scheme(), "http" | "https" | "ws").then_some(url)
    }
}

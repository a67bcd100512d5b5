//! Configuration section definitions.
//!
//! Each module corresponds to a section in `qtex.toml`:
//!
//! | Module    | TOML Section | Purpose                                |
//! |-----------|--------------|----------------------------------------|
//! | `compile` | `[compile]`  | Output name, main file, engine command |
//! | `serve`   | `[serve]`    | Preview server (interface, port, open) |
//! | `agent`   | `[agent]`    | Browser agent (DevTools endpoint)      |

mod agent;
mod compile;
mod serve;

pub use agent::AgentConfig;
pub use compile::{CompileConfig, DEFAULT_COMMAND};
pub use serve::ServeConfig;

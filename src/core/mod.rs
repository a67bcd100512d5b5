//! Process-wide lifecycle state shared by the CLI and the serve loop.

mod state;

pub use state::{is_shutdown, register_server, setup_shutdown_handler};

//! FileSystem Actor
//!
//! Watches the project directory and forwards relevant changes to the
//! Orchestrator. Implements the "Watcher-First" pattern: the watcher is
//! installed in `new()`, before the server binds and the initial compile
//! runs, so nothing written in between is missed.
//!
//! ```text
//! notify → WatchFilter → OrchestratorMsg::Change
//! ```

mod filter;
mod types;


pub use filter::{WATCHED_EXTENSIONS, WatchFilter};
pub use types::{ChangeEvent, ChangeKind};

use std::path::{Path, PathBuf};

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use thiserror::Error;
use tokio::sync::mpsc;

use super::messages::OrchestratorMsg;
use crate::utils::path::{display_slash, normalize_path, relative_to};

/// The directory cannot be watched. Fatal at startup.
#[derive(Debug, Error)]
pub enum WatchSetupError {
    #[error("directory `{0}` does not exist")]
    NotFound(PathBuf),

    #[error("`{0}` is not a directory")]
    NotADirectory(PathBuf),

    #[error("cannot read `{0}`")]
    Unreadable(PathBuf, #[source] std::io::Error),

    #[error("failed to install watcher")]
    Watch(#[from] notify::Error),
}

/// FileSystem Actor - watches for file changes
pub struct FsActor {
    /// Channel to receive notify events (sync -> async bridge)
    notify_rx: std::sync::mpsc::Receiver<notify::Result<notify::Event>>,
    /// Watcher handle (must be kept alive)
    watcher: RecommendedWatcher,
    /// Canonical project root
    root: PathBuf,
    filter: WatchFilter,
    /// Channel to send messages to the Orchestrator
    orchestrator_tx: mpsc::Sender<OrchestratorMsg>,
}

impl FsActor {
    /// Validate `dir` and start watching it immediately.
    pub fn new(
        dir: &Path,
        filter: WatchFilter,
        orchestrator_tx: mpsc::Sender<OrchestratorMsg>,
    ) -> Result<Self, WatchSetupError> {
        let root = check_directory(dir)?;

        // Create sync channel for notify (it doesn't support async)
        let (notify_tx, notify_rx) = std::sync::mpsc::channel();
        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = notify_tx.send(res);
        })?;
        watcher.watch(&root, RecursiveMode::Recursive)?;

        // Events are now buffering in notify_rx while the caller continues startup
        crate::debug!("watch"; "watching {}", root.display());

        Ok(Self {
            notify_rx,
            watcher,
            root,
            filter,
            orchestrator_tx,
        })
    }

    /// Canonical path of the watched directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Run the actor event loop until the Orchestrator goes away.
    pub async fn run(self) {
        let Self {
            notify_rx,
            watcher,
            root,
            filter,
            orchestrator_tx,
        } = self;
        // Dropping the watcher stops event delivery
        let _watcher = watcher;

        let (async_tx, mut async_rx) = mpsc::channel::<notify::Event>(64);

        // Spawn a thread to poll notify events and send to async channel
        std::thread::spawn(move || {
            while let Ok(result) = notify_rx.recv() {
                match result {
                    Ok(event) => {
                        if async_tx.blocking_send(event).is_err() {
                            break; // Receiver dropped
                        }
                    }
                    Err(e) => crate::logger::status_warning(&format!("watch error: {e}")),
                }
            }
        });

        while let Some(event) = async_rx.recv().await {
            let Some(change) = filter.classify(&event) else {
                crate::debug!("watch"; "ignored {:?} {:?}", event.kind, event.paths);
                continue;
            };

            crate::debug!(
                "watch";
                "{} {}",
                change.kind.label(),
                display_slash(&relative_to(&root, &change.path))
            );
            if orchestrator_tx
                .send(OrchestratorMsg::Change(change))
                .await
                .is_err()
            {
                break;
            }
        }
    }
}

/// Existence, type and readability checks, returning the canonical path.
pub fn check_directory(dir: &Path) -> Result<PathBuf, WatchSetupError> {
    if !dir.exists() {
        return Err(WatchSetupError::NotFound(dir.to_path_buf()));
    }
    if !dir.is_dir() {
        return Err(WatchSetupError::NotADirectory(dir.to_path_buf()));
    }
    std::fs::read_dir(dir).map_err(|e| WatchSetupError::Unreadable(dir.to_path_buf(), e))?;
    Ok(normalize_path(dir))
}

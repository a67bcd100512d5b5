//! Actor Coordinator - Wires up the watch-loop Actor System
//!
//! The Coordinator is a thin orchestrator that:
//! - Creates communication channels (before anything else, so the watcher
//!   and the HTTP server can be handed their senders early)
//! - Wires up actors
//! - Runs them concurrently and tears them down on shutdown

mod runtime;


use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use crossbeam::channel::{Receiver, Sender};
use tokio::sync::mpsc;

use super::fs::FsActor;
use super::messages::{OrchestratorMsg, WsMsg};
use super::orchestrator::Orchestrator;
use super::ws::{ReloadNotifier, WsActor};
use crate::compiler::{CompileOptions, Compiler};

const CHANNEL_BUFFER: usize = 32;

/// Coordinator - wires up and runs the actor system.
pub struct Coordinator {
    compiler: Arc<dyn Compiler>,
    directory: PathBuf,
    options: CompileOptions,
    orchestrator_tx: mpsc::Sender<OrchestratorMsg>,
    orchestrator_rx: mpsc::Receiver<OrchestratorMsg>,
    ws_tx: mpsc::Sender<WsMsg>,
    ws_rx: mpsc::Receiver<WsMsg>,
    fs: Option<FsActor>,
    ready_tx: Option<Sender<()>>,
    shutdown_rx: Option<Receiver<()>>,
}

impl Coordinator {
    pub fn new(compiler: Arc<dyn Compiler>, directory: PathBuf, options: CompileOptions) -> Self {
        let (orchestrator_tx, orchestrator_rx) = mpsc::channel(CHANNEL_BUFFER);
        let (ws_tx, ws_rx) = mpsc::channel(CHANNEL_BUFFER);
        Self {
            compiler,
            directory,
            options,
            orchestrator_tx,
            orchestrator_rx,
            ws_tx,
            ws_rx,
            fs: None,
            ready_tx: None,
            shutdown_rx: None,
        }
    }

    /// Sender for change events (given to the watcher).
    pub fn orchestrator_tx(&self) -> mpsc::Sender<OrchestratorMsg> {
        self.orchestrator_tx.clone()
    }

    /// Sender for upgraded connections (given to the HTTP server).
    pub fn ws_tx(&self) -> mpsc::Sender<WsMsg> {
        self.ws_tx.clone()
    }

    /// Attach the already-installed watcher.
    pub fn with_watcher(mut self, fs: FsActor) -> Self {
        self.fs = Some(fs);
        self
    }

    /// Signal once the initial compile has finished.
    pub fn with_ready_signal(mut self, tx: Sender<()>) -> Self {
        self.ready_tx = Some(tx);
        self
    }

    /// Set shutdown signal receiver.
    pub fn with_shutdown_signal(mut self, rx: Receiver<()>) -> Self {
        self.shutdown_rx = Some(rx);
        self
    }

    /// Run the actor system, starting with the initial compile.
    pub async fn run(self) -> Result<()> {
        let mut orchestrator = Orchestrator::new(
            self.orchestrator_rx,
            self.compiler,
            self.directory,
            self.options,
            ReloadNotifier::new(self.ws_tx.clone()),
        );
        if let Some(tx) = self.ready_tx {
            orchestrator = orchestrator.with_ready_signal(tx);
        }
        let ws_actor = WsActor::new(self.ws_rx);

        // Initial compile; buffered until the orchestrator starts
        self.orchestrator_tx.send(OrchestratorMsg::Rebuild).await?;

        crate::debug!("actor"; "start");
        runtime::run_actors(
            self.fs,
            orchestrator,
            ws_actor,
            self.orchestrator_tx,
            self.ws_tx,
            self.shutdown_rx,
        )
        .await?;

        crate::debug!("actor"; "stopped");
        Ok(())
    }
}

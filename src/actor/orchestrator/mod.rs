//! Compile Orchestrator
//!
//! Serializes compiles: at most one runs at a time. Changes that arrive
//! while a compile runs set a single pending flag, so any burst yields
//! exactly one follow-up compile.
//!
//! ```text
//! Idle --change--> Running --ok--> Succeeded --> ReloadNotifier::notify()
//!                          \--err--> Failed  --> status ✗
//! ```

mod job;


pub use job::{Admission, CompileJob, JobStatus};

use std::path::PathBuf;
use std::sync::Arc;

use crossbeam::channel::Sender;
use tokio::sync::mpsc;

use super::fs::ChangeEvent;
use super::messages::OrchestratorMsg;
use super::ws::ReloadNotifier;
use crate::compiler::{Artifact, CompileError, CompileOptions, Compiler};
use crate::utils::path::{display_slash, relative_to};
use crate::{debug, logger};

type Outcome = Result<Artifact, CompileError>;

/// Compile Orchestrator - owns the CompileJob
pub struct Orchestrator {
    rx: mpsc::Receiver<OrchestratorMsg>,
    compiler: Arc<dyn Compiler>,
    job: CompileJob,
    notifier: ReloadNotifier,
    /// Signalled once after the first compile finishes
    ready_tx: Option<Sender<()>>,
}

impl Orchestrator {
    pub fn new(
        rx: mpsc::Receiver<OrchestratorMsg>,
        compiler: Arc<dyn Compiler>,
        directory: PathBuf,
        options: CompileOptions,
        notifier: ReloadNotifier,
    ) -> Self {
        Self {
            rx,
            compiler,
            job: CompileJob::new(directory, options),
            notifier,
            ready_tx: None,
        }
    }

    /// Signal `tx` once the first compile has finished, successful or not.
    pub fn with_ready_signal(mut self, tx: Sender<()>) -> Self {
        self.ready_tx = Some(tx);
        self
    }

    /// Run the actor event loop
    pub async fn run(mut self) {
        let (done_tx, mut done_rx) = mpsc::unbounded_channel::<Outcome>();

        loop {
            tokio::select! {
                msg = self.rx.recv() => match msg {
                    Some(OrchestratorMsg::Change(event)) => {
                        self.report_change(&event);
                        self.request(&done_tx);
                    }
                    Some(OrchestratorMsg::Rebuild) => self.request(&done_tx),
                    Some(OrchestratorMsg::Shutdown) | None => {
                        debug!("compile"; "shutting down");
                        break;
                    }
                },
                Some(outcome) = done_rx.recv() => self.finish(outcome, &done_tx).await,
            }
        }
    }

    fn request(&mut self, done_tx: &mpsc::UnboundedSender<Outcome>) {
        match self.job.request() {
            Admission::Start => self.spawn_compile(done_tx),
            Admission::Coalesced => debug!("compile"; "compile running, follow-up scheduled"),
        }
    }

    async fn finish(&mut self, outcome: Outcome, done_tx: &mpsc::UnboundedSender<Outcome>) {
        let elapsed = self.job.elapsed();
        let follow_up = self.job.finish(outcome.is_ok());

        match outcome {
            Ok(artifact) => {
                let name = artifact
                    .path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                logger::status_success(&format!(
                    "compiled {name} in {}ms",
                    elapsed.as_millis()
                ));
                self.notifier.notify().await;
            }
            Err(err) => logger::status_error("compile failed", &err.to_string()),
        }

        if let Some(tx) = self.ready_tx.take() {
            let _ = tx.send(());
        }

        if follow_up {
            self.spawn_compile(done_tx);
        }
    }

    /// Run the compiler on the blocking pool and report back through `done_tx`.
    fn spawn_compile(&self, done_tx: &mpsc::UnboundedSender<Outcome>) {
        let compiler = Arc::clone(&self.compiler);
        let dir = self.job.directory.clone();
        let options = self.job.options.clone();
        let tx = done_tx.clone();

        tokio::spawn(async move {
            let outcome = tokio::task::spawn_blocking(move || compiler.compile(&dir, &options))
                .await
                .unwrap_or_else(|e| Err(CompileError::Io(format!("compile task failed: {e}"))));
            let _ = tx.send(outcome);
        });
    }

    fn report_change(&self, event: &ChangeEvent) {
        let rel = relative_to(&self.job.directory, &event.path);
        logger::status_change(&display_slash(&rel));
    }
}

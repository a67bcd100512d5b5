//! Compile job state: the single-flight guard and the coalescing flag.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use crate::compiler::CompileOptions;

/// Where the job is in its lifecycle. `Succeeded` and `Failed` are idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Idle,
    Running,
    Succeeded,
    Failed,
}

/// Result of asking for a compile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Nothing was running; a compile starts now.
    Start,
    /// A compile is running; one follow-up is scheduled.
    Coalesced,
}

/// The one compile job owned by the Orchestrator.
#[derive(Debug)]
pub struct CompileJob {
    pub status: JobStatus,
    pub started_at: Option<Instant>,
    pub directory: PathBuf,
    pub options: CompileOptions,
    /// Set by changes that arrive while Running
    pending: bool,
}

impl CompileJob {
    pub fn new(directory: PathBuf, options: CompileOptions) -> Self {
        Self {
            status: JobStatus::Idle,
            started_at: None,
            directory,
            options,
            pending: false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == JobStatus::Running
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Request a compile. Marks the job Running when admitted.
    pub fn request(&mut self) -> Admission {
        if self.is_running() {
            self.pending = true;
            Admission::Coalesced
        } else {
            self.start();
            Admission::Start
        }
    }

    /// Record the outcome of the running compile.
    ///
    /// Returns `true` when a follow-up compile was started.
    pub fn finish(&mut self, success: bool) -> bool {
        self.status = if success {
            JobStatus::Succeeded
        } else {
            JobStatus::Failed
        };
        if std::mem::take(&mut self.pending) {
            self.start();
            true
        } else {
            false
        }
    }

    /// Time since the current (or last) compile started.
    pub fn elapsed(&self) -> Duration {
        self.started_at.map(|t| t.elapsed()).unwrap_or_default()
    }

    fn start(&mut self) {
        self.status = JobStatus::Running;
        self.started_at = Some(Instant::now());
    }
}

//! Decides which raw notify events become `ChangeEvent`s.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use notify::EventKind;
use notify::event::{ModifyKind, RenameMode};

use super::types::{ChangeEvent, ChangeKind};
use crate::utils::path::{has_hidden_component, relative_to};

/// Extensions that can affect the compiled document.
pub const WATCHED_EXTENSIONS: &[&str] = &["tex", "bib", "sty", "cls", "png", "jpg", "jpeg", "pdf"];

/// Relevance filter for one project directory.
#[derive(Debug, Clone)]
pub struct WatchFilter {
    root: PathBuf,
    output: OsString,
}

impl WatchFilter {
    pub fn new(root: &Path, output: &str) -> Self {
        Self {
            root: root.to_path_buf(),
            output: OsString::from(output),
        }
    }

    /// Whether a change to `path` should trigger a compile.
    pub fn is_relevant(&self, path: &Path) -> bool {
        let Some(name) = path.file_name() else {
            return false;
        };
        if name == self.output.as_os_str() {
            return false;
        }
        if has_hidden_component(&relative_to(&self.root, path)) {
            return false;
        }
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| {
                WATCHED_EXTENSIONS
                    .iter()
                    .any(|w| w.eq_ignore_ascii_case(ext))
            })
    }

    /// Convert a raw event into at most one `ChangeEvent` (first relevant path).
    pub fn classify(&self, event: &notify::Event) -> Option<ChangeEvent> {
        let kind = change_kind(&event.kind)?;
        event
            .paths
            .iter()
            .find(|p| self.is_relevant(p))
            .map(|p| ChangeEvent::new(p.clone(), kind))
    }
}

fn change_kind(kind: &EventKind) -> Option<ChangeKind> {
    match kind {
        EventKind::Create(_) => Some(ChangeKind::Created),
        EventKind::Remove(_) => Some(ChangeKind::Removed),
        // Access time, permissions, ownership
        EventKind::Modify(ModifyKind::Metadata(_)) => None,
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => Some(ChangeKind::Created),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => Some(ChangeKind::Removed),
        EventKind::Modify(_) | EventKind::Any => Some(ChangeKind::Modified),
        EventKind::Access(_) | EventKind::Other => None,
    }
}

//! JSON-lines snapshot log.
//!
//! One line per completed scoring cycle, appended to the status location
//! consumed by external dashboards. This subsystem only produces the file;
//! it never renders or prunes it.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use canarywatch_core::EntropySnapshot;

pub struct SnapshotLog {
    path: PathBuf,
}

impl SnapshotLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Append one snapshot as a JSON line, creating the file and its parent
    /// directory on first use.
    pub fn append(&self, snapshot: &EntropySnapshot) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create snapshot log directory {}", parent.display())
            })?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("failed to open snapshot log {}", self.path.display()))?;

        let json = serde_json::to_string(snapshot)?;
        writeln!(file, "{json}")?;
        Ok(())
    }
}

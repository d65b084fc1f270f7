// src/recovery.rs

//! Durable scheduler state for shutdown/restart.
//!
//! The log is a JSON-lines file holding one record per non-terminal task.
//! Writes go through a temp file plus rename so a crash mid-persist leaves
//! either the old snapshot or the new one, never a torn file. Reads skip
//! corrupt lines individually; one bad record never discards the rest.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::{Result, SchedulerError};
use crate::task::TaskSpec;
use crate::types::{TaskId, TaskStatus};

/// One persisted non-terminal task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryRecord {
    pub task: TaskSpec,
    pub status: TaskStatus,
    /// Dependencies that had not completed at snapshot time.
    #[serde(default)]
    pub remaining_dependencies: Vec<TaskId>,
    #[serde(default)]
    pub retry_count: u32,
}

#[derive(Debug, Clone)]
pub struct RecoveryLog {
    path: PathBuf,
}

impl RecoveryLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Atomically replace the log with the given snapshot.
    pub fn persist(&self, records: &[RecoveryRecord]) -> Result<()> {
        let tmp = self.path.with_extension("tmp");
        {
            let mut file = fs::File::create(&tmp)?;
            for record in records {
                let line = serde_json::to_string(record)?;
                writeln!(file, "{line}")?;
            }
            file.flush()?;
        }
        fs::rename(&tmp, &self.path)?;
        info!(
            path = %self.path.display(),
            records = records.len(),
            "persisted recovery snapshot"
        );
        Ok(())
    }

    /// Read the snapshot back, skipping corrupt lines with a warning.
    ///
    /// A missing file is an empty snapshot, not an error; an unreadable file
    /// is.
    pub fn recover(&self) -> Result<Vec<RecoveryRecord>> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "no recovery log, starting fresh");
            return Ok(Vec::new());
        }
        let contents = fs::read_to_string(&self.path).map_err(|err| {
            SchedulerError::Recovery(format!(
                "cannot read {}: {err}",
                self.path.display()
            ))
        })?;

        let mut records = Vec::new();
        for (lineno, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<RecoveryRecord>(line) {
                Ok(record) => records.push(record),
                Err(err) => {
                    warn!(
                        path = %self.path.display(),
                        line = lineno + 1,
                        error = %err,
                        "skipping corrupt recovery record"
                    );
                }
            }
        }
        info!(
            path = %self.path.display(),
            records = records.len(),
            "recovered snapshot"
        );
        Ok(records)
    }

    /// Delete the log, e.g. after a run finished with nothing left to
    /// recover. Missing file is fine.
    pub fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

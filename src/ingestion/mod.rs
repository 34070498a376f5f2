//! Ingestion Module - getting local spreadsheets into the distributed store
//!
//! - `DirectoryProvisioner` makes sure the base namespace exists (handling safe mode)
//! - `FileUploader` copies one file and verifies it landed
//! - `IngestionOrchestrator` runs a whole directory and reports per-file outcomes

pub mod orchestrator;
pub mod provisioner;
pub mod uploader;

pub use orchestrator::{IngestionOrchestrator, IngestionRun, LocalModeMarker, ReadSummary};
pub use provisioner::DirectoryProvisioner;
pub use uploader::FileUploader;

use crate::cluster::{FailureCause, RemotePath};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Outcome of uploading one file. Immutable once created.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UploadRecord {
    local_path: PathBuf,
    remote_path: RemotePath,
    byte_size: u64,
    succeeded: bool,
    failure: Option<FailureCause>,
}

impl UploadRecord {
    pub fn success(local_path: PathBuf, remote_path: RemotePath, byte_size: u64) -> Self {
        Self {
            local_path,
            remote_path,
            byte_size,
            succeeded: true,
            failure: None,
        }
    }

    pub fn failure(local_path: PathBuf, remote_path: RemotePath, byte_size: u64, cause: FailureCause) -> Self {
        Self {
            local_path,
            remote_path,
            byte_size,
            succeeded: false,
            failure: Some(cause),
        }
    }

    pub fn local_path(&self) -> &Path {
        &self.local_path
    }

    pub fn remote_path(&self) -> &RemotePath {
        &self.remote_path
    }

    pub fn byte_size(&self) -> u64 {
        self.byte_size
    }

    pub fn succeeded(&self) -> bool {
        self.succeeded
    }

    pub fn failure_cause(&self) -> Option<&FailureCause> {
        self.failure.as_ref()
    }

    /// File name for reports
    pub fn name(&self) -> String {
        self.local_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.local_path.display().to_string())
    }
}

/// Per-run summary of an upload batch
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BatchReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub attempted: usize,
    pub succeeded: usize,
    pub records: Vec<UploadRecord>,
    /// Set when a local-mode marker was written for this run
    pub local_mode_marker: Option<PathBuf>,
}

impl BatchReport {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            started_at: Utc::now(),
            attempted: 0,
            succeeded: 0,
            records: Vec::new(),
            local_mode_marker: None,
        }
    }

    pub fn push(&mut self, record: UploadRecord) {
        self.attempted += 1;
        if record.succeeded() {
            self.succeeded += 1;
        }
        self.records.push(record);
    }

    pub fn failed(&self) -> usize {
        self.attempted - self.succeeded
    }

    /// No eligible file was found
    pub fn is_empty(&self) -> bool {
        self.attempted == 0
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed() == 0
    }

    /// Fraction of attempted files that landed; 1.0 for an empty batch
    pub fn success_ratio(&self) -> f64 {
        if self.attempted == 0 {
            1.0
        } else {
            self.succeeded as f64 / self.attempted as f64
        }
    }
}

impl Default for BatchReport {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_counts() {
        let remote = RemotePath::under("/manufacture_data", "a.xls").unwrap();
        let mut report = BatchReport::new();
        assert!(report.is_empty());
        assert_eq!(report.success_ratio(), 1.0);

        report.push(UploadRecord::success(PathBuf::from("data/a.xls"), remote.clone(), 2048));
        report.push(UploadRecord::failure(
            PathBuf::from("data/b.xlsx"),
            remote,
            0,
            FailureCause::MissingLocalFile,
        ));

        assert_eq!(report.attempted, 2);
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failed(), 1);
        assert!(!report.all_succeeded());
        assert_eq!(report.success_ratio(), 0.5);
        assert_eq!(report.records[1].name(), "b.xlsx");
        assert_eq!(report.records[1].failure_cause(), Some(&FailureCause::MissingLocalFile));
    }
}

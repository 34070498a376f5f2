//! Ingestion Orchestrator - Main ingestion coordinator
//!
//! Provisions the base path, uploads every eligible file in a directory and,
//! optionally, reads each uploaded file back through the resilient reader.

use crate::cluster::{ClusterAdminClient, DistributedStore, RemotePath};
use crate::config::PipelineConfig;
use crate::confirm::{ConfirmationPolicy, ConfirmationPrompt};
use crate::error::{PipelineError, Result};
use crate::execution::{ReadOutcome, ReadTier, ResilientReader};
use crate::ingestion::{BatchReport, DirectoryProvisioner, FileUploader};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

const MARKER_FILE: &str = "local_mode.json";

/// Ingestion Orchestrator - Coordinates the entire upload process
pub struct IngestionOrchestrator<'a> {
    store: &'a dyn DistributedStore,
    admin: &'a dyn ClusterAdminClient,
    confirmation: &'a dyn ConfirmationPolicy,
    config: &'a PipelineConfig,
}

/// Read-back result for one uploaded file
#[derive(Debug)]
pub struct ReadSummary {
    pub remote: RemotePath,
    pub outcome: Result<ReadOutcome>,
}

impl ReadSummary {
    pub fn tier(&self) -> Option<ReadTier> {
        self.outcome.as_ref().ok().map(|o| o.tier)
    }

    pub fn succeeded(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Upload report plus per-file read-back results
#[derive(Debug)]
pub struct IngestionRun {
    pub report: BatchReport,
    pub reads: Vec<ReadSummary>,
}

impl<'a> IngestionOrchestrator<'a> {
    pub fn new(
        store: &'a dyn DistributedStore,
        admin: &'a dyn ClusterAdminClient,
        confirmation: &'a dyn ConfirmationPolicy,
        config: &'a PipelineConfig,
    ) -> Self {
        Self {
            store,
            admin,
            confirmation,
            config,
        }
    }

    /// Upload every eligible spreadsheet under `local_dir`.
    ///
    /// Cluster-level problems abort with an error; single-file failures are
    /// recorded in the report and never stop the batch. A directory without
    /// eligible files yields an empty report, which callers treat as a failure.
    pub async fn run(&self, local_dir: &Path) -> Result<BatchReport> {
        let ping = self
            .store
            .ping()
            .await
            .map_err(|e| PipelineError::ClusterUnavailable(e.to_string()))?;
        if !ping.success() {
            return Err(PipelineError::ClusterUnavailable(format!(
                "listing the store root failed: {}",
                ping.text().trim()
            )));
        }
        info!("✅ HDFS is reachable");

        if !local_dir.is_dir() {
            return Err(PipelineError::Config(format!(
                "local data directory {} does not exist",
                local_dir.display()
            )));
        }

        let base = self.config.base_path()?;
        DirectoryProvisioner::new(
            self.store,
            self.admin,
            self.confirmation,
            self.config.release_policy.clone(),
        )
        .ensure_base_path(&base)
        .await?;

        let files = self.eligible_files(local_dir)?;
        if files.is_empty() {
            warn!(
                "No {} files found in {}",
                self.config.allowed_extensions.join("/"),
                local_dir.display()
            );
        } else {
            info!("Found {} spreadsheet files to upload", files.len());
        }

        let uploader = FileUploader::new(self.store);
        let mut report = BatchReport::new();
        for file in files {
            let name = file.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
            let remote = self.config.remote_path_for(&name)?;
            report.push(uploader.upload(&file, &remote).await);
        }

        info!(
            "Upload finished: {}/{} files succeeded (run {})",
            report.succeeded, report.attempted, report.run_id
        );
        for record in &report.records {
            match record.failure_cause() {
                None => info!("  ✅ {} ({} bytes)", record.name(), record.byte_size()),
                Some(cause) => warn!("  ❌ {}: {}", record.name(), cause),
            }
        }

        let prompt = if report.is_empty() {
            Some(ConfirmationPrompt::NothingToUpload {
                data_dir: local_dir.display().to_string(),
            })
        } else if !report.all_succeeded() {
            Some(ConfirmationPrompt::EnableLocalMode {
                attempted: report.attempted,
                succeeded: report.succeeded,
            })
        } else {
            None
        };
        if let Some(prompt) = prompt {
            if self.confirmation.confirm(&prompt) {
                report.local_mode_marker = Some(LocalModeMarker::write(self.config)?);
            }
        }

        Ok(report)
    }

    /// `run`, then read every successfully uploaded file back.
    pub async fn ingest_and_read(&self, local_dir: &Path, reader: &ResilientReader<'_>) -> Result<IngestionRun> {
        let report = self.run(local_dir).await?;

        let mut reads = Vec::new();
        for record in report.records.iter().filter(|r| r.succeeded()) {
            let remote = record.remote_path().clone();
            let outcome = reader.read(&remote).await;
            match &outcome {
                Ok(read) => info!(
                    "✅ {} read via {} tier: {} rows x {} columns",
                    remote,
                    read.tier,
                    read.result.row_count(),
                    read.result.columns().len()
                ),
                Err(e) => error!("❌ Reading {} failed: {}", remote, e),
            }
            reads.push(ReadSummary { remote, outcome });
        }

        Ok(IngestionRun { report, reads })
    }

    fn eligible_files(&self, local_dir: &Path) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(local_dir)? {
            let path = entry?.path();
            if path.is_file() && self.config.is_allowed(&path) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}

/// Marker telling downstream readers to stay on local files
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalModeMarker {
    pub local_data_dir: PathBuf,
    pub use_local_mode: bool,
    pub created_at: DateTime<Utc>,
}

impl LocalModeMarker {
    /// Create the backup directory and write the marker beside it.
    /// Returns the marker path.
    pub fn write(config: &PipelineConfig) -> Result<PathBuf> {
        let dir = &config.local_mode_dir;
        std::fs::create_dir_all(dir)?;

        let marker = Self {
            local_data_dir: dir.clone(),
            use_local_mode: true,
            created_at: Utc::now(),
        };
        let path = Self::path_for(dir);
        std::fs::write(&path, serde_json::to_string_pretty(&marker)?)?;

        info!("✅ Local mode enabled, backup directory {}", dir.display());
        info!("Readers should check {} and stay on local files", path.display());
        Ok(path)
    }

    /// Read a marker back, `None` when local mode was never enabled.
    pub fn load(config: &PipelineConfig) -> Result<Option<Self>> {
        let path = Self::path_for(&config.local_mode_dir);
        if !path.exists() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&text)?))
    }

    fn path_for(dir: &Path) -> PathBuf {
        dir.parent().unwrap_or_else(|| Path::new("")).join(MARKER_FILE)
    }
}

//! File Uploader - one local spreadsheet into the store

use crate::cluster::{DistributedStore, FailureCause, RemotePath};
use crate::error::{PipelineError, Result};
use crate::ingestion::UploadRecord;
use std::path::Path;
use tracing::{error, info, warn};

pub struct FileUploader<'a> {
    store: &'a dyn DistributedStore,
}

impl<'a> FileUploader<'a> {
    pub fn new(store: &'a dyn DistributedStore) -> Self {
        Self { store }
    }

    /// Copy `local` to `remote`, overwriting. Failures are recorded, never returned.
    pub async fn upload(&self, local: &Path, remote: &RemotePath) -> UploadRecord {
        let byte_size = match tokio::fs::metadata(local).await {
            Ok(meta) if meta.is_file() => meta.len(),
            _ => {
                error!("❌ {} does not exist or is not a regular file", local.display());
                return UploadRecord::failure(local.to_path_buf(), remote.clone(), 0, FailureCause::MissingLocalFile);
            }
        };

        info!(
            "Uploading {} ({:.1} KB) to {}",
            local.display(),
            byte_size as f64 / 1024.0,
            remote
        );

        match self.transfer(local, remote).await {
            Ok(()) => {
                info!("✅ Uploaded {}", remote);
                UploadRecord::success(local.to_path_buf(), remote.clone(), byte_size)
            }
            Err(PipelineError::UploadFailed { cause, .. }) => {
                error!("❌ Upload of {} failed: {}", local.display(), cause);
                if let Some(hint) = cause.hint() {
                    warn!("{}", hint);
                }
                UploadRecord::failure(local.to_path_buf(), remote.clone(), byte_size, cause)
            }
            Err(e) => {
                error!("❌ Upload of {} failed: {}", local.display(), e);
                UploadRecord::failure(
                    local.to_path_buf(),
                    remote.clone(),
                    byte_size,
                    FailureCause::Unknown(e.to_string()),
                )
            }
        }
    }

    /// Whether `remote` is visible in the store; any failure counts as absent.
    pub async fn check_exists(&self, remote: &RemotePath) -> bool {
        match self.store.exists(remote).await {
            Ok(exists) => exists,
            Err(e) => {
                warn!("Existence check for {} failed: {}", remote, e);
                false
            }
        }
    }

    async fn transfer(&self, local: &Path, remote: &RemotePath) -> Result<()> {
        let failed = |cause| PipelineError::UploadFailed {
            path: remote.to_string(),
            cause,
        };

        let output = self.store.put(local, remote, true).await?;
        if !output.success() {
            return Err(failed(FailureCause::classify(&output.text())));
        }
        if !self.check_exists(remote).await {
            return Err(failed(FailureCause::NotVisible));
        }
        Ok(())
    }
}

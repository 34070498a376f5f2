//! Directory Provisioner - creates the base namespace once per run

use crate::cluster::{ClusterAdminClient, ClusterState, ClusterStateGuard, DistributedStore, FailureCause, RemotePath};
use crate::confirm::{ConfirmationPolicy, ConfirmationPrompt};
use crate::error::{PipelineError, Result};
use crate::retry::RetryPolicy;
use tracing::{error, info, warn};

pub struct DirectoryProvisioner<'a> {
    store: &'a dyn DistributedStore,
    guard: ClusterStateGuard<'a>,
    confirmation: &'a dyn ConfirmationPolicy,
    release_policy: RetryPolicy,
}

impl<'a> DirectoryProvisioner<'a> {
    pub fn new(
        store: &'a dyn DistributedStore,
        admin: &'a dyn ClusterAdminClient,
        confirmation: &'a dyn ConfirmationPolicy,
        release_policy: RetryPolicy,
    ) -> Self {
        Self {
            store,
            guard: ClusterStateGuard::new(admin),
            confirmation,
            release_policy,
        }
    }

    /// Make sure `path` exists. Re-running on an existing path is a no-op.
    pub async fn ensure_base_path(&self, path: &RemotePath) -> Result<()> {
        if self.guard.probe().await == ClusterState::ProtectiveMode {
            warn!("⚠️ HDFS is in safe mode, trying to leave it");
            let released = self
                .release_policy
                .retry_until("Safe mode release", || self.guard.attempt_release())
                .await;

            if !released {
                warn!("Safe mode release needs HDFS administrator rights, or wait for the NameNode to leave it on its own");
                let prompt = ConfirmationPrompt::ProceedDespiteProtectiveMode {
                    base_path: path.to_string(),
                };
                if !self.confirmation.confirm(&prompt) {
                    return Err(PipelineError::ProtectiveModeBlocked(format!(
                        "not creating {} while the cluster is in safe mode",
                        path
                    )));
                }
                info!("Proceeding while in safe mode as confirmed");
            }
        }

        let output = self.store.mkdirs(path).await.map_err(|e| {
            PipelineError::ClusterUnavailable(format!("mkdir {} could not be issued: {}", path, e))
        })?;

        if output.success() || output.text().contains("File exists") {
            info!("✅ Base directory ready: {}", path);
            return Ok(());
        }

        let cause = FailureCause::classify(&output.text());
        error!("❌ Failed to create {}: {}", path, cause);
        if let Some(hint) = cause.hint() {
            warn!("{}", hint);
        }
        Err(PipelineError::ProvisioningFailed {
            path: path.to_string(),
            cause,
        })
    }
}

//! Cluster State Guard
//!
//! Detects HDFS safe mode and makes one authoritative attempt to leave it.
//! The guard never loops on its own; bounded retries belong to the caller.

use crate::cluster::{AdminCommand, ClusterAdminClient};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

const SAFE_MODE_ON: &str = "Safe mode is ON";
const SAFE_MODE_OFF: &str = "Safe mode is OFF";

/// Writability of the distributed store, derived from one probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClusterState {
    Writable,
    ProtectiveMode,
    /// Probe failed; callers treat this optimistically
    Unknown,
}

impl ClusterState {
    /// Classify `dfsadmin -safemode get` output.
    pub fn from_status_text(text: &str) -> Self {
        if text.contains(SAFE_MODE_ON) {
            ClusterState::ProtectiveMode
        } else {
            ClusterState::Writable
        }
    }
}

pub struct ClusterStateGuard<'a> {
    admin: &'a dyn ClusterAdminClient,
}

impl<'a> ClusterStateGuard<'a> {
    pub fn new(admin: &'a dyn ClusterAdminClient) -> Self {
        Self { admin }
    }

    pub async fn probe(&self) -> ClusterState {
        match self.admin.admin_status().await {
            Ok(output) if output.success() => ClusterState::from_status_text(&output.stdout),
            Ok(output) => {
                warn!("Safe mode probe exited with {}: {}", output.status, output.text().trim());
                ClusterState::Unknown
            }
            Err(e) => {
                warn!("Safe mode probe failed: {}", e);
                ClusterState::Unknown
            }
        }
    }

    /// Issue `-safemode leave` once; true only if the response confirms it.
    pub async fn attempt_release(&self) -> bool {
        let command = AdminCommand::LeaveSafeMode;
        info!("Attempting to leave safe mode: {}", command);

        match self.admin.admin_command(command).await {
            Ok(output) if output.success() && output.stdout.contains(SAFE_MODE_OFF) => {
                info!("✅ Left safe mode");
                true
            }
            Ok(output) => {
                warn!(
                    "⚠️ Could not confirm safe mode release (exit {}): {}",
                    output.status,
                    output.text().trim()
                );
                warn!("Run manually as an HDFS administrator: {}", command);
                false
            }
            Err(e) => {
                warn!("❌ Safe mode release failed: {}", e);
                warn!("Run manually as an HDFS administrator: {}", command);
                false
            }
        }
    }
}

//! Cluster Module - Distributed store access
//!
//! Everything the pipeline needs from HDFS goes through two narrow traits:
//! - `DistributedStore` for namespace and file transfer commands
//! - `ClusterAdminClient` for administrative (dfsadmin) commands
//!
//! `HadoopCli` implements both by invoking the `hadoop` binary; tests use
//! in-memory fakes.

pub mod guard;
pub mod hadoop;
pub mod path;

pub use guard::{ClusterState, ClusterStateGuard};
pub use hadoop::HadoopCli;
pub use path::RemotePath;

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Exit status and captured output of one store/admin invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutput {
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            status: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failed(status: i32, stderr: impl Into<String>) -> Self {
        Self {
            status,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.status == 0
    }

    /// Both streams, for marker matching and diagnostics
    pub fn text(&self) -> String {
        if self.stderr.is_empty() {
            self.stdout.clone()
        } else if self.stdout.is_empty() {
            self.stderr.clone()
        } else {
            format!("{}\n{}", self.stdout, self.stderr)
        }
    }
}

/// Administrative commands the pipeline is allowed to issue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminCommand {
    LeaveSafeMode,
}

impl AdminCommand {
    pub fn args(&self) -> &'static [&'static str] {
        match self {
            AdminCommand::LeaveSafeMode => &["dfsadmin", "-safemode", "leave"],
        }
    }
}

impl fmt::Display for AdminCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "hadoop {}", self.args().join(" "))
    }
}

/// Root cause of a failed store command, for user-facing diagnostics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureCause {
    PermissionDenied,
    ProtectiveMode,
    MissingLocalFile,
    /// Transfer reported success but the file is not visible afterwards
    NotVisible,
    Unknown(String),
}

impl FailureCause {
    /// Classify the textual output of a failed store command.
    pub fn classify(output: &str) -> Self {
        let lower = output.to_lowercase();
        if lower.contains("permission denied") || lower.contains("accesscontrolexception") {
            FailureCause::PermissionDenied
        } else if lower.contains("safe mode") || lower.contains("safemodeexception") {
            FailureCause::ProtectiveMode
        } else {
            let detail = output.trim();
            FailureCause::Unknown(detail.lines().last().unwrap_or(detail).to_string())
        }
    }

    /// Operator hint printed alongside the failure
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            FailureCause::PermissionDenied => {
                Some("make sure the current user may write to HDFS, or run as the HDFS superuser")
            }
            FailureCause::ProtectiveMode => Some(
                "the NameNode is still in safe mode; wait for it to leave automatically or run `hadoop dfsadmin -safemode leave` as an administrator",
            ),
            FailureCause::MissingLocalFile => Some("the local file vanished or is not a regular file"),
            FailureCause::NotVisible => Some("list the target directory with `hadoop fs -ls`"),
            FailureCause::Unknown(_) => None,
        }
    }
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureCause::PermissionDenied => write!(f, "permission denied"),
            FailureCause::ProtectiveMode => write!(f, "cluster is in safe mode"),
            FailureCause::MissingLocalFile => write!(f, "local file missing"),
            FailureCause::NotVisible => write!(f, "file not visible after transfer"),
            FailureCause::Unknown(detail) => write!(f, "{}", detail),
        }
    }
}

/// Namespace and transfer commands against the distributed store.
///
/// `Err` means the command could not be issued at all; a command that ran and
/// failed comes back as a non-zero `CommandOutput`.
#[async_trait]
pub trait DistributedStore: Send + Sync {
    /// Cheap reachability check (list the root)
    async fn ping(&self) -> Result<CommandOutput>;

    async fn exists(&self, path: &RemotePath) -> Result<bool>;

    /// Recursive create
    async fn mkdirs(&self, path: &RemotePath) -> Result<CommandOutput>;

    async fn put(&self, local: &Path, remote: &RemotePath, overwrite: bool) -> Result<CommandOutput>;

    async fn get(&self, remote: &RemotePath, local: &Path) -> Result<CommandOutput>;
}

/// Administrative access to the cluster (status probe and commands)
#[async_trait]
pub trait ClusterAdminClient: Send + Sync {
    async fn admin_status(&self) -> Result<CommandOutput>;

    async fn admin_command(&self, command: AdminCommand) -> Result<CommandOutput>;
}

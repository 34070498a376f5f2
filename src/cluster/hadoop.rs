//! Hadoop CLI client
//!
//! Issues `hadoop fs ...` and `hadoop dfsadmin ...` through tokio's process API.
//! Timeouts are whatever the Hadoop client is configured with.

use crate::cluster::{AdminCommand, ClusterAdminClient, CommandOutput, DistributedStore, RemotePath};
use crate::error::{PipelineError, Result};
use async_trait::async_trait;
use std::path::Path;
use tokio::process::Command;
use tracing::debug;

/// Store and admin client backed by the `hadoop` binary
pub struct HadoopCli {
    binary: String,
    filesystem_uri: String,
}

impl HadoopCli {
    /// # Arguments
    /// * `binary` - Hadoop launcher (e.g. "hadoop" or an absolute path)
    /// * `filesystem_uri` - default FS (e.g. "hdfs://localhost:9000")
    pub fn new(binary: impl Into<String>, filesystem_uri: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            filesystem_uri: filesystem_uri.into(),
        }
    }

    async fn run(&self, args: &[&str]) -> Result<CommandOutput> {
        let rendered = format!("{} {}", self.binary, args.join(" "));
        debug!("Running {}", rendered);

        let output = Command::new(&self.binary)
            .args(args)
            .output()
            .await
            .map_err(|source| PipelineError::Command {
                command: rendered.clone(),
                source,
            })?;

        let result = CommandOutput {
            // Killed by a signal has no exit code
            status: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        debug!("{} exited with {}", rendered, result.status);
        Ok(result)
    }

    fn uri(&self, path: &RemotePath) -> String {
        path.to_uri(&self.filesystem_uri)
    }
}

#[async_trait]
impl DistributedStore for HadoopCli {
    async fn ping(&self) -> Result<CommandOutput> {
        let root = format!("{}/", self.filesystem_uri.trim_end_matches('/'));
        self.run(&["fs", "-ls", &root]).await
    }

    async fn exists(&self, path: &RemotePath) -> Result<bool> {
        let uri = self.uri(path);
        Ok(self.run(&["fs", "-test", "-e", &uri]).await?.success())
    }

    async fn mkdirs(&self, path: &RemotePath) -> Result<CommandOutput> {
        let uri = self.uri(path);
        self.run(&["fs", "-mkdir", "-p", &uri]).await
    }

    async fn put(&self, local: &Path, remote: &RemotePath, overwrite: bool) -> Result<CommandOutput> {
        let local = local.to_string_lossy();
        let uri = self.uri(remote);
        if overwrite {
            self.run(&["fs", "-put", "-f", &local, &uri]).await
        } else {
            self.run(&["fs", "-put", &local, &uri]).await
        }
    }

    async fn get(&self, remote: &RemotePath, local: &Path) -> Result<CommandOutput> {
        let uri = self.uri(remote);
        let local = local.to_string_lossy();
        self.run(&["fs", "-get", &uri, &local]).await
    }
}

#[async_trait]
impl ClusterAdminClient for HadoopCli {
    async fn admin_status(&self) -> Result<CommandOutput> {
        self.run(&["dfsadmin", "-safemode", "get"]).await
    }

    async fn admin_command(&self, command: AdminCommand) -> Result<CommandOutput> {
        self.run(command.args()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_binary_is_a_command_error() {
        let cli = HadoopCli::new("/nonexistent/bin/hadoop", "hdfs://localhost:9000");
        let err = cli.admin_status().await.unwrap_err();
        match err {
            PipelineError::Command { command, .. } => {
                assert_eq!(command, "/nonexistent/bin/hadoop dfsadmin -safemode get");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}

//! Resilient Reader - distributed first, local fallback second
//!
//! Reports which tier produced the table so callers can surface it.

use crate::cluster::RemotePath;
use crate::error::{PipelineError, Result};
use crate::execution::engine::ComputeEngine;
use crate::execution::fallback::FallbackReader;
use crate::execution::reader::DistributedReader;
use crate::execution::sheet::{CandidateFailure, SheetCandidates, SheetSelector};
use crate::table::TabularResult;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReadTier {
    Distributed,
    Fallback,
}

impl fmt::Display for ReadTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadTier::Distributed => write!(f, "distributed"),
            ReadTier::Fallback => write!(f, "local fallback"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReadOutcome {
    pub result: TabularResult,
    pub tier: ReadTier,
    /// Winning selector when the distributed tier produced the table
    pub selector: Option<SheetSelector>,
    /// Distributed candidates that failed before the result was produced
    pub candidate_failures: Vec<CandidateFailure>,
}

pub struct ResilientReader<'a> {
    engine: Option<&'a dyn ComputeEngine>,
    filesystem_uri: String,
    candidates: SheetCandidates,
    distributed: DistributedReader,
    fallback: FallbackReader<'a>,
}

impl<'a> ResilientReader<'a> {
    /// # Arguments
    /// * `engine` - open engine handle, or `None` to read locally only
    /// * `filesystem_uri` - prefix turning store paths into engine URIs
    /// * `candidates` - sheet selectors for the distributed tier
    /// * `fallback` - local reader used when the distributed tier gives up
    pub fn new(
        engine: Option<&'a dyn ComputeEngine>,
        filesystem_uri: impl Into<String>,
        candidates: SheetCandidates,
        fallback: FallbackReader<'a>,
    ) -> Self {
        Self {
            engine,
            filesystem_uri: filesystem_uri.into(),
            candidates,
            distributed: DistributedReader::new(),
            fallback,
        }
    }

    pub async fn read(&self, remote: &RemotePath) -> Result<ReadOutcome> {
        self.read_with(remote, self.candidates.clone()).await
    }

    /// Like `read`, with an explicit candidate list for this call only
    pub async fn read_with(&self, remote: &RemotePath, candidates: SheetCandidates) -> Result<ReadOutcome> {
        let mut candidate_failures = Vec::new();

        match self.engine {
            Some(engine) => {
                let uri = remote.to_uri(&self.filesystem_uri);
                match self.distributed.read(engine, &uri, candidates).await {
                    Ok(read) => {
                        return Ok(ReadOutcome {
                            result: read.result,
                            tier: ReadTier::Distributed,
                            selector: Some(read.selector),
                            candidate_failures: read.failures,
                        })
                    }
                    Err(PipelineError::ReadExhausted { failures, .. }) => {
                        warn!(
                            "⚠️ Distributed read of {} exhausted {} sheet candidates, falling back to a local read",
                            remote,
                            failures.len()
                        );
                        candidate_failures = failures;
                    }
                    Err(e) => return Err(e),
                }
            }
            None => info!("No compute engine available, reading {} locally", remote),
        }

        let result = self.fallback.read_via_local_copy(remote).await?;
        Ok(ReadOutcome {
            result,
            tier: ReadTier::Fallback,
            selector: None,
            candidate_failures,
        })
    }
}

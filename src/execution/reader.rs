//! Distributed Reader
//!
//! Tries sheet selectors one at a time against the compute engine and stops at
//! the first that yields a table. Attempts are strictly sequential.

use crate::error::{PipelineError, Result};
use crate::execution::engine::ComputeEngine;
use crate::execution::sheet::{CandidateFailure, SheetCandidates, SheetSelector};
use crate::table::TabularResult;
use tracing::{info, warn};

/// A successful distributed read and the candidates that failed before it
#[derive(Debug, Clone)]
pub struct DistributedRead {
    pub result: TabularResult,
    pub selector: SheetSelector,
    pub failures: Vec<CandidateFailure>,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DistributedReader;

impl DistributedReader {
    pub fn new() -> Self {
        Self
    }

    pub async fn read(
        &self,
        engine: &dyn ComputeEngine,
        uri: &str,
        candidates: SheetCandidates,
    ) -> Result<DistributedRead> {
        let total = candidates.len();
        let mut failures = Vec::new();
        let mut remaining = candidates.into_iter();

        while let Some(selector) = remaining.next() {
            info!(
                "Reading {} via {} with sheet {} ({} of {})",
                uri,
                engine.name(),
                selector,
                failures.len() + 1,
                total
            );

            match engine.submit_read(uri, &selector).await {
                Ok(result) => {
                    info!(
                        "✅ Read {} rows x {} columns from {} (sheet {})",
                        result.row_count(),
                        result.columns().len(),
                        uri,
                        selector
                    );
                    return Ok(DistributedRead {
                        result,
                        selector,
                        failures,
                    });
                }
                Err(PipelineError::EngineUnavailable(reason)) => {
                    warn!("❌ {} is unavailable, skipping remaining sheets: {}", engine.name(), reason);
                    failures.push(CandidateFailure {
                        selector,
                        reason: format!("engine unavailable: {}", reason),
                    });
                    failures.extend(remaining.by_ref().map(|selector| CandidateFailure {
                        selector,
                        reason: "not attempted: engine unavailable".to_string(),
                    }));
                    break;
                }
                Err(e) => {
                    warn!("Sheet {} failed for {}: {}", selector, uri, e);
                    failures.push(CandidateFailure {
                        selector,
                        reason: e.to_string(),
                    });
                }
            }
        }

        Err(PipelineError::ReadExhausted {
            path: uri.to_string(),
            failures,
        })
    }
}

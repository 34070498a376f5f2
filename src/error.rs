use crate::cluster::FailureCause;
use crate::execution::sheet::CandidateFailure;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Distributed store unavailable: {0}")]
    ClusterUnavailable(String),

    #[error("Distributed store is in safe mode and writes were not confirmed: {0}")]
    ProtectiveModeBlocked(String),

    #[error("Failed to provision {path}: {cause}")]
    ProvisioningFailed { path: String, cause: FailureCause },

    #[error("Upload of {path} failed: {cause}")]
    UploadFailed { path: String, cause: FailureCause },

    #[error("All {} sheet candidates failed for {path}", failures.len())]
    ReadExhausted {
        path: String,
        failures: Vec<CandidateFailure>,
    },

    #[error("Local fallback read of {path} failed: {reason}")]
    FallbackExhausted { path: String, reason: String },

    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("Engine error: {0}")]
    Engine(String),

    #[error("Engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("Failed to run `{command}`: {source}")]
    Command {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Polars error: {0}")]
    Polars(String),

    #[error("HTTP error: {0}")]
    Http(String),
}

impl From<polars::error::PolarsError> for PipelineError {
    fn from(err: polars::error::PolarsError) -> Self {
        PipelineError::Polars(err.to_string())
    }
}

impl From<reqwest::Error> for PipelineError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() {
            PipelineError::EngineUnavailable(err.to_string())
        } else {
            PipelineError::Http(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

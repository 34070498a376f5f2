//! Spreadsheet ingestion into HDFS with a resilient Spark read-back.
//!
//! Local `.xls`/`.xlsx` files are uploaded under a base namespace, read back
//! through Spark (probing sheet names in order) and, when the engine cannot
//! produce a table, parsed on a single node instead. Wide regional tables can
//! then be pivoted into time-indexed long tables.

pub mod cluster;
pub mod config;
pub mod confirm;
pub mod error;
pub mod execution;
pub mod ingestion;
pub mod retry;
pub mod table;
pub mod transform;

pub use error::{PipelineError, Result};

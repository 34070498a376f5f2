//! Execution Module - reading spreadsheets back out of the store
//!
//! - `ComputeEngine` trait for the distributed engine handle
//! - `LivySession`, the Spark-over-Livy implementation
//! - `DistributedReader` probing sheet selectors against the engine
//! - `FallbackReader` downloading and parsing on a single node
//! - `ResilientReader` chaining the two tiers

pub mod engine;
pub mod fallback;
pub mod livy_engine;
pub mod reader;
pub mod router;
pub mod sheet;

pub use engine::ComputeEngine;
pub use fallback::{FallbackReader, SpreadsheetCodec};
pub use livy_engine::LivySession;
pub use reader::{DistributedRead, DistributedReader};
pub use router::{ReadOutcome, ReadTier, ResilientReader};
pub use sheet::{CandidateFailure, SheetCandidates, SheetSelector};

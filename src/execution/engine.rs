//! Compute Engine Trait - contract for distributed read engines
//!
//! The engine handle is opened once per process, borrowed by every reader and
//! closed once on shutdown. Readers never reconfigure it.

use crate::error::Result;
use crate::execution::sheet::SheetSelector;
use crate::table::TabularResult;
use async_trait::async_trait;

#[async_trait]
pub trait ComputeEngine: Send + Sync {
    /// Engine name (e.g. "livy")
    fn name(&self) -> &'static str;

    /// Read one sheet of the spreadsheet at `uri` with schema inference.
    ///
    /// A missing or malformed sheet is an `Engine` error; an unreachable engine
    /// is `EngineUnavailable`.
    async fn submit_read(&self, uri: &str, selector: &SheetSelector) -> Result<TabularResult>;
}

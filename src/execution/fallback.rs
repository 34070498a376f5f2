//! Fallback Reader - single-node read of a file fetched from the store
//!
//! Used when the distributed engine cannot produce a table. The download lives in
//! a per-call scratch directory that is removed on every exit path.

use crate::cluster::{DistributedStore, RemotePath};
use crate::error::{PipelineError, Result};
use crate::table::{CellValue, TabularResult};
use calamine::{open_workbook, Data, Range, Reader, Xls, XlsError, Xlsx, XlsxError};
use std::fmt;
use std::io::{Read, Seek};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{info, warn};

/// Local codec, chosen by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpreadsheetCodec {
    /// BIFF `.xls`
    Legacy,
    /// Zipped XML `.xlsx` / `.xlsm`
    OpenXml,
}

impl SpreadsheetCodec {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "xls" => Some(SpreadsheetCodec::Legacy),
            "xlsx" | "xlsm" => Some(SpreadsheetCodec::OpenXml),
            _ => None,
        }
    }

    pub fn for_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    /// Parse the first sheet of a local workbook.
    pub fn parse(self, path: &Path) -> std::result::Result<TabularResult, String> {
        match self {
            SpreadsheetCodec::Legacy => {
                let workbook: Xls<_> = open_workbook(path).map_err(|e: XlsError| e.to_string())?;
                first_sheet(workbook)
            }
            SpreadsheetCodec::OpenXml => {
                let workbook: Xlsx<_> = open_workbook(path).map_err(|e: XlsxError| e.to_string())?;
                first_sheet(workbook)
            }
        }
    }
}

fn first_sheet<RS, R>(mut workbook: R) -> std::result::Result<TabularResult, String>
where
    RS: Read + Seek,
    R: Reader<RS>,
    R::Error: fmt::Display,
{
    let first = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or("workbook has no sheets")?;
    let range = workbook.worksheet_range(&first).map_err(|e| e.to_string())?;
    table_from_range(&range).map_err(|e| e.to_string())
}

/// First row is the header, the rest are data rows.
pub fn table_from_range(range: &Range<Data>) -> Result<TabularResult> {
    let mut rows = range.rows();
    let header = match rows.next() {
        Some(cells) => cells.iter().map(|c| c.to_string()).collect(),
        None => Vec::new(),
    };
    let data = rows
        .map(|cells| cells.iter().map(cell_value).collect())
        .collect();
    TabularResult::from_rows(header, data)
}

fn cell_value(cell: &Data) -> CellValue {
    match cell {
        Data::Empty | Data::Error(_) => CellValue::Empty,
        Data::Int(i) => CellValue::Int(*i),
        Data::Float(f) => CellValue::Float(*f),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::String(s) if s.trim().is_empty() => CellValue::Empty,
        Data::String(s) => CellValue::Text(s.clone()),
        other => CellValue::Text(other.to_string()),
    }
}

pub struct FallbackReader<'a> {
    store: &'a dyn DistributedStore,
    scratch_dir: Option<PathBuf>,
}

impl<'a> FallbackReader<'a> {
    pub fn new(store: &'a dyn DistributedStore) -> Self {
        Self {
            store,
            scratch_dir: None,
        }
    }

    /// Create scratch directories under `dir` instead of the system temp dir
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    pub async fn read_via_local_copy(&self, remote: &RemotePath) -> Result<TabularResult> {
        let exhausted = |reason: String| PipelineError::FallbackExhausted {
            path: remote.to_string(),
            reason,
        };

        let codec = remote
            .extension()
            .and_then(|ext| SpreadsheetCodec::from_extension(&ext))
            .ok_or_else(|| exhausted(format!("no local codec for {}", remote)))?;

        let scratch = self
            .scratch()
            .map_err(|e| exhausted(format!("cannot create scratch directory: {}", e)))?;
        let local = scratch.path().join(remote.file_name().unwrap_or("download"));

        info!("Fetching {} to {} for a local read", remote, local.display());
        let output = self
            .store
            .get(remote, &local)
            .await
            .map_err(|e| exhausted(format!("download failed: {}", e)))?;
        if !output.success() {
            return Err(exhausted(format!("download failed: {}", output.text().trim())));
        }

        let parsed = tokio::task::spawn_blocking(move || codec.parse(&local))
            .await
            .map_err(|e| exhausted(format!("parser task failed: {}", e)))?;

        let path = scratch.path().display().to_string();
        if let Err(e) = scratch.close() {
            warn!("Could not remove scratch directory {}: {}", path, e);
        }

        let result = parsed.map_err(|reason| exhausted(format!("parse failed: {}", reason)))?;
        info!(
            "✅ Local read of {} produced {} rows x {} columns",
            remote,
            result.row_count(),
            result.columns().len()
        );
        Ok(result)
    }

    fn scratch(&self) -> std::io::Result<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("sheet-ingest-");
        match &self.scratch_dir {
            Some(dir) => builder.tempdir_in(dir),
            None => builder.tempdir(),
        }
    }
}

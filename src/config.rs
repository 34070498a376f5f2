//! Pipeline configuration
//!
//! Defaults mirror a single-node development cluster. `from_env` reads the
//! process environment (after `.env` has been loaded by the binary).

use crate::cluster::RemotePath;
use crate::error::{PipelineError, Result};
use crate::execution::sheet::{SheetCandidates, SheetSelector};
use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Spark (via Livy) connection parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub livy_url: String,
    /// Applied to the HTTP client only when set
    pub http_timeout_secs: Option<u64>,
    pub poll_interval_ms: u64,
    pub app_name: String,
    /// Maven coordinates of the spark-excel data source
    pub excel_package: String,
    pub spark_conf: BTreeMap<String, String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let mut spark_conf = BTreeMap::new();
        spark_conf.insert("spark.executor.memory".to_string(), "2g".to_string());
        spark_conf.insert("spark.driver.memory".to_string(), "2g".to_string());
        spark_conf.insert("spark.driver.maxResultSize".to_string(), "1g".to_string());

        Self {
            livy_url: "http://localhost:8998".to_string(),
            http_timeout_secs: None,
            poll_interval_ms: 500,
            app_name: "ManufactureAnalysis".to_string(),
            excel_package: "com.crealytics:spark-excel_2.12:3.3.1_0.18.5".to_string(),
            spark_conf,
        }
    }
}

impl EngineConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Root namespace for all uploads
    pub remote_base_path: String,
    /// Accepted file suffixes, lower-case, without the dot
    pub allowed_extensions: Vec<String>,
    /// Sheet selectors tried in order by the distributed reader
    pub sheet_candidate_order: Vec<SheetSelector>,
    /// Local directory scanned for spreadsheets
    pub data_dir: PathBuf,
    /// Local-only backup directory recorded by the local-mode marker
    pub local_mode_dir: PathBuf,
    /// Parent for per-read scratch directories (system temp when unset)
    pub scratch_dir: Option<PathBuf>,
    pub filesystem_uri: String,
    pub hadoop_bin: String,
    pub release_policy: RetryPolicy,
    pub engine: EngineConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            remote_base_path: "/manufacture_data".to_string(),
            allowed_extensions: vec!["xls".to_string(), "xlsx".to_string()],
            sheet_candidate_order: vec![
                SheetSelector::ByName("Sheet1".to_string()),
                SheetSelector::ByName("Sheet 1".to_string()),
                SheetSelector::ByName("工作表1".to_string()),
                SheetSelector::Default,
            ],
            data_dir: PathBuf::from("data"),
            local_mode_dir: PathBuf::from("local_data_backup"),
            scratch_dir: None,
            filesystem_uri: "hdfs://localhost:9000".to_string(),
            hadoop_bin: "hadoop".to_string(),
            release_policy: RetryPolicy::default(),
            engine: EngineConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Create config from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = lookup("INGEST_REMOTE_BASE_PATH") {
            config.remote_base_path = v;
        }
        if let Some(v) = lookup("INGEST_ALLOWED_EXTENSIONS") {
            config.allowed_extensions = v
                .split(',')
                .map(|ext| ext.trim().trim_start_matches('.').to_lowercase())
                .filter(|ext| !ext.is_empty())
                .collect();
        }
        if let Some(v) = lookup("INGEST_SHEET_CANDIDATES") {
            config.sheet_candidate_order = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| s.parse())
                .collect::<Result<Vec<_>>>()?;
        }
        if let Some(v) = lookup("INGEST_DATA_DIR") {
            config.data_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("INGEST_LOCAL_MODE_DIR") {
            config.local_mode_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("INGEST_SCRATCH_DIR") {
            config.scratch_dir = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("HDFS_URI") {
            config.filesystem_uri = v;
        }
        if let Some(v) = lookup("HADOOP_BIN") {
            config.hadoop_bin = v;
        }
        if let Some(v) = lookup("INGEST_RELEASE_ATTEMPTS") {
            let attempts: usize = parse_number("INGEST_RELEASE_ATTEMPTS", &v)?;
            if attempts == 0 {
                return Err(PipelineError::Config(
                    "INGEST_RELEASE_ATTEMPTS must be at least 1".to_string(),
                ));
            }
            config.release_policy.max_retries = attempts - 1;
        }
        if let Some(v) = lookup("INGEST_RELEASE_BACKOFF_MS") {
            config.release_policy.initial_delay =
                Duration::from_millis(parse_number("INGEST_RELEASE_BACKOFF_MS", &v)?);
        }
        if let Some(v) = lookup("LIVY_URL") {
            config.engine.livy_url = v;
        }
        if let Some(v) = lookup("LIVY_HTTP_TIMEOUT_SECS") {
            config.engine.http_timeout_secs = Some(parse_number("LIVY_HTTP_TIMEOUT_SECS", &v)?);
        }
        if let Some(v) = lookup("LIVY_POLL_INTERVAL_MS") {
            config.engine.poll_interval_ms = parse_number("LIVY_POLL_INTERVAL_MS", &v)?;
        }
        if let Some(v) = lookup("SPARK_APP_NAME") {
            config.engine.app_name = v;
        }
        if let Some(v) = lookup("SPARK_EXCEL_PACKAGE") {
            config.engine.excel_package = v;
        }
        if let Some(v) = lookup("SPARK_EXECUTOR_MEMORY") {
            config.engine.spark_conf.insert("spark.executor.memory".to_string(), v);
        }
        if let Some(v) = lookup("SPARK_DRIVER_MEMORY") {
            config.engine.spark_conf.insert("spark.driver.memory".to_string(), v);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        RemotePath::base(&self.remote_base_path)?;
        if self.allowed_extensions.is_empty() {
            return Err(PipelineError::Config(
                "at least one spreadsheet extension must be allowed".to_string(),
            ));
        }
        Ok(())
    }

    pub fn base_path(&self) -> Result<RemotePath> {
        RemotePath::base(&self.remote_base_path)
    }

    /// Where a local file named `file_name` lands in the store
    pub fn remote_path_for(&self, file_name: &str) -> Result<RemotePath> {
        RemotePath::under(&self.remote_base_path, file_name)
    }

    pub fn sheet_candidates(&self) -> SheetCandidates {
        SheetCandidates::new(self.sheet_candidate_order.clone())
    }

    /// Case-insensitive extension match against `allowed_extensions`
    pub fn is_allowed(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                let ext = ext.to_lowercase();
                self.allowed_extensions.iter().any(|allowed| *allowed == ext)
            })
            .unwrap_or(false)
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| PipelineError::Config(format!("{} must be a number, got `{}`", key, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_env() {
        let config = PipelineConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.release_policy.attempts(), 1);
        assert_eq!(config.sheet_candidate_order.last(), Some(&SheetSelector::Default));
    }

    #[test]
    fn test_overrides_from_env() {
        let config = PipelineConfig::from_lookup(lookup(&[
            ("INGEST_REMOTE_BASE_PATH", "/landing"),
            ("INGEST_ALLOWED_EXTENSIONS", ".XLSX, xlsm"),
            ("INGEST_SHEET_CANDIDATES", "Data,#1,default"),
            ("INGEST_RELEASE_ATTEMPTS", "3"),
            ("LIVY_HTTP_TIMEOUT_SECS", "120"),
            ("SPARK_DRIVER_MEMORY", "4g"),
        ]))
        .unwrap();

        assert_eq!(config.remote_base_path, "/landing");
        assert_eq!(config.allowed_extensions, vec!["xlsx", "xlsm"]);
        assert_eq!(
            config.sheet_candidate_order,
            vec![
                SheetSelector::ByName("Data".to_string()),
                SheetSelector::ByIndex(1),
                SheetSelector::Default,
            ]
        );
        assert_eq!(config.release_policy.attempts(), 3);
        assert_eq!(config.engine.http_timeout_secs, Some(120));
        assert_eq!(config.engine.spark_conf["spark.driver.memory"], "4g");
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(PipelineConfig::from_lookup(lookup(&[("INGEST_RELEASE_ATTEMPTS", "0")])).is_err());
        assert!(PipelineConfig::from_lookup(lookup(&[("LIVY_POLL_INTERVAL_MS", "soon")])).is_err());
        assert!(PipelineConfig::from_lookup(lookup(&[("INGEST_REMOTE_BASE_PATH", "relative")])).is_err());
        assert!(PipelineConfig::from_lookup(lookup(&[("INGEST_ALLOWED_EXTENSIONS", " , ")])).is_err());
    }

    #[test]
    fn test_extension_filter() {
        let config = PipelineConfig::default();
        assert!(config.is_allowed(Path::new("data/a.xls")));
        assert!(config.is_allowed(Path::new("data/B.XLSX")));
        assert!(!config.is_allowed(Path::new("data/notes.csv")));
        assert!(!config.is_allowed(Path::new("data/xlsx")));
    }
}

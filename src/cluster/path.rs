//! Remote paths rooted under the configured base namespace

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A location in the distributed store, always under a base path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RemotePath {
    base: String,
    relative: String,
}

impl RemotePath {
    /// The base namespace itself
    pub fn base(base: &str) -> Result<Self> {
        Ok(Self {
            base: normalize_base(base)?,
            relative: String::new(),
        })
    }

    /// `relative` joined under `base`. Absolute paths and `..` are rejected so
    /// nothing can escape the namespace.
    pub fn under(base: &str, relative: &str) -> Result<Self> {
        let base = normalize_base(base)?;
        let mut parts = Vec::new();
        for part in relative.split('/') {
            match part {
                "" | "." => continue,
                ".." => {
                    return Err(PipelineError::Config(format!(
                        "remote path `{}` escapes the base path",
                        relative
                    )))
                }
                p => parts.push(p),
            }
        }
        if relative.starts_with('/') {
            return Err(PipelineError::Config(format!(
                "remote path `{}` must be relative to {}",
                relative, base
            )));
        }
        Ok(Self {
            base,
            relative: parts.join("/"),
        })
    }

    /// Path as the store sees it, e.g. `/manufacture_data/a.xls`
    pub fn as_store_path(&self) -> String {
        if self.relative.is_empty() {
            self.base.clone()
        } else if self.base == "/" {
            format!("/{}", self.relative)
        } else {
            format!("{}/{}", self.base, self.relative)
        }
    }

    /// Fully qualified URI, e.g. `hdfs://localhost:9000/manufacture_data/a.xls`
    pub fn to_uri(&self, filesystem_uri: &str) -> String {
        format!("{}{}", filesystem_uri.trim_end_matches('/'), self.as_store_path())
    }

    /// Last path component (the file name), if any
    pub fn file_name(&self) -> Option<&str> {
        self.relative.rsplit('/').next().filter(|s| !s.is_empty())
    }

    /// Lower-cased extension of the file name
    pub fn extension(&self) -> Option<String> {
        self.file_name()
            .and_then(|name| name.rsplit_once('.'))
            .map(|(_, ext)| ext.to_lowercase())
    }

    pub fn base_path(&self) -> &str {
        &self.base
    }
}

impl fmt::Display for RemotePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_store_path())
    }
}

fn normalize_base(base: &str) -> Result<String> {
    if !base.starts_with('/') {
        return Err(PipelineError::Config(format!(
            "remote base path `{}` must be absolute",
            base
        )));
    }
    let trimmed = base.trim_end_matches('/');
    Ok(if trimmed.is_empty() { "/".to_string() } else { trimmed.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_stay_under_base() {
        let path = RemotePath::under("/manufacture_data/", "gdp/分省年度数据-GDP.xls").unwrap();
        assert_eq!(path.as_store_path(), "/manufacture_data/gdp/分省年度数据-GDP.xls");
        assert_eq!(path.file_name(), Some("分省年度数据-GDP.xls"));
        assert_eq!(path.extension().as_deref(), Some("xls"));
        assert_eq!(path.base_path(), "/manufacture_data");
        assert_eq!(
            path.to_uri("hdfs://localhost:9000/"),
            "hdfs://localhost:9000/manufacture_data/gdp/分省年度数据-GDP.xls"
        );

        assert!(RemotePath::under("/data", "../etc/passwd").is_err());
        assert!(RemotePath::under("/data", "/etc/passwd").is_err());
        assert!(RemotePath::under("data", "a.xls").is_err());
    }

    #[test]
    fn test_base_renders_without_file_name() {
        let base = RemotePath::base("/manufacture_data").unwrap();
        assert_eq!(base.to_string(), "/manufacture_data");
        assert_eq!(base.file_name(), None);
    }
}

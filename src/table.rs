//! Tabular Result - the common shape produced by every read tier
//!
//! Both the distributed reader and the local fallback turn their raw cells into
//! `CellValue` rows and build the frame through `TabularResult::from_rows`, so
//! downstream code never needs to know which tier produced a table.

use crate::error::Result;
use polars::prelude::*;
use std::collections::HashSet;

/// One raw spreadsheet cell, before column typing
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl CellValue {
    fn render(&self) -> Option<String> {
        match self {
            CellValue::Empty => None,
            CellValue::Bool(b) => Some(b.to_string()),
            CellValue::Int(i) => Some(i.to_string()),
            CellValue::Float(f) => Some(f.to_string()),
            CellValue::Text(s) => Some(s.clone()),
        }
    }
}

/// Columns, row count and the rows themselves
#[derive(Debug, Clone)]
pub struct TabularResult {
    columns: Vec<String>,
    row_count: usize,
    frame: DataFrame,
}

impl TabularResult {
    pub fn from_frame(frame: DataFrame) -> Self {
        let columns = frame
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect();
        let row_count = frame.height();
        Self {
            columns,
            row_count,
            frame,
        }
    }

    /// Build a typed frame from a header and raw rows.
    ///
    /// Blank headers become `Unnamed: {i}` and repeated headers get `.1`, `.2`
    /// suffixes. Short rows are padded with empty cells; cells beyond the header
    /// get generated headers so nothing is lost.
    pub fn from_rows(header: Vec<String>, rows: Vec<Vec<CellValue>>) -> Result<Self> {
        let width = rows.iter().map(Vec::len).max().unwrap_or(0).max(header.len());
        let names = unique_headers(&header, width);

        let mut columns: Vec<Vec<CellValue>> = vec![Vec::with_capacity(rows.len()); width];
        for row in rows {
            let mut cells = row.into_iter();
            for column in columns.iter_mut() {
                column.push(cells.next().unwrap_or(CellValue::Empty));
            }
        }

        let series = names
            .iter()
            .zip(columns.iter())
            .map(|(name, cells)| column_series(name, cells))
            .collect::<Vec<_>>();

        Ok(Self::from_frame(DataFrame::new(series)?))
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn into_frame(self) -> DataFrame {
        self.frame
    }

    /// Lazy view over the rows
    pub fn rows(&self) -> LazyFrame {
        self.frame.clone().lazy()
    }

    /// First `limit` rows as JSON, for CLI output
    pub fn preview_json(&self, limit: usize) -> Result<serde_json::Value> {
        let sample = self.frame.head(Some(limit));
        let mut rows = Vec::with_capacity(sample.height());

        for row_idx in 0..sample.height() {
            let mut row = serde_json::Map::new();
            for series in sample.get_columns() {
                row.insert(series.name().to_string(), any_value_to_json(series.get(row_idx)?));
            }
            rows.push(serde_json::Value::Object(row));
        }

        Ok(serde_json::json!({
            "columns": self.columns,
            "row_count": self.row_count,
            "rows": rows,
        }))
    }
}

impl PartialEq for TabularResult {
    fn eq(&self, other: &Self) -> bool {
        self.columns == other.columns
            && self.row_count == other.row_count
            && self.frame.equals_missing(&other.frame)
    }
}

fn unique_headers(header: &[String], width: usize) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut names = Vec::with_capacity(width);

    for idx in 0..width {
        let base = match header.get(idx).map(|h| h.trim()) {
            Some(h) if !h.is_empty() => h.to_string(),
            _ => format!("Unnamed: {}", idx),
        };
        let mut name = base.clone();
        let mut suffix = 1;
        while seen.contains(&name) {
            name = format!("{}.{}", base, suffix);
            suffix += 1;
        }
        seen.insert(name.clone());
        names.push(name);
    }

    names
}

/// Pick the narrowest dtype that holds every non-empty cell.
fn column_series(name: &str, cells: &[CellValue]) -> Series {
    let filled = || cells.iter().filter(|c| !matches!(c, CellValue::Empty));

    if filled().next().is_none() {
        let nulls: Vec<Option<String>> = vec![None; cells.len()];
        return Series::new(name, nulls);
    }

    if filled().all(|c| matches!(c, CellValue::Int(_))) {
        let values: Vec<Option<i64>> = cells
            .iter()
            .map(|c| match c {
                CellValue::Int(i) => Some(*i),
                _ => None,
            })
            .collect();
        return Series::new(name, values);
    }

    if filled().all(|c| matches!(c, CellValue::Int(_) | CellValue::Float(_))) {
        let values: Vec<Option<f64>> = cells
            .iter()
            .map(|c| match c {
                CellValue::Int(i) => Some(*i as f64),
                CellValue::Float(f) => Some(*f),
                _ => None,
            })
            .collect();
        return Series::new(name, values);
    }

    if filled().all(|c| matches!(c, CellValue::Bool(_))) {
        let values: Vec<Option<bool>> = cells
            .iter()
            .map(|c| match c {
                CellValue::Bool(b) => Some(*b),
                _ => None,
            })
            .collect();
        return Series::new(name, values);
    }

    let values: Vec<Option<String>> = cells.iter().map(CellValue::render).collect();
    Series::new(name, values)
}

fn any_value_to_json(value: AnyValue) -> serde_json::Value {
    match value {
        AnyValue::Null => serde_json::Value::Null,
        AnyValue::Boolean(b) => serde_json::Value::Bool(b),
        AnyValue::Int8(i) => serde_json::Value::Number(i.into()),
        AnyValue::Int16(i) => serde_json::Value::Number(i.into()),
        AnyValue::Int32(i) => serde_json::Value::Number(i.into()),
        AnyValue::Int64(i) => serde_json::Value::Number(i.into()),
        AnyValue::UInt8(u) => serde_json::Value::Number(u.into()),
        AnyValue::UInt16(u) => serde_json::Value::Number(u.into()),
        AnyValue::UInt32(u) => serde_json::Value::Number(u.into()),
        AnyValue::UInt64(u) => serde_json::Value::Number(u.into()),
        AnyValue::Float32(f) => serde_json::Number::from_f64(f as f64)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        AnyValue::Float64(f) => serde_json::Number::from_f64(f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        AnyValue::String(s) => serde_json::Value::String(s.to_string()),
        other => serde_json::Value::String(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> CellValue {
        CellValue::Text(s.to_string())
    }

    #[test]
    fn test_columns_are_typed_by_content() {
        let result = TabularResult::from_rows(
            vec!["地区".to_string(), "2020年".to_string(), "count".to_string(), "flag".to_string()],
            vec![
                vec![text("北京"), CellValue::Float(36102.6), CellValue::Int(3), CellValue::Bool(true)],
                vec![text("上海"), CellValue::Int(38700), CellValue::Empty, CellValue::Bool(false)],
            ],
        )
        .unwrap();

        assert_eq!(result.row_count(), 2);
        let frame = result.frame();
        assert_eq!(frame.column("地区").unwrap().dtype(), &DataType::String);
        assert_eq!(frame.column("2020年").unwrap().f64().unwrap().get(1), Some(38700.0));
        assert_eq!(frame.column("count").unwrap().i64().unwrap().get(1), None);
        assert_eq!(frame.column("flag").unwrap().dtype(), &DataType::Boolean);
    }

    #[test]
    fn test_mixed_columns_fall_back_to_text() {
        let result = TabularResult::from_rows(
            vec!["v".to_string()],
            vec![vec![CellValue::Int(1)], vec![text("n/a")]],
        )
        .unwrap();
        let values = result.frame().column("v").unwrap().str().unwrap().clone();
        assert_eq!(values.get(0), Some("1"));
        assert_eq!(values.get(1), Some("n/a"));
    }

    #[test]
    fn test_headers_are_made_unique() {
        let result = TabularResult::from_rows(
            vec!["a".to_string(), "".to_string(), "a".to_string()],
            vec![vec![CellValue::Int(1), CellValue::Int(2), CellValue::Int(3), CellValue::Int(4)]],
        )
        .unwrap();
        assert_eq!(result.columns(), &["a", "Unnamed: 1", "a.1", "Unnamed: 3"]);
    }

    #[test]
    fn test_rows_are_queryable_lazily() {
        let result = TabularResult::from_rows(
            vec!["地区".to_string(), "2021年".to_string()],
            vec![
                vec![text("北京"), CellValue::Float(40269.6)],
                vec![text("西藏"), CellValue::Float(2132.6)],
            ],
        )
        .unwrap();

        let large = result
            .rows()
            .filter(col("2021年").gt(lit(10000.0)))
            .collect()
            .unwrap();
        assert_eq!(large.height(), 1);
        assert_eq!(large.column("地区").unwrap().str().unwrap().get(0), Some("北京"));
    }

    #[test]
    fn test_preview_json_limits_rows() {
        let result = TabularResult::from_rows(
            vec!["x".to_string()],
            (0..5).map(|i| vec![CellValue::Int(i)]).collect(),
        )
        .unwrap();
        let preview = result.preview_json(2).unwrap();
        assert_eq!(preview["row_count"], 5);
        assert_eq!(preview["rows"].as_array().unwrap().len(), 2);
        assert_eq!(preview["rows"][1]["x"], 1);
    }
}

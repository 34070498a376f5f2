//! Sheet Transform - wide regional tables to long time-indexed tables
//!
//! A wide table has one row per region and one column per period:
//!
//! ```text
//! 地区 | 2021年 | 2020年
//! 北京 | 40269  | 36102
//! 上海 | 43214  | 38700
//! ```
//!
//! The long table has one row per period and one column per region, with the
//! period labels in a leading `时间` column.

use crate::error::{PipelineError, Result};
use polars::prelude::*;
use std::collections::HashSet;

/// Header of the leading column of every long table
pub const TIME_AXIS_LABEL: &str = "时间";

/// One row per region, one column per time period, plus a region-label column
#[derive(Debug, Clone)]
pub struct WideTable(DataFrame);

/// One row per time period; first column is `时间`, then one column per region
#[derive(Debug, Clone)]
pub struct LongTable(DataFrame);

impl WideTable {
    pub fn new(frame: DataFrame) -> Self {
        Self(frame)
    }

    pub fn frame(&self) -> &DataFrame {
        &self.0
    }
}

impl LongTable {
    pub fn frame(&self) -> &DataFrame {
        &self.0
    }

    pub fn into_frame(self) -> DataFrame {
        self.0
    }

    /// View this long table as a wide one keyed by `时间`, for pivoting back.
    pub fn into_wide(self) -> WideTable {
        WideTable(self.0)
    }
}

impl From<DataFrame> for WideTable {
    fn from(frame: DataFrame) -> Self {
        Self(frame)
    }
}

/// Pivot `wide` so the values of `region_column` become column headers.
///
/// Fails with `ShapeMismatch` when the region column is missing, a region label
/// is null, or two regions would map to the same output column.
pub fn pivot_wide_to_long(wide: &WideTable, region_column: &str) -> Result<LongTable> {
    let frame = wide.frame();
    let regions = frame.column(region_column).map_err(|_| {
        PipelineError::ShapeMismatch(format!(
            "region column `{}` not found (columns: {:?})",
            region_column,
            frame.get_column_names()
        ))
    })?;

    let mut seen = HashSet::new();
    let mut region_labels = Vec::with_capacity(frame.height());
    for row in 0..frame.height() {
        let label = match regions.get(row)? {
            AnyValue::Null => {
                return Err(PipelineError::ShapeMismatch(format!(
                    "row {} has no value in region column `{}`",
                    row, region_column
                )))
            }
            AnyValue::String(s) => s.to_string(),
            other => other.to_string(),
        };
        if label == TIME_AXIS_LABEL || !seen.insert(label.clone()) {
            return Err(PipelineError::ShapeMismatch(format!(
                "region `{}` would collide with another output column",
                label
            )));
        }
        region_labels.push(label);
    }

    let period_columns: Vec<&Series> = frame
        .get_columns()
        .iter()
        .filter(|s| s.name() != region_column)
        .collect();

    let periods: Vec<String> = period_columns.iter().map(|s| s.name().to_string()).collect();
    let mut output = Vec::with_capacity(region_labels.len() + 1);
    output.push(Series::new(TIME_AXIS_LABEL, periods));

    for (row, label) in region_labels.iter().enumerate() {
        let values = period_columns
            .iter()
            .map(|s| s.get(row))
            .collect::<PolarsResult<Vec<_>>>()?;
        output.push(region_series(label, &values)?);
    }

    Ok(LongTable(DataFrame::new(output)?))
}

/// One output column. Periods of a single dtype keep it; mixed dtypes become
/// text so no value is rounded or reinterpreted.
fn region_series(label: &str, values: &[AnyValue]) -> Result<Series> {
    let mut dtypes = values.iter().filter(|v| !v.is_null()).map(|v| v.dtype());
    let uniform = match dtypes.next() {
        Some(first) => dtypes.all(|d| d == first),
        None => true,
    };
    if uniform {
        return Ok(Series::from_any_values(label, values, true)?);
    }

    let text: Vec<Option<String>> = values
        .iter()
        .map(|v| match v {
            AnyValue::Null => None,
            AnyValue::String(s) => Some(s.to_string()),
            AnyValue::StringOwned(s) => Some(s.to_string()),
            AnyValue::Boolean(b) => Some(b.to_string()),
            AnyValue::Int64(i) => Some(i.to_string()),
            AnyValue::Float64(f) => Some(f.to_string()),
            AnyValue::Float32(f) => Some(f.to_string()),
            other => Some(other.to_string()),
        })
        .collect();
    Ok(Series::new(label, text))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn regional() -> WideTable {
        WideTable::new(
            df!(
                "地区" => ["北京", "上海", "广东"],
                "2021年" => [40269.6, 43214.9, 124369.7],
                "2020年" => [36102.6, 38700.6, 110760.9]
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_pivot_shape_and_positions() {
        let wide = regional();
        let long = pivot_wide_to_long(&wide, "地区").unwrap();
        let frame = long.frame();

        // N regions + time column, M periods
        assert_eq!(frame.width(), 1 + wide.frame().height());
        assert_eq!(frame.height(), wide.frame().width() - 1);
        assert_eq!(frame.get_column_names(), vec!["时间", "北京", "上海", "广东"]);

        let time = frame.column(TIME_AXIS_LABEL).unwrap().str().unwrap().clone();
        assert_eq!(time.get(0), Some("2021年"));
        assert_eq!(time.get(1), Some("2020年"));

        // Every (region, period) cell lands at (period, region)
        for (r, region) in ["北京", "上海", "广东"].iter().enumerate() {
            for (p, period) in ["2021年", "2020年"].iter().enumerate() {
                let original = wide.frame().column(period).unwrap().f64().unwrap().get(r);
                let moved = frame.column(region).unwrap().f64().unwrap().get(p);
                assert_eq!(original, moved);
            }
        }
    }

    #[test]
    fn test_pivot_round_trip() {
        let wide = regional();
        let long = pivot_wide_to_long(&wide, "地区").unwrap();
        let back = pivot_wide_to_long(&long.into_wide(), TIME_AXIS_LABEL).unwrap();
        let back = back.frame();

        assert_eq!(back.get_column_names(), vec!["时间", "2021年", "2020年"]);
        let regions = back.column(TIME_AXIS_LABEL).unwrap().str().unwrap().clone();
        assert_eq!(regions.get(2), Some("广东"));
        for period in ["2021年", "2020年"] {
            assert!(back
                .column(period)
                .unwrap()
                .equals_missing(wide.frame().column(period).unwrap()));
        }
    }

    #[test]
    fn test_nulls_are_carried_not_dropped() {
        let wide = WideTable::new(
            df!(
                "地区" => ["北京", "西藏"],
                "2021年" => [Some(1.5), None::<f64>]
            )
            .unwrap(),
        );
        let long = pivot_wide_to_long(&wide, "地区").unwrap();
        assert_eq!(long.frame().column("西藏").unwrap().null_count(), 1);
        assert_eq!(long.frame().column("北京").unwrap().f64().unwrap().get(0), Some(1.5));
    }

    #[test]
    fn test_mixed_period_types_are_kept_exact() {
        let wide = WideTable::new(
            df!(
                "地区" => ["北京", "上海"],
                "2021年" => [9007199254740993i64, 7],
                "2020年" => [1.5, 2.5],
                "直辖市" => [true, false]
            )
            .unwrap(),
        );
        let long = pivot_wide_to_long(&wide, "地区").unwrap();

        let beijing = long.frame().column("北京").unwrap();
        assert_eq!(beijing.dtype(), &DataType::String);
        let beijing = beijing.str().unwrap();
        assert_eq!(beijing.get(0), Some("9007199254740993"));
        assert_eq!(beijing.get(1), Some("1.5"));
        assert_eq!(beijing.get(2), Some("true"));
        assert_eq!(long.frame().column("上海").unwrap().str().unwrap().get(2), Some("false"));
    }

    #[test]
    fn test_uniform_integer_periods_stay_integers() {
        let wide = WideTable::new(
            df!(
                "地区" => ["北京"],
                "2021年" => [9007199254740993i64],
                "2020年" => [None::<i64>]
            )
            .unwrap(),
        );
        let long = pivot_wide_to_long(&wide, "地区").unwrap();
        let beijing = long.frame().column("北京").unwrap().i64().unwrap().clone();
        assert_eq!(beijing.get(0), Some(9007199254740993));
        assert_eq!(beijing.get(1), None);
    }

    #[test]
    fn test_missing_region_column_is_shape_mismatch() {
        let err = pivot_wide_to_long(&regional(), "省份").unwrap_err();
        assert!(matches!(err, PipelineError::ShapeMismatch(_)));
    }

    #[test]
    fn test_duplicate_regions_are_rejected() {
        let wide = WideTable::new(
            df!(
                "地区" => ["北京", "北京"],
                "2021年" => [1.0, 2.0]
            )
            .unwrap(),
        );
        let err = pivot_wide_to_long(&wide, "地区").unwrap_err();
        assert!(matches!(err, PipelineError::ShapeMismatch(_)));
    }

    #[test]
    fn test_region_named_like_time_axis_is_rejected() {
        let wide = WideTable::new(df!("地区" => ["时间"], "2021年" => [1.0]).unwrap());
        assert!(pivot_wide_to_long(&wide, "地区").is_err());
    }

    #[test]
    fn test_table_without_periods_yields_empty_rows() {
        let wide = WideTable::new(df!("地区" => ["北京", "上海"]).unwrap());
        let long = pivot_wide_to_long(&wide, "地区").unwrap();
        assert_eq!(long.frame().width(), 3);
        assert_eq!(long.frame().height(), 0);
    }
}

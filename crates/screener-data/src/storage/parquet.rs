//! Parquet 스냅샷 저장소.
//!
//! 컬럼 타입은 비결측값을 보고 결정합니다:
//! 모두 불리언이면 Boolean, 모두 정수면 Int64, 모두 숫자면 Float64,
//! 그 외는 String (배열/객체는 JSON 문자열).

use chrono::{DateTime, Utc};
use polars::prelude::*;
use screener_core::ResultTable;
use serde_json::Value;
use std::fs::File;
use std::path::Path;

use super::{SnapshotDir, SnapshotNaming, SnapshotRef, SnapshotStore};
use super::StorageFormat;
use crate::error::{DataError, Result};

/// Parquet 파일 저장소.
#[derive(Debug, Clone)]
pub struct ParquetStore {
    dir: SnapshotDir,
}

impl ParquetStore {
    pub fn new(output_dir: impl AsRef<Path>, naming: SnapshotNaming) -> Result<Self> {
        Ok(Self {
            dir: SnapshotDir::new(
                output_dir.as_ref(),
                naming,
                StorageFormat::Parquet.extension(),
            )?,
        })
    }
}

impl SnapshotStore for ParquetStore {
    fn format(&self) -> StorageFormat {
        StorageFormat::Parquet
    }

    fn save(
        &self,
        table: &ResultTable,
        dataset: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<SnapshotRef> {
        let mut df = table_to_dataframe(table)?;

        let snapshot = self.dir.publish(dataset, timestamp, |file| {
            ParquetWriter::new(file).finish(&mut df)?;
            Ok(())
        })?;

        tracing::debug!(
            dataset = dataset,
            path = %snapshot.location,
            rows = table.height(),
            "Parquet 스냅샷 저장"
        );
        Ok(snapshot)
    }

    fn list(&self, dataset: &str) -> Result<Vec<SnapshotRef>> {
        self.dir.list(dataset)
    }

    fn load(&self, snapshot: &SnapshotRef) -> Result<ResultTable> {
        let file = File::open(&snapshot.location)?;
        let df = ParquetReader::new(file).finish()?;
        dataframe_to_table(&df)
    }
}

// ── DataFrame 변환 ──────────────────────────────────────────────────

enum ColumnKind {
    Bool,
    Int,
    Float,
    Text,
}

fn infer_kind<'a>(values: impl Iterator<Item = &'a Value>) -> ColumnKind {
    let (mut all_bool, mut all_int, mut all_num, mut any) = (true, true, true, false);
    for value in values {
        match value {
            Value::Null => continue,
            Value::Bool(_) => {
                all_int = false;
                all_num = false;
            }
            Value::Number(n) => {
                all_bool = false;
                if n.as_i64().is_none() {
                    all_int = false;
                }
            }
            _ => return ColumnKind::Text,
        }
        any = true;
    }
    match (any, all_bool, all_int, all_num) {
        (false, ..) => ColumnKind::Text,
        (true, true, ..) => ColumnKind::Bool,
        (true, _, true, _) => ColumnKind::Int,
        (true, _, _, true) => ColumnKind::Float,
        _ => ColumnKind::Text,
    }
}

fn table_to_dataframe(table: &ResultTable) -> Result<DataFrame> {
    let mut columns = Vec::with_capacity(table.width());
    for (idx, name) in table.columns().iter().enumerate() {
        let cells = || table.rows().iter().map(move |row| &row[idx]);
        let name: PlSmallStr = name.as_str().into();
        let column = match infer_kind(cells()) {
            ColumnKind::Bool => Column::new(name, cells().map(Value::as_bool).collect::<Vec<_>>()),
            ColumnKind::Int => Column::new(name, cells().map(Value::as_i64).collect::<Vec<_>>()),
            ColumnKind::Float => Column::new(name, cells().map(Value::as_f64).collect::<Vec<_>>()),
            ColumnKind::Text => Column::new(
                name,
                cells()
                    .map(|v| match v {
                        Value::Null => None,
                        Value::String(s) => Some(s.clone()),
                        other => Some(other.to_string()),
                    })
                    .collect::<Vec<_>>(),
            ),
        };
        columns.push(column);
    }
    Ok(DataFrame::new(columns)?)
}

fn dataframe_to_table(df: &DataFrame) -> Result<ResultTable> {
    let names: Vec<String> = df.get_columns().iter().map(|c| c.name().to_string()).collect();
    let height = df.height();
    let mut cells: Vec<Vec<Value>> = vec![Vec::with_capacity(names.len()); height];

    for column in df.get_columns() {
        let values: Vec<Value> = match column.dtype() {
            DataType::Boolean => column
                .bool()?
                .into_iter()
                .map(|v| v.map(Value::Bool).unwrap_or(Value::Null))
                .collect(),
            DataType::Int64 => column
                .i64()?
                .into_iter()
                .map(|v| v.map(Value::from).unwrap_or(Value::Null))
                .collect(),
            DataType::Float64 => column
                .f64()?
                .into_iter()
                .map(|v| v.map(Value::from).unwrap_or(Value::Null))
                .collect(),
            DataType::String => string_values(column)?,
            _ => string_values(&column.cast(&DataType::String)?)?,
        };
        if values.len() != height {
            return Err(DataError::Persistence(format!(
                "컬럼 길이 불일치: {}",
                column.name()
            )));
        }
        for (row, value) in cells.iter_mut().zip(values) {
            row.push(value);
        }
    }

    ResultTable::from_rows(names, cells).map_err(|e| DataError::Persistence(e.to_string()))
}

fn string_values(column: &Column) -> Result<Vec<Value>> {
    Ok(column
        .str()?
        .into_iter()
        .map(|v| v.map(|s| Value::String(s.to_string())).unwrap_or(Value::Null))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn sample() -> ResultTable {
        ResultTable::from_rows(
            vec![
                "ticker".into(),
                "close".into(),
                "volume".into(),
                "is_primary".into(),
                "empty".into(),
            ],
            vec![
                vec![json!("NASDAQ:AAPL"), json!(190.5), json!(1000), json!(true), Value::Null],
                vec![json!("NYSE:IBM"), Value::Null, json!(20), json!(false), Value::Null],
                vec![json!("NYSE:KO"), json!(60.25), Value::Null, Value::Null, Value::Null],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_save_and_load_preserves_types() {
        let dir = tempfile::tempdir().unwrap();
        let store = ParquetStore::new(dir.path(), SnapshotNaming::default()).unwrap();
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();

        let snapshot = store.save(&sample(), "us", ts).unwrap();
        assert!(snapshot.location.ends_with("us_20240501_120000.parquet"));

        let loaded = store.load(&snapshot).unwrap();
        assert_eq!(loaded, sample());
    }

    #[test]
    fn test_mixed_numbers_become_float() {
        let table = ResultTable::from_rows(
            vec!["v".into()],
            vec![vec![json!(1)], vec![json!(2.5)]],
        )
        .unwrap();
        let df = table_to_dataframe(&table).unwrap();
        assert_eq!(df.column("v").unwrap().dtype(), &DataType::Float64);

        let back = dataframe_to_table(&df).unwrap();
        assert_eq!(back.rows()[0][0], json!(1.0));
    }
}

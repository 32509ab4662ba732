//! CSV 스냅샷 저장소.
//!
//! 스냅샷마다 `{dataset}_{timestamp}.csv` 파일 하나를 씁니다.
//! 읽을 때는 셀마다 타입을 추론합니다 (빈 셀은 결측값).

use chrono::{DateTime, Utc};
use screener_core::ResultTable;
use std::path::Path;

use super::{parse_cell, render_cell, SnapshotDir, SnapshotNaming, SnapshotRef};
use super::{SnapshotStore, StorageFormat};
use crate::error::{DataError, Result};

/// CSV 파일 저장소.
#[derive(Debug, Clone)]
pub struct CsvStore {
    dir: SnapshotDir,
}

impl CsvStore {
    pub fn new(output_dir: impl AsRef<Path>, naming: SnapshotNaming) -> Result<Self> {
        Ok(Self {
            dir: SnapshotDir::new(output_dir.as_ref(), naming, StorageFormat::Csv.extension())?,
        })
    }
}

impl SnapshotStore for CsvStore {
    fn format(&self) -> StorageFormat {
        StorageFormat::Csv
    }

    fn save(
        &self,
        table: &ResultTable,
        dataset: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<SnapshotRef> {
        let snapshot = self.dir.publish(dataset, timestamp, |file| {
            let mut writer = csv::Writer::from_writer(file);
            writer.write_record(table.columns())?;
            for row in table.rows() {
                writer.write_record(row.iter().map(|v| render_cell(v).unwrap_or_default()))?;
            }
            writer.flush()?;
            Ok(())
        })?;

        tracing::debug!(
            dataset = dataset,
            path = %snapshot.location,
            rows = table.height(),
            "CSV 스냅샷 저장"
        );
        Ok(snapshot)
    }

    fn list(&self, dataset: &str) -> Result<Vec<SnapshotRef>> {
        self.dir.list(dataset)
    }

    fn load(&self, snapshot: &SnapshotRef) -> Result<ResultTable> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_path(&snapshot.location)?;
        let columns: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

        let mut table = ResultTable::new(columns);
        for record in reader.records() {
            let record = record?;
            table
                .push_row(record.iter().map(parse_cell).collect())
                .map_err(|e| DataError::Persistence(format!("{}: {}", snapshot.location, e)))?;
        }
        Ok(table)
    }
}

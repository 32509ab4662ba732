//! 과거 스냅샷 로드.

use chrono::{DateTime, Utc};
use screener_core::ResultTable;
use screener_data::{SnapshotRef, SnapshotStore};

use super::collect::Collector;
use crate::error::Result;

/// 과거 데이터 로드 결과.
#[derive(Debug, Clone, PartialEq)]
pub enum HistoricalData {
    /// 시간 순으로 이어 붙인 하나의 테이블
    Combined(ResultTable),
    /// 스냅샷별 테이블 (시간 순)
    Separate(Vec<(SnapshotRef, ResultTable)>),
}

impl HistoricalData {
    /// 전체 행 수.
    pub fn total_rows(&self) -> usize {
        match self {
            HistoricalData::Combined(table) => table.height(),
            HistoricalData::Separate(parts) => parts.iter().map(|(_, t)| t.height()).sum(),
        }
    }

    /// 하나의 테이블로 합칩니다.
    pub fn into_combined(self) -> ResultTable {
        match self {
            HistoricalData::Combined(table) => table,
            HistoricalData::Separate(parts) => {
                ResultTable::concat(parts.iter().map(|(_, table)| table))
            }
        }
    }
}

/// 저장된 스냅샷을 시간 순으로 읽습니다.
///
/// `start`, `end`는 포함 범위이며 스냅샷 이름에서 복원한 시각과 비교합니다.
/// 읽기 실패는 건너뛰지 않고 에러로 반환합니다.
pub fn load_historical(
    store: &dyn SnapshotStore,
    dataset: &str,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    combine: bool,
) -> Result<HistoricalData> {
    tracing::info!(
        dataset = dataset,
        format = %store.format(),
        start = ?start,
        end = ?end,
        "과거 데이터 로드"
    );

    let snapshots: Vec<SnapshotRef> = store
        .list(dataset)?
        .into_iter()
        .filter(|s| start.map_or(true, |start| s.timestamp >= start))
        .filter(|s| end.map_or(true, |end| s.timestamp <= end))
        .collect();
    tracing::info!(dataset = dataset, snapshots = snapshots.len(), "조건에 맞는 스냅샷");

    let mut parts = Vec::with_capacity(snapshots.len());
    for snapshot in snapshots {
        let table = store.load(&snapshot)?;
        tracing::debug!(name = %snapshot.name, rows = table.height(), "스냅샷 로드");
        parts.push((snapshot, table));
    }

    if parts.is_empty() {
        tracing::warn!(dataset = dataset, "로드된 데이터 없음");
    }

    let data = if combine {
        let table = ResultTable::concat(parts.iter().map(|(_, table)| table));
        tracing::info!(
            dataset = dataset,
            rows = table.height(),
            snapshots = parts.len(),
            "과거 데이터 병합 완료"
        );
        HistoricalData::Combined(table)
    } else {
        HistoricalData::Separate(parts)
    };
    Ok(data)
}

impl Collector {
    /// 이 수집기의 저장소에서 과거 스냅샷을 읽습니다.
    pub fn load_historical(
        &self,
        dataset: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        combine: bool,
    ) -> Result<HistoricalData> {
        load_historical(self.store.as_ref(), dataset, start, end, combine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use screener_data::{open_store, SnapshotNaming, StorageFormat};
    use serde_json::json;

    fn snapshot_table(tag: &str, rows: usize) -> ResultTable {
        ResultTable::from_rows(
            vec!["ticker".into(), "batch".into()],
            (0..rows)
                .map(|i| vec![json!(format!("T{}", i)), json!(tag)])
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_range_filter_and_separate() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(StorageFormat::Csv, dir.path(), SnapshotNaming::default()).unwrap();
        for (hour, tag) in [(10, "a"), (11, "b"), (12, "c")] {
            let ts = Utc.with_ymd_and_hms(2024, 6, 3, hour, 0, 0).unwrap();
            store.save(&snapshot_table(tag, 2), "eu", ts).unwrap();
        }

        let start = Utc.with_ymd_and_hms(2024, 6, 3, 11, 0, 0).unwrap();
        let data = load_historical(store.as_ref(), "eu", Some(start), None, false).unwrap();
        let HistoricalData::Separate(parts) = data else {
            panic!("expected separate tables");
        };
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].1, snapshot_table("b", 2));
        assert_eq!(parts[1].1, snapshot_table("c", 2));

        let end = Utc.with_ymd_and_hms(2024, 6, 3, 10, 30, 0).unwrap();
        let data = load_historical(store.as_ref(), "eu", None, Some(end), true).unwrap();
        assert_eq!(data, HistoricalData::Combined(snapshot_table("a", 2)));
    }

    #[test]
    fn test_empty_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let store =
            open_store(StorageFormat::Sqlite, dir.path(), SnapshotNaming::default()).unwrap();
        let data = load_historical(store.as_ref(), "none", None, None, true).unwrap();
        assert_eq!(data.total_rows(), 0);
        assert_eq!(data.into_combined(), ResultTable::default());
    }
}

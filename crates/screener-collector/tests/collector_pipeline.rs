//! 단일 수집, 배치 수집, 과거 데이터 로드 통합 테스트.

mod common;

use chrono::{DateTime, DurationRound, TimeDelta, Utc};
use common::{bad_request, builder, column, result, ScriptedTransport};
use screener_collector::modules::{
    Clock, FindingKind, MonotonicClock, COLLECTION_UNIX_COLUMN, DATASET_NAME_COLUMN,
};
use screener_collector::{Collector, HistoricalData};
use screener_core::{ExecutionResult, Query, ResultTable};
use screener_data::{open_store, SnapshotNaming, StorageFormat};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_collect_once_snapshot_timestamp_within_call() {
    let dir = tempfile::tempdir().unwrap();
    let transport = ScriptedTransport::new(|call, _| Ok(result(5, call)));
    let store = open_store(StorageFormat::Csv, dir.path(), SnapshotNaming::default()).unwrap();
    let collector = Collector::builder(transport, store).build();

    // 스냅샷 이름은 초 단위이므로 시작 시각도 초 단위로 내림
    let start = Utc::now().duration_trunc(TimeDelta::seconds(1)).unwrap();
    let record = collector
        .collect_once(&Query::new(), "us_stocks", true)
        .await
        .unwrap();
    let end = Utc::now();

    let snapshots = collector.store().list("us_stocks").unwrap();
    assert_eq!(snapshots.len(), 1);
    let snapshot = &snapshots[0];
    assert!(snapshot.timestamp >= start && snapshot.timestamp <= end);
    assert_eq!(record.snapshot.as_ref(), Some(snapshot));

    let loaded = collector.store().load(snapshot).unwrap();
    assert_eq!(loaded.height(), 5);
    assert_eq!(column(&loaded, DATASET_NAME_COLUMN), vec![json!("us_stocks"); 5]);
}

/// 항상 같은 시각을 반환하는 시계.
struct FixedClock(DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

#[tokio::test]
async fn test_same_timestamp_collections_keep_every_snapshot() {
    for format in [StorageFormat::Csv, StorageFormat::Parquet, StorageFormat::Sqlite] {
        let dir = tempfile::tempdir().unwrap();
        let transport = ScriptedTransport::new(|call, _| Ok(result(call + 1, call)));
        let store = open_store(format, dir.path(), SnapshotNaming::default()).unwrap();
        let collector = Collector::builder(transport, store)
            .clock(Arc::new(FixedClock(common::wall_start())))
            .build();

        for _ in 0..2 {
            collector
                .collect_once(&Query::new(), "fast", true)
                .await
                .unwrap();
        }

        let snapshots = collector.store().list("fast").unwrap();
        assert_eq!(snapshots.len(), 2, "format={}", format);
        assert_ne!(snapshots[0].name, snapshots[1].name);
        let heights: Vec<usize> = snapshots
            .iter()
            .map(|s| collector.store().load(s).unwrap().height())
            .collect();
        assert_eq!(heights, vec![1, 2], "format={}", format);
    }
}

#[tokio::test(start_paused = true)]
async fn test_batch_isolates_failures() {
    let dir = tempfile::tempdir().unwrap();
    let transport = ScriptedTransport::new(|call, query| {
        if query.universe().endpoint() == "crypto" {
            Err(bad_request())
        } else {
            Ok(result(3, call))
        }
    });
    let collector = builder(dir.path(), transport.clone())
        .batch_concurrency(2)
        .build();

    let report = collector
        .collect_batch(
            [
                ("a", Query::new()),
                ("b", Query::new().set_universe("crypto").unwrap()),
            ],
            true,
        )
        .await;

    assert_eq!(transport.calls(), 2);
    assert_eq!(report.records.keys().collect::<Vec<_>>(), vec!["a"]);
    assert_eq!(report.failures.keys().collect::<Vec<_>>(), vec!["b"]);
    assert!(report.failures["b"].contains("400"));
    assert_eq!(report.stats.cycles, 2);
    assert_eq!(report.stats.success, 1);
    assert_eq!(report.stats.failed_cycles, 1);

    assert_eq!(collector.store().list("a").unwrap().len(), 1);
    assert!(collector.store().list("b").unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_load_historical_combines_in_time_order() {
    let dir = tempfile::tempdir().unwrap();
    let sizes = [2usize, 5, 3];
    let transport = ScriptedTransport::new(move |call, _| Ok(result(sizes[call], call)));
    let collector = builder(dir.path(), transport).build();

    for _ in 0..sizes.len() {
        collector
            .collect_once(&Query::new(), "fx", true)
            .await
            .unwrap();
        tokio::time::advance(Duration::from_secs(15 * 60)).await;
    }

    let data = collector.load_historical("fx", None, None, true).unwrap();
    let HistoricalData::Combined(table) = data else {
        panic!("expected combined table");
    };
    assert_eq!(table.height(), sizes.iter().sum::<usize>());

    let stamps: Vec<i64> = column(&table, COLLECTION_UNIX_COLUMN)
        .iter()
        .map(|v| v.as_i64().unwrap())
        .collect();
    assert!(stamps.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(stamps.first(), Some(&common::wall_start().timestamp()));

    let separate = collector.load_historical("fx", None, None, false).unwrap();
    let HistoricalData::Separate(parts) = separate else {
        panic!("expected separate tables");
    };
    let heights: Vec<usize> = parts.iter().map(|(_, t)| t.height()).collect();
    assert_eq!(heights, sizes);
}

#[tokio::test(start_paused = true)]
async fn test_load_historical_sqlite() {
    let dir = tempfile::tempdir().unwrap();
    let transport = ScriptedTransport::new(|call, _| Ok(result(call + 1, call)));
    let store = open_store(StorageFormat::Sqlite, dir.path(), SnapshotNaming::default()).unwrap();
    let collector = Collector::builder(transport, store)
        .clock(Arc::new(MonotonicClock::starting_at(common::wall_start())))
        .build();

    for _ in 0..3 {
        collector
            .collect_once(&Query::new(), "bonds", true)
            .await
            .unwrap();
        tokio::time::advance(Duration::from_secs(60)).await;
    }

    let start = common::wall_start() + TimeDelta::seconds(60);
    let data = collector
        .load_historical("bonds", Some(start), None, true)
        .unwrap();
    assert_eq!(data.total_rows(), 2 + 3);
}

#[tokio::test(start_paused = true)]
async fn test_validator_flags_high_null_column() {
    let dir = tempfile::tempdir().unwrap();
    let transport = ScriptedTransport::new(|_, _| {
        let rows = (0..10)
            .map(|i| {
                let rating = if i < 6 { Value::Null } else { json!(i) };
                vec![json!(format!("NYSE:S{}", i)), json!(i as f64 * 1.5), rating]
            })
            .collect();
        Ok(ExecutionResult {
            total_count: 10,
            table: ResultTable::from_rows(
                vec!["ticker".into(), "close".into(), "rating".into()],
                rows,
            )
            .unwrap(),
        })
    });
    let collector = builder(dir.path(), transport).build();

    let record = collector
        .collect_once(&Query::new(), "ratings", false)
        .await
        .unwrap();

    assert_eq!(record.findings.len(), 1);
    assert_eq!(record.findings[0].kind, FindingKind::HighNullFraction);
    assert_eq!(record.findings[0].column.as_deref(), Some("rating"));
}

#[tokio::test(start_paused = true)]
async fn test_validator_passes_clean_dataset_and_can_be_disabled() {
    let dir = tempfile::tempdir().unwrap();
    let transport = ScriptedTransport::new(|call, _| {
        if call == 0 {
            Ok(result(4, call))
        } else {
            Ok(ExecutionResult::default())
        }
    });
    let collector = builder(dir.path(), transport.clone()).build();
    let record = collector
        .collect_once(&Query::new(), "clean", false)
        .await
        .unwrap();
    assert!(record.findings.is_empty());

    let record = collector
        .collect_once(&Query::new(), "clean", false)
        .await
        .unwrap();
    assert_eq!(record.findings[0].kind, FindingKind::EmptyResult);

    let quiet = builder(dir.path(), transport).validate(false).build();
    let record = quiet
        .collect_once(&Query::new(), "clean", false)
        .await
        .unwrap();
    assert!(record.findings.is_empty());
}

//! 통합 테스트 공용 도구.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use screener_collector::modules::MonotonicClock;
use screener_collector::{Collector, CollectorBuilder};
use screener_core::{ExecutionResult, Query, ResultTable};
use screener_data::{
    open_store, DataError, ScanTransport, SessionCredentials, SnapshotNaming, StorageFormat,
};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

type Script = dyn Fn(usize, &Query) -> screener_data::Result<ExecutionResult> + Send + Sync;

/// 호출 순번(0부터)과 쿼리로 응답을 결정하는 가짜 전송 계층.
pub struct ScriptedTransport {
    calls: AtomicUsize,
    script: Box<Script>,
}

impl ScriptedTransport {
    pub fn new<F>(script: F) -> Arc<Self>
    where
        F: Fn(usize, &Query) -> screener_data::Result<ExecutionResult> + Send + Sync + 'static,
    {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            script: Box::new(script),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ScanTransport for ScriptedTransport {
    async fn execute(
        &self,
        query: &Query,
        _credentials: Option<&SessionCredentials>,
    ) -> screener_data::Result<ExecutionResult> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        (self.script)(call, query)
    }
}

/// 서로 다른 값을 가진 `rows`행 결과.
pub fn result(rows: usize, seed: usize) -> ExecutionResult {
    let table = ResultTable::from_rows(
        vec!["ticker".into(), "close".into(), "volume".into()],
        (0..rows)
            .map(|i| {
                vec![
                    json!(format!("NASDAQ:T{}", i)),
                    json!(100.0 + (seed * 10 + i) as f64 + 0.5),
                    json!((i + 1) * 1000),
                ]
            })
            .collect(),
    )
    .expect("rectangular rows");
    ExecutionResult {
        total_count: rows as u64 * 10,
        table,
    }
}

pub fn service_unavailable() -> DataError {
    DataError::Service {
        status: 503,
        reason: "temporarily unavailable".to_string(),
    }
}

pub fn bad_request() -> DataError {
    DataError::Service {
        status: 400,
        reason: "unknown field".to_string(),
    }
}

pub fn wall_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 15, 14, 0, 0).unwrap()
}

/// CSV 저장소와 가상 시간 시계를 사용하는 수집기 빌더.
pub fn builder(dir: &Path, transport: Arc<dyn ScanTransport>) -> CollectorBuilder {
    let store = open_store(StorageFormat::Csv, dir, SnapshotNaming::default()).unwrap();
    Collector::builder(transport, store).clock(Arc::new(MonotonicClock::starting_at(wall_start())))
}

pub fn column(table: &ResultTable, name: &str) -> Vec<Value> {
    table.column_values(name).unwrap().cloned().collect()
}

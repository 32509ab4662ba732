//! 배치 수집.
//!
//! 데이터셋마다 독립적으로 `collect_once`를 실행합니다. 한 항목의 실패는
//! 다른 항목에 영향을 주지 않으며 결과 보고서에 기록됩니다.

use futures::stream::{self, StreamExt};
use screener_core::Query;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::time::Instant;

use super::collect::{CollectionRecord, Collector, TableTransform};
use crate::stats::CollectionStats;

/// 배치 수집 결과.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    /// 성공한 데이터셋의 수집 결과
    pub records: BTreeMap<String, CollectionRecord>,
    /// 실패한 데이터셋과 에러 메시지
    pub failures: BTreeMap<String, String>,
    pub stats: CollectionStats,
}

impl Collector {
    /// 여러 쿼리를 배치로 수집합니다.
    ///
    /// 같은 데이터셋 이름이 여러 번 나오면 마지막 쿼리만 실행합니다.
    /// 동시 실행 수는 `batch_concurrency`로 제한됩니다.
    pub async fn collect_batch<I, S>(&self, queries: I, save: bool) -> BatchReport
    where
        I: IntoIterator<Item = (S, Query)>,
        S: Into<String>,
    {
        self.collect_batch_with(queries, save, &HashMap::new()).await
    }

    /// 데이터셋별 추가 변환과 함께 배치 수집합니다.
    pub async fn collect_batch_with<I, S>(
        &self,
        queries: I,
        save: bool,
        transforms: &HashMap<String, Vec<Arc<dyn TableTransform>>>,
    ) -> BatchReport
    where
        I: IntoIterator<Item = (S, Query)>,
        S: Into<String>,
    {
        let entries: BTreeMap<String, Query> = queries
            .into_iter()
            .map(|(name, query)| (name.into(), query))
            .collect();

        tracing::info!(
            datasets = entries.len(),
            concurrency = self.batch_concurrency,
            "배치 수집 시작"
        );
        let started = Instant::now();

        let results: Vec<_> = stream::iter(entries.iter().map(|(dataset, query)| {
            let extra = transforms.get(dataset).map(Vec::as_slice).unwrap_or(&[]);
            async move {
                let result = self.collect_once_with(query, dataset, save, extra).await;
                (dataset.clone(), result)
            }
        }))
        .buffer_unordered(self.batch_concurrency.max(1))
        .collect()
        .await;

        let mut report = BatchReport::default();
        for (dataset, result) in results {
            report.stats.cycles += 1;
            match result {
                Ok(record) => {
                    report.stats.success += 1;
                    report.stats.total_rows += record.table.height();
                    report.records.insert(dataset, record);
                }
                Err(e) => {
                    tracing::error!(dataset = %dataset, error = %e, "데이터셋 수집 실패");
                    report.stats.failed_cycles += 1;
                    report.stats.record_failure(&e);
                    report.failures.insert(dataset, e.to_string());
                }
            }
        }

        report.stats.elapsed = started.elapsed();
        tracing::info!(
            success = report.records.len(),
            total = entries.len(),
            "배치 수집 완료"
        );
        report.stats.log_summary("배치 수집");
        report
    }
}

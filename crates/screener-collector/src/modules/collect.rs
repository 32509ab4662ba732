//! 단일 수집 실행.
//!
//! 한 번의 수집은 다음 순서로 진행됩니다:
//! 1. 원격 스캐너 쿼리 실행
//! 2. 수집 메타데이터 컬럼 추가 (설정 시)
//! 3. 테이블 변환 순차 적용 (실패한 변환은 건너뜀)
//! 4. 데이터 품질 검사
//! 5. 스냅샷 저장 (요청 시)

use chrono::{DateTime, Utc};
use screener_core::{Query, ResultTable};
use screener_data::storage::validate_dataset_name;
use screener_data::{
    open_store, ScanTransport, ScannerClient, SessionCredentials, SnapshotRef, SnapshotStore,
};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::Instrument;

use super::validator::{log_findings, DataQualityValidator, Finding, NoopValidator, Validator};
use crate::config::CollectorConfig;
use crate::error::Result;

/// 수집 시각 컬럼 (RFC 3339)
pub const COLLECTION_TIMESTAMP_COLUMN: &str = "collection_timestamp";
/// 수집 시각 컬럼 (Unix 초)
pub const COLLECTION_UNIX_COLUMN: &str = "collection_unix";
/// 데이터셋 이름 컬럼
pub const DATASET_NAME_COLUMN: &str = "dataset_name";
/// 수집 메타데이터 컬럼 전체
pub const METADATA_COLUMNS: [&str; 3] = [
    COLLECTION_TIMESTAMP_COLUMN,
    COLLECTION_UNIX_COLUMN,
    DATASET_NAME_COLUMN,
];

/// 수집 시각 공급원.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// 시스템 벽시계.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// 생성 시점의 벽시계에 tokio 단조 시계의 경과 시간을 더하는 시계.
///
/// tokio 시간이 정지된 테스트에서도 수집 시각이 가상 시간을 따라 증가합니다.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    anchor_wall: DateTime<Utc>,
    anchor: tokio::time::Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self::starting_at(Utc::now())
    }

    /// 지정한 시각에서 시작합니다.
    pub fn starting_at(wall: DateTime<Utc>) -> Self {
        Self {
            anchor_wall: wall,
            anchor: tokio::time::Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = self.anchor.elapsed();
        chrono::Duration::from_std(elapsed)
            .ok()
            .and_then(|d| self.anchor_wall.checked_add_signed(d))
            .unwrap_or(self.anchor_wall)
    }
}

/// 변환 실패 원인.
pub type TransformError = Box<dyn std::error::Error + Send + Sync>;

/// 수집 결과 테이블 변환.
///
/// 변환은 입력을 변경하지 않고 새 테이블을 반환합니다.
pub trait TableTransform: Send + Sync {
    /// 로그와 진단에 사용할 이름.
    fn name(&self) -> &str;

    fn apply(&self, table: &ResultTable) -> std::result::Result<ResultTable, TransformError>;
}

/// 클로저 기반 변환.
pub struct FnTransform<F> {
    name: String,
    f: F,
}

impl<F> TableTransform for FnTransform<F>
where
    F: Fn(&ResultTable) -> std::result::Result<ResultTable, TransformError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, table: &ResultTable) -> std::result::Result<ResultTable, TransformError> {
        (self.f)(table)
    }
}

/// 클로저로 변환을 만듭니다.
pub fn transform<F>(name: impl Into<String>, f: F) -> Arc<dyn TableTransform>
where
    F: Fn(&ResultTable) -> std::result::Result<ResultTable, TransformError>
        + Send
        + Sync
        + 'static,
{
    Arc::new(FnTransform {
        name: name.into(),
        f,
    })
}

/// 건너뛴 변환 기록.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallbackFailure {
    pub transform: String,
    pub error: String,
}

/// 수집 1회의 결과.
#[derive(Debug, Clone, Serialize)]
pub struct CollectionRecord {
    pub dataset: String,
    pub collected_at: DateTime<Utc>,
    /// 윈도우 적용 전 전체 일치 수
    pub total_count: u64,
    pub table: ResultTable,
    pub findings: Vec<Finding>,
    pub callback_failures: Vec<CallbackFailure>,
    /// 저장하지 않았으면 `None`
    pub snapshot: Option<SnapshotRef>,
}

/// 스캐너 수집기.
///
/// 인스턴스 하나가 저장 형식 하나와 출력 위치 하나를 사용합니다.
#[derive(Clone)]
pub struct Collector {
    pub(crate) transport: Arc<dyn ScanTransport>,
    pub(crate) store: Arc<dyn SnapshotStore>,
    pub(crate) validator: Arc<dyn Validator>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) credentials: Option<SessionCredentials>,
    pub(crate) transforms: Vec<Arc<dyn TableTransform>>,
    pub(crate) add_metadata: bool,
    pub(crate) batch_concurrency: usize,
}

impl std::fmt::Debug for Collector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collector")
            .field("format", &self.store.format())
            .field("authenticated", &self.credentials.is_some())
            .field("transforms", &self.transforms.len())
            .field("add_metadata", &self.add_metadata)
            .field("batch_concurrency", &self.batch_concurrency)
            .finish()
    }
}

/// `Collector` 빌더.
pub struct CollectorBuilder {
    transport: Arc<dyn ScanTransport>,
    store: Arc<dyn SnapshotStore>,
    validator: Arc<dyn Validator>,
    clock: Arc<dyn Clock>,
    credentials: Option<SessionCredentials>,
    transforms: Vec<Arc<dyn TableTransform>>,
    add_metadata: bool,
    batch_concurrency: usize,
}

impl CollectorBuilder {
    /// 필수 구성요소로 빌더를 생성합니다. 기본값은 메타데이터 추가, 품질 검사 활성화입니다.
    pub fn new(transport: Arc<dyn ScanTransport>, store: Arc<dyn SnapshotStore>) -> Self {
        Self {
            transport,
            store,
            validator: Arc::new(default_validator()),
            clock: Arc::new(SystemClock),
            credentials: None,
            transforms: Vec::new(),
            add_metadata: true,
            batch_concurrency: 1,
        }
    }

    pub fn credentials(mut self, credentials: Option<SessionCredentials>) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn validator(mut self, validator: Arc<dyn Validator>) -> Self {
        self.validator = validator;
        self
    }

    /// 품질 검사 활성화 여부. 비활성화하면 `NoopValidator`를 사용합니다.
    pub fn validate(mut self, enabled: bool) -> Self {
        self.validator = if enabled {
            Arc::new(default_validator())
        } else {
            Arc::new(NoopValidator)
        };
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn add_metadata(mut self, enabled: bool) -> Self {
        self.add_metadata = enabled;
        self
    }

    /// 모든 수집에 적용할 변환을 추가합니다. 추가한 순서대로 적용됩니다.
    pub fn transform(mut self, transform: Arc<dyn TableTransform>) -> Self {
        self.transforms.push(transform);
        self
    }

    /// 배치 수집 동시 실행 수 (최소 1).
    pub fn batch_concurrency(mut self, n: usize) -> Self {
        self.batch_concurrency = n.max(1);
        self
    }

    pub fn build(self) -> Collector {
        Collector {
            transport: self.transport,
            store: self.store,
            validator: self.validator,
            clock: self.clock,
            credentials: self.credentials,
            transforms: self.transforms,
            add_metadata: self.add_metadata,
            batch_concurrency: self.batch_concurrency,
        }
    }
}

fn default_validator() -> DataQualityValidator {
    DataQualityValidator::new().exempt_constant(METADATA_COLUMNS)
}

impl Collector {
    pub fn builder(
        transport: Arc<dyn ScanTransport>,
        store: Arc<dyn SnapshotStore>,
    ) -> CollectorBuilder {
        CollectorBuilder::new(transport, store)
    }

    /// 설정으로 HTTP 스캐너 클라이언트와 저장소를 구성합니다.
    pub fn from_config(config: &CollectorConfig) -> Result<Self> {
        config.validate()?;

        let client = ScannerClient::new(config.scanner_config())?;
        let store = open_store(
            config.storage.format,
            &config.storage.output_dir,
            config.naming()?,
        )?;

        tracing::info!(
            output_dir = %config.storage.output_dir.display(),
            format = %config.storage.format,
            add_metadata = config.pipeline.add_metadata,
            validate = config.pipeline.validate,
            "Collector 초기화"
        );

        Ok(CollectorBuilder::new(Arc::new(client), store)
            .credentials(config.credentials()?)
            .add_metadata(config.pipeline.add_metadata)
            .validate(config.pipeline.validate)
            .batch_concurrency(config.pipeline.batch_concurrency)
            .build())
    }

    pub fn store(&self) -> &Arc<dyn SnapshotStore> {
        &self.store
    }

    pub fn transport(&self) -> &Arc<dyn ScanTransport> {
        &self.transport
    }

    pub fn credentials(&self) -> Option<&SessionCredentials> {
        self.credentials.as_ref()
    }

    /// 쿼리를 한 번 실행하고 결과를 처리합니다.
    ///
    /// # Errors
    ///
    /// 실행 에러와 저장 에러는 그대로 반환됩니다. 변환 실패와 품질 문제는
    /// 에러가 아니며 `CollectionRecord`에 기록됩니다.
    pub async fn collect_once(
        &self,
        query: &Query,
        dataset: &str,
        save: bool,
    ) -> Result<CollectionRecord> {
        self.collect_once_with(query, dataset, save, &[]).await
    }

    /// 수집기 공통 변환 뒤에 `extra` 변환을 추가로 적용하여 한 번 수집합니다.
    pub async fn collect_once_with(
        &self,
        query: &Query,
        dataset: &str,
        save: bool,
        extra: &[Arc<dyn TableTransform>],
    ) -> Result<CollectionRecord> {
        let span = screener_core::collection_span!("collect_once", dataset);
        self.run_collection(query, dataset, save, extra)
            .instrument(span)
            .await
    }

    async fn run_collection(
        &self,
        query: &Query,
        dataset: &str,
        save: bool,
        extra: &[Arc<dyn TableTransform>],
    ) -> Result<CollectionRecord> {
        validate_dataset_name(dataset)?;

        tracing::info!(dataset = dataset, "수집 시작");
        let collected_at = self.clock.now();

        let result = match self
            .transport
            .execute(query, self.credentials.as_ref())
            .await
        {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(dataset = dataset, kind = e.kind(), error = %e, "수집 실패");
                return Err(e.into());
            }
        };
        tracing::info!(
            dataset = dataset,
            rows = result.table.height(),
            total_count = result.total_count,
            "조회 완료"
        );

        let mut table = result.table;
        if self.add_metadata {
            table = attach_metadata(table, dataset, collected_at);
        }

        let (table, callback_failures) = self.apply_transforms(table, extra);

        let findings = self.validator.validate(&table);
        log_findings(dataset, &findings);

        let snapshot = if save {
            let snapshot = self.store.save(&table, dataset, collected_at)?;
            tracing::info!(dataset = dataset, location = %snapshot.location, "스냅샷 저장");
            Some(snapshot)
        } else {
            None
        };

        Ok(CollectionRecord {
            dataset: dataset.to_string(),
            collected_at,
            total_count: result.total_count,
            table,
            findings,
            callback_failures,
            snapshot,
        })
    }

    fn apply_transforms(
        &self,
        mut table: ResultTable,
        extra: &[Arc<dyn TableTransform>],
    ) -> (ResultTable, Vec<CallbackFailure>) {
        let mut failures = Vec::new();
        for transform in self.transforms.iter().chain(extra) {
            match transform.apply(&table) {
                Ok(next) => {
                    tracing::debug!(transform = transform.name(), "변환 적용");
                    table = next;
                }
                Err(e) => {
                    tracing::warn!(transform = transform.name(), error = %e, "변환 실패, 건너뜀");
                    failures.push(CallbackFailure {
                        transform: transform.name().to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }
        (table, failures)
    }
}

/// 수집 메타데이터 컬럼을 추가합니다.
pub fn attach_metadata(
    table: ResultTable,
    dataset: &str,
    collected_at: DateTime<Utc>,
) -> ResultTable {
    table
        .with_constant_column(
            COLLECTION_TIMESTAMP_COLUMN,
            Value::String(collected_at.to_rfc3339()),
        )
        .with_constant_column(COLLECTION_UNIX_COLUMN, Value::from(collected_at.timestamp()))
        .with_constant_column(DATASET_NAME_COLUMN, Value::String(dataset.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use screener_core::ExecutionResult;
    use screener_data::{DataError, SnapshotNaming, StorageFormat};
    use serde_json::json;

    struct StaticTransport(ExecutionResult);

    #[async_trait]
    impl ScanTransport for StaticTransport {
        async fn execute(
            &self,
            _query: &Query,
            _credentials: Option<&SessionCredentials>,
        ) -> screener_data::Result<ExecutionResult> {
            Ok(self.0.clone())
        }
    }

    struct FailingTransport;

    #[async_trait]
    impl ScanTransport for FailingTransport {
        async fn execute(
            &self,
            _query: &Query,
            _credentials: Option<&SessionCredentials>,
        ) -> screener_data::Result<ExecutionResult> {
            Err(DataError::MalformedResponse("missing data".to_string()))
        }
    }

    fn sample() -> ExecutionResult {
        ExecutionResult {
            total_count: 120,
            table: ResultTable::from_rows(
                vec!["ticker".into(), "close".into()],
                vec![
                    vec![json!("NASDAQ:AAPL"), json!(190.5)],
                    vec![json!("NYSE:IBM"), json!(140.25)],
                ],
            )
            .unwrap(),
        }
    }

    fn collector(dir: &std::path::Path, transport: Arc<dyn ScanTransport>) -> CollectorBuilder {
        let store = open_store(StorageFormat::Csv, dir, SnapshotNaming::default()).unwrap();
        let wall = Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap();
        Collector::builder(transport, store).clock(Arc::new(MonotonicClock::starting_at(wall)))
    }

    #[tokio::test(start_paused = true)]
    async fn test_collect_once_adds_metadata_and_saves() {
        let dir = tempfile::tempdir().unwrap();
        let collector = collector(dir.path(), Arc::new(StaticTransport(sample()))).build();

        let record = collector
            .collect_once(&Query::new(), "us_stocks", true)
            .await
            .unwrap();

        assert_eq!(record.total_count, 120);
        assert_eq!(
            record.table.columns(),
            &[
                "ticker",
                "close",
                "collection_timestamp",
                "collection_unix",
                "dataset_name"
            ]
        );
        assert_eq!(record.table.rows()[0][3], json!(1709285400));
        assert_eq!(record.table.rows()[1][4], json!("us_stocks"));
        assert!(record.findings.is_empty());

        let snapshot = record.snapshot.unwrap();
        assert_eq!(snapshot.name, "us_stocks_20240301_093000");
        assert_eq!(collector.store().list("us_stocks").unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_transform_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let collector = collector(dir.path(), Arc::new(StaticTransport(sample())))
            .add_metadata(false)
            .transform(transform("broken", |_| Err("division by zero".into())))
            .transform(transform("flag", |t| {
                Ok(t.clone().with_constant_column("flag", json!(true)))
            }))
            .build();

        let record = collector
            .collect_once(&Query::new(), "us", false)
            .await
            .unwrap();

        assert_eq!(
            record.callback_failures,
            vec![CallbackFailure {
                transform: "broken".to_string(),
                error: "division by zero".to_string(),
            }]
        );
        assert_eq!(record.table.columns(), &["ticker", "close", "flag"]);
        assert!(record.snapshot.is_none());
        assert!(collector.store().list("us").unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_execution_error_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let collector = collector(dir.path(), Arc::new(FailingTransport)).build();

        let err = collector
            .collect_once(&Query::new(), "us", true)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "malformed_response");
        assert!(collector.store().list("us").unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_dataset_name_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let collector = collector(dir.path(), Arc::new(StaticTransport(sample()))).build();
        assert!(collector
            .collect_once(&Query::new(), "../escape", true)
            .await
            .is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_monotonic_clock_follows_tokio_time() {
        let wall = Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap();
        let clock = MonotonicClock::starting_at(wall);
        tokio::time::advance(std::time::Duration::from_secs(90)).await;
        assert_eq!(clock.now(), wall + chrono::Duration::seconds(90));
    }
}

//! 데이터 수집 모듈.

pub mod batch;
pub mod collect;
pub mod historical;
pub mod multi_asset;
pub mod schedule;
pub mod validator;

pub use batch::BatchReport;
pub use collect::{
    attach_metadata, transform, CallbackFailure, Clock, CollectionRecord, Collector,
    CollectorBuilder, FnTransform, MonotonicClock, SystemClock, TableTransform, TransformError,
    COLLECTION_TIMESTAMP_COLUMN, COLLECTION_UNIX_COLUMN, DATASET_NAME_COLUMN, METADATA_COLUMNS,
};
pub use historical::{load_historical, HistoricalData};
pub use multi_asset::{resolve_symbol, AssetClass, MultiAssetScanner, MAJOR_SYMBOLS};
pub use schedule::{
    CycleOutcome, CycleState, ErrorPolicy, RetryState, ScheduleConfig, ScheduleReport,
};
pub use validator::{DataQualityValidator, Finding, FindingKind, NoopValidator, Validator};

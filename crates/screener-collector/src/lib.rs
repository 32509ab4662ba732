//! Scheduled and batch market scanner collector.
//!
//! 이 crate는 원격 스캐너 쿼리를 수집하는 라이브러리와 바이너리를 제공합니다:
//! - 단일 수집 (메타데이터, 변환, 품질 검사, 스냅샷 저장)
//! - 주기적 수집 (에러 정책, 재시도, 협조적 취소)
//! - 배치 수집 (데이터셋별 실패 격리)
//! - 과거 스냅샷 로드
//! - 다중 자산, 다중 타임프레임 조회

pub mod config;
pub mod error;
pub mod modules;
pub mod stats;

pub use config::CollectorConfig;
pub use error::{CollectorError, Result};
pub use modules::{
    BatchReport, CollectionRecord, Collector, CollectorBuilder, ErrorPolicy, HistoricalData,
    MultiAssetScanner, ScheduleConfig, ScheduleReport,
};
pub use stats::CollectionStats;

//! 원격 스캐너 조회 및 스냅샷 저장.
//!
//! 이 crate는 다음을 제공합니다:
//! - 원격 스캐너 HTTP 클라이언트 (페이지 이어붙이기, 세션 인증)
//! - 세션 자격증명 로드
//! - 스냅샷 저장소 (CSV, Parquet, SQLite)

pub mod error;
pub mod provider;
pub mod storage;

pub use error::{DataError, Result};

pub use provider::{
    ScanTransport, ScannerClient, ScannerConfig, SessionCredentials, DEFAULT_BASE_URL,
    DEFAULT_PAGE_SIZE, DEFAULT_TIMEOUT_SECS,
};

pub use storage::{
    open_store, SnapshotNaming, SnapshotRef, SnapshotStore, StorageFormat,
    DEFAULT_TIMESTAMP_FORMAT,
};

//! 원격 스캐너 Provider 모듈.
//!
//! ## 원격 스캐너
//! - `ScanTransport`: 쿼리 실행 추상화 (테스트에서 가짜 구현으로 대체)
//! - `ScannerClient`: HTTP 스캐너 클라이언트, 페이지 단위 조회 후 결과 이어붙이기
//!
//! ## 세션 자격증명
//! - `SessionCredentials`: 세션 쿠키 (실시간 데이터 요청용)

pub mod credentials;
pub mod scanner;

pub use credentials::SessionCredentials;
pub use scanner::{
    ScannerClient, ScannerConfig, DEFAULT_BASE_URL, DEFAULT_PAGE_SIZE, DEFAULT_TIMEOUT_SECS,
};

use async_trait::async_trait;
use screener_core::{ExecutionResult, Query};
use std::sync::Arc;

use crate::error::Result;

/// 쿼리 실행 전송 계층.
///
/// 구현체는 재시도하지 않습니다. 재시도 정책은 수집 스케줄러가 소유합니다.
#[async_trait]
pub trait ScanTransport: Send + Sync {
    /// 쿼리를 실행하고 전체 일치 수와 결과 테이블을 반환합니다.
    ///
    /// 자격증명이 없으면 서비스는 지연된 데이터를 반환합니다.
    async fn execute(
        &self,
        query: &Query,
        credentials: Option<&SessionCredentials>,
    ) -> Result<ExecutionResult>;
}

#[async_trait]
impl<T: ScanTransport + ?Sized> ScanTransport for Arc<T> {
    async fn execute(
        &self,
        query: &Query,
        credentials: Option<&SessionCredentials>,
    ) -> Result<ExecutionResult> {
        (**self).execute(query, credentials).await
    }
}

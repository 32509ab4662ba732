//! 쿼리 구성 에러 타입.
//!
//! 쿼리 구성 단계의 에러는 원인이 된 호출에서 즉시 반환되며 재시도되지 않습니다.

use thiserror::Error;

/// 쿼리/필터 구성 에러.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueryError {
    /// 잘못된 인자 (호출자 버그)
    #[error("잘못된 인자: {0}")]
    InvalidArgument(String),

    /// between 범위 하한이 상한보다 큼
    #[error("잘못된 범위: low={low}, high={high}")]
    InvalidRange { low: String, high: String },

    /// 원격 요청 형식을 쿼리로 복원할 수 없음
    #[error("요청 복원 실패: {0}")]
    Decode(String),
}

/// 쿼리 작업을 위한 Result 타입.
pub type QueryResult<T> = Result<T, QueryError>;

impl QueryError {
    /// 인자 에러를 생성합니다.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        QueryError::InvalidArgument(msg.into())
    }
}

//! 데이터 모듈 오류 타입.

use thiserror::Error;

/// 원격 조회 및 저장소 오류.
#[derive(Debug, Error)]
pub enum DataError {
    /// 연결/타임아웃 등 네트워크 수준 오류 (항상 재시도 가능)
    #[error("Transport error: {0}")]
    Transport(String),

    /// 원격 서비스가 요청을 거부함
    #[error("Service error [{status}]: {reason}")]
    Service { status: u16, reason: String },

    /// 응답 형식이 계약과 다름 (재시도 불가)
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// 디스크/저장소 오류
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// 설정 오류
    #[error("Configuration error: {0}")]
    Config(String),
}

impl DataError {
    /// 재시도 가능한 일시적 오류인지 확인합니다.
    ///
    /// 네트워크 오류와 5xx/429 서비스 오류만 재시도 대상입니다.
    pub fn is_retryable(&self) -> bool {
        match self {
            DataError::Transport(_) => true,
            DataError::Service { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    /// 로그용 오류 분류 이름.
    pub fn kind(&self) -> &'static str {
        match self {
            DataError::Transport(_) => "transport",
            DataError::Service { .. } => "service",
            DataError::MalformedResponse(_) => "malformed_response",
            DataError::Persistence(_) => "persistence",
            DataError::Config(_) => "config",
        }
    }
}

impl From<reqwest::Error> for DataError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            DataError::MalformedResponse(err.to_string())
        } else {
            DataError::Transport(err.to_string())
        }
    }
}

impl From<std::io::Error> for DataError {
    fn from(err: std::io::Error) -> Self {
        DataError::Persistence(err.to_string())
    }
}

impl From<csv::Error> for DataError {
    fn from(err: csv::Error) -> Self {
        DataError::Persistence(format!("csv: {}", err))
    }
}

impl From<polars::error::PolarsError> for DataError {
    fn from(err: polars::error::PolarsError) -> Self {
        DataError::Persistence(format!("parquet: {}", err))
    }
}

impl From<rusqlite::Error> for DataError {
    fn from(err: rusqlite::Error) -> Self {
        DataError::Persistence(format!("sqlite: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, DataError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(DataError::Transport("timeout".into()).is_retryable());
        assert!(DataError::Service {
            status: 503,
            reason: "unavailable".into()
        }
        .is_retryable());
        assert!(DataError::Service {
            status: 429,
            reason: "rate limited".into()
        }
        .is_retryable());
        assert!(!DataError::Service {
            status: 400,
            reason: "Unknown field".into()
        }
        .is_retryable());
        assert!(!DataError::MalformedResponse("missing totalCount".into()).is_retryable());
        assert!(!DataError::Persistence("disk full".into()).is_retryable());
    }

    #[test]
    fn test_display() {
        let err = DataError::Service {
            status: 400,
            reason: "Unknown field".into(),
        };
        assert_eq!(err.to_string(), "Service error [400]: Unknown field");
        assert_eq!(err.kind(), "service");
    }
}

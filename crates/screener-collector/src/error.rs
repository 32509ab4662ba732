//! 에러 타입 정의.

use screener_core::QueryError;
use screener_data::DataError;
use std::fmt;

/// Collector 에러 타입
#[derive(Debug)]
pub enum CollectorError {
    /// 쿼리 구성 에러 (호출자 버그, 재시도 안 함)
    Query(QueryError),
    /// 원격 조회 또는 저장소 에러
    Data(DataError),
    /// 설정 에러
    Config(String),
    /// 일반 에러
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl CollectorError {
    /// 재시도 가능한 일시적 에러인지 확인합니다.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Data(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// 로그용 에러 분류 이름.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Query(_) => "query",
            Self::Data(e) => e.kind(),
            Self::Config(_) => "config",
            Self::Other(_) => "other",
        }
    }
}

impl fmt::Display for CollectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Query(e) => write!(f, "Query error: {}", e),
            Self::Data(e) => write!(f, "{}", e),
            Self::Config(msg) => write!(f, "Configuration error: {}", msg),
            Self::Other(e) => write!(f, "Error: {}", e),
        }
    }
}

impl std::error::Error for CollectorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Query(e) => Some(e),
            Self::Data(e) => Some(e),
            Self::Config(_) => None,
            Self::Other(e) => Some(e.as_ref()),
        }
    }
}

impl From<QueryError> for CollectorError {
    fn from(err: QueryError) -> Self {
        Self::Query(err)
    }
}

impl From<DataError> for CollectorError {
    fn from(err: DataError) -> Self {
        match err {
            DataError::Config(msg) => Self::Config(msg),
            other => Self::Data(other),
        }
    }
}

impl From<config::ConfigError> for CollectorError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<std::env::VarError> for CollectorError {
    fn from(err: std::env::VarError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<Box<dyn std::error::Error + Send + Sync>> for CollectorError {
    fn from(err: Box<dyn std::error::Error + Send + Sync>) -> Self {
        Self::Other(err)
    }
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, CollectorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_delegates_to_data_error() {
        let err = CollectorError::from(DataError::Service {
            status: 503,
            reason: "unavailable".to_string(),
        });
        assert!(err.is_retryable());
        assert_eq!(err.kind(), "service");

        let err = CollectorError::from(DataError::MalformedResponse("no data".to_string()));
        assert!(!err.is_retryable());

        let err = CollectorError::from(QueryError::invalid_argument("empty select"));
        assert!(!err.is_retryable());
        assert_eq!(err.kind(), "query");
    }

    #[test]
    fn test_data_config_error_maps_to_config() {
        let err = CollectorError::from(DataError::Config("page_size".to_string()));
        assert!(matches!(err, CollectorError::Config(_)));
        assert_eq!(err.to_string(), "Configuration error: page_size");
    }
}

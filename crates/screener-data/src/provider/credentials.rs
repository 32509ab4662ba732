//! 원격 스캐너 세션 자격증명.
//!
//! 세션 쿠키 파일은 `{"sessionid": "..."}` 형식의 JSON입니다.
//! 값은 로그나 `Debug` 출력에 노출되지 않습니다.

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;

use crate::error::{DataError, Result};

/// 세션 ID 환경변수 이름.
pub const SESSION_ID_ENV: &str = "SCREENER_SESSION_ID";

/// 인증된 조회에 사용하는 세션 토큰.
#[derive(Debug, Clone)]
pub struct SessionCredentials {
    session_id: Arc<SecretString>,
}

#[derive(Deserialize)]
struct CookieFile {
    sessionid: String,
}

impl SessionCredentials {
    /// 세션 ID로 자격증명을 생성합니다.
    pub fn new(session_id: impl Into<String>) -> Result<Self> {
        let session_id = session_id.into();
        if session_id.trim().is_empty() {
            return Err(DataError::Config("세션 ID가 비어 있습니다".to_string()));
        }
        Ok(Self {
            session_id: Arc::new(SecretString::new(session_id.into_boxed_str())),
        })
    }

    /// 쿠키 JSON 파일에서 로드합니다.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            DataError::Config(format!("쿠키 파일 읽기 실패 ({}): {}", path.display(), e))
        })?;
        let cookie: CookieFile = serde_json::from_str(&text).map_err(|e| {
            DataError::Config(format!("쿠키 파일 형식 오류 ({}): {}", path.display(), e))
        })?;
        tracing::info!(path = %path.display(), "세션 쿠키 로드");
        Self::new(cookie.sessionid)
    }

    /// `SCREENER_SESSION_ID` 환경변수에서 로드합니다.
    pub fn from_env() -> Option<Self> {
        std::env::var(SESSION_ID_ENV)
            .ok()
            .and_then(|id| Self::new(id).ok())
    }

    /// `Cookie` 헤더 값.
    pub(crate) fn cookie_header(&self) -> String {
        format!("sessionid={}", self.session_id.expose_secret())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"sessionid": "abc123"}}"#).unwrap();

        let creds = SessionCredentials::from_json_file(file.path()).unwrap();
        assert_eq!(creds.cookie_header(), "sessionid=abc123");
    }

    #[test]
    fn test_rejects_empty_and_malformed() {
        assert!(SessionCredentials::new("  ").is_err());

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"token": "abc"}}"#).unwrap();
        assert!(matches!(
            SessionCredentials::from_json_file(file.path()),
            Err(DataError::Config(_))
        ));
    }

    #[test]
    fn test_debug_is_redacted() {
        let creds = SessionCredentials::new("very-secret").unwrap();
        assert!(!format!("{:?}", creds).contains("very-secret"));
    }
}

//! 설정 모듈.
//!
//! 환경변수(`from_env`) 또는 설정 파일(`load`)에서 읽습니다. 설정 파일 값은
//! `SCREENER__<섹션>__<키>` 환경변수로 덮어쓸 수 있습니다
//! (예: `SCREENER__STORAGE__FORMAT=sqlite`).

use crate::error::CollectorError;
use crate::modules::schedule::{ErrorPolicy, ScheduleConfig};
use crate::Result;
use screener_core::{LogConfig, LogFormat};
use screener_data::provider::credentials::SESSION_ID_ENV;
use screener_data::{
    ScannerConfig, SessionCredentials, SnapshotNaming, StorageFormat, DEFAULT_BASE_URL,
    DEFAULT_PAGE_SIZE, DEFAULT_TIMEOUT_SECS, DEFAULT_TIMESTAMP_FORMAT,
};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Collector 전체 설정
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// 저장소 설정
    pub storage: StorageConfig,
    /// 수집 파이프라인 설정
    pub pipeline: PipelineConfig,
    /// 원격 스캐너 설정
    pub scanner: ScannerSettings,
    /// 스케줄 설정
    pub schedule: ScheduleSettings,
    /// 로깅 설정
    pub logging: LoggingSettings,
}

/// 로깅 설정
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// 워크스페이스 크레이트 로그 레벨 (trace, debug, info, warn, error)
    pub level: String,
    /// 출력 형식 (pretty, json, compact)
    pub format: LogFormat,
    /// 수집 span 종료 시 소요 시간 출력
    pub span_timing: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
            span_timing: false,
        }
    }
}

/// 저장소 설정
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// 출력 디렉토리
    pub output_dir: PathBuf,
    /// 저장 형식 (csv, parquet, sqlite)
    pub format: StorageFormat,
    /// 스냅샷 이름의 타임스탬프 패턴 (strftime)
    pub timestamp_format: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("data"),
            format: StorageFormat::default(),
            timestamp_format: DEFAULT_TIMESTAMP_FORMAT.to_string(),
        }
    }
}

/// 수집 파이프라인 설정
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// 수집 메타데이터 컬럼 추가 여부
    pub add_metadata: bool,
    /// 데이터 품질 검사 여부
    pub validate: bool,
    /// 배치 수집 동시 실행 수
    pub batch_concurrency: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            add_metadata: true,
            validate: true,
            batch_concurrency: 1,
        }
    }
}

/// 원격 스캐너 설정
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct ScannerSettings {
    pub base_url: String,
    /// 요청 타임아웃 (초)
    pub timeout_secs: u64,
    /// 페이지당 행 수
    pub page_size: u64,
    /// 세션 ID (실시간 데이터)
    pub session_id: Option<String>,
    /// 세션 쿠키 JSON 파일 (`{"sessionid": "..."}`)
    pub session_file: Option<PathBuf>,
}

impl Default for ScannerSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            page_size: DEFAULT_PAGE_SIZE,
            session_id: None,
            session_file: None,
        }
    }
}

impl fmt::Debug for ScannerSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScannerSettings")
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .field("page_size", &self.page_size)
            .field("session_id", &self.session_id.as_ref().map(|_| "[REDACTED]"))
            .field("session_file", &self.session_file)
            .finish()
    }
}

/// 스케줄 설정
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScheduleSettings {
    /// 수집 주기 (분 단위)
    pub interval_minutes: u64,
    /// 최대 수집 횟수 (없으면 무제한)
    pub max_collections: Option<usize>,
    /// 실패 처리 정책
    pub on_error: ErrorPolicy,
    /// 사이클당 최대 재시도 횟수
    pub max_retries: u32,
    /// 재시도 간 지연 (초)
    pub retry_delay_secs: u64,
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            interval_minutes: 60,
            max_collections: None,
            on_error: ErrorPolicy::default(),
            max_retries: 3,
            retry_delay_secs: 30,
        }
    }
}

impl ScheduleSettings {
    /// 수집 주기를 Duration으로 반환
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_minutes * 60)
    }

    /// 재시도 지연을 Duration으로 반환
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }
}

impl CollectorConfig {
    /// 환경변수에서 설정 로드
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();
        let config = Self {
            storage: StorageConfig {
                output_dir: std::env::var("SCREENER_OUTPUT_DIR")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.storage.output_dir),
                format: match std::env::var("SCREENER_FORMAT") {
                    Ok(v) => v.parse()?,
                    Err(_) => defaults.storage.format,
                },
                timestamp_format: std::env::var("SCREENER_TIMESTAMP_FORMAT")
                    .unwrap_or(defaults.storage.timestamp_format),
            },
            pipeline: PipelineConfig {
                add_metadata: env_var_bool("SCREENER_ADD_METADATA", true),
                validate: env_var_bool("SCREENER_VALIDATE", true),
                batch_concurrency: env_var_parse("SCREENER_BATCH_CONCURRENCY", 1),
            },
            scanner: ScannerSettings {
                base_url: std::env::var("SCREENER_BASE_URL")
                    .unwrap_or(defaults.scanner.base_url),
                timeout_secs: env_var_parse("SCREENER_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS),
                page_size: env_var_parse("SCREENER_PAGE_SIZE", DEFAULT_PAGE_SIZE),
                session_id: std::env::var(SESSION_ID_ENV).ok(),
                session_file: std::env::var("SCREENER_SESSION_FILE").ok().map(PathBuf::from),
            },
            schedule: ScheduleSettings {
                interval_minutes: env_var_parse("SCHEDULE_INTERVAL_MINUTES", 60),
                // 0은 무제한
                max_collections: Some(env_var_parse("SCHEDULE_MAX_COLLECTIONS", 0usize))
                    .filter(|n| *n > 0),
                on_error: match std::env::var("SCHEDULE_ON_ERROR") {
                    Ok(v) => v.parse()?,
                    Err(_) => ErrorPolicy::default(),
                },
                max_retries: env_var_parse("SCHEDULE_MAX_RETRIES", 3),
                retry_delay_secs: env_var_parse("SCHEDULE_RETRY_DELAY_SECS", 30),
            },
            logging: LoggingSettings {
                level: std::env::var("SCREENER_LOG_LEVEL").unwrap_or(defaults.logging.level),
                format: match std::env::var("LOG_FORMAT") {
                    Ok(v) => v.parse().map_err(CollectorError::Config)?,
                    Err(_) => defaults.logging.format,
                },
                span_timing: env_var_bool("SCREENER_LOG_SPAN_TIMING", false),
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// 설정 파일에서 로드 (TOML, YAML, JSON 등 확장자로 판별)
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        dotenvy::dotenv().ok();

        let settings = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("SCREENER")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// 설정값 검증
    pub fn validate(&self) -> Result<()> {
        self.naming()?;
        if self.scanner.page_size == 0 {
            return Err(CollectorError::Config(
                "page_size는 0보다 커야 합니다".to_string(),
            ));
        }
        if self.scanner.timeout_secs == 0 {
            return Err(CollectorError::Config(
                "timeout_secs는 0보다 커야 합니다".to_string(),
            ));
        }
        if self.pipeline.batch_concurrency == 0 {
            return Err(CollectorError::Config(
                "batch_concurrency는 0보다 커야 합니다".to_string(),
            ));
        }
        if self.schedule.interval_minutes == 0 {
            return Err(CollectorError::Config(
                "interval_minutes는 0보다 커야 합니다".to_string(),
            ));
        }
        if self.logging.level.parse::<tracing::Level>().is_err() {
            return Err(CollectorError::Config(format!(
                "알 수 없는 로그 레벨: {}",
                self.logging.level
            )));
        }
        Ok(())
    }

    /// 스냅샷 이름 규칙
    pub fn naming(&self) -> Result<SnapshotNaming> {
        Ok(SnapshotNaming::new(&self.storage.timestamp_format)?)
    }

    /// 스캐너 클라이언트 설정
    pub fn scanner_config(&self) -> ScannerConfig {
        ScannerConfig::default()
            .with_base_url(&self.scanner.base_url)
            .with_timeout(Duration::from_secs(self.scanner.timeout_secs))
            .with_page_size(self.scanner.page_size)
    }

    /// 세션 자격증명. 쿠키 파일이 세션 ID보다 우선합니다.
    pub fn credentials(&self) -> Result<Option<SessionCredentials>> {
        if let Some(path) = &self.scanner.session_file {
            return Ok(Some(SessionCredentials::from_json_file(path)?));
        }
        match &self.scanner.session_id {
            Some(id) => Ok(Some(SessionCredentials::new(id.as_str())?)),
            None => Ok(None),
        }
    }

    /// 로깅 초기화 설정
    pub fn log_config(&self) -> LogConfig {
        LogConfig::for_level(&self.logging.level)
            .with_format(self.logging.format)
            .with_span_timing(self.logging.span_timing)
    }

    /// 스케줄 실행 설정
    pub fn schedule_config(&self) -> ScheduleConfig {
        let mut config = ScheduleConfig::new(self.schedule.interval())
            .with_on_error(self.schedule.on_error)
            .with_max_retries(self.schedule.max_retries)
            .with_retry_delay(self.schedule.retry_delay());
        config.max_collections = self.schedule.max_collections;
        config
    }
}

/// 환경변수에서 값을 파싱 (실패 시 기본값 사용)
fn env_var_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// 환경변수에서 bool 값 파싱
fn env_var_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| v == "true" || v == "1")
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = CollectorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.storage.format, StorageFormat::Csv);
        assert_eq!(config.schedule.interval(), Duration::from_secs(3600));
        assert_eq!(config.schedule.on_error, ErrorPolicy::Continue);
        assert!(config.credentials().unwrap().is_none());
    }

    #[test]
    fn test_invalid_timestamp_pattern_is_config_error() {
        let mut config = CollectorConfig::default();
        config.storage.timestamp_format = "%Y/%m/%d".to_string();
        assert!(matches!(config.validate(), Err(CollectorError::Config(_))));
    }

    #[test]
    fn test_load_from_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[storage]
output_dir = "snapshots"
format = "sqlite"

[pipeline]
validate = false

[scanner]
page_size = 250

[schedule]
interval_minutes = 15
max_collections = 4
on_error = "retry"
max_retries = 2

[logging]
level = "debug"
format = "json"
span_timing = true
"#
        )
        .unwrap();

        let config = CollectorConfig::load(file.path()).unwrap();
        assert_eq!(config.storage.output_dir, PathBuf::from("snapshots"));
        assert_eq!(config.storage.format, StorageFormat::Sqlite);
        assert_eq!(config.storage.timestamp_format, DEFAULT_TIMESTAMP_FORMAT);
        assert!(!config.pipeline.validate);
        assert!(config.pipeline.add_metadata);
        assert_eq!(config.scanner.page_size, 250);

        let schedule = config.schedule_config();
        assert_eq!(schedule.interval, Duration::from_secs(900));
        assert_eq!(schedule.max_collections, Some(4));
        assert_eq!(schedule.on_error, ErrorPolicy::Retry);
        assert_eq!(schedule.max_retries, 2);
        assert_eq!(schedule.retry_delay, Duration::from_secs(30));

        let log = config.log_config();
        assert_eq!(log.format, LogFormat::Json);
        assert!(log.span_timing);
        assert!(log.directives.contains("screener_collector=debug"));
    }

    #[test]
    fn test_load_env_override_uses_double_underscore_prefix() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[pipeline]\nbatch_concurrency = 2").unwrap();

        std::env::set_var("SCREENER__PIPELINE__BATCH_CONCURRENCY", "6");
        let loaded = CollectorConfig::load(file.path());
        std::env::remove_var("SCREENER__PIPELINE__BATCH_CONCURRENCY");

        assert_eq!(loaded.unwrap().pipeline.batch_concurrency, 6);
    }

    #[test]
    fn test_unknown_log_level_is_config_error() {
        let mut config = CollectorConfig::default();
        config.logging.level = "loud".to_string();
        assert!(matches!(config.validate(), Err(CollectorError::Config(_))));
    }

    #[test]
    fn test_session_id_is_redacted_in_debug() {
        let mut config = CollectorConfig::default();
        config.scanner.session_id = Some("secret-cookie".to_string());
        let debug = format!("{:?}", config);
        assert!(!debug.contains("secret-cookie"));
        assert!(config.credentials().unwrap().is_some());
    }
}

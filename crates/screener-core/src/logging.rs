//! 구조화 로깅 초기화.
//!
//! 라이브러리 컴포넌트는 `tracing` 매크로만 사용하고 subscriber를 설치하지 않습니다.
//! 수집기 바이너리가 시작 시 [`init_logging`]을 한 번 호출하며, 테스트는 필요하면
//! `tracing::subscriber::with_default`로 스코프 단위 subscriber를 씁니다.
//!
//! 모든 수집은 [`collection_span!`](crate::collection_span)으로 만든 span 안에서
//! 실행되므로 `span_timing`을 켜면 수집/사이클별 소요 시간이 span 종료 이벤트로 남습니다.

use serde::Deserialize;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

/// 로그 레벨이 적용되는 워크스페이스 크레이트.
pub const LOG_TARGETS: [&str; 3] = ["screener_collector", "screener_data", "screener_core"];

/// 로그 출력 형식.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// 사람이 읽기 쉬운 여러 줄 형식
    #[default]
    Pretty,
    /// 로그 집계용 JSON (현재 수집 span 필드 포함)
    Json,
    /// 장시간 스케줄 수집용 한 줄 형식
    Compact,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            "compact" => Ok(Self::Compact),
            _ => Err(format!("알 수 없는 로그 형식: {}", s)),
        }
    }
}

/// 로깅 설정.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// `EnvFilter` 지시어
    pub directives: String,
    /// 출력 형식
    pub format: LogFormat,
    /// 수집 span 종료 시 소요 시간 출력
    pub span_timing: bool,
}

impl LogConfig {
    /// 워크스페이스 크레이트에 `level`을 적용하는 설정을 생성합니다.
    ///
    /// 외부 크레이트(reqwest, hyper 등)는 `warn` 이상만 남깁니다.
    pub fn for_level(level: &str) -> Self {
        let directives = std::iter::once("warn".to_string())
            .chain(LOG_TARGETS.iter().map(|target| format!("{}={}", target, level)))
            .collect::<Vec<_>>()
            .join(",");
        Self {
            directives,
            format: LogFormat::default(),
            span_timing: false,
        }
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_span_timing(mut self, enabled: bool) -> Self {
        self.span_timing = enabled;
        self
    }
}

/// 전역 subscriber를 설치합니다. `RUST_LOG`가 있으면 설정의 지시어보다 우선합니다.
///
/// # 예제
///
/// ```no_run
/// use screener_core::logging::{init_logging, LogConfig, LogFormat};
///
/// init_logging(&LogConfig::for_level("debug").with_format(LogFormat::Compact)).unwrap();
/// ```
pub fn init_logging(config: &LogConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.directives))?;

    let span_events = if config.span_timing {
        FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let layer: Box<dyn Layer<Registry> + Send + Sync> = match config.format {
        LogFormat::Pretty => fmt::layer().pretty().with_span_events(span_events).boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .with_span_events(span_events)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_span_events(span_events).boxed(),
    };

    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .try_init()?;

    tracing::debug!(
        format = ?config.format,
        directives = %config.directives,
        span_timing = config.span_timing,
        "로깅 초기화 완료"
    );

    Ok(())
}

/// 데이터셋 이름(과 사이클 번호)이 포함된 수집 span을 생성하는 매크로.
#[macro_export]
macro_rules! collection_span {
    ($name:expr, $dataset:expr) => {
        tracing::info_span!($name, dataset = %$dataset)
    };
    ($name:expr, $dataset:expr, $cycle:expr) => {
        tracing::info_span!($name, dataset = %$dataset, cycle = $cycle)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parsing() {
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("COMPACT".parse::<LogFormat>().unwrap(), LogFormat::Compact);
        assert!("xml".parse::<LogFormat>().is_err());

        let format: LogFormat = serde_json::from_str("\"compact\"").unwrap();
        assert_eq!(format, LogFormat::Compact);
    }

    #[test]
    fn test_for_level_targets_workspace_crates() {
        let config = LogConfig::for_level("debug").with_span_timing(true);
        assert_eq!(
            config.directives,
            "warn,screener_collector=debug,screener_data=debug,screener_core=debug"
        );
        assert_eq!(config.format, LogFormat::Pretty);
        assert!(config.span_timing);
        assert!(EnvFilter::try_new(&config.directives).is_ok());
    }
}

//! 주기적 수집 스케줄러.
//!
//! 사이클마다 `collect_once`를 실행하며, 실패는 `ErrorPolicy`에 따라 처리합니다.
//!
//! ```text
//! PENDING → EXECUTING → SUCCEEDED
//!               ↓
//!            FAILED ──(retry 정책, 재시도 가능 에러)──→ PENDING
//! ```
//!
//! 대기 지점은 사이클 간 interval 대기와 재시도 대기 두 곳이며, 취소 신호는
//! 이 두 지점에서만 확인합니다. 진행 중인 네트워크 호출은 중단하지 않습니다.

use screener_core::Query;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use super::collect::{CollectionRecord, Collector};
use crate::error::{CollectorError, Result};
use crate::stats::CollectionStats;

/// 사이클 실패 처리 정책.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorPolicy {
    /// 스케줄 전체를 중단하고 에러를 반환
    Stop,
    /// 이번 사이클을 건너뛰고 다음 interval을 기다림
    #[default]
    Continue,
    /// 고정 지연 후 재시도, 모두 실패하면 `Continue`와 같음
    Retry,
}

impl fmt::Display for ErrorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorPolicy::Stop => "stop",
            ErrorPolicy::Continue => "continue",
            ErrorPolicy::Retry => "retry",
        };
        f.write_str(s)
    }
}

impl FromStr for ErrorPolicy {
    type Err = CollectorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "stop" => Ok(ErrorPolicy::Stop),
            "continue" => Ok(ErrorPolicy::Continue),
            "retry" => Ok(ErrorPolicy::Retry),
            other => Err(CollectorError::Config(format!(
                "알 수 없는 에러 정책: {}",
                other
            ))),
        }
    }
}

/// 기본 재시도 지연
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(30);
/// 기본 최대 재시도 횟수
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// 스케줄 설정.
#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    /// 사이클 시작 간격
    pub interval: Duration,
    /// 최대 사이클 수 (`None`이면 무제한)
    pub max_collections: Option<usize>,
    pub on_error: ErrorPolicy,
    /// 사이클당 최대 재시도 횟수 (`Retry` 정책에서만 사용)
    pub max_retries: u32,
    /// 재시도 간 고정 지연
    pub retry_delay: Duration,
    /// 사이클마다 스냅샷 저장 여부
    pub save: bool,
}

impl ScheduleConfig {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            max_collections: None,
            on_error: ErrorPolicy::default(),
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
            save: true,
        }
    }

    pub fn with_max_collections(mut self, max: usize) -> Self {
        self.max_collections = Some(max);
        self
    }

    pub fn with_on_error(mut self, policy: ErrorPolicy) -> Self {
        self.on_error = policy;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn with_save(mut self, save: bool) -> Self {
        self.save = save;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.interval.is_zero() {
            return Err(CollectorError::Config(
                "수집 간격은 0보다 커야 합니다".to_string(),
            ));
        }
        Ok(())
    }
}

/// 사이클 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CycleState {
    Pending,
    Executing,
    Succeeded,
    Failed,
}

/// 사이클별 재시도 카운터. 사이클마다 새로 시작합니다.
#[derive(Debug, Clone, Copy)]
pub struct RetryState {
    retries: u32,
    max_retries: u32,
}

impl RetryState {
    pub fn new(max_retries: u32) -> Self {
        Self {
            retries: 0,
            max_retries,
        }
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// 재시도 여유가 있으면 카운터를 올리고 `true`.
    pub fn try_acquire(&mut self) -> bool {
        if self.retries < self.max_retries {
            self.retries += 1;
            true
        } else {
            false
        }
    }

    pub fn reset(&mut self) {
        self.retries = 0;
    }
}

/// 사이클 한 번의 결과.
#[derive(Debug, Clone, Serialize)]
pub struct CycleOutcome {
    /// 1부터 시작하는 사이클 번호
    pub cycle: usize,
    pub state: CycleState,
    /// 실행 시도 수 (재시도 포함)
    pub attempts: u32,
    pub error: Option<String>,
}

/// 스케줄 실행 결과.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScheduleReport {
    /// 성공한 사이클의 수집 결과 (시간 순)
    pub records: Vec<CollectionRecord>,
    pub cycles: Vec<CycleOutcome>,
    pub stats: CollectionStats,
}

/// 상태 전이를 추적하는 사이클.
struct Cycle {
    number: usize,
    state: CycleState,
    attempts: u32,
}

impl Cycle {
    fn new(number: usize) -> Self {
        Self {
            number,
            state: CycleState::Pending,
            attempts: 0,
        }
    }

    fn transition(&mut self, next: CycleState) {
        tracing::debug!(cycle = self.number, from = ?self.state, to = ?next, "사이클 상태 전이");
        if next == CycleState::Executing {
            self.attempts += 1;
        }
        self.state = next;
    }

    fn outcome(&self, error: Option<&CollectorError>) -> CycleOutcome {
        CycleOutcome {
            cycle: self.number,
            state: self.state,
            attempts: self.attempts,
            error: error.map(|e| e.to_string()),
        }
    }
}

/// 사이클 종료 사유.
enum CycleEnd {
    Succeeded(Box<CollectionRecord>),
    Failed(CollectorError),
    /// 재시도 대기 중 취소됨
    Cancelled(CollectorError),
}

impl Collector {
    /// 쿼리를 주기적으로 수집합니다.
    ///
    /// 첫 사이클은 즉시 시작하며, 이후 사이클은 이전 사이클 시작 시점 기준
    /// `interval`마다 시작합니다. 사이클이 interval보다 오래 걸리면 밀린 틱은 건너뜁니다.
    ///
    /// `max_collections`에 도달하거나 `shutdown`이 취소되면 종료합니다.
    /// 취소되어도 이미 수집된 결과는 보고서에 포함됩니다.
    ///
    /// # Errors
    ///
    /// `ErrorPolicy::Stop`에서 사이클이 실패하면 그 에러를 반환합니다.
    /// 다른 정책에서는 실패가 통계와 사이클 결과에 기록될 뿐 반환되지 않습니다.
    pub async fn schedule_collection(
        &self,
        query: &Query,
        dataset: &str,
        config: &ScheduleConfig,
        shutdown: CancellationToken,
    ) -> Result<ScheduleReport> {
        config.validate()?;

        tracing::info!(
            dataset = dataset,
            interval_secs = config.interval.as_secs(),
            max_collections = ?config.max_collections,
            on_error = %config.on_error,
            max_retries = config.max_retries,
            "스케줄 수집 시작"
        );

        let started = Instant::now();
        let mut report = ScheduleReport::default();
        let mut interval = tokio::time::interval(config.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            if let Some(max) = config.max_collections {
                if report.stats.cycles >= max {
                    break;
                }
            }

            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    tracing::info!(dataset = dataset, "종료 신호 수신, 스케줄 중단");
                    report.stats.cancelled = true;
                    break;
                }
                _ = interval.tick() => {}
            }

            report.stats.cycles += 1;
            let mut cycle = Cycle::new(report.stats.cycles);
            let span = screener_core::collection_span!("schedule_cycle", dataset, cycle.number);
            let end = self
                .run_cycle(query, dataset, config, &mut cycle, &shutdown, &mut report.stats)
                .instrument(span)
                .await;

            match end {
                CycleEnd::Succeeded(record) => {
                    report.stats.success += 1;
                    report.stats.total_rows += record.table.height();
                    report.cycles.push(cycle.outcome(None));
                    report.records.push(*record);
                    tracing::info!(
                        dataset = dataset,
                        cycle = cycle.number,
                        next_in_secs = config.interval.as_secs(),
                        "사이클 완료"
                    );
                }
                CycleEnd::Failed(err) => {
                    report.stats.failed_cycles += 1;
                    report.cycles.push(cycle.outcome(Some(&err)));
                    if config.on_error == ErrorPolicy::Stop {
                        report.stats.elapsed = started.elapsed();
                        report.stats.log_summary("스케줄 수집 (중단)");
                        return Err(err);
                    }
                    tracing::warn!(
                        dataset = dataset,
                        cycle = cycle.number,
                        error = %err,
                        "사이클 실패, 다음 주기까지 대기"
                    );
                }
                CycleEnd::Cancelled(err) => {
                    report.stats.failed_cycles += 1;
                    report.stats.cancelled = true;
                    report.cycles.push(cycle.outcome(Some(&err)));
                    tracing::info!(dataset = dataset, "재시도 대기 중 종료 신호 수신, 스케줄 중단");
                    break;
                }
            }
        }

        report.stats.elapsed = started.elapsed();
        report.stats.log_summary("스케줄 수집");
        Ok(report)
    }

    async fn run_cycle(
        &self,
        query: &Query,
        dataset: &str,
        config: &ScheduleConfig,
        cycle: &mut Cycle,
        shutdown: &CancellationToken,
        stats: &mut CollectionStats,
    ) -> CycleEnd {
        let mut retry = RetryState::new(config.max_retries);

        loop {
            cycle.transition(CycleState::Executing);
            let err = match self.collect_once(query, dataset, config.save).await {
                Ok(record) => {
                    cycle.transition(CycleState::Succeeded);
                    return CycleEnd::Succeeded(Box::new(record));
                }
                Err(err) => err,
            };

            cycle.transition(CycleState::Failed);
            stats.record_failure(&err);
            tracing::error!(
                dataset = dataset,
                cycle = cycle.number,
                attempt = cycle.attempts,
                kind = err.kind(),
                error = %err,
                "수집 실패"
            );

            let can_retry = config.on_error == ErrorPolicy::Retry
                && err.is_retryable()
                && retry.try_acquire();
            if !can_retry {
                return CycleEnd::Failed(err);
            }

            stats.retries += 1;
            tracing::warn!(
                dataset = dataset,
                cycle = cycle.number,
                retry = retry.retries(),
                max_retries = config.max_retries,
                delay_secs = config.retry_delay.as_secs(),
                "재시도 대기"
            );

            tokio::select! {
                biased;
                _ = shutdown.cancelled() => return CycleEnd::Cancelled(err),
                _ = tokio::time::sleep(config.retry_delay) => {}
            }
            cycle.transition(CycleState::Pending);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_policy_parse() {
        assert_eq!("stop".parse::<ErrorPolicy>().unwrap(), ErrorPolicy::Stop);
        assert_eq!("RETRY".parse::<ErrorPolicy>().unwrap(), ErrorPolicy::Retry);
        assert_eq!(ErrorPolicy::default(), ErrorPolicy::Continue);
        assert!("ignore".parse::<ErrorPolicy>().is_err());
        assert_eq!(ErrorPolicy::Continue.to_string(), "continue");
    }

    #[test]
    fn test_retry_state_bounds() {
        let mut retry = RetryState::new(2);
        assert!(retry.try_acquire());
        assert!(retry.try_acquire());
        assert!(!retry.try_acquire());
        assert_eq!(retry.retries(), 2);

        retry.reset();
        assert_eq!(retry.retries(), 0);
        assert!(!RetryState::new(0).try_acquire());
    }

    #[test]
    fn test_cycle_counts_attempts() {
        let mut cycle = Cycle::new(1);
        cycle.transition(CycleState::Executing);
        cycle.transition(CycleState::Failed);
        cycle.transition(CycleState::Pending);
        cycle.transition(CycleState::Executing);
        cycle.transition(CycleState::Succeeded);

        let outcome = cycle.outcome(None);
        assert_eq!(outcome.attempts, 2);
        assert_eq!(outcome.state, CycleState::Succeeded);
    }

    #[test]
    fn test_zero_interval_rejected() {
        assert!(ScheduleConfig::new(Duration::ZERO).validate().is_err());
        assert!(ScheduleConfig::new(Duration::from_secs(1)).validate().is_ok());
    }
}

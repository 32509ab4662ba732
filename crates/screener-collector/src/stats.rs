//! 수집 통계 구조체.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 수집 작업 통계
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollectionStats {
    /// 시도한 사이클(또는 배치 항목) 수
    pub cycles: usize,
    /// 성공 횟수
    pub success: usize,
    /// 재시도 후에도 실패한 사이클 수
    pub failed_cycles: usize,
    /// 실패한 실행 시도 수 (재시도 포함)
    pub failed_attempts: usize,
    /// 재시도 횟수
    pub retries: usize,
    /// 수집된 총 행 수
    pub total_rows: usize,
    /// 마지막 에러 메시지
    pub last_error: Option<String>,
    /// 외부 취소로 종료되었는지 여부
    pub cancelled: bool,
    /// 소요 시간
    #[serde(skip)]
    pub elapsed: Duration,
}

impl CollectionStats {
    /// 새 통계 객체 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// 성공률 계산 (%)
    pub fn success_rate(&self) -> f64 {
        if self.cycles == 0 {
            0.0
        } else {
            (self.success as f64 / self.cycles as f64) * 100.0
        }
    }

    /// 실패 기록
    pub fn record_failure(&mut self, error: impl ToString) {
        self.failed_attempts += 1;
        self.last_error = Some(error.to_string());
    }

    /// 통계 요약 로그 출력
    pub fn log_summary(&self, operation: &str) {
        tracing::info!(
            operation = operation,
            cycles = self.cycles,
            success = self.success,
            failed_cycles = self.failed_cycles,
            failed_attempts = self.failed_attempts,
            retries = self.retries,
            total_rows = self.total_rows,
            cancelled = self.cancelled,
            success_rate = format!("{:.1}%", self.success_rate()),
            elapsed = format!("{:.1}s", self.elapsed.as_secs_f64()),
            "수집 완료"
        );
        if let Some(err) = &self.last_error {
            tracing::warn!(operation = operation, last_error = %err, "마지막 실패");
        }
    }
}

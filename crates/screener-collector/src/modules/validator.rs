//! 수집 데이터 품질 검사.
//!
//! 검사는 테이블을 변경하지 않고 파이프라인을 실패시키지도 않습니다.
//! 결과는 `Finding` 목록으로 반환되며 처리 방법은 호출자가 결정합니다.

use screener_core::ResultTable;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;

/// 결측 비율 기본 임계값 (이 값을 초과하면 보고)
pub const DEFAULT_NULL_THRESHOLD: f64 = 0.5;

/// 품질 문제 종류.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingKind {
    /// 결과 행 없음
    EmptyResult,
    /// 컬럼 결측 비율이 임계값 초과
    HighNullFraction,
    /// 중복 행 존재
    DuplicateRows,
    /// 모든 값이 같은 컬럼
    ConstantColumn,
}

/// 검사 결과 한 건.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Finding {
    pub kind: FindingKind,
    /// 관련 컬럼 (테이블 전체 문제면 `None`)
    pub column: Option<String>,
    pub message: String,
}

impl Finding {
    fn new(kind: FindingKind, column: Option<&str>, message: String) -> Self {
        Self {
            kind,
            column: column.map(str::to_string),
            message,
        }
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// 데이터 품질 검사기.
pub trait Validator: Send + Sync {
    fn validate(&self, table: &ResultTable) -> Vec<Finding>;
}

/// 검사를 수행하지 않는 검사기 (검증 비활성화 시 사용).
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopValidator;

impl Validator for NoopValidator {
    fn validate(&self, _table: &ResultTable) -> Vec<Finding> {
        Vec::new()
    }
}

/// 기본 품질 검사기.
///
/// 빈 결과, 결측 비율, 중복 행, 상수 컬럼을 검사합니다.
#[derive(Debug, Clone)]
pub struct DataQualityValidator {
    null_threshold: f64,
    /// 상수 컬럼 검사에서 제외할 컬럼 (수집 메타데이터 등)
    constant_exempt: HashSet<String>,
}

impl Default for DataQualityValidator {
    fn default() -> Self {
        Self {
            null_threshold: DEFAULT_NULL_THRESHOLD,
            constant_exempt: HashSet::new(),
        }
    }
}

impl DataQualityValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 결측 비율 임계값 설정 (0.0 ~ 1.0).
    pub fn with_null_threshold(mut self, threshold: f64) -> Self {
        self.null_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    /// 상수 컬럼 검사에서 제외할 컬럼 추가.
    pub fn exempt_constant<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.constant_exempt
            .extend(columns.into_iter().map(Into::into));
        self
    }

    fn null_findings(&self, table: &ResultTable, findings: &mut Vec<Finding>) {
        let height = table.height() as f64;
        for column in table.columns() {
            let Some(values) = table.column_values(column) else {
                continue;
            };
            let nulls = values.filter(|v| v.is_null()).count();
            let fraction = nulls as f64 / height;
            if fraction > self.null_threshold {
                findings.push(Finding::new(
                    FindingKind::HighNullFraction,
                    Some(column),
                    format!("결측 비율 높음: {} ({:.1}%)", column, fraction * 100.0),
                ));
            }
        }
    }

    fn duplicate_findings(table: &ResultTable, findings: &mut Vec<Finding>) {
        // Value는 Hash를 구현하지 않으므로 직렬화한 행을 키로 사용
        let mut seen = HashSet::with_capacity(table.height());
        let duplicates = table
            .rows()
            .iter()
            .filter(|row| !seen.insert(Value::Array(row.to_vec()).to_string()))
            .count();
        if duplicates > 0 {
            findings.push(Finding::new(
                FindingKind::DuplicateRows,
                None,
                format!("중복 행 {}건", duplicates),
            ));
        }
    }

    /// 결측값을 제외한 고유값이 하나 이하인 컬럼. 한 행짜리 결과도 검사합니다.
    fn constant_findings(&self, table: &ResultTable, findings: &mut Vec<Finding>) {
        for column in table.columns() {
            if self.constant_exempt.contains(column) {
                continue;
            }
            let Some(values) = table.column_values(column) else {
                continue;
            };
            let mut distinct: Vec<&Value> = Vec::with_capacity(2);
            for value in values.filter(|v| !v.is_null()) {
                if !distinct.contains(&value) {
                    distinct.push(value);
                    if distinct.len() > 1 {
                        break;
                    }
                }
            }
            if distinct.len() <= 1 {
                findings.push(Finding::new(
                    FindingKind::ConstantColumn,
                    Some(column),
                    format!("상수 컬럼: {}", column),
                ));
            }
        }
    }
}

impl Validator for DataQualityValidator {
    fn validate(&self, table: &ResultTable) -> Vec<Finding> {
        let mut findings = Vec::new();

        if table.is_empty() {
            findings.push(Finding::new(
                FindingKind::EmptyResult,
                None,
                "조회 결과가 비어 있음".to_string(),
            ));
            return findings;
        }

        self.null_findings(table, &mut findings);
        Self::duplicate_findings(table, &mut findings);
        self.constant_findings(table, &mut findings);
        findings
    }
}

/// 검사 결과를 로그로 출력합니다.
pub fn log_findings(dataset: &str, findings: &[Finding]) {
    if findings.is_empty() {
        tracing::debug!(dataset = dataset, "데이터 검증 통과");
        return;
    }
    tracing::warn!(dataset = dataset, count = findings.len(), "데이터 품질 문제 발견");
    for finding in findings {
        tracing::warn!(
            dataset = dataset,
            kind = ?finding.kind,
            column = finding.column.as_deref().unwrap_or("-"),
            "  - {}",
            finding.message
        );
    }
}

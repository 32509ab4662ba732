//! 필터 표현식 트리.
//!
//! 필터는 리프 조건(필드, 연산자, 피연산자) 또는 자식 필터를 순서대로 담는
//! AND/OR 노드입니다. 트리는 컴파일되기 전까지 순수 데이터이며 클라이언트 측에서
//! 평가되지 않습니다.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use super::field::FieldRef;
use crate::error::{QueryError, QueryResult};
use crate::types::ScalarValue;

/// 리프 조건 연산자.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    Gt,
    Lt,
    Gte,
    Lte,
    Eq,
    Ne,
    Between,
    In,
    NotIn,
    Like,
}

impl FilterOp {
    /// 모든 연산자.
    pub const ALL: [FilterOp; 10] = [
        FilterOp::Gt,
        FilterOp::Lt,
        FilterOp::Gte,
        FilterOp::Lte,
        FilterOp::Eq,
        FilterOp::Ne,
        FilterOp::Between,
        FilterOp::In,
        FilterOp::NotIn,
        FilterOp::Like,
    ];

    /// 원격 스캐너 연산 이름.
    pub fn wire_name(&self) -> &'static str {
        match self {
            FilterOp::Gt => "greater",
            FilterOp::Gte => "egreater",
            FilterOp::Lt => "less",
            FilterOp::Lte => "eless",
            FilterOp::Eq => "equal",
            FilterOp::Ne => "nequal",
            FilterOp::Between => "in_range",
            FilterOp::In => "has",
            FilterOp::NotIn => "has_none_of",
            FilterOp::Like => "match",
        }
    }

    /// 원격 스캐너 연산 이름에서 파싱합니다.
    pub fn from_wire_name(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.wire_name() == s)
    }
}

impl fmt::Display for FilterOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// 리프 조건의 피연산자.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// 단일 값 (비교 연산자, like)
    Scalar(ScalarValue),
    /// 닫힌 구간 `[low, high]` (between), 항상 `low <= high`
    Range(ScalarValue, ScalarValue),
    /// 값 목록 (in, not-in)
    List(Vec<ScalarValue>),
}

impl Operand {
    /// 검증된 범위 피연산자를 생성합니다.
    ///
    /// # Errors
    ///
    /// 경계가 NaN/무한대이면 `QueryError::InvalidArgument`,
    /// `low > high`이거나 경계를 비교할 수 없으면 `QueryError::InvalidRange`.
    pub fn range(low: ScalarValue, high: ScalarValue) -> QueryResult<Self> {
        ensure_finite(&low)?;
        ensure_finite(&high)?;
        match low.compare_bound(&high) {
            Some(Ordering::Less) | Some(Ordering::Equal) => Ok(Operand::Range(low, high)),
            _ => Err(QueryError::InvalidRange {
                low: low.to_string(),
                high: high.to_string(),
            }),
        }
    }

    /// 모든 값이 JSON으로 표현 가능한지 검사합니다.
    fn ensure_finite(&self) -> QueryResult<()> {
        match self {
            Operand::Scalar(v) => ensure_finite(v),
            Operand::Range(low, high) => {
                ensure_finite(low)?;
                ensure_finite(high)
            }
            Operand::List(values) => values.iter().try_for_each(ensure_finite),
        }
    }

    fn is_compatible_with(&self, op: FilterOp) -> bool {
        match (op, self) {
            (FilterOp::Between, Operand::Range(..)) => true,
            (FilterOp::In | FilterOp::NotIn, Operand::List(_)) => true,
            (FilterOp::Like, Operand::Scalar(ScalarValue::Text(_))) => true,
            (
                FilterOp::Gt
                | FilterOp::Lt
                | FilterOp::Gte
                | FilterOp::Lte
                | FilterOp::Eq
                | FilterOp::Ne,
                Operand::Scalar(_),
            ) => true,
            _ => false,
        }
    }
}

fn ensure_finite(value: &ScalarValue) -> QueryResult<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(QueryError::InvalidArgument(format!(
            "유한하지 않은 피연산자: {}",
            value
        )))
    }
}

/// 필터 트리 노드.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// 리프 조건
    Leaf {
        field: FieldRef,
        op: FilterOp,
        operand: Operand,
    },
    /// 모든 자식이 참 (자식 순서 보존)
    And(Vec<Filter>),
    /// 하나 이상의 자식이 참 (자식 순서 보존)
    Or(Vec<Filter>),
}

impl Filter {
    /// 연산자/피연산자 호환성을 검사하여 리프를 생성합니다.
    ///
    /// # Errors
    ///
    /// 피연산자에 NaN/무한대가 있거나 연산자와 호환되지 않으면
    /// `QueryError::InvalidArgument`, 범위가 뒤집혔으면 `QueryError::InvalidRange`.
    pub fn leaf(field: FieldRef, op: FilterOp, operand: Operand) -> QueryResult<Self> {
        operand.ensure_finite()?;
        if let Operand::Range(low, high) = &operand {
            // 직접 구성된 범위도 같은 불변식을 따른다
            Operand::range(low.clone(), high.clone())?;
        }
        if !operand.is_compatible_with(op) {
            return Err(QueryError::InvalidArgument(format!(
                "{} 연산자와 호환되지 않는 피연산자: {:?}",
                op, operand
            )));
        }
        Ok(Filter::Leaf { field, op, operand })
    }

    /// 논리곱 노드를 생성합니다.
    pub fn and<I: IntoIterator<Item = Filter>>(filters: I) -> Self {
        Filter::And(filters.into_iter().collect())
    }

    /// 논리합 노드를 생성합니다.
    pub fn or<I: IntoIterator<Item = Filter>>(filters: I) -> Self {
        Filter::Or(filters.into_iter().collect())
    }

    /// 트리의 모든 리프가 [`Filter::leaf`]의 불변식을 만족하는지 검사합니다.
    ///
    /// 필드 빌더 메서드는 검증 없이 리프를 만들므로 쿼리에 추가될 때 호출됩니다.
    pub fn validate(&self) -> QueryResult<()> {
        match self {
            Filter::Leaf { field, op, operand } => {
                Filter::leaf(field.clone(), *op, operand.clone()).map(|_| ())
            }
            Filter::And(children) | Filter::Or(children) => {
                children.iter().try_for_each(Filter::validate)
            }
        }
    }

    /// 필터링 효과가 없는 빈 논리곱인지 확인합니다.
    pub fn is_empty(&self) -> bool {
        matches!(self, Filter::And(children) if children.is_empty())
    }

    /// 리프 조건 수.
    pub fn leaf_count(&self) -> usize {
        match self {
            Filter::Leaf { .. } => 1,
            Filter::And(children) | Filter::Or(children) => {
                children.iter().map(Filter::leaf_count).sum()
            }
        }
    }
}

impl Default for Filter {
    fn default() -> Self {
        Filter::And(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::col;

    #[test]
    fn test_wire_names_are_distinct() {
        for op in FilterOp::ALL {
            assert_eq!(FilterOp::from_wire_name(op.wire_name()), Some(op));
        }
        assert_eq!(FilterOp::from_wire_name("crosses"), None);
    }

    #[test]
    fn test_combinators_preserve_order() {
        let tree = Filter::or([col("RSI").gt(70), col("RSI").lt(30)]);
        match &tree {
            Filter::Or(children) => {
                assert_eq!(children.len(), 2);
                assert_eq!(children[0], col("RSI").gt(70));
            }
            other => panic!("unexpected node: {:?}", other),
        }
        assert_eq!(Filter::and([tree.clone(), col("volume").gt(1)]).leaf_count(), 3);
        assert!(Filter::default().is_empty());
        assert!(!tree.is_empty());
    }

    #[test]
    fn test_leaf_rejects_incompatible_operand() {
        let err = Filter::leaf(
            col("close"),
            FilterOp::Between,
            Operand::Scalar(ScalarValue::Int(1)),
        );
        assert!(matches!(err, Err(QueryError::InvalidArgument(_))));

        let err = Filter::leaf(
            col("close"),
            FilterOp::Between,
            Operand::Range(ScalarValue::Int(9), ScalarValue::Int(1)),
        );
        assert!(matches!(err, Err(QueryError::InvalidRange { .. })));

        assert!(Filter::leaf(col("name"), FilterOp::Like, Operand::Scalar("AA".into())).is_ok());
    }

    #[test]
    fn test_non_finite_operands_rejected() {
        for v in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let err = Filter::leaf(col("close"), FilterOp::Gt, Operand::Scalar(v.into()));
            assert!(matches!(err, Err(QueryError::InvalidArgument(_))));
            assert!(matches!(
                col("close").between(0.0, v),
                Err(QueryError::InvalidArgument(_))
            ));
        }

        let tree = Filter::or([
            col("volume").gt(10),
            col("close").isin([1.0, f64::NAN]),
        ]);
        assert!(matches!(tree.validate(), Err(QueryError::InvalidArgument(_))));
        assert!(Filter::and([col("close").gt(1.5)]).validate().is_ok());
    }

    #[test]
    fn test_between_equal_bounds() {
        let f = col("close").between(5, 5).unwrap();
        assert_eq!(
            f,
            Filter::Leaf {
                field: col("close"),
                op: FilterOp::Between,
                operand: Operand::Range(ScalarValue::Int(5), ScalarValue::Int(5)),
            }
        );
        assert!(matches!(
            col("close").between(6, 5),
            Err(QueryError::InvalidRange { .. })
        ));
    }
}

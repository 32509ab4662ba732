//! 필터 피연산자로 사용되는 스칼라 값.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// 필터 비교에 사용하는 스칼라 값.
///
/// 원격 요청에서는 JSON 원시값 그대로 직렬화됩니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScalarValue {
    /// 불리언
    Bool(bool),
    /// 정수
    Int(i64),
    /// 실수
    Float(f64),
    /// 문자열
    Text(String),
}

impl ScalarValue {
    /// 숫자 값이면 f64로 반환합니다.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ScalarValue::Int(v) => Some(*v as f64),
            ScalarValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// 원격 요청 JSON으로 표현할 수 있는 값인지 확인합니다 (NaN, 무한대 제외).
    pub fn is_finite(&self) -> bool {
        match self {
            ScalarValue::Float(v) => v.is_finite(),
            _ => true,
        }
    }

    /// 범위 경계 비교.
    ///
    /// 숫자끼리, 문자열끼리만 비교 가능하며 그 외 조합이나 NaN은 `None`.
    pub fn compare_bound(&self, other: &ScalarValue) -> Option<Ordering> {
        match (self, other) {
            (ScalarValue::Text(a), ScalarValue::Text(b)) => Some(a.cmp(b)),
            (ScalarValue::Bool(a), ScalarValue::Bool(b)) => Some(a.cmp(b)),
            (ScalarValue::Int(a), ScalarValue::Int(b)) => Some(a.cmp(b)),
            _ => self.as_f64()?.partial_cmp(&other.as_f64()?),
        }
    }

    /// JSON 값으로 변환합니다.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            ScalarValue::Bool(v) => serde_json::Value::Bool(*v),
            ScalarValue::Int(v) => serde_json::Value::from(*v),
            ScalarValue::Float(v) => serde_json::Value::from(*v),
            ScalarValue::Text(v) => serde_json::Value::String(v.clone()),
        }
    }

    /// JSON 원시값에서 변환합니다. 배열/객체/null은 `None`.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Bool(v) => Some(ScalarValue::Bool(*v)),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Some(ScalarValue::Int(i)),
                None => n.as_f64().map(ScalarValue::Float),
            },
            serde_json::Value::String(s) => Some(ScalarValue::Text(s.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarValue::Bool(v) => write!(f, "{}", v),
            ScalarValue::Int(v) => write!(f, "{}", v),
            ScalarValue::Float(v) => write!(f, "{}", v),
            ScalarValue::Text(v) => write!(f, "{:?}", v),
        }
    }
}

impl From<bool> for ScalarValue {
    fn from(v: bool) -> Self {
        ScalarValue::Bool(v)
    }
}

impl From<i32> for ScalarValue {
    fn from(v: i32) -> Self {
        ScalarValue::Int(v as i64)
    }
}

impl From<i64> for ScalarValue {
    fn from(v: i64) -> Self {
        ScalarValue::Int(v)
    }
}

impl From<u32> for ScalarValue {
    fn from(v: u32) -> Self {
        ScalarValue::Int(v as i64)
    }
}

impl From<f64> for ScalarValue {
    fn from(v: f64) -> Self {
        ScalarValue::Float(v)
    }
}

impl From<&str> for ScalarValue {
    fn from(v: &str) -> Self {
        ScalarValue::Text(v.to_string())
    }
}

impl From<String> for ScalarValue {
    fn from(v: String) -> Self {
        ScalarValue::Text(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compare_bound() {
        let a = ScalarValue::from(1);
        let b = ScalarValue::from(2.5);
        assert_eq!(a.compare_bound(&b), Some(Ordering::Less));
        assert_eq!(
            ScalarValue::from("b").compare_bound(&ScalarValue::from("a")),
            Some(Ordering::Greater)
        );
        assert_eq!(ScalarValue::from("a").compare_bound(&ScalarValue::from(1)), None);
        assert_eq!(ScalarValue::from(f64::NAN).compare_bound(&ScalarValue::from(1)), None);
    }

    #[test]
    fn test_is_finite() {
        assert!(ScalarValue::from(1.5).is_finite());
        assert!(ScalarValue::from("inf").is_finite());
        assert!(!ScalarValue::from(f64::NAN).is_finite());
        assert!(!ScalarValue::from(f64::NEG_INFINITY).is_finite());
    }

    #[test]
    fn test_json_conversion() {
        let v: ScalarValue = serde_json::from_str("5").unwrap();
        assert_eq!(v, ScalarValue::Int(5));
        let v: ScalarValue = serde_json::from_str("5.5").unwrap();
        assert_eq!(v, ScalarValue::Float(5.5));
        let v: ScalarValue = serde_json::from_str("\"AAPL\"").unwrap();
        assert_eq!(v, ScalarValue::Text("AAPL".to_string()));

        assert_eq!(
            ScalarValue::from_json(&serde_json::json!(1_000_000_000)),
            Some(ScalarValue::Int(1_000_000_000))
        );
        assert_eq!(ScalarValue::from_json(&serde_json::Value::Null), None);
    }
}

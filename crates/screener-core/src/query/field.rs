//! 원격 스캐너 필드 참조.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::filter::{Filter, FilterOp, Operand};
use crate::error::QueryResult;
use crate::types::{Resolution, ScalarValue};

/// 원격 스캐너 필드를 가리키는 불변 참조.
///
/// 해상도가 지정되면 `name|code` 형식으로 렌더링됩니다 (예: `RSI|60`).
/// 생성은 절대 실패하지 않습니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub struct FieldRef {
    name: String,
    resolution: Option<Resolution>,
}

/// 필드 참조를 생성합니다.
///
/// `"close|60"`처럼 해상도 접미사가 포함된 문자열도 허용합니다.
pub fn col(name: impl AsRef<str>) -> FieldRef {
    FieldRef::parse(name.as_ref())
}

impl FieldRef {
    /// 해상도 없는 필드 참조를 생성합니다.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            resolution: None,
        }
    }

    /// 렌더링된 문자열에서 파싱합니다.
    ///
    /// 접미사가 알려진 해상도 코드가 아니면 전체 문자열을 필드 이름으로 취급합니다.
    pub fn parse(s: &str) -> Self {
        if let Some((name, suffix)) = s.rsplit_once('|') {
            if let Some(resolution) = Resolution::from_code(suffix) {
                if !name.is_empty() {
                    return Self {
                        name: name.to_string(),
                        resolution: Some(resolution),
                    };
                }
            }
        }
        Self::new(s)
    }

    /// 해상도를 지정한 새 참조를 반환합니다.
    pub fn at(mut self, resolution: Resolution) -> Self {
        self.resolution = Some(resolution);
        self
    }

    /// 필드 이름 (해상도 접미사 제외).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 지정된 해상도.
    pub fn resolution(&self) -> Option<Resolution> {
        self.resolution
    }

    /// 원격 요청용 문자열로 렌더링합니다.
    pub fn render(&self) -> String {
        match self.resolution {
            Some(r) => format!("{}|{}", self.name, r.code()),
            None => self.name.clone(),
        }
    }

    fn leaf(&self, op: FilterOp, operand: Operand) -> Filter {
        Filter::Leaf {
            field: self.clone(),
            op,
            operand,
        }
    }

    /// `field > value`
    pub fn gt(&self, value: impl Into<ScalarValue>) -> Filter {
        self.leaf(FilterOp::Gt, Operand::Scalar(value.into()))
    }

    /// `field >= value`
    pub fn gte(&self, value: impl Into<ScalarValue>) -> Filter {
        self.leaf(FilterOp::Gte, Operand::Scalar(value.into()))
    }

    /// `field < value`
    pub fn lt(&self, value: impl Into<ScalarValue>) -> Filter {
        self.leaf(FilterOp::Lt, Operand::Scalar(value.into()))
    }

    /// `field <= value`
    pub fn lte(&self, value: impl Into<ScalarValue>) -> Filter {
        self.leaf(FilterOp::Lte, Operand::Scalar(value.into()))
    }

    /// `field == value`
    pub fn eq(&self, value: impl Into<ScalarValue>) -> Filter {
        self.leaf(FilterOp::Eq, Operand::Scalar(value.into()))
    }

    /// `field != value`
    pub fn ne(&self, value: impl Into<ScalarValue>) -> Filter {
        self.leaf(FilterOp::Ne, Operand::Scalar(value.into()))
    }

    /// `low <= field <= high`
    ///
    /// # Errors
    ///
    /// `low > high`이거나 두 경계를 비교할 수 없으면 `QueryError::InvalidRange`.
    pub fn between(
        &self,
        low: impl Into<ScalarValue>,
        high: impl Into<ScalarValue>,
    ) -> QueryResult<Filter> {
        let operand = Operand::range(low.into(), high.into())?;
        Ok(self.leaf(FilterOp::Between, operand))
    }

    /// 값 목록 포함 여부.
    pub fn isin<I, V>(&self, values: I) -> Filter
    where
        I: IntoIterator<Item = V>,
        V: Into<ScalarValue>,
    {
        self.leaf(
            FilterOp::In,
            Operand::List(values.into_iter().map(Into::into).collect()),
        )
    }

    /// 값 목록 미포함 여부.
    pub fn not_in<I, V>(&self, values: I) -> Filter
    where
        I: IntoIterator<Item = V>,
        V: Into<ScalarValue>,
    {
        self.leaf(
            FilterOp::NotIn,
            Operand::List(values.into_iter().map(Into::into).collect()),
        )
    }

    /// 패턴 매칭.
    pub fn like(&self, pattern: impl Into<String>) -> Filter {
        self.leaf(FilterOp::Like, Operand::Scalar(ScalarValue::Text(pattern.into())))
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl From<&str> for FieldRef {
    fn from(s: &str) -> Self {
        FieldRef::parse(s)
    }
}

impl From<String> for FieldRef {
    fn from(s: String) -> Self {
        FieldRef::parse(&s)
    }
}

impl From<&FieldRef> for FieldRef {
    fn from(f: &FieldRef) -> Self {
        f.clone()
    }
}

impl From<FieldRef> for String {
    fn from(f: FieldRef) -> Self {
        f.render()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_render() {
        let f = col("close|60");
        assert_eq!(f.name(), "close");
        assert_eq!(f.resolution(), Some(Resolution::H1));
        assert_eq!(f.render(), "close|60");

        let f = col("MACD.macd");
        assert_eq!(f.resolution(), None);
        assert_eq!(f.render(), "MACD.macd");

        // 알 수 없는 접미사는 이름의 일부로 남는다
        let f = col("weird|xyz");
        assert_eq!(f.name(), "weird|xyz");
        assert_eq!(f.resolution(), None);
    }

    #[test]
    fn test_at_resolution() {
        let f = FieldRef::new("RSI").at(Resolution::H4);
        assert_eq!(f.to_string(), "RSI|240");
        assert_eq!(FieldRef::parse(&f.render()), f);
    }

    #[test]
    fn test_between_validation() {
        assert!(col("market_cap_basic").between(100, 2_000).is_ok());
        assert!(col("price").between(5, 5).is_ok());
        assert!(col("price").between(10, 5).is_err());
    }
}

//! 선언적 스캐너 쿼리 빌더.
//!
//! 조회 필드, 필터 트리, 정렬, 결과 윈도우, 종목 범위(universe)를 누적합니다.
//! 잘못된 상태는 변경 시점에 거부되므로 컴파일은 항상 성공합니다.
//!
//! # 사용 예
//!
//! ```
//! use screener_core::{col, Query};
//!
//! let query = Query::new()
//!     .select(["name", "close", "volume", "market_cap_basic"])?
//!     .filter([
//!         col("market_cap_basic").gt(1_000_000_000),
//!         col("volume").gt(100_000),
//!     ])?
//!     .order_by("volume", false)
//!     .limit(500)?;
//!
//! assert_eq!(query.limit_value(), 500);
//! # Ok::<(), screener_core::QueryError>(())
//! ```

use super::field::FieldRef;
use super::filter::Filter;
use crate::error::{QueryError, QueryResult};

/// 새 쿼리의 기본 시장.
pub const DEFAULT_MARKET: &str = "america";

/// 새 쿼리의 기본 조회 필드.
pub const DEFAULT_FIELDS: [&str; 4] = ["name", "close", "volume", "market_cap_basic"];

/// 새 쿼리의 기본 결과 수.
pub const DEFAULT_LIMIT: u64 = 50;

/// 쿼리가 실행되는 종목 범위.
///
/// 시장 이름과 명시적 티커 목록은 상호 배타적입니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Universe {
    /// 명명된 시장/세그먼트 (예: `america`, `crypto`, `forex`)
    Market(String),
    /// 명시적 종목 식별자 목록 (예: `NASDAQ:AAPL`)
    Tickers(Vec<String>),
}

impl Universe {
    /// 스캔 엔드포인트 경로 세그먼트.
    pub fn endpoint(&self) -> &str {
        match self {
            Universe::Market(market) => market,
            Universe::Tickers(_) => "global",
        }
    }
}

/// 정렬 기준.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    pub field: FieldRef,
    pub ascending: bool,
}

/// 스캐너 쿼리.
///
/// 실행은 쿼리를 변경하지 않으므로 같은 쿼리를 반복 실행할 수 있습니다.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    fields: Vec<FieldRef>,
    filter: Filter,
    sort: Option<SortSpec>,
    offset: u64,
    limit: u64,
    universe: Universe,
}

impl Default for Query {
    fn default() -> Self {
        Self {
            fields: DEFAULT_FIELDS.iter().map(|f| FieldRef::parse(f)).collect(),
            filter: Filter::default(),
            sort: None,
            offset: 0,
            limit: DEFAULT_LIMIT,
            universe: Universe::Market(DEFAULT_MARKET.to_string()),
        }
    }
}

impl Query {
    /// 기본 설정의 새 쿼리를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 조회 필드를 설정합니다 (기존 목록 대체).
    ///
    /// 순서는 유지되며 중복은 첫 번째 항목으로 합쳐집니다.
    ///
    /// # Errors
    ///
    /// 필드가 하나도 없거나 빈 이름이 있으면 `QueryError::InvalidArgument`.
    pub fn select<I, F>(mut self, fields: I) -> QueryResult<Self>
    where
        I: IntoIterator<Item = F>,
        F: Into<FieldRef>,
    {
        let mut selected: Vec<FieldRef> = Vec::new();
        for field in fields.into_iter().map(Into::into) {
            if field.name().is_empty() {
                return Err(QueryError::invalid_argument("빈 필드 이름은 선택할 수 없습니다"));
            }
            if !selected.contains(&field) {
                selected.push(field);
            }
        }
        if selected.is_empty() {
            return Err(QueryError::invalid_argument(
                "select에는 최소 하나의 필드가 필요합니다",
            ));
        }
        self.fields = selected;
        Ok(self)
    }

    /// 필터를 기존 필터 트리에 논리곱으로 추가합니다.
    ///
    /// # Errors
    ///
    /// 추가하는 필터에 NaN/무한대 피연산자, 호환되지 않는 피연산자,
    /// 뒤집힌 범위가 있으면 실패하며 쿼리는 변경되지 않습니다.
    pub fn filter<I: IntoIterator<Item = Filter>>(mut self, filters: I) -> QueryResult<Self> {
        let added: Vec<Filter> = filters.into_iter().collect();
        added.iter().try_for_each(Filter::validate)?;
        if added.is_empty() {
            return Ok(self);
        }
        self.filter = match std::mem::take(&mut self.filter) {
            Filter::And(mut children) => {
                children.extend(added);
                Filter::And(children)
            }
            other => {
                let mut children = vec![other];
                children.extend(added);
                Filter::And(children)
            }
        };
        Ok(self)
    }

    /// 정렬 기준을 설정합니다.
    pub fn order_by(mut self, field: impl Into<FieldRef>, ascending: bool) -> Self {
        self.sort = Some(SortSpec {
            field: field.into(),
            ascending,
        });
        self
    }

    /// 결과 수를 제한합니다.
    ///
    /// # Errors
    ///
    /// `n <= 0`이면 `QueryError::InvalidArgument`.
    pub fn limit(mut self, n: i64) -> QueryResult<Self> {
        if n <= 0 {
            return Err(QueryError::InvalidArgument(format!(
                "limit은 양수여야 합니다: {}",
                n
            )));
        }
        self.limit = n as u64;
        Ok(self)
    }

    /// 결과 윈도우 시작 위치를 설정합니다.
    pub fn offset(mut self, n: u64) -> Self {
        self.offset = n;
        self
    }

    /// 명명된 시장으로 범위를 설정합니다 (티커 목록 해제).
    pub fn set_universe(mut self, market: impl Into<String>) -> QueryResult<Self> {
        let market = market.into();
        if market.trim().is_empty() {
            return Err(QueryError::invalid_argument("시장 이름이 비어 있습니다"));
        }
        self.universe = Universe::Market(market);
        Ok(self)
    }

    /// 명시적 티커 목록으로 범위를 설정합니다 (시장 해제).
    pub fn set_tickers<I, S>(mut self, tickers: I) -> QueryResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tickers: Vec<String> = tickers.into_iter().map(Into::into).collect();
        if tickers.is_empty() {
            return Err(QueryError::invalid_argument("티커 목록이 비어 있습니다"));
        }
        if tickers.iter().any(|t| t.trim().is_empty()) {
            return Err(QueryError::invalid_argument("빈 티커가 포함되어 있습니다"));
        }
        self.universe = Universe::Tickers(tickers);
        Ok(self)
    }

    /// 선택된 필드.
    pub fn fields(&self) -> &[FieldRef] {
        &self.fields
    }

    /// 필터 트리 루트.
    pub fn filter_tree(&self) -> &Filter {
        &self.filter
    }

    /// 정렬 기준.
    pub fn sort(&self) -> Option<&SortSpec> {
        self.sort.as_ref()
    }

    /// 결과 윈도우 시작 위치.
    pub fn offset_value(&self) -> u64 {
        self.offset
    }

    /// 결과 윈도우 크기.
    pub fn limit_value(&self) -> u64 {
        self.limit
    }

    /// 종목 범위.
    pub fn universe(&self) -> &Universe {
        &self.universe
    }

    /// 결과 테이블 컬럼 이름 (`ticker` + 선택 필드).
    pub fn result_columns(&self) -> Vec<String> {
        std::iter::once(super::TICKER_COLUMN.to_string())
            .chain(self.fields.iter().map(FieldRef::render))
            .collect()
    }
}

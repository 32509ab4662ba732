//! 원격 스캐너 요청 형식.
//!
//! [`Query::compile`]은 전송 가능한 [`ScanRequest`]를 생성하며 실패하지 않습니다.
//! [`Query::from_request`]는 반대 방향으로, 저장된 요청 파일을 다시 쿼리로 읽을 때
//! 사용됩니다.

use serde::{Deserialize, Serialize};

use super::builder::{Query, SortSpec, Universe};
use super::field::FieldRef;
use super::filter::{Filter, FilterOp, Operand};
use crate::error::{QueryError, QueryResult};
use crate::types::ScalarValue;

/// 원격 스캔 요청 본문.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanRequest {
    pub markets: Vec<String>,
    pub symbols: SymbolSet,
    #[serde(default)]
    pub options: RequestOptions,
    pub columns: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter2: Option<WireNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<WireSort>,
    /// `[from, to)` 결과 윈도우
    pub range: [u64; 2],
}

/// 명시적 종목 목록.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SymbolSet {
    #[serde(default)]
    pub query: SymbolQuery,
    #[serde(default)]
    pub tickers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SymbolQuery {
    #[serde(default)]
    pub types: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestOptions {
    pub lang: String,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            lang: "en".to_string(),
        }
    }
}

/// 정렬 지정.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireSort {
    #[serde(rename = "sortBy")]
    pub sort_by: String,
    #[serde(rename = "sortOrder")]
    pub sort_order: SortOrder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

/// 필터 트리 노드의 원격 표현.
///
/// `{"expression": {...}}` 또는 `{"operation": {...}}` 형태로 직렬화됩니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireNode {
    Expression(WireExpression),
    Operation(WireOperation),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireExpression {
    pub left: String,
    pub operation: String,
    pub right: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireOperation {
    pub operator: LogicalOperator,
    pub operands: Vec<WireNode>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogicalOperator {
    And,
    Or,
}

impl ScanRequest {
    /// 결과 윈도우만 바꾼 요청을 반환합니다 (페이지 요청용).
    pub fn with_range(&self, from: u64, to: u64) -> Self {
        let mut request = self.clone();
        request.range = [from, to];
        request
    }

    /// 요청된 윈도우 크기.
    pub fn window_len(&self) -> u64 {
        self.range[1].saturating_sub(self.range[0])
    }
}

impl WireNode {
    /// 필터 트리를 원격 노드로 컴파일합니다.
    pub fn compile(filter: &Filter) -> Self {
        match filter {
            Filter::Leaf { field, op, operand } => WireNode::Expression(WireExpression {
                left: field.render(),
                operation: op.wire_name().to_string(),
                right: operand_to_json(operand),
            }),
            Filter::And(children) => WireNode::Operation(WireOperation {
                operator: LogicalOperator::And,
                operands: children.iter().map(WireNode::compile).collect(),
            }),
            Filter::Or(children) => WireNode::Operation(WireOperation {
                operator: LogicalOperator::Or,
                operands: children.iter().map(WireNode::compile).collect(),
            }),
        }
    }

    /// 원격 노드에서 필터 트리를 복원합니다.
    ///
    /// # Errors
    ///
    /// 알 수 없는 연산 이름이나 연산자와 맞지 않는 피연산자는 `QueryError::Decode`,
    /// 역전된 범위는 `QueryError::InvalidRange`.
    pub fn decode(&self) -> QueryResult<Filter> {
        match self {
            WireNode::Expression(expr) => {
                let op = FilterOp::from_wire_name(&expr.operation).ok_or_else(|| {
                    QueryError::Decode(format!("알 수 없는 연산: {}", expr.operation))
                })?;
                let operand = operand_from_json(op, &expr.right)?;
                Filter::leaf(FieldRef::parse(&expr.left), op, operand)
            }
            WireNode::Operation(operation) => {
                let children = operation
                    .operands
                    .iter()
                    .map(WireNode::decode)
                    .collect::<QueryResult<Vec<_>>>()?;
                Ok(match operation.operator {
                    LogicalOperator::And => Filter::And(children),
                    LogicalOperator::Or => Filter::Or(children),
                })
            }
        }
    }
}

fn operand_to_json(operand: &Operand) -> serde_json::Value {
    match operand {
        Operand::Scalar(v) => v.to_json(),
        Operand::Range(low, high) => serde_json::Value::Array(vec![low.to_json(), high.to_json()]),
        Operand::List(values) => {
            serde_json::Value::Array(values.iter().map(ScalarValue::to_json).collect())
        }
    }
}

fn scalar_from_json(value: &serde_json::Value) -> QueryResult<ScalarValue> {
    ScalarValue::from_json(value)
        .ok_or_else(|| QueryError::Decode(format!("스칼라 값이 아님: {}", value)))
}

fn operand_from_json(op: FilterOp, value: &serde_json::Value) -> QueryResult<Operand> {
    match op {
        FilterOp::Between => match value.as_array().map(Vec::as_slice) {
            Some([low, high]) => Ok(Operand::Range(scalar_from_json(low)?, scalar_from_json(high)?)),
            _ => Err(QueryError::Decode(format!(
                "{} 연산에는 [low, high] 배열이 필요합니다: {}",
                op, value
            ))),
        },
        FilterOp::In | FilterOp::NotIn => {
            let items = value.as_array().ok_or_else(|| {
                QueryError::Decode(format!("{} 연산에는 배열이 필요합니다: {}", op, value))
            })?;
            Ok(Operand::List(
                items.iter().map(scalar_from_json).collect::<QueryResult<_>>()?,
            ))
        }
        _ => Ok(Operand::Scalar(scalar_from_json(value)?)),
    }
}

impl Query {
    /// 원격 요청으로 컴파일합니다.
    ///
    /// 결정적이며 실패하지 않습니다. 빈 필터 트리는 `filter2`를 생략합니다.
    pub fn compile(&self) -> ScanRequest {
        let (markets, tickers) = match self.universe() {
            Universe::Market(market) => (vec![market.clone()], Vec::new()),
            Universe::Tickers(tickers) => (Vec::new(), tickers.clone()),
        };
        let filter = self.filter_tree();
        let offset = self.offset_value();

        ScanRequest {
            markets,
            symbols: SymbolSet {
                query: SymbolQuery::default(),
                tickers,
            },
            options: RequestOptions::default(),
            columns: self.fields().iter().map(FieldRef::render).collect(),
            filter2: (!filter.is_empty()).then(|| WireNode::compile(filter)),
            sort: self.sort().map(WireSort::from),
            range: [offset, offset.saturating_add(self.limit_value())],
        }
    }

    /// 원격 요청에서 쿼리를 복원합니다.
    ///
    /// # Errors
    ///
    /// 컬럼이 없거나, 범위가 비었거나, 종목 범위가 지정되지 않았거나,
    /// 필터 노드를 해석할 수 없으면 실패합니다.
    pub fn from_request(request: &ScanRequest) -> QueryResult<Self> {
        let [from, to] = request.range;
        if to <= from {
            return Err(QueryError::Decode(format!("빈 결과 윈도우: [{}, {})", from, to)));
        }
        let limit = i64::try_from(to - from)
            .map_err(|_| QueryError::Decode(format!("결과 윈도우가 너무 큽니다: {}", to - from)))?;

        let mut query = Query::new()
            .select(request.columns.iter().map(String::as_str))
            .map_err(|e| QueryError::Decode(e.to_string()))?
            .offset(from)
            .limit(limit)?;

        query = if !request.symbols.tickers.is_empty() {
            query.set_tickers(request.symbols.tickers.iter().cloned())?
        } else {
            let market = request
                .markets
                .first()
                .ok_or_else(|| QueryError::Decode("시장과 티커가 모두 비어 있습니다".to_string()))?;
            query.set_universe(market.clone())?
        };

        if let Some(node) = &request.filter2 {
            query = match node.decode()? {
                Filter::And(children) => query.filter(children)?,
                other => query.filter([other])?,
            };
        }

        if let Some(sort) = &request.sort {
            query = query.order_by(sort.sort_by.as_str(), sort.sort_order == SortOrder::Asc);
        }

        Ok(query)
    }
}

impl From<&SortSpec> for WireSort {
    fn from(spec: &SortSpec) -> Self {
        WireSort {
            sort_by: spec.field.render(),
            sort_order: if spec.ascending {
                SortOrder::Asc
            } else {
                SortOrder::Desc
            },
        }
    }
}

//! 조회 결과 테이블.
//!
//! 원격 스캐너는 행마다 서로 다른 타입의 값을 돌려주므로 셀은
//! `serde_json::Value`로 보관합니다. `Null`은 결측값입니다.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{QueryError, QueryResult};

/// 이름 있는 컬럼과 순서 있는 행으로 구성된 결과 테이블.
///
/// 모든 행의 길이는 컬럼 수와 같습니다.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultTable {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl ResultTable {
    /// 빈 테이블을 생성합니다.
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// 컬럼과 행으로 테이블을 생성합니다.
    ///
    /// # Errors
    ///
    /// 행 길이가 컬럼 수와 다르면 `QueryError::InvalidArgument`.
    pub fn from_rows(columns: Vec<String>, rows: Vec<Vec<Value>>) -> QueryResult<Self> {
        let mut table = Self {
            columns,
            rows: Vec::with_capacity(rows.len()),
        };
        for row in rows {
            table.push_row(row)?;
        }
        Ok(table)
    }

    /// 행을 추가합니다.
    pub fn push_row(&mut self, row: Vec<Value>) -> QueryResult<()> {
        if row.len() != self.columns.len() {
            return Err(QueryError::InvalidArgument(format!(
                "행 길이 불일치: expected={}, actual={}",
                self.columns.len(),
                row.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    /// 행 수.
    pub fn height(&self) -> usize {
        self.rows.len()
    }

    /// 컬럼 수.
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// 컬럼 위치.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// 컬럼 값 반복자.
    pub fn column_values<'a>(&'a self, name: &str) -> Option<impl Iterator<Item = &'a Value> + 'a> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(move |row| &row[idx]))
    }

    /// 모든 행에 같은 값을 가진 컬럼을 설정합니다.
    ///
    /// 이미 존재하는 컬럼이면 값을 덮어씁니다.
    pub fn with_constant_column(mut self, name: impl Into<String>, value: Value) -> Self {
        let name = name.into();
        match self.column_index(&name) {
            Some(idx) => {
                for row in &mut self.rows {
                    row[idx] = value.clone();
                }
            }
            None => {
                self.columns.push(name);
                for row in &mut self.rows {
                    row.push(value.clone());
                }
            }
        }
        self
    }

    /// 여러 테이블을 순서대로 이어 붙입니다.
    ///
    /// 컬럼은 첫 등장 순서의 합집합이며 없는 컬럼은 `Null`로 채워집니다.
    pub fn concat<'a, I>(tables: I) -> Self
    where
        I: IntoIterator<Item = &'a ResultTable>,
    {
        let tables: Vec<&ResultTable> = tables.into_iter().collect();
        let mut columns: Vec<String> = Vec::new();
        for table in &tables {
            for column in &table.columns {
                if !columns.contains(column) {
                    columns.push(column.clone());
                }
            }
        }

        let mut rows = Vec::with_capacity(tables.iter().map(|t| t.height()).sum());
        for table in &tables {
            let mapping: Vec<Option<usize>> =
                columns.iter().map(|c| table.column_index(c)).collect();
            for row in &table.rows {
                rows.push(
                    mapping
                        .iter()
                        .map(|idx| idx.map(|i| row[i].clone()).unwrap_or(Value::Null))
                        .collect(),
                );
            }
        }

        Self { columns, rows }
    }
}

/// 원격 실행 결과.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// 윈도우 적용 전 전체 일치 수
    pub total_count: u64,
    /// 요청한 정렬 순서의 결과 행
    pub table: ResultTable,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn table(columns: &[&str], rows: Vec<Vec<Value>>) -> ResultTable {
        ResultTable::from_rows(columns.iter().map(|c| c.to_string()).collect(), rows).unwrap()
    }

    #[test]
    fn test_push_row_checks_width() {
        let mut t = ResultTable::new(["ticker", "close"]);
        assert!(t.push_row(vec![json!("NASDAQ:AAPL"), json!(190.1)]).is_ok());
        assert!(t.push_row(vec![json!("NASDAQ:MSFT")]).is_err());
        assert_eq!(t.height(), 1);
        assert_eq!(t.width(), 2);
    }

    #[test]
    fn test_with_constant_column() {
        let t = table(&["ticker"], vec![vec![json!("A")], vec![json!("B")]])
            .with_constant_column("dataset_name", json!("us"));
        assert_eq!(t.columns(), &["ticker", "dataset_name"]);
        let values: Vec<&Value> = t.column_values("dataset_name").unwrap().collect();
        assert_eq!(values, vec![&json!("us"), &json!("us")]);

        let t = t.with_constant_column("dataset_name", json!("eu"));
        assert_eq!(t.width(), 2);
        assert_eq!(t.rows()[1][1], json!("eu"));
    }

    #[test]
    fn test_concat_schema_union() {
        let a = table(&["ticker", "close"], vec![vec![json!("A"), json!(1.0)]]);
        let b = table(
            &["ticker", "volume"],
            vec![vec![json!("B"), json!(10)], vec![json!("C"), json!(20)]],
        );
        let c = ResultTable::concat([&a, &b]);
        assert_eq!(c.columns(), &["ticker", "close", "volume"]);
        assert_eq!(c.height(), 3);
        assert_eq!(c.rows()[0], vec![json!("A"), json!(1.0), Value::Null]);
        assert_eq!(c.rows()[2], vec![json!("C"), Value::Null, json!(20)]);
    }
}

//! SQLite 스냅샷 저장소.
//!
//! 데이터셋마다 `{dataset}.db` 하나를 사용하고, 스냅샷마다
//! `{dataset}_{timestamp}` 테이블 하나를 만듭니다. 같은 이름의 테이블이 있으면
//! 순번을 붙인 `{dataset}_{timestamp}_N` 테이블을 만듭니다.
//! `_snapshots` 카탈로그 테이블이 스냅샷 목록과 수집 시각을 보관합니다.

use chrono::{DateTime, Utc};
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params, params_from_iter, Connection, TransactionBehavior};
use screener_core::ResultTable;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

use super::{
    sort_snapshots, validate_dataset_name, SnapshotNaming, SnapshotRef, SnapshotStore,
    StorageFormat, MAX_SEQUENCE,
};
use crate::error::{DataError, Result};

const CATALOG_TABLE: &str = "_snapshots";

/// SQLite 저장소.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    root: PathBuf,
    naming: SnapshotNaming,
}

impl SqliteStore {
    pub fn new(output_dir: impl AsRef<Path>, naming: SnapshotNaming) -> Result<Self> {
        let root = output_dir.as_ref().to_path_buf();
        fs::create_dir_all(&root).map_err(|e| {
            DataError::Persistence(format!("출력 디렉토리 생성 실패 ({}): {}", root.display(), e))
        })?;
        Ok(Self { root, naming })
    }

    /// 데이터셋 DB 경로.
    pub fn db_path(&self, dataset: &str) -> PathBuf {
        self.root
            .join(format!("{}.{}", dataset, StorageFormat::Sqlite.extension()))
    }

    fn connect(&self, dataset: &str) -> Result<Connection> {
        let conn = Connection::open(self.db_path(dataset))?;
        conn.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS {} (
                    table_name TEXT PRIMARY KEY,
                    dataset TEXT NOT NULL,
                    collected_at TEXT NOT NULL,
                    row_count INTEGER NOT NULL
                )",
                CATALOG_TABLE
            ),
            [],
        )?;
        Ok(conn)
    }
}

/// SQL 식별자로 사용할 수 있도록 테이블 이름을 정리합니다.
pub fn sanitize_table_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

/// 아직 없는 스냅샷 테이블 이름을 고릅니다.
fn free_table_name(conn: &Connection, base: &str) -> Result<String> {
    for sequence in 0..MAX_SEQUENCE {
        let candidate = sanitize_table_name(&SnapshotNaming::sequenced(base, sequence));
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
            params![candidate],
            |row| row.get(0),
        )?;
        if !exists {
            return Ok(candidate);
        }
    }
    Err(DataError::Persistence(format!(
        "사용 가능한 스냅샷 테이블 이름이 없습니다: {}",
        base
    )))
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn to_sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => n.as_f64().map(SqlValue::Real).unwrap_or(SqlValue::Null),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

fn from_sql_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Value::from(f),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Value::String(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}

impl SnapshotStore for SqliteStore {
    fn format(&self) -> StorageFormat {
        StorageFormat::Sqlite
    }

    fn save(
        &self,
        table: &ResultTable,
        dataset: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<SnapshotRef> {
        validate_dataset_name(dataset)?;
        let (base, timestamp) = self.naming.stamp(dataset, timestamp);

        let mut conn = self.connect(dataset)?;
        // 이름 선택과 생성 사이에 다른 writer가 끼어들지 않도록 즉시 쓰기 잠금
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let table_name = free_table_name(&tx, &base)?;
        let quoted = quote_ident(&table_name);
        let column_defs: Vec<String> = table.columns().iter().map(|c| quote_ident(c)).collect();
        tx.execute(
            &format!("CREATE TABLE {} ({})", quoted, column_defs.join(", ")),
            [],
        )?;

        let placeholders: Vec<String> = (1..=table.width()).map(|i| format!("?{}", i)).collect();
        let mut stmt = tx.prepare(&format!(
            "INSERT INTO {} VALUES ({})",
            quoted,
            placeholders.join(", ")
        ))?;
        for row in table.rows() {
            stmt.execute(params_from_iter(row.iter().map(to_sql_value)))?;
        }
        drop(stmt);

        tx.execute(
            &format!(
                "INSERT INTO {} (table_name, dataset, collected_at, row_count)
                 VALUES (?1, ?2, ?3, ?4)",
                CATALOG_TABLE
            ),
            params![
                table_name,
                dataset,
                timestamp.to_rfc3339(),
                table.height() as i64
            ],
        )?;
        tx.commit()?;

        let location = format!("{}#{}", self.db_path(dataset).display(), table_name);
        tracing::debug!(
            dataset = dataset,
            table = %table_name,
            rows = table.height(),
            "SQLite 스냅샷 저장"
        );

        Ok(SnapshotRef {
            dataset: dataset.to_string(),
            name: table_name,
            timestamp,
            location,
        })
    }

    fn list(&self, dataset: &str) -> Result<Vec<SnapshotRef>> {
        validate_dataset_name(dataset)?;
        let db_path = self.db_path(dataset);
        if !db_path.exists() {
            return Ok(Vec::new());
        }

        let conn = self.connect(dataset)?;
        let mut stmt = conn.prepare(&format!(
            "SELECT table_name, collected_at FROM {} WHERE dataset = ?1",
            CATALOG_TABLE
        ))?;
        let rows = stmt
            .query_map(params![dataset], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut snapshots = Vec::with_capacity(rows.len());
        for (table_name, collected_at) in rows {
            let timestamp = match DateTime::parse_from_rfc3339(&collected_at) {
                Ok(ts) => ts.with_timezone(&Utc),
                Err(e) => {
                    tracing::warn!(table = %table_name, error = %e, "카탈로그 시각 파싱 실패, 건너뜀");
                    continue;
                }
            };
            snapshots.push(SnapshotRef {
                dataset: dataset.to_string(),
                location: format!("{}#{}", db_path.display(), table_name),
                name: table_name,
                timestamp,
            });
        }
        sort_snapshots(&mut snapshots);
        Ok(snapshots)
    }

    fn load(&self, snapshot: &SnapshotRef) -> Result<ResultTable> {
        let (db_path, table_name) = snapshot.location.rsplit_once('#').ok_or_else(|| {
            DataError::Persistence(format!("잘못된 SQLite 위치: {}", snapshot.location))
        })?;

        let conn = Connection::open(db_path)?;
        let mut stmt = conn.prepare(&format!(
            "SELECT * FROM {} ORDER BY rowid",
            quote_ident(table_name)
        ))?;
        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
        let width = columns.len();

        let rows = stmt
            .query_map([], |row| {
                (0..width)
                    .map(|i| row.get_ref(i).map(from_sql_value))
                    .collect::<rusqlite::Result<Vec<Value>>>()
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        ResultTable::from_rows(columns, rows).map_err(|e| DataError::Persistence(e.to_string()))
    }
}

//! 스냅샷 저장소.
//!
//! 수집 결과 테이블 하나가 스냅샷 하나이며, 이름은 항상
//! `{dataset}_{timestamp}`로 결정적으로 만들어집니다.
//!
//! - [`csv`]: 스냅샷마다 구분자 텍스트 파일 하나
//! - [`parquet`]: 스냅샷마다 컬럼형 바이너리 파일 하나
//! - [`sqlite`]: 데이터셋마다 DB 하나, 스냅샷마다 테이블 하나
//!
//! 파일 형식은 임시 파일에 쓴 뒤 하드 링크로 공개하고, SQLite는 트랜잭션으로
//! 공개하므로 읽는 쪽은 부분적으로 쓰인 스냅샷을 보지 않습니다.
//!
//! 스냅샷은 덮어쓰지 않습니다. 이름 정밀도 안에서 같은 이름이 이미 있으면
//! 순번을 붙여 `{dataset}_{timestamp}.1`, `.2`, ... 으로 저장합니다.

pub mod csv;
pub mod parquet;
pub mod sqlite;

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use screener_core::ResultTable;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::{DataError, Result};

/// 기본 타임스탬프 패턴.
pub const DEFAULT_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// 같은 이름의 스냅샷이 있을 때 순번 앞에 붙는 구분자.
pub const SEQUENCE_SEPARATOR: char = '.';

/// 이름 하나에 허용하는 최대 순번.
pub(crate) const MAX_SEQUENCE: u32 = 10_000;

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// 저장 형식. 수집기 인스턴스마다 하나로 고정됩니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageFormat {
    #[default]
    Csv,
    Parquet,
    Sqlite,
}

impl StorageFormat {
    /// 파일 확장자.
    pub fn extension(&self) -> &'static str {
        match self {
            StorageFormat::Csv => "csv",
            StorageFormat::Parquet => "parquet",
            StorageFormat::Sqlite => "db",
        }
    }
}

impl fmt::Display for StorageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StorageFormat::Csv => "csv",
            StorageFormat::Parquet => "parquet",
            StorageFormat::Sqlite => "sqlite",
        };
        f.write_str(s)
    }
}

impl FromStr for StorageFormat {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(StorageFormat::Csv),
            "parquet" => Ok(StorageFormat::Parquet),
            "sqlite" | "sql" | "db" => Ok(StorageFormat::Sqlite),
            other => Err(DataError::Config(format!("지원하지 않는 저장 형식: {}", other))),
        }
    }
}

/// 스냅샷 이름 규칙.
///
/// 패턴은 생성 시점에 검증되므로 포맷팅은 실패하지 않습니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotNaming {
    pattern: String,
}

impl Default for SnapshotNaming {
    fn default() -> Self {
        Self {
            pattern: DEFAULT_TIMESTAMP_FORMAT.to_string(),
        }
    }
}

impl SnapshotNaming {
    /// 타임스탬프 패턴을 검증하여 이름 규칙을 생성합니다.
    ///
    /// # Errors
    ///
    /// strftime 항목이 잘못되었거나, 경로 구분자를 포함하거나,
    /// 포맷한 결과를 다시 시각으로 읽을 수 없으면 `DataError::Config`.
    pub fn new(pattern: impl Into<String>) -> Result<Self> {
        let pattern = pattern.into();
        if pattern.is_empty() || pattern.contains(['/', '\\']) {
            return Err(DataError::Config(format!(
                "타임스탬프 패턴에 사용할 수 없는 값: {:?}",
                pattern
            )));
        }
        if StrftimeItems::new(&pattern).any(|item| matches!(item, Item::Error)) {
            return Err(DataError::Config(format!(
                "잘못된 타임스탬프 패턴: {}",
                pattern
            )));
        }

        let sample = NaiveDate::from_ymd_opt(2024, 1, 2)
            .and_then(|d| d.and_hms_opt(3, 4, 5))
            .ok_or_else(|| DataError::Config("샘플 시각 생성 실패".to_string()))?;
        let rendered = sample.format(&pattern).to_string();
        NaiveDateTime::parse_from_str(&rendered, &pattern).map_err(|e| {
            DataError::Config(format!(
                "타임스탬프 패턴으로 이름에서 시각을 복원할 수 없습니다 ({}): {}",
                pattern, e
            ))
        })?;

        Ok(Self { pattern })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// `{dataset}_{timestamp}` 스냅샷 이름.
    pub fn snapshot_name(&self, dataset: &str, timestamp: DateTime<Utc>) -> String {
        format!("{}_{}", dataset, timestamp.format(&self.pattern))
    }

    /// 순번이 붙은 이름. 순번 0은 기본 이름 그대로입니다.
    pub fn sequenced(base: &str, sequence: u32) -> String {
        if sequence == 0 {
            base.to_string()
        } else {
            format!("{}{}{}", base, SEQUENCE_SEPARATOR, sequence)
        }
    }

    /// 스냅샷 이름에서 시각을 파싱합니다. 다른 데이터셋의 이름이면 `None`.
    ///
    /// 순번 접미사(`.N`)가 붙은 이름도 허용합니다.
    pub fn parse_timestamp(&self, dataset: &str, name: &str) -> Option<DateTime<Utc>> {
        let stamp = name.strip_prefix(dataset)?.strip_prefix('_')?;
        NaiveDateTime::parse_from_str(stamp, &self.pattern)
            .ok()
            .or_else(|| {
                let (head, sequence) = stamp.rsplit_once(SEQUENCE_SEPARATOR)?;
                if sequence.is_empty() || !sequence.bytes().all(|b| b.is_ascii_digit()) {
                    return None;
                }
                NaiveDateTime::parse_from_str(head, &self.pattern).ok()
            })
            .map(|naive| naive.and_utc())
    }

    /// 스냅샷 이름과 이름 정밀도로 잘린 시각.
    pub fn stamp(&self, dataset: &str, timestamp: DateTime<Utc>) -> (String, DateTime<Utc>) {
        let name = self.snapshot_name(dataset, timestamp);
        let truncated = self.parse_timestamp(dataset, &name).unwrap_or(timestamp);
        (name, truncated)
    }
}

/// 저장된 스냅샷 참조.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotRef {
    pub dataset: String,
    /// `{dataset}_{timestamp}`
    pub name: String,
    /// 이름에서 복원된 수집 시각
    pub timestamp: DateTime<Utc>,
    /// 파일 경로 또는 `{db}#{table}`
    pub location: String,
}

/// 스냅샷 저장소.
///
/// 구현체는 저장 형식 하나를 담당하며 동기 API입니다.
pub trait SnapshotStore: Send + Sync {
    /// 저장 형식.
    fn format(&self) -> StorageFormat;

    /// 스냅샷을 저장합니다. 같은 이름이 있으면 순번을 붙인 새 이름으로 저장합니다.
    fn save(
        &self,
        table: &ResultTable,
        dataset: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<SnapshotRef>;

    /// 데이터셋의 스냅샷 목록 (시각 오름차순).
    fn list(&self, dataset: &str) -> Result<Vec<SnapshotRef>>;

    /// 스냅샷을 읽습니다.
    fn load(&self, snapshot: &SnapshotRef) -> Result<ResultTable>;
}

/// 형식에 맞는 저장소를 엽니다. 출력 디렉토리가 없으면 생성합니다.
pub fn open_store(
    format: StorageFormat,
    output_dir: impl AsRef<Path>,
    naming: SnapshotNaming,
) -> Result<Arc<dyn SnapshotStore>> {
    let output_dir = output_dir.as_ref();
    tracing::debug!(format = %format, dir = %output_dir.display(), "스냅샷 저장소 열기");
    Ok(match format {
        StorageFormat::Csv => Arc::new(csv::CsvStore::new(output_dir, naming)?),
        StorageFormat::Parquet => Arc::new(parquet::ParquetStore::new(output_dir, naming)?),
        StorageFormat::Sqlite => Arc::new(sqlite::SqliteStore::new(output_dir, naming)?),
    })
}

/// 시각 오름차순, 같은 시각이면 순번 오름차순으로 정렬합니다.
pub(crate) fn sort_snapshots(snapshots: &mut [SnapshotRef]) {
    snapshots.sort_by(|a, b| {
        a.timestamp
            .cmp(&b.timestamp)
            .then(a.name.len().cmp(&b.name.len()))
            .then_with(|| a.name.cmp(&b.name))
    });
}

/// 데이터셋 이름 검증.
///
/// 파일 이름과 테이블 이름의 접두어가 되므로 경로 성분이 될 수 없습니다.
pub fn validate_dataset_name(dataset: &str) -> Result<()> {
    if dataset.trim().is_empty()
        || dataset.starts_with('.')
        || dataset.contains(['/', '\\', '\0'])
    {
        return Err(DataError::Persistence(format!(
            "사용할 수 없는 데이터셋 이름: {:?}",
            dataset
        )));
    }
    Ok(())
}

/// 파일 기반 스냅샷 디렉토리.
#[derive(Debug, Clone)]
pub(crate) struct SnapshotDir {
    root: PathBuf,
    naming: SnapshotNaming,
    extension: &'static str,
}

impl SnapshotDir {
    pub(crate) fn new(
        root: impl Into<PathBuf>,
        naming: SnapshotNaming,
        extension: &'static str,
    ) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| {
            DataError::Persistence(format!("출력 디렉토리 생성 실패 ({}): {}", root.display(), e))
        })?;
        Ok(Self {
            root,
            naming,
            extension,
        })
    }

    /// 스냅샷 파일을 임시 파일에 쓴 뒤 비어 있는 이름으로 공개합니다.
    ///
    /// 쓰기가 실패하면 임시 파일을 지우고 아무것도 공개하지 않습니다.
    pub(crate) fn publish<F>(
        &self,
        dataset: &str,
        timestamp: DateTime<Utc>,
        write: F,
    ) -> Result<SnapshotRef>
    where
        F: FnOnce(&mut File) -> Result<()>,
    {
        validate_dataset_name(dataset)?;
        let (base, timestamp) = self.naming.stamp(dataset, timestamp);
        let tmp = self.root.join(format!(
            ".{}.{}.{}.tmp",
            base,
            std::process::id(),
            TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));

        let written: Result<()> = (|| {
            let mut file = File::create(&tmp)?;
            write(&mut file)?;
            file.sync_all()?;
            Ok(())
        })();
        if let Err(e) = written {
            let _ = fs::remove_file(&tmp);
            return Err(e);
        }

        let linked = self.link_free_name(&tmp, &base);
        let _ = fs::remove_file(&tmp);
        let (name, path) = linked?;

        Ok(SnapshotRef {
            dataset: dataset.to_string(),
            name,
            timestamp,
            location: path.display().to_string(),
        })
    }

    /// 하드 링크는 대상이 있으면 실패하므로 기존 스냅샷을 덮어쓰지 않습니다.
    fn link_free_name(&self, tmp: &Path, base: &str) -> Result<(String, PathBuf)> {
        for sequence in 0..MAX_SEQUENCE {
            let name = SnapshotNaming::sequenced(base, sequence);
            let path = self.root.join(format!("{}.{}", name, self.extension));
            match fs::hard_link(tmp, &path) {
                Ok(()) => {
                    if sequence > 0 {
                        tracing::warn!(name = %name, "같은 이름의 스냅샷이 있어 순번을 붙여 저장");
                    }
                    return Ok((name, path));
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(DataError::Persistence(format!(
            "사용 가능한 스냅샷 이름이 없습니다: {}",
            base
        )))
    }

    pub(crate) fn list(&self, dataset: &str) -> Result<Vec<SnapshotRef>> {
        validate_dataset_name(dataset)?;
        let mut snapshots = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some(self.extension)
            {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if stem.starts_with('.') {
                continue;
            }
            if let Some(timestamp) = self.naming.parse_timestamp(dataset, stem) {
                snapshots.push(SnapshotRef {
                    dataset: dataset.to_string(),
                    name: stem.to_string(),
                    timestamp,
                    location: path.display().to_string(),
                });
            }
        }
        sort_snapshots(&mut snapshots);
        Ok(snapshots)
    }
}

/// 텍스트 셀 표현. `Null`은 `None`.
pub(crate) fn render_cell(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

/// 텍스트 셀을 값으로 해석합니다 (빈 문자열, 정수, 실수, 불리언, 문자열 순).
pub(crate) fn parse_cell(text: &str) -> Value {
    if text.is_empty() {
        return Value::Null;
    }
    if let Ok(i) = text.parse::<i64>() {
        return Value::from(i);
    }
    if let Ok(f) = text.parse::<f64>() {
        if f.is_finite() {
            return Value::from(f);
        }
    }
    match text {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::String(text.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_naming_round_trip() {
        let naming = SnapshotNaming::default();
        let ts = Utc.with_ymd_and_hms(2024, 3, 15, 9, 30, 5).unwrap();
        let name = naming.snapshot_name("us_stocks", ts);
        assert_eq!(name, "us_stocks_20240315_093005");
        assert_eq!(naming.parse_timestamp("us_stocks", &name), Some(ts));

        // 접두어가 같은 다른 데이터셋은 제외
        assert_eq!(naming.parse_timestamp("us", &name), None);
        assert_eq!(naming.parse_timestamp("crypto", &name), None);

        let second = SnapshotNaming::sequenced(&name, 2);
        assert_eq!(second, "us_stocks_20240315_093005.2");
        assert_eq!(naming.parse_timestamp("us_stocks", &second), Some(ts));
        assert_eq!(naming.parse_timestamp("us_stocks", &format!("{}.x", name)), None);
    }

    #[test]
    fn test_stamp_truncates_to_pattern_precision() {
        let naming = SnapshotNaming::default();
        let ts = Utc.with_ymd_and_hms(2024, 3, 15, 9, 30, 5).unwrap()
            + chrono::Duration::milliseconds(750);
        let (name, truncated) = naming.stamp("d", ts);
        assert_eq!(name, "d_20240315_093005");
        assert_eq!(truncated, Utc.with_ymd_and_hms(2024, 3, 15, 9, 30, 5).unwrap());
    }

    #[test]
    fn test_invalid_patterns_rejected() {
        assert!(SnapshotNaming::new("%Y%m%d_%H%M%S").is_ok());
        assert!(SnapshotNaming::new("%Y-%m-%dT%H-%M").is_ok());
        assert!(SnapshotNaming::new("%Q").is_err());
        assert!(SnapshotNaming::new("%Y/%m/%d").is_err());
        // 날짜만으로는 시각을 복원할 수 없음
        assert!(SnapshotNaming::new("%Y%m%d").is_err());
        assert!(SnapshotNaming::new("").is_err());
    }

    #[test]
    fn test_format_parse() {
        assert_eq!("CSV".parse::<StorageFormat>().unwrap(), StorageFormat::Csv);
        assert_eq!("sql".parse::<StorageFormat>().unwrap(), StorageFormat::Sqlite);
        assert_eq!("parquet".parse::<StorageFormat>().unwrap(), StorageFormat::Parquet);
        assert!("xlsx".parse::<StorageFormat>().is_err());
    }

    #[test]
    fn test_dataset_name_validation() {
        assert!(validate_dataset_name("us_stocks").is_ok());
        assert!(validate_dataset_name("").is_err());
        assert!(validate_dataset_name("../etc").is_err());
        assert!(validate_dataset_name("a/b").is_err());
    }

    #[test]
    fn test_cell_text_conversion() {
        assert_eq!(parse_cell(""), Value::Null);
        assert_eq!(parse_cell("42"), Value::from(42));
        assert_eq!(parse_cell("1.5"), Value::from(1.5));
        assert_eq!(parse_cell("true"), Value::Bool(true));
        assert_eq!(parse_cell("NASDAQ:AAPL"), Value::from("NASDAQ:AAPL"));
        assert_eq!(parse_cell("NaN"), Value::from("NaN"));

        assert_eq!(render_cell(&Value::Null), None);
        assert_eq!(render_cell(&Value::from(1.5)).as_deref(), Some("1.5"));
        assert_eq!(render_cell(&serde_json::json!(["a"])).as_deref(), Some("[\"a\"]"));
    }

    #[test]
    fn test_publish_leaves_no_temp_on_error() {
        let dir = tempfile::tempdir().unwrap();
        let snapshots = SnapshotDir::new(dir.path(), SnapshotNaming::default(), "csv").unwrap();
        let ts = Utc.with_ymd_and_hms(2024, 3, 15, 9, 30, 5).unwrap();

        let result = snapshots.publish("us", ts, |_| Err(DataError::Persistence("boom".into())));
        assert!(result.is_err());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_publish_never_overwrites() {
        use std::io::Write;

        let dir = tempfile::tempdir().unwrap();
        let snapshots = SnapshotDir::new(dir.path(), SnapshotNaming::default(), "csv").unwrap();
        let ts = Utc.with_ymd_and_hms(2024, 3, 15, 9, 30, 5).unwrap();

        let names: Vec<String> = (0..3)
            .map(|i| {
                snapshots
                    .publish("us", ts + chrono::Duration::milliseconds(i * 100), |file| {
                        write!(file, "{}", i)?;
                        Ok(())
                    })
                    .unwrap()
                    .name
            })
            .collect();
        assert_eq!(
            names,
            vec!["us_20240315_093005", "us_20240315_093005.1", "us_20240315_093005.2"]
        );

        let listed = snapshots.list("us").unwrap();
        let contents: Vec<String> = listed
            .iter()
            .map(|s| fs::read_to_string(&s.location).unwrap())
            .collect();
        assert_eq!(contents, vec!["0", "1", "2"]);
        assert!(listed.iter().all(|s| s.timestamp == ts));
    }
}

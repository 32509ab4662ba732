//! Screener collector CLI.

use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use screener_core::{init_logging, LogFormat, Query, ScanRequest};
use screener_data::StorageFormat;
use screener_collector::modules::AssetClass;
use screener_collector::{
    Collector, CollectorConfig, ErrorPolicy, HistoricalData, MultiAssetScanner,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "screener-collector")]
#[command(about = "Market scanner data collector", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 로그 레벨 (trace, debug, info, warn, error; 설정 덮어쓰기)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// 로그 형식 (pretty, json, compact; 설정 덮어쓰기)
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,

    /// 설정 파일 (없으면 환경변수 사용)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// 출력 디렉토리 (설정 덮어쓰기)
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    /// 저장 형식 (설정 덮어쓰기: csv, parquet, sqlite)
    #[arg(long, global = true)]
    format: Option<StorageFormat>,
}

#[derive(Subcommand)]
enum Commands {
    /// 쿼리를 한 번 수집
    Collect {
        /// 스캔 요청 JSON 파일 (없으면 기본 쿼리)
        #[arg(long)]
        query: Option<PathBuf>,
        /// 데이터셋 이름
        #[arg(long, default_value = "market_data")]
        dataset: String,
        /// 저장하지 않음
        #[arg(long)]
        no_save: bool,
    },

    /// 주기적으로 수집 (Ctrl-C로 종료)
    Schedule {
        #[arg(long)]
        query: Option<PathBuf>,
        #[arg(long, default_value = "market_data")]
        dataset: String,
        /// 수집 주기 (분, 설정 덮어쓰기)
        #[arg(long)]
        interval_minutes: Option<u64>,
        /// 최대 수집 횟수 (설정 덮어쓰기)
        #[arg(long)]
        max_collections: Option<usize>,
        /// 실패 처리 정책 (stop, continue, retry)
        #[arg(long)]
        on_error: Option<ErrorPolicy>,
        /// 사이클당 최대 재시도 횟수
        #[arg(long)]
        max_retries: Option<u32>,
    },

    /// 여러 쿼리를 배치로 수집
    Batch {
        /// `{"dataset": <스캔 요청>, ...}` 형식의 JSON 파일
        #[arg(long)]
        queries: PathBuf,
        #[arg(long)]
        no_save: bool,
    },

    /// 저장된 과거 스냅샷 로드
    History {
        #[arg(long)]
        dataset: String,
        /// 시작 시각 (RFC 3339 또는 YYYY-MM-DD)
        #[arg(long, value_parser = parse_datetime)]
        start: Option<DateTime<Utc>>,
        /// 종료 시각 (RFC 3339 또는 YYYY-MM-DD)
        #[arg(long, value_parser = parse_datetime)]
        end: Option<DateTime<Utc>>,
        /// 스냅샷별로 따로 출력
        #[arg(long)]
        separate: bool,
    },

    /// 다중 자산 심볼 조회 (결과를 JSON으로 출력)
    Scan {
        /// 심볼 또는 별칭 (쉼표로 구분, 예: "GOLD,SP500,EURUSD")
        #[arg(long, conflicts_with_all = ["asset_class", "preset"])]
        symbols: Option<String>,
        /// 자산군 기본 심볼 (forex, indices, commodities, bonds)
        #[arg(long, conflicts_with = "preset")]
        asset_class: Option<AssetClass>,
        /// 고정 심볼 묶음
        #[arg(long, value_enum)]
        preset: Option<ScanPreset>,
        /// 타임프레임 (5min, 1hr, 4hr, daily, weekly, ...)
        #[arg(long, default_value = "daily")]
        timeframe: String,
    },
}

/// `scan --preset` 심볼 묶음.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum ScanPreset {
    /// 금, 은
    GoldSilver,
    /// S&P 500, 나스닥 100, 다우, 다우 선물
    MajorIndices,
    /// GBPJPY, EURUSD, AUDUSD, USDJPY
    MajorForex,
    /// 미국 국채
    Treasuries,
    /// 위 묶음 전체 (자산군별 출력)
    Watchlist,
}

/// RFC 3339 또는 날짜(UTC 자정)를 파싱합니다.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| format!("시각 형식 오류: {}", s))
}

/// 스캔 요청 파일에서 쿼리를 읽습니다.
fn read_query(path: Option<&Path>) -> anyhow::Result<Query> {
    let Some(path) = path else {
        return Ok(Query::new());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("쿼리 파일 읽기 실패: {}", path.display()))?;
    let request: ScanRequest = serde_json::from_str(&text)
        .with_context(|| format!("쿼리 파일 파싱 실패: {}", path.display()))?;
    Ok(Query::from_request(&request)?)
}

fn load_config(cli: &Cli) -> anyhow::Result<CollectorConfig> {
    let mut config = match &cli.config {
        Some(path) => CollectorConfig::load(path)?,
        None => CollectorConfig::from_env()?,
    };
    if let Some(dir) = &cli.output_dir {
        config.storage.output_dir = dir.clone();
    }
    if let Some(format) = cli.format {
        config.storage.format = format;
    }
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    if let Some(format) = cli.log_format {
        config.logging.format = format;
    }
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 설정 로드 (로깅 설정 포함)
    let config = load_config(&cli)?;

    init_logging(&config.log_config())
        .map_err(|e| anyhow::anyhow!("로깅 초기화 실패: {}", e))?;

    tracing::info!("Screener Collector 시작");
    tracing::debug!(config = ?config, "설정 로드 완료");

    let collector = Collector::from_config(&config)?;

    match cli.command {
        Commands::Collect {
            query,
            dataset,
            no_save,
        } => {
            let query = read_query(query.as_deref())?;
            let record = collector.collect_once(&query, &dataset, !no_save).await?;
            tracing::info!(
                dataset = %record.dataset,
                rows = record.table.height(),
                total_count = record.total_count,
                findings = record.findings.len(),
                location = record.snapshot.as_ref().map(|s| s.location.as_str()).unwrap_or("-"),
                "수집 완료"
            );
        }
        Commands::Schedule {
            query,
            dataset,
            interval_minutes,
            max_collections,
            on_error,
            max_retries,
        } => {
            let query = read_query(query.as_deref())?;
            let mut schedule = config.schedule_config();
            if let Some(minutes) = interval_minutes {
                schedule.interval = std::time::Duration::from_secs(minutes * 60);
            }
            if let Some(max) = max_collections {
                schedule.max_collections = Some(max).filter(|n| *n > 0);
            }
            if let Some(policy) = on_error {
                schedule.on_error = policy;
            }
            if let Some(retries) = max_retries {
                schedule.max_retries = retries;
            }

            let shutdown = CancellationToken::new();
            let signal = shutdown.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("종료 신호 수신, 현재 사이클 이후 종료");
                    signal.cancel();
                }
            });

            let report = collector
                .schedule_collection(&query, &dataset, &schedule, shutdown)
                .await?;
            tracing::info!(
                dataset = %dataset,
                collected = report.records.len(),
                cycles = report.cycles.len(),
                "스케줄 수집 종료"
            );
        }
        Commands::Batch { queries, no_save } => {
            let text = std::fs::read_to_string(&queries)
                .with_context(|| format!("배치 파일 읽기 실패: {}", queries.display()))?;
            let requests: BTreeMap<String, ScanRequest> = serde_json::from_str(&text)
                .with_context(|| format!("배치 파일 파싱 실패: {}", queries.display()))?;
            let mut entries = Vec::with_capacity(requests.len());
            for (dataset, request) in &requests {
                let query = Query::from_request(request)
                    .with_context(|| format!("쿼리 복원 실패: {}", dataset))?;
                entries.push((dataset.clone(), query));
            }

            let report = collector.collect_batch(entries, !no_save).await;
            for (dataset, error) in &report.failures {
                tracing::warn!(dataset = %dataset, error = %error, "배치 항목 실패");
            }
        }
        Commands::History {
            dataset,
            start,
            end,
            separate,
        } => {
            let data = collector.load_historical(&dataset, start, end, !separate)?;
            match &data {
                HistoricalData::Combined(table) => {
                    println!("{}", serde_json::to_string_pretty(table)?);
                }
                HistoricalData::Separate(parts) => {
                    for (snapshot, table) in parts {
                        tracing::info!(
                            name = %snapshot.name,
                            timestamp = %snapshot.timestamp,
                            rows = table.height(),
                            "스냅샷"
                        );
                    }
                }
            }
            tracing::info!(dataset = %dataset, rows = data.total_rows(), "과거 데이터 로드 완료");
        }
        Commands::Scan {
            symbols,
            asset_class,
            preset,
            timeframe,
        } => {
            let scanner =
                MultiAssetScanner::new(collector.transport().clone(), collector.credentials().cloned());
            if let Some(preset) = preset {
                let result = match preset {
                    ScanPreset::GoldSilver => scanner.scan_gold_silver(&timeframe).await?,
                    ScanPreset::MajorIndices => scanner.scan_major_indices(&timeframe).await?,
                    ScanPreset::MajorForex => scanner.scan_major_forex(&timeframe).await?,
                    ScanPreset::Treasuries => scanner.scan_treasuries(&timeframe).await?,
                    ScanPreset::Watchlist => {
                        for (class, result) in scanner.scan_watchlist(&timeframe).await? {
                            println!(
                                "{}",
                                serde_json::json!({ "asset_class": class.name(), "result": result })
                            );
                        }
                        return Ok(());
                    }
                };
                println!("{}", serde_json::to_string_pretty(&result)?);
                return Ok(());
            }
            let result = match (symbols, asset_class) {
                (Some(symbols), _) => {
                    let symbols: Vec<&str> = symbols
                        .split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .collect();
                    scanner.scan_symbols(&symbols, &timeframe, None).await?
                }
                (None, Some(AssetClass::Forex)) => scanner.scan_forex(None, &timeframe).await?,
                (None, Some(AssetClass::Indices)) => scanner.scan_indices(None, &timeframe).await?,
                (None, Some(AssetClass::Commodities)) => {
                    scanner.scan_commodities(None, &timeframe).await?
                }
                (None, Some(AssetClass::Bonds)) => scanner.scan_bonds(None, &timeframe).await?,
                (None, Some(other)) => {
                    anyhow::bail!("{} 자산군은 기본 심볼 목록이 없습니다. --symbols를 지정하세요", other)
                }
                (None, None) => {
                    for (class, result) in scanner.scan_all_markets(&timeframe).await? {
                        println!(
                            "{}",
                            serde_json::json!({ "asset_class": class.name(), "result": result })
                        );
                    }
                    return Ok(());
                }
            };
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
    }

    tracing::info!("Screener Collector 종료");

    Ok(())
}

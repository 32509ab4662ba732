//! 다중 자산, 다중 타임프레임 스캐너.
//!
//! 채권, 원자재, 지수, 외환 심볼을 짧은 별칭으로 조회하고
//! 타임프레임별 OHLC/RSI/MACD/EMA 컬럼을 함께 가져옵니다.

use screener_core::{ExecutionResult, FieldRef, Query, QueryError, Resolution};
use screener_data::{ScanTransport, SessionCredentials};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{CollectorError, Result};

/// 자산군.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AssetClass {
    Bonds,
    Commodities,
    Indices,
    Forex,
    Stocks,
    Crypto,
}

impl AssetClass {
    pub const ALL: [AssetClass; 6] = [
        AssetClass::Bonds,
        AssetClass::Commodities,
        AssetClass::Indices,
        AssetClass::Forex,
        AssetClass::Stocks,
        AssetClass::Crypto,
    ];

    /// 스캐너 마켓 이름.
    pub fn market(&self) -> &'static str {
        match self {
            AssetClass::Bonds => "bond",
            // 금, 은은 CFD로 조회
            AssetClass::Commodities => "cfd",
            AssetClass::Indices => "index",
            AssetClass::Forex => "forex",
            AssetClass::Stocks => "america",
            AssetClass::Crypto => "crypto",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AssetClass::Bonds => "bonds",
            AssetClass::Commodities => "commodities",
            AssetClass::Indices => "indices",
            AssetClass::Forex => "forex",
            AssetClass::Stocks => "stocks",
            AssetClass::Crypto => "crypto",
        }
    }
}

impl fmt::Display for AssetClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AssetClass {
    type Err = CollectorError;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.to_lowercase();
        Self::ALL
            .into_iter()
            .find(|c| c.name() == lower)
            .ok_or_else(|| CollectorError::Config(format!("알 수 없는 자산군: {}", s)))
    }
}

/// 주요 심볼 별칭.
pub const MAJOR_SYMBOLS: &[(&str, &str)] = &[
    // 지수
    ("SP500", "SP:SPX"),
    ("NASDAQ", "NASDAQ:NDX"),
    ("NASDAQ_COMP", "TVC:IXIC"),
    ("DOW", "TVC:DJI"),
    ("YM30", "CBOT_MINI:YM1!"),
    ("ES", "CME_MINI:ES1!"),
    ("NQ", "CME_MINI:NQ1!"),
    // 원자재
    ("GOLD", "TVC:GOLD"),
    ("GOLD_FUTURES", "COMEX:GC1!"),
    ("SILVER", "TVC:SILVER"),
    ("SILVER_FUTURES", "COMEX:SI1!"),
    ("OIL", "TVC:USOIL"),
    ("NATGAS", "NYMEX:NG1!"),
    // 외환
    ("EURUSD", "FX_IDC:EURUSD"),
    ("GBPJPY", "FX_IDC:GBPJPY"),
    ("GBPUSD", "FX_IDC:GBPUSD"),
    ("USDJPY", "FX_IDC:USDJPY"),
    ("AUDUSD", "FX_IDC:AUDUSD"),
    ("USDCAD", "FX_IDC:USDCAD"),
    ("NZDUSD", "FX_IDC:NZDUSD"),
    ("EURGBP", "FX_IDC:EURGBP"),
    ("EURJPY", "FX_IDC:EURJPY"),
    ("AUDJPY", "FX_IDC:AUDJPY"),
    // 채권
    ("US10Y", "TVC:US10Y"),
    ("US30Y", "TVC:US30Y"),
    ("US02Y", "TVC:US02Y"),
    ("US05Y", "TVC:US05Y"),
    ("DX", "TVC:DXY"),
];

pub const DEFAULT_FOREX: [&str; 8] = [
    "EURUSD", "GBPUSD", "USDJPY", "GBPJPY", "AUDUSD", "USDCAD", "EURJPY", "AUDJPY",
];
pub const DEFAULT_INDICES: [&str; 6] = ["SP500", "NASDAQ", "DOW", "YM30", "ES", "NQ"];
pub const DEFAULT_COMMODITIES: [&str; 6] = [
    "GOLD",
    "GOLD_FUTURES",
    "SILVER",
    "SILVER_FUTURES",
    "OIL",
    "NATGAS",
];
pub const DEFAULT_BONDS: [&str; 5] = ["US02Y", "US05Y", "US10Y", "US30Y", "DX"];

/// 빠른 조회용 심볼 묶음.
pub const GOLD_SILVER: [&str; 2] = ["GOLD", "SILVER"];
pub const MAJOR_INDICES: [&str; 4] = ["SP500", "NASDAQ", "DOW", "YM30"];
pub const MAJOR_FOREX: [&str; 4] = ["GBPJPY", "EURUSD", "AUDUSD", "USDJPY"];
/// 관심 시장 조회의 지수 묶음 (다우는 선물만).
pub const WATCHLIST_INDICES: [&str; 3] = ["NASDAQ", "SP500", "YM30"];

/// 다중 타임프레임 조회 기본 타임프레임.
pub const DEFAULT_TIMEFRAMES: [Resolution; 7] = [
    Resolution::M5,
    Resolution::M15,
    Resolution::H1,
    Resolution::H4,
    Resolution::D1,
    Resolution::W1,
    Resolution::MN1,
];

/// 타임프레임 지정 기본 컬럼 (해상도 접미사 없는 컬럼 제외).
const TIMEFRAME_FIELDS: [&str; 13] = [
    "close",
    "open",
    "high",
    "low",
    "volume",
    "change",
    "RSI",
    "MACD.macd",
    "MACD.signal",
    "EMA5",
    "EMA20",
    "EMA50",
    "EMA200",
];

/// 별칭을 전체 심볼로 변환합니다. 별칭이 아니면 그대로 반환합니다.
pub fn resolve_symbol(symbol: &str) -> &str {
    MAJOR_SYMBOLS
        .iter()
        .find(|(alias, _)| *alias == symbol)
        .map(|(_, full)| *full)
        .unwrap_or(symbol)
}

/// 타임프레임 문자열을 해상도로 변환합니다.
pub fn parse_timeframe(timeframe: &str) -> Result<Resolution> {
    Resolution::from_alias(timeframe).ok_or_else(|| {
        CollectorError::Query(QueryError::invalid_argument(format!(
            "알 수 없는 타임프레임: {}",
            timeframe
        )))
    })
}

/// 해상도별 기본 컬럼.
pub fn default_columns(resolution: Resolution) -> Vec<FieldRef> {
    let mut columns = vec![FieldRef::new("name"), FieldRef::new("description")];
    columns.extend(
        TIMEFRAME_FIELDS
            .iter()
            .map(|name| FieldRef::new(*name).at(resolution)),
    );
    columns
}

/// 심볼 목록 조회 쿼리를 만듭니다.
///
/// 조회 윈도우는 심볼 수에 맞춰 설정되어 결과가 잘리지 않습니다.
pub fn symbols_query<S: AsRef<str>>(
    symbols: &[S],
    resolution: Resolution,
    columns: Option<Vec<FieldRef>>,
) -> Result<Query> {
    let tickers: Vec<String> = symbols
        .iter()
        .map(|s| resolve_symbol(s.as_ref()).to_string())
        .collect();
    let limit = tickers.len().max(1) as i64;
    let columns = columns.unwrap_or_else(|| default_columns(resolution));

    Ok(Query::new()
        .set_tickers(tickers)?
        .select(columns)?
        .limit(limit)?)
}

/// 다중 자산 스캐너.
#[derive(Clone)]
pub struct MultiAssetScanner {
    transport: Arc<dyn ScanTransport>,
    credentials: Option<SessionCredentials>,
}

impl MultiAssetScanner {
    pub fn new(transport: Arc<dyn ScanTransport>, credentials: Option<SessionCredentials>) -> Self {
        Self {
            transport,
            credentials,
        }
    }

    /// 지정한 심볼을 조회합니다.
    ///
    /// `columns`가 `None`이면 타임프레임 기본 컬럼을 사용합니다.
    pub async fn scan_symbols<S: AsRef<str>>(
        &self,
        symbols: &[S],
        timeframe: &str,
        columns: Option<Vec<FieldRef>>,
    ) -> Result<ExecutionResult> {
        let resolution = parse_timeframe(timeframe)?;
        let query = symbols_query(symbols, resolution, columns)?;

        tracing::info!(symbols = symbols.len(), timeframe = %resolution, "심볼 조회");
        Ok(self
            .transport
            .execute(&query, self.credentials.as_ref())
            .await?)
    }

    /// 외환 통화쌍 조회. `None`이면 주요 통화쌍.
    pub async fn scan_forex(
        &self,
        pairs: Option<&[&str]>,
        timeframe: &str,
    ) -> Result<ExecutionResult> {
        self.scan_symbols(pairs.unwrap_or(&DEFAULT_FOREX), timeframe, None)
            .await
    }

    /// 주요 지수 조회.
    pub async fn scan_indices(
        &self,
        indices: Option<&[&str]>,
        timeframe: &str,
    ) -> Result<ExecutionResult> {
        self.scan_symbols(indices.unwrap_or(&DEFAULT_INDICES), timeframe, None)
            .await
    }

    /// 원자재 (금속, 에너지) 조회.
    pub async fn scan_commodities(
        &self,
        commodities: Option<&[&str]>,
        timeframe: &str,
    ) -> Result<ExecutionResult> {
        self.scan_symbols(
            commodities.unwrap_or(&DEFAULT_COMMODITIES),
            timeframe,
            None,
        )
        .await
    }

    /// 미국 국채 조회.
    pub async fn scan_bonds(
        &self,
        bonds: Option<&[&str]>,
        timeframe: &str,
    ) -> Result<ExecutionResult> {
        self.scan_symbols(bonds.unwrap_or(&DEFAULT_BONDS), timeframe, None)
            .await
    }

    /// 같은 심볼을 여러 타임프레임으로 조회합니다. 결과는 타임프레임 순서를 따릅니다.
    pub async fn scan_multi_timeframe<S: AsRef<str>>(
        &self,
        symbols: &[S],
        timeframes: Option<&[Resolution]>,
    ) -> Result<Vec<(Resolution, ExecutionResult)>> {
        let timeframes = timeframes.unwrap_or(&DEFAULT_TIMEFRAMES);
        let mut results = Vec::with_capacity(timeframes.len());
        for resolution in timeframes {
            tracing::info!(timeframe = %resolution, "타임프레임 조회");
            let result = self
                .scan_symbols(symbols, resolution.code(), None)
                .await?;
            results.push((*resolution, result));
        }
        Ok(results)
    }

    /// 금, 은 조회.
    pub async fn scan_gold_silver(&self, timeframe: &str) -> Result<ExecutionResult> {
        self.scan_symbols(&GOLD_SILVER, timeframe, None).await
    }

    /// S&P 500, 나스닥 100, 다우 지수와 다우 선물 조회.
    pub async fn scan_major_indices(&self, timeframe: &str) -> Result<ExecutionResult> {
        self.scan_indices(Some(&MAJOR_INDICES[..]), timeframe).await
    }

    /// 주요 4개 통화쌍 조회.
    pub async fn scan_major_forex(&self, timeframe: &str) -> Result<ExecutionResult> {
        self.scan_forex(Some(&MAJOR_FOREX[..]), timeframe).await
    }

    /// 미국 국채 (기본 채권 묶음) 조회.
    pub async fn scan_treasuries(&self, timeframe: &str) -> Result<ExecutionResult> {
        self.scan_bonds(None, timeframe).await
    }

    /// 관심 시장 묶음 조회: 금/은, 지수 3종, 주요 통화쌍, 미국 국채.
    ///
    /// 자산군 기본 목록을 쓰는 [`scan_all_markets`](Self::scan_all_markets)와 달리
    /// 고정된 소수 심볼만 조회합니다.
    pub async fn scan_watchlist(
        &self,
        timeframe: &str,
    ) -> Result<Vec<(AssetClass, ExecutionResult)>> {
        tracing::info!(timeframe = timeframe, "관심 시장 조회");
        Ok(vec![
            (
                AssetClass::Commodities,
                self.scan_symbols(&GOLD_SILVER, timeframe, None).await?,
            ),
            (
                AssetClass::Indices,
                self.scan_symbols(&WATCHLIST_INDICES, timeframe, None).await?,
            ),
            (
                AssetClass::Forex,
                self.scan_symbols(&MAJOR_FOREX, timeframe, None).await?,
            ),
            (AssetClass::Bonds, self.scan_treasuries(timeframe).await?),
        ])
    }

    /// 외환, 원자재, 지수, 채권을 모두 조회합니다.
    pub async fn scan_all_markets(
        &self,
        timeframe: &str,
    ) -> Result<Vec<(AssetClass, ExecutionResult)>> {
        tracing::info!(timeframe = timeframe, "전체 시장 조회");
        Ok(vec![
            (AssetClass::Forex, self.scan_forex(None, timeframe).await?),
            (
                AssetClass::Commodities,
                self.scan_commodities(None, timeframe).await?,
            ),
            (AssetClass::Indices, self.scan_indices(None, timeframe).await?),
            (AssetClass::Bonds, self.scan_bonds(None, timeframe).await?),
        ])
    }
}

//! 원격 스캐너 HTTP 클라이언트.
//!
//! 컴파일된 쿼리를 `POST {base_url}/{market}/scan`으로 전송합니다.
//! 요청 윈도우가 페이지 크기보다 크면 페이지 단위로 나누어 조회한 뒤
//! 하나의 결과 테이블로 이어 붙입니다.
//!
//! # 사용 예제
//!
//! ```rust,ignore
//! use screener_core::{col, Query};
//! use screener_data::{ScanTransport, ScannerClient, ScannerConfig};
//!
//! let client = ScannerClient::new(ScannerConfig::default())?;
//! let query = Query::new().filter([col("volume").gt(1_000_000)])?.limit(200)?;
//! let result = client.execute(&query, None).await?;
//! println!("{} / {}", result.table.height(), result.total_count);
//! ```

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, COOKIE};
use screener_core::{ExecutionResult, Query, ResultTable, ScanRequest};
use serde::Deserialize;
use std::time::Duration;

use super::{ScanTransport, SessionCredentials};
use crate::error::{DataError, Result};

/// 기본 스캐너 주소.
pub const DEFAULT_BASE_URL: &str = "https://scanner.tradingview.com";

/// 한 번의 요청으로 가져오는 최대 행 수.
pub const DEFAULT_PAGE_SIZE: u64 = 1000;

/// 기본 요청 타임아웃 (초).
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// 스캐너 클라이언트 설정.
#[derive(Debug, Clone)]
pub struct ScannerConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub page_size: u64,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl ScannerConfig {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_page_size(mut self, page_size: u64) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// 스캔 응답 본문.
#[derive(Debug, Deserialize)]
struct ScanResponse {
    #[serde(rename = "totalCount")]
    total_count: u64,
    #[serde(default)]
    data: Option<Vec<ScanRow>>,
}

/// 응답 행: 종목 식별자와 요청 컬럼 순서의 값.
#[derive(Debug, Deserialize)]
struct ScanRow {
    s: String,
    d: Vec<serde_json::Value>,
}

/// 오류 응답 본문.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// 원격 스캐너 HTTP 클라이언트.
#[derive(Debug, Clone)]
pub struct ScannerClient {
    client: reqwest::Client,
    config: ScannerConfig,
}

impl ScannerClient {
    /// 새로운 스캐너 클라이언트 생성.
    pub fn new(config: ScannerConfig) -> Result<Self> {
        if config.page_size == 0 {
            return Err(DataError::Config("page_size는 0보다 커야 합니다".to_string()));
        }
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| DataError::Config(format!("HTTP 클라이언트 생성 실패: {}", e)))?;

        Ok(Self {
            client,
            config: ScannerConfig {
                base_url: config.base_url.trim_end_matches('/').to_string(),
                ..config
            },
        })
    }

    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    /// 한 페이지를 요청합니다.
    async fn fetch_page(
        &self,
        market: &str,
        request: &ScanRequest,
        credentials: Option<&SessionCredentials>,
    ) -> Result<ScanResponse> {
        let url = format!("{}/{}/scan", self.config.base_url, market);

        tracing::debug!(
            url = %url,
            from = request.range[0],
            to = request.range[1],
            authenticated = credentials.is_some(),
            "스캐너 페이지 요청"
        );

        let mut builder = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .json(request);
        if let Some(creds) = credentials {
            builder = builder.header(COOKIE, creds.cookie_header());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| DataError::Transport(e.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| DataError::Transport(e.to_string()))?;

        if !status.is_success() {
            let reason = serde_json::from_str::<ErrorBody>(&body)
                .map(|b| b.error)
                .unwrap_or_else(|_| body.chars().take(200).collect());
            return Err(DataError::Service {
                status: status.as_u16(),
                reason,
            });
        }

        serde_json::from_str(&body).map_err(|e| DataError::MalformedResponse(e.to_string()))
    }
}

#[async_trait]
impl ScanTransport for ScannerClient {
    async fn execute(
        &self,
        query: &Query,
        credentials: Option<&SessionCredentials>,
    ) -> Result<ExecutionResult> {
        let request = query.compile();
        let market = query.universe().endpoint();
        let width = query.fields().len();
        let [start, end] = request.range;

        let mut table = ResultTable::new(query.result_columns());
        let mut total_count = 0;
        let mut cursor = start;
        let mut pages = 0u32;

        while cursor < end {
            let page_end = end.min(cursor.saturating_add(self.config.page_size));
            let requested = page_end - cursor;
            let page = self
                .fetch_page(market, &request.with_range(cursor, page_end), credentials)
                .await?;
            pages += 1;
            total_count = page.total_count;

            let rows = page.data.unwrap_or_default();
            let received = (rows.len() as u64).min(requested);
            for row in rows.into_iter().take(requested as usize) {
                if row.d.len() != width {
                    return Err(DataError::MalformedResponse(format!(
                        "{} 행의 값 개수 불일치: expected={}, actual={}",
                        row.s,
                        width,
                        row.d.len()
                    )));
                }
                let mut cells = Vec::with_capacity(width + 1);
                cells.push(serde_json::Value::String(row.s));
                cells.extend(row.d);
                table
                    .push_row(cells)
                    .map_err(|e| DataError::MalformedResponse(e.to_string()))?;
            }

            cursor += received;
            // 빈 페이지, 짧은 페이지, 전체 일치 수 도달은 데이터 끝을 의미
            if received < requested || cursor >= total_count {
                break;
            }
        }

        tracing::info!(
            market = market,
            rows = table.height(),
            total_count = total_count,
            pages = pages,
            "스캐너 조회 완료"
        );

        Ok(ExecutionResult { total_count, table })
    }
}

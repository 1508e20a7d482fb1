//! 업스트림 봉 데이터 조회.
//!
//! 업스트림 응답 형식:
//!
//! ```json
//! { "code": 0, "message": null, "data": [ { "timestamp": "...", "open": 10.1, ... } ] }
//! ```
//!
//! `code != 0`이거나 HTTP 200이 아니면 재시도 가능한 [`FetchError::Status`]입니다.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use market_core::{Bar, Interval, TimeRange};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::error::FetchError;

/// 봉 데이터 제공자.
#[async_trait]
pub trait BarFetcher: Send + Sync {
    fn name(&self) -> &str;

    /// `[start, end)` 구간의 봉. 빈 결과도 정상입니다.
    async fn fetch_bars(
        &self,
        symbol: &str,
        venue: &str,
        interval: Interval,
        range: TimeRange,
    ) -> Result<Vec<Bar>, FetchError>;
}

/// 업스트림 응답 봉.
#[derive(Debug, Deserialize)]
struct UpstreamBar {
    timestamp: DateTime<Utc>,
    open: Decimal,
    high: Decimal,
    low: Decimal,
    close: Decimal,
    volume: Decimal,
    #[serde(default)]
    amount: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
struct UpstreamResponse {
    code: i64,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<Vec<UpstreamBar>>,
}

/// HTTP 업스트림 클라이언트.
#[derive(Clone)]
pub struct HttpBarFetcher {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpBarFetcher {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn map_send_error(&self, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout(self.timeout)
        } else {
            FetchError::from(err)
        }
    }
}

#[async_trait]
impl BarFetcher for HttpBarFetcher {
    fn name(&self) -> &str {
        "http"
    }

    #[instrument(skip(self), fields(base = %self.base_url))]
    async fn fetch_bars(
        &self,
        symbol: &str,
        venue: &str,
        interval: Interval,
        range: TimeRange,
    ) -> Result<Vec<Bar>, FetchError> {
        let url = format!("{}/api/v1/market/bars", self.base_url);
        let start = range.start.to_rfc3339_opts(SecondsFormat::Secs, true);
        let end = range.end.to_rfc3339_opts(SecondsFormat::Secs, true);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("symbol", symbol),
                ("venue", venue),
                ("interval", interval.as_str()),
                ("start", start.as_str()),
                ("end", end.as_str()),
            ])
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(FetchError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.text().await.map_err(|e| self.map_send_error(e))?;
        let parsed: UpstreamResponse =
            serde_json::from_str(&body).map_err(|e| FetchError::Decode(e.to_string()))?;

        if parsed.code != 0 {
            return Err(FetchError::Status {
                status: status.as_u16(),
                message: parsed
                    .message
                    .unwrap_or_else(|| format!("upstream code {}", parsed.code)),
            });
        }

        // 응답 봉은 요청한 종목/간격으로 정규화
        let bars: Vec<Bar> = parsed
            .data
            .unwrap_or_default()
            .into_iter()
            .map(|b| {
                Bar::new(
                    symbol, venue, interval, b.timestamp, b.open, b.high, b.low, b.close, b.volume,
                )
                .with_amount(b.amount.unwrap_or_default())
            })
            .collect();

        debug!(symbol, venue, %interval, count = bars.len(), "업스트림 봉 수신");
        Ok(bars)
    }
}

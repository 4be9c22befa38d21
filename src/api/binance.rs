use anyhow::{Context, Result};
use governor::{Quota, RateLimiter};
use reqwest::Client;
use serde_json::Value;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use super::{timeframe_millis, MarketData};
use crate::error::PipelineError;
use crate::models::{Candle, CandleSeries};

pub const BINANCE_API_BASE: &str = "https://api.binance.com";
const MAX_KLINES: usize = 1000;
const DEFAULT_RETRIES: u32 = 2;
const INITIAL_BACKOFF_MS: u64 = 500;

type BinanceRateLimiter = RateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Spot klines client
///
/// Cloneable; all clones share one rate limiter.
#[derive(Clone)]
pub struct BinanceClient {
    client: Client,
    base_url: String,
    rate_limiter: Arc<BinanceRateLimiter>,
    max_retries: u32,
}

impl BinanceClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration, requests_per_minute: u32) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        let quota = Quota::per_minute(NonZeroU32::new(requests_per_minute).unwrap_or(NonZeroU32::MIN));

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            rate_limiter: Arc::new(RateLimiter::direct(quota)),
            max_retries: DEFAULT_RETRIES,
        })
    }

    /// Retries on 429 and 5xx; 0 disables them
    pub fn with_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    async fn make_request(&self, url: &str) -> Result<String> {
        let mut attempt = 0;
        loop {
            self.rate_limiter.until_ready().await;

            let response = self
                .client
                .get(url)
                .send()
                .await
                .context("Network error")?;
            let status = response.status();

            if status.is_success() {
                return response.text().await.context("Failed to read klines body");
            }

            let retryable = status.as_u16() == 429 || status.is_server_error();
            if retryable && attempt < self.max_retries {
                attempt += 1;
                let backoff = INITIAL_BACKOFF_MS * 2u64.pow(attempt - 1);
                tracing::warn!(
                    "Binance returned {}, retrying in {}ms (attempt {}/{})",
                    status,
                    backoff,
                    attempt,
                    self.max_retries
                );
                tokio::time::sleep(Duration::from_millis(backoff)).await;
                continue;
            }

            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            anyhow::bail!("Binance API error ({}): {}", status, error_text);
        }
    }

    async fn get_klines(&self, symbol: &str, timeframe: &str, limit: usize) -> Result<Vec<Candle>> {
        if timeframe_millis(timeframe).is_none() {
            anyhow::bail!("unsupported timeframe {:?}", timeframe);
        }

        let url = format!(
            "{}/api/v3/klines?symbol={}&interval={}&limit={}",
            self.base_url,
            exchange_symbol(symbol),
            timeframe,
            limit.clamp(1, MAX_KLINES)
        );

        tracing::debug!("Fetching klines for {} ({}, limit {})", symbol, timeframe, limit);

        let body = self.make_request(&url).await?;
        let rows: Vec<Vec<Value>> =
            serde_json::from_str(&body).context("Failed to parse klines response")?;

        rows.iter().map(|row| parse_kline(row)).collect()
    }
}

impl MarketData for BinanceClient {
    async fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: &str,
        limit: usize,
    ) -> std::result::Result<CandleSeries, PipelineError> {
        let candles = self
            .get_klines(symbol, timeframe, limit)
            .await
            .map_err(|e| PipelineError::DataUnavailable(format!("{:#}", e)))?;

        CandleSeries::windowed(candles, limit)
    }
}

/// `BTC/USDT` -> `BTCUSDT`
pub fn exchange_symbol(symbol: &str) -> String {
    symbol
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_uppercase()
}

// [openTime, "open", "high", "low", "close", "volume", closeTime, ...]
fn parse_kline(row: &[Value]) -> Result<Candle> {
    let timestamp = row
        .first()
        .and_then(Value::as_i64)
        .context("kline missing open time")?;

    let field = |idx: usize, name: &str| -> Result<f64> {
        let value = row
            .get(idx)
            .with_context(|| format!("kline missing {}", name))?;
        match value {
            Value::String(s) => s
                .parse::<f64>()
                .with_context(|| format!("kline {} is not numeric: {}", name, s)),
            Value::Number(n) => n
                .as_f64()
                .with_context(|| format!("kline {} out of range", name)),
            other => anyhow::bail!("kline {} has unexpected type: {}", name, other),
        }
    };

    Ok(Candle {
        timestamp,
        open: field(1, "open")?,
        high: field(2, "high")?,
        low: field(3, "low")?,
        close: field(4, "close")?,
        volume: field(5, "volume")?,
    })
}

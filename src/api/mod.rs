pub mod binance;
pub mod synthetic;

pub use binance::BinanceClient;
pub use synthetic::SyntheticFeed;

use std::future::Future;
use std::sync::Arc;

use crate::error::PipelineError;
use crate::models::CandleSeries;

/// OHLCV source
///
/// Returns the most recent `limit` bars, oldest first. Transport and auth
/// failures surface as [`PipelineError::DataUnavailable`].
pub trait MarketData: Send + Sync {
    fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: &str,
        limit: usize,
    ) -> impl Future<Output = Result<CandleSeries, PipelineError>> + Send;
}

impl<T: MarketData> MarketData for Arc<T> {
    fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: &str,
        limit: usize,
    ) -> impl Future<Output = Result<CandleSeries, PipelineError>> + Send {
        (**self).fetch_candles(symbol, timeframe, limit)
    }
}

/// Feed selected at startup
pub enum MarketFeed {
    Binance(BinanceClient),
    Synthetic(SyntheticFeed),
}

impl MarketData for MarketFeed {
    async fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: &str,
        limit: usize,
    ) -> Result<CandleSeries, PipelineError> {
        match self {
            MarketFeed::Binance(client) => client.fetch_candles(symbol, timeframe, limit).await,
            MarketFeed::Synthetic(feed) => feed.fetch_candles(symbol, timeframe, limit).await,
        }
    }
}

/// Bar length of a timeframe like `5m`, `4h` or `1d`
///
/// `None` for anything else, including lengths that overflow.
pub fn timeframe_millis(timeframe: &str) -> Option<i64> {
    let unit = timeframe.chars().last()?;
    let digits = &timeframe[..timeframe.len() - unit.len_utf8()];
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let count: i64 = digits.parse().ok()?;
    if count == 0 {
        return None;
    }

    let unit_ms = match unit {
        's' => 1_000,
        'm' => 60_000,
        'h' => 3_600_000,
        'd' => 86_400_000,
        'w' => 604_800_000,
        _ => return None,
    };

    count.checked_mul(unit_ms)
}

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::sync::Mutex;

use super::{timeframe_millis, MarketData};
use crate::error::PipelineError;
use crate::models::{Candle, CandleSeries};

// max per-bar move as a fraction of price
const BAR_VOLATILITY: f64 = 0.004;

/// Seeded random-walk candles for paper runs
///
/// Each `(symbol, timeframe)` keeps its own history, extended up to the
/// current wall-clock bar on every fetch, so consecutive polls see a
/// continuous series with a new bar appearing once per timeframe.
pub struct SyntheticFeed {
    seed: u64,
    start_price: f64,
    books: Mutex<HashMap<(String, String), Book>>,
}

struct Book {
    rng: StdRng,
    candles: Vec<Candle>,
}

impl SyntheticFeed {
    pub fn new(seed: u64, start_price: f64) -> Self {
        Self {
            seed,
            start_price,
            books: Mutex::new(HashMap::new()),
        }
    }

    /// Series of `limit` bars whose last bar opens at or before `now_ms`
    pub fn series_at(
        &self,
        symbol: &str,
        timeframe: &str,
        limit: usize,
        now_ms: i64,
    ) -> Result<CandleSeries, PipelineError> {
        let step = timeframe_millis(timeframe).ok_or_else(|| {
            PipelineError::DataUnavailable(format!("unsupported timeframe {}", timeframe))
        })?;
        let latest_open = now_ms - now_ms.rem_euclid(step);
        let first_open = step
            .checked_mul(limit.saturating_sub(1) as i64)
            .and_then(|span| latest_open.checked_sub(span))
            .ok_or_else(|| {
                PipelineError::DataUnavailable(format!(
                    "{} bars of {} do not fit the clock",
                    limit, timeframe
                ))
            })?;

        let mut books = self.books.lock().unwrap_or_else(|e| e.into_inner());
        let book = books
            .entry((symbol.to_string(), timeframe.to_string()))
            .or_insert_with(|| Book {
                rng: StdRng::seed_from_u64(self.seed),
                candles: Vec::new(),
            });

        if book.candles.is_empty() {
            let candle = self.next_candle(&mut book.rng, first_open, self.start_price);
            book.candles.push(candle);
        }

        while let Some(&last) = book.candles.last() {
            if last.timestamp >= latest_open {
                break;
            }
            let candle = self.next_candle(&mut book.rng, last.timestamp + step, last.close);
            book.candles.push(candle);
        }

        let keep = limit.max(1);
        if book.candles.len() > keep {
            let excess = book.candles.len() - keep;
            book.candles.drain(..excess);
        }

        CandleSeries::windowed(book.candles.clone(), limit)
    }

    fn next_candle(&self, rng: &mut StdRng, timestamp: i64, open: f64) -> Candle {
        let vol = BAR_VOLATILITY;
        let close = (open * (1.0 + rng.gen_range(-vol..vol))).max(f64::EPSILON);
        let high = open.max(close) * (1.0 + rng.gen_range(0.0..vol / 2.0));
        let low = open.min(close) * (1.0 - rng.gen_range(0.0..vol / 2.0));

        Candle {
            timestamp,
            open,
            high,
            low,
            close,
            volume: rng.gen_range(50.0..150.0),
        }
    }
}

impl MarketData for SyntheticFeed {
    async fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: &str,
        limit: usize,
    ) -> Result<CandleSeries, PipelineError> {
        self.series_at(symbol, timeframe, limit, chrono::Utc::now().timestamp_millis())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_123_456;

    #[test]
    fn test_series_shape() {
        let feed = SyntheticFeed::new(7, 100.0);
        let series = feed.series_at("BTC/USDT", "5m", 50, NOW).unwrap();

        assert_eq!(series.len(), 50);
        let last = series.last().unwrap();
        assert_eq!(last.timestamp % 300_000, 0);
        assert!(last.timestamp <= NOW);

        for c in series.as_slice() {
            assert!(c.high >= c.open.max(c.close));
            assert!(c.low <= c.open.min(c.close));
            assert!(c.low > 0.0);
        }
    }

    #[test]
    fn test_same_seed_same_walk() {
        let a = SyntheticFeed::new(42, 100.0).series_at("X/Y", "1m", 20, NOW).unwrap();
        let b = SyntheticFeed::new(42, 100.0).series_at("X/Y", "1m", 20, NOW).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_history_extends_with_time() {
        let feed = SyntheticFeed::new(1, 100.0);
        let first = feed.series_at("X/Y", "1m", 10, NOW).unwrap();
        let later = feed.series_at("X/Y", "1m", 10, NOW + 120_000).unwrap();

        assert_eq!(later.len(), 10);
        assert_eq!(
            later.last().unwrap().timestamp - first.last().unwrap().timestamp,
            120_000
        );
        // overlapping bars are unchanged
        assert_eq!(later.as_slice()[7], first.as_slice()[9]);
    }

    #[test]
    fn test_unknown_timeframe() {
        let feed = SyntheticFeed::new(1, 100.0);
        let err = feed.series_at("X/Y", "7x", 10, NOW).unwrap_err();
        assert!(matches!(err, PipelineError::DataUnavailable(_)));
    }

    #[test]
    fn test_history_span_past_clock_range() {
        let feed = SyntheticFeed::new(1, 100.0);

        let err = feed.series_at("X/Y", "99999999999999w", 10, NOW).unwrap_err();
        assert!(matches!(err, PipelineError::DataUnavailable(_)));

        let err = feed.series_at("X/Y", "1000000000w", 100, NOW).unwrap_err();
        assert!(matches!(err, PipelineError::DataUnavailable(_)));
    }
}

//! Average True Range (ATR) indicator
//!
//! True Range is the greatest of:
//! - Current High - Current Low
//! - Abs(Current High - Previous Close)
//! - Abs(Current Low - Previous Close)
//!
//! The average is a plain rolling mean of true range, not Wilder's smoothing.
//! Supertrend bands are calibrated against this variant.

use super::moving_average::sma_series;
use crate::models::Candle;

/// True range per bar, undefined for the first bar (no previous close)
pub fn true_range_series(candles: &[Candle]) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(candles.len());

    for (i, candle) in candles.iter().enumerate() {
        if i == 0 {
            out.push(None);
            continue;
        }

        let prev_close = candles[i - 1].close;
        let tr = (candle.high - candle.low)
            .max((candle.high - prev_close).abs())
            .max((candle.low - prev_close).abs());

        out.push(Some(tr));
    }

    out
}

/// ATR aligned with candles, defined from index `period` onwards
pub fn atr_series(candles: &[Candle], period: usize) -> Vec<Option<f64>> {
    sma_series(&true_range_series(candles), period)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_candles(prices: &[(f64, f64, f64, f64)]) -> Vec<Candle> {
        prices
            .iter()
            .enumerate()
            .map(|(i, &(open, high, low, close))| Candle {
                timestamp: i as i64 * 300_000,
                open,
                high,
                low,
                close,
                volume: 1000.0,
            })
            .collect()
    }

    #[test]
    fn test_true_range_uses_previous_close() {
        let candles = create_test_candles(&[
            (100.0, 101.0, 99.0, 100.0),
            // gap up: high - prev close dominates
            (108.0, 110.0, 107.0, 109.0),
            // gap down: prev close - low dominates
            (100.0, 101.0, 95.0, 96.0),
        ]);

        let tr = true_range_series(&candles);
        assert_eq!(tr[0], None);
        assert_eq!(tr[1], Some(10.0));
        assert_eq!(tr[2], Some(14.0));
    }

    #[test]
    fn test_atr_is_simple_average() {
        let low_vol_prices = vec![(100.0, 101.0, 99.0, 100.0); 15];

        let candles = create_test_candles(&low_vol_prices);
        let atr = atr_series(&candles, 14);

        assert_eq!(atr.len(), 15);
        assert!(atr[..14].iter().all(|v| v.is_none()));
        assert_eq!(atr[14], Some(2.0));
    }

    #[test]
    fn test_atr_reacts_to_single_spike_linearly() {
        let mut prices = vec![(100.0, 101.0, 99.0, 100.0); 5];
        prices.push((100.0, 110.0, 90.0, 100.0));

        let candles = create_test_candles(&prices);
        let atr = atr_series(&candles, 5);

        // (4 * 2 + 20) / 5
        assert_eq!(atr[5], Some(5.6));
    }

    #[test]
    fn test_insufficient_data() {
        let candles = create_test_candles(&[(100.0, 101.0, 99.0, 100.0); 2]);
        let atr = atr_series(&candles, 14);

        assert!(atr.iter().all(|v| v.is_none()));
    }
}

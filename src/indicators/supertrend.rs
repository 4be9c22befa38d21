//! Supertrend overlay
//!
//! Bands sit `multiplier * ATR` above and below the bar midpoint. The trend
//! line switches to the lower band when price closes above the previous
//! upper band, to the upper band when it closes below the previous lower
//! band, and otherwise carries the previous value unchanged.

use serde::Serialize;

use crate::models::Candle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    /// Lower band active, price above the line
    Up,
    /// Upper band active, price below the line
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Trend {
    pub line: f64,
    pub direction: TrendDirection,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SupertrendPoint {
    pub upper_band: Option<f64>,
    pub lower_band: Option<f64>,
    /// None until the first band crossing after warm-up
    pub trend: Option<Trend>,
}

/// Compute bands and trend line for every bar
///
/// `atr` must be aligned with `candles`.
pub fn supertrend_series(
    candles: &[Candle],
    atr: &[Option<f64>],
    multiplier: f64,
) -> Vec<SupertrendPoint> {
    debug_assert_eq!(candles.len(), atr.len());

    let mut out: Vec<SupertrendPoint> = Vec::with_capacity(candles.len());

    for (candle, atr) in candles.iter().zip(atr) {
        let mid = (candle.high + candle.low) / 2.0;
        let upper_band = atr.map(|a| mid + multiplier * a);
        let lower_band = atr.map(|a| mid - multiplier * a);

        let trend = match out.last() {
            Some(prev) => next_trend(candle.close, prev, upper_band, lower_band),
            None => None,
        };

        out.push(SupertrendPoint {
            upper_band,
            lower_band,
            trend,
        });
    }

    out
}

fn next_trend(
    close: f64,
    prev: &SupertrendPoint,
    upper_band: Option<f64>,
    lower_band: Option<f64>,
) -> Option<Trend> {
    let (Some(prev_upper), Some(prev_lower), Some(upper), Some(lower)) =
        (prev.upper_band, prev.lower_band, upper_band, lower_band)
    else {
        return prev.trend;
    };

    if close > prev_upper {
        Some(Trend {
            line: lower,
            direction: TrendDirection::Up,
        })
    } else if close < prev_lower {
        Some(Trend {
            line: upper,
            direction: TrendDirection::Down,
        })
    } else {
        prev.trend
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(i: i64, high: f64, low: f64, close: f64) -> Candle {
        Candle {
            timestamp: i,
            open: close,
            high,
            low,
            close,
            volume: 1.0,
        }
    }

    #[test]
    fn test_bands_around_midpoint() {
        let candles = vec![bar(0, 12.0, 8.0, 10.0)];
        let out = supertrend_series(&candles, &[Some(2.0)], 1.5);

        assert_eq!(out[0].upper_band, Some(13.0));
        assert_eq!(out[0].lower_band, Some(7.0));
        assert_eq!(out[0].trend, None);
    }

    #[test]
    fn test_no_trend_without_prior_bands() {
        let candles = vec![bar(0, 11.0, 9.0, 10.0), bar(1, 31.0, 29.0, 30.0)];
        let out = supertrend_series(&candles, &[None, Some(2.0)], 1.0);

        assert_eq!(out[1].trend, None);
    }

    #[test]
    fn test_switch_and_hold() {
        let candles = vec![
            bar(0, 11.0, 9.0, 10.0),
            // closes above previous upper band (12.0)
            bar(1, 16.0, 14.0, 15.0),
            // inside previous bands [13, 17]
            bar(2, 17.0, 15.0, 15.5),
            // below previous lower band (14.0)
            bar(3, 10.0, 8.0, 9.0),
        ];
        let atr = vec![Some(2.0), Some(2.0), Some(2.0), Some(2.0)];
        let out = supertrend_series(&candles, &atr, 1.0);

        let up = out[1].trend.unwrap();
        assert_eq!(up.direction, TrendDirection::Up);
        assert_eq!(up.line, 13.0);

        // carried from bar 1, not bar 2's own lower band (14.0)
        assert_eq!(out[2].lower_band, Some(14.0));
        assert_eq!(out[2].trend, out[1].trend);

        let down = out[3].trend.unwrap();
        assert_eq!(down.direction, TrendDirection::Down);
        assert_eq!(down.line, 11.0);
    }
}

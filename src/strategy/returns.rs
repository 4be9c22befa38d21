use crate::indicators::IndicatorState;

/// Estimates the fractional return a confirmed entry can expect
///
/// The estimate feeds the fee gate, so swapping the model changes which
/// signals clear trading costs without touching the entry rule.
pub trait ReturnModel: Send + Sync {
    fn expected_return(&self, close: f64, state: &IndicatorState) -> f64;

    fn name(&self) -> &str;
}

/// Normalized distance of price above the Supertrend line
#[derive(Debug, Clone, Copy, Default)]
pub struct TrendDistance;

impl ReturnModel for TrendDistance {
    fn expected_return(&self, close: f64, state: &IndicatorState) -> f64 {
        match state.trend_line() {
            Some(line) if close > 0.0 => ((close - line) / close).max(0.0),
            _ => 0.0,
        }
    }

    fn name(&self) -> &str {
        "TrendDistance"
    }
}

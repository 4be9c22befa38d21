use serde::{Deserialize, Serialize};

use super::atr::{atr_series, true_range_series};
use super::moving_average::sma_series;
use super::rsi::rsi_series;
use super::supertrend::{supertrend_series, Trend};
use crate::error::PipelineError;
use crate::models::CandleSeries;

/// Indicator parameters
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IndicatorParams {
    pub atr_period: usize,
    pub atr_multiplier: f64,
    pub rsi_period: usize,
    pub rsi_ma_period: usize,
}

impl Default for IndicatorParams {
    fn default() -> Self {
        Self {
            atr_period: 14,
            atr_multiplier: 1.4,
            rsi_period: 21,
            rsi_ma_period: 16,
        }
    }
}

/// Derived values for one bar, `None` where the bar is still in warm-up
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct IndicatorState {
    pub true_range: Option<f64>,
    pub atr: Option<f64>,
    pub upper_band: Option<f64>,
    pub lower_band: Option<f64>,
    pub trend: Option<Trend>,
    pub rsi: Option<f64>,
    pub rsi_ma: Option<f64>,
}

impl IndicatorState {
    pub fn trend_line(&self) -> Option<f64> {
        self.trend.map(|t| t.line)
    }
}

/// Computes Supertrend and RSI state over a candle series
#[derive(Debug, Clone)]
pub struct IndicatorEngine {
    params: IndicatorParams,
}

impl IndicatorEngine {
    pub fn new(params: IndicatorParams) -> Self {
        Self { params }
    }

    /// Bars required before the latest bar carries a full readout
    ///
    /// ATR needs `atr_period` true ranges (which start at bar 1) and the trend
    /// recurrence needs defined bands on the bar before, hence `+ 2`. The RSI
    /// baseline needs `rsi_ma_period` RSI values, the first at bar `rsi_period`.
    pub fn min_history(&self) -> usize {
        (self.params.atr_period + 2).max(self.params.rsi_period + self.params.rsi_ma_period)
    }

    /// Compute one state per candle
    pub fn compute(&self, series: &CandleSeries) -> Result<Vec<IndicatorState>, PipelineError> {
        let need = self.min_history();
        if series.len() < need {
            return Err(PipelineError::InsufficientHistory {
                have: series.len(),
                need,
            });
        }

        let candles = series.as_slice();
        let true_range = true_range_series(candles);
        let atr = atr_series(candles, self.params.atr_period);
        let supertrend = supertrend_series(candles, &atr, self.params.atr_multiplier);
        let rsi = rsi_series(&series.closes(), self.params.rsi_period);
        let rsi_ma = sma_series(&rsi, self.params.rsi_ma_period);

        let states: Vec<IndicatorState> = (0..candles.len())
            .map(|i| IndicatorState {
                true_range: true_range[i],
                atr: atr[i],
                upper_band: supertrend[i].upper_band,
                lower_band: supertrend[i].lower_band,
                trend: supertrend[i].trend,
                rsi: rsi[i],
                rsi_ma: rsi_ma[i],
            })
            .collect();

        if let Some(latest) = states.last() {
            tracing::debug!(
                bars = states.len(),
                atr = ?latest.atr,
                trend = ?latest.trend,
                rsi = ?latest.rsi,
                rsi_ma = ?latest.rsi_ma,
                "Indicators computed"
            );
        }

        Ok(states)
    }
}

impl Default for IndicatorEngine {
    fn default() -> Self {
        Self::new(IndicatorParams::default())
    }
}

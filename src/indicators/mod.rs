// Technical indicators module
// Implements ATR, RSI, SMA and the Supertrend overlay

pub mod atr;
pub mod engine;
pub mod moving_average;
pub mod rsi;
pub mod supertrend;

pub use atr::{atr_series, true_range_series};
pub use engine::{IndicatorEngine, IndicatorParams, IndicatorState};
pub use moving_average::sma_series;
pub use rsi::rsi_series;
pub use supertrend::{supertrend_series, SupertrendPoint, Trend, TrendDirection};

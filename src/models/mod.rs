use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::PipelineError;

/// OHLCV candlestick, timestamp is the bar open time in epoch milliseconds
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Candle {
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    fn is_finite(&self) -> bool {
        [self.open, self.high, self.low, self.close, self.volume]
            .iter()
            .all(|v| v.is_finite())
    }
}

/// Ordered candle history for one evaluation cycle
///
/// Timestamps are strictly increasing. A series is built once per cycle
/// and never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct CandleSeries {
    candles: Vec<Candle>,
}

impl CandleSeries {
    /// Build a series, rejecting out-of-order or non-finite bars
    pub fn new(candles: Vec<Candle>) -> Result<Self, PipelineError> {
        if let Some(bad) = candles.iter().position(|c| !c.is_finite()) {
            return Err(PipelineError::InvalidCandles(format!(
                "non-finite value in bar {}",
                bad
            )));
        }

        for window in candles.windows(2) {
            if window[1].timestamp <= window[0].timestamp {
                return Err(PipelineError::InvalidCandles(format!(
                    "timestamps not strictly increasing ({} then {})",
                    window[0].timestamp, window[1].timestamp
                )));
            }
        }

        Ok(Self { candles })
    }

    /// Build a series keeping only the most recent `limit` bars
    pub fn windowed(mut candles: Vec<Candle>, limit: usize) -> Result<Self, PipelineError> {
        if candles.len() > limit {
            candles.drain(..candles.len() - limit);
        }
        Self::new(candles)
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn as_slice(&self) -> &[Candle] {
        &self.candles
    }

    pub fn last(&self) -> Option<&Candle> {
        self.candles.last()
    }

    /// Previous and latest bar
    pub fn last_two(&self) -> Option<(&Candle, &Candle)> {
        match self.candles.as_slice() {
            [.., prev, latest] => Some((prev, latest)),
            _ => None,
        }
    }

    pub fn closes(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.close).collect()
    }
}

/// Order side
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}

impl FromStr for Side {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "buy" | "long" => Ok(Side::Buy),
            "sell" | "short" => Ok(Side::Sell),
            other => Err(PipelineError::MalformedPayload(format!(
                "unknown action '{}'",
                other
            ))),
        }
    }
}

/// Order type submitted to the execution collaborator
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OrderType {
    Market,
    Limit { price: f64 },
}

/// Typed inbound signal request, built by the payload parser or the scheduler
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SignalRequest {
    /// Normalized `BASE/QUOTE` symbol
    pub symbol: String,
    pub action: Side,
    pub timeframe: String,
    pub signal_id: Option<String>,
    /// Place a limit order at this price instead of a market order
    #[serde(default)]
    pub limit_price: Option<f64>,
}

/// Evaluated trading signal
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Signal {
    pub symbol: String,
    pub action: Side,
    pub timeframe: String,
    pub signal_id: Option<String>,
    pub valid: bool,
    /// Fractional return estimate, never negative
    pub expected_return: f64,
    /// Close of the bar the signal was evaluated on
    pub price: f64,
    /// Names of rule conditions that did not hold
    pub failed_conditions: Vec<String>,
}

/// Outcome of the risk gate
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RiskDecision {
    pub approved: bool,
    /// `approved`, or the error code of the blocking check
    pub reason: String,
    pub detail: String,
    /// Base-currency units, zero when rejected
    pub amount: f64,
}

/// Terminal status of a pipeline run
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Placed,
    Simulated,
    Rejected,
    Error,
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OutcomeStatus::Placed => "placed",
            OutcomeStatus::Simulated => "simulated",
            OutcomeStatus::Rejected => "rejected",
            OutcomeStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// Order the dispatcher was asked to place
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderRequest {
    pub symbol: String,
    pub side: Side,
    pub amount: f64,
    pub order_type: OrderType,
    /// Idempotency key forwarded to the exchange
    pub client_order_id: String,
}

/// Receipt returned by the execution collaborator
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderReceipt {
    pub order_id: String,
    pub status: String,
}

/// Result of a dispatch attempt
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderOutcome {
    pub status: OutcomeStatus,
    /// Error code for `rejected` and `error` outcomes
    pub reason: Option<String>,
    pub detail: String,
    pub order: Option<OrderRequest>,
    pub exchange_order_id: Option<String>,
}

impl OrderOutcome {
    pub fn rejected(reason: &str, detail: impl Into<String>) -> Self {
        Self {
            status: OutcomeStatus::Rejected,
            reason: Some(reason.to_string()),
            detail: detail.into(),
            order: None,
            exchange_order_id: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle(ts: i64, close: f64) -> Candle {
        Candle {
            timestamp: ts,
            open: close,
            high: close,
            low: close,
            close,
            volume: 1.0,
        }
    }

    #[test]
    fn test_series_rejects_unordered_timestamps() {
        let result = CandleSeries::new(vec![candle(2, 1.0), candle(1, 1.0)]);
        assert!(matches!(result, Err(PipelineError::InvalidCandles(_))));

        let result = CandleSeries::new(vec![candle(1, 1.0), candle(1, 1.0)]);
        assert!(result.is_err());
    }

    #[test]
    fn test_series_rejects_nan() {
        let result = CandleSeries::new(vec![candle(1, 1.0), candle(2, f64::NAN)]);
        assert!(matches!(result, Err(PipelineError::InvalidCandles(_))));
    }

    #[test]
    fn test_windowed_keeps_most_recent() {
        let candles: Vec<Candle> = (0..10).map(|i| candle(i, i as f64)).collect();
        let series = CandleSeries::windowed(candles, 4).unwrap();

        assert_eq!(series.len(), 4);
        assert_eq!(series.as_slice()[0].close, 6.0);
        let (prev, latest) = series.last_two().unwrap();
        assert_eq!(prev.close, 8.0);
        assert_eq!(latest.close, 9.0);
    }

    #[test]
    fn test_side_parsing() {
        assert_eq!("BUY".parse::<Side>().unwrap(), Side::Buy);
        assert_eq!(" sell ".parse::<Side>().unwrap(), Side::Sell);
        assert!(matches!(
            "hold".parse::<Side>(),
            Err(PipelineError::MalformedPayload(_))
        ));
    }

    #[test]
    fn test_outcome_status_serializes_lowercase() {
        let json = serde_json::to_string(&OutcomeStatus::Simulated).unwrap();
        assert_eq!(json, "\"simulated\"");
    }
}

use super::returns::{ReturnModel, TrendDistance};
use crate::indicators::IndicatorState;
use crate::models::{Candle, CandleSeries, Side, Signal, SignalRequest};

/// One leg of the entry rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    /// Close above the Supertrend line
    AboveTrend,
    /// RSI above its own moving average
    RsiAboveBaseline,
    /// Volume above the previous bar's
    VolumeRising,
    /// Close above open
    BullishClose,
    /// Close above the previous bar's high
    Breakout,
}

impl Condition {
    pub const ALL: [Condition; 5] = [
        Condition::AboveTrend,
        Condition::RsiAboveBaseline,
        Condition::VolumeRising,
        Condition::BullishClose,
        Condition::Breakout,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Condition::AboveTrend => "close_above_trend",
            Condition::RsiAboveBaseline => "rsi_above_baseline",
            Condition::VolumeRising => "volume_rising",
            Condition::BullishClose => "bullish_close",
            Condition::Breakout => "close_above_prev_high",
        }
    }

    fn holds(&self, prev: &Candle, latest: &Candle, state: &IndicatorState) -> bool {
        match self {
            Condition::AboveTrend => state.trend_line().is_some_and(|line| latest.close > line),
            Condition::RsiAboveBaseline => match (state.rsi, state.rsi_ma) {
                (Some(rsi), Some(rsi_ma)) => rsi > rsi_ma,
                _ => false,
            },
            Condition::VolumeRising => latest.volume > prev.volume,
            Condition::BullishClose => latest.close > latest.open,
            Condition::Breakout => latest.close > prev.high,
        }
    }
}

/// Supertrend + RSI momentum breakout rule
///
/// A buy is confirmed when all five [`Condition`]s hold on the latest bar.
/// There is no exit rule, so sell requests never validate.
pub struct SupertrendRsiEvaluator {
    return_model: Box<dyn ReturnModel>,
}

impl SupertrendRsiEvaluator {
    pub fn new(return_model: Box<dyn ReturnModel>) -> Self {
        Self { return_model }
    }

    /// Evaluate the rule against the latest bar
    ///
    /// `states` must be the indicator output for `candles`.
    pub fn evaluate(
        &self,
        request: &SignalRequest,
        candles: &CandleSeries,
        states: &[IndicatorState],
    ) -> Signal {
        debug_assert_eq!(candles.len(), states.len());

        let mut signal = Signal {
            symbol: request.symbol.clone(),
            action: request.action,
            timeframe: request.timeframe.clone(),
            signal_id: request.signal_id.clone(),
            valid: false,
            expected_return: 0.0,
            price: candles.last().map(|c| c.close).unwrap_or_default(),
            failed_conditions: Vec::new(),
        };

        let (Some((prev, latest)), Some(state)) = (candles.last_two(), states.last()) else {
            signal.failed_conditions.push("not_enough_bars".to_string());
            return signal;
        };

        // the engine refuses to compute before ATR and RSI baselines exist
        debug_assert!(state.atr.is_some(), "latest bar still in ATR warm-up");
        debug_assert!(state.rsi_ma.is_some(), "latest bar still in RSI warm-up");

        if request.action == Side::Sell {
            signal
                .failed_conditions
                .push("no_confirmation_rule_for_sell".to_string());
            return signal;
        }

        signal.failed_conditions = Condition::ALL
            .iter()
            .filter(|c| !c.holds(prev, latest, state))
            .map(|c| c.name().to_string())
            .collect();
        signal.valid = signal.failed_conditions.is_empty();
        signal.expected_return = self.return_model.expected_return(latest.close, state);

        tracing::debug!(
            symbol = %signal.symbol,
            valid = signal.valid,
            close = latest.close,
            trend = ?state.trend_line(),
            rsi = ?state.rsi,
            rsi_ma = ?state.rsi_ma,
            failed = ?signal.failed_conditions,
            return_model = self.return_model.name(),
            "Rule evaluated"
        );

        signal
    }
}

impl Default for SupertrendRsiEvaluator {
    fn default() -> Self {
        Self::new(Box::new(TrendDistance))
    }
}

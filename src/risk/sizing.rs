use std::collections::HashMap;

use super::account::AccountSnapshot;
use crate::error::PipelineError;

// absorbs float noise like 2.9999999999 lots before flooring
const LOT_EPSILON: f64 = 1e-9;

/// Caps a position at a fraction of equity, bounded by free balance
#[derive(Debug, Clone)]
pub struct PositionSizer {
    /// Fraction of equity per position, 0 < x <= 1
    pub max_position_pct: f64,
    /// Default minimum tradable increment in base units
    pub lot_step: f64,
    /// Per-symbol increments
    pub lot_steps: HashMap<String, f64>,
}

impl PositionSizer {
    pub fn lot_step(&self, symbol: &str) -> f64 {
        self.lot_steps.get(symbol).copied().unwrap_or(self.lot_step)
    }

    /// Base-currency amount to buy at `price`, floored to the lot step
    pub fn size(
        &self,
        symbol: &str,
        price: f64,
        account: &AccountSnapshot,
    ) -> Result<f64, PipelineError> {
        if !(price.is_finite() && price > 0.0) {
            return Err(PipelineError::PositionSizeZero(format!(
                "invalid price {}",
                price
            )));
        }

        let budget = (self.max_position_pct * account.equity).min(account.available_balance);
        let raw = budget / price;
        let step = self.lot_step(symbol);

        let amount = if step > 0.0 {
            ((raw / step) + LOT_EPSILON).floor() * step
        } else {
            raw
        };

        if !(amount.is_finite() && amount > 0.0) {
            return Err(PipelineError::PositionSizeZero(format!(
                "budget {:.2} at price {:.4} is below lot step {}",
                budget, price, step
            )));
        }

        Ok(amount)
    }
}

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::account::AccountSnapshot;
use super::circuit_breakers::CircuitBreakers;
use super::fees::FeeSchedule;
use super::sizing::PositionSizer;
use crate::error::PipelineError;
use crate::models::RiskDecision;

/// Risk settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    pub fee_safety_margin: f64,
    pub default_taker_fee: Option<f64>,
    pub taker_fees: HashMap<String, f64>,
    pub lot_step: f64,
    pub lot_steps: HashMap<String, f64>,
    pub max_daily_loss_pct: f64,
    pub max_drawdown_pct: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        let breakers = CircuitBreakers::default();
        Self {
            fee_safety_margin: 1.5,
            default_taker_fee: Some(0.001), // 0.1% per side
            taker_fees: HashMap::new(),
            lot_step: 0.00001,
            lot_steps: HashMap::new(),
            max_daily_loss_pct: breakers.max_daily_loss_pct,
            max_drawdown_pct: breakers.max_drawdown_pct,
        }
    }
}

/// Fee gate, circuit breakers and position sizing
///
/// Pure over its inputs: the account snapshot is fetched by the caller.
#[derive(Debug, Clone)]
pub struct RiskGate {
    fees: FeeSchedule,
    sizer: PositionSizer,
    breakers: CircuitBreakers,
}

impl RiskGate {
    pub fn new(fees: FeeSchedule, sizer: PositionSizer, breakers: CircuitBreakers) -> Self {
        Self {
            fees,
            sizer,
            breakers,
        }
    }

    pub fn from_config(config: &RiskConfig, max_position_pct: f64) -> Self {
        Self::new(
            FeeSchedule {
                default_taker_fee: config.default_taker_fee,
                taker_fees: config.taker_fees.clone(),
                safety_margin: config.fee_safety_margin,
            },
            PositionSizer {
                max_position_pct,
                lot_step: config.lot_step,
                lot_steps: config.lot_steps.clone(),
            },
            CircuitBreakers {
                max_daily_loss_pct: config.max_daily_loss_pct,
                max_drawdown_pct: config.max_drawdown_pct,
            },
        )
    }

    /// Fee gate, then circuit breakers, then sizing
    ///
    /// A blocked trade is an unapproved decision with a zero amount, never an
    /// error.
    pub fn assess(
        &self,
        symbol: &str,
        expected_return: f64,
        price: f64,
        account: &AccountSnapshot,
    ) -> RiskDecision {
        match self.check(symbol, expected_return, price, account) {
            Ok(amount) => RiskDecision {
                approved: true,
                reason: "approved".to_string(),
                detail: format!("{} base units", amount),
                amount,
            },
            Err(e) => {
                tracing::info!(symbol = %symbol, expected_return, reason = e.code(), "Risk gate blocked");
                RiskDecision {
                    approved: false,
                    reason: e.code().to_string(),
                    detail: e.to_string(),
                    amount: 0.0,
                }
            }
        }
    }

    fn check(
        &self,
        symbol: &str,
        expected_return: f64,
        price: f64,
        account: &AccountSnapshot,
    ) -> Result<f64, PipelineError> {
        let threshold = self.fees.check(symbol, expected_return)?;

        self.breakers.check(account).map_err(|trip| {
            PipelineError::CircuitBreakerTripped(format!("{:?}", trip))
        })?;

        let amount = self.sizer.size(symbol, price, account)?;

        tracing::info!(
            symbol = %symbol,
            expected_return,
            fee_threshold = threshold,
            amount,
            "Risk gate approved"
        );

        Ok(amount)
    }
}

use serde::{Deserialize, Serialize};

use super::account::AccountSnapshot;

/// Circuit breakers to prevent catastrophic losses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakers {
    pub max_daily_loss_pct: f64,
    pub max_drawdown_pct: f64,
}

impl Default for CircuitBreakers {
    fn default() -> Self {
        Self {
            max_daily_loss_pct: 0.05, // -5% daily
            max_drawdown_pct: 0.20,   // -20% from peak
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CircuitBreakerTrip {
    DailyLoss,
    MaxDrawdown,
}

impl CircuitBreakers {
    pub fn check(&self, account: &AccountSnapshot) -> Result<(), CircuitBreakerTrip> {
        // Check daily loss
        if account.equity > 0.0 {
            let daily_loss_pct = account.daily_pnl / account.equity;
            if daily_loss_pct < -self.max_daily_loss_pct {
                return Err(CircuitBreakerTrip::DailyLoss);
            }
        }

        // Check drawdown
        if account.peak_equity > 0.0 {
            let drawdown = (account.peak_equity - account.equity) / account.peak_equity;
            if drawdown > self.max_drawdown_pct {
                return Err(CircuitBreakerTrip::MaxDrawdown);
            }
        }

        Ok(())
    }
}

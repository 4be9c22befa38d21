use serde::{Deserialize, Serialize};
use std::future::Future;

use crate::error::PipelineError;

/// Account state the risk gate sizes against
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct AccountSnapshot {
    /// Total account value in quote currency
    pub equity: f64,
    /// Quote currency free to spend
    pub available_balance: f64,
    /// Highest equity seen, for drawdown
    pub peak_equity: f64,
    /// Realized + unrealized P&L since the daily reset
    pub daily_pnl: f64,
}

impl AccountSnapshot {
    pub fn new(equity: f64, available_balance: f64) -> Self {
        Self {
            equity,
            available_balance,
            peak_equity: equity,
            daily_pnl: 0.0,
        }
    }
}

/// Source of account snapshots, queried once per pipeline run
pub trait AccountSource: Send + Sync {
    fn snapshot(&self) -> impl Future<Output = Result<AccountSnapshot, PipelineError>> + Send;
}

/// Fixed snapshot for paper trading and tests
#[derive(Debug, Clone, Copy)]
pub struct StaticAccount(pub AccountSnapshot);

impl AccountSource for StaticAccount {
    async fn snapshot(&self) -> Result<AccountSnapshot, PipelineError> {
        Ok(self.0)
    }
}

use std::collections::HashMap;

use crate::error::PipelineError;

/// Taker fee lookup with a safety margin over the round trip
#[derive(Debug, Clone)]
pub struct FeeSchedule {
    /// Fallback per-side taker fee; `None` means unknown symbols are rejected
    pub default_taker_fee: Option<f64>,
    /// Per-symbol per-side taker fees
    pub taker_fees: HashMap<String, f64>,
    /// Multiplier (>= 1) on the round-trip fee
    pub safety_margin: f64,
}

impl FeeSchedule {
    pub fn taker_fee(&self, symbol: &str) -> Option<f64> {
        self.taker_fees
            .get(symbol)
            .copied()
            .or(self.default_taker_fee)
            .filter(|fee| fee.is_finite() && *fee >= 0.0)
    }

    /// Minimum expected return a trade must exceed
    pub fn threshold(&self, symbol: &str) -> Option<f64> {
        self.taker_fee(symbol)
            .map(|fee| 2.0 * fee * self.safety_margin.max(1.0))
    }

    /// Reject unless `expected_return` strictly clears the threshold
    pub fn check(&self, symbol: &str, expected_return: f64) -> Result<f64, PipelineError> {
        let threshold = self.threshold(symbol).ok_or_else(|| {
            PipelineError::FeeCheckFailed(format!("no fee data for {}", symbol))
        })?;

        if expected_return <= threshold {
            return Err(PipelineError::FeeCheckFailed(format!(
                "expected return {:.5} does not clear fee threshold {:.5}",
                expected_return, threshold
            )));
        }

        Ok(threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schedule(default: Option<f64>, margin: f64) -> FeeSchedule {
        FeeSchedule {
            default_taker_fee: default,
            taker_fees: HashMap::new(),
            safety_margin: margin,
        }
    }

    #[test]
    fn test_rejects_return_below_threshold() {
        // 0.0005 per side, round trip 0.001, x2 margin = 0.002
        let fees = schedule(Some(0.0005), 2.0);
        assert!((fees.threshold("BTC/USDT").unwrap() - 0.002).abs() < 1e-12);

        let result = fees.check("BTC/USDT", 0.001);
        assert!(matches!(result, Err(PipelineError::FeeCheckFailed(_))));
    }

    #[test]
    fn test_threshold_itself_is_rejected() {
        let fees = schedule(Some(0.001), 1.0);
        assert!(fees.check("BTC/USDT", 0.002).is_err());
        assert!(fees.check("BTC/USDT", 0.0021).is_ok());
    }

    #[test]
    fn test_unknown_fee_rejects() {
        let fees = schedule(None, 1.5);
        let result = fees.check("BTC/USDT", 0.5);
        assert_eq!(
            result,
            Err(PipelineError::FeeCheckFailed("no fee data for BTC/USDT".to_string()))
        );
    }

    #[test]
    fn test_symbol_override() {
        let mut fees = schedule(None, 1.0);
        fees.taker_fees.insert("ETH/USDT".to_string(), 0.0002);

        assert_eq!(fees.taker_fee("ETH/USDT"), Some(0.0002));
        assert!(fees.check("ETH/USDT", 0.001).is_ok());
        assert!(fees.check("BTC/USDT", 0.001).is_err());
    }

    #[test]
    fn test_margin_below_one_is_floored() {
        let fees = schedule(Some(0.001), 0.5);
        assert_eq!(fees.threshold("X/Y"), Some(0.002));
    }
}

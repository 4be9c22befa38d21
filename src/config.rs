//! Runtime settings
//!
//! Layered as defaults, then an optional TOML file, then `TRENDBOT__*`
//! environment variables (`TRENDBOT__RISK__FEE_SAFETY_MARGIN=2.0`).

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::api::binance::BINANCE_API_BASE;
use crate::api::timeframe_millis;
use crate::indicators::{IndicatorEngine, IndicatorParams};
use crate::risk::RiskConfig;
use crate::strategy::DEFAULT_QUOTE_ASSETS;

pub const DEFAULT_CONFIG_FILE: &str = "trendbot.toml";
const ENV_PREFIX: &str = "TRENDBOT";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to load settings: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid settings: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub symbol: String,
    pub timeframe: String,
    pub fetch_limit: usize,
    pub poll_interval_secs: u64,
    /// Payloads `listen` processes at once
    pub listen_concurrency: usize,
    pub trading_enabled: bool,
    pub max_position_pct: f64,
    pub quote_assets: Vec<String>,
    pub indicators: IndicatorParams,
    pub risk: RiskConfig,
    pub account: AccountConfig,
    pub market_data: MarketDataConfig,
    pub execution: ExecutionConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            symbol: "BTC/USDT".to_string(),
            timeframe: "5m".to_string(),
            fetch_limit: 100,
            poll_interval_secs: 60,
            listen_concurrency: 32,
            trading_enabled: false,
            max_position_pct: 0.05,
            quote_assets: DEFAULT_QUOTE_ASSETS.iter().map(|q| q.to_string()).collect(),
            indicators: IndicatorParams::default(),
            risk: RiskConfig::default(),
            account: AccountConfig::default(),
            market_data: MarketDataConfig::default(),
            execution: ExecutionConfig::default(),
        }
    }
}

/// Paper account the risk gate sizes against
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountConfig {
    pub equity: f64,
    pub available_balance: f64,
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            equity: 10_000.0,
            available_balance: 10_000.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketDataConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub requests_per_minute: u32,
    /// Use the seeded random-walk feed instead of the exchange
    pub synthetic: bool,
    pub synthetic_seed: u64,
    pub synthetic_start_price: f64,
}

impl Default for MarketDataConfig {
    fn default() -> Self {
        Self {
            base_url: BINANCE_API_BASE.to_string(),
            timeout_secs: 10,
            requests_per_minute: 600,
            synthetic: false,
            synthetic_seed: 42,
            synthetic_start_price: 30_000.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout_secs: u64,
    pub dedupe_capacity: usize,
    pub dedupe_ttl_secs: u64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            api_key: String::new(),
            timeout_secs: 10,
            dedupe_capacity: 1024,
            dedupe_ttl_secs: 86_400,
        }
    }
}

impl Settings {
    /// Load and validate
    ///
    /// An explicit `path` must exist; otherwise `trendbot.toml` is read if present.
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        let file = match path {
            Some(path) => config::File::from(path).required(true),
            None => config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let settings: Settings = config::Config::builder()
            .add_source(file)
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("quote_assets")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        let invalid = |msg: String| -> Result<(), SettingsError> { Err(SettingsError::Invalid(msg)) };

        if !(self.max_position_pct > 0.0 && self.max_position_pct <= 1.0) {
            return invalid(format!(
                "max_position_pct must be in (0, 1], got {}",
                self.max_position_pct
            ));
        }
        if timeframe_millis(&self.timeframe).is_none() {
            return invalid(format!("unsupported timeframe '{}'", self.timeframe));
        }
        if self.poll_interval_secs == 0 {
            return invalid("poll_interval_secs must be positive".to_string());
        }
        if self.listen_concurrency == 0 {
            return invalid("listen_concurrency must be positive".to_string());
        }

        let p = &self.indicators;
        if p.atr_period == 0 || p.rsi_period == 0 || p.rsi_ma_period == 0 {
            return invalid("indicator periods must be positive".to_string());
        }
        if !(p.atr_multiplier.is_finite() && p.atr_multiplier > 0.0) {
            return invalid(format!("atr_multiplier must be positive, got {}", p.atr_multiplier));
        }

        let min_history = IndicatorEngine::new(*p).min_history();
        if self.fetch_limit < min_history {
            return invalid(format!(
                "fetch_limit {} is below the {} bars the indicators need",
                self.fetch_limit, min_history
            ));
        }

        if !(self.risk.fee_safety_margin.is_finite() && self.risk.fee_safety_margin >= 1.0) {
            return invalid(format!(
                "fee_safety_margin must be >= 1, got {}",
                self.risk.fee_safety_margin
            ));
        }
        if !(self.risk.lot_step.is_finite() && self.risk.lot_step > 0.0) {
            return invalid("lot_step must be positive".to_string());
        }
        if self.execution.dedupe_capacity == 0 {
            return invalid("execution.dedupe_capacity must be positive".to_string());
        }
        if self.trading_enabled && self.execution.api_key.trim().is_empty() {
            return invalid("trading_enabled requires execution.api_key".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.indicators.atr_period, 14);
        assert_eq!(settings.indicators.rsi_ma_period, 16);
        assert!(!settings.trading_enabled);
    }

    #[test]
    fn test_position_pct_bounds() {
        let mut settings = Settings::default();
        settings.max_position_pct = 0.0;
        assert!(settings.validate().is_err());

        settings.max_position_pct = 1.5;
        assert!(settings.validate().is_err());

        settings.max_position_pct = 1.0;
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_listen_concurrency_must_be_positive() {
        let mut settings = Settings::default();
        settings.listen_concurrency = 0;
        assert!(matches!(settings.validate(), Err(SettingsError::Invalid(_))));
    }

    #[test]
    fn test_fee_margin_below_one_rejected() {
        let mut settings = Settings::default();
        settings.risk.fee_safety_margin = 0.9;
        assert!(matches!(settings.validate(), Err(SettingsError::Invalid(_))));
    }

    #[test]
    fn test_fetch_limit_must_cover_warmup() {
        let mut settings = Settings::default();
        settings.fetch_limit = 20;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_live_trading_needs_api_key() {
        let mut settings = Settings::default();
        settings.trading_enabled = true;
        assert!(settings.validate().is_err());

        settings.execution.api_key = "key".to_string();
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("trendbot-{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(
            &path,
            r#"
symbol = "ETH/USDT"
timeframe = "15m"

[indicators]
atr_multiplier = 2.0

[risk]
fee_safety_margin = 2.0
"#,
        )
        .unwrap();

        let settings = Settings::load(Some(path.as_path())).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(settings.symbol, "ETH/USDT");
        assert_eq!(settings.timeframe, "15m");
        assert_eq!(settings.indicators.atr_multiplier, 2.0);
        assert_eq!(settings.indicators.atr_period, 14);
        assert_eq!(settings.risk.fee_safety_margin, 2.0);
        assert_eq!(settings.risk.default_taker_fee, Some(0.001));
    }

    #[test]
    fn test_missing_explicit_file_fails() {
        let path = std::env::temp_dir().join("trendbot-does-not-exist.toml");
        assert!(matches!(
            Settings::load(Some(path.as_path())),
            Err(SettingsError::Load(_))
        ));
    }
}

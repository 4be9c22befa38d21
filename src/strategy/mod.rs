// Signal evaluation module
pub mod returns;
pub mod supertrend_rsi;
pub mod symbol;

pub use returns::{ReturnModel, TrendDistance};
pub use supertrend_rsi::{Condition, SupertrendRsiEvaluator};
pub use symbol::{is_routable, SymbolNormalizer, DEFAULT_QUOTE_ASSETS};

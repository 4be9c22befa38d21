// Risk management module
pub mod account;
pub mod circuit_breakers;
pub mod fees;
pub mod gate;
pub mod sizing;

pub use account::{AccountSnapshot, AccountSource, StaticAccount};
pub use circuit_breakers::{CircuitBreakerTrip, CircuitBreakers};
pub use fees::FeeSchedule;
pub use gate::{RiskConfig, RiskGate};
pub use sizing::PositionSizer;

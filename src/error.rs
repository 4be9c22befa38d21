use thiserror::Error;

/// Failure taxonomy for one pipeline run.
///
/// Everything up to `ExecutionRejected` happens before money moves and is
/// reported as a structured rejection rather than raised as a fault.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    #[error("insufficient history: {have} candles, need {need}")]
    InsufficientHistory { have: usize, need: usize },

    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    #[error("signal did not validate: {0}")]
    ValidationFailed(String),

    #[error("fee check failed: {0}")]
    FeeCheckFailed(String),

    #[error("position size is zero: {0}")]
    PositionSizeZero(String),

    #[error("circuit breaker tripped: {0}")]
    CircuitBreakerTripped(String),

    #[error("order rejected: {0}")]
    ExecutionRejected(String),

    #[error("order submission timed out after {0}ms, order state unknown")]
    ExecutionTimeout(u64),

    #[error("market data unavailable: {0}")]
    DataUnavailable(String),

    #[error("invalid candle series: {0}")]
    InvalidCandles(String),
}

impl PipelineError {
    /// Stable machine-readable reason code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InsufficientHistory { .. } => "insufficient_history",
            Self::MalformedPayload(_) => "malformed_payload",
            Self::ValidationFailed(_) => "validation_failed",
            Self::FeeCheckFailed(_) => "fee_check_failed",
            Self::PositionSizeZero(_) => "position_size_zero",
            Self::CircuitBreakerTripped(_) => "circuit_breaker_tripped",
            Self::ExecutionRejected(_) => "execution_rejected",
            Self::ExecutionTimeout(_) => "execution_timeout",
            Self::DataUnavailable(_) => "data_unavailable",
            Self::InvalidCandles(_) => "invalid_candles",
        }
    }

    /// True when the cycle can simply be retried on the next tick.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::InsufficientHistory { .. } | Self::DataUnavailable(_) | Self::InvalidCandles(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_snake_case() {
        let err = PipelineError::InsufficientHistory { have: 3, need: 37 };
        assert_eq!(err.code(), "insufficient_history");
        assert_eq!(err.to_string(), "insufficient history: 3 candles, need 37");
        assert_eq!(PipelineError::ExecutionTimeout(500).code(), "execution_timeout");
    }

    #[test]
    fn test_recoverable_errors() {
        assert!(PipelineError::DataUnavailable("502".into()).is_recoverable());
        assert!(!PipelineError::ExecutionTimeout(10).is_recoverable());
        assert!(!PipelineError::FeeCheckFailed("x".into()).is_recoverable());
    }
}

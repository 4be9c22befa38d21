use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

use super::payload::parse_payload;
use crate::api::MarketData;
use crate::error::PipelineError;
use crate::execution::{ExecutionClient, ExecutionDispatcher, OrderIntent};
use crate::indicators::IndicatorEngine;
use crate::models::{CandleSeries, OrderOutcome, OrderRequest, OutcomeStatus, Side, SignalRequest};
use crate::risk::{AccountSource, RiskGate};
use crate::strategy::{SupertrendRsiEvaluator, SymbolNormalizer};

const DEFAULT_FETCH_LIMIT: usize = 100;
const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Terminal result of one pipeline run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineReport {
    pub status: OutcomeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signal_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<OrderRequest>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exchange_order_id: Option<String>,
}

impl PipelineReport {
    fn from_outcome(request: &SignalRequest, outcome: OrderOutcome) -> Self {
        Self {
            status: outcome.status,
            reason: outcome.reason,
            detail: Some(outcome.detail),
            symbol: Some(request.symbol.clone()),
            signal_id: request.signal_id.clone(),
            order: outcome.order,
            exchange_order_id: outcome.exchange_order_id,
        }
    }

    fn from_error(request: Option<&SignalRequest>, error: &PipelineError) -> Self {
        // infrastructure failures are errors, rule and risk outcomes are rejections
        let status = match error {
            PipelineError::DataUnavailable(_)
            | PipelineError::InvalidCandles(_)
            | PipelineError::ExecutionRejected(_)
            | PipelineError::ExecutionTimeout(_) => OutcomeStatus::Error,
            _ => OutcomeStatus::Rejected,
        };

        Self {
            status,
            reason: Some(error.code().to_string()),
            detail: Some(error.to_string()),
            symbol: request.map(|r| r.symbol.clone()),
            signal_id: request.and_then(|r| r.signal_id.clone()),
            order: None,
            exchange_order_id: None,
        }
    }
}

/// Everything one run needs, built once at startup and shared by reference
///
/// Holds no per-run state: candles and indicator states live only for the
/// duration of a call, and the dispatcher's dedupe cache is the single piece
/// of memory carried between runs.
pub struct Pipeline<M, X, A> {
    engine: IndicatorEngine,
    evaluator: SupertrendRsiEvaluator,
    gate: RiskGate,
    dispatcher: ExecutionDispatcher<X>,
    market: M,
    account: A,
    normalizer: SymbolNormalizer,
    fetch_limit: usize,
    fetch_timeout: Duration,
}

impl<M, X, A> Pipeline<M, X, A>
where
    M: MarketData,
    X: ExecutionClient,
    A: AccountSource,
{
    pub fn new(
        engine: IndicatorEngine,
        evaluator: SupertrendRsiEvaluator,
        gate: RiskGate,
        dispatcher: ExecutionDispatcher<X>,
        market: M,
        account: A,
    ) -> Self {
        let fetch_limit = DEFAULT_FETCH_LIMIT.max(engine.min_history());
        Self {
            engine,
            evaluator,
            gate,
            dispatcher,
            market,
            account,
            normalizer: SymbolNormalizer::default(),
            fetch_limit,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }

    pub fn with_normalizer(mut self, normalizer: SymbolNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn with_fetch_limit(mut self, limit: usize) -> Self {
        self.fetch_limit = limit;
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn dispatcher(&self) -> &ExecutionDispatcher<X> {
        &self.dispatcher
    }

    /// Event-driven entry point for one inbound webhook body
    pub async fn handle_payload(&self, payload: &Value) -> PipelineReport {
        match parse_payload(payload, &self.normalizer) {
            Ok(request) => self.evaluate_request(&request).await,
            Err(e) => {
                tracing::warn!(error = %e, "Rejected inbound payload");
                PipelineReport::from_error(None, &e)
            }
        }
    }

    /// Same as [`Pipeline::handle_payload`] for a body not yet decoded
    pub async fn handle_raw(&self, body: &str) -> PipelineReport {
        match serde_json::from_str::<Value>(body) {
            Ok(payload) => self.handle_payload(&payload).await,
            Err(e) => {
                let e = PipelineError::MalformedPayload(format!("payload is not JSON: {}", e));
                tracing::warn!(error = %e, "Rejected inbound payload");
                PipelineReport::from_error(None, &e)
            }
        }
    }

    /// Fetch, evaluate, gate and dispatch for an already-typed request
    pub async fn evaluate_request(&self, request: &SignalRequest) -> PipelineReport {
        let result = match self.fetch(request).await {
            Ok(candles) => self.process(request, &candles).await,
            Err(e) => Err(e),
        };
        self.report(request, result)
    }

    /// One continuous-mode cycle
    ///
    /// The signal id is scoped to the latest bar, so repeated polls inside
    /// the same bar can place at most one order.
    pub async fn run_cycle(&self, symbol: &str, timeframe: &str) -> PipelineReport {
        let mut request = SignalRequest {
            symbol: symbol.to_string(),
            action: Side::Buy,
            timeframe: timeframe.to_string(),
            signal_id: None,
            limit_price: None,
        };

        let result = match self.fetch(&request).await {
            Ok(candles) => {
                request.signal_id = candles
                    .last()
                    .map(|bar| bar_signal_id(symbol, timeframe, bar.timestamp));
                self.process(&request, &candles).await
            }
            Err(e) => Err(e),
        };

        self.report(&request, result)
    }

    async fn fetch(&self, request: &SignalRequest) -> Result<CandleSeries, PipelineError> {
        let fetch = self
            .market
            .fetch_candles(&request.symbol, &request.timeframe, self.fetch_limit);

        let candles = tokio::time::timeout(self.fetch_timeout, fetch)
            .await
            .map_err(|_| {
                PipelineError::DataUnavailable(format!(
                    "fetch timed out after {}ms",
                    self.fetch_timeout.as_millis()
                ))
            })??;

        tracing::debug!(
            symbol = %request.symbol,
            timeframe = %request.timeframe,
            bars = candles.len(),
            "Fetched candles"
        );

        Ok(candles)
    }

    async fn process(
        &self,
        request: &SignalRequest,
        candles: &CandleSeries,
    ) -> Result<OrderOutcome, PipelineError> {
        let states = self.engine.compute(candles)?;

        let signal = self.evaluator.evaluate(request, candles, &states);
        if !signal.valid {
            return Err(PipelineError::ValidationFailed(
                signal.failed_conditions.join(", "),
            ));
        }

        let account = self.account.snapshot().await?;
        let price = request.limit_price.unwrap_or(signal.price);
        let decision = self
            .gate
            .assess(&signal.symbol, signal.expected_return, price, &account);
        if !decision.approved {
            return Ok(OrderOutcome::rejected(&decision.reason, decision.detail));
        }

        let mut intent = OrderIntent::market(signal.symbol.clone(), signal.action, decision.amount);
        if let Some(limit) = request.limit_price {
            intent = intent.with_limit_price(limit);
        }
        if let Some(id) = &signal.signal_id {
            intent = intent.with_signal_id(id.clone());
        }

        Ok(self.dispatcher.dispatch(intent).await)
    }

    fn report(
        &self,
        request: &SignalRequest,
        result: Result<OrderOutcome, PipelineError>,
    ) -> PipelineReport {
        let report = match result {
            Ok(outcome) => PipelineReport::from_outcome(request, outcome),
            Err(e) => {
                if e.is_recoverable() {
                    tracing::warn!(symbol = %request.symbol, error = %e, "Cycle skipped");
                }
                PipelineReport::from_error(Some(request), &e)
            }
        };

        tracing::info!(
            symbol = %request.symbol,
            signal_id = ?request.signal_id,
            status = %report.status,
            reason = ?report.reason,
            "Pipeline run finished"
        );

        report
    }
}

/// `{symbol}:{timeframe}:{bar open ms}`
pub fn bar_signal_id(symbol: &str, timeframe: &str, bar_open_ms: i64) -> String {
    format!("{}:{}:{}", symbol, timeframe, bar_open_ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bar_signal_id() {
        assert_eq!(
            bar_signal_id("BTC/USDT", "5m", 1_700_000_000_000),
            "BTC/USDT:5m:1700000000000"
        );
    }

    #[test]
    fn test_report_status_mapping() {
        let request = SignalRequest {
            symbol: "BTC/USDT".to_string(),
            action: Side::Buy,
            timeframe: "5m".to_string(),
            signal_id: Some("sig-1".to_string()),
            limit_price: None,
        };

        let report = PipelineReport::from_error(
            Some(&request),
            &PipelineError::FeeCheckFailed("too small".into()),
        );
        assert_eq!(report.status, OutcomeStatus::Rejected);
        assert_eq!(report.reason.as_deref(), Some("fee_check_failed"));
        assert_eq!(report.signal_id.as_deref(), Some("sig-1"));

        let report = PipelineReport::from_error(
            Some(&request),
            &PipelineError::DataUnavailable("502".into()),
        );
        assert_eq!(report.status, OutcomeStatus::Error);
    }

    #[test]
    fn test_report_serializes_without_empty_fields() {
        let report = PipelineReport::from_error(
            None,
            &PipelineError::MalformedPayload("missing symbol".into()),
        );
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["status"], "rejected");
        assert_eq!(json["reason"], "malformed_payload");
        assert!(json.get("symbol").is_none());
        assert!(json.get("order").is_none());
    }
}

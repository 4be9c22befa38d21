use std::time::Duration;
use uuid::Uuid;

use super::client::ExecutionClient;
use super::dedupe::DedupeCache;
use crate::error::PipelineError;
use crate::models::{OrderOutcome, OrderRequest, OrderType, OutcomeStatus, Side};
use crate::strategy::is_routable;

// exchanges commonly cap client order ids at 36 chars
const MAX_CLIENT_ORDER_ID_LEN: usize = 36;

/// What the pipeline wants placed
#[derive(Debug, Clone, PartialEq)]
pub struct OrderIntent {
    pub symbol: String,
    pub side: Side,
    pub amount: f64,
    pub order_type: OrderType,
    pub signal_id: Option<String>,
}

impl OrderIntent {
    pub fn market(symbol: impl Into<String>, side: Side, amount: f64) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            amount,
            order_type: OrderType::Market,
            signal_id: None,
        }
    }

    pub fn with_signal_id(mut self, signal_id: impl Into<String>) -> Self {
        self.signal_id = Some(signal_id.into());
        self
    }

    pub fn with_limit_price(mut self, price: f64) -> Self {
        self.order_type = OrderType::Limit { price };
        self
    }

    fn idempotency_key(&self) -> Option<&str> {
        self.signal_id.as_deref().filter(|id| !id.trim().is_empty())
    }
}

/// Places at most one order per signal id
///
/// Every outcome for a keyed intent is cached, failures included: a timed-out
/// submission has unknown exchange state, so replaying the same signal must not
/// produce a second order.
pub struct ExecutionDispatcher<X> {
    client: X,
    trading_enabled: bool,
    submit_timeout: Duration,
    cache: DedupeCache<OrderOutcome>,
}

impl<X: ExecutionClient> ExecutionDispatcher<X> {
    pub fn new(
        client: X,
        trading_enabled: bool,
        submit_timeout: Duration,
        cache: DedupeCache<OrderOutcome>,
    ) -> Self {
        Self {
            client,
            trading_enabled,
            submit_timeout,
            cache,
        }
    }

    pub fn cached_signals(&self) -> usize {
        self.cache.len()
    }

    pub async fn dispatch(&self, intent: OrderIntent) -> OrderOutcome {
        let Some(key) = intent.idempotency_key() else {
            return self.dispatch_once(&intent).await;
        };

        let (cell, fresh) = self.cache.slot(key);
        if !fresh {
            tracing::info!(signal_id = %key, "Duplicate signal, returning cached outcome");
        }

        let outcome = cell.get_or_init(|| self.dispatch_once(&intent)).await;
        outcome.clone()
    }

    async fn dispatch_once(&self, intent: &OrderIntent) -> OrderOutcome {
        if !is_routable(&intent.symbol) {
            return OrderOutcome::rejected(
                "malformed_payload",
                format!("symbol {:?} is not routable", intent.symbol),
            );
        }

        if !(intent.amount.is_finite() && intent.amount > 0.0) {
            return OrderOutcome::rejected(
                "position_size_zero",
                format!("amount {} is not positive", intent.amount),
            );
        }

        if let OrderType::Limit { price } = intent.order_type {
            if !(price.is_finite() && price > 0.0) {
                return OrderOutcome::rejected(
                    "malformed_payload",
                    format!("invalid limit price {}", price),
                );
            }
        }

        let order = OrderRequest {
            symbol: intent.symbol.clone(),
            side: intent.side,
            amount: intent.amount,
            order_type: intent.order_type,
            client_order_id: client_order_id(intent.idempotency_key()),
        };

        if !self.trading_enabled {
            tracing::info!(
                symbol = %order.symbol,
                side = %order.side,
                amount = order.amount,
                client_order_id = %order.client_order_id,
                "Trading disabled, simulating order"
            );
            return OrderOutcome {
                status: OutcomeStatus::Simulated,
                reason: None,
                detail: format!("dry run: {} {} {}", order.side, order.amount, order.symbol),
                order: Some(order),
                exchange_order_id: None,
            };
        }

        let result = tokio::time::timeout(self.submit_timeout, self.client.submit_order(&order))
            .await
            .unwrap_or_else(|_| {
                Err(PipelineError::ExecutionTimeout(
                    self.submit_timeout.as_millis() as u64,
                ))
            });

        match result {
            Ok(receipt) => {
                tracing::info!(
                    symbol = %order.symbol,
                    side = %order.side,
                    amount = order.amount,
                    order_id = %receipt.order_id,
                    "Order placed"
                );
                OrderOutcome {
                    status: OutcomeStatus::Placed,
                    reason: None,
                    detail: format!("order {} {}", receipt.order_id, receipt.status),
                    order: Some(order),
                    exchange_order_id: Some(receipt.order_id),
                }
            }
            Err(e) => {
                if matches!(e, PipelineError::ExecutionTimeout(_)) {
                    tracing::warn!(
                        client_order_id = %order.client_order_id,
                        "Order submission timed out, state unknown"
                    );
                } else {
                    tracing::error!(
                        client_order_id = %order.client_order_id,
                        error = %e,
                        "Order submission failed"
                    );
                }
                OrderOutcome {
                    status: OutcomeStatus::Error,
                    reason: Some(e.code().to_string()),
                    detail: e.to_string(),
                    order: Some(order),
                    exchange_order_id: None,
                }
            }
        }
    }
}

/// Exchange-safe id derived from the signal id, random when there is none
///
/// Ids that are already short and exchange-safe pass through unchanged;
/// anything else is hashed, so distinct signal ids never share a key.
fn client_order_id(signal_id: Option<&str>) -> String {
    let Some(id) = signal_id else {
        return Uuid::new_v4().to_string();
    };

    let safe = id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

    if safe && id.len() <= MAX_CLIENT_ORDER_ID_LEN {
        id.to_string()
    } else {
        Uuid::new_v5(&Uuid::NAMESPACE_OID, id.as_bytes()).to_string()
    }
}

use anyhow::Context;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::error::PipelineError;
use crate::models::{OrderReceipt, OrderRequest, OrderType, Side};

/// Order placement collaborator
///
/// Implementations must treat `client_order_id` as the exchange-side
/// idempotency key and must not retry on their own.
pub trait ExecutionClient: Send + Sync {
    fn submit_order(
        &self,
        order: &OrderRequest,
    ) -> impl Future<Output = Result<OrderReceipt, PipelineError>> + Send;
}

impl<T: ExecutionClient> ExecutionClient for Arc<T> {
    fn submit_order(
        &self,
        order: &OrderRequest,
    ) -> impl Future<Output = Result<OrderReceipt, PipelineError>> + Send {
        (**self).submit_order(order)
    }
}

/// JSON order gateway client
///
/// `POST {base_url}/orders` with an `X-API-KEY` header.
#[derive(Clone)]
pub struct RestExecutionClient {
    client: Client,
    base_url: String,
    api_key: String,
    timeout: Duration,
}

#[derive(Debug, Serialize)]
struct OrderBody<'a> {
    symbol: &'a str,
    side: Side,
    amount: f64,
    #[serde(flatten)]
    order_type: OrderType,
    client_order_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct OrderResponse {
    order_id: String,
    #[serde(default = "default_status")]
    status: String,
}

fn default_status() -> String {
    "accepted".to_string()
}

impl RestExecutionClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            timeout,
        })
    }

    fn transport_error(&self, e: reqwest::Error) -> PipelineError {
        if e.is_timeout() {
            PipelineError::ExecutionTimeout(self.timeout.as_millis() as u64)
        } else {
            PipelineError::ExecutionRejected(format!("transport error: {}", e))
        }
    }
}

impl ExecutionClient for RestExecutionClient {
    async fn submit_order(&self, order: &OrderRequest) -> Result<OrderReceipt, PipelineError> {
        let url = format!("{}/orders", self.base_url);
        let body = OrderBody {
            symbol: &order.symbol,
            side: order.side,
            amount: order.amount,
            order_type: order.order_type,
            client_order_id: &order.client_order_id,
        };

        tracing::debug!(url = %url, client_order_id = %order.client_order_id, "Submitting order");

        let response = self
            .client
            .post(&url)
            .header("X-API-KEY", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            return Err(PipelineError::ExecutionRejected(format!(
                "gateway returned {}: {}",
                status, text
            )));
        }

        let parsed: OrderResponse = serde_json::from_str(&text).map_err(|e| {
            PipelineError::ExecutionRejected(format!("unreadable gateway response: {}", e))
        })?;

        Ok(OrderReceipt {
            order_id: parsed.order_id,
            status: parsed.status,
        })
    }
}

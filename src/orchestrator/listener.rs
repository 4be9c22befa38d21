use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::{mpsc, watch, Semaphore};
use tokio::task::{JoinError, JoinSet};

use super::pipeline::{Pipeline, PipelineReport};
use crate::api::MarketData;
use crate::execution::ExecutionClient;
use crate::risk::AccountSource;

/// Handle newline-delimited payloads from `input` until it ends or
/// `shutdown` flips to true
///
/// Each non-blank line runs in its own task, at most `max_in_flight` at a
/// time, and its report is sent on `reports` in completion order. Finished
/// tasks are reaped as the loop goes, and payloads already accepted are
/// drained before returning. Returns the number of payloads handled.
pub async fn run_listener<R, M, X, A>(
    pipeline: Arc<Pipeline<M, X, A>>,
    input: R,
    max_in_flight: usize,
    reports: mpsc::UnboundedSender<PipelineReport>,
    mut shutdown: watch::Receiver<bool>,
) -> std::io::Result<usize>
where
    R: AsyncBufRead + Unpin,
    M: MarketData + 'static,
    X: ExecutionClient + 'static,
    A: AccountSource + 'static,
{
    let permits = Arc::new(Semaphore::new(max_in_flight.max(1)));
    let mut lines = input.lines();
    let mut tasks = JoinSet::new();
    let mut accepted = 0;

    loop {
        if *shutdown.borrow() {
            tracing::info!("⚠️  Shutdown requested, draining in-flight signals...");
            break;
        }

        let line = tokio::select! {
            biased;
            changed = shutdown.changed() => {
                if changed.is_err() {
                    tracing::warn!("Shutdown channel closed");
                    break;
                }
                continue;
            }
            Some(result) = tasks.join_next(), if !tasks.is_empty() => {
                log_task_result(result);
                continue;
            }
            line = lines.next_line() => line?,
        };

        let Some(line) = line else {
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        let Ok(permit) = permits.clone().acquire_owned().await else {
            break;
        };

        accepted += 1;
        let pipeline = pipeline.clone();
        let reports = reports.clone();
        tasks.spawn(async move {
            let report = pipeline.handle_raw(&line).await;
            drop(permit);
            if reports.send(report).is_err() {
                tracing::warn!("Report receiver dropped");
            }
        });
    }

    while let Some(result) = tasks.join_next().await {
        log_task_result(result);
    }

    tracing::info!(accepted, "Listener stopped");
    Ok(accepted)
}

fn log_task_result(result: Result<(), JoinError>) {
    if let Err(e) = result {
        tracing::error!("Signal task failed: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use crate::execution::{DedupeCache, ExecutionDispatcher};
    use crate::indicators::IndicatorEngine;
    use crate::models::{CandleSeries, OrderReceipt, OrderRequest, OutcomeStatus};
    use crate::risk::{AccountSnapshot, RiskConfig, RiskGate, StaticAccount};
    use crate::strategy::SupertrendRsiEvaluator;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct SlowFeed {
        calls: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl MarketData for SlowFeed {
        async fn fetch_candles(
            &self,
            _symbol: &str,
            _timeframe: &str,
            _limit: usize,
        ) -> Result<CandleSeries, PipelineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            tokio::time::sleep(Duration::from_millis(10)).await;

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Err(PipelineError::DataUnavailable("offline".into()))
        }
    }

    struct NoopClient;

    impl ExecutionClient for NoopClient {
        async fn submit_order(&self, _order: &OrderRequest) -> Result<OrderReceipt, PipelineError> {
            Err(PipelineError::ExecutionRejected("unused".into()))
        }
    }

    fn pipeline(feed: Arc<SlowFeed>) -> Arc<Pipeline<Arc<SlowFeed>, NoopClient, StaticAccount>> {
        Arc::new(Pipeline::new(
            IndicatorEngine::default(),
            SupertrendRsiEvaluator::default(),
            RiskGate::from_config(&RiskConfig::default(), 0.05),
            ExecutionDispatcher::new(
                NoopClient,
                false,
                Duration::from_secs(1),
                DedupeCache::new(8, Duration::from_secs(60)),
            ),
            feed,
            StaticAccount(AccountSnapshot::new(10_000.0, 10_000.0)),
        ))
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<PipelineReport>) -> Vec<PipelineReport> {
        let mut reports = Vec::new();
        while let Ok(report) = rx.try_recv() {
            reports.push(report);
        }
        reports
    }

    #[tokio::test]
    async fn test_every_line_gets_one_report() {
        let feed = Arc::new(SlowFeed::default());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let input = "{\"ticker\": \"BTCUSDT\"}\n\nnot json\n{\"action\": \"buy\"}\n";

        let accepted = run_listener(pipeline(feed.clone()), input.as_bytes(), 4, tx, shutdown_rx)
            .await
            .unwrap();

        let reports = drain(&mut rx);
        assert_eq!(accepted, 3);
        assert_eq!(reports.len(), 3);
        assert_eq!(feed.calls.load(Ordering::SeqCst), 1);

        let malformed = reports
            .iter()
            .filter(|r| r.reason.as_deref() == Some("malformed_payload"))
            .count();
        assert_eq!(malformed, 2);
        assert!(reports
            .iter()
            .any(|r| r.status == OutcomeStatus::Error && r.symbol.as_deref() == Some("BTC/USDT")));
    }

    #[tokio::test]
    async fn test_in_flight_payloads_are_bounded() {
        let feed = Arc::new(SlowFeed::default());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let input: String = (0..40)
            .map(|i| format!("{{\"ticker\": \"BTCUSDT\", \"signalId\": \"sig-{}\"}}\n", i))
            .collect();

        let accepted = run_listener(pipeline(feed.clone()), input.as_bytes(), 3, tx, shutdown_rx)
            .await
            .unwrap();

        assert_eq!(accepted, 40);
        assert_eq!(drain(&mut rx).len(), 40);
        assert_eq!(feed.calls.load(Ordering::SeqCst), 40);
        let peak = feed.max_in_flight.load(Ordering::SeqCst);
        assert!(peak <= 3, "{} payloads ran at once", peak);
    }

    #[tokio::test]
    async fn test_already_shut_down() {
        let feed = Arc::new(SlowFeed::default());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (_shutdown_tx, shutdown_rx) = watch::channel(true);

        let accepted = run_listener(
            pipeline(feed.clone()),
            "{\"ticker\": \"BTCUSDT\"}\n".as_bytes(),
            4,
            tx,
            shutdown_rx,
        )
        .await
        .unwrap();

        assert_eq!(accepted, 0);
        assert!(drain(&mut rx).is_empty());
        assert_eq!(feed.calls.load(Ordering::SeqCst), 0);
    }
}

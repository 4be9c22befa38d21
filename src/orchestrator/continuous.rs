use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use super::pipeline::Pipeline;
use crate::api::MarketData;
use crate::execution::ExecutionClient;
use crate::risk::AccountSource;

/// Poll `symbol` every `period` until `shutdown` flips to true
///
/// Cycles never overlap: the next tick is only awaited after the previous
/// cycle, dispatch included, has returned. Shutdown is checked between
/// cycles, so an in-flight order submission always completes. Returns the
/// number of cycles run.
pub async fn run_continuous<M, X, A>(
    pipeline: &Pipeline<M, X, A>,
    symbol: &str,
    timeframe: &str,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> usize
where
    M: MarketData,
    X: ExecutionClient,
    A: AccountSource,
{
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!(
        symbol = %symbol,
        timeframe = %timeframe,
        period_secs = period.as_secs_f64(),
        "Continuous mode started"
    );

    let mut cycles = 0;
    loop {
        if *shutdown.borrow() {
            break;
        }

        tokio::select! {
            biased;
            changed = shutdown.changed() => {
                if changed.is_err() {
                    tracing::warn!("Shutdown channel closed");
                    break;
                }
                continue;
            }
            _ = ticker.tick() => {}
        }

        let report = pipeline.run_cycle(symbol, timeframe).await;
        cycles += 1;

        tracing::debug!(cycle = cycles, status = %report.status, "Cycle complete");
    }

    tracing::info!(cycles, "Continuous mode stopped");
    cycles
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use crate::execution::{DedupeCache, ExecutionDispatcher};
    use crate::indicators::IndicatorEngine;
    use crate::models::{CandleSeries, OrderReceipt, OrderRequest};
    use crate::risk::{AccountSnapshot, RiskConfig, RiskGate, StaticAccount};
    use crate::strategy::SupertrendRsiEvaluator;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

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

            tokio::time::sleep(Duration::from_millis(15)).await;

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

    fn pipeline(feed: Arc<SlowFeed>) -> Pipeline<Arc<SlowFeed>, NoopClient, StaticAccount> {
        Pipeline::new(
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
        )
    }

    #[tokio::test]
    async fn test_stops_on_shutdown_without_overlap() {
        let feed = Arc::new(SlowFeed::default());
        let pipeline = Arc::new(pipeline(feed.clone()));
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn({
            let pipeline = pipeline.clone();
            async move {
                run_continuous(&pipeline, "BTC/USDT", "5m", Duration::from_millis(5), rx).await
            }
        });

        tokio::time::sleep(Duration::from_millis(100)).await;
        tx.send(true).unwrap();
        let cycles = handle.await.unwrap();

        assert!(cycles >= 2, "only {} cycles ran", cycles);
        assert_eq!(cycles, feed.calls.load(Ordering::SeqCst));
        assert_eq!(feed.max_in_flight.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_already_shut_down() {
        let feed = Arc::new(SlowFeed::default());
        let pipeline = pipeline(feed.clone());
        let (_tx, rx) = watch::channel(true);

        let cycles = run_continuous(&pipeline, "BTC/USDT", "5m", Duration::from_millis(5), rx).await;

        assert_eq!(cycles, 0);
        assert_eq!(feed.calls.load(Ordering::SeqCst), 0);
    }
}

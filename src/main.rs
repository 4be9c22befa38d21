use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::BufReader;
use tokio::sync::{mpsc, watch};
use tracing_subscriber::EnvFilter;
use trendbot::api::{BinanceClient, MarketFeed, SyntheticFeed};
use trendbot::config::Settings;
use trendbot::execution::{DedupeCache, ExecutionDispatcher, RestExecutionClient};
use trendbot::indicators::IndicatorEngine;
use trendbot::api::timeframe_millis;
use trendbot::orchestrator::{run_continuous, run_listener, Pipeline, PipelineReport};
use trendbot::risk::{AccountSnapshot, RiskGate, StaticAccount};
use trendbot::strategy::{is_routable, SupertrendRsiEvaluator, SymbolNormalizer};
use trendbot::Result;

type LivePipeline = Pipeline<MarketFeed, RestExecutionClient, StaticAccount>;

#[derive(Parser)]
#[command(name = "trendbot", version, about = "Supertrend + RSI breakout signal pipeline")]
struct Cli {
    /// Settings file (defaults to ./trendbot.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Use the seeded random-walk feed instead of the exchange
    #[arg(long, global = true)]
    synthetic: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Poll one symbol on a fixed interval until Ctrl+C
    Run {
        #[arg(long)]
        symbol: Option<String>,
        #[arg(long)]
        timeframe: Option<String>,
    },
    /// Process a single JSON signal payload and print the report
    Signal { payload: String },
    /// Process newline-delimited JSON payloads from stdin concurrently
    Listen,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    setup_logging();

    let cli = Cli::parse();
    let mut settings = Settings::load(cli.config.as_deref())?;
    if cli.synthetic {
        settings.market_data.synthetic = true;
    }

    log_configuration(&settings);
    let pipeline = Arc::new(build_pipeline(&settings)?);

    match cli.command {
        Command::Run { symbol, timeframe } => {
            let normalizer = SymbolNormalizer::new(&settings.quote_assets);
            let symbol = normalizer.normalize(symbol.as_deref().unwrap_or(&settings.symbol));
            if !is_routable(&symbol) {
                return Err(format!("cannot trade symbol '{}'", symbol).into());
            }
            let timeframe = timeframe.unwrap_or_else(|| settings.timeframe.clone());
            if timeframe_millis(&timeframe).is_none() {
                return Err(format!("unsupported timeframe '{}'", timeframe).into());
            }
            let period = Duration::from_secs(settings.poll_interval_secs);

            run(&pipeline, &symbol, &timeframe, period).await;
        }
        Command::Signal { payload } => {
            let report = pipeline.handle_raw(&payload).await;
            println!("{}", serde_json::to_string(&report)?);
        }
        Command::Listen => listen(pipeline, settings.listen_concurrency).await?,
    }

    tracing::info!("👋 trendbot stopped");
    Ok(())
}

fn setup_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("trendbot=info"));

    // stdout carries reports
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn log_configuration(settings: &Settings) {
    tracing::info!("📊 Configuration:");
    tracing::info!("  Trading enabled: {}", settings.trading_enabled);
    tracing::info!("  Max position: {}%", settings.max_position_pct * 100.0);
    tracing::info!(
        "  Indicators: ATR {} x{}, RSI {} / MA {}",
        settings.indicators.atr_period,
        settings.indicators.atr_multiplier,
        settings.indicators.rsi_period,
        settings.indicators.rsi_ma_period
    );
    tracing::info!("  Fee safety margin: {}x", settings.risk.fee_safety_margin);
    tracing::info!(
        "  Market data: {}",
        if settings.market_data.synthetic {
            "synthetic"
        } else {
            settings.market_data.base_url.as_str()
        }
    );
}

fn build_pipeline(settings: &Settings) -> Result<LivePipeline> {
    let market_cfg = &settings.market_data;
    let market = if market_cfg.synthetic {
        MarketFeed::Synthetic(SyntheticFeed::new(
            market_cfg.synthetic_seed,
            market_cfg.synthetic_start_price,
        ))
    } else {
        MarketFeed::Binance(BinanceClient::new(
            market_cfg.base_url.as_str(),
            Duration::from_secs(market_cfg.timeout_secs),
            market_cfg.requests_per_minute,
        )?)
    };

    let exec_cfg = &settings.execution;
    let submit_timeout = Duration::from_secs(exec_cfg.timeout_secs);
    let client = RestExecutionClient::new(
        exec_cfg.base_url.as_str(),
        exec_cfg.api_key.as_str(),
        submit_timeout,
    )?;
    let dispatcher = ExecutionDispatcher::new(
        client,
        settings.trading_enabled,
        submit_timeout,
        DedupeCache::new(
            exec_cfg.dedupe_capacity,
            Duration::from_secs(exec_cfg.dedupe_ttl_secs),
        ),
    );

    let account = StaticAccount(AccountSnapshot::new(
        settings.account.equity,
        settings.account.available_balance,
    ));

    let pipeline = Pipeline::new(
        IndicatorEngine::new(settings.indicators),
        SupertrendRsiEvaluator::default(),
        RiskGate::from_config(&settings.risk, settings.max_position_pct),
        dispatcher,
        market,
        account,
    )
    .with_normalizer(SymbolNormalizer::new(&settings.quote_assets))
    .with_fetch_limit(settings.fetch_limit)
    // leaves room for the client's own retries
    .with_fetch_timeout(Duration::from_secs(market_cfg.timeout_secs * 2));

    Ok(pipeline)
}

async fn run(pipeline: &LivePipeline, symbol: &str, timeframe: &str, period: Duration) {
    let shutdown = shutdown_on_ctrl_c("finishing current cycle");

    tracing::info!("🔄 Polling {} {} every {:?}", symbol, timeframe, period);
    let cycles = run_continuous(pipeline, symbol, timeframe, period, shutdown).await;
    tracing::info!("Ran {} cycles", cycles);
}

async fn listen(pipeline: Arc<LivePipeline>, max_in_flight: usize) -> Result<()> {
    let shutdown = shutdown_on_ctrl_c("draining in-flight signals");
    let (reports_tx, mut reports_rx) = mpsc::unbounded_channel::<PipelineReport>();

    // stdout carries one JSON report per line
    let printer = tokio::spawn(async move {
        while let Some(report) = reports_rx.recv().await {
            match serde_json::to_string(&report) {
                Ok(json) => println!("{}", json),
                Err(e) => tracing::error!("Failed to serialize report: {}", e),
            }
        }
    });

    tracing::info!("👂 Reading signal payloads from stdin ({} at a time)", max_in_flight);
    let input = BufReader::new(tokio::io::stdin());
    let handled = run_listener(pipeline, input, max_in_flight, reports_tx, shutdown).await?;

    printer.await?;
    tracing::info!("Handled {} payloads", handled);
    Ok(())
}

fn shutdown_on_ctrl_c(action: &'static str) -> watch::Receiver<bool> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("⚠️  Received Ctrl+C, {}...", action);
            let _ = shutdown_tx.send(true);
        }
    });

    shutdown_rx
}

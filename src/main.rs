use anyhow::{anyhow, Context};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use tradebot::config::{AppConfig, SinkKind};
use tradebot::db::PostgresTradeStore;
use tradebot::execution::{ExecutionSink, PaperSink};
use tradebot::feed::{BinanceKlineConfig, BinanceKlineFeed, Feed, FeedKind, ReplayFeed, SyntheticFeed};
use tradebot::runner::{spawn_runner, Shutdown, StreamRunner};
use tradebot::strategy::StrategyKind;

#[derive(Parser, Debug)]
#[command(name = "tradebot", about = "Streaming EMA/RSI signal engine")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Stream observations through the strategy until the feed ends or Ctrl+C
    Run(RunArgs),
    /// Validate configuration and print the effective settings
    Check(RunArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Symbol to trade (repeatable)
    #[arg(short, long = "symbol")]
    symbols: Vec<String>,

    /// Strategy: ema_rsi or threshold
    #[arg(long)]
    strategy: Option<StrategyKind>,

    /// Feed: binance, synthetic or replay
    #[arg(long)]
    feed: Option<FeedKind>,

    /// JSON-lines file for the replay feed
    #[arg(long)]
    replay_file: Option<PathBuf>,

    /// Sink: paper or postgres
    #[arg(long)]
    sink: Option<SinkKind>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Command::Run(args) => run(args).await,
        Command::Check(args) => check(args),
    }
}

fn setup_logging(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn load_config(args: &RunArgs) -> anyhow::Result<AppConfig> {
    let mut config = AppConfig::load(args.config.as_deref()).context("failed to load configuration")?;

    if !args.symbols.is_empty() {
        config.symbols = args.symbols.clone();
        config.normalize_symbols();
    }
    if let Some(kind) = args.strategy {
        config.strategy.kind = kind;
    }
    if let Some(kind) = args.feed {
        config.feed.kind = kind;
    }
    if let Some(path) = &args.replay_file {
        config.feed.replay_file = Some(path.clone());
    }
    if let Some(sink) = args.sink {
        config.execution.sink = sink;
    }
    if config.database_url.is_none() {
        config.database_url = std::env::var("DATABASE_URL").ok();
    }

    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn check(args: RunArgs) -> anyhow::Result<()> {
    let config = load_config(&args)?;
    println!("{}", serde_json::to_string_pretty(&config)?);
    println!("configuration OK");
    Ok(())
}

async fn build_sink(config: &AppConfig) -> anyhow::Result<Arc<dyn ExecutionSink>> {
    let fee_rate = config.execution.fee_rate;

    Ok(match config.execution.sink {
        SinkKind::Paper => Arc::new(PaperSink::new(fee_rate)),
        SinkKind::Postgres => {
            let url = config
                .database_url
                .as_deref()
                .ok_or_else(|| anyhow!("postgres sink requires DATABASE_URL"))?;
            let store = PostgresTradeStore::new(url, fee_rate)
                .await
                .map_err(|e| anyhow!("failed to connect to Postgres: {}", e))?;
            Arc::new(store)
        }
    })
}

fn build_feed(config: &AppConfig, symbol: &str, index: usize) -> anyhow::Result<Box<dyn Feed>> {
    let feed = &config.feed;

    Ok(match feed.kind {
        FeedKind::Binance => {
            let binance = BinanceKlineConfig {
                interval: feed.interval.clone(),
                max_reconnects: feed.max_reconnects,
                ..Default::default()
            };
            Box::new(BinanceKlineFeed::connect(symbol, binance))
        }
        FeedKind::Synthetic => {
            let settings = &feed.synthetic;
            let mut synthetic = SyntheticFeed::new(
                symbol,
                settings.seed.wrapping_add(index as u64),
                settings.start_price,
                settings.volatility,
            );
            if let Some(count) = settings.count {
                synthetic = synthetic.take(count);
            }
            if let Some(pace_ms) = settings.pace_ms {
                synthetic = synthetic.paced(Duration::from_millis(pace_ms));
            }
            Box::new(synthetic)
        }
        FeedKind::Replay => {
            let path = feed
                .replay_file
                .as_deref()
                .ok_or_else(|| anyhow!("replay feed requires a replay file"))?;
            let replay = ReplayFeed::from_jsonl(path, Some(symbol))
                .with_context(|| format!("failed to load {}", path.display()))?;
            Box::new(replay)
        }
    })
}

async fn run(args: RunArgs) -> anyhow::Result<()> {
    let config = load_config(&args)?;
    setup_logging(&config.log_filter);

    tracing::info!("🚀 tradebot starting");
    tracing::info!("  Symbols: {}", config.symbols.join(", "));
    tracing::info!("  Strategy: {:?}", config.strategy.kind);
    tracing::info!("  Feed: {:?}", config.feed.kind);
    tracing::info!("  Sink: {:?}", config.execution.sink);

    let sink = build_sink(&config).await?;
    let shutdown = Shutdown::new();

    let mut handles = Vec::with_capacity(config.symbols.len());
    for (index, symbol) in config.symbols.iter().enumerate() {
        let strategy = config.strategy.build()?;
        let feed = build_feed(&config, symbol, index)?;
        let runner = StreamRunner::new(symbol.clone(), strategy, sink.clone());
        handles.push(spawn_runner(runner, feed, shutdown.clone()));
    }

    let ctrl_c = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("⚠️  Received Ctrl+C, shutting down...");
                shutdown.trigger();
            }
        })
    };

    for handle in handles {
        match handle.await {
            Ok(summary) => tracing::info!(
                symbol = %summary.symbol,
                observations = summary.observations,
                executed = summary.executed,
                failed = summary.failed_executions,
                position = ?summary.final_position,
                "Stream summary"
            ),
            Err(e) => tracing::error!("Runner task failed: {}", e),
        }
    }

    ctrl_c.abort();
    tracing::info!("👋 tradebot stopped");
    Ok(())
}

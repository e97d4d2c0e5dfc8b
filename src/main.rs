//! Polymarket edge trading engine entry point.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use time::{Duration, OffsetDateTime};
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use polymarket_edge::api::{create_router, AppState};
use polymarket_edge::clock::{Clock, ManualClock, SystemClock};
use polymarket_edge::config::Config;
use polymarket_edge::edge::{compute_edge, EdgeDetector};
use polymarket_edge::engine::Engine;
use polymarket_edge::error::ConfigError;
use polymarket_edge::estimator::{estimate, ModelConfig};
use polymarket_edge::market::{PriceFeed, PriceSample, Quote};
use polymarket_edge::metrics;
use polymarket_edge::replay::{self, MarketEvent};
use polymarket_edge::trading::PaperExecutor;
use polymarket_edge::utils::{format_duration, shutdown_signal};

/// Probability-edge trading engine for Polymarket crypto markets.
#[derive(Parser, Debug)]
#[command(name = "polymarket-edge")]
#[command(about = "Detects and trades probability edge on crypto prediction markets")]
#[command(version)]
struct Args {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the paper-trading engine with the HTTP API (default).
    Run {
        /// HTTP server port for the control API and metrics.
        #[arg(short, long)]
        port: Option<u16>,

        /// Replay recorded events from a JSON-lines file on a simulated clock.
        #[arg(long)]
        replay: Option<PathBuf>,

        /// Override the tick interval in milliseconds.
        #[arg(long)]
        tick_interval_ms: Option<u64>,
    },

    /// Check configuration validity.
    CheckConfig,

    /// Estimate probability and edge for one hypothetical market.
    Estimate {
        /// Market question, e.g. "Will BTC be above $103,000?".
        #[arg(long, required_unless_present = "slug")]
        question: Option<String>,

        /// Up/down slug, e.g. btc-updown-15m-1739106000.
        #[arg(long, conflicts_with = "question")]
        slug: Option<String>,

        /// Current price of the underlying asset.
        #[arg(long)]
        price: Decimal,

        /// Reference price for up/down markets.
        #[arg(long)]
        reference: Option<Decimal>,

        /// Minutes left in the period.
        #[arg(long, default_value = "3")]
        minutes_left: Decimal,

        /// Period length in minutes when no slug is given.
        #[arg(long, default_value = "15")]
        period_minutes: i64,

        /// Quoted YES price to measure edge against.
        #[arg(long)]
        yes: Option<Decimal>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Configuration drives logging, so load it first
    let loaded = Config::load();
    let (verbose, json, level) = match &loaded {
        Ok(c) => (args.verbose || c.verbose, c.log_json, c.rust_log.clone()),
        Err(_) => (args.verbose, false, "info".to_string()),
    };

    // Initialize logging
    let filter = if verbose {
        EnvFilter::new("polymarket_edge=debug,info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    };

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }

    match args.command {
        Some(Command::CheckConfig) => cmd_check_config(loaded),
        Some(Command::Estimate {
            question,
            slug,
            price,
            reference,
            minutes_left,
            period_minutes,
            yes,
        }) => cmd_estimate(
            loaded?,
            EstimateArgs {
                question,
                slug,
                price,
                reference,
                minutes_left,
                period_minutes,
                yes,
            },
        ),
        Some(Command::Run {
            port,
            replay,
            tick_interval_ms,
        }) => cmd_run(loaded, port, replay, tick_interval_ms).await,
        None => cmd_run(loaded, None, None, None).await,
    }
}

/// Check configuration validity.
fn cmd_check_config(loaded: Result<Config, ConfigError>) -> anyhow::Result<()> {
    println!("======================================================================");
    println!("POLYMARKET EDGE - CONFIGURATION CHECK");
    println!("======================================================================");

    print!("Loading configuration... ");
    let config = match loaded {
        Ok(c) => {
            println!("OK");
            c
        }
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow::anyhow!("Configuration load failed"));
        }
    };

    print!("Validating configuration... ");
    match config.validate() {
        Ok(()) => println!("OK"),
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow::anyhow!("Configuration validation failed"));
        }
    }

    println!("----------------------------------------------------------------------");
    println!("Configuration Summary:");
    println!("  Min Edge: {} pp", config.min_edge_percent);
    println!(
        "  Position Size: ${} (max ${}, min ${})",
        config.default_position_size, config.max_position_size, config.min_position_size
    );
    println!(
        "  Strong Setup: edge > {} pp and < {} min left, x{}",
        config.strong_setup_edge_percent,
        config.strong_setup_minutes,
        config.strong_setup_multiplier
    );
    println!("  Max Exposure: ${}", config.max_total_exposure);
    println!("  Max Positions: {}", config.max_concurrent_positions);
    println!("  Max Daily Loss: ${}", config.max_daily_loss);
    println!(
        "  Exits: profit {}%, stop {}%, time {} min, smart exit {}",
        config.profit_target_percent,
        config.stop_loss_percent,
        config.time_limit_minutes,
        if config.smart_exit_enabled { "on" } else { "off" }
    );
    println!("  Assets: {}", config.monitored_assets.join(", "));
    println!(
        "  Markets: price target {}, up/down {} (last {} min)",
        if config.monitor_price_target { "on" } else { "off" },
        if config.monitor_updown { "on" } else { "off" },
        config.updown_window_minutes
    );
    println!("  Tick Interval: {}ms", config.tick_interval_ms);
    println!("======================================================================");
    println!("CONFIGURATION CHECK PASSED");
    println!("======================================================================");

    Ok(())
}

struct EstimateArgs {
    question: Option<String>,
    slug: Option<String>,
    price: Decimal,
    reference: Option<Decimal>,
    minutes_left: Decimal,
    period_minutes: i64,
    yes: Option<Decimal>,
}

/// One-shot probability and edge diagnostic.
fn cmd_estimate(config: Config, args: EstimateArgs) -> anyhow::Result<()> {
    config.validate()?;

    let left_secs = (args.minutes_left * Decimal::from(60))
        .trunc()
        .to_i64()
        .ok_or_else(|| anyhow::anyhow!("minutes-left out of range"))?;
    let end = OffsetDateTime::now_utc();
    let start = args
        .period_minutes
        .checked_mul(60)
        .and_then(|secs| end.checked_sub(Duration::seconds(secs)))
        .ok_or_else(|| anyhow::anyhow!("period-minutes out of range"))?;
    let event = MarketEvent {
        id: Some("cli".to_string()),
        slug: args.slug,
        question: args.question,
        period_start: Some(start),
        period_end: Some(end),
        ..MarketEvent::default()
    };
    let mut market = event.into_market()?;
    if let Some(reference) = args.reference {
        market.capture_reference(reference);
    }
    let now = market
        .period_end
        .checked_sub(Duration::seconds(left_secs))
        .ok_or_else(|| anyhow::anyhow!("minutes-left out of range"))?;

    let mut feed = PriceFeed::new(1);
    feed.ingest(&PriceSample::new(market.asset.clone(), args.price, now));

    let model = ModelConfig::from_config(&config);
    let estimate = estimate(&market, &feed, now, &model)?;

    println!("======================================================================");
    println!("Market: {} {} ({})", market.asset, market.kind.label(), market.id);
    println!("Time remaining: {}", market.time_remaining_str(now));
    println!("Trading window: {}", format_duration(model.updown_window(market.period())));
    println!("Probability (YES): {}", estimate.probability.round_dp(4));
    println!("Confidence: {}", estimate.confidence);
    println!("Breakdown: {}", serde_json::to_string_pretty(&estimate.breakdown)?);

    if let Some(yes) = args.yes {
        let quote = Quote::from_yes(yes);
        let signal = compute_edge(estimate.probability, &quote);
        println!("----------------------------------------------------------------------");
        println!("Quoted YES: {}  NO: {}", quote.yes, quote.no);
        println!("Edge: {} pp -> {}", signal.edge_percent.round_dp(2), signal.direction);

        let detector = EdgeDetector::from_config(&config);
        match detector.check(&market, &estimate, &quote, now, config.max_total_exposure) {
            Some(opportunity) => {
                println!("ACTIONABLE: buy {} for ${}", opportunity.direction, opportunity.size);
                println!("Expected profit: ${}", opportunity.expected_profit().round_dp(2));
            }
            None => println!("Not actionable"),
        }
    }
    println!("======================================================================");

    Ok(())
}

/// Run the engine loop, or replay a recorded session, behind the HTTP API.
async fn cmd_run(
    loaded: Result<Config, ConfigError>,
    port_override: Option<u16>,
    replay_path: Option<PathBuf>,
    tick_override: Option<u64>,
) -> anyhow::Result<()> {
    info!("Loading configuration...");
    let mut config = loaded.map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    if let Some(port) = port_override {
        config.port = port;
    }
    if let Some(tick_interval_ms) = tick_override {
        config.tick_interval_ms = tick_interval_ms;
    }

    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        return Err(anyhow::anyhow!("Configuration validation failed: {}", e));
    }

    info!("Configuration loaded successfully");
    info!("Min edge: {} pp", config.min_edge_percent);
    info!("Position size: ${}", config.default_position_size);
    info!("Max exposure: ${}", config.max_total_exposure);
    info!("Assets: {}", config.monitored_assets.join(", "));

    let prometheus = metrics::install_prometheus()?;
    let config = Arc::new(config);

    // Replays run on a simulated clock starting at the first event
    let events = match &replay_path {
        Some(path) => Some(replay::load_events(path).await?),
        None => None,
    };
    let manual_clock = events
        .as_ref()
        .and_then(|events| events.first())
        .map(|first| Arc::new(ManualClock::new(first.at)));
    let clock: Arc<dyn Clock> = match &manual_clock {
        Some(manual) => manual.clone(),
        None => Arc::new(SystemClock),
    };

    let executor = Arc::new(PaperExecutor::new(clock.clone()));
    let engine = Engine::new(&config, executor, clock);
    let app_state = AppState::new(engine.clone(), config.clone()).with_prometheus(prometheus);

    // Start HTTP server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr).await?;
    info!("HTTP server listening on {}", addr);

    let router = create_router(app_state.clone());
    let server_handle = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
    });

    app_state.set_ready(true);

    match (events, manual_clock) {
        (Some(events), Some(manual)) => {
            info!(path = ?replay_path, events = events.len(), "Replaying recorded session");
            let interval = Duration::milliseconds(i64::try_from(config.tick_interval_ms)?);
            let summary = replay::replay(&engine, &manual, events, interval).await;
            println!("{}", serde_json::to_string_pretty(&summary)?);
            info!("Replay finished, serving API until shutdown");
            shutdown_signal().await;
        }
        _ => {
            info!("Starting engine...");
            engine
                .run(
                    std::time::Duration::from_millis(config.tick_interval_ms),
                    shutdown_signal(),
                )
                .await;
        }
    }

    app_state.set_ready(false);
    server_handle.await??;
    info!("Shutdown complete");
    Ok(())
}

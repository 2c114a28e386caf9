use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use apewisdom_client::ApeWisdomClient;
use reddit_client::RedditClient;
use signal_store::SqliteSignalStore;
use tokio::signal::unix::SignalKind;
use tokio::time::{self, MissedTickBehavior};
use yahoo_client::YahooClient;

mod config;
mod metrics;
mod pipeline;
mod report;

use config::PipelineConfig;
use metrics::PipelineMetrics;
use pipeline::{format_summary, Pipeline, RunReport};
use report::write_flags_to_path;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // 1. Load .env, init tracing
    dotenvy::dotenv().ok();

    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    }

    // Panic hook: log panic info before crashing
    std::panic::set_hook(Box::new(|info| {
        eprintln!("PANIC: {info}");
        tracing::error!("PANIC: {info}");
    }));

    tracing::info!("Starting Sentiment-to-Value pipeline");

    // 2. Load configuration; missing credentials stop us before any processing
    let config = PipelineConfig::from_env().context("Invalid configuration")?;
    tracing::info!("Configuration loaded and validated");
    tracing::info!("  Database: {}", config.database_url);
    tracing::info!("  Communities: {}", config.subreddits.join(", "));
    tracing::info!("  Lookback: {} hours", config.lookback_hours);
    tracing::info!(
        "  Engine gates: rank <= {}, velocity >= {}%, health >= {}, confidence >= {}",
        config.engine_max_rank,
        config.engine_min_velocity,
        config.engine_min_health,
        config.engine_min_confidence
    );
    tracing::info!(
        "  Health rules: market cap >= ${:.0}, debt/equity <= {}, margin >= {}%",
        config.health_min_market_cap,
        config.health_max_debt_to_equity,
        config.health_min_profit_margin
    );

    // 3. Database
    let store = SqliteSignalStore::connect(&config.database_url)
        .await
        .context("Failed to open database")?;
    store.db().ping().await.context("Startup check: database unreachable")?;
    tracing::info!("Startup check: database OK");
    let store = Arc::new(store);

    // 4. Signal and fundamentals sources
    let apewisdom = ApeWisdomClient::new().context("Failed to build ApeWisdom client")?;
    let reddit = RedditClient::new(config.reddit_config()).context("Failed to build Reddit client")?;
    let yahoo = YahooClient::new().context("Failed to build Yahoo client")?;

    let pipeline = Pipeline::new(&config, store, apewisdom, reddit, yahoo);
    let mut metrics = PipelineMetrics::new();

    let Some(interval_secs) = config.run_interval_seconds else {
        let report = pipeline.run(&mut metrics).await;
        finish_run(&config, &report);
        metrics.log_metrics();
        return Ok(if report.succeeded() {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        });
    };

    tracing::info!("Running every {}s. Press Ctrl+C to stop.", interval_secs);

    // Repeat sequentially with graceful shutdown (SIGINT + SIGTERM)
    let mut interval = time::interval(Duration::from_secs(interval_secs));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut sigterm = tokio::signal::unix::signal(SignalKind::terminate())?;
    let shutdown = async {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received SIGINT");
            }
            _ = sigterm.recv() => {
                tracing::info!("Received SIGTERM");
            }
        }
    };
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let report = pipeline.run(&mut metrics).await;
                finish_run(&config, &report);
                metrics.log_metrics();
            }
            _ = &mut shutdown => {
                tracing::info!("Shutdown signal received, exiting gracefully...");
                metrics.log_metrics();
                break;
            }
        }
    }

    tracing::info!("Sentiment pipeline shut down.");
    Ok(ExitCode::SUCCESS)
}

/// Print the operator summary and write the CSV report when configured.
fn finish_run(config: &PipelineConfig, report: &RunReport) {
    println!("{}", format_summary(report));

    let (Some(path), Some(engine)) = (&config.report_path, &report.engine) else {
        return;
    };
    if let Err(e) = write_flags_to_path(path, &engine.flags) {
        tracing::error!("Failed to write flag report: {:#}", e);
    }
}

use apewisdom_client::ApeWisdomClient;
use chrono::{DateTime, Utc};
use decision_engine::{EngineRunSummary, TradingEngine};
use discovery::{DiscoveryEngine, DiscoverySummary};
use fundamental_validator::{FundamentalValidator, ValidationSummary};
use reddit_client::RedditClient;
use serde::Serialize;
use signal_core::TokioSleeper;
use signal_store::SqliteSignalStore;
use std::fmt::Write;
use std::sync::Arc;
use yahoo_client::YahooClient;

use crate::config::PipelineConfig;
use crate::metrics::PipelineMetrics;

type Discovery = DiscoveryEngine<ApeWisdomClient, RedditClient, SqliteSignalStore>;
type Validator = FundamentalValidator<YahooClient, SqliteSignalStore, TokioSleeper>;
type Engine = TradingEngine<SqliteSignalStore>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Failed,
}

/// Everything one pipeline run produced, phase by phase
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub status: RunStatus,
    pub discovery: Option<DiscoverySummary>,
    pub validation: Option<ValidationSummary>,
    pub engine: Option<EngineRunSummary>,
    pub errors: Vec<String>,
    pub duration_seconds: f64,
}

impl RunReport {
    fn started(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            status: RunStatus::Failed,
            discovery: None,
            validation: None,
            engine: None,
            errors: Vec::new(),
            duration_seconds: 0.0,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.status == RunStatus::Success
    }
}

pub struct Pipeline {
    discovery: Discovery,
    validator: Validator,
    engine: Engine,
}

impl Pipeline {
    pub fn new(
        config: &PipelineConfig,
        store: Arc<SqliteSignalStore>,
        apewisdom: ApeWisdomClient,
        reddit: RedditClient,
        yahoo: YahooClient,
    ) -> Self {
        Self {
            discovery: DiscoveryEngine::new(
                Arc::new(apewisdom),
                Arc::new(reddit),
                store.clone(),
                config.discovery_config(),
            ),
            validator: FundamentalValidator::new(
                Arc::new(yahoo),
                store.clone(),
                Arc::new(TokioSleeper),
                config.validation_config(),
            ),
            engine: TradingEngine::new(store, config.engine_config()),
        }
    }

    /// Discovery, then validation, then the engine. A phase error stops the run.
    pub async fn run(&self, metrics: &mut PipelineMetrics) -> RunReport {
        let run_start = PipelineMetrics::start_timer();
        let mut report = RunReport::started(Utc::now());
        tracing::info!("Pipeline started at {}", report.started_at.to_rfc3339());

        tracing::info!("Phase 1: discovery, finding trending tickers");
        let phase = PipelineMetrics::start_timer();
        let discovery = self.discovery.run().await;
        metrics.record_discovery_duration(phase);
        metrics.record_discovery(&discovery);
        tracing::info!(
            "Discovery complete: {} ApeWisdom tickers, {} Reddit mentions tracked",
            discovery.apewisdom_count,
            discovery.reddit_tracked_count
        );
        report.discovery = Some(discovery);

        tracing::info!("Phase 2: validation, checking fundamental health");
        let phase = PipelineMetrics::start_timer();
        let outcomes = match self.validator.validate_recent().await {
            Ok(outcomes) => outcomes,
            Err(e) => return self.fail(report, metrics, run_start, "validation", e),
        };
        metrics.record_validation_duration(phase);
        let validation = ValidationSummary::from_outcomes(&outcomes);
        metrics.record_validation(&validation);
        tracing::info!(
            "Validation complete: {}/{} tickers passed health checks",
            validation.passed,
            validation.total_validated
        );
        report.validation = Some(validation);

        tracing::info!("Phase 3: engine, generating trading flags");
        let phase = PipelineMetrics::start_timer();
        let engine = match self.engine.run().await {
            Ok(summary) => summary,
            Err(e) => return self.fail(report, metrics, run_start, "engine", e),
        };
        metrics.record_engine_duration(phase);
        metrics.record_engine(&engine);
        tracing::info!("Engine complete: {} new trading flags created", engine.created);
        report.engine = Some(engine);

        report.status = RunStatus::Success;
        metrics.finish_run(run_start, true);
        report.duration_seconds = metrics.last_total_duration_ms as f64 / 1000.0;
        tracing::info!("Pipeline completed in {:.2} seconds", report.duration_seconds);
        report
    }

    fn fail(
        &self,
        mut report: RunReport,
        metrics: &mut PipelineMetrics,
        run_start: std::time::Instant,
        phase: &str,
        error: signal_core::SignalError,
    ) -> RunReport {
        tracing::error!("Pipeline failed during {}: {}", phase, error);
        report.status = RunStatus::Failed;
        report.errors.push(format!("{}: {}", phase, error));
        metrics.finish_run(run_start, false);
        report.duration_seconds = metrics.last_total_duration_ms as f64 / 1000.0;
        report
    }
}

/// Operator-facing summary of one run
pub fn format_summary(report: &RunReport) -> String {
    let rule = "=".repeat(80);
    let mut out = String::new();

    let _ = writeln!(out, "\n{}\nPIPELINE SUMMARY\n{}", rule, rule);
    match report.status {
        RunStatus::Success => {
            let _ = writeln!(out, "Status: SUCCESS");
        }
        RunStatus::Failed => {
            let _ = writeln!(out, "Status: FAILED");
            if !report.errors.is_empty() {
                let _ = writeln!(out, "  Errors: {}", report.errors.join(", "));
            }
        }
    }
    let _ = writeln!(out, "\nDuration: {:.2} seconds", report.duration_seconds);

    if let Some(disc) = &report.discovery {
        let _ = writeln!(out, "\n--- DISCOVERY ---");
        let _ = writeln!(out, "ApeWisdom Tickers: {}", disc.apewisdom_count);
        let _ = writeln!(out, "Reddit Mentions Tracked: {}", disc.reddit_tracked_count);
        if !disc.top_trending.is_empty() {
            let _ = writeln!(out, "\nTop 5 Trending:");
            for ticker in disc.top_trending.iter().take(5) {
                let _ = writeln!(
                    out,
                    "  {}. ${} - {} mentions",
                    ticker.rank, ticker.symbol, ticker.mention_count
                );
            }
        }
    }

    if let Some(val) = &report.validation {
        let _ = writeln!(out, "\n--- VALIDATION ---");
        let _ = writeln!(out, "Total Validated: {}", val.total_validated);
        let _ = writeln!(out, "Passed: {}", val.passed);
        let _ = writeln!(out, "Failed: {}", val.failed);
    }

    if let Some(eng) = &report.engine {
        let _ = writeln!(out, "\n--- ENGINE ---");
        let _ = writeln!(out, "Tickers Evaluated: {}", eng.evaluated);
        let _ = writeln!(out, "Tickers Flagged: {}", eng.flagged);
        let _ = writeln!(out, "New Flags Created: {}", eng.created);
        if eng.skipped_open > 0 {
            let _ = writeln!(out, "Already Open: {}", eng.skipped_open);
        }
        if !eng.flags.is_empty() {
            let _ = writeln!(out, "\nTrading Flags:");
            for candidate in &eng.flags {
                let meta = &candidate.flag.metadata;
                let rank = meta
                    .apewisdom_rank
                    .map(|r| r.to_string())
                    .unwrap_or_else(|| "N/A".to_string());
                let _ = writeln!(
                    out,
                    "  * {} (ticker {}): {:.1}% confidence",
                    candidate.symbol, candidate.flag.ticker_id, candidate.flag.confidence_score
                );
                let _ = writeln!(
                    out,
                    "    (ApeWisdom #{}, Reddit velocity: {:+.1}%)",
                    rank, meta.reddit_velocity_pct
                );
            }
        }
    }

    let _ = writeln!(out, "\n{}", rule);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use decision_engine::FlagCandidate;
    use signal_core::{FlagMetadata, FlagStatus, FlagType, TradingFlag, TrendingTicker};
    use std::collections::BTreeMap;

    fn report() -> RunReport {
        RunReport {
            started_at: Utc::now(),
            status: RunStatus::Success,
            discovery: Some(DiscoverySummary {
                run_id: "run-1".to_string(),
                apewisdom_count: 2,
                reddit_tracked_count: 1,
                top_trending: vec![TrendingTicker {
                    rank: 1,
                    symbol: "GME".to_string(),
                    mention_count: 1532,
                    upvotes: 900,
                }],
                highest_velocity: Vec::new(),
            }),
            validation: Some(ValidationSummary {
                total_validated: 2,
                passed: 1,
                failed: 1,
            }),
            engine: Some(EngineRunSummary {
                evaluated: 2,
                flagged: 1,
                created: 1,
                flags: vec![FlagCandidate {
                    symbol: "GME".to_string(),
                    flag: TradingFlag {
                        id: None,
                        ticker_id: 1,
                        flag_type: FlagType::Buy,
                        entry_price: Some(23.5),
                        confidence_score: 95.0,
                        status: FlagStatus::Open,
                        rationale: String::new(),
                        metadata: FlagMetadata {
                            apewisdom_rank: Some(1),
                            apewisdom_mentions: 1532,
                            reddit_mentions_24h: 150,
                            reddit_velocity_pct: 50.0,
                            health_score: 80.0,
                            market_cap: Some(7.2e9),
                            scoring_breakdown: BTreeMap::new(),
                        },
                        created_at: None,
                    },
                }],
                ..Default::default()
            }),
            errors: Vec::new(),
            duration_seconds: 12.5,
        }
    }

    #[test]
    fn test_summary_lists_every_phase() {
        let text = format_summary(&report());
        assert!(text.contains("Status: SUCCESS"));
        assert!(text.contains("Duration: 12.50 seconds"));
        assert!(text.contains("ApeWisdom Tickers: 2"));
        assert!(text.contains("  1. $GME - 1532 mentions"));
        assert!(text.contains("Passed: 1"));
        assert!(text.contains("New Flags Created: 1"));
        assert!(text.contains("GME (ticker 1): 95.0% confidence"));
        assert!(text.contains("(ApeWisdom #1, Reddit velocity: +50.0%)"));
        assert!(!text.contains("Already Open"));
    }

    #[test]
    fn test_failed_summary_shows_errors_and_skips_missing_phases() {
        let mut failed = report();
        failed.status = RunStatus::Failed;
        failed.errors = vec!["validation: Database error: locked".to_string()];
        failed.engine = None;

        let text = format_summary(&failed);
        assert!(text.contains("Status: FAILED"));
        assert!(text.contains("Errors: validation: Database error: locked"));
        assert!(text.contains("--- VALIDATION ---"));
        assert!(!text.contains("--- ENGINE ---"));
        assert!(!failed.succeeded());
    }
}

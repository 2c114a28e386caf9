use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use signal_core::{FlagStore, SignalReader, SignalResult, TickerSignal};
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::flags::create_flags;
use crate::gating::{evaluate, Evaluation, FlagCandidate, Rejection};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineRunSummary {
    pub evaluated: usize,
    pub flagged: usize,
    pub created: usize,
    pub skipped_open: usize,
    pub failed: usize,
    pub flags: Vec<FlagCandidate>,
    pub rejections: Vec<(String, Rejection)>,
}

/// Reads the latest persisted signals, gates them and writes BUY flags
pub struct TradingEngine<S> {
    store: Arc<S>,
    config: EngineConfig,
}

impl<S> TradingEngine<S>
where
    S: SignalReader + FlagStore,
{
    pub fn new(store: Arc<S>, config: EngineConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Latest signal per ticker inside the lookback window, sorted by symbol.
    ///
    /// Tickers with neither a trending rank nor recent mentions are dropped.
    pub async fn collect_signals(&self) -> SignalResult<Vec<TickerSignal>> {
        let hours_back = self.config.lookback_hours;
        tracing::info!("Retrieving data from the last {} hours...", hours_back);
        let cutoff = Utc::now() - Duration::hours(hours_back);

        let mut tickers = self.store.list_tickers().await?;
        tickers.sort_by(|a, b| a.symbol.cmp(&b.symbol));

        let mut signals = Vec::new();
        for ticker in &tickers {
            let reading = match self.store.latest_signal(ticker.id, cutoff).await {
                Ok(reading) => reading,
                Err(e) => {
                    tracing::warn!("Skipping {}: failed to read signals: {}", ticker.symbol, e);
                    continue;
                }
            };

            let health = match self.store.latest_health(ticker.id).await {
                Ok(health) => health,
                Err(e) => {
                    tracing::warn!("Skipping {}: failed to read health: {}", ticker.symbol, e);
                    continue;
                }
            };

            let signal = TickerSignal::new(ticker, reading, health);
            if signal.has_signal() {
                signals.push(signal);
            }
        }

        tracing::info!("Retrieved data for {} tickers", signals.len());
        Ok(signals)
    }

    pub async fn run(&self) -> SignalResult<EngineRunSummary> {
        tracing::info!("Starting trading engine");

        let signals = self.collect_signals().await?;
        if signals.is_empty() {
            tracing::warn!("No recent ticker data found");
            return Ok(EngineRunSummary::default());
        }

        let mut summary = EngineRunSummary {
            evaluated: signals.len(),
            ..Default::default()
        };

        for signal in &signals {
            match evaluate(signal, &self.config) {
                Evaluation::Candidate(candidate) => summary.flags.push(candidate),
                Evaluation::Rejected(rejection) => {
                    summary.rejections.push((signal.symbol.clone(), rejection))
                }
            }
        }
        summary.flagged = summary.flags.len();

        let creation = create_flags(self.store.as_ref(), &summary.flags).await;
        summary.created = creation.created;
        summary.skipped_open = creation.skipped_open;
        summary.failed = creation.failed;

        tracing::info!(
            evaluated = summary.evaluated,
            flagged = summary.flagged,
            created = summary.created,
            skipped_open = summary.skipped_open,
            failed = summary.failed,
            "Trading engine complete"
        );

        Ok(summary)
    }
}

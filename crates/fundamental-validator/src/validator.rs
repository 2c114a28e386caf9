use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use signal_core::{
    FundamentalSnapshot, Fundamentals, FundamentalsSource, HealthAssessment, Sleeper,
    SignalResult, ValidationStore,
};
use std::sync::Arc;

use crate::health::{check_health, HealthThresholds};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationConfig {
    pub lookback_hours: i64,
    pub max_tickers: usize,
    /// Pause before every ticker after the first
    pub pause_between: std::time::Duration,
    pub extended_pause_every: usize,
    pub extended_pause: std::time::Duration,
    pub thresholds: HealthThresholds,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            lookback_hours: 24,
            max_tickers: 50,
            pause_between: std::time::Duration::from_secs(4),
            extended_pause_every: 5,
            extended_pause: std::time::Duration::from_secs(15),
            thresholds: HealthThresholds::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub symbol: String,
    pub valid: bool,
    pub assessment: HealthAssessment,
    pub fundamentals: Option<Fundamentals>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationSummary {
    pub total_validated: usize,
    pub passed: usize,
    pub failed: usize,
}

impl ValidationSummary {
    pub fn from_outcomes(outcomes: &[ValidationOutcome]) -> Self {
        let passed = outcomes.iter().filter(|o| o.valid).count();
        Self {
            total_validated: outcomes.len(),
            passed,
            failed: outcomes.len() - passed,
        }
    }
}

pub struct FundamentalValidator<F, S, Z> {
    source: Arc<F>,
    store: Arc<S>,
    sleeper: Arc<Z>,
    config: ValidationConfig,
}

impl<F, S, Z> FundamentalValidator<F, S, Z>
where
    F: FundamentalsSource,
    S: ValidationStore,
    Z: Sleeper,
{
    pub fn new(source: Arc<F>, store: Arc<S>, sleeper: Arc<Z>, config: ValidationConfig) -> Self {
        Self {
            source,
            store,
            sleeper,
            config,
        }
    }

    /// Validate symbols in order, pacing requests to the fundamentals source.
    pub async fn validate_tickers(&self, symbols: &[String]) -> Vec<ValidationOutcome> {
        tracing::info!("Validating {} tickers...", symbols.len());
        let mut outcomes = Vec::with_capacity(symbols.len());

        for (idx, symbol) in symbols.iter().enumerate() {
            self.pace(idx, symbols.len()).await;
            outcomes.push(self.validate_one(symbol).await);
        }

        let summary = ValidationSummary::from_outcomes(&outcomes);
        tracing::info!(
            "Validation complete: {}/{} tickers passed",
            summary.passed,
            summary.total_validated
        );
        outcomes
    }

    /// Validate the most mentioned symbols inside the configured lookback window.
    pub async fn validate_recent(&self) -> SignalResult<Vec<ValidationOutcome>> {
        let cutoff = Utc::now() - Duration::hours(self.config.lookback_hours);
        let totals = self.store.recent_mention_totals(cutoff).await?;

        if totals.is_empty() {
            tracing::warn!("No recent tickers found in sentiment logs");
            return Ok(Vec::new());
        }

        let unique = totals.len();
        let symbols: Vec<String> = totals
            .into_iter()
            .take(self.config.max_tickers)
            .map(|(symbol, _)| symbol)
            .collect();
        tracing::info!(
            "Found {} unique tickers, validating top {} by mention count",
            unique,
            symbols.len()
        );

        Ok(self.validate_tickers(&symbols).await)
    }

    async fn pace(&self, idx: usize, total: usize) {
        if idx == 0 {
            return;
        }
        tracing::debug!("Rate limit pause ({}/{} completed)", idx, total);
        self.sleeper.sleep(self.config.pause_between).await;

        if self.config.extended_pause_every > 0 && idx % self.config.extended_pause_every == 0 {
            tracing::info!(
                "Extended rate limit pause: {}s ({}/{} completed)",
                self.config.extended_pause.as_secs(),
                idx,
                total
            );
            self.sleeper.sleep(self.config.extended_pause).await;
        }
    }

    async fn validate_one(&self, symbol: &str) -> ValidationOutcome {
        let fundamentals = match self.source.fetch_fundamentals(symbol).await {
            Ok(Some(f)) => f,
            Ok(None) => {
                tracing::warn!("No fundamentals available for {}", symbol);
                return Self::fetch_failed(symbol);
            }
            Err(e) => {
                tracing::error!("Failed to fetch fundamentals for {}: {}", symbol, e);
                return Self::fetch_failed(symbol);
            }
        };

        let assessment = check_health(&fundamentals, &self.config.thresholds);

        if let Err(e) = self.persist(&fundamentals, &assessment, Utc::now()).await {
            tracing::error!("Error saving fundamentals for {}: {}", symbol, e);
        }

        ValidationOutcome {
            symbol: symbol.to_string(),
            valid: assessment.is_healthy,
            assessment,
            fundamentals: Some(fundamentals),
        }
    }

    fn fetch_failed(symbol: &str) -> ValidationOutcome {
        ValidationOutcome {
            symbol: symbol.to_string(),
            valid: false,
            assessment: HealthAssessment::fetch_failed(),
            fundamentals: None,
        }
    }

    async fn persist(
        &self,
        fundamentals: &Fundamentals,
        assessment: &HealthAssessment,
        at: DateTime<Utc>,
    ) -> SignalResult<()> {
        let Some(ticker) = self.store.find_ticker(&fundamentals.symbol).await? else {
            tracing::error!("Ticker {} not found in database", fundamentals.symbol);
            return Ok(());
        };

        if fundamentals.company_name.is_some() || fundamentals.industry.is_some() {
            self.store
                .update_ticker_profile(
                    ticker.id,
                    fundamentals.company_name.as_deref(),
                    fundamentals.industry.as_deref(),
                )
                .await?;
        }

        self.store
            .upsert_fundamental_snapshot(&FundamentalSnapshot {
                ticker_id: ticker.id,
                fundamentals: fundamentals.clone(),
                assessment: assessment.clone(),
                timestamp: at,
            })
            .await?;

        tracing::debug!("Saved fundamentals for {}", fundamentals.symbol);
        Ok(())
    }
}

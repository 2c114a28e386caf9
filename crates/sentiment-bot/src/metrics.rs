use decision_engine::EngineRunSummary;
use discovery::DiscoverySummary;
use fundamental_validator::ValidationSummary;
use std::time::Instant;

/// Per-run telemetry for the pipeline: phase timings plus cumulative counts.
#[derive(Debug, Default)]
pub struct PipelineMetrics {
    pub runs_completed: u64,
    pub runs_failed: u64,
    pub tickers_discovered: u64,
    pub tickers_validated: u64,
    pub tickers_passed: u64,
    pub flags_created: u64,
    pub flags_skipped_open: u64,
    pub flag_failures: u64,

    // Last run timing
    pub last_discovery_duration_ms: u64,
    pub last_validation_duration_ms: u64,
    pub last_engine_duration_ms: u64,
    pub last_total_duration_ms: u64,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_timer() -> Instant {
        Instant::now()
    }

    pub fn record_discovery_duration(&mut self, start: Instant) {
        self.last_discovery_duration_ms = start.elapsed().as_millis() as u64;
    }

    pub fn record_validation_duration(&mut self, start: Instant) {
        self.last_validation_duration_ms = start.elapsed().as_millis() as u64;
    }

    pub fn record_engine_duration(&mut self, start: Instant) {
        self.last_engine_duration_ms = start.elapsed().as_millis() as u64;
    }

    pub fn record_discovery(&mut self, summary: &DiscoverySummary) {
        self.tickers_discovered += summary.apewisdom_count as u64;
    }

    pub fn record_validation(&mut self, summary: &ValidationSummary) {
        self.tickers_validated += summary.total_validated as u64;
        self.tickers_passed += summary.passed as u64;
    }

    pub fn record_engine(&mut self, summary: &EngineRunSummary) {
        self.flags_created += summary.created as u64;
        self.flags_skipped_open += summary.skipped_open as u64;
        self.flag_failures += summary.failed as u64;
    }

    pub fn finish_run(&mut self, run_start: Instant, succeeded: bool) {
        self.last_total_duration_ms = run_start.elapsed().as_millis() as u64;
        if succeeded {
            self.runs_completed += 1;
        } else {
            self.runs_failed += 1;
        }
    }

    /// Share of validated tickers that passed the health check (0-100%)
    pub fn validation_pass_rate(&self) -> f64 {
        if self.tickers_validated == 0 {
            return 0.0;
        }
        (self.tickers_passed as f64 / self.tickers_validated as f64) * 100.0
    }

    pub fn log_metrics(&self) {
        tracing::info!(
            runs_completed = self.runs_completed,
            runs_failed = self.runs_failed,
            tickers_discovered = self.tickers_discovered,
            tickers_validated = self.tickers_validated,
            validation_pass_rate = format!("{:.1}%", self.validation_pass_rate()),
            flags_created = self.flags_created,
            flags_skipped_open = self.flags_skipped_open,
            flag_failures = self.flag_failures,
            last_run_ms = self.last_total_duration_ms,
            last_discovery_ms = self.last_discovery_duration_ms,
            last_validation_ms = self.last_validation_duration_ms,
            last_engine_ms = self.last_engine_duration_ms,
            "Pipeline metrics summary"
        );
    }
}

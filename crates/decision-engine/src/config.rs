use serde::{Deserialize, Serialize};

/// Gate thresholds for the decision engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Worst trending rank still eligible (inclusive)
    pub max_rank: u32,
    pub min_velocity_pct: f64,
    pub min_health_score: f64,
    pub min_confidence: f64,
    pub lookback_hours: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_rank: 20,
            min_velocity_pct: 20.0,
            min_health_score: 60.0,
            min_confidence: 70.0,
            lookback_hours: 24,
        }
    }
}

impl EngineConfig {
    pub fn with_max_rank(mut self, max_rank: u32) -> Self {
        self.max_rank = max_rank;
        self
    }

    pub fn with_min_velocity(mut self, min_velocity_pct: f64) -> Self {
        self.min_velocity_pct = min_velocity_pct;
        self
    }

    pub fn with_min_health(mut self, min_health_score: f64) -> Self {
        self.min_health_score = min_health_score;
        self
    }

    pub fn with_min_confidence(mut self, min_confidence: f64) -> Self {
        self.min_confidence = min_confidence;
        self
    }

    pub fn with_lookback_hours(mut self, lookback_hours: i64) -> Self {
        self.lookback_hours = lookback_hours;
        self
    }
}

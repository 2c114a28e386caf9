//! Confidence scoring.
//!
//! Four additive factors, each computed independently from a [`TickerSignal`]:
//!
//! | factor              | max | shape                                      |
//! |---------------------|-----|--------------------------------------------|
//! | `apewisdom_rank`    | 30  | step on rank, omitted when not trending    |
//! | `reddit_velocity`   | 30  | step above 20%, linear (can go negative) below |
//! | `fundamental_health`| 25  | linear on health score                     |
//! | `mention_volume`    | 15  | step on total mentions, floor of 5         |

use serde::{Deserialize, Serialize};
use signal_core::TickerSignal;
use std::collections::BTreeMap;

pub const RANK_FACTOR: &str = "apewisdom_rank";
pub const VELOCITY_FACTOR: &str = "reddit_velocity";
pub const HEALTH_FACTOR: &str = "fundamental_health";
pub const VOLUME_FACTOR: &str = "mention_volume";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceScore {
    /// Rounded to 2 decimals, 0 to 100
    pub score: f64,
    pub breakdown: BTreeMap<String, f64>,
}

pub fn rank_factor(rank: u32) -> f64 {
    match rank {
        0..=5 => 30.0,
        6..=10 => 25.0,
        11..=20 => 20.0,
        _ => 10.0,
    }
}

/// Below 20% the contribution tapers linearly and goes negative for falling velocity.
pub fn velocity_factor(velocity_pct: f64) -> f64 {
    if velocity_pct >= 100.0 {
        30.0
    } else if velocity_pct >= 50.0 {
        25.0
    } else if velocity_pct >= 20.0 {
        20.0
    } else {
        10.0 * (velocity_pct / 20.0)
    }
}

pub fn health_factor(health_score: f64) -> f64 {
    (health_score / 100.0) * 25.0
}

pub fn volume_factor(total_mentions: u64) -> f64 {
    match total_mentions {
        1000.. => 15.0,
        500..=999 => 12.0,
        100..=499 => 10.0,
        _ => 5.0,
    }
}

pub fn calculate_confidence(signal: &TickerSignal) -> ConfidenceScore {
    let mut breakdown = BTreeMap::new();

    if let Some(rank) = signal.apewisdom_rank {
        breakdown.insert(RANK_FACTOR.to_string(), rank_factor(rank));
    }
    breakdown.insert(
        VELOCITY_FACTOR.to_string(),
        velocity_factor(signal.reddit_velocity_pct),
    );
    breakdown.insert(HEALTH_FACTOR.to_string(), health_factor(signal.health_score));
    breakdown.insert(
        VOLUME_FACTOR.to_string(),
        volume_factor(signal.total_mentions()),
    );

    let total: f64 = breakdown.values().sum();
    // A steep velocity decline can push the raw sum below zero
    let score = round2(total.clamp(0.0, 100.0));

    ConfidenceScore { score, breakdown }
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

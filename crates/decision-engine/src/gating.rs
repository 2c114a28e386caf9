//! Per-ticker gate evaluation.
//!
//! Gates run in a fixed order and the first failure wins:
//! rank, velocity, health, then confidence. Confidence is only scored once the
//! first three gates pass.

use serde::{Deserialize, Serialize};
use signal_core::{FlagMetadata, FlagStatus, FlagType, TickerSignal, TradingFlag};
use std::fmt;

use crate::config::EngineConfig;
use crate::scoring::calculate_confidence;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Rejection {
    /// Not trending, or trending below the rank cutoff
    RankGate { rank: Option<u32> },
    VelocityGate { velocity: f64 },
    HealthGate { health: f64 },
    ConfidenceGate { confidence: f64 },
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::RankGate { rank: Some(rank) } => write!(f, "rank #{} outside cutoff", rank),
            Rejection::RankGate { rank: None } => write!(f, "not trending"),
            Rejection::VelocityGate { velocity } => write!(f, "velocity {:+.1}% below threshold", velocity),
            Rejection::HealthGate { health } => write!(f, "health score {:.1} below minimum", health),
            Rejection::ConfidenceGate { confidence } => {
                write!(f, "confidence {:.1} below minimum", confidence)
            }
        }
    }
}

/// A flag that passed every gate, not yet persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlagCandidate {
    pub symbol: String,
    pub flag: TradingFlag,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Evaluation {
    Rejected(Rejection),
    Candidate(FlagCandidate),
}

impl Evaluation {
    pub fn is_candidate(&self) -> bool {
        matches!(self, Evaluation::Candidate(_))
    }
}

pub fn evaluate(signal: &TickerSignal, config: &EngineConfig) -> Evaluation {
    let rank = match signal.apewisdom_rank {
        Some(rank) if rank <= config.max_rank => rank,
        other => {
            tracing::debug!("{}: not in top {} (rank: {:?})", signal.symbol, config.max_rank, other);
            return Evaluation::Rejected(Rejection::RankGate { rank: other });
        }
    };

    if signal.reddit_velocity_pct < config.min_velocity_pct {
        tracing::debug!(
            "{}: velocity {:.1}% below threshold {}%",
            signal.symbol,
            signal.reddit_velocity_pct,
            config.min_velocity_pct
        );
        return Evaluation::Rejected(Rejection::VelocityGate {
            velocity: signal.reddit_velocity_pct,
        });
    }

    if signal.health_score < config.min_health_score {
        tracing::debug!(
            "{}: health score {:.1} below minimum {}",
            signal.symbol,
            signal.health_score,
            config.min_health_score
        );
        return Evaluation::Rejected(Rejection::HealthGate {
            health: signal.health_score,
        });
    }

    let confidence = calculate_confidence(signal);
    tracing::debug!(
        "{}: confidence {:.1}/100 {:?}",
        signal.symbol,
        confidence.score,
        confidence.breakdown
    );

    if confidence.score < config.min_confidence {
        tracing::info!(
            "{}: confidence {:.1} below minimum {}",
            signal.symbol,
            confidence.score,
            config.min_confidence
        );
        return Evaluation::Rejected(Rejection::ConfidenceGate {
            confidence: confidence.score,
        });
    }

    let flag = TradingFlag {
        id: None,
        ticker_id: signal.ticker_id,
        flag_type: FlagType::Buy,
        entry_price: signal.current_price,
        confidence_score: confidence.score,
        status: FlagStatus::Open,
        rationale: build_rationale(signal),
        metadata: FlagMetadata {
            apewisdom_rank: Some(rank),
            apewisdom_mentions: signal.apewisdom_mentions,
            reddit_mentions_24h: signal.reddit_mentions_24h,
            reddit_velocity_pct: signal.reddit_velocity_pct,
            health_score: signal.health_score,
            market_cap: signal.market_cap,
            scoring_breakdown: confidence.breakdown,
        },
        created_at: None,
    };

    tracing::info!(
        "{} flagged for trading (confidence: {:.1}/100)",
        signal.symbol,
        flag.confidence_score
    );

    Evaluation::Candidate(FlagCandidate {
        symbol: signal.symbol.clone(),
        flag,
    })
}

pub fn build_rationale(signal: &TickerSignal) -> String {
    let rank = signal
        .apewisdom_rank
        .map(|r| r.to_string())
        .unwrap_or_else(|| "n/a".to_string());

    format!(
        "ApeWisdom Rank #{} with {} mentions. Reddit velocity: {:+.1}% ({} mentions in 24h). Fundamental health score: {:.1}/100.",
        rank,
        signal.apewisdom_mentions,
        signal.reddit_velocity_pct,
        signal.reddit_mentions_24h,
        signal.health_score
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signal() -> TickerSignal {
        TickerSignal {
            ticker_id: 9,
            symbol: "AMC".to_string(),
            apewisdom_rank: Some(8),
            apewisdom_mentions: 640,
            reddit_mentions_24h: 85,
            reddit_velocity_pct: 62.5,
            health_score: 70.0,
            current_price: Some(4.12),
            market_cap: Some(1.3e9),
        }
    }

    #[test]
    fn test_rationale_format() {
        assert_eq!(
            build_rationale(&signal()),
            "ApeWisdom Rank #8 with 640 mentions. Reddit velocity: +62.5% (85 mentions in 24h). Fundamental health score: 70.0/100."
        );
    }

    #[test]
    fn test_rationale_negative_velocity_keeps_sign() {
        let mut s = signal();
        s.reddit_velocity_pct = -12.34;
        assert!(build_rationale(&s).contains("Reddit velocity: -12.3%"));
    }

    #[test]
    fn test_rank_cutoff_is_inclusive() {
        let config = EngineConfig::default();
        let mut s = signal();

        s.apewisdom_rank = Some(20);
        assert!(evaluate(&s, &config).is_candidate());

        s.apewisdom_rank = Some(21);
        assert_eq!(
            evaluate(&s, &config),
            Evaluation::Rejected(Rejection::RankGate { rank: Some(21) })
        );
    }

    #[test]
    fn test_velocity_threshold_is_inclusive() {
        let config = EngineConfig::default();
        let mut s = signal();
        s.reddit_velocity_pct = 20.0;
        s.health_score = 100.0;
        // 25 + 20 + 25 + 12 = 82
        assert!(evaluate(&s, &config).is_candidate());

        s.reddit_velocity_pct = 19.99;
        assert!(matches!(
            evaluate(&s, &config),
            Evaluation::Rejected(Rejection::VelocityGate { .. })
        ));
    }

    #[test]
    fn test_health_gate_uses_raw_score() {
        let config = EngineConfig::default();
        let mut s = signal();
        s.health_score = 59.9;
        assert_eq!(
            evaluate(&s, &config),
            Evaluation::Rejected(Rejection::HealthGate { health: 59.9 })
        );
    }

    #[test]
    fn test_confidence_gate() {
        // 25 + 25 + 15 + 5 = 70 passes at the default, fails when raised
        let mut s = signal();
        s.health_score = 60.0;
        s.apewisdom_mentions = 10;
        s.reddit_mentions_24h = 10;

        assert!(evaluate(&s, &EngineConfig::default()).is_candidate());

        let strict = EngineConfig::default().with_min_confidence(75.0);
        assert_eq!(
            evaluate(&s, &strict),
            Evaluation::Rejected(Rejection::ConfidenceGate { confidence: 70.0 })
        );
    }

    #[test]
    fn test_candidate_carries_metadata() {
        let Evaluation::Candidate(candidate) = evaluate(&signal(), &EngineConfig::default()) else {
            panic!("expected a candidate");
        };

        assert_eq!(candidate.symbol, "AMC");
        let flag = candidate.flag;
        assert_eq!(flag.ticker_id, 9);
        assert_eq!(flag.flag_type, FlagType::Buy);
        assert_eq!(flag.status, FlagStatus::Open);
        assert_eq!(flag.entry_price, Some(4.12));
        // 25 + 25 + 17.5 + 12
        assert_eq!(flag.confidence_score, 79.5);
        assert_eq!(flag.metadata.apewisdom_rank, Some(8));
        assert_eq!(flag.metadata.market_cap, Some(1.3e9));
        assert_eq!(flag.metadata.scoring_breakdown.len(), 4);
        assert!(flag.id.is_none());
    }

    #[test]
    fn test_thresholds_are_configurable() {
        let mut s = signal();
        s.apewisdom_rank = Some(35);
        s.health_score = 100.0;
        assert!(!evaluate(&s, &EngineConfig::default()).is_candidate());

        // 10 + 25 + 25 + 12
        let loose = EngineConfig::default().with_max_rank(50);
        assert!(evaluate(&s, &loose).is_candidate());
    }
}

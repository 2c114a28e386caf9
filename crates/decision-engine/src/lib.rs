//! Turns persisted social and fundamental signals into scored, gated BUY flags.

pub mod config;
pub mod engine;
pub mod flags;
pub mod gating;
pub mod scoring;

pub use config::EngineConfig;
pub use engine::{EngineRunSummary, TradingEngine};
pub use flags::{create_flags, FlagCreation};
pub use gating::{build_rationale, evaluate, Evaluation, FlagCandidate, Rejection};
pub use scoring::{calculate_confidence, ConfidenceScore};

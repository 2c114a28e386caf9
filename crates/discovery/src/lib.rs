//! Stage 1: trending tickers and community mention velocity.

pub mod engine;
pub mod velocity;

pub use engine::{DiscoveryConfig, DiscoveryEngine, DiscoverySummary, VelocityRecord};
pub use velocity::{prior_window, velocity_change_pct};

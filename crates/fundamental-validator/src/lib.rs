//! Stage 2: fundamental health checks for recently discussed tickers.

pub mod health;
pub mod validator;

pub use health::{check_health, HealthThresholds};
pub use validator::{FundamentalValidator, ValidationConfig, ValidationOutcome, ValidationSummary};

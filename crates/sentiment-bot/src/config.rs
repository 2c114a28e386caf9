use anyhow::{ensure, Context, Result};
use decision_engine::EngineConfig;
use discovery::DiscoveryConfig;
use fundamental_validator::{HealthThresholds, ValidationConfig};
use reddit_client::RedditConfig;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_SUBREDDITS: &str = "wallstreetbets,stocks,investing,RobinHoodPennyStocks";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    // Database
    pub database_url: String,

    // Reddit API
    pub reddit_client_id: String,
    pub reddit_client_secret: String,
    pub reddit_user_agent: String,
    pub subreddits: Vec<String>,

    // Discovery
    pub lookback_hours: i64,           // 24
    pub apewisdom_top_n: usize,        // 50
    pub reddit_track_top_n: usize,     // 20

    // Validation
    pub validation_max_tickers: usize, // 50
    pub health_min_market_cap: f64,    // $500M
    pub health_max_debt_to_equity: f64, // 2.0
    pub health_min_profit_margin: f64, // -50%

    // Engine gates
    pub engine_max_rank: u32,          // 20
    pub engine_min_velocity: f64,      // 20%
    pub engine_min_health: f64,        // 60
    pub engine_min_confidence: f64,    // 70

    // Output and scheduling
    pub report_path: Option<PathBuf>,
    pub run_interval_seconds: Option<u64>,
}

impl PipelineConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the config from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let subreddits: Vec<String> = lookup("REDDIT_SUBREDDITS")
            .unwrap_or_else(|| DEFAULT_SUBREDDITS.to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let config = Self {
            database_url: lookup("DATABASE_URL")
                .unwrap_or_else(|| "sqlite:sentiment_bot.db".to_string()),
            reddit_client_id: required(&lookup, "REDDIT_CLIENT_ID")?,
            reddit_client_secret: required(&lookup, "REDDIT_CLIENT_SECRET")?,
            reddit_user_agent: lookup("REDDIT_USER_AGENT")
                .unwrap_or_else(|| "sentiment_bot_v2.0".to_string()),
            subreddits,
            lookback_hours: parse_or(&lookup, "LOOKBACK_HOURS", "24")?,
            apewisdom_top_n: parse_or(&lookup, "APEWISDOM_TOP_N", "50")?,
            reddit_track_top_n: parse_or(&lookup, "REDDIT_TRACK_TOP_N", "20")?,
            validation_max_tickers: parse_or(&lookup, "VALIDATION_MAX_TICKERS", "50")?,
            health_min_market_cap: parse_or(&lookup, "HEALTH_MIN_MARKET_CAP", "500000000")?,
            health_max_debt_to_equity: parse_or(&lookup, "HEALTH_MAX_DEBT_TO_EQUITY", "2.0")?,
            health_min_profit_margin: parse_or(&lookup, "HEALTH_MIN_PROFIT_MARGIN", "-50.0")?,
            engine_max_rank: parse_or(&lookup, "ENGINE_MAX_RANK", "20")?,
            engine_min_velocity: parse_or(&lookup, "ENGINE_MIN_VELOCITY", "20.0")?,
            engine_min_health: parse_or(&lookup, "ENGINE_MIN_HEALTH", "60.0")?,
            engine_min_confidence: parse_or(&lookup, "ENGINE_MIN_CONFIDENCE", "70.0")?,
            report_path: lookup("REPORT_PATH")
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
            run_interval_seconds: match lookup("RUN_INTERVAL_SECONDS") {
                Some(v) if !v.trim().is_empty() => Some(
                    v.trim()
                        .parse()
                        .context("RUN_INTERVAL_SECONDS must be a whole number of seconds")?,
                ),
                _ => None,
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        ensure!(self.lookback_hours > 0, "LOOKBACK_HOURS must be positive");
        ensure!(!self.subreddits.is_empty(), "REDDIT_SUBREDDITS must name at least one community");
        ensure!(
            (0.0..=100.0).contains(&self.engine_min_confidence),
            "ENGINE_MIN_CONFIDENCE must be between 0 and 100"
        );
        ensure!(
            self.run_interval_seconds != Some(0),
            "RUN_INTERVAL_SECONDS must be greater than zero"
        );
        Ok(())
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig::default()
            .with_max_rank(self.engine_max_rank)
            .with_min_velocity(self.engine_min_velocity)
            .with_min_health(self.engine_min_health)
            .with_min_confidence(self.engine_min_confidence)
            .with_lookback_hours(self.lookback_hours)
    }

    pub fn discovery_config(&self) -> DiscoveryConfig {
        DiscoveryConfig {
            apewisdom_top_n: self.apewisdom_top_n,
            reddit_track_top_n: self.reddit_track_top_n,
            lookback_hours: self.lookback_hours,
        }
    }

    pub fn validation_config(&self) -> ValidationConfig {
        ValidationConfig {
            lookback_hours: self.lookback_hours,
            max_tickers: self.validation_max_tickers,
            thresholds: HealthThresholds {
                min_market_cap: self.health_min_market_cap,
                max_debt_to_equity: self.health_max_debt_to_equity,
                min_profit_margin: self.health_min_profit_margin,
                ..HealthThresholds::default()
            },
            ..ValidationConfig::default()
        }
    }

    pub fn reddit_config(&self) -> RedditConfig {
        RedditConfig {
            client_id: self.reddit_client_id.clone(),
            client_secret: self.reddit_client_secret.clone(),
            user_agent: self.reddit_user_agent.clone(),
            subreddits: self.subreddits.clone(),
            community_pause: Duration::from_secs(2),
        }
    }
}

fn required<F>(lookup: &F, key: &str) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .filter(|v| !v.trim().is_empty())
        .with_context(|| format!("{} not set", key))
}

fn parse_or<T, F>(lookup: &F, key: &str, default: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key).unwrap_or_else(|| default.to_string());
    raw.trim()
        .parse()
        .with_context(|| format!("{} has an invalid value '{}'", key, raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<PipelineConfig> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        PipelineConfig::from_lookup(|key| map.get(key).cloned())
    }

    fn credentials() -> Vec<(&'static str, &'static str)> {
        vec![("REDDIT_CLIENT_ID", "id"), ("REDDIT_CLIENT_SECRET", "secret")]
    }

    #[test]
    fn test_defaults() {
        let config = load(&credentials()).unwrap();
        assert_eq!(config.database_url, "sqlite:sentiment_bot.db");
        assert_eq!(config.reddit_user_agent, "sentiment_bot_v2.0");
        assert_eq!(
            config.subreddits,
            vec!["wallstreetbets", "stocks", "investing", "RobinHoodPennyStocks"]
        );
        assert_eq!(config.lookback_hours, 24);
        assert_eq!(config.apewisdom_top_n, 50);
        assert_eq!(config.reddit_track_top_n, 20);
        assert!(config.report_path.is_none());
        assert!(config.run_interval_seconds.is_none());

        let engine = config.engine_config();
        assert_eq!(engine, EngineConfig::default());

        let validation = config.validation_config();
        assert_eq!(validation.thresholds, HealthThresholds::default());
        assert_eq!(validation.max_tickers, 50);
    }

    #[test]
    fn test_missing_credentials_are_fatal() {
        let err = load(&[("REDDIT_CLIENT_ID", "id")]).unwrap_err();
        assert!(err.to_string().contains("REDDIT_CLIENT_SECRET"));

        let err = load(&[("REDDIT_CLIENT_ID", ""), ("REDDIT_CLIENT_SECRET", "s")]).unwrap_err();
        assert!(err.to_string().contains("REDDIT_CLIENT_ID"));
    }

    #[test]
    fn test_overrides_flow_into_stage_configs() {
        let mut vars = credentials();
        vars.extend([
            ("REDDIT_SUBREDDITS", " pennystocks , stocks ,"),
            ("LOOKBACK_HOURS", "12"),
            ("ENGINE_MAX_RANK", "10"),
            ("ENGINE_MIN_CONFIDENCE", "80"),
            ("HEALTH_MIN_MARKET_CAP", "1000000000"),
            ("VALIDATION_MAX_TICKERS", "5"),
            ("REPORT_PATH", "/tmp/flags.csv"),
            ("RUN_INTERVAL_SECONDS", "3600"),
        ]);
        let config = load(&vars).unwrap();

        assert_eq!(config.subreddits, vec!["pennystocks", "stocks"]);
        assert_eq!(config.reddit_config().subreddits.len(), 2);
        assert_eq!(config.engine_config().max_rank, 10);
        assert_eq!(config.engine_config().min_confidence, 80.0);
        assert_eq!(config.engine_config().lookback_hours, 12);
        assert_eq!(config.discovery_config().lookback_hours, 12);
        assert_eq!(config.validation_config().lookback_hours, 12);
        assert_eq!(config.validation_config().thresholds.min_market_cap, 1.0e9);
        assert_eq!(config.validation_config().max_tickers, 5);
        assert_eq!(config.report_path, Some(PathBuf::from("/tmp/flags.csv")));
        assert_eq!(config.run_interval_seconds, Some(3600));
    }

    #[test]
    fn test_malformed_numbers_are_fatal() {
        let mut vars = credentials();
        vars.push(("ENGINE_MIN_VELOCITY", "fast"));
        let err = load(&vars).unwrap_err();
        assert!(err.to_string().contains("ENGINE_MIN_VELOCITY"));

        let mut vars = credentials();
        vars.push(("RUN_INTERVAL_SECONDS", "-5"));
        assert!(load(&vars).is_err());

        let mut vars = credentials();
        vars.push(("LOOKBACK_HOURS", "0"));
        assert!(load(&vars).is_err());
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::SignalError;

/// A tracked ticker symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerRecord {
    pub id: i64,
    pub symbol: String,
    pub company_name: Option<String>,
    pub industry: Option<String>,
}

/// One row of the trending leaderboard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendingTicker {
    /// 1-based, smaller is stronger
    pub rank: u32,
    pub symbol: String,
    pub mention_count: u64,
    pub upvotes: u64,
}

/// A community post that mentioned a ticker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedditPost {
    pub title: String,
    pub url: String,
    pub score: i64,
    pub subreddit: String,
    pub created: DateTime<Utc>,
}

/// Mention tally for one symbol over the current lookback window
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MentionCount {
    pub symbol: String,
    pub count_now: u64,
    /// Count for the preceding window of equal length, when the source can see it.
    /// `None` means the caller must fall back to stored history.
    pub count_prev: Option<u64>,
    pub by_community: BTreeMap<String, u64>,
    pub total_upvotes: i64,
    pub top_posts: Vec<RedditPost>,
}

/// Point-in-time fundamentals for a ticker.
///
/// Percent fields are percentages (5.0 means 5%). `debt_to_equity` is a plain ratio.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Fundamentals {
    pub symbol: String,
    pub company_name: Option<String>,
    pub industry: Option<String>,
    pub market_cap: Option<f64>,
    pub debt_to_equity: Option<f64>,
    pub profit_margin: Option<f64>,
    pub revenue_growth: Option<f64>,
    pub current_price: Option<f64>,
    pub short_float_pct: Option<f64>,
    pub pe_ratio: Option<f64>,
    pub beta: Option<f64>,
    pub fifty_two_week_high: Option<f64>,
    pub fifty_two_week_low: Option<f64>,
    pub volume: Option<u64>,
    pub avg_volume: Option<u64>,
    #[serde(default)]
    pub raw_data: serde_json::Value,
}

/// Result of the fundamental health rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthAssessment {
    pub is_healthy: bool,
    pub reasons: Vec<String>,
    /// 0 to 100
    pub health_score: f64,
}

impl HealthAssessment {
    pub fn fetch_failed() -> Self {
        Self {
            is_healthy: false,
            reasons: vec!["Failed to fetch data".to_string()],
            health_score: 0.0,
        }
    }
}

/// Where a sentiment log row came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SentimentSource {
    ApeWisdom,
    Reddit,
}

impl SentimentSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            SentimentSource::ApeWisdom => "APEWISDOM",
            SentimentSource::Reddit => "REDDIT",
        }
    }
}

impl FromStr for SentimentSource {
    type Err = SignalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "APEWISDOM" => Ok(SentimentSource::ApeWisdom),
            "REDDIT" => Ok(SentimentSource::Reddit),
            other => Err(SignalError::InvalidData(format!("unknown sentiment source '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentLogEntry {
    pub ticker_id: i64,
    pub source: SentimentSource,
    pub mention_count: u64,
    pub upvotes: i64,
    pub rank: Option<u32>,
    pub timestamp: DateTime<Utc>,
}

/// Per-community mention count for one discovery run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VelocityLogEntry {
    pub ticker_id: i64,
    pub run_id: String,
    pub subreddit: String,
    pub mention_count_24h: u64,
    pub velocity_change_pct: f64,
    pub top_posts: Vec<RedditPost>,
    pub timestamp: DateTime<Utc>,
}

/// Persisted fundamentals plus the health verdict computed from them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundamentalSnapshot {
    pub ticker_id: i64,
    pub fundamentals: Fundamentals,
    pub assessment: HealthAssessment,
    pub timestamp: DateTime<Utc>,
}

/// Latest social signal values for a ticker
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalReading {
    pub apewisdom_rank: Option<u32>,
    pub apewisdom_mentions: u64,
    pub reddit_mentions_24h: u64,
    pub reddit_velocity_pct: f64,
}

/// Latest persisted health verdict for a ticker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReading {
    pub health_score: f64,
    pub is_healthy: bool,
    pub market_cap: Option<f64>,
    pub current_price: Option<f64>,
}

/// Everything the decision engine knows about one ticker in one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerSignal {
    pub ticker_id: i64,
    pub symbol: String,
    pub apewisdom_rank: Option<u32>,
    pub apewisdom_mentions: u64,
    pub reddit_mentions_24h: u64,
    pub reddit_velocity_pct: f64,
    pub health_score: f64,
    pub current_price: Option<f64>,
    pub market_cap: Option<f64>,
}

impl TickerSignal {
    pub fn new(ticker: &TickerRecord, reading: SignalReading, health: Option<HealthReading>) -> Self {
        let (health_score, current_price, market_cap) = match health {
            Some(h) => (h.health_score, h.current_price, h.market_cap),
            None => (0.0, None, None),
        };

        Self {
            ticker_id: ticker.id,
            symbol: ticker.symbol.clone(),
            apewisdom_rank: reading.apewisdom_rank,
            apewisdom_mentions: reading.apewisdom_mentions,
            reddit_mentions_24h: reading.reddit_mentions_24h,
            reddit_velocity_pct: reading.reddit_velocity_pct,
            health_score,
            current_price,
            market_cap,
        }
    }

    /// Only tickers that are trending or were mentioned recently get scored.
    pub fn has_signal(&self) -> bool {
        self.apewisdom_rank.is_some() || self.reddit_mentions_24h > 0
    }

    pub fn total_mentions(&self) -> u64 {
        self.apewisdom_mentions + self.reddit_mentions_24h
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlagType {
    #[serde(rename = "BUY")]
    Buy,
}

impl FlagType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlagType::Buy => "BUY",
        }
    }
}

impl FromStr for FlagType {
    type Err = SignalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BUY" => Ok(FlagType::Buy),
            other => Err(SignalError::InvalidData(format!("unknown flag type '{}'", other))),
        }
    }
}

impl fmt::Display for FlagType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlagStatus {
    #[serde(rename = "OPEN")]
    Open,
    #[serde(rename = "CLOSED")]
    Closed,
}

impl FlagStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlagStatus::Open => "OPEN",
            FlagStatus::Closed => "CLOSED",
        }
    }
}

impl FromStr for FlagStatus {
    type Err = SignalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OPEN" => Ok(FlagStatus::Open),
            "CLOSED" => Ok(FlagStatus::Closed),
            other => Err(SignalError::InvalidData(format!("unknown flag status '{}'", other))),
        }
    }
}

impl fmt::Display for FlagStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inputs behind a flag, kept for operators reviewing it later
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlagMetadata {
    pub apewisdom_rank: Option<u32>,
    pub apewisdom_mentions: u64,
    pub reddit_mentions_24h: u64,
    pub reddit_velocity_pct: f64,
    pub health_score: f64,
    pub market_cap: Option<f64>,
    pub scoring_breakdown: BTreeMap<String, f64>,
}

/// A trading recommendation emitted by the decision engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradingFlag {
    pub id: Option<i64>,
    pub ticker_id: i64,
    pub flag_type: FlagType,
    pub entry_price: Option<f64>,
    /// 0 to 100
    pub confidence_score: f64,
    pub status: FlagStatus,
    pub rationale: String,
    pub metadata: FlagMetadata,
    pub created_at: Option<DateTime<Utc>>,
}

/// Outcome of a guarded flag insert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagInsert {
    Created(i64),
    AlreadyOpen,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ticker() -> TickerRecord {
        TickerRecord {
            id: 7,
            symbol: "GME".to_string(),
            company_name: None,
            industry: None,
        }
    }

    #[test]
    fn test_missing_health_defaults_to_zero() {
        let signal = TickerSignal::new(&ticker(), SignalReading::default(), None);
        assert_eq!(signal.health_score, 0.0);
        assert!(signal.current_price.is_none());
        assert!(signal.market_cap.is_none());
    }

    #[test]
    fn test_has_signal() {
        let mut signal = TickerSignal::new(&ticker(), SignalReading::default(), None);
        assert!(!signal.has_signal());

        signal.reddit_mentions_24h = 3;
        assert!(signal.has_signal());

        signal.reddit_mentions_24h = 0;
        signal.apewisdom_rank = Some(40);
        assert!(signal.has_signal());
    }

    #[test]
    fn test_flag_enums_round_trip_through_db_strings() {
        assert_eq!("OPEN".parse::<FlagStatus>().unwrap(), FlagStatus::Open);
        assert_eq!(FlagStatus::Closed.as_str(), "CLOSED");
        assert_eq!("BUY".parse::<FlagType>().unwrap(), FlagType::Buy);
        assert!("SELL".parse::<FlagType>().is_err());
        assert_eq!("REDDIT".parse::<SentimentSource>().unwrap(), SentimentSource::Reddit);
    }

    #[test]
    fn test_flag_status_serializes_uppercase() {
        let json = serde_json::to_string(&FlagStatus::Open).unwrap();
        assert_eq!(json, "\"OPEN\"");
    }
}

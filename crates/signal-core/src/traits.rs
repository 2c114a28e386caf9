use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::{
    FlagInsert, FundamentalSnapshot, Fundamentals, HealthReading, MentionCount,
    SentimentLogEntry, SignalReading, SignalResult, TickerRecord, TradingFlag, TrendingTicker,
    VelocityLogEntry,
};

/// Trait for trending leaderboards (ApeWisdom)
#[async_trait]
pub trait TrendingSource: Send + Sync {
    async fn fetch_trending_signals(&self, top_n: usize) -> SignalResult<Vec<TrendingTicker>>;
}

/// Trait for community mention counters (Reddit)
#[async_trait]
pub trait MentionSource: Send + Sync {
    async fn fetch_mention_counts(
        &self,
        symbols: &[String],
        window_hours: i64,
    ) -> SignalResult<HashMap<String, MentionCount>>;
}

/// Trait for fundamentals providers (Yahoo Finance).
/// `Ok(None)` means the provider has no data for the symbol.
#[async_trait]
pub trait FundamentalsSource: Send + Sync {
    async fn fetch_fundamentals(&self, symbol: &str) -> SignalResult<Option<Fundamentals>>;
}

/// Writes performed by the discovery stage
#[async_trait]
pub trait DiscoveryStore: Send + Sync {
    /// Returns the ticker, inserting it first if the symbol is new.
    async fn ensure_ticker(&self, symbol: &str) -> SignalResult<TickerRecord>;

    async fn append_sentiment_log(&self, entry: &SentimentLogEntry) -> SignalResult<()>;

    async fn append_velocity_log(&self, entry: &VelocityLogEntry) -> SignalResult<()>;

    /// Most recent community mention total recorded in `[window_start, window_end)`.
    async fn previous_mention_count(
        &self,
        ticker_id: i64,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> SignalResult<Option<u64>>;
}

/// Reads and writes performed by the validation stage
#[async_trait]
pub trait ValidationStore: Send + Sync {
    async fn find_ticker(&self, symbol: &str) -> SignalResult<Option<TickerRecord>>;

    async fn update_ticker_profile(
        &self,
        ticker_id: i64,
        company_name: Option<&str>,
        industry: Option<&str>,
    ) -> SignalResult<()>;

    /// Append a snapshot to the ticker's history. Keyed on `(ticker_id, timestamp)`, so only
    /// an exact replay of the same snapshot overwrites instead of adding a row.
    async fn upsert_fundamental_snapshot(&self, snapshot: &FundamentalSnapshot) -> SignalResult<()>;

    /// Sum of logged mentions per symbol since `since`.
    async fn recent_mention_totals(&self, since: DateTime<Utc>) -> SignalResult<Vec<(String, u64)>>;
}

/// Reads performed by the decision engine
#[async_trait]
pub trait SignalReader: Send + Sync {
    async fn list_tickers(&self) -> SignalResult<Vec<TickerRecord>>;

    async fn latest_signal(&self, ticker_id: i64, since: DateTime<Utc>) -> SignalResult<SignalReading>;

    async fn latest_health(&self, ticker_id: i64) -> SignalResult<Option<HealthReading>>;
}

/// Trading flag persistence
#[async_trait]
pub trait FlagStore: Send + Sync {
    async fn has_open_flag(&self, ticker_id: i64) -> SignalResult<bool>;

    async fn insert_flag(&self, flag: &TradingFlag) -> SignalResult<i64>;

    /// Inserts only when no OPEN flag exists for the ticker.
    async fn insert_flag_if_absent(&self, flag: &TradingFlag) -> SignalResult<FlagInsert> {
        if self.has_open_flag(flag.ticker_id).await? {
            return Ok(FlagInsert::AlreadyOpen);
        }
        self.insert_flag(flag).await.map(FlagInsert::Created)
    }

    async fn open_flags(&self) -> SignalResult<Vec<TradingFlag>>;
}

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use signal_core::{
    DiscoveryStore, FlagInsert, FlagMetadata, FlagStore, FundamentalSnapshot, HealthReading,
    SentimentLogEntry, SentimentSource, SignalError, SignalReader, SignalReading, SignalResult,
    TickerRecord, TradingFlag, ValidationStore, VelocityLogEntry,
};
use sqlx::FromRow;

use crate::db::{db_err, from_db_timestamp, to_db_timestamp, SignalDb};

/// SQLite-backed store used by every pipeline stage
#[derive(Clone)]
pub struct SqliteSignalStore {
    db: SignalDb,
}

#[derive(Debug, FromRow)]
struct TickerRow {
    id: i64,
    symbol: String,
    company_name: Option<String>,
    industry: Option<String>,
}

impl From<TickerRow> for TickerRecord {
    fn from(row: TickerRow) -> Self {
        Self {
            id: row.id,
            symbol: row.symbol,
            company_name: row.company_name,
            industry: row.industry,
        }
    }
}

#[derive(Debug, FromRow)]
struct FlagRow {
    id: i64,
    ticker_id: i64,
    flag_type: String,
    entry_price: Option<f64>,
    confidence_score: f64,
    status: String,
    rationale: String,
    metadata: String,
    created_at: String,
}

impl TryFrom<FlagRow> for TradingFlag {
    type Error = SignalError;

    fn try_from(row: FlagRow) -> Result<Self, Self::Error> {
        let metadata: FlagMetadata = serde_json::from_str(&row.metadata)
            .map_err(|e| SignalError::InvalidData(format!("flag {} metadata: {}", row.id, e)))?;

        Ok(Self {
            id: Some(row.id),
            ticker_id: row.ticker_id,
            flag_type: row.flag_type.parse()?,
            entry_price: row.entry_price,
            confidence_score: row.confidence_score,
            status: row.status.parse()?,
            rationale: row.rationale,
            metadata,
            created_at: Some(from_db_timestamp(&row.created_at)?),
        })
    }
}

impl SqliteSignalStore {
    pub async fn connect(database_url: &str) -> SignalResult<Self> {
        Ok(Self {
            db: SignalDb::new(database_url).await?,
        })
    }

    pub fn from_db(db: SignalDb) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &SignalDb {
        &self.db
    }

    async fn ticker_by_symbol(&self, symbol: &str) -> SignalResult<Option<TickerRecord>> {
        let row = sqlx::query_as::<_, TickerRow>(
            "SELECT id, symbol, company_name, industry FROM tickers WHERE symbol = ?",
        )
        .bind(symbol)
        .fetch_optional(self.db.pool())
        .await
        .map_err(db_err)?;

        Ok(row.map(TickerRecord::from))
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> SignalResult<String> {
    serde_json::to_string(value).map_err(|e| SignalError::InvalidData(e.to_string()))
}

#[async_trait]
impl DiscoveryStore for SqliteSignalStore {
    async fn ensure_ticker(&self, symbol: &str) -> SignalResult<TickerRecord> {
        if let Some(existing) = self.ticker_by_symbol(symbol).await? {
            return Ok(existing);
        }

        sqlx::query("INSERT INTO tickers (symbol) VALUES (?) ON CONFLICT(symbol) DO NOTHING")
            .bind(symbol)
            .execute(self.db.pool())
            .await
            .map_err(db_err)?;
        tracing::info!("Created new ticker: {}", symbol);

        self.ticker_by_symbol(symbol)
            .await?
            .ok_or_else(|| SignalError::Database(format!("ticker {} missing after insert", symbol)))
    }

    async fn append_sentiment_log(&self, entry: &SentimentLogEntry) -> SignalResult<()> {
        sqlx::query(
            r#"
            INSERT INTO sentiment_logs (ticker_id, source, mention_count, upvotes, rank, timestamp)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(entry.ticker_id)
        .bind(entry.source.as_str())
        .bind(entry.mention_count as i64)
        .bind(entry.upvotes)
        .bind(entry.rank.map(i64::from))
        .bind(to_db_timestamp(entry.timestamp))
        .execute(self.db.pool())
        .await
        .map_err(db_err)?;

        Ok(())
    }

    async fn append_velocity_log(&self, entry: &VelocityLogEntry) -> SignalResult<()> {
        sqlx::query(
            r#"
            INSERT INTO reddit_mention_velocity
                (ticker_id, run_id, subreddit, mention_count_24h, velocity_change_pct, top_posts, timestamp)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(entry.ticker_id)
        .bind(&entry.run_id)
        .bind(&entry.subreddit)
        .bind(entry.mention_count_24h as i64)
        .bind(entry.velocity_change_pct)
        .bind(to_json(&entry.top_posts)?)
        .bind(to_db_timestamp(entry.timestamp))
        .execute(self.db.pool())
        .await
        .map_err(db_err)?;

        Ok(())
    }

    async fn previous_mention_count(
        &self,
        ticker_id: i64,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> SignalResult<Option<u64>> {
        let row: Option<(i64,)> = sqlx::query_as(
            "SELECT mention_count FROM sentiment_logs
             WHERE ticker_id = ? AND source = ? AND timestamp >= ? AND timestamp < ?
             ORDER BY timestamp DESC, id DESC LIMIT 1",
        )
        .bind(ticker_id)
        .bind(SentimentSource::Reddit.as_str())
        .bind(to_db_timestamp(window_start))
        .bind(to_db_timestamp(window_end))
        .fetch_optional(self.db.pool())
        .await
        .map_err(db_err)?;

        Ok(row.map(|(count,)| count.max(0) as u64))
    }
}

#[async_trait]
impl ValidationStore for SqliteSignalStore {
    async fn find_ticker(&self, symbol: &str) -> SignalResult<Option<TickerRecord>> {
        self.ticker_by_symbol(symbol).await
    }

    async fn update_ticker_profile(
        &self,
        ticker_id: i64,
        company_name: Option<&str>,
        industry: Option<&str>,
    ) -> SignalResult<()> {
        sqlx::query(
            "UPDATE tickers
             SET company_name = COALESCE(?, company_name), industry = COALESCE(?, industry)
             WHERE id = ?",
        )
        .bind(company_name)
        .bind(industry)
        .bind(ticker_id)
        .execute(self.db.pool())
        .await
        .map_err(db_err)?;

        Ok(())
    }

    async fn upsert_fundamental_snapshot(&self, snapshot: &FundamentalSnapshot) -> SignalResult<()> {
        let f = &snapshot.fundamentals;
        let a = &snapshot.assessment;

        sqlx::query(
            r#"
            INSERT INTO fundamental_stats
                (ticker_id, market_cap, short_float_pct, debt_to_equity, revenue_growth, profit_margin,
                 pe_ratio, beta, current_price, health_score, is_healthy, reasons, raw_data, timestamp)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(ticker_id, timestamp) DO UPDATE SET
                market_cap = excluded.market_cap,
                short_float_pct = excluded.short_float_pct,
                debt_to_equity = excluded.debt_to_equity,
                revenue_growth = excluded.revenue_growth,
                profit_margin = excluded.profit_margin,
                pe_ratio = excluded.pe_ratio,
                beta = excluded.beta,
                current_price = excluded.current_price,
                health_score = excluded.health_score,
                is_healthy = excluded.is_healthy,
                reasons = excluded.reasons,
                raw_data = excluded.raw_data
            "#,
        )
        .bind(snapshot.ticker_id)
        .bind(f.market_cap)
        .bind(f.short_float_pct)
        .bind(f.debt_to_equity)
        .bind(f.revenue_growth)
        .bind(f.profit_margin)
        .bind(f.pe_ratio)
        .bind(f.beta)
        .bind(f.current_price)
        .bind(a.health_score)
        .bind(a.is_healthy)
        .bind(to_json(&a.reasons)?)
        .bind(to_json(&f.raw_data)?)
        .bind(to_db_timestamp(snapshot.timestamp))
        .execute(self.db.pool())
        .await
        .map_err(db_err)?;

        Ok(())
    }

    async fn recent_mention_totals(&self, since: DateTime<Utc>) -> SignalResult<Vec<(String, u64)>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT t.symbol, COALESCE(SUM(s.mention_count), 0) AS total
             FROM sentiment_logs s
             JOIN tickers t ON t.id = s.ticker_id
             WHERE s.timestamp >= ?
             GROUP BY t.symbol
             ORDER BY total DESC, t.symbol ASC",
        )
        .bind(to_db_timestamp(since))
        .fetch_all(self.db.pool())
        .await
        .map_err(db_err)?;

        Ok(rows
            .into_iter()
            .map(|(symbol, total)| (symbol, total.max(0) as u64))
            .collect())
    }
}

#[async_trait]
impl SignalReader for SqliteSignalStore {
    async fn list_tickers(&self) -> SignalResult<Vec<TickerRecord>> {
        let rows = sqlx::query_as::<_, TickerRow>(
            "SELECT id, symbol, company_name, industry FROM tickers ORDER BY symbol",
        )
        .fetch_all(self.db.pool())
        .await
        .map_err(db_err)?;

        Ok(rows.into_iter().map(TickerRecord::from).collect())
    }

    async fn latest_signal(&self, ticker_id: i64, since: DateTime<Utc>) -> SignalResult<SignalReading> {
        let since = to_db_timestamp(since);
        let mut reading = SignalReading::default();

        let ape: Option<(Option<i64>, i64)> = sqlx::query_as(
            "SELECT rank, mention_count FROM sentiment_logs
             WHERE ticker_id = ? AND source = ? AND timestamp >= ?
             ORDER BY timestamp DESC, id DESC LIMIT 1",
        )
        .bind(ticker_id)
        .bind(SentimentSource::ApeWisdom.as_str())
        .bind(&since)
        .fetch_optional(self.db.pool())
        .await
        .map_err(db_err)?;

        if let Some((rank, mentions)) = ape {
            reading.apewisdom_rank = rank.and_then(|r| u32::try_from(r).ok());
            reading.apewisdom_mentions = mentions.max(0) as u64;
        }

        // All community rows of the most recent discovery run inside the window
        let velocity: (i64, Option<f64>) = sqlx::query_as(
            "SELECT COALESCE(SUM(mention_count_24h), 0), MAX(velocity_change_pct)
             FROM reddit_mention_velocity
             WHERE ticker_id = ? AND run_id = (
                 SELECT run_id FROM reddit_mention_velocity
                 WHERE ticker_id = ? AND timestamp >= ?
                 ORDER BY timestamp DESC, id DESC LIMIT 1
             )",
        )
        .bind(ticker_id)
        .bind(ticker_id)
        .bind(&since)
        .fetch_one(self.db.pool())
        .await
        .map_err(db_err)?;

        reading.reddit_mentions_24h = velocity.0.max(0) as u64;
        reading.reddit_velocity_pct = velocity.1.unwrap_or(0.0);

        Ok(reading)
    }

    async fn latest_health(&self, ticker_id: i64) -> SignalResult<Option<HealthReading>> {
        let row: Option<(f64, bool, Option<f64>, Option<f64>)> = sqlx::query_as(
            "SELECT health_score, is_healthy, market_cap, current_price FROM fundamental_stats
             WHERE ticker_id = ?
             ORDER BY timestamp DESC, id DESC LIMIT 1",
        )
        .bind(ticker_id)
        .fetch_optional(self.db.pool())
        .await
        .map_err(db_err)?;

        Ok(row.map(|(health_score, is_healthy, market_cap, current_price)| HealthReading {
            health_score,
            is_healthy,
            market_cap,
            current_price,
        }))
    }
}

#[async_trait]
impl FlagStore for SqliteSignalStore {
    async fn has_open_flag(&self, ticker_id: i64) -> SignalResult<bool> {
        let row: Option<(i64,)> = sqlx::query_as(
            "SELECT id FROM trading_flags WHERE ticker_id = ? AND status = 'OPEN' LIMIT 1",
        )
        .bind(ticker_id)
        .fetch_optional(self.db.pool())
        .await
        .map_err(db_err)?;

        Ok(row.is_some())
    }

    async fn insert_flag(&self, flag: &TradingFlag) -> SignalResult<i64> {
        let created_at = flag.created_at.unwrap_or_else(Utc::now);

        let result = sqlx::query(
            r#"
            INSERT INTO trading_flags
                (ticker_id, flag_type, entry_price, confidence_score, status, rationale, metadata, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(flag.ticker_id)
        .bind(flag.flag_type.as_str())
        .bind(flag.entry_price)
        .bind(flag.confidence_score)
        .bind(flag.status.as_str())
        .bind(&flag.rationale)
        .bind(to_json(&flag.metadata)?)
        .bind(to_db_timestamp(created_at))
        .execute(self.db.pool())
        .await
        .map_err(db_err)?;

        Ok(result.last_insert_rowid())
    }

    async fn insert_flag_if_absent(&self, flag: &TradingFlag) -> SignalResult<FlagInsert> {
        let mut tx = self.db.pool().begin().await.map_err(db_err)?;

        let existing: Option<(i64,)> = sqlx::query_as(
            "SELECT id FROM trading_flags WHERE ticker_id = ? AND status = 'OPEN' LIMIT 1",
        )
        .bind(flag.ticker_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_err)?;

        if existing.is_some() {
            tx.rollback().await.map_err(db_err)?;
            return Ok(FlagInsert::AlreadyOpen);
        }

        let created_at = flag.created_at.unwrap_or_else(Utc::now);
        let result = sqlx::query(
            r#"
            INSERT INTO trading_flags
                (ticker_id, flag_type, entry_price, confidence_score, status, rationale, metadata, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(flag.ticker_id)
        .bind(flag.flag_type.as_str())
        .bind(flag.entry_price)
        .bind(flag.confidence_score)
        .bind(flag.status.as_str())
        .bind(&flag.rationale)
        .bind(to_json(&flag.metadata)?)
        .bind(to_db_timestamp(created_at))
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;
        Ok(FlagInsert::Created(result.last_insert_rowid()))
    }

    async fn open_flags(&self) -> SignalResult<Vec<TradingFlag>> {
        let rows = sqlx::query_as::<_, FlagRow>(
            "SELECT id, ticker_id, flag_type, entry_price, confidence_score, status, rationale, metadata, created_at
             FROM trading_flags WHERE status = 'OPEN' ORDER BY created_at DESC, id DESC",
        )
        .fetch_all(self.db.pool())
        .await
        .map_err(db_err)?;

        rows.into_iter().map(TradingFlag::try_from).collect()
    }
}

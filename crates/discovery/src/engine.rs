use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use signal_core::{
    DiscoveryStore, MentionCount, MentionSource, SentimentLogEntry, SentimentSource,
    SignalResult, TrendingSource, TrendingTicker, VelocityLogEntry,
};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use uuid::Uuid;

use crate::velocity::{prior_window, velocity_change_pct};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    pub apewisdom_top_n: usize,
    /// How many of the top trending symbols get community mention tracking
    pub reddit_track_top_n: usize,
    pub lookback_hours: i64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            apewisdom_top_n: 50,
            reddit_track_top_n: 20,
            lookback_hours: 24,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VelocityRecord {
    pub symbol: String,
    pub mention_count_24h: u64,
    pub previous_count: u64,
    pub velocity_change_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoverySummary {
    pub run_id: String,
    pub apewisdom_count: usize,
    pub reddit_tracked_count: usize,
    pub top_trending: Vec<TrendingTicker>,
    pub highest_velocity: Vec<VelocityRecord>,
}

pub struct DiscoveryEngine<T, M, S> {
    trending: Arc<T>,
    mentions: Arc<M>,
    store: Arc<S>,
    config: DiscoveryConfig,
}

impl<T, M, S> DiscoveryEngine<T, M, S>
where
    T: TrendingSource,
    M: MentionSource,
    S: DiscoveryStore,
{
    pub fn new(trending: Arc<T>, mentions: Arc<M>, store: Arc<S>, config: DiscoveryConfig) -> Self {
        Self {
            trending,
            mentions,
            store,
            config,
        }
    }

    pub async fn run(&self) -> DiscoverySummary {
        self.run_at(Utc::now()).await
    }

    /// One discovery pass. Source and store failures are logged, never returned.
    pub async fn run_at(&self, now: DateTime<Utc>) -> DiscoverySummary {
        let run_id = Uuid::new_v4().to_string();
        tracing::info!(run_id = %run_id, "Starting discovery");

        let trending = match self
            .trending
            .fetch_trending_signals(self.config.apewisdom_top_n)
            .await
        {
            Ok(trending) => trending,
            Err(e) => {
                tracing::error!("Failed to fetch trending tickers: {}", e);
                Vec::new()
            }
        };

        let tracked: Vec<String> = trending
            .iter()
            .take(self.config.reddit_track_top_n)
            .map(|t| t.symbol.clone())
            .collect();

        let mentions = if tracked.is_empty() {
            HashMap::new()
        } else {
            match self
                .mentions
                .fetch_mention_counts(&tracked, self.config.lookback_hours)
                .await
            {
                Ok(mentions) => mentions,
                Err(e) => {
                    tracing::error!("Failed to track community mentions: {}", e);
                    HashMap::new()
                }
            }
        };

        let ticker_ids = self.ensure_tickers(&trending, &mentions).await;
        self.save_trending(&trending, &ticker_ids, now).await;

        let mut velocities = Vec::new();
        // Sorted for stable persistence order
        let mentions: BTreeMap<_, _> = mentions.into_iter().collect();
        for (symbol, count) in &mentions {
            let Some(&ticker_id) = ticker_ids.get(symbol) else {
                continue;
            };
            let record = self.velocity_for(ticker_id, count, now).await;
            if let Err(e) = self.save_mentions(&run_id, ticker_id, count, &record, now).await {
                tracing::error!("Error saving community mentions for {}: {}", symbol, e);
            }
            velocities.push(record);
        }

        velocities.sort_by(|a, b| {
            b.velocity_change_pct
                .total_cmp(&a.velocity_change_pct)
                .then_with(|| a.symbol.cmp(&b.symbol))
        });
        velocities.truncate(5);

        let summary = DiscoverySummary {
            run_id,
            apewisdom_count: trending.len(),
            reddit_tracked_count: mentions.len(),
            top_trending: trending.into_iter().take(5).collect(),
            highest_velocity: velocities,
        };

        tracing::info!(
            apewisdom_count = summary.apewisdom_count,
            reddit_tracked_count = summary.reddit_tracked_count,
            "Discovery complete"
        );
        summary
    }

    async fn ensure_tickers(
        &self,
        trending: &[TrendingTicker],
        mentions: &HashMap<String, MentionCount>,
    ) -> HashMap<String, i64> {
        let symbols: BTreeSet<&String> = trending
            .iter()
            .map(|t| &t.symbol)
            .chain(mentions.keys())
            .collect();

        let mut ids = HashMap::new();
        for symbol in symbols {
            match self.store.ensure_ticker(symbol).await {
                Ok(ticker) => {
                    ids.insert(symbol.clone(), ticker.id);
                }
                Err(e) => tracing::error!("Error ensuring ticker {} exists: {}", symbol, e),
            }
        }
        ids
    }

    async fn save_trending(
        &self,
        trending: &[TrendingTicker],
        ticker_ids: &HashMap<String, i64>,
        now: DateTime<Utc>,
    ) {
        for ticker in trending {
            let Some(&ticker_id) = ticker_ids.get(&ticker.symbol) else {
                continue;
            };
            let entry = SentimentLogEntry {
                ticker_id,
                source: SentimentSource::ApeWisdom,
                mention_count: ticker.mention_count,
                upvotes: i64::try_from(ticker.upvotes).unwrap_or(i64::MAX),
                rank: Some(ticker.rank),
                timestamp: now,
            };
            match self.store.append_sentiment_log(&entry).await {
                Ok(()) => tracing::debug!("Saved trending data for {}", ticker.symbol),
                Err(e) => tracing::error!("Error saving trending data for {}: {}", ticker.symbol, e),
            }
        }
    }

    async fn velocity_for(&self, ticker_id: i64, count: &MentionCount, now: DateTime<Utc>) -> VelocityRecord {
        let previous = match count.count_prev {
            Some(previous) => previous,
            None => {
                let (start, end) = prior_window(now, self.config.lookback_hours);
                match self.store.previous_mention_count(ticker_id, start, end).await {
                    Ok(previous) => previous.unwrap_or(0),
                    Err(e) => {
                        tracing::warn!("Error getting previous mention count for {}: {}", count.symbol, e);
                        0
                    }
                }
            }
        };

        VelocityRecord {
            symbol: count.symbol.clone(),
            mention_count_24h: count.count_now,
            previous_count: previous,
            velocity_change_pct: velocity_change_pct(count.count_now, previous),
        }
    }

    async fn save_mentions(
        &self,
        run_id: &str,
        ticker_id: i64,
        count: &MentionCount,
        record: &VelocityRecord,
        now: DateTime<Utc>,
    ) -> SignalResult<()> {
        for (community, mentions) in &count.by_community {
            self.store
                .append_velocity_log(&VelocityLogEntry {
                    ticker_id,
                    run_id: run_id.to_string(),
                    subreddit: community.clone(),
                    mention_count_24h: *mentions,
                    velocity_change_pct: record.velocity_change_pct,
                    top_posts: count.top_posts.clone(),
                    timestamp: now,
                })
                .await?;
        }

        self.store
            .append_sentiment_log(&SentimentLogEntry {
                ticker_id,
                source: SentimentSource::Reddit,
                mention_count: count.count_now,
                upvotes: count.total_upvotes,
                rank: None,
                timestamp: now,
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use signal_core::{SignalError, TickerRecord};
    use std::sync::Mutex;

    struct FixedTrending(SignalResult<Vec<TrendingTicker>>);

    #[async_trait]
    impl TrendingSource for FixedTrending {
        async fn fetch_trending_signals(&self, top_n: usize) -> SignalResult<Vec<TrendingTicker>> {
            self.0.clone().map(|mut v| {
                v.truncate(top_n);
                v
            })
        }
    }

    #[derive(Default)]
    struct FixedMentions {
        counts: HashMap<String, MentionCount>,
        requested: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl MentionSource for FixedMentions {
        async fn fetch_mention_counts(
            &self,
            symbols: &[String],
            _window_hours: i64,
        ) -> SignalResult<HashMap<String, MentionCount>> {
            *self.requested.lock().unwrap() = symbols.to_vec();
            Ok(self
                .counts
                .iter()
                .filter(|(s, _)| symbols.contains(s))
                .map(|(s, c)| (s.clone(), c.clone()))
                .collect())
        }
    }

    #[derive(Default)]
    struct MemoryStore {
        tickers: Mutex<Vec<String>>,
        sentiment: Mutex<Vec<SentimentLogEntry>>,
        velocity: Mutex<Vec<VelocityLogEntry>>,
        previous: HashMap<i64, u64>,
    }

    #[async_trait]
    impl DiscoveryStore for MemoryStore {
        async fn ensure_ticker(&self, symbol: &str) -> SignalResult<TickerRecord> {
            let mut tickers = self.tickers.lock().unwrap();
            let id = match tickers.iter().position(|s| s == symbol) {
                Some(pos) => pos,
                None => {
                    tickers.push(symbol.to_string());
                    tickers.len() - 1
                }
            };
            Ok(TickerRecord {
                id: id as i64 + 1,
                symbol: symbol.to_string(),
                company_name: None,
                industry: None,
            })
        }

        async fn append_sentiment_log(&self, entry: &SentimentLogEntry) -> SignalResult<()> {
            self.sentiment.lock().unwrap().push(entry.clone());
            Ok(())
        }

        async fn append_velocity_log(&self, entry: &VelocityLogEntry) -> SignalResult<()> {
            self.velocity.lock().unwrap().push(entry.clone());
            Ok(())
        }

        async fn previous_mention_count(
            &self,
            ticker_id: i64,
            _window_start: DateTime<Utc>,
            _window_end: DateTime<Utc>,
        ) -> SignalResult<Option<u64>> {
            Ok(self.previous.get(&ticker_id).copied())
        }
    }

    fn trending(symbols: &[&str]) -> Vec<TrendingTicker> {
        symbols
            .iter()
            .enumerate()
            .map(|(i, s)| TrendingTicker {
                rank: i as u32 + 1,
                symbol: s.to_string(),
                mention_count: 1000 - i as u64 * 100,
                upvotes: 50,
            })
            .collect()
    }

    fn mention(symbol: &str, communities: &[(&str, u64)], prev: Option<u64>) -> MentionCount {
        let by_community: BTreeMap<String, u64> =
            communities.iter().map(|(c, n)| (c.to_string(), *n)).collect();
        MentionCount {
            symbol: symbol.to_string(),
            count_now: by_community.values().sum(),
            count_prev: prev,
            by_community,
            total_upvotes: 120,
            top_posts: vec![],
        }
    }

    #[tokio::test]
    async fn test_discovery_persists_trending_and_mentions() {
        let mentions = FixedMentions {
            counts: HashMap::from([
                ("GME".to_string(), mention("GME", &[("wallstreetbets", 30), ("stocks", 10)], None)),
                ("AMC".to_string(), mention("AMC", &[("wallstreetbets", 5)], Some(10))),
            ]),
            ..Default::default()
        };
        // GME is ticker 2 (AMC sorts first), previous window had 20
        let store = MemoryStore {
            previous: HashMap::from([(2, 20)]),
            ..Default::default()
        };

        let engine = DiscoveryEngine::new(
            Arc::new(FixedTrending(Ok(trending(&["GME", "AMC", "TSLA"])))),
            Arc::new(mentions),
            Arc::new(store),
            DiscoveryConfig::default(),
        );
        let summary = engine.run().await;

        assert_eq!(summary.apewisdom_count, 3);
        assert_eq!(summary.reddit_tracked_count, 2);
        assert_eq!(summary.top_trending[0].symbol, "GME");

        assert_eq!(summary.highest_velocity[0].symbol, "GME");
        assert_eq!(summary.highest_velocity[0].velocity_change_pct, 100.0);
        assert_eq!(summary.highest_velocity[1].symbol, "AMC");
        assert_eq!(summary.highest_velocity[1].velocity_change_pct, -50.0);

        let store = &engine.store;
        let sentiment = store.sentiment.lock().unwrap();
        let ape = sentiment.iter().filter(|e| e.source == SentimentSource::ApeWisdom).count();
        let reddit: Vec<_> = sentiment.iter().filter(|e| e.source == SentimentSource::Reddit).collect();
        assert_eq!(ape, 3);
        assert_eq!(reddit.len(), 2);
        assert!(reddit.iter().all(|e| e.rank.is_none()));

        let velocity = store.velocity.lock().unwrap();
        assert_eq!(velocity.len(), 3);
        assert!(velocity.iter().all(|v| v.run_id == summary.run_id));
        let gme_total: u64 = velocity.iter().filter(|v| v.ticker_id == 2).map(|v| v.mention_count_24h).sum();
        assert_eq!(gme_total, 40);
    }

    #[tokio::test]
    async fn test_only_top_n_are_tracked() {
        let mentions = Arc::new(FixedMentions::default());
        let config = DiscoveryConfig {
            reddit_track_top_n: 2,
            ..Default::default()
        };
        let engine = DiscoveryEngine::new(
            Arc::new(FixedTrending(Ok(trending(&["A1", "B2", "C3"])))),
            Arc::clone(&mentions),
            Arc::new(MemoryStore::default()),
            config,
        );
        engine.run().await;

        assert_eq!(*mentions.requested.lock().unwrap(), vec!["A1", "B2"]);
    }

    #[tokio::test]
    async fn test_trending_failure_yields_empty_run() {
        let engine = DiscoveryEngine::new(
            Arc::new(FixedTrending(Err(SignalError::Api("HTTP 503".into())))),
            Arc::new(FixedMentions::default()),
            Arc::new(MemoryStore::default()),
            DiscoveryConfig::default(),
        );
        let summary = engine.run().await;

        assert_eq!(summary.apewisdom_count, 0);
        assert_eq!(summary.reddit_tracked_count, 0);
        assert!(engine.store.sentiment.lock().unwrap().is_empty());
    }
}

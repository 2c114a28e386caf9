//! Per-community ticker mention counts from Reddit listings.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use serde::Deserialize;
use serde_json::Value;
use signal_core::{
    extract_tickers, retry_with_backoff, BackoffPolicy, MentionCount, MentionSource, RedditPost,
    SignalError, SignalResult, Sleeper, TokioSleeper,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

const TOKEN_URL: &str = "https://www.reddit.com/api/v1/access_token";
const API_URL: &str = "https://oauth.reddit.com";
const LISTING_LIMIT: u32 = 100;
const TOP_POSTS_PER_TICKER: usize = 5;

#[derive(Debug, Clone)]
pub struct RedditConfig {
    pub client_id: String,
    pub client_secret: String,
    pub user_agent: String,
    pub subreddits: Vec<String>,
    /// Pause after scanning each community
    pub community_pause: Duration,
}

/// A post from a listing, before ticker extraction
#[derive(Debug, Clone, PartialEq)]
pub struct ListingPost {
    pub id: String,
    pub title: String,
    pub selftext: String,
    pub url: String,
    pub score: i64,
    pub created: DateTime<Utc>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expiry")]
    expires_in: u64,
}

fn default_expiry() -> u64 {
    3600
}

struct CachedToken {
    value: String,
    expires_at: Instant,
}

pub struct RedditClient {
    client: reqwest::Client,
    config: RedditConfig,
    token: Mutex<Option<CachedToken>>,
    policy: BackoffPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl RedditClient {
    pub fn new(config: RedditConfig) -> SignalResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| SignalError::Config(format!("http client: {}", e)))?;

        Ok(Self {
            client,
            config,
            token: Mutex::new(None),
            policy: BackoffPolicy::exponential(3, Duration::from_secs(10), Duration::from_secs(60)),
            sleeper: Arc::new(TokioSleeper),
        })
    }

    pub fn with_backoff(mut self, policy: BackoffPolicy, sleeper: Arc<dyn Sleeper>) -> Self {
        self.policy = policy;
        self.sleeper = sleeper;
        self
    }

    async fn access_token(&self) -> SignalResult<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_at > Instant::now() {
                return Ok(token.value.clone());
            }
        }

        let response = self
            .client
            .post(TOKEN_URL)
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| SignalError::Api(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SignalError::from_status(status.as_u16(), "reddit token"));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| SignalError::InvalidData(format!("reddit token: {}", e)))?;

        // Refresh a minute early
        let lifetime = Duration::from_secs(token.expires_in.saturating_sub(60));
        *cached = Some(CachedToken {
            value: token.access_token.clone(),
            expires_at: Instant::now() + lifetime,
        });
        Ok(token.access_token)
    }

    async fn fetch_listing(&self, subreddit: &str, sort: &str) -> SignalResult<Vec<ListingPost>> {
        let token = self.access_token().await?;
        let url = format!("{}/r/{}/{}", API_URL, subreddit, sort);

        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .query(&[("limit", LISTING_LIMIT.to_string())])
            .send()
            .await
            .map_err(|e| SignalError::Api(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SignalError::from_status(status.as_u16(), &format!("r/{}", subreddit)));
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| SignalError::InvalidData(e.to_string()))?;

        Ok(parse_listing(&json))
    }

    async fn scan_community(&self, subreddit: &str) -> SignalResult<Vec<ListingPost>> {
        let mut posts = Vec::new();
        for sort in ["hot", "new"] {
            let label = format!("r/{}/{}", subreddit, sort);
            let listing = retry_with_backoff(&self.policy, self.sleeper.as_ref(), &label, || {
                self.fetch_listing(subreddit, sort)
            })
            .await?;
            posts.extend(listing);
        }
        Ok(posts)
    }
}

#[async_trait]
impl MentionSource for RedditClient {
    async fn fetch_mention_counts(
        &self,
        symbols: &[String],
        window_hours: i64,
    ) -> SignalResult<HashMap<String, MentionCount>> {
        tracing::info!("Tracking Reddit mentions for the last {} hours...", window_hours);
        let cutoff = Utc::now() - ChronoDuration::hours(window_hours);
        let targets: HashSet<&str> = symbols.iter().map(String::as_str).collect();
        let mut counts = HashMap::new();

        for (idx, subreddit) in self.config.subreddits.iter().enumerate() {
            if idx > 0 {
                self.sleeper.sleep(self.config.community_pause).await;
            }
            tracing::info!("Scanning r/{}...", subreddit);

            match self.scan_community(subreddit).await {
                Ok(posts) => tally_mentions(&mut counts, subreddit, &posts, &targets, cutoff),
                Err(SignalError::Forbidden(_)) => {
                    tracing::warn!("Access forbidden to r/{}", subreddit)
                }
                Err(SignalError::NotFound(_)) => {
                    tracing::warn!("Subreddit r/{} not found", subreddit)
                }
                Err(e) => tracing::error!("Error scanning r/{}: {}", subreddit, e),
            }
        }

        tracing::info!("Found mentions for {} tickers", counts.len());
        Ok(counts)
    }
}

pub fn parse_listing(json: &Value) -> Vec<ListingPost> {
    let Some(children) = json
        .get("data")
        .and_then(|d| d.get("children"))
        .and_then(|c| c.as_array())
    else {
        return Vec::new();
    };

    children
        .iter()
        .filter_map(|child| {
            let data = child.get("data")?;
            let created = data.get("created_utc").and_then(|v| v.as_f64())?;
            Some(ListingPost {
                id: data.get("id").and_then(|v| v.as_str())?.to_string(),
                title: data.get("title").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
                selftext: data.get("selftext").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
                url: data.get("url").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
                score: data.get("score").and_then(|v| v.as_i64()).unwrap_or(0),
                created: Utc.timestamp_opt(created as i64, 0).single()?,
            })
        })
        .collect()
}

/// Add one community's posts to the running tallies.
///
/// Posts older than `cutoff` are ignored; a post listed in both hot and new counts once.
pub fn tally_mentions(
    counts: &mut HashMap<String, MentionCount>,
    subreddit: &str,
    posts: &[ListingPost],
    targets: &HashSet<&str>,
    cutoff: DateTime<Utc>,
) {
    let mut seen = HashSet::new();

    for post in posts {
        if post.created < cutoff || !seen.insert(post.id.as_str()) {
            continue;
        }

        let text = format!("{} {}", post.title, post.selftext);
        for symbol in extract_tickers(&text) {
            if !targets.is_empty() && !targets.contains(symbol.as_str()) {
                continue;
            }

            let entry = counts.entry(symbol.clone()).or_insert_with(|| MentionCount {
                symbol: symbol.clone(),
                ..Default::default()
            });
            entry.count_now += 1;
            *entry.by_community.entry(subreddit.to_string()).or_insert(0) += 1;
            entry.total_upvotes += post.score;

            if entry.top_posts.len() < TOP_POSTS_PER_TICKER {
                entry.top_posts.push(RedditPost {
                    title: post.title.clone(),
                    url: post.url.clone(),
                    score: post.score,
                    subreddit: subreddit.to_string(),
                    created: post.created,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn post(id: &str, title: &str, hours_ago: i64, now: DateTime<Utc>) -> ListingPost {
        ListingPost {
            id: id.to_string(),
            title: title.to_string(),
            selftext: String::new(),
            url: format!("https://reddit.com/{}", id),
            score: 10,
            created: now - ChronoDuration::hours(hours_ago),
        }
    }

    #[test]
    fn test_parse_listing() {
        let json = json!({
            "kind": "Listing",
            "data": {
                "children": [
                    {"kind": "t3", "data": {"id": "abc", "title": "$GME to the moon", "selftext": "",
                        "url": "https://i.redd.it/x.png", "score": 420, "created_utc": 1714000000.0}},
                    {"kind": "t3", "data": {"title": "no id", "created_utc": 1714000000.0}}
                ]
            }
        });

        let posts = parse_listing(&json);
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].id, "abc");
        assert_eq!(posts[0].score, 420);
        assert_eq!(posts[0].created.timestamp(), 1_714_000_000);
    }

    #[test]
    fn test_tally_skips_old_duplicate_and_untracked() {
        let now = Utc::now();
        let cutoff = now - ChronoDuration::hours(24);
        let targets: HashSet<&str> = ["GME", "AMC"].into_iter().collect();

        let hot_and_new = vec![
            post("1", "GME and AMC squeeze", 2, now),
            post("2", "PLTR earnings", 3, now),
            post("3", "GME from last week", 48, now),
            post("1", "GME and AMC squeeze", 2, now),
        ];

        let mut counts = HashMap::new();
        tally_mentions(&mut counts, "wallstreetbets", &hot_and_new, &targets, cutoff);
        tally_mentions(&mut counts, "stocks", &[post("9", "Thoughts on $GME?", 1, now)], &targets, cutoff);

        assert_eq!(counts.len(), 2);
        let gme = &counts["GME"];
        assert_eq!(gme.count_now, 2);
        assert_eq!(gme.by_community["wallstreetbets"], 1);
        assert_eq!(gme.by_community["stocks"], 1);
        assert_eq!(gme.total_upvotes, 20);
        assert_eq!(gme.top_posts.len(), 2);
        assert!(gme.count_prev.is_none());
        assert_eq!(counts["AMC"].count_now, 1);
    }

    #[test]
    fn test_top_posts_are_capped() {
        let now = Utc::now();
        let posts: Vec<ListingPost> = (0..8).map(|i| post(&i.to_string(), "BB rally", 1, now)).collect();
        let targets: HashSet<&str> = ["BB"].into_iter().collect();

        let mut counts = HashMap::new();
        tally_mentions(&mut counts, "stocks", &posts, &targets, now - ChronoDuration::hours(24));

        assert_eq!(counts["BB"].count_now, 8);
        assert_eq!(counts["BB"].top_posts.len(), 5);
    }
}

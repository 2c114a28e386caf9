use async_trait::async_trait;
use serde_json::Value;
use signal_core::{
    retry_with_backoff, BackoffPolicy, SignalError, SignalResult, Sleeper, TokioSleeper,
    TrendingSource, TrendingTicker,
};
use std::sync::Arc;
use std::time::Duration;

const BASE_URL: &str = "https://apewisdom.io/api/v1.0/filter";

/// One page of the leaderboard
#[derive(Debug, Clone, PartialEq)]
pub struct TrendingPage {
    pub tickers: Vec<TrendingTicker>,
    pub pages: u32,
}

#[derive(Clone)]
pub struct ApeWisdomClient {
    client: reqwest::Client,
    filter: String,
    policy: BackoffPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl ApeWisdomClient {
    pub fn new() -> SignalResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| SignalError::Config(format!("http client: {}", e)))?;

        Ok(Self {
            client,
            filter: "all-stocks".to_string(),
            policy: BackoffPolicy::exponential(3, Duration::from_secs(5), Duration::from_secs(60)),
            sleeper: Arc::new(TokioSleeper),
        })
    }

    pub fn with_backoff(mut self, policy: BackoffPolicy, sleeper: Arc<dyn Sleeper>) -> Self {
        self.policy = policy;
        self.sleeper = sleeper;
        self
    }

    async fn fetch_page(&self, page: u32) -> SignalResult<TrendingPage> {
        let url = format!("{}/{}/page/{}", BASE_URL, self.filter, page);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SignalError::Api(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SignalError::from_status(status.as_u16(), "apewisdom"));
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| SignalError::InvalidData(e.to_string()))?;

        parse_page(&json, page)
    }
}

#[async_trait]
impl TrendingSource for ApeWisdomClient {
    async fn fetch_trending_signals(&self, top_n: usize) -> SignalResult<Vec<TrendingTicker>> {
        tracing::info!("Fetching top {} tickers from ApeWisdom...", top_n);
        let mut tickers: Vec<TrendingTicker> = Vec::with_capacity(top_n);
        let mut page = 1;

        while tickers.len() < top_n {
            let label = format!("apewisdom page {}", page);
            let result = retry_with_backoff(&self.policy, self.sleeper.as_ref(), &label, || {
                self.fetch_page(page)
            })
            .await?;

            if result.tickers.is_empty() {
                break;
            }
            tickers.extend(result.tickers);

            if page >= result.pages {
                break;
            }
            page += 1;
        }

        tickers.truncate(top_n);
        tracing::info!("Fetched {} trending tickers", tickers.len());
        Ok(tickers)
    }
}

/// Numbers arrive either as JSON numbers or as numeric strings.
fn as_u64(value: Option<&Value>) -> Option<u64> {
    match value? {
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().map(|f| f.max(0.0) as u64)),
        Value::String(s) => s.trim().parse::<f64>().ok().map(|f| f.max(0.0) as u64),
        _ => None,
    }
}

/// Parse one leaderboard page. Ranks fall back to position when absent.
pub fn parse_page(json: &Value, page: u32) -> SignalResult<TrendingPage> {
    let results = json
        .get("results")
        .and_then(|v| v.as_array())
        .ok_or_else(|| SignalError::InvalidData("apewisdom: missing results".to_string()))?;

    let pages = as_u64(json.get("pages")).unwrap_or(u64::from(page)) as u32;
    let offset = results.len() as u64 * u64::from(page.saturating_sub(1));

    let tickers = results
        .iter()
        .enumerate()
        .filter_map(|(i, row)| {
            let symbol = row
                .get("ticker")
                .and_then(|v| v.as_str())?
                .trim()
                .trim_start_matches('$')
                .to_uppercase();
            if symbol.is_empty() {
                return None;
            }
            let rank = as_u64(row.get("rank")).unwrap_or(offset + i as u64 + 1) as u32;
            Some(TrendingTicker {
                rank,
                symbol,
                mention_count: as_u64(row.get("mentions")).unwrap_or(0),
                upvotes: as_u64(row.get("upvotes")).unwrap_or(0),
            })
        })
        .collect();

    Ok(TrendingPage { tickers, pages })
}

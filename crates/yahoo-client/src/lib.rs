use async_trait::async_trait;
use serde_json::Value;
use signal_core::{
    retry_with_backoff, BackoffPolicy, Fundamentals, FundamentalsSource, SignalError,
    SignalResult, Sleeper, TokioSleeper,
};
use std::sync::Arc;
use std::time::Duration;

const QUOTE_SUMMARY_URL: &str = "https://query2.finance.yahoo.com/v10/finance/quoteSummary";
const MODULES: &str = "price,financialData,summaryProfile,defaultKeyStatistics";

/// Two attempts; the single retry waits 40s after a rate-limited first call
pub fn fundamentals_backoff() -> BackoffPolicy {
    BackoffPolicy::linear(2, Duration::from_secs(40))
}

/// Fundamentals from Yahoo Finance quoteSummary
#[derive(Clone)]
pub struct YahooClient {
    client: reqwest::Client,
    policy: BackoffPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl YahooClient {
    pub fn new() -> SignalResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| SignalError::Config(format!("http client: {}", e)))?;

        Ok(Self {
            client,
            policy: fundamentals_backoff(),
            sleeper: Arc::new(TokioSleeper),
        })
    }

    pub fn with_backoff(mut self, policy: BackoffPolicy, sleeper: Arc<dyn Sleeper>) -> Self {
        self.policy = policy;
        self.sleeper = sleeper;
        self
    }

    async fn fetch_once(&self, symbol: &str) -> SignalResult<Option<Fundamentals>> {
        tracing::info!("Fetching fundamentals for {}...", symbol);
        let url = format!("{}/{}", QUOTE_SUMMARY_URL, symbol);

        let response = self
            .client
            .get(&url)
            .query(&[("modules", MODULES)])
            .send()
            .await
            .map_err(|e| SignalError::Api(e.to_string()))?;

        let status = response.status();
        if status.as_u16() == 404 {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(SignalError::from_status(status.as_u16(), &format!("yahoo {}", symbol)));
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| SignalError::InvalidData(e.to_string()))?;

        let fundamentals = parse_quote_summary(symbol, &json);
        if let Some(f) = &fundamentals {
            tracing::info!("Fetched fundamentals for {}", symbol);
            tracing::debug!("{} market cap: {:?}, P/E: {:?}", symbol, f.market_cap, f.pe_ratio);
        }
        Ok(fundamentals)
    }
}

#[async_trait]
impl FundamentalsSource for YahooClient {
    async fn fetch_fundamentals(&self, symbol: &str) -> SignalResult<Option<Fundamentals>> {
        retry_with_backoff(&self.policy, self.sleeper.as_ref(), symbol, || self.fetch_once(symbol)).await
    }
}

/// Yahoo wraps most numbers as `{"raw": 1.23, "fmt": "1.23"}`; plain numbers also occur.
fn raw_f64(value: Option<&Value>) -> Option<f64> {
    let value = value?;
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Object(map) => map.get("raw").and_then(|v| v.as_f64()),
        _ => None,
    }
}

fn raw_u64(value: Option<&Value>) -> Option<u64> {
    raw_f64(value).filter(|v| *v >= 0.0).map(|v| v as u64)
}

fn text(value: Option<&Value>) -> Option<String> {
    value
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn first_f64(module: &[Option<&Value>], keys: &[&str]) -> Option<f64> {
    keys.iter()
        .find_map(|key| module.iter().find_map(|m| raw_f64((*m).and_then(|v| v.get(*key)))))
}

fn percent(fraction: Option<f64>) -> Option<f64> {
    fraction.map(|f| f * 100.0)
}

/// Turn a quoteSummary response into [`Fundamentals`].
///
/// Margins, growth and short interest arrive as fractions and become percentages.
/// Debt/equity arrives as a percentage and becomes a ratio.
pub fn parse_quote_summary(symbol: &str, json: &Value) -> Option<Fundamentals> {
    let result = json
        .get("quoteSummary")
        .and_then(|v| v.get("result"))
        .and_then(|v| v.as_array())
        .and_then(|arr| arr.first())?;

    let price = result.get("price");
    let financial = result.get("financialData");
    let profile = result.get("summaryProfile");
    let stats = result.get("defaultKeyStatistics");

    let company_name = text(price.and_then(|p| p.get("longName")))
        .or_else(|| text(price.and_then(|p| p.get("shortName"))));
    let industry = text(profile.and_then(|p| p.get("industry")))
        .or_else(|| text(profile.and_then(|p| p.get("sector"))));

    Some(Fundamentals {
        symbol: symbol.to_string(),
        company_name,
        industry,
        market_cap: first_f64(&[price, stats], &["marketCap"]),
        debt_to_equity: first_f64(&[financial], &["debtToEquity"]).map(|pct| pct / 100.0),
        profit_margin: percent(first_f64(&[financial, stats], &["profitMargins"])),
        revenue_growth: percent(first_f64(&[financial], &["revenueGrowth"])),
        current_price: first_f64(&[financial, price], &["currentPrice", "regularMarketPrice"]),
        short_float_pct: percent(first_f64(&[stats], &["shortPercentOfFloat"])),
        pe_ratio: first_f64(&[stats, price], &["trailingPE", "forwardPE"]),
        beta: first_f64(&[stats], &["beta"]),
        fifty_two_week_high: first_f64(&[stats, price], &["fiftyTwoWeekHigh"]),
        fifty_two_week_low: first_f64(&[stats, price], &["fiftyTwoWeekLow"]),
        volume: raw_u64(price.and_then(|p| p.get("regularMarketVolume"))),
        avg_volume: raw_u64(price.and_then(|p| p.get("averageDailyVolume3Month"))),
        raw_data: result.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload() -> Value {
        json!({
            "quoteSummary": {
                "result": [{
                    "price": {
                        "longName": "GameStop Corp.",
                        "shortName": "GameStop",
                        "marketCap": {"raw": 7.2e9, "fmt": "7.2B"},
                        "regularMarketPrice": {"raw": 23.4, "fmt": "23.40"},
                        "regularMarketVolume": {"raw": 5400000, "fmt": "5.4M"}
                    },
                    "financialData": {
                        "currentPrice": {"raw": 23.5, "fmt": "23.50"},
                        "debtToEquity": {"raw": 45.2, "fmt": "45.20%"},
                        "profitMargins": {"raw": -0.0123, "fmt": "-1.23%"},
                        "revenueGrowth": {"raw": 0.25, "fmt": "25%"}
                    },
                    "summaryProfile": {
                        "industry": "Specialty Retail",
                        "sector": "Consumer Cyclical"
                    },
                    "defaultKeyStatistics": {
                        "shortPercentOfFloat": {"raw": 0.21},
                        "beta": {"raw": 1.6},
                        "forwardPE": {"raw": 80.1}
                    }
                }],
                "error": null
            }
        })
    }

    #[test]
    fn test_parse_quote_summary_units() {
        let f = parse_quote_summary("GME", &payload()).unwrap();
        assert_eq!(f.company_name.as_deref(), Some("GameStop Corp."));
        assert_eq!(f.industry.as_deref(), Some("Specialty Retail"));
        assert_eq!(f.market_cap, Some(7.2e9));
        assert_eq!(f.current_price, Some(23.5));
        assert!((f.debt_to_equity.unwrap() - 0.452).abs() < 1e-9);
        assert!((f.profit_margin.unwrap() - -1.23).abs() < 1e-9);
        assert!((f.revenue_growth.unwrap() - 25.0).abs() < 1e-9);
        assert!((f.short_float_pct.unwrap() - 21.0).abs() < 1e-9);
        assert_eq!(f.pe_ratio, Some(80.1));
        assert_eq!(f.volume, Some(5_400_000));
        assert!(f.raw_data.get("price").is_some());
    }

    #[test]
    fn test_parse_missing_fields_stay_none() {
        let json = json!({
            "quoteSummary": {"result": [{"price": {"shortName": "Tiny Co", "regularMarketPrice": 1.05}}]}
        });
        let f = parse_quote_summary("TINY", &json).unwrap();
        assert_eq!(f.company_name.as_deref(), Some("Tiny Co"));
        assert_eq!(f.current_price, Some(1.05));
        assert!(f.market_cap.is_none());
        assert!(f.debt_to_equity.is_none());
        assert!(f.industry.is_none());
    }

    #[test]
    fn test_fundamentals_backoff_waits_once() {
        let policy = fundamentals_backoff();
        assert_eq!(policy.max_attempts, 2);
        assert_eq!(policy.delay_for(1), Duration::from_secs(40));
    }

    #[test]
    fn test_parse_empty_result() {
        let json = json!({"quoteSummary": {"result": [], "error": null}});
        assert!(parse_quote_summary("NONE", &json).is_none());

        let json = json!({"quoteSummary": {"result": null, "error": {"code": "Not Found"}}});
        assert!(parse_quote_summary("NONE", &json).is_none());
    }
}

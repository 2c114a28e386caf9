use serde::{Deserialize, Serialize};
use signal_core::{Fundamentals, HealthAssessment};

/// Deduction rules for the fundamental health score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthThresholds {
    pub min_market_cap: f64,
    /// Plain ratio, 2.0 means debt is twice equity
    pub max_debt_to_equity: f64,
    /// Percent
    pub min_profit_margin: f64,
    /// Percent; growth above this earns a bonus
    pub strong_revenue_growth: f64,
    pub healthy_score: f64,
    pub max_reasons: usize,
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self {
            min_market_cap: 500_000_000.0,
            max_debt_to_equity: 2.0,
            min_profit_margin: -50.0,
            strong_revenue_growth: 20.0,
            healthy_score: 60.0,
            max_reasons: 1,
        }
    }
}

const MARKET_CAP_PENALTY: f64 = 30.0;
const DEBT_PENALTY: f64 = 20.0;
const MARGIN_PENALTY: f64 = 25.0;
const MISSING_FIELD_PENALTY: f64 = 15.0;
const GROWTH_BONUS: f64 = 10.0;

/// Score fundamentals starting from 100.
///
/// A missing market cap is penalised twice: once as a failed market cap check and
/// once more as a missing critical field.
pub fn check_health(fundamentals: &Fundamentals, thresholds: &HealthThresholds) -> HealthAssessment {
    let mut reasons = Vec::new();
    let mut score = 100.0;

    match fundamentals.market_cap {
        None => {
            reasons.push("Missing market cap data".to_string());
            score -= MARKET_CAP_PENALTY;
        }
        Some(cap) if cap < thresholds.min_market_cap => {
            reasons.push(format!(
                "Market cap ${:.0} below minimum ${:.0}",
                cap, thresholds.min_market_cap
            ));
            score -= MARKET_CAP_PENALTY;
        }
        Some(_) => {}
    }

    if let Some(ratio) = fundamentals.debt_to_equity {
        if ratio > thresholds.max_debt_to_equity {
            reasons.push(format!(
                "Debt-to-equity {:.2} exceeds maximum {}",
                ratio, thresholds.max_debt_to_equity
            ));
            score -= DEBT_PENALTY;
        }
    }

    if let Some(margin) = fundamentals.profit_margin {
        if margin < thresholds.min_profit_margin {
            reasons.push(format!(
                "Profit margin {:.2}% below minimum {}%",
                margin, thresholds.min_profit_margin
            ));
            score -= MARGIN_PENALTY;
        }
    }

    let missing = missing_critical_fields(fundamentals);
    if !missing.is_empty() {
        reasons.push(format!("Missing critical data: {}", missing.join(", ")));
        score -= MISSING_FIELD_PENALTY * missing.len() as f64;
    }

    if let Some(growth) = fundamentals.revenue_growth {
        if growth > thresholds.strong_revenue_growth {
            tracing::debug!("{}: strong revenue growth {:.2}%", fundamentals.symbol, growth);
            score += GROWTH_BONUS;
        }
    }

    let health_score = f64::clamp(score, 0.0, 100.0);
    let is_healthy = health_score >= thresholds.healthy_score && reasons.len() <= thresholds.max_reasons;

    if is_healthy {
        tracing::info!(
            "{} passed health check (score: {:.1}/100)",
            fundamentals.symbol,
            health_score
        );
    } else {
        tracing::warn!(
            "{} failed health check (score: {:.1}/100): {}",
            fundamentals.symbol,
            health_score,
            reasons.join(", ")
        );
    }

    HealthAssessment {
        is_healthy,
        reasons,
        health_score,
    }
}

fn missing_critical_fields(f: &Fundamentals) -> Vec<&'static str> {
    let mut missing = Vec::new();
    if !f.market_cap.is_some_and(|v| v > 0.0) {
        missing.push("market_cap");
    }
    if !f.current_price.is_some_and(|v| v > 0.0) {
        missing.push("current_price");
    }
    if f.company_name.as_deref().map_or(true, |name| name.trim().is_empty()) {
        missing.push("company_name");
    }
    missing
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete() -> Fundamentals {
        Fundamentals {
            symbol: "AAPL".to_string(),
            company_name: Some("Apple Inc.".to_string()),
            market_cap: Some(3.0e12),
            current_price: Some(190.0),
            debt_to_equity: Some(1.5),
            profit_margin: Some(25.0),
            revenue_growth: Some(5.0),
            ..Default::default()
        }
    }

    #[test]
    fn test_complete_fundamentals_are_healthy() {
        let a = check_health(&complete(), &HealthThresholds::default());
        assert_eq!(a.health_score, 100.0);
        assert!(a.is_healthy);
        assert!(a.reasons.is_empty());
    }

    #[test]
    fn test_each_deduction() {
        let t = HealthThresholds::default();

        let mut small = complete();
        small.market_cap = Some(1.0e8);
        assert_eq!(check_health(&small, &t).health_score, 70.0);

        let mut levered = complete();
        levered.debt_to_equity = Some(2.5);
        assert_eq!(check_health(&levered, &t).health_score, 80.0);

        let mut burning = complete();
        burning.profit_margin = Some(-60.0);
        assert_eq!(check_health(&burning, &t).health_score, 75.0);
    }

    #[test]
    fn test_thresholds_are_exclusive() {
        let mut f = complete();
        f.market_cap = Some(500_000_000.0);
        f.debt_to_equity = Some(2.0);
        f.profit_margin = Some(-50.0);
        let a = check_health(&f, &HealthThresholds::default());
        assert_eq!(a.health_score, 100.0);
    }

    #[test]
    fn test_missing_market_cap_stacks_with_missing_field() {
        let f = Fundamentals {
            market_cap: None,
            debt_to_equity: Some(1.0),
            profit_margin: Some(5.0),
            ..complete()
        };
        let a = check_health(&f, &HealthThresholds::default());
        assert_eq!(a.health_score, 55.0);
        assert_eq!(
            a.reasons,
            vec!["Missing market cap data", "Missing critical data: market_cap"]
        );
        assert!(!a.is_healthy);
    }

    #[test]
    fn test_single_reason_with_passing_score_is_healthy() {
        let mut f = complete();
        f.market_cap = Some(2.0e8);
        let a = check_health(&f, &HealthThresholds::default());
        assert_eq!(a.health_score, 70.0);
        assert_eq!(a.reasons.len(), 1);
        assert!(a.is_healthy);
    }

    #[test]
    fn test_passing_score_with_two_reasons_is_unhealthy() {
        let mut f = complete();
        f.debt_to_equity = Some(3.0);
        f.current_price = None;
        let a = check_health(&f, &HealthThresholds::default());
        assert_eq!(a.health_score, 65.0);
        assert_eq!(a.reasons.len(), 2);
        assert!(!a.is_healthy);
    }

    #[test]
    fn test_three_missing_fields_and_clamping() {
        let bare = Fundamentals {
            symbol: "XYZ".to_string(),
            ..Default::default()
        };
        // -30 for market cap, -45 for three missing fields
        let a = check_health(&bare, &HealthThresholds::default());
        assert_eq!(a.health_score, 25.0);
        assert_eq!(
            a.reasons.last().map(String::as_str),
            Some("Missing critical data: market_cap, current_price, company_name")
        );

        let worst = Fundamentals {
            debt_to_equity: Some(9.0),
            profit_margin: Some(-300.0),
            ..bare
        };
        assert_eq!(check_health(&worst, &HealthThresholds::default()).health_score, 0.0);
    }

    #[test]
    fn test_revenue_growth_bonus_is_capped() {
        let mut f = complete();
        f.revenue_growth = Some(35.0);
        assert_eq!(check_health(&f, &HealthThresholds::default()).health_score, 100.0);

        f.market_cap = Some(1.0e8);
        let a = check_health(&f, &HealthThresholds::default());
        assert_eq!(a.health_score, 80.0);
        assert_eq!(a.reasons.len(), 1);
    }
}

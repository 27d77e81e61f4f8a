use crate::domain::company::{CompanyOverview, EarningsRecord};
use crate::domain::{parse_num, parse_opt_num};

pub fn pct_change(current: f64, previous: f64) -> Option<f64> {
    if previous == 0.0 {
        return None;
    }
    Some((current - previous) / previous.abs() * 100.0)
}

pub fn format_signed_pct(value: f64) -> String {
    let sign = if value > 0.0 { "+" } else { "" };
    format!("{sign}{value:.1}%")
}

pub fn eps_change(current: &EarningsRecord, previous: &EarningsRecord) -> Option<String> {
    let now = current.reported_eps_value()?;
    let before = previous.reported_eps_value()?;
    pct_change(now, before).map(format_signed_pct)
}

pub fn revenue_change(current: &str, previous: &str) -> Option<String> {
    pct_change(parse_num(current)?, parse_num(previous)?).map(format_signed_pct)
}

pub fn guidance_vs_actual(record: &EarningsRecord) -> Option<String> {
    parse_opt_num(record.surprise_percentage.as_deref()).map(format_signed_pct)
}

pub fn historical_pe(close: f64, eps: Option<f64>) -> Option<f64> {
    let eps = eps.filter(|e| *e > 0.0)?;
    Some(close / eps)
}

// Shares are inferred as current market cap over the 52-week high.
pub fn estimate_market_cap(close: f64, overview: &CompanyOverview) -> Option<String> {
    let market_cap = overview.market_cap_value()?;
    let reference_price = overview.fifty_two_week_high_value().filter(|p| *p > 0.0)?;
    let shares = market_cap / reference_price;
    let estimate = (close * shares).trunc();
    estimate
        .is_finite()
        .then(|| format!("{}", estimate as i64))
}

pub mod metrics;

use crate::domain::company::{CompanyOverview, EarningsRecord, FinancialSnapshot, Quarter};
use crate::domain::parse_num;
use crate::error::EarningsError;
use crate::time::price_window::{PriceHistory, DATE_FORMAT};
use crate::upstream::types::IncomeStatement;
use anyhow::{Context, Result};
use chrono::NaiveDate;

#[async_trait::async_trait]
pub trait FinancialSources: Send + Sync {
    async fn overview(&self, ticker: &str) -> Result<CompanyOverview>;

    async fn earnings(&self, ticker: &str) -> Result<Vec<EarningsRecord>>;

    async fn income_statement(&self, ticker: &str) -> Result<IncomeStatement>;

    async fn price_history(&self, ticker: &str) -> Result<PriceHistory>;
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuarterlyRevenue {
    pub revenue: Option<String>,
    pub change: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoricalValuation {
    pub pe_ratio: Option<f64>,
    pub market_cap: Option<String>,
}

/// The previous quarter is the record right after the target in the earnings list, so the
/// list must be strictly reverse-chronological. The year-ago quarter is looked up by
/// (quarter, year - 1) instead.
pub async fn reconcile(
    sources: &dyn FinancialSources,
    ticker: &str,
    period: Option<(Quarter, i32)>,
) -> Result<FinancialSnapshot> {
    let overview = sources.overview(ticker).await?;
    let earnings = sources.earnings(ticker).await?;

    let index = select_target(&earnings, period).ok_or_else(|| {
        let wanted = match period {
            Some((q, y)) => format!("{q} {y}"),
            None => "any quarter".to_string(),
        };
        EarningsError::not_found(format!("no earnings data found for {ticker} {wanted}"))
    })?;
    let target = &earnings[index];

    let eps_change = earnings
        .get(index + 1)
        .and_then(|previous| metrics::eps_change(target, previous));
    let yoy_growth =
        year_ago(&earnings, target).and_then(|prior| metrics::eps_change(target, prior));
    let guidance_vs_actual = metrics::guidance_vs_actual(target);

    let quarterly = match resolve_quarterly_revenue(sources, ticker, target).await {
        Ok(q) => q,
        Err(err) => {
            tracing::warn!(%ticker, error = %err, "quarterly revenue unavailable; using TTM");
            QuarterlyRevenue::default()
        }
    };

    let valuation = match resolve_historical_valuation(sources, ticker, target, &overview).await {
        Ok(v) => v,
        Err(err) => {
            tracing::warn!(
                %ticker,
                error = %err,
                "historical valuation unavailable; using current figures"
            );
            HistoricalValuation::default()
        }
    };

    let eps = target
        .reported_eps
        .clone()
        .filter(|_| target.reported_eps_value().is_some())
        .or_else(|| overview.eps.clone());

    Ok(FinancialSnapshot {
        ticker: target.ticker.clone(),
        quarter: target.quarter,
        year: target.year,
        fiscal_date_ending: target.fiscal_date_ending.clone(),
        revenue: quarterly.revenue.or_else(|| overview.revenue_ttm.clone()),
        revenue_change: quarterly.change,
        eps,
        eps_change,
        pe_ratio: valuation.pe_ratio.or_else(|| overview.pe_ratio_value()),
        market_cap: valuation.market_cap.or_else(|| overview.market_cap.clone()),
        yoy_growth,
        guidance_vs_actual,
    })
}

pub fn select_target(earnings: &[EarningsRecord], period: Option<(Quarter, i32)>) -> Option<usize> {
    match period {
        Some((quarter, year)) => earnings.iter().position(|e| e.is_period(quarter, year)),
        None => (!earnings.is_empty()).then_some(0),
    }
}

pub fn year_ago<'a>(earnings: &'a [EarningsRecord], target: &EarningsRecord) -> Option<&'a EarningsRecord> {
    earnings
        .iter()
        .find(|e| e.is_period(target.quarter, target.year - 1))
}

// A report with no exact fiscal-date match is not an error; the caller keeps the TTM figure.
pub async fn resolve_quarterly_revenue(
    sources: &dyn FinancialSources,
    ticker: &str,
    target: &EarningsRecord,
) -> Result<QuarterlyRevenue> {
    let Some(fiscal_date) = target.fiscal_date_ending.as_deref() else {
        return Ok(QuarterlyRevenue::default());
    };

    let statement = sources
        .income_statement(ticker)
        .await
        .context("income statement fetch failed")?;
    let reports = &statement.quarterly_reports;

    let Some(pos) = reports.iter().position(|r| r.fiscal_date_ending == fiscal_date) else {
        return Ok(QuarterlyRevenue::default());
    };

    let revenue = reports[pos]
        .total_revenue
        .clone()
        .filter(|r| parse_num(r).is_some());
    let change = match (revenue.as_deref(), reports.get(pos + 1)) {
        (Some(now), Some(prev)) => prev
            .total_revenue
            .as_deref()
            .and_then(|before| metrics::revenue_change(now, before)),
        _ => None,
    };

    Ok(QuarterlyRevenue { revenue, change })
}

pub async fn resolve_historical_valuation(
    sources: &dyn FinancialSources,
    ticker: &str,
    target: &EarningsRecord,
    overview: &CompanyOverview,
) -> Result<HistoricalValuation> {
    let history = sources
        .price_history(ticker)
        .await
        .context("daily price fetch failed")?;
    anyhow::ensure!(!history.is_empty(), "daily price series is empty");

    let report_date = NaiveDate::parse_from_str(target.date.trim(), DATE_FORMAT)
        .with_context(|| format!("unparseable report date {:?}", target.date))?;

    let (price_date, close) = history
        .close_near(report_date)
        .with_context(|| format!("no positive close within a week of {report_date}"))?;
    tracing::debug!(%ticker, %report_date, %price_date, close, "priced at report date");

    Ok(HistoricalValuation {
        pe_ratio: metrics::historical_pe(close, target.reported_eps_value()),
        market_cap: metrics::estimate_market_cap(close, overview),
    })
}

use crate::domain::company::CompanySearchResult;
use crate::domain::transcript::TranscriptPayload;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Deserialize)]
pub struct SymbolSearchResponse {
    #[serde(rename = "bestMatches", default)]
    pub best_matches: Option<Vec<CompanySearchResult>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EarningsResponse {
    #[serde(rename = "quarterlyEarnings", default)]
    pub quarterly_earnings: Option<Vec<RawQuarterlyEarning>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawQuarterlyEarning {
    #[serde(rename = "fiscalDateEnding", default)]
    pub fiscal_date_ending: Option<String>,
    #[serde(rename = "reportedDate", default)]
    pub reported_date: Option<String>,
    #[serde(rename = "reportedEPS", default)]
    pub reported_eps: Option<String>,
    #[serde(rename = "estimatedEPS", default)]
    pub estimated_eps: Option<String>,
    #[serde(default)]
    pub surprise: Option<String>,
    #[serde(rename = "surprisePercentage", default)]
    pub surprise_percentage: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IncomeStatement {
    #[serde(rename = "quarterlyReports", default)]
    pub quarterly_reports: Vec<QuarterlyIncomeReport>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuarterlyIncomeReport {
    #[serde(rename = "fiscalDateEnding", default)]
    pub fiscal_date_ending: String,
    #[serde(rename = "totalRevenue", default)]
    pub total_revenue: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DailySeriesResponse {
    #[serde(rename = "Time Series (Daily)", default)]
    pub series: Option<BTreeMap<String, RawDailyBar>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawDailyBar {
    #[serde(rename = "4. close", default)]
    pub close: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TranscriptResponse {
    #[serde(default)]
    pub transcript: Option<TranscriptPayload>,
    #[serde(rename = "fiscalDateEnding", default)]
    pub fiscal_date_ending: Option<String>,
}

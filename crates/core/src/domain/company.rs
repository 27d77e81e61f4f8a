use crate::domain::parse_opt_num;
use crate::error::EarningsError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanySearchResult {
    #[serde(alias = "1. symbol")]
    pub ticker: String,
    #[serde(alias = "2. name")]
    pub name: String,
    #[serde(rename = "type", alias = "3. type")]
    pub security_type: String,
    #[serde(alias = "4. region")]
    pub region: String,
    #[serde(alias = "8. currency")]
    pub currency: String,
}

impl CompanySearchResult {
    pub fn is_us_common_equity(&self) -> bool {
        self.security_type == "Equity"
            && self.region == "United States"
            && !self.ticker.contains('.')
            && !self.ticker.contains('-')
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyOverview {
    #[serde(alias = "Symbol")]
    pub symbol: String,
    #[serde(alias = "Name")]
    pub name: String,
    #[serde(default, alias = "Description")]
    pub description: Option<String>,
    #[serde(default, alias = "Sector")]
    pub sector: Option<String>,
    #[serde(default, alias = "Industry")]
    pub industry: Option<String>,
    #[serde(default, alias = "MarketCapitalization")]
    pub market_cap: Option<String>,
    #[serde(default, alias = "PERatio")]
    pub pe_ratio: Option<String>,
    #[serde(default, alias = "EPS")]
    pub eps: Option<String>,
    #[serde(default, alias = "RevenueTTM")]
    pub revenue_ttm: Option<String>,
    #[serde(default, alias = "ProfitMargin")]
    pub profit_margin: Option<String>,
    #[serde(default, alias = "OperatingMarginTTM")]
    pub operating_margin_ttm: Option<String>,
    #[serde(default, alias = "ReturnOnEquityTTM")]
    pub return_on_equity_ttm: Option<String>,
    #[serde(default, alias = "DividendYield")]
    pub dividend_yield: Option<String>,
    #[serde(default, alias = "52WeekHigh")]
    pub fifty_two_week_high: Option<String>,
    #[serde(default, alias = "52WeekLow")]
    pub fifty_two_week_low: Option<String>,
}

impl CompanyOverview {
    pub fn market_cap_value(&self) -> Option<f64> {
        parse_opt_num(self.market_cap.as_deref())
    }

    pub fn pe_ratio_value(&self) -> Option<f64> {
        parse_opt_num(self.pe_ratio.as_deref())
    }

    pub fn fifty_two_week_high_value(&self) -> Option<f64> {
        parse_opt_num(self.fifty_two_week_high.as_deref())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Quarter {
    Q1,
    Q2,
    Q3,
    Q4,
}

impl Quarter {
    pub fn number(self) -> u32 {
        match self {
            Quarter::Q1 => 1,
            Quarter::Q2 => 2,
            Quarter::Q3 => 3,
            Quarter::Q4 => 4,
        }
    }

    pub fn from_month(month: u32) -> Option<Self> {
        match month {
            1..=3 => Some(Quarter::Q1),
            4..=6 => Some(Quarter::Q2),
            7..=9 => Some(Quarter::Q3),
            10..=12 => Some(Quarter::Q4),
            _ => None,
        }
    }
}

impl fmt::Display for Quarter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Q{}", self.number())
    }
}

impl FromStr for Quarter {
    type Err = EarningsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "Q1" => Ok(Quarter::Q1),
            "Q2" => Ok(Quarter::Q2),
            "Q3" => Ok(Quarter::Q3),
            "Q4" => Ok(Quarter::Q4),
            other => Err(EarningsError::invalid_input(format!(
                "quarter must be one of Q1, Q2, Q3, Q4 (got {other:?})"
            ))),
        }
    }
}

pub fn parse_quarter_path(s: &str) -> Result<(Quarter, i32), EarningsError> {
    let Some((quarter, year)) = s.split_once('-') else {
        return Err(EarningsError::invalid_input(
            "quarter must be in the form Q1-2024, or pass the year separately",
        ));
    };
    let quarter = quarter.parse::<Quarter>()?;
    let year = parse_year(year)?;
    Ok((quarter, year))
}

pub fn parse_year(s: &str) -> Result<i32, EarningsError> {
    s.trim()
        .parse::<i32>()
        .ok()
        .filter(|y| (1900..=9999).contains(y))
        .ok_or_else(|| EarningsError::invalid_input(format!("invalid year {s:?}")))
}

/// One reported quarter. Collections of these are most-recent-first, as the upstream
/// returns them; "previous quarter" lookups rely on that order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EarningsRecord {
    pub id: String,
    pub ticker: String,
    pub quarter: Quarter,
    pub year: i32,
    pub date: String,
    pub fiscal_date_ending: Option<String>,
    pub reported_eps: Option<String>,
    pub estimated_eps: Option<String>,
    pub surprise: Option<String>,
    pub surprise_percentage: Option<String>,
    pub status: String,
}

impl EarningsRecord {
    pub fn reported_eps_value(&self) -> Option<f64> {
        parse_opt_num(self.reported_eps.as_deref())
    }

    pub fn is_period(&self, quarter: Quarter, year: i32) -> bool {
        self.quarter == quarter && self.year == year
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialSnapshot {
    pub ticker: String,
    pub quarter: Quarter,
    pub year: i32,
    pub fiscal_date_ending: Option<String>,
    pub revenue: Option<String>,
    pub revenue_change: Option<String>,
    pub eps: Option<String>,
    pub eps_change: Option<String>,
    pub pe_ratio: Option<f64>,
    pub market_cap: Option<String>,
    pub yoy_growth: Option<String>,
    pub guidance_vs_actual: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EarningsCalendarItem {
    pub symbol: String,
    pub name: String,
    pub report_date: String,
    pub fiscal_date_ending: String,
    pub estimate: Option<String>,
    pub currency: String,
}

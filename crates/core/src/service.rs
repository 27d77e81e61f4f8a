use crate::config::Settings;
use crate::domain::company::{
    CompanyOverview, CompanySearchResult, EarningsCalendarItem, EarningsRecord, FinancialSnapshot,
    Quarter,
};
use crate::domain::transcript::TranscriptData;
use crate::error::EarningsError;
use crate::financials::{self, FinancialSources};
use crate::storage::ResponseCache;
use crate::time::price_window::{PriceHistory, DATE_FORMAT};
use crate::transcript;
use crate::upstream::calendar;
use crate::upstream::types::{
    DailySeriesResponse, EarningsResponse, IncomeStatement, RawQuarterlyEarning,
    SymbolSearchResponse, TranscriptResponse,
};
use crate::upstream::{Function, HttpTransport, RateLimiter, UpstreamClient};
use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate};
use std::sync::Arc;

pub const MAX_EARNINGS_RECORDS: usize = 20;
pub const FULL_OUTPUT_SIZE: &str = "full";
const RECORDED_STATUS: &str = "recorded";

#[derive(Debug)]
pub struct EarningsService {
    client: UpstreamClient,
    cache: ResponseCache,
    filter_us_equities_only: bool,
}

impl EarningsService {
    pub fn new(client: UpstreamClient, cache: ResponseCache, filter_us_equities_only: bool) -> Self {
        Self {
            client,
            cache,
            filter_us_equities_only,
        }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let api_key = settings.require_api_key()?;
        let transport = HttpTransport::from_settings(settings)?;
        let limiter = RateLimiter::new(settings.rate_limit_per_minute);
        tracing::info!(
            calls_per_minute = settings.rate_limit_per_minute,
            filter_us_equities_only = settings.filter_us_equities_only,
            "earnings service ready"
        );

        Ok(Self::new(
            UpstreamClient::new(Arc::new(transport), limiter, api_key),
            ResponseCache::default(),
            settings.filter_us_equities_only,
        ))
    }

    pub async fn search(&self, keywords: &str) -> Result<Vec<CompanySearchResult>> {
        let keywords = keywords.trim();
        if keywords.is_empty() {
            return Err(EarningsError::invalid_input("search keywords must not be empty").into());
        }

        let key = format!("search:{}", keywords.to_lowercase());
        let matches: Vec<CompanySearchResult> = self
            .cache
            .get_or_fetch(&key, || self.fetch_search(keywords))
            .await?;

        if !self.filter_us_equities_only {
            return Ok(matches);
        }
        Ok(matches
            .into_iter()
            .filter(CompanySearchResult::is_us_common_equity)
            .collect())
    }

    async fn fetch_search(&self, keywords: &str) -> Result<Vec<CompanySearchResult>> {
        let body = self
            .client
            .request_json(Function::SymbolSearch, &[("keywords", keywords)])
            .await?;
        let parsed: SymbolSearchResponse =
            serde_json::from_value(body).context("unexpected symbol search payload")?;
        Ok(parsed.best_matches.unwrap_or_default())
    }

    pub async fn overview(&self, ticker: &str) -> Result<CompanyOverview> {
        let ticker = normalize_ticker(ticker)?;
        let key = format!("overview:{ticker}");
        self.cache
            .get_or_fetch(&key, || self.fetch_overview(&ticker))
            .await
    }

    async fn fetch_overview(&self, ticker: &str) -> Result<CompanyOverview> {
        let body = self
            .client
            .request_json(Function::Overview, &[("symbol", ticker)])
            .await?;
        if body.get("Symbol").is_none() {
            return Err(EarningsError::not_found(format!("company {ticker} not found")).into());
        }
        serde_json::from_value(body)
            .with_context(|| format!("unexpected overview payload for {ticker}"))
    }

    pub async fn earnings(&self, ticker: &str) -> Result<Vec<EarningsRecord>> {
        let ticker = normalize_ticker(ticker)?;
        let key = format!("earnings:{ticker}");
        self.cache
            .get_or_fetch(&key, || self.fetch_earnings(&ticker))
            .await
    }

    async fn fetch_earnings(&self, ticker: &str) -> Result<Vec<EarningsRecord>> {
        let body = self
            .client
            .request_json(Function::Earnings, &[("symbol", ticker)])
            .await?;
        let parsed: EarningsResponse = serde_json::from_value(body)
            .with_context(|| format!("unexpected earnings payload for {ticker}"))?;

        Ok(parsed
            .quarterly_earnings
            .unwrap_or_default()
            .into_iter()
            .take(MAX_EARNINGS_RECORDS)
            .filter_map(|raw| to_record(ticker, raw))
            .collect())
    }

    pub async fn calendar(&self, horizon: Option<&str>) -> Result<Vec<EarningsCalendarItem>> {
        let horizon = calendar::validate_horizon(horizon.unwrap_or(calendar::DEFAULT_HORIZON))?;
        let key = format!("calendar:{horizon}");
        self.cache
            .get_or_fetch(&key, || async {
                let csv = self
                    .client
                    .request_text(Function::EarningsCalendar, &[("horizon", horizon)])
                    .await?;
                Ok::<_, anyhow::Error>(calendar::parse_calendar_csv(&csv))
            })
            .await
    }

    pub async fn transcript(
        &self,
        ticker: &str,
        quarter: Quarter,
        year: i32,
    ) -> Result<TranscriptData> {
        let ticker = normalize_ticker(ticker)?;
        let key = format!("transcript:{ticker}:{quarter}:{year}");
        self.cache
            .get_or_fetch(&key, || self.fetch_transcript(&ticker, quarter, year))
            .await
    }

    async fn fetch_transcript(
        &self,
        ticker: &str,
        quarter: Quarter,
        year: i32,
    ) -> Result<TranscriptData> {
        let period = format!("{year}{quarter}");
        let body = self
            .client
            .request_json(
                Function::EarningsCallTranscript,
                &[("symbol", ticker), ("quarter", period.as_str())],
            )
            .await?;
        let parsed: TranscriptResponse = serde_json::from_value(body)
            .with_context(|| format!("unexpected transcript payload for {ticker} {period}"))?;

        let text = parsed
            .transcript
            .filter(|p| !p.is_empty())
            .map(|p| transcript::flatten(&p))
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| {
                EarningsError::not_found(format!("no transcript for {ticker} {quarter} {year}"))
            })?;

        let entries = transcript::parse_entries(&text);
        tracing::debug!(%ticker, %quarter, year, entries = entries.len(), "transcript parsed");

        Ok(TranscriptData {
            ticker: ticker.to_string(),
            quarter,
            year,
            fiscal_date_ending: parsed
                .fiscal_date_ending
                .unwrap_or_else(|| format!("{year}-{:02}-01", quarter.number() * 3)),
            transcript: text,
            entries,
        })
    }

    pub async fn income_statement(&self, ticker: &str) -> Result<IncomeStatement> {
        let ticker = normalize_ticker(ticker)?;
        let key = format!("income_statement:{ticker}");
        self.cache
            .get_or_fetch(&key, || async {
                let body = self
                    .client
                    .request_json(Function::IncomeStatement, &[("symbol", ticker.as_str())])
                    .await?;
                serde_json::from_value(body)
                    .with_context(|| format!("unexpected income statement payload for {ticker}"))
            })
            .await
    }

    pub async fn daily_prices(&self, ticker: &str, output_size: &str) -> Result<PriceHistory> {
        let ticker = normalize_ticker(ticker)?;
        let key = format!("daily_prices:{ticker}:{output_size}");
        self.cache
            .get_or_fetch(&key, || async {
                let body = self
                    .client
                    .request_json(
                        Function::TimeSeriesDaily,
                        &[("symbol", ticker.as_str()), ("outputsize", output_size)],
                    )
                    .await?;
                let parsed: DailySeriesResponse = serde_json::from_value(body)
                    .with_context(|| format!("unexpected daily series payload for {ticker}"))?;
                let series = parsed.series.ok_or_else(|| {
                    EarningsError::not_found(format!("no daily prices for {ticker}"))
                })?;
                Ok::<_, anyhow::Error>(PriceHistory::from_series(&series))
            })
            .await
    }

    pub async fn financials(
        &self,
        ticker: &str,
        quarter: Option<Quarter>,
        year: Option<i32>,
    ) -> Result<FinancialSnapshot> {
        let ticker = normalize_ticker(ticker)?;
        let period = match (quarter, year) {
            (Some(q), Some(y)) => Some((q, y)),
            (None, None) => None,
            _ => {
                return Err(EarningsError::invalid_input(
                    "quarter and year must be given together",
                )
                .into())
            }
        };

        let key = match period {
            Some((q, y)) => format!("financials:{ticker}:{q}:{y}"),
            None => format!("financials:{ticker}:latest:latest"),
        };
        self.cache
            .get_or_fetch(&key, || financials::reconcile(self, &ticker, period))
            .await
    }
}

#[async_trait::async_trait]
impl FinancialSources for EarningsService {
    async fn overview(&self, ticker: &str) -> Result<CompanyOverview> {
        EarningsService::overview(self, ticker).await
    }

    async fn earnings(&self, ticker: &str) -> Result<Vec<EarningsRecord>> {
        EarningsService::earnings(self, ticker).await
    }

    async fn income_statement(&self, ticker: &str) -> Result<IncomeStatement> {
        EarningsService::income_statement(self, ticker).await
    }

    async fn price_history(&self, ticker: &str) -> Result<PriceHistory> {
        self.daily_prices(ticker, FULL_OUTPUT_SIZE).await
    }
}

pub fn normalize_ticker(ticker: &str) -> Result<String, EarningsError> {
    let ticker = ticker.trim();
    if ticker.is_empty() {
        return Err(EarningsError::invalid_input("ticker must not be empty"));
    }
    Ok(ticker.to_ascii_uppercase())
}

fn to_record(ticker: &str, raw: RawQuarterlyEarning) -> Option<EarningsRecord> {
    let fiscal = raw.fiscal_date_ending.filter(|s| !s.trim().is_empty())?;
    let Ok(fiscal_date) = NaiveDate::parse_from_str(fiscal.trim(), DATE_FORMAT) else {
        tracing::debug!(%ticker, %fiscal, "skipping earnings row with unparseable fiscal date");
        return None;
    };
    let quarter = Quarter::from_month(fiscal_date.month())?;
    let year = fiscal_date.year();

    Some(EarningsRecord {
        id: format!("{ticker}-{quarter}-{year}"),
        ticker: ticker.to_string(),
        quarter,
        year,
        date: raw
            .reported_date
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| fiscal.clone()),
        fiscal_date_ending: Some(fiscal),
        reported_eps: raw.reported_eps,
        estimated_eps: raw.estimated_eps,
        surprise: raw.surprise,
        surprise_percentage: raw.surprise_percentage,
        status: RECORDED_STATUS.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{kind_of, ErrorKind};
    use crate::upstream::fake::FakeTransport;
    use serde_json::{json, Value};

    fn service(fake: &Arc<FakeTransport>, filter: bool) -> EarningsService {
        EarningsService::new(
            UpstreamClient::new(fake.clone(), RateLimiter::new(0), "test-key"),
            ResponseCache::default(),
            filter,
        )
    }

    fn search_body() -> Value {
        json!({"bestMatches": [
            {"1. symbol": "AAPL", "2. name": "Apple Inc", "3. type": "Equity",
             "4. region": "United States", "8. currency": "USD", "9. matchScore": "1.0"},
            {"1. symbol": "APLE", "2. name": "Apple Hospitality ETF", "3. type": "ETF",
             "4. region": "United States", "8. currency": "USD", "9. matchScore": "0.5"},
            {"1. symbol": "AAPL.TRT", "2. name": "Apple CDR", "3. type": "Equity",
             "4. region": "Toronto", "8. currency": "CAD", "9. matchScore": "0.4"}
        ]})
    }

    fn overview_body() -> Value {
        json!({
            "Symbol": "ACME",
            "Name": "Acme Corp",
            "MarketCapitalization": "4000000",
            "PERatio": "31.5",
            "EPS": "7.1",
            "RevenueTTM": "900000",
            "52WeekHigh": "200"
        })
    }

    fn earnings_body() -> Value {
        json!({"symbol": "ACME", "quarterlyEarnings": [
            {"fiscalDateEnding": "2024-12-31", "reportedDate": "2025-01-30",
             "reportedEPS": "2.0", "estimatedEPS": "1.9", "surprise": "0.1", "surprisePercentage": "5.2632"},
            {"fiscalDateEnding": "2024-09-30", "reportedDate": "2024-10-31", "reportedEPS": "1.5"},
            {"fiscalDateEnding": "2023-12-31", "reportedDate": "2024-02-01", "reportedEPS": "1.8"}
        ]})
    }

    #[tokio::test]
    async fn search_filter_follows_setting() {
        let fake = Arc::new(FakeTransport::new());
        fake.respond_json(Function::SymbolSearch, search_body());

        let filtered = service(&fake, true).search("apple").await.unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].ticker, "AAPL");

        let all = service(&fake, false).search("apple").await.unwrap();
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn blank_search_is_rejected_without_upstream_call() {
        let fake = Arc::new(FakeTransport::new());
        let err = service(&fake, true).search("   ").await.unwrap_err();
        assert_eq!(kind_of(&err), Some(ErrorKind::InvalidInput));
        assert_eq!(fake.total_calls(), 0);
    }

    #[tokio::test]
    async fn repeated_lookups_hit_the_cache() {
        let fake = Arc::new(FakeTransport::new());
        fake.respond_json(Function::Overview, overview_body());
        let svc = service(&fake, true);

        let first = svc.overview("acme").await.unwrap();
        let second = svc.overview("ACME").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.name, "Acme Corp");
        assert_eq!(fake.calls(Function::Overview), 1);
    }

    #[tokio::test]
    async fn overview_without_symbol_is_not_found() {
        let fake = Arc::new(FakeTransport::new());
        fake.respond_json(Function::Overview, json!({}));
        let err = service(&fake, true).overview("NOPE").await.unwrap_err();
        assert_eq!(kind_of(&err), Some(ErrorKind::NotFound));
    }

    #[tokio::test]
    async fn earnings_are_shaped_from_fiscal_dates() {
        let fake = Arc::new(FakeTransport::new());
        let mut rows: Vec<Value> = (0..25)
            .map(|i| json!({"fiscalDateEnding": format!("{}-06-30", 2024 - i), "reportedEPS": "1.0"}))
            .collect();
        rows.insert(1, json!({"reportedEPS": "9.9"}));
        fake.respond_json(Function::Earnings, json!({"quarterlyEarnings": rows}));

        let records = service(&fake, true).earnings("acme").await.unwrap();
        // 20 rows taken, one of them had no fiscal date.
        assert_eq!(records.len(), 19);
        let first = &records[0];
        assert_eq!(first.id, "ACME-Q2-2024");
        assert_eq!((first.quarter, first.year), (Quarter::Q2, 2024));
        assert_eq!(first.date, "2024-06-30");
        assert_eq!(first.status, "recorded");
    }

    #[tokio::test]
    async fn calendar_validates_horizon_and_caches_per_horizon() {
        let fake = Arc::new(FakeTransport::new());
        fake.respond_text(
            Function::EarningsCalendar,
            "symbol,name,reportDate,fiscalDateEnding,estimate,currency\nAAPL,Apple Inc,2025-01-30,2024-12-31,2.35,USD\n",
        );
        let svc = service(&fake, true);

        let err = svc.calendar(Some("2weeks")).await.unwrap_err();
        assert_eq!(kind_of(&err), Some(ErrorKind::InvalidInput));

        assert_eq!(svc.calendar(None).await.unwrap().len(), 1);
        svc.calendar(Some("3month")).await.unwrap();
        svc.calendar(Some("12month")).await.unwrap();
        assert_eq!(fake.calls(Function::EarningsCalendar), 2);
    }

    #[tokio::test]
    async fn transcript_is_parsed_and_defaults_fiscal_date() {
        let fake = Arc::new(FakeTransport::new());
        fake.respond_json(
            Function::EarningsCallTranscript,
            json!({"symbol": "ACME", "quarter": "2024Q4", "transcript": [
                {"speaker": "Operator", "content": "Welcome to the call."},
                {"speaker": "Jane Doe", "title": "CFO", "content": "Revenue grew."}
            ]}),
        );

        let data = service(&fake, true)
            .transcript("acme", Quarter::Q4, 2024)
            .await
            .unwrap();
        assert_eq!(data.fiscal_date_ending, "2024-12-01");
        assert_eq!(data.entries.len(), 2);
        assert_eq!(data.entries[1].speaker.as_deref(), Some("Jane Doe"));

        let query = fake.last_query().unwrap();
        assert!(query.contains(&("quarter".to_string(), "2024Q4".to_string())));
    }

    #[tokio::test]
    async fn missing_transcript_is_not_found() {
        let fake = Arc::new(FakeTransport::new());
        fake.respond_json(
            Function::EarningsCallTranscript,
            json!({"symbol": "ACME", "quarter": "2030Q1", "transcript": []}),
        );
        let err = service(&fake, true)
            .transcript("ACME", Quarter::Q1, 2030)
            .await
            .unwrap_err();
        assert_eq!(kind_of(&err), Some(ErrorKind::NotFound));
    }

    #[tokio::test]
    async fn financials_end_to_end() {
        let fake = Arc::new(FakeTransport::new());
        fake.respond_json(Function::Overview, overview_body());
        fake.respond_json(Function::Earnings, earnings_body());
        fake.respond_json(
            Function::IncomeStatement,
            json!({"quarterlyReports": [
                {"fiscalDateEnding": "2024-12-31", "totalRevenue": "250000"},
                {"fiscalDateEnding": "2024-09-30", "totalRevenue": "200000"}
            ]}),
        );
        fake.respond_json(
            Function::TimeSeriesDaily,
            json!({"Time Series (Daily)": {
                "2025-01-30": {"1. open": "150.0", "4. close": "160.0"},
                "2025-01-29": {"4. close": "150.0"}
            }}),
        );
        let svc = service(&fake, true);

        let snap = svc
            .financials("acme", Some(Quarter::Q4), Some(2024))
            .await
            .unwrap();
        assert_eq!(snap.eps_change.as_deref(), Some("+33.3%"));
        assert_eq!(snap.yoy_growth.as_deref(), Some("+11.1%"));
        assert_eq!(snap.revenue.as_deref(), Some("250000"));
        assert_eq!(snap.pe_ratio, Some(80.0));
        assert_eq!(snap.market_cap.as_deref(), Some("3200000"));

        let calls = fake.total_calls();
        svc.financials("ACME", Some(Quarter::Q4), Some(2024))
            .await
            .unwrap();
        assert_eq!(fake.total_calls(), calls);
    }

    #[tokio::test]
    async fn financials_degrade_when_refinements_fail() {
        let fake = Arc::new(FakeTransport::new());
        fake.respond_json(Function::Overview, overview_body());
        fake.respond_json(Function::Earnings, earnings_body());
        fake.fail(Function::IncomeStatement, "connection reset");
        fake.respond_json(Function::TimeSeriesDaily, json!({"Note": "quota"}));

        let snap = service(&fake, true).financials("ACME", None, None).await.unwrap();
        assert_eq!(snap.revenue.as_deref(), Some("900000"));
        assert_eq!(snap.pe_ratio, Some(31.5));
        assert_eq!(snap.market_cap.as_deref(), Some("4000000"));
    }

    #[tokio::test]
    async fn financials_period_errors() {
        let fake = Arc::new(FakeTransport::new());
        fake.respond_json(Function::Overview, overview_body());
        fake.respond_json(Function::Earnings, earnings_body());
        let svc = service(&fake, true);

        let err = svc.financials("ACME", Some(Quarter::Q1), None).await.unwrap_err();
        assert_eq!(kind_of(&err), Some(ErrorKind::InvalidInput));

        let err = svc
            .financials("ACME", Some(Quarter::Q1), Some(2019))
            .await
            .unwrap_err();
        assert_eq!(kind_of(&err), Some(ErrorKind::NotFound));
    }

    #[tokio::test]
    async fn concurrent_requests_share_one_upstream_call() {
        let fake = Arc::new(FakeTransport::new());
        fake.respond_json(Function::Overview, overview_body());
        let svc = Arc::new(service(&fake, true));

        let a = tokio::spawn({
            let svc = svc.clone();
            async move { svc.overview("ACME").await }
        });
        let b = tokio::spawn({
            let svc = svc.clone();
            async move { svc.overview("ACME").await }
        });
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();
        assert_eq!(fake.calls(Function::Overview), 1);
    }
}

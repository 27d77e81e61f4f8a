use crate::error::EarningsError;
use crate::upstream::rate_limit::RateLimiter;
use crate::upstream::transport::Transport;
use anyhow::Result;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

const ERROR_MESSAGE_FIELD: &str = "Error Message";
// Older quota notices arrive as "Note", current ones as "Information".
const RATE_LIMIT_FIELDS: [&str; 2] = ["Note", "Information"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    SymbolSearch,
    Overview,
    Earnings,
    EarningsCallTranscript,
    EarningsCalendar,
    IncomeStatement,
    TimeSeriesDaily,
}

impl Function {
    pub fn as_str(self) -> &'static str {
        match self {
            Function::SymbolSearch => "SYMBOL_SEARCH",
            Function::Overview => "OVERVIEW",
            Function::Earnings => "EARNINGS",
            Function::EarningsCallTranscript => "EARNINGS_CALL_TRANSCRIPT",
            Function::EarningsCalendar => "EARNINGS_CALENDAR",
            Function::IncomeStatement => "INCOME_STATEMENT",
            Function::TimeSeriesDaily => "TIME_SERIES_DAILY",
        }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct UpstreamClient {
    transport: Arc<dyn Transport>,
    limiter: RateLimiter,
    api_key: String,
}

impl fmt::Debug for UpstreamClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpstreamClient")
            .field("limiter", &self.limiter)
            .finish_non_exhaustive()
    }
}

impl UpstreamClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        limiter: RateLimiter,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            limiter,
            api_key: api_key.into(),
        }
    }

    pub async fn request_json(
        &self,
        function: Function,
        params: &[(&str, &str)],
    ) -> Result<Value> {
        let body = self.send(function, params).await?;
        let value = serde_json::from_str::<Value>(&body).map_err(|err| {
            EarningsError::transport(format!("{function} response is not valid JSON: {err}"))
        })?;
        classify(value)
    }

    pub async fn request_text(
        &self,
        function: Function,
        params: &[(&str, &str)],
    ) -> Result<String> {
        let body = self.send(function, params).await?;
        if body.trim_start().starts_with('{') {
            if let Ok(value) = serde_json::from_str::<Value>(&body) {
                classify(value)?;
            }
        }
        Ok(body)
    }

    async fn send(&self, function: Function, params: &[(&str, &str)]) -> Result<String> {
        self.limiter.acquire().await;

        let mut query = Vec::with_capacity(params.len() + 2);
        query.push(("function".to_string(), function.as_str().to_string()));
        query.extend(params.iter().map(|(k, v)| (k.to_string(), v.to_string())));
        query.push(("apikey".to_string(), self.api_key.clone()));

        tracing::debug!(%function, "upstream request");
        self.transport.get(&query).await.map_err(|err| {
            tracing::warn!(%function, error = %err, "upstream request failed");
            err
        })
    }
}

fn classify(value: Value) -> Result<Value> {
    if let Some(msg) = value.get(ERROR_MESSAGE_FIELD) {
        return Err(EarningsError::not_found(message_text(msg)).into());
    }
    if let Some(note) = RATE_LIMIT_FIELDS.iter().find_map(|field| value.get(*field)) {
        return Err(EarningsError::throttled(message_text(note)).into());
    }
    Ok(value)
}

fn message_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

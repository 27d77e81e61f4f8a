use crate::config::Settings;
use crate::error::EarningsError;
use anyhow::{Context, Result};
use std::time::Duration;

#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, query: &[(String, String)]) -> Result<String>;
}

#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .context("failed to build upstream http client")?;

        Ok(Self {
            http,
            base_url: settings.base_url.clone(),
        })
    }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    async fn get(&self, query: &[(String, String)]) -> Result<String> {
        let res = self
            .http
            .get(&self.base_url)
            .query(query)
            .send()
            .await
            .map_err(|err| {
                EarningsError::transport(format!("request failed: {}", err.without_url()))
            })?;

        let status = res.status();
        let text = res
            .text()
            .await
            .map_err(|err| {
                EarningsError::transport(format!("failed to read body: {}", err.without_url()))
            })?;

        if !status.is_success() {
            return Err(EarningsError::transport(format!("HTTP {status}: {text}")).into());
        }
        Ok(text)
    }
}

pub mod domain;
pub mod error;
pub mod financials;
pub mod service;
pub mod storage;
pub mod time;
pub mod transcript;
pub mod upstream;

pub mod config {
    use anyhow::Context;

    pub const DEFAULT_BASE_URL: &str = "https://www.alphavantage.co/query";
    const DEFAULT_RATE_LIMIT: u32 = 5;
    const DEFAULT_TIMEOUT_SECS: u64 = 30;
    const DEFAULT_FRONTEND_URL: &str = "http://localhost:5173";

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub api_key: Option<String>,
        pub base_url: String,
        pub rate_limit_per_minute: u32,
        pub timeout_secs: u64,
        pub filter_us_equities_only: bool,
        pub frontend_url: String,
        pub sentry_dsn: Option<String>,
    }

    impl Default for Settings {
        fn default() -> Self {
            Self {
                api_key: None,
                base_url: DEFAULT_BASE_URL.to_string(),
                rate_limit_per_minute: DEFAULT_RATE_LIMIT,
                timeout_secs: DEFAULT_TIMEOUT_SECS,
                filter_us_equities_only: true,
                frontend_url: DEFAULT_FRONTEND_URL.to_string(),
                sentry_dsn: None,
            }
        }
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            let defaults = Self::default();
            Ok(Self {
                api_key: std::env::var("ALPHA_VANTAGE_API_KEY")
                    .ok()
                    .filter(|s| !s.trim().is_empty()),
                base_url: std::env::var("ALPHA_VANTAGE_BASE_URL")
                    .ok()
                    .filter(|s| !s.trim().is_empty())
                    .unwrap_or(defaults.base_url),
                rate_limit_per_minute: std::env::var("ALPHA_VANTAGE_RATE_LIMIT")
                    .ok()
                    .and_then(|s| s.trim().parse::<u32>().ok())
                    .unwrap_or(defaults.rate_limit_per_minute),
                timeout_secs: std::env::var("ALPHA_VANTAGE_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.trim().parse::<u64>().ok())
                    .unwrap_or(defaults.timeout_secs),
                filter_us_equities_only: std::env::var("FILTER_US_EQUITIES_ONLY")
                    .ok()
                    .and_then(|s| parse_flag(&s))
                    .unwrap_or(defaults.filter_us_equities_only),
                frontend_url: std::env::var("FRONTEND_URL")
                    .ok()
                    .filter(|s| !s.trim().is_empty())
                    .unwrap_or(defaults.frontend_url),
                sentry_dsn: std::env::var("SENTRY_DSN").ok(),
            })
        }

        pub fn require_api_key(&self) -> anyhow::Result<&str> {
            self.api_key
                .as_deref()
                .context("ALPHA_VANTAGE_API_KEY is required")
        }
    }

    fn parse_flag(s: &str) -> Option<bool> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        }
    }

}

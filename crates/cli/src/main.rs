use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use earnings_core::config::Settings;
use earnings_core::domain::company::{parse_year, Quarter};
use earnings_core::service::EarningsService;

#[derive(Debug, Parser)]
#[command(name = "earnings_cli", about = "One-off lookups against the earnings data service")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Symbol search by company name or ticker fragment.
    Search { keywords: String },
    Overview { ticker: String },
    /// Up to 20 most recent reported quarters.
    Earnings { ticker: String },
    /// Reconciled snapshot; latest quarter unless both --quarter and --year are given.
    Financials {
        ticker: String,
        #[arg(long)]
        quarter: Option<Quarter>,
        #[arg(long, value_parser = parse_year_arg)]
        year: Option<i32>,
    },
    Transcript {
        ticker: String,
        quarter: Quarter,
        #[arg(value_parser = parse_year_arg)]
        year: i32,
    },
    /// Upcoming earnings reports (3month, 6month or 12month).
    Calendar {
        #[arg(long)]
        horizon: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();
    let service = EarningsService::from_settings(&settings)?;

    let result = run(&service, args.command).await;
    if let Err(err) = &result {
        sentry_anyhow::capture_anyhow(err);
        tracing::error!(error = %err, "lookup failed");
    }
    result
}

async fn run(service: &EarningsService, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Search { keywords } => print_json(&service.search(&keywords).await?),
        Command::Overview { ticker } => print_json(&service.overview(&ticker).await?),
        Command::Earnings { ticker } => print_json(&service.earnings(&ticker).await?),
        Command::Financials {
            ticker,
            quarter,
            year,
        } => print_json(&service.financials(&ticker, quarter, year).await?),
        Command::Transcript {
            ticker,
            quarter,
            year,
        } => print_json(&service.transcript(&ticker, quarter, year).await?),
        Command::Calendar { horizon } => print_json(&service.calendar(horizon.as_deref()).await?),
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("failed to encode result")?;
    println!("{out}");
    Ok(())
}

fn parse_year_arg(s: &str) -> Result<i32, String> {
    parse_year(s).map_err(|e| e.to_string())
}

fn init_sentry(settings: &Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}

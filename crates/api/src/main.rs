use axum::{
    extract::{Path, Query, State},
    http::{HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use earnings_core::config::Settings;
use earnings_core::domain::company::{
    parse_quarter_path, parse_year, CompanyOverview, CompanySearchResult, EarningsCalendarItem,
    EarningsRecord, FinancialSnapshot, Quarter,
};
use earnings_core::domain::transcript::TranscriptData;
use earnings_core::error::{kind_of, EarningsError, ErrorKind};
use earnings_core::service::EarningsService;

const DEV_FRONTEND_ORIGIN: &str = "http://localhost:5173";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let service = match EarningsService::from_settings(&settings) {
        Ok(service) => Some(Arc::new(service)),
        Err(e) => {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(error = %e, "earnings service unavailable; starting API in degraded mode");
            None
        }
    };

    let state = AppState {
        service,
        api_key_configured: settings.api_key.is_some(),
    };

    let app = Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/api/companies/search", get(search_companies))
        .route("/api/companies/calendar/upcoming", get(upcoming_earnings))
        .route("/api/companies/:ticker", get(company_overview))
        .route("/api/companies/:ticker/earnings", get(company_earnings))
        .route("/api/companies/:ticker/financials", get(company_financials))
        .route("/api/transcript/:ticker/:quarter", get(transcript_by_path))
        .route("/api/transcript/:ticker/:quarter/:year", get(transcript_by_parts))
        .with_state(state)
        .layer(cors_layer(&settings))
        .layer(TraceLayer::new_for_http());

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("api stopped");
    Ok(())
}

#[derive(Debug, Clone)]
struct AppState {
    service: Option<Arc<EarningsService>>,
    api_key_configured: bool,
}

impl AppState {
    fn service(&self) -> Result<Arc<EarningsService>, ApiError> {
        self.service.clone().ok_or_else(|| ApiError {
            status: StatusCode::SERVICE_UNAVAILABLE,
            detail: "upstream credential is not configured".to_string(),
        })
    }
}

#[derive(Debug, Serialize)]
struct RootInfo {
    message: &'static str,
    version: &'static str,
}

async fn root() -> Json<RootInfo> {
    Json(RootInfo {
        message: "Earnings data API",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Debug, Serialize)]
struct HealthInfo {
    status: &'static str,
    api_key_configured: bool,
}

async fn health(State(state): State<AppState>) -> Json<HealthInfo> {
    Json(HealthInfo {
        status: if state.service.is_some() { "healthy" } else { "degraded" },
        api_key_configured: state.api_key_configured,
    })
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    #[serde(default)]
    q: String,
}

async fn search_companies(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<Vec<CompanySearchResult>>> {
    let service = state.service()?;
    let results = detached(async move { service.search(&query.q).await }).await?;
    Ok(Json(results))
}

async fn company_overview(
    State(state): State<AppState>,
    Path(ticker): Path<String>,
) -> ApiResult<Json<CompanyOverview>> {
    let service = state.service()?;
    let overview = detached(async move { service.overview(&ticker).await }).await?;
    Ok(Json(overview))
}

async fn company_earnings(
    State(state): State<AppState>,
    Path(ticker): Path<String>,
) -> ApiResult<Json<Vec<EarningsRecord>>> {
    let service = state.service()?;
    let earnings = detached(async move { service.earnings(&ticker).await }).await?;
    Ok(Json(earnings))
}

#[derive(Debug, Deserialize)]
struct FinancialsQuery {
    quarter: Option<String>,
    year: Option<String>,
}

async fn company_financials(
    State(state): State<AppState>,
    Path(ticker): Path<String>,
    Query(query): Query<FinancialsQuery>,
) -> ApiResult<Json<FinancialSnapshot>> {
    let service = state.service()?;
    let quarter = query
        .quarter
        .as_deref()
        .map(str::parse::<Quarter>)
        .transpose()?;
    let year = query.year.as_deref().map(parse_year).transpose()?;

    let snapshot =
        detached(async move { service.financials(&ticker, quarter, year).await }).await?;
    Ok(Json(snapshot))
}

#[derive(Debug, Deserialize)]
struct CalendarQuery {
    horizon: Option<String>,
}

async fn upcoming_earnings(
    State(state): State<AppState>,
    Query(query): Query<CalendarQuery>,
) -> ApiResult<Json<Vec<EarningsCalendarItem>>> {
    let service = state.service()?;
    let items = detached(async move { service.calendar(query.horizon.as_deref()).await }).await?;
    Ok(Json(items))
}

async fn transcript_by_path(
    State(state): State<AppState>,
    Path((ticker, quarter)): Path<(String, String)>,
) -> ApiResult<Json<TranscriptData>> {
    let service = state.service()?;
    let (quarter, year) = parse_quarter_path(&quarter)?;
    let data = detached(async move { service.transcript(&ticker, quarter, year).await }).await?;
    Ok(Json(data))
}

async fn transcript_by_parts(
    State(state): State<AppState>,
    Path((ticker, quarter, year)): Path<(String, String, String)>,
) -> ApiResult<Json<TranscriptData>> {
    let service = state.service()?;
    let quarter = quarter.parse::<Quarter>()?;
    let year = parse_year(&year)?;
    let data = detached(async move { service.transcript(&ticker, quarter, year).await }).await?;
    Ok(Json(data))
}

/// Runs the lookup on its own task. If the client goes away the handler future is dropped,
/// but upstream calls already issued still finish and land in the cache.
async fn detached<T, F>(fut: F) -> ApiResult<T>
where
    T: Send + 'static,
    F: Future<Output = anyhow::Result<T>> + Send + 'static,
{
    match tokio::spawn(fut).await {
        Ok(result) => result.map_err(ApiError::from),
        Err(join) => Err(ApiError::from(
            anyhow::Error::new(join).context("request task failed"),
        )),
    }
}

type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    detail: String,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    detail: String,
}

fn status_for(kind: Option<ErrorKind>) -> StatusCode {
    match kind {
        Some(ErrorKind::InvalidInput) => StatusCode::BAD_REQUEST,
        Some(ErrorKind::NotFound) => StatusCode::NOT_FOUND,
        Some(ErrorKind::Throttled) => StatusCode::TOO_MANY_REQUESTS,
        Some(ErrorKind::Transport) | None => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        let status = status_for(kind_of(&err));
        if status.is_server_error() {
            sentry_anyhow::capture_anyhow(&err);
            let chain = format!("{err:#}");
            tracing::error!(error = %chain, "request failed");
        } else {
            tracing::info!(%status, error = %err, "request rejected");
        }
        Self {
            status,
            detail: err.to_string(),
        }
    }
}

impl From<EarningsError> for ApiError {
    fn from(err: EarningsError) -> Self {
        Self::from(anyhow::Error::new(err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { detail: self.detail })).into_response()
    }
}

fn cors_layer(settings: &Settings) -> CorsLayer {
    let mut origins = Vec::new();
    for origin in [settings.frontend_url.as_str(), DEV_FRONTEND_ORIGIN] {
        match HeaderValue::from_str(origin) {
            Ok(value) if !origins.contains(&value) => origins.push(value),
            Ok(_) => {}
            Err(e) => tracing::warn!(%origin, error = %e, "ignoring invalid CORS origin"),
        }
    }

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_credentials(true)
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
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

#[cfg(test)]
mod tests {
    use super::*;
    use earnings_core::storage::ResponseCache;
    use earnings_core::upstream::{RateLimiter, Transport, UpstreamClient};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Semaphore;

    // Holds every upstream reply until the test releases a permit.
    struct GatedTransport {
        gate: Semaphore,
        calls: AtomicUsize,
        body: String,
    }

    #[async_trait::async_trait]
    impl Transport for GatedTransport {
        async fn get(&self, _query: &[(String, String)]) -> anyhow::Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let _permit = self.gate.acquire().await?;
            Ok(self.body.clone())
        }
    }

    #[tokio::test]
    async fn abandoned_request_still_fills_the_cache() {
        let transport = Arc::new(GatedTransport {
            gate: Semaphore::new(0),
            calls: AtomicUsize::new(0),
            body: serde_json::json!({"Symbol": "ACME", "Name": "Acme Corp"}).to_string(),
        });
        let service = Arc::new(EarningsService::new(
            UpstreamClient::new(transport.clone(), RateLimiter::new(0), "test-key"),
            ResponseCache::default(),
            true,
        ));

        let handler = {
            let service = Arc::clone(&service);
            tokio::spawn(async move {
                detached(async move { service.overview("ACME").await })
                    .await
                    .is_ok()
            })
        };
        while transport.calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }

        // The client goes away while the upstream call is still parked.
        handler.abort();
        assert!(handler.await.unwrap_err().is_cancelled());

        transport.gate.add_permits(8);
        let overview = service.overview("acme").await.unwrap();
        assert_eq!(overview.name, "Acme Corp");
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn error_kinds_map_to_statuses() {
        let cases = [
            (EarningsError::invalid_input("bad quarter"), StatusCode::BAD_REQUEST),
            (EarningsError::not_found("no such ticker"), StatusCode::NOT_FOUND),
            (EarningsError::throttled("slow down"), StatusCode::TOO_MANY_REQUESTS),
            (EarningsError::transport("timeout"), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status, status);
        }
    }

    #[test]
    fn context_does_not_hide_the_kind() {
        let err = anyhow::Error::new(EarningsError::not_found("no transcript"))
            .context("transcript lookup failed");
        assert_eq!(ApiError::from(err).status, StatusCode::NOT_FOUND);

        let plain = anyhow::anyhow!("decode failure");
        assert_eq!(ApiError::from(plain).status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn invalid_query_values_are_bad_requests() {
        let err = "Q9".parse::<Quarter>().unwrap_err();
        assert_eq!(ApiError::from(err).status, StatusCode::BAD_REQUEST);
    }
}

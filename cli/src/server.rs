use std::sync::Arc;

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{Path, Query, Request, State},
    http::{HeaderValue, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{error, info, warn};

use trimline_core::models::{
    BmrProfile, DATE_FORMAT, DailyLog, DashboardSummary, Settings, TrendSeries,
    validate_daily_log, validate_settings,
};
use trimline_core::service::TrackerService;
use trimline_core::table::UpsertOutcome;

const BODY_LIMIT: usize = 1024 * 1024; // 1 MB

#[derive(Clone)]
struct AppState {
    service: Arc<TrackerService>,
    api_key: Option<String>,
}

// --- Request / Response types ---

#[derive(Deserialize)]
struct LogRequest {
    /// Defaults to today.
    date: Option<String>,
    calories: u32,
    #[serde(default)]
    steps: u32,
    weight_kg: f64,
    notes: Option<String>,
}

#[derive(Serialize)]
struct LogResponse {
    log: DailyLog,
    #[serde(flatten)]
    outcome: UpsertOutcome,
}

#[derive(Deserialize)]
struct LogsQuery {
    latest: Option<usize>,
}

#[derive(Deserialize)]
struct SettingsRequest {
    height_cm: Option<f64>,
    weight_kg: Option<f64>,
    target_weight_kg: Option<f64>,
    target_date: Option<String>,
}

#[derive(Serialize)]
struct SettingsResponse {
    settings: Settings,
    profile: BmrProfile,
}

#[derive(Serialize)]
struct PublishResponse {
    published_rows: usize,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// --- Error handling ---

enum ApiError {
    NotFound(String),
    BadRequest(String),
    Internal(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Internal(err) => {
                error!("internal server error: {err:#}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err)
    }
}

fn parse_date_param(s: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(s, DATE_FORMAT)
        .map_err(|_| ApiError::BadRequest(format!("Invalid date '{s}'. Use YYYY-MM-DD")))
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Run a store call on the blocking pool. Store backends may block on
/// network I/O.
async fn with_service<T, F>(state: &AppState, f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&TrackerService) -> anyhow::Result<T> + Send + 'static,
{
    let service = Arc::clone(&state.service);
    let result = tokio::task::spawn_blocking(move || f(&service))
        .await
        .context("store task failed")?;
    Ok(result?)
}

// --- Middleware ---

async fn require_auth(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if let Some(ref expected_key) = state.api_key {
        let authorized = request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .is_some_and(|token| token == expected_key);

        if !authorized {
            return (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse {
                    error: "Invalid or missing API key".to_string(),
                }),
            )
                .into_response();
        }
    }
    next.run(request).await
}

async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        "x-content-type-options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert(
        "content-security-policy",
        HeaderValue::from_static("default-src 'none'"),
    );
    response
}

// --- Handlers ---

async fn get_dashboard(State(state): State<AppState>) -> Result<Json<DashboardSummary>, ApiError> {
    let summary = with_service(&state, |svc| svc.dashboard(today())).await?;
    Ok(Json(summary))
}

async fn get_trends(State(state): State<AppState>) -> Result<Json<TrendSeries>, ApiError> {
    let series = with_service(&state, TrackerService::trends).await?;
    Ok(Json(series))
}

async fn publish_trends(State(state): State<AppState>) -> Result<Json<PublishResponse>, ApiError> {
    let published_rows = with_service(&state, |svc| svc.publish_trends(today())).await?;
    Ok(Json(PublishResponse { published_rows }))
}

async fn list_logs(
    State(state): State<AppState>,
    Query(query): Query<LogsQuery>,
) -> Result<Json<Vec<DailyLog>>, ApiError> {
    let latest = query.latest.unwrap_or(usize::MAX);
    let logs = with_service(&state, move |svc| svc.recent_logs(latest)).await?;
    Ok(Json(logs))
}

async fn create_log(
    State(state): State<AppState>,
    Json(req): Json<LogRequest>,
) -> Result<(StatusCode, Json<LogResponse>), ApiError> {
    let date = match req.date.as_deref() {
        Some(d) => parse_date_param(d)?,
        None => today(),
    };
    let log = DailyLog {
        date,
        calories: req.calories,
        steps: req.steps,
        weight_kg: req.weight_kg,
        notes: req.notes.filter(|n| !n.trim().is_empty()),
    };
    validate_daily_log(&log).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let stored = log.clone();
    let outcome = with_service(&state, move |svc| svc.log_day(&stored)).await?;
    let status = match outcome {
        UpsertOutcome::Inserted => StatusCode::CREATED,
        UpsertOutcome::Updated { .. } => StatusCode::OK,
    };
    Ok((status, Json(LogResponse { log, outcome })))
}

async fn get_log(
    State(state): State<AppState>,
    Path(date): Path<String>,
) -> Result<Json<DailyLog>, ApiError> {
    let date = parse_date_param(&date)?;
    let log = with_service(&state, move |svc| svc.get_log(date)).await?;
    log.map(Json).ok_or_else(|| {
        ApiError::NotFound(format!("No entry for {}", date.format(DATE_FORMAT)))
    })
}

async fn get_settings(State(state): State<AppState>) -> Result<Json<SettingsResponse>, ApiError> {
    let settings = with_service(&state, |svc| svc.settings(today())).await?;
    Ok(Json(SettingsResponse {
        settings,
        profile: *state.service.profile(),
    }))
}

async fn update_settings(
    State(state): State<AppState>,
    Json(req): Json<SettingsRequest>,
) -> Result<Json<SettingsResponse>, ApiError> {
    let target_date = req
        .target_date
        .as_deref()
        .map(parse_date_param)
        .transpose()?;

    let mut settings = with_service(&state, |svc| svc.settings(today())).await?;
    if let Some(h) = req.height_cm {
        settings.height_cm = h;
    }
    if let Some(w) = req.weight_kg {
        settings.weight_kg = w;
    }
    if let Some(w) = req.target_weight_kg {
        settings.target_weight_kg = w;
    }
    if let Some(d) = target_date {
        settings.target_date = d;
    }
    validate_settings(&settings).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let saved = with_service(&state, move |svc| svc.save_settings(&settings)).await?;
    Ok(Json(SettingsResponse {
        settings: saved,
        profile: *state.service.profile(),
    }))
}

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/dashboard", get(get_dashboard))
        .route("/api/trends", get(get_trends))
        .route("/api/trends/publish", post(publish_trends))
        .route("/api/logs", get(list_logs).post(create_log))
        .route("/api/logs/{date}", get(get_log))
        .route("/api/settings", get(get_settings).put(update_settings))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT))
        .layer(middleware::from_fn(security_headers))
        .with_state(state)
}

// --- Server startup ---

pub async fn start_server(
    service: TrackerService,
    port: u16,
    bind: &str,
    api_key: Option<String>,
    new_api_key: bool,
) -> anyhow::Result<()> {
    let state = AppState {
        service: Arc::new(service),
        api_key: api_key.clone(),
    };

    let app = build_router(state);

    match api_key {
        Some(ref key) if new_api_key => {
            eprintln!("Generated new API key: {key}");
            eprintln!("Include in requests: Authorization: Bearer {key}");
        }
        Some(ref key) => eprintln!(
            "API key: {} (see api_key file in data directory)",
            mask_key(key)
        ),
        None => warn!("authentication disabled (--no-auth), the API is open to anyone"),
    }

    if bind != "127.0.0.1" && bind != "localhost" && api_key.is_none() {
        warn!(%bind, "listening beyond localhost with no authentication");
    }

    let listener = tokio::net::TcpListener::bind(format!("{bind}:{port}"))
        .await
        .with_context(|| format!("Failed to bind {bind}:{port}"))?;
    info!("listening on http://{bind}:{port}");
    axum::serve(listener, app).await?;

    Ok(())
}

/// First and last four characters of `key`, or `****` when it is too
/// short to show any of it.
fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() < 12 {
        return "****".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}

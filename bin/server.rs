// Kumite Log - Web Server
// Read-only JSON API over the saved bouts (plus record deletion)

use anyhow::Context;
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use chrono::{Local, NaiveDate};
use clap::Parser;
use kumite_log::{
    export_filename, to_csv_string, AnalysisFilter, AnalysisReport, Config, MatchRecord,
    MatchTypeFilter, Period, QuoteStyle, RecordStore, SqliteStore,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::level_filters::LevelFilter;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "kumite-server", version, about = "Kumite Log JSON API")]
struct Args {
    /// Path to a TOML config file
    #[arg(long, env = "KUMITE_CONFIG")]
    config: Option<PathBuf>,

    /// SQLite database (overrides the config file)
    #[arg(long, env = "KUMITE_DB")]
    db: Option<PathBuf>,

    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:3000")]
    addr: String,
}

/// Shared application state
#[derive(Clone)]
struct AppState {
    store: Arc<Mutex<RecordStore<SqliteStore>>>,
    quote_style: QuoteStyle,
}

impl AppState {
    fn store(&self) -> Result<MutexGuard<'_, RecordStore<SqliteStore>>, ApiError> {
        self.store
            .lock()
            .map_err(|_| ApiError::internal("record store lock poisoned"))
    }
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        error!("storage error: {:#}", e);
        ApiError::internal(e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(self.message),
        };
        (self.status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/records - All bouts, newest first
async fn list_records(State(state): State<AppState>) -> ApiResult<Vec<MatchRecord>> {
    let records = state.store()?.records_newest_first()?;
    Ok(Json(ApiResponse::ok(records)))
}

/// GET /api/records/:id - One bout
async fn get_record(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<MatchRecord> {
    match state.store()?.match_record(&id)? {
        Some(record) => Ok(Json(ApiResponse::ok(record))),
        None => Err(ApiError::not_found(format!("no record with id {}", id))),
    }
}

/// DELETE /api/records/:id - Remove one bout
async fn delete_record(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<String> {
    if state.store()?.delete_match_record(&id)? {
        info!(id = %id, "record deleted via API");
        Ok(Json(ApiResponse::ok(id)))
    } else {
        Err(ApiError::not_found(format!("no record with id {}", id)))
    }
}

#[derive(Debug, Deserialize)]
struct AnalysisQuery {
    match_type: Option<String>,
    period: Option<String>,
    start: Option<String>,
    end: Option<String>,
}

fn parse_date(raw: Option<&str>) -> Result<Option<NaiveDate>, ApiError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| ApiError::bad_request(format!("invalid date: {}", s))),
        None => Ok(None),
    }
}

impl AnalysisQuery {
    fn to_filter(&self) -> Result<AnalysisFilter, ApiError> {
        let match_type: MatchTypeFilter = self
            .match_type
            .as_deref()
            .unwrap_or("all")
            .parse()
            .map_err(ApiError::bad_request)?;

        let mut period: Period = self
            .period
            .as_deref()
            .unwrap_or("all")
            .parse()
            .map_err(ApiError::bad_request)?;

        let start = parse_date(self.start.as_deref())?;
        let end = parse_date(self.end.as_deref())?;
        if matches!(period, Period::Range { .. }) || start.is_some() || end.is_some() {
            period = Period::range(start, end);
        }

        Ok(AnalysisFilter::new(match_type, period))
    }
}

/// GET /api/analysis?match_type=&period=&start=&end=
async fn get_analysis(
    State(state): State<AppState>,
    Query(query): Query<AnalysisQuery>,
) -> ApiResult<AnalysisReport> {
    let filter = query.to_filter()?;
    let records = state.store()?.records_newest_first()?;
    Ok(Json(ApiResponse::ok(AnalysisReport::build(&records, &filter))))
}

/// GET /api/export.csv - Download every bout as CSV, newest first
async fn export_csv(State(state): State<AppState>) -> Result<Response, ApiError> {
    let records = state.store()?.records_newest_first()?;
    let body = to_csv_string(&records, state.quote_style)?;
    let disposition = format!(
        "attachment; filename=\"{}\"",
        export_filename(Local::now().date_naive())
    );

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}

/// GET /api/opponents - Opponent names seen so far
async fn get_opponents(State(state): State<AppState>) -> ApiResult<Vec<String>> {
    let names = state.store()?.opponents()?;
    Ok(Json(ApiResponse::ok(names.into())))
}

/// GET /api/tournaments - Tournament names seen so far
async fn get_tournaments(State(state): State<AppState>) -> ApiResult<Vec<String>> {
    let names = state.store()?.tournaments()?;
    Ok(Json(ApiResponse::ok(names.into())))
}

/// GET /api/user - Profile, age refreshed for today
async fn get_user(State(state): State<AppState>) -> ApiResult<Option<kumite_log::UserInfo>> {
    let today = Local::now().date_naive();
    let user = state.store()?.user_info()?.map(|u| u.refreshed(today));
    Ok(Json(ApiResponse::ok(user)))
}

fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/records", get(list_records))
        .route("/records/:id", get(get_record).delete(delete_record))
        .route("/analysis", get(get_analysis))
        .route("/export.csv", get(export_csv))
        .route("/opponents", get(get_opponents))
        .route("/tournaments", get(get_tournaments))
        .route("/user", get(get_user))
        .with_state(state);

    Router::new().nest("/api", api_routes).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()),
    )
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(kumite_log::config::env_filter(LevelFilter::INFO))
        .init();

    let args = Args::parse();
    let config = Config::load(args.config.as_deref())?;
    let db_path = args.db.unwrap_or(config.storage.db_path);

    println!("🥋 Kumite Log - Web Server");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let store = SqliteStore::open(&db_path)?;
    println!("✓ Database opened: {:?}", db_path);

    let state = AppState {
        store: Arc::new(Mutex::new(RecordStore::new(store))),
        quote_style: config.export.quote_style,
    };

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&args.addr)
        .await
        .with_context(|| format!("Failed to bind to {}", args.addr))?;

    println!("\n🚀 Server running on http://{}", args.addr);
    println!("   API: http://{}/api/records", args.addr);
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, app)
        .await
        .context("Server stopped with an error")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tower::ServiceExt;

    fn query(match_type: &str, period: &str, start: &str, end: &str) -> AnalysisQuery {
        let opt = |s: &str| (!s.is_empty()).then(|| s.to_string());
        AnalysisQuery {
            match_type: opt(match_type),
            period: opt(period),
            start: opt(start),
            end: opt(end),
        }
    }

    #[test]
    fn test_query_defaults_to_everything() {
        let filter = query("", "", "", "").to_filter().ok().unwrap();
        assert_eq!(filter, AnalysisFilter::default());
    }

    #[test]
    fn test_query_with_dates_becomes_range() {
        let filter = query("tournament", "", "2024-01-01", "").to_filter().ok().unwrap();
        assert_eq!(
            filter.period,
            Period::range(NaiveDate::from_ymd_opt(2024, 1, 1), None)
        );
        assert!(matches!(filter.match_type, MatchTypeFilter::Only(_)));
    }

    #[test]
    fn test_query_rejects_garbage() {
        assert!(query("friendly", "", "", "").to_filter().is_err());
        assert!(query("", "recent", "01/02/2024", "").to_filter().is_err());
    }

    fn test_state(records: &[MatchRecord]) -> AppState {
        let mut store = RecordStore::new(SqliteStore::open_in_memory().unwrap());
        for record in records {
            store.save_match_record(record).unwrap();
        }
        AppState {
            store: Arc::new(Mutex::new(store)),
            quote_style: QuoteStyle::Standard,
        }
    }

    fn bout(id: &str, date: &str) -> MatchRecord {
        MatchRecord {
            id: id.to_string(),
            date: date.parse().unwrap(),
            match_type: kumite_log::MatchType::Practice,
            tournament_name: None,
            opponent_name: None,
            techniques: vec![],
            penalties: vec![],
            senshu: None,
            colors_swapped: false,
        }
    }

    async fn get(state: AppState, uri: &str) -> Response {
        let request = axum::http::Request::builder()
            .uri(uri)
            .body(axum::body::Body::empty())
            .unwrap();
        build_router(state).oneshot(request).await.unwrap()
    }

    #[tokio::test]
    async fn test_record_id_is_decoded_once() {
        let state = test_state(&[bout("a%2Fb", "2024-05-01")]);

        // "%25" is a literal percent sign, so the id is "a%2Fb" and not "a/b"
        let response = get(state.clone(), "/api/records/a%252Fb").await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = get(state, "/api/records/a%2Fb").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_csv_download_is_newest_first() {
        let state = test_state(&[bout("old", "2024-05-01"), bout("new", "2024-06-01")]);

        let response = get(state, "/api/export.csv").await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let csv = String::from_utf8(body.to_vec()).unwrap();
        let ids: Vec<&str> = csv.lines().skip(1).map(|l| l.split(',').next().unwrap()).collect();
        assert_eq!(ids, vec!["new", "old"]);
    }
}

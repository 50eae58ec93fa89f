//! HTTP Server for the showstats API.
//!
//! Read-only views over the yearly tables, plus a one-off normalizer for
//! uploaded exports.
//!
//! # API Endpoints
//!
//! | Method | Path                         | Description                          |
//! |--------|------------------------------|--------------------------------------|
//! | GET    | `/health`                    | Health check                         |
//! | GET    | `/api/years`                 | Configured reporting years           |
//! | GET    | `/api/years/{year}`          | Canonical table for one year         |
//! | GET    | `/api/stack`                 | All years stacked                    |
//! | GET    | `/api/programs/{name}?year=` | Program rows, KPIs or diagnostics    |
//! | POST   | `/api/normalize`             | Normalize an uploaded CSV            |
//! | GET    | `/api/logs`                  | SSE stream for real-time logs        |

use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, Method},
    response::{sse::Event, Json, Sse},
    routing::{get, post},
    Router,
};
use futures::stream::Stream;
use serde::Deserialize;
use serde_json::{json, Value};
use std::{convert::Infallible, net::SocketAddr, sync::Arc, time::Duration};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;

use super::logs::{log_error, log_info, log_success, LOG_BROADCASTER};
use super::types::{
    ApiError, NormalizeResponse, ProgramResponse, TableResponse, YearInfo, YearsResponse,
};
use crate::error::ServerError;
use crate::kpi::summarize;
use crate::loader::{DataScope, TableLoader, TableSource};
use crate::parser::{parse_bytes_auto, ParseResult};
use crate::transform::matcher::find_rows;
use crate::transform::schema::normalize_schema_report;

/// Shared handler state.
pub struct AppState<S: TableSource> {
    pub loader: TableLoader<S>,
}

type Shared<S> = State<Arc<AppState<S>>>;

/// Build the router around a loader.
pub fn router<S: TableSource + 'static>(loader: TableLoader<S>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE]);

    let state = Arc::new(AppState { loader });

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/years", get(list_years::<S>))
        .route("/api/years/{year}", get(get_year::<S>))
        .route("/api/stack", get(get_stack::<S>))
        .route("/api/programs/{name}", get(get_program::<S>))
        .route("/api/normalize", post(normalize_upload))
        .route("/api/logs", get(sse_logs))
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server
pub async fn start_server<S: TableSource + 'static>(
    loader: TableLoader<S>,
    port: u16,
) -> Result<(), Box<dyn std::error::Error>> {
    let app = router(loader);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    println!("🚀 Showstats server running on http://localhost:{}", port);
    println!("   GET  /api/years             - Configured years");
    println!("   GET  /api/years/{{year}}      - One year's table");
    println!("   GET  /api/stack             - All years stacked");
    println!("   GET  /api/programs/{{name}}   - Program rows and KPIs");
    println!("   POST /api/normalize         - Normalize a CSV upload");
    println!("   GET  /api/logs              - SSE log stream");
    println!("   GET  /health                - Health check");
    println!();

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check endpoint
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "showstats",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn list_years<S: TableSource>(State(state): Shared<S>) -> Json<YearsResponse> {
    Json(YearsResponse {
        years: state.loader.registry().iter().map(YearInfo::from).collect(),
    })
}

async fn get_year<S: TableSource>(
    State(state): Shared<S>,
    Path(year): Path<String>,
) -> Result<Json<TableResponse>, ApiError> {
    let table = state.loader.load_year(&year).await.map_err(ServerError::from)?;
    Ok(Json(TableResponse::new(Some(year), &table)))
}

async fn get_stack<S: TableSource>(State(state): Shared<S>) -> Result<Json<TableResponse>, ApiError> {
    let table = state.loader.load_all_years().await.map_err(ServerError::from)?;
    log_success(format!("Stacked {} rows", table.row_count()));
    Ok(Json(TableResponse::new(None, &table)))
}

#[derive(Debug, Default, Deserialize)]
struct ProgramQuery {
    year: Option<String>,
}

async fn get_program<S: TableSource>(
    State(state): Shared<S>,
    Path(name): Path<String>,
    Query(query): Query<ProgramQuery>,
) -> Result<Json<ProgramResponse>, ApiError> {
    let scope = DataScope::from(query.year.as_deref().unwrap_or_default());
    let table = state.loader.load_scope(&scope).await.map_err(ServerError::from)?;

    let result = find_rows(&table, &name);
    let summary = result.rows().and_then(|rows| summarize(&name, rows));
    match result.rows() {
        Some(rows) => log_info(format!("'{}' matched {} rows ({})", name, rows.row_count(), scope)),
        None => log_info(format!("'{}' not found ({})", name, scope)),
    }

    Ok(Json(ProgramResponse {
        request_id: uuid::Uuid::new_v4().to_string(),
        query: name,
        scope: scope.to_string(),
        result,
        summary,
    }))
}

/// Normalize an uploaded export. Fields: `file` (required), `hint` (optional
/// program column header).
async fn normalize_upload(mut multipart: Multipart) -> Result<Json<NormalizeResponse>, ApiError> {
    let mut file_data: Option<Vec<u8>> = None;
    let mut file_name: Option<String> = None;
    let mut hint = String::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(format!("Multipart error: {}", e)))?
    {
        match field.name().unwrap_or("") {
            "file" => {
                file_name = field.file_name().map(|s| s.to_string());
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ServerError::BadRequest(format!("Read error: {}", e)))?;
                file_data = Some(bytes.to_vec());
            }
            "hint" => {
                hint = field
                    .text()
                    .await
                    .map_err(|e| ServerError::BadRequest(format!("Read error: {}", e)))?;
            }
            _ => {}
        }
    }

    let bytes = file_data.ok_or_else(|| ServerError::BadRequest("No file provided".into()))?;
    log_info(format!(
        "Normalizing upload {} ({} bytes)",
        file_name.as_deref().unwrap_or("unknown"),
        bytes.len()
    ));

    let ParseResult {
        table,
        encoding,
        delimiter,
    } = parse_bytes_auto(&bytes).map_err(|e| {
        log_error(format!("Upload not parsable: {}", e));
        ServerError::BadRequest(e.to_string())
    })?;
    let report = normalize_schema_report(table, &hint);

    Ok(Json(NormalizeResponse::new(file_name, encoding, delimiter, report)))
}

/// SSE endpoint for real-time log streaming
async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = LOG_BROADCASTER.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(entry) => {
            let json = serde_json::to_string(&entry).ok()?;
            Some(Ok(Event::default().data(json)))
        }
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

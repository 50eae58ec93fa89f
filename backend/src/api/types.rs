//! REST API types for the dashboard.
//!
//! Field names are camelCase on the wire. Tables keep their column order;
//! numbers stay numbers and missing values are `null`.

use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::{LoadError, ServerError};
use crate::kpi::ProgramSummary;
use crate::models::{Cell, Table};
use crate::registry::SourceConfig;
use crate::transform::matcher::MatchResult;
use crate::transform::schema::SchemaReport;

/// Error half of every handler result.
pub type ApiError = (StatusCode, Json<Value>);

fn request_id() -> String {
    Uuid::new_v4().to_string()
}

/// One configured year.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearInfo {
    pub year: String,
    pub program_column_hint: String,
}

impl From<&SourceConfig> for YearInfo {
    fn from(config: &SourceConfig) -> Self {
        Self {
            year: config.year_key.clone(),
            program_column_hint: config.program_column_hint.clone(),
        }
    }
}

/// `GET /api/years`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearsResponse {
    pub years: Vec<YearInfo>,
}

/// A table as columns plus rows.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TablePayload {
    pub row_count: usize,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl From<&Table> for TablePayload {
    fn from(table: &Table) -> Self {
        Self {
            row_count: table.row_count(),
            columns: table.headers().to_vec(),
            rows: table.rows().to_vec(),
        }
    }
}

/// `GET /api/years/{year}` and `GET /api/stack`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableResponse {
    pub request_id: String,
    /// `None` for the stacked table.
    pub year: Option<String>,
    pub table: TablePayload,
}

impl TableResponse {
    pub fn new(year: Option<String>, table: &Table) -> Self {
        Self {
            request_id: request_id(),
            year,
            table: table.into(),
        }
    }
}

/// `GET /api/programs/{name}`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramResponse {
    pub request_id: String,
    pub query: String,
    /// Year key, or `"all"`.
    pub scope: String,
    pub result: MatchResult,
    /// Present only on a match.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<ProgramSummary>,
}

/// `POST /api/normalize`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizeResponse {
    pub request_id: String,
    pub file_name: Option<String>,
    pub encoding: String,
    pub delimiter: String,
    pub program_source: Option<String>,
    pub on_demand_source: Option<String>,
    pub passthrough: Vec<String>,
    pub table: TablePayload,
}

impl NormalizeResponse {
    pub fn new(
        file_name: Option<String>,
        encoding: String,
        delimiter: char,
        report: SchemaReport,
    ) -> Self {
        Self {
            request_id: request_id(),
            file_name,
            encoding,
            delimiter: delimiter.to_string(),
            table: (&report.table).into(),
            program_source: report.program_source,
            on_demand_source: report.on_demand_source,
            passthrough: report.passthrough,
        }
    }
}

/// HTTP status for an error.
pub fn status_for(err: &ServerError) -> StatusCode {
    match err {
        ServerError::Load(LoadError::Config { .. }) => StatusCode::NOT_FOUND,
        ServerError::Load(LoadError::SourceFetch { .. }) => StatusCode::BAD_GATEWAY,
        ServerError::Load(LoadError::Schema { .. }) => StatusCode::UNPROCESSABLE_ENTITY,
        ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
    }
}

/// Machine-readable error kind.
pub fn error_kind(err: &ServerError) -> &'static str {
    match err {
        ServerError::Load(LoadError::Config { .. }) => "config",
        ServerError::Load(LoadError::SourceFetch { .. }) => "source_fetch",
        ServerError::Load(LoadError::Schema { .. }) => "schema",
        ServerError::BadRequest(_) => "bad_request",
    }
}

/// Create an error response body
pub fn error_response(kind: &str, error: &str) -> Value {
    json!({
        "requestId": request_id(),
        "status": "error",
        "kind": kind,
        "error": error,
    })
}

impl From<ServerError> for ApiError {
    fn from(err: ServerError) -> Self {
        (
            status_for(&err),
            Json(error_response(error_kind(&err), &err.to_string())),
        )
    }
}

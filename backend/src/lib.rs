//! # Showstats - listener statistics for a community radio station
//!
//! Each reporting year the station exports a listener-statistics sheet whose
//! columns drift from year to year. Showstats fetches those exports, maps
//! them onto one canonical schema, stacks the years, and resolves a program
//! name to its rows.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  Registry   │────▶│   Loader    │────▶│   Schema    │────▶│   Matcher   │
//! │ (year→src)  │     │ (fetch+TTL) │     │ (canonical) │     │  (+ KPIs)   │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use showstats::{find_rows, HttpSource, SourceRegistry, TableLoader};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let source = HttpSource::new(Duration::from_secs(30)).unwrap();
//!     let loader = TableLoader::new(SourceRegistry::builtin(), source);
//!     let table = loader.load_all_years().await.unwrap();
//!     println!("{}", find_rows(&table, "Giant Steps").is_match());
//! }
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Error types per layer
//! - [`models`] - Cells, tables, canonical field names
//! - [`parser`] - CSV parsing with auto-detection
//! - [`transform`] - Text normalization, schema unification, matching
//! - [`registry`] - Year to source configuration
//! - [`validation`] - Registry JSON Schema validation
//! - [`cache`] - Time-windowed table cache
//! - [`loader`] - Sources, loading, stacking
//! - [`kpi`] - Program KPIs
//! - [`config`] - Environment settings
//! - [`api`] - HTTP API server

// Core modules
pub mod error;
pub mod models;

// Parsing
pub mod parser;

// Transformation
pub mod transform;

// Configuration
pub mod config;
pub mod registry;
pub mod validation;

// Loading
pub mod cache;
pub mod loader;

// Reporting
pub mod kpi;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{FetchError, LoadError, RegistryError, ServerError, SettingsError};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{fields, CanonicalTable, Cell, RawTable, StackedTable, Table};

// =============================================================================
// Re-exports - CSV Parsing
// =============================================================================

pub use parser::{
    decode_content, detect_delimiter, detect_encoding, parse_bytes_auto, parse_file_auto,
    parse_table, write_csv, CsvError, ParseResult,
};

// =============================================================================
// Re-exports - Transform
// =============================================================================

pub use transform::matcher::{find_rows, MatchDiagnostic, MatchResult, MatchedBy};
pub use transform::schema::{normalize_schema, normalize_schema_report, SchemaReport};
pub use transform::text::normalize;

// =============================================================================
// Re-exports - Registry, Validation
// =============================================================================

pub use registry::{SourceConfig, SourceRegistry};
pub use validation::{validate, validate_source_registry};

// =============================================================================
// Re-exports - Loading
// =============================================================================

pub use cache::{Clock, ManualClock, SystemClock, TableCache};
pub use config::Settings;
pub use loader::{
    stack_years, DataScope, DirSource, HttpSource, SourceBackend, TableLoader, TableSource,
};

// =============================================================================
// Re-exports - KPIs
// =============================================================================

pub use kpi::{pick_program_row, summarize, ProgramSummary};

// Server
pub mod server {
    pub use crate::api::server::{router, start_server};
}

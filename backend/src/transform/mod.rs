//! Transformation module.
//!
//! This module turns raw yearly exports into comparable data:
//! - Text: identifier normalization for matching
//! - Schema: header unification into the canonical schema
//! - Matcher: program lookup with diagnostic fallback

pub mod matcher;
pub mod schema;
pub mod text;

pub use matcher::{find_rows, MatchDiagnostic, MatchResult, MatchedBy, ValueSamples};
pub use schema::{normalize_schema, normalize_schema_report, SchemaReport};
pub use text::{normalize, normalize_cell};

//! Program lookup: exact normalized match, `pn` fallback, then diagnostics.
//!
//! ```text
//! query ──normalize──▶ key
//!                       │
//!        program == key ├──▶ Matched { matched_by: Program }
//!             pn == key ├──▶ Matched { matched_by: Pn }
//!                       └──▶ NotFound(diagnostic)
//! ```
//!
//! The diagnostic lists substring candidates for a human to review. It never
//! picks one: silently matching the wrong program is worse than no match.

use serde::Serialize;
use std::collections::HashMap;

use super::text::normalize;
use crate::models::{fields, Table};

/// Maximum original spellings kept per normalized value.
pub const MAX_SAMPLES: usize = 3;

/// Which column produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchedBy {
    Program,
    Pn,
}

/// Original spellings seen for one normalized value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValueSamples {
    pub normalized: String,
    pub examples: Vec<String>,
}

/// Why nothing matched, and what came close.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchDiagnostic {
    /// Normalized query.
    pub query: String,
    /// `program` values whose normalized form contains the query.
    pub program_candidates: Vec<String>,
    /// `pn` values whose normalized form contains the query.
    pub pn_candidates: Vec<String>,
    /// Every distinct normalized `program` value with sample spellings.
    pub program_values: Vec<ValueSamples>,
    /// Every distinct normalized `pn` value with sample spellings.
    pub pn_values: Vec<ValueSamples>,
}

impl MatchDiagnostic {
    pub fn has_candidates(&self) -> bool {
        !self.program_candidates.is_empty() || !self.pn_candidates.is_empty()
    }
}

/// Outcome of [`find_rows`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MatchResult {
    /// Non-empty row subset, in table order, unaggregated.
    Matched { matched_by: MatchedBy, rows: Table },
    /// No exact match on `program` or `pn`.
    NotFound(MatchDiagnostic),
}

impl MatchResult {
    pub fn is_match(&self) -> bool {
        matches!(self, MatchResult::Matched { .. })
    }

    pub fn rows(&self) -> Option<&Table> {
        match self {
            MatchResult::Matched { rows, .. } => Some(rows),
            MatchResult::NotFound(_) => None,
        }
    }

    pub fn diagnostic(&self) -> Option<&MatchDiagnostic> {
        match self {
            MatchResult::Matched { .. } => None,
            MatchResult::NotFound(d) => Some(d),
        }
    }
}

/// One column's original values next to their normalized shadow.
struct Shadow<'a> {
    originals: Vec<std::borrow::Cow<'a, str>>,
    normalized: Vec<String>,
}

impl<'a> Shadow<'a> {
    fn build(table: &'a Table, column: &str) -> Option<Self> {
        let originals: Vec<_> = table.column(column)?.map(|c| c.as_text()).collect();
        let normalized = originals.iter().map(|s| normalize(s)).collect();
        Some(Self {
            originals,
            normalized,
        })
    }

    fn exact(&self, key: &str) -> Vec<usize> {
        self.normalized
            .iter()
            .enumerate()
            .filter(|(_, v)| v.as_str() == key)
            .map(|(i, _)| i)
            .collect()
    }

    fn containing(&self, key: &str) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for (original, normalized) in self.originals.iter().zip(&self.normalized) {
            if normalized.contains(key) && !out.iter().any(|o| o == original) {
                out.push(original.to_string());
            }
        }
        out
    }

    fn samples(&self) -> Vec<ValueSamples> {
        let mut index: HashMap<&str, usize> = HashMap::new();
        let mut out: Vec<ValueSamples> = Vec::new();
        for (original, normalized) in self.originals.iter().zip(&self.normalized) {
            if normalized.is_empty() {
                continue;
            }
            let slot = *index.entry(normalized.as_str()).or_insert_with(|| {
                out.push(ValueSamples {
                    normalized: normalized.clone(),
                    examples: Vec::new(),
                });
                out.len() - 1
            });
            let examples = &mut out[slot].examples;
            if examples.len() < MAX_SAMPLES && !examples.iter().any(|e| e == original) {
                examples.push(original.to_string());
            }
        }
        out
    }
}

/// Resolve a program name to its rows.
///
/// Exact match on normalized `program` first, then on normalized `pn`. When
/// neither matches, returns [`MatchResult::NotFound`] with substring
/// candidates and per-value samples. A blank query never matches, since an
/// empty `program` means the row is unresolved.
pub fn find_rows(table: &Table, program_name: &str) -> MatchResult {
    let key = normalize(program_name);
    let program = Shadow::build(table, fields::PROGRAM);
    let pn = Shadow::build(table, fields::PN);

    if !key.is_empty() {
        for (shadow, matched_by) in [(&program, MatchedBy::Program), (&pn, MatchedBy::Pn)] {
            let Some(shadow) = shadow else { continue };
            let hits = shadow.exact(&key);
            if !hits.is_empty() {
                return MatchResult::Matched {
                    matched_by,
                    rows: table.select_rows(&hits),
                };
            }
        }
    }

    let candidates = |shadow: &Option<Shadow<'_>>| match shadow {
        Some(s) if !key.is_empty() => s.containing(&key),
        _ => Vec::new(),
    };
    let samples = |shadow: &Option<Shadow<'_>>| {
        shadow.as_ref().map(Shadow::samples).unwrap_or_default()
    };

    MatchResult::NotFound(MatchDiagnostic {
        program_candidates: candidates(&program),
        pn_candidates: candidates(&pn),
        program_values: samples(&program),
        pn_values: samples(&pn),
        query: key,
    })
}

//! Column-schema unification across yearly exports.
//!
//! Every reporting year ships a differently shaped sheet: `Section Name` one
//! year, `Program Name` the next, an on-demand total whose header embeds the
//! year. [`normalize_schema`] maps any of them onto [`fields::CANONICAL`].
//!
//! # Algorithm
//!
//! 1. Lower-case and trim headers
//! 2. Exact-match alias table ([`ALIASES`])
//! 3. Resolve `program`: configured hint, else `section`
//! 4. Detect the on-demand total column by substring
//! 5. Synthesize missing canonical fields
//! 6. Coerce counts to non-negative numbers
//! 7. Strip `%` from `percent_of_total` and coerce
//! 8. Canonical fields first, passthrough columns after, in original order

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use super::text::normalize;
use crate::models::{fields, CanonicalTable, Cell, RawTable};

/// Intermediate name for a `section name` column; promoted to `program`
/// when nothing better exists.
const SECTION: &str = "section";

/// Known header spellings, applied only on exact (lower-cased, trimmed) match.
pub const ALIASES: &[(&str, &str)] = &[
    ("section name", SECTION),
    ("program name", fields::PROGRAM),
    ("title", fields::TITLE),
    ("channel", fields::CHANNEL),
    ("items selected", fields::ITEMS_SELECTED),
    ("total items selected", fields::TOTAL_ITEMS_SELECTED),
    ("percent of total", fields::PERCENT_OF_TOTAL),
    ("pn", fields::PN),
    ("_id", fields::RECORD_ID),
    // Canonical spellings map to themselves so normalized tables stay stable.
    ("program", fields::PROGRAM),
    ("items_selected", fields::ITEMS_SELECTED),
    ("total_items_selected", fields::TOTAL_ITEMS_SELECTED),
    ("on_demand_items_selected", fields::ON_DEMAND_ITEMS_SELECTED),
    ("on_demand items selected", fields::ON_DEMAND_ITEMS_SELECTED),
    ("percent_of_total", fields::PERCENT_OF_TOTAL),
    ("record_id", fields::RECORD_ID),
];

/// How a canonical field is coerced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Non-negative number, 0 when unparsable.
    Count,
    /// Number with an optional trailing `%`, 0 when unparsable.
    Percent,
    /// Free text, empty when missing.
    Text,
}

/// Coercion kind of a canonical field, `None` for passthrough columns.
pub fn field_kind(field: &str) -> Option<FieldKind> {
    match field {
        fields::ITEMS_SELECTED | fields::TOTAL_ITEMS_SELECTED | fields::ON_DEMAND_ITEMS_SELECTED => {
            Some(FieldKind::Count)
        }
        fields::PERCENT_OF_TOTAL => Some(FieldKind::Percent),
        fields::PROGRAM | fields::CHANNEL | fields::TITLE | fields::PN | fields::RECORD_ID => {
            Some(FieldKind::Text)
        }
        _ => None,
    }
}

/// Outcome of a schema normalization.
#[derive(Debug, Clone, Serialize)]
pub struct SchemaReport {
    /// The canonical table.
    pub table: CanonicalTable,
    /// Original header that became `program`, if any.
    pub program_source: Option<String>,
    /// Original header that became `on_demand_items_selected`, if any.
    pub on_demand_source: Option<String>,
    /// Headers kept as-is after the canonical fields.
    pub passthrough: Vec<String>,
}

impl SchemaReport {
    /// Whether a source column was mapped onto `program`.
    pub fn program_resolved(&self) -> bool {
        self.program_source.is_some()
    }
}

/// Map an arbitrary yearly table onto the canonical schema.
///
/// Never fails. A table without any mappable program column comes back with
/// an empty `program` column; callers decide whether that is fatal.
pub fn normalize_schema(raw: RawTable, program_column_hint: &str) -> CanonicalTable {
    normalize_schema_report(raw, program_column_hint).table
}

/// [`normalize_schema`], also reporting which source headers were mapped.
pub fn normalize_schema_report(raw: RawTable, program_column_hint: &str) -> SchemaReport {
    let mut table = raw;
    let original: Vec<String> = table.headers().to_vec();

    // 1-2. lower/trim, then exact aliases
    for (idx, header) in original.iter().enumerate() {
        let lowered = header.trim().to_lowercase();
        let mapped = alias_for(&lowered).map(str::to_string).unwrap_or(lowered);
        table.rename_at(idx, mapped);
    }

    // 3. program precedence: existing > hint > section
    let mut program_source = table
        .column_index(fields::PROGRAM)
        .map(|i| original[i].clone());

    if program_source.is_none() {
        let hint = program_column_hint.trim().to_lowercase();
        let candidate = if hint.is_empty() {
            None
        } else {
            table.column_index(&hint)
        };
        if let Some(idx) = candidate.or_else(|| table.column_index(SECTION)) {
            table.rename_at(idx, fields::PROGRAM);
            program_source = Some(original[idx].clone());
        }
    }

    // 4. "Total Items Selected using the On Demand Channel in 2023"
    let mut on_demand_source = None;
    if !table.has_column(fields::ON_DEMAND_ITEMS_SELECTED) {
        if let Some(idx) = table.headers().iter().position(|h| is_on_demand_total(h)) {
            table.rename_at(idx, fields::ON_DEMAND_ITEMS_SELECTED);
            on_demand_source = Some(original[idx].clone());
        }
    }

    // 5-7. synthesize and coerce
    for field in fields::CANONICAL {
        let kind = field_kind(field).unwrap_or(FieldKind::Text);
        let idx = match table.column_index(field) {
            Some(idx) => idx,
            None => {
                let fill = match kind {
                    FieldKind::Count | FieldKind::Percent => Cell::Number(0.0),
                    // empty text; see `Cell` for the null convention
                    FieldKind::Text => Cell::Empty,
                };
                table.add_column(field, fill);
                table.headers().len() - 1
            }
        };
        match kind {
            FieldKind::Count => table.map_column(idx, |c| Cell::Number(coerce_count(c))),
            FieldKind::Percent => table.map_column(idx, |c| Cell::Number(coerce_percent(c))),
            FieldKind::Text => {}
        }
    }

    // 8. canonical first, then passthrough in original order
    let canonical: Vec<usize> = fields::CANONICAL
        .iter()
        .filter_map(|f| table.column_index(f))
        .collect();
    let rest: Vec<usize> = (0..table.headers().len())
        .filter(|i| !canonical.contains(i))
        .collect();
    let passthrough = rest.iter().map(|&i| table.headers()[i].clone()).collect();

    let order: Vec<usize> = canonical.into_iter().chain(rest).collect();
    table.reorder(&order);

    SchemaReport {
        table,
        program_source,
        on_demand_source,
        passthrough,
    }
}

fn alias_for(header: &str) -> Option<&'static str> {
    ALIASES
        .iter()
        .find(|(alias, _)| *alias == header)
        .map(|(_, field)| *field)
}

/// True for headers naming the on-demand channel total. Hyphens count as
/// spaces so `On-Demand` is recognized too.
fn is_on_demand_total(header: &str) -> bool {
    let key = normalize(&header.replace('-', " "));
    key.contains("total items selected") && key.contains("on demand")
}

/// `1,234` or `-12,345.5`
static THOUSANDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[+-]?\d{1,3}(,\d{3})+(\.\d+)?$").expect("Invalid thousands pattern")
});

/// Parse a cell as a finite number.
pub fn parse_number(cell: &Cell) -> Option<f64> {
    let parsed = match cell {
        Cell::Number(n) => Some(*n),
        Cell::Empty => None,
        Cell::Text(s) => parse_numeric_text(s.trim()),
    };
    parsed.filter(|n| n.is_finite())
}

fn parse_numeric_text(s: &str) -> Option<f64> {
    if s.is_empty() {
        return None;
    }
    s.parse::<f64>().ok().or_else(|| {
        if THOUSANDS.is_match(s) {
            s.replace(',', "").parse::<f64>().ok()
        } else {
            None
        }
    })
}

/// Non-negative number; unparsable, negative, or non-finite values are 0.
pub fn coerce_count(cell: &Cell) -> f64 {
    match parse_number(cell) {
        // + 0.0 turns -0.0 into 0.0
        Some(n) if n >= 0.0 => n + 0.0,
        _ => 0.0,
    }
}

/// Number after stripping one trailing `%`; unparsable values are 0.
/// No range clamping.
pub fn coerce_percent(cell: &Cell) -> f64 {
    match cell {
        Cell::Text(s) => {
            let trimmed = s.trim();
            let stripped = trimmed.strip_suffix('%').unwrap_or(trimmed);
            parse_number(&Cell::text(stripped.trim_end()))
        }
        other => parse_number(other),
    }
    .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Table;

    fn table(headers: &[&str], rows: &[&[&str]]) -> Table {
        Table::from_rows(
            headers.iter().map(|h| h.to_string()).collect(),
            rows.iter()
                .map(|r| r.iter().map(|v| Cell::from(*v)).collect())
                .collect(),
        )
    }

    #[test]
    fn test_all_canonical_fields_present() {
        let inputs = [
            table(&["Program Name"], &[&["Giant Steps"]]),
            table(&["Section Name", "Items Selected"], &[&["K-Wave", "3"]]),
            table(&["Whatever"], &[&["x"]]),
            Table::default(),
        ];
        for input in inputs {
            let out = normalize_schema(input, "Program Name");
            for field in fields::CANONICAL {
                assert!(out.has_column(field), "missing {}", field);
            }
            assert_eq!(&out.headers()[..9], &fields::CANONICAL.map(String::from));
        }
    }

    #[test]
    fn test_aliases_and_column_order() {
        let raw = table(
            &["Extra", " Title ", "PN", "Program Name", "_id", "Channel"],
            &[&["e", "Song", "P1", "Giant Steps", "abc", "FM"]],
        );
        let report = normalize_schema_report(raw, "Program Name");
        let out = &report.table;

        assert_eq!(report.program_source.as_deref(), Some("Program Name"));
        assert_eq!(out.get(0, fields::PROGRAM), Some(&Cell::from("Giant Steps")));
        assert_eq!(out.get(0, fields::TITLE), Some(&Cell::from("Song")));
        assert_eq!(out.get(0, fields::PN), Some(&Cell::from("P1")));
        assert_eq!(out.get(0, fields::RECORD_ID), Some(&Cell::from("abc")));
        assert_eq!(out.headers().last().map(String::as_str), Some("extra"));
        assert_eq!(report.passthrough, vec!["extra".to_string()]);
    }

    #[test]
    fn test_hint_names_program_column() {
        let raw = table(&["Show"], &[&["Night Train"]]);
        let report = normalize_schema_report(raw, " SHOW ");
        assert_eq!(report.program_source.as_deref(), Some("Show"));
        assert_eq!(report.table.get(0, fields::PROGRAM), Some(&Cell::from("Night Train")));
    }

    #[test]
    fn test_section_promoted_to_program() {
        let raw = table(&["Section Name", "Items Selected"], &[&["Sunday Folks", "4"]]);
        let report = normalize_schema_report(raw, "Section Name");
        assert_eq!(report.program_source.as_deref(), Some("Section Name"));
        assert_eq!(report.table.get(0, fields::PROGRAM), Some(&Cell::from("Sunday Folks")));
        assert!(!report.table.has_column(SECTION));
    }

    #[test]
    fn test_existing_program_wins_over_section() {
        let raw = table(&["Section Name", "Program Name"], &[&["Block A", "Giant Steps"]]);
        let report = normalize_schema_report(raw, "Section Name");
        assert_eq!(report.table.get(0, fields::PROGRAM), Some(&Cell::from("Giant Steps")));
        assert_eq!(report.table.get(0, SECTION), Some(&Cell::from("Block A")));
    }

    #[test]
    fn test_unresolved_program_is_synthesized_empty() {
        let raw = table(&["Foo"], &[&["bar"]]);
        let report = normalize_schema_report(raw, "Program Name");
        assert!(!report.program_resolved());
        assert_eq!(report.table.get(0, fields::PROGRAM), Some(&Cell::Empty));
    }

    #[test]
    fn test_synthesized_text_is_empty_string_in_csv_null_in_json() {
        let raw = table(&["Program Name"], &[&["Giant Steps"]]);
        let canonical = normalize_schema(raw, "Program Name");

        let title = canonical.get(0, fields::TITLE).unwrap();
        assert!(title.is_empty());
        assert_eq!(title.as_text(), "");
        assert!(serde_json::to_value(title).unwrap().is_null());

        let csv = crate::parser::write_csv(&canonical).unwrap();
        assert!(csv.lines().nth(1).unwrap().starts_with("Giant Steps,0,0,0,0,,,,"));
    }

    #[test]
    fn test_on_demand_header_detected() {
        let raw = table(
            &[
                "Program Name",
                "Total Items Selected using the On Demand Channel in 2023",
                "Total Items Selected using the On-Demand Channel in 2024",
            ],
            &[&["Giant Steps", "17", "99"]],
        );
        let report = normalize_schema_report(raw, "Program Name");
        assert_eq!(
            report.on_demand_source.as_deref(),
            Some("Total Items Selected using the On Demand Channel in 2023")
        );
        assert_eq!(
            report.table.get(0, fields::ON_DEMAND_ITEMS_SELECTED),
            Some(&Cell::Number(17.0))
        );
        // second match stays a passthrough column
        assert_eq!(report.passthrough.len(), 1);
    }

    #[test]
    fn test_percent_coercion() {
        let values = ["45%", "45", "", "abc"];
        let rows: Vec<Vec<&str>> = values.iter().map(|v| vec!["p", *v]).collect();
        let row_refs: Vec<&[&str]> = rows.iter().map(|r| r.as_slice()).collect();
        let raw = table(&["Program Name", "Percent of Total"], &row_refs);

        let out = normalize_schema(raw, "Program Name");
        let got: Vec<f64> = out
            .column(fields::PERCENT_OF_TOTAL)
            .unwrap()
            .map(|c| c.as_number().unwrap())
            .collect();
        assert_eq!(got, vec![45.0, 45.0, 0.0, 0.0]);
    }

    #[test]
    fn test_percent_is_not_clamped() {
        assert_eq!(coerce_percent(&Cell::from("130%")), 130.0);
        assert_eq!(coerce_percent(&Cell::from(" 12.5 % ")), 12.5);
        assert_eq!(coerce_percent(&Cell::from("-3")), -3.0);
    }

    #[test]
    fn test_count_coercion() {
        assert_eq!(coerce_count(&Cell::from("12")), 12.0);
        assert_eq!(coerce_count(&Cell::from(" 1,234 ")), 1234.0);
        assert_eq!(coerce_count(&Cell::from("-5")), 0.0);
        assert_eq!(coerce_count(&Cell::from("NaN")), 0.0);
        assert_eq!(coerce_count(&Cell::from("n/a")), 0.0);
        assert_eq!(coerce_count(&Cell::Empty), 0.0);
        assert_eq!(coerce_count(&Cell::Number(7.0)), 7.0);
    }

    #[test]
    fn test_renormalizing_is_stable() {
        let raw = table(
            &["Section Name", "Items Selected", "Percent of Total", "Notes"],
            &[&["Sunday Folks", "4", "2%", "n"]],
        );
        let once = normalize_schema(raw, "Section Name");
        let twice = normalize_schema(once.clone(), "Section Name");
        assert_eq!(once, twice);
    }
}

//! Program KPIs computed over a matched row subset.
//!
//! A program usually appears on several rows (one per channel or title) that
//! all repeat the same period totals. The "program row" is the one with the
//! largest `total_items_selected`; headline numbers come from it, breakdowns
//! sum `items_selected` across every row.

use serde::Serialize;
use std::collections::HashMap;

use crate::models::{fields, Cell, Table};
use crate::transform::schema::{coerce_count, coerce_percent};

/// Titles kept in [`ProgramSummary::top_titles`].
pub const TOP_TITLES: usize = 10;

/// Plays attributed to one label (a channel or a title).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tally {
    pub label: String,
    pub plays: f64,
}

/// Program total for one reporting year.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearTotal {
    pub year: String,
    pub total_items_selected: f64,
}

/// Headline numbers and breakdowns for one program.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgramSummary {
    pub program: String,
    pub show_plays: f64,
    pub share_of_station: f64,
    pub on_demand_plays: f64,
    pub channels: Vec<Tally>,
    pub top_titles: Vec<Tally>,
    /// Empty unless the rows carry a `year` column.
    pub year_totals: Vec<YearTotal>,
}

/// Index of the row with the largest `total_items_selected`. The first row
/// wins ties.
pub fn pick_program_row(rows: &Table) -> Option<usize> {
    let idx = rows.column_index(fields::TOTAL_ITEMS_SELECTED);
    let mut best: Option<(usize, f64)> = None;

    for (i, row) in rows.rows().iter().enumerate() {
        let total = idx.map(|c| coerce_count(&row[c])).unwrap_or(0.0);
        match best {
            Some((_, max)) if total <= max => {}
            _ => best = Some((i, total)),
        }
    }
    best.map(|(i, _)| i)
}

/// Summarize a matched subset. `None` when there are no rows.
pub fn summarize(program: &str, rows: &Table) -> Option<ProgramSummary> {
    let picked = pick_program_row(rows)?;
    let count_at = |field: &str| rows.get(picked, field).map(coerce_count).unwrap_or(0.0);

    let show_plays = if rows.has_column(fields::TOTAL_ITEMS_SELECTED) {
        count_at(fields::TOTAL_ITEMS_SELECTED)
    } else {
        rows.column(fields::ITEMS_SELECTED)
            .map(|cells| cells.map(coerce_count).sum())
            .unwrap_or(0.0)
    };

    let share_of_station = rows
        .get(picked, fields::PERCENT_OF_TOTAL)
        .map(coerce_percent)
        .unwrap_or(0.0);

    let mut top_titles = tally_by(rows, fields::TITLE);
    top_titles.truncate(TOP_TITLES);

    Some(ProgramSummary {
        program: program.to_string(),
        show_plays,
        share_of_station,
        on_demand_plays: count_at(fields::ON_DEMAND_ITEMS_SELECTED),
        channels: tally_by(rows, fields::CHANNEL),
        top_titles,
        year_totals: year_totals(rows),
    })
}

/// Sum `items_selected` per trimmed label, largest first. Blank labels are
/// skipped; equal sums keep first-seen order.
fn tally_by(rows: &Table, label_field: &str) -> Vec<Tally> {
    let (Some(label_idx), Some(items_idx)) = (
        rows.column_index(label_field),
        rows.column_index(fields::ITEMS_SELECTED),
    ) else {
        return Vec::new();
    };

    let mut tallies: Vec<Tally> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for row in rows.rows() {
        let label = row[label_idx].as_text().trim().to_string();
        if label.is_empty() {
            continue;
        }
        let plays = coerce_count(&row[items_idx]);
        match positions.get(&label) {
            Some(&pos) => tallies[pos].plays += plays,
            None => {
                positions.insert(label.clone(), tallies.len());
                tallies.push(Tally { label, plays });
            }
        }
    }

    tallies.sort_by(|a, b| b.plays.total_cmp(&a.plays));
    tallies
}

/// Max `total_items_selected` per year, ascending by year.
fn year_totals(rows: &Table) -> Vec<YearTotal> {
    let (Some(year_idx), Some(total_idx)) = (
        rows.column_index(fields::YEAR),
        rows.column_index(fields::TOTAL_ITEMS_SELECTED),
    ) else {
        return Vec::new();
    };

    let mut totals: Vec<YearTotal> = Vec::new();
    for row in rows.rows() {
        let year = match &row[year_idx] {
            Cell::Empty => continue,
            cell => cell.as_text().into_owned(),
        };
        let total = coerce_count(&row[total_idx]);
        match totals.iter_mut().find(|t| t.year == year) {
            Some(existing) => existing.total_items_selected = existing.total_items_selected.max(total),
            None => totals.push(YearTotal {
                year,
                total_items_selected: total,
            }),
        }
    }

    totals.sort_by(|a, b| a.year.cmp(&b.year));
    totals
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(headers: &[&str], data: &[&[Cell]]) -> Table {
        Table::from_rows(
            headers.iter().map(|h| h.to_string()).collect(),
            data.iter().map(|r| r.to_vec()).collect(),
        )
    }

    fn giant_steps() -> Table {
        let t = |s: &str| Cell::from(s);
        let n = Cell::Number;
        rows(
            &[
                fields::PROGRAM,
                fields::CHANNEL,
                fields::TITLE,
                fields::ITEMS_SELECTED,
                fields::TOTAL_ITEMS_SELECTED,
                fields::ON_DEMAND_ITEMS_SELECTED,
                fields::PERCENT_OF_TOTAL,
                fields::YEAR,
            ],
            &[
                &[t("Giant Steps"), t("Web "), t("Ep 1"), n(4.0), n(10.0), n(3.0), n(1.5), t("2022")],
                &[t("Giant Steps"), t("App"), t("Ep 2"), n(6.0), n(12.0), n(5.0), n(2.5), t("2023")],
                &[t("Giant Steps"), t("Web"), t("Ep 1"), n(5.0), n(12.0), n(9.0), n(9.9), t("2023")],
            ],
        )
    }

    #[test]
    fn test_pick_max_total_first_wins() {
        assert_eq!(pick_program_row(&giant_steps()), Some(1));
        assert_eq!(pick_program_row(&Table::default()), None);
    }

    #[test]
    fn test_summary_headlines_from_picked_row() {
        let summary = summarize("Giant Steps", &giant_steps()).unwrap();
        assert_eq!(summary.show_plays, 12.0);
        assert_eq!(summary.share_of_station, 2.5);
        assert_eq!(summary.on_demand_plays, 5.0);
    }

    #[test]
    fn test_channel_and_title_sums() {
        let summary = summarize("Giant Steps", &giant_steps()).unwrap();
        assert_eq!(
            summary.channels,
            vec![
                Tally { label: "Web".into(), plays: 9.0 },
                Tally { label: "App".into(), plays: 6.0 },
            ]
        );
        assert_eq!(summary.top_titles[0], Tally { label: "Ep 1".into(), plays: 9.0 });
    }

    #[test]
    fn test_year_totals_take_max() {
        let summary = summarize("Giant Steps", &giant_steps()).unwrap();
        let totals: Vec<(&str, f64)> = summary
            .year_totals
            .iter()
            .map(|y| (y.year.as_str(), y.total_items_selected))
            .collect();
        assert_eq!(totals, vec![("2022", 10.0), ("2023", 12.0)]);
    }

    #[test]
    fn test_without_totals_sums_items() {
        let table = rows(
            &[fields::PROGRAM, fields::ITEMS_SELECTED],
            &[
                &[Cell::from("Night Train"), Cell::Number(2.0)],
                &[Cell::from("Night Train"), Cell::Number(3.0)],
            ],
        );
        let summary = summarize("Night Train", &table).unwrap();
        assert_eq!(summary.show_plays, 5.0);
        assert!(summary.year_totals.is_empty());
        assert!(summary.channels.is_empty());
    }

    #[test]
    fn test_top_titles_capped() {
        let data: Vec<Vec<Cell>> = (0..15)
            .map(|i| vec![Cell::from(format!("Ep {}", i)), Cell::Number(i as f64)])
            .collect();
        let table = Table::from_rows(
            vec![fields::TITLE.to_string(), fields::ITEMS_SELECTED.to_string()],
            data,
        );
        let summary = summarize("x", &table).unwrap();
        assert_eq!(summary.top_titles.len(), TOP_TITLES);
        assert_eq!(summary.top_titles[0].label, "Ep 14");
    }

    #[test]
    fn test_empty_subset() {
        assert!(summarize("x", &Table::new(vec![fields::PROGRAM.into()])).is_none());
    }
}

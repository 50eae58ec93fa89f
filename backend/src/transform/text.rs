//! Text normalization for identifier matching.
//!
//! Program names drift across yearly exports: curly apostrophes, doubled or
//! non-breaking spaces, decomposed accents, casing. [`normalize`] maps all of
//! those spellings onto one comparison key.

use unicode_normalization::UnicodeNormalization;

use crate::models::Cell;

/// Typographic right single quotation mark.
const CURLY_APOSTROPHE: char = '\u{2019}';

/// Canonicalize free text for comparison.
///
/// Steps, in order:
/// 1. Unicode NFC
/// 2. curly apostrophe to `'`
/// 3. whitespace runs (no-break spaces included) to one space
/// 4. trim
/// 5. full case folding, so `ß` equals `ss`
/// 6. NFC again, since folding can leave composable sequences
///
/// Total: any input, including the empty string, yields a string.
///
/// # Example
/// ```ignore
/// use showstats::normalize;
///
/// assert_eq!(normalize("  Hawai’i  Radio\u{a0}Connection "), "hawai'i radio connection");
/// ```
pub fn normalize(text: &str) -> String {
    let composed: String = text
        .nfc()
        .map(|c| if c == CURLY_APOSTROPHE { '\'' } else { c })
        .collect();

    // split_whitespace splits on the Unicode White_Space set and drops the
    // leading/trailing runs, which covers steps 3 and 4.
    let collapsed = composed.split_whitespace().collect::<Vec<_>>().join(" ");

    let folded = caseless::default_case_fold_str(&collapsed);
    folded.nfc().collect()
}

/// [`normalize`] applied to a cell's text rendering.
pub fn normalize_cell(cell: &Cell) -> String {
    normalize(&cell.as_text())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apostrophes_compare_equal() {
        assert_eq!(normalize("O'Brien"), normalize("O\u{2019}Brien"));
    }

    #[test]
    fn test_whitespace_collapsed_and_trimmed() {
        assert_eq!(normalize("  Multi   Space  "), normalize("Multi Space"));
        assert_eq!(normalize("Night\u{a0}\u{a0}Train\t"), "night train");
    }

    #[test]
    fn test_case_folding_beyond_lowercase() {
        assert_eq!(normalize("STRASSE"), normalize("Straße"));
        assert_eq!(normalize("Sunday Folks"), normalize("sunday folks"));
    }

    #[test]
    fn test_composed_and_decomposed_forms_match() {
        // "é" precomposed vs "e" + combining acute
        assert_eq!(normalize("Caf\u{e9}"), normalize("Cafe\u{301}"));
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize(" \u{a0}\t\n"), "");
        assert_eq!(normalize_cell(&Cell::Empty), "");
    }

    #[test]
    fn test_idempotent() {
        let samples = [
            "",
            "Sunday’s Hornpipe",
            "  Roots Rock & Soul  with Iaan Hughes ",
            "Straße\u{a0}Ǉ",
            "Cafe\u{301} \u{1f0}",
            "K-Wave",
            "\u{df}\u{301}",
            "\u{149}\u{301}",
            "\u{17f}\u{301}",
            "\u{3aa}\u{301}",
        ];
        for s in samples {
            let once = normalize(s);
            assert_eq!(normalize(&once), once, "not idempotent for {:?}", s);
        }
    }

    #[test]
    fn test_number_cell_uses_text_rendering() {
        assert_eq!(normalize_cell(&Cell::Number(2003.0)), "2003");
    }
}

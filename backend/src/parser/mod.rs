//! Generic CSV parser with encoding and delimiter auto-detection.
//!
//! Turns the byte stream of a yearly export into a [`RawTable`]. No
//! schema-specific logic here; header mapping lives in
//! [`crate::transform::schema`].

use std::path::Path;

use crate::models::{Cell, RawTable, Table};

/// CSV parsing error with its source line (0 when unknown)
#[derive(Debug, Clone)]
pub struct CsvError {
    pub line: usize,
    pub message: String,
}

impl std::fmt::Display for CsvError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Line {}: {}", self.line, self.message)
    }
}

impl std::error::Error for CsvError {}

impl CsvError {
    pub fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

impl From<csv::Error> for CsvError {
    fn from(e: csv::Error) -> Self {
        let line = e.position().map(|p| p.line() as usize).unwrap_or(0);
        CsvError::new(line, e.to_string())
    }
}

/// Result of parsing with metadata
#[derive(Debug, Clone)]
pub struct ParseResult {
    /// Parsed table, headers as found in the source
    pub table: RawTable,
    /// Detected or used encoding
    pub encoding: String,
    /// Detected or used delimiter
    pub delimiter: char,
}

/// Detect the encoding of raw bytes.
///
/// Valid UTF-8 is taken as UTF-8; chardet only guesses for everything else,
/// since it mislabels short UTF-8 text with a few non-ASCII characters.
pub fn detect_encoding(bytes: &[u8]) -> String {
    if std::str::from_utf8(bytes).is_ok() {
        return "utf-8".to_string();
    }

    let result = chardet::detect(bytes);
    let charset = result.0;

    // Normalize charset names; the bytes are known not to be UTF-8 here
    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" | "" => "windows-1252".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        other => other.to_string(),
    }
}

/// Decode bytes to string using the specified encoding.
///
/// A leading byte-order mark is dropped.
pub fn decode_content(bytes: &[u8], encoding: &str) -> String {
    let decoded = match encoding.to_lowercase().as_str() {
        "iso-8859-1" | "latin-1" | "latin1" => encoding_rs::ISO_8859_15.decode(bytes).0.into_owned(),
        "windows-1252" | "cp1252" => encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned(),
        // UTF-8 and anything unknown: lossy UTF-8
        _ => String::from_utf8_lossy(bytes).into_owned(),
    };

    match decoded.strip_prefix('\u{feff}') {
        Some(rest) => rest.to_string(),
        None => decoded,
    }
}

/// Detect the delimiter by counting occurrences in the first line.
///
/// Falls back to a comma when the header has a single column.
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let separators = [',', ';', '\t', '|'];
    let mut best_sep = ',';
    let mut best_count = 0;

    for &sep in &separators {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

/// Parse CSV content with an explicit delimiter.
///
/// The first record is the header row. Quoted fields may contain the
/// delimiter or line breaks. Blank lines are skipped; ragged rows are padded
/// or truncated to the header width.
///
/// # Example
/// ```ignore
/// use showstats::parser::parse_table;
///
/// let table = parse_table("Program Name,Items Selected\nGiant Steps,12", ',').unwrap();
/// assert_eq!(table.row_count(), 1);
/// ```
pub fn parse_table(content: &str, delimiter: char) -> Result<RawTable, CsvError> {
    if content.trim().is_empty() {
        return Err(CsvError::new(1, "Empty CSV file"));
    }
    if !delimiter.is_ascii() {
        return Err(CsvError::new(0, format!("Unsupported delimiter '{}'", delimiter)));
    }

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter as u8)
        .has_headers(true)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.to_string())
        .collect();

    if headers.iter().all(|h| h.trim().is_empty()) {
        return Err(CsvError::new(1, "No headers found"));
    }

    let mut table = Table::new(headers);

    for record in reader.records() {
        let record = record?;
        if record.iter().all(|v| v.trim().is_empty()) {
            continue;
        }
        table.push_row(record.iter().map(Cell::text).collect());
    }

    Ok(table)
}

/// Parse CSV bytes with auto-detection of encoding and delimiter.
pub fn parse_bytes_auto(bytes: &[u8]) -> Result<ParseResult, CsvError> {
    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding);
    let delimiter = detect_delimiter(&content);
    let table = parse_table(&content, delimiter)?;

    Ok(ParseResult {
        table,
        encoding,
        delimiter,
    })
}

/// Parse CSV file with auto-detection of encoding and delimiter.
pub fn parse_file_auto<P: AsRef<Path>>(path: P) -> Result<ParseResult, CsvError> {
    let bytes = std::fs::read(path.as_ref())
        .map_err(|e| CsvError::new(0, format!("Cannot read file: {}", e)))?;

    parse_bytes_auto(&bytes)
}

/// Render a table as comma-separated CSV, header row first.
pub fn write_csv(table: &Table) -> Result<String, CsvError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(table.headers())?;
    for (i, row) in table.rows().iter().enumerate() {
        writer
            .write_record(row.iter().map(|c| c.as_text().into_owned()))
            .map_err(|e| CsvError::new(i + 2, e.to_string()))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| CsvError::new(0, e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| CsvError::new(0, format!("Encoding error: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_csv() {
        let csv = "name,age\nAlice,30\nBob,25";
        let table = parse_table(csv, ',').unwrap();

        assert_eq!(table.row_count(), 2);
        assert_eq!(table.get(0, "name"), Some(&Cell::from("Alice")));
        assert_eq!(table.get(0, "age"), Some(&Cell::from("30")));
        assert_eq!(table.get(1, "name"), Some(&Cell::from("Bob")));
    }

    #[test]
    fn test_quoted_delimiter_inside_value() {
        let csv = "Program Name,Title\n\"Roots Rock & Soul, Live\",\"Hello, World\"";
        let table = parse_table(csv, ',').unwrap();

        assert_eq!(table.get(0, "Program Name"), Some(&Cell::from("Roots Rock & Soul, Live")));
        assert_eq!(table.get(0, "Title"), Some(&Cell::from("Hello, World")));
    }

    #[test]
    fn test_empty_lines_skipped() {
        let csv = "a,b\n1,2\n\n3,4\n";
        let table = parse_table(csv, ',').unwrap();

        assert_eq!(table.row_count(), 2);
    }

    #[test]
    fn test_missing_values() {
        let csv = "a;b;c\n1;;3\n4";
        let table = parse_table(csv, ';').unwrap();

        assert_eq!(table.get(0, "b"), Some(&Cell::Empty));
        assert_eq!(table.get(0, "c"), Some(&Cell::from("3")));
        assert_eq!(table.get(1, "c"), Some(&Cell::Empty));
    }

    #[test]
    fn test_extra_columns_ignored() {
        let csv = "a;b\n1;2;3;4";
        let table = parse_table(csv, ';').unwrap();

        assert_eq!(table.headers().len(), 2);
        assert_eq!(table.rows()[0].len(), 2);
    }

    #[test]
    fn test_error_message_format() {
        let err = CsvError::new(5, "unequal lengths");
        assert_eq!(err.to_string(), "Line 5: unequal lengths");
    }

    #[test]
    fn test_short_utf8_not_mistaken_for_latin1() {
        for csv in [
            "Program Name,Items Selected\nHawai\u{2019}i Radio Connection,3\n",
            "Program Name,Title\nRoots Rock,F\u{fc}r Elise\n",
        ] {
            assert_eq!(detect_encoding(csv.as_bytes()), "utf-8");
            let result = parse_bytes_auto(csv.as_bytes()).unwrap();
            assert_eq!(result.encoding, "utf-8");
        }

        let result = parse_bytes_auto("Program Name,Title\nRoots Rock,F\u{fc}r Elise\n".as_bytes()).unwrap();
        assert_eq!(result.table.get(0, "Title"), Some(&Cell::from("F\u{fc}r Elise")));

        let result = parse_bytes_auto("Program Name\nHawai\u{2019}i Radio Connection\n".as_bytes()).unwrap();
        assert_eq!(
            result.table.get(0, "Program Name"),
            Some(&Cell::from("Hawai\u{2019}i Radio Connection"))
        );
    }

    #[test]
    fn test_invalid_utf8_falls_back_to_detection() {
        // "Société Radio" in ISO-8859-1 is not valid UTF-8
        let bytes: &[u8] = b"Program Name\nSoci\xe9t\xe9 Radio\n";
        let result = parse_bytes_auto(bytes).unwrap();
        assert_ne!(result.encoding, "utf-8");
        assert_eq!(result.table.row_count(), 1);
    }

    #[test]
    fn test_empty_csv_error() {
        let result = parse_table("", ',');
        assert!(result.is_err());
        assert!(result.unwrap_err().message.contains("Empty"));
    }

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(detect_delimiter("a;b;c\n1;2;3"), ';');
        assert_eq!(detect_delimiter("a,b,c\n1,2,3"), ',');
        assert_eq!(detect_delimiter("a\tb\tc\n1\t2\t3"), '\t');
        assert_eq!(detect_delimiter("a|b|c\n1|2|3"), '|');
        assert_eq!(detect_delimiter("single\nvalue"), ',');
    }

    #[test]
    fn test_auto_parse_strips_bom() {
        let csv = "\u{feff}Program Name,Items Selected\nGiant Steps,12";
        let result = parse_bytes_auto(csv.as_bytes()).unwrap();

        assert_eq!(result.delimiter, ',');
        assert_eq!(result.table.headers(), &["Program Name".to_string(), "Items Selected".to_string()]);
        assert_eq!(result.table.row_count(), 1);
    }

    #[test]
    fn test_latin1_decoding() {
        // "Société" in ISO-8859-1
        let bytes: &[u8] = &[0x53, 0x6F, 0x63, 0x69, 0xE9, 0x74, 0xE9];
        let decoded = decode_content(bytes, "iso-8859-1");
        assert_eq!(decoded, "Société");
    }

    #[test]
    fn test_write_csv_quotes_when_needed() {
        let table = Table::from_rows(
            vec!["program".into(), "items_selected".into()],
            vec![vec!["Night Train, Late".into(), Cell::Number(3.0)]],
        );
        let out = write_csv(&table).unwrap();
        assert_eq!(out, "program,items_selected\n\"Night Train, Late\",3\n");
    }
}

//! Table Loader and Multi-Year Stacker.
//!
//! ```text
//! ┌──────────┐    ┌─────────────┐    ┌────────┐    ┌──────────┐    ┌───────────┐
//! │ Registry │───▶│ TableSource │───▶│ Parser │───▶│  Schema  │───▶│   Cache   │
//! │ (year)   │    │ (bytes)     │    │ (CSV)  │    │ (canon.) │    │ (Arc, 5m) │
//! └──────────┘    └─────────────┘    └────────┘    └──────────┘    └───────────┘
//! ```
//!
//! Fetches are awaited inline: an expired entry is reloaded by the next
//! caller, never in the background. Concurrent callers on the same expired
//! year may each fetch.
//!
//! # Example
//!
//! ```rust,ignore
//! use showstats::{HttpSource, SourceRegistry, TableLoader};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let source = HttpSource::new(Duration::from_secs(30))?;
//!     let loader = TableLoader::new(SourceRegistry::builtin(), source);
//!     let stacked = loader.load_all_years().await?;
//!     println!("{} rows", stacked.row_count());
//!     Ok(())
//! }
//! ```

use std::convert::Infallible;
use std::future::Future;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use url::Url;

use crate::api::logs::{log_year, LogLevel};
use crate::cache::{Clock, SystemClock, TableCache};
use crate::error::{FetchError, FetchResult, LoadError, LoadResult};
use crate::models::{fields, CanonicalTable, Cell, StackedTable, Table};
use crate::parser::parse_bytes_auto;
use crate::registry::{SourceConfig, SourceRegistry};
use crate::transform::schema::{normalize_schema_report, SchemaReport};

/// Spreadsheet export host.
pub const SHEETS_BASE_URL: &str = "https://docs.google.com/spreadsheets/d/";

// =============================================================================
// Sources
// =============================================================================

/// Yields the raw bytes of one year's export, or fails.
pub trait TableSource: Send + Sync {
    fn fetch(&self, config: &SourceConfig) -> impl Future<Output = FetchResult<Vec<u8>>> + Send;
}

/// Fetches CSV exports over HTTP.
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSource {
    /// Client with a per-request timeout. No retries.
    pub fn new(timeout: Duration) -> FetchResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: SHEETS_BASE_URL.to_string(),
        })
    }

    /// Point at another export host (mirrors, test servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        self.base_url = base_url;
        self
    }

    /// CSV export URL for a source.
    ///
    /// An all-digit sub-selector is a sheet `gid`; anything else is a tab name.
    pub fn export_url(&self, config: &SourceConfig) -> FetchResult<Url> {
        let sheet = Url::parse(&self.base_url)?.join(&format!("{}/", config.source_id))?;
        let selector = config.sub_selector.trim();

        let url = if !selector.is_empty() && selector.chars().all(|c| c.is_ascii_digit()) {
            let mut url = sheet.join("export")?;
            url.query_pairs_mut()
                .append_pair("format", "csv")
                .append_pair("gid", selector);
            url
        } else {
            let mut url = sheet.join("gviz/tq")?;
            url.query_pairs_mut()
                .append_pair("tqx", "out:csv")
                .append_pair("sheet", selector);
            url
        };
        Ok(url)
    }
}

impl TableSource for HttpSource {
    async fn fetch(&self, config: &SourceConfig) -> FetchResult<Vec<u8>> {
        let url = self.export_url(config)?;
        let response = self.client.get(url.clone()).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        Ok(response.bytes().await?.to_vec())
    }
}

/// Reads `<dir>/<year>.csv` from disk.
#[derive(Debug, Clone)]
pub struct DirSource {
    root: PathBuf,
}

impl DirSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path_for(&self, config: &SourceConfig) -> PathBuf {
        self.root.join(format!("{}.csv", config.year_key))
    }
}

impl TableSource for DirSource {
    async fn fetch(&self, config: &SourceConfig) -> FetchResult<Vec<u8>> {
        Ok(tokio::fs::read(self.path_for(config)).await?)
    }
}

/// Source chosen at start-up.
#[derive(Debug, Clone)]
pub enum SourceBackend {
    Http(HttpSource),
    Dir(DirSource),
}

impl TableSource for SourceBackend {
    async fn fetch(&self, config: &SourceConfig) -> FetchResult<Vec<u8>> {
        match self {
            SourceBackend::Http(s) => s.fetch(config).await,
            SourceBackend::Dir(s) => s.fetch(config).await,
        }
    }
}

// =============================================================================
// Data Scope
// =============================================================================

/// One reporting year, or every year stacked.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DataScope {
    #[default]
    AllYears,
    Year(String),
}

impl From<&str> for DataScope {
    /// Blank, `all` and `all years` mean every year; anything else is a year key.
    fn from(s: &str) -> Self {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("all") || s.eq_ignore_ascii_case("all years") {
            DataScope::AllYears
        } else {
            DataScope::Year(s.to_string())
        }
    }
}

impl FromStr for DataScope {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(DataScope::from(s))
    }
}

impl std::fmt::Display for DataScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataScope::AllYears => f.write_str("all"),
            DataScope::Year(year) => f.write_str(year),
        }
    }
}

// =============================================================================
// Loader
// =============================================================================

/// Loads, normalizes and caches yearly tables.
pub struct TableLoader<S: TableSource, C: Clock = SystemClock> {
    registry: SourceRegistry,
    source: S,
    cache: TableCache<C>,
}

impl<S: TableSource> TableLoader<S, SystemClock> {
    /// Loader with the default 300 s cache window.
    pub fn new(registry: SourceRegistry, source: S) -> Self {
        Self::with_cache(registry, source, TableCache::new())
    }
}

impl<S: TableSource, C: Clock> TableLoader<S, C> {
    pub fn with_cache(registry: SourceRegistry, source: S, cache: TableCache<C>) -> Self {
        Self {
            registry,
            source,
            cache,
        }
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    /// Canonical table for one year, from cache when inside the window.
    ///
    /// # Errors
    /// - [`LoadError::Config`] for a year missing from the registry
    /// - [`LoadError::SourceFetch`] when the fetch fails or the bytes are not a table
    /// - [`LoadError::Schema`] when no program column can be resolved
    pub async fn load_year(&self, year_key: &str) -> LoadResult<Arc<CanonicalTable>> {
        let config = self.registry.get(year_key).ok_or_else(|| LoadError::Config {
            year: year_key.to_string(),
        })?;

        if let Some(table) = self.cache.get(year_key) {
            log_year(LogLevel::Info, year_key, format!("Cache hit ({} rows)", table.row_count()));
            return Ok(table);
        }

        log_year(LogLevel::Info, year_key, format!("Fetching source {}", config.source_id));
        let bytes = self.source.fetch(config).await.map_err(|e| {
            log_year(LogLevel::Error, year_key, e.to_string());
            LoadError::fetch(year_key, e)
        })?;

        let parsed = parse_bytes_auto(&bytes).map_err(|e| {
            log_year(LogLevel::Error, year_key, e.to_string());
            LoadError::parse(year_key, e)
        })?;
        log_year(
            LogLevel::Success,
            year_key,
            format!(
                "Read {} rows (encoding {}, delimiter '{}')",
                parsed.table.row_count(),
                parsed.encoding,
                format_delimiter(parsed.delimiter)
            ),
        );

        let report = normalize_schema_report(parsed.table, &config.program_column_hint);
        ensure_program_resolved(&report, config)?;
        log_mapping(year_key, &report);

        let table = Arc::new(report.table);
        self.cache.insert(year_key, Arc::clone(&table));
        Ok(table)
    }

    /// Every configured year, stacked in ascending year order.
    ///
    /// Fails as a whole if any year fails; an empty registry gives an empty
    /// table.
    pub async fn load_all_years(&self) -> LoadResult<StackedTable> {
        let mut parts = Vec::with_capacity(self.registry.len());
        for year in self.registry.years() {
            let table = self.load_year(year).await?;
            parts.push((year.to_string(), table));
        }
        Ok(stack_years(&parts))
    }

    /// Table for a data scope.
    pub async fn load_scope(&self, scope: &DataScope) -> LoadResult<Arc<Table>> {
        match scope {
            DataScope::AllYears => Ok(Arc::new(self.load_all_years().await?)),
            DataScope::Year(year) => self.load_year(year).await,
        }
    }

    /// Force the next load of `year_key` to re-fetch.
    pub fn invalidate(&self, year_key: &str) -> bool {
        self.cache.invalidate(year_key)
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }
}

fn ensure_program_resolved(report: &SchemaReport, config: &SourceConfig) -> LoadResult<()> {
    let all_blank = !report.table.is_empty()
        && report
            .table
            .column(fields::PROGRAM)
            .map_or(true, |mut cells| cells.all(Cell::is_empty));

    if !report.program_resolved() || all_blank {
        log_year(
            LogLevel::Error,
            &config.year_key,
            format!("No program column (hint '{}')", config.program_column_hint),
        );
        return Err(LoadError::Schema {
            year: config.year_key.clone(),
            hint: config.program_column_hint.clone(),
        });
    }
    Ok(())
}

fn log_mapping(year: &str, report: &SchemaReport) {
    if let Some(ref src) = report.program_source {
        log_year(LogLevel::Info, year, format!("{} → {}", src, fields::PROGRAM));
    }
    match report.on_demand_source {
        Some(ref src) => log_year(
            LogLevel::Info,
            year,
            format!("{} → {}", src, fields::ON_DEMAND_ITEMS_SELECTED),
        ),
        None => log_year(LogLevel::Warning, year, "No on-demand total column, using 0"),
    }
    if !report.passthrough.is_empty() {
        log_year(
            LogLevel::Info,
            year,
            format!("Passthrough columns: {}", report.passthrough.join(", ")),
        );
    }
}

fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "\\t".to_string(),
        c => c.to_string(),
    }
}

/// Concatenate canonical tables, tagging each row with its year.
///
/// Columns: canonical fields, then the union of passthrough columns in
/// first-seen order, then `year`. A passthrough column absent from a year is
/// empty on that year's rows. A source column already named `year` is dropped
/// in favour of the tag.
pub fn stack_years(parts: &[(String, Arc<CanonicalTable>)]) -> StackedTable {
    let mut headers: Vec<String> = fields::CANONICAL.iter().map(|f| f.to_string()).collect();
    for (_, table) in parts {
        for header in table.headers() {
            if header != fields::YEAR && !headers.contains(header) {
                headers.push(header.clone());
            }
        }
    }
    let width = headers.len();
    headers.push(fields::YEAR.to_string());

    let mut stacked = Table::new(headers);
    for (year, table) in parts {
        let sources: Vec<Option<usize>> = stacked.headers()[..width]
            .iter()
            .map(|h| table.column_index(h))
            .collect();
        for row in table.rows() {
            let mut out: Vec<Cell> = sources
                .iter()
                .map(|idx| idx.map(|i| row[i].clone()).unwrap_or_default())
                .collect();
            out.push(Cell::text(year.as_str()));
            stacked.push_row(out);
        }
    }
    stacked
}

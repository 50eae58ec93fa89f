//! Source Registry - which export backs which reporting year
//!
//! Static for the life of the process. Keys are calendar years as strings, so
//! lexical key order is chronological order.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::error::{RegistryError, RegistryResult};
use crate::validation::validate_source_registry;

/// Where one year's export lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Reporting year, e.g. `"2023"`
    pub year_key: String,
    /// Spreadsheet identifier
    pub source_id: String,
    /// Sheet tab: a numeric `gid` or a tab name
    pub sub_selector: String,
    /// Header expected to hold the program name
    pub program_column_hint: String,
}

/// On-disk shape of one entry; the year is the map key.
#[derive(Debug, Deserialize)]
struct SourceEntry {
    source_id: String,
    sub_selector: String,
    program_column_hint: String,
}

/// Year key -> source configuration, ordered by year.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceRegistry {
    sources: BTreeMap<String, SourceConfig>,
}

impl SourceRegistry {
    /// Registry with no years.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The station's reporting years as deployed.
    pub fn builtin() -> Self {
        Self::from_configs([
            SourceConfig {
                year_key: "2022".into(),
                source_id: "1wh65x9uwfQHDGax0xhR_Q2tZSdfyBlLMw3gMlTXIZl0".into(),
                sub_selector: "1807168814".into(),
                program_column_hint: "Section Name".into(),
            },
            SourceConfig {
                year_key: "2023".into(),
                source_id: "17_GLEJvCUgUiFIAltzSIGDpXULFTCPih9kca5SGywd4".into(),
                sub_selector: "581575423".into(),
                program_column_hint: "Program Name".into(),
            },
            SourceConfig {
                year_key: "2024".into(),
                source_id: "1_j2ElPU3AswjefXimiJQ3pIrG9loKNOVNi2SeXpb21o".into(),
                sub_selector: "169834391".into(),
                program_column_hint: "Program Name".into(),
            },
        ])
    }

    /// Build from configs. A later config for the same year replaces the
    /// earlier one.
    pub fn from_configs(configs: impl IntoIterator<Item = SourceConfig>) -> Self {
        let sources = configs
            .into_iter()
            .map(|c| (c.year_key.clone(), c))
            .collect();
        Self { sources }
    }

    /// Parse a registry document:
    ///
    /// ```json
    /// { "2023": { "source_id": "...", "sub_selector": "581575423", "program_column_hint": "Program Name" } }
    /// ```
    pub fn from_json_str(content: &str) -> RegistryResult<Self> {
        let value: Value = serde_json::from_str(content)?;
        validate_source_registry(&value).map_err(RegistryError::Invalid)?;

        let entries: BTreeMap<String, SourceEntry> = serde_json::from_value(value)?;
        Ok(Self::from_configs(entries.into_iter().map(|(year, e)| {
            SourceConfig {
                year_key: year,
                source_id: e.source_id,
                sub_selector: e.sub_selector,
                program_column_hint: e.program_column_hint,
            }
        })))
    }

    /// Load a registry document from disk.
    pub fn from_file(path: impl AsRef<Path>) -> RegistryResult<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&content)
    }

    pub fn get(&self, year_key: &str) -> Option<&SourceConfig> {
        self.sources.get(year_key)
    }

    /// Year keys, ascending.
    pub fn years(&self) -> impl Iterator<Item = &str> {
        self.sources.keys().map(String::as_str)
    }

    /// Configs, ascending by year.
    pub fn iter(&self) -> impl Iterator<Item = &SourceConfig> {
        self.sources.values()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

//! Runtime settings from the environment.
//!
//! `.env` is loaded by the binary before [`Settings::from_env`] runs. CLI
//! flags override whatever is read here.
//!
//! | Variable                      | Default          |
//! |-------------------------------|------------------|
//! | `SHOWSTATS_REGISTRY`          | built-in years   |
//! | `SHOWSTATS_DATA_DIR`          | remote exports   |
//! | `SHOWSTATS_CACHE_TTL_SECS`    | 300              |
//! | `SHOWSTATS_HTTP_TIMEOUT_SECS` | 30               |
//! | `SHOWSTATS_PORT`              | 3000             |

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::cache::{TableCache, DEFAULT_TTL_SECS};
use crate::error::{SettingsError, SettingsResult};
use crate::loader::{DirSource, HttpSource, SourceBackend, TableLoader};
use crate::registry::SourceRegistry;

pub const ENV_REGISTRY: &str = "SHOWSTATS_REGISTRY";
pub const ENV_DATA_DIR: &str = "SHOWSTATS_DATA_DIR";
pub const ENV_CACHE_TTL_SECS: &str = "SHOWSTATS_CACHE_TTL_SECS";
pub const ENV_HTTP_TIMEOUT_SECS: &str = "SHOWSTATS_HTTP_TIMEOUT_SECS";
pub const ENV_PORT: &str = "SHOWSTATS_PORT";

pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_PORT: u16 = 3000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Registry JSON file; `None` uses [`SourceRegistry::builtin`].
    pub registry_path: Option<PathBuf>,
    /// Read `<dir>/<year>.csv` instead of fetching over HTTP.
    pub data_dir: Option<PathBuf>,
    pub cache_ttl_secs: i64,
    pub http_timeout_secs: u64,
    pub port: u16,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            registry_path: None,
            data_dir: None,
            cache_ttl_secs: DEFAULT_TTL_SECS,
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            port: DEFAULT_PORT,
        }
    }
}

impl Settings {
    /// Read settings from the process environment.
    pub fn from_env() -> SettingsResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through an arbitrary lookup. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> SettingsResult<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let settings = Self {
            registry_path: get(ENV_REGISTRY).map(PathBuf::from),
            data_dir: get(ENV_DATA_DIR).map(PathBuf::from),
            cache_ttl_secs: parse_or(ENV_CACHE_TTL_SECS, get(ENV_CACHE_TTL_SECS), defaults.cache_ttl_secs)?,
            http_timeout_secs: parse_or(
                ENV_HTTP_TIMEOUT_SECS,
                get(ENV_HTTP_TIMEOUT_SECS),
                defaults.http_timeout_secs,
            )?,
            port: parse_or(ENV_PORT, get(ENV_PORT), defaults.port)?,
        };
        settings.cache_ttl()?;
        Ok(settings)
    }

    /// Cache TTL as a duration. Must be positive and representable.
    pub fn cache_ttl(&self) -> SettingsResult<chrono::Duration> {
        chrono::Duration::try_seconds(self.cache_ttl_secs)
            .filter(|ttl| *ttl > chrono::Duration::zero())
            .ok_or_else(|| SettingsError::Invalid {
                key: ENV_CACHE_TTL_SECS.to_string(),
                value: self.cache_ttl_secs.to_string(),
            })
    }

    /// Registry from file, or the built-in one.
    pub fn registry(&self) -> SettingsResult<SourceRegistry> {
        match self.registry_path {
            Some(ref path) => Ok(SourceRegistry::from_file(path)?),
            None => Ok(SourceRegistry::builtin()),
        }
    }

    /// Local directory source if configured, HTTP otherwise.
    pub fn source(&self) -> SettingsResult<SourceBackend> {
        match self.data_dir {
            Some(ref dir) => Ok(SourceBackend::Dir(DirSource::new(dir))),
            None => {
                let timeout = Duration::from_secs(self.http_timeout_secs);
                Ok(SourceBackend::Http(HttpSource::new(timeout)?))
            }
        }
    }

    /// Loader wired from these settings.
    pub fn loader(&self) -> SettingsResult<TableLoader<SourceBackend>> {
        let cache = TableCache::with_ttl(self.cache_ttl()?);
        Ok(TableLoader::with_cache(self.registry()?, self.source()?, cache))
    }
}

fn parse_or<T: FromStr>(key: &str, value: Option<String>, default: T) -> SettingsResult<T> {
    match value {
        None => Ok(default),
        Some(v) => v.parse().map_err(|_| SettingsError::Invalid {
            key: key.to_string(),
            value: v,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::from_lookup(lookup(&[])).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.cache_ttl_secs, 300);
        assert_eq!(settings.http_timeout_secs, 30);
    }

    #[test]
    fn test_overrides() {
        let settings = Settings::from_lookup(lookup(&[
            (ENV_DATA_DIR, "/srv/exports"),
            (ENV_CACHE_TTL_SECS, "60"),
            (ENV_PORT, " 8080 "),
            (ENV_REGISTRY, ""),
        ]))
        .unwrap();
        assert_eq!(settings.data_dir, Some(PathBuf::from("/srv/exports")));
        assert_eq!(settings.cache_ttl_secs, 60);
        assert_eq!(settings.port, 8080);
        assert_eq!(settings.registry_path, None);
    }

    #[test]
    fn test_invalid_number() {
        let err = Settings::from_lookup(lookup(&[(ENV_PORT, "eighty")])).unwrap_err();
        assert!(matches!(err, SettingsError::Invalid { ref key, .. } if key == ENV_PORT));
    }

    #[test]
    fn test_cache_ttl_must_be_positive_and_in_range() {
        for value in ["0", "-5", "9223372036854775807"] {
            let err = Settings::from_lookup(lookup(&[(ENV_CACHE_TTL_SECS, value)])).unwrap_err();
            let SettingsError::Invalid { key, value: rejected } = err else {
                panic!("{value}: expected an invalid-value error");
            };
            assert_eq!(key, ENV_CACHE_TTL_SECS);
            assert_eq!(rejected, value);
        }

        let settings = Settings {
            cache_ttl_secs: i64::MIN,
            ..Settings::default()
        };
        assert!(settings.loader().is_err());
        assert_eq!(Settings::default().cache_ttl().unwrap(), chrono::Duration::seconds(300));
    }

    #[test]
    fn test_loader_from_registry_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.json");
        std::fs::write(
            &path,
            r#"{ "2023": { "source_id": "a", "sub_selector": "1", "program_column_hint": "Program Name" } }"#,
        )
        .unwrap();

        let settings = Settings {
            registry_path: Some(path),
            data_dir: Some(dir.path().to_path_buf()),
            ..Settings::default()
        };
        let loader = settings.loader().unwrap();
        assert_eq!(loader.registry().years().collect::<Vec<_>>(), vec!["2023"]);
        assert!(matches!(settings.source().unwrap(), SourceBackend::Dir(_)));
    }
}

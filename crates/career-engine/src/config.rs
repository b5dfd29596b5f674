use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use career_common::catalog_api::CatalogApiConfig;

use crate::cache::CacheSettings;
use crate::error::AppError;
use crate::service::DEFAULT_POOL_LIMIT;
use crate::tuning::Tuning;

const DEFAULT_DATA_DIR: &str = ".career-data";

/// Where the cache table and catalog snapshot are persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    /// One JSON file per namespace under this directory.
    File(PathBuf),
    /// Redis at this URL.
    Redis(String),
    /// Process memory only; nothing survives a restart.
    Memory,
}

/// Application configuration loaded explicitly from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// `None` disables the remote catalog source.
    pub catalog_api: Option<CatalogApiConfig>,
    pub storage: StorageBackend,
    pub cache: CacheSettings,
    /// Number of records resolved as the candidate pool.
    pub pool_limit: u32,
    pub tuning_path: Option<PathBuf>,
    /// Warm the cache at startup.
    pub preload: bool,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Optional:
    /// - `CATALOG_API_URL`: catalog service base URL (omit to serve local data only),
    ///   with `CATALOG_API_TIMEOUT_SECS` and `CATALOG_API_MAX_ERROR_BODY_BYTES`
    /// - `REDIS_URL`: persist to Redis
    /// - `CAREER_STORAGE=memory`: persist nothing
    /// - `CAREER_DATA_DIR`: directory for file persistence (default `.career-data`)
    /// - `CACHE_TTL_MINUTES` (default 30), `CACHE_MAX_ENTRIES` (default 50, at least 1)
    /// - `CATALOG_POOL_LIMIT` (default 200)
    /// - `CAREER_TUNING_PATH`: JSON file overriding scoring and matching constants
    /// - `CACHE_PRELOAD` (default true)
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_vars(CatalogApiConfig::from_env(), |name| std::env::var(name).ok())
    }

    fn from_vars(
        catalog_api: Option<CatalogApiConfig>,
        var: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, AppError> {
        let var = |name: &str| var(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let storage = if var("CAREER_STORAGE").is_some_and(|v| v.eq_ignore_ascii_case("memory")) {
            StorageBackend::Memory
        } else if let Some(url) = var("REDIS_URL") {
            StorageBackend::Redis(url)
        } else {
            StorageBackend::File(PathBuf::from(
                var("CAREER_DATA_DIR").unwrap_or_else(|| DEFAULT_DATA_DIR.to_string()),
            ))
        };

        let ttl_minutes: u64 = parse_or(var("CACHE_TTL_MINUTES"), "CACHE_TTL_MINUTES", 30)?;
        if ttl_minutes == 0 {
            return Err(AppError::Config("CACHE_TTL_MINUTES must be at least 1".to_string()));
        }
        let max_entries: usize = parse_or(var("CACHE_MAX_ENTRIES"), "CACHE_MAX_ENTRIES", 50)?;
        if max_entries == 0 {
            return Err(AppError::Config("CACHE_MAX_ENTRIES must be at least 1".to_string()));
        }
        let pool_limit: u32 = parse_or(var("CATALOG_POOL_LIMIT"), "CATALOG_POOL_LIMIT", DEFAULT_POOL_LIMIT)?;
        if pool_limit == 0 {
            return Err(AppError::Config("CATALOG_POOL_LIMIT must be at least 1".to_string()));
        }

        let preload = match var("CACHE_PRELOAD") {
            None => true,
            Some(v) => parse_bool(&v)
                .ok_or_else(|| AppError::Config(format!("CACHE_PRELOAD must be true or false, got '{v}'")))?,
        };

        Ok(Self {
            catalog_api,
            storage,
            cache: CacheSettings {
                ttl: Duration::from_secs(ttl_minutes * 60),
                max_entries,
            },
            pool_limit,
            tuning_path: var("CAREER_TUNING_PATH").map(PathBuf::from),
            preload,
        })
    }

    /// The tuning overrides file if configured, otherwise the defaults.
    pub fn load_tuning(&self) -> Result<Tuning, AppError> {
        match &self.tuning_path {
            Some(path) => Tuning::from_file(path),
            None => Ok(Tuning::default()),
        }
    }
}

fn parse_or<T>(raw: Option<String>, name: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: Display,
{
    match raw {
        None => Ok(default),
        Some(v) => v
            .parse()
            .map_err(|e| AppError::Config(format!("{name} is invalid ('{v}'): {e}"))),
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<Config, AppError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_vars(None, |name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = config(&[]).unwrap();
        assert!(config.catalog_api.is_none());
        assert_eq!(config.storage, StorageBackend::File(PathBuf::from(".career-data")));
        assert_eq!(config.cache, CacheSettings::default());
        assert_eq!(config.pool_limit, 200);
        assert!(config.preload);
        assert!(config.tuning_path.is_none());
        assert_eq!(config.load_tuning().unwrap(), Tuning::default());
    }

    #[test]
    fn storage_backend_selection() {
        let redis = config(&[("REDIS_URL", "redis://127.0.0.1:6379")]).unwrap();
        assert_eq!(redis.storage, StorageBackend::Redis("redis://127.0.0.1:6379".to_string()));

        let memory = config(&[("REDIS_URL", "redis://x"), ("CAREER_STORAGE", "Memory")]).unwrap();
        assert_eq!(memory.storage, StorageBackend::Memory);

        let dir = config(&[("CAREER_DATA_DIR", "/var/lib/career"), ("REDIS_URL", " ")]).unwrap();
        assert_eq!(dir.storage, StorageBackend::File(PathBuf::from("/var/lib/career")));
    }

    #[test]
    fn cache_settings_are_validated() {
        let config_ok = config(&[("CACHE_TTL_MINUTES", "5"), ("CACHE_MAX_ENTRIES", "10")]).unwrap();
        assert_eq!(config_ok.cache.ttl, Duration::from_secs(300));
        assert_eq!(config_ok.cache.max_entries, 10);

        assert!(matches!(config(&[("CACHE_MAX_ENTRIES", "0")]), Err(AppError::Config(_))));
        assert!(matches!(config(&[("CACHE_TTL_MINUTES", "soon")]), Err(AppError::Config(_))));
        assert!(matches!(config(&[("CATALOG_POOL_LIMIT", "-1")]), Err(AppError::Config(_))));
    }

    #[test]
    fn preload_flag_parses_common_spellings() {
        assert!(!config(&[("CACHE_PRELOAD", "false")]).unwrap().preload);
        assert!(!config(&[("CACHE_PRELOAD", "0")]).unwrap().preload);
        assert!(config(&[("CACHE_PRELOAD", "YES")]).unwrap().preload);
        assert!(config(&[("CACHE_PRELOAD", "maybe")]).is_err());
    }

    #[test]
    fn missing_tuning_file_is_a_config_error() {
        let config = config(&[("CAREER_TUNING_PATH", "/nonexistent/tuning.json")]).unwrap();
        assert!(matches!(config.load_tuning(), Err(AppError::Config(_))));
    }
}

//! Bootstrap configuration loading
//!
//! Settings are resolved in priority order:
//! 1. Command-line arguments (highest priority)
//! 2. Environment variables
//! 3. TOML config file
//! 4. Compiled defaults (fallback)
//!
//! A missing default config file is not an error; the service starts on
//! defaults plus environment. An explicitly requested file must exist.
//! Loading runs before the tracing subscriber exists, so nothing here logs;
//! callers report `ServiceConfig::config_file` once logging is up.

use crate::{Error, Result};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_BIND: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 5810;
pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

pub const ENV_CONFIG: &str = "SIMS_CONFIG";
pub const ENV_BIND: &str = "SIMS_BIND";
pub const ENV_PORT: &str = "SIMS_PORT";
pub const ENV_LOG_LEVEL: &str = "SIMS_LOG_LEVEL";
pub const ENV_DATABASE_URL: &str = "SIMS_DATABASE_URL";
pub const ENV_SUPABASE_URL: &str = "SUPABASE_URL";
pub const ENV_SERVICE_ROLE_KEY: &str = "SUPABASE_SERVICE_ROLE_KEY";

/// Bootstrap configuration file contents
///
/// Every field is optional so a partial file merges cleanly with
/// environment and defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub bind: Option<String>,
    pub port: Option<u16>,
    pub http_timeout_secs: Option<u64>,
    pub logging: LoggingConfig,
    pub supabase: SupabaseSection,
    pub store: StoreSection,
}

/// Logging configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SupabaseSection {
    pub url: Option<String>,
    pub service_role_key: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    pub backend: Option<StoreBackend>,
    pub database_url: Option<String>,
}

/// How the relational store is reached
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// PostgREST endpoint of the hosted backend
    #[default]
    Rest,
    /// Direct Postgres connection
    Postgres,
}

/// Values supplied on the command line
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub config_path: Option<PathBuf>,
    pub bind: Option<String>,
    pub port: Option<u16>,
    pub log_level: Option<String>,
}

/// Fully resolved service configuration
#[derive(Clone)]
pub struct ServiceConfig {
    pub bind: String,
    pub port: u16,
    pub log_level: String,
    pub http_timeout: Duration,
    pub supabase_url: String,
    pub service_role_key: String,
    pub store_backend: StoreBackend,
    pub database_url: Option<String>,
    /// Config file the values were read from, if any
    pub config_file: Option<PathBuf>,
}

impl fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("bind", &self.bind)
            .field("port", &self.port)
            .field("log_level", &self.log_level)
            .field("http_timeout", &self.http_timeout)
            .field("supabase_url", &self.supabase_url)
            .field("service_role_key", &"<redacted>")
            .field("store_backend", &self.store_backend)
            .field("database_url", &self.database_url.as_ref().map(|_| "<redacted>"))
            .field("config_file", &self.config_file)
            .finish()
    }
}

impl ServiceConfig {
    /// Resolve configuration from CLI overrides, process environment,
    /// config file and defaults
    pub fn resolve(overrides: &ConfigOverrides) -> Result<Self> {
        let (toml_config, config_file) = load_toml_config(overrides.config_path.as_deref())?;
        let mut config = Self::merge(overrides, &toml_config, |key| std::env::var(key).ok())?;
        config.config_file = config_file;
        Ok(config)
    }

    /// Merge the configuration layers
    ///
    /// `env` is consulted for environment values; empty values count as unset.
    pub fn merge<F>(overrides: &ConfigOverrides, file: &TomlConfig, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let bind = overrides
            .bind
            .clone()
            .or_else(|| env(ENV_BIND))
            .or_else(|| file.bind.clone())
            .unwrap_or_else(|| DEFAULT_BIND.to_string());

        let env_port = match env(ENV_PORT) {
            Some(raw) => Some(raw.parse::<u16>().map_err(|e| {
                Error::Config(format!("{} must be a port number: {}", ENV_PORT, e))
            })?),
            None => None,
        };
        let port = overrides
            .port
            .or(env_port)
            .or(file.port)
            .unwrap_or(DEFAULT_PORT);

        let log_level = overrides
            .log_level
            .clone()
            .or_else(|| env(ENV_LOG_LEVEL))
            .or_else(|| file.logging.level.clone())
            .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string());

        let supabase_url = env(ENV_SUPABASE_URL)
            .or_else(|| file.supabase.url.clone())
            .ok_or_else(|| {
                Error::Config(format!(
                    "{} is not set and no supabase.url in config file",
                    ENV_SUPABASE_URL
                ))
            })?;

        let service_role_key = env(ENV_SERVICE_ROLE_KEY)
            .or_else(|| file.supabase.service_role_key.clone())
            .ok_or_else(|| {
                Error::Config(format!(
                    "{} is not set and no supabase.service_role_key in config file",
                    ENV_SERVICE_ROLE_KEY
                ))
            })?;

        let store_backend = file.store.backend.unwrap_or_default();
        let database_url = env(ENV_DATABASE_URL).or_else(|| file.store.database_url.clone());
        if store_backend == StoreBackend::Postgres && database_url.is_none() {
            return Err(Error::Config(format!(
                "store.backend = \"postgres\" requires {} or store.database_url",
                ENV_DATABASE_URL
            )));
        }

        let http_timeout =
            Duration::from_secs(file.http_timeout_secs.unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS));

        Ok(Self {
            bind,
            port,
            log_level,
            http_timeout,
            supabase_url: supabase_url.trim_end_matches('/').to_string(),
            service_role_key,
            store_backend,
            database_url,
            config_file: None,
        })
    }

    /// Socket address string for the HTTP listener
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

/// Load the TOML config file
///
/// An explicit path (argument or `SIMS_CONFIG`) must exist. The platform
/// default path is optional. Returns the parsed file and the path it was
/// read from, if any.
pub fn load_toml_config(explicit: Option<&Path>) -> Result<(TomlConfig, Option<PathBuf>)> {
    let explicit = explicit
        .map(Path::to_path_buf)
        .or_else(|| std::env::var(ENV_CONFIG).ok().map(PathBuf::from));

    if let Some(path) = explicit {
        let content = std::fs::read_to_string(&path).map_err(|e| {
            Error::Config(format!("Cannot read config file {}: {}", path.display(), e))
        })?;
        return Ok((parse_toml_config(&content)?, Some(path)));
    }

    match default_config_path() {
        Some(path) if path.exists() => {
            let content = std::fs::read_to_string(&path)?;
            Ok((parse_toml_config(&content)?, Some(path)))
        }
        _ => Ok((TomlConfig::default(), None)),
    }
}

pub fn parse_toml_config(content: &str) -> Result<TomlConfig> {
    Ok(toml::from_str(content)?)
}

/// Platform config file location (`<config_dir>/sims/config.toml`)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("sims").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn supabase_env() -> Vec<(&'static str, &'static str)> {
        vec![
            (ENV_SUPABASE_URL, "https://school.supabase.co/"),
            (ENV_SERVICE_ROLE_KEY, "service-key"),
        ]
    }

    #[test]
    fn test_defaults_apply_when_nothing_set() {
        let config = ServiceConfig::merge(
            &ConfigOverrides::default(),
            &TomlConfig::default(),
            env_of(&supabase_env()),
        )
        .unwrap();

        assert_eq!(config.bind, DEFAULT_BIND);
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.store_backend, StoreBackend::Rest);
        assert_eq!(config.http_timeout, Duration::from_secs(30));
        assert_eq!(config.supabase_url, "https://school.supabase.co");
    }

    #[test]
    fn test_cli_beats_env_beats_file() {
        let file =
            parse_toml_config("port = 7000\nbind = \"10.0.0.1\"\n[logging]\nlevel = \"warn\"")
                .unwrap();
        let mut env = supabase_env();
        env.push((ENV_PORT, "7100"));

        let from_env =
            ServiceConfig::merge(&ConfigOverrides::default(), &file, env_of(&env)).unwrap();
        assert_eq!(from_env.port, 7100);
        assert_eq!(from_env.bind, "10.0.0.1");
        assert_eq!(from_env.log_level, "warn");

        let overrides = ConfigOverrides {
            port: Some(7200),
            log_level: Some("debug".to_string()),
            ..Default::default()
        };
        let from_cli = ServiceConfig::merge(&overrides, &file, env_of(&env)).unwrap();
        assert_eq!(from_cli.port, 7200);
        assert_eq!(from_cli.log_level, "debug");
    }

    #[test]
    fn test_missing_service_key_is_fatal() {
        let err = ServiceConfig::merge(
            &ConfigOverrides::default(),
            &TomlConfig::default(),
            env_of(&[(ENV_SUPABASE_URL, "https://x.supabase.co")]),
        )
        .unwrap_err();
        assert!(err.to_string().contains(ENV_SERVICE_ROLE_KEY));
    }

    #[test]
    fn test_postgres_backend_requires_database_url() {
        let file = parse_toml_config("[store]\nbackend = \"postgres\"").unwrap();
        let err = ServiceConfig::merge(&ConfigOverrides::default(), &file, env_of(&supabase_env()))
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let mut env = supabase_env();
        env.push((ENV_DATABASE_URL, "postgres://localhost/school"));
        let config =
            ServiceConfig::merge(&ConfigOverrides::default(), &file, env_of(&env)).unwrap();
        assert_eq!(config.store_backend, StoreBackend::Postgres);
    }

    #[test]
    fn test_invalid_env_port_is_rejected() {
        let mut env = supabase_env();
        env.push((ENV_PORT, "eighty"));
        let result = ServiceConfig::merge(
            &ConfigOverrides::default(),
            &TomlConfig::default(),
            env_of(&env),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = ServiceConfig::merge(
            &ConfigOverrides::default(),
            &TomlConfig::default(),
            env_of(&supabase_env()),
        )
        .unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("service-key"));
        assert!(debug.contains("<redacted>"));
    }
}

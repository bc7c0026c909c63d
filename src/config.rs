//! Application context: every setting the client needs, read once at startup
//! and passed explicitly instead of looked up ad hoc.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;

use crate::api::{ApiError, CatalogCache, GraphqlClient, SharedApi};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl FromStr for Theme {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            _ => Err(ConfigError::Invalid {
                key: "ARENASLOT_THEME",
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Invalid { key: &'static str, value: String },
    Api(ApiError),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Invalid { key, value } => write!(f, "invalid value for {key}: {value:?}"),
            ConfigError::Api(e) => write!(f, "cannot build API client: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ApiError> for ConfigError {
    fn from(e: ApiError) -> Self {
        ConfigError::Api(e)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub api_url: String,
    pub auth_token: Option<String>,
    pub theme: Theme,
    pub request_timeout: Duration,
    pub metrics_port: Option<u16>,
    /// Initial selection for the headless driver.
    pub facility: Option<String>,
    pub date: Option<NaiveDate>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (environment, tests).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_url = lookup("ARENASLOT_API_URL").unwrap_or_else(|| "http://127.0.0.1:4000/graphql".into());
        let auth_token = lookup("ARENASLOT_TOKEN").filter(|t| !t.is_empty());
        let theme = match lookup("ARENASLOT_THEME") {
            Some(s) => s.parse()?,
            None => Theme::default(),
        };
        let timeout_ms: u64 = parse_opt(&lookup, "ARENASLOT_TIMEOUT_MS")?.unwrap_or(10_000);
        let metrics_port: Option<u16> = parse_opt(&lookup, "ARENASLOT_METRICS_PORT")?;
        let facility = lookup("ARENASLOT_FACILITY").filter(|f| !f.is_empty());
        let date: Option<NaiveDate> = parse_opt(&lookup, "ARENASLOT_DATE")?;

        Ok(Self {
            api_url,
            auth_token,
            theme,
            request_timeout: Duration::from_millis(timeout_ms),
            metrics_port,
            facility,
            date,
        })
    }
}

fn parse_opt<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &'static str) -> Result<Option<T>, ConfigError> {
    match lookup(key) {
        None => Ok(None),
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { key, value }),
    }
}

/// Shared services built from an [`AppConfig`].
pub struct AppContext {
    config: AppConfig,
    api: SharedApi,
    catalog: Arc<CatalogCache>,
}

impl AppContext {
    pub fn new(config: AppConfig) -> Result<Self, ConfigError> {
        let client = GraphqlClient::new(
            config.api_url.clone(),
            config.auth_token.clone(),
            config.request_timeout,
        )?;
        Ok(Self::with_api(config, Arc::new(client)))
    }

    /// Context over an already-built API (alternate backends, tests).
    pub fn with_api(config: AppConfig, api: SharedApi) -> Self {
        let catalog = Arc::new(CatalogCache::new(api.clone()));
        Self { config, api, catalog }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn api(&self) -> SharedApi {
        self.api.clone()
    }

    pub fn catalog(&self) -> Arc<CatalogCache> {
        self.catalog.clone()
    }

    pub fn theme(&self) -> Theme {
        self.config.theme
    }

    pub fn is_authenticated(&self) -> bool {
        self.config.auth_token.is_some()
    }
}

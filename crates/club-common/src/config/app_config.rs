//! Application configuration structs
//!
//! Loads configuration from environment variables (and a `.env` file when present).

use serde::Deserialize;
use std::env;
use std::str::FromStr;

/// Placeholder substituted into [`GatewayConfig::url_template`]
pub const CHANNEL_ID_PLACEHOLDER: &str = "{channel_id}";

/// Client-side application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub app: AppSettings,
    pub api: ApiConfig,
    pub gateway: GatewayConfig,
    pub messaging: MessagingConfig,
}

/// General application settings
#[derive(Debug, Clone, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_app_name")]
    pub name: String,
    #[serde(default = "default_env")]
    pub env: Environment,
}

/// Environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    #[must_use]
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }

    fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "production" => Some(Self::Production),
            "staging" => Some(Self::Staging),
            "development" => Some(Self::Development),
            _ => None,
        }
    }
}

/// Listen address of the consensus server
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Load the consensus server address; `CONSENSUS_PORT` is required
    ///
    /// # Errors
    /// Returns an error if `CONSENSUS_PORT` is missing or not a port number
    pub fn consensus_from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::consensus_from_lookup(|key| env::var(key).ok())
    }

    fn consensus_from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            host: lookup("CONSENSUS_HOST").unwrap_or_else(default_host),
            port: required(&lookup, "CONSENSUS_PORT")?,
        })
    }
}

/// REST endpoints (history, read flag, delete requests)
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_base_url")]
    pub base_url: String,
}

/// Live channel stream
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// WebSocket URL with a `{channel_id}` placeholder
    #[serde(default = "default_gateway_url")]
    pub url_template: String,
    /// Capacity of the per-connection outbound queue
    #[serde(default = "default_outbound_buffer")]
    pub outbound_buffer: usize,
}

impl GatewayConfig {
    /// Concrete URL for one channel
    #[must_use]
    pub fn channel_url(&self, channel_id: impl std::fmt::Display) -> String {
        self.url_template
            .replace(CHANNEL_ID_PLACEHOLDER, &channel_id.to_string())
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            url_template: default_gateway_url(),
            outbound_buffer: default_outbound_buffer(),
        }
    }
}

/// Timeline behaviour
#[derive(Debug, Clone, Deserialize)]
pub struct MessagingConfig {
    /// Page size for history fetches
    #[serde(default = "default_fetch_limit")]
    pub fetch_limit: usize,
    /// Gap (strictly greater than) that puts a timestamp separator between messages
    #[serde(default = "default_separator_minutes")]
    pub separator_minutes: i64,
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            fetch_limit: default_fetch_limit(),
            separator_minutes: default_separator_minutes(),
        }
    }
}

// Default value functions
fn default_app_name() -> String {
    "club-messaging".to_string()
}

fn default_env() -> Environment {
    Environment::Development
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_api_base_url() -> String {
    "http://127.0.0.1:8090".to_string()
}

fn default_gateway_url() -> String {
    "ws://127.0.0.1:8091/ws/channel/{channel_id}".to_string()
}

fn default_outbound_buffer() -> usize {
    64
}

fn default_fetch_limit() -> usize {
    20
}

fn default_separator_minutes() -> i64 {
    15
}

/// Parse an optional variable, failing on a present but unparseable value
fn optional<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError> {
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue(key, raw))
        })
        .transpose()
}

fn required<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<T, ConfigError> {
    optional(lookup, key)?.ok_or(ConfigError::MissingVar(key))
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if a variable is present but invalid
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = match lookup("APP_ENV") {
            Some(raw) => {
                Environment::parse(&raw).ok_or(ConfigError::InvalidValue("APP_ENV", raw))?
            }
            None => default_env(),
        };

        let url_template = lookup("GATEWAY_URL").unwrap_or_else(default_gateway_url);
        if !url_template.contains(CHANNEL_ID_PLACEHOLDER) {
            return Err(ConfigError::InvalidValue("GATEWAY_URL", url_template));
        }

        let fetch_limit = optional(&lookup, "MESSAGE_FETCH_LIMIT")?.unwrap_or_else(default_fetch_limit);
        if fetch_limit == 0 {
            return Err(ConfigError::InvalidValue(
                "MESSAGE_FETCH_LIMIT",
                fetch_limit.to_string(),
            ));
        }

        let outbound_buffer =
            optional(&lookup, "OUTBOUND_BUFFER")?.unwrap_or_else(default_outbound_buffer);
        if outbound_buffer == 0 {
            return Err(ConfigError::InvalidValue(
                "OUTBOUND_BUFFER",
                outbound_buffer.to_string(),
            ));
        }

        Ok(Self {
            app: AppSettings {
                name: lookup("APP_NAME").unwrap_or_else(default_app_name),
                env,
            },
            api: ApiConfig {
                base_url: lookup("API_BASE_URL")
                    .map(|url| url.trim_end_matches('/').to_string())
                    .unwrap_or_else(default_api_base_url),
            },
            gateway: GatewayConfig {
                url_template,
                outbound_buffer,
            },
            messaging: MessagingConfig {
                fetch_limit,
                separator_minutes: optional(&lookup, "TIMESTAMP_SEPARATOR_MINUTES")?
                    .unwrap_or_else(default_separator_minutes),
            },
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_environment_is_production() {
        assert!(!Environment::Development.is_production());
        assert!(!Environment::Staging.is_production());
        assert!(Environment::Production.is_production());
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.app.name, "club-messaging");
        assert!(config.app.env.is_development());
        assert_eq!(config.messaging.fetch_limit, 20);
        assert_eq!(config.messaging.separator_minutes, 15);
        assert_eq!(config.gateway.outbound_buffer, 64);
    }

    #[test]
    fn test_overrides() {
        let config = AppConfig::from_lookup(lookup(&[
            ("APP_ENV", "Production"),
            ("API_BASE_URL", "https://club.example/api/"),
            ("GATEWAY_URL", "wss://club.example/chat/{channel_id}"),
            ("MESSAGE_FETCH_LIMIT", "50"),
        ]))
        .unwrap();
        assert!(config.app.env.is_production());
        assert_eq!(config.api.base_url, "https://club.example/api");
        assert_eq!(config.messaging.fetch_limit, 50);
        assert_eq!(
            config.gateway.channel_url(42),
            "wss://club.example/chat/42"
        );
    }

    #[test]
    fn test_invalid_values() {
        let err = AppConfig::from_lookup(lookup(&[("MESSAGE_FETCH_LIMIT", "lots")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue("MESSAGE_FETCH_LIMIT", _)));

        let err = AppConfig::from_lookup(lookup(&[("MESSAGE_FETCH_LIMIT", "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue("MESSAGE_FETCH_LIMIT", _)));

        let err = AppConfig::from_lookup(lookup(&[("GATEWAY_URL", "ws://x/chat")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue("GATEWAY_URL", _)));

        let err = AppConfig::from_lookup(lookup(&[("APP_ENV", "qa")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue("APP_ENV", _)));
    }

    #[test]
    fn test_consensus_port_required() {
        let err = ServerConfig::consensus_from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar("CONSENSUS_PORT")));

        let config = ServerConfig::consensus_from_lookup(lookup(&[
            ("CONSENSUS_HOST", "0.0.0.0"),
            ("CONSENSUS_PORT", "8090"),
        ]))
        .unwrap();
        assert_eq!(config.address(), "0.0.0.0:8090");
    }
}

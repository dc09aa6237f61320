//! Configuration management

mod app_config;

pub use app_config::{
    ApiConfig, AppConfig, AppSettings, ConfigError, Environment, GatewayConfig, MessagingConfig,
    ServerConfig, CHANNEL_ID_PLACEHOLDER,
};

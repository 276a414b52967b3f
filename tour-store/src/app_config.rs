use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub redis: Option<RedisConfig>,
    #[serde(default)]
    pub kafka: Option<KafkaConfig>,
    pub auth: AuthConfig,
    pub payments: PaymentsConfig,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Postgres,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct KafkaConfig {
    pub brokers: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_expiration_seconds: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PaymentsConfig {
    /// Shared secret the payment gateway sends in `X-Webhook-Secret`.
    pub webhook_secret: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RateLimitConfig {
    pub requests_per_window: i64,
    pub window_seconds: i64,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Per-environment overrides, optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Never checked in
            .add_source(config::File::with_name("config/local").required(false))
            // e.g. `TOUR_AUTH__JWT_SECRET=...` sets `auth.jwt_secret`
            .add_source(config::Environment::with_prefix("TOUR").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::{File, FileFormat};

    #[test]
    fn test_default_file_deserializes() {
        let cfg: Config = config::Config::builder()
            .add_source(File::from_str(
                include_str!("../../config/default.toml"),
                FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(cfg.storage.backend, StorageBackend::Memory);
        assert!(cfg.redis.is_none());
        assert!(cfg.kafka.is_none());
        assert!(cfg.rate_limit.window_seconds > 0);
    }

    #[test]
    fn test_overrides_enable_optional_services() {
        let cfg: Config = config::Config::builder()
            .add_source(File::from_str(
                include_str!("../../config/default.toml"),
                FileFormat::Toml,
            ))
            .add_source(File::from_str(
                r#"
                [storage]
                backend = "postgres"

                [redis]
                url = "redis://cache:6379"
                "#,
                FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(cfg.storage.backend, StorageBackend::Postgres);
        assert_eq!(cfg.redis.unwrap().url, "redis://cache:6379");
    }
}

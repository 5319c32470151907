use anyhow::Result;
use dotenvy::dotenv;
use secrecy::Secret;
use serde::Deserialize;
use std::env;

#[derive(Deserialize, Clone, Debug)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub observability: ObservabilityConfig,
    pub secrets: SecretsConfig,
    pub service_name: String,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Deserialize, Clone, Debug)]
pub struct DatabaseConfig {
    pub url: Secret<String>,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ObservabilityConfig {
    pub log_level: String,
    pub otlp_endpoint: String,
}

#[derive(Deserialize, Clone, Debug)]
pub struct SecretsConfig {
    /// Master key for the credential cipher. Any string; the cipher derives
    /// a fixed-size key from it.
    pub cipher_key: Secret<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let host = env::var("FISCAL_SERVICE_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("FISCAL_SERVICE_PORT")
            .unwrap_or_else(|_| "3010".to_string())
            .parse()?;

        let db_url = env::var("FISCAL_DATABASE_URL")
            .unwrap_or_else(|_| "postgres://localhost:5432/fiscal_db".to_string());
        let max_connections = env::var("FISCAL_DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()?;
        let min_connections = env::var("FISCAL_DATABASE_MIN_CONNECTIONS")
            .unwrap_or_else(|_| "1".to_string())
            .parse()?;

        let log_level = env::var("FISCAL_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let otlp_endpoint =
            env::var("FISCAL_OTLP_ENDPOINT").unwrap_or_else(|_| "http://tempo:4317".to_string());

        let cipher_key = env::var("FISCAL_CIPHER_KEY").unwrap_or_else(|_| "dev-key".to_string());

        Ok(Self {
            server: ServerConfig { host, port },
            database: DatabaseConfig {
                url: Secret::new(db_url),
                max_connections,
                min_connections,
            },
            observability: ObservabilityConfig {
                log_level,
                otlp_endpoint,
            },
            secrets: SecretsConfig {
                cipher_key: Secret::new(cipher_key),
            },
            service_name: "fiscal-service".to_string(),
        })
    }
}

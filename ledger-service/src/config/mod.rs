//! Configuration for ledger-service.

use secrecy::Secret;
use service_core::config::Config as CoreConfig;
use service_core::error::AppError;
use std::env;

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: Secret<String>,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone)]
pub struct SweeperConfig {
    pub enabled: bool,
    pub interval_hours: u64,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Secret<String>,
    pub from_email: String,
    pub from_name: String,
}

#[derive(Debug, Clone)]
pub struct NotificationConfig {
    pub queue_size: usize,
}

#[derive(Debug, Clone)]
pub struct LedgerConfig {
    pub common: CoreConfig,
    pub service_name: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub database: DatabaseConfig,
    pub sweeper: SweeperConfig,
    pub smtp: SmtpConfig,
    pub notifications: NotificationConfig,
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T, AppError> {
    match env::var(key) {
        Ok(raw) => raw.parse().map_err(|_| {
            AppError::ConfigError(anyhow::anyhow!("Invalid value for {}: {}", key, raw))
        }),
        Err(_) => Ok(default),
    }
}

impl LedgerConfig {
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let database_url = env::var("LEDGER_DATABASE_URL").map_err(|_| {
            AppError::ConfigError(anyhow::anyhow!("LEDGER_DATABASE_URL must be set"))
        })?;

        Ok(Self {
            common: CoreConfig {
                port: parse_env("LEDGER_SERVICE_PORT", 3004)?,
            },
            service_name: env_or("LEDGER_SERVICE_NAME", "ledger-service"),
            log_level: env_or("LEDGER_LOG_LEVEL", "info"),
            otlp_endpoint: env::var("LEDGER_OTLP_ENDPOINT").ok(),
            database: DatabaseConfig {
                url: Secret::new(database_url),
                max_connections: parse_env("LEDGER_DB_MAX_CONNECTIONS", 10)?,
                min_connections: parse_env("LEDGER_DB_MIN_CONNECTIONS", 1)?,
            },
            sweeper: SweeperConfig {
                enabled: parse_env("LEDGER_SWEEPER_ENABLED", true)?,
                interval_hours: parse_env("LEDGER_SWEEPER_INTERVAL_HOURS", 24)?,
                timeout_secs: parse_env("LEDGER_SWEEPER_TIMEOUT_SECS", 300)?,
            },
            smtp: SmtpConfig {
                enabled: parse_env("LEDGER_SMTP_ENABLED", false)?,
                host: env_or("LEDGER_SMTP_HOST", "localhost"),
                port: parse_env("LEDGER_SMTP_PORT", 587)?,
                user: env_or("LEDGER_SMTP_USER", ""),
                password: Secret::new(env_or("LEDGER_SMTP_PASSWORD", "")),
                from_email: env_or("LEDGER_SMTP_FROM", "billing@example.com"),
                from_name: env_or("LEDGER_SMTP_FROM_NAME", "Billing"),
            },
            notifications: NotificationConfig {
                queue_size: parse_env("LEDGER_NOTIFICATION_QUEUE_SIZE", 256)?,
            },
        })
    }
}

use std::env;
use std::fmt;

use crate::listings::ReconcileMode;

/// Distinguishes runtime behavior for different stages of the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the client.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub gateway: GatewayConfig,
    pub sync: SyncConfig,
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let base_url =
            env::var("APP_API_BASE_URL").unwrap_or_else(|_| "http://127.0.0.1:5000".to_string());
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ConfigError::InvalidBaseUrl(base_url));
        }
        let timeout_secs = env::var("APP_API_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".to_string())
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidTimeout)?;

        let raw_mode = env::var("APP_RECONCILE_MODE").unwrap_or_else(|_| "patch".to_string());
        let reconcile_mode = ReconcileMode::parse(&raw_mode)
            .ok_or(ConfigError::InvalidReconcileMode(raw_mode))?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            environment,
            gateway: GatewayConfig {
                base_url,
                timeout_secs,
            },
            sync: SyncConfig { reconcile_mode },
            telemetry: TelemetryConfig { log_level },
        })
    }
}

/// Where and how the remote listings API is reached.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

/// Store reconciliation behavior.
#[derive(Debug, Clone, Copy)]
pub struct SyncConfig {
    pub reconcile_mode: ReconcileMode,
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidBaseUrl(String),
    InvalidTimeout,
    InvalidReconcileMode(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidBaseUrl(value) => {
                write!(f, "APP_API_BASE_URL must start with http:// or https:// (got '{value}')")
            }
            ConfigError::InvalidTimeout => write!(f, "APP_API_TIMEOUT_SECS must be a valid u64"),
            ConfigError::InvalidReconcileMode(value) => {
                write!(f, "APP_RECONCILE_MODE must be 'patch' or 'refetch' (got '{value}')")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

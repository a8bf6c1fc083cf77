//! Configuration management for the User API

use anyhow::{Context, Result};
use std::env;
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server host
    pub http_host: String,
    /// HTTP server port
    pub http_port: u16,
    /// Database configuration
    pub database: DatabaseConfig,
    /// JWT configuration
    pub jwt: JwtConfig,
    /// Deadline placed on every request context
    pub request_timeout_secs: u64,
    /// Telemetry configuration
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    /// Upper bound on waiting for a pooled connection. Exhaustion fails
    /// the request instead of queueing it.
    pub acquire_timeout_ms: u64,
}

impl DatabaseConfig {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub token_ttl_secs: i64,
    pub private_key_pem: Option<String>,
    pub public_key_pem: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// "json" or "pretty"
    pub log_format: String,
    pub metrics_enabled: bool,
    pub tracing_enabled: bool,
    pub otlp_endpoint: Option<String>,
    pub service_name: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_format: "pretty".to_string(),
            metrics_enabled: false,
            tracing_enabled: false,
            otlp_endpoint: None,
            service_name: "userapi-core".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var_or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let private_key_pem = lookup("JWT_PRIVATE_KEY").map(|value| value.replace("\\n", "\n"));
        let secret = match lookup("JWT_SECRET") {
            Some(secret) => secret,
            None if private_key_pem.is_some() => String::new(),
            None => anyhow::bail!("JWT_SECRET is required"),
        };

        Ok(Self {
            http_host: var_or("HTTP_HOST", "0.0.0.0"),
            http_port: var_or("HTTP_PORT", "3000")
                .parse()
                .context("Invalid HTTP_PORT")?,
            database: DatabaseConfig {
                url: lookup("DATABASE_URL").context("DATABASE_URL is required")?,
                max_connections: var_or("DATABASE_MAX_CONNECTIONS", "10")
                    .parse()
                    .unwrap_or(10),
                min_connections: var_or("DATABASE_MIN_CONNECTIONS", "2")
                    .parse()
                    .unwrap_or(2),
                acquire_timeout_ms: var_or("DATABASE_ACQUIRE_TIMEOUT_MS", "5000")
                    .parse()
                    .context("Invalid DATABASE_ACQUIRE_TIMEOUT_MS")?,
            },
            jwt: JwtConfig {
                secret,
                issuer: var_or("JWT_ISSUER", "userapi"),
                token_ttl_secs: var_or("JWT_TOKEN_TTL_SECS", "3600")
                    .parse()
                    .unwrap_or(3600),
                private_key_pem,
                public_key_pem: lookup("JWT_PUBLIC_KEY").map(|value| value.replace("\\n", "\n")),
            },
            request_timeout_secs: var_or("REQUEST_TIMEOUT_SECS", "30")
                .parse()
                .context("Invalid REQUEST_TIMEOUT_SECS")?,
            telemetry: TelemetryConfig {
                log_format: var_or("LOG_FORMAT", "pretty"),
                metrics_enabled: var_or("METRICS_ENABLED", "false")
                    .parse()
                    .unwrap_or(false),
                tracing_enabled: var_or("OTEL_TRACING_ENABLED", "false")
                    .parse()
                    .unwrap_or(false),
                otlp_endpoint: lookup("OTEL_EXPORTER_OTLP_ENDPOINT"),
                service_name: var_or("OTEL_SERVICE_NAME", "userapi-core"),
            },
        })
    }

    /// Get HTTP server address
    pub fn http_addr(&self) -> String {
        format!("{}:{}", self.http_host, self.http_port)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

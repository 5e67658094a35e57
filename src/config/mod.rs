//! Configuration management
//!
//! Loads and validates configuration from environment variables, with
//! environment-dependent defaults (development, staging, production).

use std::env;
use std::net::IpAddr;
use thiserror::Error;

use crate::auth::{AuthSettings, VerificationPolicy};

const DEV_JWT_SECRET: &str = "development-secret-change-in-production";
const MIN_PRODUCTION_SECRET_LEN: usize = 32;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid environment value: {0}")]
    InvalidValue(String),

    #[error("Invalid port number: {0}")]
    InvalidPort(String),

    #[error("Insecure production configuration: {0}")]
    InsecureProduction(String),
}

/// Application environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    /// Parse environment from string
    pub fn from_str(s: &str) -> Result<Self, ConfigError> {
        match s.to_lowercase().as_str() {
            "dev" | "development" => Ok(Environment::Development),
            "staging" => Ok(Environment::Staging),
            "prod" | "production" => Ok(Environment::Production),
            _ => Err(ConfigError::InvalidValue(format!(
                "Invalid environment: '{}'. Expected: dev, staging, or prod",
                s
            ))),
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }

    /// Nonce lifetime when `AUTH_NONCE_TTL_SECONDS` is unset
    pub fn default_nonce_ttl_seconds(&self) -> i64 {
        match self {
            Environment::Production => 300,
            _ => 3600,
        }
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Current environment
    pub environment: Environment,

    /// Bind address
    pub host: IpAddr,

    /// Server port
    pub port: u16,

    /// PostgreSQL URL; the in-memory store is used when absent
    pub database_url: Option<String>,

    /// Maximum database connections
    pub db_max_connections: u32,

    /// Rate limit: requests per second per client
    pub rate_limit_rps: u32,

    /// Key rate limits on proxy headers instead of the socket peer
    pub trust_proxy_headers: bool,

    /// CORS allowed origins
    pub cors_allowed_origins: Option<String>,

    /// Log level (RUST_LOG)
    pub log_level: String,

    /// JWT secret for token signing
    pub jwt_secret: String,

    /// Token TTL in seconds (default: 604800 = 7 days)
    pub jwt_token_ttl_seconds: i64,

    /// Auth nonce TTL in seconds
    pub auth_nonce_ttl_seconds: i64,

    /// Whether signatures are cryptographically checked
    pub verification_policy: VerificationPolicy,

    /// Seconds between nonce sweeps
    pub nonce_sweep_interval_seconds: u64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors)
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = lookup("ENVIRONMENT")
            .map(|s| Environment::from_str(&s))
            .unwrap_or(Ok(Environment::Development))?;

        let host = lookup("HOST")
            .unwrap_or_else(|| "127.0.0.1".to_string())
            .parse::<IpAddr>()
            .map_err(|_| ConfigError::InvalidValue("HOST must be an IP address".to_string()))?;

        let port = lookup("PORT")
            .unwrap_or_else(|| "3001".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort("PORT must be a valid number".to_string()))?;

        let database_url = lookup("DATABASE_URL").filter(|s| !s.is_empty());

        let db_max_connections = parse_or(&lookup, "DB_MAX_CONNECTIONS", 5u32);
        let rate_limit_rps = parse_or(&lookup, "RATE_LIMIT_RPS", 100u32);
        let trust_proxy_headers = parse_or(&lookup, "TRUST_PROXY_HEADERS", false);

        let cors_allowed_origins = lookup("CORS_ALLOWED_ORIGINS").filter(|s| !s.is_empty());

        let log_level = lookup("RUST_LOG").unwrap_or_else(|| "info".to_string());

        let jwt_secret = lookup("JWT_SECRET").unwrap_or_else(|| DEV_JWT_SECRET.to_string());
        let jwt_token_ttl_seconds = parse_or(&lookup, "JWT_TOKEN_TTL_SECONDS", 604_800i64);
        let auth_nonce_ttl_seconds = parse_or(
            &lookup,
            "AUTH_NONCE_TTL_SECONDS",
            environment.default_nonce_ttl_seconds(),
        );

        let verification_policy = lookup("AUTH_VERIFICATION_POLICY")
            .map(|s| s.parse::<VerificationPolicy>())
            .unwrap_or(Ok(VerificationPolicy::Strict))
            .map_err(ConfigError::InvalidValue)?;

        let nonce_sweep_interval_seconds = parse_or(&lookup, "NONCE_SWEEP_INTERVAL_SECONDS", 300u64);

        let config = Config {
            environment,
            host,
            port,
            database_url,
            db_max_connections,
            rate_limit_rps,
            trust_proxy_headers,
            cors_allowed_origins,
            log_level,
            jwt_secret,
            jwt_token_ttl_seconds,
            auth_nonce_ttl_seconds,
            verification_policy,
            nonce_sweep_interval_seconds,
        };
        config.validate()?;

        Ok(config)
    }

    /// Reject settings that are unsafe or nonsensical
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt_token_ttl_seconds <= 0 {
            return Err(ConfigError::InvalidValue(
                "JWT_TOKEN_TTL_SECONDS must be positive".to_string(),
            ));
        }
        if self.auth_nonce_ttl_seconds <= 0 {
            return Err(ConfigError::InvalidValue(
                "AUTH_NONCE_TTL_SECONDS must be positive".to_string(),
            ));
        }
        if self.nonce_sweep_interval_seconds == 0 {
            return Err(ConfigError::InvalidValue(
                "NONCE_SWEEP_INTERVAL_SECONDS must be positive".to_string(),
            ));
        }

        if self.environment.is_production() {
            if !self.verification_policy.is_strict() {
                return Err(ConfigError::InsecureProduction(
                    "AUTH_VERIFICATION_POLICY must be strict in production".to_string(),
                ));
            }
            if self.jwt_secret == DEV_JWT_SECRET {
                return Err(ConfigError::MissingEnvVar("JWT_SECRET".to_string()));
            }
            if self.jwt_secret.len() < MIN_PRODUCTION_SECRET_LEN {
                return Err(ConfigError::InsecureProduction(format!(
                    "JWT_SECRET must be at least {} bytes",
                    MIN_PRODUCTION_SECRET_LEN
                )));
            }
        }

        Ok(())
    }

    /// Settings for the auth core
    pub fn auth_settings(&self) -> AuthSettings {
        AuthSettings {
            jwt_secret: self.jwt_secret.clone(),
            token_ttl_seconds: self.jwt_token_ttl_seconds,
            nonce_ttl_seconds: self.auth_nonce_ttl_seconds,
            verification_policy: self.verification_policy,
        }
    }

    /// Database URL with the password masked, for logging
    pub fn database_url_masked(&self) -> Option<String> {
        let url = self.database_url.as_ref()?;
        if let Some(at_pos) = url.find('@') {
            if let Some(colon_pos) = url[..at_pos].rfind(':') {
                let prefix = &url[..colon_pos + 1];
                let suffix = &url[at_pos..];
                return Some(format!("{}****{}", prefix, suffix));
            }
        }
        Some(url.clone())
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    lookup(key)
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

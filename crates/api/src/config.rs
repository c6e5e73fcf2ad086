use keystone_core::error::ConfigError;
use keystone_core::snowflake::{parse_machine_id, MACHINE_ID_ENV};

use crate::auth::jwt::{JwtConfig, JWT_SECRET_ENV};

/// Longest accepted refresh lifetime: ten years, in days.
pub const MAX_REFRESH_TOKEN_EXPIRY_DAYS: i64 = 3_650;

/// Longest accepted access lifetime: one year, in minutes.
pub const MAX_ACCESS_TOKEN_EXPIRY_MINS: i64 = 525_600;

/// Server configuration loaded from environment variables.
///
/// Optional settings have defaults suitable for local development. The signing
/// key and machine id have no default; startup fails without them.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Deadline for each session-store call in seconds (default: `5`).
    pub store_timeout_secs: u64,
    /// Public base URL; an `https://` scheme turns on `Secure` refresh cookies.
    pub base_url: String,
    /// API version segment, mounted at `/api/v{api_version}` (default: `1`).
    pub api_version: String,
    /// Snowflake machine id (0..=1023).
    pub machine_id: u16,
    /// JWT signing key and token lifetimes.
    pub jwt: JwtConfig,
}

impl ServerConfig {
    /// Load configuration from the process environment.
    ///
    /// | Env Var                        | Default                  |
    /// |--------------------------------|--------------------------|
    /// | `HOST`                         | `0.0.0.0`                |
    /// | `PORT`                         | `3000`                   |
    /// | `CORS_ORIGINS`                 | `http://localhost:5173`  |
    /// | `REQUEST_TIMEOUT_SECS`         | `30`                     |
    /// | `STORE_TIMEOUT_SECS`           | `5`                      |
    /// | `BASE_URL`                     | `http://localhost:3000`  |
    /// | `VERSION`                      | `1`                      |
    /// | `COOKIE_REFRESH_TOKEN_EXPIRES` | `7` (days)               |
    /// | `COOKIE_ACCESS_TOKEN_EXPIRES`  | `15` (minutes)           |
    /// | `JWT_SECRET_KEY`               | required                 |
    /// | `MACHINE_ID`                   | required                 |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_source(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_source<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.into());

        let host = var("HOST", "0.0.0.0");
        let port = parse_number("PORT", &var("PORT", "3000"))?;

        let cors_origins: Vec<String> = var("CORS_ORIGINS", "http://localhost:5173")
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs =
            parse_number("REQUEST_TIMEOUT_SECS", &var("REQUEST_TIMEOUT_SECS", "30"))?;
        let store_timeout_secs =
            parse_number("STORE_TIMEOUT_SECS", &var("STORE_TIMEOUT_SECS", "5"))?;

        let base_url = var("BASE_URL", "http://localhost:3000");
        let api_version = var("VERSION", "1").trim().to_string();
        if api_version.is_empty() || api_version.contains('/') {
            return Err(ConfigError::Invalid {
                key: "VERSION",
                reason: format!("'{api_version}' is not a usable path segment"),
            });
        }

        let machine_id = parse_machine_id(lookup(MACHINE_ID_ENV).as_deref())?;

        let secret = lookup(JWT_SECRET_ENV)
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::Missing(JWT_SECRET_ENV))?;
        let refresh_token_expiry_days = parse_lifetime(
            "COOKIE_REFRESH_TOKEN_EXPIRES",
            &var("COOKIE_REFRESH_TOKEN_EXPIRES", "7"),
            MAX_REFRESH_TOKEN_EXPIRY_DAYS,
        )?;
        let access_token_expiry_mins = parse_lifetime(
            "COOKIE_ACCESS_TOKEN_EXPIRES",
            &var("COOKIE_ACCESS_TOKEN_EXPIRES", "15"),
            MAX_ACCESS_TOKEN_EXPIRY_MINS,
        )?;

        Ok(Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            store_timeout_secs,
            base_url,
            api_version,
            machine_id,
            jwt: JwtConfig {
                secret,
                access_token_expiry_mins,
                refresh_token_expiry_days,
            },
        })
    }

    /// Path prefix for every API route, e.g. `/api/v1`.
    pub fn api_root(&self) -> String {
        format!("/api/v{}", self.api_version)
    }

    /// Whether refresh cookies carry the `Secure` attribute.
    pub fn secure_cookies(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

fn parse_number<T: std::str::FromStr>(key: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::Invalid {
        key,
        reason: format!("'{raw}' is not a valid number"),
    })
}

/// Token lifetimes must be positive and no longer than `max`.
fn parse_lifetime(key: &'static str, raw: &str, max: i64) -> Result<i64, ConfigError> {
    let value: i64 = parse_number(key, raw)?;
    if value <= 0 {
        return Err(ConfigError::Invalid {
            key,
            reason: format!("{value} must be greater than zero"),
        });
    }
    if value > max {
        return Err(ConfigError::Invalid {
            key,
            reason: format!("{value} exceeds the maximum of {max}"),
        });
    }
    Ok(value)
}

use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::services::{SessionSettings, StorePolicy, MIN_PASSWORD_LENGTH};

/// Ten years.
pub const MAX_SESSION_TTL_HOURS: i64 = 87_600;
/// One year, the same ceiling invitation requests carry.
pub const MAX_INVITATION_TTL_HOURS: i64 = 8_760;

#[derive(Debug, Clone, Deserialize)]
pub struct AccessConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    /// `None` only outside production; the service then runs on the
    /// in-memory store.
    pub database: Option<DatabaseConfig>,
    pub session: SessionConfig,
    pub invitation: InvitationConfig,
    pub store: StoreConfig,
    pub security: SecurityConfig,
    pub swagger_enabled: bool,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Dev,
    Prod,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Absent: sessions end only at sign-out.
    pub ttl_hours: Option<i64>,
    pub password_min_length: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InvitationConfig {
    pub default_ttl_hours: i64,
    pub public_base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    pub timeout_ms: u64,
    pub retry_backoff_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    pub auth_attempts: u32,
    pub auth_window_seconds: u64,
    pub global_ip_limit: u32,
    pub global_ip_window_seconds: u64,
}

impl AccessConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;

        let env_str = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string());
        let environment: Environment = env_str
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let is_prod = environment == Environment::Prod;

        let database = match get_optional_env("DATABASE_URL") {
            Some(url) => Some(DatabaseConfig {
                url,
                max_connections: parse_env("DATABASE_MAX_CONNECTIONS", Some("10"), is_prod)?,
                min_connections: parse_env("DATABASE_MIN_CONNECTIONS", Some("1"), is_prod)?,
            }),
            None if is_prod => {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "DATABASE_URL is required in production but not set"
                )))
            }
            None => None,
        };

        let session_ttl_hours = get_optional_env("SESSION_TTL_HOURS")
            .map(|v| parse_value::<i64>("SESSION_TTL_HOURS", &v))
            .transpose()?;

        let config = AccessConfig {
            common: common_config,
            environment: environment.clone(),
            service_name: get_env("SERVICE_NAME", Some("board-access-service"), is_prod)?,
            service_version: get_env("SERVICE_VERSION", Some(env!("CARGO_PKG_VERSION")), is_prod)?,
            log_level: get_env("LOG_LEVEL", Some("info"), is_prod)?,
            otlp_endpoint: get_optional_env("OTLP_ENDPOINT"),
            database,
            session: SessionConfig {
                ttl_hours: session_ttl_hours,
                password_min_length: parse_env("PASSWORD_MIN_LENGTH", Some("6"), is_prod)?,
            },
            invitation: InvitationConfig {
                default_ttl_hours: parse_env("INVITATION_TTL_HOURS", Some("168"), is_prod)?,
                public_base_url: get_env(
                    "PUBLIC_BASE_URL",
                    Some("http://localhost:3000"),
                    is_prod,
                )?
                .trim_end_matches('/')
                .to_string(),
            },
            store: StoreConfig {
                timeout_ms: parse_env("STORE_TIMEOUT_MS", Some("5000"), is_prod)?,
                retry_backoff_ms: parse_env("STORE_RETRY_BACKOFF_MS", Some("100"), is_prod)?,
            },
            security: SecurityConfig {
                allowed_origins: parse_origins(&get_env(
                    "ALLOWED_ORIGINS",
                    Some("http://localhost:3000"),
                    is_prod,
                )?),
            },
            swagger_enabled: parse_env(
                "ENABLE_SWAGGER",
                Some(if is_prod { "false" } else { "true" }),
                is_prod,
            )?,
            rate_limit: RateLimitConfig {
                auth_attempts: parse_env("RATE_LIMIT_AUTH_ATTEMPTS", Some("10"), is_prod)?,
                auth_window_seconds: parse_env(
                    "RATE_LIMIT_AUTH_WINDOW_SECONDS",
                    Some("60"),
                    is_prod,
                )?,
                global_ip_limit: parse_env("RATE_LIMIT_GLOBAL_IP_LIMIT", Some("100"), is_prod)?,
                global_ip_window_seconds: parse_env(
                    "RATE_LIMIT_GLOBAL_IP_WINDOW_SECONDS",
                    Some("60"),
                    is_prod,
                )?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.common.port == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "PORT must be greater than 0"
            )));
        }

        if self.session.password_min_length < MIN_PASSWORD_LENGTH {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "PASSWORD_MIN_LENGTH must be at least {}",
                MIN_PASSWORD_LENGTH
            )));
        }

        if let Some(hours) = self.session.ttl_hours {
            check_ttl_hours("SESSION_TTL_HOURS", hours, MAX_SESSION_TTL_HOURS)?;
        }
        check_ttl_hours(
            "INVITATION_TTL_HOURS",
            self.invitation.default_ttl_hours,
            MAX_INVITATION_TTL_HOURS,
        )?;

        if self.store.timeout_ms == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "STORE_TIMEOUT_MS must be greater than 0"
            )));
        }

        if self.rate_limit.auth_attempts == 0 || self.rate_limit.global_ip_limit == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "Rate limits must be greater than 0"
            )));
        }

        if self.environment == Environment::Prod {
            if self.security.allowed_origins.iter().any(|o| o == "*") {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "Wildcard CORS origin not allowed in production"
                )));
            }

            if self.swagger_enabled {
                tracing::error!("Swagger UI is enabled in production");
            }
        }

        Ok(())
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            session_ttl: self
                .session
                .ttl_hours
                .map(|h| chrono::Duration::hours(h.clamp(1, MAX_SESSION_TTL_HOURS))),
            password_min_length: self.session.password_min_length,
        }
    }

    pub fn store_policy(&self) -> StorePolicy {
        StorePolicy::new(
            Duration::from_millis(self.store.timeout_ms),
            Duration::from_millis(self.store.retry_backoff_ms),
        )
    }

    pub fn default_invitation_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(
            self.invitation
                .default_ttl_hours
                .clamp(1, MAX_INVITATION_TTL_HOURS),
        )
    }
}

fn check_ttl_hours(key: &str, hours: i64, max: i64) -> Result<(), AppError> {
    if !(1..=max).contains(&hours) {
        return Err(AppError::ConfigError(anyhow::anyhow!(
            "{} must be between 1 and {}",
            key,
            max
        )));
    }
    Ok(())
}

/// A variable with a default is always optional; one without is required,
/// and production says so explicitly.
fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => match default {
            Some(def) => Ok(def.to_string()),
            None if is_prod => Err(AppError::ConfigError(anyhow::anyhow!(
                "{} is required in production but not set",
                key
            ))),
            None => Err(AppError::ConfigError(anyhow::anyhow!(
                "{} is required but not set",
                key
            ))),
        },
    }
}

fn get_optional_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(key: &str, default: Option<&str>, is_prod: bool) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    parse_value(key, &get_env(key, default, is_prod)?)
}

fn parse_value<T>(key: &str, value: &str) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| AppError::ConfigError(anyhow::anyhow!("Invalid {}: {}", key, e)))
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_parse() {
        assert_eq!("PROD".parse::<Environment>().unwrap(), Environment::Prod);
        assert_eq!("dev".parse::<Environment>().unwrap(), Environment::Dev);
        assert!("staging".parse::<Environment>().is_err());
    }

    #[test]
    fn test_parse_origins_skips_blanks() {
        assert_eq!(
            parse_origins(" https://a.example , ,https://b.example"),
            vec!["https://a.example", "https://b.example"]
        );
    }

    #[test]
    fn test_parse_value_reports_key() {
        let err = parse_value::<u64>("STORE_TIMEOUT_MS", "soon").unwrap_err();
        assert!(err.to_string().contains("STORE_TIMEOUT_MS"));
        assert_eq!(parse_value::<u64>("STORE_TIMEOUT_MS", " 250 ").unwrap(), 250);
    }

    #[test]
    fn test_ttl_hours_bounds() {
        assert!(check_ttl_hours("SESSION_TTL_HOURS", 1, MAX_SESSION_TTL_HOURS).is_ok());
        assert!(check_ttl_hours("SESSION_TTL_HOURS", MAX_SESSION_TTL_HOURS, MAX_SESSION_TTL_HOURS).is_ok());
        assert!(check_ttl_hours("SESSION_TTL_HOURS", 0, MAX_SESSION_TTL_HOURS).is_err());

        let err = check_ttl_hours("INVITATION_TTL_HOURS", 100_000_000_000, MAX_INVITATION_TTL_HOURS)
            .unwrap_err();
        assert!(err.to_string().contains("INVITATION_TTL_HOURS"));
    }
}

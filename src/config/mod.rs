//! Configuration module for the LexMatch backend.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Reserved administrator address. Accounts with this email are treated as admins
/// even when their profile does not carry the admin role.
pub const DEFAULT_ADMIN_EMAIL: &str = "admin@lexmatch.com.br";

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Emit logs as JSON lines instead of the human-readable format
    pub log_json: bool,
    /// Reserved administrator email
    pub admin_email: String,
    /// Password used to bootstrap the admin account on first start
    pub admin_password: Option<String>,
    /// Lifetime of a sign-in session
    pub session_ttl: Duration,
    /// PBKDF2 iteration count for password hashes
    pub password_iterations: u32,
    /// Skip the email confirmation step on sign-up
    pub auto_confirm_email: bool,
    /// How long route guards wait for a pending session to settle
    pub guard_settle: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let db_path = env::var("LEXMATCH_DB_PATH")
            .unwrap_or_else(|_| "./data/lexmatch.sqlite".to_string())
            .into();

        let bind_addr = env::var("LEXMATCH_BIND_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8080".to_string());
        let bind_addr = bind_addr
            .parse()
            .map_err(|_| ConfigError::InvalidBindAddr(bind_addr))?;

        let log_level = env::var("LEXMATCH_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let log_json: bool = parse_var("LEXMATCH_LOG_JSON", false)?;

        let admin_email = env::var("LEXMATCH_ADMIN_EMAIL")
            .map(|email| email.trim().to_lowercase())
            .unwrap_or_else(|_| DEFAULT_ADMIN_EMAIL.to_string());

        let admin_password = env::var("LEXMATCH_ADMIN_PASSWORD")
            .ok()
            .filter(|p| !p.is_empty());

        let session_ttl_hours: u64 = parse_var("LEXMATCH_SESSION_TTL_HOURS", 168)?;
        let password_iterations: u32 = parse_var("LEXMATCH_PASSWORD_ITERATIONS", 100_000)?;
        let auto_confirm_email: bool = parse_var("LEXMATCH_AUTO_CONFIRM_EMAIL", true)?;
        let guard_settle_ms: u64 = parse_var("LEXMATCH_GUARD_SETTLE_MS", 300)?;

        let session_ttl_secs = session_ttl_hours.checked_mul(3600).ok_or_else(|| {
            ConfigError::InvalidValue {
                name: "LEXMATCH_SESSION_TTL_HOURS",
                value: session_ttl_hours.to_string(),
            }
        })?;

        if password_iterations == 0 {
            return Err(ConfigError::InvalidValue {
                name: "LEXMATCH_PASSWORD_ITERATIONS",
                value: "0".to_string(),
            });
        }

        Ok(Self {
            db_path,
            bind_addr,
            log_level,
            log_json,
            admin_email,
            admin_password,
            session_ttl: Duration::from_secs(session_ttl_secs),
            password_iterations,
            auto_confirm_email,
            guard_settle: Duration::from_millis(guard_settle_ms),
        })
    }
}

fn parse_var<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { name, value }),
        Err(_) => Ok(default),
    }
}

/// Errors raised while reading the environment.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid LEXMATCH_BIND_ADDR: {0}")]
    InvalidBindAddr(String),
    #[error("invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    const VARS: [&str; 10] = [
        "LEXMATCH_DB_PATH",
        "LEXMATCH_BIND_ADDR",
        "LEXMATCH_LOG_LEVEL",
        "LEXMATCH_LOG_JSON",
        "LEXMATCH_ADMIN_EMAIL",
        "LEXMATCH_ADMIN_PASSWORD",
        "LEXMATCH_SESSION_TTL_HOURS",
        "LEXMATCH_PASSWORD_ITERATIONS",
        "LEXMATCH_AUTO_CONFIRM_EMAIL",
        "LEXMATCH_GUARD_SETTLE_MS",
    ];

    // Both cases live in one test so they never race on the process environment.
    #[test]
    fn test_config_from_env() {
        for var in VARS {
            env::remove_var(var);
        }

        let config = Config::from_env().unwrap();

        assert_eq!(config.db_path, PathBuf::from("./data/lexmatch.sqlite"));
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:8080");
        assert_eq!(config.log_level, "info");
        assert!(!config.log_json);
        assert_eq!(config.admin_email, DEFAULT_ADMIN_EMAIL);
        assert!(config.admin_password.is_none());
        assert_eq!(config.session_ttl, Duration::from_secs(168 * 3600));
        assert_eq!(config.password_iterations, 100_000);
        assert!(config.auto_confirm_email);
        assert_eq!(config.guard_settle, Duration::from_millis(300));

        env::set_var("LEXMATCH_PASSWORD_ITERATIONS", "many");
        let err = Config::from_env().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                name: "LEXMATCH_PASSWORD_ITERATIONS",
                ..
            }
        ));
        env::remove_var("LEXMATCH_PASSWORD_ITERATIONS");

        env::set_var("LEXMATCH_SESSION_TTL_HOURS", u64::MAX.to_string());
        let err = Config::from_env().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                name: "LEXMATCH_SESSION_TTL_HOURS",
                ..
            }
        ));
        env::remove_var("LEXMATCH_SESSION_TTL_HOURS");

        env::set_var("LEXMATCH_ADMIN_EMAIL", "  Boss@Example.COM ");
        let config = Config::from_env().unwrap();
        assert_eq!(config.admin_email, "boss@example.com");
        env::remove_var("LEXMATCH_ADMIN_EMAIL");
    }
}

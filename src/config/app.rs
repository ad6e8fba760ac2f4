use std::env;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_DATABASE_URL: &str = "sqlite://data/minauth.db";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_RESET_TOKEN_TTL_MINUTES: i64 = 60;
/// One week.
const MAX_RESET_TOKEN_TTL_MINUTES: i64 = 7 * 24 * 60;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    /// Public origin used to build links in outgoing mail.
    pub base_url: String,
    pub static_dir: PathBuf,
    pub reset_token_ttl: chrono::Duration,
    /// Upper bound on waiting for a store connection.
    pub database_timeout: Duration,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = env::var("DATABASE_URL")
            .or_else(|_| env::var("DBURL"))
            .unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string());
        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = parse_var("PORT", DEFAULT_PORT)?;
        let base_url =
            env::var("BASE_URL").unwrap_or_else(|_| format!("http://localhost:{}", port));
        let static_dir = env::var("STATIC_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("public"));
        let reset_token_ttl = parse_reset_ttl("RESET_TOKEN_TTL_MINUTES")?;
        let database_timeout = Duration::from_secs(parse_var("DATABASE_TIMEOUT_SECS", 5)?);

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            static_dir,
            reset_token_ttl,
            database_timeout,
        })
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            base_url: format!("http://localhost:{}", DEFAULT_PORT),
            static_dir: PathBuf::from("public"),
            reset_token_ttl: chrono::Duration::minutes(DEFAULT_RESET_TOKEN_TTL_MINUTES),
            database_timeout: Duration::from_secs(5),
        }
    }
}

fn parse_var<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(value) => value
            .parse()
            .map_err(|_| ConfigError::InvalidValue { key, value }),
        Err(_) => Ok(default),
    }
}

/// Reset links must live a positive time, bounded so `now + ttl` cannot overflow.
fn parse_reset_ttl(key: &'static str) -> Result<chrono::Duration, ConfigError> {
    let minutes = parse_var(key, DEFAULT_RESET_TOKEN_TTL_MINUTES)?;
    if !(1..=MAX_RESET_TOKEN_TTL_MINUTES).contains(&minutes) {
        return Err(ConfigError::InvalidValue {
            key,
            value: minutes.to_string(),
        });
    }
    chrono::Duration::try_minutes(minutes).ok_or(ConfigError::InvalidValue {
        key,
        value: minutes.to_string(),
    })
}

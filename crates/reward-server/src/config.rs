use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, bail};

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
];

#[derive(Debug, Clone)]
pub struct Config {
    pub jwt_secret: String,
    pub db_path: PathBuf,
    pub addr: SocketAddr,
    pub token_ttl: chrono::Duration,
    pub request_timeout: Duration,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let jwt_secret = get("REWARD_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("REWARD_JWT_SECRET is unset or still a placeholder; set it in your .env file");
        }

        let db_path = get("REWARD_DB_PATH").unwrap_or_else(|| "reward.db".into()).into();
        let host = get("REWARD_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = get("REWARD_PORT")
            .unwrap_or_else(|| "8080".into())
            .parse()
            .context("REWARD_PORT must be a port number")?;
        let addr = format!("{}:{}", host, port)
            .parse()
            .with_context(|| format!("invalid bind address {}:{}", host, port))?;

        let ttl_minutes: i64 = parse_or(&get, "REWARD_TOKEN_TTL_MINUTES", 120)?;
        let timeout_secs: u64 = parse_or(&get, "REWARD_REQUEST_TIMEOUT_SECS", 10)?;
        if ttl_minutes <= 0 || timeout_secs == 0 {
            bail!("REWARD_TOKEN_TTL_MINUTES and REWARD_REQUEST_TIMEOUT_SECS must be positive");
        }

        Ok(Self {
            jwt_secret,
            db_path,
            addr,
            token_ttl: chrono::Duration::minutes(ttl_minutes),
            request_timeout: Duration::from_secs(timeout_secs),
        })
    }
}

fn parse_or<T>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match get(key) {
        Some(raw) => raw.parse().with_context(|| format!("{key} is not a valid number")),
        None => Ok(default),
    }
}

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, bail};

const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
    "secret",
];

#[derive(Debug, Clone)]
pub struct Config {
    pub jwt_secret: String,
    pub db_path: PathBuf,
    pub host: String,
    pub port: u16,
    pub store_timeout: Duration,
    pub store_attempts: usize,
    pub token_ttl: chrono::Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup, so tests don't have to touch the process
    /// environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let jwt_secret = lookup("CAMPUS_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("CAMPUS_JWT_SECRET is unset or still a placeholder; set it in .env and restart");
        }

        let store_timeout_ms: u64 = parse_or(&lookup, "CAMPUS_STORE_TIMEOUT_MS", 5000)?;
        let token_ttl_days: i64 = parse_or(&lookup, "CAMPUS_TOKEN_TTL_DAYS", 30)?;

        Ok(Self {
            jwt_secret,
            db_path: lookup("CAMPUS_DB_PATH")
                .unwrap_or_else(|| "campus.db".into())
                .into(),
            host: lookup("CAMPUS_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: parse_or(&lookup, "CAMPUS_PORT", 5000)?,
            store_timeout: Duration::from_millis(store_timeout_ms),
            store_attempts: parse_or(&lookup, "CAMPUS_STORE_ATTEMPTS", 3)?,
            token_ttl: chrono::Duration::days(token_ttl_days),
        })
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid value for {}: '{}'", key, raw)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_only_the_secret_is_set() {
        let config = config_from(&[("CAMPUS_JWT_SECRET", "a-real-secret")]).unwrap();
        assert_eq!(config.db_path, PathBuf::from("campus.db"));
        assert_eq!(config.port, 5000);
        assert_eq!(config.store_timeout, Duration::from_secs(5));
        assert_eq!(config.store_attempts, 3);
        assert_eq!(config.token_ttl, chrono::Duration::days(30));
    }

    #[test]
    fn placeholder_secrets_are_refused() {
        assert!(config_from(&[]).is_err());
        assert!(config_from(&[("CAMPUS_JWT_SECRET", "dev-secret-change-me")]).is_err());
    }

    #[test]
    fn malformed_numbers_name_the_variable() {
        let err = config_from(&[
            ("CAMPUS_JWT_SECRET", "a-real-secret"),
            ("CAMPUS_PORT", "eighty"),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("CAMPUS_PORT"));
    }

    #[test]
    fn store_attempts_counts_the_first_try() {
        let config = config_from(&[
            ("CAMPUS_JWT_SECRET", "a-real-secret"),
            ("CAMPUS_STORE_ATTEMPTS", "1"),
        ])
        .unwrap();
        assert_eq!(config.store_attempts, 1);
    }
}

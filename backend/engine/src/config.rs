use std::{
    env,
    fmt::Display,
    fs::read_to_string,
    io::ErrorKind,
    path::Path,
    str::FromStr,
    time::Duration,
};

use tracing::{info, warn};

use crate::{error::ConfigError, recorder::RetryPolicy};

const SECRETS_DIR: &str = "/run/secrets";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreKind {
    Memory,
    Redis,
}

impl FromStr for StoreKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(StoreKind::Memory),
            "redis" => Ok(StoreKind::Redis),
            other => Err(format!("unknown store {other:?}, expected memory or redis")),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub store: StoreKind,
    pub redis_url: String,
    pub key_prefix: String,
    pub vote_timeout: Duration,
    pub vote_retries: u32,
    pub retry_backoff: Duration,
    pub event_capacity: usize,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        let redis_url: String = try_load("REDIS_URL", "redis://127.0.0.1:6379")?;
        let password = read_secret(Path::new(SECRETS_DIR), "REDIS_PASSWORD")?;

        Ok(Self {
            store: try_load("SWIPES_STORE", "memory")?,
            redis_url: with_password(&redis_url, password.as_deref()),
            key_prefix: try_load("SWIPES_KEY_PREFIX", "swipes")?,
            vote_timeout: Duration::from_millis(try_load("VOTE_TIMEOUT_MS", "2000")?),
            vote_retries: try_load("VOTE_RETRIES", "2")?,
            retry_backoff: Duration::from_millis(try_load("RETRY_BACKOFF_MS", "50")?),
            event_capacity: try_load("EVENT_CAPACITY", "256")?,
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            timeout: self.vote_timeout,
            retries: self.vote_retries,
            backoff: self.retry_backoff,
        }
    }
}

fn try_load<T: FromStr>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    let raw = env::var(key).unwrap_or_else(|_| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    parse(key, &raw)
}

fn parse<T: FromStr>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    raw.trim().parse().map_err(|e: T::Err| {
        warn!("Invalid {key} value: {e}");

        ConfigError::Invalid {
            key: key.to_string(),
            reason: e.to_string(),
        }
    })
}

/// Docker secret file, if mounted. Missing is fine, unreadable is not.
fn read_secret(dir: &Path, secret_name: &str) -> Result<Option<String>, ConfigError> {
    match read_to_string(dir.join(secret_name)) {
        Ok(s) => Ok(Some(s.trim().to_string()).filter(|s| !s.is_empty())),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(source) => {
            warn!("Failed to read {secret_name} from file: {source}");

            Err(ConfigError::Secret {
                name: secret_name.to_string(),
                source,
            })
        }
    }
}

fn with_password(url: &str, password: Option<&str>) -> String {
    match password {
        Some(password) if !url.contains('@') => {
            url.replacen("://", &format!("://:{password}@"), 1)
        }
        _ => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn test_store_kind() {
        assert_eq!("Redis".parse::<StoreKind>(), Ok(StoreKind::Redis));
        assert_eq!(" memory ".parse::<StoreKind>(), Ok(StoreKind::Memory));
        assert!("postgres".parse::<StoreKind>().is_err());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(parse::<u32>("VOTE_RETRIES", "3").unwrap(), 3);
        assert!(matches!(
            parse::<u64>("VOTE_TIMEOUT_MS", "soon"),
            Err(ConfigError::Invalid { key, .. }) if key == "VOTE_TIMEOUT_MS"
        ));
    }

    #[test]
    fn test_with_password() {
        assert_eq!(
            with_password("redis://cache:6379", Some("hunter2")),
            "redis://:hunter2@cache:6379"
        );
        assert_eq!(
            with_password("redis://user:pw@cache:6379", Some("hunter2")),
            "redis://user:pw@cache:6379"
        );
        assert_eq!(with_password("redis://cache:6379", None), "redis://cache:6379");
    }

    #[test]
    fn test_read_secret() {
        let dir = env::temp_dir().join(format!("swipes-secrets-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("REDIS_PASSWORD"), "  hunter2\n").unwrap();

        assert_eq!(
            read_secret(&dir, "REDIS_PASSWORD").unwrap().as_deref(),
            Some("hunter2")
        );
        assert_eq!(read_secret(&dir, "MISSING").unwrap(), None);

        fs::remove_dir_all(&dir).unwrap();
    }
}

use std::{env, fmt::Display, fs::read_to_string, io::ErrorKind, str::FromStr, time::Duration};

use tracing::{info, warn};

use crate::{error::ConfigError, session::Credential};

const SECRETS_DIR: &str = "/run/secrets";

#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: String,
    pub redis_url: String,
    pub request_timeout: Duration,
    pub token: Option<Credential>,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        let token = match read_secret("SHELF_TOKEN")? {
            Some(token) => Some(token),
            None => var("SHELF_TOKEN").ok(),
        };

        Self::from_lookup(|key| var(key).ok(), token)
    }

    fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
        token: Option<String>,
    ) -> Result<Self, ConfigError> {
        let timeout_ms: u64 = try_load(&lookup, "SHELF_TIMEOUT_MS", "5000")?;
        if timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                key: "SHELF_TIMEOUT_MS",
                reason: "timeout must be positive".to_string(),
            });
        }

        let token = token
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty())
            .map(Credential::new);

        if token.is_none() {
            warn!("No SHELF_TOKEN provided, starting signed out");
        }

        Ok(Self {
            api_url: try_load(&lookup, "SHELF_API_URL", "http://localhost:5000/api")?,
            redis_url: try_load(&lookup, "SHELF_REDIS_URL", "redis://127.0.0.1:6379")?,
            request_timeout: Duration::from_millis(timeout_ms),
            token,
        })
    }
}

fn var(key: &str) -> Result<String, ()> {
    env::var(key).map_err(|_| {
        info!("Environment variable {key} not found");
    })
}

fn try_load<T: FromStr>(
    lookup: impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: &str,
) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    lookup(key)
        .unwrap_or_else(|| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
        })
}

fn read_secret(secret_name: &'static str) -> Result<Option<String>, ConfigError> {
    let path = format!("{SECRETS_DIR}/{secret_name}");

    match read_to_string(&path) {
        Ok(secret) => Ok(Some(secret.trim().to_string())),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(source) => Err(ConfigError::Secret {
            name: secret_name,
            source,
        }),
    }
}

use std::env;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} environment variable not set")]
    Missing(&'static str),
    #[error("invalid value '{value}' for {key}")]
    Invalid { key: &'static str, value: String },
    #[error("invalid webhook URL '{url}': {source}")]
    BadUrl {
        url: String,
        source: url::ParseError,
    },
    #[error("unsupported webhook URL scheme '{0}', expected http or https")]
    BadScheme(String),
    #[error("MIN_TEMP ({min}) must not exceed MAX_TEMP ({max})")]
    BadRange { min: f64, max: f64 },
    #[error("MAX_RETRIES must be at least 1")]
    ZeroRetries,
    #[error("MAX_CONSECUTIVE_FAILURES must be at least 1")]
    ZeroFailureThreshold,
}

/// Device settings, loaded once at startup and immutable for the process
/// lifetime.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    pub webhook_url: String,
    pub device_id: String,
    pub min_temp: f64,
    pub max_temp: f64,
    pub interval: Duration,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub request_timeout: Duration,
    pub max_consecutive_failures: u32,
    pub cooldown: Duration,
}

impl DeviceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load environment variables
        dotenv::dotenv().ok();

        let webhook_url = env::var("WEBHOOK_URL").map_err(|_| ConfigError::Missing("WEBHOOK_URL"))?;
        let parsed = Url::parse(&webhook_url).map_err(|source| ConfigError::BadUrl {
            url: webhook_url.clone(),
            source,
        })?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(ConfigError::BadScheme(parsed.scheme().to_string()));
        }

        let device_id = env::var("DEVICE_ID")
            .ok()
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .unwrap_or_else(generate_device_id);

        let config = DeviceConfig {
            webhook_url,
            device_id,
            min_temp: var_or("MIN_TEMP", 18.0)?,
            max_temp: var_or("MAX_TEMP", 32.0)?,
            interval: Duration::from_secs(var_or("INTERVAL_SECS", 5)?),
            max_retries: var_or("MAX_RETRIES", 3)?,
            retry_delay: Duration::from_secs(var_or("RETRY_DELAY_SECS", 2)?),
            request_timeout: Duration::from_secs(var_or("REQUEST_TIMEOUT_SECS", 10)?),
            max_consecutive_failures: var_or("MAX_CONSECUTIVE_FAILURES", 5)?,
            cooldown: Duration::from_secs(var_or("COOLDOWN_SECS", 30)?),
        };

        if config.min_temp > config.max_temp {
            return Err(ConfigError::BadRange {
                min: config.min_temp,
                max: config.max_temp,
            });
        }
        if config.max_retries == 0 {
            return Err(ConfigError::ZeroRetries);
        }
        if config.max_consecutive_failures == 0 {
            return Err(ConfigError::ZeroFailureThreshold);
        }

        Ok(config)
    }
}

/// Receiver settings, loaded once at startup.
#[derive(Debug, Clone)]
pub struct ReceiverConfig {
    pub bind_addr: String,
    pub port: u16,
    pub webhook_path: String,
}

impl ReceiverConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1".to_string());
        let mut webhook_path = env::var("WEBHOOK_PATH").unwrap_or_else(|_| "/webhook".to_string());
        if !webhook_path.starts_with('/') {
            webhook_path.insert(0, '/');
        }

        Ok(ReceiverConfig {
            bind_addr,
            port: var_or("PORT", 5000)?,
            webhook_path,
        })
    }

    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }
}

/// Read an environment variable, falling back to `default` when unset.
fn var_or<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
        Err(_) => Ok(default),
    }
}

fn generate_device_id() -> String {
    format!("device-{:08x}", rand::random::<u32>())
}

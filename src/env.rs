use anyhow::{Context, Result};
use dotenv::dotenv;
use std::env;

use crate::config::MqConfig;

pub const MQ_HOST: &str = "MQ_HOST";
pub const MQ_PORT: &str = "MQ_PORT";
pub const MQ_VHOST: &str = "MQ_VHOST";
pub const MQ_LOGIN: &str = "MQ_LOGIN";
pub const MQ_PASSWORD: &str = "MQ_PASSWORD";
pub const MQ_TIMEOUT_SECONDS: &str = "MQ_TIMEOUT_SECONDS";

impl MqConfig {
    /// Reads the `MQ_*` variables, after loading a `.env` file if one is present.
    pub fn from_env() -> Result<Self> {
        dotenv().ok();
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Builds a config from any variable source. Unset optional values keep the
    /// defaults of [`MqConfig::default`].
    pub fn from_vars<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = MqConfig::default();
        Ok(MqConfig {
            host: lookup(MQ_HOST).context("MQ_HOST is not set")?,
            port: match lookup(MQ_PORT) {
                Some(val) => val
                    .parse()
                    .with_context(|| format!("MQ_PORT is not a valid port: {}", val))?,
                None => defaults.port,
            },
            vhost: lookup(MQ_VHOST).unwrap_or(defaults.vhost),
            login: lookup(MQ_LOGIN).unwrap_or(defaults.login),
            password: lookup(MQ_PASSWORD).unwrap_or(defaults.password),
            timeout_ms: match lookup(MQ_TIMEOUT_SECONDS) {
                Some(val) => val
                    .parse::<u64>()
                    .with_context(|| format!("MQ_TIMEOUT_SECONDS is not a number: {}", val))?
                    .saturating_mul(1000),
                None => defaults.timeout_ms,
            },
            tls: defaults.tls,
        })
    }
}

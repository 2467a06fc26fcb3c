//! Environment configuration.

use std::env;
use std::str::FromStr;
use thiserror::Error;

use crate::gateway::razorpay::{RazorpayConfig, DEFAULT_BASE_URL};

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// Absent means the in-memory store.
    pub database_url: Option<String>,
    pub nats_url: Option<String>,
    pub gateway: RazorpayConfig,
    pub currency: String,
    pub delivery_days: i64,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the config from any variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let optional = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let required = |name: &'static str| optional(name).ok_or(ConfigError::Missing(name));

        Ok(Self {
            port: parsed(&lookup, "PORT", 8083)?,
            database_url: optional("DATABASE_URL"),
            nats_url: optional("NATS_URL"),
            gateway: RazorpayConfig {
                key_id: required("GATEWAY_KEY_ID")?,
                key_secret: required("GATEWAY_KEY_SECRET")?,
                base_url: optional("GATEWAY_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            },
            currency: optional("CURRENCY").unwrap_or_else(|| "INR".to_string()),
            delivery_days: parsed(&lookup, "DELIVERY_DAYS", 3)?,
        })
    }
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &'static str, default: T) -> Result<T, ConfigError> {
    match lookup(name).filter(|v| !v.trim().is_empty()) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid { name, value }),
    }
}

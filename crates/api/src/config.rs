//! Application configuration loaded from environment variables.

use chrono::Duration;
use domain::catalog::MAX_PRICE;
use domain::{CommerceSettings, Money};
use thiserror::Error;

use crate::auth::{TokenConfigError, TokenRegistry};

const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 3600;

/// Configuration that could not be loaded.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("AUTH_TOKENS: {0}")]
    Tokens(#[from] TokenConfigError),

    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default `"0.0.0.0"`)
/// - `PORT`: listen port (default `3000`)
/// - `RUST_LOG`: tracing filter directive (default `"info"`)
/// - `DATABASE_URL`: PostgreSQL connection string; unset keeps documents in memory
/// - `SHIPPING_COST`: flat shipping cost as a decimal amount (default `0`)
/// - `CART_TTL_DAYS`: days of inactivity before a cart expires (default `30`)
/// - `CART_SWEEP_INTERVAL_SECS`: seconds between purges of expired carts, at
///   least `1` (default `3600`)
/// - `AUTH_TOKENS`: comma separated `token:user-id:role[:email]` entries
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: Option<String>,
    pub commerce: CommerceSettings,
    pub cart_sweep_interval: std::time::Duration,
    pub tokens: TokenRegistry,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads configuration through `lookup`, which returns a variable's value
    /// if it is set.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let shipping_cost = match var("SHIPPING_COST") {
            Some(value) => {
                let amount: f64 = parse("SHIPPING_COST", &value)?;
                let cost = Money::from_decimal(amount);
                if !amount.is_finite() || amount < 0.0 || cost > MAX_PRICE {
                    return Err(ConfigError::Invalid {
                        name: "SHIPPING_COST",
                        value,
                    });
                }
                cost
            }
            None => defaults.commerce.shipping_cost,
        };

        let cart_ttl = match var("CART_TTL_DAYS") {
            Some(value) => {
                let days: i64 = parse("CART_TTL_DAYS", &value)?;
                match Duration::try_days(days) {
                    Some(ttl) if days > 0 => ttl,
                    _ => {
                        return Err(ConfigError::Invalid {
                            name: "CART_TTL_DAYS",
                            value,
                        });
                    }
                }
            }
            None => defaults.commerce.cart_ttl,
        };

        let cart_sweep_interval = match var("CART_SWEEP_INTERVAL_SECS") {
            Some(value) => {
                let secs: u64 = parse("CART_SWEEP_INTERVAL_SECS", &value)?;
                if secs == 0 {
                    return Err(ConfigError::Invalid {
                        name: "CART_SWEEP_INTERVAL_SECS",
                        value,
                    });
                }
                std::time::Duration::from_secs(secs)
            }
            None => defaults.cart_sweep_interval,
        };

        Ok(Self {
            host: var("HOST").unwrap_or(defaults.host),
            port: match var("PORT") {
                Some(value) => parse("PORT", &value)?,
                None => defaults.port,
            },
            log_level: var("RUST_LOG").unwrap_or(defaults.log_level),
            database_url: var("DATABASE_URL"),
            commerce: CommerceSettings::default()
                .with_shipping_cost(shipping_cost)
                .with_cart_ttl(cart_ttl),
            cart_sweep_interval,
            tokens: match var("AUTH_TOKENS") {
                Some(raw) => TokenRegistry::parse(&raw)?,
                None => TokenRegistry::new(),
            },
        })
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            database_url: None,
            commerce: CommerceSettings::default(),
            cart_sweep_interval: std::time::Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
            tokens: TokenRegistry::new(),
        }
    }
}

fn parse<T: std::str::FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        name,
        value: value.to_string(),
    })
}

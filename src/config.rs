//! # Configuration Module
//!
//! Runtime settings read from the environment (a `.env` file is loaded first
//! by `main`). Provider and recovery settings have `Default` values so tests
//! can build them without touching the environment.

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use rust_decimal::Decimal;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_NOWPAYMENTS_API_URL: &str = "https://api.nowpayments.io/v1";
pub const DEFAULT_PRICE_CURRENCY: &str = "usd";
pub const DEFAULT_PAYOUT_CURRENCY: &str = "usdttrc20";
pub const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_CURRENCY_CACHE_TTL_SECS: u64 = 3600;
pub const DEFAULT_PAYMENT_AMOUNT_SCALE: u32 = 8;

/// Recovery configuration for outbound provider calls
#[derive(Debug, Clone)]
pub struct RecoveryConfig {
    /// Maximum number of retry attempts for idempotent calls
    pub max_retries: u32,
    /// Base delay between retries in milliseconds
    pub base_retry_delay_ms: u64,
    /// Maximum delay between retries in milliseconds
    pub max_retry_delay_ms: u64,
    /// Per-request timeout in seconds
    pub operation_timeout_secs: u64,
    /// Circuit breaker failure threshold
    pub circuit_breaker_threshold: u32,
    /// Circuit breaker reset timeout in seconds
    pub circuit_breaker_reset_secs: u64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_retry_delay_ms: 250,
            max_retry_delay_ms: 2000,
            operation_timeout_secs: DEFAULT_PROVIDER_TIMEOUT_SECS,
            circuit_breaker_threshold: 5,
            circuit_breaker_reset_secs: 60, // 1 minute
        }
    }
}

impl RecoveryConfig {
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_secs)
    }
}

/// Payment provider settings
#[derive(Debug, Clone)]
pub struct PaymentConfig {
    pub api_url: String,
    /// `None` disables outbound payment calls
    pub api_key: Option<String>,
    /// `None` makes every IPN callback fail verification
    pub ipn_secret: Option<String>,
    /// Base currency of every price tier
    pub price_currency: String,
    pub payout_currency: String,
    /// Fraction kept by the platform on payouts
    pub commission_rate: Decimal,
    /// Decimal places used when comparing paid and expected amounts
    pub amount_scale: u32,
    pub currency_cache_ttl_secs: u64,
    pub recovery: RecoveryConfig,
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_NOWPAYMENTS_API_URL.to_string(),
            api_key: None,
            ipn_secret: None,
            price_currency: DEFAULT_PRICE_CURRENCY.to_string(),
            payout_currency: DEFAULT_PAYOUT_CURRENCY.to_string(),
            commission_rate: Decimal::new(1, 2),
            amount_scale: DEFAULT_PAYMENT_AMOUNT_SCALE,
            currency_cache_ttl_secs: DEFAULT_CURRENCY_CACHE_TTL_SECS,
            recovery: RecoveryConfig::default(),
        }
    }
}

impl PaymentConfig {
    pub fn currency_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.currency_cache_ttl_secs)
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    /// Externally reachable base URL, used for Telegram and IPN webhooks
    pub public_url: String,
    pub bind_addr: SocketAddr,
    pub admin_api_token: String,
    pub log_json: bool,
    pub payment: PaymentConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let database_url = required("DATABASE_URL")?;
        let public_url = required("PUBLIC_URL")?.trim_end_matches('/').to_string();
        let admin_api_token = required("ADMIN_API_TOKEN")?;

        let bind_addr = optional("BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse()
            .context("BIND_ADDR must be a socket address")?;

        let log_json = optional("LOG_FORMAT")
            .map(|f| f.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        let defaults = PaymentConfig::default();
        let recovery = RecoveryConfig {
            operation_timeout_secs: parsed("PROVIDER_TIMEOUT_SECS")?
                .unwrap_or(DEFAULT_PROVIDER_TIMEOUT_SECS),
            ..RecoveryConfig::default()
        };
        let payment = PaymentConfig {
            api_url: optional("NOWPAYMENTS_API_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or(defaults.api_url),
            api_key: optional("NOWPAYMENTS_API_KEY"),
            ipn_secret: optional("NOWPAYMENTS_IPN_SECRET"),
            price_currency: optional("PRICE_CURRENCY")
                .map(|c| c.to_lowercase())
                .unwrap_or(defaults.price_currency),
            payout_currency: optional("PAYOUT_CURRENCY")
                .map(|c| c.to_lowercase())
                .unwrap_or(defaults.payout_currency),
            commission_rate: parsed("COMMISSION_RATE")?.unwrap_or(defaults.commission_rate),
            amount_scale: parsed("PAYMENT_AMOUNT_SCALE")?.unwrap_or(defaults.amount_scale),
            currency_cache_ttl_secs: parsed("CURRENCY_CACHE_TTL_SECS")?
                .unwrap_or(defaults.currency_cache_ttl_secs),
            recovery,
        };

        if payment.commission_rate < Decimal::ZERO || payment.commission_rate >= Decimal::ONE {
            anyhow::bail!("COMMISSION_RATE must be in [0, 1)");
        }

        Ok(Self {
            database_url,
            public_url,
            bind_addr,
            admin_api_token,
            log_json,
            payment,
        })
    }

    /// Callback URL handed to the payment provider
    pub fn ipn_callback_url(&self) -> String {
        format!("{}/webhook/payments", self.public_url)
    }
}

fn required(name: &str) -> Result<String> {
    optional(name).with_context(|| format!("{name} must be set"))
}

fn optional(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parsed<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    optional(name)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| anyhow::anyhow!("{name} is invalid: {e}"))
        })
        .transpose()
}

use anyhow::{Context, Result};
use std::env;

pub const DEFAULT_DARAJA_BASE_URL: &str = "https://sandbox.safaricom.co.ke";
/// Safaricom's public test PayBill
pub const DEFAULT_SHORT_CODE: &str = "174379";
/// Placeholder host; replace with the public address of this service
pub const DEFAULT_CALLBACK_URL: &str = "https://yourdomain.com/mpesa/callback";

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub daraja: DarajaConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub cors_allowed_origins: Vec<String>,
}

#[derive(Clone)]
pub struct DarajaConfig {
    pub base_url: String,
    pub consumer_key: String,
    pub consumer_secret: String,
    pub passkey: String,
    pub short_code: String,
    pub amount: u32,
    pub callback_url: String,
    pub account_reference: String,
    pub transaction_desc: String,
    pub timeout_secs: u64,
}

// Credentials stay out of logs.
impl std::fmt::Debug for DarajaConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DarajaConfig")
            .field("base_url", &self.base_url)
            .field("consumer_key", &"<redacted>")
            .field("consumer_secret", &"<redacted>")
            .field("passkey", &"<redacted>")
            .field("short_code", &self.short_code)
            .field("amount", &self.amount)
            .field("callback_url", &self.callback_url)
            .field("account_reference", &self.account_reference)
            .field("transaction_desc", &self.transaction_desc)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl DarajaConfig {
    /// Sandbox defaults with the given credentials
    pub fn sandbox(
        consumer_key: impl Into<String>,
        consumer_secret: impl Into<String>,
        passkey: impl Into<String>,
    ) -> Self {
        Self {
            base_url: DEFAULT_DARAJA_BASE_URL.to_string(),
            consumer_key: consumer_key.into(),
            consumer_secret: consumer_secret.into(),
            passkey: passkey.into(),
            short_code: DEFAULT_SHORT_CODE.to_string(),
            amount: 1,
            callback_url: DEFAULT_CALLBACK_URL.to_string(),
            account_reference: "InvestWise Predictor".to_string(),
            transaction_desc: "Premium Content Payment".to_string(),
            timeout_secs: 30,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var_or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .with_context(|| format!("{} must be set", key))
        };

        let sandbox = DarajaConfig::sandbox("", "", "");

        Ok(Self {
            server: ServerConfig {
                port: var_or("PORT", "3000")
                    .parse()
                    .context("PORT must be a valid port number")?,
                host: var_or("HOST", "0.0.0.0"),
                cors_allowed_origins: var_or("ALLOWED_ORIGINS", "*")
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            },
            daraja: DarajaConfig {
                base_url: var_or("DARAJA_BASE_URL", &sandbox.base_url)
                    .trim_end_matches('/')
                    .to_string(),
                consumer_key: required("CONSUMER_KEY")?,
                consumer_secret: required("CONSUMER_SECRET")?,
                passkey: required("PASSKEY")?,
                short_code: var_or("BUSINESS_SHORT_CODE", &sandbox.short_code),
                amount: var_or("PAYMENT_AMOUNT", "1")
                    .parse()
                    .context("PAYMENT_AMOUNT must be a positive integer")?,
                callback_url: var_or("CALLBACK_URL", &sandbox.callback_url),
                account_reference: var_or("ACCOUNT_REFERENCE", &sandbox.account_reference),
                transaction_desc: var_or("TRANSACTION_DESC", &sandbox.transaction_desc),
                timeout_secs: var_or("DARAJA_TIMEOUT_SECS", "30")
                    .parse()
                    .context("DARAJA_TIMEOUT_SECS must be a number of seconds")?,
            },
        })
    }
}

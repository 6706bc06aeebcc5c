//! Command line and environment configuration.
//!
//! Every credential can be given as a flag or through the environment (a `.env` file in the
//! working directory is loaded first). Secrets are never echoed in `--help`.

use crate::bank::FinTsConfig;
use clap::Parser;
use reqwest::Url;

/// Sync recent bank transactions into Firefly III
#[derive(Parser)]
#[command(name = "fints-firefly-sync")]
#[command(about = "Sync recent FinTS bank transactions into Firefly III", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Number of days to look back
    #[arg(
        short,
        long,
        default_value_t = 7,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub days: u32,

    /// Firefly III base URL
    #[arg(long, env = "FIREFLY_URL")]
    pub firefly_url: String,

    /// Firefly III personal access token
    #[arg(long, env = "FIREFLY_ACCESS_TOKEN", hide_env_values = true)]
    pub firefly_access_token: String,

    /// Bank code (BLZ)
    #[arg(long, env = "FINTS_BLZ")]
    pub fints_blz: String,

    /// Online banking user id
    #[arg(long, env = "FINTS_USER")]
    pub fints_user: String,

    /// Customer id, if it differs from the user id
    #[arg(long, env = "FINTS_CUSTOMER_ID")]
    pub fints_customer_id: Option<String>,

    /// Online banking PIN; prompted for when not given
    #[arg(long, env = "FINTS_PIN", hide_env_values = true)]
    pub fints_pin: Option<String>,

    /// FinTS PIN/TAN endpoint of the bank
    #[arg(long, env = "FINTS_URL")]
    pub fints_url: String,

    /// Registered FinTS product id
    #[arg(long, env = "FINTS_PRODUCT_ID")]
    pub fints_product_id: String,

    /// Product version sent to the bank
    #[arg(long, env = "FINTS_PRODUCT_VERSION", default_value = env!("CARGO_PKG_VERSION"))]
    pub fints_product_version: String,

    /// Security function of the TAN mechanism to use, e.g. 942
    #[arg(long, env = "FINTS_TAN_MECHANISM")]
    pub fints_tan_mechanism: Option<String>,

    /// TAN medium (e.g. phone name) for mechanisms that require one; listed and asked for otherwise
    #[arg(long, env = "FINTS_TAN_MEDIUM")]
    pub fints_tan_medium: Option<String>,
}

/// Connection settings for the ledger.
#[derive(Clone)]
pub struct LedgerConfig {
    pub url: Url,
    pub access_token: String,
}

/// Error types for configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid URL in {name} '{value}': {source}")]
    InvalidUrl {
        name: &'static str,
        value: String,
        #[source]
        source: url::ParseError,
    },

    #[error("{0} must not be empty")]
    Empty(&'static str),
}

impl Cli {
    pub fn ledger_config(&self) -> Result<LedgerConfig, ConfigError> {
        Ok(LedgerConfig {
            url: parse_url("FIREFLY_URL", &self.firefly_url)?,
            access_token: required("FIREFLY_ACCESS_TOKEN", &self.firefly_access_token)?,
        })
    }

    pub fn bank_config(&self) -> Result<FinTsConfig, ConfigError> {
        let user_id = required("FINTS_USER", &self.fints_user)?;
        let customer_id = match self.fints_customer_id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => user_id.clone(),
        };

        Ok(FinTsConfig {
            url: parse_url("FINTS_URL", &self.fints_url)?,
            bank_code: required("FINTS_BLZ", &self.fints_blz)?,
            user_id,
            customer_id,
            pin: self.fints_pin.clone().filter(|pin| !pin.is_empty()),
            product_id: required("FINTS_PRODUCT_ID", &self.fints_product_id)?,
            product_version: required("FINTS_PRODUCT_VERSION", &self.fints_product_version)?,
            tan_mechanism: optional(self.fints_tan_mechanism.as_deref()),
            tan_medium: optional(self.fints_tan_medium.as_deref()),
        })
    }
}

fn optional(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn required(name: &'static str, value: &str) -> Result<String, ConfigError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ConfigError::Empty(name));
    }
    Ok(value.to_string())
}

fn parse_url(name: &'static str, value: &str) -> Result<Url, ConfigError> {
    Url::parse(required(name, value)?.as_str()).map_err(|source| ConfigError::InvalidUrl {
        name,
        value: value.to_string(),
        source,
    })
}

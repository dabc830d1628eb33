//! Runtime configuration, read from a TOML file.

use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs};
use thiserror::Error;
use tracing::debug;

use crate::Amount;
use crate::ledger::LedgerPolicy;
use crate::memory::SimulatedResolver;
use crate::model::{UserProfile, Utility};

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "VEND_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VendConfig {
    pub purchase: PurchaseConfig,
    pub wallet: WalletConfig,
    pub payment: PaymentConfig,
    pub timeouts: TimeoutConfig,
    pub utilities: Vec<Utility>,
    pub users: Vec<UserProfile>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PurchaseConfig {
    /// Smallest token purchase.
    #[serde(deserialize_with = "naira")]
    pub minimum: Amount,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WalletConfig {
    #[serde(deserialize_with = "naira")]
    pub opening_balance: Amount,
    #[serde(deserialize_with = "naira")]
    pub minimum_top_up: Amount,
    #[serde(deserialize_with = "naira")]
    pub low_balance_threshold: Amount,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PaymentConfig {
    /// Share of simulated payments that are approved.
    pub success_rate: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub store_ms: u64,
    pub payment_ms: u64,
    pub notify_ms: u64,
}

impl Default for VendConfig {
    fn default() -> Self {
        Self {
            purchase: PurchaseConfig::default(),
            wallet: WalletConfig::default(),
            payment: PaymentConfig::default(),
            timeouts: TimeoutConfig::default(),
            utilities: default_utilities(),
            users: Vec::new(),
        }
    }
}

impl Default for PurchaseConfig {
    fn default() -> Self {
        Self {
            minimum: Amount::from_naira(500),
        }
    }
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            opening_balance: Amount::ZERO,
            minimum_top_up: Amount::from_naira(1_000),
            low_balance_threshold: Amount::from_naira(1_000),
        }
    }
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            success_rate: SimulatedResolver::DEFAULT_SUCCESS_RATE,
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            store_ms: 5_000,
            payment_ms: 10_000,
            notify_ms: 3_000,
        }
    }
}

/// Naira written as a TOML number, converted to kobo.
fn naira<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Amount, D::Error> {
    let value = f64::deserialize(deserializer)?;
    Amount::from_float(value)
        .ok_or_else(|| serde::de::Error::custom(format!("{value} is not a representable amount")))
}

fn default_utilities() -> Vec<Utility> {
    [
        ("aedc", "Abuja Electricity Distribution Company"),
        ("bedc", "Benin Electricity Distribution Company"),
        ("eedc", "Enugu Electricity Distribution Company"),
        ("ekedc", "Eko Electricity Distribution Company"),
        ("ibedc", "Ibadan Electricity Distribution Company"),
        ("ikedc", "Ikeja Electric"),
        ("jed", "Jos Electricity Distribution"),
        ("kaedco", "Kaduna Electric"),
        ("kedco", "Kano Electricity Distribution Company"),
        ("phed", "Port Harcourt Electricity Distribution Company"),
        ("yedc", "Yola Electricity Distribution Company"),
    ]
    .into_iter()
    .map(|(id, name)| Utility {
        id: id.to_string(),
        name: name.to_string(),
    })
    .collect()
}

impl VendConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml(contents: &str, path: &Path) -> Result<Self, ConfigError> {
        let config: VendConfig = toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.purchase.minimum.is_positive() {
            return Err(ConfigError::Invalid(format!(
                "purchase.minimum must be positive, got {}",
                self.purchase.minimum
            )));
        }
        if !(0.0..=1.0).contains(&self.payment.success_rate) {
            return Err(ConfigError::Invalid(format!(
                "payment.success_rate must be within 0..=1, got {}",
                self.payment.success_rate
            )));
        }
        if self.wallet.opening_balance < Amount::ZERO {
            return Err(ConfigError::Invalid(
                "wallet.opening_balance cannot be negative".to_string(),
            ));
        }
        let t = &self.timeouts;
        if t.store_ms == 0 || t.payment_ms == 0 || t.notify_ms == 0 {
            return Err(ConfigError::Invalid(
                "timeouts must be non-zero".to_string(),
            ));
        }
        if self.utilities.is_empty() {
            return Err(ConfigError::Invalid("no utilities configured".to_string()));
        }
        Ok(())
    }

    pub fn ledger_policy(&self) -> LedgerPolicy {
        LedgerPolicy {
            minimum: self.purchase.minimum,
            store_timeout: Duration::from_millis(self.timeouts.store_ms),
            payment_timeout: Duration::from_millis(self.timeouts.payment_ms),
            notify_timeout: Duration::from_millis(self.timeouts.notify_ms),
        }
    }
}

/// Load configuration from `path`.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<VendConfig, ConfigError> {
    let path = path.as_ref();
    debug!(?path, "loading configuration");
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    VendConfig::from_toml(&contents, path)
}

/// Load from the file named by `VEND_CONFIG`, or fall back to defaults.
pub fn load_from_env() -> Result<VendConfig, ConfigError> {
    match env::var_os(CONFIG_ENV) {
        Some(path) => load_config(path),
        None => {
            debug!("{CONFIG_ENV} not set, using default configuration");
            Ok(VendConfig::default())
        }
    }
}

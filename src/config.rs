/// Runtime configuration for PaperBot
///
/// Loaded from `config.json` at startup; every section has defaults so a
/// missing file yields a working simulator. Access goes through `with_config`
/// so callers never hold the lock across await points.
use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::RwLock;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub fees: FeeConfig,
    #[serde(default)]
    pub monkey: MonkeyConfig,
    #[serde(default)]
    pub pending: PendingConfig,
    #[serde(default)]
    pub data: DataConfig,
}

/// Fee and tax rates applied by the settlement engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeeConfig {
    /// Brokerage fee rate per side
    pub fee_rate: f64,
    /// Securities transaction tax rate (sell side)
    pub tax_rate: f64,
    /// Minimum fee charged when the computed fee falls below it
    pub minimum_fee: f64,
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self {
            fee_rate: 0.001425,
            tax_rate: 0.003,
            minimum_fee: 20.0,
        }
    }
}

/// Policy for the monkey auto-trader
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonkeyConfig {
    /// One monkey run per calendar day when enabled
    pub cooldown_enabled: bool,
    /// Lower bound of the random buy budget
    pub min_amount: i64,
    /// Upper bound of the random buy budget
    pub max_amount: i64,
}

impl Default for MonkeyConfig {
    fn default() -> Self {
        Self {
            cooldown_enabled: false,
            min_amount: 5_000,
            max_amount: 100_000,
        }
    }
}

/// Interactive trade flow timeouts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingConfig {
    /// Seconds a user has to answer an AwaitingSellPrice prompt
    pub sell_price_timeout_secs: u64,
    /// Seconds a user has to answer a random-trade proposal
    pub confirmation_timeout_secs: u64,
}

impl Default for PendingConfig {
    fn default() -> Self {
        Self {
            sell_price_timeout_secs: 120,
            confirmation_timeout_secs: 120,
        }
    }
}

/// Data directory layout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Directory holding per-user ledger CSV files
    pub ledger_dir: String,
    /// Directory monthly archives are moved into
    pub archive_dir: String,
    /// Listed-stocks catalog CSV (code,name per row)
    pub catalog_path: String,
    /// Quote table CSV (code,price per row), re-read on every lookup
    pub quotes_path: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            ledger_dir: "data/ledgers".to_string(),
            archive_dir: "data/archive".to_string(),
            catalog_path: "data/stocks.csv".to_string(),
            quotes_path: "data/quotes.csv".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fees: FeeConfig::default(),
            monkey: MonkeyConfig::default(),
            pending: PendingConfig::default(),
            data: DataConfig::default(),
        }
    }
}

static CONFIG: Lazy<RwLock<Config>> = Lazy::new(|| RwLock::new(Config::default()));

/// Read the config file and install it globally
///
/// A missing file is not an error; defaults are kept and a fresh file can be
/// written later with `save_config`.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<()> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(());
    }

    let data = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let config: Config = serde_json::from_str(&data)
        .with_context(|| format!("failed to parse config file {}", path.display()))?;

    if let Ok(mut slot) = CONFIG.write() {
        *slot = config;
    }
    Ok(())
}

/// Persist the current config as pretty JSON
pub fn save_config<P: AsRef<Path>>(path: P) -> Result<()> {
    let config = with_config(|c| c.clone());
    let data = serde_json::to_string_pretty(&config)?;
    fs::write(path.as_ref(), data)
        .with_context(|| format!("failed to write config file {}", path.as_ref().display()))?;
    Ok(())
}

/// Run a closure against the current config
pub fn with_config<T>(f: impl FnOnce(&Config) -> T) -> T {
    match CONFIG.read() {
        Ok(config) => f(&config),
        Err(poisoned) => f(&poisoned.into_inner()),
    }
}

/// Mutate the config in place (tests and runtime toggles)
pub fn update_config(f: impl FnOnce(&mut Config)) {
    match CONFIG.write() {
        Ok(mut config) => f(&mut config),
        Err(poisoned) => f(&mut poisoned.into_inner()),
    }
}

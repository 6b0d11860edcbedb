use serde::{Deserialize, Serialize};
use std::{
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
};

use crate::{
    currency::CurrencyCode,
    errors::{LedgerError, Result},
    ledger::{Ledger, TripId, UnsplitPolicy},
    settlement::{SettlementPlanner, DEFAULT_TOLERANCE_MINOR},
    utils::app_data_dir,
};

const CONFIG_FILE: &str = "config.json";
const TMP_SUFFIX: &str = "tmp";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default = "Config::default_currency_value")]
    pub default_currency: String,
    #[serde(default)]
    pub unsplit_policy: UnsplitPolicy,
    #[serde(default = "Config::default_tolerance_value")]
    pub tolerance_minor_units: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_filter: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_currency: Self::default_currency_value(),
            unsplit_policy: UnsplitPolicy::default(),
            tolerance_minor_units: Self::default_tolerance_value(),
            log_filter: None,
        }
    }
}

impl Config {
    pub fn default_currency_value() -> String {
        "USD".into()
    }

    pub fn default_tolerance_value() -> i64 {
        DEFAULT_TOLERANCE_MINOR
    }

    pub fn currency(&self) -> CurrencyCode {
        CurrencyCode::new(&self.default_currency)
    }

    pub fn planner(&self) -> SettlementPlanner {
        SettlementPlanner::with_tolerance(self.tolerance_minor_units)
    }

    /// An empty ledger carrying the configured unsplit policy and default currency.
    pub fn ledger(&self, trip_id: impl Into<TripId>) -> Ledger {
        Ledger::new(trip_id)
            .with_policy(self.unsplit_policy)
            .with_default_currency(self.currency())
    }

    /// Filter directive for [`crate::init_with`]; `RUST_LOG` still takes precedence.
    pub fn log_directive(&self) -> Option<&str> {
        self.log_filter
            .as_deref()
            .map(str::trim)
            .filter(|directive| !directive.is_empty())
    }

    pub fn validate(&self) -> Result<()> {
        if !self.currency().is_well_formed() {
            return Err(LedgerError::Config(format!(
                "default currency `{}` is not a three-letter code",
                self.default_currency
            )));
        }
        if self.tolerance_minor_units < 1 {
            return Err(LedgerError::Config(format!(
                "tolerance must be at least one minor unit, got {}",
                self.tolerance_minor_units
            )));
        }
        Ok(())
    }
}

pub struct ConfigManager {
    path: PathBuf,
}

impl ConfigManager {
    pub fn new() -> Result<Self> {
        Self::with_base_dir(app_data_dir())
    }

    pub fn with_base_dir(base: PathBuf) -> Result<Self> {
        fs::create_dir_all(&base)?;
        Ok(Self {
            path: base.join(CONFIG_FILE),
        })
    }

    /// Missing file means defaults; a present file must parse and validate.
    pub fn load(&self) -> Result<Config> {
        if !self.path.exists() {
            return Ok(Config::default());
        }
        let data = fs::read_to_string(&self.path)?;
        let config: Config = serde_json::from_str(&data)?;
        config.validate()?;
        tracing::debug!(path = %self.path.display(), "configuration loaded");
        Ok(config)
    }

    pub fn save(&self, config: &Config) -> Result<()> {
        config.validate()?;
        let json = serde_json::to_string_pretty(config)?;
        let tmp = tmp_path(&self.path);
        write_atomic(&tmp, &json)?;
        fs::rename(&tmp, &self.path)?;
        tracing::info!(path = %self.path.display(), "configuration saved");
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = path.to_path_buf();
    let ext = match path.extension().and_then(|ext| ext.to_str()) {
        Some(existing) => format!("{}.{}", existing, TMP_SUFFIX),
        None => TMP_SUFFIX.to_string(),
    };
    tmp.set_extension(ext);
    tmp
}

fn write_atomic(path: &Path, data: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = File::create(path)?;
    file.write_all(data.as_bytes())?;
    file.flush()?;
    Ok(())
}

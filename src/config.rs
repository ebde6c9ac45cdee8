// src/config.rs
//
// Configuration file parsing for the market finder.
// Supports TOML config files that set the discovery parameters, the reference
// data locations and the Comtrade connection.

use crate::connectors::comtrade::{DEFAULT_COMTRADE_URL, DEFAULT_MAX_RECORDS};
use crate::connectors::retry::DEFAULT_BACKOFF_SECS;
use crate::error::{FinderError, FinderResult};
use crate::models::{CommodityCode, Year};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

// =============================================================================
// Configuration Types
// =============================================================================

/// Root configuration structure.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Global settings
    #[serde(default)]
    pub global: GlobalConfig,
    /// Discovery parameters
    #[serde(default)]
    pub finder: FinderSettings,
    /// Reference data files
    #[serde(default)]
    pub data: DataConfig,
    /// Comtrade API connection
    #[serde(default)]
    pub comtrade: ComtradeConfig,
}

/// Global configuration settings.
#[derive(Debug, Default, Deserialize)]
pub struct GlobalConfig {
    /// Log level used when RUST_LOG is not set
    pub log_level: Option<String>,
}

/// Parameters of the market discovery itself.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct FinderSettings {
    /// Name of the market the expansion starts from
    pub seed_market: String,
    /// HS commodity codes whose imports are summed
    pub commodity_codes: Vec<CommodityCode>,
    /// Share of reference production a partner must exceed to count as a market
    pub t_market: f64,
    /// Fraction of analysed years a market must recur in to be kept
    pub t_year: f64,
    /// Year used for single-year runs
    pub year: Year,
    /// Years used for multi-year runs
    pub years: Vec<Year>,
    /// Safety bound on expansion rounds per year (seed round included)
    pub max_rounds: usize,
}

impl Default for FinderSettings {
    fn default() -> Self {
        Self {
            seed_market: "Belgium".to_string(),
            commodity_codes: vec![252329, 252321],
            t_market: 0.05,
            t_year: 0.5,
            year: 2003,
            years: (2003..=2013).collect(),
            max_rounds: 50,
        }
    }
}

impl FinderSettings {
    /// Rejects settings the expansion cannot run with.
    pub fn validate(&self) -> FinderResult<()> {
        validate_fraction("t_market", self.t_market)?;
        validate_fraction("t_year", self.t_year)?;
        if self.seed_market.trim().is_empty() {
            return Err(FinderError::InvalidSettings("seed_market is empty".to_string()));
        }
        if self.commodity_codes.is_empty() {
            return Err(FinderError::InvalidSettings("commodity_codes is empty".to_string()));
        }
        if self.max_rounds == 0 {
            return Err(FinderError::InvalidSettings("max_rounds must be at least 1".to_string()));
        }
        if self.years.is_empty() {
            return Err(FinderError::NoYears);
        }
        Ok(())
    }
}

/// Checks that a threshold lies in (0, 1].
pub fn validate_fraction(name: &'static str, value: f64) -> FinderResult<()> {
    if value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(FinderError::InvalidThreshold { name, value })
    }
}

/// Locations of the static reference data.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Wide CSV: `Comtrade_No` plus one column per year
    pub production_path: PathBuf,
    /// Comtrade partnerAreas.json
    pub codes_path: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            production_path: PathBuf::from("assets/Cement_Production_data.csv"),
            codes_path: PathBuf::from("assets/partnerAreas.json"),
        }
    }
}

/// Comtrade API connection settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ComtradeConfig {
    pub base_url: String,
    pub max_records: u32,
    /// Wait before each retry of a transient failure, in seconds
    pub backoff_secs: Vec<u64>,
    pub request_timeout_secs: u64,
}

impl Default for ComtradeConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_COMTRADE_URL.to_string(),
            max_records: DEFAULT_MAX_RECORDS,
            backoff_secs: DEFAULT_BACKOFF_SECS.to_vec(),
            request_timeout_secs: 60,
        }
    }
}

impl ComtradeConfig {
    pub fn backoff_schedule(&self) -> Vec<Duration> {
        self.backoff_secs.iter().map(|&s| Duration::from_secs(s)).collect()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

// =============================================================================
// Configuration Loading
// =============================================================================

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let contents = fs::read_to_string(&path)
            .map_err(|e| format!("Failed to read config file: {}", e))?;
        Self::from_str(&contents)
    }

    /// Parse configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self, String> {
        toml::from_str(s).map_err(|e| format!("Failed to parse config: {}", e))
    }
}

/// Parses a year list such as `2003-2013`, `2003,2005,2007` or `2003-2005,2010`.
pub fn parse_years(s: &str) -> Result<Vec<Year>, String> {
    let mut years = Vec::new();
    for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        match part.split_once('-') {
            Some((from, to)) => {
                let from: Year = parse_year(from)?;
                let to: Year = parse_year(to)?;
                if from > to {
                    return Err(format!("Empty year range: {}", part));
                }
                years.extend(from..=to);
            }
            None => years.push(parse_year(part)?),
        }
    }
    if years.is_empty() {
        return Err("No years given".to_string());
    }
    Ok(years)
}

fn parse_year(s: &str) -> Result<Year, String> {
    s.trim()
        .parse()
        .map_err(|_| format!("Invalid year: {}", s.trim()))
}

/// Parses a comma-separated commodity code list such as `252329,252321`.
pub fn parse_commodities(s: &str) -> Result<Vec<CommodityCode>, String> {
    s.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| p.parse().map_err(|_| format!("Invalid commodity code: {}", p)))
        .collect()
}

// =============================================================================
// Default Configuration
// =============================================================================

/// Returns a default configuration string for documentation.
pub fn default_config_template() -> &'static str {
    r#"# Market Finder Configuration
#
# Starting from a seed market, discovers the countries whose imports of a
# commodity exceed a share of the reference production, year by year, and
# keeps those that recur in enough years.

[global]
# Log level when RUST_LOG is not set (error, warn, info, debug, trace)
log_level = "info"

[finder]
seed_market = "Belgium"
# HS codes: 252329 portland cement, 252321 white cement
commodity_codes = [252329, 252321]
# A partner is a market when its imports exceed this share of reference production
t_market = 0.05
# A market is kept when it recurs in at least this fraction of the years
t_year = 0.5
# Single-year runs
year = 2003
# Multi-year runs
years = [2003, 2004, 2005, 2006, 2007, 2008, 2009, 2010, 2011, 2012, 2013]
# Safety bound on expansion rounds per year
max_rounds = 50

[data]
production_path = "assets/Cement_Production_data.csv"
codes_path = "assets/partnerAreas.json"

[comtrade]
base_url = "http://comtrade.un.org/api/get"
max_records = 50000
# Wait before each retry of a transient failure (seconds)
backoff_secs = [5, 10, 20, 20]
request_timeout_secs = 60
"#
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic_config() {
        let config_str = r#"
            [finder]
            seed_market = "Netherlands"
            t_market = 0.1
            years = [2005, 2006]

            [comtrade]
            backoff_secs = [1, 2]
        "#;

        let config = Config::from_str(config_str).unwrap();
        assert_eq!(config.finder.seed_market, "Netherlands");
        assert_eq!(config.finder.t_market, 0.1);
        assert_eq!(config.finder.years, vec![2005, 2006]);
        // Unset fields keep their defaults
        assert_eq!(config.finder.t_year, 0.5);
        assert_eq!(config.finder.commodity_codes, vec![252329, 252321]);
        assert_eq!(config.comtrade.backoff_schedule(), vec![Duration::from_secs(1), Duration::from_secs(2)]);
        assert_eq!(config.comtrade.max_records, 50_000);
    }

    #[test]
    fn test_empty_config_is_all_defaults() {
        let config = Config::from_str("").unwrap();
        assert_eq!(config.finder, FinderSettings::default());
        assert_eq!(config.finder.max_rounds, 50);
        assert_eq!(config.finder.years.len(), 11);
        assert!(config.finder.validate().is_ok());
    }

    #[test]
    fn test_default_template_parses() {
        let config = Config::from_str(default_config_template()).unwrap();
        assert_eq!(config.finder, FinderSettings::default());
        assert_eq!(config.global.log_level.as_deref(), Some("info"));
        assert_eq!(config.comtrade.backoff_secs, vec![5, 10, 20, 20]);
    }

    #[test]
    fn test_validate_rejects_bad_thresholds() {
        let mut settings = FinderSettings::default();
        settings.t_market = 0.0;
        assert!(matches!(
            settings.validate(),
            Err(FinderError::InvalidThreshold { name: "t_market", .. })
        ));

        let mut settings = FinderSettings::default();
        settings.t_year = 1.5;
        assert!(matches!(
            settings.validate(),
            Err(FinderError::InvalidThreshold { name: "t_year", .. })
        ));

        assert!(validate_fraction("t", 1.0).is_ok());
        assert!(validate_fraction("t", f64::NAN).is_err());
    }

    #[test]
    fn test_validate_rejects_empty_lists() {
        let mut settings = FinderSettings::default();
        settings.years.clear();
        assert_eq!(settings.validate(), Err(FinderError::NoYears));

        let mut settings = FinderSettings::default();
        settings.commodity_codes.clear();
        assert!(matches!(settings.validate(), Err(FinderError::InvalidSettings(_))));
    }

    #[test]
    fn test_parse_years() {
        assert_eq!(parse_years("2003-2005").unwrap(), vec![2003, 2004, 2005]);
        assert_eq!(parse_years("2003, 2007").unwrap(), vec![2003, 2007]);
        assert_eq!(parse_years("2003-2004,2010").unwrap(), vec![2003, 2004, 2010]);
        assert!(parse_years("2005-2003").is_err());
        assert!(parse_years("abc").is_err());
        assert!(parse_years("").is_err());
    }

    #[test]
    fn test_parse_commodities() {
        assert_eq!(parse_commodities("252329,252321").unwrap(), vec![252329, 252321]);
        assert!(parse_commodities("25x").is_err());
    }
}

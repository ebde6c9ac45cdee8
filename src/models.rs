// src/models.rs

use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Identifiers
// =============================================================================

/// Numeric trade-area code (Comtrade "reporter" / "partner" id).
///
/// # Examples
/// ```
/// use market_finder::models::CountryCode;
///
/// let belgium = CountryCode(56);
/// assert_eq!(belgium.to_string(), "56");
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CountryCode(pub u32);

impl CountryCode {
    /// Code Comtrade uses for the "World" aggregate partner.
    pub const WORLD: CountryCode = CountryCode(0);
}

impl fmt::Display for CountryCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Calendar year of a trade or production record.
pub type Year = u16;

/// HS commodity code (e.g. 252329 for portland cement).
pub type CommodityCode = u32;

/// ISO code Comtrade uses for the world aggregate partner row.
pub const WORLD_ISO: &str = "WLD";

// =============================================================================
// Trade Flows
// =============================================================================

/// One import row: `reporter` imported `net_weight_kg` of `commodity` from `partner`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeFlowRecord {
    pub year: Year,
    pub reporter: CountryCode,
    pub partner: CountryCode,
    pub partner_iso: String,
    pub partner_name: String,
    pub commodity: CommodityCode,
    pub net_weight_kg: f64,
    pub trade_value_usd: Option<f64>,
}

impl TradeFlowRecord {
    /// True for the "World" row Comtrade adds as a total over all partners.
    pub fn is_world_aggregate(&self) -> bool {
        self.partner == CountryCode::WORLD || self.partner_iso == WORLD_ISO
    }

    /// True when a country reports imports from itself (re-imports).
    pub fn is_self_trade(&self) -> bool {
        self.partner == self.reporter
    }
}

/// Aggregated imports from one partner, with its share of the reference production.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartnerShare {
    pub partner: CountryCode,
    pub partner_iso: String,
    pub partner_name: String,
    pub net_weight_kg: f64,
    /// `None` when the reference production was zero (share undefined).
    pub share: Option<f64>,
}

// --- Raw Comtrade CSV rows (Used for parsing only) ---
#[derive(Debug, Deserialize, Clone)]
pub struct ComtradeRow {
    #[serde(rename = "Year")]
    pub year: Year,
    #[serde(rename = "Trade Flow", default)]
    pub trade_flow: Option<String>,
    #[serde(rename = "Reporter Code")]
    pub reporter_code: u32,
    #[serde(rename = "Reporter", default)]
    pub reporter: Option<String>,
    #[serde(rename = "Reporter ISO", default)]
    pub reporter_iso: Option<String>,
    #[serde(rename = "Partner Code")]
    pub partner_code: u32,
    #[serde(rename = "Partner", default)]
    pub partner: Option<String>,
    #[serde(rename = "Partner ISO", default)]
    pub partner_iso: Option<String>,
    #[serde(rename = "Commodity Code")]
    pub commodity_code: CommodityCode,
    #[serde(rename = "Commodity", default)]
    pub commodity: Option<String>,
    #[serde(rename = "Netweight (kg)", alias = "Net Weight (kg)", default)]
    pub net_weight_kg: Option<f64>,
    #[serde(rename = "Trade Value (US$)", default)]
    pub trade_value_usd: Option<f64>,
}

impl From<ComtradeRow> for TradeFlowRecord {
    fn from(row: ComtradeRow) -> Self {
        Self {
            year: row.year,
            reporter: CountryCode(row.reporter_code),
            partner: CountryCode(row.partner_code),
            partner_iso: row.partner_iso.unwrap_or_default(),
            partner_name: row.partner.unwrap_or_default(),
            commodity: row.commodity_code,
            // Blank weights are skipped by the aggregate sum, i.e. count as zero
            net_weight_kg: row.net_weight_kg.unwrap_or(0.0),
            trade_value_usd: row.trade_value_usd,
        }
    }
}

// =============================================================================
// Results
// =============================================================================

/// How a single-year expansion stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// The frontier emptied: no round admitted a new market.
    Converged,
    /// The round cap was hit with markets still waiting to be checked.
    RoundCapReached,
}

/// What one expansion round queried and admitted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoundSummary {
    pub round: usize,
    pub reference_production: f64,
    pub checked: Vec<CountryCode>,
    pub admitted: Vec<CountryCode>,
}

/// Markets discovered for one year, in admission order (seed first).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearlyResult {
    pub year: Year,
    pub markets: Vec<CountryCode>,
    pub names: Vec<String>,
    pub rounds: Vec<RoundSummary>,
    pub termination: Termination,
}

impl YearlyResult {
    pub fn converged(&self) -> bool {
        self.termination == Termination::Converged
    }
}

impl AsRef<[String]> for YearlyResult {
    fn as_ref(&self) -> &[String] {
        &self.names
    }
}

/// Number of analysed years in which a market name was discovered.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecurrenceCount {
    pub name: String,
    pub count: usize,
    pub kept: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(partner_code: u32, partner_iso: &str, weight: Option<f64>) -> ComtradeRow {
        ComtradeRow {
            year: 2005,
            trade_flow: Some("Import".to_string()),
            reporter_code: 56,
            reporter: Some("Belgium".to_string()),
            reporter_iso: Some("BEL".to_string()),
            partner_code,
            partner: Some("Somewhere".to_string()),
            partner_iso: Some(partner_iso.to_string()),
            commodity_code: 252329,
            commodity: None,
            net_weight_kg: weight,
            trade_value_usd: None,
        }
    }

    #[test]
    fn test_world_rows_detected_by_code_or_iso() {
        let by_code: TradeFlowRecord = row(0, "", Some(1.0)).into();
        let by_iso: TradeFlowRecord = row(999, WORLD_ISO, Some(1.0)).into();
        let regular: TradeFlowRecord = row(251, "FRA", Some(1.0)).into();
        assert!(by_code.is_world_aggregate());
        assert!(by_iso.is_world_aggregate());
        assert!(!regular.is_world_aggregate());
    }

    #[test]
    fn test_blank_weight_counts_as_zero() {
        let record: TradeFlowRecord = row(251, "FRA", None).into();
        assert_eq!(record.net_weight_kg, 0.0);
    }

    #[test]
    fn test_self_trade() {
        let record: TradeFlowRecord = row(56, "BEL", Some(3.0)).into();
        assert!(record.is_self_trade());
    }
}

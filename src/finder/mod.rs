// src/finder/mod.rs
//
// Market discovery: the share test, the single-year expansion, and the
// multi-year recurrence filter built on top of them.

pub mod expander;
pub mod persistence;
pub mod share;

pub use expander::{ExpansionState, MarketExpander};
pub use persistence::{recurring_markets, PersistenceReport};
pub use share::{partner_shares, ShareTable};

use crate::config::validate_fraction;
use crate::error::{FinderError, FinderResult};
use crate::models::{Year, YearlyResult};
use log::info;
use serde::Serialize;
use std::collections::BTreeMap;

/// Everything one multi-year run produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MultiYearReport {
    pub seed_market: String,
    pub t_market: f64,
    pub t_year: f64,
    pub yearly: BTreeMap<Year, YearlyResult>,
    pub persistence: PersistenceReport,
}

impl MultiYearReport {
    /// Years whose expansion stopped at the round cap instead of converging.
    pub fn unconverged_years(&self) -> Vec<Year> {
        self.yearly
            .values()
            .filter(|r| !r.converged())
            .map(|r| r.year)
            .collect()
    }
}

/// Runs the expansion year by year and keeps the markets that recur.
pub struct MarketFinder {
    expander: MarketExpander,
}

impl MarketFinder {
    pub fn new(expander: MarketExpander) -> Self {
        Self { expander }
    }

    pub fn expander(&self) -> &MarketExpander {
        &self.expander
    }

    /// Single-year discovery, defaulting to the configured year and threshold.
    pub async fn find_markets(&self, year: Option<Year>, t_market: Option<f64>) -> FinderResult<YearlyResult> {
        let year = year.unwrap_or(self.expander.settings().year);
        self.expander.find_markets(year, t_market).await
    }

    /// Runs every year strictly in order, then applies the recurrence filter.
    ///
    /// The first failing year aborts the run; years already computed are
    /// discarded with it.
    pub async fn multi_year_markets(
        &self,
        years: Option<&[Year]>,
        t_market: Option<f64>,
        t_year: Option<f64>,
    ) -> FinderResult<MultiYearReport> {
        let settings = self.expander.settings();
        let years = years.unwrap_or(settings.years.as_slice());
        let t_market = t_market.unwrap_or(settings.t_market);
        let t_year = t_year.unwrap_or(settings.t_year);

        let (first, last) = match (years.first(), years.last()) {
            (Some(first), Some(last)) => (*first, *last),
            _ => return Err(FinderError::NoYears),
        };
        validate_fraction("t_market", t_market)?;
        validate_fraction("t_year", t_year)?;

        info!(
            "Finding markets for {}, for {} to {} (inclusive). tMarket = {}%, tYear = {}%",
            settings.seed_market,
            first,
            last,
            t_market * 100.0,
            t_year * 100.0
        );

        let mut yearly = BTreeMap::new();
        for &year in years {
            let result = self.expander.find_markets(year, Some(t_market)).await?;
            yearly.insert(year, result);
        }

        let persistence = recurring_markets(&yearly, t_year)?;

        Ok(MultiYearReport {
            seed_market: settings.seed_market.clone(),
            t_market,
            t_year,
            yearly,
            persistence,
        })
    }
}

// src/finder/expander.rs
//
// Single-year market discovery: a breadth-first fixed-point expansion over
// trade partners, starting from the seed market.

use super::share::partner_shares;
use crate::catalog::{CodeDirectory, ProductionTable};
use crate::config::{validate_fraction, FinderSettings};
use crate::error::FinderResult;
use crate::models::{CountryCode, RoundSummary, Termination, Year, YearlyResult};
use crate::traits::SharedTradeFlowSource;
use log::info;
use std::collections::HashSet;
use std::sync::Arc;

// =============================================================================
// Expansion State
// =============================================================================

/// State of one year's expansion between rounds.
///
/// `found` is an arena of admitted codes in admission order, with a set index
/// for membership. `checked` holds codes whose imports were already queried;
/// they are never queried again. `frontier` holds the codes admitted by the
/// last round, waiting to be queried.
#[derive(Debug, Clone)]
pub struct ExpansionState {
    found: Vec<CountryCode>,
    admitted: HashSet<CountryCode>,
    checked: HashSet<CountryCode>,
    frontier: Vec<CountryCode>,
    round: usize,
    seed_production: f64,
    /// Running production of everything admitted after the seed.
    admitted_production: f64,
}

impl ExpansionState {
    pub fn new(seed: CountryCode, seed_production: f64) -> Self {
        Self {
            found: vec![seed],
            admitted: HashSet::from([seed]),
            checked: HashSet::new(),
            frontier: vec![seed],
            round: 0,
            seed_production,
            admitted_production: 0.0,
        }
    }

    /// Returns how the expansion ends if no further round should run.
    pub fn termination(&self, max_rounds: usize) -> Option<Termination> {
        if self.frontier.is_empty() {
            Some(Termination::Converged)
        } else if self.round >= max_rounds {
            Some(Termination::RoundCapReached)
        } else {
            None
        }
    }

    /// Denominator for the next round's share test.
    ///
    /// The seed round measures against the seed's own production. Every later
    /// round measures against the accumulated production of all markets
    /// admitted after the seed.
    pub fn reference_production(&self) -> f64 {
        if self.round == 0 {
            self.seed_production
        } else {
            self.admitted_production
        }
    }

    /// Starts a round: bumps the counter and hands out the frontier members
    /// that still need querying, marking them checked.
    pub fn begin_round(&mut self) -> Vec<CountryCode> {
        self.round += 1;
        let frontier = std::mem::take(&mut self.frontier);
        frontier
            .into_iter()
            .filter(|&code| self.checked.insert(code))
            .collect()
    }

    pub fn is_found(&self, code: CountryCode) -> bool {
        self.admitted.contains(&code)
    }

    /// Closes a round: appends `staged` to `found`, makes it the next frontier
    /// and adds its production to the running reference total.
    pub fn finish_round(&mut self, staged: Vec<CountryCode>, staged_production: f64) {
        for &code in &staged {
            if self.admitted.insert(code) {
                self.found.push(code);
            }
        }
        self.admitted_production += staged_production;
        self.frontier = staged;
    }

    pub fn found(&self) -> &[CountryCode] {
        &self.found
    }

    pub fn frontier(&self) -> &[CountryCode] {
        &self.frontier
    }

    pub fn round(&self) -> usize {
        self.round
    }

    pub fn into_found(self) -> Vec<CountryCode> {
        self.found
    }
}

// =============================================================================
// Market Expander
// =============================================================================

/// Runs the per-year expansion against a trade-flow source.
pub struct MarketExpander {
    directory: Arc<CodeDirectory>,
    production: Arc<ProductionTable>,
    source: SharedTradeFlowSource,
    settings: FinderSettings,
}

impl MarketExpander {
    pub fn new(
        directory: Arc<CodeDirectory>,
        production: Arc<ProductionTable>,
        source: SharedTradeFlowSource,
        settings: FinderSettings,
    ) -> FinderResult<Self> {
        settings.validate()?;
        // Fail at construction rather than at the first year
        directory.code_of(&settings.seed_market)?;
        Ok(Self {
            directory,
            production,
            source,
            settings,
        })
    }

    pub fn settings(&self) -> &FinderSettings {
        &self.settings
    }

    pub fn directory(&self) -> &CodeDirectory {
        &self.directory
    }

    /// Discovers the markets for `year`.
    ///
    /// `t_market` overrides the configured threshold for this call. Any fetch
    /// failure aborts the whole year: a missing market would skew the
    /// reference production of every later round.
    pub async fn find_markets(&self, year: Year, t_market: Option<f64>) -> FinderResult<YearlyResult> {
        let t_market = t_market.unwrap_or(self.settings.t_market);
        validate_fraction("t_market", t_market)?;

        let seed = self.directory.code_of(&self.settings.seed_market)?;
        let mut state = ExpansionState::new(seed, self.production.production_of(seed, year));
        let mut rounds = Vec::new();

        info!("{}", "=".repeat(100));
        info!("{}", year);

        let termination = loop {
            if let Some(termination) = state.termination(self.settings.max_rounds) {
                break termination;
            }
            rounds.push(self.run_round(&mut state, year, t_market).await?);
        };

        if termination == Termination::RoundCapReached {
            log::warn!(
                "{}: stopped after {} rounds with {} markets still unchecked",
                year,
                state.round(),
                state.frontier().len()
            );
        }

        let markets = state.into_found();
        let names = self.directory.names_of(&markets)?;
        Ok(YearlyResult {
            year,
            markets,
            names,
            rounds,
            termination,
        })
    }

    async fn run_round(
        &self,
        state: &mut ExpansionState,
        year: Year,
        t_market: f64,
    ) -> FinderResult<RoundSummary> {
        let reference = state.reference_production();
        let to_check = state.begin_round();

        let checking = self.directory.names_of(&to_check)?;
        info!("{}", "-".repeat(100));
        info!("Round {}... Checking {}", state.round(), checking.join(", "));
        info!("Reference market production = {}", reference);

        let mut staged: Vec<CountryCode> = Vec::new();
        for &code in &to_check {
            let flows = self
                .source
                .fetch_imports(code, year, &self.settings.commodity_codes)
                .await?;
            let table = partner_shares(&flows, reference, t_market);

            let to_add: Vec<CountryCode> = table
                .qualifying_codes()
                .filter(|&c| !state.is_found(c) && !staged.contains(&c))
                .collect();

            let via = self.directory.name_of(code)?;
            let added = self.directory.names_of(&to_add)?;
            if added.is_empty() {
                info!("No new markets from {}", via);
            } else {
                info!("Adding {} to markets (via {})", added.join(", "), via);
            }
            staged.extend(to_add);
        }

        let staged_production: f64 = staged
            .iter()
            .map(|&c| self.production.production_of(c, year))
            .sum();

        let summary = RoundSummary {
            round: state.round(),
            reference_production: reference,
            checked: to_check,
            admitted: staged.clone(),
        };
        state.finish_round(staged, staged_production);
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectors::ReplaySource;
    use crate::error::{FetchError, FinderError};
    use crate::models::{CommodityCode, TradeFlowRecord};
    use crate::traits::TradeFlowSource;
    use async_trait::async_trait;

    const YEAR: Year = 2005;
    const BEL: CountryCode = CountryCode(56);
    const FRA: CountryCode = CountryCode(251);
    const NLD: CountryCode = CountryCode(528);
    const DEU: CountryCode = CountryCode(276);
    const LUX: CountryCode = CountryCode(442);

    fn flow(reporter: CountryCode, partner: CountryCode, iso: &str, kg: f64) -> TradeFlowRecord {
        TradeFlowRecord {
            year: YEAR,
            reporter,
            partner,
            partner_iso: iso.to_string(),
            partner_name: iso.to_string(),
            commodity: 252329,
            net_weight_kg: kg,
            trade_value_usd: None,
        }
    }

    fn directory() -> Arc<CodeDirectory> {
        Arc::new(
            CodeDirectory::from_pairs(vec![
                ("Belgium", BEL),
                ("France", FRA),
                ("Netherlands", NLD),
                ("Germany", DEU),
                ("Luxembourg", LUX),
                ("World", CountryCode::WORLD),
            ])
            .unwrap(),
        )
    }

    fn production() -> Arc<ProductionTable> {
        Arc::new(
            ProductionTable::from_records(vec![
                (BEL, YEAR, 1000.0),
                (FRA, YEAR, 500.0),
                (NLD, YEAR, 300.0),
                (DEU, YEAR, 2000.0),
            ])
            .unwrap(),
        )
    }

    fn settings(t_market: f64) -> FinderSettings {
        FinderSettings {
            t_market,
            years: vec![YEAR],
            ..FinderSettings::default()
        }
    }

    fn expander(records: Vec<TradeFlowRecord>, t_market: f64) -> (MarketExpander, Arc<ReplaySource>) {
        let source = Arc::new(ReplaySource::new(records));
        let expander =
            MarketExpander::new(directory(), production(), source.clone(), settings(t_market)).unwrap();
        (expander, source)
    }

    /// Belgium imports from France (0.10) and Netherlands (0.02); France
    /// imports nothing that qualifies.
    fn belgium_scenario() -> Vec<TradeFlowRecord> {
        vec![
            flow(BEL, CountryCode::WORLD, "WLD", 120.0),
            flow(BEL, FRA, "FRA", 100.0),
            flow(BEL, NLD, "NLD", 20.0),
            flow(FRA, BEL, "BEL", 400.0),
            flow(FRA, LUX, "LUX", 1.0),
        ]
    }

    #[tokio::test]
    async fn test_seed_round_admits_only_partners_above_threshold() {
        let (expander, source) = expander(belgium_scenario(), 0.05);

        let result = expander.find_markets(YEAR, None).await.unwrap();

        assert_eq!(result.markets, vec![BEL, FRA]);
        assert_eq!(result.names, vec!["Belgium", "France"]);
        assert_eq!(result.termination, Termination::Converged);
        assert_eq!(source.calls().await, vec![(BEL, YEAR), (FRA, YEAR)]);
        assert_eq!(result.rounds.len(), 2);
        assert_eq!(result.rounds[0].reference_production, 1000.0);
        assert_eq!(result.rounds[1].reference_production, 500.0);
    }

    #[tokio::test]
    async fn test_reference_production_accumulates_after_seed() {
        // Round 1 (ref 1000): FRA and NLD admitted -> ref 800
        // Round 2 (ref 800): NLD imports 100 from DEU (0.125) -> ref 2800
        // Round 3 (ref 2800): DEU imports 200 from LUX (0.071)
        // Round 4 (ref 2800 + 0): LUX imports nothing
        let records = vec![
            flow(BEL, FRA, "FRA", 100.0),
            flow(BEL, NLD, "NLD", 60.0),
            flow(NLD, DEU, "DEU", 100.0),
            flow(DEU, LUX, "LUX", 200.0),
        ];
        let (expander, _) = expander(records, 0.05);

        let result = expander.find_markets(YEAR, None).await.unwrap();

        assert_eq!(result.markets, vec![BEL, FRA, NLD, DEU, LUX]);
        let refs: Vec<f64> = result.rounds.iter().map(|r| r.reference_production).collect();
        assert_eq!(refs, vec![1000.0, 800.0, 2800.0, 2800.0]);
        assert!(result.converged());
    }

    #[tokio::test]
    async fn test_partner_qualifying_twice_in_a_round_admitted_once() {
        let records = vec![
            flow(BEL, FRA, "FRA", 100.0),
            flow(BEL, NLD, "NLD", 100.0),
            flow(FRA, DEU, "DEU", 500.0),
            flow(NLD, DEU, "DEU", 500.0),
            // Back-edge to an already found market
            flow(NLD, BEL, "BEL", 500.0),
        ];
        let (expander, source) = expander(records, 0.05);

        let result = expander.find_markets(YEAR, None).await.unwrap();

        assert_eq!(result.markets, vec![BEL, FRA, NLD, DEU]);
        assert_eq!(result.rounds[1].admitted, vec![DEU]);
        // Every market queried exactly once
        let calls = source.calls().await;
        let unique: HashSet<_> = calls.iter().collect();
        assert_eq!(calls.len(), unique.len());
    }

    #[tokio::test]
    async fn test_zero_seed_production_admits_nothing() {
        let records = vec![flow(LUX, FRA, "FRA", 1e9)];
        let source = Arc::new(ReplaySource::new(records));
        let settings = FinderSettings {
            seed_market: "Luxembourg".to_string(),
            ..settings(0.05)
        };
        let expander = MarketExpander::new(directory(), production(), source, settings).unwrap();

        let result = expander.find_markets(YEAR, None).await.unwrap();

        assert_eq!(result.markets, vec![LUX]);
        assert!(result.converged());
    }

    #[tokio::test]
    async fn test_partners_without_production_leave_zero_reference() {
        // LUX has no production data, so round 2 measures against nothing
        let records = vec![
            flow(BEL, LUX, "LUX", 100.0),
            flow(LUX, FRA, "FRA", 1e9),
        ];
        let (expander, source) = expander(records, 0.05);

        let result = expander.find_markets(YEAR, None).await.unwrap();

        assert_eq!(result.markets, vec![BEL, LUX]);
        assert_eq!(result.rounds.len(), 2);
        assert_eq!(result.rounds[1].reference_production, 0.0);
        assert!(result.rounds[1].admitted.is_empty());
        assert!(result.converged());
        assert_eq!(source.calls().await, vec![(BEL, YEAR), (LUX, YEAR)]);
    }

    #[tokio::test]
    async fn test_round_cap_returns_partial_result() {
        let records = vec![
            flow(BEL, FRA, "FRA", 100.0),
            flow(FRA, NLD, "NLD", 100.0),
            flow(NLD, DEU, "DEU", 100.0),
        ];
        let source = Arc::new(ReplaySource::new(records));
        let settings = FinderSettings {
            max_rounds: 2,
            ..settings(0.05)
        };
        let expander = MarketExpander::new(directory(), production(), source.clone(), settings).unwrap();

        let result = expander.find_markets(YEAR, None).await.unwrap();

        assert_eq!(result.termination, Termination::RoundCapReached);
        assert_eq!(result.markets, vec![BEL, FRA, NLD]);
        assert_eq!(result.rounds.len(), 2);
        // NLD was admitted but never queried
        assert!(!source.calls().await.contains(&(NLD, YEAR)));
    }

    #[tokio::test]
    async fn test_per_call_threshold_override() {
        let (expander, _) = expander(belgium_scenario(), 0.05);
        let result = expander.find_markets(YEAR, Some(0.01)).await.unwrap();
        assert_eq!(result.markets, vec![BEL, FRA, NLD]);
        assert!(matches!(
            expander.find_markets(YEAR, Some(2.0)).await,
            Err(FinderError::InvalidThreshold { .. })
        ));
    }

    #[tokio::test]
    async fn test_raising_threshold_never_grows_found() {
        let records = vec![
            flow(BEL, FRA, "FRA", 100.0),
            flow(BEL, NLD, "NLD", 60.0),
            flow(NLD, DEU, "DEU", 100.0),
            flow(DEU, LUX, "LUX", 200.0),
        ];
        let mut previous = usize::MAX;
        for t in [0.01, 0.05, 0.08, 0.1, 0.2, 0.5, 1.0] {
            let (expander, _) = expander(records.clone(), t);
            let size = expander.find_markets(YEAR, None).await.unwrap().markets.len();
            assert!(size <= previous, "t_market {} grew found to {}", t, size);
            previous = size;
        }
    }

    #[tokio::test]
    async fn test_identical_inputs_give_identical_results() {
        let (first, _) = expander(belgium_scenario(), 0.01);
        let (second, _) = expander(belgium_scenario(), 0.01);
        let a = first.find_markets(YEAR, None).await.unwrap();
        let b = second.find_markets(YEAR, None).await.unwrap();
        assert_eq!(a.markets, b.markets);
        // Re-running the same expander is also stable
        assert_eq!(first.find_markets(YEAR, None).await.unwrap().markets, a.markets);
    }

    #[tokio::test]
    async fn test_unknown_partner_code_fails_loudly() {
        let records = vec![flow(BEL, CountryCode(4242), "XXX", 500.0)];
        let (expander, _) = expander(records, 0.05);
        assert_eq!(
            expander.find_markets(YEAR, None).await.unwrap_err(),
            FinderError::UnknownCountryCode(CountryCode(4242))
        );
    }

    #[test]
    fn test_unknown_seed_rejected_at_construction() {
        let source = Arc::new(ReplaySource::new(Vec::new()));
        let settings = FinderSettings {
            seed_market: "Atlantis".to_string(),
            ..settings(0.05)
        };
        let result = MarketExpander::new(directory(), production(), source, settings);
        assert!(matches!(result, Err(FinderError::UnknownCountryName(_))));
    }

    struct FailingSource;

    #[async_trait]
    impl TradeFlowSource for FailingSource {
        async fn fetch_imports(
            &self,
            reporter: CountryCode,
            _year: Year,
            _commodities: &[CommodityCode],
        ) -> Result<Vec<TradeFlowRecord>, FetchError> {
            if reporter == BEL {
                Ok(vec![flow(BEL, FRA, "FRA", 100.0)])
            } else {
                Err(FetchError::Exhausted {
                    attempts: 5,
                    last: "connection reset".to_string(),
                })
            }
        }
    }

    #[tokio::test]
    async fn test_fetch_failure_is_fatal_for_the_year() {
        let expander =
            MarketExpander::new(directory(), production(), Arc::new(FailingSource), settings(0.05)).unwrap();
        let err = expander.find_markets(YEAR, None).await.unwrap_err();
        assert!(matches!(err, FinderError::Fetch(FetchError::Exhausted { .. })));
    }

    #[test]
    fn test_state_machine_transitions() {
        let mut state = ExpansionState::new(BEL, 1000.0);
        assert_eq!(state.termination(50), None);
        assert_eq!(state.reference_production(), 1000.0);

        assert_eq!(state.begin_round(), vec![BEL]);
        state.finish_round(vec![FRA, NLD], 800.0);
        assert_eq!(state.found(), &[BEL, FRA, NLD]);
        assert_eq!(state.frontier(), &[FRA, NLD]);
        assert_eq!(state.reference_production(), 800.0);

        assert_eq!(state.begin_round(), vec![FRA, NLD]);
        state.finish_round(Vec::new(), 0.0);
        assert_eq!(state.termination(50), Some(Termination::Converged));
        assert_eq!(state.round(), 2);
    }

    #[test]
    fn test_state_never_rechecks_or_duplicates() {
        let mut state = ExpansionState::new(BEL, 1000.0);
        state.begin_round();
        // BEL sneaks back into a frontier: it is neither re-found nor re-checked
        state.finish_round(vec![FRA, BEL], 0.0);
        assert_eq!(state.found(), &[BEL, FRA]);
        assert_eq!(state.begin_round(), vec![FRA]);
    }
}

// src/finder/persistence.rs

use crate::config::validate_fraction;
use crate::error::FinderResult;
use crate::models::{RecurrenceCount, Year};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Outcome of the multi-year recurrence test.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersistenceReport {
    pub total_years: usize,
    pub t_year: f64,
    /// Minimum number of years a market must appear in (`t_year * total_years`).
    pub threshold: f64,
    /// Every market seen in any year, in order of first appearance.
    pub counts: Vec<RecurrenceCount>,
    pub kept: Vec<String>,
}

/// Keeps the markets that appear in at least `t_year` of the analysed years.
///
/// Counts years, not occurrences: a name listed twice for one year counts once.
/// The input is only read.
pub fn recurring_markets<N>(by_year: &BTreeMap<Year, N>, t_year: f64) -> FinderResult<PersistenceReport>
where
    N: AsRef<[String]>,
{
    validate_fraction("t_year", t_year)?;

    let total_years = by_year.len();
    let threshold = t_year * total_years as f64;

    let mut order: Vec<&str> = Vec::new();
    let mut years_seen: HashMap<&str, usize> = HashMap::new();
    for names in by_year.values() {
        let mut this_year: HashSet<&str> = HashSet::new();
        for name in names.as_ref() {
            if !this_year.insert(name.as_str()) {
                continue;
            }
            let count = years_seen.entry(name.as_str()).or_insert_with(|| {
                order.push(name.as_str());
                0
            });
            *count += 1;
        }
    }

    let counts: Vec<RecurrenceCount> = order
        .into_iter()
        .map(|name| {
            let count = years_seen[name];
            RecurrenceCount {
                name: name.to_string(),
                count,
                kept: count as f64 >= threshold,
            }
        })
        .collect();

    let kept = counts
        .iter()
        .filter(|c| c.kept)
        .map(|c| c.name.clone())
        .collect();

    Ok(PersistenceReport {
        total_years,
        t_year,
        threshold,
        counts,
        kept,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FinderError;

    fn years(data: Vec<(Year, Vec<&str>)>) -> BTreeMap<Year, Vec<String>> {
        data.into_iter()
            .map(|(y, names)| (y, names.into_iter().map(String::from).collect()))
            .collect()
    }

    #[test]
    fn test_counts_and_inclusive_threshold() {
        let input = years(vec![
            (2003, vec!["Belgium", "France", "Netherlands"]),
            (2004, vec!["Belgium", "France"]),
            (2005, vec!["Belgium", "Germany"]),
            (2006, vec!["Belgium"]),
        ]);

        let report = recurring_markets(&input, 0.5).unwrap();

        assert_eq!(report.threshold, 2.0);
        assert_eq!(report.kept, vec!["Belgium", "France"]);
        let france = report.counts.iter().find(|c| c.name == "France").unwrap();
        assert_eq!(france.count, 2);
        assert!(france.kept);
        let names: Vec<_> = report.counts.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Belgium", "France", "Netherlands", "Germany"]);
    }

    #[test]
    fn test_present_every_year_always_kept() {
        let input = years(vec![(2003, vec!["Belgium", "France"]), (2004, vec!["Belgium"]), (2005, vec!["Belgium"])]);
        for t in [0.01, 0.3, 0.5, 0.9, 1.0] {
            let report = recurring_markets(&input, t).unwrap();
            assert!(report.kept.contains(&"Belgium".to_string()), "t_year {}", t);
        }
    }

    #[test]
    fn test_absent_market_never_kept() {
        let input = years(vec![(2003, vec!["Belgium"]), (2004, vec![])]);
        let report = recurring_markets(&input, 0.01).unwrap();
        assert!(!report.kept.iter().any(|n| n == "France"));
        assert!(report.counts.iter().all(|c| c.count > 0));
    }

    #[test]
    fn test_duplicate_name_within_a_year_counts_once() {
        let input = years(vec![(2003, vec!["France", "France"]), (2004, vec!["Belgium"])]);
        let report = recurring_markets(&input, 1.0).unwrap();
        assert_eq!(report.counts[0].count, 1);
        assert!(report.kept.is_empty());
    }

    #[test]
    fn test_input_left_untouched() {
        let input = years(vec![(2003, vec!["Belgium"]), (2004, vec!["France"])]);
        let before = input.clone();
        let _ = recurring_markets(&input, 0.5).unwrap();
        assert_eq!(input, before);
    }

    #[test]
    fn test_rejects_out_of_range_fraction() {
        let input = years(vec![(2003, vec!["Belgium"])]);
        assert!(matches!(
            recurring_markets(&input, 0.0),
            Err(FinderError::InvalidThreshold { name: "t_year", .. })
        ));
    }
}

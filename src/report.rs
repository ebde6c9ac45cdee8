// src/report.rs
//
// Console rendering of discovery results.

use crate::finder::{MultiYearReport, PersistenceReport};
use crate::models::{Termination, YearlyResult};
use std::fmt::Write;

/// Left-justified table, every column padded to the widest cell + 2.
pub fn format_table(rows: &[Vec<String>]) -> String {
    let col_width = rows
        .iter()
        .flat_map(|row| row.iter().map(|cell| cell.chars().count()))
        .max()
        .unwrap_or(0)
        + 2;

    let mut out = String::new();
    for row in rows {
        let line: String = row
            .iter()
            .map(|cell| format!("{:<width$}", cell, width = col_width))
            .collect();
        let _ = writeln!(out, "{}", line.trim_end());
    }
    out
}

/// The Name / Count / Keep? table followed by the kept list.
pub fn format_persistence(report: &PersistenceReport) -> String {
    let mut rows = vec![vec!["Name".to_string(), "Count".to_string(), "Keep?".to_string()]];
    for c in &report.counts {
        rows.push(vec![
            c.name.clone(),
            c.count.to_string(),
            if c.kept { "Yes" } else { "No" }.to_string(),
        ]);
    }

    let mut out = String::from("The following countries were found\n\n");
    out.push_str(&format_table(&rows));
    let _ = write!(out, "\nThese countries were kept\n{}\n", report.kept.join(", "));
    out
}

/// One line per year: the markets found and whether the expansion converged.
pub fn format_yearly(result: &YearlyResult) -> String {
    let status = match result.termination {
        Termination::Converged => format!("converged after {} rounds", result.rounds.len()),
        Termination::RoundCapReached => format!("stopped at round cap ({} rounds)", result.rounds.len()),
    };
    format!("{}: {} [{}]", result.year, result.names.join(", "), status)
}

pub fn format_multi_year(report: &MultiYearReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Markets for {}: tMarket = {}%, tYear = {}%\n",
        report.seed_market,
        report.t_market * 100.0,
        report.t_year * 100.0
    );
    for result in report.yearly.values() {
        let _ = writeln!(out, "{}", format_yearly(result));
    }
    let _ = writeln!(out, "{}", "=".repeat(100));
    out.push_str(&format_persistence(&report.persistence));
    out
}

// src/catalog/production.rs
//
// Annual production volumes by trade-area code, loaded from a wide CSV
// (one `Comtrade_No` column plus one column per year).

use crate::error::{FinderError, FinderResult};
use crate::models::{CountryCode, Year};
use log::{info, warn};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

const CODE_COLUMN: &str = "Comtrade_No";

/// Production volume lookup, keyed by code then year.
#[derive(Debug, Clone, Default)]
pub struct ProductionTable {
    volumes: HashMap<CountryCode, HashMap<Year, f64>>,
}

impl ProductionTable {
    /// Builds a table from `(code, year, volume)` triples. A code may appear
    /// at most once per year.
    pub fn from_records<I>(records: I) -> FinderResult<Self>
    where
        I: IntoIterator<Item = (CountryCode, Year, f64)>,
    {
        let mut volumes: HashMap<CountryCode, HashMap<Year, f64>> = HashMap::new();
        for (code, year, volume) in records {
            if !(volume >= 0.0) {
                return Err(load_error(format!(
                    "negative or non-numeric production {} for {} in {}",
                    volume, code, year
                )));
            }
            match volumes.entry(code).or_default().entry(year) {
                Entry::Occupied(_) => {
                    return Err(load_error(format!("duplicate production for {} in {}", code, year)));
                }
                Entry::Vacant(slot) => {
                    slot.insert(volume);
                }
            }
        }
        Ok(Self { volumes })
    }

    /// Parses the wide CSV layout. Columns whose header is not a year are ignored,
    /// as are blank cells.
    pub fn from_reader<R: Read>(reader: R) -> FinderResult<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = csv_reader
            .headers()
            .map_err(|e| load_error(e.to_string()))?
            .clone();

        let code_idx = headers
            .iter()
            .position(|h| h == CODE_COLUMN)
            .ok_or_else(|| load_error(format!("missing {} column", CODE_COLUMN)))?;

        let year_columns: Vec<(usize, Year)> = headers
            .iter()
            .enumerate()
            .filter_map(|(idx, h)| h.parse::<Year>().ok().map(|year| (idx, year)))
            .collect();

        let mut triples = Vec::new();
        for (line, result) in csv_reader.records().enumerate() {
            let record = result.map_err(|e| load_error(e.to_string()))?;
            let raw_code = record.get(code_idx).unwrap_or("");
            if raw_code.is_empty() {
                continue;
            }
            let code = parse_code(raw_code)
                .ok_or_else(|| load_error(format!("row {}: bad area code {:?}", line + 2, raw_code)))?;

            for &(idx, year) in &year_columns {
                let cell = record.get(idx).unwrap_or("");
                if cell.is_empty() {
                    continue;
                }
                let volume: f64 = cell.parse().map_err(|_| {
                    load_error(format!("row {}: bad volume {:?} for {}", line + 2, cell, year))
                })?;
                triples.push((code, year, volume));
            }
        }

        Self::from_records(triples)
    }

    /// Loads the table from a CSV file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> FinderResult<Self> {
        let file = std::fs::File::open(&path).map_err(|e| FinderError::Load {
            what: format!("production table {}", path.as_ref().display()),
            reason: e.to_string(),
        })?;
        let table = Self::from_reader(file)?;
        info!("ProductionTable: Loaded production for {} areas", table.len());
        Ok(table)
    }

    /// Production of `code` in `year`.
    ///
    /// Never fails: areas without data yield 0.0 and a warning, since many
    /// minor trade areas have no production figures.
    pub fn production_of(&self, code: CountryCode, year: Year) -> f64 {
        match self.volumes.get(&code) {
            Some(by_year) => match by_year.get(&year) {
                Some(&volume) => volume,
                None => {
                    warn!("No production data for area {} in {}. Setting production amount to zero", code, year);
                    0.0
                }
            },
            None => {
                warn!("No production data for area {}. Setting production amount to zero", code);
                0.0
            }
        }
    }

    pub fn contains(&self, code: CountryCode) -> bool {
        self.volumes.contains_key(&code)
    }

    pub fn len(&self) -> usize {
        self.volumes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.volumes.is_empty()
    }
}

/// Codes sometimes come through spreadsheets as floats ("56.0").
fn parse_code(raw: &str) -> Option<CountryCode> {
    if let Ok(code) = raw.parse::<u32>() {
        return Some(CountryCode(code));
    }
    let f: f64 = raw.parse().ok()?;
    if f >= 0.0 && f.fract() == 0.0 && f <= u32::MAX as f64 {
        Some(CountryCode(f as u32))
    } else {
        None
    }
}

fn load_error(reason: String) -> FinderError {
    FinderError::Load {
        what: "production table".to_string(),
        reason,
    }
}

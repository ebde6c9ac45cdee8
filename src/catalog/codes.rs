// src/catalog/codes.rs
//
// Country name <-> trade-area code directory.
// Loaded once from Comtrade's partnerAreas.json and read-only afterwards.

use crate::error::{FinderError, FinderResult};
use crate::models::CountryCode;
use log::{debug, info};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// One `{ "id": ..., "text": ... }` entry of the source document.
#[derive(Debug, Deserialize)]
struct AreaEntry {
    id: serde_json::Value,
    text: String,
}

impl AreaEntry {
    /// Ids are strings in the published file, but plain numbers are accepted too.
    fn code(&self) -> Option<CountryCode> {
        match &self.id {
            serde_json::Value::String(s) => s.trim().parse().ok().map(CountryCode),
            serde_json::Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()).map(CountryCode),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct AreasDocument {
    results: Vec<AreaEntry>,
}

/// Bidirectional mapping between country names and trade-area codes.
///
/// Both directions are injective: a duplicate name or a duplicate code is
/// rejected at load time, so the reverse map always mirrors the forward map.
#[derive(Debug, Clone, Default)]
pub struct CodeDirectory {
    by_name: HashMap<String, CountryCode>,
    by_code: HashMap<CountryCode, String>,
}

impl CodeDirectory {
    /// Builds the directory from (name, code) pairs.
    pub fn from_pairs<I, S>(pairs: I) -> FinderResult<Self>
    where
        I: IntoIterator<Item = (S, CountryCode)>,
        S: Into<String>,
    {
        let mut by_name: HashMap<String, CountryCode> = HashMap::new();
        let mut by_code: HashMap<CountryCode, String> = HashMap::new();

        for (name, code) in pairs {
            let name = name.into();
            if by_name.contains_key(&name) {
                return Err(FinderError::DuplicateName(name));
            }
            if let Some(first) = by_code.get(&code) {
                return Err(FinderError::DuplicateCode {
                    code,
                    first: first.clone(),
                    second: name,
                });
            }
            by_name.insert(name.clone(), code);
            by_code.insert(code, name);
        }

        Ok(Self { by_name, by_code })
    }

    /// Parses a `{"results": [{"id": "56", "text": "Belgium"}, ...]}` document.
    ///
    /// Entries whose id is not numeric (Comtrade lists an `"all"` pseudo-area)
    /// are skipped.
    pub fn from_json_str(s: &str) -> FinderResult<Self> {
        let doc: AreasDocument = serde_json::from_str(s).map_err(|e| FinderError::Load {
            what: "code directory".to_string(),
            reason: e.to_string(),
        })?;

        let pairs = doc.results.into_iter().filter_map(|entry| {
            match entry.code() {
                Some(code) => Some((entry.text, code)),
                None => {
                    debug!("CodeDirectory: skipping non-numeric area id {} ({})", entry.id, entry.text);
                    None
                }
            }
        });

        Self::from_pairs(pairs)
    }

    /// Loads the directory from a JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> FinderResult<Self> {
        let contents = fs::read_to_string(&path).map_err(|e| FinderError::Load {
            what: format!("code directory {}", path.as_ref().display()),
            reason: e.to_string(),
        })?;
        let directory = Self::from_json_str(&contents)?;
        info!("CodeDirectory: Loaded {} trade areas", directory.len());
        Ok(directory)
    }

    pub fn code_of(&self, name: &str) -> FinderResult<CountryCode> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| FinderError::UnknownCountryName(name.to_string()))
    }

    pub fn name_of(&self, code: CountryCode) -> FinderResult<&str> {
        self.by_code
            .get(&code)
            .map(String::as_str)
            .ok_or(FinderError::UnknownCountryCode(code))
    }

    /// Resolves a list of codes, failing on the first unknown one.
    pub fn names_of(&self, codes: &[CountryCode]) -> FinderResult<Vec<String>> {
        codes
            .iter()
            .map(|&c| self.name_of(c).map(str::to_string))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const AREAS: &str = r#"{
        "more": false,
        "results": [
            {"id": "all", "text": "All"},
            {"id": "0", "text": "World"},
            {"id": "56", "text": "Belgium"},
            {"id": "251", "text": "France"},
            {"id": 528, "text": "Netherlands"}
        ]
    }"#;

    #[test]
    fn test_lookup_both_directions() {
        let dir = CodeDirectory::from_json_str(AREAS).unwrap();
        assert_eq!(dir.len(), 4);
        assert_eq!(dir.code_of("Belgium").unwrap(), CountryCode(56));
        assert_eq!(dir.name_of(CountryCode(251)).unwrap(), "France");
        assert_eq!(dir.name_of(CountryCode::WORLD).unwrap(), "World");
    }

    #[test]
    fn test_unknown_lookups_fail() {
        let dir = CodeDirectory::from_json_str(AREAS).unwrap();
        assert_eq!(
            dir.code_of("Atlantis"),
            Err(FinderError::UnknownCountryName("Atlantis".to_string()))
        );
        assert_eq!(
            dir.name_of(CountryCode(9999)),
            Err(FinderError::UnknownCountryCode(CountryCode(9999)))
        );
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let result = CodeDirectory::from_pairs(vec![
            ("Belgium", CountryCode(56)),
            ("Belgium", CountryCode(58)),
        ]);
        assert_eq!(result.unwrap_err(), FinderError::DuplicateName("Belgium".to_string()));
    }

    #[test]
    fn test_duplicate_code_rejected() {
        let result = CodeDirectory::from_pairs(vec![
            ("Belgium", CountryCode(56)),
            ("Belgium-Luxembourg", CountryCode(56)),
        ]);
        assert!(matches!(result, Err(FinderError::DuplicateCode { code, .. }) if code == CountryCode(56)));
    }

    #[test]
    fn test_names_of_fails_on_first_unknown() {
        let dir = CodeDirectory::from_json_str(AREAS).unwrap();
        let names = dir.names_of(&[CountryCode(56), CountryCode(528)]).unwrap();
        assert_eq!(names, vec!["Belgium", "Netherlands"]);
        assert!(dir.names_of(&[CountryCode(56), CountryCode(1)]).is_err());
    }

    #[test]
    fn test_malformed_document() {
        let err = CodeDirectory::from_json_str("{\"results\": 3}").unwrap_err();
        assert!(matches!(err, FinderError::Load { .. }));
    }
}

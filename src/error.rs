// src/error.rs

use crate::models::CountryCode;
use thiserror::Error;

/// Failure of a single trade-flow fetch.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    /// Worth retrying: connection reset, timeout, 5xx, 429.
    #[error("transient fetch failure: {0}")]
    Transient(String),

    /// Retrying will not help: malformed request, 4xx, unparsable body.
    #[error("fetch failed: {0}")]
    Permanent(String),

    #[error("fetch failed after {attempts} attempts: {last}")]
    Exhausted { attempts: usize, last: String },
}

impl FetchError {
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Transient(_))
    }
}

/// Errors raised while discovering markets.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FinderError {
    #[error("unknown country name: {0}")]
    UnknownCountryName(String),

    #[error("unknown country code: {0}")]
    UnknownCountryCode(CountryCode),

    #[error("duplicate country name in code directory: {0}")]
    DuplicateName(String),

    #[error("duplicate country code {code} in code directory ({first} and {second})")]
    DuplicateCode {
        code: CountryCode,
        first: String,
        second: String,
    },

    #[error("invalid {name} = {value}: must be in (0, 1]")]
    InvalidThreshold { name: &'static str, value: f64 },

    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    #[error("no years to analyse")]
    NoYears,

    #[error("failed to load {what}: {reason}")]
    Load { what: String, reason: String },

    #[error(transparent)]
    Fetch(#[from] FetchError),
}

pub type FinderResult<T> = std::result::Result<T, FinderError>;

// src/connectors/retry.rs

use crate::error::FetchError;
use crate::models::{CommodityCode, CountryCode, TradeFlowRecord, Year};
use crate::traits::TradeFlowSource;
use async_trait::async_trait;
use log::warn;
use std::time::Duration;
use tokio::time::sleep;

/// Waits between attempts: 5s, 10s, 20s, 20s.
pub const DEFAULT_BACKOFF_SECS: [u64; 4] = [5, 10, 20, 20];

/// Retries transient failures of an inner source on a fixed backoff schedule.
///
/// Each entry of the schedule is one retry, so a schedule of four waits allows
/// five attempts in total. Permanent failures are returned immediately. The
/// wait is awaited inline: nothing else in the pipeline proceeds during it.
pub struct RetryingSource<S> {
    inner: S,
    schedule: Vec<Duration>,
}

impl<S: TradeFlowSource> RetryingSource<S> {
    pub fn new(inner: S) -> Self {
        Self::with_schedule(
            inner,
            DEFAULT_BACKOFF_SECS.iter().map(|&s| Duration::from_secs(s)).collect(),
        )
    }

    pub fn with_schedule(inner: S, schedule: Vec<Duration>) -> Self {
        Self { inner, schedule }
    }

    pub fn schedule(&self) -> &[Duration] {
        &self.schedule
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: TradeFlowSource> TradeFlowSource for RetryingSource<S> {
    async fn fetch_imports(
        &self,
        reporter: CountryCode,
        year: Year,
        commodities: &[CommodityCode],
    ) -> Result<Vec<TradeFlowRecord>, FetchError> {
        let mut attempts = 0;
        loop {
            attempts += 1;
            match self.inner.fetch_imports(reporter, year, commodities).await {
                Ok(records) => return Ok(records),
                Err(FetchError::Transient(reason)) => {
                    let Some(&wait) = self.schedule.get(attempts - 1) else {
                        return Err(FetchError::Exhausted {
                            attempts,
                            last: reason,
                        });
                    };
                    warn!(
                        "Fetch for reporter {} ({}) failed: {}. Waiting {:?} and trying again...",
                        reporter, year, reason, wait
                    );
                    sleep(wait).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

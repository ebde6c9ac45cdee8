// src/connectors/replay.rs

use crate::error::FetchError;
use crate::models::{CommodityCode, CountryCode, TradeFlowRecord, Year};
use crate::traits::TradeFlowSource;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use tokio::sync::Mutex;

// --- 1. The Replay Source ---

/// Serves trade flows from memory instead of the network.
///
/// Used for offline runs over a recorded JSONL file and as the deterministic
/// source in tests. Every call is logged so callers can check which markets
/// were queried and in what order.
pub struct ReplaySource {
    flows: HashMap<(CountryCode, Year), Vec<TradeFlowRecord>>,
    calls: Mutex<Vec<(CountryCode, Year)>>,
}

impl ReplaySource {
    pub fn new(records: Vec<TradeFlowRecord>) -> Self {
        let mut flows: HashMap<(CountryCode, Year), Vec<TradeFlowRecord>> = HashMap::new();
        for record in records {
            flows.entry((record.reporter, record.year)).or_default().push(record);
        }
        Self {
            flows,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Loads records from a JSONL file (one `TradeFlowRecord` per line).
    /// Blank lines are skipped; a malformed line is an error.
    pub fn from_jsonl<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let mut records = Vec::new();
        for (n, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let record: TradeFlowRecord = serde_json::from_str(&line).map_err(|e| {
                std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("line {}: {}", n + 1, e),
                )
            })?;
            records.push(record);
        }
        log::info!("ReplaySource: Loaded {} recorded flows", records.len());
        Ok(Self::new(records))
    }

    /// Returns every (reporter, year) queried so far, in call order.
    pub async fn calls(&self) -> Vec<(CountryCode, Year)> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl TradeFlowSource for ReplaySource {
    async fn fetch_imports(
        &self,
        reporter: CountryCode,
        year: Year,
        commodities: &[CommodityCode],
    ) -> Result<Vec<TradeFlowRecord>, FetchError> {
        self.calls.lock().await.push((reporter, year));

        // A reporter with nothing recorded simply filed no imports
        let records = self
            .flows
            .get(&(reporter, year))
            .map(|rows| {
                rows.iter()
                    .filter(|r| commodities.contains(&r.commodity))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(records)
    }
}

// --- 2. Recording Source (Data Recorder Utility) ---

/// A wrapper that records every fetched flow from an inner source to a JSONL file.
/// Use this to capture a live run for later offline replay.
pub struct RecordingSource<S> {
    inner: S,
    writer: Mutex<BufWriter<File>>,
}

impl<S: TradeFlowSource> RecordingSource<S> {
    /// Creates a new RecordingSource that wraps an existing source.
    /// Records will be written to the specified file path.
    pub fn new<P: AsRef<Path>>(inner: S, output_path: P) -> std::io::Result<Self> {
        let file = File::create(output_path)?;
        Ok(Self {
            inner,
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    /// Flushes any buffered data to disk.
    pub async fn flush(&self) -> std::io::Result<()> {
        self.writer.lock().await.flush()
    }
}

#[async_trait]
impl<S: TradeFlowSource> TradeFlowSource for RecordingSource<S> {
    async fn fetch_imports(
        &self,
        reporter: CountryCode,
        year: Year,
        commodities: &[CommodityCode],
    ) -> Result<Vec<TradeFlowRecord>, FetchError> {
        let records = self.inner.fetch_imports(reporter, year, commodities).await?;

        let mut writer = self.writer.lock().await;
        for record in &records {
            match serde_json::to_string(record) {
                Ok(json) => {
                    if let Err(e) = writeln!(writer, "{}", json) {
                        log::error!("Failed to write flow to recording file: {}", e);
                    }
                }
                Err(e) => {
                    log::error!("Failed to serialize TradeFlowRecord: {}", e);
                }
            }
        }
        if let Err(e) = writer.flush() {
            log::error!("Failed to flush recording file: {}", e);
        }

        Ok(records)
    }
}

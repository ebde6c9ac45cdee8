// src/connectors/mod.rs
//
// Trade-flow sources: the live Comtrade client, the backoff wrapper around it,
// and offline replay / recording.

pub mod comtrade;
pub mod replay;
pub mod retry;

pub use comtrade::ComtradeClient;
pub use replay::{RecordingSource, ReplaySource};
pub use retry::RetryingSource;

// src/traits.rs

use crate::error::FetchError;
use crate::models::{CommodityCode, CountryCode, TradeFlowRecord, Year};
use async_trait::async_trait;
use std::sync::Arc;

/// A source of import flows for one reporting country.
///
/// This is the only place the pipeline does I/O. Callers await each fetch
/// before issuing the next, so implementations never see concurrent calls
/// from one run.
#[async_trait]
pub trait TradeFlowSource: Send + Sync {
    /// Returns every import row `reporter` filed for `year` across `commodities`.
    async fn fetch_imports(
        &self,
        reporter: CountryCode,
        year: Year,
        commodities: &[CommodityCode],
    ) -> Result<Vec<TradeFlowRecord>, FetchError>;
}

/// Wrapper to make any TradeFlowSource shareable between the expander and its wrappers.
pub type SharedTradeFlowSource = Arc<dyn TradeFlowSource>;


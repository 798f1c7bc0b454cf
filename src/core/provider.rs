//! Series provider abstraction

use crate::core::series::Series;
use anyhow::Result;
use async_trait::async_trait;

/// An upstream source of NAV histories.
///
/// `Ok` with an empty series means the provider answered but had nothing
/// usable for the symbol; `Err` carries a transport or payload failure.
#[async_trait]
pub trait SeriesProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn fetch_series(&self, symbol: &str) -> Result<Series>;
}

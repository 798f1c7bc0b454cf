use crate::core::cache::EtfCache;
use crate::server;
use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};

/// Warms the cache, then serves the JSON endpoint until interrupted.
pub async fn run(cache: Arc<EtfCache>, bind: &str) -> Result<()> {
    match cache.ensure_cache(false).await {
        Ok(status) => info!(
            "Cache ready with {} tickers ({})",
            cache.snapshot().await.len(),
            status
        ),
        Err(e) => warn!("Starting without cached series: {:#}", e),
    }

    server::serve(cache, bind).await
}

//! JSON endpoint serving cached ETF series to the web front end.

use crate::core::cache::EtfCache;
use crate::core::series::{Series, Ticker};
use anyhow::{Context, Result};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Column-oriented view of a series, as consumed by the charting front end.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesResponse {
    pub dates: Vec<String>,
    pub navs: Vec<f64>,
    pub returns: Vec<f64>,
}

impl From<&Series> for SeriesResponse {
    fn from(series: &Series) -> Self {
        SeriesResponse {
            dates: series
                .iter()
                .map(|p| p.date.format("%Y-%m-%d").to_string())
                .collect(),
            navs: series.iter().map(|p| p.nav).collect(),
            returns: series.iter().map(|p| p.return_pct).collect(),
        }
    }
}

fn empty(status: StatusCode) -> (StatusCode, Json<SeriesResponse>) {
    (status, Json(SeriesResponse::default()))
}

/// `GET /api/etf/{ticker}`
///
/// A ticker missing from an otherwise healthy cache triggers one forced
/// refresh before answering 404.
pub async fn etf_timeseries(
    State(cache): State<Arc<EtfCache>>,
    Path(ticker): Path<String>,
) -> (StatusCode, Json<SeriesResponse>) {
    let Some(ticker) = Ticker::parse(&ticker) else {
        return empty(StatusCode::BAD_REQUEST);
    };

    if let Err(e) = cache.ensure_cache(false).await {
        warn!("No series available for {}: {:#}", ticker, e);
        return empty(StatusCode::BAD_GATEWAY);
    }

    let series = match cache.cached_series(&ticker).await {
        Some(series) if !series.is_empty() => series,
        _ => {
            debug!("{} not cached, forcing refresh", ticker);
            if let Err(e) = cache.ensure_cache(true).await {
                warn!("Forced refresh for {} failed: {:#}", ticker, e);
                return empty(StatusCode::BAD_GATEWAY);
            }
            cache.cached_series(&ticker).await.unwrap_or_default()
        }
    };

    if series.is_empty() {
        return empty(StatusCode::NOT_FOUND);
    }

    (StatusCode::OK, Json(SeriesResponse::from(&series)))
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

pub fn router(cache: Arc<EtfCache>) -> Router {
    Router::new()
        .route("/api/etf/:ticker", get(etf_timeseries))
        .route("/api/health", get(health))
        .with_state(cache)
}

pub async fn serve(cache: Arc<EtfCache>, bind: &str) -> Result<()> {
    let addr: SocketAddr = bind
        .parse()
        .with_context(|| format!("Invalid bind address: {bind}"))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Serving ETF series on http://{}", addr);

    axum::serve(listener, router(cache))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to install Ctrl+C handler: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cache::DEFAULT_MAX_AGE;
    use crate::providers::resolver::SymbolResolver;
    use crate::providers::resolver::tests::{MockProvider, sample_series};
    use crate::store::MemoryStore;
    use std::collections::BTreeMap;

    fn cache_with(primary: MockProvider, tickers: &[&str]) -> (Arc<MockProvider>, Arc<EtfCache>) {
        let primary = Arc::new(primary);
        let resolver = SymbolResolver::new(
            primary.clone(),
            Arc::new(MockProvider::new("s")),
            BTreeMap::new(),
        );
        let tickers: Vec<String> = tickers.iter().map(|t| t.to_string()).collect();
        let cache = EtfCache::new(
            &tickers,
            resolver,
            Arc::new(MemoryStore::new()),
            DEFAULT_MAX_AGE,
        );
        (primary, Arc::new(cache))
    }

    #[tokio::test]
    async fn test_known_ticker_returns_columns() {
        let (_, cache) = cache_with(
            MockProvider::new("p").with_series("510050", sample_series(2.0, 2)),
            &["510050"],
        );

        let (status, Json(body)) =
            etf_timeseries(State(cache), Path("510050".to_string())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.dates, vec!["2024-03-01", "2024-03-02"]);
        assert_eq!(body.navs, vec![2.0, 2.01]);
        assert_eq!(body.returns, vec![0.0, 0.5]);
    }

    fn assert_send<T: Send>(_: &T) {}

    #[tokio::test]
    async fn test_router_serves_handler_futures() {
        let (_, cache) = cache_with(
            MockProvider::new("p").with_series("510050", sample_series(2.0, 2)),
            &["510050"],
        );

        let refresh = cache.ensure_cache(true);
        assert_send(&refresh);
        assert_eq!(refresh.await.unwrap(), crate::core::cache::CacheStatus::Refreshed);

        let handler = etf_timeseries(State(cache.clone()), Path("510050".to_string()));
        assert_send(&handler);
        let (status, _) = handler.await;
        assert_eq!(status, StatusCode::OK);

        let _router: Router = router(cache);
    }

    #[tokio::test]
    async fn test_blank_ticker_is_bad_request() {
        let (primary, cache) = cache_with(MockProvider::new("p"), &["510050"]);

        let (status, Json(body)) = etf_timeseries(State(cache), Path(" ".to_string())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, SeriesResponse::default());
        assert!(primary.calls().is_empty());
    }

    #[tokio::test]
    async fn test_unavailable_cache_is_bad_gateway() {
        let (_, cache) = cache_with(MockProvider::new("p"), &["510050"]);

        let (status, _) = etf_timeseries(State(cache), Path("510050".to_string())).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_unknown_ticker_forces_one_refresh_then_not_found() {
        let (primary, cache) = cache_with(
            MockProvider::new("p").with_series("510050", sample_series(2.0, 2)),
            &["510050"],
        );

        let (status, Json(body)) =
            etf_timeseries(State(cache), Path("159915".to_string())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body.dates.is_empty());
        // initial refresh plus the forced one
        assert_eq!(primary.calls(), vec!["510050", "510050"]);
    }
}

//! In-memory ETF series cache with an age-based staleness policy.
//!
//! Lookups prefer, in order: fresh memory, a fresh store, a remote refresh,
//! stale memory and finally a stale store. Only when all of them come up
//! empty does [`EtfCache::ensure_cache`] fail.

use crate::core::series::{Series, SeriesRecord, SeriesTable, Ticker, group_records, to_records};
use crate::providers::resolver::SymbolResolver;
use crate::store::SeriesStore;
use anyhow::{Result, anyhow};
use futures::stream::{self, StreamExt};
use std::fmt::Display;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(6 * 60 * 60);

/// How a successful [`EtfCache::ensure_cache`] call was satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Refreshed,
    FreshMemory,
    FreshDisk,
    StaleMemory,
    StaleDisk,
}

impl Display for CacheStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                CacheStatus::Refreshed => "refreshed from providers",
                CacheStatus::FreshMemory => "fresh in memory",
                CacheStatus::FreshDisk => "fresh on disk",
                CacheStatus::StaleMemory => "stale in memory",
                CacheStatus::StaleDisk => "stale on disk",
            }
        )
    }
}

#[derive(Default)]
struct CacheState {
    series: SeriesTable,
    refreshed_at: Option<SystemTime>,
}

/// Per-ticker outcome of a remote refresh.
#[derive(Debug, Clone)]
pub struct RefreshEntry {
    pub ticker: Ticker,
    pub points: usize,
    pub source: Option<String>,
}

pub struct EtfCache {
    tickers: Vec<Ticker>,
    resolver: SymbolResolver,
    store: Arc<dyn SeriesStore>,
    max_age: Duration,
    concurrency: usize,
    state: RwLock<CacheState>,
    last_refresh: RwLock<Vec<RefreshEntry>>,
}

fn age(now: SystemTime, at: SystemTime) -> Duration {
    now.duration_since(at).unwrap_or(Duration::ZERO)
}

impl EtfCache {
    pub fn new(
        tickers: &[String],
        resolver: SymbolResolver,
        store: Arc<dyn SeriesStore>,
        max_age: Duration,
    ) -> Self {
        let mut unique: Vec<Ticker> = Vec::with_capacity(tickers.len());
        for ticker in tickers.iter().filter_map(|t| Ticker::parse(t)) {
            if !unique.contains(&ticker) {
                unique.push(ticker);
            }
        }

        Self {
            tickers: unique,
            resolver,
            store,
            max_age,
            concurrency: 4,
            state: RwLock::new(CacheState::default()),
            last_refresh: RwLock::new(Vec::new()),
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn tracked_tickers(&self) -> &[Ticker] {
        &self.tickers
    }

    pub fn store(&self) -> &Arc<dyn SeriesStore> {
        &self.store
    }

    fn is_fresh(&self, now: SystemTime, at: SystemTime) -> bool {
        age(now, at) < self.max_age
    }

    /// Fetches every tracked ticker and, if anything came back, replaces
    /// both the store and the in-memory table.
    async fn refresh_from_remote(&self) -> Result<()> {
        info!("Refreshing {} tickers from providers", self.tickers.len());

        let results: Vec<_> = stream::iter(self.tickers.iter().cloned())
            .map(|ticker| async move {
                let resolved = self.resolver.resolve(&ticker).await;
                (ticker, resolved)
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut records: Vec<SeriesRecord> = Vec::new();
        let mut summary = Vec::with_capacity(results.len());
        for (ticker, resolved) in results {
            records.extend(to_records(&ticker, &resolved.series));
            summary.push(RefreshEntry {
                ticker,
                points: resolved.series.len(),
                source: resolved.source.map(|s| s.to_string()),
            });
        }
        *self.last_refresh.write().await = summary;

        if records.is_empty() {
            return Err(anyhow!("No provider returned data for any tracked ticker"));
        }

        if let Err(e) = self.store.write(&records) {
            warn!("Failed to persist refreshed series: {:#}", e);
        }

        let table = group_records(&records);
        info!("Refreshed {} tickers ({} rows)", table.len(), records.len());

        let mut state = self.state.write().await;
        state.series = table;
        state.refreshed_at = Some(SystemTime::now());
        Ok(())
    }

    /// Loads the store into memory when it holds anything. Returns whether
    /// memory was replaced.
    async fn adopt_store(&self, modified: SystemTime) -> bool {
        let table = self.store.load();
        if table.is_empty() {
            debug!("Store is empty or unreadable");
            return false;
        }
        debug!("Adopting {} tickers from store", table.len());
        let mut state = self.state.write().await;
        state.series = table;
        state.refreshed_at = Some(modified);
        true
    }

    /// Makes sure the cache holds data, refreshing when needed.
    ///
    /// Fails only when memory, the store and the providers all have nothing.
    pub async fn ensure_cache(&self, force_refresh: bool) -> Result<CacheStatus> {
        if force_refresh {
            match self.refresh_from_remote().await {
                Ok(()) => return Ok(CacheStatus::Refreshed),
                Err(e) => warn!("Forced refresh failed: {:#}", e),
            }
        }

        let now = SystemTime::now();

        {
            let state = self.state.read().await;
            if !state.series.is_empty()
                && state
                    .refreshed_at
                    .is_some_and(|at| self.is_fresh(now, at))
            {
                debug!("Cache HIT (memory)");
                return Ok(CacheStatus::FreshMemory);
            }
        }

        if let Some(modified) = self.store.modified() {
            let needs_load = {
                let state = self.state.read().await;
                state.series.is_empty() || state.refreshed_at != Some(modified)
            };
            if needs_load {
                self.adopt_store(modified).await;
            }

            let has_data = !self.state.read().await.series.is_empty();
            if has_data && self.is_fresh(now, modified) {
                debug!("Cache HIT (store)");
                return Ok(CacheStatus::FreshDisk);
            }
        }

        debug!("Cache MISS, refreshing from providers");
        match self.refresh_from_remote().await {
            Ok(()) => return Ok(CacheStatus::Refreshed),
            Err(e) => warn!("Refresh failed: {:#}", e),
        }

        if !self.state.read().await.series.is_empty() {
            warn!("Serving stale in-memory series");
            return Ok(CacheStatus::StaleMemory);
        }

        if let Some(modified) = self.store.modified()
            && self.adopt_store(modified).await
        {
            warn!("Serving stale series from store");
            return Ok(CacheStatus::StaleDisk);
        }

        Err(anyhow!("No ETF data available from memory, store or providers"))
    }

    /// Returns the cached series for `ticker`, refreshing the cache as
    /// needed. Blank tickers and total unavailability yield an empty series.
    pub async fn fetch_series(&self, ticker: &str, force_refresh: bool) -> Series {
        let Some(ticker) = Ticker::parse(ticker) else {
            return Vec::new();
        };

        if let Err(e) = self.ensure_cache(force_refresh).await {
            debug!("fetch_series({}) has no data: {:#}", ticker, e);
            return Vec::new();
        }

        self.cached_series(&ticker).await.unwrap_or_default()
    }

    /// Series currently held in memory, without any refresh.
    pub async fn cached_series(&self, ticker: &Ticker) -> Option<Series> {
        self.state.read().await.series.get(ticker).cloned()
    }

    /// Tickers currently held in memory, sorted.
    pub async fn tickers(&self) -> Vec<Ticker> {
        let mut tickers: Vec<Ticker> = self.state.read().await.series.keys().cloned().collect();
        tickers.sort();
        tickers
    }

    /// Every series currently held in memory, sorted by ticker.
    pub async fn snapshot(&self) -> Vec<(Ticker, Series)> {
        let state = self.state.read().await;
        let mut entries: Vec<_> = state
            .series
            .iter()
            .map(|(t, s)| (t.clone(), s.clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    pub async fn refreshed_at(&self) -> Option<SystemTime> {
        self.state.read().await.refreshed_at
    }

    /// Outcome of the most recent remote refresh attempt.
    pub async fn last_refresh(&self) -> Vec<RefreshEntry> {
        self.last_refresh.read().await.clone()
    }
}

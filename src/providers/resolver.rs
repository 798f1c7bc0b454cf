//! Resolves a domestic fund code to a series, falling back from the primary
//! provider to exchange-qualified symbols on the secondary provider.

use crate::core::provider::SeriesProvider;
use crate::core::series::{Series, Ticker};
use std::collections::BTreeMap;
use std::fmt::Display;
use std::sync::Arc;
use tracing::{debug, warn};

const EXCHANGE_SUFFIXES: [&str; 2] = [".SS", ".SZ"];

/// Where a resolved series came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesSource {
    pub provider: &'static str,
    pub symbol: String,
}

impl Display for SeriesSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.provider, self.symbol)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Resolved {
    pub series: Series,
    pub source: Option<SeriesSource>,
}

pub struct SymbolResolver {
    primary: Arc<dyn SeriesProvider>,
    secondary: Arc<dyn SeriesProvider>,
    symbol_map: BTreeMap<String, String>,
}

impl SymbolResolver {
    pub fn new(
        primary: Arc<dyn SeriesProvider>,
        secondary: Arc<dyn SeriesProvider>,
        symbol_map: BTreeMap<String, String>,
    ) -> Self {
        let symbol_map = symbol_map
            .into_iter()
            .map(|(code, symbol)| (code.trim().to_uppercase(), symbol.trim().to_uppercase()))
            .collect();
        Self {
            primary,
            secondary,
            symbol_map,
        }
    }

    /// Symbols tried against the secondary provider, in order: the mapped
    /// symbol if any, the bare ticker, then each exchange suffix.
    pub fn candidates(&self, ticker: &Ticker) -> Vec<String> {
        let base = ticker.as_str();
        let mut candidates: Vec<String> = Vec::with_capacity(4);
        if let Some(mapped) = self.symbol_map.get(base) {
            candidates.push(mapped.clone());
        }

        let suffixed = EXCHANGE_SUFFIXES.iter().map(|s| format!("{base}{s}"));
        for candidate in std::iter::once(base.to_string()).chain(suffixed) {
            if !candidates.contains(&candidate) {
                candidates.push(candidate);
            }
        }
        candidates
    }

    async fn attempt(provider: &dyn SeriesProvider, symbol: &str) -> Option<Resolved> {
        match provider.fetch_series(symbol).await {
            Ok(series) if !series.is_empty() => Some(Resolved {
                series,
                source: Some(SeriesSource {
                    provider: provider.name(),
                    symbol: symbol.to_string(),
                }),
            }),
            Ok(_) => {
                debug!("{} returned no data for {}", provider.name(), symbol);
                None
            }
            Err(e) => {
                warn!("{} fetch failed for {}: {:#}", provider.name(), symbol, e);
                None
            }
        }
    }

    /// Returns the first non-empty series, or an empty one when every
    /// provider and candidate came back empty or failed.
    pub async fn resolve(&self, ticker: &Ticker) -> Resolved {
        if let Some(resolved) = Self::attempt(self.primary.as_ref(), ticker.as_str()).await {
            return resolved;
        }

        for symbol in self.candidates(ticker) {
            if let Some(resolved) = Self::attempt(self.secondary.as_ref(), &symbol).await {
                return resolved;
            }
        }

        debug!("No provider produced data for {}", ticker);
        Resolved::default()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::core::series::{Observation, normalize};
    use anyhow::{Result, anyhow};
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Scripted provider that records every symbol it is asked for.
    pub(crate) struct MockProvider {
        name: &'static str,
        responses: HashMap<String, Result<Series, String>>,
        max_calls: Option<usize>,
        calls: Mutex<Vec<String>>,
    }

    impl MockProvider {
        pub(crate) fn new(name: &'static str) -> Self {
            Self {
                name,
                responses: HashMap::new(),
                max_calls: None,
                calls: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn with_series(mut self, symbol: &str, series: Series) -> Self {
            self.responses.insert(symbol.to_string(), Ok(series));
            self
        }

        pub(crate) fn with_error(mut self, symbol: &str) -> Self {
            self.responses
                .insert(symbol.to_string(), Err("connection reset".to_string()));
            self
        }

        /// Fails every call after the first `n`.
        pub(crate) fn exhausted_after(mut self, n: usize) -> Self {
            self.max_calls = Some(n);
            self
        }

        pub(crate) fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SeriesProvider for MockProvider {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn fetch_series(&self, symbol: &str) -> Result<Series> {
            let call_count = {
                let mut calls = self.calls.lock().unwrap();
                calls.push(symbol.to_string());
                calls.len()
            };
            if self.max_calls.is_some_and(|max| call_count > max) {
                return Err(anyhow!("{} is unavailable", self.name));
            }
            match self.responses.get(symbol) {
                Some(Ok(series)) => Ok(series.clone()),
                Some(Err(e)) => Err(anyhow!(e.clone())),
                None => Ok(Vec::new()),
            }
        }
    }

    pub(crate) fn sample_series(start_price: f64, days: u32) -> Series {
        normalize(
            (0..days)
                .map(|i| {
                    Observation::new(
                        NaiveDate::from_ymd_opt(2024, 3, 1 + i).unwrap(),
                        start_price + i as f64 * 0.01,
                    )
                })
                .collect(),
        )
    }

    fn ticker(s: &str) -> Ticker {
        Ticker::parse(s).unwrap()
    }

    fn resolver(
        primary: Arc<MockProvider>,
        secondary: Arc<MockProvider>,
        map: &[(&str, &str)],
    ) -> SymbolResolver {
        SymbolResolver::new(
            primary,
            secondary,
            map.iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn test_candidates_without_mapping() {
        let r = resolver(
            Arc::new(MockProvider::new("p")),
            Arc::new(MockProvider::new("s")),
            &[],
        );
        assert_eq!(
            r.candidates(&ticker("600000")),
            vec!["600000", "600000.SS", "600000.SZ"]
        );
    }

    #[test]
    fn test_candidates_with_mapping_skip_duplicates() {
        let r = resolver(
            Arc::new(MockProvider::new("p")),
            Arc::new(MockProvider::new("s")),
            &[("159915", "159915.sz")],
        );
        assert_eq!(
            r.candidates(&ticker("159915")),
            vec!["159915.SZ", "159915", "159915.SS"]
        );
    }

    #[tokio::test]
    async fn test_primary_hit_skips_secondary() {
        let primary = Arc::new(MockProvider::new("p").with_series("510050", sample_series(2.4, 3)));
        let secondary = Arc::new(MockProvider::new("s"));
        let r = resolver(primary.clone(), secondary.clone(), &[]);

        let resolved = r.resolve(&ticker("510050")).await;
        assert_eq!(resolved.series.len(), 3);
        assert_eq!(
            resolved.source,
            Some(SeriesSource {
                provider: "p",
                symbol: "510050".to_string()
            })
        );
        assert!(secondary.calls().is_empty());
    }

    #[tokio::test]
    async fn test_fallback_order_without_mapping() {
        let primary = Arc::new(MockProvider::new("p"));
        let secondary = Arc::new(MockProvider::new("s"));
        let r = resolver(primary.clone(), secondary.clone(), &[]);

        let resolved = r.resolve(&ticker("600000")).await;
        assert!(resolved.series.is_empty());
        assert!(resolved.source.is_none());
        assert_eq!(primary.calls(), vec!["600000"]);
        assert_eq!(secondary.calls(), vec!["600000", "600000.SS", "600000.SZ"]);
    }

    #[tokio::test]
    async fn test_fallback_stops_at_first_hit_after_errors() {
        let primary = Arc::new(MockProvider::new("p").with_error("510300"));
        let secondary = Arc::new(
            MockProvider::new("s")
                .with_error("510300.SS")
                .with_series("510300", sample_series(3.5, 2))
                .with_series("510300.SZ", sample_series(9.9, 2)),
        );
        let r = resolver(primary.clone(), secondary.clone(), &[("510300", "510300.SS")]);

        let resolved = r.resolve(&ticker("510300")).await;
        assert_eq!(resolved.series[0].nav, 3.5);
        assert_eq!(resolved.source.unwrap().to_string(), "s:510300");
        assert_eq!(secondary.calls(), vec!["510300.SS", "510300"]);
    }
}

//! Series types and the normalizer that turns raw observations into a
//! rebased return series.

use chrono::NaiveDate;
use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt::Display;

/// Number of trailing observations kept in every series.
pub const SERIES_WINDOW: usize = 35;

/// A raw (date, price) pair as reported by an upstream provider.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    pub date: NaiveDate,
    pub price: f64,
}

impl Observation {
    pub fn new(date: NaiveDate, price: f64) -> Self {
        Self { date, price }
    }
}

/// One point of a normalized series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesPoint {
    pub date: NaiveDate,
    pub nav: f64,
    pub return_pct: f64,
}

pub type Series = Vec<SeriesPoint>;

/// Uppercased, trimmed ticker identity used to key the cache and the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ticker(String);

impl Ticker {
    /// Returns `None` for blank input.
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_uppercase();
        if normalized.is_empty() {
            None
        } else {
            Some(Ticker(normalized))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Ticker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for Ticker {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Flat row representation of a series point, as written to the store.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesRecord {
    pub ticker: Ticker,
    pub date: NaiveDate,
    pub nav: f64,
    pub return_pct: f64,
}

/// All cached series, keyed by ticker.
pub type SeriesTable = HashMap<Ticker, Series>;

pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Sorts observations by date, keeps the trailing window and rebases each
/// price against the first one kept.
///
/// A zero base is replaced by 1, leaving the percentages relative to 1.
/// Duplicate dates are kept as they are.
pub fn normalize(mut observations: Vec<Observation>) -> Series {
    if observations.is_empty() {
        return Vec::new();
    }

    observations.sort_by_key(|obs| obs.date);
    if observations.len() > SERIES_WINDOW {
        observations.drain(..observations.len() - SERIES_WINDOW);
    }

    let mut base = observations[0].price;
    if base == 0.0 {
        base = 1.0;
    }

    observations
        .into_iter()
        .map(|obs| SeriesPoint {
            date: obs.date,
            nav: round_to(obs.price, 4),
            return_pct: round_to((obs.price / base - 1.0) * 100.0, 2),
        })
        .collect()
}

/// Groups flat records by ticker, sorting each series by date.
pub fn group_records(records: &[SeriesRecord]) -> SeriesTable {
    let mut grouped: SeriesTable = HashMap::new();
    for record in records {
        grouped
            .entry(record.ticker.clone())
            .or_default()
            .push(SeriesPoint {
                date: record.date,
                nav: record.nav,
                return_pct: record.return_pct,
            });
    }
    for series in grouped.values_mut() {
        series.sort_by_key(|point| point.date);
    }
    grouped
}

/// Flattens a series back into store records for `ticker`.
pub fn to_records(ticker: &Ticker, series: &[SeriesPoint]) -> Vec<SeriesRecord> {
    series
        .iter()
        .map(|point| SeriesRecord {
            ticker: ticker.clone(),
            date: point.date,
            nav: point.nav,
            return_pct: point.return_pct,
        })
        .collect()
}

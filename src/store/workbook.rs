//! On-disk workbook store.
//!
//! The workbook is a JSON document holding named sheets of cell rows. The
//! `etf_history` sheet carries a header row followed by one row per series
//! point; the `meta` sheet records when the workbook was generated.

use super::SeriesStore;
use crate::core::series::{SeriesPoint, SeriesRecord, SeriesTable, Ticker, round_to};
use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::SystemTime;
use tracing::{debug, info};

pub const HISTORY_SHEET: &str = "etf_history";
pub const META_SHEET: &str = "meta";
const HEADER: [&str; 4] = ["ticker", "date", "nav", "return_pct"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Number(f64),
    Text(String),
    Empty,
}

impl Cell {
    fn text(&self) -> Option<String> {
        match self {
            Cell::Text(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Cell::Number(n) if n.fract() == 0.0 => Some(format!("{n:.0}")),
            Cell::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    fn number(&self) -> Option<f64> {
        match self {
            Cell::Number(n) => Some(*n),
            Cell::Text(s) => s.trim().parse::<f64>().ok(),
            Cell::Empty => None,
        }
        .filter(|n| n.is_finite())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Sheet {
    pub name: String,
    pub rows: Vec<Vec<Cell>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Workbook {
    pub sheets: Vec<Sheet>,
}

impl Workbook {
    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|sheet| sheet.name == name)
    }

    fn from_records(records: &[SeriesRecord], generated_at: DateTime<Utc>) -> Self {
        let mut history = Sheet {
            name: HISTORY_SHEET.to_string(),
            rows: Vec::with_capacity(records.len() + 1),
        };
        history
            .rows
            .push(HEADER.iter().map(|h| Cell::Text(h.to_string())).collect());
        for record in records {
            history.rows.push(vec![
                Cell::Text(record.ticker.to_string()),
                Cell::Text(record.date.format("%Y-%m-%d").to_string()),
                Cell::Number(record.nav),
                Cell::Number(record.return_pct),
            ]);
        }

        let meta = Sheet {
            name: META_SHEET.to_string(),
            rows: vec![vec![
                Cell::Text("generated_at".to_string()),
                Cell::Text(generated_at.to_rfc3339_opts(SecondsFormat::Secs, true)),
            ]],
        };

        Workbook {
            sheets: vec![history, meta],
        }
    }

    /// Groups the history rows by ticker, skipping rows without a ticker,
    /// a readable date or a numeric nav.
    fn to_table(&self) -> Result<SeriesTable> {
        let history = self
            .sheet(HISTORY_SHEET)
            .ok_or_else(|| anyhow!("Workbook has no '{HISTORY_SHEET}' sheet"))?;

        let mut table = SeriesTable::new();
        for row in history.rows.iter().skip(1) {
            let cell = |idx: usize| row.get(idx).unwrap_or(&Cell::Empty);

            let Some(ticker) = cell(0).text().and_then(|t| Ticker::parse(&t)) else {
                continue;
            };
            let Some(date) = cell(1)
                .text()
                .and_then(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d").ok())
            else {
                continue;
            };
            let Some(nav) = cell(2).number() else {
                continue;
            };
            let return_pct = cell(3).number().unwrap_or(0.0);

            table.entry(ticker).or_default().push(SeriesPoint {
                date,
                nav: round_to(nav, 4),
                return_pct: round_to(return_pct, 2),
            });
        }

        for series in table.values_mut() {
            series.sort_by_key(|point| point.date);
        }
        Ok(table)
    }
}

pub struct WorkbookStore {
    path: PathBuf,
}

impl WorkbookStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read_workbook(&self) -> Result<Workbook> {
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read workbook: {}", self.path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse workbook: {}", self.path.display()))
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl SeriesStore for WorkbookStore {
    fn modified(&self) -> Option<SystemTime> {
        fs::metadata(&self.path).and_then(|m| m.modified()).ok()
    }

    fn load(&self) -> SeriesTable {
        if !self.path.exists() {
            debug!("No workbook at {}", self.path.display());
            return SeriesTable::new();
        }

        match self.read_workbook().and_then(|wb| wb.to_table()) {
            Ok(table) => {
                debug!(
                    "Loaded {} tickers from {}",
                    table.len(),
                    self.path.display()
                );
                table
            }
            Err(e) => {
                debug!("Ignoring unreadable workbook: {:#}", e);
                SeriesTable::new()
            }
        }
    }

    fn write(&self, records: &[SeriesRecord]) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let workbook = Workbook::from_records(records, Utc::now());
        let json = serde_json::to_string(&workbook)?;

        let temp_path = self.temp_path();
        fs::write(&temp_path, json)
            .with_context(|| format!("Failed to write workbook to {}", temp_path.display()))?;
        fs::rename(&temp_path, &self.path)
            .with_context(|| format!("Failed to replace workbook at {}", self.path.display()))?;

        info!(
            "Wrote {} rows to {}",
            records.len(),
            self.path.display()
        );
        Ok(())
    }

    fn generated_at(&self) -> Option<DateTime<Utc>> {
        let workbook = self.read_workbook().ok()?;
        let row = workbook.sheet(META_SHEET)?.rows.first()?;
        let value = row.get(1)?.text()?;
        DateTime::parse_from_rfc3339(&value)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn record(ticker: &str, day: &str, nav: f64, return_pct: f64) -> SeriesRecord {
        SeriesRecord {
            ticker: Ticker::parse(ticker).unwrap(),
            date: date(day),
            nav,
            return_pct,
        }
    }

    #[test]
    fn test_missing_workbook_loads_empty() {
        let dir = tempdir().unwrap();
        let store = WorkbookStore::new(dir.path().join("missing.json"));

        assert!(!store.exists());
        assert!(store.modified().is_none());
        assert!(store.load().is_empty());
        assert!(store.generated_at().is_none());
    }

    #[test]
    fn test_write_then_load_round_trip() {
        let dir = tempdir().unwrap();
        let store = WorkbookStore::new(dir.path().join("nested").join("etf.json"));

        let records = vec![
            record("510300", "2024-03-04", 3.6012, 1.25),
            record("510050", "2024-03-01", 2.4, 0.0),
            record("510300", "2024-03-01", 3.5567, 0.0),
            record("510050", "2024-03-04", 2.4512, 2.13),
        ];
        store.write(&records).unwrap();

        assert!(store.exists());
        assert!(store.generated_at().is_some());
        assert!(!dir.path().join("nested").join("etf.json.tmp").exists());

        let table = store.load();
        assert_eq!(table.len(), 2);
        let series = &table["510300"];
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].date, date("2024-03-01"));
        assert_eq!(series[0].nav, 3.5567);
        assert_eq!(series[1].return_pct, 1.25);
        assert_eq!(table["510050"][1].nav, 2.4512);
    }

    #[test]
    fn test_write_replaces_previous_content() {
        let dir = tempdir().unwrap();
        let store = WorkbookStore::new(dir.path().join("etf.json"));

        store
            .write(&[record("510050", "2024-03-01", 2.4, 0.0)])
            .unwrap();
        store
            .write(&[record("510300", "2024-03-01", 3.5, 0.0)])
            .unwrap();

        let table = store.load();
        assert_eq!(table.len(), 1);
        assert!(table.contains_key("510300"));
        assert!(!table.contains_key("510050"));
    }

    #[test]
    fn test_corrupt_workbook_loads_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("etf.json");
        fs::write(&path, "not a workbook").unwrap();

        let store = WorkbookStore::new(&path);
        assert!(store.exists());
        assert!(store.load().is_empty());
    }

    #[test]
    fn test_missing_history_sheet_loads_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("etf.json");
        fs::write(
            &path,
            r#"{"sheets": [{"name": "meta", "rows": [["generated_at", "2024-03-01T00:00:00Z"]]}]}"#,
        )
        .unwrap();

        let store = WorkbookStore::new(&path);
        assert!(store.load().is_empty());
        assert!(store.generated_at().is_some());
    }

    #[test]
    fn test_load_coerces_and_skips_rows() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("etf.json");
        fs::write(
            &path,
            r#"{"sheets": [{"name": "etf_history", "rows": [
                ["ticker", "date", "nav", "return_pct"],
                ["510050", "2024-03-04", "2.5", "n/a"],
                ["510050", "2024-03-01", 2.4, 0.0],
                [null, "2024-03-01", 1.0, 0.0],
                ["510050", null, 1.0, 0.0],
                ["510050", "2024-03-05", "abc", 1.0],
                ["sh510", "2024-03-01", 1.23456, 0.004],
                [159915, "2024-03-01", 1.0],
                ["510050", "yesterday", 1.0, 0.0]
            ]}]}"#,
        )
        .unwrap();

        let table = WorkbookStore::new(&path).load();
        assert_eq!(table.len(), 3);

        let series = &table["510050"];
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].date, date("2024-03-01"));
        assert_eq!(series[1].nav, 2.5);
        assert_eq!(series[1].return_pct, 0.0);

        let lowercase = &table["SH510"];
        assert_eq!(lowercase[0].nav, 1.2346);
        assert_eq!(lowercase[0].return_pct, 0.0);

        assert_eq!(table["159915"][0].return_pct, 0.0);
    }
}

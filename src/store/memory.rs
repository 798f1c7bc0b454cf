use super::SeriesStore;
use crate::core::series::{SeriesRecord, SeriesTable, group_records};
use anyhow::Result;
use chrono::{DateTime, Utc};
use std::sync::RwLock;
use std::time::SystemTime;
use tracing::debug;

struct StoredTable {
    records: Vec<SeriesRecord>,
    modified: SystemTime,
    generated_at: DateTime<Utc>,
}

/// In-process store, useful for ephemeral runs and tests.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Option<StoredTable>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that already holds `records`, written at `modified`.
    pub fn with_records(records: Vec<SeriesRecord>, modified: SystemTime) -> Self {
        Self {
            inner: RwLock::new(Some(StoredTable {
                records,
                modified,
                generated_at: DateTime::<Utc>::from(modified),
            })),
        }
    }
}

impl SeriesStore for MemoryStore {
    fn modified(&self) -> Option<SystemTime> {
        self.inner.read().ok()?.as_ref().map(|t| t.modified)
    }

    fn load(&self) -> SeriesTable {
        match self.inner.read() {
            Ok(inner) => inner
                .as_ref()
                .map(|t| group_records(&t.records))
                .unwrap_or_default(),
            Err(_) => SeriesTable::new(),
        }
    }

    fn write(&self, records: &[SeriesRecord]) -> Result<()> {
        let mut inner = self
            .inner
            .write()
            .map_err(|_| anyhow::anyhow!("Memory store lock poisoned"))?;
        let now = SystemTime::now();
        *inner = Some(StoredTable {
            records: records.to_vec(),
            modified: now,
            generated_at: DateTime::<Utc>::from(now),
        });
        debug!("Memory store PUT {} rows", records.len());
        Ok(())
    }

    fn generated_at(&self) -> Option<DateTime<Utc>> {
        self.inner.read().ok()?.as_ref().map(|t| t.generated_at)
    }
}

pub mod memory;
pub mod workbook;

use crate::core::series::{SeriesRecord, SeriesTable};
use anyhow::Result;
use chrono::{DateTime, Utc};
use std::time::SystemTime;

pub use memory::MemoryStore;
pub use workbook::WorkbookStore;

/// Durable table of every cached series.
///
/// Writes replace the whole table; loads scan it in full. Load failures are
/// reported as an empty table.
pub trait SeriesStore: Send + Sync {
    /// Last write time, or `None` when nothing has been stored yet.
    fn modified(&self) -> Option<SystemTime>;

    fn load(&self) -> SeriesTable;

    fn write(&self, records: &[SeriesRecord]) -> Result<()>;

    /// Timestamp recorded alongside the last write, if readable.
    fn generated_at(&self) -> Option<DateTime<Utc>>;

    fn exists(&self) -> bool {
        self.modified().is_some()
    }
}

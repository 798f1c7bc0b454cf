use super::ui::{self, StyleType};
use crate::core::cache::{CacheStatus, EtfCache, RefreshEntry};
use anyhow::Result;
use comfy_table::{Cell, CellAlignment, Color, Table};
use tracing::info;

fn refresh_table(entries: &[RefreshEntry]) -> Table {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Ticker"),
        ui::header_cell("Points"),
        ui::header_cell("Source"),
    ]);

    for entry in entries {
        let source = match &entry.source {
            Some(source) => Cell::new(source),
            None => Cell::new("no data").fg(Color::Red),
        };
        table.add_row(vec![
            Cell::new(entry.ticker.as_str()),
            Cell::new(entry.points).set_alignment(CellAlignment::Right),
            source,
        ]);
    }
    table
}

/// Forces a refresh of every tracked ticker and reports where each series came from.
pub async fn run(cache: &EtfCache) -> Result<()> {
    let spinner = ui::new_spinner(&format!(
        "Refreshing {} tickers",
        cache.tracked_tickers().len()
    ));
    let status = cache.ensure_cache(true).await;
    spinner.finish_and_clear();

    let status = status?;
    info!("Refresh finished: {}", status);

    let entries = cache.last_refresh().await;
    if !entries.is_empty() {
        println!("{}", refresh_table(&entries));
    }

    let resolved = entries.iter().filter(|e| e.source.is_some()).count();
    match status {
        CacheStatus::Refreshed => println!(
            "{} of {} tickers refreshed",
            resolved,
            cache.tracked_tickers().len()
        ),
        other => println!(
            "{}",
            ui::style_text(
                &format!("Refresh failed, serving cached series ({other})"),
                StyleType::Error
            )
        ),
    }
    Ok(())
}

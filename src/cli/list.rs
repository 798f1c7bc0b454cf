use super::ui::{self, StyleType};
use crate::core::cache::EtfCache;
use crate::core::series::{Series, Ticker};
use anyhow::Result;
use chrono::{DateTime, Local};
use comfy_table::{Cell, CellAlignment, Table};

fn summary_table(entries: &[(Ticker, Series)]) -> Table {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Ticker"),
        ui::header_cell("Points"),
        ui::header_cell("From"),
        ui::header_cell("To"),
        ui::header_cell("Latest NAV"),
        ui::header_cell("Return"),
    ]);

    for (ticker, series) in entries {
        let first = series.first();
        let last = series.last();
        table.add_row(vec![
            Cell::new(ticker.as_str()),
            Cell::new(series.len()).set_alignment(CellAlignment::Right),
            ui::format_optional_cell(first, |p| p.date.format("%Y-%m-%d").to_string()),
            ui::format_optional_cell(last, |p| p.date.format("%Y-%m-%d").to_string()),
            ui::format_optional_cell(last, |p| format!("{:.4}", p.nav)),
            last.map_or_else(|| Cell::new("N/A"), |p| ui::change_cell(p.return_pct)),
        ]);
    }
    table
}

/// Lists every cached ticker with its window and latest cumulative return.
pub async fn run(cache: &EtfCache) -> Result<()> {
    let status = cache.ensure_cache(false).await?;
    let entries = cache.snapshot().await;

    println!("{}", summary_table(&entries));

    let refreshed = cache
        .refreshed_at()
        .await
        .map(|at| {
            DateTime::<Local>::from(at)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string()
        })
        .unwrap_or_else(|| "never".to_string());
    println!(
        "{}",
        ui::style_text(
            &format!(
                "{} tickers, {} (as of {})",
                entries.len(),
                status,
                refreshed
            ),
            StyleType::Subtle
        )
    );
    if let Some(generated_at) = cache.store().generated_at() {
        println!(
            "{}",
            ui::style_text(
                &format!(
                    "Store written {}",
                    generated_at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S")
                ),
                StyleType::Subtle
            )
        );
    }
    Ok(())
}

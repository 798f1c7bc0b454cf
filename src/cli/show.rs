use super::ui::{self, StyleType};
use crate::core::cache::EtfCache;
use crate::core::series::SeriesPoint;
use anyhow::{Result, bail};
use comfy_table::{Cell, Table};

fn series_table(series: &[SeriesPoint]) -> Table {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Date"),
        ui::header_cell("NAV"),
        ui::header_cell("Return"),
    ]);

    for point in series {
        table.add_row(vec![
            Cell::new(point.date.format("%Y-%m-%d")),
            ui::number_cell(point.nav, 4),
            ui::change_cell(point.return_pct),
        ]);
    }
    table
}

/// Prints the cached series for one ticker.
pub async fn run(cache: &EtfCache, ticker: &str, force_refresh: bool) -> Result<()> {
    let series = cache.fetch_series(ticker, force_refresh).await;
    if series.is_empty() {
        bail!("No series available for ticker '{}'", ticker.trim());
    }

    println!(
        "{}",
        ui::style_text(&ticker.trim().to_uppercase(), StyleType::Title)
    );
    println!("{}", series_table(&series));
    println!(
        "{}",
        ui::style_text(
            &format!("{} trading days", series.len()),
            StyleType::Subtle
        )
    );
    Ok(())
}

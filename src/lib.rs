pub mod cli;
pub mod core;
pub mod providers;
pub mod server;
pub mod store;

use crate::core::cache::EtfCache;
use crate::core::config::AppConfig;
use crate::providers::{EastmoneyProvider, SymbolResolver, YahooFinanceProvider};
use crate::store::WorkbookStore;
use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, info};

pub enum AppCommand {
    Refresh,
    Show { ticker: String, refresh: bool },
    List,
    Serve { bind: Option<String> },
}

/// Wires the providers, resolver and store described by `config` into a cache.
pub fn build_cache(config: &AppConfig) -> Result<Arc<EtfCache>> {
    let timeout = config.providers.timeout();
    let primary = EastmoneyProvider::new(config.providers.eastmoney_base_url(), timeout)?;
    let secondary = YahooFinanceProvider::new(config.providers.yahoo_base_url(), timeout)?;
    let resolver = SymbolResolver::new(
        Arc::new(primary),
        Arc::new(secondary),
        config.symbol_map.clone(),
    );

    let store_path = config.store_path()?;
    debug!("Using series store at {}", store_path.display());
    let store = Arc::new(WorkbookStore::new(store_path));

    let cache = EtfCache::new(&config.tickers, resolver, store, config.cache.max_age())
        .with_concurrency(config.cache.concurrency);
    Ok(Arc::new(cache))
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("ETF cache starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let cache = build_cache(&config)?;

    match command {
        AppCommand::Refresh => cli::refresh::run(&cache).await,
        AppCommand::Show { ticker, refresh } => cli::show::run(&cache, &ticker, refresh).await,
        AppCommand::List => cli::list::run(&cache).await,
        AppCommand::Serve { bind } => {
            let bind = bind.unwrap_or_else(|| config.server.bind.clone());
            cli::serve::run(cache, &bind).await
        }
    }
}

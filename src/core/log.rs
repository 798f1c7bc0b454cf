// Logging initialization shared by the CLI commands and the HTTP server
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{
    EnvFilter, Layer, filter::Targets, fmt, prelude::__tracing_subscriber_SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStyle {
    /// Quiet unless asked, pretty output without timestamps.
    Cli,
    /// Info by default, compact timestamped lines.
    Server,
}

fn default_level(verbose: bool, style: LogStyle) -> LevelFilter {
    match (verbose, style) {
        (true, _) => LevelFilter::DEBUG,
        (false, LogStyle::Server) => LevelFilter::INFO,
        (false, LogStyle::Cli) => LevelFilter::OFF,
    }
}

pub fn init_logging(verbose: bool, style: LogStyle) {
    let level_filter = default_level(verbose, style);
    let app_filter = Targets::new().with_target("etfcache", level_filter);
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_filter.to_string()));

    let fmt_layer = match style {
        LogStyle::Cli => fmt::layer().pretty().without_time().boxed(),
        LogStyle::Server => fmt::layer().compact().with_target(false).boxed(),
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(app_filter)
        .with(env_filter)
        .init();
}

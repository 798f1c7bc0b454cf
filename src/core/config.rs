use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use std::{fs, path::PathBuf};
use tracing::debug;

/// Known domestic fund codes and their exchange-qualified symbols.
const DEFAULT_SYMBOL_MAP: &[(&str, &str)] = &[
    ("510050", "510050.SS"),
    ("510300", "510300.SS"),
    ("510500", "510500.SS"),
    ("159919", "159919.SZ"),
    ("512000", "512000.SS"),
    ("512170", "512170.SS"),
    ("512800", "512800.SS"),
    ("515050", "515050.SS"),
    ("159915", "159915.SZ"),
    ("516160", "516160.SS"),
    ("515000", "515000.SS"),
    ("516970", "516970.SS"),
    ("510880", "510880.SS"),
    ("515180", "515180.SS"),
    ("513130", "513130.SS"),
    ("159941", "159941.SZ"),
    ("518880", "518880.SS"),
    ("512290", "512290.SS"),
    ("159928", "159928.SZ"),
    ("510900", "510900.SS"),
    ("512690", "512690.SS"),
    ("159949", "159949.SZ"),
    ("515880", "515880.SS"),
    ("516770", "516770.SS"),
    ("159920", "159920.SS"),
    ("512070", "512070.SS"),
    ("512960", "512960.SS"),
    ("513500", "513500.SS"),
    ("513600", "513600.SS"),
    ("159967", "159967.SZ"),
    ("513050", "513050.SS"),
    ("515680", "515680.SS"),
];

pub const STORE_FILE_NAME: &str = "etf_monthly.json";

fn default_tickers() -> Vec<String> {
    DEFAULT_SYMBOL_MAP
        .iter()
        .map(|(code, _)| code.to_string())
        .collect()
}

fn default_symbol_map() -> BTreeMap<String, String> {
    DEFAULT_SYMBOL_MAP
        .iter()
        .map(|(code, symbol)| (code.to_string(), symbol.to_string()))
        .collect()
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EastmoneyProviderConfig {
    pub base_url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct YahooProviderConfig {
    pub base_url: String,
}

fn default_timeout_secs() -> u64 {
    6
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProvidersConfig {
    pub eastmoney: Option<EastmoneyProviderConfig>,
    pub yahoo: Option<YahooProviderConfig>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        ProvidersConfig {
            eastmoney: Some(EastmoneyProviderConfig {
                base_url: "https://fundmobapi.eastmoney.com".to_string(),
            }),
            yahoo: Some(YahooProviderConfig {
                base_url: "https://query1.finance.yahoo.com".to_string(),
            }),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ProvidersConfig {
    pub fn eastmoney_base_url(&self) -> &str {
        self.eastmoney
            .as_ref()
            .map_or("https://fundmobapi.eastmoney.com", |p| &p.base_url)
    }

    pub fn yahoo_base_url(&self) -> &str {
        self.yahoo
            .as_ref()
            .map_or("https://query1.finance.yahoo.com", |p| &p.base_url)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_max_age_hours() -> u64 {
    6
}

fn default_concurrency() -> usize {
    4
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_max_age_hours")]
    pub max_age_hours: u64,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    pub store_path: Option<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            max_age_hours: default_max_age_hours(),
            concurrency: default_concurrency(),
            store_path: None,
        }
    }
}

impl CacheConfig {
    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_hours.saturating_mul(60 * 60))
    }
}

fn default_bind() -> String {
    "127.0.0.1:5000".to_string()
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind: default_bind(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    #[serde(default = "default_tickers")]
    pub tickers: Vec<String>,
    #[serde(default = "default_symbol_map")]
    pub symbol_map: BTreeMap<String, String>,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub server: ServerConfig,
    pub data_path: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            tickers: default_tickers(),
            symbol_map: default_symbol_map(),
            providers: ProvidersConfig::default(),
            cache: CacheConfig::default(),
            server: ServerConfig::default(),
            data_path: None,
        }
    }
}

impl AppConfig {
    /// Loads the config at the default location, falling back to built-in
    /// defaults when no file has been created yet.
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        if !config_path.exists() {
            debug!(
                "No config at {}, using built-in defaults",
                config_path.display()
            );
            return Ok(Self::default());
        }
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("io", "etfcache", "etfcache")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn default_data_path(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.data_path {
            return Ok(PathBuf::from(custom_path));
        }
        let proj_dirs = ProjectDirs::from("io", "etfcache", "etfcache")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.data_dir().to_path_buf())
    }

    pub fn store_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.cache.store_path {
            return Ok(PathBuf::from(path));
        }
        Ok(self.default_data_path()?.join(STORE_FILE_NAME))
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }
}

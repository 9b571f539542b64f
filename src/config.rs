// src/config.rs
use std::env;
use std::path::PathBuf;

/// Runtime configuration, environment-driven with working defaults so the
/// binary runs unconfigured against a local `dados_ida/` directory.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding the downloaded ODS exports.
    pub data_dir: PathBuf,
    /// Where the staging Parquet file is written.
    pub out_dir: PathBuf,
    /// Snapshot cache directory; unset disables the cache.
    pub cache_dir: Option<PathBuf>,
    /// Optional YAML rules file overriding the built-in matching rules.
    pub rules_file: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Config {
        Config {
            data_dir: env_path("IDA_DATA_DIR").unwrap_or_else(|| PathBuf::from("dados_ida")),
            out_dir: env_path("IDA_OUT_DIR").unwrap_or_else(|| PathBuf::from("staging")),
            cache_dir: env_path("IDA_CACHE_DIR"),
            rules_file: env_path("IDA_RULES_FILE"),
        }
    }
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var_os(key)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

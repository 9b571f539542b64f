use anyhow::{bail, Result};
use idanorm::{
    cache::SnapshotCache,
    config::Config,
    normalize::{rules::Rules, Normalizer},
    stage::{ParquetSink, StagingSink},
};
use std::fs;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder().with_env_filter(env).init();
    info!("startup");

    // ─── 2) configure ────────────────────────────────────────────────
    let config = Config::from_env();
    fs::create_dir_all(&config.out_dir)?;

    let rules = match &config.rules_file {
        Some(path) => {
            info!(path = %path.display(), "loading rules file");
            Rules::from_yaml_file(path)?
        }
        None => Rules::default(),
    };

    let mut normalizer = Normalizer::new(&rules)?;
    if let Some(cache_dir) = &config.cache_dir {
        normalizer.set_cache(SnapshotCache::new(cache_dir)?);
    }

    // ─── 3) normalize the batch ──────────────────────────────────────
    info!(dir = %config.data_dir.display(), "processing ODS exports");
    let (dataset, summary) = normalizer.process_all(&config.data_dir)?;

    if dataset.is_empty() {
        warn!(
            files_seen = summary.files_seen,
            "run produced no observations"
        );
        bail!("no data produced from {:?}", config.data_dir);
    }

    // ─── 4) hand off to the staging layer ────────────────────────────
    let out_path = config.out_dir.join("staging_ida.parquet");
    let mut sink = ParquetSink::new(&out_path);
    let loaded = sink.load(&dataset)?;

    info!(
        files_seen = summary.files_seen,
        files_normalized = summary.files_normalized,
        observations = summary.observations,
        loaded,
        "run complete"
    );
    Ok(())
}

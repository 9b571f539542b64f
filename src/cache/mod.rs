// src/cache/mod.rs
//
// Optional per-file snapshot cache: each source file's normalized output is
// persisted as a Parquet file keyed by the source filename, so re-runs skip
// re-parsing unchanged spreadsheets. A snapshot must reproduce the exact
// logical rows of a fresh parse; it is invalidated when the source file's
// mtime is newer than the snapshot's.

use crate::normalize::record::Observation;
use crate::stage;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, warn};

pub struct SnapshotCache {
    cache_dir: PathBuf,
}

impl SnapshotCache {
    /// Open (and create if needed) a snapshot directory.
    pub fn new(cache_dir: impl Into<PathBuf>) -> Result<Self> {
        let cache_dir = cache_dir.into();
        fs::create_dir_all(&cache_dir)
            .with_context(|| format!("creating cache directory {:?}", cache_dir))?;
        Ok(SnapshotCache { cache_dir })
    }

    fn snapshot_path(&self, source_name: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.parquet", source_name))
    }

    /// Load the snapshot for `source`, if one exists and is not stale.
    /// Any read problem counts as a miss; the caller re-parses.
    pub fn get(&self, source: &Path) -> Option<Vec<Observation>> {
        let name = source.file_name()?.to_string_lossy().to_string();
        let snap = self.snapshot_path(&name);
        if !snap.is_file() {
            return None;
        }
        if is_stale(source, &snap) {
            debug!(file = %name, "snapshot stale; re-parsing");
            return None;
        }
        match stage::read_parquet(&snap) {
            Ok(rows) => {
                debug!(file = %name, rows = rows.len(), "snapshot hit");
                Some(rows)
            }
            Err(err) => {
                warn!(file = %name, %err, "unreadable snapshot; re-parsing");
                None
            }
        }
    }

    /// Persist `rows` as the snapshot for `source`. Failures are logged and
    /// swallowed: the cache is a performance layer, never a correctness one.
    pub fn put(&self, source: &Path, rows: &[Observation]) {
        let name = match source.file_name() {
            Some(n) => n.to_string_lossy().to_string(),
            None => return,
        };
        let snap = self.snapshot_path(&name);
        let result = stage::to_record_batch(rows)
            .and_then(|batch| stage::write_parquet(&snap, &batch));
        match result {
            Ok(()) => debug!(file = %name, rows = rows.len(), "snapshot written"),
            Err(err) => warn!(file = %name, %err, "failed to write snapshot"),
        }
    }
}

/// Stale when the source has been modified after the snapshot was written.
/// Missing mtimes (exotic filesystems) err on the side of re-parsing.
fn is_stale(source: &Path, snapshot: &Path) -> bool {
    fn mtime(p: &Path) -> Option<SystemTime> {
        fs::metadata(p).ok()?.modified().ok()
    }
    match (mtime(source), mtime(snapshot)) {
        (Some(src), Some(snap)) => src > snap,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    fn obs(mes: u32) -> Observation {
        Observation {
            ano: 2015,
            mes,
            ano_mes: format!("2015-{:02}", mes),
            servico: "SMP".into(),
            grupo_economico: "VIVO".into(),
            variavel: "IDA".into(),
            valor: 91.2,
            arquivo_origem: "SMP2015.ods".into(),
        }
    }

    #[test]
    fn put_then_get_round_trips() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("SMP2015.ods");
        File::create(&source).unwrap().write_all(b"stub").unwrap();

        let cache = SnapshotCache::new(dir.path().join("cache")).unwrap();
        let rows = vec![obs(1), obs(2)];
        cache.put(&source, &rows);
        assert_eq!(cache.get(&source), Some(rows));
    }

    #[test]
    fn missing_snapshot_is_a_miss() {
        let dir = tempdir().unwrap();
        let cache = SnapshotCache::new(dir.path().join("cache")).unwrap();
        assert_eq!(cache.get(&dir.path().join("SCM2015.ods")), None);
    }

    #[test]
    fn modified_source_invalidates_snapshot() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("STFC2015.ods");
        File::create(&source).unwrap().write_all(b"v1").unwrap();

        let cache = SnapshotCache::new(dir.path().join("cache")).unwrap();
        cache.put(&source, &[obs(1)]);

        // Rewrite the source with a strictly newer mtime.
        let newer = SystemTime::now() + std::time::Duration::from_secs(5);
        File::create(&source).unwrap().write_all(b"v2").unwrap();
        let f = File::open(&source).unwrap();
        f.set_modified(newer).unwrap();

        assert_eq!(cache.get(&source), None);
    }
}

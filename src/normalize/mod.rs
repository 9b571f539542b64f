// src/normalize/mod.rs
//
// The normalization engine: locate the layout, classify columns, unpivot,
// clean, and batch the portal's ODS exports into the staging record set.

pub mod clean;
pub mod columns;
pub mod layout;
pub mod period;
pub mod record;
pub mod reshape;
pub mod rules;

use crate::cache::SnapshotCache;
use crate::sheet::RawSheet;
use anyhow::{Context, Result};
use glob::glob;
use once_cell::sync::Lazy;
use record::{Dataset, Observation, RunSummary};
use regex::Regex;
use rules::{RuleBook, Rules};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

static YEAR_RUN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{4}").expect("static regex"));

/// Metadata carried by a filename like `SCM2015.ods`: the service tag is
/// the stem with digits stripped, the target year its first 4-digit run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMeta {
    pub servico: String,
    pub target_year: Option<i32>,
    pub arquivo: String,
}

impl FileMeta {
    pub fn from_path(path: &Path) -> FileMeta {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let servico: String = stem
            .chars()
            .filter(|c| !c.is_ascii_digit())
            .collect::<String>()
            .to_uppercase();
        let target_year = YEAR_RUN_RE
            .find(&stem)
            .and_then(|m| m.as_str().parse().ok());
        let arquivo = path
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        FileMeta {
            servico,
            target_year,
            arquivo,
        }
    }
}

/// Per-run normalizer: compiled rules plus an optional snapshot cache.
pub struct Normalizer {
    book: RuleBook,
    cache: Option<SnapshotCache>,
}

impl Normalizer {
    pub fn new(rules: &Rules) -> Result<Normalizer> {
        Ok(Normalizer {
            book: rules.compile()?,
            cache: None,
        })
    }

    pub fn with_default_rules() -> Normalizer {
        Normalizer {
            book: RuleBook::default_book(),
            cache: None,
        }
    }

    pub fn set_cache(&mut self, cache: SnapshotCache) {
        self.cache = Some(cache);
    }

    /// Normalize one already-loaded sheet. A sheet that does not match the
    /// expected layout yields an empty vec, never an error.
    pub fn normalize_sheet(&self, sheet: &RawSheet, meta: &FileMeta) -> Vec<Observation> {
        let anchor = match layout::locate(sheet, &self.book) {
            Some(a) => a,
            None => {
                warn!(
                    file = %meta.arquivo,
                    rows = sheet.n_rows(),
                    cols = sheet.n_cols(),
                    "no header marker; file yields zero rows"
                );
                return Vec::new();
            }
        };

        let banner = period::sheet_period_hint(sheet, &self.book);
        let hint = period::PeriodHint {
            // The filename-declared year outranks the banner year.
            ano: meta.target_year.or(banner.ano),
            mes: banner.mes,
        };

        let headers = &sheet.rows[anchor.header_row];
        let data = &sheet.rows[anchor.data_start..];
        let plan = columns::classify(headers, data, &self.book);
        if !plan.is_usable() {
            warn!(
                file = %meta.arquivo,
                rows = sheet.n_rows(),
                cols = sheet.n_cols(),
                periods = plan.period_cols.len(),
                "no classifiable columns; file yields zero rows"
            );
            return Vec::new();
        }

        let long = reshape::reshape(data, &plan);
        let cleaned = clean::clean(&long, &self.book, hint, meta.target_year);

        let fallbacks = cleaned.iter().filter(|c| c.fallback_period).count();
        if fallbacks > 0 {
            warn!(file = %meta.arquivo, rows = fallbacks, "observations kept a fallback period");
        }

        cleaned
            .into_iter()
            // Fixed sign filter: the IDA indicators are never negative.
            .filter(|c| c.valor >= 0.0)
            .map(|c| Observation {
                ano_mes: format!("{}-{:02}", c.ano, c.mes),
                ano: c.ano,
                mes: c.mes,
                servico: meta.servico.clone(),
                grupo_economico: c.grupo_economico,
                variavel: c.variavel,
                valor: c.valor,
                arquivo_origem: meta.arquivo.clone(),
            })
            .collect()
    }

    /// Normalize one file from disk, consulting the snapshot cache first.
    pub fn normalize_file(&self, path: &Path) -> Result<Vec<Observation>> {
        if let Some(cache) = &self.cache {
            if let Some(rows) = cache.get(path) {
                return Ok(rows);
            }
        }

        let meta = FileMeta::from_path(path);
        let sheet = RawSheet::from_file(path)?;
        debug!(
            file = %meta.arquivo,
            rows = sheet.n_rows(),
            cols = sheet.n_cols(),
            servico = %meta.servico,
            target_year = ?meta.target_year,
            "sheet read"
        );
        let rows = self.normalize_sheet(&sheet, &meta);

        if let Some(cache) = &self.cache {
            cache.put(path, &rows);
        }
        Ok(rows)
    }

    /// Process every `*.ods` in `dir` (non-recursive, sorted by name for
    /// reproducibility) into one dataset. A single file's failure logs a
    /// warning and the batch continues; an empty result is the caller's
    /// "no data produced" condition to handle.
    pub fn process_all(&self, dir: &Path) -> Result<(Dataset, RunSummary)> {
        let pattern = format!("{}/*.ods", dir.display());
        let mut files: Vec<PathBuf> = glob(&pattern)
            .with_context(|| format!("bad glob pattern `{}`", pattern))?
            .filter_map(|entry| entry.ok())
            .filter(|p| p.is_file())
            .collect();
        files.sort();

        let mut dataset = Dataset::default();
        let mut summary = RunSummary {
            files_seen: files.len(),
            ..RunSummary::default()
        };

        if files.is_empty() {
            warn!(dir = %dir.display(), "no .ods files found");
            return Ok((dataset, summary));
        }

        for path in &files {
            let name = path
                .file_name()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default();
            match self.normalize_file(path) {
                Ok(rows) if rows.is_empty() => {
                    warn!(file = %name, "file produced no observations");
                }
                Ok(rows) => {
                    info!(file = %name, rows = rows.len(), "file normalized");
                    summary.files_normalized += 1;
                    dataset.extend(rows);
                }
                Err(err) => {
                    warn!(file = %name, %err, "skipping unreadable file");
                }
            }
        }

        summary.observations = dataset.len();
        info!(
            files_seen = summary.files_seen,
            files_normalized = summary.files_normalized,
            observations = summary.observations,
            "batch complete"
        );
        Ok((dataset, summary))
    }
}

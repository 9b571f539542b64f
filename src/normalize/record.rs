// src/normalize/record.rs
use serde::{Deserialize, Serialize};

/// The canonical observation handed to the loading collaborator. This is
/// the versioned boundary contract: the staging loader consumes exactly
/// these columns and must assume no others.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub ano: i32,
    pub mes: u32,
    /// `YYYY-MM`, month zero-padded.
    pub ano_mes: String,
    /// Service tag from the filename stem, digits stripped, upper-cased.
    pub servico: String,
    pub grupo_economico: String,
    pub variavel: String,
    pub valor: f64,
    pub arquivo_origem: String,
}

/// Ordered concatenation of all files' observations in one run. Rebuilt
/// from scratch each run; append-only while the run lasts.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub rows: Vec<Observation>,
}

impl Dataset {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn extend(&mut self, rows: Vec<Observation>) {
        self.rows.extend(rows);
    }
}

/// Totals for the run's final status line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub files_seen: usize,
    pub files_normalized: usize,
    pub observations: usize,
}

// src/normalize/rules.rs
use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Declarative matching rules for the layout and column stages. Kept as data
/// (optionally loaded from a YAML file) so new header variants from the
/// portal can be added without touching the reshaping code.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Rules {
    /// Regexes matched against accent-folded, upper-cased cell text to find
    /// the header marker row. The portal's exports have shipped the marker
    /// with at least three different encodings of the accented "Ô".
    pub marker_patterns: Vec<String>,
    /// Portuguese month abbreviations, in month order (index + 1 = month).
    pub month_abbrev: Vec<String>,
    /// Token announcing a sheet-level period banner, e.g. "PERÍODO: OUT/2015".
    pub period_banner: String,
}

impl Default for Rules {
    fn default() -> Self {
        Rules {
            marker_patterns: vec!["^GRUPO ECON.{0,2}MICO$".into()],
            month_abbrev: [
                "JAN", "FEV", "MAR", "ABR", "MAI", "JUN", "JUL", "AGO", "SET", "OUT", "NOV", "DEZ",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            period_banner: "PERIODO".into(),
        }
    }
}

impl Rules {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Rules> {
        let path = path.as_ref();
        let text =
            fs::read_to_string(path).with_context(|| format!("reading rules file {:?}", path))?;
        serde_yaml::from_str(&text).with_context(|| format!("parsing rules file {:?}", path))
    }

    /// Compile into a `RuleBook` ready for matching.
    pub fn compile(&self) -> Result<RuleBook> {
        let markers = self
            .marker_patterns
            .iter()
            .map(|p| Regex::new(p).with_context(|| format!("invalid marker pattern `{}`", p)))
            .collect::<Result<Vec<_>>>()?;
        Ok(RuleBook {
            markers,
            months: self.month_abbrev.iter().map(|m| fold_upper(m)).collect(),
            period_banner: fold_upper(&self.period_banner),
        })
    }
}

/// Compiled form of [`Rules`]; built once per run.
#[derive(Debug)]
pub struct RuleBook {
    markers: Vec<Regex>,
    months: Vec<String>,
    period_banner: String,
}

impl RuleBook {
    pub fn default_book() -> RuleBook {
        // Built-in defaults are known-good patterns.
        Rules::default().compile().expect("default rules compile")
    }

    /// Does this (already folded) cell text mark the header row?
    pub fn is_marker(&self, folded: &str) -> bool {
        self.markers.iter().any(|re| re.is_match(folded))
    }

    /// Month number for a 3-letter abbreviation, if it is in the table.
    pub fn month_number(&self, abbrev: &str) -> Option<u32> {
        let folded = fold_upper(abbrev);
        self.months
            .iter()
            .position(|m| *m == folded)
            .map(|i| i as u32 + 1)
    }

    /// Is this token one of the known month abbreviations?
    pub fn is_month_abbrev(&self, token: &str) -> bool {
        self.month_number(token).is_some()
    }

    pub fn is_period_banner(&self, folded: &str) -> bool {
        folded.contains(&self.period_banner)
    }
}

/// Upper-case and strip Portuguese diacritics so header text compares
/// stably across the portal's mixed encodings.
pub fn fold_upper(s: &str) -> String {
    s.trim()
        .chars()
        .map(|c| match c {
            'á' | 'à' | 'â' | 'ã' | 'ä' | 'Á' | 'À' | 'Â' | 'Ã' | 'Ä' => 'A',
            'é' | 'è' | 'ê' | 'ë' | 'É' | 'È' | 'Ê' | 'Ë' => 'E',
            'í' | 'ì' | 'î' | 'ï' | 'Í' | 'Ì' | 'Î' | 'Ï' => 'I',
            'ó' | 'ò' | 'ô' | 'õ' | 'ö' | 'Ó' | 'Ò' | 'Ô' | 'Õ' | 'Ö' => 'O',
            'ú' | 'ù' | 'û' | 'ü' | 'Ú' | 'Ù' | 'Û' | 'Ü' => 'U',
            'ç' | 'Ç' => 'C',
            c => c.to_ascii_uppercase(),
        })
        .collect()
}

// src/normalize/period.rs
use crate::normalize::rules::{fold_upper, RuleBook};
use crate::sheet::{Cell, RawSheet};
use chrono::Datelike;
use once_cell::sync::Lazy;
use regex::Regex;

/// Placeholder year meaning "parsing failed and no hint was available".
/// Downstream consumers should treat (2015, 1) observations that carry the
/// `Fallback` variant as suspect.
pub const FALLBACK_YEAR: i32 = 2015;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Period {
    pub ano: i32,
    pub mes: u32,
}

/// How a period was obtained. Kept as a variant rather than a bare pair so
/// the cleaner can tell a real 2015-01 from a fell-back one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParsedPeriod {
    /// From a structured date cell.
    FromDate(Period),
    /// From label text (`YYYY-MM` family or `MMM/YYYY`).
    FromLabel(Period),
    /// Nothing matched; the hint (or the fixed default) was used.
    Fallback(Period),
}

impl ParsedPeriod {
    pub fn period(&self) -> Period {
        match *self {
            ParsedPeriod::FromDate(p) | ParsedPeriod::FromLabel(p) | ParsedPeriod::Fallback(p) => p,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, ParsedPeriod::Fallback(_))
    }
}

/// Per-file defaults used when a label cannot be interpreted: the filename's
/// target year and/or a sheet-level "PERÍODO: MMM/YYYY" banner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PeriodHint {
    pub ano: Option<i32>,
    pub mes: Option<u32>,
}

impl PeriodHint {
    fn fallback(&self) -> Period {
        Period {
            ano: self.ano.unwrap_or(FALLBACK_YEAR),
            mes: self.mes.unwrap_or(1),
        }
    }
}

// "2015-01", "2015.10", "2015_1"
static YEAR_MONTH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{4})\s*[\-._]\s*(\d{1,2})").expect("static regex"));

// "OUT/2015"
static MONTH_YEAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([A-Za-zÀ-ÿ]{3})\s*/\s*(\d{4})").expect("static regex"));

/// Total period extraction for a cell: structured dates first, then the
/// label conventions, then the fallback. Never fails.
pub fn parse_cell(cell: &Cell, rules: &RuleBook, hint: PeriodHint) -> ParsedPeriod {
    if let Cell::Date(dt) = cell {
        return ParsedPeriod::FromDate(Period {
            ano: dt.year(),
            mes: dt.month(),
        });
    }
    parse_label(&cell.display(), rules, hint)
}

/// Total period extraction for a textual label. Precedence: `YYYY<sep>MM`
/// with sep in {-, ., _}, then `MMM/YYYY` (unknown abbreviation maps to
/// month 1), then the hint/default fallback.
pub fn parse_label(label: &str, rules: &RuleBook, hint: PeriodHint) -> ParsedPeriod {
    if let Some(caps) = YEAR_MONTH_RE.captures(label) {
        let ano: i32 = caps[1].parse().unwrap_or(FALLBACK_YEAR);
        if let Ok(mes @ 1..=12) = caps[2].parse::<u32>() {
            return ParsedPeriod::FromLabel(Period { ano, mes });
        }
    }

    if let Some(caps) = MONTH_YEAR_RE.captures(label) {
        if let Ok(ano) = caps[2].parse::<i32>() {
            let mes = rules.month_number(&caps[1]).unwrap_or(1);
            return ParsedPeriod::FromLabel(Period { ano, mes });
        }
    }

    ParsedPeriod::Fallback(hint.fallback())
}

/// Scan a sheet for a "PERÍODO: MMM/YYYY" banner above the data region and
/// turn it into a hint. Sheets without a banner get an empty hint.
pub fn sheet_period_hint(sheet: &RawSheet, rules: &RuleBook) -> PeriodHint {
    for row in &sheet.rows {
        let joined = row
            .iter()
            .filter_map(|c| c.as_text())
            .collect::<Vec<_>>()
            .join(" ");
        let folded = fold_upper(&joined);
        if !rules.is_period_banner(&folded) {
            continue;
        }
        if let Some(caps) = MONTH_YEAR_RE.captures(&folded) {
            if let Ok(ano) = caps[2].parse::<i32>() {
                return PeriodHint {
                    ano: Some(ano),
                    mes: rules.month_number(&caps[1]),
                };
            }
        }
    }
    PeriodHint::default()
}

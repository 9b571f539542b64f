// src/normalize/clean.rs
use crate::normalize::period::{parse_cell, PeriodHint};
use crate::normalize::reshape::LongRow;
use crate::normalize::rules::RuleBook;
use crate::sheet::Cell;
use std::collections::HashSet;
use tracing::debug;

/// A fully typed observation for one (year, month, entity, metric) key,
/// still missing the batch-level stamps (service, source file).
#[derive(Debug, Clone, PartialEq)]
pub struct CleanedRow {
    pub ano: i32,
    pub mes: u32,
    pub grupo_economico: String,
    pub variavel: String,
    pub valor: f64,
    /// The period came from the fallback hint, not the label itself.
    pub fallback_period: bool,
}

/// Coerce and filter the long table into typed observations:
/// parse each period label, coerce values to f64 (comma decimals allowed,
/// anything else drops the row), enforce the filename-declared target year
/// when present, and deduplicate on (year, month, group, metric) keeping
/// the first occurrence. Order is stable with respect to the input.
pub fn clean(
    rows: &[LongRow],
    rules: &RuleBook,
    hint: PeriodHint,
    target_year: Option<i32>,
) -> Vec<CleanedRow> {
    let mut seen: HashSet<(i32, u32, String, String)> = HashSet::new();
    let mut out = Vec::new();
    let mut dropped_value = 0usize;
    let mut dropped_year = 0usize;

    for row in rows {
        let parsed = parse_cell(&row.period, rules, hint);
        let period = parsed.period();

        let valor = match coerce_value(&row.valor) {
            Some(v) => v,
            None => {
                dropped_value += 1;
                continue;
            }
        };

        if let Some(target) = target_year {
            if period.ano != target {
                dropped_year += 1;
                continue;
            }
        }

        let key = (
            period.ano,
            period.mes,
            row.grupo_economico.clone(),
            row.variavel.clone(),
        );
        if !seen.insert(key) {
            continue;
        }

        out.push(CleanedRow {
            ano: period.ano,
            mes: period.mes,
            grupo_economico: row.grupo_economico.clone(),
            variavel: row.variavel.clone(),
            valor,
            fallback_period: parsed.is_fallback(),
        });
    }

    debug!(
        kept = out.len(),
        dropped_value, dropped_year, "long table cleaned"
    );
    out
}

/// Numeric coercion: numbers pass through, text accepts a comma decimal
/// separator (with dots as thousands separators). Anything else is absent.
pub fn coerce_value(cell: &Cell) -> Option<f64> {
    let v = match cell {
        Cell::Number(n) => Some(*n),
        Cell::Text(s) => {
            let t: String = s.trim().chars().filter(|c| !c.is_whitespace()).collect();
            let t = if t.contains(',') {
                t.replace('.', "").replace(',', ".")
            } else {
                t
            };
            t.parse::<f64>().ok()
        }
        Cell::Empty | Cell::Date(_) | Cell::Bool(_) => None,
    };
    v.filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Cell {
        Cell::Text(s.into())
    }

    fn long(grupo: &str, variavel: &str, period: &str, valor: Cell) -> LongRow {
        LongRow {
            grupo_economico: grupo.into(),
            variavel: variavel.into(),
            period: text(period),
            valor,
        }
    }

    fn book() -> RuleBook {
        RuleBook::default_book()
    }

    #[test]
    fn comma_decimals_coerce() {
        assert_eq!(coerce_value(&text("87,5")), Some(87.5));
        assert_eq!(coerce_value(&text("1.234,56")), Some(1234.56));
        assert_eq!(coerce_value(&text("92.0")), Some(92.0));
        assert_eq!(coerce_value(&Cell::Number(3.25)), Some(3.25));
        assert_eq!(coerce_value(&text("n/d")), None);
        assert_eq!(coerce_value(&Cell::Empty), None);
    }

    #[test]
    fn unparseable_values_drop_silently() {
        let rows = vec![
            long("ALGAR", "IDA", "2015-01", text("87,5")),
            long("ALGAR", "IDA", "2015-02", text("ver nota 3")),
        ];
        let cleaned = clean(&rows, &book(), PeriodHint::default(), None);
        assert_eq!(cleaned.len(), 1);
        assert_eq!(cleaned[0].valor, 87.5);
        assert_eq!(cleaned[0].mes, 1);
    }

    #[test]
    fn target_year_filter_drops_foreign_years() {
        let rows = vec![
            long("ALGAR", "IDA", "2015-12", Cell::Number(1.0)),
            long("ALGAR", "IDA", "2016-01", Cell::Number(2.0)),
        ];
        let cleaned = clean(&rows, &book(), PeriodHint::default(), Some(2015));
        assert_eq!(cleaned.len(), 1);
        assert_eq!(cleaned[0].ano, 2015);
    }

    #[test]
    fn dedup_keeps_first_occurrence() {
        let rows = vec![
            long("ALGAR", "IDA", "2015-01", Cell::Number(1.0)),
            long("ALGAR", "IDA", "2015-01", Cell::Number(999.0)),
        ];
        let cleaned = clean(&rows, &book(), PeriodHint::default(), None);
        assert_eq!(cleaned.len(), 1);
        assert_eq!(cleaned[0].valor, 1.0);
    }

    #[test]
    fn cleaning_is_idempotent() {
        let rows = vec![
            long("ALGAR", "IDA", "2015-01", Cell::Number(1.0)),
            long("OI", "IDA", "2015-01", text("87,5")),
            long("ALGAR", "IDA", "2015-01", Cell::Number(2.0)),
            long("ALGAR", "IDA", "sem período", text("x")),
        ];
        let once = clean(&rows, &book(), PeriodHint::default(), None);
        // Re-cleaning the surviving rows changes nothing.
        let again: Vec<LongRow> = once
            .iter()
            .map(|c| {
                long(
                    &c.grupo_economico,
                    &c.variavel,
                    &format!("{}-{:02}", c.ano, c.mes),
                    Cell::Number(c.valor),
                )
            })
            .collect();
        let twice = clean(&again, &book(), PeriodHint::default(), None);
        assert_eq!(once, twice);
    }

    #[test]
    fn fallback_periods_are_flagged() {
        let rows = vec![long("ALGAR", "IDA", "???", Cell::Number(1.0))];
        let hint = PeriodHint {
            ano: Some(2015),
            mes: None,
        };
        let cleaned = clean(&rows, &book(), hint, None);
        assert!(cleaned[0].fallback_period);
        assert_eq!((cleaned[0].ano, cleaned[0].mes), (2015, 1));
    }
}

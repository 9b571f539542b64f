// src/normalize/columns.rs
use crate::normalize::rules::{fold_upper, RuleBook};
use crate::sheet::Cell;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

static YEAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{4}").expect("static regex"));

/// One temporal value column, keeping the raw header cell so the period
/// parser can see structured dates as well as label text.
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodColumn {
    pub idx: usize,
    pub label: Cell,
}

/// The column partition for one sheet's data region. `group_idx` and
/// `metric_idx` point at the entity and metric identifier columns; when the
/// sheet names fewer than two identifiers, both point at the same column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnPlan {
    pub group_idx: Option<usize>,
    pub metric_idx: Option<usize>,
    pub period_cols: Vec<PeriodColumn>,
}

impl ColumnPlan {
    /// A plan with no identifier or no period columns cannot produce rows.
    pub fn is_usable(&self) -> bool {
        self.group_idx.is_some() && !self.period_cols.is_empty()
    }
}

/// Partition header columns into identifier and period columns.
///
/// A label is a period column if it contains a 4-digit year or a month
/// abbreviation from the rule table; a structured date header is always a
/// period column. Remaining non-empty labels are identifiers in header
/// order, the first two taking the group and metric roles positionally.
/// When the primary rule finds no period columns, labeled columns whose
/// data cells are all numeric are used instead. Unlabeled columns are left
/// out of the output entirely.
pub fn classify(headers: &[Cell], data: &[Vec<Cell>], rules: &RuleBook) -> ColumnPlan {
    let mut period_cols: Vec<PeriodColumn> = Vec::new();
    let mut labeled: Vec<usize> = Vec::new();

    for (idx, cell) in headers.iter().enumerate() {
        if matches!(cell, Cell::Date(_)) {
            period_cols.push(PeriodColumn {
                idx,
                label: cell.clone(),
            });
            continue;
        }
        let label = cell.display();
        if label.is_empty() {
            continue;
        }
        if is_period_label(&label, rules) {
            period_cols.push(PeriodColumn {
                idx,
                label: cell.clone(),
            });
        } else {
            labeled.push(idx);
        }
    }

    if period_cols.is_empty() {
        // Secondary rule: no label matched, fall back to numeric-typed
        // columns among the labeled ones.
        let numeric: Vec<usize> = labeled
            .iter()
            .copied()
            .filter(|&idx| column_is_numeric(data, idx))
            .collect();
        if !numeric.is_empty() {
            warn!(
                cols = numeric.len(),
                "no period labels matched; using numeric-typed columns"
            );
        }
        for idx in &numeric {
            period_cols.push(PeriodColumn {
                idx: *idx,
                label: headers[*idx].clone(),
            });
        }
        labeled.retain(|idx| !numeric.contains(idx));
    }

    let group_idx = labeled.first().copied();
    let metric_idx = labeled.get(1).copied().or(group_idx);

    debug!(
        identifiers = labeled.len(),
        periods = period_cols.len(),
        "columns classified"
    );

    ColumnPlan {
        group_idx,
        metric_idx,
        period_cols,
    }
}

/// Primary rule: a 4-digit year substring or a month-abbreviation token.
fn is_period_label(label: &str, rules: &RuleBook) -> bool {
    if YEAR_RE.is_match(label) {
        return true;
    }
    fold_upper(label)
        .split(|c: char| !c.is_ascii_alphabetic())
        .any(|tok| tok.len() == 3 && rules.is_month_abbrev(tok))
}

/// True when the column holds at least one value and every non-empty cell
/// is numeric.
fn column_is_numeric(data: &[Vec<Cell>], idx: usize) -> bool {
    let mut seen = false;
    for row in data {
        match row.get(idx) {
            None | Some(Cell::Empty) => {}
            Some(Cell::Number(_)) => seen = true,
            Some(_) => return false,
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Cell {
        Cell::Text(s.into())
    }

    fn book() -> RuleBook {
        RuleBook::default_book()
    }

    #[test]
    fn years_and_month_abbrevs_are_periods() {
        let headers = vec![
            text("Grupo Econômico"),
            text("Variável"),
            text("2015-01"),
            text("JAN/2016"),
            text("dez"),
        ];
        let plan = classify(&headers, &[], &book());
        assert_eq!(plan.group_idx, Some(0));
        assert_eq!(plan.metric_idx, Some(1));
        let period_idx: Vec<usize> = plan.period_cols.iter().map(|p| p.idx).collect();
        assert_eq!(period_idx, vec![2, 3, 4]);
    }

    #[test]
    fn month_rule_needs_a_whole_token() {
        // "MARCA" contains "MAR" but is not a month column.
        assert!(!is_period_label("Marca", &book()));
        assert!(is_period_label("mar/2015", &book()));
        assert!(is_period_label("SET", &book()));
    }

    #[test]
    fn single_identifier_serves_both_roles() {
        let headers = vec![text("Grupo Econômico"), text("2015-01")];
        let plan = classify(&headers, &[], &book());
        assert_eq!(plan.group_idx, Some(0));
        assert_eq!(plan.metric_idx, Some(0));
        assert!(plan.is_usable());
    }

    #[test]
    fn numeric_fallback_only_when_primary_rule_is_empty() {
        let headers = vec![text("Grupo"), text("Indicador"), text("Taxa")];
        let data = vec![
            vec![text("ALGAR"), text("IDA"), Cell::Number(87.5)],
            vec![text("OI"), text("IDA"), Cell::Number(92.0)],
        ];
        let plan = classify(&headers, &data, &book());
        assert_eq!(plan.period_cols.len(), 1);
        assert_eq!(plan.period_cols[0].idx, 2);
        assert_eq!(plan.group_idx, Some(0));
        assert_eq!(plan.metric_idx, Some(1));
    }

    #[test]
    fn nothing_classifiable_yields_unusable_plan() {
        let headers = vec![text("Grupo"), text("Indicador")];
        let data = vec![vec![text("ALGAR"), text("IDA")]];
        let plan = classify(&headers, &data, &book());
        assert!(plan.period_cols.is_empty());
        assert!(!plan.is_usable());
    }

    #[test]
    fn unlabeled_columns_are_excluded() {
        let headers = vec![text("Grupo"), Cell::Empty, text("2015-02")];
        let data = vec![vec![text("ALGAR"), Cell::Number(1.0), Cell::Number(2.0)]];
        let plan = classify(&headers, &data, &book());
        assert_eq!(plan.group_idx, Some(0));
        assert_eq!(plan.period_cols.len(), 1);
        assert_eq!(plan.period_cols[0].idx, 2);
    }
}

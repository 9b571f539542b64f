// src/normalize/reshape.rs
use crate::normalize::columns::ColumnPlan;
use crate::sheet::Cell;

/// One (entity, metric, period) observation before cleaning; the period
/// label and value are still raw cells.
#[derive(Debug, Clone, PartialEq)]
pub struct LongRow {
    pub grupo_economico: String,
    pub variavel: String,
    pub period: Cell,
    pub valor: Cell,
}

/// Melt the wide data region into long form: one output row per
/// (data row × period column) pair, row-major then column-major. Rows that
/// are entirely blank are pruned first; everything else is a full unpivot,
/// filtering comes later in the cleaner.
pub fn reshape(data: &[Vec<Cell>], plan: &ColumnPlan) -> Vec<LongRow> {
    let (group_idx, metric_idx) = match (plan.group_idx, plan.metric_idx) {
        (Some(g), Some(m)) => (g, m),
        _ => return Vec::new(),
    };

    let mut out = Vec::with_capacity(data.len() * plan.period_cols.len());
    for row in data {
        if row.iter().all(Cell::is_empty) {
            continue;
        }
        let grupo = cell_at(row, group_idx).display();
        let variavel = cell_at(row, metric_idx).display();
        for pcol in &plan.period_cols {
            out.push(LongRow {
                grupo_economico: grupo.clone(),
                variavel: variavel.clone(),
                period: pcol.label.clone(),
                valor: cell_at(row, pcol.idx).clone(),
            });
        }
    }
    out
}

fn cell_at(row: &[Cell], idx: usize) -> &Cell {
    row.get(idx).unwrap_or(&Cell::Empty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::columns::PeriodColumn;

    fn text(s: &str) -> Cell {
        Cell::Text(s.into())
    }

    fn plan() -> ColumnPlan {
        ColumnPlan {
            group_idx: Some(0),
            metric_idx: Some(1),
            period_cols: vec![
                PeriodColumn {
                    idx: 2,
                    label: text("2015-01"),
                },
                PeriodColumn {
                    idx: 3,
                    label: text("2015-02"),
                },
            ],
        }
    }

    #[test]
    fn full_cross_product_row_major() {
        let data = vec![
            vec![text("ALGAR"), text("IDA"), Cell::Number(87.5), Cell::Number(92.0)],
            vec![text("OI"), text("IDA"), Cell::Number(70.0), Cell::Empty],
        ];
        let rows = reshape(&data, &plan());
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0].grupo_economico, "ALGAR");
        assert_eq!(rows[0].period, text("2015-01"));
        assert_eq!(rows[1].period, text("2015-02"));
        assert_eq!(rows[2].grupo_economico, "OI");
        // Empty values survive the reshape; the cleaner drops them.
        assert_eq!(rows[3].valor, Cell::Empty);
    }

    #[test]
    fn blank_rows_are_pruned() {
        let data = vec![
            vec![Cell::Empty, Cell::Empty, Cell::Empty, Cell::Empty],
            vec![text("ALGAR"), text("IDA"), Cell::Number(1.0), Cell::Number(2.0)],
        ];
        assert_eq!(reshape(&data, &plan()).len(), 2);
    }

    #[test]
    fn ragged_rows_read_as_empty() {
        let data = vec![vec![text("ALGAR"), text("IDA"), Cell::Number(1.0)]];
        let rows = reshape(&data, &plan());
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].valor, Cell::Empty);
    }

    #[test]
    fn unusable_plan_yields_nothing() {
        let data = vec![vec![text("ALGAR")]];
        let empty = ColumnPlan::default();
        assert!(reshape(&data, &empty).is_empty());
    }
}

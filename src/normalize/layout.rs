// src/normalize/layout.rs
use crate::normalize::rules::{fold_upper, RuleBook};
use crate::sheet::RawSheet;
use tracing::debug;

/// Row positions anchoring the data region of one sheet. The marker row
/// doubles as the header row; data starts one row below it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutAnchor {
    pub header_row: usize,
    pub data_start: usize,
}

/// Scan rows top to bottom for the header marker ("GRUPO ECONÔMICO" in any
/// of its encodings). First match wins. `None` means the sheet does not
/// follow the expected layout and must yield zero rows, not an error.
pub fn locate(sheet: &RawSheet, rules: &RuleBook) -> Option<LayoutAnchor> {
    for (idx, row) in sheet.rows.iter().enumerate() {
        let hit = row
            .iter()
            .filter_map(|c| c.as_text())
            .any(|t| rules.is_marker(&fold_upper(t)));
        if hit {
            debug!(header_row = idx, "header marker found");
            return Some(LayoutAnchor {
                header_row: idx,
                data_start: idx + 1,
            });
        }
    }
    None
}

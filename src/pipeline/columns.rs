//! Column resolution: header record → which field holds the page number and
//! which holds the codes.

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Header labels recognised for the two columns the pipeline reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnLabels {
    pub page: String,
    pub code: String,
}

impl Default for ColumnLabels {
    fn default() -> Self {
        Self {
            page: "Page".to_string(),
            code: "Standard Code".to_string(),
        }
    }
}

/// Field indices of the page and code columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMap {
    pub page: usize,
    pub code: usize,
}

impl ColumnMap {
    /// Used for any label that is not found in the header.
    pub const DEFAULT: ColumnMap = ColumnMap { page: 0, code: 1 };
}

/// Locate the labelled columns in `header`.
///
/// Matching is exact and case-sensitive after trimming each header field.
/// A missing label falls back to the default index so headerless or
/// mislabelled tables still run.
pub fn resolve_columns(header: &[String], labels: &ColumnLabels) -> ColumnMap {
    let find = |label: &str| header.iter().position(|h| h.trim() == label);

    let map = ColumnMap {
        page: find(&labels.page).unwrap_or(ColumnMap::DEFAULT.page),
        code: find(&labels.code).unwrap_or(ColumnMap::DEFAULT.code),
    };
    debug!("Resolved columns: page={} code={}", map.page, map.code);
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(fields: &[&str]) -> Vec<String> {
        fields.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn finds_labels_anywhere() {
        let h = header(&["Activity", " Standard Code ", "Notes", "Page"]);
        assert_eq!(
            resolve_columns(&h, &ColumnLabels::default()),
            ColumnMap { page: 3, code: 1 }
        );
    }

    #[test]
    fn defaults_when_both_labels_missing() {
        for len in 2..6 {
            let h: Vec<String> = (0..len).map(|i| format!("col{i}")).collect();
            assert_eq!(resolve_columns(&h, &ColumnLabels::default()), ColumnMap::DEFAULT);
        }
    }

    #[test]
    fn defaults_independently() {
        let h = header(&["Standard Code", "Page No"]);
        // Code found at 0, page label absent → page falls back to 0.
        assert_eq!(
            resolve_columns(&h, &ColumnLabels::default()),
            ColumnMap { page: 0, code: 0 }
        );
    }

    #[test]
    fn match_is_case_sensitive() {
        let h = header(&["code", "page", "Standard code"]);
        assert_eq!(resolve_columns(&h, &ColumnLabels::default()), ColumnMap::DEFAULT);
    }

    #[test]
    fn custom_labels() {
        let labels = ColumnLabels {
            page: "Folio".into(),
            code: "CCSS".into(),
        };
        let h = header(&["CCSS", "Folio"]);
        assert_eq!(resolve_columns(&h, &labels), ColumnMap { page: 1, code: 0 });
    }
}

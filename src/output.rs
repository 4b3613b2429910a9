//! Result types returned by a stamping pass and by document inspection.
//!
//! Everything here is observational and serialisable; the CLI prints it as
//! JSON with `--json`.

use crate::engine::Rect;
use crate::error::{RowError, StylingWarning};
use crate::pipeline::pages::ResolutionMethod;
use serde::Serialize;
use std::path::PathBuf;

/// What happened to one table row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum RowOutcome {
    Inserted {
        page: u32,
        page_name: String,
        method: ResolutionMethod,
        text: String,
        rect: Rect,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        warnings: Vec<StylingWarning>,
    },
    Skipped {
        error: RowError,
    },
    Failed {
        error: RowError,
    },
}

impl RowOutcome {
    /// Tally a row-local error as skipped or failed.
    pub fn rejected(error: RowError) -> Self {
        if error.is_skip() {
            RowOutcome::Skipped { error }
        } else {
            RowOutcome::Failed { error }
        }
    }
}

/// One entry per data row, in table order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowReport {
    /// 1-based line in the (possibly grouped) table.
    pub line: usize,
    #[serde(flatten)]
    pub outcome: RowOutcome,
}

impl RowReport {
    pub fn is_inserted(&self) -> bool {
        matches!(self.outcome, RowOutcome::Inserted { .. })
    }
}

/// Result of the finalize step.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum ExportReport {
    Written { files: Vec<PathBuf> },
    Failed { path: PathBuf, error: String },
}

impl ExportReport {
    pub fn is_written(&self) -> bool {
        matches!(self, ExportReport::Written { .. })
    }
}

/// Tally and per-row detail of one pass.
///
/// `inserted + skipped + failed == rows.len()` always holds.
#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub table: PathBuf,
    pub document: PathBuf,
    /// Engine that opened the document.
    pub engine: String,
    /// Layer the annotations went on, if one was created or found.
    pub layer: Option<String>,
    /// Why the configured layer could not be used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layer_warning: Option<String>,
    pub inserted: usize,
    pub skipped: usize,
    pub failed: usize,
    pub rows: Vec<RowReport>,
    pub export: ExportReport,
    pub duration_ms: u64,
}

impl BatchSummary {
    /// Number of styling warnings across all inserted rows.
    pub fn warning_count(&self) -> usize {
        self.rows
            .iter()
            .map(|r| match &r.outcome {
                RowOutcome::Inserted { warnings, .. } => warnings.len(),
                _ => 0,
            })
            .sum()
    }

    /// One-line `{inserted, skipped, failed}` tally.
    pub fn tally(&self) -> String {
        format!(
            "inserted={} skipped={} failed={}",
            self.inserted, self.skipped, self.failed
        )
    }
}

/// One page as seen by [`crate::annotate::inspect`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageInfo {
    /// 1-based position in the document.
    pub ordinal: usize,
    pub name: String,
    pub bounds: Rect,
}

/// Page structure of a document, gathered without modifying it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InspectReport {
    pub document: PathBuf,
    pub engine: String,
    pub page_count: usize,
    pub pages: Vec<PageInfo>,
    pub layers: Vec<String>,
}

impl InspectReport {
    /// Pages whose declared name differs from their position, i.e. where a
    /// printed page number would not find the page by ordinal.
    pub fn renamed_pages(&self) -> impl Iterator<Item = &PageInfo> {
        self.pages
            .iter()
            .filter(|p| p.name != p.ordinal.to_string())
    }
}

//! Error types for the pdf-codestamp library.
//!
//! Three distinct error types reflect three distinct failure modes:
//!
//! * **Fatal**, [`StampError`]: the pass cannot proceed at all (table or
//!   document missing, table has no data rows, document cannot be opened).
//!   Every fatal error is raised *before* any annotation is placed, so the
//!   document is never touched when nothing valid can be stamped.
//!
//! * **Row-local**, [`RowError`]: one table row could not be stamped
//!   (unparsable page number, page not found, region creation failed). It is
//!   recorded in the [`crate::output::RowReport`] for that row and the batch
//!   moves on to the next row.
//!
//! * **Cosmetic**, [`StylingWarning`]: a font, colour or frame style was not
//!   accepted by the engine. The annotation still exists with its text set;
//!   the warning is attached to the inserted row and does not count as a
//!   failure.
//!
//! [`EngineError`] is what the document engine itself returns; the pipeline
//! translates it into one of the three kinds above depending on which step
//! produced it.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pdf-codestamp library.
///
/// Row-level failures use [`RowError`] and are stored in
/// [`crate::output::RowReport`] rather than propagated here.
#[derive(Debug, Error)]
pub enum StampError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The code table was not found at the given path.
    #[error("Code table not found: '{path}'\nCheck the path exists and is readable.")]
    MissingTable { path: PathBuf },

    /// The target document was not found at the given path.
    #[error("Document not found: '{path}'\nCheck the path exists and is readable.")]
    MissingDocument { path: PathBuf },

    /// The table file exists but could not be read.
    #[error("Failed to read code table '{path}': {source}")]
    TableReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The table has no lines, or a header line and nothing else.
    #[error("Code table is empty: {reason}")]
    EmptyTable { reason: String },

    // ── Document errors ───────────────────────────────────────────────────
    /// The engine refused to open the document.
    #[error("Failed to open document '{path}': {detail}")]
    DocumentOpenFailed { path: PathBuf, detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium, place the library next to the\n\
executable, or install it system-wide.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Output errors ─────────────────────────────────────────────────────
    /// An auxiliary output file (grouped table, summary) could not be written.
    #[error("Failed to write '{path}': {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A row-local failure. Never aborts the batch.
///
/// `InvalidPageReference`, `MissingField` and `PageNotFound` count as
/// *skipped*; `Placement` counts as *failed*.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum RowError {
    /// The page column did not hold a positive integer.
    #[error("Line {line}: invalid page reference {value:?}")]
    InvalidPageReference { line: usize, value: String },

    /// The row is too short for the resolved column, or the field is blank.
    #[error("Line {line}: missing {column} field")]
    MissingField { line: usize, column: String },

    /// Neither the page-name lookup nor the ordinal lookup matched.
    #[error("Line {line}: page {page} not found (document has {total} pages)")]
    PageNotFound { line: usize, page: u32, total: usize },

    /// The annotation region, its bounds or its contents could not be set.
    #[error("Line {line}: placement on page {page} failed: {detail}")]
    Placement { line: usize, page: u32, detail: String },
}

impl RowError {
    /// True for the kinds tallied under `skipped` rather than `failed`.
    pub fn is_skip(&self) -> bool {
        !matches!(self, RowError::Placement { .. })
    }
}

/// A styling step the engine did not accept.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum StylingWarning {
    #[error("point size {size} not applied: {detail}")]
    PointSize { size: f32, detail: String },

    #[error("alignment not applied: {detail}")]
    Alignment { detail: String },

    /// None of the candidate fonts was accepted; the engine default is used.
    #[error("no font accepted from [{}]", tried.join(", "))]
    NoFont { tried: Vec<String> },

    #[error("text colour '{swatch}' not applied: {detail}")]
    TextColor { swatch: String, detail: String },

    #[error("frame stroke not applied: {detail}")]
    FrameStroke { detail: String },

    #[error("frame fill '{swatch}' not applied: {detail}")]
    FrameFill { swatch: String, detail: String },

    #[error("could not bring annotation to front: {detail}")]
    BringToFront { detail: String },
}

/// An error reported by a document engine call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// The engine does not implement this operation.
    #[error("unsupported by this engine: {0}")]
    Unsupported(String),

    /// No item with this name (font, swatch, page, layer) exists.
    #[error("no such {kind} '{name}'")]
    NotFound { kind: &'static str, name: String },

    /// A handle did not refer to a live object.
    #[error("invalid handle: {0}")]
    InvalidHandle(String),

    /// The export format has nothing to write (PNG with no annotated page).
    #[error("nothing to export: {0}")]
    NothingToExport(String),

    /// Any other failure inside the engine.
    #[error("{0}")]
    Backend(String),
}

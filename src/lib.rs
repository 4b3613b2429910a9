//! # pdf-codestamp
//!
//! Stamp standards codes from a spreadsheet export onto the pages of a PDF.
//!
//! A code table lists, per row, a printed page number and one or more codes.
//! Each row becomes a small text annotation at a fixed position on the
//! matching page, and the annotated result is exported as a new PDF (or as
//! per-page PNG renders). The source document is never modified.
//!
//! ## Pipeline Overview
//!
//! ```text
//! codes.csv                      guide.pdf
//!  │                                │
//!  ├─ 1. Table    delimiter + quotes │
//!  ├─ 2. Columns  "Page" / "Standard Code"
//!  ├─ 3. Group    optional, one row per page
//!  │                                ▼
//!  ├─ 4. Pages    page label first, then position
//!  ├─ 5. Place    region → bounds → text → styling (best effort)
//!  └─ 6. Export   guide-MAPPED.pdf, then close without saving
//! ```
//!
//! A row that cannot be stamped is recorded and skipped; it never stops the
//! batch. See [`error`] for how failures are classified.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf_codestamp::{annotate, StampConfig, StampRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let request = StampRequest::new("codes.csv", "guide.pdf");
//!     let summary = annotate(&request, &StampConfig::default()).await?;
//!     eprintln!("{}", summary.tally());
//!     Ok(())
//! }
//! ```
//!
//! ## Engines
//!
//! The pipeline talks to documents only through
//! [`engine::AnnotatableDocument`]. [`engine::pdfium`] is the production
//! engine; [`engine::memory`] is an in-process double for tests and dry runs.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `codestamp` binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod annotate;
pub mod config;
pub mod engine;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use annotate::{
    annotate, annotate_sync, annotate_with_engine, derive_output_path, inspect,
    inspect_with_engine, StampRequest,
};
pub use config::{StampConfig, StampConfigBuilder, DEFAULT_LAYER};
pub use engine::{Alignment, ExportFormat, ExportOptions, Rect};
pub use error::{EngineError, RowError, StampError, StylingWarning};
pub use output::{BatchSummary, ExportReport, InspectReport, RowOutcome, RowReport};
pub use pipeline::place::{Anchor, LabelTemplate, Placement, TextStyle};
pub use progress::{NoopProgressCallback, ProgressCallback, StampProgressCallback};

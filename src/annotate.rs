//! Batch driver: one full pass from code table to exported derivative.
//!
//! ## Stages
//!
//! ```text
//! Init ──▶ Parsing ──▶ ColumnResolving ──▶ RowLoop ──▶ Finalizing ──▶ Closed
//! ```
//!
//! Every fatal error ([`StampError`]) is raised before the document is
//! opened. Once it is open, nothing short of a panic stops the pass: row
//! errors are recorded per row, a layer or export failure is recorded in the
//! summary, and the document is always closed without being saved in place.
//!
//! [`annotate_with_engine`] is the engine-agnostic core. [`annotate`] and
//! [`annotate_sync`] bind pdfium and run it.

use crate::config::StampConfig;
use crate::engine::pdfium::PdfiumEngine;
use crate::engine::{AnnotatableDocument, DocumentEngine, ExportFormat, LayerHandle};
use crate::error::{EngineError, RowError, StampError};
use crate::output::{BatchSummary, ExportReport, InspectReport, PageInfo, RowOutcome, RowReport};
use crate::pipeline::columns::{resolve_columns, ColumnMap};
use crate::pipeline::group::{group_by_page, write_table};
use crate::pipeline::pages::{parse_page_reference, resolve_page};
use crate::pipeline::place::{place, PlaceOutcome};
use crate::pipeline::table::{read_table, TableRow};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Inputs and output of one pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StampRequest {
    pub table: PathBuf,
    pub document: PathBuf,
    /// Export destination. Default: [`derive_output_path`] of the document.
    pub output: Option<PathBuf>,
}

impl StampRequest {
    pub fn new(table: impl Into<PathBuf>, document: impl Into<PathBuf>) -> Self {
        Self {
            table: table.into(),
            document: document.into(),
            output: None,
        }
    }

    pub fn with_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = Some(output.into());
        self
    }

    /// The path the export will be written to.
    pub fn output_path(&self, format: ExportFormat) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| derive_output_path(&self.document, format))
    }
}

/// `<dir>/<stem>-MAPPED.<ext>` beside the document.
pub fn derive_output_path(document: &Path, format: ExportFormat) -> PathBuf {
    let stem = document
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    document.with_file_name(format!("{stem}-MAPPED.{}", format.extension()))
}

/// Where the driver is in its pass. Logged on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStage {
    Init,
    Parsing,
    ColumnResolving,
    RowLoop,
    Finalizing,
    Closed,
}

impl fmt::Display for BatchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BatchStage::Init => "init",
            BatchStage::Parsing => "parsing",
            BatchStage::ColumnResolving => "column-resolving",
            BatchStage::RowLoop => "row-loop",
            BatchStage::Finalizing => "finalizing",
            BatchStage::Closed => "closed",
        };
        f.write_str(name)
    }
}

fn enter(stage: BatchStage) {
    debug!("Stage → {}", stage);
}

// ── Entry points ─────────────────────────────────────────────────────────

/// Stamp `request.table` onto `request.document` with pdfium.
///
/// The pass runs on a blocking worker thread because pdfium is not
/// async-safe.
///
/// # Returns
/// `Ok(BatchSummary)` whenever the document was opened, even if rows or the
/// export failed (check `summary.failed` and `summary.export`).
///
/// # Errors
/// Returns `Err(StampError)` only for fatal errors:
/// - table or document missing
/// - table unreadable or without data rows
/// - pdfium unavailable, or the document cannot be opened
pub async fn annotate(
    request: &StampRequest,
    config: &StampConfig,
) -> Result<BatchSummary, StampError> {
    let request = request.clone();
    let config = config.clone();
    tokio::task::spawn_blocking(move || annotate_sync(&request, &config))
        .await
        .map_err(|e| StampError::Internal(format!("spawn_blocking panicked: {e}")))?
}

/// Blocking variant of [`annotate`]; runs on the calling thread.
pub fn annotate_sync(
    request: &StampRequest,
    config: &StampConfig,
) -> Result<BatchSummary, StampError> {
    check_inputs(request)?;
    let engine = PdfiumEngine::bind()?.with_password(config.password.clone());
    annotate_with_engine(&engine, request, config)
}

/// Run one pass with any [`DocumentEngine`].
pub fn annotate_with_engine<E: DocumentEngine>(
    engine: &E,
    request: &StampRequest,
    config: &StampConfig,
) -> Result<BatchSummary, StampError> {
    let start = Instant::now();
    info!(
        "Stamping {} onto {} ({} engine)",
        request.table.display(),
        request.document.display(),
        engine.name()
    );

    // ── Init ─────────────────────────────────────────────────────────────
    enter(BatchStage::Init);
    check_inputs(request)?;

    // ── Parsing ──────────────────────────────────────────────────────────
    enter(BatchStage::Parsing);
    let table = read_table(&request.table)?;

    // ── Column resolving (+ grouping) ────────────────────────────────────
    enter(BatchStage::ColumnResolving);
    let mut columns = resolve_columns(&table.header, &config.labels);
    let rows = if config.group_by_page {
        let grouped = group_by_page(&table, columns, &config.labels, config.extract_codes);
        if let Some(ref path) = config.write_grouped {
            write_table(path, &grouped)?;
            info!("Grouped table written → {}", path.display());
        }
        columns = ColumnMap::DEFAULT;
        grouped.rows
    } else {
        table.rows
    };

    // ── Open ─────────────────────────────────────────────────────────────
    let mut doc = engine
        .open(&request.document)
        .map_err(|e| StampError::DocumentOpenFailed {
            path: request.document.clone(),
            detail: e.to_string(),
        })?;
    info!("Document has {} pages", doc.page_count());

    let mut layer_warning = None;
    let layer = match config.layer.as_deref() {
        Some(name) => match doc.ensure_layer(name) {
            Ok(handle) => Some(handle),
            Err(EngineError::Unsupported(detail)) => {
                info!("Engine has no layers ({}), placing on the page", detail);
                None
            }
            Err(e) => {
                warn!("Layer '{}' unavailable, placing without a layer: {}", name, e);
                layer_warning = Some(format!("layer '{name}' unavailable: {e}"));
                None
            }
        },
        None => None,
    };

    // ── Row loop ─────────────────────────────────────────────────────────
    enter(BatchStage::RowLoop);
    let reports = stamp_rows(&mut doc, &rows, columns, layer.as_ref(), config);

    let inserted = reports.iter().filter(|r| r.is_inserted()).count();
    let skipped = reports
        .iter()
        .filter(|r| matches!(r.outcome, RowOutcome::Skipped { .. }))
        .count();
    let failed = reports
        .iter()
        .filter(|r| matches!(r.outcome, RowOutcome::Failed { .. }))
        .count();

    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_complete(inserted, skipped, failed);
    }

    // ── Finalizing ───────────────────────────────────────────────────────
    enter(BatchStage::Finalizing);
    let output = request.output_path(config.export.format);
    let export = export_document(&mut doc, &output, config);

    // ── Closed ───────────────────────────────────────────────────────────
    doc.close();
    enter(BatchStage::Closed);

    let duration_ms = start.elapsed().as_millis() as u64;
    info!(
        "Done: inserted={} skipped={} failed={} in {}ms",
        inserted, skipped, failed, duration_ms
    );

    Ok(BatchSummary {
        table: request.table.clone(),
        document: request.document.clone(),
        engine: engine.name().to_string(),
        layer: layer.map(|l| l.name().to_string()),
        layer_warning,
        inserted,
        skipped,
        failed,
        rows: reports,
        export,
        duration_ms,
    })
}

/// Stamp every row onto an open document, in order. Row failures never
/// stop the loop.
pub fn stamp_rows<D: AnnotatableDocument + ?Sized>(
    doc: &mut D,
    rows: &[TableRow],
    columns: ColumnMap,
    layer: Option<&LayerHandle>,
    config: &StampConfig,
) -> Vec<RowReport> {
    let total = rows.len();
    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_start(total);
    }

    rows.iter()
        .enumerate()
        .map(|(i, row)| {
            if let Some(ref cb) = config.progress_callback {
                cb.on_row_start(i + 1, total);
            }
            let outcome = stamp_row(doc, row, columns, layer, config);
            if let Some(ref cb) = config.progress_callback {
                match &outcome {
                    RowOutcome::Inserted {
                        page_name, text, ..
                    } => cb.on_row_inserted(row.line, page_name, text),
                    RowOutcome::Skipped { error } => cb.on_row_skipped(row.line, &error.to_string()),
                    RowOutcome::Failed { error } => cb.on_row_failed(row.line, &error.to_string()),
                }
            }
            RowReport {
                line: row.line,
                outcome,
            }
        })
        .collect()
}

fn stamp_row<D: AnnotatableDocument + ?Sized>(
    doc: &mut D,
    row: &TableRow,
    columns: ColumnMap,
    layer: Option<&LayerHandle>,
    config: &StampConfig,
) -> RowOutcome {
    let skip = |error: RowError| {
        debug!("Skipped: {}", error);
        RowOutcome::rejected(error)
    };

    let Some(page_field) = row.fields.get(columns.page) else {
        return skip(RowError::MissingField {
            line: row.line,
            column: config.labels.page.clone(),
        });
    };
    let number = match parse_page_reference(page_field, row.line) {
        Ok(n) => n,
        Err(e) => return skip(e),
    };

    let Some(page) = resolve_page(&*doc, number) else {
        return skip(RowError::PageNotFound {
            line: row.line,
            page: number,
            total: doc.page_count(),
        });
    };

    let codes = row
        .fields
        .get(columns.code)
        .map(|c| c.trim())
        .unwrap_or("");
    if codes.is_empty() {
        return skip(RowError::MissingField {
            line: row.line,
            column: config.labels.code.clone(),
        });
    }

    let text = config.label.render(codes, &page.name);
    match place(doc, &page, layer, &config.placement, &text, &config.style) {
        PlaceOutcome::Inserted { rect, warnings, .. } => {
            debug!(
                "Line {}: page {} ({:?}) ← {:?}",
                row.line, page.name, page.method, text
            );
            RowOutcome::Inserted {
                page: page.number,
                page_name: page.name,
                method: page.method,
                text,
                rect,
                warnings,
            }
        }
        PlaceOutcome::Failed(detail) => {
            let error = RowError::Placement {
                line: row.line,
                page: page.number,
                detail,
            };
            warn!("{}", error);
            RowOutcome::rejected(error)
        }
    }
}

fn export_document<D: AnnotatableDocument + ?Sized>(
    doc: &mut D,
    output: &Path,
    config: &StampConfig,
) -> ExportReport {
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        if let Err(e) = std::fs::create_dir_all(parent) {
            warn!("Cannot create {}: {}", parent.display(), e);
            return ExportReport::Failed {
                path: output.to_path_buf(),
                error: e.to_string(),
            };
        }
    }

    match doc.export(output, &config.export) {
        Ok(files) if files.is_empty() => {
            warn!("Export to {} produced no files", output.display());
            ExportReport::Failed {
                path: output.to_path_buf(),
                error: "export produced no files".into(),
            }
        }
        Ok(files) => {
            info!("Exported {} file(s) → {}", files.len(), output.display());
            ExportReport::Written { files }
        }
        Err(e) => {
            warn!("Export to {} failed: {}", output.display(), e);
            ExportReport::Failed {
                path: output.to_path_buf(),
                error: e.to_string(),
            }
        }
    }
}

fn check_inputs(request: &StampRequest) -> Result<(), StampError> {
    if !request.table.is_file() {
        return Err(StampError::MissingTable {
            path: request.table.clone(),
        });
    }
    if !request.document.is_file() {
        return Err(StampError::MissingDocument {
            path: request.document.clone(),
        });
    }
    Ok(())
}

// ── Inspection ───────────────────────────────────────────────────────────

/// List page names, bounds and layers of a document with pdfium.
///
/// Useful for checking whether printed page numbers will resolve by name
/// before running a pass.
pub async fn inspect(
    document: impl AsRef<Path>,
    password: Option<String>,
) -> Result<InspectReport, StampError> {
    let document = document.as_ref().to_path_buf();
    tokio::task::spawn_blocking(move || {
        if !document.is_file() {
            return Err(StampError::MissingDocument { path: document });
        }
        let engine = PdfiumEngine::bind()?.with_password(password);
        inspect_with_engine(&engine, &document)
    })
    .await
    .map_err(|e| StampError::Internal(format!("spawn_blocking panicked: {e}")))?
}

/// Inspect a document with any [`DocumentEngine`]. Never modifies it.
pub fn inspect_with_engine<E: DocumentEngine>(
    engine: &E,
    document: &Path,
) -> Result<InspectReport, StampError> {
    if !document.is_file() {
        return Err(StampError::MissingDocument {
            path: document.to_path_buf(),
        });
    }
    let doc = engine
        .open(document)
        .map_err(|e| StampError::DocumentOpenFailed {
            path: document.to_path_buf(),
            detail: e.to_string(),
        })?;

    let pages: Result<Vec<PageInfo>, EngineError> = (0..doc.page_count())
        .map(|i| {
            let handle = doc.page_at(i)?;
            Ok(PageInfo {
                ordinal: i + 1,
                name: doc.page_name(handle)?,
                bounds: doc.page_bounds(handle)?,
            })
        })
        .collect();
    let layers = doc.layer_names();
    let page_count = doc.page_count();
    doc.close();

    let pages =
        pages.map_err(|e| StampError::Internal(format!("page enumeration failed: {e}")))?;

    Ok(InspectReport {
        document: document.to_path_buf(),
        engine: engine.name().to_string(),
        page_count,
        pages,
        layers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::memory::{Faults, MemoryDocument, MemoryEngine};
    use crate::pipeline::table::parse_table;

    #[test]
    fn derived_output_path() {
        assert_eq!(
            derive_output_path(Path::new("/data/guide.pdf"), ExportFormat::Pdf),
            PathBuf::from("/data/guide-MAPPED.pdf")
        );
        assert_eq!(
            derive_output_path(Path::new("guide.v2.pdf"), ExportFormat::Png),
            PathBuf::from("guide.v2-MAPPED.png")
        );
        let req = StampRequest::new("codes.csv", "guide.pdf").with_output("out/x.pdf");
        assert_eq!(req.output_path(ExportFormat::Pdf), PathBuf::from("out/x.pdf"));
    }

    #[test]
    fn stage_display() {
        assert_eq!(BatchStage::ColumnResolving.to_string(), "column-resolving");
        assert_eq!(BatchStage::Closed.to_string(), "closed");
    }

    #[test]
    fn stamp_rows_classifies_each_row() {
        let table = parse_table(
            "Page,Standard Code\n3,L.8.1\nabc,L.8.2\n99,L.8.3\n4,\n5\n6,RL.8.1\n",
        )
        .unwrap();
        let mut doc = MemoryDocument::with_pages(10).with_faults(Faults {
            contents_on_pages: vec![5],
            ..Faults::default()
        });
        let reports = stamp_rows(
            &mut doc,
            &table.rows,
            ColumnMap::DEFAULT,
            None,
            &StampConfig::default(),
        );

        let kinds: Vec<&str> = reports
            .iter()
            .map(|r| match &r.outcome {
                RowOutcome::Inserted { .. } => "inserted",
                RowOutcome::Skipped { .. } => "skipped",
                RowOutcome::Failed { .. } => "failed",
            })
            .collect();
        assert_eq!(
            kinds,
            vec!["inserted", "skipped", "skipped", "skipped", "skipped", "failed"]
        );
        assert!(matches!(
            reports[4].outcome,
            RowOutcome::Skipped {
                error: RowError::MissingField { .. }
            }
        ));
        assert_eq!(doc.regions_on(2)[0].text.as_deref(), Some("L.8.1"));
    }

    #[test]
    fn label_template_uses_page_name() {
        let table = parse_table("Page,Standard Code\n2,L.8.1\n").unwrap();
        let mut doc = MemoryDocument::with_page_names(["i", "2", "3"]);
        let config = StampConfig::builder()
            .label("{codes} (Page {page})")
            .build()
            .unwrap();
        stamp_rows(&mut doc, &table.rows, ColumnMap::DEFAULT, None, &config);
        assert_eq!(doc.regions()[0].text.as_deref(), Some("L.8.1 (Page 2)"));
        assert_eq!(doc.regions()[0].page, 1);
    }

    #[test]
    fn inspect_reads_structure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("guide.pdf");
        std::fs::write(&path, b"%PDF-1.7").unwrap();

        let engine = MemoryEngine::new(MemoryDocument::with_page_names(["i", "ii", "1"]));
        let report = inspect_with_engine(&engine, &path).unwrap();
        assert_eq!(report.page_count, 3);
        assert_eq!(report.pages[2].name, "1");
        assert_eq!(report.layers, vec!["Layer 1"]);
        assert_eq!(engine.closed().len(), 1);
        assert!(engine.closed()[0].regions().is_empty());
    }
}

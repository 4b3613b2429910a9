//! Whole-pass tests against the in-memory engine.
//!
//! Every test writes its table and a placeholder document file to a temp
//! directory (the memory engine ignores the document's bytes, but the driver
//! checks that both inputs exist).

use pdf_codestamp::engine::memory::{Faults, MemoryDocument, MemoryEngine};
use pdf_codestamp::engine::AnnotatableDocument;
use pdf_codestamp::{
    annotate_with_engine, ExportFormat, ExportReport, RowError, RowOutcome, StampConfig,
    StampError, StampProgressCallback, StampRequest,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

// ── Test helpers ─────────────────────────────────────────────────────────────

struct Fixture {
    dir: TempDir,
    table: PathBuf,
    document: PathBuf,
}

impl Fixture {
    fn new(csv: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let table = dir.path().join("codes.csv");
        let document = dir.path().join("guide.pdf");
        std::fs::write(&table, csv).unwrap();
        std::fs::write(&document, b"%PDF-1.7\n").unwrap();
        Self {
            dir,
            table,
            document,
        }
    }

    fn request(&self) -> StampRequest {
        StampRequest::new(&self.table, &self.document)
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}

fn run(engine: &MemoryEngine, fx: &Fixture, config: &StampConfig) -> pdf_codestamp::BatchSummary {
    annotate_with_engine(engine, &fx.request(), config).expect("pass should complete")
}

fn assert_tally(summary: &pdf_codestamp::BatchSummary, inserted: usize, skipped: usize, failed: usize) {
    assert_eq!(
        (summary.inserted, summary.skipped, summary.failed),
        (inserted, skipped, failed),
        "tally mismatch: {:#?}",
        summary.rows
    );
    assert_eq!(summary.rows.len(), inserted + skipped + failed);
}

// ── Whole pass ───────────────────────────────────────────────────────────────

#[test]
fn one_found_one_missing_page() {
    let fx = Fixture::new("Page,Standard Code\n3,L.8.1\n99,L.8.2\n");
    let engine = MemoryEngine::new(MemoryDocument::with_pages(10));

    let summary = run(&engine, &fx, &StampConfig::default());
    assert_tally(&summary, 1, 1, 0);

    let closed = engine.closed();
    assert_eq!(closed.len(), 1);
    let on_page_3 = closed[0].regions_on(2);
    assert_eq!(on_page_3.len(), 1);
    assert_eq!(on_page_3[0].text.as_deref(), Some("L.8.1"));
    assert_eq!(on_page_3[0].layer.as_deref(), Some("Automation Overlay"));
    assert_eq!(closed[0].regions().len(), 1);

    assert!(matches!(
        summary.rows[1].outcome,
        RowOutcome::Skipped {
            error: RowError::PageNotFound { page: 99, total: 10, .. }
        }
    ));

    let expected = fx.path("guide-MAPPED.pdf");
    assert_eq!(summary.export, ExportReport::Written { files: vec![expected.clone()] });
    assert!(expected.exists());
    assert_eq!(engine.exports(), vec![expected]);
}

#[test]
fn bad_row_does_not_stop_the_batch() {
    let fx = Fixture::new(
        "Page,Standard Code\n1,L.8.1\n2,L.8.2\nthree,L.8.3\n4,L.8.4\n5,L.8.5\n",
    );
    let engine = MemoryEngine::new(MemoryDocument::with_pages(10));

    let summary = run(&engine, &fx, &StampConfig::default());
    assert_tally(&summary, 4, 1, 0);
    assert!(matches!(
        summary.rows[2].outcome,
        RowOutcome::Skipped {
            error: RowError::InvalidPageReference { line: 4, .. }
        }
    ));

    let doc = &engine.closed()[0];
    for (page, code) in [(0, "L.8.1"), (1, "L.8.2"), (3, "L.8.4"), (4, "L.8.5")] {
        assert_eq!(doc.regions_on(page)[0].text.as_deref(), Some(code));
    }
    assert!(doc.regions_on(2).is_empty());
}

#[test]
fn printed_numbers_match_labels_before_positions() {
    let fx = Fixture::new("Page;Standard Code\n1;RL.8.1\n3;RL.8.2\n");
    let engine = MemoryEngine::new(MemoryDocument::with_page_names([
        "i", "ii", "iii", "1", "2", "3",
    ]));

    let summary = run(&engine, &fx, &StampConfig::default());
    assert_tally(&summary, 2, 0, 0);

    let doc = &engine.closed()[0];
    assert_eq!(doc.regions_on(3)[0].text.as_deref(), Some("RL.8.1"));
    assert_eq!(doc.regions_on(5)[0].text.as_deref(), Some("RL.8.2"));
    assert!(doc.regions_on(0).is_empty());
}

#[test]
fn columns_found_by_label_in_any_order() {
    let fx = Fixture::new("Activity\tStandard Code\tPage\nWarm-up\tL.8.4\t2\n");
    let engine = MemoryEngine::new(MemoryDocument::with_pages(4));

    let summary = run(&engine, &fx, &StampConfig::default());
    assert_tally(&summary, 1, 0, 0);
    assert_eq!(engine.closed()[0].regions_on(1)[0].text.as_deref(), Some("L.8.4"));
}

#[test]
fn placement_failure_counts_as_failed() {
    let fx = Fixture::new("Page,Standard Code\n1,L.8.1\n2,L.8.2\n3,L.8.3\n");
    let engine = MemoryEngine::new(MemoryDocument::with_pages(3).with_faults(Faults {
        region_on_pages: vec![1],
        ..Faults::default()
    }));

    let summary = run(&engine, &fx, &StampConfig::default());
    assert_tally(&summary, 2, 0, 1);
    assert!(matches!(
        summary.rows[1].outcome,
        RowOutcome::Failed {
            error: RowError::Placement { page: 2, .. }
        }
    ));
}

#[test]
fn styling_failures_are_warnings_only() {
    let fx = Fixture::new("Page,Standard Code\n1,L.8.1\n");
    let engine = MemoryEngine::new(
        MemoryDocument::with_pages(1)
            .accept_fonts(&[])
            .with_swatches(&[]),
    );

    let summary = run(&engine, &fx, &StampConfig::default());
    assert_tally(&summary, 1, 0, 0);
    assert!(summary.warning_count() >= 2);
    assert_eq!(engine.closed()[0].regions()[0].text.as_deref(), Some("L.8.1"));
}

#[test]
fn layer_failure_places_without_layer() {
    let fx = Fixture::new("Page,Standard Code\n1,L.8.1\n");
    let engine = MemoryEngine::new(MemoryDocument::with_pages(2).with_faults(Faults {
        layers: true,
        ..Faults::default()
    }));

    let summary = run(&engine, &fx, &StampConfig::default());
    assert_tally(&summary, 1, 0, 0);
    assert_eq!(summary.layer, None);
    assert!(summary.layer_warning.is_some());
    assert_eq!(engine.closed()[0].regions()[0].layer, None);
}

#[test]
fn engine_without_layers_is_not_a_warning() {
    let fx = Fixture::new("Page,Standard Code\n1,L.8.1\n");
    let engine = MemoryEngine::new(MemoryDocument::with_pages(2).with_faults(Faults {
        layers_unsupported: true,
        ..Faults::default()
    }));

    let summary = run(&engine, &fx, &StampConfig::default());
    assert_tally(&summary, 1, 0, 0);
    assert_eq!(summary.layer, None);
    assert_eq!(summary.layer_warning, None);
    assert_eq!(engine.closed()[0].regions()[0].layer, None);
}

#[test]
fn layer_is_created_once() {
    let fx = Fixture::new("Page,Standard Code\n1,L.8.1\n2,L.8.2\n");
    let engine = MemoryEngine::new(MemoryDocument::with_pages(2));

    run(&engine, &fx, &StampConfig::default());
    let layers = engine.closed()[0].layer_names();
    assert_eq!(layers, vec!["Automation Overlay", "Layer 1"]);
}

// ── Fatal errors ─────────────────────────────────────────────────────────────

#[test]
fn missing_inputs_halt_before_open() {
    let fx = Fixture::new("Page,Standard Code\n1,L.8.1\n");
    let engine = MemoryEngine::new(MemoryDocument::with_pages(2));

    let req = StampRequest::new(fx.path("nope.csv"), &fx.document);
    let err = annotate_with_engine(&engine, &req, &StampConfig::default()).unwrap_err();
    assert!(matches!(err, StampError::MissingTable { .. }), "got {err:?}");

    let req = StampRequest::new(&fx.table, fx.path("nope.pdf"));
    let err = annotate_with_engine(&engine, &req, &StampConfig::default()).unwrap_err();
    assert!(matches!(err, StampError::MissingDocument { .. }), "got {err:?}");

    assert_eq!(engine.opened(), 0);
}

#[test]
fn empty_table_halts_before_open() {
    for csv in ["", "\n\n", "Page,Standard Code\n"] {
        let fx = Fixture::new(csv);
        let engine = MemoryEngine::new(MemoryDocument::with_pages(2));
        let err = annotate_with_engine(&engine, &fx.request(), &StampConfig::default())
            .unwrap_err();
        assert!(matches!(err, StampError::EmptyTable { .. }), "got {err:?}");
        assert_eq!(engine.opened(), 0);
        assert!(!fx.path("guide-MAPPED.pdf").exists());
    }
}

#[test]
fn open_failure_is_fatal() {
    let fx = Fixture::new("Page,Standard Code\n1,L.8.1\n");
    let engine = MemoryEngine::new(MemoryDocument::with_pages(2).with_faults(Faults {
        open: true,
        ..Faults::default()
    }));
    let err = annotate_with_engine(&engine, &fx.request(), &StampConfig::default()).unwrap_err();
    assert!(matches!(err, StampError::DocumentOpenFailed { .. }), "got {err:?}");
}

// ── Finalize ─────────────────────────────────────────────────────────────────

#[test]
fn export_failure_still_closes() {
    let fx = Fixture::new("Page,Standard Code\n1,L.8.1\n");
    let engine = MemoryEngine::new(MemoryDocument::with_pages(2).with_faults(Faults {
        export: true,
        ..Faults::default()
    }));

    let summary = run(&engine, &fx, &StampConfig::default());
    assert_tally(&summary, 1, 0, 0);
    assert!(matches!(summary.export, ExportReport::Failed { .. }));
    assert_eq!(engine.closed().len(), 1);
    assert!(engine.exports().is_empty());
}

#[test]
fn explicit_output_and_format() {
    let fx = Fixture::new("Page,Standard Code\n1,L.8.1\n");
    let engine = MemoryEngine::new(MemoryDocument::with_pages(2));
    let out = fx.path("nested/dir/stamped.png");
    let config = StampConfig::builder()
        .format(ExportFormat::Png)
        .build()
        .unwrap();

    let summary = annotate_with_engine(&engine, &fx.request().with_output(&out), &config).unwrap();
    assert_eq!(summary.export, ExportReport::Written { files: vec![out.clone()] });
    assert!(out.exists());
}

#[test]
fn png_export_with_nothing_inserted_fails() {
    let fx = Fixture::new("Page,Standard Code\n50,L.8.1\n");
    let engine = MemoryEngine::new(MemoryDocument::with_pages(2));
    let config = StampConfig::builder()
        .format(ExportFormat::Png)
        .build()
        .unwrap();

    let summary = run(&engine, &fx, &config);
    assert_tally(&summary, 0, 1, 0);
    match &summary.export {
        ExportReport::Failed { path, error } => {
            assert_eq!(path, &fx.path("guide-MAPPED.png"));
            assert!(error.contains("nothing to export"), "{error}");
        }
        other => panic!("expected a failed export, got {other:?}"),
    }
    assert!(engine.exports().is_empty());
    assert_eq!(engine.closed().len(), 1);
}

#[test]
fn zero_inserted_still_exports() {
    let fx = Fixture::new("Page,Standard Code\n50,L.8.1\n");
    let engine = MemoryEngine::new(MemoryDocument::with_pages(2));
    let summary = run(&engine, &fx, &StampConfig::default());
    assert_tally(&summary, 0, 1, 0);
    assert!(summary.export.is_written());
}

// ── Grouping ─────────────────────────────────────────────────────────────────

#[test]
fn grouping_gives_one_annotation_per_page() {
    let fx = Fixture::new(
        "Page,Standard Code\n4,RL.8.2\n3,L.8.1\n4,L.8.4\n4,RL.8.2\n",
    );
    let engine = MemoryEngine::new(MemoryDocument::with_pages(5));
    let grouped_csv = fx.path("grouped.csv");
    let config = StampConfig::builder()
        .group_by_page(true)
        .write_grouped(&grouped_csv)
        .build()
        .unwrap();

    let summary = run(&engine, &fx, &config);
    assert_tally(&summary, 2, 0, 0);

    let doc = &engine.closed()[0];
    assert_eq!(doc.regions_on(3).len(), 1);
    assert_eq!(doc.regions_on(3)[0].text.as_deref(), Some("L.8.4, RL.8.2"));
    assert_eq!(
        std::fs::read_to_string(&grouped_csv).unwrap(),
        "Page,Standard Code\n3,L.8.1\n4,\"L.8.4, RL.8.2\"\n"
    );
}

#[test]
fn grouping_with_code_extraction() {
    let fx = Fixture::new(
        "Page,Standard Code\n2,Cite evidence (ccss.rl.8.1)\n2,Argue a claim: W.8.1\n",
    );
    let engine = MemoryEngine::new(MemoryDocument::with_pages(3));
    let config = StampConfig::builder()
        .group_by_page(true)
        .extract_codes(true)
        .build()
        .unwrap();

    run(&engine, &fx, &config);
    assert_eq!(
        engine.closed()[0].regions_on(1)[0].text.as_deref(),
        Some("CCSS.RL.8.1, CCSS.W.8.1")
    );
}

#[test]
fn extraction_drops_pages_without_codes() {
    let fx = Fixture::new("Page,Standard Code\n2,Cite (RL.8.1)\n3,discussion only\n");
    let engine = MemoryEngine::new(MemoryDocument::with_pages(3));
    let grouped_csv = fx.path("grouped.csv");
    let config = StampConfig::builder()
        .group_by_page(true)
        .extract_codes(true)
        .write_grouped(&grouped_csv)
        .build()
        .unwrap();

    let summary = run(&engine, &fx, &config);
    assert_tally(&summary, 1, 0, 0);
    assert_eq!(
        std::fs::read_to_string(&grouped_csv).unwrap(),
        "Page,Standard Code\n2,CCSS.RL.8.1\n"
    );
    assert!(engine.closed()[0].regions_on(2).is_empty());
}

#[test]
fn spreadsheet_page_numbers_resolve() {
    let fx = Fixture::new("Page,Standard Code\n3.0,L.8.1\n4a,L.8.2\n");
    let engine = MemoryEngine::new(MemoryDocument::with_pages(5));

    let summary = run(&engine, &fx, &StampConfig::default());
    assert_tally(&summary, 2, 0, 0);
    let doc = &engine.closed()[0];
    assert_eq!(doc.regions_on(2)[0].text.as_deref(), Some("L.8.1"));
    assert_eq!(doc.regions_on(3)[0].text.as_deref(), Some("L.8.2"));
}

// ── Progress ─────────────────────────────────────────────────────────────────

#[derive(Default)]
struct Counts {
    starts: AtomicUsize,
    inserted: AtomicUsize,
    skipped: AtomicUsize,
    failed: AtomicUsize,
    total: AtomicUsize,
}

impl StampProgressCallback for Counts {
    fn on_batch_start(&self, total_rows: usize) {
        self.total.store(total_rows, Ordering::SeqCst);
    }
    fn on_row_start(&self, _index: usize, _total: usize) {
        self.starts.fetch_add(1, Ordering::SeqCst);
    }
    fn on_row_inserted(&self, _line: usize, _page: &str, _text: &str) {
        self.inserted.fetch_add(1, Ordering::SeqCst);
    }
    fn on_row_skipped(&self, _line: usize, _reason: &str) {
        self.skipped.fetch_add(1, Ordering::SeqCst);
    }
    fn on_row_failed(&self, _line: usize, _error: &str) {
        self.failed.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn progress_events_follow_outcomes() {
    let fx = Fixture::new("Page,Standard Code\n1,L.8.1\nx,L.8.2\n2,L.8.3\n");
    let engine = MemoryEngine::new(MemoryDocument::with_pages(2).with_faults(Faults {
        contents_on_pages: vec![1],
        ..Faults::default()
    }));
    let counts = Arc::new(Counts::default());
    let config = StampConfig::builder()
        .progress_callback(counts.clone())
        .build()
        .unwrap();

    run(&engine, &fx, &config);
    assert_eq!(counts.total.load(Ordering::SeqCst), 3);
    assert_eq!(counts.starts.load(Ordering::SeqCst), 3);
    assert_eq!(counts.inserted.load(Ordering::SeqCst), 1);
    assert_eq!(counts.skipped.load(Ordering::SeqCst), 1);
    assert_eq!(counts.failed.load(Ordering::SeqCst), 1);
}

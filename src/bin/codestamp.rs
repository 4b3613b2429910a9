//! CLI binary for pdf-codestamp.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `StampConfig` and prints the batch summary.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pdf_codestamp::{
    annotate, inspect, Alignment, Anchor, BatchSummary, ExportFormat, ExportReport, Placement,
    ProgressCallback, RowOutcome, StampConfig, StampProgressCallback, StampRequest,
    DEFAULT_LAYER,
};
use std::fs::OpenOptions;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

fn truncate(msg: &str, max: usize) -> String {
    if msg.chars().count() > max {
        let cut: String = msg.chars().take(max - 1).collect();
        format!("{cut}\u{2026}")
    } else {
        msg.to_string()
    }
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar for the row loop plus a log line per
/// row that did not end up as a plain insertion.
struct CliProgressCallback {
    bar: ProgressBar,
    inserted: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Reading table and opening document…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            inserted: AtomicUsize::new(0),
        })
    }
}

impl StampProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total_rows: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>4}/{len} rows  ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ");
        self.bar.set_length(total_rows as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Stamping");
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Stamping {total_rows} rows…"))
        ));
    }

    fn on_row_inserted(&self, _line: usize, _page_name: &str, _text: &str) {
        self.inserted.fetch_add(1, Ordering::SeqCst);
        self.bar.inc(1);
    }

    fn on_row_skipped(&self, _line: usize, reason: &str) {
        self.bar
            .println(format!("  {} {}", yellow("–"), dim(&truncate(reason, 96))));
        self.bar.inc(1);
    }

    fn on_row_failed(&self, _line: usize, error: &str) {
        self.bar
            .println(format!("  {} {}", red("✗"), red(&truncate(error, 96))));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, _inserted: usize, _skipped: usize, _failed: usize) {
        self.bar.set_prefix("Exporting");
        self.bar.set_message("writing derivative…");
    }
}

impl Drop for CliProgressCallback {
    fn drop(&mut self) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Stamp codes; writes guide-MAPPED.pdf next to guide.pdf
  codestamp codes.csv guide.pdf

  # One annotation per page, codes joined and sorted
  codestamp --group codes.csv guide.pdf -o out/guide-stamped.pdf

  # Pull codes out of free text and keep the grouped table
  codestamp --group --extract-codes --write-grouped grouped.csv notes.csv guide.pdf

  # Label with the page name, top-right corner, 8 pt Courier
  codestamp --label "{codes} (Page {page})" --anchor top-right --point-size 8 \
            --font Courier codes.csv guide.pdf

  # PNG renders of each annotated page
  codestamp --format png --png-width 1200 codes.csv guide.pdf

  # Show page labels before stamping
  codestamp --inspect guide.pdf

TABLE FORMAT:
  First line is the header. Delimiter is inferred from it: comma, else
  semicolon, else tab. Columns are found by label ("Page", "Standard Code"
  unless overridden); a missing label falls back to column 1 / column 2.

PAGE NUMBERS:
  A page number is first matched against the PDF's page labels, then taken
  as a 1-based position. Rows whose page cannot be found are skipped.

ENVIRONMENT VARIABLES:
  PDFIUM_LIB_PATH         Path to libpdfium (otherwise next to the binary,
                          then the system library path)
  RUST_LOG                Overrides --verbose / --quiet log filtering
  CODESTAMP_*             Every flag can also be set from the environment
"#;

/// Stamp standards codes from a CSV table onto the matching pages of a PDF.
#[derive(Parser, Debug)]
#[command(
    name = "codestamp",
    version,
    about = "Stamp standards codes from a CSV table onto the matching pages of a PDF",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Code table (CSV, semicolon- or tab-separated).
    #[arg(required_unless_present = "inspect")]
    table: Option<PathBuf>,

    /// PDF to stamp. It is never modified.
    #[arg(required_unless_present = "inspect")]
    document: Option<PathBuf>,

    /// Export path. Default: <document stem>-MAPPED.<ext> beside the document.
    #[arg(short, long, env = "CODESTAMP_OUTPUT")]
    output: Option<PathBuf>,

    /// Header label of the page-number column.
    #[arg(long, env = "CODESTAMP_PAGE_COLUMN", default_value = "Page")]
    page_column: String,

    /// Header label of the code column.
    #[arg(long, env = "CODESTAMP_CODE_COLUMN", default_value = "Standard Code")]
    code_column: String,

    /// Layer to place annotations on (created if missing).
    #[arg(long, env = "CODESTAMP_LAYER", default_value = DEFAULT_LAYER)]
    layer: String,

    /// Place annotations without a layer.
    #[arg(long, env = "CODESTAMP_NO_LAYER", conflicts_with = "layer")]
    no_layer: bool,

    /// Collapse rows to one annotation per page.
    #[arg(long, env = "CODESTAMP_GROUP")]
    group: bool,

    /// Also write the grouped table to this path.
    #[arg(long, env = "CODESTAMP_WRITE_GROUPED", requires = "group")]
    write_grouped: Option<PathBuf>,

    /// Extract codes like RL.8.1 from free text when grouping.
    #[arg(long, env = "CODESTAMP_EXTRACT_CODES", requires = "group")]
    extract_codes: bool,

    /// Annotation text; {codes} and {page} are substituted.
    #[arg(long, env = "CODESTAMP_LABEL", default_value = "{codes}")]
    label: String,

    /// Text size in points.
    #[arg(long, env = "CODESTAMP_POINT_SIZE", default_value_t = 9.0)]
    point_size: f32,

    /// Text alignment inside the box.
    #[arg(long, env = "CODESTAMP_ALIGN", value_enum, default_value = "left")]
    align: AlignArg,

    /// Font to try, in order (repeatable). Default: Helvetica, Arial, Times-Roman, Courier.
    #[arg(long = "font", env = "CODESTAMP_FONTS", value_delimiter = ',')]
    fonts: Vec<String>,

    /// Text colour swatch (None, Paper, Black, Cyan, Magenta, Yellow, Red, Green, Blue).
    #[arg(long, env = "CODESTAMP_COLOR", default_value = "Black")]
    color: String,

    /// Page corner the annotation box is measured from.
    #[arg(long, env = "CODESTAMP_ANCHOR", value_enum, default_value = "bottom-left")]
    anchor: AnchorArg,

    /// Horizontal distance from the anchor edge, in points.
    #[arg(long, env = "CODESTAMP_INSET_X", default_value_t = 30.0)]
    inset_x: f32,

    /// Vertical distance from the anchor edge, in points.
    #[arg(long, env = "CODESTAMP_INSET_Y", default_value_t = 60.0)]
    inset_y: f32,

    /// Box width in points.
    #[arg(long, env = "CODESTAMP_WIDTH", default_value_t = 250.0)]
    width: f32,

    /// Box height in points.
    #[arg(long, env = "CODESTAMP_HEIGHT", default_value_t = 30.0)]
    height: f32,

    /// Export format.
    #[arg(long, env = "CODESTAMP_FORMAT", value_enum, default_value = "pdf")]
    format: FormatArg,

    /// Flatten form fields and annotations into the page content on export.
    #[arg(long, env = "CODESTAMP_FLATTEN", default_value_t = true, action = clap::ArgAction::Set)]
    flatten: bool,

    /// Pixel width of PNG renders.
    #[arg(long, env = "CODESTAMP_PNG_WIDTH", default_value_t = 1600,
          value_parser = clap::value_parser!(u32).range(16..=10_000))]
    png_width: u32,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "CODESTAMP_PASSWORD")]
    password: Option<String>,

    /// Print the batch summary as JSON on stdout.
    #[arg(long, env = "CODESTAMP_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "CODESTAMP_NO_PROGRESS")]
    no_progress: bool,

    /// Print page labels, sizes and layers of a PDF, then exit.
    #[arg(long = "inspect", value_name = "DOCUMENT", conflicts_with_all = ["table", "document"])]
    inspect: Option<PathBuf>,

    /// Append a timestamped debug log to this file.
    #[arg(long, env = "CODESTAMP_LOG_FILE")]
    log_file: Option<PathBuf>,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "CODESTAMP_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "CODESTAMP_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum AlignArg {
    Left,
    Center,
    Right,
}

impl From<AlignArg> for Alignment {
    fn from(v: AlignArg) -> Self {
        match v {
            AlignArg::Left => Alignment::Left,
            AlignArg::Center => Alignment::Center,
            AlignArg::Right => Alignment::Right,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum AnchorArg {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl From<AnchorArg> for Anchor {
    fn from(v: AnchorArg) -> Self {
        match v {
            AnchorArg::TopLeft => Anchor::TopLeft,
            AnchorArg::TopRight => Anchor::TopRight,
            AnchorArg::BottomLeft => Anchor::BottomLeft,
            AnchorArg::BottomRight => Anchor::BottomRight,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum FormatArg {
    Pdf,
    Png,
}

impl From<FormatArg> for ExportFormat {
    fn from(v: FormatArg) -> Self {
        match v {
            FormatArg::Pdf => ExportFormat::Pdf,
            FormatArg::Png => ExportFormat::Png,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level library logs on the terminal.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && cli.inspect.is_none();
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    let stderr_layer = fmt::layer().with_writer(io::stderr).with_filter(
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
    );

    let file_layer = match cli.log_file {
        Some(ref path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file))
                    .with_filter(EnvFilter::new("info,pdf_codestamp=debug")),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .init();

    // ── Inspect mode ─────────────────────────────────────────────────────
    if let Some(ref document) = cli.inspect {
        let report = inspect(document, cli.password.clone())
            .await
            .context("Failed to inspect PDF")?;

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("Failed to serialize report")?
            );
        } else {
            println!("File:    {}", report.document.display());
            println!("Pages:   {}", report.page_count);
            let layers = if report.layers.is_empty() {
                "(none)".to_string()
            } else {
                report.layers.join(", ")
            };
            println!("Layers:  {layers}");
            println!();
            println!("  {:>5}  {:<12}  {}", "#", "Label", "Size (pt)");
            for page in &report.pages {
                println!(
                    "  {:>5}  {:<12}  {:.0} × {:.0}",
                    page.ordinal,
                    page.name,
                    page.bounds.width(),
                    page.bounds.height()
                );
            }
            let renamed = report.renamed_pages().count();
            if renamed > 0 {
                println!();
                println!(
                    "{} {renamed} page(s) carry a label that differs from their position; \
                     page numbers in the table match labels first.",
                    cyan("ℹ")
                );
            }
        }
        return Ok(());
    }

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<Arc<CliProgressCallback>> =
        show_progress.then(CliProgressCallback::new);

    let config = build_config(
        &cli,
        progress_cb
            .clone()
            .map(|cb| cb as Arc<dyn StampProgressCallback>),
    )?;

    let (Some(table), Some(document)) = (cli.table.clone(), cli.document.clone()) else {
        anyhow::bail!("TABLE and DOCUMENT are required");
    };
    let mut request = StampRequest::new(table, document);
    if let Some(ref output) = cli.output {
        request = request.with_output(output);
    }

    // ── Run ──────────────────────────────────────────────────────────────
    let result = annotate(&request, &config).await;
    // Clear the bar before anything else is printed.
    drop(config);
    drop(progress_cb);
    let summary = result.context("Stamping failed")?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).context("Failed to serialise summary")?
        );
    } else if !cli.quiet {
        print_summary(&summary, show_progress);
    }

    if let ExportReport::Failed { ref path, ref error } = summary.export {
        anyhow::bail!("Export to {} failed: {}", path.display(), error);
    }

    Ok(())
}

/// Map CLI args to `StampConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<StampConfig> {
    let mut builder = StampConfig::builder()
        .page_column(&cli.page_column)
        .code_column(&cli.code_column)
        .label(&cli.label)
        .point_size(cli.point_size)
        .alignment(cli.align.into())
        .text_color(&cli.color)
        .placement(Placement::Anchored {
            anchor: cli.anchor.into(),
            inset_x: cli.inset_x,
            inset_y: cli.inset_y,
            width: cli.width,
            height: cli.height,
        })
        .group_by_page(cli.group)
        .extract_codes(cli.extract_codes)
        .format(cli.format.into())
        .flatten(cli.flatten)
        .png_width(cli.png_width);

    builder = if cli.no_layer {
        builder.no_layer()
    } else {
        builder.layer(&cli.layer)
    };
    if !cli.fonts.is_empty() {
        builder = builder.fonts(cli.fonts.iter().map(|f| f.trim().to_string()));
    }
    if let Some(ref path) = cli.write_grouped {
        builder = builder.write_grouped(path);
    }
    if let Some(ref pwd) = cli.password {
        builder = builder.password(pwd);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn print_summary(summary: &BatchSummary, rows_already_listed: bool) {
    if !rows_already_listed {
        for row in &summary.rows {
            match &row.outcome {
                RowOutcome::Skipped { error } => {
                    eprintln!("  {} {}", yellow("–"), dim(&error.to_string()))
                }
                RowOutcome::Failed { error } => eprintln!("  {} {}", red("✗"), red(&error.to_string())),
                RowOutcome::Inserted { .. } => {}
            }
        }
    }

    if let Some(ref warning) = summary.layer_warning {
        eprintln!("{} {}", yellow("⚠"), warning);
    }
    let warnings = summary.warning_count();
    if warnings > 0 {
        eprintln!(
            "{} {} styling step(s) not applied {}",
            yellow("⚠"),
            warnings,
            dim("(run with -v for details)")
        );
    }

    let mark = if summary.failed == 0 && summary.export.is_written() {
        green("✔")
    } else if summary.inserted == 0 {
        red("✘")
    } else {
        yellow("⚠")
    };
    eprintln!(
        "{}  {} inserted  {} skipped  {} failed  {}",
        mark,
        bold(&summary.inserted.to_string()),
        summary.skipped,
        if summary.failed > 0 {
            red(&summary.failed.to_string())
        } else {
            summary.failed.to_string()
        },
        dim(&format!("{}ms", summary.duration_ms)),
    );
    if let ExportReport::Written { ref files } = summary.export {
        for file in files {
            eprintln!("   →  {}", bold(&file.display().to_string()));
        }
    }
}

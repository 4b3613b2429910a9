//! Document engines: the only code that touches a live document.
//!
//! The pipeline never holds a global document object. It receives a value
//! implementing [`AnnotatableDocument`] from a [`DocumentEngine`] and drives
//! it through the narrow set of operations below: list pages, look pages up
//! by declared name or position, create an annotation region, style it,
//! export, close. Everything else (geometry, fonts, rendering) stays inside
//! the engine.
//!
//! Two engines ship with the crate:
//!
//! | Engine | Backing | Use |
//! |--------|---------|-----|
//! | [`pdfium::PdfiumEngine`] | `pdfium-render` | production runs on PDF files |
//! | [`memory::MemoryEngine`] | plain Rust values | tests, dry runs |
//!
//! Each styling call returns its own `Result` so the placer can treat every
//! step as independently best-effort.

pub mod memory;
pub mod pdfium;

use crate::error::EngineError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A rectangle in document space: points, origin top-left, y grows downwards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub top: f32,
    pub left: f32,
    pub bottom: f32,
    pub right: f32,
}

impl Rect {
    pub fn new(top: f32, left: f32, bottom: f32, right: f32) -> Self {
        Self {
            top,
            left,
            bottom,
            right,
        }
    }

    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    /// A rectangle with positive width and height.
    pub fn is_valid(&self) -> bool {
        self.width() > 0.0 && self.height() > 0.0
    }
}

/// A page of an open document, identified by its 0-based position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageHandle(usize);

impl PageHandle {
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    /// 0-based position in document order.
    pub fn index(&self) -> usize {
        self.0
    }
}

/// A named overlay layer returned by [`AnnotatableDocument::ensure_layer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerHandle {
    name: String,
}

impl LayerHandle {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// An annotation region created by [`AnnotatableDocument::add_region`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegionId(usize);

impl RegionId {
    pub fn new(id: usize) -> Self {
        Self(id)
    }

    pub fn get(&self) -> usize {
        self.0
    }
}

/// Horizontal alignment of the annotation text inside its rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    #[default]
    Left,
    Center,
    Right,
}

/// A named colour swatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Swatch {
    /// Transparent: no paint at all.
    None,
    Rgb(u8, u8, u8),
}

/// Resolve one of the swatch names every document is assumed to carry.
///
/// Names are matched exactly, as a layout application's swatch panel does.
pub fn standard_swatch(name: &str) -> Option<Swatch> {
    let swatch = match name {
        "None" => Swatch::None,
        "Paper" | "White" => Swatch::Rgb(255, 255, 255),
        "Black" | "Registration" => Swatch::Rgb(0, 0, 0),
        "Cyan" => Swatch::Rgb(0, 174, 239),
        "Magenta" => Swatch::Rgb(236, 0, 140),
        "Yellow" => Swatch::Rgb(255, 242, 0),
        "Red" => Swatch::Rgb(237, 28, 36),
        "Green" => Swatch::Rgb(0, 166, 81),
        "Blue" => Swatch::Rgb(46, 49, 146),
        _ => return None,
    };
    Some(swatch)
}

/// Output format of the derivative produced at the end of a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// A single PDF file. (default)
    #[default]
    Pdf,
    /// One PNG render per annotated page, named `<stem>-p<N>.png`.
    Png,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Pdf => "pdf",
            ExportFormat::Png => "png",
        }
    }
}

/// Options passed through to [`AnnotatableDocument::export`] untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportOptions {
    pub format: ExportFormat,
    /// Flatten form fields and annotations into page content before writing.
    pub flatten: bool,
    /// Target pixel width of PNG renders.
    pub png_width: u32,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            format: ExportFormat::Pdf,
            flatten: true,
            png_width: 1600,
        }
    }
}

/// An open document that annotation regions can be added to.
///
/// Lookups take `&self` and never mutate the document. Dropping or
/// [`close`](AnnotatableDocument::close)-ing the value discards all edits;
/// the only way edits leave the process is [`export`](AnnotatableDocument::export).
pub trait AnnotatableDocument {
    /// Number of pages in document order.
    fn page_count(&self) -> usize;

    /// Look up a page by its declared display name.
    ///
    /// `Ok(None)` means the lookup ran and nothing matched.
    fn page_by_name(&self, name: &str) -> Result<Option<PageHandle>, EngineError>;

    /// The page at a 0-based position.
    fn page_at(&self, index: usize) -> Result<PageHandle, EngineError>;

    /// Declared display name of a page; engines without names return the
    /// 1-based ordinal as a string.
    fn page_name(&self, page: PageHandle) -> Result<String, EngineError>;

    /// The page's boundary rectangle.
    fn page_bounds(&self, page: PageHandle) -> Result<Rect, EngineError>;

    /// Names of the document's layers, top first.
    fn layer_names(&self) -> Vec<String>;

    /// Return the layer called `name`, creating it on top of the stack if it
    /// does not exist yet. Calling it twice yields the same layer.
    fn ensure_layer(&mut self, name: &str) -> Result<LayerHandle, EngineError>;

    /// Create an empty annotation region on `page`, on `layer` if given.
    fn add_region(
        &mut self,
        page: PageHandle,
        layer: Option<&LayerHandle>,
    ) -> Result<RegionId, EngineError>;

    fn set_bounds(&mut self, region: RegionId, rect: Rect) -> Result<(), EngineError>;

    fn set_contents(&mut self, region: RegionId, text: &str) -> Result<(), EngineError>;

    fn set_point_size(&mut self, region: RegionId, size: f32) -> Result<(), EngineError>;

    fn set_alignment(&mut self, region: RegionId, alignment: Alignment)
        -> Result<(), EngineError>;

    /// Apply the font called `name`; errors when the engine does not know it.
    fn apply_font(&mut self, region: RegionId, name: &str) -> Result<(), EngineError>;

    fn apply_text_color(&mut self, region: RegionId, swatch: &str) -> Result<(), EngineError>;

    /// Set the frame outline. A zero `weight` removes the outline.
    fn apply_frame_stroke(
        &mut self,
        region: RegionId,
        weight: f32,
        swatch: Option<&str>,
    ) -> Result<(), EngineError>;

    fn apply_frame_fill(&mut self, region: RegionId, swatch: &str) -> Result<(), EngineError>;

    fn bring_to_front(&mut self, region: RegionId) -> Result<(), EngineError>;

    /// Write the derivative. Returns every file written.
    fn export(
        &mut self,
        path: &Path,
        options: &ExportOptions,
    ) -> Result<Vec<PathBuf>, EngineError>;

    /// Release the document without saving it in place.
    fn close(self)
    where
        Self: Sized;
}

/// Opens documents.
pub trait DocumentEngine {
    type Document<'a>: AnnotatableDocument
    where
        Self: 'a;

    /// Short engine name for logs.
    fn name(&self) -> &'static str;

    fn open<'a>(&'a self, path: &Path) -> Result<Self::Document<'a>, EngineError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_dimensions() {
        let r = Rect::new(10.0, 20.0, 40.0, 270.0);
        assert_eq!(r.width(), 250.0);
        assert_eq!(r.height(), 30.0);
        assert!(r.is_valid());
        assert!(!Rect::new(40.0, 20.0, 10.0, 270.0).is_valid());
    }

    #[test]
    fn standard_swatches() {
        assert_eq!(standard_swatch("Black"), Some(Swatch::Rgb(0, 0, 0)));
        assert_eq!(standard_swatch("None"), Some(Swatch::None));
        // Exact match only.
        assert_eq!(standard_swatch("black"), None);
        assert_eq!(standard_swatch("C=100 M=0 Y=0 K=0"), None);
    }

    #[test]
    fn export_format_extension() {
        assert_eq!(ExportFormat::Pdf.extension(), "pdf");
        assert_eq!(ExportFormat::Png.extension(), "png");
    }
}

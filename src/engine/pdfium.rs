//! pdfium-backed document engine.
//!
//! ## Mapping the document model onto PDF
//!
//! | Document concept | PDF / pdfium |
//! |------------------|--------------|
//! | declared page name | page label (`/PageLabels`), when the file has one |
//! | annotation region | a page text object, plus a rectangle path object when the frame is stroked or filled |
//! | font | one of the 14 standard PDF fonts |
//! | swatch | [`standard_swatch`] name → RGB |
//! | overlay layer | not available: pdfium cannot author optional content groups |
//!
//! Regions are staged in memory while the pipeline sets their bounds,
//! contents and style one call at a time, and are written into the page
//! content streams once, at export. Closing the document drops the pdfium
//! handle without saving, so the source file is never modified.
//!
//! ## Staging
//!
//! A pdfium text object is created with its font, size and position fixed.
//! The pipeline applies those one by one with a fallback chain in between,
//! so the final object can only be built after the last styling call.

use super::{
    standard_swatch, Alignment, AnnotatableDocument, DocumentEngine, ExportFormat, ExportOptions,
    LayerHandle, PageHandle, Rect, RegionId, Swatch,
};
use crate::error::{EngineError, StampError};
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Bind to a pdfium library.
///
/// Resolution order: `PDFIUM_LIB_PATH`, a library next to the running
/// executable, then the system library search path.
pub fn bind_pdfium() -> Result<Pdfium, StampError> {
    let bindings = if let Some(path) = std::env::var_os("PDFIUM_LIB_PATH") {
        debug!("Binding pdfium from PDFIUM_LIB_PATH={:?}", path);
        Pdfium::bind_to_library(&PathBuf::from(path))
    } else {
        let beside_exe = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf))
            .map(|dir| Pdfium::pdfium_platform_library_name_at_path(&dir));
        match beside_exe {
            Some(lib) if lib.exists() => Pdfium::bind_to_library(&lib),
            _ => Pdfium::bind_to_system_library(),
        }
    }
    .map_err(|e| StampError::PdfiumBindingFailed(format!("{:?}", e)))?;

    Ok(Pdfium::new(bindings))
}

/// File name of the PNG render of the 1-based `page_num` for a derivative
/// requested at `base`.
pub fn png_page_path(base: &Path, page_num: usize) -> PathBuf {
    let stem = base
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "page".to_string());
    base.with_file_name(format!("{stem}-p{page_num}.png"))
}

/// Opens PDF files through a bound pdfium library.
pub struct PdfiumEngine {
    pdfium: Pdfium,
    password: Option<String>,
}

impl PdfiumEngine {
    pub fn new(pdfium: Pdfium) -> Self {
        Self {
            pdfium,
            password: None,
        }
    }

    /// Bind with [`bind_pdfium`] and wrap the result.
    pub fn bind() -> Result<Self, StampError> {
        Ok(Self::new(bind_pdfium()?))
    }

    /// User password for encrypted documents.
    pub fn with_password(mut self, password: Option<String>) -> Self {
        self.password = password;
        self
    }
}

impl DocumentEngine for PdfiumEngine {
    type Document<'a> = PdfiumDocument<'a>;

    fn name(&self) -> &'static str {
        "pdfium"
    }

    fn open<'a>(&'a self, path: &Path) -> Result<Self::Document<'a>, EngineError> {
        let document = self
            .pdfium
            .load_pdf_from_file(path, self.password.as_deref())
            .map_err(|e| EngineError::Backend(format!("{:?}", e)))?;

        let mut labels = Vec::new();
        let mut sizes = Vec::new();
        for page in document.pages().iter() {
            labels.push(page.label().map(str::to_string));
            sizes.push((page.width().value, page.height().value));
        }
        info!(
            "PDF loaded: {} pages, {} labelled",
            sizes.len(),
            labels.iter().filter(|l| l.is_some()).count()
        );

        Ok(PdfiumDocument {
            document,
            labels,
            sizes,
            regions: Vec::new(),
            written: Vec::new(),
        })
    }
}

/// A region waiting to be written into its page.
#[derive(Debug, Clone)]
struct StagedRegion {
    page: usize,
    rect: Option<Rect>,
    text: Option<String>,
    point_size: f32,
    alignment: Alignment,
    font: Option<PdfFontBuiltin>,
    text_color: Option<PdfColor>,
    stroke: Option<(f32, PdfColor)>,
    fill: Option<PdfColor>,
}

/// An open PDF plus the regions staged on it.
pub struct PdfiumDocument<'a> {
    document: PdfDocument<'a>,
    labels: Vec<Option<String>>,
    /// `(width, height)` in points, per page.
    sizes: Vec<(f32, f32)>,
    regions: Vec<StagedRegion>,
    /// 0-based pages that received content, in first-write order.
    written: Vec<usize>,
}

fn backend(e: PdfiumError) -> EngineError {
    EngineError::Backend(format!("{:?}", e))
}

/// Map a font name onto the standard PDF font with that PostScript name.
fn builtin_font(name: &str) -> Option<PdfFontBuiltin> {
    let font = match name {
        "Helvetica" => PdfFontBuiltin::Helvetica,
        "Helvetica-Bold" => PdfFontBuiltin::HelveticaBold,
        "Helvetica-Oblique" => PdfFontBuiltin::HelveticaOblique,
        "Times-Roman" => PdfFontBuiltin::TimesRoman,
        "Times-Bold" => PdfFontBuiltin::TimesBold,
        "Times-Italic" => PdfFontBuiltin::TimesItalic,
        "Courier" => PdfFontBuiltin::Courier,
        "Courier-Bold" => PdfFontBuiltin::CourierBold,
        "Symbol" => PdfFontBuiltin::Symbol,
        "ZapfDingbats" => PdfFontBuiltin::ZapfDingbats,
        _ => return None,
    };
    Some(font)
}

/// `Ok(None)` for the transparent swatch.
fn swatch_color(name: &str) -> Result<Option<PdfColor>, EngineError> {
    match standard_swatch(name) {
        Some(Swatch::None) => Ok(None),
        Some(Swatch::Rgb(r, g, b)) => Ok(Some(PdfColor::new(r, g, b, 255))),
        None => Err(EngineError::NotFound {
            kind: "swatch",
            name: name.to_string(),
        }),
    }
}

impl<'a> PdfiumDocument<'a> {
    fn check_page(&self, page: PageHandle) -> Result<(), EngineError> {
        if page.index() < self.sizes.len() {
            Ok(())
        } else {
            Err(EngineError::InvalidHandle(format!(
                "page index {}",
                page.index()
            )))
        }
    }

    fn region_mut(&mut self, region: RegionId) -> Result<&mut StagedRegion, EngineError> {
        self.regions
            .get_mut(region.get())
            .ok_or_else(|| EngineError::InvalidHandle(format!("region {}", region.get())))
    }

    fn page(&self, index: usize) -> Result<PdfPage<'_>, EngineError> {
        let index = PdfPageIndex::try_from(index)
            .map_err(|_| EngineError::InvalidHandle(format!("page index {index}")))?;
        self.document.pages().get(index).map_err(backend)
    }

    /// Write every staged region into its page's content stream.
    fn write_regions(&mut self) -> Result<(), EngineError> {
        let staged = std::mem::take(&mut self.regions);
        for region in staged {
            let (Some(rect), Some(text)) = (region.rect, region.text.as_deref()) else {
                continue;
            };
            let page_height = self.sizes[region.page].1;

            // Frame first so the text paints over it.
            let stroke_color = region.stroke.map(|(_, c)| c);
            let stroke_width = region.stroke.map(|(w, _)| PdfPoints::new(w));
            if stroke_color.is_some() || region.fill.is_some() {
                let frame = PdfRect::new_from_values(
                    page_height - rect.bottom,
                    rect.left,
                    page_height - rect.top,
                    rect.right,
                );
                let mut page = self.page(region.page)?;
                page.objects_mut()
                    .create_path_object_rect(frame, stroke_color, stroke_width, region.fill)
                    .map_err(backend)?;
            }

            let font = self
                .document
                .fonts_mut()
                .new_built_in(region.font.unwrap_or(PdfFontBuiltin::Helvetica));
            let baseline = page_height - rect.top - region.point_size;

            {
                let mut page = self.page(region.page)?;
                let mut object = page
                    .objects_mut()
                    .create_text_object(
                        PdfPoints::new(rect.left),
                        PdfPoints::new(baseline),
                        text,
                        font,
                        PdfPoints::new(region.point_size),
                    )
                    .map_err(backend)?;

                if let Some(color) = region.text_color {
                    object.set_fill_color(color).map_err(backend)?;
                }

                let slack = match region.alignment {
                    Alignment::Left => 0.0,
                    Alignment::Center | Alignment::Right => {
                        let width = object.width().map_err(backend)?.value;
                        let free = (rect.width() - width).max(0.0);
                        if region.alignment == Alignment::Center {
                            free / 2.0
                        } else {
                            free
                        }
                    }
                };
                if slack > 0.0 {
                    object
                        .translate(PdfPoints::new(slack), PdfPoints::new(0.0))
                        .map_err(backend)?;
                }
            }

            if !self.written.contains(&region.page) {
                self.written.push(region.page);
            }
            debug!("Wrote region on page {}: {:?}", region.page + 1, text);
        }
        Ok(())
    }

    fn save_pdf(&mut self, path: &Path, flatten: bool) -> Result<Vec<PathBuf>, EngineError> {
        if flatten {
            for &index in &self.written {
                let mut page = self.page(index)?;
                page.flatten().map_err(backend)?;
            }
        }

        // Atomic write: save beside the target, then rename over it.
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let tmp = tempfile::Builder::new()
            .suffix(".pdf.tmp")
            .tempfile_in(dir)
            .map_err(|e| EngineError::Backend(e.to_string()))?;
        self.document.save_to_file(tmp.path()).map_err(backend)?;
        tmp.persist(path)
            .map_err(|e| EngineError::Backend(e.to_string()))?;

        info!("Saved annotated PDF → {}", path.display());
        Ok(vec![path.to_path_buf()])
    }

    fn save_pngs(&self, path: &Path, width: u32) -> Result<Vec<PathBuf>, EngineError> {
        if self.written.is_empty() {
            return Err(EngineError::NothingToExport(
                "no annotated page to render".into(),
            ));
        }
        let render_config = PdfRenderConfig::new().set_target_width(width as i32);
        let mut files = Vec::with_capacity(self.written.len());

        for &index in &self.written {
            let page = self.page(index)?;
            let bitmap = page.render_with_config(&render_config).map_err(backend)?;
            let rendered = bitmap.as_image();
            let file = png_page_path(path, index + 1);
            rendered
                .save_with_format(&file, image::ImageFormat::Png)
                .map_err(|e| EngineError::Backend(e.to_string()))?;
            debug!(
                "Rendered page {} → {}x{} px",
                index + 1,
                rendered.width(),
                rendered.height()
            );
            files.push(file);
        }

        info!("Rendered {} annotated pages to PNG", files.len());
        Ok(files)
    }
}

impl<'a> AnnotatableDocument for PdfiumDocument<'a> {
    fn page_count(&self) -> usize {
        self.sizes.len()
    }

    fn page_by_name(&self, name: &str) -> Result<Option<PageHandle>, EngineError> {
        Ok(self
            .labels
            .iter()
            .position(|label| label.as_deref() == Some(name))
            .map(PageHandle::new))
    }

    fn page_at(&self, index: usize) -> Result<PageHandle, EngineError> {
        let page = PageHandle::new(index);
        self.check_page(page)?;
        Ok(page)
    }

    fn page_name(&self, page: PageHandle) -> Result<String, EngineError> {
        self.check_page(page)?;
        Ok(self.labels[page.index()]
            .clone()
            .unwrap_or_else(|| (page.index() + 1).to_string()))
    }

    fn page_bounds(&self, page: PageHandle) -> Result<Rect, EngineError> {
        self.check_page(page)?;
        let (width, height) = self.sizes[page.index()];
        Ok(Rect::new(0.0, 0.0, height, width))
    }

    fn layer_names(&self) -> Vec<String> {
        Vec::new()
    }

    fn ensure_layer(&mut self, _name: &str) -> Result<LayerHandle, EngineError> {
        Err(EngineError::Unsupported(
            "optional content layers cannot be authored through pdfium".into(),
        ))
    }

    fn add_region(
        &mut self,
        page: PageHandle,
        layer: Option<&LayerHandle>,
    ) -> Result<RegionId, EngineError> {
        self.check_page(page)?;
        if let Some(layer) = layer {
            return Err(EngineError::NotFound {
                kind: "layer",
                name: layer.name().to_string(),
            });
        }
        self.regions.push(StagedRegion {
            page: page.index(),
            rect: None,
            text: None,
            point_size: 12.0,
            alignment: Alignment::Left,
            font: None,
            text_color: None,
            stroke: None,
            fill: None,
        });
        Ok(RegionId::new(self.regions.len() - 1))
    }

    fn set_bounds(&mut self, region: RegionId, rect: Rect) -> Result<(), EngineError> {
        if !rect.is_valid() {
            return Err(EngineError::Backend(format!("degenerate bounds {rect:?}")));
        }
        self.region_mut(region)?.rect = Some(rect);
        Ok(())
    }

    fn set_contents(&mut self, region: RegionId, text: &str) -> Result<(), EngineError> {
        self.region_mut(region)?.text = Some(text.to_string());
        Ok(())
    }

    fn set_point_size(&mut self, region: RegionId, size: f32) -> Result<(), EngineError> {
        if !(size > 0.0 && size.is_finite()) {
            return Err(EngineError::Backend(format!("point size {size} rejected")));
        }
        self.region_mut(region)?.point_size = size;
        Ok(())
    }

    fn set_alignment(
        &mut self,
        region: RegionId,
        alignment: Alignment,
    ) -> Result<(), EngineError> {
        self.region_mut(region)?.alignment = alignment;
        Ok(())
    }

    fn apply_font(&mut self, region: RegionId, name: &str) -> Result<(), EngineError> {
        let font = builtin_font(name).ok_or_else(|| EngineError::NotFound {
            kind: "font",
            name: name.to_string(),
        })?;
        self.region_mut(region)?.font = Some(font);
        Ok(())
    }

    fn apply_text_color(&mut self, region: RegionId, swatch: &str) -> Result<(), EngineError> {
        let color = swatch_color(swatch)?;
        self.region_mut(region)?.text_color = color;
        Ok(())
    }

    fn apply_frame_stroke(
        &mut self,
        region: RegionId,
        weight: f32,
        swatch: Option<&str>,
    ) -> Result<(), EngineError> {
        let color = match swatch {
            Some(name) => swatch_color(name)?,
            None => Some(PdfColor::new(0, 0, 0, 255)),
        };
        let stroke = match color {
            Some(color) if weight > 0.0 => Some((weight, color)),
            _ => None,
        };
        self.region_mut(region)?.stroke = stroke;
        Ok(())
    }

    fn apply_frame_fill(&mut self, region: RegionId, swatch: &str) -> Result<(), EngineError> {
        let color = swatch_color(swatch)?;
        self.region_mut(region)?.fill = color;
        Ok(())
    }

    fn bring_to_front(&mut self, region: RegionId) -> Result<(), EngineError> {
        // Objects appended to a page already paint above its existing content.
        self.region_mut(region).map(|_| ())
    }

    fn export(
        &mut self,
        path: &Path,
        options: &ExportOptions,
    ) -> Result<Vec<PathBuf>, EngineError> {
        self.write_regions()?;
        match options.format {
            ExportFormat::Pdf => self.save_pdf(path, options.flatten),
            ExportFormat::Png => self.save_pngs(path, options.png_width),
        }
    }

    fn close(self) {
        debug!(
            "Closing PDF without saving ({} pages touched)",
            self.written.len()
        );
        drop(self.document);
    }
}

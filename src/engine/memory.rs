//! In-memory document engine.
//!
//! [`MemoryDocument`] models just enough of a paginated document for the
//! pipeline: pages with declared names and bounds, layers, a font list, a
//! swatch list and the regions added during a pass. Faults can be injected
//! per operation so every error path of the pipeline can be exercised
//! without a PDF library.
//!
//! [`MemoryEngine`] hands out fresh clones of a template document and keeps
//! a [`Journal`] of what happened to them, so a test can inspect a document
//! after the pipeline has closed it.

use super::{
    standard_swatch, Alignment, AnnotatableDocument, DocumentEngine, ExportFormat, ExportOptions,
    LayerHandle, PageHandle, Rect, RegionId,
};
use crate::error::EngineError;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

/// US Letter in points.
const LETTER: Rect = Rect {
    top: 0.0,
    left: 0.0,
    bottom: 792.0,
    right: 612.0,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemoryPage {
    pub name: String,
    pub bounds: Rect,
}

/// Everything written into one region during a pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MemoryRegion {
    pub page: usize,
    pub layer: Option<String>,
    pub rect: Option<Rect>,
    pub text: Option<String>,
    pub point_size: Option<f32>,
    pub alignment: Option<Alignment>,
    pub font: Option<String>,
    pub text_color: Option<String>,
    pub stroke: Option<(f32, Option<String>)>,
    pub fill: Option<String>,
    pub in_front: bool,
}

/// Operations that should fail on purpose.
#[derive(Debug, Clone, Default)]
pub struct Faults {
    pub open: bool,
    pub name_lookup: bool,
    /// `ensure_layer` fails as a rejected request.
    pub layers: bool,
    /// `ensure_layer` fails as an engine without layer support.
    pub layers_unsupported: bool,
    pub export: bool,
    /// 0-based page indices on which `add_region` fails.
    pub region_on_pages: Vec<usize>,
    /// 0-based page indices on which `set_contents` fails.
    pub contents_on_pages: Vec<usize>,
    pub point_size: bool,
    pub alignment: bool,
}

/// What a [`MemoryEngine`] observed across passes.
#[derive(Debug, Default)]
pub struct Journal {
    pub opened: usize,
    pub closed: Vec<MemoryDocument>,
    pub exports: Vec<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct MemoryDocument {
    pages: Vec<MemoryPage>,
    layers: Vec<String>,
    regions: Vec<MemoryRegion>,
    fonts: Vec<String>,
    swatches: Vec<String>,
    faults: Faults,
    journal: Option<Arc<Mutex<Journal>>>,
}

impl MemoryDocument {
    /// `count` US Letter pages whose declared names are "1", "2", ….
    pub fn with_pages(count: usize) -> Self {
        Self::with_page_names((1..=count).map(|n| n.to_string()))
    }

    /// One US Letter page per name, in order.
    pub fn with_page_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            pages: names
                .into_iter()
                .map(|name| MemoryPage {
                    name: name.into(),
                    bounds: LETTER,
                })
                .collect(),
            layers: vec!["Layer 1".to_string()],
            regions: Vec::new(),
            fonts: ["Helvetica", "Times-Roman", "Courier", "Minion Pro"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            swatches: ["None", "Paper", "Black", "Registration", "Cyan", "Magenta", "Yellow"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            faults: Faults::default(),
            journal: None,
        }
    }

    /// Replace the list of fonts the document accepts.
    pub fn accept_fonts(mut self, fonts: &[&str]) -> Self {
        self.fonts = fonts.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Replace the list of swatches the document carries.
    pub fn with_swatches(mut self, swatches: &[&str]) -> Self {
        self.swatches = swatches.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_faults(mut self, faults: Faults) -> Self {
        self.faults = faults;
        self
    }

    pub fn pages(&self) -> &[MemoryPage] {
        &self.pages
    }

    pub fn regions(&self) -> &[MemoryRegion] {
        &self.regions
    }

    /// Regions placed on the page at `index`, in creation order.
    pub fn regions_on(&self, index: usize) -> Vec<&MemoryRegion> {
        self.regions.iter().filter(|r| r.page == index).collect()
    }

    fn region_mut(&mut self, region: RegionId) -> Result<&mut MemoryRegion, EngineError> {
        self.regions
            .get_mut(region.get())
            .ok_or_else(|| EngineError::InvalidHandle(format!("region {}", region.get())))
    }

    fn check_page(&self, page: PageHandle) -> Result<&MemoryPage, EngineError> {
        self.pages
            .get(page.index())
            .ok_or_else(|| EngineError::InvalidHandle(format!("page index {}", page.index())))
    }

    fn check_swatch(&self, swatch: &str) -> Result<(), EngineError> {
        if self.swatches.iter().any(|s| s == swatch) && standard_swatch(swatch).is_some() {
            Ok(())
        } else {
            Err(EngineError::NotFound {
                kind: "swatch",
                name: swatch.to_string(),
            })
        }
    }

    fn journal(&self) -> Option<MutexGuard<'_, Journal>> {
        self.journal
            .as_ref()
            .map(|j| j.lock().unwrap_or_else(|poisoned| poisoned.into_inner()))
    }
}

impl AnnotatableDocument for MemoryDocument {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_by_name(&self, name: &str) -> Result<Option<PageHandle>, EngineError> {
        if self.faults.name_lookup {
            return Err(EngineError::Backend("name lookup failed".into()));
        }
        Ok(self
            .pages
            .iter()
            .position(|p| p.name == name)
            .map(PageHandle::new))
    }

    fn page_at(&self, index: usize) -> Result<PageHandle, EngineError> {
        let page = PageHandle::new(index);
        self.check_page(page)?;
        Ok(page)
    }

    fn page_name(&self, page: PageHandle) -> Result<String, EngineError> {
        Ok(self.check_page(page)?.name.clone())
    }

    fn page_bounds(&self, page: PageHandle) -> Result<Rect, EngineError> {
        Ok(self.check_page(page)?.bounds)
    }

    fn layer_names(&self) -> Vec<String> {
        self.layers.clone()
    }

    fn ensure_layer(&mut self, name: &str) -> Result<LayerHandle, EngineError> {
        if self.faults.layers_unsupported {
            return Err(EngineError::Unsupported("layers".into()));
        }
        if self.faults.layers {
            return Err(EngineError::Backend(format!("layer '{name}' rejected")));
        }
        if !self.layers.iter().any(|l| l == name) {
            self.layers.insert(0, name.to_string());
        }
        Ok(LayerHandle::new(name))
    }

    fn add_region(
        &mut self,
        page: PageHandle,
        layer: Option<&LayerHandle>,
    ) -> Result<RegionId, EngineError> {
        self.check_page(page)?;
        if self.faults.region_on_pages.contains(&page.index()) {
            return Err(EngineError::Backend(format!(
                "page {} is locked",
                page.index() + 1
            )));
        }
        if let Some(layer) = layer {
            if !self.layers.iter().any(|l| l == layer.name()) {
                return Err(EngineError::NotFound {
                    kind: "layer",
                    name: layer.name().to_string(),
                });
            }
        }
        self.regions.push(MemoryRegion {
            page: page.index(),
            layer: layer.map(|l| l.name().to_string()),
            ..MemoryRegion::default()
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
        let page = self.region_mut(region)?.page;
        if self.faults.contents_on_pages.contains(&page) {
            return Err(EngineError::Backend("contents rejected".into()));
        }
        self.region_mut(region)?.text = Some(text.to_string());
        Ok(())
    }

    fn set_point_size(&mut self, region: RegionId, size: f32) -> Result<(), EngineError> {
        if self.faults.point_size || size <= 0.0 {
            return Err(EngineError::Backend(format!("point size {size} rejected")));
        }
        self.region_mut(region)?.point_size = Some(size);
        Ok(())
    }

    fn set_alignment(
        &mut self,
        region: RegionId,
        alignment: Alignment,
    ) -> Result<(), EngineError> {
        if self.faults.alignment {
            return Err(EngineError::Backend("alignment rejected".into()));
        }
        self.region_mut(region)?.alignment = Some(alignment);
        Ok(())
    }

    fn apply_font(&mut self, region: RegionId, name: &str) -> Result<(), EngineError> {
        if !self.fonts.iter().any(|f| f == name) {
            return Err(EngineError::NotFound {
                kind: "font",
                name: name.to_string(),
            });
        }
        self.region_mut(region)?.font = Some(name.to_string());
        Ok(())
    }

    fn apply_text_color(&mut self, region: RegionId, swatch: &str) -> Result<(), EngineError> {
        self.check_swatch(swatch)?;
        self.region_mut(region)?.text_color = Some(swatch.to_string());
        Ok(())
    }

    fn apply_frame_stroke(
        &mut self,
        region: RegionId,
        weight: f32,
        swatch: Option<&str>,
    ) -> Result<(), EngineError> {
        if let Some(swatch) = swatch {
            self.check_swatch(swatch)?;
        }
        self.region_mut(region)?.stroke = Some((weight, swatch.map(str::to_string)));
        Ok(())
    }

    fn apply_frame_fill(&mut self, region: RegionId, swatch: &str) -> Result<(), EngineError> {
        self.check_swatch(swatch)?;
        self.region_mut(region)?.fill = Some(swatch.to_string());
        Ok(())
    }

    fn bring_to_front(&mut self, region: RegionId) -> Result<(), EngineError> {
        self.region_mut(region)?.in_front = true;
        Ok(())
    }

    fn export(
        &mut self,
        path: &Path,
        options: &ExportOptions,
    ) -> Result<Vec<PathBuf>, EngineError> {
        if self.faults.export {
            return Err(EngineError::Backend("export preset unavailable".into()));
        }
        if options.format == ExportFormat::Png && self.regions.is_empty() {
            return Err(EngineError::NothingToExport(
                "no annotated page to render".into(),
            ));
        }
        let body = serde_json::json!({
            "format": options.format,
            "pages": self.pages,
            "regions": self.regions,
        });
        let text = serde_json::to_string_pretty(&body)
            .map_err(|e| EngineError::Backend(e.to_string()))?;
        std::fs::write(path, text).map_err(|e| EngineError::Backend(e.to_string()))?;
        if let Some(mut journal) = self.journal() {
            journal.exports.push(path.to_path_buf());
        }
        Ok(vec![path.to_path_buf()])
    }

    fn close(self) {
        if let Some(journal) = self.journal.clone() {
            let mut journal = journal.lock().unwrap_or_else(|p| p.into_inner());
            let mut snapshot = self;
            snapshot.journal = None;
            journal.closed.push(snapshot);
        }
    }
}

/// Opens clones of a template [`MemoryDocument`], whatever the path.
#[derive(Debug, Clone)]
pub struct MemoryEngine {
    template: MemoryDocument,
    journal: Arc<Mutex<Journal>>,
}

impl MemoryEngine {
    pub fn new(template: MemoryDocument) -> Self {
        Self {
            template,
            journal: Arc::new(Mutex::new(Journal::default())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Journal> {
        self.journal.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// How many documents were opened.
    pub fn opened(&self) -> usize {
        self.lock().opened
    }

    /// Documents in the state they were closed in, oldest first.
    pub fn closed(&self) -> Vec<MemoryDocument> {
        self.lock().closed.clone()
    }

    pub fn exports(&self) -> Vec<PathBuf> {
        self.lock().exports.clone()
    }
}

impl DocumentEngine for MemoryEngine {
    type Document<'a> = MemoryDocument;

    fn name(&self) -> &'static str {
        "memory"
    }

    fn open<'a>(&'a self, path: &Path) -> Result<Self::Document<'a>, EngineError> {
        if self.template.faults.open {
            return Err(EngineError::Backend(format!(
                "cannot open {}",
                path.display()
            )));
        }
        self.lock().opened += 1;
        let mut doc = self.template.clone();
        doc.journal = Some(Arc::clone(&self.journal));
        Ok(doc)
    }
}

//! Annotation placement: rectangle, region, text, then best-effort styling.
//!
//! ## Failure policy
//!
//! Only three steps can fail a row: creating the region, setting its
//! bounds, setting its contents. Once the text is in the document the
//! annotation exists, so every later step (size, alignment, font, colours,
//! stacking) is attempted independently and a refusal becomes a
//! [`StylingWarning`] on an otherwise successful insertion.
//!
//! Fonts are a fallback chain: the first candidate the engine accepts wins,
//! and if none is accepted the engine's default font stays in place.

use crate::engine::{Alignment, AnnotatableDocument, LayerHandle, Rect, RegionId};
use crate::error::StylingWarning;
use crate::pipeline::pages::ResolvedPage;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Page corner a [`Placement::Anchored`] rectangle is measured from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Anchor {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

/// Where the annotation goes on a page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Placement {
    /// A fixed-size box inset from one corner of the page boundary.
    ///
    /// `inset_x` is the distance from the anchor's vertical edge to the
    /// nearest side of the box; `inset_y` likewise for the horizontal edge.
    Anchored {
        anchor: Anchor,
        inset_x: f32,
        inset_y: f32,
        width: f32,
        height: f32,
    },
    /// A rectangle relative to the page's top-left corner.
    Absolute(Rect),
}

impl Default for Placement {
    /// A 250×30 pt footer box, 30 pt from the left edge, its bottom 60 pt
    /// above the bottom of the page.
    fn default() -> Self {
        Placement::Anchored {
            anchor: Anchor::BottomLeft,
            inset_x: 30.0,
            inset_y: 60.0,
            width: 250.0,
            height: 30.0,
        }
    }
}

impl Placement {
    /// Compute the annotation rectangle for a page with boundary `page`.
    pub fn rect_for(&self, page: Rect) -> Rect {
        match *self {
            Placement::Absolute(r) => Rect::new(
                page.top + r.top,
                page.left + r.left,
                page.top + r.bottom,
                page.left + r.right,
            ),
            Placement::Anchored {
                anchor,
                inset_x,
                inset_y,
                width,
                height,
            } => {
                let (left, right) = match anchor {
                    Anchor::TopLeft | Anchor::BottomLeft => {
                        let left = page.left + inset_x;
                        (left, left + width)
                    }
                    Anchor::TopRight | Anchor::BottomRight => {
                        let right = page.right - inset_x;
                        (right - width, right)
                    }
                };
                let (top, bottom) = match anchor {
                    Anchor::TopLeft | Anchor::TopRight => {
                        let top = page.top + inset_y;
                        (top, top + height)
                    }
                    Anchor::BottomLeft | Anchor::BottomRight => {
                        let bottom = page.bottom - inset_y;
                        (bottom - height, bottom)
                    }
                };
                Rect::new(top, left, bottom, right)
            }
        }
    }
}

/// Outline of the annotation frame. Weight 0 means no outline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameStroke {
    pub weight: f32,
    pub swatch: Option<String>,
}

/// Text and frame styling applied after the contents are set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextStyle {
    pub point_size: f32,
    pub alignment: Alignment,
    /// Tried in order; the first accepted font is used.
    pub fonts: Vec<String>,
    pub text_color: Option<String>,
    pub frame_stroke: Option<FrameStroke>,
    pub frame_fill: Option<String>,
}

impl Default for TextStyle {
    /// 9 pt black text, left aligned, no visible frame.
    fn default() -> Self {
        Self {
            point_size: 9.0,
            alignment: Alignment::Left,
            fonts: ["Helvetica", "Arial", "Times-Roman", "Courier"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            text_color: Some("Black".to_string()),
            frame_stroke: Some(FrameStroke {
                weight: 0.0,
                swatch: None,
            }),
            frame_fill: Some("None".to_string()),
        }
    }
}

/// Text written into each annotation. `{codes}` and `{page}` are replaced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelTemplate(pub String);

impl Default for LabelTemplate {
    fn default() -> Self {
        LabelTemplate("{codes}".to_string())
    }
}

impl LabelTemplate {
    pub fn render(&self, codes: &str, page_name: &str) -> String {
        self.0.replace("{codes}", codes).replace("{page}", page_name)
    }
}

/// Result of one placement.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaceOutcome {
    Inserted {
        region: RegionId,
        rect: Rect,
        warnings: Vec<StylingWarning>,
    },
    Failed(String),
}

/// Return the first candidate for which `apply` succeeds.
pub fn first_successful<C, E>(
    candidates: impl IntoIterator<Item = C>,
    mut apply: impl FnMut(&C) -> Result<(), E>,
) -> Option<C> {
    candidates.into_iter().find(|c| apply(c).is_ok())
}

/// Add one annotation to `page`.
pub fn place<D: AnnotatableDocument + ?Sized>(
    doc: &mut D,
    page: &ResolvedPage,
    layer: Option<&LayerHandle>,
    placement: &Placement,
    text: &str,
    style: &TextStyle,
) -> PlaceOutcome {
    let bounds = match doc.page_bounds(page.handle) {
        Ok(b) => b,
        Err(e) => return PlaceOutcome::Failed(format!("page bounds unavailable: {e}")),
    };
    let rect = placement.rect_for(bounds);

    let region = match doc.add_region(page.handle, layer) {
        Ok(r) => r,
        Err(e) => return PlaceOutcome::Failed(format!("region not created: {e}")),
    };
    if let Err(e) = doc.set_bounds(region, rect) {
        return PlaceOutcome::Failed(format!("bounds {rect:?} rejected: {e}"));
    }
    if let Err(e) = doc.set_contents(region, text) {
        return PlaceOutcome::Failed(format!("contents rejected: {e}"));
    }

    let warnings = apply_style(doc, region, style);
    for w in &warnings {
        debug!("Page {}: {}", page.name, w);
    }

    PlaceOutcome::Inserted {
        region,
        rect,
        warnings,
    }
}

fn apply_style<D: AnnotatableDocument + ?Sized>(
    doc: &mut D,
    region: RegionId,
    style: &TextStyle,
) -> Vec<StylingWarning> {
    let mut warnings = Vec::new();

    if let Err(e) = doc.set_point_size(region, style.point_size) {
        warnings.push(StylingWarning::PointSize {
            size: style.point_size,
            detail: e.to_string(),
        });
    }

    if let Err(e) = doc.set_alignment(region, style.alignment) {
        warnings.push(StylingWarning::Alignment {
            detail: e.to_string(),
        });
    }

    let font = first_successful(&style.fonts, |name| doc.apply_font(region, name));
    if font.is_none() && !style.fonts.is_empty() {
        warnings.push(StylingWarning::NoFont {
            tried: style.fonts.clone(),
        });
    }

    if let Some(ref swatch) = style.text_color {
        if let Err(e) = doc.apply_text_color(region, swatch) {
            warnings.push(StylingWarning::TextColor {
                swatch: swatch.clone(),
                detail: e.to_string(),
            });
        }
    }

    if let Some(ref stroke) = style.frame_stroke {
        if let Err(e) = doc.apply_frame_stroke(region, stroke.weight, stroke.swatch.as_deref()) {
            warnings.push(StylingWarning::FrameStroke {
                detail: e.to_string(),
            });
        }
    }

    if let Some(ref swatch) = style.frame_fill {
        if let Err(e) = doc.apply_frame_fill(region, swatch) {
            warnings.push(StylingWarning::FrameFill {
                swatch: swatch.clone(),
                detail: e.to_string(),
            });
        }
    }

    if let Err(e) = doc.bring_to_front(region) {
        warnings.push(StylingWarning::BringToFront {
            detail: e.to_string(),
        });
    }

    warnings
}

//! Configuration types for a stamping pass.
//!
//! All pass behaviour is controlled through [`StampConfig`], built via its
//! [`StampConfigBuilder`]. Every field has a default, so
//! `StampConfig::default()` reproduces the stock layout: codes in a 250×30 pt
//! box at the bottom-left of each page, 9 pt black Helvetica, on a layer
//! named "Automation Overlay", exported as a flattened PDF.

use crate::engine::{Alignment, ExportFormat, ExportOptions};
use crate::error::StampError;
use crate::pipeline::columns::ColumnLabels;
use crate::pipeline::place::{LabelTemplate, Placement, TextStyle};
use crate::progress::ProgressCallback;
use std::fmt;
use std::path::PathBuf;

/// Layer the annotations go on unless configured otherwise.
pub const DEFAULT_LAYER: &str = "Automation Overlay";

/// Configuration for one stamping pass.
///
/// Built via [`StampConfig::builder()`] or using [`StampConfig::default()`].
///
/// # Example
/// ```rust
/// use pdf_codestamp::StampConfig;
///
/// let config = StampConfig::builder()
///     .point_size(10.0)
///     .label("{codes} (p. {page})")
///     .group_by_page(true)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct StampConfig {
    /// Header labels of the page and code columns.
    pub labels: ColumnLabels,

    /// Where the annotation box goes on each page.
    pub placement: Placement,

    /// Text and frame styling.
    pub style: TextStyle,

    /// Annotation text; `{codes}` and `{page}` are substituted. Default: `"{codes}"`.
    pub label: LabelTemplate,

    /// Layer to place annotations on. `None` places them on the document's
    /// active layer. Default: [`DEFAULT_LAYER`].
    pub layer: Option<String>,

    /// Collapse the table to one row per page before stamping. Default: false.
    pub group_by_page: bool,

    /// With grouping, pull standards codes out of free text instead of
    /// splitting the code field on commas. Default: false.
    pub extract_codes: bool,

    /// Also write the grouped table to this path.
    pub write_grouped: Option<PathBuf>,

    /// Format and options of the exported derivative.
    pub export: ExportOptions,

    /// User password for encrypted documents.
    pub password: Option<String>,

    /// Optional progress callback.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for StampConfig {
    fn default() -> Self {
        Self {
            labels: ColumnLabels::default(),
            placement: Placement::default(),
            style: TextStyle::default(),
            label: LabelTemplate::default(),
            layer: Some(DEFAULT_LAYER.to_string()),
            group_by_page: false,
            extract_codes: false,
            write_grouped: None,
            export: ExportOptions::default(),
            password: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for StampConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StampConfig")
            .field("labels", &self.labels)
            .field("placement", &self.placement)
            .field("style", &self.style)
            .field("label", &self.label)
            .field("layer", &self.layer)
            .field("group_by_page", &self.group_by_page)
            .field("extract_codes", &self.extract_codes)
            .field("write_grouped", &self.write_grouped)
            .field("export", &self.export)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn StampProgressCallback>"),
            )
            .finish()
    }
}

impl StampConfig {
    /// Create a new builder for `StampConfig`.
    pub fn builder() -> StampConfigBuilder {
        StampConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`StampConfig`].
pub struct StampConfigBuilder {
    config: StampConfig,
}

impl fmt::Debug for StampConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StampConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl StampConfigBuilder {
    pub fn page_column(mut self, label: impl Into<String>) -> Self {
        self.config.labels.page = label.into();
        self
    }

    pub fn code_column(mut self, label: impl Into<String>) -> Self {
        self.config.labels.code = label.into();
        self
    }

    pub fn placement(mut self, placement: Placement) -> Self {
        self.config.placement = placement;
        self
    }

    pub fn style(mut self, style: TextStyle) -> Self {
        self.config.style = style;
        self
    }

    pub fn point_size(mut self, size: f32) -> Self {
        self.config.style.point_size = size;
        self
    }

    pub fn alignment(mut self, alignment: Alignment) -> Self {
        self.config.style.alignment = alignment;
        self
    }

    /// Replace the font fallback chain.
    pub fn fonts<I, S>(mut self, fonts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.style.fonts = fonts.into_iter().map(Into::into).collect();
        self
    }

    pub fn text_color(mut self, swatch: impl Into<String>) -> Self {
        self.config.style.text_color = Some(swatch.into());
        self
    }

    pub fn label(mut self, template: impl Into<String>) -> Self {
        self.config.label = LabelTemplate(template.into());
        self
    }

    pub fn layer(mut self, name: impl Into<String>) -> Self {
        self.config.layer = Some(name.into());
        self
    }

    /// Place annotations without creating or selecting a layer.
    pub fn no_layer(mut self) -> Self {
        self.config.layer = None;
        self
    }

    pub fn group_by_page(mut self, v: bool) -> Self {
        self.config.group_by_page = v;
        self
    }

    pub fn extract_codes(mut self, v: bool) -> Self {
        self.config.extract_codes = v;
        self
    }

    pub fn write_grouped(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.write_grouped = Some(path.into());
        self
    }

    pub fn format(mut self, format: ExportFormat) -> Self {
        self.config.export.format = format;
        self
    }

    pub fn flatten(mut self, v: bool) -> Self {
        self.config.export.flatten = v;
        self
    }

    pub fn png_width(mut self, px: u32) -> Self {
        self.config.export.png_width = px;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<StampConfig, StampError> {
        let c = &self.config;
        if c.labels.page.trim().is_empty() || c.labels.code.trim().is_empty() {
            return Err(StampError::InvalidConfig(
                "Column labels must not be blank".into(),
            ));
        }
        if !(c.style.point_size > 0.0 && c.style.point_size <= 1296.0) {
            return Err(StampError::InvalidConfig(format!(
                "Point size must be in (0, 1296], got {}",
                c.style.point_size
            )));
        }
        match c.placement {
            Placement::Anchored { width, height, .. } if width <= 0.0 || height <= 0.0 => {
                return Err(StampError::InvalidConfig(format!(
                    "Annotation box must have positive size, got {width}×{height}"
                )));
            }
            Placement::Absolute(rect) if !rect.is_valid() => {
                return Err(StampError::InvalidConfig(format!(
                    "Absolute rectangle is degenerate: {rect:?}"
                )));
            }
            _ => {}
        }
        if matches!(c.layer.as_deref(), Some(name) if name.trim().is_empty()) {
            return Err(StampError::InvalidConfig(
                "Layer name must not be blank (use no_layer() instead)".into(),
            ));
        }
        if c.extract_codes && !c.group_by_page {
            return Err(StampError::InvalidConfig(
                "extract_codes requires group_by_page".into(),
            ));
        }
        if c.write_grouped.is_some() && !c.group_by_page {
            return Err(StampError::InvalidConfig(
                "write_grouped requires group_by_page".into(),
            ));
        }
        if c.export.format == ExportFormat::Png && !(16..=10_000).contains(&c.export.png_width) {
            return Err(StampError::InvalidConfig(format!(
                "PNG width must be 16–10000 px, got {}",
                c.export.png_width
            )));
        }
        Ok(self.config)
    }
}

mod engine;
mod font;
mod render;

use anyhow::{Context, Result};
use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

pub use engine::{
    BreakPoints, DrawCommand, Fit, GlyphPlacement, Hyphenator, LayoutError, LayoutPlan,
    NoHyphenation, SizeBounds, WordBreak, WrapError, WrapMode, WrapParams, WrapResult,
    break_word, compose_layout, draw_commands, fit_text, group_box, group_boxes,
    normalize_text, outline_offsets, wrap_text,
};
pub use font::{
    EMBEDDED_FAMILY, FontCandidate, FontMetrics, GlyphMetrics, OverlayFont, TextMeasure,
    load_font_metrics, measure_block, resolve_overlay_font,
};
pub use render::{
    Rgb, composite_pixmap, parse_hex_color, render_commands, render_groups_svg,
    render_svg_bytes,
};

use crate::settings::Settings;

/// Axis-aligned pixel rectangle. Always has positive width and height, and both extents
/// fit in an `i32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "[i32; 4]", into = "[i32; 4]")]
pub struct Rect {
    x_min: i32,
    y_min: i32,
    x_max: i32,
    y_max: i32,
}

impl Rect {
    pub fn new(x_min: i32, y_min: i32, x_max: i32, y_max: i32) -> Option<Self> {
        let width = x_max.checked_sub(x_min)?;
        let height = y_max.checked_sub(y_min)?;
        if width > 0 && height > 0 {
            Some(Self {
                x_min,
                y_min,
                x_max,
                y_max,
            })
        } else {
            None
        }
    }

    pub fn x_min(&self) -> i32 {
        self.x_min
    }

    pub fn y_min(&self) -> i32 {
        self.y_min
    }

    pub fn x_max(&self) -> i32 {
        self.x_max
    }

    pub fn y_max(&self) -> i32 {
        self.y_max
    }

    pub fn width(&self) -> i32 {
        self.x_max.saturating_sub(self.x_min)
    }

    pub fn height(&self) -> i32 {
        self.y_max.saturating_sub(self.y_min)
    }

    pub fn contains(&self, other: &Rect) -> bool {
        self.x_min <= other.x_min
            && self.y_min <= other.y_min
            && self.x_max >= other.x_max
            && self.y_max >= other.y_max
    }

    pub fn union(&self, other: &Rect) -> Rect {
        Rect {
            x_min: self.x_min.min(other.x_min),
            y_min: self.y_min.min(other.y_min),
            x_max: self.x_max.max(other.x_max),
            y_max: self.y_max.max(other.y_max),
        }
    }
}

impl TryFrom<[i32; 4]> for Rect {
    type Error = String;

    fn try_from(value: [i32; 4]) -> std::result::Result<Self, Self::Error> {
        let [x_min, y_min, x_max, y_max] = value;
        Rect::new(x_min, y_min, x_max, y_max).ok_or_else(|| {
            format!(
                "invalid rectangle [{}, {}, {}, {}]: max must exceed min within i32 range",
                x_min, y_min, x_max, y_max
            )
        })
    }
}

impl From<Rect> for [i32; 4] {
    fn from(rect: Rect) -> Self {
        [rect.x_min, rect.y_min, rect.x_max, rect.y_max]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionBox {
    pub bbox: Rect,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
}

impl DetectionBox {
    pub fn new(bbox: Rect) -> Self {
        Self {
            bbox,
            text: None,
            confidence: None,
        }
    }

    pub fn with_text(bbox: Rect, text: impl Into<String>) -> Self {
        Self {
            bbox,
            text: Some(text.into()),
            confidence: None,
        }
    }
}

/// Detection boxes judged to belong to one speech bubble, in reading order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionGroup {
    boxes: Vec<DetectionBox>,
    group_box: Rect,
}

impl RegionGroup {
    pub(crate) fn from_boxes(boxes: Vec<DetectionBox>) -> Option<Self> {
        let group_box = group_box(&boxes)?;
        Some(Self { boxes, group_box })
    }

    pub fn boxes(&self) -> &[DetectionBox] {
        &self.boxes
    }

    pub fn group_box(&self) -> Rect {
        self.group_box
    }

    /// Member texts joined with single spaces, skipping boxes without text.
    pub fn combined_text(&self) -> String {
        self.boxes
            .iter()
            .filter_map(|item| item.text.as_deref())
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone)]
pub struct OverlayStyle {
    pub text_color: Rgb,
    pub outline_color: Rgb,
    pub outline_width: u32,
    pub padding: i32,
    pub line_spacing: f32,
    pub bounds: SizeBounds,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            text_color: Rgb([0, 0, 0]),
            outline_color: Rgb([255, 255, 255]),
            outline_width: 2,
            padding: 5,
            line_spacing: 0.1,
            bounds: SizeBounds::default(),
        }
    }
}

/// Immutable typesetting context: resolved font, hyphenation dictionary and style.
///
/// Built once per process and shared by reference; nothing in it is mutated after
/// construction, so it can be used from several threads at once.
pub struct Typesetter {
    font: OverlayFont,
    dictionary: Box<dyn BreakPoints>,
    style: OverlayStyle,
}

impl Typesetter {
    pub fn new(font: OverlayFont, dictionary: Box<dyn BreakPoints>, style: OverlayStyle) -> Self {
        Self {
            font,
            dictionary,
            style,
        }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let mut candidates = Vec::new();
        if let Some(path) = settings.font_path.as_deref() {
            candidates.push(FontCandidate::Path(Path::new(path).to_path_buf()));
        }
        for family in &settings.font_families {
            candidates.push(FontCandidate::Family(family.clone()));
        }
        candidates.push(FontCandidate::AnySystem);
        let font = resolve_overlay_font(&candidates)?;

        let language = settings.hyphenation_language.trim();
        let dictionary: Box<dyn BreakPoints> = if language.eq_ignore_ascii_case("none") {
            Box::new(NoHyphenation)
        } else {
            Box::new(
                Hyphenator::load(language).with_context(|| {
                    format!("failed to load hyphenation dictionary: {}", language)
                })?,
            )
        };

        let style = OverlayStyle {
            text_color: parse_hex_color(&settings.text_color)?,
            outline_color: parse_hex_color(&settings.outline_color)?,
            outline_width: settings.outline_width,
            padding: settings.padding,
            line_spacing: settings.line_spacing,
            bounds: SizeBounds::new(settings.min_font_size, settings.max_font_size),
        };
        Ok(Self::new(font, dictionary, style))
    }

    pub fn font(&self) -> &OverlayFont {
        &self.font
    }

    pub fn style(&self) -> &OverlayStyle {
        &self.style
    }

    pub fn dictionary(&self) -> &dyn BreakPoints {
        self.dictionary.as_ref()
    }

    /// Normalizes `text`, searches the largest size that fits `rect` and places each line.
    pub fn plan(&self, text: &str, rect: Rect) -> std::result::Result<LayoutPlan, LayoutError> {
        let normalized = normalize_text(text);
        let padding = self.style.padding.max(0);
        let inner_w = rect.width() - padding * 2;
        let inner_h = rect.height() - padding * 2;
        if inner_w <= 0 || inner_h <= 0 {
            return Err(LayoutError::NoSpace { rect, padding });
        }

        let fit = fit_text(
            &normalized,
            inner_w as f32,
            inner_h as f32,
            self.style.bounds,
            self.style.line_spacing,
            &self.font,
            self.dictionary.as_ref(),
        );
        if let Fit::Degraded { size, .. } = &fit {
            warn!(
                "text does not fit {}x{} even at {}px; rendering with overflow",
                inner_w, inner_h, size
            );
        }
        debug!("fit {:?} for {:?}", fit.size(), rect);
        compose_layout(fit, rect, padding, self.style.line_spacing, &self.font)
    }

    /// Plans and draws `text` into `rect` of `image`, outline first and fill second.
    pub fn render(
        &self,
        image: &mut RgbImage,
        text: &str,
        rect: Rect,
    ) -> std::result::Result<LayoutPlan, LayoutError> {
        let plan = self.plan(text, rect)?;
        self.draw(image, &plan);
        Ok(plan)
    }

    pub fn draw(&self, image: &mut RgbImage, plan: &LayoutPlan) {
        let commands = draw_commands(
            plan,
            self.style.text_color,
            self.style.outline_color,
            self.style.outline_width,
        );
        render_commands(image, &commands, &self.font);
    }
}

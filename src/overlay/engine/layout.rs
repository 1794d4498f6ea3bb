use std::fmt;

use super::fit::Fit;
use super::wrap::WrapResult;
use crate::overlay::font::TextMeasure;
use crate::overlay::{Rect, Rgb};

/// One wrapped line anchored at its left edge and baseline.
#[derive(Debug, Clone, PartialEq)]
pub struct GlyphPlacement {
    pub text: String,
    pub x: f32,
    pub baseline: f32,
    pub width: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayoutPlan {
    pub rect: Rect,
    pub size: u32,
    pub wrap: WrapResult,
    /// Top-left corner of the text block.
    pub origin: (f32, f32),
    pub lines: Vec<GlyphPlacement>,
    pub degraded: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LayoutError {
    /// Padding leaves no room inside the target rectangle.
    NoSpace { rect: Rect, padding: i32 },
}

impl fmt::Display for LayoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayoutError::NoSpace { rect, padding } => write!(
                f,
                "{}x{} region at ({}, {}) has no room left after {}px padding",
                rect.width(),
                rect.height(),
                rect.x_min(),
                rect.y_min(),
                padding
            ),
        }
    }
}

impl std::error::Error for LayoutError {}

/// Centres the wrapped block inside `rect` shrunk by `padding`, each line centred
/// within the block.
pub fn compose_layout<M>(
    fit: Fit,
    rect: Rect,
    padding: i32,
    line_spacing: f32,
    measure: &M,
) -> Result<LayoutPlan, LayoutError>
where
    M: TextMeasure + ?Sized,
{
    let inner_w = rect.width() - padding * 2;
    let inner_h = rect.height() - padding * 2;
    if inner_w <= 0 || inner_h <= 0 {
        return Err(LayoutError::NoSpace { rect, padding });
    }

    let degraded = fit.is_degraded();
    let (size, wrap) = match fit {
        Fit::Fitted { size, wrap } | Fit::Degraded { size, wrap } => (size, wrap),
    };
    let size_px = size as f32;
    let left = (rect.x_min() + padding) as f32 + (inner_w as f32 - wrap.width) / 2.0;
    let top = (rect.y_min() + padding) as f32 + (inner_h as f32 - wrap.height) / 2.0;
    let advance = measure.line_height(size_px) + line_spacing * size_px;
    let ascent = measure.ascent(size_px);

    let lines = wrap
        .lines
        .iter()
        .enumerate()
        .map(|(idx, line)| {
            let width = measure.text_width(line, size_px);
            GlyphPlacement {
                text: line.clone(),
                x: left + (wrap.width - width) / 2.0,
                baseline: top + idx as f32 * advance + ascent,
                width,
            }
        })
        .collect();

    Ok(LayoutPlan {
        rect,
        size,
        wrap,
        origin: (left, top),
        lines,
        degraded,
    })
}

/// A single text run to rasterize.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawCommand {
    pub text: String,
    pub x: f32,
    pub baseline: f32,
    pub size: f32,
    pub color: Rgb,
}

/// Every offset within `width` pixels of the origin in both axes, origin excluded.
pub fn outline_offsets(width: u32) -> Vec<(i32, i32)> {
    let width = width as i32;
    let mut offsets = Vec::new();
    for dx in -width..=width {
        for dy in -width..=width {
            if dx != 0 || dy != 0 {
                offsets.push((dx, dy));
            }
        }
    }
    offsets
}

/// Outline pass at every offset in the outline colour, then the fill pass on top.
pub fn draw_commands(
    plan: &LayoutPlan,
    text_color: Rgb,
    outline_color: Rgb,
    outline_width: u32,
) -> Vec<DrawCommand> {
    let size = plan.size as f32;
    let offsets = outline_offsets(outline_width);
    let mut commands = Vec::with_capacity(plan.lines.len() * (offsets.len() + 1));
    for (dx, dy) in offsets {
        for line in &plan.lines {
            commands.push(DrawCommand {
                text: line.text.clone(),
                x: line.x + dx as f32,
                baseline: line.baseline + dy as f32,
                size,
                color: outline_color,
            });
        }
    }
    for line in &plan.lines {
        commands.push(DrawCommand {
            text: line.text.clone(),
            x: line.x,
            baseline: line.baseline,
            size,
            color: text_color,
        });
    }
    commands
}

use tracing::debug;

use super::hyphen::BreakPoints;
use super::wrap::{WrapMode, WrapParams, WrapResult, wrap_text};
use crate::overlay::font::TextMeasure;

/// Inclusive font-size range in pixels, normalised so `1 <= min <= max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeBounds {
    min: u32,
    max: u32,
}

impl SizeBounds {
    pub fn new(min: u32, max: u32) -> Self {
        let min = min.max(1);
        Self {
            min,
            max: max.max(min),
        }
    }

    pub fn min(&self) -> u32 {
        self.min
    }

    pub fn max(&self) -> u32 {
        self.max
    }

    pub fn contains(&self, size: u32) -> bool {
        (self.min..=self.max).contains(&size)
    }
}

impl Default for SizeBounds {
    fn default() -> Self {
        Self::new(10, 80)
    }
}

/// Outcome of the font-size search.
#[derive(Debug, Clone, PartialEq)]
pub enum Fit {
    /// Largest probed size whose wrap fits the box.
    Fitted { size: u32, wrap: WrapResult },
    /// Nothing fit, not even the minimum size. The wrap is an overflow-mode wrap at
    /// the minimum size and may exceed the box.
    Degraded { size: u32, wrap: WrapResult },
}

impl Fit {
    pub fn size(&self) -> u32 {
        match self {
            Fit::Fitted { size, .. } | Fit::Degraded { size, .. } => *size,
        }
    }

    pub fn wrap(&self) -> &WrapResult {
        match self {
            Fit::Fitted { wrap, .. } | Fit::Degraded { wrap, .. } => wrap,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Fit::Degraded { .. })
    }
}

/// Binary-searches the largest integer size in `bounds` at which `text` wraps into
/// `box_width` x `box_height`.
///
/// Assumes that a size which fits implies every smaller size fits. When that does not
/// hold the result still fits, but may not be the largest size that would.
pub fn fit_text<M, D>(
    text: &str,
    box_width: f32,
    box_height: f32,
    bounds: SizeBounds,
    line_spacing: f32,
    measure: &M,
    dictionary: &D,
) -> Fit
where
    M: TextMeasure + ?Sized,
    D: BreakPoints + ?Sized,
{
    let params = |size: u32| WrapParams {
        box_width,
        box_height,
        size: size as f32,
        line_spacing,
    };

    let mut low = bounds.min();
    let mut high = bounds.max();
    let mut best: Option<(u32, WrapResult)> = None;
    while low <= high {
        let mid = low + (high - low) / 2;
        match wrap_text(text, params(mid), WrapMode::Strict, measure, dictionary) {
            Ok(wrap) => {
                debug!("size {} fits in {} lines", mid, wrap.lines.len());
                best = Some((mid, wrap));
                low = mid + 1;
            }
            Err(err) => {
                debug!("size {} rejected: {}", mid, err);
                if mid == bounds.min() {
                    break;
                }
                high = mid - 1;
            }
        }
    }

    if let Some((size, wrap)) = best {
        return Fit::Fitted { size, wrap };
    }
    let size = bounds.min();
    let wrap = match wrap_text(text, params(size), WrapMode::Overflow, measure, dictionary) {
        Ok(wrap) => wrap,
        Err(_) => WrapResult {
            lines: vec![text.trim().to_string()],
            width: measure.text_width(text.trim(), size as f32),
            height: measure.line_height(size as f32),
        },
    };
    Fit::Degraded { size, wrap }
}

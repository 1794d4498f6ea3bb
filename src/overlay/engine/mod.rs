mod fit;
mod group;
mod hyphen;
mod layout;
mod text;
mod wrap;

pub use fit::{Fit, SizeBounds, fit_text};
pub use group::{group_box, group_boxes};
pub use hyphen::{BreakPoints, Hyphenator, NoHyphenation, WordBreak, break_word};
pub use layout::{
    DrawCommand, GlyphPlacement, LayoutError, LayoutPlan, compose_layout, draw_commands,
    outline_offsets,
};
pub use text::normalize_text;
pub use wrap::{WrapError, WrapMode, WrapParams, WrapResult, wrap_text};

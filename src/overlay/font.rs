use anyhow::{Context, Result, anyhow};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};
use ttf_parser::Face;
use ttf_parser::name_id;
use usvg::fontdb;

/// Pixel extent of a piece of text.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GlyphMetrics {
    pub width: f32,
    pub height: f32,
}

/// Measures text the same way the render pass lays glyphs out.
pub trait TextMeasure: Send + Sync {
    /// Advance width of a single line in pixels.
    fn text_width(&self, text: &str, size: f32) -> f32;
    /// Distance from the top of a line box to its baseline.
    fn ascent(&self, size: f32) -> f32;
    /// Distance from the baseline to the bottom of a line box.
    fn descent(&self, size: f32) -> f32;

    fn line_height(&self, size: f32) -> f32 {
        self.ascent(size) + self.descent(size)
    }

    fn measure(&self, text: &str, size: f32) -> GlyphMetrics {
        let lines: Vec<&str> = text.split('\n').collect();
        measure_block(self, &lines, size, 0.0)
    }
}

/// Width is the widest line; height sums line heights plus `line_spacing * size`
/// between consecutive lines.
pub fn measure_block<M, S>(measure: &M, lines: &[S], size: f32, line_spacing: f32) -> GlyphMetrics
where
    M: TextMeasure + ?Sized,
    S: AsRef<str>,
{
    if lines.is_empty() {
        return GlyphMetrics::default();
    }
    let width = lines
        .iter()
        .map(|line| measure.text_width(line.as_ref(), size))
        .fold(0.0, f32::max);
    let count = lines.len() as f32;
    let height = measure.line_height(size) * count + line_spacing * size * (count - 1.0);
    GlyphMetrics { width, height }
}

/// Face bundled into the binary; the last link of every fallback chain.
const EMBEDDED_FONT: &[u8] = include_bytes!("../../assets/fonts/DejaVuSans.ttf");
pub const EMBEDDED_FAMILY: &str = "DejaVu Sans";

/// Installed families that stand in for the generic `sans-serif`, in order of preference.
const SANS_SERIF_FAMILIES: &[&str] = &[
    "DejaVu Sans",
    "Liberation Sans",
    "Noto Sans",
    "FreeSans",
    "Arial",
    "Helvetica",
];

/// A face parsed once and kept next to the bytes it borrows from.
struct ParsedFace {
    // Declared before `data` so it is dropped first.
    face: Face<'static>,
    data: Arc<Vec<u8>>,
}

impl ParsedFace {
    fn parse(data: Arc<Vec<u8>>, index: u32) -> Result<Self, ttf_parser::FaceParsingError> {
        // SAFETY: the bytes live on the heap behind `data`, which this struct owns and never
        // mutates, so they outlive `face`.
        let bytes: &'static [u8] =
            unsafe { std::mem::transmute::<&[u8], &'static [u8]>(data.as_slice()) };
        let face = Face::parse(bytes, index)?;
        Ok(Self { face, data })
    }
}

#[derive(Clone)]
pub struct FontMetrics {
    parsed: Arc<ParsedFace>,
    face_index: u32,
    units_per_em: u16,
    space_advance: u16,
    ascender: i16,
    descender: i16,
    family: Option<String>,
}

impl std::fmt::Debug for FontMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontMetrics")
            .field("family", &self.family)
            .field("face_index", &self.face_index)
            .field("units_per_em", &self.units_per_em)
            .finish()
    }
}

impl FontMetrics {
    fn from_parsed(parsed: ParsedFace, face_index: u32) -> Self {
        let face = &parsed.face;
        let units_per_em = face.units_per_em().max(1);
        let space_advance = face
            .glyph_index(' ')
            .and_then(|id| face.glyph_hor_advance(id))
            .unwrap_or(units_per_em / 2);
        let ascender = face.ascender();
        let descender = face.descender();
        let family = extract_family_name(face);
        Self {
            parsed: Arc::new(parsed),
            face_index,
            units_per_em,
            space_advance,
            ascender,
            descender,
            family,
        }
    }

    pub fn family(&self) -> Option<&str> {
        self.family.as_deref()
    }

    pub fn data(&self) -> &[u8] {
        self.parsed.data.as_slice()
    }

    pub fn units_per_em(&self) -> u16 {
        self.units_per_em
    }

    pub fn space_advance(&self) -> u16 {
        self.space_advance
    }

    pub(crate) fn scale(&self, size: f32) -> f32 {
        size / self.units_per_em as f32
    }

    pub(crate) fn face(&self) -> &Face<'_> {
        &self.parsed.face
    }

    /// Horizontal advance of `ch` in font units. Spaces and unmapped characters take the
    /// space advance.
    pub(crate) fn advance(&self, ch: char) -> u16 {
        if ch == ' ' {
            return self.space_advance;
        }
        let face = self.face();
        face.glyph_index(ch)
            .and_then(|glyph| face.glyph_hor_advance(glyph))
            .unwrap_or(self.space_advance)
    }
}

impl TextMeasure for FontMetrics {
    fn text_width(&self, text: &str, size: f32) -> f32 {
        let units: u32 = text
            .chars()
            .filter(|ch| *ch != '\n')
            .map(|ch| self.advance(ch) as u32)
            .sum();
        units as f32 * self.scale(size)
    }

    fn ascent(&self, size: f32) -> f32 {
        self.ascender as f32 * self.scale(size)
    }

    fn descent(&self, size: f32) -> f32 {
        -(self.descender as f32) * self.scale(size)
    }
}

/// Where the overlay font may come from, tried in order.
#[derive(Debug, Clone, PartialEq)]
pub enum FontCandidate {
    Path(PathBuf),
    Family(String),
    AnySystem,
}

/// The face every region is measured and drawn with.
#[derive(Debug, Clone)]
pub struct OverlayFont {
    metrics: FontMetrics,
    embedded: bool,
}

impl OverlayFont {
    pub fn from_metrics(metrics: FontMetrics) -> Self {
        Self {
            metrics,
            embedded: false,
        }
    }

    /// The bundled DejaVu Sans face.
    pub fn embedded() -> Result<Self> {
        let metrics = load_font_metrics_from_data(Arc::new(EMBEDDED_FONT.to_vec()))
            .context("embedded font is unreadable")?;
        Ok(Self {
            metrics,
            embedded: true,
        })
    }

    pub fn metrics(&self) -> &FontMetrics {
        &self.metrics
    }

    pub fn family(&self) -> Option<&str> {
        self.metrics.family()
    }

    pub fn is_embedded(&self) -> bool {
        self.embedded
    }
}

impl TextMeasure for OverlayFont {
    fn text_width(&self, text: &str, size: f32) -> f32 {
        self.metrics.text_width(text, size)
    }

    fn ascent(&self, size: f32) -> f32 {
        self.metrics.ascent(size)
    }

    fn descent(&self, size: f32) -> f32 {
        self.metrics.descent(size)
    }
}

pub fn load_font_metrics(path: &Path) -> Result<FontMetrics> {
    let data =
        std::fs::read(path).with_context(|| format!("failed to read font: {}", path.display()))?;
    load_font_metrics_from_data(Arc::new(data))
        .map_err(|err| anyhow!("failed to parse font: {} ({})", path.display(), err))
}

/// Walks `candidates` in order and returns the first font that loads, or the embedded
/// face when none does.
pub fn resolve_overlay_font(candidates: &[FontCandidate]) -> Result<OverlayFont> {
    let mut db: Option<fontdb::Database> = None;
    for candidate in candidates {
        let resolved = match candidate {
            FontCandidate::Path(path) => load_font_metrics(path),
            FontCandidate::Family(family) => {
                let db = db.get_or_insert_with(system_font_db);
                load_font_metrics_from_family(db, family)
            }
            FontCandidate::AnySystem => {
                let db = db.get_or_insert_with(system_font_db);
                load_any_system_font(db)
            }
        };
        match resolved {
            Ok(metrics) => {
                debug!(
                    "overlay font resolved from {:?} (family={:?})",
                    candidate,
                    metrics.family()
                );
                return Ok(OverlayFont::from_metrics(metrics));
            }
            Err(err) => debug!("overlay font candidate {:?} skipped: {}", candidate, err),
        }
    }
    warn!(
        "no configured overlay font found; using embedded {}",
        EMBEDDED_FAMILY
    );
    OverlayFont::embedded()
}

/// System fonts plus the embedded face, with the generic sans-serif family pointed at an
/// installed Latin face.
pub(crate) fn system_font_db() -> fontdb::Database {
    let mut db = fontdb::Database::new();
    db.load_system_fonts();
    db.load_font_data(EMBEDDED_FONT.to_vec());
    configure_generic_families(&mut db);
    db
}

fn configure_generic_families(db: &mut fontdb::Database) {
    let installed = SANS_SERIF_FAMILIES
        .iter()
        .copied()
        .find(|family| has_family(db, family))
        .unwrap_or(EMBEDDED_FAMILY);
    debug!("generic sans-serif resolves to {}", installed);
    db.set_sans_serif_family(installed);
}

fn has_family(db: &fontdb::Database, family: &str) -> bool {
    db.faces().any(|info| {
        info.families
            .iter()
            .any(|(name, _)| name.eq_ignore_ascii_case(family))
    })
}

/// First parseable face; font collections are scanned in order.
fn load_font_metrics_from_data(data: Arc<Vec<u8>>) -> Result<FontMetrics> {
    let count = ttf_parser::fonts_in_collection(&data).unwrap_or(1);
    (0..count)
        .find_map(|index| {
            ParsedFace::parse(Arc::clone(&data), index)
                .ok()
                .map(|parsed| FontMetrics::from_parsed(parsed, index))
        })
        .ok_or_else(|| anyhow!("failed to parse font data"))
}

fn load_face_by_id(db: &fontdb::Database, id: fontdb::ID) -> Result<FontMetrics> {
    let (data, index) = db
        .with_face_data(id, |data, index| (data.to_vec(), index))
        .ok_or_else(|| anyhow!("failed to load font data"))?;
    let parsed = ParsedFace::parse(Arc::new(data), index)
        .map_err(|err| anyhow!("invalid font face: {}", err))?;
    Ok(FontMetrics::from_parsed(parsed, index))
}

fn load_font_metrics_from_family(db: &fontdb::Database, family: &str) -> Result<FontMetrics> {
    let is_sans = family.eq_ignore_ascii_case("sans-serif");
    let families = if is_sans {
        vec![fontdb::Family::SansSerif]
    } else {
        vec![fontdb::Family::Name(family)]
    };
    let query = fontdb::Query {
        families: &families,
        ..Default::default()
    };
    let id = db
        .query(&query)
        .ok_or_else(|| anyhow!("font not found: {}", family))?;
    load_face_by_id(db, id).with_context(|| format!("font family unusable: {}", family))
}

/// Prefers an upright regular face that maps Latin letters; symbol and math faces only
/// qualify when nothing else loads.
fn load_any_system_font(db: &fontdb::Database) -> Result<FontMetrics> {
    let mut faces: Vec<&fontdb::FaceInfo> = db.faces().collect();
    faces.sort_by_key(|info| {
        (
            info.style != fontdb::Style::Normal,
            info.weight.0.abs_diff(fontdb::Weight::NORMAL.0),
        )
    });
    let mut fallback = None;
    for info in faces {
        let Ok(metrics) = load_face_by_id(db, info.id) else {
            continue;
        };
        if covers_latin(&metrics) {
            return Ok(metrics);
        }
        fallback.get_or_insert(metrics);
    }
    fallback.ok_or_else(|| anyhow!("no system fonts installed"))
}

fn covers_latin(metrics: &FontMetrics) -> bool {
    let face = metrics.face();
    ['A', 'a', 'e'].iter().all(|ch| face.glyph_index(*ch).is_some())
}

fn extract_family_name(face: &Face<'_>) -> Option<String> {
    let mut fallback = None;
    for name in face.names() {
        if name.name_id == name_id::TYPOGRAPHIC_FAMILY {
            if let Some(value) = name.to_string() {
                return Some(value);
            }
        } else if name.name_id == name_id::FAMILY && fallback.is_none() {
            fallback = name.to_string();
        }
    }
    fallback
}

/// Font-free measurer with fixed per-character widths in em: 0.25 for whitespace, 0.55 for
/// ASCII letters and digits, 0.35 for other ASCII, 1.0 for CJK and 0.9 for everything else.
/// Ascent is 0.8 em and descent 0.2 em.
#[cfg(test)]
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct EstimatedMetrics;

#[cfg(test)]
impl EstimatedMetrics {
    fn char_units(ch: char) -> f32 {
        if ch.is_whitespace() {
            0.25
        } else if ch.is_ascii_alphanumeric() {
            0.55
        } else if ch.is_ascii() {
            0.35
        } else if matches!(
            ch as u32,
            0x4E00..=0x9FFF | 0x3040..=0x30FF | 0x31F0..=0x31FF
        ) {
            1.0
        } else {
            0.9
        }
    }
}

#[cfg(test)]
impl TextMeasure for EstimatedMetrics {
    fn text_width(&self, text: &str, size: f32) -> f32 {
        text.chars()
            .filter(|ch| *ch != '\n')
            .map(Self::char_units)
            .sum::<f32>()
            * size
    }

    fn ascent(&self, size: f32) -> f32 {
        0.8 * size
    }

    fn descent(&self, size: f32) -> f32 {
        0.2 * size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimated_width_scales_linearly_with_size() {
        let font = EstimatedMetrics;
        let small = font.text_width("HELLO", 10.0);
        let large = font.text_width("HELLO", 20.0);
        assert!((small - 27.5).abs() < 1e-4);
        assert!((large - small * 2.0).abs() < 1e-4);
    }

    #[test]
    fn block_height_includes_leading_between_lines_only() {
        let font = EstimatedMetrics;
        let one = measure_block(&font, &["abc"], 10.0, 0.1);
        let three = measure_block(&font, &["abc", "a", "abcd"], 10.0, 0.1);
        assert!((one.height - 10.0).abs() < 1e-4);
        assert!((three.height - (30.0 + 2.0)).abs() < 1e-4);
        assert!((three.width - font.text_width("abcd", 10.0)).abs() < 1e-4);
    }

    #[test]
    fn multi_line_measure_splits_on_newlines() {
        let font = EstimatedMetrics;
        let metrics = font.measure("ab\nabcdef", 10.0);
        assert!((metrics.width - font.text_width("abcdef", 10.0)).abs() < 1e-4);
        assert!((metrics.height - 20.0).abs() < 1e-4);
    }

    #[test]
    fn empty_block_has_zero_extent() {
        let lines: [&str; 0] = [];
        let metrics = measure_block(&EstimatedMetrics, &lines, 12.0, 0.1);
        assert_eq!(metrics, GlyphMetrics::default());
    }

    #[test]
    fn embedded_face_reports_dejavu_metrics() {
        let font = OverlayFont::embedded().expect("embedded font");
        assert!(font.is_embedded());
        assert_eq!(font.family(), Some(EMBEDDED_FAMILY));
        let metrics = font.metrics();
        assert_eq!(metrics.units_per_em(), 2048);
        assert_eq!(metrics.space_advance(), 651);
        // hhea ascender 1901, descender -483.
        assert!((font.ascent(2048.0) - 1901.0).abs() < 1e-3);
        assert!((font.descent(2048.0) - 483.0).abs() < 1e-3);
        assert!((font.text_width("A A", 2048.0) - (1401.0 * 2.0 + 651.0)).abs() < 1e-3);
    }

    #[test]
    fn cached_face_matches_a_fresh_parse() {
        let font = OverlayFont::embedded().expect("embedded font");
        let fresh = Face::parse(EMBEDDED_FONT, 0).expect("parse");
        let text = "Wait... what?!";
        let expected: u32 = text
            .chars()
            .map(|ch| {
                if ch == ' ' {
                    651
                } else {
                    fresh
                        .glyph_index(ch)
                        .and_then(|glyph| fresh.glyph_hor_advance(glyph))
                        .unwrap_or(651) as u32
                }
            })
            .sum();
        let measured = font.text_width(text, 2048.0);
        assert!((measured - expected as f32).abs() < 1e-3);

        let clone = font.clone();
        assert!(Arc::ptr_eq(&font.metrics().parsed, &clone.metrics().parsed));
    }

    #[test]
    fn unusable_candidates_fall_back_to_embedded_face() {
        let dir = tempfile::tempdir().expect("tempdir");
        let bogus = dir.path().join("missing.ttf");
        let corrupt = dir.path().join("corrupt.ttf");
        std::fs::write(&corrupt, b"not a font").expect("write corrupt font");
        let font = resolve_overlay_font(&[
            FontCandidate::Path(bogus),
            FontCandidate::Path(corrupt),
        ])
        .expect("font");
        assert!(font.is_embedded());
        assert_eq!(font.family(), Some(EMBEDDED_FAMILY));
    }

    #[test]
    fn font_file_candidate_is_loaded_from_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("overlay.ttf");
        std::fs::write(&path, EMBEDDED_FONT).expect("write font");
        let font = resolve_overlay_font(&[FontCandidate::Path(path)]).expect("font");
        assert!(!font.is_embedded());
        assert_eq!(font.family(), Some(EMBEDDED_FAMILY));
    }

    #[test]
    fn generic_sans_serif_uses_embedded_face_without_installed_fonts() {
        let mut db = fontdb::Database::new();
        db.load_font_data(EMBEDDED_FONT.to_vec());
        configure_generic_families(&mut db);
        let metrics = load_font_metrics_from_family(&db, "sans-serif").expect("sans-serif");
        assert_eq!(metrics.family(), Some(EMBEDDED_FAMILY));
    }

    #[test]
    fn system_fallbacks_resolve_to_latin_faces() {
        let db = system_font_db();
        let sans = load_font_metrics_from_family(&db, "sans-serif").expect("sans-serif");
        assert!(covers_latin(&sans));
        let any = load_any_system_font(&db).expect("any system font");
        assert!(covers_latin(&any));
    }
}

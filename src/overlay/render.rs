use anyhow::{Context, Result, anyhow};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use image::RgbImage;
use std::io::Cursor;
use std::sync::Arc;
use tiny_skia::{FillRule, Paint, PathBuilder, Pixmap, Transform};
use tracing::warn;
use usvg::{Options, Tree};

use super::engine::DrawCommand;
use super::font::{FontMetrics, OverlayFont, system_font_db};
use super::RegionGroup;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb(pub [u8; 3]);

/// Accepts `#rgb`, `#rrggbb`, `white` and `black`.
pub fn parse_hex_color(value: &str) -> Result<Rgb> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("white") {
        return Ok(Rgb([255, 255, 255]));
    }
    if value.eq_ignore_ascii_case("black") {
        return Ok(Rgb([0, 0, 0]));
    }
    let hex = value
        .strip_prefix('#')
        .ok_or_else(|| anyhow!("colour must start with '#': {}", value))?;
    let expanded: String = match hex.len() {
        3 => hex.chars().flat_map(|ch| [ch, ch]).collect(),
        6 => hex.to_string(),
        _ => return Err(anyhow!("colour must have 3 or 6 hex digits: {}", value)),
    };
    let channel = |idx: usize| {
        u8::from_str_radix(&expanded[idx..idx + 2], 16)
            .with_context(|| format!("invalid hex colour: {}", value))
    };
    Ok(Rgb([channel(0)?, channel(2)?, channel(4)?]))
}

/// Rasterizes `commands` in order onto `image` from the font's glyph outlines, advancing
/// with the same widths used for measuring.
pub fn render_commands(image: &mut RgbImage, commands: &[DrawCommand], font: &OverlayFont) {
    if commands.is_empty() {
        return;
    }
    let (width, height) = image.dimensions();
    match rasterize_glyphs(width, height, commands, font.metrics()) {
        Some(pixmap) => composite_pixmap(image, &pixmap),
        None => warn!("cannot allocate a {}x{} text layer", width, height),
    }
}

fn rasterize_glyphs(
    width: u32,
    height: u32,
    commands: &[DrawCommand],
    metrics: &FontMetrics,
) -> Option<Pixmap> {
    let mut pixmap = Pixmap::new(width, height)?;
    let face = metrics.face();
    for command in commands {
        let scale = metrics.scale(command.size);
        let mut sink = PathSink {
            builder: PathBuilder::new(),
            origin_x: command.x,
            baseline: command.baseline,
            scale,
        };
        for ch in command.text.chars() {
            if ch != ' ' {
                if let Some(glyph) = face.glyph_index(ch) {
                    let _ = face.outline_glyph(glyph, &mut sink);
                }
            }
            sink.origin_x += metrics.advance(ch) as f32 * scale;
        }
        let Some(path) = sink.builder.finish() else {
            continue;
        };
        let mut paint = Paint::default();
        let [r, g, b] = command.color.0;
        paint.set_color_rgba8(r, g, b, 255);
        paint.anti_alias = true;
        pixmap.fill_path(&path, &paint, FillRule::Winding, Transform::identity(), None);
    }
    Some(pixmap)
}

/// Feeds glyph outlines (font units, y up) into a pixel-space path (y down).
struct PathSink {
    builder: PathBuilder,
    origin_x: f32,
    baseline: f32,
    scale: f32,
}

impl PathSink {
    fn map(&self, x: f32, y: f32) -> (f32, f32) {
        (self.origin_x + x * self.scale, self.baseline - y * self.scale)
    }
}

impl ttf_parser::OutlineBuilder for PathSink {
    fn move_to(&mut self, x: f32, y: f32) {
        let (x, y) = self.map(x, y);
        self.builder.move_to(x, y);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        let (x, y) = self.map(x, y);
        self.builder.line_to(x, y);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        let (x1, y1) = self.map(x1, y1);
        let (x, y) = self.map(x, y);
        self.builder.quad_to(x1, y1, x, y);
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        let (x1, y1) = self.map(x1, y1);
        let (x2, y2) = self.map(x2, y2);
        let (x, y) = self.map(x, y);
        self.builder.cubic_to(x1, y1, x2, y2, x, y);
    }

    fn close(&mut self) {
        self.builder.close();
    }
}

/// Source-over blend of a premultiplied RGBA pixmap onto an opaque RGB image of the
/// same size.
pub fn composite_pixmap(image: &mut RgbImage, pixmap: &Pixmap) {
    let width = image.width().min(pixmap.width());
    let height = image.height().min(pixmap.height());
    let data = pixmap.data();
    let stride = pixmap.width() as usize * 4;
    for y in 0..height {
        for x in 0..width {
            let offset = y as usize * stride + x as usize * 4;
            let alpha = data[offset + 3] as u32;
            if alpha == 0 {
                continue;
            }
            let pixel = image.get_pixel_mut(x, y);
            for channel in 0..3 {
                let src = data[offset + channel] as u32;
                let dst = pixel.0[channel] as u32;
                pixel.0[channel] = (src + (dst * (255 - alpha) + 127) / 255).min(255) as u8;
            }
        }
    }
}

/// Debug overlay: the page with every detection box in green and every group box in
/// red, labelled with its reading-order index.
pub fn render_groups_svg(
    image_bytes: &[u8],
    width: u32,
    height: u32,
    groups: &[RegionGroup],
) -> Result<String> {
    let mime = infer::get(image_bytes)
        .map(|kind| kind.mime_type())
        .filter(|mime| mime.starts_with("image/"))
        .ok_or_else(|| anyhow!("debug overlay needs an encoded image"))?;
    let encoded = BASE64.encode(image_bytes);
    let data_uri = format!("data:{};base64,{}", mime, encoded);

    let mut svg = String::new();
    svg.push_str(&format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
        w = width,
        h = height
    ));
    svg.push_str(&format!(
        r#"<image href="{uri}" xlink:href="{uri}" x="0" y="0" width="{w}" height="{h}" preserveAspectRatio="none"/>"#,
        uri = data_uri,
        w = width,
        h = height
    ));

    for (idx, group) in groups.iter().enumerate() {
        for member in group.boxes() {
            let bbox = member.bbox;
            svg.push_str(&format!(
                r##"<rect x="{x}" y="{y}" width="{w}" height="{h}" fill="none" stroke="#00c853" stroke-width="2"/>"##,
                x = bbox.x_min(),
                y = bbox.y_min(),
                w = bbox.width(),
                h = bbox.height()
            ));
        }
        let outer = group.group_box();
        svg.push_str(&format!(
            r##"<rect x="{x}" y="{y}" width="{w}" height="{h}" fill="none" stroke="#d50000" stroke-width="2" stroke-dasharray="6 3"/>"##,
            x = outer.x_min(),
            y = outer.y_min(),
            w = outer.width(),
            h = outer.height()
        ));
        svg.push_str(&format!(
            r##"<text x="{x}" y="{y}" font-size="14" fill="#d50000">{label}</text>"##,
            x = outer.x_min(),
            y = (outer.y_min() - 4).max(14),
            label = idx + 1
        ));
    }

    svg.push_str("</svg>");
    Ok(svg)
}

pub fn render_svg_bytes(svg: &str, output_mime: &str, font_data: Option<&[u8]>) -> Result<Vec<u8>> {
    let pixmap = rasterize_svg(svg, font_data)?;
    let image = image::RgbaImage::from_raw(pixmap.width(), pixmap.height(), pixmap.data().to_vec())
        .ok_or_else(|| anyhow!("failed to build image buffer from SVG"))?;
    let format = image_format_from_mime(output_mime)
        .ok_or_else(|| anyhow!("unsupported output image mime '{}'", output_mime))?;
    let mut bytes = Vec::new();
    let mut cursor = Cursor::new(&mut bytes);
    image::DynamicImage::ImageRgba8(image)
        .write_to(&mut cursor, format)
        .with_context(|| "failed to encode image from SVG")?;
    Ok(bytes)
}

fn rasterize_svg(svg: &str, font_data: Option<&[u8]>) -> Result<Pixmap> {
    let mut db = system_font_db();
    if let Some(data) = font_data {
        db.load_font_data(data.to_vec());
    }
    let options = Options {
        fontdb: Arc::new(db),
        ..Options::default()
    };
    let tree = Tree::from_str(svg, &options).with_context(|| "failed to parse SVG")?;
    let size = tree.size().to_int_size();
    let mut pixmap =
        Pixmap::new(size.width(), size.height()).ok_or_else(|| anyhow!("empty SVG size"))?;
    resvg::render(&tree, Transform::identity(), &mut pixmap.as_mut());
    Ok(pixmap)
}

pub(crate) fn image_format_from_mime(mime: &str) -> Option<image::ImageFormat> {
    match mime {
        "image/png" => Some(image::ImageFormat::Png),
        "image/jpeg" | "image/jpg" => Some(image::ImageFormat::Jpeg),
        "image/gif" => Some(image::ImageFormat::Gif),
        "image/webp" => Some(image::ImageFormat::WebP),
        "image/bmp" => Some(image::ImageFormat::Bmp),
        "image/tiff" => Some(image::ImageFormat::Tiff),
        _ => None,
    }
}

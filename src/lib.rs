use anyhow::{Context, Result, anyhow};
use image::RgbImage;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub mod logging;
pub mod overlay;
pub mod settings;
#[cfg(test)]
mod test_util;

pub use overlay::{
    DetectionBox, Fit, LayoutError, LayoutPlan, OverlayFont, OverlayStyle, Rect, RegionGroup,
    SizeBounds, Typesetter, group_boxes,
};

const OUTPUT_DIR: &str = "output";

#[derive(Debug, Clone)]
pub struct Config {
    pub data: Option<String>,
    pub regions: String,
    pub output: Option<String>,
    pub settings_path: Option<String>,
    pub y_threshold: Option<i32>,
    pub show_groups: bool,
    pub debug_groups: bool,
}

/// Translated text destined for one rectangle of the page.
#[derive(Debug, Clone, PartialEq)]
pub struct TranslatedRegion {
    pub rect: Rect,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RegionStatus {
    Fitted { size: u32, lines: usize },
    Degraded { size: u32, lines: usize },
    Skipped { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionOutcome {
    pub index: usize,
    pub rect: Rect,
    #[serde(flatten)]
    pub status: RegionStatus,
}

pub fn run(config: Config) -> Result<String> {
    let settings_path = config.settings_path.as_deref().map(Path::new);
    let settings = settings::load_settings(settings_path)?;
    let boxes = load_detections(Path::new(&config.regions))?;
    let threshold = config.y_threshold.unwrap_or(settings.y_threshold);
    let groups = group_boxes(&boxes, threshold);
    info!(
        "grouped {} boxes into {} regions (y_threshold={})",
        boxes.len(),
        groups.len(),
        threshold
    );
    if config.show_groups {
        return serde_json::to_string_pretty(&groups).with_context(|| "failed to format groups");
    }

    let data = config
        .data
        .ok_or_else(|| anyhow!("--data is required unless --show-groups is set"))?;
    let data_path = Path::new(&data);
    let image_bytes =
        fs::read(data_path).with_context(|| format!("failed to read image: {}", data))?;
    let mut page = image::load_from_memory(&image_bytes)
        .with_context(|| format!("failed to decode image: {}", data))?
        .to_rgb8();

    let typesetter = Typesetter::from_settings(&settings)?;
    let regions = regions_from_groups(&groups);
    let outcomes = typeset_page(&mut page, &regions, &typesetter);

    let output_path = match config.output {
        Some(path) => PathBuf::from(path),
        None => default_output_path(data_path)?,
    };
    page.save(&output_path)
        .with_context(|| format!("failed to write image: {}", output_path.display()))?;
    info!("wrote {}", output_path.display());

    if config.debug_groups {
        let svg = overlay::render_groups_svg(&image_bytes, page.width(), page.height(), &groups)?;
        let font_data = typesetter.font().metrics().data();
        let bytes = overlay::render_svg_bytes(&svg, "image/png", Some(font_data))?;
        let debug_path = sibling_path(&output_path, "groups", "png");
        fs::write(&debug_path, bytes).with_context(|| {
            format!("failed to write group debug image: {}", debug_path.display())
        })?;
        eprintln!("debug: wrote groups {}", debug_path.display());
    }

    Ok(format_outcomes(&output_path, &outcomes))
}

pub fn load_detections(path: &Path) -> Result<Vec<DetectionBox>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read regions: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("failed to parse regions: {}", path.display()))
}

/// One region per group: the group box filled with the members' combined text.
pub fn regions_from_groups(groups: &[RegionGroup]) -> Vec<TranslatedRegion> {
    groups
        .iter()
        .map(|group| TranslatedRegion {
            rect: group.group_box(),
            text: group.combined_text(),
        })
        .collect()
}

/// Typesets every region onto `image`. Regions that cannot be laid out are logged
/// and skipped; the rest of the page is still rendered.
pub fn typeset_page(
    image: &mut RgbImage,
    regions: &[TranslatedRegion],
    typesetter: &Typesetter,
) -> Vec<RegionOutcome> {
    let plans = plan_regions(regions, typesetter);
    let mut outcomes = Vec::with_capacity(regions.len());
    for (index, (region, plan)) in regions.iter().zip(plans).enumerate() {
        let status = match plan {
            None => RegionStatus::Skipped {
                reason: "empty text".to_string(),
            },
            Some(Err(err)) => {
                warn!("region {} skipped: {}", index + 1, err);
                RegionStatus::Skipped {
                    reason: err.to_string(),
                }
            }
            Some(Ok(plan)) => {
                typesetter.draw(image, &plan);
                let lines = plan.lines.len();
                if plan.degraded {
                    RegionStatus::Degraded {
                        size: plan.size,
                        lines,
                    }
                } else {
                    RegionStatus::Fitted {
                        size: plan.size,
                        lines,
                    }
                }
            }
        };
        outcomes.push(RegionOutcome {
            index,
            rect: region.rect,
            status,
        });
    }
    outcomes
}

/// Plans regions on scoped worker threads; results keep the input order.
fn plan_regions(
    regions: &[TranslatedRegion],
    typesetter: &Typesetter,
) -> Vec<Option<Result<LayoutPlan, LayoutError>>> {
    if regions.is_empty() {
        return Vec::new();
    }
    let workers = num_cpus::get().clamp(1, regions.len());
    let chunk_size = regions.len().div_ceil(workers);
    std::thread::scope(|scope| {
        let handles: Vec<_> = regions
            .chunks(chunk_size)
            .map(|chunk| {
                scope.spawn(move || {
                    chunk
                        .iter()
                        .map(|region| {
                            if region.text.trim().is_empty() {
                                None
                            } else {
                                Some(typesetter.plan(&region.text, region.rect))
                            }
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        handles
            .into_iter()
            .flat_map(|handle| {
                handle
                    .join()
                    .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
            })
            .collect()
    })
}

fn default_output_path(input: &Path) -> Result<PathBuf> {
    let dir = Path::new(OUTPUT_DIR);
    fs::create_dir_all(dir)
        .with_context(|| format!("failed to create output dir: {}", dir.display()))?;
    let stem = input
        .file_stem()
        .and_then(|value| value.to_str())
        .unwrap_or("page");
    let ext = input
        .extension()
        .and_then(|value| value.to_str())
        .unwrap_or("png");
    Ok(dir.join(format!("{}_translated.{}", stem, ext)))
}

fn sibling_path(path: &Path, suffix: &str, ext: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .and_then(|value| value.to_str())
        .unwrap_or("page");
    path.with_file_name(format!("{}_{}.{}", stem, suffix, ext))
}

fn format_outcomes(output: &Path, outcomes: &[RegionOutcome]) -> String {
    let mut lines = vec![format!("output: {}", output.display())];
    for outcome in outcomes {
        let rect = outcome.rect;
        let detail = match &outcome.status {
            RegionStatus::Fitted { size, lines } => format!("{}px, {} lines", size, lines),
            RegionStatus::Degraded { size, lines } => {
                format!("{}px, {} lines (overflow)", size, lines)
            }
            RegionStatus::Skipped { reason } => format!("skipped: {}", reason),
        };
        lines.push(format!(
            "region {} [{}, {}, {}, {}]: {}",
            outcome.index + 1,
            rect.x_min(),
            rect.y_min(),
            rect.x_max(),
            rect.y_max(),
            detail
        ));
    }
    lines.join("\n")
}

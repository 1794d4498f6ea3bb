use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_SETTINGS_TOML: &str = include_str!("../settings.toml");

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub y_threshold: i32,
    pub text_color: String,
    pub outline_color: String,
    pub outline_width: u32,
    pub padding: i32,
    pub min_font_size: u32,
    pub max_font_size: u32,
    pub line_spacing: f32,
    pub font_path: Option<String>,
    pub font_families: Vec<String>,
    pub hyphenation_language: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            y_threshold: 50,
            text_color: "#000000".to_string(),
            outline_color: "#ffffff".to_string(),
            outline_width: 2,
            padding: 5,
            min_font_size: 10,
            max_font_size: 80,
            line_spacing: 0.1,
            font_path: None,
            font_families: vec!["sans-serif".to_string()],
            hyphenation_language: "en-us".to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    grouping: Option<GroupingSettings>,
    render: Option<RenderSettings>,
    hyphenation: Option<HyphenationSettings>,
}

#[derive(Debug, Default, Deserialize)]
struct GroupingSettings {
    y_threshold: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
struct RenderSettings {
    text_color: Option<String>,
    outline_color: Option<String>,
    outline_width: Option<u32>,
    padding: Option<i32>,
    min_font_size: Option<u32>,
    max_font_size: Option<u32>,
    line_spacing: Option<f32>,
    font_path: Option<String>,
    font_families: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct HyphenationSettings {
    language: Option<String>,
}

/// Layers the bundled defaults, `./settings.toml`, `./settings.local.toml`, the
/// per-user files under `~/.manga-typeset/` and finally `extra_path`.
pub fn load_settings(extra_path: Option<&Path>) -> Result<Settings> {
    let mut settings = Settings::default();
    let defaults: SettingsFile =
        toml::from_str(DEFAULT_SETTINGS_TOML).with_context(|| "failed to parse bundled settings")?;
    settings.merge(defaults);
    ensure_home_settings_file()?;

    let mut ordered_paths = Vec::new();
    ordered_paths.push(PathBuf::from("settings.toml"));
    ordered_paths.push(PathBuf::from("settings.local.toml"));

    if let Some(home) = home_dir() {
        ordered_paths.push(home.join("settings.toml"));
        ordered_paths.push(home.join("settings.local.toml"));
    }

    if let Some(extra) = extra_path {
        if !extra.exists() {
            return Err(anyhow!("settings file not found: {}", extra.display()));
        }
        ordered_paths.push(extra.to_path_buf());
    }

    for path in ordered_paths {
        if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read settings: {}", path.display()))?;
            let parsed: SettingsFile = toml::from_str(&content)
                .with_context(|| format!("failed to parse settings: {}", path.display()))?;
            settings.merge(parsed);
        }
    }

    Ok(settings)
}

impl Settings {
    fn merge(&mut self, incoming: SettingsFile) {
        if let Some(grouping) = incoming.grouping {
            if let Some(threshold) = grouping.y_threshold {
                if threshold >= 0 {
                    self.y_threshold = threshold;
                }
            }
        }
        if let Some(render) = incoming.render {
            if let Some(color) = render.text_color {
                if !color.trim().is_empty() {
                    self.text_color = color;
                }
            }
            if let Some(color) = render.outline_color {
                if !color.trim().is_empty() {
                    self.outline_color = color;
                }
            }
            if let Some(width) = render.outline_width {
                self.outline_width = width;
            }
            if let Some(padding) = render.padding {
                if padding >= 0 {
                    self.padding = padding;
                }
            }
            if let Some(size) = render.min_font_size {
                if size > 0 {
                    self.min_font_size = size;
                }
            }
            if let Some(size) = render.max_font_size {
                if size > 0 {
                    self.max_font_size = size;
                }
            }
            if let Some(spacing) = render.line_spacing {
                if spacing >= 0.0 {
                    self.line_spacing = spacing;
                }
            }
            if let Some(path) = render.font_path {
                if !path.trim().is_empty() {
                    self.font_path = Some(path);
                }
            }
            if let Some(families) = render.font_families {
                let families: Vec<String> = families
                    .into_iter()
                    .filter(|family| !family.trim().is_empty())
                    .collect();
                if !families.is_empty() {
                    self.font_families = families;
                }
            }
        }
        if let Some(hyphenation) = incoming.hyphenation {
            if let Some(language) = hyphenation.language {
                if !language.trim().is_empty() {
                    self.hyphenation_language = language;
                }
            }
        }
    }
}

fn ensure_home_settings_file() -> Result<()> {
    let Some(home) = home_dir() else {
        return Ok(());
    };
    fs::create_dir_all(&home)
        .with_context(|| format!("failed to create settings directory: {}", home.display()))?;
    let path = home.join("settings.toml");
    if !path.exists() {
        fs::write(&path, DEFAULT_SETTINGS_TOML)
            .with_context(|| format!("failed to write settings: {}", path.display()))?;
    }
    Ok(())
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().and_then(|home| {
        let home = home.trim();
        if home.is_empty() {
            None
        } else {
            Some(Path::new(home).join(".manga-typeset"))
        }
    })
}

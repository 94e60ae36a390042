//! Poster configuration module.
//!
//! Handles loading, validating, and merging `config.toml`. Stock defaults
//! reproduce the classic poster layout; a `config.toml` in the project
//! directory overrides any subset of them.
//!
//! ## Config File Location
//!
//! ```text
//! project/
//! ├── config.toml        # Optional, overrides stock defaults
//! └── background.png     # Poster background template
//! ```
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [canvas]
//! width = 750
//! height = 1334
//!
//! [text]
//! font_family = ["Microsoft YaHei", "sans-serif"]
//! font_size = 40            # Pixels
//! font_weight = "bold"
//! color = "#FFFFFF"
//! # font_file = "fonts/NotoSansSC-Bold.otf"
//!
//! [school]
//! x = 85                    # Left edge of the text
//! y = 550                   # Text baseline
//!
//! [major]
//! x = 85
//! y = 670
//!
//! [photo]
//! x = 85
//! y = 800
//! width = 580               # Photo is stretched to exactly this box
//! height = 400
//!
//! [processing]
//! # max_processes = 4       # Parallel render workers (omit for auto = CPU cores)
//! on_render_error = "abort" # "abort" or "skip"
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Poster configuration loaded from `config.toml`.
///
/// All fields have defaults matching the stock poster template. User config
/// files need only specify the values they want to override.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PosterConfig {
    /// Output canvas size in pixels.
    pub canvas: CanvasConfig,
    /// Caption font and colour, shared by both text lines.
    pub text: TextConfig,
    /// Anchor of the school caption.
    pub school: TextSlot,
    /// Anchor of the major caption.
    pub major: TextSlot,
    /// Box the user photo is stretched into.
    pub photo: PhotoSlot,
    /// Parallelism and failure policy.
    pub processing: ProcessingConfig,
}

impl Default for PosterConfig {
    fn default() -> Self {
        Self {
            canvas: CanvasConfig::default(),
            text: TextConfig::default(),
            school: TextSlot { x: 85, y: 550 },
            major: TextSlot { x: 85, y: 670 },
            photo: PhotoSlot::default(),
            processing: ProcessingConfig::default(),
        }
    }
}

impl PosterConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.canvas.width == 0 || self.canvas.height == 0 {
            return Err(ConfigError::Validation(
                "canvas.width and canvas.height must be non-zero".into(),
            ));
        }
        if self.photo.width == 0 || self.photo.height == 0 {
            return Err(ConfigError::Validation(
                "photo.width and photo.height must be non-zero".into(),
            ));
        }
        if self.text.font_size == 0 {
            return Err(ConfigError::Validation(
                "text.font_size must be non-zero".into(),
            ));
        }
        if self.text.font_family.is_empty() {
            return Err(ConfigError::Validation(
                "text.font_family must not be empty".into(),
            ));
        }
        if !is_hex_color(&self.text.color) {
            return Err(ConfigError::Validation(format!(
                "text.color must be #RGB or #RRGGBB, got {:?}",
                self.text.color
            )));
        }
        if self.processing.max_processes == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_processes must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

fn is_hex_color(value: &str) -> bool {
    value.strip_prefix('#').is_some_and(|hex| {
        matches!(hex.len(), 3 | 6) && hex.chars().all(|c| c.is_ascii_hexdigit())
    })
}

/// Canvas dimensions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CanvasConfig {
    pub width: u32,
    pub height: u32,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            width: 750,
            height: 1334,
        }
    }
}

/// Caption styling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TextConfig {
    /// Font family stack, first match wins. Generic names (`sans-serif`) are allowed.
    pub font_family: Vec<String>,
    /// Font size in pixels.
    pub font_size: u32,
    /// CSS font weight: `normal`, `bold`, or a number such as `600`.
    pub font_weight: String,
    /// Fill colour as `#RRGGBB`.
    pub color: String,
    /// Extra font file loaded on top of the system fonts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_file: Option<PathBuf>,
}

impl Default for TextConfig {
    fn default() -> Self {
        Self {
            font_family: vec!["Microsoft YaHei".to_string(), "sans-serif".to_string()],
            font_size: 40,
            font_weight: "bold".to_string(),
            color: "#FFFFFF".to_string(),
            font_file: None,
        }
    }
}

/// Left-aligned text anchor. `y` is the alphabetic baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TextSlot {
    pub x: i32,
    pub y: i32,
}

/// Destination rectangle for the user photo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PhotoSlot {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Default for PhotoSlot {
    fn default() -> Self {
        Self {
            x: 85,
            y: 800,
            width: 580,
            height: 400,
        }
    }
}

/// What to do when a single poster fails to render.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderErrorPolicy {
    /// Abort the whole run; no archive is written.
    #[default]
    Abort,
    /// Record the failure in the manifest and keep going.
    Skip,
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel render workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_processes: Option<usize>,
    pub on_render_error: RenderErrorPolicy,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_processes.map(|n| n.min(cores)).unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// Base layer for merging user overrides on top.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    toml::Value::try_from(PosterConfig::default())
        .map_err(|e| ConfigError::Validation(format!("stock defaults do not serialize: {e}")))
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load `config.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if no `config.toml` exists in the directory.
pub fn load_raw_config(dir: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = dir.join("config.toml");
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<PosterConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: PosterConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `config.toml` in the given directory.
///
/// Relative `text.font_file` paths are resolved against `dir`.
pub fn load_config(dir: &Path) -> Result<PosterConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let overlay = load_raw_config(dir)?;
    let mut config = resolve_config(base, overlay)?;
    if let Some(font_file) = config.text.font_file.take() {
        config.text.font_file = Some(if font_file.is_relative() {
            dir.join(font_file)
        } else {
            font_file
        });
    }
    Ok(config)
}

/// Returns a fully-commented stock `config.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Poster Batch Configuration
# ==========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Canvas
# ---------------------------------------------------------------------------
[canvas]
# Output poster size in pixels. The background template is stretched to fit.
width = 750
height = 1334

# ---------------------------------------------------------------------------
# Captions
# ---------------------------------------------------------------------------
[text]
# Font family stack; the first installed family wins.
font_family = ["Microsoft YaHei", "sans-serif"]

# Font size in pixels.
font_size = 40

# normal, bold, or a numeric weight such as 600.
font_weight = "bold"

# Fill colour.
color = "#FFFFFF"

# Extra font file to load, relative to this config file.
# Useful on machines without a CJK system font.
# font_file = "fonts/NotoSansSC-Bold.otf"

# Left edge and baseline of the school caption.
[school]
x = 85
y = 550

# Left edge and baseline of the major caption.
[major]
x = 85
y = 670

# ---------------------------------------------------------------------------
# Photo
# ---------------------------------------------------------------------------
[photo]
# The photo is stretched to exactly width x height; aspect ratio is not kept.
x = 85
y = 800
width = 580
height = 400

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel render workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4

# What to do when one poster fails to render (unreadable photo, ...):
#   "abort" - stop the run, write no archive
#   "skip"  - leave that row out and list it in manifest.json
on_render_error = "abort"
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_matches_stock_layout() {
        let config = PosterConfig::default();
        assert_eq!(config.canvas.width, 750);
        assert_eq!(config.canvas.height, 1334);
        assert_eq!(config.school, TextSlot { x: 85, y: 550 });
        assert_eq!(config.major, TextSlot { x: 85, y: 670 });
        assert_eq!(
            config.photo,
            PhotoSlot {
                x: 85,
                y: 800,
                width: 580,
                height: 400
            }
        );
        assert_eq!(config.text.font_size, 40);
        assert_eq!(config.text.font_weight, "bold");
        assert_eq!(config.text.color, "#FFFFFF");
    }

    #[test]
    fn partial_slot_keeps_stock_coordinate() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("config.toml"), "[major]\ny = 700\n").unwrap();
        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.major, TextSlot { x: 85, y: 700 });
        assert_eq!(config.school, TextSlot { x: 85, y: 550 });
    }

    #[test]
    fn parse_partial_config() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join("config.toml"),
            r##"
[text]
color = "#000000"
"##,
        )
        .unwrap();

        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.text.color, "#000000");
        assert_eq!(config.text.font_size, 40);
        assert_eq!(config.photo.width, 580);
    }

    #[test]
    fn parse_processing_config() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join("config.toml"),
            r#"
[processing]
max_processes = 2
on_render_error = "skip"
"#,
        )
        .unwrap();

        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.processing.max_processes, Some(2));
        assert_eq!(config.processing.on_render_error, RenderErrorPolicy::Skip);
    }

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.canvas, CanvasConfig::default());
        assert_eq!(config.processing.on_render_error, RenderErrorPolicy::Abort);
    }

    #[test]
    fn load_config_resolves_relative_font_file() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join("config.toml"),
            r#"
[text]
font_file = "fonts/caption.otf"
"#,
        )
        .unwrap();

        let config = load_config(tmp.path()).unwrap();
        assert_eq!(
            config.text.font_file,
            Some(tmp.path().join("fonts/caption.otf"))
        );
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("config.toml"), "[canvas\nwidth = ").unwrap();
        assert!(matches!(
            load_config(tmp.path()),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn unknown_key_rejected_via_load_config() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join("config.toml"),
            r#"
[photo]
widht = 600
"#,
        )
        .unwrap();

        let err = load_config(tmp.path()).unwrap_err().to_string();
        assert!(err.contains("unknown field"), "{err}");
    }

    #[test]
    fn unknown_section_rejected() {
        let result: Result<PosterConfig, _> = toml::from_str("[canvass]\nwidth = 1\n");
        assert!(result.is_err());
    }

    #[test]
    fn unknown_policy_rejected() {
        let result: Result<PosterConfig, _> =
            toml::from_str("[processing]\non_render_error = \"retry\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn validate_default_config_passes() {
        assert!(PosterConfig::default().validate().is_ok());
    }

    #[test]
    fn validate_zero_canvas() {
        let mut config = PosterConfig::default();
        config.canvas.width = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn validate_zero_photo_box() {
        let mut config = PosterConfig::default();
        config.photo.height = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_bad_color() {
        let mut config = PosterConfig::default();
        config.text.color = "white".to_string();
        assert!(config.validate().is_err());
        config.text.color = "#fff".to_string();
        assert!(config.validate().is_ok());
        config.text.color = "#12345g".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_zero_workers() {
        let mut config = PosterConfig::default();
        config.processing.max_processes = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_config_validates_values() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("config.toml"), "[text]\nfont_size = 0\n").unwrap();
        assert!(matches!(
            load_config(tmp.path()),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn stock_config_toml_parses_to_defaults() {
        let parsed: PosterConfig = toml::from_str(stock_config_toml()).unwrap();
        assert_eq!(parsed, PosterConfig::default());
    }

    #[test]
    fn effective_threads_user_constrains_down() {
        let config = ProcessingConfig {
            max_processes: Some(1),
            ..Default::default()
        };
        assert_eq!(effective_threads(&config), 1);
    }

    #[test]
    fn effective_threads_clamped_to_cores() {
        let config = ProcessingConfig {
            max_processes: Some(99999),
            ..Default::default()
        };
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        assert_eq!(effective_threads(&config), cores);
    }

    #[test]
    fn merge_toml_table_merge() {
        let base: toml::Value = toml::from_str(
            r#"
[photo]
width = 580
height = 400
"#,
        )
        .unwrap();
        let overlay: toml::Value = toml::from_str("[photo]\nwidth = 600\n").unwrap();
        let merged = merge_toml(base, overlay);
        let photo = merged.get("photo").unwrap();
        assert_eq!(photo.get("width").unwrap().as_integer(), Some(600));
        assert_eq!(photo.get("height").unwrap().as_integer(), Some(400));
    }

    #[test]
    fn merge_toml_scalar_replaces_array() {
        let base: toml::Value = toml::from_str(r#"families = ["a", "b"]"#).unwrap();
        let overlay: toml::Value = toml::from_str(r#"families = ["c"]"#).unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged.get("families").unwrap().as_array().unwrap().len(), 1);
    }
}

//! Application Configuration
//!
//! Recognition settings stored in TOML format. Every heuristic constant used by
//! the pipeline lives here so it can be tuned without touching code.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::catalog::ImageSize;

/// Canonical card aspect ratio (63mm x 88mm)
pub const CARD_ASPECT_RATIO: f32 = 63.0 / 88.0;

/// Application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Card detection and rectification
    pub geometry: GeometryConfig,
    /// Text recognition settings
    pub ocr: OcrConfig,
    /// Printing similarity weights and heuristics
    pub scoring: ScoringConfig,
    /// Confidence composition for the final result
    pub confidence: ConfidenceConfig,
    /// Card catalog client settings
    pub catalog: CatalogConfig,
}

/// Card detection and rectification settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeometryConfig {
    /// Width of the rectified card in pixels (height follows from 63:88)
    pub target_width: u32,
    /// Allowed deviation of a candidate quadrilateral's bounding-box aspect ratio
    pub aspect_tolerance: f32,
    /// Allowed deviation of the rectified card's aspect ratio from 63:88
    pub normalized_aspect_tolerance: f32,
    /// Minimum fraction of the frame a card may cover
    pub min_area_ratio: f32,
    /// Maximum fraction of the frame a card may cover
    pub max_area_ratio: f32,
    /// Confidence reported when the whole photo is used as the card
    pub fallback_confidence: f32,
    /// Canny hysteresis low threshold
    pub canny_low: f32,
    /// Canny hysteresis high threshold
    pub canny_high: f32,
    /// Polygon approximation tolerance as a fraction of the contour perimeter
    pub polygon_epsilon_ratio: f64,
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            target_width: 480,
            aspect_tolerance: 0.15,
            normalized_aspect_tolerance: 0.01,
            min_area_ratio: 0.10,
            max_area_ratio: 0.95,
            fallback_confidence: 0.5,
            canny_low: 50.0,
            canny_high: 150.0,
            polygon_epsilon_ratio: 0.02,
        }
    }
}

impl GeometryConfig {
    /// Height of the rectified card for the configured width
    pub fn target_height(&self) -> u32 {
        (self.target_width as f32 / CARD_ASPECT_RATIO).round() as u32
    }
}

/// Text recognition settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Use text recognition at all
    pub enabled: bool,
    /// Tesseract language code
    pub language: String,
    /// Fixed upscale factor applied to text regions before reading
    pub region_scale: u32,
    /// Regions still shorter than this after scaling are upscaled further
    pub min_region_height: u32,
    /// White margin added around the binarized region
    pub border_margin: u32,
    /// Block radius for adaptive thresholding
    pub adaptive_block_radius: u32,
    /// Offset subtracted from the local mean in adaptive thresholding
    pub adaptive_offset: i16,
    /// Median filter radius used for denoising
    pub denoise_radius: u32,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            language: "eng".to_string(),
            region_scale: 3,
            min_region_height: 50,
            border_margin: 10,
            adaptive_block_radius: 7,
            adaptive_offset: 5,
            denoise_radius: 1,
        }
    }
}

/// Printing similarity settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Weight of the artwork perceptual-hash component
    pub artwork_weight: f32,
    /// Weight of the border color component
    pub color_weight: f32,
    /// Weight of the frame/border style component
    pub frame_weight: f32,
    /// RGB distance at which the color score reaches zero
    pub color_distance_scale: f32,
    /// Top-edge luminance below which a border counts as dark
    pub dark_border_luminance: f32,
    /// Top-edge luminance above which a border counts as light
    pub light_border_luminance: f32,
    /// Frame styles treated as standard
    pub standard_frames: Vec<String>,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            artwork_weight: 0.6,
            color_weight: 0.2,
            frame_weight: 0.2,
            color_distance_scale: 200.0,
            dark_border_luminance: 50.0,
            light_border_luminance: 200.0,
            standard_frames: vec!["2015".to_string(), "2003".to_string()],
        }
    }
}

/// Confidence composition settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceConfig {
    /// Weight of the geometry extraction confidence
    pub extraction_weight: f32,
    /// Weight of the name recognition confidence
    pub name_weight: f32,
    /// Weight of the printing match confidence
    pub match_weight: f32,
    /// Confidence reported for a collector-number hit
    pub collector_number_confidence: f32,
    /// Confidence reported when only the name is known
    pub name_only_confidence: f32,
    /// Lower bound of the high confidence band
    pub high_band: f32,
    /// Lower bound of the medium confidence band
    pub medium_band: f32,
    /// Number of ranked candidates kept in a result
    pub max_candidates: usize,
    /// Minimum similarity for accepting an autocomplete suggestion
    pub name_similarity_threshold: f64,
}

impl Default for ConfidenceConfig {
    fn default() -> Self {
        Self {
            extraction_weight: 0.3,
            name_weight: 0.3,
            match_weight: 0.4,
            collector_number_confidence: 0.95,
            name_only_confidence: 0.5,
            high_band: 0.8,
            medium_band: 0.5,
            max_candidates: 10,
            name_similarity_threshold: 0.7,
        }
    }
}

/// Card catalog client settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Catalog API root
    pub base_url: String,
    /// User agent sent with every request
    pub user_agent: String,
    /// Minimum spacing between consecutive requests
    pub min_request_interval_ms: u64,
    /// Per-request timeout
    pub timeout_secs: u64,
    /// Image size used for reference artwork
    pub image_size: ImageSize,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.scryfall.com".to_string(),
            user_agent: concat!("card-scanner/", env!("CARGO_PKG_VERSION")).to_string(),
            min_request_interval_ms: 100,
            timeout_secs: 10,
            image_size: ImageSize::Normal,
        }
    }
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {:?}", path))?;
    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file {:?}", path))?;
    Ok(config)
}

/// Save configuration to file
pub fn save_config(config: &AppConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}

/// Get the configuration directory
pub fn config_dir() -> Result<PathBuf> {
    let proj_dirs = directories::ProjectDirs::from("org", "cardscanner", "card-scanner")
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

    Ok(proj_dirs.config_dir().to_path_buf())
}

/// Default location of the config file
pub fn default_config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

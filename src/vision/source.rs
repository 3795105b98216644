//! Source photo data structures

use anyhow::{Context, Result};
use image::RgbImage;
use std::path::Path;

/// A captured photo of a card
#[derive(Debug, Clone)]
pub struct SourceImage {
    /// Raw RGB pixel data
    pixels: RgbImage,
}

impl SourceImage {
    /// Wrap an already decoded image
    pub fn new(pixels: RgbImage) -> Self {
        Self { pixels }
    }

    /// Decode a photo from an image file
    pub fn from_path(path: &Path) -> Result<Self> {
        let img = image::open(path)
            .with_context(|| format!("Failed to load image: {:?}", path))?;
        Ok(Self::new(img.to_rgb8()))
    }

    /// Decode a photo from encoded bytes (PNG, JPEG, ...)
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let img = image::load_from_memory(data).context("Failed to decode image bytes")?;
        Ok(Self::new(img.to_rgb8()))
    }

    /// Get image dimensions as (width, height)
    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    /// Borrow the pixel grid
    pub fn pixels(&self) -> &RgbImage {
        &self.pixels
    }
}

impl From<RgbImage> for SourceImage {
    fn from(pixels: RgbImage) -> Self {
        Self::new(pixels)
    }
}

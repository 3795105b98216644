//! Card detection and rectification
//!
//! Locates the card quadrilateral in a photo, warps it to a fixed 63:88
//! resolution and exposes the fixed sub-regions of the rectified card.

use image::{imageops, DynamicImage, Rgb, RgbImage};
use imageproc::contours::{find_contours, BorderType};
use imageproc::geometric_transformations::{warp_into, Interpolation, Projection};
use imageproc::geometry::{approximate_polygon_dp, arc_length};
use imageproc::point::Point;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info};

use super::regions::{mean_color, Region, RegionKind};
use super::source::SourceImage;
use crate::config::{GeometryConfig, CARD_ASPECT_RATIO};

/// Geometry stage failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeometryError {
    /// The photo contains no contours at all
    #[error("no card detected in image")]
    NoCardDetected,
}

/// Rectified card image with a fixed aspect ratio
#[derive(Debug, Clone)]
pub struct NormalizedCard {
    /// Rectified pixels
    image: RgbImage,
    /// How confident the extractor is that this is the card (0.0 - 1.0)
    pub confidence: f32,
}

impl NormalizedCard {
    /// Wrap an already rectified card image
    pub fn new(image: RgbImage, confidence: f32) -> Self {
        Self {
            image,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    /// Resize an arbitrary image (e.g. a catalog scan) to the card resolution
    pub fn from_scan(image: &RgbImage, config: &GeometryConfig) -> Self {
        let resized = imageops::resize(
            image,
            config.target_width,
            config.target_height(),
            imageops::FilterType::Triangle,
        );
        Self::new(resized, 1.0)
    }

    /// Borrow the rectified pixels
    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    /// Get card dimensions as (width, height)
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Width over height
    pub fn aspect_ratio(&self) -> f32 {
        let (w, h) = self.dimensions();
        w as f32 / h.max(1) as f32
    }

    /// View of one named region
    pub fn region(&self, kind: RegionKind) -> Region<'_> {
        Region::slice(&self.image, kind)
    }

    /// Mean color of both side borders
    pub fn border_color(&self) -> [f32; 3] {
        let left = self.region(RegionKind::Border);
        let right_rect = left.rect.mirrored(self.image.width());
        let right = Region::from_rect(&self.image, RegionKind::Border, right_rect);

        let l = left.mean_color();
        let r = right.mean_color();
        [(l[0] + r[0]) / 2.0, (l[1] + r[1]) / 2.0, (l[2] + r[2]) / 2.0]
    }

    /// Mean luminance of the top 2% of the card
    pub fn top_edge_luminance(&self) -> f32 {
        let (width, height) = self.dimensions();
        let strip_height = ((height as f32 * 0.02) as u32).max(1);
        let strip = imageops::crop_imm(&self.image, 0, 0, width, strip_height).to_image();
        let [r, g, b] = mean_color(&strip);
        0.299 * r + 0.587 * g + 0.114 * b
    }
}

/// A card-shaped quadrilateral found in the photo
#[derive(Debug, Clone)]
struct CardQuad {
    /// Corners ordered top-left, top-right, bottom-right, bottom-left
    corners: [(f32, f32); 4],
    confidence: f32,
}

/// Locates and rectifies the card in a photo
pub struct GeometryExtractor {
    config: GeometryConfig,
}

impl GeometryExtractor {
    /// Create an extractor with default settings
    pub fn new() -> Self {
        Self::with_config(GeometryConfig::default())
    }

    /// Create an extractor with custom settings
    pub fn with_config(config: GeometryConfig) -> Self {
        Self { config }
    }

    /// Target (width, height) of rectified cards
    pub fn target_size(&self) -> (u32, u32) {
        (self.config.target_width, self.config.target_height())
    }

    /// Find the card in `source` and rectify it
    ///
    /// When contours exist but none of them is a card-shaped quadrilateral, the
    /// whole photo is treated as the card at the configured fallback confidence.
    pub fn extract(&self, source: &SourceImage) -> Result<NormalizedCard, GeometryError> {
        let start = Instant::now();
        let pixels = source.pixels();
        let (width, height) = pixels.dimensions();
        if width == 0 || height == 0 {
            return Err(GeometryError::NoCardDetected);
        }

        let gray = DynamicImage::ImageRgb8(pixels.clone()).to_luma8();
        let edges = imageproc::edges::canny(&gray, self.config.canny_low, self.config.canny_high);

        let outlines: Vec<Vec<Point<i32>>> = find_contours::<i32>(&edges)
            .into_iter()
            .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
            .map(|c| c.points)
            .collect();

        if outlines.is_empty() {
            debug!("No contours found in {}x{} image", width, height);
            return Err(GeometryError::NoCardDetected);
        }

        let image_area = width as f32 * height as f32;
        let best = outlines
            .iter()
            .filter_map(|outline| self.evaluate_outline(outline, image_area))
            .fold(None::<CardQuad>, |best, quad| match best {
                Some(b) if b.confidence >= quad.confidence => Some(b),
                _ => Some(quad),
            });

        let card = match best.and_then(|quad| self.rectify(pixels, &quad)) {
            Some(card) => card,
            None => {
                debug!(
                    "{} contours but no card-shaped quadrilateral, using whole image",
                    outlines.len()
                );
                let (w, h) = self.target_size();
                let resized = imageops::resize(pixels, w, h, imageops::FilterType::Triangle);
                NormalizedCard::new(resized, self.config.fallback_confidence)
            }
        };

        info!(
            "Card extracted in {:?} (confidence {:.2})",
            start.elapsed(),
            card.confidence
        );
        Ok(card)
    }

    /// Check whether a contour is a plausible card outline
    fn evaluate_outline(&self, outline: &[Point<i32>], image_area: f32) -> Option<CardQuad> {
        if outline.len() < 4 {
            return None;
        }

        let epsilon = self.config.polygon_epsilon_ratio * arc_length(outline, true);
        if epsilon <= 0.0 {
            return None;
        }

        let polygon = simplify_closed(approximate_polygon_dp(outline, epsilon, true), epsilon);
        if polygon.len() != 4 {
            return None;
        }

        let min_x = polygon.iter().map(|p| p.x).min()?;
        let max_x = polygon.iter().map(|p| p.x).max()?;
        let min_y = polygon.iter().map(|p| p.y).min()?;
        let max_y = polygon.iter().map(|p| p.y).max()?;
        let w = (max_x - min_x + 1) as f32;
        let h = (max_y - min_y + 1) as f32;

        let aspect = w / h;
        if (aspect - CARD_ASPECT_RATIO).abs() >= self.config.aspect_tolerance {
            return None;
        }

        let area_ratio = w * h / image_area;
        if area_ratio <= self.config.min_area_ratio || area_ratio >= self.config.max_area_ratio {
            return None;
        }

        let points: Vec<(f32, f32)> = polygon.iter().map(|p| (p.x as f32, p.y as f32)).collect();
        Some(CardQuad {
            corners: order_corners(&points),
            confidence: (area_ratio * 2.0).min(1.0),
        })
    }

    /// Warp the quadrilateral to the target resolution
    fn rectify(&self, pixels: &RgbImage, quad: &CardQuad) -> Option<NormalizedCard> {
        let (w, h) = self.target_size();
        let target = [
            (0.0, 0.0),
            ((w - 1) as f32, 0.0),
            ((w - 1) as f32, (h - 1) as f32),
            (0.0, (h - 1) as f32),
        ];

        let projection = Projection::from_control_points(quad.corners, target)?;
        let mut out = RgbImage::new(w, h);
        warp_into(pixels, &projection, Interpolation::Bilinear, Rgb([0, 0, 0]), &mut out);

        Some(NormalizedCard::new(out, quad.confidence))
    }
}

impl Default for GeometryExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Merge vertices closer than `min_gap`, including trailing vertices that
/// close the polygon back onto its first vertex
fn simplify_closed(polygon: Vec<Point<i32>>, min_gap: f64) -> Vec<Point<i32>> {
    let near = |a: &Point<i32>, b: &Point<i32>| {
        let dx = (a.x - b.x) as f64;
        let dy = (a.y - b.y) as f64;
        (dx * dx + dy * dy).sqrt() <= min_gap
    };

    let mut out: Vec<Point<i32>> = Vec::with_capacity(polygon.len());
    for point in polygon {
        match out.last() {
            Some(last) if near(last, &point) => {}
            _ => out.push(point),
        }
    }
    while out.len() > 1 && near(&out[0], &out[out.len() - 1]) {
        out.pop();
    }
    out
}

/// Point of `points` minimizing (or maximizing) `key`
fn extreme(points: &[(f32, f32)], key: fn(&(f32, f32)) -> f32, max: bool) -> (f32, f32) {
    let cmp = |a: &&(f32, f32), b: &&(f32, f32)| key(a).total_cmp(&key(b));
    let found = if max {
        points.iter().max_by(cmp)
    } else {
        points.iter().min_by(cmp)
    };
    found.copied().unwrap_or((0.0, 0.0))
}

/// Order four corners as top-left, top-right, bottom-right, bottom-left
fn order_corners(points: &[(f32, f32)]) -> [(f32, f32); 4] {
    let top_left = extreme(points, |p| p.0 + p.1, false);
    let bottom_right = extreme(points, |p| p.0 + p.1, true);
    let top_right = extreme(points, |p| p.1 - p.0, false);
    let bottom_left = extreme(points, |p| p.1 - p.0, true);

    [top_left, top_right, bottom_right, bottom_left]
}

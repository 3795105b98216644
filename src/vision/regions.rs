//! Fixed card sub-regions
//!
//! Regions are expressed as proportions of the rectified card so that the same
//! layout applies at any resolution.

use image::{imageops, RgbImage, SubImage};
use serde::Serialize;

/// Named sub-region of a card
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionKind {
    /// Card name line, excluding the mana cost
    Title,
    /// Bottom-left printing info line
    CollectorNumber,
    /// Expansion symbol on the type line
    SetSymbol,
    /// Illustration box
    Artwork,
    /// Left border strip
    Border,
}

impl RegionKind {
    /// All region kinds in layout order
    pub const ALL: [RegionKind; 5] = [
        RegionKind::Title,
        RegionKind::CollectorNumber,
        RegionKind::SetSymbol,
        RegionKind::Artwork,
        RegionKind::Border,
    ];

    /// Proportional bounds (left, top, right, bottom) in 0.0 - 1.0
    pub fn bounds(&self) -> (f32, f32, f32, f32) {
        match self {
            RegionKind::Title => (0.05, 0.045, 0.75, 0.095),
            RegionKind::CollectorNumber => (0.05, 0.945, 0.35, 0.985),
            RegionKind::SetSymbol => (0.85, 0.545, 0.97, 0.59),
            RegionKind::Artwork => (0.065, 0.105, 0.935, 0.535),
            RegionKind::Border => (0.0, 0.0, 0.05, 1.0),
        }
    }

    /// Pixel rectangle of this region on a card of the given size
    pub fn rect(&self, width: u32, height: u32) -> RegionRect {
        RegionRect::from_proportions(self.bounds(), width, height)
    }
}

/// Pixel rectangle, always contained in the card it was computed for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl RegionRect {
    /// Convert proportional bounds to pixels, clamped to the card and at least 1x1
    pub fn from_proportions(bounds: (f32, f32, f32, f32), width: u32, height: u32) -> Self {
        let (left, top, right, bottom) = bounds;
        let max_x = width.saturating_sub(1);
        let max_y = height.saturating_sub(1);

        let x = ((left * width as f32) as u32).min(max_x);
        let y = ((top * height as f32) as u32).min(max_y);
        let x2 = ((right * width as f32) as u32).clamp(x + 1, width.max(x + 1));
        let y2 = ((bottom * height as f32) as u32).clamp(y + 1, height.max(y + 1));

        Self {
            x,
            y,
            width: x2 - x,
            height: y2 - y,
        }
    }

    /// Horizontally mirrored rectangle (e.g. the right border from the left one)
    pub fn mirrored(&self, card_width: u32) -> Self {
        Self {
            x: card_width.saturating_sub(self.x + self.width),
            ..*self
        }
    }

    /// Check containment in a card of the given size
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.width > 0
            && self.height > 0
            && self.x + self.width <= width
            && self.y + self.height <= height
    }
}

/// Read-only view of one named region of a rectified card
pub struct Region<'a> {
    pub kind: RegionKind,
    pub rect: RegionRect,
    view: SubImage<&'a RgbImage>,
}

impl<'a> Region<'a> {
    /// Slice a region out of a rectified card image
    pub fn slice(card: &'a RgbImage, kind: RegionKind) -> Self {
        let (width, height) = card.dimensions();
        let rect = kind.rect(width, height);
        Self::from_rect(card, kind, rect)
    }

    pub(crate) fn from_rect(card: &'a RgbImage, kind: RegionKind, rect: RegionRect) -> Self {
        let view = imageops::crop_imm(card, rect.x, rect.y, rect.width, rect.height);
        Self { kind, rect, view }
    }

    /// Copy the region's pixels into an owned image
    pub fn to_image(&self) -> RgbImage {
        self.view.to_image()
    }

    /// Mean RGB value over the region
    pub fn mean_color(&self) -> [f32; 3] {
        let img = self.to_image();
        mean_color(&img)
    }
}

/// Mean RGB value of an image
pub fn mean_color(img: &RgbImage) -> [f32; 3] {
    let count = (img.width() as f64 * img.height() as f64).max(1.0);
    let mut sum = [0.0f64; 3];
    for pixel in img.pixels() {
        for c in 0..3 {
            sum[c] += pixel.0[c] as f64;
        }
    }
    [
        (sum[0] / count) as f32,
        (sum[1] / count) as f32,
        (sum[2] / count) as f32,
    ]
}

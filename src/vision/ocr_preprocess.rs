//! Image preprocessing filters for OCR
//!
//! Turns a color card region into a clean black-on-white binary image:
//! grayscale, upscale, denoise, contrast normalization, binarization and a
//! white margin. Title and set-code fields use a local (adaptive) threshold,
//! numeric fields a global Otsu split.

use image::{imageops, DynamicImage, GrayImage, Luma, RgbImage};
use imageproc::contrast::{equalize_histogram, otsu_level};
use imageproc::filter::{box_filter, median_filter};
use tracing::debug;

use super::text_reader::FieldKind;
use crate::config::OcrConfig;

/// How a field image is split into ink and paper
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binarization {
    /// Threshold against the local mean (uneven lighting, textured frames)
    Adaptive,
    /// Single histogram-derived threshold (small, high-contrast digits)
    Global,
}

impl Binarization {
    /// Thresholding strategy used for a field
    pub fn for_field(field: FieldKind) -> Self {
        match field {
            FieldKind::Title | FieldKind::SetCode => Binarization::Adaptive,
            FieldKind::CollectorNumber => Binarization::Global,
        }
    }
}

/// Run the full preprocessing chain for one field
pub fn preprocess_field(region: &RgbImage, field: FieldKind, settings: &OcrConfig) -> GrayImage {
    let gray = DynamicImage::ImageRgb8(region.clone()).to_luma8();
    let scaled = upscale(&gray, settings.region_scale, settings.min_region_height);
    let denoised = if settings.denoise_radius > 0 {
        median_filter(&scaled, settings.denoise_radius, settings.denoise_radius)
    } else {
        scaled
    };
    let enhanced = equalize_histogram(&denoised);

    let binarization = Binarization::for_field(field);
    let binary = match binarization {
        Binarization::Adaptive => {
            adaptive_binarize(&enhanced, settings.adaptive_block_radius, settings.adaptive_offset)
        }
        Binarization::Global => global_binarize(&enhanced),
    };

    debug!(
        "Preprocessed {:?} region {}x{} -> {}x{} ({:?})",
        field,
        region.width(),
        region.height(),
        binary.width(),
        binary.height(),
        binarization
    );

    pad_border(&binary, settings.border_margin)
}

/// Upscale by a fixed factor, then further if still shorter than `min_height`
fn upscale(image: &GrayImage, scale: u32, min_height: u32) -> GrayImage {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return image.clone();
    }

    let mut factor = scale.max(1) as f32;
    let scaled_height = height as f32 * factor;
    if scaled_height < min_height as f32 {
        factor = min_height as f32 / height as f32;
    }
    if (factor - 1.0).abs() < f32::EPSILON {
        return image.clone();
    }

    let new_w = ((width as f32 * factor).round() as u32).max(1);
    let new_h = ((height as f32 * factor).round() as u32).max(1);
    imageops::resize(image, new_w, new_h, imageops::FilterType::CatmullRom)
}

/// Pixels brighter than the local box mean minus `offset` become white
fn adaptive_binarize(image: &GrayImage, block_radius: u32, offset: i16) -> GrayImage {
    let local_mean = box_filter(image, block_radius, block_radius);
    let mut out = image.clone();
    for (x, y, pixel) in out.enumerate_pixels_mut() {
        let mean = local_mean.get_pixel(x, y).0[0] as i16;
        let value = image.get_pixel(x, y).0[0] as i16;
        pixel.0[0] = if value > mean - offset { 255 } else { 0 };
    }
    out
}

/// Otsu threshold over the whole image
fn global_binarize(image: &GrayImage) -> GrayImage {
    let level = otsu_level(image);
    let mut out = image.clone();
    for pixel in out.pixels_mut() {
        pixel.0[0] = if pixel.0[0] > level { 255 } else { 0 };
    }
    out
}

/// Surround the image with a white margin
fn pad_border(image: &GrayImage, margin: u32) -> GrayImage {
    if margin == 0 {
        return image.clone();
    }
    let (width, height) = image.dimensions();
    let mut canvas = GrayImage::from_pixel(width + 2 * margin, height + 2 * margin, Luma([255]));
    imageops::replace(&mut canvas, image, margin as i64, margin as i64);
    canvas
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn is_binary(image: &GrayImage) -> bool {
        image.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255)
    }

    #[test]
    fn test_binarization_per_field() {
        assert_eq!(Binarization::for_field(FieldKind::Title), Binarization::Adaptive);
        assert_eq!(Binarization::for_field(FieldKind::SetCode), Binarization::Adaptive);
        assert_eq!(Binarization::for_field(FieldKind::CollectorNumber), Binarization::Global);
    }

    #[test]
    fn test_upscale_applies_scale_and_min_height() {
        let img = GrayImage::new(40, 10);
        let scaled = upscale(&img, 3, 50);
        assert_eq!(scaled.dimensions(), (200, 50));

        let img = GrayImage::new(40, 30);
        assert_eq!(upscale(&img, 3, 50).dimensions(), (120, 90));

        let img = GrayImage::new(40, 60);
        assert_eq!(upscale(&img, 1, 50).dimensions(), (40, 60));
    }

    #[test]
    fn test_pad_border() {
        let img = GrayImage::from_pixel(4, 2, Luma([0]));
        let padded = pad_border(&img, 10);
        assert_eq!(padded.dimensions(), (24, 22));
        assert_eq!(padded.get_pixel(0, 0).0[0], 255);
        assert_eq!(padded.get_pixel(10, 10).0[0], 0);
    }

    #[test]
    fn test_global_binarize_splits_two_tones() {
        let img = GrayImage::from_fn(20, 10, |x, _| if x < 10 { Luma([30]) } else { Luma([220]) });
        let binary = global_binarize(&img);
        assert_eq!(binary.get_pixel(2, 5).0[0], 0);
        assert_eq!(binary.get_pixel(15, 5).0[0], 255);
    }

    #[test]
    fn test_preprocess_field_outputs_padded_binary() {
        let region = RgbImage::from_fn(60, 12, |x, _| {
            if x % 6 < 2 { Rgb([10, 10, 10]) } else { Rgb([240, 235, 220]) }
        });
        let settings = OcrConfig::default();

        for field in [FieldKind::Title, FieldKind::CollectorNumber, FieldKind::SetCode] {
            let out = preprocess_field(&region, field, &settings);
            assert!(is_binary(&out));
            // 3x scale (36px) is below the 50px floor: 50px tall plus margins
            assert_eq!(out.height(), 50 + 20);
        }
    }
}

//! Tesseract OCR backend
//!
//! Uses the system `tesseract` binary through rusty-tesseract. Each field is
//! read as a single text line with a character whitelist.

use image::{DynamicImage, GrayImage};
use rusty_tesseract::{Args, Image};
use std::collections::HashMap;
use std::sync::OnceLock;
use tracing::{debug, info, warn};

use super::text_reader::{CharacterPolicy, OcrError, OcrToken, TextRecognizer};

/// Page segmentation mode: treat the image as a single text line
const PSM_SINGLE_LINE: i32 = 7;
/// Default OCR engine mode
const OEM_DEFAULT: i32 = 3;

/// Tesseract-backed [`TextRecognizer`]
pub struct TesseractRecognizer {
    language: String,
    dpi: i32,
    version: OnceLock<Option<String>>,
}

impl TesseractRecognizer {
    /// Create a recognizer for a tesseract language code (e.g. "eng")
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            dpi: 300,
            version: OnceLock::new(),
        }
    }

    /// Installed tesseract version, probed once
    pub fn version(&self) -> Option<&str> {
        self.version
            .get_or_init(|| match rusty_tesseract::get_tesseract_version() {
                Ok(version) => {
                    info!("Found tesseract {}", version.lines().next().unwrap_or("").trim());
                    Some(version)
                }
                Err(e) => {
                    warn!("Tesseract not available: {}", e);
                    None
                }
            })
            .as_deref()
    }

    fn args(&self, policy: CharacterPolicy) -> Args {
        let mut config_variables = HashMap::new();
        config_variables.insert("tessedit_char_whitelist".to_string(), policy.whitelist());

        Args {
            lang: self.language.clone(),
            config_variables,
            dpi: Some(self.dpi),
            psm: Some(PSM_SINGLE_LINE),
            oem: Some(OEM_DEFAULT),
        }
    }
}

impl TextRecognizer for TesseractRecognizer {
    fn is_available(&self) -> bool {
        self.version().is_some()
    }

    fn recognize(&self, image: &GrayImage, policy: CharacterPolicy) -> Result<Vec<OcrToken>, OcrError> {
        if !self.is_available() {
            return Err(OcrError::Unavailable);
        }

        let dynamic = DynamicImage::ImageLuma8(image.clone());
        let tess_img = Image::from_dynamic_image(&dynamic)
            .map_err(|e| OcrError::Backend(format!("Failed to create tesseract image: {}", e)))?;

        let output = rusty_tesseract::image_to_data(&tess_img, &self.args(policy))
            .map_err(|e| OcrError::Backend(e.to_string()))?;

        let tokens: Vec<OcrToken> = output
            .data
            .into_iter()
            .filter(|d| !d.text.trim().is_empty())
            .map(|d| OcrToken::new(d.text.trim(), d.conf))
            .collect();

        debug!(
            "Tesseract read {} tokens from {}x{} image",
            tokens.len(),
            image.width(),
            image.height()
        );
        Ok(tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_carry_whitelist_and_single_line_mode() {
        let recognizer = TesseractRecognizer::new("eng");
        let args = recognizer.args(CharacterPolicy::Numeric);

        assert_eq!(args.lang, "eng");
        assert_eq!(args.psm, Some(PSM_SINGLE_LINE));
        assert_eq!(
            args.config_variables.get("tessedit_char_whitelist").map(String::as_str),
            Some("0123456789/")
        );
    }

    #[test]
    fn test_availability_matches_version_probe() {
        let recognizer = TesseractRecognizer::new("eng");
        assert_eq!(recognizer.is_available(), recognizer.version().is_some());
    }

    #[test]
    fn test_unavailable_recognize_errors() {
        let recognizer = TesseractRecognizer::new("eng");
        if recognizer.is_available() {
            return;
        }
        let result = recognizer.recognize(&GrayImage::new(10, 10), CharacterPolicy::Name);
        assert!(matches!(result, Err(OcrError::Unavailable)));
    }
}

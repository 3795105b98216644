//! Field-specific text reading
//!
//! Wraps an external text recognition backend. Each card field gets its own
//! preprocessing, allowed character set and deterministic cleanup.

use image::GrayImage;
use regex::Regex;
use serde::Serialize;
use std::sync::{Arc, LazyLock};
use thiserror::Error;
use tracing::{debug, warn};

use super::ocr_preprocess::preprocess_field;
use super::regions::{Region, RegionKind};
use crate::config::OcrConfig;

/// Text recognition backend failure
#[derive(Debug, Error)]
pub enum OcrError {
    /// The backend is not installed or not reachable
    #[error("text recognition backend unavailable")]
    Unavailable,
    /// The backend ran but failed
    #[error("text recognition failed: {0}")]
    Backend(String),
}

/// Card field read by OCR
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Title,
    CollectorNumber,
    SetCode,
}

impl FieldKind {
    /// Card region holding this field
    pub fn region(&self) -> RegionKind {
        match self {
            FieldKind::Title => RegionKind::Title,
            FieldKind::CollectorNumber => RegionKind::CollectorNumber,
            // Set codes are printed on the info line next to the collector number
            FieldKind::SetCode => RegionKind::CollectorNumber,
        }
    }

    /// Characters the backend may emit for this field
    pub fn policy(&self) -> CharacterPolicy {
        match self {
            FieldKind::Title => CharacterPolicy::Name,
            FieldKind::CollectorNumber => CharacterPolicy::Numeric,
            FieldKind::SetCode => CharacterPolicy::UpperAlpha,
        }
    }
}

/// Allowed character classes passed to the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharacterPolicy {
    /// Letters, apostrophe, hyphen and space
    Name,
    /// Digits and slash
    Numeric,
    /// Uppercase letters
    UpperAlpha,
}

impl CharacterPolicy {
    /// Explicit whitelist of allowed characters
    pub fn whitelist(&self) -> String {
        match self {
            CharacterPolicy::Name => {
                let mut chars: String = ('A'..='Z').chain('a'..='z').collect();
                chars.push_str("'- ");
                chars
            }
            CharacterPolicy::Numeric => "0123456789/".to_string(),
            CharacterPolicy::UpperAlpha => ('A'..='Z').collect(),
        }
    }

    /// Check a single character against the policy
    pub fn allows(&self, c: char) -> bool {
        match self {
            CharacterPolicy::Name => c.is_ascii_alphabetic() || c == '\'' || c == '-' || c == ' ',
            CharacterPolicy::Numeric => c.is_ascii_digit() || c == '/',
            CharacterPolicy::UpperAlpha => c.is_ascii_uppercase(),
        }
    }
}

/// One word reported by the backend
#[derive(Debug, Clone, PartialEq)]
pub struct OcrToken {
    /// Recognized text
    pub text: String,
    /// Backend confidence (0 - 100)
    pub confidence: f32,
}

impl OcrToken {
    pub fn new(text: impl Into<String>, confidence: f32) -> Self {
        Self {
            text: text.into(),
            confidence,
        }
    }
}

/// External text recognition capability
pub trait TextRecognizer: Send + Sync {
    /// Whether the backend can currently be used
    fn is_available(&self) -> bool;

    /// Recognize words in a preprocessed binary image
    fn recognize(&self, image: &GrayImage, policy: CharacterPolicy) -> Result<Vec<OcrToken>, OcrError>;
}

/// Text read from one field
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FieldReading {
    /// Cleaned text, empty when nothing usable was read
    pub text: String,
    /// Mean token confidence (0.0 - 1.0)
    pub confidence: f32,
}

impl FieldReading {
    /// Nothing read
    pub fn empty() -> Self {
        Self::default()
    }

    /// Whether the reading carries usable text
    pub fn is_usable(&self) -> bool {
        !self.text.is_empty()
    }
}

/// Reads card fields through a [`TextRecognizer`]
pub struct TextReader {
    backend: Arc<dyn TextRecognizer>,
    config: OcrConfig,
}

impl TextReader {
    /// Create a reader over a backend
    pub fn new(backend: Arc<dyn TextRecognizer>, config: OcrConfig) -> Self {
        Self { backend, config }
    }

    /// Whether reading is possible at all
    pub fn is_available(&self) -> bool {
        self.config.enabled && self.backend.is_available()
    }

    /// Read one field from its region
    ///
    /// Backend failures degrade to an empty reading.
    pub fn read(&self, region: &Region<'_>, field: FieldKind) -> FieldReading {
        if !self.is_available() {
            return FieldReading::empty();
        }

        let processed = preprocess_field(&region.to_image(), field, &self.config);
        let tokens = match self.backend.recognize(&processed, field.policy()) {
            Ok(tokens) => tokens,
            Err(e) => {
                warn!("OCR failed for {:?}: {}", field, e);
                return FieldReading::empty();
            }
        };

        let reading = interpret_tokens(&tokens, field);
        debug!(
            "Read {:?}: '{}' (confidence {:.2}, {} tokens)",
            field,
            reading.text,
            reading.confidence,
            tokens.len()
        );
        reading
    }
}

/// Turn raw backend tokens into a cleaned field reading
pub fn interpret_tokens(tokens: &[OcrToken], field: FieldKind) -> FieldReading {
    let words: Vec<&OcrToken> = tokens
        .iter()
        .filter(|t| t.confidence > 0.0 && !t.text.trim().is_empty())
        .collect();

    if words.is_empty() {
        return FieldReading::empty();
    }

    let confidence =
        words.iter().map(|t| t.confidence).sum::<f32>() / words.len() as f32 / 100.0;

    let text = match field {
        FieldKind::Title => {
            let joined: Vec<&str> = words.iter().map(|t| t.text.trim()).collect();
            clean_title(&joined.join(" "))
        }
        FieldKind::CollectorNumber => {
            let joined: String = words.iter().map(|t| t.text.trim()).collect();
            clean_collector_number(&joined).unwrap_or_default()
        }
        FieldKind::SetCode => {
            let joined: Vec<&str> = words.iter().map(|t| t.text.trim()).collect();
            clean_set_code(&joined.join(" ")).unwrap_or_default()
        }
    };

    if text.is_empty() {
        return FieldReading::empty();
    }

    FieldReading {
        text,
        confidence: confidence.clamp(0.0, 1.0),
    }
}

/// Strip disallowed characters, collapse whitespace and re-capitalize words
pub fn clean_title(raw: &str) -> String {
    let allowed: String = raw
        .chars()
        .filter(|c| CharacterPolicy::Name.allows(*c) || c.is_whitespace())
        .collect();

    allowed
        .split_whitespace()
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

static COLLECTOR_NUMBER_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)(?:/(\d+))?").unwrap());

static SET_CODE_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[A-Z]{3,4}").unwrap());

/// First numeric token, keeping an optional "/total" suffix
pub fn clean_collector_number(raw: &str) -> Option<String> {
    let caps = COLLECTOR_NUMBER_PATTERN.captures(raw)?;
    let number = caps.get(1)?.as_str();
    Some(match caps.get(2) {
        Some(total) => format!("{}/{}", number, total.as_str()),
        None => number.to_string(),
    })
}

/// First run of three or four uppercase letters
pub fn clean_set_code(raw: &str) -> Option<String> {
    SET_CODE_PATTERN.find(raw).map(|m| m.as_str().to_string())
}

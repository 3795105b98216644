//! Card catalog
//!
//! Typed printing records and the [`CardCatalog`] interface the recognizer
//! consumes. Two implementations are provided:
//! - [`ScryfallCatalog`]: HTTP client for the public Scryfall API
//! - [`MemoryCatalog`]: in-memory records, loadable from a JSON file

pub mod memory;
pub mod scryfall;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use memory::MemoryCatalog;
pub use scryfall::ScryfallCatalog;

/// Catalog access failure
#[derive(Debug, Error)]
pub enum CatalogError {
    /// No entry matches the request
    #[error("not found: {0}")]
    NotFound(String),
    /// The request did not complete in time
    #[error("request timed out: {0}")]
    Timeout(String),
    /// Transport or HTTP status failure
    #[error("HTTP error: {0}")]
    Http(String),
    /// Response body could not be decoded
    #[error("decode error: {0}")]
    Decode(String),
    /// Local file access failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CatalogError {
    /// Whether the failure means "no such entry" rather than a broken request
    pub fn is_not_found(&self) -> bool {
        matches!(self, CatalogError::NotFound(_))
    }
}

/// Published image sizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageSize {
    Small,
    #[default]
    Normal,
    Large,
    Png,
    ArtCrop,
    BorderCrop,
}

/// Image references of a card or card face
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageUris {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub small: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normal: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub large: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub png: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub art_crop: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub border_crop: Option<String>,
}

impl ImageUris {
    pub fn get(&self, size: ImageSize) -> Option<&str> {
        match size {
            ImageSize::Small => self.small.as_deref(),
            ImageSize::Normal => self.normal.as_deref(),
            ImageSize::Large => self.large.as_deref(),
            ImageSize::Png => self.png.as_deref(),
            ImageSize::ArtCrop => self.art_crop.as_deref(),
            ImageSize::BorderCrop => self.border_crop.as_deref(),
        }
    }
}

/// One face of a multi-faced card
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CardFace {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_uris: Option<ImageUris>,
}

/// One printing of a card, as published by the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrintingRecord {
    pub name: String,
    #[serde(rename = "set")]
    pub set_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set_name: Option<String>,
    pub collector_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rarity: Option<String>,
    #[serde(default)]
    pub color_identity: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub border_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_uris: Option<ImageUris>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub card_faces: Vec<CardFace>,
    /// Release date (YYYY-MM-DD)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub released_at: Option<String>,
    /// Rules identity shared by all printings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oracle_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prints_search_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scryfall_uri: Option<String>,
}

impl PrintingRecord {
    /// Minimal record; remaining fields are filled with the `with_*` builders
    pub fn new(
        name: impl Into<String>,
        set_code: impl Into<String>,
        collector_number: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            set_code: set_code.into(),
            set_name: None,
            collector_number: collector_number.into(),
            rarity: None,
            color_identity: Vec::new(),
            frame: None,
            border_color: None,
            image_uris: None,
            card_faces: Vec::new(),
            released_at: None,
            oracle_id: None,
            prints_search_uri: None,
            scryfall_uri: None,
        }
    }

    pub fn with_set_name(mut self, set_name: impl Into<String>) -> Self {
        self.set_name = Some(set_name.into());
        self
    }

    pub fn with_colors(mut self, colors: &[&str]) -> Self {
        self.color_identity = colors.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn with_frame(mut self, frame: impl Into<String>, border_color: impl Into<String>) -> Self {
        self.frame = Some(frame.into());
        self.border_color = Some(border_color.into());
        self
    }

    pub fn with_image(mut self, size: ImageSize, reference: impl Into<String>) -> Self {
        let uris = self.image_uris.get_or_insert_with(ImageUris::default);
        let slot = match size {
            ImageSize::Small => &mut uris.small,
            ImageSize::Normal => &mut uris.normal,
            ImageSize::Large => &mut uris.large,
            ImageSize::Png => &mut uris.png,
            ImageSize::ArtCrop => &mut uris.art_crop,
            ImageSize::BorderCrop => &mut uris.border_crop,
        };
        *slot = Some(reference.into());
        self
    }

    pub fn with_released_at(mut self, date: impl Into<String>) -> Self {
        self.released_at = Some(date.into());
        self
    }

    pub fn with_oracle_id(mut self, oracle_id: impl Into<String>) -> Self {
        self.oracle_id = Some(oracle_id.into());
        self
    }

    /// Image reference at the given size, falling back to the first face
    pub fn image_uri(&self, size: ImageSize) -> Option<&str> {
        if let Some(uris) = &self.image_uris {
            return uris.get(size);
        }
        self.card_faces
            .first()
            .and_then(|face| face.image_uris.as_ref())
            .and_then(|uris| uris.get(size))
    }

    /// Whether this printing carries the given collector number
    ///
    /// Exact match first, then comparison of the normalized forms.
    pub fn matches_collector_number(&self, number: &str) -> bool {
        self.collector_number == number
            || normalize_collector_number(&self.collector_number) == normalize_collector_number(number)
    }

    /// Short "Name (SET #123)" label
    pub fn label(&self) -> String {
        format!(
            "{} ({} #{})",
            self.name,
            self.set_code.to_uppercase(),
            self.collector_number
        )
    }
}

/// Canonical comparison form of a collector number: no "/total", no leading zeros
pub fn normalize_collector_number(raw: &str) -> String {
    let number = raw.split('/').next().unwrap_or("").trim();
    let stripped = number.trim_start_matches('0');
    if stripped.is_empty() && !number.is_empty() {
        "0".to_string()
    } else {
        stripped.to_lowercase()
    }
}

/// Find the printing with a given collector number among `prints`
pub fn find_by_collector_number<'a>(
    prints: &'a [PrintingRecord],
    number: &str,
) -> Option<&'a PrintingRecord> {
    prints
        .iter()
        .find(|p| p.collector_number == number)
        .or_else(|| prints.iter().find(|p| p.matches_collector_number(number)))
}

/// Card catalog capabilities used by recognition
pub trait CardCatalog: Send + Sync {
    /// Fuzzy name lookup returning one canonical printing
    fn named_fuzzy(&self, name: &str) -> Result<PrintingRecord, CatalogError>;

    /// Every printing sharing the named card's identity, oldest first
    fn printings(&self, name: &str) -> Result<Vec<PrintingRecord>, CatalogError> {
        let card = self.named_fuzzy(name)?;
        self.printings_of(&card)
    }

    /// Every printing sharing an already resolved card's identity, oldest first
    fn printings_of(&self, card: &PrintingRecord) -> Result<Vec<PrintingRecord>, CatalogError>;

    /// Exact printing by set code and collector number
    fn by_set_and_number(&self, set_code: &str, number: &str) -> Result<PrintingRecord, CatalogError>;

    /// Card names starting with (or resembling) a partial name
    fn autocomplete(&self, partial: &str) -> Result<Vec<String>, CatalogError>;

    /// Raw bytes behind an image reference
    fn fetch_image(&self, reference: &str) -> Result<Vec<u8>, CatalogError>;

    /// Independent handle for use on another thread
    fn fork(&self) -> Box<dyn CardCatalog>;
}

/// Sort printings by release date, undated ones last
pub fn sort_by_release(prints: &mut [PrintingRecord]) {
    prints.sort_by(|a, b| match (&a.released_at, &b.released_at) {
        (Some(x), Some(y)) => x.cmp(y),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
}

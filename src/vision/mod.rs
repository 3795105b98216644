//! Vision/OCR Layer
//!
//! Turns a photo into a rectified card and reads what is printed on it:
//! - Card detection and perspective correction
//! - Fixed card regions (title, collector number, artwork, border)
//! - Field-specific OCR through a pluggable backend (tesseract by default)
//! - Perceptual hashing of artwork

pub mod geometry;
pub mod ocr_preprocess;
pub mod phash;
pub mod regions;
pub mod source;
pub mod tesseract;
pub mod text_reader;

pub use geometry::{GeometryError, GeometryExtractor, NormalizedCard};
pub use phash::{HashCache, PerceptualHash};
pub use regions::{Region, RegionKind, RegionRect};
pub use source::SourceImage;
pub use tesseract::TesseractRecognizer;
pub use text_reader::{
    CharacterPolicy, FieldKind, FieldReading, OcrError, OcrToken, TextReader, TextRecognizer,
};

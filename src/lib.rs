//! card-scanner - Trading card recognition
//!
//! Identifies a photographed card's name and, where possible, its exact
//! printing (set and collector number).

pub mod catalog;
pub mod config;
pub mod matching;
pub mod recognizer;
pub mod vision;

pub use catalog::{CardCatalog, CatalogError, MemoryCatalog, PrintingRecord, ScryfallCatalog};
pub use config::AppConfig;
pub use matching::{MatchCandidate, SimilarityScorer};
pub use recognizer::{CardRecognizer, ConfidenceBand, MatchMethod, RecognitionFailure, RecognitionResult};
pub use vision::{GeometryExtractor, NormalizedCard, SourceImage, TesseractRecognizer, TextReader};

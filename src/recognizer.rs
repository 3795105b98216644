//! Card recognition
//!
//! Sequences card extraction, field reading, catalog lookups and printing
//! scoring into one decision. Every outcome, including failures, is returned
//! as a [`RecognitionResult`] so batch callers can carry on after any card.

use rayon::prelude::*;
use serde::Serialize;
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Instant;
use strsim::normalized_levenshtein;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::catalog::{
    find_by_collector_number, normalize_collector_number, CardCatalog, CatalogError, PrintingRecord,
};
use crate::config::{AppConfig, ConfidenceConfig};
use crate::matching::{MatchCandidate, ScoreComponents, SimilarityScorer};
use crate::vision::{
    FieldKind, FieldReading, GeometryExtractor, HashCache, NormalizedCard, SourceImage, TextReader,
    TextRecognizer,
};

/// How the printing was decided
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMethod {
    /// Collector number read from the card matched a printing
    CollectorNumber,
    /// Name confirmed, printing undetermined
    NameOnly,
    /// Printing chosen by similarity scoring
    ArtworkMatch,
}

/// Why recognition stopped without a card
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecognitionFailure {
    #[error("no card detected in image")]
    NoCardDetected,
    #[error("card name could not be read; supply it manually")]
    NameUnrecognized,
    #[error("card name not found in catalog")]
    NameNotFound,
}

/// Coarse confidence classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceBand {
    High,
    Medium,
    Low,
}

impl ConfidenceBand {
    pub fn from_confidence(confidence: f32, config: &ConfidenceConfig) -> Self {
        if confidence >= config.high_band {
            ConfidenceBand::High
        } else if confidence >= config.medium_band {
            ConfidenceBand::Medium
        } else {
            ConfidenceBand::Low
        }
    }
}

/// Raw field readings taken from the card
#[derive(Debug, Clone, Default, Serialize)]
pub struct FieldReadings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<FieldReading>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collector_number: Option<FieldReading>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub set_code: Option<FieldReading>,
}

/// Outcome of one recognition
#[derive(Debug, Clone, Serialize)]
pub struct RecognitionResult {
    /// Canonical card name
    pub name: Option<String>,
    /// Chosen printing
    pub printing: Option<PrintingRecord>,
    /// Overall confidence (0.0 - 1.0)
    pub confidence: f32,
    pub band: ConfidenceBand,
    pub method: Option<MatchMethod>,
    /// Ranked alternatives, best first
    pub candidates: Vec<MatchCandidate>,
    pub failure: Option<RecognitionFailure>,
    pub readings: FieldReadings,
    pub extraction_confidence: Option<f32>,
    pub elapsed_ms: u64,
}

impl RecognitionResult {
    fn failed(failure: RecognitionFailure, name: Option<String>) -> Self {
        Self {
            name,
            printing: None,
            confidence: 0.0,
            band: ConfidenceBand::Low,
            method: None,
            candidates: Vec::new(),
            failure: Some(failure),
            readings: FieldReadings::default(),
            extraction_confidence: None,
            elapsed_ms: 0,
        }
    }

    fn succeeded(
        printing: Option<PrintingRecord>,
        name: String,
        method: MatchMethod,
        confidence: f32,
        candidates: Vec<MatchCandidate>,
        config: &ConfidenceConfig,
    ) -> Self {
        let confidence = confidence.clamp(0.0, 1.0);
        Self {
            name: Some(name),
            printing,
            confidence,
            band: ConfidenceBand::from_confidence(confidence, config),
            method: Some(method),
            candidates,
            failure: None,
            readings: FieldReadings::default(),
            extraction_confidence: None,
            elapsed_ms: 0,
        }
    }

    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }

    /// Human-readable multi-line summary
    pub fn summary(&self) -> String {
        let mut out = String::new();

        if let Some(failure) = self.failure {
            let _ = writeln!(out, "Not recognized: {}", failure);
            if let Some(name) = &self.name {
                let _ = writeln!(out, "  name read: {}", name);
            }
            return out;
        }

        let _ = writeln!(out, "{}", self.name.as_deref().unwrap_or("?"));
        if let Some(printing) = &self.printing {
            let _ = writeln!(
                out,
                "  {} [{}] #{}",
                printing.set_name.as_deref().unwrap_or("?"),
                printing.set_code.to_uppercase(),
                printing.collector_number
            );
            if let Some(rarity) = &printing.rarity {
                let _ = writeln!(out, "  rarity: {}", rarity);
            }
        }
        let _ = writeln!(
            out,
            "  confidence: {:.0}% ({:?}, via {:?})",
            self.confidence * 100.0,
            self.band,
            self.method
        );

        if self.candidates.len() > 1 {
            let _ = writeln!(out, "  alternatives:");
            for candidate in self.candidates.iter().skip(1).take(4) {
                let _ = writeln!(out, "    {:.2}  {}", candidate.score, candidate.printing.label());
            }
        }
        out
    }
}

/// Recognizes cards in photos against a catalog
pub struct CardRecognizer {
    config: AppConfig,
    catalog: Arc<dyn CardCatalog>,
    backend: Arc<dyn TextRecognizer>,
    cache: Arc<HashCache>,
    extractor: GeometryExtractor,
    reader: TextReader,
    scorer: SimilarityScorer,
}

impl CardRecognizer {
    /// Create a recognizer with a fresh hash cache
    pub fn new(config: AppConfig, catalog: Arc<dyn CardCatalog>, backend: Arc<dyn TextRecognizer>) -> Self {
        Self::with_cache(config, catalog, backend, HashCache::new())
    }

    /// Create a recognizer sharing an existing hash cache
    pub fn with_cache(
        config: AppConfig,
        catalog: Arc<dyn CardCatalog>,
        backend: Arc<dyn TextRecognizer>,
        cache: Arc<HashCache>,
    ) -> Self {
        let extractor = GeometryExtractor::with_config(config.geometry.clone());
        let reader = TextReader::new(Arc::clone(&backend), config.ocr.clone());
        let scorer = SimilarityScorer::new(Arc::clone(&catalog), Arc::clone(&cache), &config);

        Self {
            config,
            catalog,
            backend,
            cache,
            extractor,
            reader,
            scorer,
        }
    }

    /// Independent recognizer for another thread; only the hash cache is shared
    pub fn fork(&self) -> Self {
        Self::with_cache(
            self.config.clone(),
            Arc::from(self.catalog.fork()),
            Arc::clone(&self.backend),
            Arc::clone(&self.cache),
        )
    }

    pub fn hash_cache(&self) -> &Arc<HashCache> {
        &self.cache
    }

    /// Whether field reading is possible
    pub fn ocr_available(&self) -> bool {
        self.reader.is_available()
    }

    /// Recognize a card from a photo, a known name, or both
    pub fn recognize(&self, image: Option<&SourceImage>, name_hint: Option<&str>) -> RecognitionResult {
        let start = Instant::now();
        let mut result = self.run(image, name_hint);
        result.elapsed_ms = start.elapsed().as_millis() as u64;

        match (&result.failure, &result.printing) {
            (Some(failure), _) => info!("Recognition failed: {}", failure),
            (None, Some(printing)) => info!(
                "Recognized {} via {:?} (confidence {:.2})",
                printing.label(),
                result.method,
                result.confidence
            ),
            (None, None) => info!("Recognized {:?} without a printing", result.name),
        }
        result
    }

    fn run(&self, image: Option<&SourceImage>, name_hint: Option<&str>) -> RecognitionResult {
        let mut readings = FieldReadings::default();

        let card = match image.map(|img| self.extractor.extract(img)) {
            Some(Ok(card)) => Some(card),
            Some(Err(e)) => {
                debug!("Extraction failed: {}", e);
                return RecognitionResult::failed(RecognitionFailure::NoCardDetected, None);
            }
            None => None,
        };
        let extraction_confidence = card.as_ref().map(|c| c.confidence);

        let mut number_reading = None;
        let mut set_reading = None;
        if let Some(card) = &card {
            if self.reader.is_available() {
                number_reading = Some(self.read_field(card, FieldKind::CollectorNumber));
                set_reading = Some(self.read_field(card, FieldKind::SetCode));
            }
        }
        readings.collector_number = number_reading.clone();
        readings.set_code = set_reading.clone();

        let (name, name_confidence) = match name_hint.map(str::trim).filter(|n| !n.is_empty()) {
            Some(hint) => (hint.to_string(), 1.0),
            None => {
                let title = match &card {
                    Some(card) if self.reader.is_available() => self.read_field(card, FieldKind::Title),
                    _ => FieldReading::empty(),
                };
                readings.title = Some(title.clone());
                if !title.is_usable() {
                    let mut result = RecognitionResult::failed(RecognitionFailure::NameUnrecognized, None);
                    result.readings = readings;
                    result.extraction_confidence = extraction_confidence;
                    return result;
                }
                (self.verify_name(&title.text), title.confidence)
            }
        };

        let resolved = match self.catalog.named_fuzzy(&name) {
            Ok(record) => record,
            Err(e) => {
                if !e.is_not_found() {
                    warn!("Name lookup for '{}' failed: {}", name, e);
                }
                let mut result = RecognitionResult::failed(RecognitionFailure::NameNotFound, Some(name));
                result.readings = readings;
                result.extraction_confidence = extraction_confidence;
                return result;
            }
        };

        let prints = match self.catalog.printings_of(&resolved) {
            Ok(prints) => prints,
            Err(e) => {
                warn!("Could not list printings of '{}': {}", resolved.name, e);
                Vec::new()
            }
        };

        let mut result = self.decide(card.as_ref(), resolved, prints, name_confidence, number_reading, set_reading);
        result.readings = readings;
        result.extraction_confidence = extraction_confidence;
        result
    }

    fn decide(
        &self,
        card: Option<&NormalizedCard>,
        resolved: PrintingRecord,
        prints: Vec<PrintingRecord>,
        name_confidence: f32,
        number: Option<FieldReading>,
        set_code: Option<FieldReading>,
    ) -> RecognitionResult {
        let conf = &self.config.confidence;
        let name = resolved.name.clone();

        if let Some(number) = number.filter(FieldReading::is_usable) {
            if let Some(printing) = self.match_collector_number(&name, &prints, &number.text, set_code.as_ref()) {
                debug!("Collector number {} matched {}", number.text, printing.label());
                return RecognitionResult::succeeded(
                    Some(printing),
                    name,
                    MatchMethod::CollectorNumber,
                    conf.collector_number_confidence,
                    Vec::new(),
                    conf,
                );
            }
            debug!("Collector number {} matched no printing of '{}'", number.text, name);
        }

        let candidates = match card {
            Some(card) => self.scorer.score_printings(card, &prints),
            None => Vec::new(),
        };

        let Some(top) = candidates.first() else {
            return self.name_only(resolved, prints);
        };

        let extraction = card.map_or(0.0, |c| c.confidence);
        let confidence = conf.extraction_weight * extraction
            + conf.name_weight * name_confidence
            + conf.match_weight * top.score;

        let printing = top.printing.clone();
        let mut candidates = candidates;
        candidates.truncate(conf.max_candidates);

        RecognitionResult::succeeded(Some(printing), name, MatchMethod::ArtworkMatch, confidence, candidates, conf)
    }

    /// Name known, printing undetermined: report the oldest printing
    fn name_only(&self, resolved: PrintingRecord, prints: Vec<PrintingRecord>) -> RecognitionResult {
        let conf = &self.config.confidence;
        let name = resolved.name.clone();

        let candidates: Vec<MatchCandidate> = prints
            .iter()
            .take(conf.max_candidates)
            .map(|printing| MatchCandidate {
                printing: printing.clone(),
                components: ScoreComponents::default(),
                score: conf.name_only_confidence,
            })
            .collect();
        let printing = prints.into_iter().next().unwrap_or(resolved);

        RecognitionResult::succeeded(
            Some(printing),
            name,
            MatchMethod::NameOnly,
            conf.name_only_confidence,
            candidates,
            conf,
        )
    }

    fn match_collector_number(
        &self,
        name: &str,
        prints: &[PrintingRecord],
        number: &str,
        set_code: Option<&FieldReading>,
    ) -> Option<PrintingRecord> {
        if let Some(printing) = find_by_collector_number(prints, number) {
            return Some(printing.clone());
        }

        // Printings missing from the list can still be found by set + number
        let set_code = set_code.filter(|s| s.is_usable())?;
        let bare_number = normalize_collector_number(number);
        if bare_number.is_empty() {
            return None;
        }
        match self.catalog.by_set_and_number(&set_code.text, &bare_number) {
            Ok(printing) if printing.name.eq_ignore_ascii_case(name) => Some(printing),
            Ok(_) => None,
            Err(e) => {
                debug!("Set lookup {}/{} failed: {}", set_code.text, bare_number, e);
                None
            }
        }
    }

    fn read_field(&self, card: &NormalizedCard, field: FieldKind) -> FieldReading {
        self.reader.read(&card.region(field.region()), field)
    }

    /// Correct an OCR'd name against catalog suggestions
    pub fn verify_name(&self, read: &str) -> String {
        let suggestions = match self.catalog.autocomplete(read) {
            Ok(suggestions) => suggestions,
            Err(e) => {
                debug!("Autocomplete for '{}' failed: {}", read, e);
                return read.to_string();
            }
        };

        if let Some(exact) = suggestions.iter().find(|s| s.eq_ignore_ascii_case(read)) {
            return exact.clone();
        }

        match suggestions.first() {
            Some(first)
                if normalized_levenshtein(&first.to_lowercase(), &read.to_lowercase())
                    > self.config.confidence.name_similarity_threshold =>
            {
                debug!("Corrected '{}' to '{}'", read, first);
                first.clone()
            }
            _ => read.to_string(),
        }
    }

    /// Every printing of a card, oldest first
    pub fn all_printings(&self, name: &str) -> Result<Vec<PrintingRecord>, CatalogError> {
        self.catalog.printings(name)
    }

    /// Exact printing by set code and collector number
    pub fn identify_printing(&self, set_code: &str, collector_number: &str) -> Result<PrintingRecord, CatalogError> {
        self.catalog.by_set_and_number(set_code, collector_number)
    }

    /// Recognize many photos in parallel, one independent recognizer per photo
    pub fn recognize_batch(&self, images: &[SourceImage]) -> Vec<RecognitionResult> {
        info!("Recognizing {} images", images.len());
        images
            .par_iter()
            .map(|image| self.fork().recognize(Some(image), None))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ImageSize, MemoryCatalog};
    use crate::vision::{CharacterPolicy, OcrError, OcrToken};
    use image::{GrayImage, Rgb, RgbImage};

    /// Backend returning fixed tokens per character policy
    struct ScriptedRecognizer {
        available: bool,
        title: Vec<OcrToken>,
        number: Vec<OcrToken>,
        set_code: Vec<OcrToken>,
    }

    impl ScriptedRecognizer {
        fn unavailable() -> Arc<Self> {
            Arc::new(Self {
                available: false,
                title: Vec::new(),
                number: Vec::new(),
                set_code: Vec::new(),
            })
        }

        fn reading(title: &str, number: &str) -> Arc<Self> {
            Self::reading_with_set(title, number, "")
        }

        fn reading_with_set(title: &str, number: &str, set_code: &str) -> Arc<Self> {
            let tokens = |text: &str| {
                text.split_whitespace()
                    .map(|t| OcrToken::new(t, 80.0))
                    .collect::<Vec<_>>()
            };
            Arc::new(Self {
                available: true,
                title: tokens(title),
                number: tokens(number),
                set_code: tokens(set_code),
            })
        }
    }

    impl TextRecognizer for ScriptedRecognizer {
        fn is_available(&self) -> bool {
            self.available
        }

        fn recognize(&self, _image: &GrayImage, policy: CharacterPolicy) -> Result<Vec<OcrToken>, OcrError> {
            Ok(match policy {
                CharacterPolicy::Name => self.title.clone(),
                CharacterPolicy::Numeric => self.number.clone(),
                CharacterPolicy::UpperAlpha => self.set_code.clone(),
            })
        }
    }

    fn catalog() -> MemoryCatalog {
        MemoryCatalog::new(vec![
            PrintingRecord::new("Lightning Bolt", "m10", "146")
                .with_released_at("2009-07-17")
                .with_colors(&["R"])
                .with_frame("2003", "black"),
            PrintingRecord::new("Lightning Bolt", "lea", "161")
                .with_released_at("1993-08-05")
                .with_colors(&["R"])
                .with_frame("1993", "black"),
            PrintingRecord::new("Sol Ring", "lea", "7")
                .with_released_at("1993-08-05")
                .with_frame("1993", "black")
                .with_image(ImageSize::Normal, "mem://sol-lea"),
            PrintingRecord::new("Sol Ring", "cmm", "23")
                .with_released_at("2023-08-04")
                .with_frame("2015", "black")
                .with_image(ImageSize::Normal, "mem://sol-cmm"),
            PrintingRecord::new("Sol Ring", "cmr", "289")
                .with_released_at("2020-11-20")
                .with_frame("2015", "black")
                .with_image(ImageSize::Normal, "mem://sol-cmr"),
        ])
    }

    fn recognizer(catalog: &MemoryCatalog, backend: Arc<ScriptedRecognizer>) -> CardRecognizer {
        CardRecognizer::new(AppConfig::default(), Arc::new(catalog.clone()), backend)
    }

    /// Dark photo with a light card-shaped rectangle
    fn card_photo() -> SourceImage {
        SourceImage::new(RgbImage::from_fn(300, 400, |x, y| {
            if (55..244).contains(&x) && (68..332).contains(&y) {
                Rgb([220, 210, 190])
            } else {
                Rgb([20, 20, 25])
            }
        }))
    }

    fn noise_photo() -> SourceImage {
        let mut state: u64 = 11;
        SourceImage::new(RgbImage::from_fn(640, 480, |_, _| {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            let v = (state >> 56) as u8;
            Rgb([v, v.rotate_left(3), !v])
        }))
    }

    fn blank_photo() -> SourceImage {
        SourceImage::new(RgbImage::from_pixel(320, 240, Rgb([128, 128, 128])))
    }

    #[test]
    fn test_name_without_image_is_name_only() {
        let catalog = catalog();
        let result = recognizer(&catalog, ScriptedRecognizer::unavailable()).recognize(None, Some("Lightning Bolt"));

        assert!(result.is_success());
        assert_eq!(result.method, Some(MatchMethod::NameOnly));
        assert!((result.confidence - 0.5).abs() < 1e-6);
        assert_eq!(result.band, ConfidenceBand::Medium);
        assert_eq!(result.printing.as_ref().map(|p| p.set_code.as_str()), Some("lea"));
        assert_eq!(result.candidates.len(), 2);
    }

    #[test]
    fn test_ocr_unavailable_with_supplied_name() {
        let catalog = catalog();
        let recognizer = recognizer(&catalog, ScriptedRecognizer::unavailable());
        assert!(!recognizer.ocr_available());

        let result = recognizer.recognize(None, Some("Sol Ring"));
        assert_eq!(result.method, Some(MatchMethod::NameOnly));
        assert!((result.confidence - 0.5).abs() < 1e-6);
        assert_eq!(result.name.as_deref(), Some("Sol Ring"));
    }

    #[test]
    fn test_blank_image_no_card_detected() {
        let catalog = catalog();
        let result = recognizer(&catalog, ScriptedRecognizer::reading("Sol Ring", "7"))
            .recognize(Some(&blank_photo()), None);

        assert_eq!(result.failure, Some(RecognitionFailure::NoCardDetected));
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.band, ConfidenceBand::Low);
    }

    #[test]
    fn test_collector_number_short_circuit() {
        let catalog = catalog();
        let recognizer = recognizer(&catalog, ScriptedRecognizer::reading("", "289/350"));

        let result = recognizer.recognize(Some(&card_photo()), Some("Sol Ring"));

        assert_eq!(result.method, Some(MatchMethod::CollectorNumber));
        assert!((result.confidence - 0.95).abs() < 1e-6);
        assert_eq!(result.band, ConfidenceBand::High);
        assert_eq!(result.printing.as_ref().map(|p| p.set_code.as_str()), Some("cmr"));
        assert!(result.candidates.is_empty());
        assert_eq!(catalog.image_fetch_count(), 0);
    }

    #[test]
    fn test_collector_number_normalization() {
        let catalog = catalog();

        let result = recognizer(&catalog, ScriptedRecognizer::reading("", "007"))
            .recognize(Some(&card_photo()), Some("Sol Ring"));
        assert_eq!(result.printing.as_ref().map(|p| p.collector_number.as_str()), Some("7"));
        assert_eq!(result.method, Some(MatchMethod::CollectorNumber));

        let result = recognizer(&catalog, ScriptedRecognizer::reading("", "23/280"))
            .recognize(Some(&card_photo()), Some("Sol Ring"));
        assert_eq!(result.printing.as_ref().map(|p| p.collector_number.as_str()), Some("23"));
    }

    #[test]
    fn test_title_reading_leads_to_artwork_match() {
        let catalog = catalog();
        let result = recognizer(&catalog, ScriptedRecognizer::reading("LIGHTNING bolt", ""))
            .recognize(Some(&card_photo()), None);

        assert!(result.is_success(), "{:?}", result.failure);
        assert_eq!(result.name.as_deref(), Some("Lightning Bolt"));
        assert_eq!(result.method, Some(MatchMethod::ArtworkMatch));
        assert_eq!(result.candidates.len(), 2);
        assert!(result.candidates.windows(2).all(|w| w[0].score >= w[1].score));
        assert!((0.0..=1.0).contains(&result.confidence));
        assert_eq!(
            result.printing.as_ref().map(|p| &p.set_code),
            result.candidates.first().map(|c| &c.printing.set_code)
        );
        assert!(result.readings.title.as_ref().is_some_and(|t| t.is_usable()));
    }

    #[test]
    fn test_unreadable_title_is_name_unrecognized() {
        let catalog = catalog();
        let result = recognizer(&catalog, ScriptedRecognizer::reading("", ""))
            .recognize(Some(&card_photo()), None);
        assert_eq!(result.failure, Some(RecognitionFailure::NameUnrecognized));
        assert!(result.extraction_confidence.is_some());

        let result = recognizer(&catalog, ScriptedRecognizer::unavailable()).recognize(None, None);
        assert_eq!(result.failure, Some(RecognitionFailure::NameUnrecognized));
    }

    #[test]
    fn test_unknown_name_is_name_not_found() {
        let catalog = catalog();
        let result = recognizer(&catalog, ScriptedRecognizer::unavailable()).recognize(None, Some("Black Lotus"));
        assert_eq!(result.failure, Some(RecognitionFailure::NameNotFound));
        assert_eq!(result.name.as_deref(), Some("Black Lotus"));
        assert!(result.summary().contains("not found"));
    }

    #[test]
    fn test_verify_name() {
        let catalog = catalog();
        let recognizer = recognizer(&catalog, ScriptedRecognizer::unavailable());
        assert_eq!(recognizer.verify_name("sol ring"), "Sol Ring");
        assert_eq!(recognizer.verify_name("Sol Rin"), "Sol Ring");
        assert_eq!(recognizer.verify_name("Sol"), "Sol");
        assert_eq!(recognizer.verify_name("Nothing Like It"), "Nothing Like It");
    }

    #[test]
    fn test_all_printings_and_identify() {
        let catalog = catalog();
        let recognizer = recognizer(&catalog, ScriptedRecognizer::unavailable());

        let prints = recognizer.all_printings("sol ring").unwrap();
        let numbers: Vec<&str> = prints.iter().map(|p| p.collector_number.as_str()).collect();
        assert_eq!(numbers, vec!["7", "289", "23"]);

        assert_eq!(recognizer.identify_printing("CMR", "289").unwrap().name, "Sol Ring");
        assert!(recognizer.identify_printing("cmr", "1").is_err());
    }

    #[test]
    fn test_batch_keeps_order_and_continues_after_failure() {
        let catalog = catalog();
        let recognizer = recognizer(&catalog, ScriptedRecognizer::reading("Sol Ring", "289"));

        let results = recognizer.recognize_batch(&[blank_photo(), card_photo()]);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].failure, Some(RecognitionFailure::NoCardDetected));
        assert_eq!(results[1].method, Some(MatchMethod::CollectorNumber));
    }

    #[test]
    fn test_unfetchable_references_still_rank_by_color_and_frame() {
        // None of the Sol Ring reference images are registered
        let catalog = catalog();
        let result = recognizer(&catalog, ScriptedRecognizer::unavailable())
            .recognize(Some(&card_photo()), Some("Sol Ring"));

        assert_eq!(result.method, Some(MatchMethod::ArtworkMatch));
        assert_eq!(result.candidates.len(), 3);
        assert_eq!(catalog.image_fetch_count(), 3);
        for candidate in &result.candidates {
            assert!(candidate.components.artwork.is_none());
            assert!(candidate.components.color.is_some());
            assert!(candidate.components.frame.is_some());
        }
    }

    #[test]
    fn test_artwork_match_confidence_is_weighted_composite() {
        let catalog = catalog();
        let result = recognizer(&catalog, ScriptedRecognizer::unavailable())
            .recognize(Some(&card_photo()), Some("Sol Ring"));

        let extraction = result.extraction_confidence.unwrap();
        let top = result.candidates[0].score;
        // A supplied name counts as full name confidence
        let expected = 0.3 * extraction + 0.3 * 1.0 + 0.4 * top;
        assert!((result.confidence - expected).abs() < 1e-5, "{} vs {}", result.confidence, expected);
        assert_eq!(
            result.band,
            ConfidenceBand::from_confidence(expected, &ConfidenceConfig::default())
        );
    }

    #[test]
    fn test_artwork_match_keeps_top_ten_candidates() {
        let prints = (1..=12)
            .map(|n| {
                PrintingRecord::new("Island", &format!("s{:02}", n), &n.to_string())
                    .with_released_at(format!("20{:02}-01-01", n))
                    .with_frame(if n % 2 == 0 { "2015" } else { "1993" }, "black")
            })
            .collect();
        let catalog = MemoryCatalog::new(prints);

        let result = recognizer(&catalog, ScriptedRecognizer::unavailable())
            .recognize(Some(&card_photo()), Some("Island"));

        assert_eq!(result.method, Some(MatchMethod::ArtworkMatch));
        assert_eq!(result.candidates.len(), 10);
        assert!(result.candidates.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn test_noise_image_uses_whole_image() {
        let catalog = catalog();
        let result = recognizer(&catalog, ScriptedRecognizer::reading("", ""))
            .recognize(Some(&noise_photo()), None);

        assert_eq!(result.failure, Some(RecognitionFailure::NameUnrecognized));
        assert_eq!(result.extraction_confidence, Some(0.5));
    }

    #[test]
    fn test_set_code_finds_printing_missing_from_list() {
        // Printing known to the set lookup but not among the listed printings
        let catalog = MemoryCatalog::new(vec![
            PrintingRecord::new("Sol Ring", "lea", "7")
                .with_released_at("1993-08-05")
                .with_oracle_id("sol"),
            PrintingRecord::new("Sol Ring", "pls", "40")
                .with_released_at("1990-01-01")
                .with_oracle_id("promo"),
            PrintingRecord::new("Lightning Bolt", "pls", "41").with_oracle_id("bolt"),
        ]);

        let result = recognizer(&catalog, ScriptedRecognizer::reading_with_set("", "040", "PLS"))
            .recognize(Some(&card_photo()), Some("Sol Ring"));
        assert_eq!(result.method, Some(MatchMethod::CollectorNumber));
        assert_eq!(result.printing.as_ref().map(|p| p.set_code.as_str()), Some("pls"));
        assert!((result.confidence - 0.95).abs() < 1e-6);

        // Same set, but the number belongs to another card
        let result = recognizer(&catalog, ScriptedRecognizer::reading_with_set("", "41", "PLS"))
            .recognize(Some(&card_photo()), Some("Sol Ring"));
        assert_ne!(result.method, Some(MatchMethod::CollectorNumber));
        assert_eq!(result.name.as_deref(), Some("Sol Ring"));

        // All-zero numbers are looked up as "0", never as an empty number
        let result = recognizer(&catalog, ScriptedRecognizer::reading_with_set("", "000", "PLS"))
            .recognize(Some(&card_photo()), Some("Sol Ring"));
        assert_ne!(result.method, Some(MatchMethod::CollectorNumber));
    }

    #[test]
    fn test_recognition_resolves_name_once() {
        let catalog = catalog();
        recognizer(&catalog, ScriptedRecognizer::reading("", "289/350"))
            .recognize(Some(&card_photo()), Some("Sol Ring"));
        assert_eq!(catalog.name_lookup_count(), 1);
    }

    #[test]
    fn test_confidence_bands() {
        let config = ConfidenceConfig::default();
        assert_eq!(ConfidenceBand::from_confidence(0.95, &config), ConfidenceBand::High);
        assert_eq!(ConfidenceBand::from_confidence(0.8, &config), ConfidenceBand::High);
        assert_eq!(ConfidenceBand::from_confidence(0.5, &config), ConfidenceBand::Medium);
        assert_eq!(ConfidenceBand::from_confidence(0.49, &config), ConfidenceBand::Low);
    }

    #[test]
    fn test_result_serializes() {
        let catalog = catalog();
        let result = recognizer(&catalog, ScriptedRecognizer::unavailable()).recognize(None, Some("Sol Ring"));
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["method"], "name_only");
        assert_eq!(json["printing"]["set"], "lea");
        assert!(result.summary().starts_with("Sol Ring"));
    }
}

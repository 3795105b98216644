//! Printing similarity scoring
//!
//! Ranks the printings of one card against a captured card using three
//! weighted signals:
//! - artwork perceptual hash vs. the printing's reference image
//! - observed border color vs. the printing's color identity
//! - observed border luminance and declared frame style
//!
//! Signals without data are left out and the remaining weights renormalized.

use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use crate::catalog::{CardCatalog, CatalogError, ImageSize, PrintingRecord};
use crate::config::{AppConfig, GeometryConfig, ScoringConfig};
use crate::vision::{HashCache, NormalizedCard, PerceptualHash, RegionKind};

/// Reference border colors by color identity
const WHITE: [f32; 3] = [240.0, 230.0, 210.0];
const BLUE: [f32; 3] = [50.0, 100.0, 180.0];
const BLACK: [f32; 3] = [50.0, 50.0, 60.0];
const RED: [f32; 3] = [180.0, 70.0, 50.0];
const GREEN: [f32; 3] = [50.0, 140.0, 80.0];
const COLORLESS: [f32; 3] = [150.0, 150.0, 150.0];
const GOLD: [f32; 3] = [200.0, 170.0, 80.0];

/// Bonus for a borderless printing
const BORDERLESS_BONUS: f32 = 0.1;

/// Individual similarity signals (0.0 - 1.0), `None` when not computable
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ScoreComponents {
    pub artwork: Option<f32>,
    pub color: Option<f32>,
    pub frame: Option<f32>,
}

impl ScoreComponents {
    /// Weighted mean over the available components, in [0, 1]
    pub fn fuse(&self, config: &ScoringConfig) -> f32 {
        let weighted = [
            (self.artwork, config.artwork_weight),
            (self.color, config.color_weight),
            (self.frame, config.frame_weight),
        ];

        let (sum, total_weight) = weighted
            .iter()
            .filter_map(|(score, weight)| score.map(|s| (s.clamp(0.0, 1.0), weight.max(0.0))))
            .fold((0.0f32, 0.0f32), |(sum, total), (s, w)| (sum + s * w, total + w));

        if total_weight <= f32::EPSILON {
            return 0.0;
        }
        (sum / total_weight).clamp(0.0, 1.0)
    }
}

/// A printing with its similarity to the captured card
#[derive(Debug, Clone, Serialize)]
pub struct MatchCandidate {
    pub printing: PrintingRecord,
    pub components: ScoreComponents,
    /// Fused score (0.0 - 1.0)
    pub score: f32,
}

/// Signals measured once per captured card
struct Observation {
    artwork_hash: Option<PerceptualHash>,
    border_color: [f32; 3],
    top_luminance: f32,
}

impl Observation {
    fn of(card: &NormalizedCard) -> Self {
        Self {
            artwork_hash: PerceptualHash::of(&card.region(RegionKind::Artwork).to_image()),
            border_color: card.border_color(),
            top_luminance: card.top_edge_luminance(),
        }
    }
}

/// Scores printings of a card against a captured card
pub struct SimilarityScorer {
    catalog: Arc<dyn CardCatalog>,
    cache: Arc<HashCache>,
    scoring: ScoringConfig,
    geometry: GeometryConfig,
    image_size: ImageSize,
}

impl SimilarityScorer {
    pub fn new(catalog: Arc<dyn CardCatalog>, cache: Arc<HashCache>, config: &AppConfig) -> Self {
        Self {
            catalog,
            cache,
            scoring: config.scoring.clone(),
            geometry: config.geometry.clone(),
            image_size: config.catalog.image_size,
        }
    }

    /// Rank every printing of `name` against the card
    ///
    /// An unknown name yields an empty list.
    pub fn score(&self, card: &NormalizedCard, name: &str) -> Result<Vec<MatchCandidate>, CatalogError> {
        let prints = match self.catalog.printings(name) {
            Ok(prints) => prints,
            Err(CatalogError::NotFound(_)) => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        Ok(self.score_printings(card, &prints))
    }

    /// Rank the given printings against the card, best first
    ///
    /// Printings whose reference image cannot be fetched or decoded are scored
    /// without the artwork signal.
    pub fn score_printings(&self, card: &NormalizedCard, prints: &[PrintingRecord]) -> Vec<MatchCandidate> {
        let start = Instant::now();
        let observed = Observation::of(card);
        let mut candidates = Vec::with_capacity(prints.len());

        for printing in prints {
            let artwork = match (&observed.artwork_hash, printing.image_uri(self.image_size)) {
                (Some(hash), Some(reference)) => match self.reference_hash(reference) {
                    Ok(reference_hash) => Some(hash.similarity(&reference_hash)),
                    Err(e) => {
                        warn!("No artwork comparison for {}: {}", printing.label(), e);
                        None
                    }
                },
                _ => None,
            };

            let components = ScoreComponents {
                artwork,
                color: Some(color_score(
                    observed.border_color,
                    &printing.color_identity,
                    self.scoring.color_distance_scale,
                )),
                frame: Some(frame_score(printing, observed.top_luminance, &self.scoring)),
            };
            let score = components.fuse(&self.scoring);

            debug!(
                "{}: artwork {:?}, color {:?}, frame {:?} -> {:.3}",
                printing.label(),
                components.artwork,
                components.color,
                components.frame,
                score
            );

            candidates.push(MatchCandidate {
                printing: printing.clone(),
                components,
                score,
            });
        }

        candidates.sort_by(|a, b| b.score.total_cmp(&a.score));

        debug!("Scored {} printings in {:?}", candidates.len(), start.elapsed());
        candidates
    }

    /// Artwork hash of a reference image, fetched once per reference
    fn reference_hash(&self, reference: &str) -> Result<PerceptualHash, CatalogError> {
        if let Some(hash) = self.cache.get(reference) {
            return Ok(hash);
        }

        let bytes = self.catalog.fetch_image(reference)?;
        let decoded = image::load_from_memory(&bytes)
            .map_err(|e| CatalogError::Decode(format!("{}: {}", reference, e)))?;

        let scan = NormalizedCard::from_scan(&decoded.to_rgb8(), &self.geometry);
        let hash = PerceptualHash::of(&scan.region(RegionKind::Artwork).to_image())
            .ok_or_else(|| CatalogError::Decode(format!("{}: empty artwork", reference)))?;

        Ok(self.cache.insert_if_absent(reference, hash))
    }
}

/// Expected border color for a color identity
pub fn reference_color(identity: &[String]) -> [f32; 3] {
    match identity {
        [] => COLORLESS,
        [single] => match single.as_str() {
            "W" => WHITE,
            "U" => BLUE,
            "B" => BLACK,
            "R" => RED,
            "G" => GREEN,
            _ => COLORLESS,
        },
        _ => GOLD,
    }
}

/// Similarity of an observed border color to the identity's reference color
pub fn color_score(observed: [f32; 3], identity: &[String], distance_scale: f32) -> f32 {
    let expected = reference_color(identity);
    let distance = observed
        .iter()
        .zip(expected.iter())
        .map(|(o, e)| (o - e).powi(2))
        .sum::<f32>()
        .sqrt();
    1.0 - (distance / distance_scale.max(f32::EPSILON)).min(1.0)
}

/// Border and frame style heuristic
pub fn frame_score(printing: &PrintingRecord, top_luminance: f32, config: &ScoringConfig) -> f32 {
    let mut score: f32 = 0.5;

    match printing.border_color.as_deref() {
        Some("black") if top_luminance < config.dark_border_luminance => score += 0.25,
        Some("white") if top_luminance > config.light_border_luminance => score += 0.25,
        Some("borderless") => score += BORDERLESS_BONUS,
        _ => {}
    }

    if let Some(frame) = &printing.frame {
        if config.standard_frames.iter().any(|f| f == frame) {
            score += 0.25;
        }
    }

    score.min(1.0)
}

//! Perceptual hashing of card artwork
//!
//! DCT-based 64-bit hashes compared by Hamming distance. img_hash ships its own
//! (older) `image` crate, so pixels cross over as raw RGB buffers.

use image::RgbImage;
use img_hash::{HashAlg, HasherConfig, ImageHash};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::trace;

/// Hash side length in bits (8x8 = 64-bit hash)
const HASH_SIDE: u32 = 8;

/// Perceptual hash of an image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PerceptualHash(ImageHash);

impl PerceptualHash {
    /// Hash an RGB image
    ///
    /// Returns `None` for empty images.
    pub fn of(image: &RgbImage) -> Option<Self> {
        let (width, height) = image.dimensions();
        let buffer = img_hash::image::RgbImage::from_raw(width, height, image.as_raw().clone())?;
        if width == 0 || height == 0 {
            return None;
        }
        let dynamic = img_hash::image::DynamicImage::ImageRgb8(buffer);

        let hasher = HasherConfig::new()
            .hash_alg(HashAlg::Mean)
            .preproc_dct()
            .hash_size(HASH_SIDE, HASH_SIDE)
            .to_hasher();

        Some(Self(hasher.hash_image(&dynamic)))
    }

    /// Number of bits in the hash
    pub fn bits(&self) -> u32 {
        (self.0.as_bytes().len() * 8) as u32
    }

    /// Hamming distance to another hash
    pub fn distance(&self, other: &PerceptualHash) -> u32 {
        self.0.dist(&other.0)
    }

    /// Similarity in 0.0 - 1.0 (1.0 = identical)
    pub fn similarity(&self, other: &PerceptualHash) -> f32 {
        let bits = self.bits().max(other.bits()).max(1) as f32;
        (1.0 - self.distance(other) as f32 / bits).clamp(0.0, 1.0)
    }
}

/// Shared cache of reference-image hashes keyed by image reference
///
/// Entries are write-once: concurrent inserts for the same key keep the first.
#[derive(Debug, Default)]
pub struct HashCache {
    entries: RwLock<HashMap<String, PerceptualHash>>,
}

impl HashCache {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn get(&self, key: &str) -> Option<PerceptualHash> {
        self.entries.read().get(key).cloned()
    }

    /// Store a hash unless one is already present; returns the stored hash
    pub fn insert_if_absent(&self, key: &str, hash: PerceptualHash) -> PerceptualHash {
        let mut entries = self.entries.write();
        let stored = entries.entry(key.to_string()).or_insert(hash).clone();
        trace!("Hash cache now holds {} entries", entries.len());
        stored
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

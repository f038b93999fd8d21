use crate::core::error::ConfigError;
use crate::core::hash::{
    Fingerprint, FrameHasher, HashAlgorithm, DEFAULT_HASH_SIZE, MAX_HASH_SIZE,
};

/// Duplicate detection knobs.
#[derive(Debug, Clone, PartialEq)]
pub struct DedupConfig {
    /// Similarity at or above which a frame is dropped, in (0, 1].
    pub threshold: f64,
    /// Edge length of the square the fingerprint is computed from.
    pub hash_size: u32,
    pub algorithm: HashAlgorithm,
}

impl DedupConfig {
    pub fn new(
        threshold: f64,
        hash_size: u32,
        algorithm: HashAlgorithm,
    ) -> Result<Self, ConfigError> {
        let config = Self {
            threshold,
            hash_size,
            algorithm,
        };
        config.validate()?;
        Ok(config)
    }

    /// Average hash at the default size, just a threshold to pick.
    pub fn with_threshold(threshold: f64) -> Result<Self, ConfigError> {
        Self::new(threshold, DEFAULT_HASH_SIZE, HashAlgorithm::Average)
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if !(self.threshold > 0.0 && self.threshold <= 1.0) {
            return Err(ConfigError::BadThreshold(self.threshold));
        }
        if self.hash_size == 0 || self.hash_size > MAX_HASH_SIZE {
            return Err(ConfigError::BadHashSize(self.hash_size));
        }
        // 1 is a power of two and passes; the Haar cascade then reduces
        // the frame to a single-bit hash
        if self.algorithm == HashAlgorithm::Wavelet && !self.hash_size.is_power_of_two() {
            return Err(ConfigError::WaveletHashSize(self.hash_size));
        }
        Ok(())
    }
}

/// What a candidate frame collided with.
#[derive(Debug, Clone, Copy)]
pub struct DuplicateMatch {
    /// Index of the already kept frame.
    pub of_index: u64,
    pub similarity: f64,
}

/// Window-based duplicate detector. Every kept frame's fingerprint is
/// remembered for the rest of the video; a candidate matching any of
/// them is dropped.
pub struct SimilarityDetector {
    hasher: FrameHasher,
    threshold: f64,
    window: Vec<Fingerprint>,
}

impl SimilarityDetector {
    pub fn new(config: &DedupConfig) -> Self {
        Self {
            hasher: FrameHasher::new(config.algorithm, config.hash_size),
            threshold: config.threshold,
            window: Vec::new(),
        }
    }

    pub fn fingerprint(&self, index: u64, width: u32, height: u32, rgba: &[u8]) -> Fingerprint {
        self.hasher.fingerprint(index, width, height, rgba)
    }

    /// Closest window entry at or above the threshold, if any.
    pub fn check(&self, candidate: &Fingerprint) -> Option<DuplicateMatch> {
        let mut best: Option<DuplicateMatch> = None;
        for kept in &self.window {
            let similarity = candidate.similarity(kept);
            if similarity < self.threshold {
                continue;
            }
            if best.map_or(true, |b| similarity > b.similarity) {
                best = Some(DuplicateMatch {
                    of_index: kept.index,
                    similarity,
                });
            }
        }
        best
    }

    /// Remembers a kept frame. Only accepted frames land here, so a
    /// rejected candidate never shadows later ones.
    pub fn record(&mut self, fingerprint: Fingerprint) {
        self.window.push(fingerprint);
    }

    pub fn window_len(&self) -> usize {
        self.window.len()
    }

    /// Forget everything, ready for the next video.
    pub fn clear(&mut self) {
        self.window.clear();
    }
}

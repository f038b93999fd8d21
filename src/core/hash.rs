use std::sync::Arc;

use image::imageops::FilterType;
use rustdct::{DctPlanner, TransformType2And3};

use crate::core::frame::raster_view;

/// Upper bound on the fingerprint edge length.
pub const MAX_HASH_SIZE: u32 = 1024;

/// Default fingerprint edge length, 64 bits total.
pub const DEFAULT_HASH_SIZE: u32 = 8;

/// Factor between the hash edge and the square the DCT and wavelet
/// variants are computed from.
const DETAIL_SCALE: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    /// Threshold every pixel of the downscaled image against its mean.
    Average,
    /// Threshold the low-frequency DCT block against its median.
    Perceptual,
    /// Compare horizontally adjacent pixels of the downscaled image.
    Difference,
    /// Threshold the Haar low-pass band against its median.
    Wavelet,
}

impl HashAlgorithm {
    pub fn name(&self) -> &'static str {
        match self {
            HashAlgorithm::Average => "average",
            HashAlgorithm::Perceptual => "perceptual",
            HashAlgorithm::Difference => "difference",
            HashAlgorithm::Wavelet => "wavelet",
        }
    }
}

/// Packed perceptual hash of one frame, `hash_size * hash_size` bits.
#[derive(Debug, Clone)]
pub struct Fingerprint {
    /// Frame the fingerprint was computed from.
    pub index: u64,
    bit_len: u32,
    words: Vec<u64>,
}

impl Fingerprint {
    pub fn from_bits(index: u64, bits: impl IntoIterator<Item = bool>) -> Self {
        let mut words = Vec::new();
        let mut bit_len = 0u32;
        for bit in bits {
            if bit_len % 64 == 0 {
                words.push(0u64);
            }
            if bit {
                let last = words.len() - 1;
                words[last] |= 1 << (bit_len % 64);
            }
            bit_len += 1;
        }
        Self {
            index,
            bit_len,
            words,
        }
    }

    pub fn bit_len(&self) -> u32 {
        self.bit_len
    }

    pub fn count_ones(&self) -> u32 {
        self.words.iter().map(|w| w.count_ones()).sum()
    }

    /// Number of differing bits. Only meaningful between fingerprints
    /// built with the same algorithm and hash size.
    pub fn hamming(&self, other: &Fingerprint) -> u32 {
        debug_assert_eq!(self.bit_len, other.bit_len);
        self.words
            .iter()
            .zip(other.words.iter())
            .map(|(a, b)| (a ^ b).count_ones())
            .sum()
    }

    /// `1 - hamming / bits`, so identical fingerprints score 1.0.
    pub fn similarity(&self, other: &Fingerprint) -> f64 {
        1.0 - self.hamming(other) as f64 / self.bit_len as f64
    }
}

/// Computes frame fingerprints with one of the four supported
/// algorithms. The DCT plan for the perceptual variant is prepared once
/// here and reused for every frame.
pub struct FrameHasher {
    algorithm: HashAlgorithm,
    hash_size: u32,
    dct: Option<Arc<dyn TransformType2And3<f32>>>,
}

impl FrameHasher {
    pub fn new(algorithm: HashAlgorithm, hash_size: u32) -> Self {
        let dct = match algorithm {
            HashAlgorithm::Perceptual => {
                let len = (hash_size * DETAIL_SCALE) as usize;
                Some(DctPlanner::new().plan_dct2(len))
            }
            _ => None,
        };
        Self {
            algorithm,
            hash_size,
            dct,
        }
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    pub fn hash_size(&self) -> u32 {
        self.hash_size
    }

    /// Fingerprint of an RGBA raster. The raster is downscaled here, so
    /// callers pass the frame at whatever size it is going to be stored.
    pub fn fingerprint(&self, index: u64, width: u32, height: u32, rgba: &[u8]) -> Fingerprint {
        let size = self.hash_size;
        match self.algorithm {
            HashAlgorithm::Average => {
                let gray = gray_resize(width, height, rgba, size, size);
                let mean =
                    gray.iter().map(|&v| v as u64).sum::<u64>() as f64 / gray.len() as f64;
                Fingerprint::from_bits(index, gray.iter().map(|&v| v as f64 > mean))
            }
            HashAlgorithm::Difference => {
                let cols = (size + 1) as usize;
                let gray = gray_resize(width, height, rgba, size + 1, size);
                let mut bits = Vec::with_capacity((size * size) as usize);
                for row in gray.chunks_exact(cols) {
                    for x in 0..size as usize {
                        bits.push(row[x + 1] > row[x]);
                    }
                }
                Fingerprint::from_bits(index, bits)
            }
            HashAlgorithm::Perceptual => self.perceptual(index, width, height, rgba),
            HashAlgorithm::Wavelet => self.wavelet(index, width, height, rgba),
        }
    }

    fn perceptual(&self, index: u64, width: u32, height: u32, rgba: &[u8]) -> Fingerprint {
        let size = self.hash_size as usize;
        let detail = size * DETAIL_SCALE as usize;
        let mut plane: Vec<f32> =
            gray_resize(width, height, rgba, detail as u32, detail as u32)
                .iter()
                .map(|&v| v as f32)
                .collect();

        // separable 2-D DCT-II: rows first, then columns
        let dct = self
            .dct
            .as_ref()
            .expect("DCT plan exists for the perceptual algorithm");
        for row in plane.chunks_exact_mut(detail) {
            dct.process_dct2(row);
        }
        let mut column = vec![0f32; detail];
        for x in 0..detail {
            for y in 0..detail {
                column[y] = plane[y * detail + x];
            }
            dct.process_dct2(&mut column);
            for y in 0..detail {
                plane[y * detail + x] = column[y];
            }
        }

        let mut block = Vec::with_capacity(size * size);
        for y in 0..size {
            for x in 0..size {
                block.push(plane[y * detail + x]);
            }
        }
        let mut sorted = block.clone();
        let cut = median(&mut sorted);
        Fingerprint::from_bits(index, block.iter().map(|&v| v > cut))
    }

    fn wavelet(&self, index: u64, width: u32, height: u32, rgba: &[u8]) -> Fingerprint {
        let size = self.hash_size as usize;
        let detail = size * DETAIL_SCALE as usize;
        let mut plane: Vec<f32> =
            gray_resize(width, height, rgba, detail as u32, detail as u32)
                .iter()
                .map(|&v| v as f32)
                .collect();

        // remove the DC component so the low-pass band keeps contrast
        let mean = plane.iter().sum::<f32>() / plane.len() as f32;
        for v in plane.iter_mut() {
            *v -= mean;
        }

        let mut edge = detail;
        while edge > size {
            plane = haar_low_band(&plane, edge);
            edge /= 2;
        }

        let mut sorted = plane.clone();
        let cut = median(&mut sorted);
        Fingerprint::from_bits(index, plane.iter().map(|&v| v > cut))
    }
}

/// One Haar decomposition step, keeping only the low-pass band.
fn haar_low_band(plane: &[f32], edge: usize) -> Vec<f32> {
    let half = edge / 2;
    let mut out = vec![0f32; half * half];
    for y in 0..half {
        for x in 0..half {
            let a = plane[(2 * y) * edge + 2 * x];
            let b = plane[(2 * y) * edge + 2 * x + 1];
            let c = plane[(2 * y + 1) * edge + 2 * x];
            let d = plane[(2 * y + 1) * edge + 2 * x + 1];
            out[y * half + x] = (a + b + c + d) * 0.5;
        }
    }
    out
}

/// Downscale to the target size and collapse to one luma byte per pixel.
fn gray_resize(width: u32, height: u32, rgba: &[u8], target_w: u32, target_h: u32) -> Vec<u8> {
    let view = raster_view(width, height, rgba);
    let resized = image::imageops::resize(&view, target_w, target_h, FilterType::Triangle);
    resized
        .as_raw()
        .chunks_exact(4)
        .map(|px| ((px[0] as u32 * 299 + px[1] as u32 * 587 + px[2] as u32 * 114) / 1000) as u8)
        .collect()
}

fn median(values: &mut [f32]) -> f32 {
    values.sort_unstable_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

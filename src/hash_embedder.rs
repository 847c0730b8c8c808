//! Feature-hashing embedding backend.
//!
//! Each token is hashed with BLAKE2b (8-byte digest) into one of `dim`
//! buckets and counted.
//! The count vector is L2-normalized so a dot product between two vectors is
//! their cosine similarity. No model, no network, bit-for-bit reproducible.

use blake2::{Blake2b, Digest, digest::consts::U8};

use crate::text_util::tokenize;

/// BLAKE2b parameterized for a 64-bit digest.
type Blake2b64 = Blake2b<U8>;

/// Discriminator persisted in the index metadata for this backend.
pub const HASH_BACKEND: &str = "hash";

/// Default vector dimension.
pub const DEFAULT_HASH_DIM: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashEmbedder {
    dim: usize,
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_HASH_DIM)
    }
}

impl HashEmbedder {
    /// `dim` is clamped to at least 1.
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(1) }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// One vector per input text, each of length [`dim`](Self::dim).
    pub fn encode(&self, texts: &[String]) -> Vec<Vec<f32>> {
        texts.iter().map(|text| hash_vector(text, self.dim)).collect()
    }
}

/// Bucket index for a single token: the 64-bit digest read big-endian,
/// modulo `dim`.
fn bucket(token: &str, dim: usize) -> usize {
    let digest = Blake2b64::digest(token.as_bytes());
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&digest);
    (u64::from_be_bytes(raw) % dim as u64) as usize
}

/// Embed `text` into a normalized bag-of-hashed-tokens vector.
///
/// Text without tokens maps to the all-zero vector.
///
/// # Examples
///
/// ```
/// use arxiv_brain::hash_embedder::hash_vector;
///
/// let v = hash_vector("attention is all you need", 256);
/// let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
/// assert!((norm - 1.0).abs() < 1e-5);
///
/// assert!(hash_vector("?!", 256).iter().all(|&x| x == 0.0));
/// ```
pub fn hash_vector(text: &str, dim: usize) -> Vec<f32> {
    let dim = dim.max(1);
    let mut vector = vec![0.0f32; dim];

    for token in tokenize(text) {
        vector[bucket(&token, dim)] += 1.0;
    }

    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in &mut vector {
            *x /= norm;
        }
    }
    vector
}

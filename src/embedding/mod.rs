//! Deterministic text embeddings
//!
//! Bag-of-words bucket hashing: tokens are hashed into a fixed-dimension
//! vector of term counts and L2-normalised. Deterministic for identical
//! input and configuration, which keeps ranking reproducible in tests.
//! Any learned model satisfying the same contract can be substituted.

use std::hash::Hasher;
use twox_hash::XxHash64;

/// Default embedding dimension
pub const DEFAULT_DIM: usize = 256;

/// Default hashing seed
pub const DEFAULT_SEED: u64 = 1337;

/// Text-to-vector contract. Must be deterministic: same texts and same
/// provider configuration always produce the same vectors.
pub trait Embeddings: Send + Sync {
    /// Embed `texts` into vectors of a fixed dimension, one per input.
    fn embed(&self, texts: &[&str]) -> Vec<Vec<f32>>;

    /// Dimension of every vector this provider produces
    fn dim(&self) -> usize;
}

/// Seeded bucket-hash embeddings
#[derive(Debug, Clone)]
pub struct HashedEmbeddings {
    dim: usize,
    seed: u64,
}

impl HashedEmbeddings {
    /// Create a provider with explicit dimension and seed
    pub fn new(dim: usize, seed: u64) -> Self {
        Self { dim, seed }
    }

    fn bucket(&self, token: &str) -> usize {
        let mut hasher = XxHash64::with_seed(self.seed);
        hasher.write(token.as_bytes());
        (hasher.finish() % self.dim as u64) as usize
    }
}

impl Default for HashedEmbeddings {
    fn default() -> Self {
        Self::new(DEFAULT_DIM, DEFAULT_SEED)
    }
}

impl Embeddings for HashedEmbeddings {
    fn embed(&self, texts: &[&str]) -> Vec<Vec<f32>> {
        texts
            .iter()
            .map(|text| {
                let mut vec = vec![0.0f32; self.dim];
                for token in text.to_lowercase().split_whitespace() {
                    vec[self.bucket(token)] += 1.0;
                }
                // Whitespace-only input stays the zero vector rather than
                // dividing by zero.
                let norm: f32 = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
                if norm > 0.0 {
                    for v in vec.iter_mut() {
                        *v /= norm;
                    }
                }
                vec
            })
            .collect()
    }

    fn dim(&self) -> usize {
        self.dim
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;

    fn l2_norm(v: &[f32]) -> f32 {
        v.iter().map(|x| x * x).sum::<f32>().sqrt()
    }

    #[test]
    fn test_embed_is_deterministic() {
        let emb = HashedEmbeddings::default();
        let a = emb.embed(&["drip irrigation for tomato"]);
        let b = emb.embed(&["drip irrigation for tomato"]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_embed_returns_one_vector_per_text() {
        let emb = HashedEmbeddings::new(64, 7);
        let out = emb.embed(&["one", "two", "three"]);
        assert_eq!(out.len(), 3);
        for v in &out {
            assert_eq!(v.len(), 64);
        }
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let emb = HashedEmbeddings::default();
        let out = emb.embed(&["   "]);
        assert!(out[0].iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_case_insensitive_tokens() {
        let emb = HashedEmbeddings::default();
        let a = emb.embed(&["Tomato Mulch"]);
        let b = emb.embed(&["tomato mulch"]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_different_seeds_differ() {
        let a = HashedEmbeddings::new(64, 1).embed(&["tomato mulch irrigation"]);
        let b = HashedEmbeddings::new(64, 2).embed(&["tomato mulch irrigation"]);
        assert_ne!(a, b);
    }

    #[quickcheck]
    fn prop_norm_is_one_or_zero(text: String) -> bool {
        let emb = HashedEmbeddings::new(64, 42);
        let v = &emb.embed(&[text.as_str()])[0];
        let norm = l2_norm(v);
        if text.split_whitespace().next().is_none() {
            norm == 0.0
        } else {
            (norm - 1.0).abs() < 1e-4
        }
    }
}

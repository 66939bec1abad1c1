//! Text embedders
//!
//! `Embedder` is the seam the knowledge base embeds through. The bundled
//! `HtpEmbedder` implements Harmonic Token Projection:
//! "Harmonic Token Projection: A Vocabulary-Free, Training-Free,
//!  Deterministic, and Reversible Embedding Methodology"
//! https://arxiv.org/html/2511.20665
//!
//! - No neural network or model file
//! - Deterministic (same input → same output)
//! - Unicode-aware tokenization

use std::f64::consts::PI;

use crate::core::error::{KbError, Result};

/// Default embedding dimension (2 × number of moduli)
pub const EMBEDDING_DIM: usize = 384;

/// Maximum token length in code points
const MAX_TOKEN_LENGTH: usize = 64;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Produces fixed-length vectors from text.
///
/// Implementations must be deterministic and keep one dimension for their
/// whole lifetime.
pub trait Embedder: Send + Sync {
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    fn dimension(&self) -> usize;
}

/// Harmonic Token Projection embedder
pub struct HtpEmbedder {
    moduli: Vec<u64>,
}

impl HtpEmbedder {
    pub fn new() -> Self {
        Self {
            moduli: first_primes(EMBEDDING_DIM / 2),
        }
    }

    /// Embedder with a custom (even, non-zero) dimension
    pub fn with_dimension(dimension: usize) -> Result<Self> {
        if dimension == 0 || dimension % 2 != 0 {
            return Err(KbError::Config(format!(
                "embedding dimension must be even and non-zero, got {}",
                dimension
            )));
        }
        Ok(Self {
            moduli: first_primes(dimension / 2),
        })
    }

    /// Project one token onto the unit circle of every modulus
    fn embed_token(&self, token: &str, acc: &mut [f64]) {
        let n = token_to_integer(token);
        for (i, &m) in self.moduli.iter().enumerate() {
            let theta = 2.0 * PI * ((n % m) as f64) / (m as f64);
            acc[2 * i] += theta.sin();
            acc[2 * i + 1] += theta.cos();
        }
    }
}

impl Default for HtpEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

impl Embedder for HtpEmbedder {
    /// Mean-pool token projections, then L2 normalize.
    ///
    /// Text without tokens embeds to the zero vector.
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let dim = self.dimension();
        let tokens = tokenize(text);
        if tokens.is_empty() {
            return Ok(vec![0.0; dim]);
        }

        let mut acc = vec![0.0f64; dim];
        for token in &tokens {
            self.embed_token(token, &mut acc);
        }

        let count = tokens.len() as f64;
        acc.iter_mut().for_each(|v| *v /= count);

        let norm = acc.iter().map(|x| x * x).sum::<f64>().sqrt();
        let scale = if norm > 0.0 { norm } else { 1.0 };
        Ok(acc.iter().map(|x| (x / scale) as f32).collect())
    }

    fn dimension(&self) -> usize {
        self.moduli.len() * 2
    }
}

/// Split on whitespace and punctuation, lowercase
fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| c.is_whitespace() || c.is_ascii_punctuation())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_lowercase())
        .collect()
}

/// FNV-1a over the token's code points
fn token_to_integer(token: &str) -> u64 {
    token
        .chars()
        .take(MAX_TOKEN_LENGTH)
        .fold(FNV_OFFSET, |hash, c| (hash ^ c as u64).wrapping_mul(FNV_PRIME))
}

/// First `count` primes; pairwise coprime moduli
fn first_primes(count: usize) -> Vec<u64> {
    let mut primes: Vec<u64> = Vec::with_capacity(count);
    let mut candidate = 2u64;
    while primes.len() < count {
        if primes
            .iter()
            .take_while(|&&p| p * p <= candidate)
            .all(|&p| candidate % p != 0)
        {
            primes.push(candidate);
        }
        candidate += 1;
    }
    primes
}

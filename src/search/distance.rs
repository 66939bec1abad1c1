//! Distance metrics and the distance → similarity transform
//!
//! Indexes report raw distances (smaller is closer). Scores shown to callers
//! are similarities in (0, 1], derived from the metric the index uses.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// Squared Euclidean distance
    #[default]
    L2,
    /// `1 - cos(a, b)`, in [0, 2]
    Cosine,
    /// `1 - a·b`; negative for unnormalized vectors pointing the same way
    InnerProduct,
}

impl DistanceMetric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::L2 => "l2",
            Self::Cosine => "cosine",
            Self::InnerProduct => "inner_product",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "l2" => Some(Self::L2),
            "cosine" => Some(Self::Cosine),
            "inner_product" | "ip" => Some(Self::InnerProduct),
            _ => None,
        }
    }

    /// Raw distance between two vectors of equal length
    pub fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Self::L2 => a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum(),
            Self::Cosine => (1.0 - cosine_similarity(a, b)).max(0.0),
            Self::InnerProduct => 1.0 - dot(a, b),
        }
    }

    /// Map a raw distance to a similarity score in (0, 1].
    ///
    /// `1 / (1 + d)` for every metric; strictly decreasing in `d`. Negative
    /// inner-product distances saturate at 1.
    pub fn similarity(&self, distance: f32) -> f32 {
        // L2 and cosine distances are never negative; the clamp only bites
        // for inner product.
        1.0 / (1.0 + distance.max(0.0))
    }
}

impl std::fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Cosine similarity, 0.0 when either vector is zero or lengths differ
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a > 0.0 && norm_b > 0.0 {
        dot(a, b) / (norm_a * norm_b)
    } else {
        0.0
    }
}

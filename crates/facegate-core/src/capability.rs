//! Face detection / embedding capability consumed by the pipelines.

use serde::{Deserialize, Serialize};

use crate::error::CapabilityError;
use crate::types::{Embedding, FaceBox, Image};

/// Detector variant: accuracy-optimized or speed-optimized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectorModel {
    #[default]
    #[serde(alias = "cnn")]
    Accurate,
    #[serde(alias = "hog")]
    Fast,
}

/// Per-call detector settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectOptions {
    pub model: DetectorModel,
    /// Upsampling factor; higher finds smaller faces at a higher cost.
    pub upsample: u32,
}

/// Strategy for locating faces, embedding them and comparing embeddings.
///
/// Implementations are blocking and CPU-bound.
pub trait FaceCapability {
    /// Detect faces, returning boxes in detector order.
    fn detect(&self, image: &Image, options: &DetectOptions) -> Result<Vec<FaceBox>, CapabilityError>;

    /// Compute one embedding per box, in the same order as `boxes`.
    fn encode(&self, image: &Image, boxes: &[FaceBox], jitter: u32) -> Result<Vec<Embedding>, CapabilityError>;

    /// Distance from the candidate to every reference embedding. Lower = more similar.
    fn distance(&self, reference: &[Embedding], candidate: &Embedding) -> Vec<f32> {
        reference.iter().map(|r| r.euclidean_distance(candidate)).collect()
    }
}

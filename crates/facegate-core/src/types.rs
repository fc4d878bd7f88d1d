use serde::{Deserialize, Serialize};

/// Decoded 3-channel image handed to the face capability.
pub type Image = image::RgbImage;

/// Detector-native face box, inclusive pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceBox {
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
    pub left: u32,
}

impl FaceBox {
    pub fn width(&self) -> u32 {
        self.right.saturating_sub(self.left).saturating_add(1)
    }

    pub fn height(&self) -> u32 {
        self.bottom.saturating_sub(self.top).saturating_add(1)
    }
}

/// Face position as reported to callers: top-left corner plus size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceLocation {
    pub top: u32,
    pub left: u32,
    pub width: u32,
    pub height: u32,
}

impl From<FaceBox> for FaceLocation {
    fn from(b: FaceBox) -> Self {
        Self {
            top: b.top,
            left: b.left,
            width: b.width(),
            height: b.height(),
        }
    }
}

/// Caller-supplied locations may overflow `u32`; edges saturate at `u32::MAX`.
impl From<FaceLocation> for FaceBox {
    fn from(loc: FaceLocation) -> Self {
        Self {
            top: loc.top,
            right: loc.left.saturating_add(loc.width).saturating_sub(1),
            bottom: loc.top.saturating_add(loc.height).saturating_sub(1),
            left: loc.left,
        }
    }
}

/// Face embedding vector produced by the capability for one face box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Embedding {
    pub values: Vec<f32>,
}

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    /// Compute Euclidean distance between two embeddings.
    ///
    /// Dimensions beyond the shorter vector are ignored.
    pub fn euclidean_distance(&self, other: &Embedding) -> f32 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt()
    }

    /// Scale to unit L2 norm. Zero vectors are left untouched.
    pub fn normalized(mut self) -> Self {
        let norm: f32 = self.values.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in self.values.iter_mut() {
                *v /= norm;
            }
        }
        self
    }
}

/// Identity of a provider instance, stamped on the validation data it emits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderIdentity {
    pub id: String,
    pub acronym: String,
    pub version: String,
}

/// Face data recorded on a sample by an earlier validation pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleValidation {
    pub provider: ProviderIdentity,
    pub face_location: FaceLocation,
}

/// One enrolment image plus metadata, attached to a learner.
///
/// `data` is either a `data:<mime>;base64,<payload>` URL or bare base64.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub id: String,
    pub learner_id: String,
    pub data: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub validations: Vec<SampleValidation>,
}

/// Verification candidate. Same shape as a [`Sample`], never accumulated.
pub type Request = Sample;

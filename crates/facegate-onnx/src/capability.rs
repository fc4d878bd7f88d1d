//! [`FaceCapability`] backed by SCRFD detection and ArcFace embeddings.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use facegate_core::{CapabilityError, DetectOptions, DetectorModel, Embedding, FaceBox, FaceCapability, Image};
use rand::rngs::StdRng;
use rand::SeedableRng;
use thiserror::Error;

use crate::alignment::{self, Landmarks};
use crate::detector::{self, Detection, DetectorError, FaceDetector};
use crate::recognizer::{FaceRecognizer, RecognizerError};

pub const ACCURATE_DETECTOR_FILE: &str = "det_10g.onnx";
pub const FAST_DETECTOR_FILE: &str = "det_500m.onnx";
pub const RECOGNIZER_FILE: &str = "w600k_r50.onnx";

/// Upsample factor used when re-detecting to recover landmarks for given boxes.
const LANDMARK_UPSAMPLE: u32 = 1;
/// Minimum overlap for a re-detected face to lend its landmarks to a box.
const LANDMARK_MATCH_IOU: f32 = 0.5;
/// Fixed seed so jittered encodings are reproducible across runs.
const JITTER_SEED: u64 = 0x5eed_face;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("detector: {0}")]
    Detector(#[from] DetectorError),
    #[error("recognizer: {0}")]
    Recognizer(#[from] RecognizerError),
}

/// Default model directory: `$XDG_DATA_HOME/facegate/models`.
pub fn default_model_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("facegate")
        .join("models")
}

pub struct OnnxFaceCapability {
    accurate: Mutex<FaceDetector>,
    /// Speed-optimized detector; `None` falls back to the accurate one.
    fast: Option<Mutex<FaceDetector>>,
    recognizer: Mutex<FaceRecognizer>,
}

impl OnnxFaceCapability {
    /// Load all models from `model_dir`. The fast detector is optional.
    pub fn load(model_dir: &Path) -> Result<Self, LoadError> {
        let accurate = FaceDetector::load(&model_dir.join(ACCURATE_DETECTOR_FILE))?;
        let fast = match FaceDetector::load(&model_dir.join(FAST_DETECTOR_FILE)) {
            Ok(d) => Some(Mutex::new(d)),
            Err(DetectorError::ModelNotFound(path)) => {
                tracing::warn!(%path, "fast detector missing, using accurate detector for both modes");
                None
            }
            Err(e) => return Err(e.into()),
        };
        let recognizer = FaceRecognizer::load(&model_dir.join(RECOGNIZER_FILE))?;

        Ok(Self {
            accurate: Mutex::new(accurate),
            fast,
            recognizer: Mutex::new(recognizer),
        })
    }

    fn detector_for(&self, model: DetectorModel) -> &Mutex<FaceDetector> {
        match (model, &self.fast) {
            (DetectorModel::Fast, Some(fast)) => fast,
            _ => &self.accurate,
        }
    }

    fn run_detector(
        &self,
        model: DetectorModel,
        image: &Image,
        upsample: u32,
    ) -> Result<Vec<Detection>, CapabilityError> {
        let mut detector = self
            .detector_for(model)
            .lock()
            .map_err(|_| CapabilityError::Unavailable("detector lock poisoned".into()))?;
        detector
            .detect(image, detector::input_size_for(upsample))
            .map_err(|e| CapabilityError::Detection(e.to_string()))
    }

    /// Landmarks for each box: from the best-overlapping re-detection, or canonical.
    fn landmarks_for(&self, image: &Image, boxes: &[FaceBox]) -> Result<Vec<Landmarks>, CapabilityError> {
        let detections = self.run_detector(DetectorModel::Accurate, image, LANDMARK_UPSAMPLE)?;
        let (width, height) = image.dimensions();

        Ok(boxes
            .iter()
            .map(|face| {
                detections
                    .iter()
                    .filter_map(|d| {
                        let lms = d.landmarks?;
                        let found = d.to_face_box(width, height)?;
                        Some((box_iou(face, &found), lms))
                    })
                    .filter(|(overlap, _)| *overlap >= LANDMARK_MATCH_IOU)
                    .max_by(|a, b| a.0.total_cmp(&b.0))
                    .map(|(_, lms)| lms)
                    .unwrap_or_else(|| {
                        tracing::debug!(?face, "no matching detection, using box landmarks");
                        alignment::box_landmarks(face)
                    })
            })
            .collect())
    }
}

impl FaceCapability for OnnxFaceCapability {
    fn detect(&self, image: &Image, options: &DetectOptions) -> Result<Vec<FaceBox>, CapabilityError> {
        let (width, height) = image.dimensions();
        let detections = self.run_detector(options.model, image, options.upsample)?;
        Ok(detections
            .iter()
            .filter_map(|d| d.to_face_box(width, height))
            .collect())
    }

    fn encode(&self, image: &Image, boxes: &[FaceBox], jitter: u32) -> Result<Vec<Embedding>, CapabilityError> {
        if boxes.is_empty() {
            return Ok(Vec::new());
        }
        let landmarks = self.landmarks_for(image, boxes)?;
        let passes = jitter.max(1);

        let mut recognizer = self
            .recognizer
            .lock()
            .map_err(|_| CapabilityError::Unavailable("recognizer lock poisoned".into()))?;

        let mut encodings = Vec::with_capacity(boxes.len());
        for (face, lms) in boxes.iter().zip(landmarks.iter()) {
            let mut rng = StdRng::seed_from_u64(JITTER_SEED);
            let mut sum: Vec<f32> = Vec::new();

            for pass in 0..passes {
                let pass_lms = if pass == 0 {
                    *lms
                } else {
                    alignment::jitter_landmarks(lms, face.width() as f32, &mut rng)
                };
                let aligned = alignment::align_face(image, &pass_lms);
                let emb = recognizer
                    .extract(&aligned)
                    .map_err(|e| CapabilityError::Encoding(e.to_string()))?;

                if sum.is_empty() {
                    sum = emb.values;
                } else {
                    for (s, v) in sum.iter_mut().zip(emb.values.iter()) {
                        *s += v;
                    }
                }
            }

            encodings.push(Embedding::new(sum).normalized());
        }

        tracing::debug!(faces = boxes.len(), passes, "encoded faces");
        Ok(encodings)
    }
}

/// Intersection-over-Union of two inclusive integer boxes.
fn box_iou(a: &FaceBox, b: &FaceBox) -> f32 {
    let left = a.left.max(b.left);
    let top = a.top.max(b.top);
    let right = a.right.min(b.right);
    let bottom = a.bottom.min(b.bottom);
    let inter = if right >= left && bottom >= top {
        (right - left + 1) as f32 * (bottom - top + 1) as f32
    } else {
        0.0
    };
    let area = |f: &FaceBox| f.width() as f32 * f.height() as f32;
    let union = area(a) + area(b) - inter;
    if union > 0.0 {
        inter / union
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_box_iou_identical() {
        let a = FaceBox { top: 10, right: 29, bottom: 29, left: 10 };
        assert!((box_iou(&a, &a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_box_iou_disjoint() {
        let a = FaceBox { top: 0, right: 9, bottom: 9, left: 0 };
        let b = FaceBox { top: 20, right: 29, bottom: 29, left: 20 };
        assert_eq!(box_iou(&a, &b), 0.0);
    }

    #[test]
    fn test_box_iou_half_overlap() {
        // 10×10 boxes sharing a 5×10 strip: 50 / 150.
        let a = FaceBox { top: 0, right: 9, bottom: 9, left: 0 };
        let b = FaceBox { top: 0, right: 14, bottom: 9, left: 5 };
        assert!((box_iou(&a, &b) - 50.0 / 150.0).abs() < 1e-6);
    }

    #[test]
    fn test_load_missing_models() {
        let err = OnnxFaceCapability::load(Path::new("/nonexistent/facegate-models"))
            .err()
            .unwrap();
        assert!(matches!(err, LoadError::Detector(DetectorError::ModelNotFound(_))));
    }

    #[test]
    fn test_default_model_dir_suffix() {
        assert!(default_model_dir().ends_with("facegate/models"));
    }
}

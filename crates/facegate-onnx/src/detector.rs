//! SCRFD face detector via ONNX Runtime.
//!
//! Implements the SCRFD (Sample and Computation Redistribution for Efficient Face
//! Detection) model with 3-stride anchor-free decoding and NMS post-processing.
//! The letterbox input side is chosen per call so the caller can trade recall
//! for speed.

use facegate_core::{FaceBox, Image};
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

use crate::alignment::Landmarks;

const SCRFD_MEAN: f32 = 127.5;
const SCRFD_STD: f32 = 128.0;
const SCRFD_CONFIDENCE_THRESHOLD: f32 = 0.5;
const SCRFD_NMS_THRESHOLD: f32 = 0.4;
const SCRFD_STRIDES: [usize; 3] = [8, 16, 32];
const SCRFD_ANCHORS_PER_CELL: usize = 2;

/// Letterbox side for upsample factor 0. Each extra step doubles it.
const SCRFD_BASE_INPUT_SIZE: usize = 320;
const SCRFD_MAX_UPSAMPLE: u32 = 2;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("model file not found: {0} (download from insightface and place in the model directory)")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// A raw detection in source image coordinates.
#[derive(Debug, Clone)]
pub struct Detection {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
    /// Five-point landmarks: [left_eye, right_eye, nose, left_mouth, right_mouth].
    pub landmarks: Option<Landmarks>,
}

impl Detection {
    /// Integer box clamped to the image, or `None` if it falls entirely outside.
    pub fn to_face_box(&self, width: u32, height: u32) -> Option<FaceBox> {
        if width == 0 || height == 0 {
            return None;
        }
        let max_x = (width - 1) as f32;
        let max_y = (height - 1) as f32;
        let left = self.x.round().clamp(0.0, max_x);
        let top = self.y.round().clamp(0.0, max_y);
        let right = (self.x + self.width).round().clamp(0.0, max_x);
        let bottom = (self.y + self.height).round().clamp(0.0, max_y);
        if right <= left || bottom <= top {
            return None;
        }
        Some(FaceBox {
            top: top as u32,
            right: right as u32,
            bottom: bottom as u32,
            left: left as u32,
        })
    }
}

/// Letterbox input side for an upsample factor.
pub fn input_size_for(upsample: u32) -> usize {
    SCRFD_BASE_INPUT_SIZE << upsample.min(SCRFD_MAX_UPSAMPLE)
}

/// Metadata for coordinate de-mapping after letterbox resize.
struct LetterboxInfo {
    scale: f32,
    pad_x: f32,
    pad_y: f32,
}

/// Output tensor indices for one stride: (score_idx, bbox_idx, kps_idx).
type StrideOutputIndices = (usize, usize, usize);

/// SCRFD-based face detector.
pub struct FaceDetector {
    session: Session,
    /// Per-stride output indices [(score, bbox, kps)] for strides [8, 16, 32].
    stride_indices: [StrideOutputIndices; 3],
}

impl FaceDetector {
    /// Load an SCRFD ONNX model from the given path.
    pub fn load(model_path: &Path) -> Result<Self, DetectorError> {
        if !model_path.exists() {
            return Err(DetectorError::ModelNotFound(model_path.display().to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        let output_names: Vec<String> = session.outputs().iter().map(|o| o.name().to_string()).collect();
        tracing::info!(
            path = %model_path.display(),
            outputs = ?output_names,
            "loaded SCRFD model"
        );

        if output_names.len() < 9 {
            return Err(DetectorError::InferenceFailed(format!(
                "SCRFD model requires 9 outputs (3 strides × score/bbox/kps), got {}",
                output_names.len()
            )));
        }

        let stride_indices = discover_output_indices(&output_names);
        tracing::debug!(?stride_indices, "SCRFD output tensor mapping");

        Ok(Self { session, stride_indices })
    }

    /// Detect faces in an RGB image, sorted by descending confidence.
    pub fn detect(&mut self, image: &Image, input_size: usize) -> Result<Vec<Detection>, DetectorError> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Ok(Vec::new());
        }

        let (input, letterbox) = preprocess(image, input_size);
        let outputs = self.session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let mut all_detections = Vec::new();
        for (stride_pos, &stride) in SCRFD_STRIDES.iter().enumerate() {
            let (score_idx, bbox_idx, kps_idx) = self.stride_indices[stride_pos];

            let (_, scores) = outputs[score_idx]
                .try_extract_tensor::<f32>()
                .map_err(|e| DetectorError::InferenceFailed(format!("scores stride {stride}: {e}")))?;
            let (_, bboxes) = outputs[bbox_idx]
                .try_extract_tensor::<f32>()
                .map_err(|e| DetectorError::InferenceFailed(format!("bboxes stride {stride}: {e}")))?;
            let (_, kps) = outputs[kps_idx]
                .try_extract_tensor::<f32>()
                .map_err(|e| DetectorError::InferenceFailed(format!("kps stride {stride}: {e}")))?;

            all_detections.extend(decode_stride(
                scores,
                bboxes,
                kps,
                stride,
                input_size,
                &letterbox,
                SCRFD_CONFIDENCE_THRESHOLD,
            ));
        }

        let result = nms(all_detections, SCRFD_NMS_THRESHOLD);
        tracing::debug!(faces = result.len(), input_size, "SCRFD detection complete");
        Ok(result)
    }
}

/// Letterbox an RGB image into a square NCHW float tensor.
///
/// Bilinear resize per channel; padding uses the mean so it normalizes to 0.0.
fn preprocess(image: &Image, input_size: usize) -> (Array4<f32>, LetterboxInfo) {
    let width = image.width() as usize;
    let height = image.height() as usize;
    let scale = (input_size as f32 / width as f32).min(input_size as f32 / height as f32);

    let new_w = ((width as f32 * scale).round() as usize).clamp(1, input_size);
    let new_h = ((height as f32 * scale).round() as usize).clamp(1, input_size);
    let pad_x = (input_size - new_w) as f32 / 2.0;
    let pad_y = (input_size - new_h) as f32 / 2.0;
    let pad_x_start = pad_x.floor() as usize;
    let pad_y_start = pad_y.floor() as usize;

    let mut tensor = Array4::<f32>::zeros((1, 3, input_size, input_size));

    let inv_scale = 1.0 / scale;
    for y in 0..new_h {
        let src_y = (y as f32 + 0.5) * inv_scale - 0.5;
        let y0 = (src_y.floor() as i64).clamp(0, height as i64 - 1) as u32;
        let y1 = (y0 + 1).min(height as u32 - 1);
        let fy = (src_y - src_y.floor()).clamp(0.0, 1.0);

        for x in 0..new_w {
            let src_x = (x as f32 + 0.5) * inv_scale - 0.5;
            let x0 = (src_x.floor() as i64).clamp(0, width as i64 - 1) as u32;
            let x1 = (x0 + 1).min(width as u32 - 1);
            let fx = (src_x - src_x.floor()).clamp(0.0, 1.0);

            let tl = image.get_pixel(x0, y0).0;
            let tr = image.get_pixel(x1, y0).0;
            let bl = image.get_pixel(x0, y1).0;
            let br = image.get_pixel(x1, y1).0;

            for c in 0..3 {
                let val = tl[c] as f32 * (1.0 - fx) * (1.0 - fy)
                    + tr[c] as f32 * fx * (1.0 - fy)
                    + bl[c] as f32 * (1.0 - fx) * fy
                    + br[c] as f32 * fx * fy;
                tensor[[0, c, pad_y_start + y, pad_x_start + x]] = (val - SCRFD_MEAN) / SCRFD_STD;
            }
        }
    }

    (tensor, LetterboxInfo { scale, pad_x, pad_y })
}

/// Discover output tensor ordering by name.
///
/// Named exports ("score_8", "bbox_16", ...) are mapped to stride slots.
/// Otherwise falls back to the standard positional ordering:
///   [0-2] = scores, [3-5] = bboxes, [6-8] = kps (strides 8, 16, 32).
fn discover_output_indices(names: &[String]) -> [StrideOutputIndices; 3] {
    let find = |prefix: &str, stride: usize| -> Option<usize> {
        let target = format!("{prefix}_{stride}");
        names.iter().position(|n| n == &target)
    };

    let mut named = [(0, 0, 0); 3];
    for (slot, &stride) in SCRFD_STRIDES.iter().enumerate() {
        match (find("score", stride), find("bbox", stride), find("kps", stride)) {
            (Some(s), Some(b), Some(k)) => named[slot] = (s, b, k),
            _ => {
                tracing::info!(?names, "SCRFD: output names not recognized, using positional mapping");
                return [(0, 3, 6), (1, 4, 7), (2, 5, 8)];
            }
        }
    }
    named
}

/// Decode detections for a single stride level.
fn decode_stride(
    scores: &[f32],
    bboxes: &[f32],
    kps: &[f32],
    stride: usize,
    input_size: usize,
    letterbox: &LetterboxInfo,
    threshold: f32,
) -> Vec<Detection> {
    let grid = input_size / stride;
    let num_anchors = grid * grid * SCRFD_ANCHORS_PER_CELL;
    let unmap = |v: f32, pad: f32| (v - pad) / letterbox.scale;
    let s = stride as f32;

    let mut detections = Vec::new();
    for idx in 0..num_anchors {
        let score = scores.get(idx).copied().unwrap_or(0.0);
        if score <= threshold {
            continue;
        }

        let cell = idx / SCRFD_ANCHORS_PER_CELL;
        let anchor_cx = (cell % grid) as f32 * s;
        let anchor_cy = (cell / grid) as f32 * s;

        let Some(off) = bboxes.get(idx * 4..idx * 4 + 4) else {
            continue;
        };
        let x1 = unmap(anchor_cx - off[0] * s, letterbox.pad_x);
        let y1 = unmap(anchor_cy - off[1] * s, letterbox.pad_y);
        let x2 = unmap(anchor_cx + off[2] * s, letterbox.pad_x);
        let y2 = unmap(anchor_cy + off[3] * s, letterbox.pad_y);

        let landmarks = kps.get(idx * 10..idx * 10 + 10).map(|k| {
            std::array::from_fn(|i| {
                (
                    unmap(anchor_cx + k[i * 2] * s, letterbox.pad_x),
                    unmap(anchor_cy + k[i * 2 + 1] * s, letterbox.pad_y),
                )
            })
        });

        detections.push(Detection {
            x: x1,
            y: y1,
            width: x2 - x1,
            height: y2 - y1,
            confidence: score,
            landmarks,
        });
    }
    detections
}

/// Non-Maximum Suppression. Output is sorted by descending confidence.
fn nms(mut detections: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut keep: Vec<Detection> = Vec::new();
    for det in detections {
        if keep.iter().all(|k| iou(k, &det) <= iou_threshold) {
            keep.push(det);
        }
    }
    keep
}

/// Intersection-over-Union between two detections.
fn iou(a: &Detection, b: &Detection) -> f32 {
    let inter_w = ((a.x + a.width).min(b.x + b.width) - a.x.max(b.x)).max(0.0);
    let inter_h = ((a.y + a.height).min(b.y + b.height) - a.y.max(b.y)).max(0.0);
    let inter_area = inter_w * inter_h;
    let union_area = a.width * a.height + b.width * b.height - inter_area;
    if union_area > 0.0 {
        inter_area / union_area
    } else {
        0.0
    }
}

//! facegate-onnx: ONNX Runtime face capability.
//!
//! Uses SCRFD for face detection and ArcFace for face embeddings, both
//! running on CPU. [`OnnxFaceCapability`] plugs into the provider pipelines.

pub mod alignment;
pub mod capability;
pub mod detector;
pub mod recognizer;

pub use capability::{default_model_dir, LoadError, OnnxFaceCapability};

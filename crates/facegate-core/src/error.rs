use thiserror::Error;

use crate::messages::MessageCode;

/// Rejection produced by the input validator.
///
/// Display text is the human message reported to callers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Missing mimetype.")]
    MissingMimetype,
    #[error("Mimetype in sample data differs from sample mimetype")]
    MimetypeMismatch { embedded: String, declared: String },
    #[error("Invalid mimetype. Accepted types are: [{}]", accepted.join(", "))]
    UnsupportedMimetype { mimetype: String, accepted: Vec<String> },
    #[error("Invalid image format in sample data.")]
    InvalidSampleData,
}

impl ValidationError {
    pub fn code(&self) -> MessageCode {
        match self {
            ValidationError::MissingMimetype => MessageCode::MissingMimetype,
            ValidationError::MimetypeMismatch { .. } => MessageCode::InvalidMimetype,
            ValidationError::UnsupportedMimetype { .. } => MessageCode::InvalidMimetype,
            ValidationError::InvalidSampleData => MessageCode::InvalidSampleData,
        }
    }
}

/// Failure to rebuild an enrolment model from its serialized form.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("malformed serialized model: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Failure inside the face detection / embedding backend.
#[derive(Error, Debug)]
pub enum CapabilityError {
    #[error("face detection failed: {0}")]
    Detection(String),
    #[error("face encoding failed: {0}")]
    Encoding(String),
    #[error("capability backend unavailable: {0}")]
    Unavailable(String),
}

/// Infrastructure failures a pipeline call can surface.
///
/// Input and detection conditions are reported inside result values, never here.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("capability error: {0}")]
    Capability(#[from] CapabilityError),
    #[error("model error: {0}")]
    Model(#[from] ModelError),
}

//! facegate-core: face identity verification scoring core.
//!
//! Validates sample images, builds progressive enrolment templates from
//! face embeddings and scores verification requests against them. Face
//! detection and embedding are consumed through the [`FaceCapability`] trait.

pub mod capability;
pub mod config;
pub mod error;
pub mod image_ops;
pub mod messages;
pub mod model;
pub mod provider;
pub mod result;
pub mod types;
pub mod validator;

pub use capability::{DetectOptions, DetectorModel, FaceCapability};
pub use config::{ProviderConfig, ProviderOptions, ScorePolicy};
pub use error::{CapabilityError, ModelError, ProviderError, ValidationError};
pub use messages::{AlertCode, MessageCode, ValidationStatus, VerificationStatus};
pub use model::EnrolmentModel;
pub use provider::FaceProvider;
pub use result::{
    EnrolmentResult, FaceAudit, ValidationResult, VerificationAudit, VerificationReport, VerificationResult,
};
pub use types::{Embedding, FaceBox, FaceLocation, Image, ProviderIdentity, Request, Sample, SampleValidation};

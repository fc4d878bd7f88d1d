//! Structured results returned by the provider pipelines.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::ScorePolicy;
use crate::error::ValidationError;
use crate::messages::{AlertCode, MessageCode, ValidationStatus, VerificationStatus};
use crate::types::{FaceLocation, SampleValidation};

/// Outcome of validating one enrolment sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub ok: bool,
    /// Credit toward enrolment if accepted.
    pub contribution: Option<f64>,
    pub info: Option<SampleValidation>,
    pub message_code: Option<MessageCode>,
    pub message: Option<String>,
    pub status: ValidationStatus,
}

impl ValidationResult {
    pub fn accepted(contribution: f64, info: SampleValidation) -> Self {
        Self {
            ok: true,
            contribution: Some(contribution),
            info: Some(info),
            message_code: None,
            message: None,
            status: ValidationStatus::Accepted,
        }
    }

    pub fn rejected(code: MessageCode, message: impl Into<String>) -> Self {
        Self {
            ok: false,
            contribution: None,
            info: None,
            message_code: Some(code),
            message: Some(message.into()),
            status: ValidationStatus::Rejected,
        }
    }
}

impl From<ValidationError> for ValidationResult {
    fn from(err: ValidationError) -> Self {
        Self::rejected(err.code(), err.to_string())
    }
}

/// Outcome of an enrolment call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrolmentResult {
    /// Updated model in its serialized form.
    pub model: Value,
    pub completion_percentage: f64,
    pub can_analyse: bool,
    pub valid: bool,
    pub error_message: Option<MessageCode>,
    pub used_sample_ids: Vec<String>,
}

/// Diagnostic record for one face found in a verification request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceAudit {
    pub location: FaceLocation,
    pub score: f32,
    /// JPEG crop of the face as a data URL. Absent if the crop could not be encoded.
    pub image: Option<String>,
    /// Id of the nearest template sample.
    pub most_similar: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VerificationAudit {
    pub faces: Vec<FaceAudit>,
}

/// Outcome of a verification call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub status: VerificationStatus,
    pub alert_code: AlertCode,
    /// Similarity, higher = more likely the same identity.
    pub score: Option<f32>,
    pub message_code: Option<MessageCode>,
    pub message: Option<String>,
    pub audit: Option<VerificationAudit>,
}

impl VerificationResult {
    /// Processed without a score, explained by the given alert and message.
    pub fn unscored(alert_code: AlertCode, code: Option<MessageCode>, message: impl Into<String>) -> Self {
        Self {
            status: VerificationStatus::Processed,
            alert_code,
            score: None,
            message_code: code,
            message: Some(message.into()),
            audit: None,
        }
    }

    pub fn scored(
        alert_code: AlertCode,
        score: f32,
        code: Option<MessageCode>,
        audit: VerificationAudit,
    ) -> Self {
        Self {
            status: VerificationStatus::Processed,
            alert_code,
            score: Some(score),
            message_code: code,
            message: None,
            audit: Some(audit),
        }
    }
}

impl From<ValidationError> for VerificationResult {
    fn from(err: ValidationError) -> Self {
        Self::unscored(AlertCode::Ok, Some(err.code()), err.to_string())
    }
}

/// A verification result plus the caller's score policy verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationReport {
    #[serde(flatten)]
    pub result: VerificationResult,
    /// Alert band for the score; absent when the candidate was not scored.
    pub policy_alert: Option<AlertCode>,
}

impl VerificationReport {
    pub fn new(result: VerificationResult, policy: &ScorePolicy) -> Self {
        let policy_alert = result.score.map(|s| policy.classify(s));
        Self { result, policy_alert }
    }
}

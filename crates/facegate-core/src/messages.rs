//! Message codes and status enums shared by every result type.

use serde::{Deserialize, Serialize};

/// Machine-readable reason attached to a rejected or degraded result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageCode {
    #[serde(rename = "PROVIDER_INVALID_MIMETYPE")]
    InvalidMimetype,
    #[serde(rename = "PROVIDER_MISSING_MIMETYPE")]
    MissingMimetype,
    #[serde(rename = "PROVIDER_INVALID_SAMPLE_DATA")]
    InvalidSampleData,
    #[serde(rename = "PROVIDER_BLACK_IMAGE")]
    BlackImage,
    #[serde(rename = "PROVIDER_NO_FACE_DETECTED")]
    NoFaceDetected,
    #[serde(rename = "PROVIDER_MULTIPLE_PEOPLE")]
    MultiplePeople,
    #[serde(rename = "PROVIDER_INVALID_MODEL")]
    InvalidModel,
    #[serde(rename = "PROVIDER_EMPTY_MODEL")]
    EmptyModel,
}

impl MessageCode {
    /// Wire name, identical to the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageCode::InvalidMimetype => "PROVIDER_INVALID_MIMETYPE",
            MessageCode::MissingMimetype => "PROVIDER_MISSING_MIMETYPE",
            MessageCode::InvalidSampleData => "PROVIDER_INVALID_SAMPLE_DATA",
            MessageCode::BlackImage => "PROVIDER_BLACK_IMAGE",
            MessageCode::NoFaceDetected => "PROVIDER_NO_FACE_DETECTED",
            MessageCode::MultiplePeople => "PROVIDER_MULTIPLE_PEOPLE",
            MessageCode::InvalidModel => "PROVIDER_INVALID_MODEL",
            MessageCode::EmptyModel => "PROVIDER_EMPTY_MODEL",
        }
    }
}

impl std::fmt::Display for MessageCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity of a verification outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlertCode {
    Ok,
    Warning,
    Alert,
}

/// Outcome of validating one sample. Serialized as 1 / 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum ValidationStatus {
    Accepted = 1,
    Rejected = 2,
}

impl From<ValidationStatus> for u8 {
    fn from(s: ValidationStatus) -> u8 {
        s as u8
    }
}

impl TryFrom<u8> for ValidationStatus {
    type Error = String;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            1 => Ok(ValidationStatus::Accepted),
            2 => Ok(ValidationStatus::Rejected),
            other => Err(format!("unknown validation status {other}")),
        }
    }
}

/// Processing status of a verification request. Serialized as an integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum VerificationStatus {
    Processed = 1,
}

impl From<VerificationStatus> for u8 {
    fn from(s: VerificationStatus) -> u8 {
        s as u8
    }
}

impl TryFrom<u8> for VerificationStatus {
    type Error = String;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            1 => Ok(VerificationStatus::Processed),
            other => Err(format!("unknown verification status {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_code_wire_name_matches_serde() {
        for code in [
            MessageCode::InvalidMimetype,
            MessageCode::MissingMimetype,
            MessageCode::InvalidSampleData,
            MessageCode::BlackImage,
            MessageCode::NoFaceDetected,
            MessageCode::MultiplePeople,
            MessageCode::InvalidModel,
            MessageCode::EmptyModel,
        ] {
            let json = serde_json::to_string(&code).unwrap();
            assert_eq!(json, format!("\"{}\"", code.as_str()));
        }
    }

    #[test]
    fn test_alert_code_uppercase() {
        assert_eq!(serde_json::to_string(&AlertCode::Warning).unwrap(), "\"WARNING\"");
    }

    #[test]
    fn test_status_serialized_as_integer() {
        assert_eq!(serde_json::to_string(&ValidationStatus::Rejected).unwrap(), "2");
        assert_eq!(serde_json::to_string(&VerificationStatus::Processed).unwrap(), "1");
        let s: ValidationStatus = serde_json::from_str("1").unwrap();
        assert_eq!(s, ValidationStatus::Accepted);
        assert!(serde_json::from_str::<ValidationStatus>("7").is_err());
    }
}

use serde::{Deserialize, Serialize};

use crate::capability::{DetectOptions, DetectorModel};
use crate::messages::AlertCode;
use crate::model::{DEFAULT_MIN_REQUIRED_SAMPLES, DEFAULT_TARGET_REQUIRED_SAMPLES};
use crate::types::ProviderIdentity;

/// Caller-side mapping from a similarity score to an alert band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScorePolicy {
    /// Scores below this raise a WARNING.
    pub warning_below: f32,
    /// Scores below this raise an ALERT.
    pub alert_below: f32,
}

impl Default for ScorePolicy {
    fn default() -> Self {
        Self {
            warning_below: 0.5,
            alert_below: 0.4,
        }
    }
}

impl ScorePolicy {
    pub fn classify(&self, score: f32) -> AlertCode {
        if score < self.alert_below {
            AlertCode::Alert
        } else if score < self.warning_below {
            AlertCode::Warning
        } else {
            AlertCode::Ok
        }
    }
}

/// Immutable provider configuration, built once per provider instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub identity: ProviderIdentity,
    pub model: DetectorModel,
    /// Always re-detect with the fast detector during validation, and never
    /// reuse stored validation data during enrolment.
    pub fast_validation: bool,
    pub number_of_times_to_upsample: u32,
    pub min_enrol_samples: usize,
    pub target_enrol_samples: usize,
    pub encoding_num_jitters: u32,
    pub accepted_mimetypes: Vec<String>,
    pub score_policy: ScorePolicy,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            identity: ProviderIdentity {
                id: "facegate".to_string(),
                acronym: "fgt".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            model: DetectorModel::Accurate,
            fast_validation: false,
            number_of_times_to_upsample: 1,
            min_enrol_samples: DEFAULT_MIN_REQUIRED_SAMPLES,
            target_enrol_samples: DEFAULT_TARGET_REQUIRED_SAMPLES,
            encoding_num_jitters: 5,
            accepted_mimetypes: vec!["image/jpeg".to_string(), "image/png".to_string()],
            score_policy: ScorePolicy::default(),
        }
    }
}

/// Partial overlay of provider options. Absent fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProviderOptions {
    pub provider_id: Option<String>,
    pub model: Option<DetectorModel>,
    pub fast_validation: Option<bool>,
    #[serde(alias = "upsample_times")]
    pub number_of_times_to_upsample: Option<u32>,
    pub min_enrol_samples: Option<usize>,
    pub target_enrol_samples: Option<usize>,
    pub encoding_num_jitters: Option<u32>,
    pub accepted_mimetypes: Option<Vec<String>>,
    pub warning_below: Option<f32>,
    pub alert_below: Option<f32>,
}

impl ProviderConfig {
    /// Return a new configuration with the given options applied.
    pub fn with_options(&self, opts: &ProviderOptions) -> Self {
        let mut next = self.clone();
        if let Some(id) = &opts.provider_id {
            next.identity.id = id.clone();
        }
        if let Some(model) = opts.model {
            next.model = model;
        }
        if let Some(fast) = opts.fast_validation {
            next.fast_validation = fast;
        }
        if let Some(up) = opts.number_of_times_to_upsample {
            next.number_of_times_to_upsample = up;
        }
        if let Some(min) = opts.min_enrol_samples {
            next.min_enrol_samples = min;
        }
        if let Some(target) = opts.target_enrol_samples {
            next.target_enrol_samples = target;
        }
        if let Some(jitters) = opts.encoding_num_jitters {
            next.encoding_num_jitters = jitters;
        }
        if let Some(types) = &opts.accepted_mimetypes {
            next.accepted_mimetypes = types.clone();
        }
        if let Some(w) = opts.warning_below {
            next.score_policy.warning_below = w;
        }
        if let Some(a) = opts.alert_below {
            next.score_policy.alert_below = a;
        }
        next
    }

    /// Detector settings used for enrolment and verification.
    pub fn detect_options(&self) -> DetectOptions {
        DetectOptions {
            model: self.model,
            upsample: self.number_of_times_to_upsample,
        }
    }

    /// Detector settings used for sample validation.
    pub fn validation_detect_options(&self) -> DetectOptions {
        if self.fast_validation {
            DetectOptions {
                model: DetectorModel::Fast,
                upsample: 0,
            }
        } else {
            self.detect_options()
        }
    }
}

//! Progressive enrolment template.
//!
//! The model is an ordered list of `{id, features}` pairs plus the sample
//! counts that drive completion. It never shrinks and is passed by value:
//! callers store the serialized form between calls.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ModelError;
use crate::types::Embedding;

/// Sample count at which verification becomes meaningful, unless configured.
pub const DEFAULT_MIN_REQUIRED_SAMPLES: usize = 10;
/// Sample count at which enrolment is complete, unless configured.
pub const DEFAULT_TARGET_REQUIRED_SAMPLES: usize = 15;

/// One enrolled sample: its id and raw embedding values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSample {
    pub id: String,
    pub features: Vec<f32>,
}

/// Plain structured form of an [`EnrolmentModel`].
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SerializedModel {
    #[serde(default)]
    samples: Vec<ModelSample>,
    #[serde(default = "default_min")]
    min_required_samples: usize,
    #[serde(default = "default_target")]
    target_required_samples: usize,
    /// Derived; written for the caller's benefit and ignored on load.
    #[serde(default)]
    percentage: f64,
    #[serde(default)]
    can_analyse: bool,
}

fn default_min() -> usize {
    DEFAULT_MIN_REQUIRED_SAMPLES
}

fn default_target() -> usize {
    DEFAULT_TARGET_REQUIRED_SAMPLES
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnrolmentModel {
    samples: Vec<ModelSample>,
    min_required: usize,
    target_required: usize,
}

impl Default for EnrolmentModel {
    fn default() -> Self {
        Self {
            samples: Vec::new(),
            min_required: DEFAULT_MIN_REQUIRED_SAMPLES,
            target_required: DEFAULT_TARGET_REQUIRED_SAMPLES,
        }
    }
}

impl EnrolmentModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the minimum and target sample counts. A zero target is raised to 1.
    pub fn configure(&mut self, min_required: usize, target_required: usize) {
        self.min_required = min_required;
        self.target_required = target_required.max(1);
    }

    pub fn min_required(&self) -> usize {
        self.min_required
    }

    pub fn target_required(&self) -> usize {
        self.target_required
    }

    /// Append a sample. Duplicate ids are kept; vector shape is not checked.
    pub fn add_sample(&mut self, sample_id: impl Into<String>, embedding: &Embedding) {
        self.samples.push(ModelSample {
            id: sample_id.into(),
            features: embedding.values.clone(),
        });
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Enrolment progress, capped at 1.0.
    pub fn completion_percentage(&self) -> f64 {
        (self.samples.len() as f64 / self.target_required as f64).min(1.0)
    }

    pub fn can_analyse(&self) -> bool {
        self.samples.len() >= self.min_required
    }

    /// Template embeddings in enrolment order.
    pub fn embeddings(&self) -> Vec<Embedding> {
        self.samples
            .iter()
            .map(|s| Embedding::new(s.features.clone()))
            .collect()
    }

    pub fn sample_id(&self, index: usize) -> Option<&str> {
        self.samples.get(index).map(|s| s.id.as_str())
    }

    /// Ids of every sample incorporated so far, in enrolment order.
    pub fn used_sample_ids(&self) -> Vec<String> {
        self.samples.iter().map(|s| s.id.clone()).collect()
    }

    pub fn samples(&self) -> &[ModelSample] {
        &self.samples
    }

    pub fn to_serializable(&self) -> Value {
        serde_json::json!({
            "samples": self.samples,
            "min_required_samples": self.min_required,
            "target_required_samples": self.target_required,
            "percentage": self.completion_percentage(),
            "can_analyse": self.can_analyse(),
        })
    }

    pub fn from_serializable(data: &Value) -> Result<Self, ModelError> {
        let raw = SerializedModel::deserialize(data)?;
        Ok(Self {
            samples: raw.samples,
            min_required: raw.min_required_samples,
            target_required: raw.target_required_samples.max(1),
        })
    }

    /// Load from an optional serialized value; `None` or JSON null gives an empty model.
    pub fn load(data: Option<&Value>) -> Result<Self, ModelError> {
        match data {
            None | Some(Value::Null) => Ok(Self::new()),
            Some(v) => Self::from_serializable(v),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn emb(v: &[f32]) -> Embedding {
        Embedding::new(v.to_vec())
    }

    #[test]
    fn test_completion_monotonic_and_exact_at_target() {
        let mut model = EnrolmentModel::new();
        model.configure(3, 6);
        let mut last = model.completion_percentage();
        assert_eq!(last, 0.0);
        for i in 0..8 {
            model.add_sample(i.to_string(), &emb(&[i as f32]));
            let pct = model.completion_percentage();
            assert!(pct >= last);
            if i + 1 < 6 {
                assert!(pct < 1.0);
            }
            last = pct;
        }
        assert!((last - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_five_of_six() {
        let mut model = EnrolmentModel::new();
        model.configure(3, 6);
        for i in 0..5 {
            model.add_sample(i.to_string(), &emb(&[0.0]));
        }
        assert!((model.completion_percentage() - 5.0 / 6.0).abs() < 1e-4);
        model.add_sample("5", &emb(&[0.0]));
        assert!((model.completion_percentage() - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_can_analyse_threshold() {
        let mut model = EnrolmentModel::new();
        model.configure(3, 6);
        for i in 0..2 {
            model.add_sample(i.to_string(), &emb(&[0.0]));
            assert!(!model.can_analyse());
        }
        model.add_sample("2", &emb(&[0.0]));
        assert!(model.can_analyse());
        model.add_sample("3", &emb(&[0.0]));
        assert!(model.can_analyse());
    }

    #[test]
    fn test_duplicate_ids_kept_in_order() {
        let mut model = EnrolmentModel::new();
        model.add_sample("a", &emb(&[1.0]));
        model.add_sample("b", &emb(&[2.0]));
        model.add_sample("a", &emb(&[3.0]));
        assert_eq!(model.used_sample_ids(), vec!["a", "b", "a"]);
        assert_eq!(model.sample_id(2), Some("a"));
        assert_eq!(model.embeddings()[2].values, vec![3.0]);
    }

    #[test]
    fn test_serializable_roundtrip_exact() {
        let mut model = EnrolmentModel::new();
        model.configure(2, 4);
        model.add_sample("s1", &emb(&[0.1, -0.25, 1e-7, 0.333_333_34]));
        model.add_sample("s2", &emb(&[f32::MIN_POSITIVE, 12345.678, -0.0, 0.5]));

        let text = serde_json::to_string(&model.to_serializable()).unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        let restored = EnrolmentModel::from_serializable(&value).unwrap();
        assert_eq!(restored, model);
    }

    #[test]
    fn test_serialized_layout() {
        let mut model = EnrolmentModel::new();
        model.add_sample("s1", &emb(&[1.0, 2.0]));
        let value = model.to_serializable();
        assert_eq!(value["samples"][0]["id"], "s1");
        assert_eq!(value["samples"][0]["features"][1], 2.0);
        assert!(value.get("percentage").is_some());
    }

    #[test]
    fn test_load_none_and_null() {
        assert!(EnrolmentModel::load(None).unwrap().is_empty());
        assert!(EnrolmentModel::load(Some(&Value::Null)).unwrap().is_empty());
    }

    #[test]
    fn test_from_serializable_malformed() {
        let bad = serde_json::json!({ "samples": "nope" });
        assert!(EnrolmentModel::from_serializable(&bad).is_err());
    }

    #[test]
    fn test_zero_target_clamped() {
        let mut model = EnrolmentModel::new();
        model.configure(0, 0);
        assert_eq!(model.target_required(), 1);
        assert_eq!(model.completion_percentage(), 0.0);
        assert!(model.can_analyse());
    }
}

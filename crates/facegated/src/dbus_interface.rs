use facegate_core::{ProviderConfig, Request, Sample, VerificationReport};
use serde::Serialize;
use serde_json::Value;
use zbus::interface;

use crate::engine::{EngineError, EngineHandle};

/// D-Bus interface for the Facegate provider daemon.
///
/// Bus name: org.facegate.Provider1
/// Object path: /org/facegate/Provider1
///
/// Every argument and return value is a JSON document.
pub struct ProviderService {
    pub engine: EngineHandle,
    pub config: ProviderConfig,
}

#[interface(name = "org.facegate.Provider1")]
impl ProviderService {
    /// Check that a sample is usable for enrolment.
    async fn validate(&self, sample_json: &str) -> zbus::fdo::Result<String> {
        let sample: Sample = parse_arg("sample", sample_json)?;
        tracing::info!(sample = %sample.id, learner = %sample.learner_id, "validate requested");
        let result = self.engine.validate(sample).await.map_err(engine_error)?;
        to_json(&result)
    }

    /// Add a batch of samples to a model. An empty model string starts a new one.
    async fn enrol(&self, samples_json: &str, model_json: &str) -> zbus::fdo::Result<String> {
        let samples: Vec<Sample> = parse_arg("samples", samples_json)?;
        let model = parse_model(model_json)?;
        tracing::info!(samples = samples.len(), has_model = model.is_some(), "enrol requested");
        let result = self.engine.enrol(samples, model).await.map_err(engine_error)?;
        to_json(&result)
    }

    /// Score a candidate against an enrolled model.
    async fn verify(&self, request_json: &str, model_json: &str) -> zbus::fdo::Result<String> {
        let request: Request = parse_arg("request", request_json)?;
        let model = parse_model(model_json)?.unwrap_or(Value::Null);
        tracing::info!(request = %request.id, learner = %request.learner_id, "verify requested");
        let result = self.engine.verify(request, model).await.map_err(engine_error)?;
        to_json(&VerificationReport::new(result, &self.config.score_policy))
    }

    /// Return daemon status information.
    async fn status(&self) -> zbus::fdo::Result<String> {
        Ok(status_json(&self.config, self.engine.worker_count()).to_string())
    }
}

fn status_json(config: &ProviderConfig, workers: usize) -> Value {
    serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "provider": config.identity,
        "workers": workers,
        "model": config.model,
        "fast_validation": config.fast_validation,
        "min_enrol_samples": config.min_enrol_samples,
        "target_enrol_samples": config.target_enrol_samples,
        "accepted_mimetypes": config.accepted_mimetypes,
    })
}

fn parse_arg<T: serde::de::DeserializeOwned>(name: &str, json: &str) -> zbus::fdo::Result<T> {
    serde_json::from_str(json).map_err(|e| zbus::fdo::Error::InvalidArgs(format!("{name}: {e}")))
}

/// Empty or whitespace-only means no model.
fn parse_model(json: &str) -> zbus::fdo::Result<Option<Value>> {
    if json.trim().is_empty() {
        return Ok(None);
    }
    parse_arg("model", json).map(Some)
}

fn to_json<T: Serialize>(value: &T) -> zbus::fdo::Result<String> {
    serde_json::to_string(value).map_err(|e| zbus::fdo::Error::Failed(format!("encoding result: {e}")))
}

fn engine_error(err: EngineError) -> zbus::fdo::Error {
    tracing::warn!(error = %err, "request failed");
    match err {
        EngineError::Provider(facegate_core::ProviderError::Model(e)) => {
            zbus::fdo::Error::InvalidArgs(format!("model: {e}"))
        }
        other => zbus::fdo::Error::Failed(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_model_empty_is_none() {
        assert!(parse_model("").unwrap().is_none());
        assert!(parse_model("  \n").unwrap().is_none());
        assert!(parse_model("{\"samples\": []}").unwrap().is_some());
    }

    #[test]
    fn test_parse_arg_reports_field() {
        let err = parse_arg::<Sample>("sample", "{").unwrap_err();
        match err {
            zbus::fdo::Error::InvalidArgs(msg) => assert!(msg.starts_with("sample:")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_status_json_fields() {
        let status = status_json(&ProviderConfig::default(), 3);
        assert_eq!(status["workers"], 3);
        assert_eq!(status["provider"]["id"], "facegate");
        assert_eq!(status["model"], "accurate");
        assert_eq!(status["target_enrol_samples"], 15);
    }
}

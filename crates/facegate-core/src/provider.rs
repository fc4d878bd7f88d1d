//! Provider pipelines: sample validation, progressive enrolment, verification.
//!
//! The provider holds no per-learner state. Every call takes the model in
//! its serialized form and returns the updated one, so a single provider can
//! serve concurrent callers as long as each supplies its own model.

use serde_json::Value;

use crate::capability::FaceCapability;
use crate::config::ProviderConfig;
use crate::error::{CapabilityError, ProviderError};
use crate::image_ops;
use crate::messages::{AlertCode, MessageCode};
use crate::model::EnrolmentModel;
use crate::result::{EnrolmentResult, FaceAudit, ValidationResult, VerificationAudit, VerificationResult};
use crate::types::{Embedding, FaceBox, FaceLocation, Image, Request, Sample, SampleValidation};
use crate::validator;

pub struct FaceProvider<C> {
    capability: C,
    config: ProviderConfig,
}

impl<C: FaceCapability> FaceProvider<C> {
    pub fn new(capability: C, config: ProviderConfig) -> Self {
        Self { capability, config }
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    pub fn capability(&self) -> &C {
        &self.capability
    }

    /// Validate a candidate enrolment sample: input checks, black frame, single face.
    pub fn validate_sample(&self, sample: &Sample) -> Result<ValidationResult, ProviderError> {
        let resolved = match validator::check_sample_image(sample, &self.config.accepted_mimetypes) {
            Ok(r) => r,
            Err(err) => {
                tracing::debug!(sample = %sample.id, error = %err, "validate: input rejected");
                return Ok(err.into());
            }
        };

        if image_ops::is_black_image(&resolved.image) {
            return Ok(ValidationResult::rejected(MessageCode::BlackImage, "Black image."));
        }

        let options = self.config.validation_detect_options();
        let faces = self.capability.detect(&resolved.image, &options)?;
        tracing::debug!(sample = %sample.id, faces = faces.len(), ?options, "validate: faces detected");

        let face = match faces.as_slice() {
            [] => {
                return Ok(ValidationResult::rejected(
                    MessageCode::NoFaceDetected,
                    "No faces in image.",
                ))
            }
            [face] => *face,
            _ => {
                return Ok(ValidationResult::rejected(
                    MessageCode::MultiplePeople,
                    "Multiple faces in the image.",
                ))
            }
        };

        let info = SampleValidation {
            provider: self.config.identity.clone(),
            face_location: FaceLocation::from(face),
        };
        let contribution = 1.0 / self.config.target_enrol_samples.max(1) as f64;
        Ok(ValidationResult::accepted(contribution, info))
    }

    /// Add samples to the model, in order.
    ///
    /// Undecodable samples are skipped. A sample with no face or several faces
    /// aborts the call, returning the model as accumulated up to that point.
    pub fn enrol(&self, samples: &[Sample], model: Option<&Value>) -> Result<EnrolmentResult, ProviderError> {
        let mut model = EnrolmentModel::load(model)?;
        model.configure(self.config.min_enrol_samples, self.config.target_enrol_samples);
        tracing::debug!(samples = samples.len(), enrolled = model.len(), "enrol: start");

        for sample in samples {
            let resolved = match validator::check_sample_image(sample, &self.config.accepted_mimetypes) {
                Ok(r) => r,
                Err(err) => {
                    tracing::warn!(sample = %sample.id, error = %err, "enrol: skipping unusable sample");
                    continue;
                }
            };

            let boxes = match self.stored_face_box(sample, &resolved.image) {
                Some(face) => {
                    tracing::debug!(sample = %sample.id, "enrol: reusing validation face location");
                    vec![face]
                }
                None => {
                    let faces = self.capability.detect(&resolved.image, &self.config.detect_options())?;
                    match faces.len() {
                        0 => {
                            tracing::info!(sample = %sample.id, "enrol: no face in sample, aborting");
                            return Ok(Self::enrolment_result(&model, Some(MessageCode::InvalidSampleData)));
                        }
                        1 => faces,
                        n => {
                            tracing::info!(sample = %sample.id, faces = n, "enrol: multiple faces, aborting");
                            return Ok(Self::enrolment_result(&model, Some(MessageCode::MultiplePeople)));
                        }
                    }
                }
            };

            let embedding = self
                .encode(&resolved.image, &boxes)?
                .into_iter()
                .next()
                .ok_or_else(|| CapabilityError::Encoding("no embedding returned for face".into()))?;
            model.add_sample(sample.id.clone(), &embedding);
            tracing::debug!(sample = %sample.id, enrolled = model.len(), "enrol: sample added");
        }

        tracing::info!(
            enrolled = model.len(),
            percentage = model.completion_percentage(),
            can_analyse = model.can_analyse(),
            "enrol: finished"
        );
        Ok(Self::enrolment_result(&model, None))
    }

    /// Score a candidate against a stored model.
    ///
    /// Input, content and model problems come back as a processed result with a
    /// message code. `Err` is reserved for capability backend failures.
    pub fn verify(&self, request: &Request, model: &Value) -> Result<VerificationResult, ProviderError> {
        let model = match EnrolmentModel::load(Some(model)) {
            Ok(m) => m,
            Err(err) => {
                tracing::warn!(request = %request.id, error = %err, "verify: stored model unreadable");
                return Ok(VerificationResult::unscored(
                    AlertCode::Warning,
                    Some(MessageCode::InvalidModel),
                    "Invalid model data.",
                ));
            }
        };

        let resolved = match validator::check_sample_image(request, &self.config.accepted_mimetypes) {
            Ok(r) => r,
            Err(err) => {
                tracing::debug!(request = %request.id, error = %err, "verify: input rejected");
                return Ok(err.into());
            }
        };
        let image = &resolved.image;

        if image_ops::is_black_image(image) {
            return Ok(VerificationResult::unscored(
                AlertCode::Warning,
                Some(MessageCode::BlackImage),
                "Black Image.",
            ));
        }

        let faces = self.capability.detect(image, &self.config.detect_options())?;
        if faces.is_empty() {
            return Ok(VerificationResult::unscored(
                AlertCode::Warning,
                Some(MessageCode::NoFaceDetected),
                "No faces in image.",
            ));
        }

        let references = model.embeddings();
        if references.is_empty() {
            tracing::warn!(request = %request.id, "verify: model has no enrolled samples");
            return Ok(VerificationResult::unscored(
                AlertCode::Warning,
                Some(MessageCode::EmptyModel),
                "Model has no enrolled samples.",
            ));
        }

        let encodings = self.encode(image, &faces)?;
        let mut audit = VerificationAudit::default();
        let mut best_distance = f32::INFINITY;

        for (face, encoding) in faces.iter().zip(encodings.iter()) {
            let distances = self.capability.distance(&references, encoding);
            let Some((idx, distance)) = nearest(&distances) else {
                continue;
            };
            best_distance = best_distance.min(distance);

            let crop = match image_ops::crop_face_data_url(image, face) {
                Ok(url) => Some(url),
                Err(err) => {
                    tracing::warn!(error = %err, "verify: failed to encode face crop");
                    None
                }
            };
            audit.faces.push(FaceAudit {
                location: FaceLocation::from(*face),
                score: 1.0 - distance,
                image: crop,
                most_similar: model.sample_id(idx).map(str::to_string),
            });
        }

        if !best_distance.is_finite() {
            return Err(CapabilityError::Encoding("no distances computed for detected faces".into()).into());
        }
        let score = 1.0 - best_distance;
        tracing::info!(request = %request.id, faces = faces.len(), score, "verify: scored");

        if faces.len() > 1 {
            return Ok(VerificationResult::scored(
                AlertCode::Alert,
                score,
                Some(MessageCode::MultiplePeople),
                audit,
            ));
        }
        Ok(VerificationResult::scored(AlertCode::Ok, score, None, audit))
    }

    /// Face box from a validation pass by this provider, unless fast validation is on.
    ///
    /// The box is clamped to the image; one starting outside it is ignored.
    fn stored_face_box(&self, sample: &Sample, image: &Image) -> Option<FaceBox> {
        if self.config.fast_validation {
            return None;
        }
        let face = sample
            .validations
            .iter()
            .rev()
            .find(|v| v.provider.id == self.config.identity.id)
            .map(|v| FaceBox::from(v.face_location))?;

        let (width, height) = image.dimensions();
        if face.left >= width || face.top >= height {
            tracing::warn!(sample = %sample.id, ?face, width, height, "enrol: stored face location outside image");
            return None;
        }
        Some(FaceBox {
            right: face.right.min(width - 1),
            bottom: face.bottom.min(height - 1),
            ..face
        })
    }

    fn encode(&self, image: &Image, boxes: &[FaceBox]) -> Result<Vec<Embedding>, CapabilityError> {
        let encodings = self
            .capability
            .encode(image, boxes, self.config.encoding_num_jitters)?;
        if encodings.len() != boxes.len() {
            return Err(CapabilityError::Encoding(format!(
                "expected {} embeddings, got {}",
                boxes.len(),
                encodings.len()
            )));
        }
        Ok(encodings)
    }

    fn enrolment_result(model: &EnrolmentModel, error: Option<MessageCode>) -> EnrolmentResult {
        EnrolmentResult {
            model: model.to_serializable(),
            completion_percentage: model.completion_percentage(),
            can_analyse: model.can_analyse(),
            valid: error.is_none(),
            error_message: error,
            used_sample_ids: model.used_sample_ids(),
        }
    }
}

/// Index and value of the smallest distance. NaN entries are skipped.
fn nearest(distances: &[f32]) -> Option<(usize, f32)> {
    distances
        .iter()
        .copied()
        .enumerate()
        .filter(|(_, d)| !d.is_nan())
        .min_by(|a, b| a.1.total_cmp(&b.1))
}

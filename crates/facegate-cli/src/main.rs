use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use clap::{Parser, Subcommand};
use facegate_core::image_ops::to_data_url;
use facegate_core::{FaceProvider, ProviderConfig, ProviderOptions, Sample, VerificationReport};
use facegate_onnx::OnnxFaceCapability;
use serde::Serialize;
use serde_json::Value;

#[derive(Parser)]
#[command(name = "facegate", about = "Facegate face identity verification CLI")]
struct Cli {
    /// Directory containing the ONNX model files
    #[arg(long, global = true)]
    models_dir: Option<PathBuf>,

    /// Provider options file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Learner id attached to samples built from image files
    #[arg(long, global = true, default_value = "cli")]
    learner: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that a sample is usable for enrolment
    Validate {
        /// Image file to validate
        #[arg(long, conflicts_with = "sample")]
        image: Option<PathBuf>,
        /// Sample JSON file to validate
        #[arg(long)]
        sample: Option<PathBuf>,
    },
    /// Add samples to a learner's model
    Enrol {
        /// Image files, in enrolment order
        #[arg(long = "image")]
        images: Vec<PathBuf>,
        /// Sample JSON files, enrolled after any images
        #[arg(long = "sample")]
        samples: Vec<PathBuf>,
        /// Model JSON file; read if present, written after the call
        #[arg(long)]
        model: PathBuf,
    },
    /// Score a candidate against an enrolled model
    Verify {
        /// Candidate image file
        #[arg(long, conflicts_with = "sample")]
        image: Option<PathBuf>,
        /// Candidate sample JSON file
        #[arg(long)]
        sample: Option<PathBuf>,
        /// Enrolled model JSON file
        #[arg(long)]
        model: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    let models_dir = cli.models_dir.clone().unwrap_or_else(facegate_onnx::default_model_dir);

    let capability = OnnxFaceCapability::load(&models_dir)
        .with_context(|| format!("loading models from {}", models_dir.display()))?;
    let provider = FaceProvider::new(capability, config);

    match cli.command {
        Commands::Validate { image, sample } => {
            let sample = input_sample(image.as_deref(), sample.as_deref(), &cli.learner)?;
            let result = provider.validate_sample(&sample)?;
            print_json(&result)?;
        }
        Commands::Enrol { images, samples, model } => {
            if images.is_empty() && samples.is_empty() {
                bail!("nothing to enrol: pass --image or --sample");
            }
            let mut batch = Vec::with_capacity(images.len() + samples.len());
            for path in &images {
                batch.push(sample_from_image(path, &cli.learner)?);
            }
            for path in &samples {
                batch.push(read_json(path)?);
            }

            let existing = if model.exists() {
                Some(read_json::<Value>(&model)?)
            } else {
                None
            };
            let result = provider.enrol(&batch, existing.as_ref())?;
            std::fs::write(&model, serde_json::to_string_pretty(&result.model)?)
                .with_context(|| format!("writing model {}", model.display()))?;
            tracing::info!(model = %model.display(), enrolled = result.used_sample_ids.len(), "model saved");
            print_json(&result)?;
        }
        Commands::Verify { image, sample, model } => {
            let request = input_sample(image.as_deref(), sample.as_deref(), &cli.learner)?;
            let model: Value = read_json(&model)?;
            let result = provider.verify(&request, &model)?;
            print_json(&VerificationReport::new(result, &provider.config().score_policy))?;
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<ProviderConfig> {
    let base = ProviderConfig::default();
    let Some(path) = path else {
        return Ok(base);
    };
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let options: ProviderOptions =
        toml::from_str(&text).with_context(|| format!("parsing options in {}", path.display()))?;
    Ok(base.with_options(&options))
}

fn input_sample(image: Option<&Path>, sample: Option<&Path>, learner: &str) -> Result<Sample> {
    match (image, sample) {
        (Some(path), _) => sample_from_image(path, learner),
        (None, Some(path)) => read_json(path),
        (None, None) => bail!("pass --image or --sample"),
    }
}

/// Wrap an image file as a sample with a fresh id.
///
/// Unknown extensions are sent as bare base64 with no media type.
fn sample_from_image(path: &Path, learner: &str) -> Result<Sample> {
    let bytes = std::fs::read(path).with_context(|| format!("reading image {}", path.display()))?;
    let mime_type = mime_from_extension(path);
    let data = match mime_type {
        Some(mime) => to_data_url(mime, &bytes),
        None => STANDARD.encode(&bytes),
    };
    Ok(Sample {
        id: uuid::Uuid::new_v4().to_string(),
        learner_id: learner.to_string(),
        data: Some(data),
        mime_type: mime_type.map(str::to_string),
        validations: Vec::new(),
    })
}

fn mime_from_extension(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "gif" => Some("image/gif"),
        "bmp" => Some("image/bmp"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing JSON in {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

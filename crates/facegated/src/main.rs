use anyhow::{Context, Result};
use facegate_core::FaceProvider;
use facegate_onnx::OnnxFaceCapability;
use tracing_subscriber::EnvFilter;

mod config;
mod dbus_interface;
mod engine;

const BUS_NAME: &str = "org.facegate.Provider1";
const OBJECT_PATH: &str = "/org/facegate/Provider1";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("facegated starting");

    let config = config::Config::from_env();
    let provider_config = config.provider_config()?;
    tracing::info!(
        model_dir = %config.model_dir.display(),
        workers = config.workers,
        options = ?config.options_path,
        "configuration loaded"
    );

    // One capability per worker: each owns its ONNX sessions.
    let mut providers = Vec::with_capacity(config.workers);
    for _ in 0..config.workers {
        let capability = OnnxFaceCapability::load(&config.model_dir)
            .with_context(|| format!("loading models from {}", config.model_dir.display()))?;
        providers.push(FaceProvider::new(capability, provider_config.clone()));
    }
    let engine = engine::spawn_engine(providers, config.queue_depth)?;

    let service = dbus_interface::ProviderService {
        engine,
        config: provider_config,
    };
    let _conn = zbus::connection::Builder::session()?
        .name(BUS_NAME)?
        .serve_at(OBJECT_PATH, service)?
        .build()
        .await
        .context("registering on the session bus")?;

    tracing::info!(bus = BUS_NAME, path = OBJECT_PATH, "facegated ready");

    tokio::signal::ctrl_c().await?;
    tracing::info!("facegated shutting down");

    Ok(())
}

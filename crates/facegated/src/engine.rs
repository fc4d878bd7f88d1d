use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use facegate_core::{
    EnrolmentResult, FaceCapability, FaceProvider, ProviderError, Request, Sample, ValidationResult,
    VerificationResult,
};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("engine has no workers")]
    NoWorkers,
    #[error("worker thread exited")]
    ChannelClosed,
}

/// Messages sent from D-Bus handlers to a worker thread.
enum EngineRequest {
    Validate {
        sample: Sample,
        reply: oneshot::Sender<Result<ValidationResult, ProviderError>>,
    },
    Enrol {
        samples: Vec<Sample>,
        model: Option<Value>,
        reply: oneshot::Sender<Result<EnrolmentResult, ProviderError>>,
    },
    Verify {
        request: Request,
        model: Value,
        reply: oneshot::Sender<Result<VerificationResult, ProviderError>>,
    },
}

/// Clone-safe handle to the worker pool. Requests are dispatched round-robin.
#[derive(Clone)]
pub struct EngineHandle {
    workers: Arc<Vec<mpsc::Sender<EngineRequest>>>,
    next: Arc<AtomicUsize>,
}

impl EngineHandle {
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    pub async fn validate(&self, sample: Sample) -> Result<ValidationResult, EngineError> {
        let (reply, rx) = oneshot::channel();
        self.dispatch(EngineRequest::Validate { sample, reply }).await?;
        Ok(rx.await.map_err(|_| EngineError::ChannelClosed)??)
    }

    pub async fn enrol(&self, samples: Vec<Sample>, model: Option<Value>) -> Result<EnrolmentResult, EngineError> {
        let (reply, rx) = oneshot::channel();
        self.dispatch(EngineRequest::Enrol { samples, model, reply }).await?;
        Ok(rx.await.map_err(|_| EngineError::ChannelClosed)??)
    }

    pub async fn verify(&self, request: Request, model: Value) -> Result<VerificationResult, EngineError> {
        let (reply, rx) = oneshot::channel();
        self.dispatch(EngineRequest::Verify { request, model, reply }).await?;
        Ok(rx.await.map_err(|_| EngineError::ChannelClosed)??)
    }

    async fn dispatch(&self, req: EngineRequest) -> Result<(), EngineError> {
        if self.workers.is_empty() {
            return Err(EngineError::NoWorkers);
        }
        let idx = self.next.fetch_add(1, Ordering::Relaxed) % self.workers.len();
        self.workers[idx]
            .send(req)
            .await
            .map_err(|_| EngineError::ChannelClosed)
    }
}

/// Spawn one OS thread per provider, each with its own bounded queue.
///
/// Providers are built by the caller so model loading fails fast at startup.
pub fn spawn_engine<C>(providers: Vec<FaceProvider<C>>, queue_depth: usize) -> Result<EngineHandle, EngineError>
where
    C: FaceCapability + Send + 'static,
{
    if providers.is_empty() {
        return Err(EngineError::NoWorkers);
    }

    let mut workers = Vec::with_capacity(providers.len());
    for (id, provider) in providers.into_iter().enumerate() {
        let (tx, mut rx) = mpsc::channel::<EngineRequest>(queue_depth.max(1));

        std::thread::Builder::new()
            .name(format!("facegate-worker-{id}"))
            .spawn(move || {
                tracing::info!(worker = id, "worker thread started");
                while let Some(req) = rx.blocking_recv() {
                    handle_request(&provider, id, req);
                }
                tracing::info!(worker = id, "worker thread exiting");
            })?;

        workers.push(tx);
    }

    Ok(EngineHandle {
        workers: Arc::new(workers),
        next: Arc::new(AtomicUsize::new(0)),
    })
}

fn handle_request<C: FaceCapability>(provider: &FaceProvider<C>, worker: usize, req: EngineRequest) {
    match req {
        EngineRequest::Validate { sample, reply } => {
            tracing::debug!(worker, sample = %sample.id, "validate");
            let _ = reply.send(provider.validate_sample(&sample));
        }
        EngineRequest::Enrol { samples, model, reply } => {
            tracing::debug!(worker, samples = samples.len(), "enrol");
            let _ = reply.send(provider.enrol(&samples, model.as_ref()));
        }
        EngineRequest::Verify { request, model, reply } => {
            tracing::debug!(worker, request = %request.id, "verify");
            let _ = reply.send(provider.verify(&request, &model));
        }
    }
}

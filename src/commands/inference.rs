use crate::error::AppError;
use crate::models::backend_types::{HealthStatus, ModelInfo};
use crate::models::detection_types::InferenceResult;
use crate::services::inference_client::InferenceClient;
use crate::services::session::Session;
use crate::state::AppState;
use std::future::Future;
use std::sync::atomic::Ordering;
use tokio::sync::Mutex;

/// One health check. A failure counts as unhealthy and is not retried.
pub async fn query_health(client: &InferenceClient) -> HealthStatus {
    match client.check_health().await {
        Ok(health) if health.is_ready() => HealthStatus::Healthy,
        Ok(health) => {
            tracing::warn!(status = %health.status, model_loaded = health.model_loaded, "backend not ready");
            HealthStatus::Unhealthy
        }
        Err(e) => {
            tracing::error!(error = %e, "health check failed");
            HealthStatus::Unhealthy
        }
    }
}

/// Refresh the health flag.
pub async fn check_health(state: &mut AppState) -> HealthStatus {
    let status = query_health(&state.client).await;
    state.session.set_health(status);
    status
}

/// Fetch the model registry. On failure the list stays empty.
pub async fn load_models(state: &mut AppState) -> Result<&[ModelInfo], AppError> {
    let models = state.client.get_models().await?;
    state.session.set_models(models);
    Ok(state.session.models())
}

/// Start-up sequence: one health check and one model fetch, neither retried.
pub async fn startup(state: &mut AppState) -> HealthStatus {
    let health = check_health(state).await;
    if let Err(e) = load_models(state).await {
        tracing::error!(error = %e, "model list unavailable");
    }
    health
}

/// Run one inference for the first queued image.
///
/// `cancel` resolving first abandons the request; the session then ignores
/// whatever the backend would have answered.
pub async fn run_inference_until<C>(state: &mut AppState, cancel: C) -> Result<&InferenceResult, AppError>
where
    C: Future<Output = ()>,
{
    let request = state.session.begin_inference()?;
    let cancel_flag = state.session.cancel_handle();

    let outcome = tokio::select! {
        outcome = state.client.run_inference(&request) => outcome,
        _ = cancel => {
            tracing::warn!(file = %request.file.display(), "inference cancelled");
            cancel_flag.store(true, Ordering::Relaxed);
            Err(AppError::input("Inference cancelled"))
        }
    };

    state.session.finish_inference(outcome)
}

/// Resolves on Ctrl-C. Never resolves if the signal handler cannot be installed.
pub async fn interrupted() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// Same as `run_inference_until`, cancelled by Ctrl-C.
pub async fn run_inference(state: &mut AppState) -> Result<&InferenceResult, AppError> {
    run_inference_until(state, interrupted()).await
}

/// Inference against a session other handlers share. The lock is only held to
/// start and to finish, so while the request is out the session reports
/// `loading`, rejects control changes and can be cancelled.
pub async fn run_inference_shared(
    client: &InferenceClient,
    session: &Mutex<Session>,
) -> Result<InferenceResult, AppError> {
    let request = session.lock().await.begin_inference()?;
    let outcome = client.run_inference(&request).await;
    session.lock().await.finish_inference(outcome).cloned()
}

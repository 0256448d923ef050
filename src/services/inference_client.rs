use crate::config::{AppConfig, Contract};
use crate::error::AppError;
use crate::models::backend_types::{HealthResponse, ModelsResponse};
use crate::models::detection_types::InferenceResult;
use crate::models::request_types::InferenceRequest;
use crate::services::intake_service;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};

/// Thin wrapper over the three backend endpoints. No call is ever retried.
#[derive(Clone)]
pub struct InferenceClient {
    client: Client,
    config: AppConfig,
}

impl InferenceClient {
    pub fn new(config: AppConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AppError::connectivity(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub async fn check_health(&self) -> Result<HealthResponse, AppError> {
        let url = self.config.endpoint("health")?;
        tracing::debug!(%url, "checking backend health");

        let resp = self.client.get(url).send().await.map_err(|e| {
            AppError::connectivity(format!("Health check failed: {}", e))
        })?;

        if !resp.status().is_success() {
            return Err(AppError::connectivity(format!(
                "Health check failed: HTTP {}",
                resp.status()
            )));
        }

        let health: HealthResponse = resp.json().await.map_err(|e| {
            AppError::connectivity(format!("Failed to parse health response: {}", e))
        })?;
        tracing::info!(status = %health.status, model_loaded = health.model_loaded, "backend health");
        Ok(health)
    }

    pub async fn get_models(&self) -> Result<ModelsResponse, AppError> {
        let url = self.config.endpoint("models")?;
        tracing::debug!(%url, "fetching model list");

        let resp = self.client.get(url).send().await.map_err(|e| {
            AppError::connectivity(format!("Failed to fetch models: {}", e))
        })?;

        if !resp.status().is_success() {
            return Err(AppError::connectivity(format!(
                "Failed to fetch models: HTTP {}",
                resp.status()
            )));
        }

        let models: ModelsResponse = resp.json().await.map_err(|e| {
            AppError::connectivity(format!("Failed to parse model list: {}", e))
        })?;
        tracing::info!(count = models.available.len(), current = ?models.current, "models fetched");
        Ok(models)
    }

    /// Submit one image. Only `request.file` is uploaded; the session never hands over more.
    pub async fn run_inference(&self, request: &InferenceRequest) -> Result<InferenceResult, AppError> {
        let contract = self.config.contract;
        let url = self.config.endpoint(contract.inference_path())?;

        let bytes = tokio::fs::read(&request.file).await.map_err(|e| {
            AppError::input(format!("Failed to read {}: {}", request.file.display(), e))
        })?;
        let file_name = request
            .file
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();
        let mime = intake_service::image_mime_type(&request.file).unwrap_or("application/octet-stream");

        let part = Part::bytes(bytes)
            .file_name(file_name.clone())
            .mime_str(mime)
            .map_err(|e| AppError::input(format!("Invalid MIME type {}: {}", mime, e)))?;

        let mut form = Form::new().part("file", part);
        if contract == Contract::Minimal {
            tracing::warn!("minimal contract: model, thresholds, NMS and class filter are not transmitted");
        }
        for (name, value) in form_fields(request, contract) {
            form = form.text(name, value);
        }

        tracing::debug!(%url, file = %file_name, model = %request.model_id, "submitting inference");

        let resp = self
            .client
            .post(url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| AppError::inference(format!("Inference request failed: {}", e)))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let message = error_detail(status, &body);
            tracing::error!(%status, %message, "inference failed");
            return Err(AppError::inference(message));
        }

        let result: InferenceResult = resp
            .json()
            .await
            .map_err(|e| AppError::decode(format!("Failed to parse inference response: {}", e)))?;

        tracing::info!(
            file = %file_name,
            kept = result.meta.kept,
            discarded = result.meta.discarded_below_threshold,
            inference_ms = result.meta.inference_ms,
            "inference complete"
        );
        Ok(result)
    }
}

/// Text fields sent next to the file part.
pub fn form_fields(request: &InferenceRequest, contract: Contract) -> Vec<(&'static str, String)> {
    if contract == Contract::Minimal {
        return Vec::new();
    }

    let mut fields = vec![
        ("model_id", request.model_id.clone()),
        ("conf_threshold", format!("{:.2}", request.conf_threshold)),
        ("iou_threshold", format!("{:.2}", request.iou_threshold)),
        ("nms", request.nms.to_string()),
    ];
    if let Some(filter) = request.class_filter_param() {
        fields.push(("class_filter", filter));
    }
    fields
}

/// Best message for a failed inference: the backend's `detail` (FastAPI style) or
/// `error` field when present, otherwise a generic one carrying the status.
pub fn error_detail(status: StatusCode, body: &str) -> String {
    let generic = format!("Inference failed: HTTP {}", status);

    let value: serde_json::Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(_) => return generic,
    };

    match value.get("detail").or_else(|| value.get("error")) {
        Some(serde_json::Value::String(s)) if !s.trim().is_empty() => s.clone(),
        Some(serde_json::Value::String(_)) | Some(serde_json::Value::Null) | None => generic,
        Some(other) => other.to_string(),
    }
}

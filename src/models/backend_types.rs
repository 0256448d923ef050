use serde::{Deserialize, Serialize};
use std::fmt;

/// Body of `GET /health`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    #[serde(default)]
    pub model_loaded: bool,
    #[serde(default)]
    pub backend: Option<String>,
    #[serde(default)]
    pub yolo_available: bool,
    #[serde(default)]
    pub hf_available: bool,
}

impl HealthResponse {
    pub fn is_ready(&self) -> bool {
        self.status == "ok" && self.model_loaded
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    #[default]
    Unknown,
    Healthy,
    Unhealthy,
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HealthStatus::Unknown => "unknown",
            HealthStatus::Healthy => "healthy",
            HealthStatus::Unhealthy => "unavailable",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub label: String,
}

/// Body of `GET /models`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ModelsResponse {
    #[serde(default)]
    pub available: Vec<ModelInfo>,
    #[serde(default)]
    pub current: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ready_requires_ok_status_and_a_loaded_model() {
        let mut health: HealthResponse = serde_json::from_str(
            r#"{"status":"ok","model_loaded":true,"backend":"fastapi","yolo_available":true,"hf_available":false}"#,
        )
        .unwrap();
        assert!(health.is_ready());

        health.model_loaded = false;
        assert!(!health.is_ready());
    }

    #[test]
    fn models_response_accepts_null_current() {
        let models: ModelsResponse =
            serde_json::from_str(r#"{"available":[],"current":null}"#).unwrap();
        assert!(models.available.is_empty());
        assert!(models.current.is_none());
    }
}

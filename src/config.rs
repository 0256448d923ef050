use crate::error::AppError;
use reqwest::Url;
use std::time::Duration;

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Which endpoint shape the backend speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Contract {
    /// `POST /infer` with model id, thresholds, NMS and class filter.
    #[default]
    Full,
    /// Legacy `POST /predict` that only takes the file.
    Minimal,
}

impl Contract {
    pub fn inference_path(&self) -> &'static str {
        match self {
            Contract::Full => "infer",
            Contract::Minimal => "predict",
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub backend_url: Url,
    pub contract: Contract,
    pub timeout: Duration,
}

impl AppConfig {
    pub fn new(backend_url: &str, contract: Contract, timeout_secs: u64) -> Result<Self, AppError> {
        Ok(Self {
            backend_url: parse_base_url(backend_url)?,
            contract,
            timeout: Duration::from_secs(timeout_secs.max(1)),
        })
    }

    pub fn endpoint(&self, path: &str) -> Result<Url, AppError> {
        self.backend_url
            .join(path)
            .map_err(|e| AppError::input(format!("Invalid endpoint path {}: {}", path, e)))
    }
}

/// Parses a base URL and makes sure it ends with exactly one slash so that
/// `Url::join` appends endpoint paths instead of replacing the last segment.
fn parse_base_url(raw: &str) -> Result<Url, AppError> {
    let trimmed = raw.trim().trim_end_matches('/');
    let url = Url::parse(&format!("{}/", trimmed))
        .map_err(|e| AppError::input(format!("Invalid backend URL '{}': {}", raw, e)))?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(AppError::input(format!(
            "Unsupported backend URL scheme '{}'",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slashes_are_normalized() {
        let config = AppConfig::new("http://fabric.local:9000///", Contract::Full, 5).unwrap();
        assert_eq!(
            config.endpoint("health").unwrap().as_str(),
            "http://fabric.local:9000/health"
        );
    }

    #[test]
    fn base_path_is_preserved() {
        let config = AppConfig::new("http://fabric.local/api/v1", Contract::Minimal, 5).unwrap();
        assert_eq!(
            config.endpoint(config.contract.inference_path()).unwrap().as_str(),
            "http://fabric.local/api/v1/predict"
        );
    }

    #[test]
    fn rejects_non_http_urls() {
        assert!(AppConfig::new("ftp://fabric.local", Contract::Full, 5).is_err());
        assert!(AppConfig::new("not a url", Contract::Full, 5).is_err());
    }

    #[test]
    fn default_points_at_local_backend() {
        let config =
            AppConfig::new(DEFAULT_BACKEND_URL, Contract::default(), DEFAULT_TIMEOUT_SECS).unwrap();
        assert_eq!(config.endpoint("models").unwrap().as_str(), "http://localhost:8000/models");
        assert_eq!(config.contract, Contract::Full);
    }
}

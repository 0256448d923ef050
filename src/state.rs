use crate::config::AppConfig;
use crate::error::AppError;
use crate::services::inference_client::InferenceClient;
use crate::services::session::Session;

/// What the front end owns: the backend client and the session it drives.
pub struct AppState {
    pub client: InferenceClient,
    pub session: Session,
}

impl AppState {
    pub fn new(config: AppConfig) -> Result<Self, AppError> {
        Ok(Self {
            client: InferenceClient::new(config)?,
            session: Session::new(),
        })
    }
}

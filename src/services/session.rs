use crate::error::AppError;
use crate::models::backend_types::{HealthStatus, ModelInfo, ModelsResponse};
use crate::models::detection_types::{DefectClass, InferenceResult};
use crate::models::request_types::InferenceRequest;
use crate::models::results_types::SortOrder;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub const DEFAULT_MODEL_ID: &str = "ultra";
pub const DEFAULT_CONF_THRESHOLD: f64 = 0.35;
pub const DEFAULT_IOU_THRESHOLD: f64 = 0.45;

/// Client-side state of one working session.
///
/// Owned by whoever drives the UI: the desktop window holds it behind a
/// mutex, the console and one-shot commands own it outright. All mutation
/// goes through these methods, which keep two rules: at most one inference
/// in flight, and the result is only ever replaced wholesale by a
/// successful response.
#[derive(Debug)]
pub struct Session {
    files: Vec<PathBuf>,
    models: Vec<ModelInfo>,
    model_id: String,
    conf_threshold: f64,
    iou_threshold: f64,
    nms: bool,
    class_filter: BTreeSet<DefectClass>,
    health: HealthStatus,
    loading: bool,
    error: Option<String>,
    result: Option<InferenceResult>,
    sort: SortOrder,
    cancel_flag: Arc<AtomicBool>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            files: Vec::new(),
            models: Vec::new(),
            model_id: DEFAULT_MODEL_ID.to_string(),
            conf_threshold: DEFAULT_CONF_THRESHOLD,
            iou_threshold: DEFAULT_IOU_THRESHOLD,
            nms: true,
            class_filter: BTreeSet::new(),
            health: HealthStatus::Unknown,
            loading: false,
            error: None,
            result: None,
            sort: SortOrder::default(),
            cancel_flag: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn models(&self) -> &[ModelInfo] {
        &self.models
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn conf_threshold(&self) -> f64 {
        self.conf_threshold
    }

    pub fn iou_threshold(&self) -> f64 {
        self.iou_threshold
    }

    pub fn nms(&self) -> bool {
        self.nms
    }

    pub fn class_filter(&self) -> &BTreeSet<DefectClass> {
        &self.class_filter
    }

    pub fn health(&self) -> HealthStatus {
        self.health
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn result(&self) -> Option<&InferenceResult> {
        self.result.as_ref()
    }

    pub fn sort(&self) -> SortOrder {
        self.sort
    }

    fn ensure_idle(&self) -> Result<(), AppError> {
        if self.loading {
            return Err(AppError::input("Controls are disabled while inference is running"));
        }
        Ok(())
    }

    pub fn add_files(&mut self, files: Vec<PathBuf>) -> Result<usize, AppError> {
        self.ensure_idle()?;
        let added = files.len();
        self.files.extend(files);
        self.error = None;
        Ok(added)
    }

    pub fn remove_file(&mut self, index: usize) -> Result<PathBuf, AppError> {
        self.ensure_idle()?;
        if index >= self.files.len() {
            return Err(AppError::input(format!(
                "No file at index {} ({} queued)",
                index,
                self.files.len()
            )));
        }
        Ok(self.files.remove(index))
    }

    pub fn clear_files(&mut self) -> Result<(), AppError> {
        self.ensure_idle()?;
        self.files.clear();
        Ok(())
    }

    pub fn set_conf_threshold(&mut self, value: f64) -> Result<f64, AppError> {
        self.ensure_idle()?;
        self.conf_threshold = threshold_step(value, "Confidence")?;
        Ok(self.conf_threshold)
    }

    pub fn set_iou_threshold(&mut self, value: f64) -> Result<f64, AppError> {
        self.ensure_idle()?;
        self.iou_threshold = threshold_step(value, "IoU")?;
        Ok(self.iou_threshold)
    }

    pub fn set_nms(&mut self, enabled: bool) -> Result<(), AppError> {
        self.ensure_idle()?;
        self.nms = enabled;
        Ok(())
    }

    /// Adds the class to the filter, or removes it if present. Returns whether it is now included.
    pub fn toggle_class(&mut self, class: DefectClass) -> Result<bool, AppError> {
        self.ensure_idle()?;
        if self.class_filter.remove(&class) {
            Ok(false)
        } else {
            self.class_filter.insert(class);
            Ok(true)
        }
    }

    pub fn clear_class_filter(&mut self) -> Result<(), AppError> {
        self.ensure_idle()?;
        self.class_filter.clear();
        Ok(())
    }

    pub fn set_models(&mut self, models: ModelsResponse) {
        if let Some(current) = models.current {
            self.model_id = current;
        } else if let Some(first) = models.available.first() {
            self.model_id = first.id.clone();
        }
        self.models = models.available;
    }

    /// Any id is accepted while the model list is unknown; afterwards only listed ones.
    pub fn select_model(&mut self, id: &str) -> Result<(), AppError> {
        self.ensure_idle()?;
        if !self.models.is_empty() && !self.models.iter().any(|m| m.id == id) {
            let ids: Vec<&str> = self.models.iter().map(|m| m.id.as_str()).collect();
            return Err(AppError::input(format!(
                "Unknown model '{}'. Available: {}",
                id,
                ids.join(", ")
            )));
        }
        self.model_id = id.to_string();
        Ok(())
    }

    pub fn set_health(&mut self, health: HealthStatus) {
        self.health = health;
    }

    pub fn set_sort(&mut self, sort: SortOrder) {
        self.sort = sort;
    }

    pub fn can_run_inference(&self) -> bool {
        !self.files.is_empty() && !self.loading && self.health == HealthStatus::Healthy
    }

    /// Gate and start an inference. On success the session is marked busy and the
    /// request for the first queued file is returned; nothing else is sent.
    pub fn begin_inference(&mut self) -> Result<InferenceRequest, AppError> {
        if self.loading {
            return Err(AppError::input("An inference request is already running"));
        }
        if self.files.is_empty() {
            let err = AppError::input("Please select at least one image first");
            self.error = Some(err.message.clone());
            return Err(err);
        }
        if self.health != HealthStatus::Healthy {
            let err = AppError::input(format!("Inference service is {}", self.health));
            self.error = Some(err.message.clone());
            return Err(err);
        }

        self.loading = true;
        self.error = None;
        self.cancel_flag.store(false, Ordering::Relaxed);

        Ok(InferenceRequest {
            file: self.files[0].clone(),
            model_id: self.model_id.clone(),
            conf_threshold: self.conf_threshold,
            iou_threshold: self.iou_threshold,
            nms: self.nms,
            class_filter: self.class_filter.clone(),
        })
    }

    /// Apply the outcome of the request started by `begin_inference`.
    ///
    /// A failure only sets the error; the previous result stays as it was.
    /// An outcome that arrives after `cancel` is dropped without touching state.
    pub fn finish_inference(
        &mut self,
        outcome: Result<InferenceResult, AppError>,
    ) -> Result<&InferenceResult, AppError> {
        self.loading = false;

        if self.cancel_flag.swap(false, Ordering::Relaxed) {
            tracing::debug!("discarding inference outcome after cancellation");
            return Err(AppError::input("Inference cancelled"));
        }

        match outcome {
            Ok(result) => {
                if result.detections.len() as u64 != result.meta.kept {
                    tracing::warn!(
                        kept = result.meta.kept,
                        received = result.detections.len(),
                        "detection count does not match meta.kept"
                    );
                }
                self.error = None;
                Ok(self.result.insert(result))
            }
            Err(e) => {
                self.error = Some(e.message.clone());
                Err(e)
            }
        }
    }

    /// Ask the in-flight request to be abandoned. Has no effect when idle.
    pub fn cancel(&self) {
        if self.loading {
            self.cancel_flag.store(true, Ordering::Relaxed);
        }
    }

    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        self.cancel_flag.clone()
    }
}

fn threshold_step(value: f64, name: &str) -> Result<f64, AppError> {
    if !value.is_finite() || !(0.0..=1.0).contains(&value) {
        return Err(AppError::input(format!(
            "{} threshold must be between 0.00 and 1.00, got {}",
            name, value
        )));
    }
    Ok((value * 100.0).round() / 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::models::detection_types::{Detection, InferenceMeta};

    fn result_with(kept: u64, overlay: &str) -> InferenceResult {
        InferenceResult {
            detections: (0..kept)
                .map(|i| Detection {
                    class: "hole".to_string(),
                    score: 0.5,
                    bbox: [i as f64, 0.0, 1.0, 1.0],
                    mask: None,
                })
                .collect(),
            meta: InferenceMeta {
                width: 100,
                height: 50,
                inference_ms: 7,
                kept,
                discarded_below_threshold: 0,
            },
            overlay_png: overlay.to_string(),
        }
    }

    fn ready_session(files: &[&str]) -> Session {
        let mut session = Session::new();
        session.set_health(HealthStatus::Healthy);
        session
            .add_files(files.iter().map(PathBuf::from).collect())
            .unwrap();
        session
    }

    #[test]
    fn files_are_appended_and_removed_by_index() {
        let mut session = ready_session(&["a.png", "b.png"]);
        session.add_files(vec![PathBuf::from("c.png")]).unwrap();
        assert_eq!(session.files().len(), 3);

        assert_eq!(session.remove_file(1).unwrap(), PathBuf::from("b.png"));
        assert_eq!(session.files(), &[PathBuf::from("a.png"), PathBuf::from("c.png")]);

        let err = session.remove_file(5).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Input);
    }

    #[test]
    fn toggling_twice_restores_the_filter() {
        let mut session = Session::new();
        session.toggle_class(DefectClass::Stain).unwrap();
        let before = session.class_filter().clone();

        assert!(session.toggle_class(DefectClass::Hole).unwrap());
        assert!(!session.toggle_class(DefectClass::Hole).unwrap());
        assert_eq!(session.class_filter(), &before);
    }

    #[test]
    fn thresholds_snap_to_the_slider_step() {
        let mut session = Session::new();
        assert_eq!(session.set_conf_threshold(0.456).unwrap(), 0.46);
        assert_eq!(session.set_iou_threshold(1.0).unwrap(), 1.0);
        assert!(session.set_conf_threshold(1.2).is_err());
        assert!(session.set_iou_threshold(-0.1).is_err());
        assert!(session.set_iou_threshold(f64::NAN).is_err());
        assert_eq!(session.conf_threshold(), 0.46);
    }

    #[test]
    fn trigger_is_gated() {
        let mut empty = Session::new();
        empty.set_health(HealthStatus::Healthy);
        assert!(!empty.can_run_inference());
        assert!(empty.begin_inference().is_err());
        assert!(empty.error().is_some());

        let mut unhealthy = ready_session(&["a.png"]);
        unhealthy.set_health(HealthStatus::Unhealthy);
        assert!(!unhealthy.can_run_inference());
        assert!(unhealthy.begin_inference().is_err());

        let mut unknown = ready_session(&["a.png"]);
        unknown.set_health(HealthStatus::Unknown);
        assert!(!unknown.can_run_inference());

        let mut busy = ready_session(&["a.png"]);
        assert!(busy.can_run_inference());
        busy.begin_inference().unwrap();
        assert!(!busy.can_run_inference());
        assert!(busy.begin_inference().is_err());
    }

    #[test]
    fn only_the_first_file_is_requested() {
        let mut session = ready_session(&["first.png", "second.png", "third.png"]);
        session.toggle_class(DefectClass::Scratch).unwrap();
        session.set_nms(false).unwrap();

        let req = session.begin_inference().unwrap();
        assert_eq!(req.file, PathBuf::from("first.png"));
        assert_eq!(req.model_id, DEFAULT_MODEL_ID);
        assert!(!req.nms);
        assert_eq!(req.class_filter_param().as_deref(), Some("scratch"));
    }

    #[test]
    fn controls_are_disabled_while_loading() {
        let mut session = ready_session(&["a.png"]);
        session.begin_inference().unwrap();

        assert!(session.set_conf_threshold(0.5).is_err());
        assert!(session.set_nms(false).is_err());
        assert!(session.toggle_class(DefectClass::Hole).is_err());
        assert!(session.add_files(vec![PathBuf::from("b.png")]).is_err());
        assert!(session.remove_file(0).is_err());
        assert!(session.select_model("hf").is_err());
    }

    #[test]
    fn success_replaces_result_wholesale() {
        let mut session = ready_session(&["a.png"]);
        session.begin_inference().unwrap();
        session.finish_inference(Ok(result_with(1, "first"))).unwrap();

        session.begin_inference().unwrap();
        let stored = session.finish_inference(Ok(result_with(3, "second"))).unwrap();
        assert_eq!(stored.overlay_png, "second");
        assert_eq!(stored.detections.len(), 3);
        assert!(!session.is_loading());
        assert!(session.error().is_none());
    }

    #[test]
    fn failure_keeps_previous_result() {
        let mut session = ready_session(&["a.png"]);
        session.begin_inference().unwrap();
        session.finish_inference(Ok(result_with(2, "kept"))).unwrap();
        let before = session.result().cloned();

        session.begin_inference().unwrap();
        let err = session
            .finish_inference(Err(AppError::inference("Inference failed: boom")))
            .unwrap_err();

        assert_eq!(err.message, "Inference failed: boom");
        assert_eq!(session.error(), Some("Inference failed: boom"));
        assert_eq!(session.result().cloned(), before);
        assert!(!session.is_loading());
    }

    #[test]
    fn cancelled_outcome_is_discarded() {
        let mut session = ready_session(&["a.png"]);
        session.begin_inference().unwrap();
        session.cancel();

        assert!(session.finish_inference(Ok(result_with(1, "late"))).is_err());
        assert!(session.result().is_none());
        assert!(!session.is_loading());

        session.begin_inference().unwrap();
        assert!(session.finish_inference(Ok(result_with(1, "fresh"))).is_ok());
    }

    #[test]
    fn model_list_drives_selection() {
        let mut session = Session::new();
        session.select_model("anything").unwrap();

        session.set_models(ModelsResponse {
            available: vec![
                ModelInfo { id: "ultra".into(), label: "YOLOv8 (preferred)".into() },
                ModelInfo { id: "hf".into(), label: "HuggingFace DETR (fallback)".into() },
            ],
            current: Some("hf".into()),
        });
        assert_eq!(session.model_id(), "hf");

        session.select_model("ultra").unwrap();
        assert_eq!(session.model_id(), "ultra");
        assert!(session.select_model("detr").is_err());
        assert_eq!(session.model_id(), "ultra");
    }
}

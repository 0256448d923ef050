use crate::models::backend_types::{HealthStatus, ModelInfo};
use crate::models::detection_types::{DefectClass, Detection, InferenceMeta, InferenceResult};
use crate::models::results_types::{ClassCount, SortOrder};
use crate::services::results_service;
use crate::services::session::Session;
use serde::Serialize;

/// Snapshot of the session handed to the window after every change.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionView {
    pub files: Vec<String>,
    pub models: Vec<ModelInfo>,
    pub model_id: String,
    pub conf_threshold: f64,
    pub iou_threshold: f64,
    pub nms: bool,
    pub class_filter: Vec<DefectClass>,
    pub classes: Vec<DefectClass>,
    pub health: HealthStatus,
    pub loading: bool,
    pub error: Option<String>,
    pub sort: SortOrder,
    pub can_run: bool,
    pub has_result: bool,
}

impl From<&Session> for SessionView {
    fn from(session: &Session) -> Self {
        Self {
            files: session.files().iter().map(|p| p.display().to_string()).collect(),
            models: session.models().to_vec(),
            model_id: session.model_id().to_string(),
            conf_threshold: session.conf_threshold(),
            iou_threshold: session.iou_threshold(),
            nms: session.nms(),
            class_filter: session.class_filter().iter().copied().collect(),
            classes: DefectClass::ALL.to_vec(),
            health: session.health(),
            loading: session.is_loading(),
            error: session.error().map(str::to_string),
            sort: session.sort(),
            can_run: session.can_run_inference(),
            has_result: session.result().is_some(),
        }
    }
}

/// Everything the results panel draws.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultsView {
    pub detections: Vec<Detection>,
    pub breakdown: Vec<ClassCount>,
    pub meta: InferenceMeta,
    /// `data:` URI for an `<img>`, absent when the backend sent no overlay.
    pub overlay_src: Option<String>,
    pub overlay_size: Option<(u32, u32)>,
}

impl ResultsView {
    pub fn new(result: &InferenceResult, order: SortOrder) -> Self {
        let overlay = result.overlay_png.trim();
        let overlay_src = match overlay {
            "" => None,
            uri if uri.starts_with("data:") => Some(uri.to_string()),
            raw => Some(format!("data:image/png;base64,{}", raw)),
        };

        Self {
            detections: results_service::sorted_detections(&result.detections, order)
                .into_iter()
                .cloned()
                .collect(),
            breakdown: results_service::class_breakdown(&result.detections),
            meta: result.meta.clone(),
            overlay_src,
            overlay_size: results_service::overlay_dimensions(result),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn det(class: &str, score: f64) -> Detection {
        Detection {
            class: class.to_string(),
            score,
            bbox: [1.0, 2.0, 3.0, 4.0],
            mask: None,
        }
    }

    fn result(overlay_png: &str) -> InferenceResult {
        InferenceResult {
            detections: vec![det("hole", 0.4), det("stain", 0.8), det("hole", 0.6)],
            meta: InferenceMeta {
                width: 64,
                height: 48,
                inference_ms: 12,
                kept: 3,
                discarded_below_threshold: 1,
            },
            overlay_png: overlay_png.to_string(),
        }
    }

    #[test]
    fn session_view_reflects_controls() {
        let mut session = Session::new();
        session.add_files(vec![PathBuf::from("roll-a.png")]).unwrap();
        session.toggle_class(DefectClass::Stain).unwrap();
        session.set_conf_threshold(0.6).unwrap();

        let view = SessionView::from(&session);
        assert_eq!(view.files, vec!["roll-a.png".to_string()]);
        assert_eq!(view.class_filter, vec![DefectClass::Stain]);
        assert_eq!(view.classes.len(), 6);
        assert_eq!(view.conf_threshold, 0.6);
        assert_eq!(view.health, HealthStatus::Unknown);
        assert!(!view.can_run);
        assert!(!view.has_result);

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["class_filter"], serde_json::json!(["stain"]));
        assert_eq!(json["sort"], "score");
    }

    #[test]
    fn results_view_orders_and_counts() {
        let view = ResultsView::new(&result(""), SortOrder::Score);
        let scores: Vec<f64> = view.detections.iter().map(|d| d.score).collect();
        assert_eq!(scores, vec![0.8, 0.6, 0.4]);
        assert_eq!(view.breakdown[0], ClassCount { class: "hole".to_string(), count: 2 });
        assert_eq!(view.overlay_src, None);
        assert_eq!(view.overlay_size, None);
    }

    #[test]
    fn overlay_becomes_a_data_uri() {
        let raw = ResultsView::new(&result("iVBORw0KGgo="), SortOrder::Class);
        assert_eq!(raw.overlay_src.as_deref(), Some("data:image/png;base64,iVBORw0KGgo="));

        let uri = ResultsView::new(&result("data:image/png;base64,AAAA"), SortOrder::Class);
        assert_eq!(uri.overlay_src.as_deref(), Some("data:image/png;base64,AAAA"));
    }
}

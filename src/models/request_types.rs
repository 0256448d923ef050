use crate::models::detection_types::DefectClass;
use std::collections::BTreeSet;
use std::path::PathBuf;

/// Everything one inference call needs. Built by the session from its current state.
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceRequest {
    pub file: PathBuf,
    pub model_id: String,
    pub conf_threshold: f64,
    pub iou_threshold: f64,
    pub nms: bool,
    pub class_filter: BTreeSet<DefectClass>,
}

impl InferenceRequest {
    /// Comma-joined filter in vocabulary order, `None` when every class is kept.
    pub fn class_filter_param(&self) -> Option<String> {
        if self.class_filter.is_empty() {
            return None;
        }
        Some(
            self.class_filter
                .iter()
                .map(|c| c.as_str())
                .collect::<Vec<_>>()
                .join(","),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(filter: &[DefectClass]) -> InferenceRequest {
        InferenceRequest {
            file: PathBuf::from("swatch.png"),
            model_id: "ultra".to_string(),
            conf_threshold: 0.35,
            iou_threshold: 0.45,
            nms: true,
            class_filter: filter.iter().copied().collect(),
        }
    }

    #[test]
    fn empty_filter_is_not_sent() {
        assert_eq!(request(&[]).class_filter_param(), None);
    }

    #[test]
    fn filter_is_joined_in_vocabulary_order() {
        let req = request(&[DefectClass::Other, DefectClass::Hole, DefectClass::Scratch]);
        assert_eq!(req.class_filter_param().as_deref(), Some("hole,scratch,other"));
    }
}

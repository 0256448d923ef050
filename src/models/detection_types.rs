use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The fixed defect vocabulary the backend labels detections with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefectClass {
    Hole,
    Stain,
    WeaveDefect,
    Scratch,
    ForeignFiber,
    Other,
}

impl DefectClass {
    pub const ALL: [DefectClass; 6] = [
        DefectClass::Hole,
        DefectClass::Stain,
        DefectClass::WeaveDefect,
        DefectClass::Scratch,
        DefectClass::ForeignFiber,
        DefectClass::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DefectClass::Hole => "hole",
            DefectClass::Stain => "stain",
            DefectClass::WeaveDefect => "weave_defect",
            DefectClass::Scratch => "scratch",
            DefectClass::ForeignFiber => "foreign_fiber",
            DefectClass::Other => "other",
        }
    }
}

impl fmt::Display for DefectClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DefectClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        DefectClass::ALL
            .into_iter()
            .find(|c| c.as_str() == wanted)
            .ok_or_else(|| {
                format!(
                    "Unknown defect class '{}'. Expected one of: {}",
                    s,
                    DefectClass::ALL.map(|c| c.as_str()).join(", ")
                )
            })
    }
}

/// One predicted defect instance.
///
/// `class` stays a plain string so that labels outside the known vocabulary
/// still round-trip through exports untouched. `bbox` holds the four numbers
/// exactly as the backend sent them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub class: String,
    pub score: f64,
    pub bbox: [f64; 4],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mask: Option<Vec<Vec<f64>>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceMeta {
    pub width: u32,
    pub height: u32,
    pub inference_ms: u64,
    pub kept: u64,
    pub discarded_below_threshold: u64,
}

/// Full response of one inference call. Replaced wholesale on every successful run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceResult {
    pub detections: Vec<Detection>,
    pub meta: InferenceMeta,
    pub overlay_png: String,
}

/// Shape of the JSON export: everything but the overlay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionExport {
    pub detections: Vec<Detection>,
    pub meta: InferenceMeta,
}

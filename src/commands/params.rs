use crate::error::AppError;
use crate::models::detection_types::DefectClass;
use crate::state::AppState;
use std::fmt::Write;

pub fn set_conf_threshold(state: &mut AppState, value: f64) -> Result<f64, AppError> {
    state.session.set_conf_threshold(value)
}

pub fn set_iou_threshold(state: &mut AppState, value: f64) -> Result<f64, AppError> {
    state.session.set_iou_threshold(value)
}

pub fn set_nms(state: &mut AppState, enabled: bool) -> Result<(), AppError> {
    state.session.set_nms(enabled)
}

pub fn toggle_class(state: &mut AppState, name: &str) -> Result<bool, AppError> {
    let class: DefectClass = name.parse()?;
    state.session.toggle_class(class)
}

pub fn clear_class_filter(state: &mut AppState) -> Result<(), AppError> {
    state.session.clear_class_filter()
}

pub fn select_model(state: &mut AppState, id: &str) -> Result<(), AppError> {
    state.session.select_model(id)
}

/// Accepts on/off style switches.
pub fn parse_switch(value: &str) -> Result<bool, AppError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "on" | "true" | "yes" | "1" => Ok(true),
        "off" | "false" | "no" | "0" => Ok(false),
        other => Err(format!("Expected on/off, got '{}'", other).into()),
    }
}

pub fn parse_threshold(value: &str) -> Result<f64, AppError> {
    value
        .trim()
        .parse::<f64>()
        .map_err(|_| format!("'{}' is not a number", value).into())
}

pub fn describe_params(state: &AppState) -> String {
    let session = &state.session;
    let mut out = String::new();

    let _ = writeln!(out, "  Model          : {}", session.model_id());
    let _ = writeln!(out, "  Confidence     : {:.2}", session.conf_threshold());
    let _ = writeln!(out, "  IoU            : {:.2}", session.iou_threshold());
    let _ = writeln!(out, "  NMS            : {}", if session.nms() { "on" } else { "off" });
    let filter = if session.class_filter().is_empty() {
        "all classes".to_string()
    } else {
        session
            .class_filter()
            .iter()
            .map(|c| c.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    };
    let _ = writeln!(out, "  Class filter   : {}", filter);
    out
}

pub fn describe_classes(state: &AppState) -> String {
    let filter = state.session.class_filter();
    let mut out = String::new();
    for class in DefectClass::ALL {
        let mark = if filter.contains(&class) { "x" } else { " " };
        let _ = writeln!(out, "  [{}] {}", mark, class);
    }
    if filter.is_empty() {
        let _ = writeln!(out, "  (no class selected: every class is kept)");
    }
    out
}

use crate::models::detection_types::{Detection, InferenceResult};
use crate::models::results_types::{ClassCount, SortOrder};
use crate::services::export_service;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt::Write;

/// Detections in display order. The sort is stable, so ties keep the backend's order.
pub fn sorted_detections(detections: &[Detection], order: SortOrder) -> Vec<&Detection> {
    let mut sorted: Vec<&Detection> = detections.iter().collect();
    match order {
        SortOrder::Score => {
            sorted.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal))
        }
        SortOrder::Class => sorted.sort_by(|a, b| a.class.cmp(&b.class)),
    }
    sorted
}

/// Detections per class, most frequent first, ties alphabetical.
pub fn class_breakdown(detections: &[Detection]) -> Vec<ClassCount> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for det in detections {
        *counts.entry(det.class.as_str()).or_default() += 1;
    }

    let mut breakdown: Vec<ClassCount> = counts
        .into_iter()
        .map(|(class, count)| ClassCount {
            class: class.to_string(),
            count,
        })
        .collect();
    breakdown.sort_by(|a, b| b.count.cmp(&a.count));
    breakdown
}

/// Size of the overlay image, if it decodes.
pub fn overlay_dimensions(result: &InferenceResult) -> Option<(u32, u32)> {
    let bytes = export_service::decode_overlay(&result.overlay_png).ok()?;
    let img = image::load_from_memory_with_format(&bytes, image::ImageFormat::Png).ok()?;
    Some((img.width(), img.height()))
}

pub fn format_bbox(bbox: &[f64; 4]) -> String {
    format!("[{}, {}, {}, {}]", bbox[0], bbox[1], bbox[2], bbox[3])
}

/// Text rendering of a result: metrics, overlay, class counts and the detection list.
pub fn render(result: &InferenceResult, order: SortOrder) -> String {
    let meta = &result.meta;
    let mut out = String::new();

    let _ = writeln!(out, "Results");
    let _ = writeln!(out, "  Inference time : {} ms", meta.inference_ms);
    let _ = writeln!(out, "  Kept           : {}", meta.kept);
    let _ = writeln!(out, "  Discarded      : {}", meta.discarded_below_threshold);
    let _ = writeln!(out, "  Image size     : {}x{}", meta.width, meta.height);
    match overlay_dimensions(result) {
        Some((w, h)) => {
            let _ = writeln!(out, "  Overlay        : {}x{} PNG", w, h);
        }
        None => {
            let _ = writeln!(out, "  Overlay        : unavailable");
        }
    }

    if result.detections.is_empty() {
        let _ = writeln!(out, "\nNo defects detected.");
        return out;
    }

    let _ = writeln!(out, "\nBy class");
    for entry in class_breakdown(&result.detections) {
        let _ = writeln!(out, "  {:<14} {}", entry.class, entry.count);
    }

    let sort_label = match order {
        SortOrder::Score => "score",
        SortOrder::Class => "class",
    };
    let _ = writeln!(out, "\nDetections (sorted by {})", sort_label);
    for (i, det) in sorted_detections(&result.detections, order).iter().enumerate() {
        let mask = if det.mask.is_some() { "  mask" } else { "" };
        let _ = writeln!(
            out,
            "  {:>3}. {:<14} {:>5.1}%  {}{}",
            i + 1,
            det.class,
            det.score * 100.0,
            format_bbox(&det.bbox),
            mask
        );
    }

    out
}

use crate::error::AppError;
use crate::models::detection_types::{DetectionExport, InferenceResult};
use crate::models::results_types::ExportKind;
use base64::Engine;
use image::ImageFormat;
use std::path::{Path, PathBuf};

const FILE_PREFIX: &str = "fabric-defects";

/// Milliseconds since the Unix epoch, used to stamp export file names.
pub fn timestamp_ms() -> u128 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}

pub fn export_file_name(kind: ExportKind, timestamp: u128) -> String {
    format!("{}-{}.{}", FILE_PREFIX, timestamp, kind.extension())
}

/// Decode the base64 overlay into PNG bytes. A `data:` URI prefix is tolerated.
pub fn decode_overlay(overlay_png: &str) -> Result<Vec<u8>, AppError> {
    let encoded = match overlay_png.split_once("base64,") {
        Some((prefix, data)) if prefix.starts_with("data:") => data,
        _ => overlay_png,
    };
    let bytes = base64::engine::general_purpose::STANDARD.decode(encoded.trim())?;

    match image::guess_format(&bytes) {
        Ok(ImageFormat::Png) => Ok(bytes),
        Ok(other) => Err(AppError::decode(format!(
            "Overlay is {:?}, expected PNG",
            other
        ))),
        Err(_) => Err(AppError::decode("Overlay is not a PNG image")),
    }
}

pub fn export_json_string(result: &InferenceResult) -> Result<String, AppError> {
    let export = DetectionExport {
        detections: result.detections.clone(),
        meta: result.meta.clone(),
    };
    Ok(serde_json::to_string_pretty(&export)?)
}

/// Write the requested exports into `dir`, all sharing one timestamp.
pub fn export(
    result: &InferenceResult,
    kinds: &[ExportKind],
    dir: &Path,
) -> Result<Vec<PathBuf>, AppError> {
    std::fs::create_dir_all(dir).map_err(|e| {
        AppError::new(
            crate::error::ErrorKind::Io,
            format!("Failed to create export directory {}: {}", dir.display(), e),
        )
    })?;

    let stamp = timestamp_ms();
    let mut written = Vec::with_capacity(kinds.len());

    for kind in kinds {
        let contents = match kind {
            ExportKind::Png => decode_overlay(&result.overlay_png)?,
            ExportKind::Json => export_json_string(result)?.into_bytes(),
        };
        let path = dir.join(export_file_name(*kind, stamp));
        std::fs::write(&path, contents)?;
        tracing::info!(path = %path.display(), "exported");
        written.push(path);
    }

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::detection_types::{DefectClass, Detection, InferenceMeta};
    use image::{ImageBuffer, Rgba};
    use std::io::Cursor;

    fn png_base64(width: u32, height: u32) -> String {
        let img: ImageBuffer<Rgba<u8>, Vec<u8>> =
            ImageBuffer::from_pixel(width, height, Rgba([200, 10, 10, 255]));
        let mut bytes = Cursor::new(Vec::new());
        img.write_to(&mut bytes, ImageFormat::Png).unwrap();
        base64::engine::general_purpose::STANDARD.encode(bytes.into_inner())
    }

    fn sample_result() -> InferenceResult {
        InferenceResult {
            detections: vec![
                Detection {
                    class: "hole".to_string(),
                    score: 0.9,
                    bbox: [12.0, 8.0, 30.0, 22.5],
                    mask: Some(vec![vec![12.0, 8.0], vec![42.0, 8.0], vec![42.0, 30.5]]),
                },
                Detection {
                    class: "stain".to_string(),
                    score: 0.95,
                    bbox: [1.0, 2.0, 3.0, 4.0],
                    mask: None,
                },
            ],
            meta: InferenceMeta {
                width: 4,
                height: 3,
                inference_ms: 118,
                kept: 2,
                discarded_below_threshold: 5,
            },
            overlay_png: png_base64(4, 3),
        }
    }

    #[test]
    fn file_names_follow_the_pattern() {
        assert_eq!(export_file_name(ExportKind::Png, 1700000000123), "fabric-defects-1700000000123.png");
        assert_eq!(export_file_name(ExportKind::Json, 5), "fabric-defects-5.json");
    }

    #[test]
    fn overlay_accepts_data_uri() {
        let raw = png_base64(2, 2);
        let plain = decode_overlay(&raw).unwrap();
        let uri = decode_overlay(&format!("data:image/png;base64,{}", raw)).unwrap();
        assert_eq!(plain, uri);
    }

    #[test]
    fn overlay_must_be_png() {
        let jpeg_magic = base64::engine::general_purpose::STANDARD.encode([0xFF, 0xD8, 0xFF, 0xE0, 0, 0]);
        assert!(decode_overlay(&jpeg_magic).is_err());
        assert!(decode_overlay("%%% not base64").is_err());
    }

    #[test]
    fn json_export_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let result = sample_result();

        let written = export(&result, &[ExportKind::Json], dir.path()).unwrap();
        assert_eq!(written.len(), 1);
        let text = std::fs::read_to_string(&written[0]).unwrap();
        assert!(text.contains("\n  \"detections\""), "export should be pretty-printed");

        let parsed: DetectionExport = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed.detections, result.detections);
        assert_eq!(parsed.meta, result.meta);

        let raw: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert!(raw.get("overlay_png").is_none());
    }

    #[test]
    fn json_export_keeps_every_float_bit_for_bit() {
        let mut seed: u64 = 0x9E37_79B9_7F4A_7C15;
        let mut next = move |scale: f64| {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            (seed >> 11) as f64 / (1u64 << 53) as f64 * scale
        };

        let detections: Vec<Detection> = (0..20_000)
            .map(|i| Detection {
                class: DefectClass::ALL[i % DefectClass::ALL.len()].to_string(),
                score: next(1.0),
                bbox: [next(4096.0), next(4096.0), next(512.0), next(512.0)],
                mask: None,
            })
            .collect();
        let result = InferenceResult {
            detections,
            meta: InferenceMeta {
                width: 4096,
                height: 4096,
                inference_ms: 7,
                kept: 20_000,
                discarded_below_threshold: 0,
            },
            overlay_png: String::new(),
        };

        let parsed: DetectionExport = serde_json::from_str(&export_json_string(&result).unwrap()).unwrap();
        let mismatched = parsed
            .detections
            .iter()
            .zip(&result.detections)
            .filter(|(back, sent)| {
                back.score.to_bits() != sent.score.to_bits()
                    || back.bbox.iter().zip(&sent.bbox).any(|(a, b)| a.to_bits() != b.to_bits())
            })
            .count();
        assert_eq!(mismatched, 0);
    }

    #[test]
    fn png_export_writes_decoded_overlay() {
        let dir = tempfile::tempdir().unwrap();
        let result = sample_result();

        let written = export(&result, &[ExportKind::Png, ExportKind::Json], dir.path()).unwrap();
        assert_eq!(written.len(), 2);
        assert_eq!(written[0].extension().unwrap(), "png");
        assert_eq!(written[1].extension().unwrap(), "json");
        assert_eq!(written[0].file_stem(), written[1].file_stem());

        let img = image::open(&written[0]).unwrap();
        assert_eq!((img.width(), img.height()), (4, 3));
    }
}

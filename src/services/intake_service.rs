use crate::error::AppError;
use image::ImageFormat;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Size the backend accepts per upload. Not enforced here, only reported.
pub const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IntakeOutcome {
    pub accepted: Vec<PathBuf>,
    pub skipped: Vec<SkippedFile>,
}

/// MIME type derived from the file extension, only for image formats.
pub fn image_mime_type(path: &Path) -> Option<&'static str> {
    ImageFormat::from_path(path)
        .ok()
        .map(|format| format.to_mime_type())
        .filter(|mime| mime.starts_with("image/"))
}

pub fn is_image_file(path: &Path) -> bool {
    image_mime_type(path).is_some()
}

/// Resolve user-supplied paths into the image files to queue.
///
/// A directory contributes its direct image children sorted by name.
/// Anything that is not an image is reported in `skipped` instead of failing the batch.
pub fn collect_images<P: AsRef<Path>>(paths: &[P]) -> IntakeOutcome {
    let mut outcome = IntakeOutcome::default();

    for path in paths {
        let path = path.as_ref();
        if path.is_dir() {
            match list_image_files(path) {
                Ok(images) => {
                    if images.is_empty() {
                        tracing::warn!(dir = %path.display(), "directory contains no images");
                    }
                    outcome.accepted.extend(images);
                }
                Err(e) => outcome.skipped.push(SkippedFile {
                    path: path.to_path_buf(),
                    reason: e.message,
                }),
            }
        } else if !path.exists() {
            outcome.skipped.push(SkippedFile {
                path: path.to_path_buf(),
                reason: "file does not exist".to_string(),
            });
        } else if is_image_file(path) {
            outcome.accepted.push(path.to_path_buf());
        } else {
            outcome.skipped.push(SkippedFile {
                path: path.to_path_buf(),
                reason: "not an image file".to_string(),
            });
        }
    }

    for skipped in &outcome.skipped {
        tracing::warn!(path = %skipped.path.display(), reason = %skipped.reason, "skipping file");
    }
    for path in &outcome.accepted {
        warn_if_oversized(path);
    }

    outcome
}

pub fn list_image_files(dir: &Path) -> Result<Vec<PathBuf>, AppError> {
    let read_dir = std::fs::read_dir(dir).map_err(|e| {
        AppError::input(format!("Cannot read directory {}: {}", dir.display(), e))
    })?;

    let mut images: Vec<PathBuf> = read_dir
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|ft| ft.is_file()).unwrap_or(false))
        .map(|entry| entry.path())
        .filter(|path| is_image_file(path))
        .collect();

    images.sort();
    Ok(images)
}

fn warn_if_oversized(path: &Path) {
    let size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
    if size > MAX_UPLOAD_BYTES {
        tracing::warn!(
            path = %path.display(),
            size,
            "file exceeds the backend's 10MB upload limit and will likely be rejected"
        );
    }
}

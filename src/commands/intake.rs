use crate::error::AppError;
use crate::services::intake_service::{self, IntakeOutcome};
use crate::state::AppState;
use std::fmt::Write;
use std::path::PathBuf;

pub fn add_files(state: &mut AppState, paths: &[PathBuf]) -> Result<IntakeOutcome, AppError> {
    if paths.is_empty() {
        return Err("Give at least one file or directory".into());
    }
    let outcome = intake_service::collect_images(paths);
    state.session.add_files(outcome.accepted.clone())?;
    Ok(outcome)
}

pub fn remove_file(state: &mut AppState, index: usize) -> Result<PathBuf, AppError> {
    state.session.remove_file(index)
}

pub fn clear_files(state: &mut AppState) -> Result<(), AppError> {
    state.session.clear_files()
}

pub fn list_files(state: &AppState) -> String {
    let files = state.session.files();
    if files.is_empty() {
        return "No images queued. Use 'add <path>' (PNG, JPEG, WebP; backend limit 10MB).".to_string();
    }

    let mut out = String::new();
    for (i, path) in files.iter().enumerate() {
        let size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        let marker = if i == 0 { "  <- submitted" } else { "" };
        let _ = writeln!(out, "  [{}] {} ({:.1} KB){}", i, path.display(), size as f64 / 1024.0, marker);
    }
    if files.len() > 1 {
        let _ = writeln!(out, "  Only the first image is sent per run.");
    }
    out
}

pub fn describe_outcome(outcome: &IntakeOutcome) -> String {
    let mut msg = format!("Added {} image(s)", outcome.accepted.len());
    if !outcome.skipped.is_empty() {
        let _ = write!(msg, ", skipped {}", outcome.skipped.len());
        for skipped in &outcome.skipped {
            let _ = write!(msg, "\n  {}: {}", skipped.path.display(), skipped.reason);
        }
    }
    msg
}

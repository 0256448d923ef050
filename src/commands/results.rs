use crate::error::AppError;
use crate::models::results_types::{ExportFormat, ExportKind, SortOrder};
use crate::services::{export_service, results_service};
use crate::state::AppState;
use std::path::{Path, PathBuf};

fn no_result() -> AppError {
    AppError::input("No results yet. Run an inference first.")
}

pub fn show_results(state: &AppState) -> Result<String, AppError> {
    let result = state.session.result().ok_or_else(no_result)?;
    Ok(results_service::render(result, state.session.sort()))
}

pub fn set_sort(state: &mut AppState, order: SortOrder) {
    state.session.set_sort(order);
}

/// Parses `png`, `json` or `all`.
pub fn parse_export_format(value: &str) -> Result<ExportFormat, AppError> {
    Ok(value.parse::<ExportFormat>()?)
}

/// Synthesizes the downloads from the result already in the session; no network involved.
pub fn export_results(
    state: &AppState,
    kinds: &[ExportKind],
    dir: &Path,
) -> Result<Vec<PathBuf>, AppError> {
    let result = state.session.result().ok_or_else(no_result)?;
    export_service::export(result, kinds, dir)
}

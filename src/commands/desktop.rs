use crate::commands::inference;
use crate::error::AppError;
use crate::models::backend_types::HealthStatus;
use crate::models::detection_types::DefectClass;
use crate::models::results_types::{ExportFormat, SortOrder};
use crate::models::view_types::{ResultsView, SessionView};
use crate::services::export_service;
use crate::services::inference_client::InferenceClient;
use crate::services::intake_service::{self, IntakeOutcome};
use crate::services::session::Session;
use std::path::PathBuf;
use tauri::{AppHandle, State};
use tauri_plugin_dialog::DialogExt;
use tokio::sync::Mutex;

pub type SharedSession = Mutex<Session>;

async fn add_paths(session: &SharedSession, paths: Vec<PathBuf>) -> Result<IntakeOutcome, AppError> {
    let outcome = intake_service::collect_images(&paths);
    session.lock().await.add_files(outcome.accepted.clone())?;
    Ok(outcome)
}

async fn view(session: &SharedSession) -> SessionView {
    SessionView::from(&*session.lock().await)
}

#[tauri::command]
pub async fn get_session(session: State<'_, SharedSession>) -> Result<SessionView, AppError> {
    Ok(view(&session).await)
}

#[tauri::command]
pub async fn check_health(
    client: State<'_, InferenceClient>,
    session: State<'_, SharedSession>,
) -> Result<HealthStatus, AppError> {
    let status = inference::query_health(&client).await;
    session.lock().await.set_health(status);
    Ok(status)
}

#[tauri::command]
pub async fn get_models(
    client: State<'_, InferenceClient>,
    session: State<'_, SharedSession>,
) -> Result<SessionView, AppError> {
    let models = client.get_models().await?;
    let mut session = session.lock().await;
    session.set_models(models);
    Ok(SessionView::from(&*session))
}

/// Click-to-browse intake. Closing the dialog adds nothing.
#[tauri::command]
pub async fn pick_files(app: AppHandle, session: State<'_, SharedSession>) -> Result<IntakeOutcome, AppError> {
    let picked = app
        .dialog()
        .file()
        .set_title("Select fabric images")
        .add_filter("Images", &["png", "jpg", "jpeg", "webp"])
        .blocking_pick_files();

    let paths: Vec<PathBuf> = picked
        .unwrap_or_default()
        .into_iter()
        .filter_map(|p| p.into_path().ok())
        .collect();
    add_paths(&session, paths).await
}

/// Paths dropped onto the window.
#[tauri::command]
pub async fn add_files(session: State<'_, SharedSession>, paths: Vec<String>) -> Result<IntakeOutcome, AppError> {
    add_paths(&session, paths.into_iter().map(PathBuf::from).collect()).await
}

#[tauri::command]
pub async fn remove_file(session: State<'_, SharedSession>, index: usize) -> Result<SessionView, AppError> {
    let mut session = session.lock().await;
    session.remove_file(index)?;
    Ok(SessionView::from(&*session))
}

#[tauri::command]
pub async fn clear_files(session: State<'_, SharedSession>) -> Result<SessionView, AppError> {
    let mut session = session.lock().await;
    session.clear_files()?;
    Ok(SessionView::from(&*session))
}

#[tauri::command]
pub async fn set_params(
    session: State<'_, SharedSession>,
    conf_threshold: f64,
    iou_threshold: f64,
    nms: bool,
) -> Result<SessionView, AppError> {
    let mut session = session.lock().await;
    session.set_conf_threshold(conf_threshold)?;
    session.set_iou_threshold(iou_threshold)?;
    session.set_nms(nms)?;
    Ok(SessionView::from(&*session))
}

#[tauri::command]
pub async fn toggle_class(session: State<'_, SharedSession>, class: DefectClass) -> Result<SessionView, AppError> {
    let mut session = session.lock().await;
    session.toggle_class(class)?;
    Ok(SessionView::from(&*session))
}

#[tauri::command]
pub async fn clear_class_filter(session: State<'_, SharedSession>) -> Result<SessionView, AppError> {
    let mut session = session.lock().await;
    session.clear_class_filter()?;
    Ok(SessionView::from(&*session))
}

#[tauri::command]
pub async fn select_model(session: State<'_, SharedSession>, model_id: String) -> Result<SessionView, AppError> {
    let mut session = session.lock().await;
    session.select_model(&model_id)?;
    Ok(SessionView::from(&*session))
}

#[tauri::command]
pub async fn run_inference(
    client: State<'_, InferenceClient>,
    session: State<'_, SharedSession>,
) -> Result<ResultsView, AppError> {
    let result = inference::run_inference_shared(&client, &session).await?;
    let order = session.lock().await.sort();
    Ok(ResultsView::new(&result, order))
}

#[tauri::command]
pub async fn cancel_inference(session: State<'_, SharedSession>) -> Result<(), AppError> {
    session.lock().await.cancel();
    Ok(())
}

#[tauri::command]
pub async fn get_results(
    session: State<'_, SharedSession>,
    sort: Option<SortOrder>,
) -> Result<Option<ResultsView>, AppError> {
    let mut session = session.lock().await;
    if let Some(order) = sort {
        session.set_sort(order);
    }
    Ok(session.result().map(|r| ResultsView::new(r, session.sort())))
}

/// Writes the downloads into a folder the user picks. Cancelling the dialog writes nothing.
#[tauri::command]
pub async fn export_results(
    app: AppHandle,
    session: State<'_, SharedSession>,
    format: ExportFormat,
) -> Result<Vec<String>, AppError> {
    let result = session
        .lock()
        .await
        .result()
        .cloned()
        .ok_or_else(|| AppError::input("No results yet. Run an inference first."))?;

    let Some(folder) = app.dialog().file().set_title("Export results").blocking_pick_folder() else {
        return Ok(Vec::new());
    };
    let dir = folder
        .into_path()
        .map_err(|_| AppError::input("Export folder is not a local path"))?;

    let written = export_service::export(&result, format.kinds(), &dir)?;
    Ok(written.into_iter().map(|p| p.display().to_string()).collect())
}

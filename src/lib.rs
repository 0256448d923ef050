mod commands;
mod config;
mod error;
mod models;
mod services;
mod state;

pub use commands::inference::run_inference_shared;
pub use config::{AppConfig, Contract};
pub use error::{AppError, ErrorKind};
pub use models::backend_types::{HealthResponse, HealthStatus, ModelInfo, ModelsResponse};
pub use models::detection_types::{DefectClass, Detection, DetectionExport, InferenceMeta, InferenceResult};
pub use models::request_types::InferenceRequest;
pub use models::results_types::{ExportFormat, ExportKind, SortOrder};
pub use models::view_types::{ResultsView, SessionView};
pub use services::inference_client::InferenceClient;
pub use services::session::Session;

use clap::{Args, Parser, Subcommand};
use commands::console::InteractiveConsole;
use commands::{inference, intake, params, results};
use config::{DEFAULT_BACKEND_URL, DEFAULT_TIMEOUT_SECS};
use services::session::{DEFAULT_CONF_THRESHOLD, DEFAULT_IOU_THRESHOLD};
use state::AppState;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fabric-lens")]
#[command(about = "Detect fabric defects with a remote inference service", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Base URL of the inference backend
    #[arg(long, env = "FABRIC_LENS_BACKEND", default_value = DEFAULT_BACKEND_URL, global = true)]
    backend: String,

    /// Endpoint shape the backend speaks
    #[arg(long, env = "FABRIC_LENS_CONTRACT", value_enum, default_value_t = Contract::Full, global = true)]
    contract: Contract,

    /// Per-request timeout in seconds
    #[arg(long, env = "FABRIC_LENS_TIMEOUT_SECS", default_value_t = DEFAULT_TIMEOUT_SECS, global = true)]
    timeout_secs: u64,

    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Check whether the backend is up and has a model loaded
    Health,
    /// List the models the backend offers
    Models,
    /// Run detection on the first of the given images
    Detect(DetectArgs),
    /// Interactive terminal session (default when built without the desktop shell)
    Console {
        /// Where exports are written
        #[arg(long, default_value = ".")]
        export_dir: PathBuf,
    },
}

#[derive(Args)]
struct DetectArgs {
    /// Image files or directories; only the first image is submitted
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    #[arg(long, default_value_t = DEFAULT_CONF_THRESHOLD)]
    conf: f64,

    #[arg(long, default_value_t = DEFAULT_IOU_THRESHOLD)]
    iou: f64,

    /// Disable non-max suppression
    #[arg(long)]
    no_nms: bool,

    /// Keep only these classes (repeatable)
    #[arg(long = "class", value_name = "CLASS")]
    classes: Vec<DefectClass>,

    /// Model id, defaults to the backend's current model
    #[arg(long)]
    model: Option<String>,

    #[arg(long, value_enum, default_value_t = SortOrder::Score)]
    sort: SortOrder,

    /// Export the result once it arrives
    #[arg(long, value_enum, value_name = "FORMAT")]
    export: Option<ExportFormat>,

    #[arg(long, default_value = ".")]
    export_dir: PathBuf,
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(feature = "desktop")]
fn run_desktop(config: AppConfig) -> Result<(), AppError> {
    use commands::desktop;

    let client = InferenceClient::new(config)?;

    tauri::Builder::default()
        .plugin(tauri_plugin_dialog::init())
        .plugin(tauri_plugin_window_state::Builder::default().build())
        .manage(client)
        .manage(desktop::SharedSession::new(Session::new()))
        .invoke_handler(tauri::generate_handler![
            desktop::get_session,
            desktop::check_health,
            desktop::get_models,
            desktop::pick_files,
            desktop::add_files,
            desktop::remove_file,
            desktop::clear_files,
            desktop::set_params,
            desktop::toggle_class,
            desktop::clear_class_filter,
            desktop::select_model,
            desktop::run_inference,
            desktop::cancel_inference,
            desktop::get_results,
            desktop::export_results,
        ])
        .run(tauri::generate_context!())
        .map_err(|e| AppError::new(ErrorKind::Io, format!("Desktop shell failed: {}", e)))
}

pub fn run() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    #[cfg(feature = "desktop")]
    if cli.command.is_none() {
        let outcome = AppConfig::new(&cli.backend, cli.contract, cli.timeout_secs).and_then(run_desktop);
        if let Err(e) = outcome {
            eprintln!("error: {}", e);
            std::process::exit(1);
        }
        return;
    }

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("error: failed to start async runtime: {}", e);
            std::process::exit(1);
        }
    };

    let outcome = runtime.block_on(execute(cli));
    // A console read may still be parked on stdin.
    runtime.shutdown_background();

    if let Err(e) = outcome {
        tracing::debug!(kind = ?e.kind, "command failed");
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

async fn execute(cli: Cli) -> Result<(), AppError> {
    let config = AppConfig::new(&cli.backend, cli.contract, cli.timeout_secs)?;
    let mut state = AppState::new(config)?;

    match cli.command {
        Some(Command::Health) => show_health(&state).await,
        Some(Command::Models) => show_models(&state).await,
        Some(Command::Detect(args)) => detect(&mut state, args).await,
        Some(Command::Console { export_dir }) => InteractiveConsole::new(state, export_dir).run().await,
        None => InteractiveConsole::new(state, PathBuf::from(".")).run().await,
    }
}

async fn show_health(state: &AppState) -> Result<(), AppError> {
    let health = state.client.check_health().await?;
    println!("status         : {}", health.status);
    println!("model loaded   : {}", health.model_loaded);
    println!("backend        : {}", health.backend.as_deref().unwrap_or("-"));
    println!("yolo available : {}", health.yolo_available);
    println!("hf available   : {}", health.hf_available);

    if health.is_ready() {
        Ok(())
    } else {
        Err(AppError::connectivity("Inference service is not ready"))
    }
}

async fn show_models(state: &AppState) -> Result<(), AppError> {
    let models = state.client.get_models().await?;
    if models.available.is_empty() {
        println!("No models available");
    }
    for model in &models.available {
        let mark = if models.current.as_deref() == Some(model.id.as_str()) { "*" } else { " " };
        println!("{} {:<8} {}", mark, model.id, model.label);
    }
    Ok(())
}

async fn detect(state: &mut AppState, args: DetectArgs) -> Result<(), AppError> {
    if inference::startup(state).await != HealthStatus::Healthy {
        return Err(AppError::connectivity(format!(
            "Inference service is unavailable at {}",
            state.client.config().backend_url
        )));
    }

    let outcome = intake::add_files(state, &args.paths)?;
    for skipped in &outcome.skipped {
        eprintln!("skipped {}: {}", skipped.path.display(), skipped.reason);
    }
    if outcome.accepted.is_empty() {
        return Err(AppError::input("None of the given paths is an image"));
    }
    if outcome.accepted.len() > 1 {
        eprintln!(
            "note: {} images queued, only {} is submitted",
            outcome.accepted.len(),
            outcome.accepted[0].display()
        );
    }

    if let Some(model) = args.model.as_deref() {
        params::select_model(state, model)?;
    }
    params::set_conf_threshold(state, args.conf)?;
    params::set_iou_threshold(state, args.iou)?;
    params::set_nms(state, !args.no_nms)?;
    for class in args.classes {
        if !state.session.class_filter().contains(&class) {
            state.session.toggle_class(class)?;
        }
    }
    results::set_sort(state, args.sort);

    inference::run_inference(state).await?;
    println!("{}", results::show_results(state)?);

    if let Some(format) = args.export {
        for path in results::export_results(state, format.kinds(), &args.export_dir)? {
            println!("wrote {}", path.display());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn detect_arguments_parse() {
        let cli = Cli::try_parse_from([
            "fabric-lens",
            "--backend",
            "http://inspect.local:8000",
            "detect",
            "roll-17.png",
            "--conf",
            "0.5",
            "--no-nms",
            "--class",
            "hole",
            "--class",
            "weave_defect",
            "--sort",
            "class",
            "--export",
            "all",
        ])
        .unwrap();

        assert_eq!(cli.backend, "http://inspect.local:8000");
        assert_eq!(cli.contract, Contract::Full);
        match cli.command {
            Some(Command::Detect(args)) => {
                assert_eq!(args.paths, vec![PathBuf::from("roll-17.png")]);
                assert_eq!(args.conf, 0.5);
                assert_eq!(args.iou, DEFAULT_IOU_THRESHOLD);
                assert!(args.no_nms);
                assert_eq!(args.classes, vec![DefectClass::Hole, DefectClass::WeaveDefect]);
                assert_eq!(args.sort, SortOrder::Class);
                assert_eq!(args.export, Some(ExportFormat::All));
            }
            _ => panic!("expected detect"),
        }
    }

    #[test]
    fn unknown_export_format_is_rejected_before_any_request() {
        assert!(Cli::try_parse_from(["fabric-lens", "detect", "a.png", "--export", "gif"]).is_err());
        let cli = Cli::try_parse_from(["fabric-lens", "detect", "a.png", "--export", "both"]).unwrap();
        match cli.command {
            Some(Command::Detect(args)) => assert_eq!(args.export, Some(ExportFormat::All)),
            _ => panic!("expected detect"),
        }
    }

    #[test]
    fn unknown_class_is_rejected() {
        assert!(Cli::try_parse_from(["fabric-lens", "detect", "a.png", "--class", "tear"]).is_err());
    }

    #[test]
    fn minimal_contract_can_be_selected() {
        let cli = Cli::try_parse_from(["fabric-lens", "--contract", "minimal", "health"]).unwrap();
        assert_eq!(cli.contract, Contract::Minimal);
    }
}

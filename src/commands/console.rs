// Interactive console: one session, many runs.

use crate::commands::{inference, intake, params, results};
use crate::error::AppError;
use crate::models::backend_types::HealthStatus;
use crate::models::results_types::SortOrder;
use crate::state::AppState;
use std::future::Future;
use std::io::{self, Write};
use std::path::PathBuf;
use std::pin::Pin;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

/// Produces a future that resolves when the user interrupts (Ctrl-C).
pub type Interrupt = Box<dyn Fn() -> Pin<Box<dyn Future<Output = ()>>>>;

#[derive(Debug, PartialEq)]
pub enum CommandResult {
    Continue,
    Exit,
    Success(String),
    Output(String),
    Error(String),
}

#[derive(Debug, PartialEq)]
pub enum ConsoleInput {
    Line(String),
    Eof,
    Interrupted,
}

pub struct InteractiveConsole {
    state: AppState,
    export_dir: PathBuf,
    interrupt: Interrupt,
}

impl InteractiveConsole {
    pub fn new(state: AppState, export_dir: PathBuf) -> Self {
        Self::with_interrupt(state, export_dir, Box::new(|| Box::pin(inference::interrupted())))
    }

    pub fn with_interrupt(state: AppState, export_dir: PathBuf, interrupt: Interrupt) -> Self {
        Self {
            state,
            export_dir,
            interrupt,
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub async fn run(&mut self) -> Result<(), AppError> {
        self.run_with(BufReader::new(tokio::io::stdin())).await
    }

    /// Ctrl-C while a run is in flight cancels that run; at the prompt it ends the session.
    pub async fn run_with<R>(&mut self, mut input: R) -> Result<(), AppError>
    where
        R: AsyncBufRead + Unpin,
    {
        self.print_banner();

        let health = inference::startup(&mut self.state).await;
        println!("Inference service: {}", health);
        if !self.state.session.models().is_empty() {
            println!("Model: {}", self.state.session.model_id());
        }
        println!("Type 'help' for available commands, 'quit' to exit\n");

        loop {
            print!("{}> ", self.prompt());
            io::stdout().flush()?;

            let line = match self.read_command(&mut input).await? {
                ConsoleInput::Line(line) => line,
                ConsoleInput::Eof => break,
                ConsoleInput::Interrupted => {
                    println!();
                    break;
                }
            };

            match self.handle_command(&line).await {
                CommandResult::Continue => continue,
                CommandResult::Exit => break,
                CommandResult::Success(msg) => {
                    if !msg.is_empty() {
                        println!("ok: {}", msg);
                    }
                }
                CommandResult::Output(output) => println!("{}", output),
                CommandResult::Error(msg) => println!("error: {}", msg),
            }
        }

        println!("Bye.");
        Ok(())
    }

    /// Next command line, unless input ends or the user interrupts first.
    pub async fn read_command<R>(&self, input: &mut R) -> Result<ConsoleInput, AppError>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut line = String::new();
        tokio::select! {
            read = input.read_line(&mut line) => {
                if read? == 0 {
                    Ok(ConsoleInput::Eof)
                } else {
                    Ok(ConsoleInput::Line(line.trim().to_string()))
                }
            }
            _ = (self.interrupt)() => Ok(ConsoleInput::Interrupted),
        }
    }

    fn print_banner(&self) {
        println!("fabric-lens console");
        println!("Backend: {}", self.state.client.config().backend_url);
    }

    fn prompt(&self) -> String {
        let session = &self.state.session;
        let health = match session.health() {
            HealthStatus::Healthy => "up",
            HealthStatus::Unhealthy => "down",
            HealthStatus::Unknown => "?",
        };
        format!("fabric[{}|{} file(s)]", health, session.files().len())
    }

    pub async fn handle_command(&mut self, line: &str) -> CommandResult {
        let parts: Vec<&str> = line.split_whitespace().collect();
        let Some((command, args)) = parts.split_first() else {
            return CommandResult::Continue;
        };

        match self.dispatch(command, args).await {
            Ok(result) => result,
            Err(e) => CommandResult::Error(e.message),
        }
    }

    async fn dispatch(&mut self, command: &str, args: &[&str]) -> Result<CommandResult, AppError> {
        let state = &mut self.state;

        let result = match command.to_ascii_lowercase().as_str() {
            "help" | "?" => CommandResult::Output(help_text()),
            "quit" | "exit" | "q" => CommandResult::Exit,

            "health" => {
                let status = inference::check_health(state).await;
                CommandResult::Output(format!("Inference service: {}", status))
            }
            "models" => {
                let models = inference::load_models(state).await?.to_vec();
                if models.is_empty() {
                    CommandResult::Output("No models available".to_string())
                } else {
                    let current = state.session.model_id();
                    let lines: Vec<String> = models
                        .iter()
                        .map(|m| {
                            let mark = if m.id == current { "*" } else { " " };
                            format!(" {} {:<8} {}", mark, m.id, m.label)
                        })
                        .collect();
                    CommandResult::Output(lines.join("\n"))
                }
            }
            "model" => {
                let id = first_arg(args, "model <id>")?;
                params::select_model(state, id)?;
                CommandResult::Success(format!("model set to {}", id))
            }

            "add" => {
                let paths: Vec<PathBuf> = args.iter().map(PathBuf::from).collect();
                let outcome = intake::add_files(state, &paths)?;
                CommandResult::Success(intake::describe_outcome(&outcome))
            }
            "remove" | "rm" => {
                let raw = first_arg(args, "remove <index>")?;
                let index: usize = raw
                    .parse()
                    .map_err(|_| AppError::input(format!("'{}' is not a valid index", raw)))?;
                let removed = intake::remove_file(state, index)?;
                CommandResult::Success(format!("removed {}", removed.display()))
            }
            "clear" => {
                intake::clear_files(state)?;
                CommandResult::Success("file list cleared".to_string())
            }
            "files" | "ls" => CommandResult::Output(intake::list_files(state)),

            "conf" => {
                let value = params::parse_threshold(first_arg(args, "conf <0.00-1.00>")?)?;
                let set = params::set_conf_threshold(state, value)?;
                CommandResult::Success(format!("confidence threshold {:.2}", set))
            }
            "iou" => {
                let value = params::parse_threshold(first_arg(args, "iou <0.00-1.00>")?)?;
                let set = params::set_iou_threshold(state, value)?;
                CommandResult::Success(format!("IoU threshold {:.2}", set))
            }
            "nms" => {
                let enabled = match args.first() {
                    Some(value) => params::parse_switch(value)?,
                    None => !state.session.nms(),
                };
                params::set_nms(state, enabled)?;
                CommandResult::Success(format!("NMS {}", if enabled { "on" } else { "off" }))
            }
            "class" => {
                let name = first_arg(args, "class <name>|clear")?;
                if name.eq_ignore_ascii_case("clear") {
                    params::clear_class_filter(state)?;
                    CommandResult::Success("class filter cleared".to_string())
                } else {
                    let included = params::toggle_class(state, name)?;
                    CommandResult::Success(format!(
                        "{} {}",
                        name.to_ascii_lowercase(),
                        if included { "selected" } else { "deselected" }
                    ))
                }
            }
            "classes" => CommandResult::Output(params::describe_classes(state)),
            "params" => CommandResult::Output(params::describe_params(state)),

            "status" => CommandResult::Output(status_text(state)),
            "run" => {
                println!("Running inference (Ctrl-C to cancel)...");
                inference::run_inference_until(state, (self.interrupt)()).await?;
                CommandResult::Output(results::show_results(state)?)
            }
            "show" => CommandResult::Output(results::show_results(state)?),
            "sort" => {
                let order: SortOrder = first_arg(args, "sort score|class")?.parse()?;
                results::set_sort(state, order);
                match results::show_results(state) {
                    Ok(view) => CommandResult::Output(view),
                    Err(_) => CommandResult::Success("sort order updated".to_string()),
                }
            }
            "export" => {
                let format = results::parse_export_format(args.first().copied().unwrap_or("all"))?;
                let dir = args
                    .get(1)
                    .map(PathBuf::from)
                    .unwrap_or_else(|| self.export_dir.clone());
                let written = results::export_results(state, format.kinds(), &dir)?;
                let names: Vec<String> = written.iter().map(|p| p.display().to_string()).collect();
                CommandResult::Success(format!("wrote {}", names.join(", ")))
            }

            other => CommandResult::Error(format!(
                "Unknown command '{}'. Type 'help' for a list.",
                other
            )),
        };

        Ok(result)
    }
}

fn first_arg<'a>(args: &[&'a str], usage: &str) -> Result<&'a str, AppError> {
    args.first()
        .copied()
        .ok_or_else(|| AppError::input(format!("Usage: {}", usage)))
}

fn status_text(state: &AppState) -> String {
    let session = &state.session;
    let mut out = format!(
        "  Service        : {}\n  Files queued   : {}\n{}",
        session.health(),
        session.files().len(),
        params::describe_params(state)
    );
    out.push_str(&format!(
        "  Ready to run   : {}\n",
        if session.can_run_inference() { "yes" } else { "no" }
    ));
    if let Some(err) = session.error() {
        out.push_str(&format!("  Last error     : {}\n", err));
    }
    out
}

fn help_text() -> String {
    [
        "Files",
        "  add <path>...      queue images (files or directories)",
        "  remove <index>     drop one queued image",
        "  clear              drop all queued images",
        "  files              list queued images",
        "Parameters",
        "  conf <0-1>         confidence threshold (step 0.01)",
        "  iou <0-1>          IoU threshold (step 0.01)",
        "  nms [on|off]       toggle non-max suppression",
        "  class <name>       toggle a class in the filter ('class clear' resets)",
        "  classes            show the class filter",
        "  model <id>         select a model",
        "  models             list backend models",
        "  params             show current parameters",
        "Inference",
        "  health             re-check the backend",
        "  run                detect defects in the first queued image",
        "  show               show the last result",
        "  sort score|class   change detection order",
        "  export [png|json|all] [dir]",
        "  status             session overview",
        "  quit               leave (Ctrl-C at the prompt does the same)",
    ]
    .join("\n")
}

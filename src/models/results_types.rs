use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    /// Highest score first.
    #[default]
    Score,
    /// Class name, alphabetical.
    Class,
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "score" => Ok(SortOrder::Score),
            "class" => Ok(SortOrder::Class),
            other => Err(format!("Unknown sort order '{}'. Use 'score' or 'class'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassCount {
    pub class: String,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportKind {
    Png,
    Json,
}

impl ExportKind {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportKind::Png => "png",
            ExportKind::Json => "json",
        }
    }
}

/// What an export action writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    /// Annotated overlay only.
    Png,
    /// Detections and meta only.
    Json,
    /// Both files, same timestamp.
    #[value(alias = "both")]
    #[serde(alias = "both")]
    All,
}

impl ExportFormat {
    pub fn kinds(self) -> &'static [ExportKind] {
        match self {
            ExportFormat::Png => &[ExportKind::Png],
            ExportFormat::Json => &[ExportKind::Json],
            ExportFormat::All => &[ExportKind::Png, ExportKind::Json],
        }
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <ExportFormat as clap::ValueEnum>::from_str(s.trim(), true)
            .map_err(|_| format!("Unknown export format '{}'. Use png, json or all", s.trim()))
    }
}

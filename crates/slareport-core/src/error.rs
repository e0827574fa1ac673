// crates/slareport-core/src/error.rs

use std::path::PathBuf;

use thiserror::Error;

use crate::config::SourceRole;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("{role} input not found at '{}'", path.display())]
    MissingInputFile { role: SourceRole, path: PathBuf },

    #[error("required column '{column}' is missing; available columns: {available:?}")]
    MissingColumn {
        column: String,
        available: Vec<String>,
    },

    #[error("sheet '{sheet}' could not be read from '{}': {message}", path.display())]
    MissingSheet {
        sheet: String,
        path: PathBuf,
        message: String,
    },

    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Polars operation failed: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("Spreadsheet read failed: {0}")]
    Spreadsheet(#[from] calamine::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, PipelineError>;

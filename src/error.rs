use std::path::PathBuf;
use thiserror::Error;

/// Failure to read one of the two static inputs. Fatal at startup.
#[derive(Error, Debug)]
pub enum DataLoadError {
    #[error("Failed to open {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse geometry: {0}")]
    Geometry(String),

    #[error("Failed to read workbook: {0}")]
    Workbook(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Unsupported input format: {0:?}")]
    UnsupportedFormat(PathBuf),

    #[error("Sheet '{0}' not found")]
    MissingSheet(String),

    #[error("Column '{column}' not found in sheet '{sheet}'")]
    MissingColumn { sheet: String, column: String },

    #[error("Field '{field}' missing from feature {feature}")]
    MissingField { field: String, feature: usize },
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("No measurement rows for year {0}")]
    EmptySelection(i32),

    #[error("Year {0} is not one of the configured years")]
    UnsupportedYear(i32),

    #[error("Render error: {0}")]
    Render(String),
}

pub type Result<T> = std::result::Result<T, PipelineError>;

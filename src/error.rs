// Timelapse Error Types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TimelapseError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A value object was built from an argument it cannot represent.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A closed set (control types, combinators) was handed a member it does not know.
    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error("Template error: {0}")]
    Template(String),

    #[error("ExifTool error: {0}")]
    ExifTool(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("{0}")]
    Other(String),
}

impl From<anyhow::Error> for TimelapseError {
    fn from(err: anyhow::Error) -> Self {
        TimelapseError::Other(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, TimelapseError>;

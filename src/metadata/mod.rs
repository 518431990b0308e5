// Metadata extraction module

pub mod exiftool;

use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;

use crate::error::{Result, TimelapseError};

/// Source of a file's embedded capture time.
pub trait MetadataReader {
    /// `Ok(None)` when the file carries no usable date.
    fn read_date_time_original(&self, path: &Path) -> Result<Option<NaiveDateTime>>;
}

/// Reads capture times by running exiftool once per file.
#[derive(Debug, Clone)]
pub struct ExifToolReader {
    exiftool: PathBuf,
}

impl ExifToolReader {
    pub fn new(exiftool: PathBuf) -> Self {
        ExifToolReader { exiftool }
    }

    /// Uses the resolved exiftool (env override, sidecar, then PATH).
    pub fn from_tools() -> Self {
        ExifToolReader::new(crate::tools::exiftool_path())
    }

    pub fn is_available(&self) -> bool {
        exiftool::is_available(&self.exiftool)
    }
}

impl Default for ExifToolReader {
    fn default() -> Self {
        ExifToolReader::from_tools()
    }
}

impl MetadataReader for ExifToolReader {
    fn read_date_time_original(&self, path: &Path) -> Result<Option<NaiveDateTime>> {
        if !path.is_file() {
            return Err(TimelapseError::FileNotFound(path.display().to_string()));
        }
        let dump = exiftool::dump(&self.exiftool, path)?;
        Ok(exiftool::capture_time(&dump))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_reported_before_running_exiftool() {
        let reader = ExifToolReader::new(PathBuf::from("/nonexistent/exiftool"));
        let result = reader.read_date_time_original(Path::new("/nonexistent/a.jpg"));
        assert!(matches!(result, Err(TimelapseError::FileNotFound(_))));
    }
}

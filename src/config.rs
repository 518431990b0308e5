// User configuration
// Stored as JSON at <config dir>/timelapse/config.json. TIMELAPSE_CONFIG
// names a different file. A missing file means defaults.

use std::fs;
use std::path::{Path, PathBuf};

use log::LevelFilter;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TimelapseError};
use crate::select::custom_selection::LogicalOperator;

pub const CONFIG_ENV: &str = "TIMELAPSE_CONFIG";
const CONFIG_FILENAME: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TimelapseConfig {
    /// One of off, error, warn, info, debug, trace.
    pub log_level: String,
    /// Also write the log here when set.
    pub log_file: Option<PathBuf>,
    pub exiftool_path: Option<PathBuf>,
    /// "And" or "Or".
    pub default_combinator: String,
}

impl Default for TimelapseConfig {
    fn default() -> Self {
        TimelapseConfig {
            log_level: "info".to_string(),
            log_file: None,
            exiftool_path: None,
            default_combinator: LogicalOperator::And.to_string(),
        }
    }
}

impl TimelapseConfig {
    /// The config file in use: the env override, else the platform config dir.
    pub fn default_path() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Some(PathBuf::from(path));
        }
        directories::ProjectDirs::from("org", "Timelapse", "timelapse")
            .map(|dirs| dirs.config_dir().join(CONFIG_FILENAME))
    }

    /// Load from the default location. No file, or no config dir, gives defaults.
    pub fn load() -> Result<Self> {
        match Self::default_path() {
            Some(path) => Self::load_from(&path),
            None => {
                log::debug!("No config directory on this platform; using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("Config file {} does not exist; using defaults", path.display());
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)?;
        let config: TimelapseConfig = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        self.level_filter()?;
        self.combinator()?;
        Ok(())
    }

    pub fn level_filter(&self) -> Result<LevelFilter> {
        self.log_level
            .parse()
            .map_err(|_| TimelapseError::InvalidArgument(format!("unknown log level '{}'", self.log_level)))
    }

    pub fn combinator(&self) -> Result<LogicalOperator> {
        self.default_combinator.parse()
    }

    pub fn exiftool(&self) -> PathBuf {
        crate::tools::exiftool_path_with(self.exiftool_path.as_deref())
    }
}

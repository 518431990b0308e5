// External tool resolver for exiftool
//
// Resolution order:
// 1) Environment variable override (TIMELAPSE_EXIFTOOL_PATH)
// 2) Path from the user config
// 3) Sidecar next to the executable, or in its bin/ subdirectory
// 4) PATH fallback

use std::env;
use std::path::{Path, PathBuf};

pub const EXIFTOOL_ENV: &str = "TIMELAPSE_EXIFTOOL_PATH";

/// Get the directory containing the current executable
fn exe_dir() -> Option<PathBuf> {
    env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|d| d.to_path_buf()))
}

/// Resolve a tool path, trying each location in order.
fn resolve_tool(env_key: &str, configured: Option<&Path>, default_name: &str) -> PathBuf {
    if let Ok(v) = env::var(env_key) {
        let p = PathBuf::from(&v);
        if p.exists() {
            return p;
        }
        log::warn!("{} points at missing file {}", env_key, v);
    }

    if let Some(p) = configured {
        if p.exists() {
            return p.to_path_buf();
        }
        log::warn!("Configured tool {} does not exist", p.display());
    }

    // Add .exe on Windows
    let mut filename = default_name.to_string();
    if cfg!(windows) && !filename.to_lowercase().ends_with(".exe") {
        filename.push_str(".exe");
    }

    if let Some(dir) = exe_dir() {
        for candidate in [dir.join(&filename), dir.join("bin").join(&filename)] {
            if candidate.exists() {
                return candidate;
            }
        }
    }

    PathBuf::from(default_name)
}

/// Get path to the exiftool binary
pub fn exiftool_path() -> PathBuf {
    resolve_tool(EXIFTOOL_ENV, None, "exiftool")
}

/// Like `exiftool_path`, consulting a configured location after the env override.
pub fn exiftool_path_with(configured: Option<&Path>) -> PathBuf {
    resolve_tool(EXIFTOOL_ENV, configured, "exiftool")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_tool_fallback() {
        // Without env var set, should return the default name for PATH lookup
        let path = resolve_tool("TIMELAPSE_TEST_NONEXISTENT", None, "testcmd");
        assert_eq!(path, PathBuf::from("testcmd"));
    }

    #[test]
    fn test_env_override_beats_config() {
        let dir = tempfile::tempdir().unwrap();
        let from_env = dir.path().join("env_tool");
        let from_config = dir.path().join("config_tool");
        std::fs::write(&from_env, "test").unwrap();
        std::fs::write(&from_config, "test").unwrap();

        assert_eq!(resolve_tool("TIMELAPSE_TEST_UNSET", Some(&from_config), "default"), from_config);

        std::env::set_var("TIMELAPSE_TEST_TOOL", &from_env);
        let path = resolve_tool("TIMELAPSE_TEST_TOOL", Some(&from_config), "default");
        std::env::remove_var("TIMELAPSE_TEST_TOOL");
        assert_eq!(path, from_env);
    }

    #[test]
    fn test_missing_config_path_falls_through() {
        let path = resolve_tool("TIMELAPSE_TEST_UNSET", Some(Path::new("/nonexistent/exiftool")), "testcmd");
        assert_eq!(path, PathBuf::from("testcmd"));
    }
}

// ExifTool wrapper for capture time extraction

use std::path::Path;
use std::process::Command;
use std::sync::OnceLock;

use chrono::NaiveDateTime;
use regex::Regex;

use crate::constants::EXIF_DATE_TIME_FORMAT;
use crate::error::{Result, TimelapseError};

/// Capture time tags, most trusted first.
const DATE_TAGS: [&str; 3] = ["DateTimeOriginal", "CreateDate", "MediaCreateDate"];

/// Run exiftool in dump mode (-j -G -n) and return the first file's tag object.
pub fn dump(exiftool: &Path, path: &Path) -> Result<serde_json::Value> {
    let output = Command::new(exiftool)
        .args(["-j", "-G", "-n"])
        .arg(path)
        .output()
        .map_err(|e| TimelapseError::ExifTool(format!("Failed to run exiftool: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        return Err(TimelapseError::ExifTool(format!(
            "exiftool exited with {}: {}",
            output.status.code().unwrap_or(-1),
            stderr
        )));
    }

    let raw_array: serde_json::Value = serde_json::from_slice(&output.stdout)
        .map_err(|e| TimelapseError::ExifTool(format!("Failed to parse exiftool JSON: {}", e)))?;

    // exiftool returns an array; take the first element
    Ok(raw_array
        .as_array()
        .and_then(|a| a.first())
        .cloned()
        .unwrap_or_else(|| serde_json::Value::Object(serde_json::Map::new())))
}

/// The capture time from a grouped dump, or `None` when no date tag parses.
pub fn capture_time(dump: &serde_json::Value) -> Option<NaiveDateTime> {
    DATE_TAGS
        .iter()
        .filter_map(|tag| get_grouped_string(dump, tag))
        .find_map(|value| parse_exif_date(&value))
}

/// Get a string value from a grouped exiftool dump.
/// With -G, keys are "Group:TagName". The EXIF group wins over the others.
fn get_grouped_string(dump: &serde_json::Value, tag: &str) -> Option<String> {
    let obj = dump.as_object()?;
    let exif_key = format!("EXIF:{}", tag);
    if let Some(val) = obj.get(&exif_key).and_then(value_to_string) {
        return Some(val);
    }
    let suffix = format!(":{}", tag);
    obj.iter()
        .filter(|(key, _)| key.ends_with(&suffix) || key.as_str() == tag)
        .find_map(|(_, val)| value_to_string(val))
}

fn value_to_string(val: &serde_json::Value) -> Option<String> {
    match val {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Date and time fields of an EXIF or QuickTime timestamp. Either ':' or '-'
/// separates the date and the time may follow a space or a 'T'; sub-seconds
/// and a trailing zone are ignored.
fn date_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^(\d{4})[:-](\d{2})[:-](\d{2})[ T](\d{2}):(\d{2}):(\d{2})").ok())
        .as_ref()
}

/// Cameras write all zeros when the clock was never set.
fn parse_exif_date(value: &str) -> Option<NaiveDateTime> {
    let caps = date_pattern()?.captures(value.trim())?;
    if &caps[1] == "0000" {
        return None;
    }
    let canonical = format!("{}:{}:{} {}:{}:{}", &caps[1], &caps[2], &caps[3], &caps[4], &caps[5], &caps[6]);
    NaiveDateTime::parse_from_str(&canonical, EXIF_DATE_TIME_FORMAT).ok()
}

/// Check if exiftool runs at the given path
pub fn is_available(exiftool: &Path) -> bool {
    if exiftool.is_file() {
        return true;
    }
    Command::new(exiftool)
        .arg("-ver")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

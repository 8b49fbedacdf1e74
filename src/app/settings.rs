use std::fs;
use std::path::{Path, PathBuf};

use crate::app::error::AppError;

pub const DEFAULT_ADDRESS: &str = "10.0.0.";
pub const DEFAULT_DPI: &str = "160";

/// Last-used address/DPI pair, exactly as typed (the address may be a bare
/// prefix the operator completes next time).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredTarget {
    pub address: String,
    pub dpi: String,
}

impl Default for StoredTarget {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            dpi: DEFAULT_DPI.to_string(),
        }
    }
}

/// Contents of the plain-text settings file: two lines per device slot
/// (address, dpi), two slots maximum, fixed line order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredSettings {
    pub targets: Vec<StoredTarget>,
}

impl Default for StoredSettings {
    fn default() -> Self {
        Self {
            targets: vec![StoredTarget::default()],
        }
    }
}

pub fn settings_path() -> PathBuf {
    if let Ok(path) = std::env::var("MINIPC_PROVISIONER_SETTINGS") {
        return PathBuf::from(path);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".minipc_provisioner_settings.txt")
}

pub fn load_settings() -> StoredSettings {
    load_settings_from_path(&settings_path())
}

pub fn save_settings(settings: &StoredSettings, trace_id: &str) -> Result<(), AppError> {
    save_settings_to_path(settings, &settings_path(), trace_id)
}

/// Absent file or malformed lines fall back to the documented defaults; a
/// settings problem must never block a run.
pub fn load_settings_from_path(path: &Path) -> StoredSettings {
    let Ok(raw) = fs::read_to_string(path) else {
        return StoredSettings::default();
    };
    let lines: Vec<&str> = raw.lines().collect();
    let mut targets = vec![target_from_lines(lines.first(), lines.get(1))];
    if lines.len() > 2 {
        targets.push(target_from_lines(lines.get(2), lines.get(3)));
    }
    StoredSettings { targets }
}

fn target_from_lines(address: Option<&&str>, dpi: Option<&&str>) -> StoredTarget {
    let address = address
        .map(|line| line.trim())
        .filter(|line| !line.is_empty())
        .unwrap_or(DEFAULT_ADDRESS)
        .to_string();
    let dpi = dpi
        .map(|line| line.trim())
        .filter(|line| !line.is_empty() && line.chars().all(|c| c.is_ascii_digit()))
        .unwrap_or(DEFAULT_DPI)
        .to_string();
    StoredTarget { address, dpi }
}

pub fn save_settings_to_path(
    settings: &StoredSettings,
    path: &Path,
    trace_id: &str,
) -> Result<(), AppError> {
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    let mut payload = String::new();
    for target in settings.targets.iter().take(2) {
        payload.push_str(&target.address);
        payload.push('\n');
        payload.push_str(&target.dpi);
        payload.push('\n');
    }
    fs::write(path, payload).map_err(|err| {
        AppError::system(
            format!("Failed to write settings {}: {err}", path.display()),
            trace_id,
        )
    })
}

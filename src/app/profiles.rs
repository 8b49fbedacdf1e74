use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::app::error::AppError;

/// A named deployment bundle: the APKs to install on a fresh panel and the
/// package that must survive a reboot via auto-start.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PanelProfile {
    pub name: String,
    pub apk_paths: Vec<PathBuf>,
    pub target_package: String,
    pub tts_engine: Option<String>,
}

impl PanelProfile {
    pub fn new(name: impl Into<String>, target_package: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            apk_paths: Vec::new(),
            target_package: target_package.into(),
            tts_engine: None,
        }
    }
}

struct BuiltinProfile {
    name: &'static str,
    apk_dir: &'static str,
    target_package: &'static str,
    tts_engine: Option<&'static str>,
}

/// Fixed deployment table. APKs come from the conventional folder next to
/// the executable; a missing folder just means an empty install phase.
const BUILTIN_PROFILES: [BuiltinProfile; 2] = [
    BuiltinProfile {
        name: "Painel",
        apk_dir: "apks/painel",
        target_package: "br.com.aipainel.player",
        tts_engine: Some("com.google.android.tts"),
    },
    BuiltinProfile {
        name: "Totem",
        apk_dir: "apks/totem",
        target_package: "br.com.aipainel.totem",
        tts_engine: None,
    },
];

pub fn builtin_profile_names() -> Vec<&'static str> {
    BUILTIN_PROFILES.iter().map(|profile| profile.name).collect()
}

/// Looks up a built-in profile by case-insensitive name and collects its
/// APKs from the conventional folder.
pub fn find_builtin(name: &str, trace_id: &str) -> Option<Result<PanelProfile, AppError>> {
    let builtin = BUILTIN_PROFILES
        .iter()
        .find(|profile| profile.name.eq_ignore_ascii_case(name.trim()))?;
    let mut profile = PanelProfile::new(builtin.name, builtin.target_package);
    profile.tts_engine = builtin.tts_engine.map(str::to_string);
    let dir = Path::new(builtin.apk_dir);
    if dir.is_dir() {
        match collect_apks(dir, trace_id) {
            Ok(paths) => profile.apk_paths = paths,
            Err(err) => return Some(Err(err)),
        }
    }
    Some(Ok(profile))
}

/// Folder-convention profile: every `*.apk` directly inside `dir`, sorted by
/// file name; the profile is named after the directory.
pub fn profile_from_dir(
    dir: &Path,
    target_package: &str,
    trace_id: &str,
) -> Result<PanelProfile, AppError> {
    if !dir.is_dir() {
        return Err(AppError::validation(
            format!("Profile folder not found: {}", dir.display()),
            trace_id,
        ));
    }
    let name = dir
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| "custom".to_string());
    let mut profile = PanelProfile::new(name, target_package);
    profile.apk_paths = collect_apks(dir, trace_id)?;
    Ok(profile)
}

fn collect_apks(dir: &Path, trace_id: &str) -> Result<Vec<PathBuf>, AppError> {
    let entries = fs::read_dir(dir).map_err(|err| {
        AppError::system(
            format!("Failed to read profile folder {}: {err}", dir.display()),
            trace_id,
        )
    })?;
    let mut apks: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .map(|ext| ext.eq_ignore_ascii_case("apk"))
                    .unwrap_or(false)
        })
        .collect();
    apks.sort_by_key(|path| {
        path.file_name()
            .map(|name| name.to_string_lossy().to_lowercase())
            .unwrap_or_default()
    });
    Ok(apks)
}

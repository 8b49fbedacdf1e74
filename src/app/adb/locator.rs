use std::path::Path;

/// Strips shell-style quoting that tends to ride along with copy-pasted
/// Windows paths.
pub fn normalize_command_path(value: &str) -> String {
    let trimmed = value.trim();
    for quote in ['"', '\''] {
        if let Some(inner) = trimmed
            .strip_prefix(quote)
            .and_then(|candidate| candidate.strip_suffix(quote))
        {
            return inner.trim().to_string();
        }
    }
    trimmed.to_string()
}

/// Resolution order: explicit path, `MINIPC_ADB` env override, then the
/// `adb` on PATH.
pub fn resolve_adb_program(configured: &str) -> String {
    let normalized = normalize_command_path(configured);
    if !normalized.is_empty() {
        return normalized;
    }
    if let Ok(value) = std::env::var("MINIPC_ADB") {
        let from_env = normalize_command_path(&value);
        if !from_env.is_empty() {
            return from_env;
        }
    }
    "adb".to_string()
}

pub fn validate_adb_program(program: &str) -> Result<(), String> {
    if program.trim().is_empty() {
        return Err("ADB command is empty".to_string());
    }
    if program == "adb" {
        // PATH lookup; existence is settled by the first invocation.
        return Ok(());
    }
    let path = Path::new(program);
    if path.is_dir() {
        return Err("ADB path must point to an executable file".to_string());
    }
    if !path.exists() {
        return Err("ADB executable not found at the configured path".to_string());
    }
    Ok(())
}

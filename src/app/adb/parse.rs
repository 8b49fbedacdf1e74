/// Serials of devices in the `device` state. Offline, unauthorized and
/// header/daemon lines are dropped.
pub fn parse_ready_devices(output: &str) -> Vec<String> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter(|line| !line.trim_start().starts_with('*'))
        .filter(|line| !line.to_lowercase().contains("list of devices"))
        .filter_map(|line| {
            let tokens: Vec<&str> = line.split_whitespace().collect();
            if tokens.len() < 2 || tokens[1] != "device" {
                return None;
            }
            Some(tokens[0].to_string())
        })
        .collect()
}

/// Package names from `pm list packages -f`. Lines look like
/// `package:<apk path>=<package>`; the apk path may itself contain `=`, so
/// the split happens on the last one.
pub fn parse_installed_packages(output: &str) -> Vec<String> {
    let mut packages = Vec::new();
    for raw in output.lines() {
        let line = raw.trim();
        let Some(payload) = line.strip_prefix("package:") else {
            continue;
        };
        let name = match payload.rsplit_once('=') {
            Some((_, package)) => package.trim(),
            None => payload.trim(),
        };
        if !name.is_empty() {
            packages.push(name.to_string());
        }
    }
    packages
}

/// Single-value `getprop` output.
pub fn parse_prop_value(output: &str) -> String {
    output.trim().to_string()
}

/// `wm density` output is free-form ("Physical density: 240", sometimes
/// with an override line); kept opaque for display.
pub fn parse_density_display(output: &str) -> String {
    output.trim().to_string()
}

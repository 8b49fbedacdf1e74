use std::path::Path;
use std::time::Duration;

use tracing::{debug, warn};

use crate::app::adb::locator::resolve_adb_program;
use crate::app::adb::parse::{
    parse_density_display, parse_installed_packages, parse_prop_value, parse_ready_devices,
};
use crate::app::adb::runner::{run_command_with_timeout, CommandOutput};
use crate::app::classify::{
    auto_start_goal_met, connect_output_indicates_failure, extract_install_failure,
    launch_output_indicates_failure,
};
use crate::app::error::AppError;
use crate::app::models::{DeviceInfo, DeviceTarget, OperationResult};
use crate::app::profiles::PanelProfile;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const SHELL_TIMEOUT: Duration = Duration::from_secs(10);
const UNINSTALL_TIMEOUT: Duration = Duration::from_secs(30);
const INSTALL_TIMEOUT: Duration = Duration::from_secs(120);
// The settings service can wedge while a panel is still booting; keep the
// TTS writes on a short leash.
const SETTINGS_TIMEOUT: Duration = Duration::from_secs(5);

/// The pipeline's seam onto one device. Every call is one fresh external
/// invocation; no retries, no persistent connection state.
pub trait DeviceCommands {
    fn list_ready_devices(&self, trace_id: &str) -> Result<Vec<String>, AppError>;
    fn connect(&self, target: &DeviceTarget, trace_id: &str) -> OperationResult;
    fn uninstall_package(
        &self,
        target: &DeviceTarget,
        package: &str,
        trace_id: &str,
    ) -> OperationResult;
    fn install_package(
        &self,
        target: &DeviceTarget,
        apk_path: &Path,
        trace_id: &str,
    ) -> OperationResult;
    fn set_display_density(
        &self,
        target: &DeviceTarget,
        dpi: i32,
        trace_id: &str,
    ) -> OperationResult;
    fn reboot(&self, target: &DeviceTarget, trace_id: &str) -> OperationResult;
    fn configure_tts(
        &self,
        target: &DeviceTarget,
        engine: &str,
        rate: Option<u32>,
        trace_id: &str,
    ) -> OperationResult;
    fn configure_auto_start(
        &self,
        target: &DeviceTarget,
        profile: &PanelProfile,
        trace_id: &str,
    ) -> OperationResult;
}

pub struct AdbAdapter {
    program: String,
}

impl AdbAdapter {
    pub fn new(configured_path: &str) -> Self {
        Self {
            program: resolve_adb_program(configured_path),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn run(
        &self,
        args: Vec<String>,
        timeout: Duration,
        trace_id: &str,
    ) -> Result<CommandOutput, AppError> {
        debug!(trace_id = %trace_id, args = ?args, "adb invocation");
        run_command_with_timeout(&self.program, &args, timeout, trace_id)
    }

    fn shell(
        &self,
        target: &DeviceTarget,
        parts: &[&str],
        timeout: Duration,
        trace_id: &str,
    ) -> Result<CommandOutput, AppError> {
        let mut args = vec![
            "-s".to_string(),
            target.adb_serial(),
            "shell".to_string(),
        ];
        args.extend(parts.iter().map(|part| part.to_string()));
        self.run(args, timeout, trace_id)
    }

    fn shell_result(
        &self,
        target: &DeviceTarget,
        parts: &[&str],
        timeout: Duration,
        ok_message: &str,
        trace_id: &str,
    ) -> OperationResult {
        match self.shell(target, parts, timeout, trace_id) {
            Ok(output) if output.succeeded() => OperationResult::ok(ok_message),
            Ok(output) => OperationResult::failed(output.detail()),
            Err(err) => OperationResult::failed(err.to_string()),
        }
    }

    /// Three read-only queries; any sub-query failure fails the whole call.
    pub fn query_info(
        &self,
        target: &DeviceTarget,
        trace_id: &str,
    ) -> Result<DeviceInfo, AppError> {
        let model = self.query_line(target, &["getprop", "ro.product.model"], trace_id)?;
        let os_version =
            self.query_line(target, &["getprop", "ro.build.version.release"], trace_id)?;
        let density = self.shell(target, &["wm", "density"], SHELL_TIMEOUT, trace_id)?;
        if !density.succeeded() {
            return Err(AppError::dependency(
                format!("wm density failed: {}", density.detail()),
                trace_id,
            ));
        }
        Ok(DeviceInfo {
            model,
            os_version,
            current_density: parse_density_display(&density.stdout),
        })
    }

    fn query_line(
        &self,
        target: &DeviceTarget,
        parts: &[&str],
        trace_id: &str,
    ) -> Result<String, AppError> {
        let output = self.shell(target, parts, SHELL_TIMEOUT, trace_id)?;
        if !output.succeeded() {
            return Err(AppError::dependency(
                format!("{} failed: {}", parts.join(" "), output.detail()),
                trace_id,
            ));
        }
        Ok(parse_prop_value(&output.stdout))
    }

    pub fn list_installed_packages(
        &self,
        target: &DeviceTarget,
        trace_id: &str,
    ) -> Result<Vec<String>, AppError> {
        let output = self.shell(
            target,
            &["pm", "list", "packages", "-f"],
            SHELL_TIMEOUT,
            trace_id,
        )?;
        if !output.succeeded() {
            return Err(AppError::dependency(
                format!("pm list packages failed: {}", output.detail()),
                trace_id,
            ));
        }
        Ok(parse_installed_packages(&output.stdout))
    }

    fn try_launch(&self, target: &DeviceTarget, package: &str, trace_id: &str) -> OperationResult {
        for (label, parts) in launch_strategies(package) {
            let parts: Vec<&str> = parts.iter().map(String::as_str).collect();
            match self.shell(target, &parts, SHELL_TIMEOUT, trace_id) {
                Ok(output)
                    if output.succeeded()
                        && !launch_output_indicates_failure(&output.combined()) =>
                {
                    return OperationResult::ok(format!("launched via {label}"));
                }
                Ok(output) => {
                    debug!(trace_id = %trace_id, strategy = label, detail = %output.detail(), "launch strategy failed");
                }
                Err(err) => {
                    debug!(trace_id = %trace_id, strategy = label, error = %err, "launch strategy errored");
                }
            }
        }
        OperationResult::failed(format!("no launch strategy started {package}"))
    }
}

impl DeviceCommands for AdbAdapter {
    fn configure_tts(
        &self,
        target: &DeviceTarget,
        engine: &str,
        rate: Option<u32>,
        trace_id: &str,
    ) -> OperationResult {
        let engine_result = self.shell_result(
            target,
            &["settings", "put", "secure", "tts_default_synth", engine],
            SETTINGS_TIMEOUT,
            "TTS engine set",
            trace_id,
        );
        if !engine_result.success {
            return OperationResult::failed(format!(
                "failed to set TTS engine: {}",
                engine_result.message
            ));
        }
        if let Some(rate) = rate {
            let rate_value = rate.to_string();
            let rate_result = self.shell_result(
                target,
                &["settings", "put", "secure", "tts_default_rate", &rate_value],
                SETTINGS_TIMEOUT,
                "TTS rate set",
                trace_id,
            );
            if !rate_result.success {
                return OperationResult::failed(format!(
                    "failed to set TTS rate: {}",
                    rate_result.message
                ));
            }
        }
        OperationResult::ok(format!("TTS configured ({engine})"))
    }

    fn list_ready_devices(&self, trace_id: &str) -> Result<Vec<String>, AppError> {
        let args = vec!["devices".to_string()];
        let output = self.run(args, CONNECT_TIMEOUT, trace_id)?;
        if !output.succeeded() {
            return Err(AppError::dependency(
                format!("adb devices failed: {}", output.detail()),
                trace_id,
            ));
        }
        Ok(parse_ready_devices(&output.stdout))
    }

    fn connect(&self, target: &DeviceTarget, trace_id: &str) -> OperationResult {
        let DeviceTarget::Network { .. } = target else {
            // USB presence was already established by enumeration.
            return OperationResult::ok("usb device present");
        };
        let args = vec!["connect".to_string(), target.adb_serial()];
        match self.run(args, CONNECT_TIMEOUT, trace_id) {
            Ok(output) => {
                let combined = output.combined();
                if !output.succeeded() || connect_output_indicates_failure(&combined) {
                    OperationResult::failed(output.detail())
                } else {
                    OperationResult::ok(combined)
                }
            }
            Err(err) => OperationResult::failed(err.to_string()),
        }
    }

    fn uninstall_package(
        &self,
        target: &DeviceTarget,
        package: &str,
        trace_id: &str,
    ) -> OperationResult {
        let args = vec![
            "-s".to_string(),
            target.adb_serial(),
            "uninstall".to_string(),
            package.to_string(),
        ];
        match self.run(args, UNINSTALL_TIMEOUT, trace_id) {
            Ok(output) => {
                let combined = output.combined();
                if output.succeeded() && combined.contains("Success") {
                    OperationResult::ok(combined)
                } else {
                    OperationResult::failed(combined)
                }
            }
            Err(err) => OperationResult::failed(err.to_string()),
        }
    }

    fn install_package(
        &self,
        target: &DeviceTarget,
        apk_path: &Path,
        trace_id: &str,
    ) -> OperationResult {
        if !apk_path.is_file() {
            return OperationResult::failed(format!("APK not found: {}", apk_path.display()));
        }
        let args = vec![
            "-s".to_string(),
            target.adb_serial(),
            "install".to_string(),
            "-r".to_string(),
            apk_path.to_string_lossy().to_string(),
        ];
        match self.run(args, INSTALL_TIMEOUT, trace_id) {
            Ok(output) => {
                let combined = output.combined();
                if output.succeeded() && combined.contains("Success") {
                    OperationResult::ok(format!("installed {}", apk_path.display()))
                } else {
                    let message = match extract_install_failure(&combined) {
                        Some(token) => format!("{token}: {}", output.detail()),
                        None => output.detail(),
                    };
                    OperationResult::failed(message)
                }
            }
            Err(err) => OperationResult::failed(err.to_string()),
        }
    }

    fn set_display_density(
        &self,
        target: &DeviceTarget,
        dpi: i32,
        trace_id: &str,
    ) -> OperationResult {
        if dpi <= 0 {
            return OperationResult::failed(format!(
                "density must be a positive integer, got {dpi}"
            ));
        }
        let dpi_value = dpi.to_string();
        self.shell_result(
            target,
            &["wm", "density", &dpi_value],
            SHELL_TIMEOUT,
            &format!("density set to {dpi}"),
            trace_id,
        )
    }

    fn reboot(&self, target: &DeviceTarget, trace_id: &str) -> OperationResult {
        // The connection routinely drops mid-command here; callers treat
        // any failure as non-fatal.
        self.shell_result(target, &["reboot"], SHELL_TIMEOUT, "reboot requested", trace_id)
    }

    fn configure_auto_start(
        &self,
        target: &DeviceTarget,
        profile: &PanelProfile,
        trace_id: &str,
    ) -> OperationResult {
        let package = profile.target_package.as_str();
        let mut sub_results = Vec::new();
        for parts in auto_start_commands(package) {
            let parts_ref: Vec<&str> = parts.iter().map(String::as_str).collect();
            let result = match self.shell(target, &parts_ref, SHELL_TIMEOUT, trace_id) {
                Ok(output) if output.succeeded() => OperationResult::ok(output.combined()),
                Ok(output) => OperationResult::failed(output.detail()),
                Err(err) => OperationResult::failed(err.to_string()),
            };
            if !result.success {
                warn!(trace_id = %trace_id, target = %target, command = ?parts, detail = %result.message, "auto-start sub-command failed");
            }
            sub_results.push(result);
        }

        let (met, succeeded, counted) = auto_start_goal_met(&sub_results);
        if !met {
            return OperationResult::failed(format!(
                "auto-start policy setup below threshold ({succeeded}/{counted} applied)"
            ));
        }

        let launch = self.try_launch(target, package, trace_id);
        let reboot = self.reboot(target, trace_id);
        let mut summary = format!("auto-start policies applied ({succeeded}/{counted})");
        if launch.success {
            summary.push_str(&format!(", {}", launch.message));
        } else {
            summary.push_str(", launch not confirmed");
        }
        if reboot.success {
            summary.push_str(", reboot requested");
        } else {
            summary.push_str(", reboot not confirmed");
        }
        OperationResult::ok(summary)
    }
}

/// Ordered policy relaxations for the auto-start package. Later entries do
/// not exist on older builds; their failures match the unsupported pattern
/// and drop out of the threshold count.
fn auto_start_commands(package: &str) -> Vec<Vec<String>> {
    let cmd = |parts: &[&str]| parts.iter().map(|part| part.to_string()).collect();
    vec![
        cmd(&["dumpsys", "deviceidle", "whitelist", &format!("+{package}")]),
        cmd(&["cmd", "appops", "set", package, "RUN_IN_BACKGROUND", "allow"]),
        cmd(&["cmd", "appops", "set", package, "RUN_ANY_IN_BACKGROUND", "allow"]),
        cmd(&["cmd", "appops", "set", package, "START_FOREGROUND", "allow"]),
        cmd(&["pm", "grant", package, "android.permission.RECEIVE_BOOT_COMPLETED"]),
        cmd(&["am", "set-inactive", package, "false"]),
    ]
}

/// Launch fallbacks tried in order, stopping at the first success.
fn launch_strategies(package: &str) -> Vec<(&'static str, Vec<String>)> {
    let cmd = |parts: &[&str]| parts.iter().map(|part| part.to_string()).collect();
    vec![
        (
            "am start .MainActivity",
            cmd(&["am", "start", "-n", &format!("{package}/.MainActivity")]),
        ),
        (
            "am start full activity path",
            cmd(&["am", "start", "-n", &format!("{package}/{package}.MainActivity")]),
        ),
        (
            "monkey launcher probe",
            cmd(&[
                "monkey",
                "-p",
                package,
                "-c",
                "android.intent.category.LAUNCHER",
                "1",
            ]),
        ),
    ]
}

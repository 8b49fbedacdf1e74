use regex::Regex;

use crate::app::models::OperationResult;

/// Where an uninstall attempt lands in the §failure taxonomy: soft outcomes
/// keep the device pipeline moving, a hard failure aborts the removal phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UninstallDisposition {
    Removed,
    NotInstalled,
    SystemProtected,
    HardFailure,
}

/// Maps raw `adb uninstall` output onto the taxonomy. Pattern list kept
/// explicit and enumerable rather than inlined in pipeline control flow.
pub fn classify_uninstall(success: bool, message: &str) -> UninstallDisposition {
    if success {
        return UninstallDisposition::Removed;
    }
    if message.contains("DELETE_FAILED_DEVICE_POLICY_MANAGER")
        || message.contains("DELETE_FAILED_INTERNAL_ERROR")
    {
        return UninstallDisposition::SystemProtected;
    }
    let lower = message.to_lowercase();
    if lower.contains("delete_failed_not_installed")
        || lower.contains("not installed")
        || lower.contains("unknown package")
    {
        return UninstallDisposition::NotInstalled;
    }
    UninstallDisposition::HardFailure
}

/// Matches failure text from policy sub-commands that simply do not exist on
/// older OS builds. These are expected and excluded from the auto-start
/// failure count.
pub fn is_unsupported_subcommand(message: &str) -> bool {
    let Ok(re) = Regex::new(r"(?i)unknown command|not found|no such|unsupported|bad appop") else {
        return false;
    };
    re.is_match(message)
}

/// Auto-start policy phase gate: strictly more than 60% of the counted
/// sub-commands must succeed, where failures matching the unsupported
/// pattern are excluded from the count. Exactly `ceil(0.6 * N)` successes
/// is still a failure; one more passes (boundary kept from the original).
pub fn auto_start_goal_met(sub_results: &[OperationResult]) -> (bool, usize, usize) {
    let mut counted = 0usize;
    let mut succeeded = 0usize;
    for result in sub_results {
        if result.success {
            counted += 1;
            succeeded += 1;
        } else if !is_unsupported_subcommand(&result.message) {
            counted += 1;
        }
    }
    if counted == 0 {
        return (true, 0, 0);
    }
    let threshold = (counted * 3).div_ceil(5);
    (succeeded > threshold, succeeded, counted)
}

/// `adb connect` exits zero even when the handshake is refused; the refusal
/// only shows up in the output text.
pub fn connect_output_indicates_failure(output: &str) -> bool {
    let lower = output.to_lowercase();
    lower.contains("failed") || lower.contains("unable") || lower.contains("cannot")
}

/// Pulls the `INSTALL_FAILED_*` / `INSTALL_PARSE_FAILED_*` token out of
/// installer output, when present, for a compact failure message.
pub fn extract_install_failure(output: &str) -> Option<String> {
    let re = Regex::new(r"INSTALL(?:_PARSE)?_FAILED_[A-Z0-9_]+").ok()?;
    re.find(&output.to_uppercase())
        .map(|m| m.as_str().to_string())
}

/// Launch strategy probes report some failures on stdout with exit 0.
pub fn launch_output_indicates_failure(output: &str) -> bool {
    let lower = output.to_lowercase();
    lower.contains("error")
        || lower.contains("does not exist")
        || lower.contains("no activities found")
        || lower.contains("aborted")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_policy_denied_uninstall_as_system_protected() {
        let out = "Failure [DELETE_FAILED_DEVICE_POLICY_MANAGER]";
        assert_eq!(
            classify_uninstall(false, out),
            UninstallDisposition::SystemProtected
        );
        let out = "Failure [DELETE_FAILED_INTERNAL_ERROR]";
        assert_eq!(
            classify_uninstall(false, out),
            UninstallDisposition::SystemProtected
        );
    }

    #[test]
    fn classifies_absent_package_as_not_installed() {
        for out in [
            "Failure [DELETE_FAILED_NOT_INSTALLED]",
            "Failure [not installed for 0]",
            "java.lang.IllegalArgumentException: Unknown package: tv.pluto.android",
        ] {
            assert_eq!(
                classify_uninstall(false, out),
                UninstallDisposition::NotInstalled,
                "{out}"
            );
        }
    }

    #[test]
    fn anything_else_is_a_hard_failure() {
        assert_eq!(
            classify_uninstall(false, "adb: device offline"),
            UninstallDisposition::HardFailure
        );
        assert_eq!(classify_uninstall(true, "Success"), UninstallDisposition::Removed);
    }

    #[test]
    fn recognizes_unsupported_subcommand_text() {
        assert!(is_unsupported_subcommand("/system/bin/sh: cmd: not found"));
        assert!(is_unsupported_subcommand("Unknown command: set-inactive"));
        assert!(is_unsupported_subcommand("Error: Bad appop RUN_ANY_IN_BACKGROUND"));
        assert!(!is_unsupported_subcommand("Security exception: uid 2000"));
    }

    fn results(ok: usize, hard_fail: usize, unsupported: usize) -> Vec<OperationResult> {
        let mut out = Vec::new();
        out.extend((0..ok).map(|_| OperationResult::ok("ok")));
        out.extend((0..hard_fail).map(|_| OperationResult::failed("permission denied")));
        out.extend((0..unsupported).map(|_| OperationResult::failed("cmd: not found")));
        out
    }

    #[test]
    fn threshold_boundary_fails_at_ceil_and_passes_one_above() {
        // N = 10 counted: ceil(0.6 * 10) = 6 successes fail, 7 pass.
        let (met, succeeded, counted) = auto_start_goal_met(&results(6, 4, 0));
        assert!(!met);
        assert_eq!((succeeded, counted), (6, 10));
        let (met, ..) = auto_start_goal_met(&results(7, 3, 0));
        assert!(met);

        // N = 7 counted: ceil(0.6 * 7) = 5 fails, 6 passes.
        assert!(!auto_start_goal_met(&results(5, 2, 0)).0);
        assert!(auto_start_goal_met(&results(6, 1, 0)).0);
    }

    #[test]
    fn unsupported_failures_do_not_count_against_the_threshold() {
        // 4/4 counted once the two unsupported failures are excluded.
        let (met, succeeded, counted) = auto_start_goal_met(&results(4, 0, 2));
        assert!(met);
        assert_eq!((succeeded, counted), (4, 4));
    }

    #[test]
    fn all_unsupported_counts_as_met() {
        assert!(auto_start_goal_met(&results(0, 0, 3)).0);
    }

    #[test]
    fn detects_refused_connect_output() {
        assert!(connect_output_indicates_failure(
            "failed to connect to '10.0.0.9:5555': Connection refused"
        ));
        assert!(connect_output_indicates_failure("unable to connect to 10.0.0.9:5555"));
        assert!(!connect_output_indicates_failure("connected to 10.0.0.9:5555"));
        assert!(!connect_output_indicates_failure("already connected to 10.0.0.9:5555"));
    }

    #[test]
    fn extracts_install_failure_token() {
        let out = "Performing Streamed Install\nadb: failed to install app.apk: Failure [INSTALL_FAILED_OLDER_SDK: Failed parse]";
        assert_eq!(
            extract_install_failure(out).as_deref(),
            Some("INSTALL_FAILED_OLDER_SDK")
        );
        assert_eq!(extract_install_failure("Success"), None);
    }
}

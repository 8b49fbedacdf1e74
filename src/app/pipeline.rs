use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use chrono::Utc;
use tracing::info;

use crate::app::adb::adapter::DeviceCommands;
use crate::app::classify::{classify_uninstall, UninstallDisposition};
use crate::app::models::{
    BatchRunReport, BatchVerdict, DeviceReport, DeviceTarget, OperationResult, ProgressEvent,
    StepKind, StepRecord,
};
use crate::app::profiles::PanelProfile;
use crate::app::scheduler::RunScheduler;
use crate::app::selection::PackageSelection;

pub const DEFAULT_WORKER_LIMIT: usize = 4;

/// Density applied by the USB quick setup. Panels ship with wildly varying
/// defaults; this is the value the player UI is laid out for.
pub const USB_QUICK_SETUP_DPI: i32 = 160;

/// One Wi-Fi provisioning assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionJob {
    pub target: DeviceTarget,
    pub dpi: i32,
}

impl ProvisionJob {
    pub fn new(target: DeviceTarget, dpi: i32) -> Self {
        Self { target, dpi }
    }
}

/// Cooperative cancellation flag shared between the run and its caller.
/// Checked between steps; the step in flight always finishes.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub type ProgressEmitter = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// Fans provisioning work out across devices, one worker per device up to
/// the scheduler's limit, and folds the per-device outcomes into one report.
pub struct BatchRunner<A> {
    adapter: A,
    scheduler: Arc<RunScheduler>,
}

impl<A: DeviceCommands + Sync> BatchRunner<A> {
    pub fn new(adapter: A, scheduler: Arc<RunScheduler>) -> Self {
        Self { adapter, scheduler }
    }

    /// Connects to each address, removes the selected packages, applies the
    /// per-device density and soft-reboots. Each device is independent; one
    /// device's failure never stops the others.
    pub fn run_wifi_batch(
        &self,
        jobs: &[ProvisionJob],
        selection: &PackageSelection,
        emit: &ProgressEmitter,
        cancel: &CancelToken,
        trace_id: &str,
    ) -> BatchRunReport {
        let started_at = Utc::now();
        emit(ProgressEvent::run(format!(
            "starting Wi-Fi batch for {} device(s)",
            jobs.len()
        )));
        let devices = self.fan_out(jobs, cancel, |job| {
            let lock = self.scheduler.target_lock(&job.target.adb_serial());
            let _guard = lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            self.provision_network_device(job, selection, emit, cancel, trace_id)
        });
        self.finish(devices, started_at, cancel, emit, trace_id)
    }

    /// Enumerates USB devices and applies a deployment profile to each:
    /// install the profile's APKs, set the standard density, then wire the
    /// target package up to start on boot.
    pub fn run_usb_quick_setup(
        &self,
        profile: &PanelProfile,
        emit: &ProgressEmitter,
        cancel: &CancelToken,
        trace_id: &str,
    ) -> BatchRunReport {
        let started_at = Utc::now();
        let targets: Vec<DeviceTarget> = match self.adapter.list_ready_devices(trace_id) {
            Ok(serials) => serials.into_iter().map(DeviceTarget::usb).collect(),
            Err(err) => {
                emit(ProgressEvent::run(format!("device enumeration failed: {err}")));
                return self.finish(Vec::new(), started_at, cancel, emit, trace_id);
            }
        };
        emit(ProgressEvent::run(format!(
            "{} USB device(s) ready for profile {}",
            targets.len(),
            profile.name
        )));
        let devices = self.fan_out(&targets, cancel, |target| {
            let lock = self.scheduler.target_lock(&target.adb_serial());
            let _guard = lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            self.quick_setup_device(target, profile, emit, cancel, trace_id)
        });
        self.finish(devices, started_at, cancel, emit, trace_id)
    }

    /// One scoped thread per item; the scheduler's permit caps how many run
    /// at once. Report order follows input order regardless of completion
    /// order. Items still waiting when cancellation lands are dropped.
    fn fan_out<T, F>(&self, items: &[T], cancel: &CancelToken, per_item: F) -> Vec<DeviceReport>
    where
        T: Sync,
        F: Fn(&T) -> DeviceReport + Sync,
    {
        let slots: Mutex<Vec<(usize, DeviceReport)>> = Mutex::new(Vec::new());
        thread::scope(|scope| {
            for (index, item) in items.iter().enumerate() {
                let slots = &slots;
                let per_item = &per_item;
                let scheduler = &self.scheduler;
                scope.spawn(move || {
                    let _permit = scheduler.acquire_worker();
                    if cancel.is_cancelled() {
                        return;
                    }
                    let report = per_item(item);
                    slots
                        .lock()
                        .unwrap_or_else(|poisoned| poisoned.into_inner())
                        .push((index, report));
                });
            }
        });
        let mut collected = slots
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        collected.sort_by_key(|(index, _)| *index);
        collected.into_iter().map(|(_, report)| report).collect()
    }

    fn finish(
        &self,
        devices: Vec<DeviceReport>,
        started_at: chrono::DateTime<Utc>,
        cancel: &CancelToken,
        emit: &ProgressEmitter,
        trace_id: &str,
    ) -> BatchRunReport {
        let verdict = BatchVerdict::from_reports(&devices);
        let report = BatchRunReport {
            verdict,
            cancelled: cancel.is_cancelled(),
            started_at,
            finished_at: Utc::now(),
            devices,
        };
        info!(
            trace_id = %trace_id,
            devices = report.devices.len(),
            succeeded = report.success_count(),
            verdict = ?report.verdict,
            cancelled = report.cancelled,
            "batch run finished"
        );
        emit(ProgressEvent::run(format!(
            "finished: {}/{} device(s) configured",
            report.success_count(),
            report.devices.len()
        )));
        report
    }

    fn provision_network_device(
        &self,
        job: &ProvisionJob,
        selection: &PackageSelection,
        emit: &ProgressEmitter,
        cancel: &CancelToken,
        trace_id: &str,
    ) -> DeviceReport {
        let target = &job.target;
        let mut report = DeviceReport::new(target.clone());

        emit(ProgressEvent::device(target, "connecting"));
        let connect = self.adapter.connect(target, trace_id);
        let connected = connect.success;
        report.steps.push(StepRecord::new(StepKind::Connect, connect));
        if !connected {
            emit(ProgressEvent::device(target, "connection failed, device skipped"));
            return report;
        }

        for package in selection.iter() {
            if cancel.is_cancelled() {
                return report;
            }
            emit(ProgressEvent::device(target, format!("removing {package}")));
            let raw = self.adapter.uninstall_package(target, package, trace_id);
            let (result, abort) = match classify_uninstall(raw.success, &raw.message) {
                UninstallDisposition::Removed => {
                    (OperationResult::ok(format!("{package} removed")), false)
                }
                UninstallDisposition::NotInstalled => (
                    OperationResult::ok(format!("{package} not installed, skipped")),
                    false,
                ),
                UninstallDisposition::SystemProtected => (
                    OperationResult::ok(format!("{package} is system-protected, left in place")),
                    false,
                ),
                UninstallDisposition::HardFailure => {
                    (OperationResult::failed(raw.message.clone()), true)
                }
            };
            report
                .steps
                .push(StepRecord::new(StepKind::RemovePackage(package.to_string()), result));
            if abort {
                emit(ProgressEvent::device(
                    target,
                    format!("removal of {package} failed, remaining steps skipped"),
                ));
                return report;
            }
        }

        if cancel.is_cancelled() {
            return report;
        }
        emit(ProgressEvent::device(target, format!("setting density to {}", job.dpi)));
        let density = self.adapter.set_display_density(target, job.dpi, trace_id);
        let density_ok = density.success;
        report
            .steps
            .push(StepRecord::new(StepKind::SetDensity(job.dpi), density));
        if !density_ok {
            return report;
        }

        if cancel.is_cancelled() {
            return report;
        }
        emit(ProgressEvent::device(target, "rebooting"));
        let reboot = self.adapter.reboot(target, trace_id);
        // The connection often drops before adb reports success here; an
        // unconfirmed reboot does not fail the device.
        let result = if reboot.success {
            reboot
        } else {
            OperationResult::ok(format!("reboot not confirmed: {}", reboot.message))
        };
        report.steps.push(StepRecord::new(StepKind::Reboot, result));
        emit(ProgressEvent::device(target, "done"));
        report
    }

    fn quick_setup_device(
        &self,
        target: &DeviceTarget,
        profile: &PanelProfile,
        emit: &ProgressEmitter,
        cancel: &CancelToken,
        trace_id: &str,
    ) -> DeviceReport {
        let mut report = DeviceReport::new(target.clone());

        let connect = self.adapter.connect(target, trace_id);
        let connected = connect.success;
        report.steps.push(StepRecord::new(StepKind::Connect, connect));
        if !connected {
            return report;
        }

        for apk in &profile.apk_paths {
            if cancel.is_cancelled() {
                return report;
            }
            let shown = apk.display().to_string();
            emit(ProgressEvent::device(target, format!("installing {shown}")));
            let install = self.adapter.install_package(target, apk, trace_id);
            let installed = install.success;
            report
                .steps
                .push(StepRecord::new(StepKind::InstallApk(shown.clone()), install));
            if !installed {
                emit(ProgressEvent::device(
                    target,
                    format!("install of {shown} failed, remaining steps skipped"),
                ));
                return report;
            }
        }

        if cancel.is_cancelled() {
            return report;
        }
        emit(ProgressEvent::device(
            target,
            format!("setting density to {USB_QUICK_SETUP_DPI}"),
        ));
        let density = self
            .adapter
            .set_display_density(target, USB_QUICK_SETUP_DPI, trace_id);
        let density_ok = density.success;
        report
            .steps
            .push(StepRecord::new(StepKind::SetDensity(USB_QUICK_SETUP_DPI), density));
        if !density_ok {
            return report;
        }

        if let Some(engine) = &profile.tts_engine {
            if cancel.is_cancelled() {
                return report;
            }
            emit(ProgressEvent::device(target, format!("setting TTS engine {engine}")));
            let tts = self.adapter.configure_tts(target, engine, None, trace_id);
            let tts_ok = tts.success;
            report
                .steps
                .push(StepRecord::new(StepKind::ConfigureTts(engine.clone()), tts));
            if !tts_ok {
                return report;
            }
        }

        if cancel.is_cancelled() {
            return report;
        }
        emit(ProgressEvent::device(
            target,
            format!("configuring auto-start for {}", profile.target_package),
        ));
        let auto_start = self.adapter.configure_auto_start(target, profile, trace_id);
        report.steps.push(StepRecord::new(
            StepKind::AutoStart(profile.target_package.clone()),
            auto_start,
        ));
        emit(ProgressEvent::device(target, "done"));
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::error::AppError;
    use std::collections::HashMap;
    use std::path::Path;

    /// Scripted stand-in for the external tool. Responses are keyed by a
    /// compact call signature; anything unscripted succeeds.
    struct FakeAdapter {
        ready: Result<Vec<String>, String>,
        responses: HashMap<String, OperationResult>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeAdapter {
        fn new() -> Self {
            Self {
                ready: Ok(Vec::new()),
                responses: HashMap::new(),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn with_ready(serials: &[&str]) -> Self {
            let mut fake = Self::new();
            fake.ready = Ok(serials.iter().map(|s| s.to_string()).collect());
            fake
        }

        fn script(mut self, key: &str, result: OperationResult) -> Self {
            self.responses.insert(key.to_string(), result);
            self
        }

        fn record(&self, key: String) -> OperationResult {
            self.calls
                .lock()
                .expect("call log")
                .push(key.clone());
            self.responses
                .get(&key)
                .cloned()
                .unwrap_or_else(|| OperationResult::ok("ok"))
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().expect("call log").clone()
        }
    }

    impl DeviceCommands for FakeAdapter {
        fn list_ready_devices(&self, _trace_id: &str) -> Result<Vec<String>, AppError> {
            match &self.ready {
                Ok(serials) => Ok(serials.clone()),
                Err(message) => Err(AppError::dependency(message.clone(), "t")),
            }
        }

        fn connect(&self, target: &DeviceTarget, _trace_id: &str) -> OperationResult {
            self.record(format!("connect {target}"))
        }

        fn uninstall_package(
            &self,
            target: &DeviceTarget,
            package: &str,
            _trace_id: &str,
        ) -> OperationResult {
            self.record(format!("uninstall {target} {package}"))
        }

        fn install_package(
            &self,
            target: &DeviceTarget,
            apk_path: &Path,
            _trace_id: &str,
        ) -> OperationResult {
            self.record(format!("install {target} {}", apk_path.display()))
        }

        fn set_display_density(
            &self,
            target: &DeviceTarget,
            dpi: i32,
            _trace_id: &str,
        ) -> OperationResult {
            self.record(format!("density {target} {dpi}"))
        }

        fn reboot(&self, target: &DeviceTarget, _trace_id: &str) -> OperationResult {
            self.record(format!("reboot {target}"))
        }

        fn configure_tts(
            &self,
            target: &DeviceTarget,
            engine: &str,
            _rate: Option<u32>,
            _trace_id: &str,
        ) -> OperationResult {
            self.record(format!("tts {target} {engine}"))
        }

        fn configure_auto_start(
            &self,
            target: &DeviceTarget,
            profile: &PanelProfile,
            _trace_id: &str,
        ) -> OperationResult {
            self.record(format!("autostart {target} {}", profile.target_package))
        }
    }

    fn runner(adapter: FakeAdapter) -> BatchRunner<FakeAdapter> {
        BatchRunner::new(adapter, RunScheduler::new(1))
    }

    fn silent() -> ProgressEmitter {
        Arc::new(|_event| {})
    }

    fn jobs(addresses: &[&str]) -> Vec<ProvisionJob> {
        addresses
            .iter()
            .map(|address| {
                ProvisionJob::new(DeviceTarget::parse_address(address).expect("address"), 160)
            })
            .collect()
    }

    fn two_package_selection() -> PackageSelection {
        let mut selection = PackageSelection::empty();
        assert!(selection.add("com.netflix.mediaclient"));
        assert!(selection.add("tv.pluto.android"));
        selection
    }

    #[test]
    fn wifi_batch_runs_every_step_in_order_per_device() {
        let runner = runner(FakeAdapter::new());
        let report = runner.run_wifi_batch(
            &jobs(&["10.0.0.15"]),
            &two_package_selection(),
            &silent(),
            &CancelToken::new(),
            "t",
        );
        assert_eq!(report.verdict, BatchVerdict::AllSucceeded);
        assert!(!report.cancelled);
        assert_eq!(
            runner.adapter.calls(),
            vec![
                "connect 10.0.0.15:5555",
                "uninstall 10.0.0.15:5555 com.netflix.mediaclient",
                "uninstall 10.0.0.15:5555 tv.pluto.android",
                "density 10.0.0.15:5555 160",
                "reboot 10.0.0.15:5555",
            ]
        );
    }

    #[test]
    fn connect_failure_skips_the_device_but_not_the_batch() {
        let adapter = FakeAdapter::new().script(
            "connect 10.0.0.9:5555",
            OperationResult::failed("failed to connect to '10.0.0.9:5555'"),
        );
        let runner = runner(adapter);
        let report = runner.run_wifi_batch(
            &jobs(&["10.0.0.9", "10.0.0.10"]),
            &two_package_selection(),
            &silent(),
            &CancelToken::new(),
            "t",
        );
        assert_eq!(report.verdict, BatchVerdict::Partial);
        assert_eq!(report.devices.len(), 2);
        assert_eq!(report.devices[0].steps.len(), 1);
        assert!(!report.devices[0].succeeded());
        assert!(report.devices[1].succeeded());
        // No further commands were sent to the unreachable device.
        assert!(!runner
            .adapter
            .calls()
            .iter()
            .any(|call| call.starts_with("uninstall 10.0.0.9")));
    }

    #[test]
    fn absent_and_protected_packages_do_not_fail_the_device() {
        let adapter = FakeAdapter::new()
            .script(
                "uninstall 10.0.0.15:5555 com.netflix.mediaclient",
                OperationResult::failed("Failure [DELETE_FAILED_NOT_INSTALLED]"),
            )
            .script(
                "uninstall 10.0.0.15:5555 tv.pluto.android",
                OperationResult::failed("Failure [DELETE_FAILED_DEVICE_POLICY_MANAGER]"),
            );
        let runner = runner(adapter);
        let report = runner.run_wifi_batch(
            &jobs(&["10.0.0.15"]),
            &two_package_selection(),
            &silent(),
            &CancelToken::new(),
            "t",
        );
        assert_eq!(report.verdict, BatchVerdict::AllSucceeded);
        let device = &report.devices[0];
        assert!(device.succeeded());
        assert!(device.steps[1].result.message.contains("not installed"));
        assert!(device.steps[2].result.message.contains("system-protected"));
        // Density and reboot still ran.
        assert_eq!(device.steps.len(), 5);
    }

    #[test]
    fn hard_uninstall_failure_aborts_the_remaining_steps() {
        let adapter = FakeAdapter::new().script(
            "uninstall 10.0.0.15:5555 com.netflix.mediaclient",
            OperationResult::failed("adb: device offline"),
        );
        let runner = runner(adapter);
        let report = runner.run_wifi_batch(
            &jobs(&["10.0.0.15"]),
            &two_package_selection(),
            &silent(),
            &CancelToken::new(),
            "t",
        );
        assert_eq!(report.verdict, BatchVerdict::AllFailed);
        let device = &report.devices[0];
        assert!(!device.succeeded());
        // Connect plus the failed removal; nothing after it.
        assert_eq!(device.steps.len(), 2);
        let calls = runner.adapter.calls();
        assert!(!calls.iter().any(|call| call.starts_with("density")));
        assert!(!calls.iter().any(|call| call.starts_with("reboot")));
    }

    #[test]
    fn unconfirmed_reboot_still_counts_as_configured() {
        let adapter = FakeAdapter::new().script(
            "reboot 10.0.0.15:5555",
            OperationResult::failed("error: device '10.0.0.15:5555' not found"),
        );
        let runner = runner(adapter);
        let report = runner.run_wifi_batch(
            &jobs(&["10.0.0.15"]),
            &two_package_selection(),
            &silent(),
            &CancelToken::new(),
            "t",
        );
        assert_eq!(report.verdict, BatchVerdict::AllSucceeded);
        let last = report.devices[0].steps.last().expect("reboot step");
        assert!(last.result.success);
        assert!(last.result.message.contains("reboot not confirmed"));
    }

    #[test]
    fn pre_cancelled_run_touches_no_device() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let runner = runner(FakeAdapter::new());
        let report = runner.run_wifi_batch(
            &jobs(&["10.0.0.15", "10.0.0.16"]),
            &two_package_selection(),
            &silent(),
            &cancel,
            "t",
        );
        assert!(report.cancelled);
        assert_eq!(report.verdict, BatchVerdict::AllFailed);
        assert!(report.devices.is_empty());
        assert!(runner.adapter.calls().is_empty());
    }

    #[test]
    fn cancellation_mid_device_skips_the_remaining_steps() {
        let runner = Arc::new(runner(FakeAdapter::new()));
        let cancel = CancelToken::new();
        let cancel_from_emitter = cancel.clone();
        let emit: ProgressEmitter = Arc::new(move |event: ProgressEvent| {
            if event.message.contains("removing tv.pluto.android") {
                cancel_from_emitter.cancel();
            }
        });
        let report = runner.run_wifi_batch(
            &jobs(&["10.0.0.15"]),
            &two_package_selection(),
            &emit,
            &cancel,
            "t",
        );
        assert!(report.cancelled);
        let device = &report.devices[0];
        // The in-flight removal finished; density and reboot never started.
        assert_eq!(device.steps.len(), 3);
        let calls = runner.adapter.calls();
        assert!(!calls.iter().any(|call| call.starts_with("density")));
    }

    #[test]
    fn quick_setup_applies_the_profile_in_order() {
        let mut profile = PanelProfile::new("Painel", "br.com.aipainel.player");
        profile.apk_paths = vec!["apks/a.apk".into(), "apks/b.apk".into()];
        let runner = runner(FakeAdapter::with_ready(&["SER1", "SER2"]));
        let report = runner.run_usb_quick_setup(&profile, &silent(), &CancelToken::new(), "t");
        assert_eq!(report.verdict, BatchVerdict::AllSucceeded);
        assert_eq!(report.devices.len(), 2);
        assert_eq!(report.devices[0].target, DeviceTarget::usb("SER1"));
        let calls = runner.adapter.calls();
        let ser1: Vec<&String> = calls.iter().filter(|call| call.contains("SER1")).collect();
        assert_eq!(
            ser1,
            vec![
                "connect SER1",
                "install SER1 apks/a.apk",
                "install SER1 apks/b.apk",
                "density SER1 160",
                "autostart SER1 br.com.aipainel.player",
            ]
        );
    }

    #[test]
    fn quick_setup_sets_the_tts_engine_when_the_profile_names_one() {
        let mut profile = PanelProfile::new("Painel", "br.com.aipainel.player");
        profile.tts_engine = Some("com.google.android.tts".to_string());
        let runner = runner(FakeAdapter::with_ready(&["SER1"]));
        let report = runner.run_usb_quick_setup(&profile, &silent(), &CancelToken::new(), "t");
        assert_eq!(report.verdict, BatchVerdict::AllSucceeded);
        assert_eq!(
            runner.adapter.calls(),
            vec![
                "connect SER1",
                "density SER1 160",
                "tts SER1 com.google.android.tts",
                "autostart SER1 br.com.aipainel.player",
            ]
        );
    }

    #[test]
    fn failed_tts_setup_skips_auto_start() {
        let mut profile = PanelProfile::new("Painel", "br.com.aipainel.player");
        profile.tts_engine = Some("com.google.android.tts".to_string());
        let adapter = FakeAdapter::with_ready(&["SER1"]).script(
            "tts SER1 com.google.android.tts",
            OperationResult::failed("failed to set TTS engine: timed out"),
        );
        let runner = runner(adapter);
        let report = runner.run_usb_quick_setup(&profile, &silent(), &CancelToken::new(), "t");
        assert_eq!(report.verdict, BatchVerdict::AllFailed);
        assert!(!report.devices[0].succeeded());
        assert!(!runner
            .adapter
            .calls()
            .iter()
            .any(|call| call.starts_with("autostart")));
    }

    #[test]
    fn install_failure_aborts_that_device_only() {
        let mut profile = PanelProfile::new("Painel", "br.com.aipainel.player");
        profile.apk_paths = vec!["apks/a.apk".into()];
        let adapter = FakeAdapter::with_ready(&["SER1", "SER2"]).script(
            "install SER1 apks/a.apk",
            OperationResult::failed("INSTALL_FAILED_OLDER_SDK"),
        );
        let runner = runner(adapter);
        let report = runner.run_usb_quick_setup(&profile, &silent(), &CancelToken::new(), "t");
        assert_eq!(report.verdict, BatchVerdict::Partial);
        assert!(!report.devices[0].succeeded());
        assert_eq!(report.devices[0].steps.len(), 2);
        assert!(report.devices[1].succeeded());
    }

    #[test]
    fn enumeration_failure_yields_an_empty_failed_report() {
        let mut adapter = FakeAdapter::new();
        adapter.ready = Err("adb devices failed: cannot connect to daemon".to_string());
        let runner = runner(adapter);
        let profile = PanelProfile::new("Painel", "br.com.aipainel.player");
        let report = runner.run_usb_quick_setup(&profile, &silent(), &CancelToken::new(), "t");
        assert_eq!(report.verdict, BatchVerdict::AllFailed);
        assert!(report.devices.is_empty());
        assert!(runner.adapter.calls().is_empty());
    }

    #[test]
    fn empty_job_list_is_all_failed() {
        let runner = runner(FakeAdapter::new());
        let report = runner.run_wifi_batch(
            &[],
            &two_package_selection(),
            &silent(),
            &CancelToken::new(),
            "t",
        );
        assert_eq!(report.verdict, BatchVerdict::AllFailed);
        assert!(report.devices.is_empty());
    }
}

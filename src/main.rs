use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{mpsc, Arc};
use std::thread;

use minipc_provisioner::app::adb::adapter::{AdbAdapter, DeviceCommands};
use minipc_provisioner::app::adb::locator::validate_adb_program;
use minipc_provisioner::app::error::AppError;
use minipc_provisioner::app::logging::init_logging;
use minipc_provisioner::app::models::{BatchRunReport, BatchVerdict, DeviceTarget, ProgressEvent};
use minipc_provisioner::app::pipeline::{
    BatchRunner, CancelToken, ProgressEmitter, ProvisionJob, DEFAULT_WORKER_LIMIT,
};
use minipc_provisioner::app::profiles::{
    builtin_profile_names, find_builtin, profile_from_dir, PanelProfile,
};
use minipc_provisioner::app::scheduler::RunScheduler;
use minipc_provisioner::app::selection::PackageSelection;
use minipc_provisioner::app::settings::{
    load_settings, save_settings, StoredSettings, StoredTarget, DEFAULT_ADDRESS,
};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Wifi,
    Usb,
    Info,
    Tts,
    Devices,
    Packages,
}

#[derive(Debug, Clone)]
struct Args {
    mode: Mode,
    addresses: Vec<String>,
    dpi: Option<i32>,
    keep: Vec<String>,
    remove: Vec<String>,
    adb: String,
    workers: usize,
    no_save: bool,
    json: bool,
    profile: Option<String>,
    folder: Option<PathBuf>,
    package: Option<String>,
    serial: Option<String>,
    engine: Option<String>,
    rate: Option<u32>,
}

fn usage() -> String {
    let profiles = builtin_profile_names().join(", ");
    format!(
        "usage: minipc-provisioner <mode> [options]\n\
         \n\
         modes:\n\
         \x20 wifi     connect over Wi-Fi, remove packages, set density, reboot\n\
         \x20 usb      apply a deployment profile to every USB device\n\
         \x20 info     show model, OS version and current density\n\
         \x20 tts      set the text-to-speech engine on one device\n\
         \x20 devices  list devices in the ready state\n\
         \x20 packages list the packages installed on one device\n\
         \n\
         wifi options:\n\
         \x20 --address HOST[:PORT]  device to configure (repeatable; default port 5555;\n\
         \x20                        defaults to the saved addresses when omitted)\n\
         \x20 --dpi N                density for every device (default: saved or 160)\n\
         \x20 --remove PKG           add a package to the removal list (repeatable)\n\
         \x20 --keep PKG             drop a package from the stock removal list (repeatable)\n\
         \x20 --no-save              do not persist the addresses and DPI for next time\n\
         \n\
         usb options:\n\
         \x20 --profile NAME         built-in deployment profile ({profiles})\n\
         \x20 --folder DIR           install every .apk in DIR instead\n\
         \x20 --package PKG          auto-start package (required with --folder)\n\
         \n\
         info/tts options:\n\
         \x20 --address HOST[:PORT] | --serial SERIAL\n\
         \x20 --engine PKG           TTS engine package (tts mode)\n\
         \x20 --rate N               TTS speech rate (tts mode, optional)\n\
         \n\
         common options:\n\
         \x20 --adb PATH             adb executable (default: MINIPC_ADB or PATH lookup)\n\
         \x20 --workers N            concurrent devices (default: {DEFAULT_WORKER_LIMIT})\n\
         \x20 --json                 print the full run report as JSON (wifi/usb)"
    )
}

fn parse_args() -> Result<Args, String> {
    let mut it = std::env::args().skip(1);
    let mode = match it.next().as_deref() {
        Some("wifi") => Mode::Wifi,
        Some("usb") => Mode::Usb,
        Some("info") => Mode::Info,
        Some("tts") => Mode::Tts,
        Some("devices") => Mode::Devices,
        Some("packages") => Mode::Packages,
        Some(other) => return Err(format!("unknown mode: {other}")),
        None => return Err("a mode is required".to_string()),
    };

    let mut args = Args {
        mode,
        addresses: Vec::new(),
        dpi: None,
        keep: Vec::new(),
        remove: Vec::new(),
        adb: String::new(),
        workers: DEFAULT_WORKER_LIMIT,
        no_save: false,
        json: false,
        profile: None,
        folder: None,
        package: None,
        serial: None,
        engine: None,
        rate: None,
    };

    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--address" => {
                let value = value_for(&mut it, "--address")?;
                args.addresses.push(value);
            }
            "--dpi" => {
                let value = value_for(&mut it, "--dpi")?;
                let dpi = value
                    .parse::<i32>()
                    .map_err(|_| format!("--dpi must be an integer, got {value}"))?;
                if dpi <= 0 {
                    return Err(format!("--dpi must be positive, got {dpi}"));
                }
                args.dpi = Some(dpi);
            }
            "--keep" => args.keep.push(value_for(&mut it, "--keep")?),
            "--remove" => args.remove.push(value_for(&mut it, "--remove")?),
            "--adb" => args.adb = value_for(&mut it, "--adb")?,
            "--workers" => {
                let value = value_for(&mut it, "--workers")?;
                args.workers = value
                    .parse::<usize>()
                    .ok()
                    .filter(|count| *count > 0)
                    .ok_or_else(|| format!("--workers must be a positive integer, got {value}"))?;
            }
            "--no-save" => args.no_save = true,
            "--json" => args.json = true,
            "--profile" => args.profile = Some(value_for(&mut it, "--profile")?),
            "--folder" => args.folder = Some(PathBuf::from(value_for(&mut it, "--folder")?)),
            "--package" => args.package = Some(value_for(&mut it, "--package")?),
            "--serial" => args.serial = Some(value_for(&mut it, "--serial")?),
            "--engine" => args.engine = Some(value_for(&mut it, "--engine")?),
            "--rate" => {
                let value = value_for(&mut it, "--rate")?;
                let rate = value
                    .parse::<u32>()
                    .map_err(|_| format!("--rate must be an integer, got {value}"))?;
                args.rate = Some(rate);
            }
            other => return Err(format!("unknown option: {other}")),
        }
    }
    Ok(args)
}

fn value_for(it: &mut impl Iterator<Item = String>, flag: &str) -> Result<String, String> {
    it.next()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| format!("{flag} requires a value"))
}

fn main() -> ExitCode {
    init_logging();
    let args = match parse_args() {
        Ok(args) => args,
        Err(message) => {
            eprintln!("{message}\n\n{}", usage());
            return ExitCode::from(2);
        }
    };
    let trace_id = Uuid::new_v4().to_string();
    match run(args, &trace_id) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::from(2)
        }
    }
}

fn run(args: Args, trace_id: &str) -> Result<ExitCode, AppError> {
    if !args.adb.is_empty() {
        validate_adb_program(&args.adb)
            .map_err(|message| AppError::validation(message, trace_id))?;
    }
    let adapter = AdbAdapter::new(&args.adb);
    match args.mode {
        Mode::Devices => run_devices(&adapter, trace_id),
        Mode::Packages => run_packages(&adapter, &args, trace_id),
        Mode::Info => run_info(&adapter, &args, trace_id),
        Mode::Tts => run_tts(&adapter, &args, trace_id),
        Mode::Wifi => run_wifi(adapter, &args, trace_id),
        Mode::Usb => run_usb(adapter, &args, trace_id),
    }
}

fn single_target(args: &Args, trace_id: &str) -> Result<DeviceTarget, AppError> {
    if let Some(serial) = &args.serial {
        return Ok(DeviceTarget::usb(serial.clone()));
    }
    if let Some(address) = args.addresses.first() {
        return DeviceTarget::parse_address(address).ok_or_else(|| {
            AppError::validation(format!("invalid address: {address}"), trace_id)
        });
    }
    Err(AppError::validation(
        "this mode needs --address or --serial",
        trace_id,
    ))
}

fn run_devices(adapter: &AdbAdapter, trace_id: &str) -> Result<ExitCode, AppError> {
    let serials = adapter.list_ready_devices(trace_id)?;
    if serials.is_empty() {
        println!("no devices in the ready state");
    } else {
        for serial in &serials {
            println!("{serial}");
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn run_packages(adapter: &AdbAdapter, args: &Args, trace_id: &str) -> Result<ExitCode, AppError> {
    let target = single_target(args, trace_id)?;
    if target.is_network() {
        let connect = adapter.connect(&target, trace_id);
        if !connect.success {
            eprintln!("{target}: {}", connect.message);
            return Ok(ExitCode::from(1));
        }
    }
    for package in adapter.list_installed_packages(&target, trace_id)? {
        println!("{package}");
    }
    Ok(ExitCode::SUCCESS)
}

fn run_info(adapter: &AdbAdapter, args: &Args, trace_id: &str) -> Result<ExitCode, AppError> {
    let target = single_target(args, trace_id)?;
    if target.is_network() {
        let connect = adapter.connect(&target, trace_id);
        if !connect.success {
            eprintln!("{target}: {}", connect.message);
            return Ok(ExitCode::from(1));
        }
    }
    let info = adapter.query_info(&target, trace_id)?;
    println!("model:      {}", info.model);
    println!("android:    {}", info.os_version);
    println!("density:    {}", info.current_density);
    Ok(ExitCode::SUCCESS)
}

fn run_tts(adapter: &AdbAdapter, args: &Args, trace_id: &str) -> Result<ExitCode, AppError> {
    let engine = args
        .engine
        .as_deref()
        .ok_or_else(|| AppError::validation("tts mode needs --engine", trace_id))?;
    let target = single_target(args, trace_id)?;
    if target.is_network() {
        let connect = adapter.connect(&target, trace_id);
        if !connect.success {
            eprintln!("{target}: {}", connect.message);
            return Ok(ExitCode::from(1));
        }
    }
    let result = adapter.configure_tts(&target, engine, args.rate, trace_id);
    println!("{target}: {}", result.message);
    Ok(if result.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}

/// Builds the job list from --address flags, falling back to the saved
/// slots. The saved address may still be the bare prefix the entry field is
/// pre-filled with; those slots are skipped.
fn wifi_jobs(args: &Args, settings: &StoredSettings, trace_id: &str) -> Result<Vec<ProvisionJob>, AppError> {
    let mut jobs = Vec::new();
    if args.addresses.is_empty() {
        for slot in &settings.targets {
            if slot.address == DEFAULT_ADDRESS {
                continue;
            }
            let Some(target) = DeviceTarget::parse_address(&slot.address) else {
                continue;
            };
            let dpi = match args.dpi {
                Some(dpi) => dpi,
                None => slot.dpi.parse::<i32>().unwrap_or(160),
            };
            jobs.push(ProvisionJob::new(target, dpi));
        }
        if jobs.is_empty() {
            return Err(AppError::validation(
                "no saved device address; pass --address",
                trace_id,
            ));
        }
    } else {
        for address in &args.addresses {
            let target = DeviceTarget::parse_address(address).ok_or_else(|| {
                AppError::validation(format!("invalid address: {address}"), trace_id)
            })?;
            jobs.push(ProvisionJob::new(target, args.dpi.unwrap_or(160)));
        }
    }
    Ok(jobs)
}

fn wifi_selection(args: &Args) -> PackageSelection {
    let mut selection = PackageSelection::stock();
    for package in &args.keep {
        selection.remove(package);
    }
    for package in &args.remove {
        selection.add(package);
    }
    selection
}

fn run_wifi(adapter: AdbAdapter, args: &Args, trace_id: &str) -> Result<ExitCode, AppError> {
    let settings = load_settings();
    let jobs = wifi_jobs(args, &settings, trace_id)?;
    let selection = wifi_selection(args);

    let runner = BatchRunner::new(adapter, RunScheduler::new(args.workers));
    let (emit, printer) = console_emitter();
    let report = runner.run_wifi_batch(&jobs, &selection, &emit, &CancelToken::new(), trace_id);
    drop(emit);
    let _ = printer.join();
    print_report(&report, args.json, trace_id)?;

    if !args.no_save {
        let targets = jobs
            .iter()
            .take(2)
            .map(|job| StoredTarget {
                address: job.target.adb_serial(),
                dpi: job.dpi.to_string(),
            })
            .collect();
        if let Err(err) = save_settings(&StoredSettings { targets }, trace_id) {
            eprintln!("warning: {err}");
        }
    }
    Ok(verdict_exit(&report))
}

fn run_usb(adapter: AdbAdapter, args: &Args, trace_id: &str) -> Result<ExitCode, AppError> {
    let profile = usb_profile(args, trace_id)?;
    let runner = BatchRunner::new(adapter, RunScheduler::new(args.workers));
    let (emit, printer) = console_emitter();
    let report = runner.run_usb_quick_setup(&profile, &emit, &CancelToken::new(), trace_id);
    drop(emit);
    let _ = printer.join();
    print_report(&report, args.json, trace_id)?;
    Ok(verdict_exit(&report))
}

fn usb_profile(args: &Args, trace_id: &str) -> Result<PanelProfile, AppError> {
    if let Some(folder) = &args.folder {
        let package = args.package.as_deref().ok_or_else(|| {
            AppError::validation("--folder needs --package for auto-start", trace_id)
        })?;
        return profile_from_dir(folder, package, trace_id);
    }
    let name = args.profile.as_deref().ok_or_else(|| {
        AppError::validation(
            format!(
                "usb mode needs --profile ({}) or --folder",
                builtin_profile_names().join(", ")
            ),
            trace_id,
        )
    })?;
    find_builtin(name, trace_id).ok_or_else(|| {
        AppError::validation(
            format!(
                "unknown profile {name}; available: {}",
                builtin_profile_names().join(", ")
            ),
            trace_id,
        )
    })?
}

/// Progress lines print from a dedicated thread so worker output never
/// interleaves mid-line. Closing the channel (dropping the emitter) ends it.
fn console_emitter() -> (ProgressEmitter, thread::JoinHandle<()>) {
    let (tx, rx) = mpsc::channel::<ProgressEvent>();
    let printer = thread::spawn(move || {
        for event in rx {
            match &event.target {
                Some(target) => println!("[{target}] {}", event.message),
                None => println!("{}", event.message),
            }
        }
    });
    let emit: ProgressEmitter = Arc::new(move |event| {
        let _ = tx.send(event);
    });
    (emit, printer)
}

fn print_report(report: &BatchRunReport, json: bool, trace_id: &str) -> Result<(), AppError> {
    if json {
        let payload = serde_json::to_string_pretty(report).map_err(|err| {
            AppError::system(format!("Failed to encode report: {err}"), trace_id)
        })?;
        println!("{payload}");
    } else {
        print_summary(report);
    }
    Ok(())
}

fn print_summary(report: &BatchRunReport) {
    for device in &report.devices {
        if device.succeeded() {
            println!("OK    {}", device.target);
        } else {
            let detail = device
                .steps
                .iter()
                .find(|step| !step.result.success)
                .map(|step| format!("{}: {}", step.kind, step.result.message))
                .unwrap_or_else(|| "no steps ran".to_string());
            println!("FAIL  {} ({detail})", device.target);
        }
    }
    if report.cancelled {
        println!("run cancelled");
    }
}

fn verdict_exit(report: &BatchRunReport) -> ExitCode {
    match report.verdict {
        BatchVerdict::AllSucceeded => ExitCode::SUCCESS,
        BatchVerdict::Partial => ExitCode::from(1),
        BatchVerdict::AllFailed => ExitCode::from(2),
    }
}

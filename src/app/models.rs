use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_WIRELESS_PORT: u16 = 5555;

/// One device to provision: a Wi-Fi address or a USB-enumerated serial.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeviceTarget {
    Network { host: String, port: u16 },
    Usb { serial: String },
}

impl DeviceTarget {
    pub fn network(host: impl Into<String>) -> Self {
        Self::Network {
            host: host.into(),
            port: DEFAULT_WIRELESS_PORT,
        }
    }

    pub fn network_with_port(host: impl Into<String>, port: u16) -> Self {
        Self::Network {
            host: host.into(),
            port,
        }
    }

    pub fn usb(serial: impl Into<String>) -> Self {
        Self::Usb {
            serial: serial.into(),
        }
    }

    /// Parses `host` or `host:port` into a network target.
    pub fn parse_address(value: &str) -> Option<Self> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return None;
        }
        match trimmed.rsplit_once(':') {
            Some((host, port)) if !host.is_empty() => {
                let port = port.parse::<u16>().ok()?;
                Some(Self::network_with_port(host, port))
            }
            _ => Some(Self::network(trimmed)),
        }
    }

    /// The string passed to `adb -s`.
    pub fn adb_serial(&self) -> String {
        match self {
            Self::Network { host, port } => format!("{host}:{port}"),
            Self::Usb { serial } => serial.clone(),
        }
    }

    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network { .. })
    }
}

impl fmt::Display for DeviceTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.adb_serial())
    }
}

/// Normalized outcome of one external-tool invocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OperationResult {
    pub success: bool,
    pub message: String,
}

impl OperationResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Read-only device identification block. Density stays an opaque display
/// string (`wm density` output varies across builds).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeviceInfo {
    pub model: String,
    pub os_version: String,
    pub current_density: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "step", content = "detail", rename_all = "snake_case")]
pub enum StepKind {
    Connect,
    RemovePackage(String),
    InstallApk(String),
    SetDensity(i32),
    Reboot,
    ConfigureTts(String),
    AutoStart(String),
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect => write!(f, "connect"),
            Self::RemovePackage(pkg) => write!(f, "remove {pkg}"),
            Self::InstallApk(path) => write!(f, "install {path}"),
            Self::SetDensity(dpi) => write!(f, "density {dpi}"),
            Self::Reboot => write!(f, "reboot"),
            Self::ConfigureTts(engine) => write!(f, "tts {engine}"),
            Self::AutoStart(pkg) => write!(f, "auto-start {pkg}"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StepRecord {
    pub kind: StepKind,
    pub result: OperationResult,
}

impl StepRecord {
    pub fn new(kind: StepKind, result: OperationResult) -> Self {
        Self { kind, result }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeviceReport {
    pub target: DeviceTarget,
    pub steps: Vec<StepRecord>,
}

impl DeviceReport {
    pub fn new(target: DeviceTarget) -> Self {
        Self {
            target,
            steps: Vec::new(),
        }
    }

    /// A device counts as configured when every recorded step succeeded.
    /// Soft outcomes (absent package, protected package, unconfirmed
    /// reboot) are recorded as successes with an explanatory message, so
    /// this stays a pure function of the `success` flags.
    pub fn succeeded(&self) -> bool {
        !self.steps.is_empty() && self.steps.iter().all(|step| step.result.success)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BatchVerdict {
    AllSucceeded,
    Partial,
    AllFailed,
}

impl BatchVerdict {
    pub fn from_reports(devices: &[DeviceReport]) -> Self {
        let succeeded = devices.iter().filter(|device| device.succeeded()).count();
        if devices.is_empty() || succeeded == 0 {
            Self::AllFailed
        } else if succeeded == devices.len() {
            Self::AllSucceeded
        } else {
            Self::Partial
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BatchRunReport {
    pub devices: Vec<DeviceReport>,
    pub verdict: BatchVerdict,
    pub cancelled: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl BatchRunReport {
    pub fn success_count(&self) -> usize {
        self.devices
            .iter()
            .filter(|device| device.succeeded())
            .count()
    }
}

/// One human-readable progress line. `target` is absent for run-level lines.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProgressEvent {
    pub target: Option<String>,
    pub message: String,
}

impl ProgressEvent {
    pub fn device(target: &DeviceTarget, message: impl Into<String>) -> Self {
        Self {
            target: Some(target.adb_serial()),
            message: message.into(),
        }
    }

    pub fn run(message: impl Into<String>) -> Self {
        Self {
            target: None,
            message: message.into(),
        }
    }
}

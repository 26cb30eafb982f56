//! Compute device detection for local speech recognition.
//!
//! Preference order is CUDA, then Intel XPU, then CPU. The probe runs once at
//! startup; `KANHU_DEVICE` forces a choice.

use serde::Serialize;
use std::fmt;
use std::process::{Command, Stdio};
use tracing::{debug, info};

/// Device handed to the local Whisper runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ComputeDevice {
    Cuda,
    Xpu,
    Cpu,
}

impl ComputeDevice {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComputeDevice::Cuda => "cuda",
            ComputeDevice::Xpu => "xpu",
            ComputeDevice::Cpu => "cpu",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "cuda" | "gpu" => Some(ComputeDevice::Cuda),
            "xpu" => Some(ComputeDevice::Xpu),
            "cpu" => Some(ComputeDevice::Cpu),
            _ => None,
        }
    }
}

impl fmt::Display for ComputeDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Probe the host for the best available device.
pub fn probe_device() -> ComputeDevice {
    if let Some(forced) = std::env::var("KANHU_DEVICE")
        .ok()
        .and_then(|v| ComputeDevice::parse(&v))
    {
        info!("Using forced compute device: {}", forced);
        return forced;
    }

    let device = probe_with(command_succeeds);
    info!("Detected compute device: {}", device);
    device
}

/// Probe using a custom command check (`program`, `args`) -> success.
pub fn probe_with<F>(succeeds: F) -> ComputeDevice
where
    F: Fn(&str, &[&str]) -> bool,
{
    if succeeds("nvidia-smi", &["-L"]) {
        return ComputeDevice::Cuda;
    }
    if succeeds("xpu-smi", &["discovery"]) || succeeds("sycl-ls", &[]) {
        return ComputeDevice::Xpu;
    }
    ComputeDevice::Cpu
}

fn command_succeeds(program: &str, args: &[&str]) -> bool {
    let status = Command::new(program)
        .args(args)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
    debug!("Device probe {} -> {:?}", program, status.as_ref().map(|s| s.success()));
    matches!(status, Ok(s) if s.success())
}

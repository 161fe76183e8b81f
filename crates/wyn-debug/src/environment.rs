//! Host environment probe for crash dumps.
//!
//! Each [`HostEnvironment`] method is independently fallible and defaults to
//! [`CaptureError::Unsupported`], so a host only implements what it can
//! actually report. A headless server, for instance, has no window.

use serde::{Deserialize, Serialize};
use wyn_log::CaptureError;

/// Pixel dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

/// Process memory figures in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryInfo {
    /// Bytes in use.
    pub used_bytes: u64,
    /// Bytes available to the process, if known.
    pub limit_bytes: Option<u64>,
}

fn unsupported<T>(what: &str) -> Result<T, CaptureError> {
    Err(CaptureError::Unsupported(what.to_owned()))
}

/// What the host can tell us about where it runs.
pub trait HostEnvironment: Send + Sync {
    /// Operating system name.
    fn os(&self) -> Result<String, CaptureError> {
        unsupported("os")
    }

    /// CPU architecture.
    fn arch(&self) -> Result<String, CaptureError> {
        unsupported("arch")
    }

    /// Logical CPU count.
    fn hardware_concurrency(&self) -> Result<usize, CaptureError> {
        unsupported("hardware_concurrency")
    }

    /// Game window size.
    fn window(&self) -> Result<Dimensions, CaptureError> {
        unsupported("window")
    }

    /// Screen size.
    fn screen(&self) -> Result<Dimensions, CaptureError> {
        unsupported("screen")
    }

    /// Device pixel ratio.
    fn device_pixel_ratio(&self) -> Result<f64, CaptureError> {
        unsupported("device_pixel_ratio")
    }

    /// Process memory.
    fn memory(&self) -> Result<MemoryInfo, CaptureError> {
        unsupported("memory")
    }
}

/// Probe backed by the standard library: OS, architecture and CPU count.
/// Display and memory are reported as unsupported.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnvironment;

impl HostEnvironment for SystemEnvironment {
    fn os(&self) -> Result<String, CaptureError> {
        Ok(std::env::consts::OS.to_owned())
    }

    fn arch(&self) -> Result<String, CaptureError> {
        Ok(std::env::consts::ARCH.to_owned())
    }

    fn hardware_concurrency(&self) -> Result<usize, CaptureError> {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .map_err(|e| CaptureError::Failed {
                section: "hardware_concurrency".to_owned(),
                details: e.to_string(),
            })
    }
}

/// Fixed values, for tests and for hosts that learn their environment once
/// at startup. Unset fields are unsupported.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StaticEnvironment {
    /// Operating system name.
    pub os: Option<String>,
    /// CPU architecture.
    pub arch: Option<String>,
    /// Logical CPU count.
    pub hardware_concurrency: Option<usize>,
    /// Window size.
    pub window: Option<Dimensions>,
    /// Screen size.
    pub screen: Option<Dimensions>,
    /// Device pixel ratio.
    pub device_pixel_ratio: Option<f64>,
    /// Process memory.
    pub memory: Option<MemoryInfo>,
}

impl HostEnvironment for StaticEnvironment {
    fn os(&self) -> Result<String, CaptureError> {
        self.os.clone().map_or_else(|| unsupported("os"), Ok)
    }

    fn arch(&self) -> Result<String, CaptureError> {
        self.arch.clone().map_or_else(|| unsupported("arch"), Ok)
    }

    fn hardware_concurrency(&self) -> Result<usize, CaptureError> {
        self.hardware_concurrency
            .map_or_else(|| unsupported("hardware_concurrency"), Ok)
    }

    fn window(&self) -> Result<Dimensions, CaptureError> {
        self.window.map_or_else(|| unsupported("window"), Ok)
    }

    fn screen(&self) -> Result<Dimensions, CaptureError> {
        self.screen.map_or_else(|| unsupported("screen"), Ok)
    }

    fn device_pixel_ratio(&self) -> Result<f64, CaptureError> {
        self.device_pixel_ratio
            .map_or_else(|| unsupported("device_pixel_ratio"), Ok)
    }

    fn memory(&self) -> Result<MemoryInfo, CaptureError> {
        self.memory.map_or_else(|| unsupported("memory"), Ok)
    }
}

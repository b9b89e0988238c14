use super::error::{AdbError, AdbResult};
use super::rust_impl::RustAdb;
use super::shell::AdbShell;
use super::types::{AdbClient, Device};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Which ADB implementation to drive the device with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    /// External `adb` binary. Can attach network emulators with `adb connect`.
    #[default]
    Shell,
    /// ADB server protocol through `adb_client`.
    Rust,
}

impl FromStr for BackendKind {
    type Err = AdbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "shell" | "adb" => Ok(BackendKind::Shell),
            "rust" => Ok(BackendKind::Rust),
            other => Err(AdbError::UnknownBackend(other.to_string())),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Shell => write!(f, "shell"),
            BackendKind::Rust => write!(f, "rust"),
        }
    }
}

pub enum AdbBackend {
    Shell(AdbShell),
    Rust(RustAdb),
}

impl AdbBackend {
    pub async fn list_devices(kind: BackendKind, adb_path: &Path) -> AdbResult<Vec<Device>> {
        match kind {
            BackendKind::Shell => AdbShell::list_devices(adb_path).await,
            BackendKind::Rust => RustAdb::list_devices().await,
        }
    }

    pub async fn connect(
        kind: BackendKind,
        adb_path: &Path,
        serial: Option<&str>,
    ) -> AdbResult<Self> {
        match kind {
            BackendKind::Shell => Ok(AdbBackend::Shell(
                AdbShell::connect(adb_path, serial).await?,
            )),
            BackendKind::Rust => Ok(AdbBackend::Rust(RustAdb::connect(serial).await?)),
        }
    }

    pub fn kind(&self) -> BackendKind {
        match self {
            AdbBackend::Shell(_) => BackendKind::Shell,
            AdbBackend::Rust(_) => BackendKind::Rust,
        }
    }
}

impl AdbClient for AdbBackend {
    async fn screen_capture_bytes(&self) -> AdbResult<Vec<u8>> {
        match self {
            AdbBackend::Shell(s) => s.screen_capture_bytes().await,
            AdbBackend::Rust(r) => r.screen_capture_bytes().await,
        }
    }

    async fn tap(&self, x: u32, y: u32) -> AdbResult<()> {
        match self {
            AdbBackend::Shell(s) => s.tap(x, y).await,
            AdbBackend::Rust(r) => r.tap(x, y).await,
        }
    }

    async fn swipe(
        &self,
        x1: u32,
        y1: u32,
        x2: u32,
        y2: u32,
        duration: Option<u32>,
    ) -> AdbResult<()> {
        match self {
            AdbBackend::Shell(s) => s.swipe(x1, y1, x2, y2, duration).await,
            AdbBackend::Rust(r) => r.swipe(x1, y1, x2, y2, duration).await,
        }
    }

    fn screen_dimensions(&self) -> (u32, u32) {
        match self {
            AdbBackend::Shell(s) => s.screen_dimensions(),
            AdbBackend::Rust(r) => r.screen_dimensions(),
        }
    }

    fn device_name(&self) -> &str {
        match self {
            AdbBackend::Shell(s) => s.device_name(),
            AdbBackend::Rust(r) => r.device_name(),
        }
    }
}

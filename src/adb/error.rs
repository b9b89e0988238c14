use std::path::PathBuf;
use thiserror::Error;

/// A specialized `Result` type for ADB operations.
pub type AdbResult<T> = Result<T, AdbError>;

/// The error type for all ADB-related operations.
#[derive(Debug, Error)]
pub enum AdbError {
    #[error(
        "'adb' binary not usable at {path:?}. Install Android Platform Tools, set --adb-path, or run with --impl=rust."
    )]
    AdbUnavailable { path: PathBuf },

    #[error("Failed to run '{command}': {source}")]
    SpawnFailed {
        command: String,
        source: std::io::Error,
    },

    #[error("'{command}' exited unsuccessfully: {stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("Shell command '{command}' failed: {source}")]
    ShellCommandFailed {
        command: String,
        source: adb_client::RustADBError,
    },

    #[error("Failed to open device through the ADB server: {source}")]
    ServerConnectFailed { source: adb_client::RustADBError },

    #[error("No devices found. Start the emulator or pass --device host:port")]
    NoDevices,

    #[error("Device '{name}' not found")]
    DeviceNotFound { name: String },

    #[error("adb connect {target} failed: {output}")]
    ConnectFailed { target: String, output: String },

    #[error("Could not parse screen size from 'wm size' output.")]
    ScreenSizeParseFailed,

    #[error("Tap coordinates are out of bounds: x={x}, y={y}")]
    TapOutOfBounds { x: u32, y: u32 },

    #[error("Operation timed out after {duration:?}: {description}")]
    Timeout {
        duration: std::time::Duration,
        description: String,
    },

    #[error("Task failed to complete: {source}")]
    JoinError {
        #[from]
        source: tokio::task::JoinError,
    },

    #[error("Screen capture could not be decoded: {description}")]
    CaptureDecodeFailed { description: String },

    #[error("Unknown ADB implementation '{0}', expected 'rust' or 'shell'")]
    UnknownBackend(String),
}

impl AdbError {
    /// Errors after which the same device handle is unlikely to recover.
    pub fn is_disconnect(&self) -> bool {
        match self {
            AdbError::Timeout { .. } | AdbError::NoDevices | AdbError::DeviceNotFound { .. } => true,
            AdbError::ShellCommandFailed { source, .. } => {
                let err_str = source.to_string();
                err_str.contains("CLSE")
                    || err_str.contains("no write endpoint")
                    || err_str.contains("device offline")
            }
            AdbError::CommandFailed { stderr, .. } => {
                stderr.contains("device offline") || stderr.contains("not found")
            }
            _ => false,
        }
    }
}

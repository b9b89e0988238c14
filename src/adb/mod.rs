// ADB module - device bridge for Android emulators and phones.
// Two interchangeable backends: the external `adb` binary, or the ADB
// server protocol spoken directly through `adb_client`.

pub mod backend;
pub mod capture;
pub mod error;
pub mod rust_impl;
pub mod shell;
pub mod types;


pub use backend::{AdbBackend, BackendKind};
pub use capture::{CaptureRecord, CaptureService};
pub use error::{AdbError, AdbResult};
pub use types::{AdbClient, Device, ImageCapture};

// Core ADB types and traits
use super::error::AdbResult;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct ImageCapture {
    pub bytes: Vec<u8>,
    pub duration_ms: u128,
}

// Device-bridge capabilities shared by the shell and pure Rust backends.
// The step engine only ever talks to a device through this trait.
#[allow(async_fn_in_trait)]
pub trait AdbClient: Send + Sync {
    // Raw PNG screenshot (implemented per backend)
    async fn screen_capture_bytes(&self) -> AdbResult<Vec<u8>>;

    async fn screen_capture(&self) -> AdbResult<ImageCapture> {
        let start = std::time::Instant::now();
        let bytes = self.screen_capture_bytes().await?;
        Ok(ImageCapture {
            bytes,
            duration_ms: start.elapsed().as_millis(),
        })
    }

    async fn tap(&self, x: u32, y: u32) -> AdbResult<()>;
    async fn swipe(&self, x1: u32, y1: u32, x2: u32, y2: u32, duration: Option<u32>)
    -> AdbResult<()>;
    fn screen_dimensions(&self) -> (u32, u32);
    fn device_name(&self) -> &str;
}

#[derive(Debug, PartialEq, Serialize, Clone)]
pub struct Device {
    pub name: String,
    pub transport_id: Option<String>,
}

impl Device {
    /// Network devices (emulators) are addressed as `host:port`.
    pub fn is_network(&self) -> bool {
        is_network_serial(&self.name)
    }
}

pub fn is_network_serial(serial: &str) -> bool {
    serial
        .rsplit_once(':')
        .is_some_and(|(host, port)| !host.is_empty() && port.parse::<u16>().is_ok())
}

/// Valid coordinates run from 0 to width-1 / height-1.
pub(crate) fn check_bounds(x: u32, y: u32, screen: (u32, u32)) -> AdbResult<()> {
    if x >= screen.0 || y >= screen.1 {
        return Err(super::AdbError::TapOutOfBounds { x, y });
    }
    Ok(())
}

/// Parse `wm size` output. An override size wins over the physical size
/// because `input tap` uses the overridden coordinate space.
pub fn parse_screen_size(stdout: &str) -> AdbResult<(u32, u32)> {
    let mut physical = None;
    let mut overridden = None;
    for line in stdout.lines() {
        let line = line.trim();
        if let Some(size) = line.strip_prefix("Physical size:") {
            physical = parse_dimensions(size);
        } else if let Some(size) = line.strip_prefix("Override size:") {
            overridden = parse_dimensions(size);
        }
    }
    overridden
        .or(physical)
        .ok_or(super::AdbError::ScreenSizeParseFailed)
}

fn parse_dimensions(size: &str) -> Option<(u32, u32)> {
    let (x, y) = size.trim().split_once('x')?;
    Some((x.trim().parse().ok()?, y.trim().parse().ok()?))
}

// https://crates.io/crates/adb_client
use super::error::{AdbError, AdbResult};
use super::types::{self, AdbClient, Device};
use adb_client::{ADBDeviceExt, ADBServer, ADBServerDevice};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

const COMMAND_TIMEOUT: Duration = Duration::from_secs(5);
const CAPTURE_TIMEOUT: Duration = Duration::from_secs(10);

/// Device bridge speaking the ADB server protocol directly, no `adb` binary needed.
pub struct RustAdb {
    device: Device,
    server_device: Arc<Mutex<ADBServerDevice>>,
    screen_x: u32,
    screen_y: u32,
}

impl RustAdb {
    pub async fn list_devices() -> AdbResult<Vec<Device>> {
        let mut server = ADBServer::default();
        let device_list = tokio::task::spawn_blocking(move || server.devices())
            .await?
            .map_err(|source| AdbError::ServerConnectFailed { source })?;
        Ok(device_list
            .into_iter()
            .map(|d| Device {
                name: d.identifier,
                transport_id: None,
            })
            .collect())
    }

    /// Open a device by serial, or whatever the server reports first.
    pub async fn connect(serial: Option<&str>) -> AdbResult<Self> {
        let name = serial.map(str::to_string);
        let lookup = name.clone();
        let dev = tokio::task::spawn_blocking(move || {
            let mut server = ADBServer::default();
            match lookup {
                Some(name) => server.get_device_by_name(&name),
                None => server.get_device(),
            }
        })
        .await?
        .map_err(|source| AdbError::ServerConnectFailed { source })?;

        let mut adb = RustAdb {
            device: Device {
                name: name.unwrap_or_else(|| "default".to_string()),
                transport_id: None,
            },
            server_device: Arc::new(Mutex::new(dev)),
            screen_x: 0,
            screen_y: 0,
        };
        let out = adb.shell(&["wm", "size"], COMMAND_TIMEOUT).await?;
        let (sx, sy) = types::parse_screen_size(&String::from_utf8_lossy(&out))?;
        adb.screen_x = sx;
        adb.screen_y = sy;
        Ok(adb)
    }

    // Blocking shell_command wrapped in spawn_blocking so the timeout can fire.
    async fn shell(&self, args: &[&str], limit: Duration) -> AdbResult<Vec<u8>> {
        let server_device = Arc::clone(&self.server_device);
        let owned: Vec<String> = args.iter().map(|s| s.to_string()).collect();
        let command = owned.join(" ");
        let task = tokio::task::spawn_blocking(move || {
            let mut out: Vec<u8> = Vec::new();
            let mut dev = server_device.blocking_lock();
            let refs: Vec<&str> = owned.iter().map(String::as_str).collect();
            dev.shell_command(&refs, &mut out).map(|_| out)
        });
        match tokio::time::timeout(limit, task).await {
            Ok(joined) => joined?.map_err(|source| AdbError::ShellCommandFailed { command, source }),
            Err(_) => Err(AdbError::Timeout {
                duration: limit,
                description: command,
            }),
        }
    }
}

impl AdbClient for RustAdb {
    async fn screen_capture_bytes(&self) -> AdbResult<Vec<u8>> {
        self.shell(&["screencap", "-p"], CAPTURE_TIMEOUT).await
    }

    async fn tap(&self, x: u32, y: u32) -> AdbResult<()> {
        types::check_bounds(x, y, self.screen_dimensions())?;
        let (xs, ys) = (x.to_string(), y.to_string());
        self.shell(&["input", "tap", &xs, &ys], COMMAND_TIMEOUT)
            .await
            .map(|_| ())
    }

    async fn swipe(
        &self,
        x1: u32,
        y1: u32,
        x2: u32,
        y2: u32,
        duration: Option<u32>,
    ) -> AdbResult<()> {
        for (x, y) in [(x1, y1), (x2, y2)] {
            types::check_bounds(x, y, self.screen_dimensions())?;
        }
        let mut parts: Vec<String> = vec!["input".into(), "swipe".into()];
        parts.extend([x1, y1, x2, y2].iter().map(u32::to_string));
        if let Some(d) = duration {
            parts.push(d.to_string());
        }
        let refs: Vec<&str> = parts.iter().map(String::as_str).collect();
        self.shell(&refs, COMMAND_TIMEOUT).await.map(|_| ())
    }

    fn screen_dimensions(&self) -> (u32, u32) {
        (self.screen_x, self.screen_y)
    }

    fn device_name(&self) -> &str {
        &self.device.name
    }
}

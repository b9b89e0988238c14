use super::error::{AdbError, AdbResult};
use super::types::{self, AdbClient, Device};
use log::{debug, info};
use std::path::{Path, PathBuf};
use tokio::process::Command;

/// Device bridge that drives an external `adb` binary.
pub struct AdbShell {
    adb_path: PathBuf,
    pub device: Device,
    pub screen_x: u32,
    pub screen_y: u32,
}

impl AdbShell {
    async fn ensure_adb_available(adb_path: &Path) -> AdbResult<()> {
        match Command::new(adb_path).arg("version").output().await {
            Ok(out) if out.status.success() => Ok(()),
            Ok(_) => Err(AdbError::AdbUnavailable {
                path: adb_path.to_path_buf(),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(AdbError::AdbUnavailable {
                path: adb_path.to_path_buf(),
            }),
            Err(source) => Err(AdbError::SpawnFailed {
                command: format!("{} version", adb_path.display()),
                source,
            }),
        }
    }

    // Runs `adb <args>` and returns stdout on success.
    async fn run(adb_path: &Path, args: &[&str]) -> AdbResult<Vec<u8>> {
        let command = format!("adb {}", args.join(" "));
        debug!("running {command}");
        let output = Command::new(adb_path)
            .args(args)
            .output()
            .await
            .map_err(|source| AdbError::SpawnFailed {
                command: command.clone(),
                source,
            })?;
        if !output.status.success() {
            return Err(AdbError::CommandFailed {
                command,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(output.stdout)
    }

    // Runs a command against the selected device (`adb -s <serial> ...`).
    async fn run_on_device(&self, args: &[&str]) -> AdbResult<Vec<u8>> {
        let mut full = vec!["-s", self.device.name.as_str()];
        full.extend_from_slice(args);
        Self::run(&self.adb_path, &full).await
    }

    pub async fn list_devices(adb_path: &Path) -> AdbResult<Vec<Device>> {
        Self::ensure_adb_available(adb_path).await?;
        let stdout = Self::run(adb_path, &["devices", "-l"]).await?;
        Ok(Self::parse_devices(&String::from_utf8_lossy(&stdout)))
    }

    pub fn parse_devices(output: &str) -> Vec<Device> {
        output
            .lines()
            .skip(1)
            .filter_map(|line| {
                let parts: Vec<&str> = line.split_whitespace().collect();
                if parts.len() >= 2 && parts[1] == "device" {
                    let transport_id = parts
                        .iter()
                        .find_map(|part| part.strip_prefix("transport_id:"))
                        .map(str::to_string);
                    Some(Device {
                        name: parts[0].to_string(),
                        transport_id,
                    })
                } else {
                    None
                }
            })
            .collect()
    }

    /// `adb connect` reports failures on stdout with a zero exit code.
    pub fn connect_succeeded(stdout: &str) -> bool {
        let stdout = stdout.to_lowercase();
        (stdout.contains("connected to") || stdout.contains("already connected"))
            && !stdout.contains("cannot")
            && !stdout.contains("failed")
    }

    async fn connect_network(adb_path: &Path, target: &str) -> AdbResult<()> {
        info!("adb connect {target}");
        let stdout = Self::run(adb_path, &["connect", target]).await?;
        let stdout = String::from_utf8_lossy(&stdout);
        if !Self::connect_succeeded(&stdout) {
            return Err(AdbError::ConnectFailed {
                target: target.to_string(),
                output: stdout.trim().to_string(),
            });
        }
        Ok(())
    }

    /// Open a device by serial, or the first listed device when `serial` is `None`.
    /// Network serials (`host:port`) that are not yet attached are connected first.
    pub async fn connect(adb_path: &Path, serial: Option<&str>) -> AdbResult<Self> {
        let mut devices = Self::list_devices(adb_path).await?;
        if let Some(serial) = serial
            && !devices.iter().any(|d| d.name == serial)
            && types::is_network_serial(serial)
        {
            Self::connect_network(adb_path, serial).await?;
            devices = Self::list_devices(adb_path).await?;
        }
        let device = match serial {
            Some(serial) => devices
                .into_iter()
                .find(|d| d.name == serial)
                .ok_or_else(|| AdbError::DeviceNotFound {
                    name: serial.to_string(),
                })?,
            None => devices.into_iter().next().ok_or(AdbError::NoDevices)?,
        };
        let mut shell = AdbShell {
            adb_path: adb_path.to_path_buf(),
            device,
            screen_x: 0,
            screen_y: 0,
        };
        let stdout = shell.run_on_device(&["shell", "wm", "size"]).await?;
        let (sx, sy) = types::parse_screen_size(&String::from_utf8_lossy(&stdout))?;
        shell.screen_x = sx;
        shell.screen_y = sy;
        Ok(shell)
    }
}

impl AdbClient for AdbShell {
    async fn screen_capture_bytes(&self) -> AdbResult<Vec<u8>> {
        self.run_on_device(&["exec-out", "screencap", "-p"]).await
    }

    async fn tap(&self, x: u32, y: u32) -> AdbResult<()> {
        types::check_bounds(x, y, self.screen_dimensions())?;
        let (xs, ys) = (x.to_string(), y.to_string());
        self.run_on_device(&["shell", "input", "tap", &xs, &ys])
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
        let mut parts: Vec<String> = [x1, y1, x2, y2].iter().map(u32::to_string).collect();
        if let Some(d) = duration {
            parts.push(d.to_string());
        }
        let mut args = vec!["shell", "input", "swipe"];
        args.extend(parts.iter().map(String::as_str));
        self.run_on_device(&args).await.map(|_| ())
    }

    fn screen_dimensions(&self) -> (u32, u32) {
        (self.screen_x, self.screen_y)
    }

    fn device_name(&self) -> &str {
        &self.device.name
    }
}

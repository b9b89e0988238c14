use adb_stage_runner::adb::BackendKind;
use adb_stage_runner::config::Settings;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "adb-stage-runner",
    version = env!("STAGE_RUNNER_VERSION"),
    about = "Replays a configured game stage on an Android emulator over ADB",
    after_help = concat!("Build ", env!("STAGE_RUNNER_VERSION"), " (", env!("STAGE_RUNNER_BUILD_YEAR"), ")")
)]
pub struct Args {
    /// Verbose logging (RUST_LOG still wins when set)
    #[arg(long, global = true)]
    pub debug: bool,

    /// Settings file [default: ~/.adb-stage-runner/settings.json]
    #[arg(long, global = true, value_name = "PATH")]
    pub settings: Option<PathBuf>,

    /// ADB implementation: shell (external adb binary) or rust
    #[arg(long = "impl", global = true, env = "ADB_IMPL", value_parser = parse_backend, default_value = "shell")]
    pub backend: BackendKind,

    /// adb executable for the shell implementation
    #[arg(long, global = true, value_name = "PATH")]
    pub adb_path: Option<PathBuf>,

    /// Device serial, or host:port for a network emulator
    #[arg(long, short = 'd', global = true)]
    pub device: Option<String>,

    /// Stage configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub stage_file: Option<PathBuf>,

    /// Directory holding template PNGs
    #[arg(long, global = true, value_name = "DIR")]
    pub templates: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a stage until a limit is reached or Ctrl-C
    Run {
        /// Stage name from the stage file
        stage: String,
        /// Stop after this many battles (0 = no limit)
        #[arg(long, short = 'b', default_value_t = 0)]
        battles: u32,
        /// Maximum resource purchases
        #[arg(long, short = 'p', default_value_t = 3)]
        purchases: u32,
        /// Match confidence threshold (0.0-1.0)
        #[arg(long)]
        threshold: Option<f32>,
    },
    /// List stages in the stage file
    List,
    /// Add a stage with the default layout
    NewStage {
        name: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// List attached devices
    Devices,
    /// Save a screenshot
    Screenshot {
        #[arg(long, short, default_value = "screenshot.png")]
        output: PathBuf,
    },
    /// Crop a screen region into <templates>/<name>.png
    CaptureTemplate {
        name: String,
        x1: u32,
        y1: u32,
        x2: u32,
        y2: u32,
    },
    /// Write the effective settings (file plus flags) back to the settings file
    SaveSettings,
}

fn parse_backend(value: &str) -> Result<BackendKind, String> {
    value.parse().map_err(|e: adb_stage_runner::adb::AdbError| e.to_string())
}

impl Args {
    /// Command-line values override the settings file.
    pub fn apply_to(&self, mut settings: Settings) -> Settings {
        if let Some(path) = &self.adb_path {
            settings.adb_path = path.clone();
        }
        if let Some(device) = &self.device {
            settings.device = Some(device.clone());
        }
        if let Some(file) = &self.stage_file {
            settings.stage_file = file.clone();
        }
        if let Some(dir) = &self.templates {
            settings.templates_dir = dir.clone();
        }
        if let Command::Run {
            threshold: Some(threshold),
            ..
        } = &self.command
        {
            settings.threshold = *threshold;
        }
        settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_defaults() {
        let args = Args::try_parse_from(["adb-stage-runner", "run", "hunt"]).unwrap();
        match args.command {
            Command::Run {
                ref stage,
                battles,
                purchases,
                threshold,
            } => {
                assert_eq!(stage, "hunt");
                assert_eq!(battles, 0);
                assert_eq!(purchases, 3);
                assert_eq!(threshold, None);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn global_flags_override_settings() {
        let args = Args::try_parse_from([
            "adb-stage-runner",
            "run",
            "hunt",
            "--impl",
            "rust",
            "-d",
            "127.0.0.1:7555",
            "--threshold",
            "0.9",
            "--templates",
            "imgs",
        ])
        .unwrap();
        assert_eq!(args.backend, BackendKind::Rust);
        let settings = args.apply_to(Settings::default());
        assert_eq!(settings.device.as_deref(), Some("127.0.0.1:7555"));
        assert_eq!(settings.threshold, 0.9);
        assert_eq!(settings.templates_dir, PathBuf::from("imgs"));
        assert_eq!(settings.adb_path, PathBuf::from("adb"));
    }

    #[test]
    fn capture_template_takes_corners() {
        let args =
            Args::try_parse_from(["adb-stage-runner", "capture-template", "ok", "10", "20", "110", "60"])
                .unwrap();
        assert!(matches!(
            args.command,
            Command::CaptureTemplate { ref name, x1: 10, y1: 20, x2: 110, y2: 60 } if name == "ok"
        ));
    }

    #[test]
    fn unknown_backend_is_rejected() {
        assert!(Args::try_parse_from(["adb-stage-runner", "--impl", "usb", "list"]).is_err());
    }
}

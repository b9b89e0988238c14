mod args;

use adb_stage_runner::adb::{AdbBackend, AdbClient, AdbError, BackendKind};
use adb_stage_runner::config::{ConfigError, Settings, StageConfigs, default_stage};
use adb_stage_runner::game_automation::{
    CancelToken, EngineConfig, StatusEvent, StepEngine, TokioClock,
    create_status_channel,
};
use adb_stage_runner::template_matching::{
    Region, TemplateId, TemplateLibrary, TemplateMatcher, VisionError,
};
use args::{Args, Command};
use clap::Parser;
use log::{debug, info};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use thiserror::Error;

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Adb(#[from] AdbError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Vision(#[from] VisionError),

    #[error("Missing template images in {dir:?}: {}", list_ids(.ids))]
    MissingTemplates { dir: PathBuf, ids: Vec<TemplateId> },

    #[error("Region ({x1},{y1})-({x2},{y2}) is empty")]
    EmptyRegion { x1: u32, y1: u32, x2: u32, y2: u32 },

    #[error("Failed to write {path:?}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

fn list_ids(ids: &[TemplateId]) -> String {
    ids.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let default_filter = if args.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("❌ {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<ExitCode, CliError> {
    let settings_path = match &args.settings {
        Some(path) => Some(path.clone()),
        None => Settings::default_path().ok(),
    };
    let settings = match &settings_path {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    let settings = args.apply_to(settings);
    debug!("settings: {settings:?} (backend {})", args.backend);

    match &args.command {
        Command::Run {
            stage,
            battles,
            purchases,
            ..
        } => run_stage(&settings, args.backend, stage, *battles, *purchases).await,
        Command::List => {
            list_stages(&settings.stage_file)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::NewStage { name, description } => {
            let mut stages = StageConfigs::load_or_empty(&settings.stage_file)?;
            stages.insert(default_stage(name, description)?)?;
            stages.save(&settings.stage_file)?;
            println!("✅ Added stage '{name}' to {:?}", settings.stage_file);
            Ok(ExitCode::SUCCESS)
        }
        Command::Devices => {
            let devices = AdbBackend::list_devices(args.backend, &settings.adb_path).await?;
            if devices.is_empty() {
                println!("No devices attached");
            }
            for device in devices {
                let kind = if device.is_network() { "network" } else { "usb" };
                println!("📱 {} ({kind})", device.name);
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Screenshot { output } => {
            let device = connect(&settings, args.backend).await?;
            let capture = device.screen_capture().await?;
            write_file(output, &capture.bytes).await?;
            println!(
                "📸 Saved {} bytes to {output:?} in {}ms",
                capture.bytes.len(),
                capture.duration_ms
            );
            Ok(ExitCode::SUCCESS)
        }
        Command::CaptureTemplate {
            name,
            x1,
            y1,
            x2,
            y2,
        } => {
            let region = Region::from_corners(*x1, *y1, *x2, *y2).ok_or(CliError::EmptyRegion {
                x1: *x1,
                y1: *y1,
                x2: *x2,
                y2: *y2,
            })?;
            let device = connect(&settings, args.backend).await?;
            let capture = device.screen_capture().await?;
            let screen = image::load_from_memory(&capture.bytes).map_err(VisionError::Decode)?;
            let library = TemplateLibrary::new(&settings.templates_dir);
            let id = TemplateId::from(name.as_str());
            let path = library.save_region(&id, &screen, region)?;
            println!(
                "✅ Template '{id}' saved to {path:?} ({}x{})",
                region.width, region.height
            );
            Ok(ExitCode::SUCCESS)
        }
        Command::SaveSettings => {
            let path = match settings_path {
                Some(path) => path,
                None => Settings::default_path()?,
            };
            settings.save(&path)?;
            println!("✅ Settings written to {path:?}");
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn connect(settings: &Settings, backend: BackendKind) -> Result<AdbBackend, CliError> {
    let device = AdbBackend::connect(backend, &settings.adb_path, settings.device.as_deref()).await?;
    let (w, h) = device.screen_dimensions();
    info!("connected to {} via {} backend ({w}x{h})", device.device_name(), device.kind());
    Ok(device)
}

async fn write_file(path: &Path, bytes: &[u8]) -> Result<(), CliError> {
    tokio::fs::write(path, bytes)
        .await
        .map_err(|source| CliError::Write {
            path: path.to_path_buf(),
            source,
        })
}

fn list_stages(stage_file: &Path) -> Result<(), CliError> {
    let stages = StageConfigs::load_or_empty(stage_file)?;
    if stages.is_empty() {
        println!("No stages in {stage_file:?}");
        return Ok(());
    }
    for stage in stages.iter() {
        let kinds: Vec<&str> = stage.steps.iter().map(|s| s.kind()).collect();
        println!("{:<20} {:<30} [{}]", stage.name, stage.description, kinds.join(" → "));
    }
    Ok(())
}

/// First interrupt cancels the run. Returns `true` when a second one
/// arrives and the process should exit without waiting for the engine.
async fn watch_interrupts<F, Fut>(mut next_interrupt: F, cancel: &CancelToken) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::io::Result<()>>,
{
    if next_interrupt().await.is_err() {
        return false;
    }
    println!("⏹ Stopping after the current step... (Ctrl-C again to quit now)");
    cancel.cancel();
    next_interrupt().await.is_ok()
}

async fn run_stage(
    settings: &Settings,
    backend: BackendKind,
    name: &str,
    battles: u32,
    purchases: u32,
) -> Result<ExitCode, CliError> {
    let stages = StageConfigs::load(&settings.stage_file)?;
    let stage = stages.get(name)?;

    let library = TemplateLibrary::new(&settings.templates_dir);
    let missing = library.missing(stage.template_ids());
    if !missing.is_empty() {
        return Err(CliError::MissingTemplates {
            dir: settings.templates_dir.clone(),
            ids: missing,
        });
    }

    let device = connect(settings, backend).await?;
    println!("📱 Running '{}' on {}", stage.name, device.device_name());

    let (status, mut rx) = create_status_channel();
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event {
                StatusEvent::Progress(line) => println!("▶ {line}"),
                StatusEvent::Finished(summary) => println!("🏁 {summary}"),
            }
        }
    });

    let cancel = CancelToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if watch_interrupts(tokio::signal::ctrl_c, &on_signal).await {
            eprintln!("⏹ Interrupted again, exiting now");
            std::process::exit(130);
        }
    });

    let engine = StepEngine::new(
        device,
        TemplateMatcher::new(library),
        TokioClock,
        status,
        cancel,
    )
    .with_config(EngineConfig {
        threshold: settings.threshold,
        ..EngineConfig::default()
    });
    let summary = engine.run(stage, battles, purchases).await;
    // Dropping the engine closes the status channel so the printer can finish.
    drop(engine);
    let _ = printer.await;

    Ok(if summary.reason.is_failure() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

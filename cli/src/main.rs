//! `scenectl`: a slim dispatcher over `scenectl-engine`. Owns flag parsing,
//! scene-file loading, and terminal progress rendering; everything else is
//! the engine's job.

mod args;
mod scene_yaml;

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use scenectl_engine::adb::AdbClient;
use scenectl_engine::events::{event_channel, ExecutionEvent, ExecutionEventSender};
use scenectl_engine::model::Device;
use scenectl_engine::session::Session;
use scenectl_engine::vm::VmInspectionClient;
use scenectl_engine::{EngineConfig, SceneExecutor};

use args::{Cli, Commands};

/// - 0: warn (default)
/// - 1: info (-v)
/// - 2: debug (-vv)
/// - 3+: trace (-vvv)
///
/// `LOG_FORMAT=json` switches to structured JSON output; text is the default.
fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level.to_string()));

    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);

    if use_json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = EngineConfig::load().context("loading scenectl.toml")?;

    match cli.command {
        Commands::Devices => run_devices(&config).await,
        Commands::Run {
            scene,
            device,
            out,
            project,
            app_id,
            connect_vm,
            ready_timeout_secs,
        } => {
            run_scene(
                &config,
                &scene,
                device.as_deref(),
                &out,
                &project,
                &app_id,
                connect_vm,
                Duration::from_secs(ready_timeout_secs),
            )
            .await
        }
    }
}

async fn run_devices(config: &EngineConfig) -> Result<()> {
    let adb = AdbClient::new(config.adb_path.clone());
    let devices = adb.list_devices().await.context("listing devices")?;

    if devices.is_empty() {
        println!("no devices found");
        return Ok(());
    }

    for device in &devices {
        print_device(device);
    }
    Ok(())
}

fn print_device(device: &Device) {
    println!(
        "{}\t{:?}{}",
        device.identity,
        device.state,
        device
            .model
            .as_deref()
            .map(|m| format!("\tmodel={m}"))
            .unwrap_or_default()
    );
}

#[allow(clippy::too_many_arguments)]
async fn run_scene(
    config: &EngineConfig,
    scene_path: &std::path::Path,
    device: Option<&str>,
    out: &std::path::Path,
    project: &std::path::Path,
    app_id: &str,
    connect_vm: bool,
    ready_timeout: Duration,
) -> Result<()> {
    let scene = scene_yaml::load(scene_path)?;

    let adb = AdbClient::new(config.adb_path.clone());
    let device_id = adb.resolve_device(device).await.context("resolving target device")?;

    let mut session = Session::start(&config.flutter_path, app_id, &device_id, project, ready_timeout)
        .await
        .context("starting session")?;

    let mut vm_client = if connect_vm {
        let uri = session
            .await_vm_service(ready_timeout)
            .await
            .context("waiting for VM service URI")?;
        Some(VmInspectionClient::connect(&uri).await.context("connecting to VM service")?)
    } else {
        None
    };

    let (tx, mut rx) = event_channel();
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            print_event(&event);
        }
    });

    let isolate_id = match vm_client.as_mut() {
        Some(vm) => Some(vm.main_isolate().await.context("selecting VM isolate")?.id),
        None => None,
    };

    let result = {
        let mut executor = SceneExecutor::new(&mut session, &adb, device_id.clone(), out.to_path_buf())
            .with_events(ExecutionEventSender::new(tx));
        if let (Some(vm), Some(isolate_id)) = (vm_client.as_mut(), isolate_id) {
            executor = executor.connect_vm_service(vm, isolate_id);
        }
        executor.execute(&scene).await
    };

    let _ = printer.await;

    let exit_code = session.stop().await.unwrap_or(None);
    tracing::debug!(?exit_code, "session stopped");

    let result = result.context("executing scene")?;

    println!(
        "scene {:?} finished in {:.2}s: {} checkpoint(s) captured, {} error(s)",
        result.scene_name,
        result.elapsed.as_secs_f64(),
        result.observations.len(),
        result.errors.len()
    );
    for error in &result.errors {
        println!("  step {}: {}", error.step_index, error.message);
    }

    if result.success {
        Ok(())
    } else {
        anyhow::bail!("{} step(s) failed", result.errors.len());
    }
}

fn print_event(event: &ExecutionEvent) {
    match event {
        ExecutionEvent::SceneStarted { scene_name, step_count } => {
            println!("-> {scene_name} ({step_count} steps)");
        }
        ExecutionEvent::StepStarted { index, kind } => {
            println!("  [{index}] {kind}...");
        }
        ExecutionEvent::CheckpointCaptured {
            index,
            checkpoint_name,
            overlay_present,
        } => {
            println!(
                "  [{index}] checkpoint {checkpoint_name:?} captured (overlay={overlay_present})"
            );
        }
        ExecutionEvent::InteractionCompleted { index, kind, duration } => {
            println!("  [{index}] {kind} done in {:.0}ms", duration.as_secs_f64() * 1000.0);
        }
        ExecutionEvent::StepCompleted { index } => {
            println!("  [{index}] ok");
        }
        ExecutionEvent::StepFailed { index, error } => {
            println!("  [{index}] FAILED: {error}");
        }
        ExecutionEvent::SceneCompleted {
            scene_name,
            failed_steps,
            total_duration,
        } => {
            println!(
                "<- {scene_name} done in {:.2}s ({failed_steps} failed)",
                total_duration.as_secs_f64()
            );
        }
        ExecutionEvent::Warning { message } => println!("  warning: {message}"),
        ExecutionEvent::Log { message } => println!("  {message}"),
    }
}

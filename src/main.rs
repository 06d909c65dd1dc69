//! drone-edge - edge telemetry aggregator
//!
//! # Usage
//!
//! ```bash
//! # Defaults: sensors on :5000, collector at 127.0.0.1:6000, control API on 127.0.0.1:8080
//! cargo run --release
//!
//! # Command-line flags override the config file
//! drone-edge --drone-port 5001 --central-ip 10.0.0.5 --battery-threshold 30
//!
//! # Explicit config file, JSON logs
//! drone-edge --config drone_config.toml --log-json
//! ```
//!
//! # Environment Variables
//!
//! - `DRONE_CONFIG`: path to a TOML config file
//! - `DRONE_CORS_ORIGINS`: origins allowed to call the control API from a browser
//! - `RUST_LOG`: logging level (default: info)

use anyhow::{Context, Result};
use clap::Parser;
use drone_edge::acquisition::IngestionListener;
use drone_edge::api::{self, ControlState};
use drone_edge::battery::run_battery_simulation;
use drone_edge::config::{self, validation, ConfigOverrides, DroneConfig};
use drone_edge::forwarding::{run_forward_loop, ForwardScheduler, TcpCollectorSink};
use drone_edge::pipeline::{DroneState, StateSettings};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "drone-edge")]
#[command(about = "Edge aggregator: ingests sensor readings and forwards summaries to a central collector")]
#[command(version)]
struct CliArgs {
    /// Path to a TOML config file (overrides DRONE_CONFIG and ./drone_config.toml)
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Port to listen on for sensor connections
    #[arg(long)]
    drone_port: Option<u16>,

    /// Central collector IP
    #[arg(long)]
    central_ip: Option<String>,

    /// Central collector port
    #[arg(long)]
    central_port: Option<u16>,

    /// Battery level (percent) at which the drone returns to base
    #[arg(long)]
    battery_threshold: Option<f64>,

    /// Seconds between forward attempts
    #[arg(long)]
    forward_interval: Option<f64>,

    /// Rolling window capacity (readings)
    #[arg(long)]
    rolling_window: Option<usize>,

    /// Do not start the HTTP control API
    #[arg(long)]
    no_control: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,
}

impl CliArgs {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            drone_port: self.drone_port,
            central_ip: self.central_ip.clone(),
            central_port: self.central_port,
            battery_threshold: self.battery_threshold,
            forward_interval_secs: self.forward_interval,
            rolling_window: self.rolling_window,
        }
    }
}

fn init_logging(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

// ============================================================================
// Task Supervision
// ============================================================================

/// Identity of a supervised task, reported when it finishes.
#[derive(Debug, Clone, Copy)]
enum TaskName {
    SensorListener,
    BatterySimulator,
    ForwardScheduler,
    ControlApi,
}

impl std::fmt::Display for TaskName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskName::SensorListener => write!(f, "SensorListener"),
            TaskName::BatterySimulator => write!(f, "BatterySimulator"),
            TaskName::ForwardScheduler => write!(f, "ForwardScheduler"),
            TaskName::ControlApi => write!(f, "ControlApi"),
        }
    }
}

fn spawn_sensor_listener(
    task_set: &mut JoinSet<Result<TaskName>>,
    listener: IngestionListener,
    state: Arc<DroneState>,
    cancel_token: CancellationToken,
) {
    task_set.spawn(async move {
        listener.run(state, cancel_token).await?;
        Ok(TaskName::SensorListener)
    });
}

fn spawn_battery_simulator(
    task_set: &mut JoinSet<Result<TaskName>>,
    config: &DroneConfig,
    state: Arc<DroneState>,
    cancel_token: CancellationToken,
) {
    let tick = config.battery.tick();
    let drain = config.battery.drain_per_tick;
    task_set.spawn(async move {
        run_battery_simulation(state, tick, drain, cancel_token).await;
        Ok(TaskName::BatterySimulator)
    });
}

fn spawn_forward_scheduler(
    task_set: &mut JoinSet<Result<TaskName>>,
    config: &DroneConfig,
    state: Arc<DroneState>,
    cancel_token: CancellationToken,
) -> Result<()> {
    let sink = TcpCollectorSink::new(config.collector_addr()?, config.collector.timeout());
    let scheduler = ForwardScheduler::new(state, sink);
    let interval = config.forwarding.interval();
    task_set.spawn(async move {
        run_forward_loop(scheduler, interval, cancel_token).await;
        Ok(TaskName::ForwardScheduler)
    });
    Ok(())
}

fn spawn_control_api(
    task_set: &mut JoinSet<Result<TaskName>>,
    config: &DroneConfig,
    state: Arc<DroneState>,
    cancel_token: CancellationToken,
) -> Result<()> {
    let addr = config.control_addr()?;
    task_set.spawn(async move {
        api::serve(addr, ControlState::new(state), cancel_token).await?;
        Ok(TaskName::ControlApi)
    });
    Ok(())
}

/// Watch the task set until shutdown. A failing or panicking task cancels
/// everything else.
async fn run_supervisor(
    task_set: &mut JoinSet<Result<TaskName>>,
    cancel_token: CancellationToken,
) -> Result<()> {
    info!("Supervisor: all tasks spawned, monitoring");

    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => {
                info!("Supervisor: shutdown signal received");
                break;
            }
            result = task_set.join_next() => {
                match result {
                    Some(Ok(Ok(task_name))) => {
                        info!(task = %task_name, "Supervisor: task completed");
                    }
                    Some(Ok(Err(e))) => {
                        error!(error = %e, "Supervisor: task failed");
                        cancel_token.cancel();
                        return Err(e);
                    }
                    Some(Err(e)) => {
                        error!(error = %e, "Supervisor: task panicked");
                        cancel_token.cancel();
                        return Err(anyhow::anyhow!("Task panicked: {}", e));
                    }
                    None => {
                        info!("Supervisor: all tasks completed");
                        break;
                    }
                }
            }
        }
    }

    Ok(())
}

// ============================================================================
// Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_logging(args.log_json);

    let mut drone_config = DroneConfig::load(args.config.as_deref())?;
    drone_config.apply_overrides(&args.overrides());
    if args.no_control {
        drone_config.control.enabled = false;
    }
    drone_config.validate()?;
    for w in validation::suspicious_values(&drone_config) {
        warn!("{}", w);
    }
    config::init(drone_config);
    let config = config::get();

    let state = Arc::new(DroneState::new(StateSettings::from(config)));
    info!(
        drone = %state.name(),
        collector = %config.collector.addr,
        battery_threshold = config.battery.threshold,
        forward_interval_secs = config.forwarding.interval_secs,
        window_capacity = config.aggregation.window_capacity,
        "Drone starting"
    );

    // Bind before spawning so an address in use fails startup
    let listener = IngestionListener::bind(config.listen_addr()?)
        .await
        .context("Sensor listener startup failed")?;

    let cancel_token = CancellationToken::new();
    let mut task_set: JoinSet<Result<TaskName>> = JoinSet::new();

    spawn_sensor_listener(&mut task_set, listener, Arc::clone(&state), cancel_token.clone());
    spawn_battery_simulator(&mut task_set, config, Arc::clone(&state), cancel_token.clone());
    spawn_forward_scheduler(&mut task_set, config, Arc::clone(&state), cancel_token.clone())?;
    if config.control.enabled {
        spawn_control_api(&mut task_set, config, Arc::clone(&state), cancel_token.clone())?;
    } else {
        info!("Control API disabled");
    }

    let signal_token = cancel_token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Ctrl-C received, shutting down"),
            Err(e) => error!(error = %e, "Failed to listen for Ctrl-C, shutting down"),
        }
        signal_token.cancel();
    });

    let result = run_supervisor(&mut task_set, cancel_token).await;

    // No graceful drain: queued entries not yet forwarded are lost
    task_set.abort_all();
    let status = state.status();
    info!(
        queue_len = status.queue_len,
        readings = status.counters.readings_ingested,
        batches_forwarded = status.counters.batches_forwarded,
        "Drone stopped"
    );

    result
}

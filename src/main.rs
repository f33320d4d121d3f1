use clap::Parser;
use log::{debug, error, info, warn};
use nam_coordinator::config::{self, Config};
use nam_coordinator::{
    DeviceIdentity, HttpAirMonitor, RefreshCoordinator, RefreshError, SensorSnapshot,
};
use serde::Serialize;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;

#[derive(Parser)]
#[command(name = "nam-coordinator")]
#[command(about = "Poll a Nettigo Air Monitor and log its readings")]
struct Cli {
    /// Device address (overrides NAM_HOST)
    #[arg(long)]
    host: Option<String>,

    /// Stable identifier such as the MAC address (overrides NAM_UNIQUE_ID)
    #[arg(long)]
    unique_id: Option<String>,

    /// Seconds between refreshes (overrides NAM_UPDATE_INTERVAL_SECS)
    #[arg(long)]
    interval: Option<u64>,

    /// Fetch once, print the snapshot as JSON and exit
    #[arg(long)]
    once: bool,
}

/// Output of `--once`.
#[derive(Serialize)]
struct Report<'a> {
    device: DeviceIdentity,
    snapshot: &'a SensorSnapshot,
}

fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

fn main() -> ExitCode {
    // environment must be settled before the runtime spawns worker threads
    let loaded = config::load_dotenv();
    init_logger();
    if loaded > 0 {
        debug!("Loaded {} variable(s) from .env", loaded);
    }
    let cli = Cli::parse();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to start async runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };
    runtime.block_on(run(cli))
}

async fn run(cli: Cli) -> ExitCode {
    let mut config = Config::from_env();
    if let Some(host) = cli.host {
        config.device.host = host;
    }
    if cli.unique_id.is_some() {
        config.device.unique_id = cli.unique_id;
    }
    if let Some(secs) = cli.interval.filter(|secs| *secs > 0) {
        config.refresh.update_interval_secs = secs;
    }

    info!("Starting Nettigo Air Monitor coordinator");
    info!("  Host: {}", config.device.host);
    info!("  Unique ID: {}", config.device.unique_id.as_deref().unwrap_or("-"));
    info!("  Interval: {:?}", config.refresh.update_interval());
    info!("  Timeout: {:?}", config.refresh.timeout());

    let client = Arc::new(HttpAirMonitor::new(config.device.host.clone()));
    let coordinator = Arc::new(
        RefreshCoordinator::new(
            client,
            config.device.unique_id.clone(),
            config.refresh.update_interval(),
        )
        .with_timeout(config.refresh.timeout()),
    );

    if cli.once {
        return run_once(&coordinator).await;
    }

    match coordinator.refresh_once().await {
        Ok(_) => info!("Initial refresh succeeded"),
        Err(RefreshError::UpdateFailed(e)) => warn!("Initial refresh failed, will retry: {}", e),
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    }
    log_identity(&coordinator);

    coordinator.add_listener(|update| match &update.snapshot {
        Some(snapshot) if update.last_update_success => {
            info!(
                "PM10 {:?} PM2.5 {:?} signal {:?}",
                snapshot.sds011_p1.or(snapshot.sps30_p4).or(snapshot.pms_p1),
                snapshot.sds011_p2.or(snapshot.sps30_p2).or(snapshot.pms_p2),
                snapshot.signal
            );
        }
        _ => {
            if let Some(failure) = &update.last_failure {
                warn!("Last update failed ({}), keeping previous readings", failure.kind());
            }
        }
    });

    let Some(mut schedule) = coordinator.start() else {
        return ExitCode::FAILURE;
    };

    info!("Coordinator is running, press Ctrl+C to exit");

    let code = tokio::select! {
        result = signal::ctrl_c() => {
            match result {
                Ok(()) => info!("Received shutdown signal"),
                Err(e) => error!("Failed to listen for shutdown signal: {}", e),
            }
            ExitCode::SUCCESS
        }
        result = &mut schedule => match result {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                error!("Refresh task panicked: {}", e);
                ExitCode::FAILURE
            }
        },
    };

    coordinator.shutdown();
    if !schedule.is_finished() {
        let _ = tokio::time::timeout(Duration::from_secs(1), schedule).await;
    }

    info!("Coordinator stopped");
    code
}

async fn run_once(coordinator: &RefreshCoordinator) -> ExitCode {
    match coordinator.refresh_once().await {
        Ok(snapshot) => {
            let report = Report {
                device: coordinator.device_identity(),
                snapshot: &snapshot,
            };
            match serde_json::to_string_pretty(&report) {
                Ok(json) => {
                    println!("{}", json);
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    error!("Failed to serialize snapshot: {}", e);
                    ExitCode::FAILURE
                }
            }
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn log_identity(coordinator: &RefreshCoordinator) {
    let identity = coordinator.device_identity();
    info!(
        "Device: {} by {}, firmware {}, panel {}",
        identity.name,
        identity.manufacturer,
        identity.sw_version.as_deref().unwrap_or("unknown"),
        identity.configuration_url
    );
    for (kind, id) in &identity.connections {
        info!("  Connection: {}={}", kind.as_str(), id);
    }
}

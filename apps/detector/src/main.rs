use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use detector_core::{
    delivery::DEFAULT_REQUEST_TIMEOUT, ConnectivitySupervisor, Controller, DeliveryAgent,
    ReconnectPolicy, ReqwestTransport,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod platform;

use config::load_settings;
use platform::{FileSensor, HostLink, LogPresenter};

/// PIR motion detector relaying detections to a remote HTTP endpoint.
#[derive(Parser, Debug)]
#[command(name = "pir-detector", version)]
struct Args {
    /// Settings file (JSON, or TOML by extension).
    #[arg(long, default_value_os_t = config::default_config_path())]
    config: PathBuf,
    /// GPIO value file of the motion sensor; "1" means motion.
    #[arg(long, default_value = "/sys/class/gpio/gpio19/value")]
    sensor_path: PathBuf,
    /// Network interface whose operstate gates the link, e.g. wlan0.
    #[arg(long)]
    interface: Option<String>,
    #[arg(long, default_value_t = 100)]
    tick_ms: u64,
    #[arg(long, default_value_t = 15_000)]
    connect_timeout_ms: u64,
    #[arg(long, default_value_t = DEFAULT_REQUEST_TIMEOUT.as_millis() as u64)]
    request_timeout_ms: u64,
    #[arg(long, default_value_t = 500)]
    backoff_initial_ms: u64,
    #[arg(long, default_value_t = 30_000)]
    backoff_max_ms: u64,
    /// How often a connected link re-checks that the endpoint answers.
    #[arg(long, default_value_t = platform::DEFAULT_REPROBE_INTERVAL.as_millis() as u64)]
    link_reprobe_ms: u64,
    /// Filter used when RUST_LOG is unset.
    #[arg(long, default_value = "info")]
    log_level: String,
    #[arg(long)]
    log_json: bool,
}

fn init_logging(level: &str, json: bool) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level)
            .with_context(|| format!("invalid log filter '{level}'"))?,
    };
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .compact()
            .init();
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(%error, "ctrl-c handler unavailable, running until killed");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level, args.log_json)?;
    info!("pir detector starting");

    let settings = match load_settings(&args.config) {
        Ok(settings) => settings,
        Err(error) => {
            LogPresenter::show_fault(&error.to_string());
            return Err(error).context("startup aborted");
        }
    };

    let policy = ReconnectPolicy {
        connect_timeout: Duration::from_millis(args.connect_timeout_ms),
        initial_backoff: Duration::from_millis(args.backoff_initial_ms),
        max_backoff: Duration::from_millis(args.backoff_max_ms),
    };
    let request_timeout = Duration::from_millis(args.request_timeout_ms);

    let radio = Arc::new(
        HostLink::new(settings.endpoint.to_string(), args.interface.clone())
            .with_reprobe_interval(Duration::from_millis(args.link_reprobe_ms)),
    );
    let connectivity = ConnectivitySupervisor::new(radio, settings.wifi.clone(), policy);
    let transport =
        ReqwestTransport::new(request_timeout).context("failed to build http client")?;
    let delivery = DeliveryAgent::new(Arc::new(transport), request_timeout);
    let presenter = Arc::new(LogPresenter::new(settings.device_name.clone()));
    let sensor = Box::new(FileSensor::new(&args.sensor_path));

    let mut controller = Controller::new(settings, sensor, connectivity, delivery, presenter)
        .context("startup aborted")?;

    info!(sensor = %args.sensor_path.display(), "setup complete");
    controller
        .run(Duration::from_millis(args.tick_ms), shutdown_signal())
        .await;
    Ok(())
}

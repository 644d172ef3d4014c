use clap::Parser;
use log::{error, info, warn};
use simplisafe_bridge::camera::FfmpegManager;
use simplisafe_bridge::config::{Config, load_dotenv};
use simplisafe_bridge::coordinator::Coordinator;
use simplisafe_bridge::input::{PushListener, SnapshotSource};
use simplisafe_bridge::output::MqttPublisher;
use simplisafe_bridge::session::{Session, SetupContext};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Expose SimpliSafe devices as home automation entities over MQTT.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// JSON dump of the SimpliSafe systems response
    #[arg(long, env = "SIMPLISAFE_SNAPSHOT")]
    snapshot: Option<PathBuf>,

    /// Config entry identifier used in logs
    #[arg(long, default_value = "default")]
    entry_id: String,

    /// Default log filter when RUST_LOG is unset
    #[arg(long, env = "SIMPLISAFE_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

fn init_logger(default_filter: &str) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp_millis()
        .init();
}

fn main() {
    // Environment must be complete before the runtime starts its workers
    load_dotenv();
    let args = Args::parse();
    init_logger(&args.log_level);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to start async runtime: {}", e);
            std::process::exit(1);
        }
    };
    runtime.block_on(run(args));
}

async fn run(args: Args) {
    info!("Starting SimpliSafe bridge");

    let mut config = Config::from_env();
    if let Some(path) = args.snapshot {
        config.vendor.snapshot_path = path;
    }
    info!("Configuration loaded:");
    info!("  Snapshot: {}", config.snapshot_path().display());
    info!(
        "  Push URL: {}",
        config.vendor.push_url.as_deref().unwrap_or("(disabled)")
    );
    info!(
        "  MQTT: {}:{} ({})",
        config.mqtt.broker_host, config.mqtt.broker_port, config.mqtt.topic_prefix
    );
    info!("  Clear delay: {}s", config.sensors.clear_delay_secs);

    if let Err(e) = config.validate() {
        error!("{}", e);
        std::process::exit(1);
    }

    let source = SnapshotSource::new(
        config.snapshot_path(),
        config.vendor.access_token.clone(),
    );
    let snapshot = match source.load().await {
        Ok(snapshot) => snapshot,
        Err(e) => {
            error!(
                "Failed to load initial snapshot from {}: {}",
                source.path().display(),
                e
            );
            std::process::exit(1);
        }
    };

    let session = Arc::new(Session::new(args.entry_id, snapshot));
    for system in session.systems() {
        info!(
            "  System {}: version {}, {}",
            system.system_id(),
            system.version(),
            system.state()
        );
    }
    let ctx = SetupContext {
        session: session.clone(),
        grabber: Arc::new(FfmpegManager::new(&config.ffmpeg)),
        clear_delay: config.clear_delay(),
    };

    let (state_tx, state_rx) = mpsc::unbounded_channel();
    let coordinator = Arc::new(Coordinator::setup(&ctx, state_tx));
    let cancel = CancellationToken::new();

    // MQTT output
    let publisher = MqttPublisher::new(&config.mqtt, coordinator.infos());
    let publisher_task = tokio::spawn(publisher.run(state_rx, cancel.clone()));
    coordinator.publish_all();

    // Push events
    let (event_tx, mut event_rx) = mpsc::channel(64);
    let push_task = match config.vendor.push_url.clone() {
        Some(url) => {
            let listener = PushListener::new(url, session.clone());
            Some(tokio::spawn(listener.run(event_tx, cancel.clone())))
        }
        None => {
            warn!("No push URL configured, motion and doorbell sensors stay off");
            drop(event_tx);
            None
        }
    };

    let dispatch_coordinator = coordinator.clone();
    let dispatch_task = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            dispatch_coordinator.dispatch(&event);
        }
    });

    // REST refresh
    let refresh_coordinator = coordinator.clone();
    let refresh_cancel = cancel.clone();
    let refresh_interval = config.refresh_interval();
    let refresh_task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(refresh_interval);
        // First tick completes immediately; the initial snapshot is already applied
        interval.tick().await;
        loop {
            tokio::select! {
                _ = refresh_cancel.cancelled() => break,
                _ = interval.tick() => {}
            }
            match source.load().await {
                Ok(snapshot) => {
                    session.apply_snapshot(&snapshot);
                    refresh_coordinator.refresh();
                }
                Err(e) => warn!("Refresh failed, keeping previous state: {}", e),
            }
        }
    });

    info!("SimpliSafe bridge is running");
    info!("  - {} entities registered", coordinator.entities().len());
    info!("  - Press Ctrl+C to exit");

    match signal::ctrl_c().await {
        Ok(()) => info!("Received shutdown signal"),
        Err(e) => error!("Failed to listen for shutdown signal: {}", e),
    }

    cancel.cancel();
    let _ = refresh_task.await;
    if let Some(task) = push_task {
        let _ = task.await;
    }
    let _ = dispatch_task.await;
    let _ = publisher_task.await;

    info!("SimpliSafe bridge stopped");
}

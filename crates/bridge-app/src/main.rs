use std::env;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

use bridge_app::runtime::run_loop;
use bridge_app::BridgeConfig;
use ingest::IngestEngine;
use mqtt_client::BusActor;

#[tokio::main]
async fn main() -> Result<()> {
    let args = parse_args();
    let mut config =
        BridgeConfig::load_with_path(args.config_path).context("load config failed")?;
    init_tracing(args.debug || config.debug);

    config.sanitize();
    config.validate().context("config validation failed")?;

    info!(
        device_type = %config.device.device_type,
        instance = config.device.device_instance,
        num_phases = config.device.num_phases,
        "starting inverter bridge"
    );

    let specs = schema::build(&config.device);
    let backend = Arc::new(registry::LogBackend::default());
    let mut state = registry::StateRegistry::new(backend);
    state
        .register_all(&specs)
        .context("attribute registration failed")?;
    info!(attributes = specs.len(), "schema registered");

    let engine = IngestEngine::new(config.device.device_type, config.device.num_phases);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (bus_tx, bus_rx) = mpsc::channel(config.channel_capacity);
    // a registry transport implementation holds the sender end of this
    // channel; without one attached, no write requests ever arrive
    let (write_tx, write_rx) = mpsc::channel::<registry::WriteRequest>(16);

    let actor = BusActor::new(config.bus.clone(), bus_tx, shutdown_rx.clone());
    let bus_handle = tokio::spawn(async move {
        if let Err(err) = actor.run().await {
            warn!(error = %err, "bus listener exited");
        }
    });

    let loop_handle = tokio::spawn(run_loop(state, engine, bus_rx, write_rx, shutdown_rx));

    notify_ready();

    tokio::signal::ctrl_c().await.context("wait for shutdown signal")?;
    info!("shutdown signal received");
    let _ = shutdown_tx.send(true);
    drop(write_tx);

    let _ = bus_handle.await;
    let _ = loop_handle.await;
    Ok(())
}

struct CliArgs {
    config_path: Option<String>,
    debug: bool,
}

fn parse_args() -> CliArgs {
    let mut cli = CliArgs {
        config_path: None,
        debug: false,
    };

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--debug" {
            cli.debug = true;
        } else if arg == "--config" {
            cli.config_path = args.next();
        } else if let Some(path) = arg.strip_prefix("--config=") {
            cli.config_path = Some(path.to_string());
        }
    }

    cli
}

fn init_tracing(debug: bool) {
    let level = if debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt().with_max_level(level).init();
}

#[cfg(target_os = "linux")]
fn notify_ready() {
    if let Err(err) = sd_notify::notify(true, &[sd_notify::NotifyState::Ready]) {
        warn!(error = %err, "systemd ready notify failed");
    }
}

#[cfg(not(target_os = "linux"))]
fn notify_ready() {}

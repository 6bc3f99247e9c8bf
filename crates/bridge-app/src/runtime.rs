use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info};

use ingest::IngestEngine;
use mqtt_client::BusMessage;
use registry::{StateRegistry, WriteRequest};

/// Single-threaded owner of the registry snapshot. Bus messages and external
/// write requests are serialized through this loop, so no two state mutations
/// ever run in parallel. Messages are applied in delivery order; pending
/// deliveries are drained before the loop returns.
pub async fn run_loop(
    mut registry: StateRegistry,
    engine: IngestEngine,
    mut bus_rx: mpsc::Receiver<BusMessage>,
    mut write_rx: mpsc::Receiver<WriteRequest>,
    mut shutdown: watch::Receiver<bool>,
) -> StateRegistry {
    let mut writes_open = true;

    loop {
        tokio::select! {
            maybe_message = bus_rx.recv() => match maybe_message {
                Some(message) => apply_message(&engine, &mut registry, &message),
                None => {
                    info!("bus channel closed");
                    break;
                }
            },
            maybe_write = write_rx.recv(), if writes_open => match maybe_write {
                Some(request) => {
                    let accepted = registry.handle_write(&request.path, request.value);
                    let _ = request.reply.send(accepted);
                }
                // no registry transport attached; keep serving bus messages
                None => writes_open = false,
            },
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!("run loop shutdown requested");
                    break;
                }
            }
        }
    }

    while let Ok(message) = bus_rx.try_recv() {
        apply_message(&engine, &mut registry, &message);
    }

    registry
}

fn apply_message(engine: &IngestEngine, registry: &mut StateRegistry, message: &BusMessage) {
    match engine.apply(registry, &message.payload) {
        Ok(applied) => {
            debug!(topic = %message.topic, applied, "message applied");
        }
        Err(err) => {
            error!(topic = %message.topic, error = %err, "payload error, message discarded");
        }
    }
}

#![allow(dead_code)]

use std::time::Duration;

use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Topic namespace the telemetry publisher uses; the full subscription is
/// `rv/<topic>/status`.
pub const TOPIC_NAMESPACE: &str = "rv";

pub fn status_topic(topic: &str) -> String {
    format!("{TOPIC_NAMESPACE}/{topic}/status")
}

/// Connection options for the telemetry broker.
#[cfg_attr(feature = "config", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone)]
pub struct BusConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub client_id: String,
    /// Device topic segment within the namespace.
    pub topic: String,
    pub keep_alive_secs: u64,
    /// Delay before polling again after a connection error.
    pub reconnect_delay_ms: u64,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
            username: String::new(),
            password: String::new(),
            client_id: "mqtt-inverter-bridge".to_string(),
            topic: "inverter".to_string(),
            keep_alive_secs: 60,
            reconnect_delay_ms: 1_000,
        }
    }
}

/// One delivery from the subscribed status topic.
#[derive(Debug, Clone)]
pub struct BusMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

#[derive(Debug, Error)]
pub enum BusError {
    #[error("telemetry channel closed")]
    ChannelClosed,
}

/// Long-lived broker listener. Connection drops are retried in place and the
/// subscription is re-issued on every ConnAck, so a reconnect keeps
/// delivering on the same topic. Received payloads are handed to the single
/// state-owning consumer in delivery order.
pub struct BusActor {
    config: BusConfig,
    sender: mpsc::Sender<BusMessage>,
    shutdown: watch::Receiver<bool>,
}

impl BusActor {
    pub fn new(
        config: BusConfig,
        sender: mpsc::Sender<BusMessage>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            config,
            sender,
            shutdown,
        }
    }

    pub async fn run(mut self) -> Result<(), BusError> {
        let mut options =
            MqttOptions::new(&self.config.client_id, &self.config.host, self.config.port);
        options.set_keep_alive(Duration::from_secs(self.config.keep_alive_secs.max(1)));
        if !self.config.username.is_empty() && !self.config.password.is_empty() {
            options.set_credentials(&self.config.username, &self.config.password);
        }

        let (client, mut eventloop) = AsyncClient::new(options, 16);
        let topic = status_topic(&self.config.topic);

        loop {
            tokio::select! {
                _ = self.shutdown.changed() => {
                    if *self.shutdown.borrow() {
                        info!("bus listener shutdown requested");
                        return Ok(());
                    }
                }
                event = eventloop.poll() => match event {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        info!(host = %self.config.host, port = self.config.port, "broker connected");
                        if let Err(err) = client.subscribe(&topic, QoS::AtMostOnce).await {
                            warn!(topic = %topic, error = %err, "subscribe failed");
                        }
                    }
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        debug!(topic = %publish.topic, bytes = publish.payload.len(), "message received");
                        let message = BusMessage {
                            topic: publish.topic.to_string(),
                            payload: publish.payload.to_vec(),
                        };
                        if self.sender.send(message).await.is_err() {
                            return Err(BusError::ChannelClosed);
                        }
                    }
                    Ok(_) => {}
                    Err(err) => {
                        warn!(error = %err, "broker connection error, retrying");
                        sleep(Duration::from_millis(self.config.reconnect_delay_ms)).await;
                    }
                }
            }
        }
    }
}

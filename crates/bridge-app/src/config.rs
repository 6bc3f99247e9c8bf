use std::env;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::warn;

use mqtt_client::BusConfig;
use types::{DeviceProfile, DeviceType};

const DEFAULT_DEVICE_INSTANCE: u32 = 111;
const DEFAULT_MODE: i64 = 4; // Off
const DEFAULT_NUM_PHASES: u8 = 1;
const DEFAULT_SERIAL_NUMBER: &str = "MQTT123456";
const DEFAULT_CHANNEL_CAPACITY: usize = 256;

#[derive(Clone, Debug)]
pub struct BridgeConfig {
    pub device: DeviceProfile,
    pub bus: BusConfig,
    pub channel_capacity: usize,
    pub debug: bool,
}

impl BridgeConfig {
    pub fn load() -> Result<Self> {
        Self::load_with_path(None)
    }

    pub fn load_with_path(config_path: Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(file_config) = load_file_config(config_path.as_deref())? {
            apply_file_config(&mut config, file_config)?;
        }

        apply_env_overrides(&mut config)?;

        if config.bus.client_id == BusConfig::default().client_id {
            config.bus.client_id = format!("mqtt-inverter-{}", config.device.device_instance);
        }

        Ok(config)
    }

    /// Lenient corrections that only warn, matching the original service:
    /// an out-of-range phase count falls back to single-phase.
    pub fn sanitize(&mut self) {
        if !(1..=3).contains(&self.device.num_phases) {
            warn!(
                num_phases = self.device.num_phases,
                "invalid num_phases, expected 1, 2 or 3, defaulting to 1"
            );
            self.device.num_phases = DEFAULT_NUM_PHASES;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=4).contains(&self.device.mode) {
            anyhow::bail!("device.mode must be between 1 and 4, got {}", self.device.mode);
        }
        if self.bus.port == 0 {
            anyhow::bail!("mqtt.port must be between 1 and 65535");
        }
        if self.bus.topic.trim().is_empty() {
            anyhow::bail!("mqtt.topic must be non-empty");
        }
        if self.bus.topic.contains('/') || self.bus.topic.contains('#') || self.bus.topic.contains('+') {
            anyhow::bail!("mqtt.topic must be a plain segment without '/', '#' or '+'");
        }
        if self.bus.keep_alive_secs == 0 {
            anyhow::bail!("mqtt.keep_alive_secs must be >= 1");
        }
        if self.bus.reconnect_delay_ms == 0 {
            anyhow::bail!("mqtt.reconnect_delay_ms must be >= 1");
        }
        if self.channel_capacity == 0 {
            anyhow::bail!("channel_capacity must be >= 1");
        }
        Ok(())
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            device: DeviceProfile {
                device_type: DeviceType::Inverter,
                device_instance: DEFAULT_DEVICE_INSTANCE,
                num_phases: DEFAULT_NUM_PHASES,
                mode: DEFAULT_MODE,
                device_name: String::new(),
                serial_number: DEFAULT_SERIAL_NUMBER.to_string(),
            },
            bus: BusConfig::default(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            debug: false,
        }
    }
}

#[derive(Debug, Deserialize)]
struct FileConfig {
    device: Option<FileDeviceConfig>,
    mqtt: Option<FileMqttConfig>,
}

#[derive(Debug, Deserialize)]
struct FileDeviceConfig {
    device_instance: Option<u32>,
    device_type: Option<String>,
    mode: Option<i64>,
    num_phases: Option<u8>,
    device_name: Option<String>,
    serial_number: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FileMqttConfig {
    host: Option<String>,
    port: Option<u16>,
    user: Option<String>,
    password: Option<String>,
    topic: Option<String>,
    debug: Option<bool>,
}

fn load_file_config(config_path: Option<&str>) -> Result<Option<FileConfig>> {
    let path = match config_path {
        Some(path) => path.to_string(),
        None => match env::var("BRIDGE_CONFIG") {
            Ok(value) => value,
            Err(_) => return Ok(None),
        },
    };

    let content = fs::read_to_string(&path)
        .with_context(|| format!("read config file {path}"))?;
    let ext = Path::new(&path).extension().and_then(|value| value.to_str());

    let config = match ext {
        Some("json") => serde_json::from_str(&content).context("parse json config")?,
        _ => toml::from_str(&content).context("parse toml config")?,
    };

    Ok(Some(config))
}

fn apply_file_config(config: &mut BridgeConfig, file: FileConfig) -> Result<()> {
    if let Some(device) = file.device {
        if let Some(instance) = device.device_instance {
            config.device.device_instance = instance;
        }
        if let Some(device_type) = device.device_type {
            config.device.device_type = DeviceType::from_str(&device_type)?;
        }
        if let Some(mode) = device.mode {
            config.device.mode = mode;
        }
        if let Some(num_phases) = device.num_phases {
            config.device.num_phases = num_phases;
        }
        if let Some(name) = device.device_name {
            config.device.device_name = name;
        }
        if let Some(serial) = device.serial_number {
            config.device.serial_number = serial;
        }
    }

    if let Some(mqtt) = file.mqtt {
        if let Some(host) = mqtt.host {
            config.bus.host = host;
        }
        if let Some(port) = mqtt.port {
            config.bus.port = port;
        }
        if let Some(user) = mqtt.user {
            config.bus.username = user;
        }
        if let Some(password) = mqtt.password {
            config.bus.password = password;
        }
        if let Some(topic) = mqtt.topic {
            config.bus.topic = topic;
        }
        if let Some(debug) = mqtt.debug {
            config.debug = debug;
        }
    }

    Ok(())
}

fn apply_env_overrides(config: &mut BridgeConfig) -> Result<()> {
    if let Ok(value) = env::var("BRIDGE_DEVICE_TYPE") {
        config.device.device_type = DeviceType::from_str(&value)?;
    }

    if let Some(instance) = parse_env_u32("BRIDGE_DEVICE_INSTANCE") {
        config.device.device_instance = instance;
    }

    if let Some(num_phases) = parse_env_u8("BRIDGE_NUM_PHASES") {
        config.device.num_phases = num_phases;
    }

    if let Some(mode) = parse_env_i64("BRIDGE_MODE") {
        config.device.mode = mode;
    }

    if let Ok(value) = env::var("BRIDGE_MQTT_HOST") {
        config.bus.host = value;
    }

    if let Some(port) = parse_env_u16("BRIDGE_MQTT_PORT") {
        config.bus.port = port;
    }

    if let Ok(value) = env::var("BRIDGE_MQTT_USER") {
        config.bus.username = value;
    }

    if let Ok(value) = env::var("BRIDGE_MQTT_PASSWORD") {
        config.bus.password = value;
    }

    if let Ok(value) = env::var("BRIDGE_MQTT_TOPIC") {
        config.bus.topic = value;
    }

    if let Some(debug) = parse_env_bool("BRIDGE_DEBUG") {
        config.debug = debug;
    }

    config.channel_capacity =
        parse_env_usize("BRIDGE_CHANNEL_CAPACITY").unwrap_or(config.channel_capacity);

    Ok(())
}

fn parse_env_u8(key: &str) -> Option<u8> {
    env::var(key).ok().and_then(|value| value.parse().ok())
}

fn parse_env_u16(key: &str) -> Option<u16> {
    env::var(key).ok().and_then(|value| value.parse().ok())
}

fn parse_env_u32(key: &str) -> Option<u32> {
    env::var(key).ok().and_then(|value| value.parse().ok())
}

fn parse_env_i64(key: &str) -> Option<i64> {
    env::var(key).ok().and_then(|value| value.parse().ok())
}

fn parse_env_usize(key: &str) -> Option<usize> {
    env::var(key).ok().and_then(|value| value.parse().ok())
}

fn parse_env_bool(key: &str) -> Option<bool> {
    env::var(key).ok().and_then(|value| value.parse().ok())
}

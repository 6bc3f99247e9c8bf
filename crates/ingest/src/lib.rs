#![allow(dead_code)]

use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use registry::StateRegistry;
use types::{AttrValue, DeviceType};

/// One recognized telemetry field and the attribute path it lands on per
/// device type. Fields for phases above the configured count are dropped.
struct FieldRoute {
    key: &'static str,
    phase: u8,
    inverter_path: Option<&'static str>,
    pv_path: Option<&'static str>,
}

const ROUTES: &[FieldRoute] = &[
    FieldRoute { key: "state", phase: 1, inverter_path: Some("/State"), pv_path: Some("/State") },
    FieldRoute { key: "voltage", phase: 1, inverter_path: Some("/Ac/Out/L1/V"), pv_path: Some("/Ac/L1/Voltage") },
    FieldRoute { key: "load", phase: 1, inverter_path: Some("/Ac/Out/L1/I"), pv_path: Some("/Ac/L1/Current") },
    FieldRoute { key: "power", phase: 1, inverter_path: Some("/Ac/Out/L1/P"), pv_path: Some("/Ac/Power") },
    FieldRoute { key: "frequency", phase: 1, inverter_path: Some("/Ac/Out/L1/F"), pv_path: Some("/Ac/L1/Frequency") },
    FieldRoute { key: "L2_voltage", phase: 2, inverter_path: Some("/Ac/Out/L2/V"), pv_path: None },
    FieldRoute { key: "L2_load", phase: 2, inverter_path: Some("/Ac/Out/L2/I"), pv_path: None },
    FieldRoute { key: "L2_power", phase: 2, inverter_path: Some("/Ac/Out/L2/P"), pv_path: None },
    FieldRoute { key: "L2_frequency", phase: 2, inverter_path: Some("/Ac/Out/L2/F"), pv_path: None },
    FieldRoute { key: "L3_voltage", phase: 3, inverter_path: Some("/Ac/Out/L3/V"), pv_path: None },
    FieldRoute { key: "L3_load", phase: 3, inverter_path: Some("/Ac/Out/L3/I"), pv_path: None },
    FieldRoute { key: "L3_power", phase: 3, inverter_path: Some("/Ac/Out/L3/P"), pv_path: None },
    FieldRoute { key: "L3_frequency", phase: 3, inverter_path: Some("/Ac/Out/L3/F"), pv_path: None },
    FieldRoute { key: "dc_voltage", phase: 1, inverter_path: Some("/Dc/0/Voltage"), pv_path: Some("/Dc/0/Voltage") },
    FieldRoute { key: "dc_current", phase: 1, inverter_path: Some("/Dc/0/Current"), pv_path: Some("/Dc/0/Current") },
    FieldRoute { key: "temperature", phase: 1, inverter_path: Some("/Dc/0/Temperature"), pv_path: Some("/Dc/0/Temperature") },
    FieldRoute { key: "connected", phase: 1, inverter_path: Some("/Connected"), pv_path: Some("/Connected") },
    FieldRoute { key: "mode", phase: 1, inverter_path: Some("/Mode"), pv_path: Some("/Mode") },
    FieldRoute { key: "error", phase: 1, inverter_path: Some("/Error"), pv_path: Some("/Error") },
];

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("payload decode error: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("payload is not a key-value object")]
    NotAnObject,
}

/// Maps inbound bus payloads onto registry attributes.
pub struct IngestEngine {
    device_type: DeviceType,
    num_phases: u8,
}

impl IngestEngine {
    pub fn new(device_type: DeviceType, num_phases: u8) -> Self {
        Self {
            device_type,
            num_phases,
        }
    }

    /// Applies one delivered message as a partial update: each recognized key
    /// issues exactly one `set`, absent keys leave their attributes untouched.
    /// Returns the number of updates issued. A malformed payload changes
    /// nothing and surfaces as an error for the caller to log.
    pub fn apply(&self, registry: &mut StateRegistry, payload: &[u8]) -> Result<usize, IngestError> {
        let decoded: Value = serde_json::from_slice(payload)?;
        let Value::Object(fields) = decoded else {
            return Err(IngestError::NotAnObject);
        };

        let mut applied = 0usize;
        for (key, field) in &fields {
            let Some(path) = self.route(key) else {
                debug!(key = key.as_str(), "field not routed for this device, ignored");
                continue;
            };
            let Some(value) = scalar_value(field) else {
                debug!(key = key.as_str(), "non-scalar field ignored");
                continue;
            };
            registry.set(path, value);
            applied += 1;
        }

        Ok(applied)
    }

    fn route(&self, key: &str) -> Option<&'static str> {
        let route = ROUTES.iter().find(|route| route.key == key)?;
        match self.device_type {
            DeviceType::Inverter => {
                if route.phase > self.num_phases {
                    return None;
                }
                route.inverter_path
            }
            DeviceType::PvInverter => {
                if route.phase > 1 {
                    return None;
                }
                route.pv_path
            }
        }
    }
}

fn scalar_value(field: &Value) -> Option<AttrValue> {
    match field {
        Value::Number(number) if number.is_i64() => number.as_i64().map(AttrValue::Int),
        Value::Number(number) => number.as_f64().map(AttrValue::Float),
        Value::String(text) => Some(AttrValue::Text(text.clone())),
        Value::Bool(flag) => Some(AttrValue::Int(i64::from(*flag))),
        _ => None,
    }
}

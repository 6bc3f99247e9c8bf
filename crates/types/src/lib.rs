#![allow(dead_code)]

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Kind of device presented to the energy platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    Inverter,
    PvInverter,
}

#[derive(Debug, Error)]
#[error("unknown device type '{0}', expected 'inverter' or 'pvinverter'")]
pub struct DeviceTypeParseError(String);

impl FromStr for DeviceType {
    type Err = DeviceTypeParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "inverter" => Ok(Self::Inverter),
            "pvinverter" => Ok(Self::PvInverter),
            other => Err(DeviceTypeParseError(other.to_string())),
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inverter => write!(f, "inverter"),
            Self::PvInverter => write!(f, "pvinverter"),
        }
    }
}

/// Current value of one registry attribute. `Display` is the generic string
/// conversion used when no unit-specific formatting applies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl AttrValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(value) => Some(*value as f64),
            Self::Float(value) => Some(*value),
            Self::Text(_) => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Int(_) => "integer",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value}"),
            Self::Text(value) => write!(f, "{value}"),
        }
    }
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for AttrValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Immutable description of the one modeled device, fixed at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceProfile {
    pub device_type: DeviceType,
    pub device_instance: u32,
    pub num_phases: u8,
    /// Initial operating mode: 1=Charger Only, 2=Inverter Only, 3=On, 4=Off.
    pub mode: i64,
    pub device_name: String,
    pub serial_number: String,
}

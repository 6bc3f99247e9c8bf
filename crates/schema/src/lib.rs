#![allow(dead_code)]

use tracing::debug;
use types::{AttrValue, DeviceProfile, DeviceType};

pub const PRODUCT_NAME: &str = "MQTT Inverter";
pub const FIRMWARE_VERSION: &str = "v1.0";
pub const PRODUCT_ID: i64 = 0xA381;
pub const DEVICE_TYPE_CODE: i64 = 0x203;
pub const PROCESS_NAME: &str = "mqtt-inverter-bridge";
pub const CONNECTION_KIND: &str = "MQTT";

/// 0=ACin-1, 1=ACin-2, 240=none/inverting.
const ACTIVE_INPUT_NONE: i64 = 240;

const ALARM_PATHS: &[&str] = &[
    "/Alarms/GridLost",
    "/Alarms/HighTemperature",
    "/Alarms/LowBattery",
    "/Alarms/Overload",
    "/Alarms/Ripple",
    "/Alarms/TemperatureSensor",
    "/Alarms/VoltageSensor",
];

const BMS_PATHS: &[&str] = &[
    "/Bms/AllowToCharge",
    "/Bms/AllowToDischarge",
    "/Bms/BmsExpected",
    "/Bms/Error",
];

const LED_PATHS: &[&str] = &[
    "/Leds/Mains",
    "/Leds/Bulk",
    "/Leds/Absorption",
    "/Leds/Float",
    "/Leds/Inverter",
    "/Leds/Overload",
    "/Leds/LowBattery",
    "/Leds/Temperature",
];

/// Display unit for one attribute. Drives formatting only, never storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Voltage,
    Current,
    Power,
    ApparentPower,
    Frequency,
    Temperature,
    Energy,
    /// Code-like integers (instance, state, mode, flags) shown as plain numbers.
    Code,
    /// Product and device-type codes shown as uppercase hex.
    Hex,
    Plain,
}

/// One named slot in the registry schema.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeSpec {
    pub path: String,
    pub initial: AttrValue,
    pub writable: bool,
    pub unit: Unit,
}

/// Formats a value for GUI display. A unit/value mismatch falls back to the
/// generic string conversion instead of erroring.
pub fn format_value(unit: Unit, value: &AttrValue) -> String {
    match unit {
        Unit::Voltage => with_suffix(unit, value, 1, " V"),
        Unit::Current => with_suffix(unit, value, 2, " A"),
        Unit::Power => with_suffix(unit, value, 1, " W"),
        Unit::ApparentPower => with_suffix(unit, value, 1, " VA"),
        Unit::Frequency => with_suffix(unit, value, 1, " Hz"),
        Unit::Temperature => with_suffix(unit, value, 1, " °C"),
        Unit::Energy => with_suffix(unit, value, 1, " kWh"),
        Unit::Hex => match value {
            AttrValue::Int(code) => format!("0x{code:X}"),
            other => fallback(unit, other),
        },
        Unit::Code | Unit::Plain => value.to_string(),
    }
}

fn with_suffix(unit: Unit, value: &AttrValue, decimals: usize, suffix: &str) -> String {
    match value.as_f64() {
        Some(number) => format!("{number:.decimals$}{suffix}"),
        None => fallback(unit, value),
    }
}

fn fallback(unit: Unit, value: &AttrValue) -> String {
    debug!(?unit, kind = value.kind(), "formatter mismatch, using generic conversion");
    value.to_string()
}

/// Builds the fixed attribute set for the configured device. The set never
/// changes after startup; only attribute values mutate.
pub fn build(profile: &DeviceProfile) -> Vec<AttributeSpec> {
    let mut builder = Builder::default();

    builder.add("/DeviceInstance", i64::from(profile.device_instance), Unit::Code);
    builder.add("/ProductName", PRODUCT_NAME, Unit::Plain);
    builder.add("/Connected", 1i64, Unit::Code);
    builder.add("/FirmwareVersion", FIRMWARE_VERSION, Unit::Plain);
    builder.add("/FirmwareVersion2", FIRMWARE_VERSION, Unit::Plain);
    builder.add("/ProductId", PRODUCT_ID, Unit::Hex);
    builder.add("/DeviceType", DEVICE_TYPE_CODE, Unit::Hex);
    builder.add("/Serial", profile.serial_number.clone(), Unit::Plain);
    builder.add("/CustomName", profile.device_name.clone(), Unit::Plain);
    builder.add("/Mgmt/ProcessName", PROCESS_NAME, Unit::Plain);
    builder.add("/Mgmt/Connection", CONNECTION_KIND, Unit::Plain);
    builder.add("/Error", 0i64, Unit::Code);
    builder.add("/IsReconfigurable", 0i64, Unit::Code);

    match profile.device_type {
        DeviceType::Inverter => build_inverter(&mut builder, profile),
        DeviceType::PvInverter => build_pv_inverter(&mut builder),
    }

    builder.specs
}

fn build_inverter(builder: &mut Builder, profile: &DeviceProfile) {
    // 0 = Off until real telemetry arrives
    builder.add_writable("/State", 0i64, Unit::Code);
    builder.add_writable("/Mode", profile.mode, Unit::Code);
    builder.add("/Ac/Out/NumberOfPhases", i64::from(profile.num_phases), Unit::Code);
    builder.add("/Ac/ActiveIn/Connected", 0i64, Unit::Code);
    builder.add("/Ac/ActiveIn/ActiveInput", ACTIVE_INPUT_NONE, Unit::Code);

    for phase in 1..=profile.num_phases {
        builder.add(&format!("/Ac/Out/L{phase}/V"), 0.0, Unit::Voltage);
        builder.add(&format!("/Ac/Out/L{phase}/I"), 0.0, Unit::Current);
        builder.add(&format!("/Ac/Out/L{phase}/P"), 0.0, Unit::Power);
        builder.add(&format!("/Ac/Out/L{phase}/F"), 0.0, Unit::Frequency);
        builder.add(&format!("/Ac/Out/L{phase}/S"), 0.0, Unit::ApparentPower);
    }

    add_dc_block(builder);

    for path in ALARM_PATHS.iter().chain(BMS_PATHS).chain(LED_PATHS) {
        builder.add(path, 0i64, Unit::Code);
    }
}

fn build_pv_inverter(builder: &mut Builder) {
    builder.add_writable("/State", 0i64, Unit::Code);
    // a PV inverter is always "On"
    builder.add_writable("/Mode", 3i64, Unit::Code);
    // 0 = AC output
    builder.add("/Position", 0i64, Unit::Code);
    builder.add("/Ac/L1/Voltage", 0.0, Unit::Voltage);
    builder.add("/Ac/L1/Current", 0.0, Unit::Current);
    builder.add("/Ac/Power", 0.0, Unit::Power);
    builder.add("/Ac/L1/Frequency", 0.0, Unit::Frequency);
    builder.add("/Ac/Energy/Forward", 0.0, Unit::Energy);

    add_dc_block(builder);
}

fn add_dc_block(builder: &mut Builder) {
    builder.add("/Dc/0/Voltage", 0.0, Unit::Voltage);
    builder.add("/Dc/0/Current", 0.0, Unit::Current);
    builder.add("/Dc/0/Power", 0.0, Unit::Power);
    builder.add("/Dc/0/Temperature", 0.0, Unit::Temperature);
}

#[derive(Default)]
struct Builder {
    specs: Vec<AttributeSpec>,
}

impl Builder {
    fn add(&mut self, path: &str, initial: impl Into<AttrValue>, unit: Unit) {
        self.push(path, initial.into(), false, unit);
    }

    fn add_writable(&mut self, path: &str, initial: impl Into<AttrValue>, unit: Unit) {
        self.push(path, initial.into(), true, unit);
    }

    fn push(&mut self, path: &str, initial: AttrValue, writable: bool, unit: Unit) {
        self.specs.push(AttributeSpec {
            path: path.to_string(),
            initial,
            writable,
            unit,
        });
    }
}

use std::sync::Arc;

use registry::{RecordingBackend, RegistryError, StateRegistry};
use types::{AttrValue, DeviceProfile, DeviceType};

fn three_phase_registry() -> (StateRegistry, RecordingBackend) {
    let profile = DeviceProfile {
        device_type: DeviceType::Inverter,
        device_instance: 7,
        num_phases: 3,
        mode: 4,
        device_name: String::new(),
        serial_number: "MQTT123456".to_string(),
    };
    let backend = RecordingBackend::new();
    let mut registry = StateRegistry::new(Arc::new(backend.clone()));
    registry
        .register_all(&schema::build(&profile))
        .expect("register schema");
    (registry, backend)
}

#[test]
fn registration_announces_every_attribute() {
    let (registry, backend) = three_phase_registry();

    let announced = backend.announced();
    assert_eq!(announced.len(), registry.len());
    assert!(announced
        .iter()
        .any(|(path, writable)| path == "/Mode" && *writable));
    assert!(announced
        .iter()
        .any(|(path, writable)| path == "/Serial" && !*writable));
}

#[test]
fn duplicate_registration_is_an_error() {
    let (mut registry, _backend) = three_phase_registry();

    let spec = schema::build(&DeviceProfile {
        device_type: DeviceType::Inverter,
        device_instance: 7,
        num_phases: 1,
        mode: 4,
        device_name: String::new(),
        serial_number: "MQTT123456".to_string(),
    })
    .into_iter()
    .find(|spec| spec.path == "/Mode")
    .expect("mode spec");

    assert!(matches!(
        registry.register(&spec),
        Err(RegistryError::Duplicate(_))
    ));
}

#[test]
fn set_on_unknown_path_is_a_noop() {
    let (mut registry, backend) = three_phase_registry();

    registry.set("/Nope/Missing", AttrValue::Float(1.0));

    assert!(backend.pushes().is_empty());
    assert!(registry.value("/Nope/Missing").is_none());
}

#[test]
fn set_is_idempotent() {
    let (mut registry, backend) = three_phase_registry();

    registry.set("/Ac/Out/L1/V", AttrValue::Float(230.1));
    registry.set("/Ac/Out/L1/V", AttrValue::Float(230.1));

    assert_eq!(backend.push_count("/Ac/Out/L1/V"), 1);
    assert_eq!(
        registry.value("/Ac/Out/L1/V"),
        Some(&AttrValue::Float(230.1))
    );
}

#[test]
fn set_coerces_numeric_values() {
    let (mut registry, backend) = three_phase_registry();

    // integer into a float slot
    registry.set("/Ac/Out/L1/P", AttrValue::Int(500));
    assert_eq!(
        registry.value("/Ac/Out/L1/P"),
        Some(&AttrValue::Float(500.0))
    );

    // integral float into an integer slot
    registry.set("/Error", AttrValue::Float(2.0));
    assert_eq!(registry.value("/Error"), Some(&AttrValue::Int(2)));

    let pushes = backend.pushes();
    assert!(pushes
        .iter()
        .any(|(path, _, text)| path == "/Ac/Out/L1/P" && text == "500.0 W"));
}

#[test]
fn set_rejects_type_mismatches() {
    let (mut registry, backend) = three_phase_registry();

    registry.set("/Serial", AttrValue::Int(5));
    registry.set("/Ac/Out/L1/V", AttrValue::Text("high".to_string()));
    registry.set("/Error", AttrValue::Float(2.5));

    assert_eq!(
        registry.value("/Serial"),
        Some(&AttrValue::Text("MQTT123456".to_string()))
    );
    assert_eq!(registry.value("/Ac/Out/L1/V"), Some(&AttrValue::Float(0.0)));
    assert_eq!(registry.value("/Error"), Some(&AttrValue::Int(0)));
    assert!(backend.pushes().is_empty());
}

#[test]
fn external_write_authorization() {
    let (mut registry, backend) = three_phase_registry();

    assert!(registry.handle_write("/Mode", AttrValue::Int(2)));
    assert_eq!(registry.value("/Mode"), Some(&AttrValue::Int(2)));
    assert_eq!(backend.push_count("/Mode"), 1);

    assert!(registry.handle_write("/State", AttrValue::Int(9)));
    assert_eq!(registry.value("/State"), Some(&AttrValue::Int(9)));

    // read-only attribute
    assert!(!registry.handle_write("/Serial", AttrValue::Text("X".to_string())));
    assert_eq!(
        registry.value("/Serial"),
        Some(&AttrValue::Text("MQTT123456".to_string()))
    );

    // unknown attribute
    assert!(!registry.handle_write("/Nope", AttrValue::Int(1)));

    // mismatched type on a writable attribute
    assert!(!registry.handle_write("/Mode", AttrValue::Text("on".to_string())));
    assert_eq!(registry.value("/Mode"), Some(&AttrValue::Int(2)));
}

#[test]
fn display_text_follows_current_value() {
    let (mut registry, _backend) = three_phase_registry();

    assert_eq!(
        registry.display_text("/Ac/Out/L1/V").as_deref(),
        Some("0.0 V")
    );
    registry.set("/Ac/Out/L1/V", AttrValue::Float(230.456));
    assert_eq!(
        registry.display_text("/Ac/Out/L1/V").as_deref(),
        Some("230.5 V")
    );
    assert_eq!(registry.display_text("/DeviceType").as_deref(), Some("0x203"));
}

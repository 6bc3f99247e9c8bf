use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};

use bridge_app::runtime::run_loop;
use ingest::IngestEngine;
use mqtt_client::{status_topic, BusMessage};
use registry::{RecordingBackend, StateRegistry, WriteRequest};
use types::{AttrValue, DeviceProfile, DeviceType};

#[tokio::test]
async fn e2e_three_phase_telemetry_and_external_write() {
    let profile = DeviceProfile {
        device_type: DeviceType::Inverter,
        device_instance: 7,
        num_phases: 3,
        mode: 4,
        device_name: "Test Inverter".to_string(),
        serial_number: "MQTT123456".to_string(),
    };

    let backend = RecordingBackend::new();
    let mut state = StateRegistry::new(Arc::new(backend.clone()));
    state
        .register_all(&schema::build(&profile))
        .expect("register schema");
    assert_eq!(backend.announced().len(), 56);

    let engine = IngestEngine::new(profile.device_type, profile.num_phases);
    let (bus_tx, bus_rx) = mpsc::channel(16);
    let (write_tx, write_rx) = mpsc::channel(4);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let handle = tokio::spawn(run_loop(state, engine, bus_rx, write_rx, shutdown_rx));

    let payload = br#"{"voltage": 230.1, "L2_voltage": 229.8, "L3_voltage": 231.0, "power": 1500}"#;
    bus_tx
        .send(BusMessage {
            topic: status_topic("inverter"),
            payload: payload.to_vec(),
        })
        .await
        .expect("send message");

    // accepted external write, confirmed before shutdown
    let (reply_tx, reply_rx) = oneshot::channel();
    write_tx
        .send(WriteRequest {
            path: "/Mode".to_string(),
            value: AttrValue::Int(2),
            reply: reply_tx,
        })
        .await
        .expect("send write");
    assert!(reply_rx.await.expect("write reply"));

    // rejected external write to a read-only attribute
    let (reply_tx, reply_rx) = oneshot::channel();
    write_tx
        .send(WriteRequest {
            path: "/Serial".to_string(),
            value: AttrValue::Text("X".to_string()),
            reply: reply_tx,
        })
        .await
        .expect("send write");
    assert!(!reply_rx.await.expect("write reply"));

    shutdown_tx.send(true).expect("shutdown");
    let state = handle.await.expect("run loop join");

    assert_eq!(state.value("/Ac/Out/L1/V"), Some(&AttrValue::Float(230.1)));
    assert_eq!(state.value("/Ac/Out/L2/V"), Some(&AttrValue::Float(229.8)));
    assert_eq!(state.value("/Ac/Out/L3/V"), Some(&AttrValue::Float(231.0)));
    assert_eq!(state.value("/Ac/Out/L1/P"), Some(&AttrValue::Float(1500.0)));
    assert_eq!(state.value("/Ac/Out/L2/P"), Some(&AttrValue::Float(0.0)));
    assert_eq!(state.value("/State"), Some(&AttrValue::Int(0)));
    assert_eq!(state.value("/Mode"), Some(&AttrValue::Int(2)));
    assert_eq!(
        state.value("/Serial"),
        Some(&AttrValue::Text("MQTT123456".to_string()))
    );
    assert_eq!(state.display_text("/Ac/Out/L1/V").as_deref(), Some("230.1 V"));

    // the message plus the accepted write reached the backend, nothing else
    assert_eq!(backend.pushes().len(), 5);
}

#[tokio::test]
async fn malformed_payload_is_contained_by_the_run_loop() {
    let profile = DeviceProfile {
        device_type: DeviceType::PvInverter,
        device_instance: 23,
        num_phases: 1,
        mode: 3,
        device_name: String::new(),
        serial_number: "PV-0023".to_string(),
    };

    let backend = RecordingBackend::new();
    let mut state = StateRegistry::new(Arc::new(backend.clone()));
    state
        .register_all(&schema::build(&profile))
        .expect("register schema");

    let engine = IngestEngine::new(profile.device_type, profile.num_phases);
    let (bus_tx, bus_rx) = mpsc::channel(16);
    let (_write_tx, write_rx) = mpsc::channel(4);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let handle = tokio::spawn(run_loop(state, engine, bus_rx, write_rx, shutdown_rx));

    bus_tx
        .send(BusMessage {
            topic: status_topic("roof"),
            payload: b"{{{ truncated".to_vec(),
        })
        .await
        .expect("send garbage");
    bus_tx
        .send(BusMessage {
            topic: status_topic("roof"),
            payload: br#"{"power": 800}"#.to_vec(),
        })
        .await
        .expect("send message");

    shutdown_tx.send(true).expect("shutdown");
    let state = handle.await.expect("run loop join");

    // the bad delivery is discarded, the following one still applies
    assert_eq!(state.value("/Ac/Power"), Some(&AttrValue::Float(800.0)));
    assert_eq!(backend.pushes().len(), 1);
}

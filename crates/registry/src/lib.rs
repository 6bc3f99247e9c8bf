#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use schema::{format_value, AttributeSpec, Unit};
use types::AttrValue;

/// Transport that announces attributes to the platform-facing registry
/// service and pushes value changes out. Registration failures are fatal at
/// startup; push failures are logged by the adapter and never escalate.
pub trait RegistryBackend: Send + Sync {
    fn announce(
        &self,
        path: &str,
        initial: &AttrValue,
        text: &str,
        writable: bool,
    ) -> Result<(), RegistryError>;

    fn push(&self, path: &str, value: &AttrValue, text: &str) -> Result<(), RegistryError>;
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("registry transport error: {0}")]
    Transport(String),
    #[error("attribute {0} registered twice")]
    Duplicate(String),
}

/// Externally-initiated write delivered to the single-threaded state owner.
/// The registry transport resolves the reply into its accept/reject answer.
#[derive(Debug)]
pub struct WriteRequest {
    pub path: String,
    pub value: AttrValue,
    pub reply: oneshot::Sender<bool>,
}

#[derive(Debug, Clone)]
struct Entry {
    value: AttrValue,
    unit: Unit,
    writable: bool,
}

/// Owns the registry snapshot. All mutation goes through `set` and
/// `handle_write`; both are driven from one consumer task, so the map needs
/// no locking.
pub struct StateRegistry {
    backend: Arc<dyn RegistryBackend>,
    entries: HashMap<String, Entry>,
}

impl StateRegistry {
    pub fn new(backend: Arc<dyn RegistryBackend>) -> Self {
        Self {
            backend,
            entries: HashMap::new(),
        }
    }

    pub fn register(&mut self, spec: &AttributeSpec) -> Result<(), RegistryError> {
        if self.entries.contains_key(&spec.path) {
            return Err(RegistryError::Duplicate(spec.path.clone()));
        }

        let text = format_value(spec.unit, &spec.initial);
        self.backend
            .announce(&spec.path, &spec.initial, &text, spec.writable)?;
        self.entries.insert(
            spec.path.clone(),
            Entry {
                value: spec.initial.clone(),
                unit: spec.unit,
                writable: spec.writable,
            },
        );
        debug!(path = %spec.path, initial = %spec.initial, writable = spec.writable, "attribute registered");
        Ok(())
    }

    pub fn register_all(&mut self, specs: &[AttributeSpec]) -> Result<(), RegistryError> {
        for spec in specs {
            self.register(spec)?;
        }
        Ok(())
    }

    /// Applies one telemetry update. Unknown paths and type-mismatched values
    /// are dropped with a warning; re-setting the current value skips the
    /// backend push.
    pub fn set(&mut self, path: &str, value: AttrValue) {
        let Some(entry) = self.entries.get_mut(path) else {
            warn!(path, "set on unregistered attribute ignored");
            return;
        };

        let value = match coerce(&entry.value, value) {
            Ok(value) => value,
            Err(rejected) => {
                warn!(
                    path,
                    expected = entry.value.kind(),
                    received = rejected.kind(),
                    "type mismatch, update dropped"
                );
                return;
            }
        };

        if value == entry.value {
            debug!(path, "value unchanged, push skipped");
            return;
        }

        entry.value = value.clone();
        let text = format_value(entry.unit, &value);
        if let Err(err) = self.backend.push(path, &value, &text) {
            warn!(path, error = %err, "registry push failed");
        }
    }

    /// Answers a remote write attempt. Only registered writable attributes
    /// (`/State` and `/Mode`) are accepted; an accepted write updates the
    /// snapshot and is reflected back out.
    pub fn handle_write(&mut self, path: &str, value: AttrValue) -> bool {
        let Some(entry) = self.entries.get(path) else {
            debug!(path, "write to unknown attribute rejected");
            return false;
        };
        if !entry.writable {
            debug!(path, "write to read-only attribute rejected");
            return false;
        }

        let value = match coerce(&entry.value, value) {
            Ok(value) => value,
            Err(rejected) => {
                debug!(path, received = rejected.kind(), "write with mismatched type rejected");
                return false;
            }
        };

        info!(path, value = %value, "external write accepted");
        self.set(path, value);
        true
    }

    pub fn value(&self, path: &str) -> Option<&AttrValue> {
        self.entries.get(path).map(|entry| &entry.value)
    }

    pub fn display_text(&self, path: &str) -> Option<String> {
        self.entries
            .get(path)
            .map(|entry| format_value(entry.unit, &entry.value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Coerces an incoming value into the slot's declared type. Int widens into
/// Float slots, integral Floats narrow into Int slots; everything else is
/// returned as rejected.
fn coerce(current: &AttrValue, incoming: AttrValue) -> Result<AttrValue, AttrValue> {
    match (current, incoming) {
        (AttrValue::Int(_), AttrValue::Int(value)) => Ok(AttrValue::Int(value)),
        (AttrValue::Int(_), AttrValue::Float(value)) if value.fract() == 0.0 => {
            Ok(AttrValue::Int(value as i64))
        }
        (AttrValue::Float(_), AttrValue::Float(value)) => Ok(AttrValue::Float(value)),
        (AttrValue::Float(_), AttrValue::Int(value)) => Ok(AttrValue::Float(value as f64)),
        (AttrValue::Text(_), AttrValue::Text(value)) => Ok(AttrValue::Text(value)),
        (_, rejected) => Err(rejected),
    }
}

/// Shipped transport for running without a live registry service: every
/// announce and push ends up in the log only.
#[derive(Debug, Default)]
pub struct LogBackend;

impl RegistryBackend for LogBackend {
    fn announce(
        &self,
        path: &str,
        _initial: &AttrValue,
        text: &str,
        writable: bool,
    ) -> Result<(), RegistryError> {
        debug!(path, text, writable, "announce (log transport)");
        Ok(())
    }

    fn push(&self, path: &str, _value: &AttrValue, text: &str) -> Result<(), RegistryError> {
        info!(path, text, "push (log transport)");
        Ok(())
    }
}

/// Test transport that records every announce and push.
#[derive(Debug, Default, Clone)]
pub struct RecordingBackend {
    announced: Arc<Mutex<Vec<(String, bool)>>>,
    pushes: Arc<Mutex<Vec<(String, AttrValue, String)>>>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn announced(&self) -> Vec<(String, bool)> {
        self.announced.lock().expect("announce log").clone()
    }

    pub fn pushes(&self) -> Vec<(String, AttrValue, String)> {
        self.pushes.lock().expect("push log").clone()
    }

    pub fn push_count(&self, path: &str) -> usize {
        self.pushes
            .lock()
            .expect("push log")
            .iter()
            .filter(|(pushed, _, _)| pushed == path)
            .count()
    }
}

impl RegistryBackend for RecordingBackend {
    fn announce(
        &self,
        path: &str,
        _initial: &AttrValue,
        _text: &str,
        writable: bool,
    ) -> Result<(), RegistryError> {
        self.announced
            .lock()
            .expect("announce log")
            .push((path.to_string(), writable));
        Ok(())
    }

    fn push(&self, path: &str, value: &AttrValue, text: &str) -> Result<(), RegistryError> {
        self.pushes
            .lock()
            .expect("push log")
            .push((path.to_string(), value.clone(), text.to_string()));
        Ok(())
    }
}

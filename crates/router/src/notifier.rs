//! NotificationDeduplicator - raise once, resolve once
//!
//! A sensor enters the blacklist when an error alert is raised for it and
//! leaves it when the resolve alert is produced. Both transitions happen under
//! one lock, so concurrent routings for the same sensor never double-raise or
//! double-resolve.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

use contracts::{Alert, AlertMessage, SensorId};
use tracing::{debug, info};

use crate::coercer::CoercionFailure;

/// What went wrong for a sensor
#[derive(Debug, Clone, PartialEq)]
pub enum AlertKind {
    /// Sensor absent from the sensor map
    DoesNotExist,
    /// Unknown keys and/or values that failed coercion
    InvalidKey {
        unknown_keys: Vec<String>,
        coercion_errors: Vec<CoercionFailure>,
    },
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DoesNotExist => "does_not_exist",
            Self::InvalidKey { .. } => "invalid_key",
        }
    }

    /// Alert lines for `sensor`
    pub fn messages(&self, sensor: &SensorId) -> Vec<String> {
        match self {
            Self::DoesNotExist => vec![format!(
                "Sensor {sensor} not found in sensor metadata. Please add this sensor."
            )],
            Self::InvalidKey {
                unknown_keys,
                coercion_errors,
            } => {
                let mut messages = Vec::with_capacity(coercion_errors.len() + 1);
                if !unknown_keys.is_empty() {
                    messages.push(format!(
                        "Received data from sensor {sensor} with unknown key(s) {}. \
                         Please update the keys and properties in this sensors metadata.",
                        unknown_keys.join(",")
                    ));
                }
                messages.extend(coercion_errors.iter().map(CoercionFailure::describe));
                messages
            }
        }
    }
}

/// Tracks sensors with an open error alert
#[derive(Debug, Default)]
pub struct NotificationDeduplicator {
    blacklist: Mutex<HashSet<SensorId>>,
}

impl NotificationDeduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    fn blacklist(&self) -> MutexGuard<'_, HashSet<SensorId>> {
        self.blacklist.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Alert to send for a new error, or `None` if one is already open
    pub fn report_error(&self, sensor: &SensorId, kind: &AlertKind) -> Option<Alert> {
        if !self.blacklist().insert(sensor.clone()) {
            debug!(sensor = %sensor, kind = kind.as_str(), "alert already open, suppressed");
            return None;
        }
        info!(sensor = %sensor, kind = kind.as_str(), "raising alert");
        Some(Alert {
            sensor: sensor.clone(),
            message: AlertMessage::Problems(kind.messages(sensor)),
        })
    }

    /// Resolve alert to send, or `None` if the sensor had no open alert
    pub fn report_resolve(&self, sensor: &SensorId) -> Option<Alert> {
        if !self.blacklist().remove(sensor) {
            return None;
        }
        info!(sensor = %sensor, "resolving alert");
        Some(Alert {
            sensor: sensor.clone(),
            message: AlertMessage::Resolve,
        })
    }

    pub fn is_blacklisted(&self, sensor: &str) -> bool {
        self.blacklist().contains(sensor)
    }
}

//! Value coercion to declared property types
//!
//! Coercion never mutates the observation. Values that fail keep their raw
//! form in [`Coerced::data`] so the rest of the observation can still route.

use std::collections::{BTreeMap, BTreeSet};

use contracts::{Observation, ObservationData, PropertyRef, TypeTag};
use schema_cache::MetadataSnapshot;
use serde_json::Value;

/// Expected-type label for a property missing from the type map
pub const UNDECLARED: &str = "UNDECLARED";

/// A value that could not be converted
#[derive(Debug, Clone, PartialEq)]
pub struct CoercionFailure {
    pub property: PropertyRef,
    /// Declared type as stored (`DOUBLE`, `VARCHAR`, ...) or `UNDECLARED`
    pub expected: String,
    /// Value as received
    pub value: Value,
}

impl CoercionFailure {
    /// Alert line for this failure
    pub fn describe(&self) -> String {
        format!(
            "Property {} expected type {} and could not coerce value {} of type {}",
            self.property.property,
            self.expected,
            value_text(&self.value),
            value_kind(&self.value)
        )
    }
}

/// Coerced copy of an observation's data plus per-key failures
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Coerced {
    pub data: ObservationData,
    pub errors: BTreeMap<String, CoercionFailure>,
}

/// Coerce every key of `observation` not listed in `invalid`.
///
/// Invalid keys are copied through unchanged and never reported as coercion
/// failures.
pub fn coerce(
    observation: &Observation,
    snapshot: &MetadataSnapshot,
    invalid: &BTreeSet<String>,
) -> Coerced {
    let mut coerced = Coerced::default();

    for (key, value) in &observation.data {
        let reference = match snapshot.sensors().resolve(&observation.sensor, key) {
            Some(reference) if !invalid.contains(key) => reference,
            _ => {
                coerced.data.insert(key.clone(), value.clone());
                continue;
            }
        };

        let result = match snapshot.types().type_of(reference) {
            Some(declared) => {
                coerce_value(value, &declared.tag).ok_or_else(|| declared.name.clone())
            }
            None => Err(UNDECLARED.to_string()),
        };

        match result {
            Ok(converted) => {
                coerced.data.insert(key.clone(), converted);
            }
            Err(expected) => {
                coerced.data.insert(key.clone(), value.clone());
                coerced.errors.insert(
                    key.clone(),
                    CoercionFailure {
                        property: reference.clone(),
                        expected,
                        value: value.clone(),
                    },
                );
            }
        }
    }

    coerced
}

/// Convert one value; `None` when it cannot represent `tag`
pub fn coerce_value(value: &Value, tag: &TypeTag) -> Option<Value> {
    match tag {
        TypeTag::String => Some(match value {
            Value::String(_) => value.clone(),
            Value::Null => Value::String("null".to_string()),
            other => Value::String(other.to_string()),
        }),
        TypeTag::Integer => to_integer(value),
        TypeTag::Float => to_float(value),
        TypeTag::Bool => to_bool(value),
        TypeTag::Unknown(_) => None,
    }
}

fn truncate(f: f64) -> Option<Value> {
    let t = f.trunc();
    if t.is_finite() && t >= i64::MIN as f64 && t < i64::MAX as f64 {
        Some(Value::from(t as i64))
    } else {
        None
    }
}

fn to_integer(value: &Value) -> Option<Value> {
    match value {
        Value::Number(n) if n.is_i64() || n.is_u64() => Some(value.clone()),
        Value::Number(n) => n.as_f64().and_then(truncate),
        Value::String(s) => {
            let s = s.trim();
            match s.parse::<i64>() {
                Ok(i) => Some(Value::from(i)),
                Err(_) => s
                    .parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite())
                    .and_then(truncate),
            }
        }
        _ => None,
    }
}

fn to_float(value: &Value) -> Option<Value> {
    match value {
        Value::Number(_) => Some(value.clone()),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .map(Value::from),
        Value::Bool(b) => Some(Value::from(if *b { 1.0 } else { 0.0 })),
        _ => None,
    }
}

fn to_bool(value: &Value) -> Option<Value> {
    let b = match value {
        Value::Bool(b) => *b,
        Value::Number(n) => match n.as_f64() {
            Some(f) if f == 1.0 => true,
            Some(f) if f == 0.0 => false,
            _ => return None,
        },
        Value::String(s) => {
            let s = s.trim();
            if s == "1" || s.eq_ignore_ascii_case("true") {
                true
            } else if s == "0" || s.eq_ignore_ascii_case("false") {
                false
            } else {
                return None;
            }
        }
        _ => return None,
    };
    Some(Value::Bool(b))
}

/// Type name of a raw value as reported in alerts
pub fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::String(_) => "string",
        Value::Number(_) => "number",
        Value::Bool(_) => "boolean",
        Value::Null | Value::Array(_) | Value::Object(_) => "object",
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

//! Metadata rows and the maps derived from them
//!
//! - `SensorMap`: sensor -> raw key -> `feature.property`
//! - `TypeMap`: feature -> property -> declared type
//!
//! Both maps are rebuilt wholesale from rows on every refresh.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::warn;

use crate::SensorId;

/// Sensor row as returned by the metadata store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorRow {
    /// Sensor name
    pub name: String,

    /// Raw key -> `"feature.property"`
    #[serde(default)]
    pub observed_properties: HashMap<String, String>,
}

/// Feature-of-interest row as returned by the metadata store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureRow {
    /// Feature name
    pub name: String,

    /// Declared properties
    #[serde(default)]
    pub observed_properties: Vec<PropertyType>,
}

/// Property declaration inside a feature row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyType {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
}

/// Parsed `feature.property` reference
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PropertyRef {
    pub feature: String,
    pub property: String,
}

impl PropertyRef {
    /// Parse `feature.property`, splitting at the first dot.
    ///
    /// The property part may itself contain dots. Both parts are lowercased.
    pub fn parse(reference: &str) -> Option<Self> {
        let (feature, property) = reference.split_once('.')?;
        if feature.is_empty() || property.is_empty() {
            return None;
        }
        Some(Self {
            feature: feature.to_lowercase(),
            property: property.to_lowercase(),
        })
    }
}

impl fmt::Display for PropertyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.feature, self.property)
    }
}

/// Declared SQL-ish type of a property
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeTag {
    String,
    Integer,
    Float,
    Bool,
    /// Unrecognized declaration (uppercased); never coercible
    Unknown(String),
}

impl TypeTag {
    /// Parse a declared type, case-insensitive, accepting SQL aliases
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "string" | "varchar" | "text" | "char" => Self::String,
            "integer" | "int" | "bigint" | "smallint" => Self::Integer,
            "float" | "double" | "real" => Self::Float,
            "bool" | "boolean" => Self::Bool,
            _ => Self::Unknown(raw.trim().to_uppercase()),
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String => f.write_str("STRING"),
            Self::Integer => f.write_str("INTEGER"),
            Self::Float => f.write_str("FLOAT"),
            Self::Bool => f.write_str("BOOL"),
            Self::Unknown(raw) => f.write_str(raw),
        }
    }
}

/// Type of a property as declared in its feature row
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeclaredType {
    pub tag: TypeTag,
    /// Declaration as stored, uppercased (`DOUBLE`, `VARCHAR`, ...)
    pub name: String,
}

impl DeclaredType {
    pub fn parse(raw: &str) -> Self {
        Self {
            tag: TypeTag::parse(raw),
            name: raw.trim().to_uppercase(),
        }
    }
}

/// Sensor -> raw key -> property reference
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SensorMap {
    sensors: HashMap<SensorId, HashMap<String, PropertyRef>>,
}

impl SensorMap {
    /// Build from metadata rows, lowercasing sensor names and keys.
    ///
    /// Malformed references are skipped, which leaves their key unknown.
    pub fn from_rows(rows: impl IntoIterator<Item = SensorRow>) -> Self {
        let mut sensors = HashMap::new();
        for row in rows {
            let mut properties = HashMap::with_capacity(row.observed_properties.len());
            for (key, reference) in row.observed_properties {
                match PropertyRef::parse(&reference) {
                    Some(parsed) => {
                        properties.insert(key.to_lowercase(), parsed);
                    }
                    None => warn!(
                        sensor = %row.name,
                        key = %key,
                        reference = %reference,
                        "skipping malformed property reference"
                    ),
                }
            }
            sensors.insert(SensorId::normalized(&row.name), properties);
        }
        Self { sensors }
    }

    /// Mapping for one sensor
    pub fn sensor(&self, sensor: &str) -> Option<&HashMap<String, PropertyRef>> {
        self.sensors.get(sensor)
    }

    pub fn contains_sensor(&self, sensor: &str) -> bool {
        self.sensors.contains_key(sensor)
    }

    /// Resolve one raw key of one sensor
    pub fn resolve(&self, sensor: &str, key: &str) -> Option<&PropertyRef> {
        self.sensors.get(sensor)?.get(key)
    }

    pub fn len(&self) -> usize {
        self.sensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty()
    }
}

/// Feature -> property -> declared type
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeMap {
    features: HashMap<String, HashMap<String, DeclaredType>>,
}

impl TypeMap {
    /// Build from metadata rows, lowercasing feature and property names
    pub fn from_rows(rows: impl IntoIterator<Item = FeatureRow>) -> Self {
        let features = rows
            .into_iter()
            .map(|row| {
                let properties = row
                    .observed_properties
                    .into_iter()
                    .map(|p| (p.name.to_lowercase(), DeclaredType::parse(&p.type_name)))
                    .collect();
                (row.name.to_lowercase(), properties)
            })
            .collect();
        Self { features }
    }

    /// Declared type of a referenced property
    pub fn type_of(&self, reference: &PropertyRef) -> Option<&DeclaredType> {
        self.features
            .get(&reference.feature)?
            .get(&reference.property)
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

//! Route outcome types

use std::fmt;

/// How one observation was classified
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteClass {
    /// Clean against the cached snapshot, no refresh needed
    Clean,
    /// Sensor still absent after a refresh
    UnknownSensor,
    /// Unknown keys or coercion failures remain after a refresh
    StillInvalid,
    /// The refresh made everything valid
    Resolved,
    /// Refresh failed; nothing was dispatched
    Dropped,
}

impl RouteClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Clean => "clean",
            Self::UnknownSensor => "unknown_sensor",
            Self::StillInvalid => "still_invalid",
            Self::Resolved => "resolved",
            Self::Dropped => "dropped",
        }
    }
}

impl fmt::Display for RouteClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Summary of one `route` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteOutcome {
    pub class: RouteClass,
    /// Feature rows dispatched (one per feature group)
    pub feature_rows: usize,
    /// Keys placed in the misfit record
    pub misfit_keys: usize,
}

impl RouteOutcome {
    pub fn dropped() -> Self {
        Self {
            class: RouteClass::Dropped,
            feature_rows: 0,
            misfit_keys: 0,
        }
    }
}

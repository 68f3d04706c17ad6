//! # Router
//!
//! Per-observation routing against the metadata cache:
//!
//! 1. validate keys against the sensor map
//! 2. coerce values to their declared types
//! 3. on any mismatch refresh the cache once and reclassify
//! 4. split into feature rows and one misfit record
//! 5. dispatch, then raise or resolve the sensor's alert at most once
//!
//! Every `data` key of an observation ends up in exactly one feature row or
//! in the misfit record.

pub mod coercer;
pub mod notifier;
pub mod orchestrator;
pub mod outcome;
pub mod router;
pub mod validator;

pub use coercer::{coerce, coerce_value, Coerced, CoercionFailure};
pub use notifier::{AlertKind, NotificationDeduplicator};
pub use orchestrator::Orchestrator;
pub use outcome::{RouteClass, RouteOutcome};
pub use router::{split, Router, SplitPlan};
pub use validator::{assess, invalid_keys, Assessment};

//! Router - splits an assessed observation and dispatches the pieces

use std::collections::{BTreeMap, BTreeSet};

use contracts::{
    Alert, FeatureInsert, MisfitRecord, Observation, ObservationData, Publication,
};
use dispatcher::{Dispatcher, MetricsSnapshot};
use schema_cache::MetadataSnapshot;
use serde_json::{Map, Value};
use tracing::{debug, error, instrument, warn};

use crate::validator::assess;

/// Where every key of one observation goes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SplitPlan {
    /// One row per feature group
    pub features: Vec<FeatureInsert>,
    /// Raw values of every key that could not be routed
    pub misfit: Option<MisfitRecord>,
    /// Keys that ended up in a feature row
    pub routed_keys: BTreeSet<String>,
    /// Keys that ended up in the misfit record
    pub misfit_keys: BTreeSet<String>,
}

impl SplitPlan {
    /// Move entries displaced by key normalization into the misfit record,
    /// under their original key
    pub fn add_displaced(&mut self, observation: &Observation, displaced: &ObservationData) {
        if displaced.is_empty() {
            return;
        }
        let misfit = self.misfit.get_or_insert_with(|| MisfitRecord {
            network: observation.network.clone(),
            node_id: observation.node_id.clone(),
            datetime: observation.datetime.clone(),
            meta_id: observation.meta_id,
            sensor: observation.sensor.clone(),
            data: Map::new(),
        });
        for (key, value) in displaced {
            misfit.data.insert(key.clone(), value.clone());
            self.misfit_keys.insert(key.clone());
        }
    }
}

/// Partition `observation` into per-feature rows and one misfit record.
///
/// `bad_keys` must come from assessing the same observation against the same
/// snapshot. The remainder is re-assessed before grouping and anything still
/// failing moves to the misfit record, so no key is lost or duplicated. When
/// two keys target the same `feature.property` the first in key order wins.
pub fn split(
    observation: &Observation,
    snapshot: &MetadataSnapshot,
    bad_keys: &BTreeSet<String>,
) -> SplitPlan {
    let mut misfit_keys: BTreeSet<String> = bad_keys
        .iter()
        .filter(|key| observation.data.contains_key(key.as_str()))
        .cloned()
        .collect();

    let remaining: ObservationData = observation
        .data
        .iter()
        .filter(|(key, _)| !misfit_keys.contains(key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    let check = assess(&observation.with_data(remaining), snapshot);

    let leftover = check.bad_keys();
    debug_assert!(
        leftover.is_empty(),
        "remaining keys {leftover:?} of sensor {} are not routable",
        observation.sensor
    );
    if !leftover.is_empty() {
        error!(
            sensor = %observation.sensor,
            keys = ?leftover,
            "remaining keys failed verification, moving them to misfit"
        );
        misfit_keys.extend(leftover);
    }

    let mut groups: BTreeMap<String, Map<String, Value>> = BTreeMap::new();
    let mut routed_keys = BTreeSet::new();
    for (key, value) in &check.coerced.data {
        if misfit_keys.contains(key) {
            continue;
        }
        let Some(reference) = snapshot.sensors().resolve(&observation.sensor, key) else {
            misfit_keys.insert(key.clone());
            continue;
        };
        let columns = groups.entry(reference.feature.clone()).or_default();
        if columns.contains_key(&reference.property) {
            warn!(
                sensor = %observation.sensor,
                key = %key,
                target = %reference,
                "duplicate property target, routing key to misfit"
            );
            misfit_keys.insert(key.clone());
            continue;
        }
        columns.insert(reference.property.clone(), value.clone());
        routed_keys.insert(key.clone());
    }

    let features = groups
        .into_iter()
        .map(|(feature, values)| FeatureInsert {
            network: observation.network.clone(),
            feature,
            node_id: observation.node_id.clone(),
            datetime: observation.datetime.clone(),
            meta_id: observation.meta_id,
            sensor: observation.sensor.clone(),
            values,
        })
        .collect();

    let misfit = (!misfit_keys.is_empty()).then(|| MisfitRecord {
        network: observation.network.clone(),
        node_id: observation.node_id.clone(),
        datetime: observation.datetime.clone(),
        meta_id: observation.meta_id,
        sensor: observation.sensor.clone(),
        data: misfit_keys
            .iter()
            .filter_map(|key| {
                observation
                    .data
                    .get(key)
                    .map(|value| (key.clone(), value.clone()))
            })
            .collect(),
    });

    SplitPlan {
        features,
        misfit,
        routed_keys,
        misfit_keys,
    }
}

/// Hands split plans and alerts to the dispatcher
pub struct Router {
    dispatcher: Dispatcher,
    topic: String,
}

impl Router {
    pub fn new(dispatcher: Dispatcher, topic: impl Into<String>) -> Self {
        Self {
            dispatcher,
            topic: topic.into(),
        }
    }

    /// Misfit first, then one row and one publication per feature group.
    ///
    /// Returns the number of feature rows queued.
    #[instrument(
        name = "router_dispatch",
        skip(self, plan),
        fields(features = plan.features.len(), misfit_keys = plan.misfit_keys.len())
    )]
    pub async fn dispatch(&self, plan: SplitPlan) -> usize {
        if let Some(record) = plan.misfit {
            if !self.dispatcher.insert_misfit(record).await {
                warn!("misfit record not queued");
            }
        }

        let mut queued = 0;
        for row in plan.features {
            let publication = Publication {
                topic: self.topic.clone(),
                payload: row.to_published(),
            };
            if self.dispatcher.insert_feature(row).await {
                queued += 1;
            }
            if !self.dispatcher.publish(publication).await {
                debug!(topic = %self.topic, "publication not queued");
            }
        }
        queued
    }

    pub async fn send_alert(&self, alert: Alert) -> bool {
        let kind = if alert.message.is_resolve() {
            "resolve"
        } else {
            "raise"
        };
        let queued = self.dispatcher.alert(alert).await;
        if queued {
            observability::record_alert(kind);
        }
        queued
    }

    /// Drain every output, returning the final per-output counters
    pub async fn shutdown(self) -> Vec<(String, MetricsSnapshot)> {
        self.dispatcher.shutdown().await
    }
}

//! Conflict details carried in upload outcomes.

use regatta_types::{EntityKind, RecordPayload, SyncId};
use serde::{Deserialize, Serialize};

/// The kind of disagreement the hub detected.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    /// Same identifier, different content.
    IdentityMismatch,
    /// Two replicas recorded contradictory decisions on a decided case.
    DecisionMismatch,
}

/// Everything a device needs to render a disagreement to an operator.
///
/// Both snapshots are carried in full so the device can show a diff
/// without another round trip.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct ConflictDetail {
    /// What kind of disagreement this is.
    pub kind: ConflictKind,
    /// Kind of the entity in conflict.
    pub entity_kind: EntityKind,
    /// The contested identifier.
    pub entity: SyncId,
    /// The hub's committed state.
    pub hub_snapshot: RecordPayload,
    /// The state the device submitted.
    pub incoming_snapshot: RecordPayload,
}

/// One differing field between the two snapshots, rendered as text.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct FieldDiff {
    /// Field name.
    pub field: String,
    /// The hub's value.
    pub hub: String,
    /// The incoming value.
    pub incoming: String,
}

impl ConflictDetail {
    /// Computes a field-by-field diff of the two snapshots.
    ///
    /// Fields are compared through their JSON representation; the
    /// volatile `updated_at_ms` field is skipped because it is expected
    /// to differ between replicas.
    #[must_use]
    pub fn field_diff(&self) -> Vec<FieldDiff> {
        let hub = serde_json::to_value(&self.hub_snapshot).unwrap_or_default();
        let incoming = serde_json::to_value(&self.incoming_snapshot).unwrap_or_default();

        let (Some(hub), Some(incoming)) = (hub.as_object(), incoming.as_object()) else {
            return Vec::new();
        };

        let mut fields: Vec<&String> = hub.keys().collect();
        for key in incoming.keys() {
            if !hub.contains_key(key) {
                fields.push(key);
            }
        }

        let mut diffs = Vec::new();
        for field in fields {
            if field == "updated_at_ms" {
                continue;
            }
            let hub_value = hub.get(field);
            let incoming_value = incoming.get(field);
            if hub_value != incoming_value {
                diffs.push(FieldDiff {
                    field: field.clone(),
                    hub: render(hub_value),
                    incoming: render(incoming_value),
                });
            }
        }
        diffs
    }
}

fn render(value: Option<&serde_json::Value>) -> String {
    match value {
        None => "(absent)".to_string(),
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

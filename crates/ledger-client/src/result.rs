//! Decoding of transaction execution results.
//!
//! Nodes and gas stations answer with different shapes. The shape is decided
//! once here so that callers only ever see [`ExecutionResult`].

use serde::Deserialize;
use serde_json::Value;

use crate::{Error, ObjectId, TransactionDigest};

/// Suffix of the Move type of identity objects.
pub const IDENTITY_OBJECT_TYPE: &str = "::identity::Identity";

#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionResult {
    /// Submitted by the caller and paid from its own coins.
    Direct(DirectResult),
    /// Executed by a gas station on the caller's behalf.
    GasStation(GasStationResult),
}

#[derive(Debug, Clone, PartialEq)]
pub enum DirectResult {
    /// The node returned the identity it produced.
    TypedOutput {
        digest: TransactionDigest,
        identity: ObjectId,
    },
    /// The node returned the raw list of object changes.
    ObjectChanges {
        digest: TransactionDigest,
        changes: Vec<ObjectChange>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct GasStationResult {
    pub digest: TransactionDigest,
    pub created: Vec<CreatedObject>,
    pub mutated: Vec<ObjectId>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectChange {
    #[serde(rename = "type")]
    pub change_type: String,
    pub object_id: ObjectId,
    #[serde(default)]
    pub object_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreatedObject {
    pub object_id: ObjectId,
    pub shared: bool,
}

#[derive(Deserialize)]
struct TypedOutputShape {
    digest: TransactionDigest,
    output: TypedOutput,
}

#[derive(Deserialize)]
struct TypedOutput {
    identity: TypedIdentity,
}

#[derive(Deserialize)]
struct TypedIdentity {
    id: ObjectId,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectChangesShape {
    digest: TransactionDigest,
    object_changes: Vec<ObjectChange>,
}

#[derive(Deserialize)]
struct EffectsShape {
    effects: Effects,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Effects {
    transaction_digest: TransactionDigest,
    #[serde(default)]
    created: Vec<OwnedObjectRef>,
    #[serde(default)]
    mutated: Vec<OwnedObjectRef>,
}

#[derive(Deserialize)]
struct OwnedObjectRef {
    #[serde(default)]
    owner: Value,
    reference: ObjectRef,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectRef {
    object_id: ObjectId,
}

impl ExecutionResult {
    /// Decides the shape of a raw result.
    ///
    /// `gas_station_active` only feeds the diagnostics of an unrecognised shape.
    pub fn from_raw(raw: Value, gas_station_active: bool) -> Result<Self, Error> {
        let object = match raw.as_object() {
            Some(object) => object,
            None => {
                return Err(Error::UnexpectedExecutionResult {
                    keys: vec![],
                    gas_station: gas_station_active,
                })
            }
        };

        if object.contains_key("effects") {
            let shape: EffectsShape = serde_json::from_value(raw)?;
            return Ok(ExecutionResult::GasStation(GasStationResult {
                digest: shape.effects.transaction_digest,
                created: shape
                    .effects
                    .created
                    .into_iter()
                    .map(|created| CreatedObject {
                        shared: created.owner.get("Shared").is_some(),
                        object_id: created.reference.object_id,
                    })
                    .collect(),
                mutated: shape
                    .effects
                    .mutated
                    .into_iter()
                    .map(|mutated| mutated.reference.object_id)
                    .collect(),
            }));
        }

        if object.contains_key("output") {
            let shape: TypedOutputShape = serde_json::from_value(raw)?;
            return Ok(ExecutionResult::Direct(DirectResult::TypedOutput {
                digest: shape.digest,
                identity: shape.output.identity.id,
            }));
        }

        if object.contains_key("objectChanges") {
            let shape: ObjectChangesShape = serde_json::from_value(raw)?;
            return Ok(ExecutionResult::Direct(DirectResult::ObjectChanges {
                digest: shape.digest,
                changes: shape.object_changes,
            }));
        }

        let mut keys: Vec<String> = object.keys().cloned().collect();
        keys.sort();
        Err(Error::UnexpectedExecutionResult {
            keys,
            gas_station: gas_station_active,
        })
    }

    pub fn digest(&self) -> &TransactionDigest {
        match self {
            ExecutionResult::Direct(DirectResult::TypedOutput { digest, .. })
            | ExecutionResult::Direct(DirectResult::ObjectChanges { digest, .. })
            | ExecutionResult::GasStation(GasStationResult { digest, .. }) => digest,
        }
    }

    pub fn is_sponsored(&self) -> bool {
        matches!(self, ExecutionResult::GasStation(_))
    }

    /// The identity object created by the transaction, if any.
    pub fn created_identity(&self) -> Option<ObjectId> {
        match self {
            ExecutionResult::Direct(DirectResult::TypedOutput { identity, .. }) => Some(identity.clone()),
            ExecutionResult::Direct(DirectResult::ObjectChanges { changes, .. }) => changes
                .iter()
                .find(|change| {
                    change.change_type == "created"
                        && change
                            .object_type
                            .as_deref()
                            .is_some_and(|t| t.ends_with(IDENTITY_OBJECT_TYPE))
                })
                .map(|change| change.object_id.clone()),
            // Identities are the only shared objects created by these transactions.
            ExecutionResult::GasStation(result) => result
                .created
                .iter()
                .find(|created| created.shared)
                .map(|created| created.object_id.clone()),
        }
    }

    /// Whether the transaction created or modified `object_id`.
    pub fn touches(&self, object_id: &ObjectId) -> bool {
        match self {
            ExecutionResult::Direct(DirectResult::TypedOutput { identity, .. }) => identity == object_id,
            ExecutionResult::Direct(DirectResult::ObjectChanges { changes, .. }) => {
                changes.iter().any(|change| &change.object_id == object_id)
            }
            ExecutionResult::GasStation(result) => {
                result.created.iter().any(|created| &created.object_id == object_id)
                    || result.mutated.contains(object_id)
            }
        }
    }
}

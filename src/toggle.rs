// 🔁 Toggle Reconciler - like / follow membership flips
//
// Read the holder's relation list, add or remove the member, write the whole
// list back. The store does not merge lists server-side, so two concurrent
// toggles on the same holder can race and one change can be dropped if both
// reads land before either write. Accepted for this layer; the stronger
// alternative is one edge record per (actor, target) pair.
//
// Follow edges are stored on the follower's side only (`following`); the
// followed user's `followers` view is derived by the store and may lag.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{info, warn};

use crate::entities::item::fields as item_fields;
use crate::error::{BffError, BffResult};
use crate::repository::{Collection, RecordId, RecordRepository};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Relation {
    /// Actor likes an item; list lives on the item
    Like,
    /// Actor follows a user; list lives on the actor
    Follow,
}

/// Where a toggle reads and writes, and which id it flips
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub holder_collection: Collection,
    pub holder: RecordId,
    pub field: &'static str,
    pub member: RecordId,
}

impl Relation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Relation::Like => "like",
            Relation::Follow => "follow",
        }
    }

    pub fn edge(&self, actor: RecordId, target: RecordId) -> Edge {
        match self {
            Relation::Like => Edge {
                holder_collection: Collection::Items,
                holder: target,
                field: item_fields::LIKED_BY,
                member: actor,
            },
            Relation::Follow => Edge {
                holder_collection: Collection::Users,
                holder: actor,
                field: "following",
                member: target,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleOutcome {
    pub is_active: bool,
    /// Size of the relation list as written
    pub member_count: usize,
}

/// Flip `member` in `current`; returns the new list and whether it is now present
pub fn flip_membership(current: &[RecordId], member: RecordId) -> (Vec<RecordId>, bool) {
    if current.contains(&member) {
        let next = current.iter().copied().filter(|id| *id != member).collect();
        (next, false)
    } else {
        let mut next = current.to_vec();
        next.push(member);
        (next, true)
    }
}

pub struct ToggleReconciler {
    repo: Arc<dyn RecordRepository>,
}

impl ToggleReconciler {
    pub fn new(repo: Arc<dyn RecordRepository>) -> Self {
        ToggleReconciler { repo }
    }

    pub async fn toggle(
        &self,
        actor: RecordId,
        target: RecordId,
        relation: Relation,
    ) -> BffResult<ToggleOutcome> {
        if relation == Relation::Follow {
            if actor == target {
                return Err(BffError::invalid_argument("you cannot follow yourself"));
            }
            self.repo
                .get(Collection::Users, target)
                .await
                .map_err(|e| e.during("follow target lookup"))?
                .ok_or_else(|| BffError::not_found(format!("user {}", target)))?;
        }

        let edge = relation.edge(actor, target);
        let operation = format!("toggle {}", relation.as_str());

        let holder = self
            .repo
            .get(edge.holder_collection, edge.holder)
            .await
            .map_err(|e| e.during(&operation))?
            .ok_or_else(|| {
                BffError::not_found(format!("{} {}", edge.holder_collection.path(), edge.holder))
            })?;

        let current = holder.relation_ids(edge.field);
        let (next, is_active) = flip_membership(&current, edge.member);

        let mut fields = Map::new();
        fields.insert(
            edge.field.to_string(),
            Value::Array(next.iter().map(|id| Value::from(id.0)).collect()),
        );
        self.repo
            .update(edge.holder_collection, edge.holder, fields)
            .await
            .map_err(|e| e.during(&operation))?;

        info!(
            relation = relation.as_str(),
            actor = %actor,
            target = %target,
            is_active,
            "toggled relation"
        );

        Ok(ToggleOutcome {
            is_active,
            member_count: next.len(),
        })
    }

    /// Advisory read: any upstream failure degrades to "not active"
    pub async fn is_active(&self, actor: RecordId, target: RecordId, relation: Relation) -> bool {
        let edge = relation.edge(actor, target);
        match self.repo.get(edge.holder_collection, edge.holder).await {
            Ok(Some(holder)) => holder.relation_ids(edge.field).contains(&edge.member),
            Ok(None) => false,
            Err(e) => {
                warn!(relation = relation.as_str(), error = %e, "relation status lookup failed");
                false
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

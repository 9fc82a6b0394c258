//! Follow edge
//!
//! A follow edge is directed: it goes FROM the follower TO the target.

use super::types::EntityId;
use serde::{Deserialize, Serialize};

/// A directed follow relationship
///
/// Edges have:
/// - A follower (the edge goes FROM this entity)
/// - A target (the edge goes TO this entity)
/// - Creation timestamp
///
/// The `(follower, target)` pair is the identity of the edge; there is no
/// separate edge id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowEdge {
    /// Entity that follows
    pub follower: EntityId,

    /// Entity being followed
    pub target: EntityId,

    /// Creation timestamp (Unix milliseconds)
    pub created_at: i64,
}

impl FollowEdge {
    /// Create a new edge stamped with the current time
    pub fn new(follower: EntityId, target: EntityId) -> Self {
        FollowEdge {
            follower,
            target,
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Check if this edge goes FROM a specific entity
    pub fn starts_from(&self, entity: EntityId) -> bool {
        self.follower == entity
    }

    /// Check if this edge goes TO a specific entity
    pub fn ends_at(&self, entity: EntityId) -> bool {
        self.target == entity
    }

    /// Check if the entity participates on either side
    pub fn touches(&self, entity: EntityId) -> bool {
        self.starts_from(entity) || self.ends_at(entity)
    }
}

impl PartialEq for FollowEdge {
    fn eq(&self, other: &Self) -> bool {
        self.follower == other.follower && self.target == other.target
    }
}

impl Eq for FollowEdge {}

impl std::hash::Hash for FollowEdge {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.follower.hash(state);
        self.target.hash(state);
    }
}

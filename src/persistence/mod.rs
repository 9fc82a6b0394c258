//! Persistence layer for the follow graph
//!
//! An `EdgeIndex` is the durable home of one relation. It owns the
//! uniqueness of `(follower, target)` and keeps the forward and reverse
//! adjacency in step; the store above it only validates input.
//!
//! - `MemoryEdgeIndex`: process-local, for tests and ephemeral graphs
//! - `RocksEdgeIndex`: RocksDB transaction database

pub mod memory;
pub mod storage;

pub use memory::MemoryEdgeIndex;
pub use storage::{PersistentStorage, RocksEdgeIndex, StorageError, StorageOptions, StorageResult};

use crate::graph::{EntityId, FollowEdge};
use std::sync::Arc;

/// Which adjacency lists of an entity a purge clears
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurgeScope {
    /// Edges where the entity is the follower
    Outgoing,
    /// Edges where the entity is the target
    Incoming,
    Both,
}

impl PurgeScope {
    pub fn outgoing(&self) -> bool {
        matches!(self, PurgeScope::Outgoing | PurgeScope::Both)
    }

    pub fn incoming(&self) -> bool {
        matches!(self, PurgeScope::Incoming | PurgeScope::Both)
    }
}

/// Durable index of directed edges for one relation.
///
/// Every method is atomic with respect to the edges it touches.
pub trait EdgeIndex: Send + Sync {
    /// Name of the relation this index stores
    fn relation(&self) -> &str;

    /// Insert an edge unless the pair already exists.
    ///
    /// Returns `false` when the pair was already present. The check and the
    /// insert happen as one atomic step.
    fn insert(&self, edge: &FollowEdge) -> StorageResult<bool>;

    /// Delete an edge; returns whether it existed
    fn remove(&self, follower: EntityId, target: EntityId) -> StorageResult<bool>;

    fn contains(&self, follower: EntityId, target: EntityId) -> StorageResult<bool>;

    fn get(&self, follower: EntityId, target: EntityId) -> StorageResult<Option<FollowEdge>>;

    /// Targets followed by `follower`
    fn targets_of(&self, follower: EntityId) -> StorageResult<Vec<EntityId>>;

    /// Entities following `target`
    fn followers_of(&self, target: EntityId) -> StorageResult<Vec<EntityId>>;

    /// Delete the entity's edges selected by `scope`; returns the count
    fn purge(&self, entity: EntityId, scope: PurgeScope) -> StorageResult<usize>;
}

impl<T: EdgeIndex + ?Sized> EdgeIndex for Arc<T> {
    fn relation(&self) -> &str {
        (**self).relation()
    }

    fn insert(&self, edge: &FollowEdge) -> StorageResult<bool> {
        (**self).insert(edge)
    }

    fn remove(&self, follower: EntityId, target: EntityId) -> StorageResult<bool> {
        (**self).remove(follower, target)
    }

    fn contains(&self, follower: EntityId, target: EntityId) -> StorageResult<bool> {
        (**self).contains(follower, target)
    }

    fn get(&self, follower: EntityId, target: EntityId) -> StorageResult<Option<FollowEdge>> {
        (**self).get(follower, target)
    }

    fn targets_of(&self, follower: EntityId) -> StorageResult<Vec<EntityId>> {
        (**self).targets_of(follower)
    }

    fn followers_of(&self, target: EntityId) -> StorageResult<Vec<EntityId>> {
        (**self).followers_of(target)
    }

    fn purge(&self, entity: EntityId, scope: PurgeScope) -> StorageResult<usize> {
        (**self).purge(entity, scope)
    }
}

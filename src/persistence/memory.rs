//! In-memory edge index
//!
//! Uses hash maps for O(1) lookup:
//! - outgoing: follower -> (target -> created_at)
//! - incoming: target -> followers
//!
//! Both directions live behind one `RwLock`, so a writer updates them
//! together and readers never see half an edge. Insertion order of each
//! adjacency list is preserved.

use super::storage::{StorageError, StorageResult};
use super::{EdgeIndex, PurgeScope};
use crate::graph::{EntityId, FollowEdge};
use indexmap::{IndexMap, IndexSet};
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Default)]
struct Adjacency {
    outgoing: HashMap<EntityId, IndexMap<EntityId, i64>>,
    incoming: HashMap<EntityId, IndexSet<EntityId>>,
}

impl Adjacency {
    fn unlink(&mut self, follower: EntityId, target: EntityId) -> bool {
        let removed = match self.outgoing.get_mut(&follower) {
            Some(targets) => {
                let removed = targets.shift_remove(&target).is_some();
                if targets.is_empty() {
                    self.outgoing.remove(&follower);
                }
                removed
            }
            None => false,
        };

        if removed {
            if let Some(followers) = self.incoming.get_mut(&target) {
                followers.shift_remove(&follower);
                if followers.is_empty() {
                    self.incoming.remove(&target);
                }
            }
        }

        removed
    }
}

/// Process-local edge index for one relation
#[derive(Debug)]
pub struct MemoryEdgeIndex {
    relation: String,
    inner: RwLock<Adjacency>,
}

impl MemoryEdgeIndex {
    pub fn new(relation: impl Into<String>) -> Self {
        Self {
            relation: relation.into(),
            inner: RwLock::new(Adjacency::default()),
        }
    }

    fn read(&self) -> StorageResult<RwLockReadGuard<'_, Adjacency>> {
        self.inner.read().map_err(|_| StorageError::LockPoisoned)
    }

    fn write(&self) -> StorageResult<RwLockWriteGuard<'_, Adjacency>> {
        self.inner.write().map_err(|_| StorageError::LockPoisoned)
    }

    /// Number of edges in the relation
    pub fn edge_count(&self) -> StorageResult<usize> {
        Ok(self.read()?.outgoing.values().map(|targets| targets.len()).sum())
    }
}

impl EdgeIndex for MemoryEdgeIndex {
    fn relation(&self) -> &str {
        &self.relation
    }

    fn insert(&self, edge: &FollowEdge) -> StorageResult<bool> {
        let mut adj = self.write()?;

        let targets = adj.outgoing.entry(edge.follower).or_default();
        if targets.contains_key(&edge.target) {
            return Ok(false);
        }
        targets.insert(edge.target, edge.created_at);
        adj.incoming
            .entry(edge.target)
            .or_default()
            .insert(edge.follower);

        Ok(true)
    }

    fn remove(&self, follower: EntityId, target: EntityId) -> StorageResult<bool> {
        Ok(self.write()?.unlink(follower, target))
    }

    fn contains(&self, follower: EntityId, target: EntityId) -> StorageResult<bool> {
        Ok(self
            .read()?
            .outgoing
            .get(&follower)
            .map_or(false, |targets| targets.contains_key(&target)))
    }

    fn get(&self, follower: EntityId, target: EntityId) -> StorageResult<Option<FollowEdge>> {
        Ok(self
            .read()?
            .outgoing
            .get(&follower)
            .and_then(|targets| targets.get(&target))
            .map(|&created_at| FollowEdge {
                follower,
                target,
                created_at,
            }))
    }

    fn targets_of(&self, follower: EntityId) -> StorageResult<Vec<EntityId>> {
        Ok(self
            .read()?
            .outgoing
            .get(&follower)
            .map(|targets| targets.keys().copied().collect())
            .unwrap_or_default())
    }

    fn followers_of(&self, target: EntityId) -> StorageResult<Vec<EntityId>> {
        Ok(self
            .read()?
            .incoming
            .get(&target)
            .map(|followers| followers.iter().copied().collect())
            .unwrap_or_default())
    }

    fn purge(&self, entity: EntityId, scope: PurgeScope) -> StorageResult<usize> {
        let mut adj = self.write()?;

        let targets: Vec<EntityId> = match adj.outgoing.get(&entity) {
            Some(targets) if scope.outgoing() => targets.keys().copied().collect(),
            _ => Vec::new(),
        };
        let followers: Vec<EntityId> = match adj.incoming.get(&entity) {
            Some(followers) if scope.incoming() => followers.iter().copied().collect(),
            _ => Vec::new(),
        };

        let mut removed = 0;
        for target in targets {
            if adj.unlink(entity, target) {
                removed += 1;
            }
        }
        for follower in followers {
            if adj.unlink(follower, entity) {
                removed += 1;
            }
        }

        Ok(removed)
    }
}

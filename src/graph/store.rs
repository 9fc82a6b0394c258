//! Follow graph store
//!
//! `FollowGraphStore` validates entity identities and hands the edge work to
//! an `EdgeIndex`. Uniqueness lives in the index, so this layer never does a
//! read-then-write on its own.

use super::edge::FollowEdge;
use super::kind::{TagTarget, TargetKind, UserTarget, FOLLOWER_KIND};
use super::types::{EntityId, EntityKind, EntityRef};
use crate::persistence::{EdgeIndex, MemoryEdgeIndex, PurgeScope, StorageError};
use std::fmt;
use std::marker::PhantomData;
use thiserror::Error;
use tracing::{debug, warn};

/// Which side of an edge an argument is on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Follower,
    Target,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Follower => write!(f, "follower"),
            Role::Target => write!(f, "target"),
        }
    }
}

/// Errors that can occur during follow graph operations
#[derive(Error, Debug)]
pub enum FollowError {
    #[error("Invalid {role}: {reason}")]
    InvalidEntity { role: Role, reason: String },

    #[error("Entity {0} cannot follow or unfollow itself")]
    SelfReference(EntityId),

    #[error("{follower} already follows {target}")]
    DuplicateEdge { follower: EntityId, target: EntityId },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl FollowError {
    /// Only storage failures may be retried without changing the input
    pub fn is_retryable(&self) -> bool {
        matches!(self, FollowError::Storage(_))
    }
}

pub type FollowResult<T> = Result<T, FollowError>;

/// Edge store for one target kind
pub struct FollowGraphStore<K: TargetKind, I: EdgeIndex = MemoryEdgeIndex> {
    index: I,
    _kind: PhantomData<fn() -> K>,
}

/// Users following users
pub type UserFollowStore<I = MemoryEdgeIndex> = FollowGraphStore<UserTarget, I>;

/// Users following tags
pub type TagFollowStore<I = MemoryEdgeIndex> = FollowGraphStore<TagTarget, I>;

impl<K: TargetKind> FollowGraphStore<K, MemoryEdgeIndex> {
    /// Create an empty in-memory store
    pub fn in_memory() -> Self {
        Self::new(MemoryEdgeIndex::new(K::RELATION))
    }
}

impl<K: TargetKind> Default for FollowGraphStore<K, MemoryEdgeIndex> {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl<K: TargetKind, I: EdgeIndex> FollowGraphStore<K, I> {
    pub fn new(index: I) -> Self {
        FollowGraphStore {
            index,
            _kind: PhantomData,
        }
    }

    /// Underlying index
    pub fn index(&self) -> &I {
        &self.index
    }

    /// Name of the persisted relation
    pub fn relation(&self) -> &'static str {
        K::RELATION
    }

    /// Make `follower` follow `target`.
    ///
    /// Fails with `DuplicateEdge` if the edge already exists; use
    /// [`ensure_edge`](Self::ensure_edge) for "follow if not already".
    pub fn add_edge(
        &self,
        follower: impl Into<Option<EntityRef>>,
        target: impl Into<Option<EntityRef>>,
    ) -> FollowResult<()> {
        let (follower, target) = self.resolve_pair(follower.into(), target.into())?;

        let edge = FollowEdge::new(follower, target);
        if !self.index.insert(&edge)? {
            debug!("{}: duplicate edge {} -> {}", K::RELATION, follower, target);
            return Err(FollowError::DuplicateEdge { follower, target });
        }

        debug!("{}: added edge {} -> {}", K::RELATION, follower, target);
        Ok(())
    }

    /// Follow unless already following; returns whether an edge was created
    pub fn ensure_edge(
        &self,
        follower: impl Into<Option<EntityRef>>,
        target: impl Into<Option<EntityRef>>,
    ) -> FollowResult<bool> {
        match self.add_edge(follower, target) {
            Ok(()) => Ok(true),
            Err(FollowError::DuplicateEdge { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Remove the edge if present; absent edges are not an error.
    pub fn remove_edge(
        &self,
        follower: impl Into<Option<EntityRef>>,
        target: impl Into<Option<EntityRef>>,
    ) -> FollowResult<()> {
        let (follower, target) = self.resolve_pair(follower.into(), target.into())?;

        if self.index.remove(follower, target)? {
            debug!("{}: removed edge {} -> {}", K::RELATION, follower, target);
        }
        Ok(())
    }

    /// Whether `follower` follows `target`
    pub fn is_edge(
        &self,
        follower: impl Into<Option<EntityRef>>,
        target: impl Into<Option<EntityRef>>,
    ) -> FollowResult<bool> {
        let follower = resolve(follower.into(), FOLLOWER_KIND, Role::Follower)?;
        let target = resolve(target.into(), K::KIND, Role::Target)?;
        Ok(self.index.contains(follower, target)?)
    }

    /// The stored edge, with its creation time
    pub fn get_edge(
        &self,
        follower: impl Into<Option<EntityRef>>,
        target: impl Into<Option<EntityRef>>,
    ) -> FollowResult<Option<FollowEdge>> {
        let follower = resolve(follower.into(), FOLLOWER_KIND, Role::Follower)?;
        let target = resolve(target.into(), K::KIND, Role::Target)?;
        Ok(self.index.get(follower, target)?)
    }

    /// Entities following `target`
    pub fn list_followers(&self, target: impl Into<Option<EntityRef>>) -> FollowResult<Vec<EntityId>> {
        let target = resolve(target.into(), K::KIND, Role::Target)?;
        Ok(self.index.followers_of(target)?)
    }

    /// Targets followed by `follower`
    pub fn list_following(&self, follower: impl Into<Option<EntityRef>>) -> FollowResult<Vec<EntityId>> {
        let follower = resolve(follower.into(), FOLLOWER_KIND, Role::Follower)?;
        Ok(self.index.targets_of(follower)?)
    }

    pub fn follower_count(&self, target: impl Into<Option<EntityRef>>) -> FollowResult<usize> {
        Ok(self.list_followers(target)?.len())
    }

    pub fn following_count(&self, follower: impl Into<Option<EntityRef>>) -> FollowResult<usize> {
        Ok(self.list_following(follower)?.len())
    }

    /// Drop every edge the entity takes part in.
    ///
    /// Called by the owner of the entity when it is deleted. A user is
    /// purged on the follower side, and on the target side too when this
    /// relation follows users; a tag only on the target side.
    pub fn remove_entity(&self, entity: impl Into<Option<EntityRef>>) -> FollowResult<usize> {
        let entity = entity
            .into()
            .ok_or_else(|| invalid(Role::Follower, "entity is absent".to_string()))?;
        let as_follower = entity.kind == FOLLOWER_KIND;
        let as_target = entity.kind == K::KIND;
        let scope = match (as_follower, as_target) {
            (true, true) => PurgeScope::Both,
            (true, false) => PurgeScope::Outgoing,
            (false, true) => PurgeScope::Incoming,
            (false, false) => {
                return Err(invalid(
                    Role::Follower,
                    format!("{} does not take part in {}", entity, K::RELATION),
                ))
            }
        };
        if entity.id.is_nil() {
            return Err(invalid(Role::Follower, "entity id is nil".to_string()));
        }

        let removed = self.index.purge(entity.id, scope)?;
        debug!("{}: removed {} edges of {}", K::RELATION, removed, entity);
        Ok(removed)
    }

    fn resolve_pair(
        &self,
        follower: Option<EntityRef>,
        target: Option<EntityRef>,
    ) -> FollowResult<(EntityId, EntityId)> {
        let follower_id = resolve(follower, FOLLOWER_KIND, Role::Follower)?;
        let target_id = resolve(target, K::KIND, Role::Target)?;

        // Only reachable when the target kind is also a user
        if follower == target {
            warn!("{}: rejected self reference on {}", K::RELATION, follower_id);
            return Err(FollowError::SelfReference(follower_id));
        }

        Ok((follower_id, target_id))
    }
}

fn invalid(role: Role, reason: String) -> FollowError {
    warn!("rejected {}: {}", role, reason);
    FollowError::InvalidEntity { role, reason }
}

/// Check an argument is present, non-nil and of the expected kind
fn resolve(entity: Option<EntityRef>, expected: EntityKind, role: Role) -> FollowResult<EntityId> {
    let entity = entity.ok_or_else(|| invalid(role, format!("{} is absent", role)))?;

    if entity.kind != expected {
        return Err(invalid(
            role,
            format!("expected a {} but got {}", expected, entity),
        ));
    }
    if entity.id.is_nil() {
        return Err(invalid(role, format!("{} id is nil", role)));
    }

    Ok(entity.id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::StorageResult;

    fn user() -> EntityRef {
        EntityRef::user(EntityId::random())
    }

    fn tag() -> EntityRef {
        EntityRef::tag(EntityId::random())
    }

    #[test]
    fn test_add_and_check_direction() {
        let store = UserFollowStore::in_memory();
        let a = user();
        let b = user();

        store.add_edge(a, b).unwrap();
        assert!(store.is_edge(a, b).unwrap());
        assert!(!store.is_edge(b, a).unwrap());
    }

    #[test]
    fn test_self_reference() {
        let store = UserFollowStore::in_memory();
        let a = user();

        assert!(matches!(store.add_edge(a, a), Err(FollowError::SelfReference(id)) if id == a.id));
        assert!(matches!(store.remove_edge(a, a), Err(FollowError::SelfReference(_))));
        assert!(store.list_following(a).unwrap().is_empty());
    }

    #[test]
    fn test_duplicate_edge() {
        let store = UserFollowStore::in_memory();
        let a = user();
        let b = user();

        store.add_edge(a, b).unwrap();
        let err = store.add_edge(a, b).unwrap_err();
        assert!(matches!(err, FollowError::DuplicateEdge { .. }));
        assert!(!err.is_retryable());
        assert_eq!(store.list_followers(b).unwrap(), vec![a.id]);
    }

    #[test]
    fn test_ensure_edge() {
        let store = TagFollowStore::in_memory();
        let a = user();
        let t = tag();

        assert!(store.ensure_edge(a, t).unwrap());
        assert!(!store.ensure_edge(a, t).unwrap());
        assert_eq!(store.follower_count(t).unwrap(), 1);
    }

    #[test]
    fn test_idempotent_remove() {
        let store = UserFollowStore::in_memory();
        let a = user();
        let b = user();

        store.remove_edge(a, b).unwrap();
        store.remove_edge(a, b).unwrap();

        store.add_edge(a, b).unwrap();
        store.remove_edge(a, b).unwrap();
        store.remove_edge(a, b).unwrap();
        assert!(!store.is_edge(a, b).unwrap());
    }

    #[test]
    fn test_absent_arguments() {
        let store = UserFollowStore::in_memory();
        let a = user();

        assert!(matches!(
            store.add_edge(None, a),
            Err(FollowError::InvalidEntity { role: Role::Follower, .. })
        ));
        assert!(matches!(
            store.add_edge(a, None),
            Err(FollowError::InvalidEntity { role: Role::Target, .. })
        ));
        assert!(matches!(store.remove_edge(None, None), Err(FollowError::InvalidEntity { .. })));
        assert!(matches!(store.is_edge(a, None), Err(FollowError::InvalidEntity { .. })));
        assert!(matches!(store.list_followers(None), Err(FollowError::InvalidEntity { .. })));
        assert!(matches!(store.list_following(None), Err(FollowError::InvalidEntity { .. })));
    }

    #[test]
    fn test_nil_identifier() {
        let store = UserFollowStore::in_memory();
        let nil = EntityRef::user(EntityId::nil());

        assert!(matches!(store.add_edge(nil, user()), Err(FollowError::InvalidEntity { .. })));
        assert!(matches!(store.list_followers(nil), Err(FollowError::InvalidEntity { .. })));
        // Two nil ids are invalid, not a self reference
        assert!(matches!(store.remove_edge(nil, nil), Err(FollowError::InvalidEntity { .. })));
    }

    #[test]
    fn test_wrong_kind() {
        let users = UserFollowStore::in_memory();
        let tags = TagFollowStore::in_memory();
        let a = user();
        let t = tag();

        assert!(matches!(users.add_edge(a, t), Err(FollowError::InvalidEntity { role: Role::Target, .. })));
        assert!(matches!(tags.add_edge(t, a), Err(FollowError::InvalidEntity { role: Role::Follower, .. })));
        assert!(matches!(tags.list_followers(a), Err(FollowError::InvalidEntity { .. })));
        assert!(matches!(tags.list_following(t), Err(FollowError::InvalidEntity { .. })));
    }

    #[test]
    fn test_tag_with_same_uuid_is_not_self() {
        let store = TagFollowStore::in_memory();
        let id = EntityId::random();

        store.add_edge(EntityRef::user(id), EntityRef::tag(id)).unwrap();
        assert!(store.is_edge(EntityRef::user(id), EntityRef::tag(id)).unwrap());
    }

    #[test]
    fn test_get_edge() {
        let store = UserFollowStore::in_memory();
        let a = user();
        let b = user();

        assert!(store.get_edge(a, b).unwrap().is_none());
        store.add_edge(a, b).unwrap();
        let edge = store.get_edge(a, b).unwrap().unwrap();
        assert!(edge.starts_from(a.id));
        assert!(edge.ends_at(b.id));
    }

    #[test]
    fn test_remove_entity() {
        let store = UserFollowStore::in_memory();
        let a = user();
        let b = user();
        let c = user();
        store.add_edge(a, b).unwrap();
        store.add_edge(c, a).unwrap();
        store.add_edge(b, c).unwrap();

        assert_eq!(store.remove_entity(a).unwrap(), 2);
        assert!(store.list_following(a).unwrap().is_empty());
        assert!(store.list_followers(a).unwrap().is_empty());
        assert!(store.is_edge(b, c).unwrap());

        assert!(matches!(store.remove_entity(tag()), Err(FollowError::InvalidEntity { .. })));
        assert!(matches!(store.remove_entity(None), Err(FollowError::InvalidEntity { .. })));
    }

    /// Index whose every call fails the way a contended RocksDB row does
    struct UnavailableIndex;

    impl UnavailableIndex {
        fn fail<T>(&self) -> StorageResult<T> {
            Err(StorageError::LockTimeout("row lock wait expired".to_string()))
        }
    }

    impl EdgeIndex for UnavailableIndex {
        fn relation(&self) -> &str {
            UserTarget::RELATION
        }

        fn insert(&self, _edge: &FollowEdge) -> StorageResult<bool> {
            self.fail()
        }

        fn remove(&self, _follower: EntityId, _target: EntityId) -> StorageResult<bool> {
            self.fail()
        }

        fn contains(&self, _follower: EntityId, _target: EntityId) -> StorageResult<bool> {
            self.fail()
        }

        fn get(&self, _follower: EntityId, _target: EntityId) -> StorageResult<Option<FollowEdge>> {
            self.fail()
        }

        fn targets_of(&self, _follower: EntityId) -> StorageResult<Vec<EntityId>> {
            self.fail()
        }

        fn followers_of(&self, _target: EntityId) -> StorageResult<Vec<EntityId>> {
            self.fail()
        }

        fn purge(&self, _entity: EntityId, _scope: PurgeScope) -> StorageResult<usize> {
            self.fail()
        }
    }

    fn assert_storage<T: fmt::Debug>(result: FollowResult<T>) {
        match result {
            Err(err @ FollowError::Storage(StorageError::LockTimeout(_))) => {
                assert!(err.is_retryable())
            }
            other => panic!("expected a storage error, got {:?}", other),
        }
    }

    #[test]
    fn test_storage_failures_surface_as_storage() {
        let store = UserFollowStore::new(UnavailableIndex);
        let a = user();
        let b = user();

        assert_storage(store.add_edge(a, b));
        assert_storage(store.ensure_edge(a, b));
        assert_storage(store.remove_edge(a, b));
        assert_storage(store.is_edge(a, b));
        assert_storage(store.get_edge(a, b));
        assert_storage(store.list_followers(b));
        assert_storage(store.list_following(a));
        assert_storage(store.remove_entity(a));

        // Input errors are still caught before the index is reached
        let err = store.add_edge(a, a).unwrap_err();
        assert!(matches!(err, FollowError::SelfReference(_)));
        assert!(!err.is_retryable());
        let err = store.add_edge(None, b).unwrap_err();
        assert!(matches!(err, FollowError::InvalidEntity { .. }));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_relation_names() {
        assert_eq!(UserFollowStore::in_memory().relation(), "user_follow");
        assert_eq!(TagFollowStore::in_memory().index().relation(), "tag_follow");
    }
}

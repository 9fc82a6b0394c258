//! Both follow relations behind one handle
//!
//! `FollowGraph` owns the `user_follow` and `tag_follow` stores, opens them
//! from configuration, and cascades entity deletion across both.

use super::kind::{TagTarget, TargetKind, UserTarget, RELATIONS};
use super::store::{FollowResult, TagFollowStore, UserFollowStore};
use super::types::{EntityId, EntityRef};
use crate::config::FollowGraphConfig;
use crate::persistence::{EdgeIndex, MemoryEdgeIndex, PersistentStorage, StorageError};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Index handle shared by both backends
pub type SharedIndex = Arc<dyn EdgeIndex>;

/// The social follow graph
pub struct FollowGraph {
    users: UserFollowStore<SharedIndex>,
    tags: TagFollowStore<SharedIndex>,
    data_path: Option<PathBuf>,
}

impl FollowGraph {
    /// Open the graph described by `config`: RocksDB when a data path is
    /// set, in-memory otherwise.
    pub fn open(config: &FollowGraphConfig) -> FollowResult<Self> {
        match &config.data_path {
            Some(path) => Self::open_persistent(path, config),
            None => Ok(Self::in_memory()),
        }
    }

    /// Fresh in-memory graph
    pub fn in_memory() -> Self {
        info!("Follow graph running in memory");
        let users: SharedIndex = Arc::new(MemoryEdgeIndex::new(UserTarget::RELATION));
        let tags: SharedIndex = Arc::new(MemoryEdgeIndex::new(TagTarget::RELATION));
        Self {
            users: UserFollowStore::new(users),
            tags: TagFollowStore::new(tags),
            data_path: None,
        }
    }

    fn open_persistent(path: &Path, config: &FollowGraphConfig) -> FollowResult<Self> {
        std::fs::create_dir_all(path).map_err(StorageError::from)?;

        let storage = PersistentStorage::open(path, &RELATIONS, &config.storage_options())?;
        let users: SharedIndex = Arc::new(storage.relation(UserTarget::RELATION)?);
        let tags: SharedIndex = Arc::new(storage.relation(TagTarget::RELATION)?);

        info!("Follow graph opened at {}", path.display());

        Ok(Self {
            users: UserFollowStore::new(users),
            tags: TagFollowStore::new(tags),
            data_path: Some(path.to_path_buf()),
        })
    }

    /// Users following users
    pub fn users(&self) -> &UserFollowStore<SharedIndex> {
        &self.users
    }

    /// Users following tags
    pub fn tags(&self) -> &TagFollowStore<SharedIndex> {
        &self.tags
    }

    pub fn data_path(&self) -> Option<&Path> {
        self.data_path.as_deref()
    }

    pub fn is_persistent(&self) -> bool {
        self.data_path.is_some()
    }

    /// Cascade for a deleted user: its follows and followers in
    /// `user_follow`, and its tag follows in `tag_follow`.
    ///
    /// The two relations are purged one after the other, not atomically. If
    /// the `tag_follow` purge fails, the `user_follow` edges stay removed;
    /// calling again finishes the cascade.
    pub fn remove_user(&self, id: EntityId) -> FollowResult<usize> {
        let user = EntityRef::user(id);
        let from_users = self.users.remove_entity(user)?;
        let from_tags = self.tags.remove_entity(user).map_err(|e| {
            warn!(
                "Cascade for user {} stopped after removing {} {} edges: {}",
                id,
                from_users,
                UserTarget::RELATION,
                e
            );
            e
        })?;

        let removed = from_users + from_tags;
        info!("Removed {} edges of deleted user {}", removed, id);
        Ok(removed)
    }

    /// Cascade for a deleted tag
    pub fn remove_tag(&self, id: EntityId) -> FollowResult<usize> {
        let removed = self.tags.remove_entity(EntityRef::tag(id))?;
        info!("Removed {} edges of deleted tag {}", removed, id);
        Ok(removed)
    }
}

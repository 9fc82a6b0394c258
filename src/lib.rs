//! Followgraph
//!
//! The directed follow graph of a social publishing backend: users follow
//! users (`user_follow`) and users follow tags (`tag_follow`).
//!
//! # Guarantees
//!
//! - No entity follows itself
//! - At most one edge per ordered `(follower, target)` pair, enforced by the
//!   index even under concurrent writers
//! - Edges are directed
//! - Removing an absent edge is a no-op
//!
//! # Storage
//!
//! Each relation lives in an `EdgeIndex`: either an in-memory adjacency map
//! or a RocksDB transaction database with forward and reverse column
//! families.
//!
//! ## Example Usage
//!
//! ```rust
//! use followgraph::graph::{EntityId, EntityRef, FollowError, UserFollowStore};
//!
//! let store = UserFollowStore::in_memory();
//!
//! let alice = EntityRef::user(EntityId::random());
//! let bob = EntityRef::user(EntityId::random());
//!
//! store.add_edge(alice, bob).unwrap();
//! assert!(store.is_edge(alice, bob).unwrap());
//! assert!(!store.is_edge(bob, alice).unwrap());
//!
//! // A second follow is surfaced, not ignored
//! assert!(matches!(store.add_edge(alice, bob), Err(FollowError::DuplicateEdge { .. })));
//!
//! assert_eq!(store.list_followers(bob).unwrap(), vec![alice.id]);
//! ```

#![warn(clippy::all)]

pub mod config;
pub mod graph;
pub mod persistence;

// Re-export main types for convenience
pub use config::{ConfigError, ConfigResult, FollowGraphConfig};

pub use graph::{
    EntityId, EntityKind, EntityRef, FollowEdge, FollowError, FollowGraph, FollowGraphStore,
    FollowResult, TagFollowStore, TagTarget, TargetKind, UserFollowStore, UserTarget,
};

pub use persistence::{
    EdgeIndex, MemoryEdgeIndex, PersistentStorage, PurgeScope, RocksEdgeIndex, StorageError,
    StorageOptions, StorageResult,
};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get version string
pub fn version() -> &'static str {
    VERSION
}

//! Directed follow graph
//!
//! This module implements the follow relationships of the social backend:
//! - Users following users (`user_follow`)
//! - Users following tags (`tag_follow`)
//! - No self edges, at most one edge per ordered pair
//! - Forward (following) and reverse (followers) traversal

pub mod edge;
pub mod follow_graph;
pub mod kind;
pub mod store;
pub mod types;

// Re-export main types
pub use edge::FollowEdge;
pub use follow_graph::FollowGraph;
pub use kind::{TagTarget, TargetKind, UserTarget, FOLLOWER_KIND, RELATIONS};
pub use store::{FollowError, FollowGraphStore, FollowResult, Role, TagFollowStore, UserFollowStore};
pub use types::{EntityId, EntityKind, EntityRef};

//! Target kinds of the follow graph
//!
//! The same edge store backs both `user_follow` (user -> user) and
//! `tag_follow` (user -> tag). A `TargetKind` marker selects the relation
//! name and the entity kind accepted on the target side.

use super::types::EntityKind;

/// Marker trait selecting one instantiation of the follow graph
pub trait TargetKind: Send + Sync + 'static {
    /// Kind of entity that may be followed
    const KIND: EntityKind;

    /// Name of the persisted relation
    const RELATION: &'static str;
}

/// Users following users
#[derive(Debug, Clone, Copy)]
pub enum UserTarget {}

impl TargetKind for UserTarget {
    const KIND: EntityKind = EntityKind::User;
    const RELATION: &'static str = "user_follow";
}

/// Users following tags
#[derive(Debug, Clone, Copy)]
pub enum TagTarget {}

impl TargetKind for TagTarget {
    const KIND: EntityKind = EntityKind::Tag;
    const RELATION: &'static str = "tag_follow";
}

/// Kind of entity on the follower side; always a user.
pub const FOLLOWER_KIND: EntityKind = EntityKind::User;

/// Every relation the persistent storage must provision
pub const RELATIONS: [&str; 2] = [UserTarget::RELATION, TagTarget::RELATION];

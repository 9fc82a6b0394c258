//! RocksDB storage layer implementation
//!
//! Each relation is stored in two column families:
//! - `<relation>`: key `follower ‖ target`, value = serialized `StoredEdge`
//! - `<relation>_rev`: key `target ‖ follower`, empty value
//!
//! The database is opened as a pessimistic `TransactionDB`. Writers lock the
//! forward key with `get_for_update` before inserting, which makes the
//! forward key a unique index: two concurrent inserts of the same pair
//! serialize on the lock and the second one observes the committed row.

use super::{EdgeIndex, PurgeScope};
use crate::graph::{EntityId, FollowEdge};
use rocksdb::{
    ColumnFamily, ColumnFamilyDescriptor, Direction, ErrorKind, IteratorMode, Options,
    Transaction, TransactionDB, TransactionDBOptions, TransactionOptions, WriteOptions,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

/// Storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    /// RocksDB error
    #[error("RocksDB error: {0}")]
    RocksDb(rocksdb::Error),

    /// Row lock could not be acquired in time
    #[error("Lock timeout: {0}")]
    LockTimeout(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Stored key does not decode into an entity pair
    #[error("Corrupt key in {relation}: {len} bytes")]
    CorruptKey { relation: String, len: usize },

    /// Column family error
    #[error("Column family error: {0}")]
    ColumnFamily(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// In-memory index lock poisoned by a panicking writer
    #[error("Index lock poisoned")]
    LockPoisoned,
}

impl From<rocksdb::Error> for StorageError {
    fn from(err: rocksdb::Error) -> Self {
        match err.kind() {
            ErrorKind::Busy | ErrorKind::TimedOut | ErrorKind::TryAgain => {
                StorageError::LockTimeout(err.into_string())
            }
            _ => StorageError::RocksDb(err),
        }
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Serialized edge payload for storage
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredEdge {
    created_at: i64,
}

/// Storage tuning knobs
#[derive(Debug, Clone)]
pub struct StorageOptions {
    /// Maximum time a writer waits for a row lock (milliseconds)
    pub lock_timeout_ms: i64,
    /// RocksDB write buffer size in bytes
    pub write_buffer_size: usize,
    /// fsync the WAL on every commit
    pub sync_writes: bool,
}

impl Default for StorageOptions {
    fn default() -> Self {
        Self {
            lock_timeout_ms: 1000,
            write_buffer_size: 64 * 1024 * 1024,
            sync_writes: false,
        }
    }
}

/// RocksDB-based persistent storage
pub struct PersistentStorage {
    /// RocksDB instance
    db: Arc<TransactionDB>,
    /// Relations provisioned at open time
    relations: Vec<String>,
    sync_writes: bool,
}

impl PersistentStorage {
    /// Open or create a persistent storage with one column-family pair per relation
    pub fn open(
        path: impl AsRef<Path>,
        relations: &[&str],
        options: &StorageOptions,
    ) -> StorageResult<Self> {
        let path = path.as_ref();
        info!("Opening persistent storage at: {}", path.display());

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        opts.set_write_buffer_size(options.write_buffer_size);
        opts.set_max_write_buffer_number(3);
        opts.set_min_write_buffer_number_to_merge(1);

        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts.set_wal_recovery_mode(rocksdb::DBRecoveryMode::PointInTime);

        let mut txn_opts = TransactionDBOptions::default();
        txn_opts.set_txn_lock_timeout(options.lock_timeout_ms);

        let mut cf_descriptors = vec![ColumnFamilyDescriptor::new("default", Options::default())];
        for relation in relations {
            cf_descriptors.push(ColumnFamilyDescriptor::new(
                Self::forward_cf(relation),
                Self::edge_cf_options(),
            ));
            cf_descriptors.push(ColumnFamilyDescriptor::new(
                Self::reverse_cf(relation),
                Self::edge_cf_options(),
            ));
        }

        let db: TransactionDB = TransactionDB::open_cf_descriptors(&opts, &txn_opts, path, cf_descriptors)?;

        info!(
            "Persistent storage opened with relations: {}",
            relations.join(", ")
        );

        Ok(Self {
            db: Arc::new(db),
            relations: relations.iter().map(|r| r.to_string()).collect(),
            sync_writes: options.sync_writes,
        })
    }

    /// Column family options for edge tables
    fn edge_cf_options() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts
    }

    fn forward_cf(relation: &str) -> String {
        relation.to_string()
    }

    fn reverse_cf(relation: &str) -> String {
        format!("{}_rev", relation)
    }

    /// Handle to one relation's edge index
    pub fn relation(&self, name: &str) -> StorageResult<RocksEdgeIndex> {
        if !self.relations.iter().any(|r| r == name) {
            return Err(StorageError::ColumnFamily(name.to_string()));
        }
        Ok(RocksEdgeIndex {
            db: Arc::clone(&self.db),
            relation: name.to_string(),
            forward: Self::forward_cf(name),
            reverse: Self::reverse_cf(name),
            sync_writes: self.sync_writes,
        })
    }

    /// Relations provisioned in this database
    pub fn relations(&self) -> &[String] {
        &self.relations
    }
}

/// One relation (`user_follow` or `tag_follow`) inside the RocksDB database
pub struct RocksEdgeIndex {
    db: Arc<TransactionDB>,
    relation: String,
    forward: String,
    reverse: String,
    sync_writes: bool,
}

impl RocksEdgeIndex {
    fn begin(&self) -> Transaction<'_, TransactionDB> {
        let mut write_opts = WriteOptions::default();
        write_opts.set_sync(self.sync_writes);
        let mut txn_opts = TransactionOptions::default();
        txn_opts.set_deadlock_detect(true);
        self.db.transaction_opt(&write_opts, &txn_opts)
    }

    fn cf(&self, name: &str) -> StorageResult<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StorageError::ColumnFamily(name.to_string()))
    }

    /// Create a pair key: `first ‖ second`
    fn pair_key(first: EntityId, second: EntityId) -> [u8; 32] {
        let mut key = [0u8; 32];
        key[..16].copy_from_slice(first.as_bytes());
        key[16..].copy_from_slice(second.as_bytes());
        key
    }

    fn split_key(&self, key: &[u8]) -> StorageResult<(EntityId, EntityId)> {
        let corrupt = || StorageError::CorruptKey {
            relation: self.relation.clone(),
            len: key.len(),
        };
        if key.len() != 32 {
            return Err(corrupt());
        }
        let first = Uuid::from_slice(&key[..16]).map_err(|_| corrupt())?;
        let second = Uuid::from_slice(&key[16..]).map_err(|_| corrupt())?;
        Ok((EntityId::new(first), EntityId::new(second)))
    }

    /// Scan all pair keys starting with `entity` in the given column family.
    /// Returns the second half of each key.
    fn scan_prefix(&self, cf_name: &str, entity: EntityId) -> StorageResult<Vec<EntityId>> {
        let cf = self.cf(cf_name)?;
        let prefix = entity.as_bytes();
        let mut out = Vec::new();

        let iter = self
            .db
            .iterator_cf(cf, IteratorMode::From(prefix, Direction::Forward));

        for item in iter {
            let (key, _value) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            let (_, other) = self.split_key(&key)?;
            out.push(other);
        }

        Ok(out)
    }
}

impl EdgeIndex for RocksEdgeIndex {
    fn relation(&self) -> &str {
        &self.relation
    }

    fn insert(&self, edge: &FollowEdge) -> StorageResult<bool> {
        let forward = self.cf(&self.forward)?;
        let reverse = self.cf(&self.reverse)?;
        let key = Self::pair_key(edge.follower, edge.target);

        let txn = self.begin();
        if txn.get_for_update_cf(forward, key, true)?.is_some() {
            // Dropping the transaction rolls it back and releases the lock
            return Ok(false);
        }

        let value = bincode::serialize(&StoredEdge {
            created_at: edge.created_at,
        })?;
        txn.put_cf(forward, key, value)?;
        txn.put_cf(reverse, Self::pair_key(edge.target, edge.follower), b"")?;
        txn.commit()?;

        debug!(
            "Stored edge {} -> {} in {}",
            edge.follower, edge.target, self.relation
        );
        Ok(true)
    }

    fn remove(&self, follower: EntityId, target: EntityId) -> StorageResult<bool> {
        let forward = self.cf(&self.forward)?;
        let reverse = self.cf(&self.reverse)?;
        let key = Self::pair_key(follower, target);

        let txn = self.begin();
        if txn.get_for_update_cf(forward, key, true)?.is_none() {
            return Ok(false);
        }
        txn.delete_cf(forward, key)?;
        txn.delete_cf(reverse, Self::pair_key(target, follower))?;
        txn.commit()?;

        debug!("Deleted edge {} -> {} in {}", follower, target, self.relation);
        Ok(true)
    }

    fn contains(&self, follower: EntityId, target: EntityId) -> StorageResult<bool> {
        let forward = self.cf(&self.forward)?;
        Ok(self
            .db
            .get_cf(forward, Self::pair_key(follower, target))?
            .is_some())
    }

    fn get(&self, follower: EntityId, target: EntityId) -> StorageResult<Option<FollowEdge>> {
        let forward = self.cf(&self.forward)?;
        match self.db.get_cf(forward, Self::pair_key(follower, target))? {
            Some(value) => {
                let stored: StoredEdge = bincode::deserialize(&value)?;
                Ok(Some(FollowEdge {
                    follower,
                    target,
                    created_at: stored.created_at,
                }))
            }
            None => Ok(None),
        }
    }

    fn targets_of(&self, follower: EntityId) -> StorageResult<Vec<EntityId>> {
        self.scan_prefix(&self.forward, follower)
    }

    fn followers_of(&self, target: EntityId) -> StorageResult<Vec<EntityId>> {
        self.scan_prefix(&self.reverse, target)
    }

    fn purge(&self, entity: EntityId, scope: PurgeScope) -> StorageResult<usize> {
        let forward = self.cf(&self.forward)?;
        let reverse = self.cf(&self.reverse)?;

        let mut pairs: Vec<(EntityId, EntityId)> = Vec::new();
        if scope.outgoing() {
            pairs.extend(self.targets_of(entity)?.into_iter().map(|target| (entity, target)));
        }
        if scope.incoming() {
            pairs.extend(self.followers_of(entity)?.into_iter().map(|follower| (follower, entity)));
        }
        // Row locks are always taken in forward-key order
        pairs.sort();
        pairs.dedup();

        let txn = self.begin();
        let mut removed = 0;
        for (follower, target) in pairs {
            let key = Self::pair_key(follower, target);
            // A concurrent remove may already have taken the row
            if txn.get_for_update_cf(forward, key, true)?.is_some() {
                txn.delete_cf(forward, key)?;
                txn.delete_cf(reverse, Self::pair_key(target, follower))?;
                removed += 1;
            }
        }
        txn.commit()?;

        debug!("Purged {} edges of {} in {}", removed, entity, self.relation);
        Ok(removed)
    }
}

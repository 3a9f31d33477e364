//! Thread-Safe Storage Engine with Expiry Support
//!
//! This module implements the value store for TallyKV: one keyspace holding
//! scalars, lists, hashes and sets, plus the expiry index for scalar TTLs.
//!
//! ## Design Decisions
//!
//! 1. **One lock**: a single `RwLock` guards the whole keyspace. Every
//!    operation is atomic with respect to every other one. Pure reads take
//!    the shared lock, everything else the exclusive lock.
//! 2. **One family per key**: the keyspace maps each key to a tagged
//!    [`Value`]. Touching a key through the wrong family fails with
//!    [`StoreError::WrongType`] instead of shadowing it.
//! 3. **Lazy + active expiry**: reads check deadlines themselves; the
//!    background sweeper only reclaims memory.
//! 4. **Empty containers stay**: popping the last element of a list (or
//!    removing the last member of a set) leaves an empty container behind.
//!
//! ## Concurrency Model
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     StorageEngine                           │
//! │  ┌───────────────────────────────────────────────────────┐  │
//! │  │                 RwLock<Keyspace>                      │  │
//! │  │   entries: HashMap<Bytes, Value>                      │  │
//! │  │   expiry:  ExpiryIndex (heap + per-key records)       │  │
//! │  └───────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! A `get` that finds an expired key lets go of its read lock before taking
//! the write lock to delete it, then re-checks, since another writer may
//! have replaced the key in between.

use crate::persistence::snapshot::{
    Blob, FieldRecord, HashRecord, ListRecord, ScalarRecord, SetRecord, Snapshot,
};
use crate::storage::expiry::ExpiryIndex;
use crate::storage::value::{StoreError, StoreResult, Value};
use bytes::Bytes;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Everything guarded by the store lock.
#[derive(Debug, Default)]
struct Keyspace {
    entries: HashMap<Bytes, Value>,
    expiry: ExpiryIndex,
}

impl Keyspace {
    /// Looks up a key, hiding scalars whose deadline has passed.
    fn live(&self, key: &[u8], now: Instant) -> Option<&Value> {
        if self.expiry.is_expired(key, now) {
            return None;
        }
        self.entries.get(key)
    }

    /// Deletes the key if its deadline has passed.
    fn purge_if_expired(&mut self, key: &[u8], now: Instant) -> bool {
        if !self.expiry.is_expired(key, now) {
            return false;
        }
        self.expiry.clear(key);
        self.entries.remove(key).is_some()
    }

    fn remove(&mut self, key: &[u8]) -> Option<Value> {
        self.expiry.clear(key);
        self.entries.remove(key)
    }

    /// Inserts a non-expiring value, dropping any deadline the key had.
    fn insert(&mut self, key: Bytes, value: Value) {
        self.expiry.clear(&key);
        self.entries.insert(key, value);
    }
}

/// The value store.
///
/// This struct is designed to be wrapped in an `Arc` and shared across
/// all client handler tasks. All operations are thread-safe.
///
/// # Example
///
/// ```
/// use tallykv::storage::StorageEngine;
/// use bytes::Bytes;
/// use std::time::Duration;
///
/// let engine = StorageEngine::new();
///
/// engine.set(Bytes::from("name"), Bytes::from("Ariz")).unwrap();
/// assert_eq!(engine.get(b"name").unwrap(), Some(Bytes::from("Ariz")));
///
/// engine.set_with_ttl(Bytes::from("session"), Bytes::from("abc123"), Duration::from_secs(60)).unwrap();
///
/// engine.lpush(Bytes::from("queue"), vec![Bytes::from("a"), Bytes::from("b")]).unwrap();
/// assert_eq!(engine.lpop(b"queue").unwrap(), Some(Bytes::from("a")));
/// ```
pub struct StorageEngine {
    keyspace: RwLock<Keyspace>,

    /// Statistics: total GET operations
    get_count: AtomicU64,

    /// Statistics: total SET operations
    set_count: AtomicU64,

    /// Statistics: total DEL operations
    del_count: AtomicU64,

    /// Statistics: number of expired keys cleaned up
    expired_count: AtomicU64,
}

impl std::fmt::Debug for StorageEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageEngine")
            .field("keys", &self.len())
            .field("get_count", &self.get_count.load(Ordering::Relaxed))
            .field("set_count", &self.set_count.load(Ordering::Relaxed))
            .finish()
    }
}

impl Default for StorageEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageEngine {
    /// Creates a new, empty storage engine.
    pub fn new() -> Self {
        Self {
            keyspace: RwLock::new(Keyspace::default()),
            get_count: AtomicU64::new(0),
            set_count: AtomicU64::new(0),
            del_count: AtomicU64::new(0),
            expired_count: AtomicU64::new(0),
        }
    }

    /// Creates a storage engine populated from a snapshot.
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        let engine = Self::new();
        engine.restore(snapshot);
        engine
    }

    // Poisoned locks are reclaimed; every operation leaves the keyspace consistent.
    fn read(&self) -> RwLockReadGuard<'_, Keyspace> {
        self.keyspace.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Keyspace> {
        self.keyspace.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn purge_expired(&self, keyspace: &mut Keyspace, key: &[u8], now: Instant) {
        if keyspace.purge_if_expired(key, now) {
            self.expired_count.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Runs `f` on the key's value, creating it with `init` if absent.
    fn write_entry<T>(
        &self,
        key: Bytes,
        init: fn() -> Value,
        f: impl FnOnce(&mut Value) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let mut keyspace = self.write();
        self.purge_expired(&mut keyspace, &key, Instant::now());
        f(keyspace.entries.entry(key).or_insert_with(init))
    }

    /// Runs `f` on the key's value if it exists.
    fn update_entry<T>(
        &self,
        key: &[u8],
        f: impl FnOnce(&mut Value) -> StoreResult<T>,
    ) -> StoreResult<Option<T>> {
        let mut keyspace = self.write();
        self.purge_expired(&mut keyspace, key, Instant::now());
        keyspace.entries.get_mut(key).map(f).transpose()
    }

    /// Runs `f` on the key's value if it exists, under the shared lock.
    fn read_entry<T>(
        &self,
        key: &[u8],
        f: impl FnOnce(&Value) -> StoreResult<T>,
    ) -> StoreResult<Option<T>> {
        let keyspace = self.read();
        keyspace.live(key, Instant::now()).map(f).transpose()
    }

    // ========================================================================
    // SCALAR OPERATIONS
    // ========================================================================

    /// Sets a scalar without expiry, clearing any previous deadline.
    pub fn set(&self, key: Bytes, value: Bytes) -> StoreResult<()> {
        self.store_scalar(key, value, None)
    }

    /// Sets a scalar that expires once `ttl` has elapsed.
    pub fn set_with_ttl(&self, key: Bytes, value: Bytes, ttl: Duration) -> StoreResult<()> {
        self.store_scalar(key, value, Some(ttl))
    }

    fn store_scalar(&self, key: Bytes, value: Bytes, ttl: Option<Duration>) -> StoreResult<()> {
        self.set_count.fetch_add(1, Ordering::Relaxed);

        let now = Instant::now();
        let deadline = match ttl {
            Some(ttl) => Some(checked_deadline(now, ttl).ok_or(StoreError::InvalidTtl)?),
            None => None,
        };

        let mut keyspace = self.write();
        self.purge_expired(&mut keyspace, &key, now);

        if let Some(existing) = keyspace.entries.get(&key) {
            existing.as_scalar()?;
        }

        match deadline {
            Some(at) => {
                keyspace
                    .entries
                    .insert(key.clone(), Value::Scalar(value));
                keyspace.expiry.schedule(key, at);
            }
            None => keyspace.insert(key, Value::Scalar(value)),
        }
        Ok(())
    }

    /// Gets a scalar.
    ///
    /// Returns `None` if the key doesn't exist or has expired.
    /// This implements "lazy expiry" - expired keys are detected and removed on access.
    pub fn get(&self, key: &[u8]) -> StoreResult<Option<Bytes>> {
        self.get_count.fetch_add(1, Ordering::Relaxed);

        // Fast path under the read lock
        {
            let keyspace = self.read();
            if !keyspace.expiry.is_expired(key, Instant::now()) {
                return keyspace
                    .entries
                    .get(key)
                    .map(|v| v.as_scalar().cloned())
                    .transpose();
            }
        }

        // Deadline passed - need write lock to remove it
        let mut keyspace = self.write();
        self.purge_expired(&mut keyspace, key, Instant::now());
        keyspace
            .entries
            .get(key)
            .map(|v| v.as_scalar().cloned())
            .transpose()
    }

    /// Returns the remaining time to live of a key.
    ///
    /// `None` if the key doesn't exist or never expires.
    pub fn ttl(&self, key: &[u8]) -> Option<Duration> {
        let keyspace = self.read();
        let now = Instant::now();
        keyspace.live(key, now)?;
        keyspace
            .expiry
            .deadline(key)
            .map(|at| at.saturating_duration_since(now))
    }

    // ========================================================================
    // KEY OPERATIONS
    // ========================================================================

    /// Deletes a key of any family.
    ///
    /// Returns `true` if the key existed.
    pub fn delete(&self, key: &[u8]) -> bool {
        self.delete_many(&[key]) == 1
    }

    /// Deletes several keys in one atomic step.
    ///
    /// Returns the number of keys that existed. Keys that had already expired
    /// don't count.
    pub fn delete_many<K: AsRef<[u8]>>(&self, keys: &[K]) -> u64 {
        self.del_count.fetch_add(keys.len() as u64, Ordering::Relaxed);

        let now = Instant::now();
        let mut keyspace = self.write();
        let mut deleted = 0;
        for key in keys {
            let key = key.as_ref();
            self.purge_expired(&mut keyspace, key, now);
            if keyspace.remove(key).is_some() {
                deleted += 1;
            }
        }
        deleted
    }

    /// Returns the family name of a key ("string", "list", "hash", "set").
    pub fn key_type(&self, key: &[u8]) -> Option<&'static str> {
        self.read()
            .live(key, Instant::now())
            .map(|value| value.type_name())
    }

    // ========================================================================
    // LIST OPERATIONS
    // ========================================================================

    /// Inserts `values` as one block at the head of a list, keeping their
    /// order: `lpush(k, [a, b])` on `[x]` gives `[a, b, x]`.
    ///
    /// Creates the list if it doesn't exist. Returns the new length.
    pub fn lpush(&self, key: Bytes, values: Vec<Bytes>) -> StoreResult<usize> {
        self.write_entry(key, Value::empty_list, |value| {
            let list = value.as_list_mut()?;
            list.reserve(values.len());
            for v in values.into_iter().rev() {
                list.push_front(v);
            }
            Ok(list.len())
        })
    }

    /// Appends `values` at the tail of a list, in order.
    ///
    /// Creates the list if it doesn't exist. Returns the new length.
    pub fn rpush(&self, key: Bytes, values: Vec<Bytes>) -> StoreResult<usize> {
        self.write_entry(key, Value::empty_list, |value| {
            let list = value.as_list_mut()?;
            list.extend(values);
            Ok(list.len())
        })
    }

    /// Removes and returns the first element of a list.
    ///
    /// `None` if the key doesn't exist or the list is empty.
    pub fn lpop(&self, key: &[u8]) -> StoreResult<Option<Bytes>> {
        self.update_entry(key, |value| Ok(value.as_list_mut()?.pop_front()))
            .map(Option::flatten)
    }

    /// Removes and returns the last element of a list.
    pub fn rpop(&self, key: &[u8]) -> StoreResult<Option<Bytes>> {
        self.update_entry(key, |value| Ok(value.as_list_mut()?.pop_back()))
            .map(Option::flatten)
    }

    /// Returns a copy of a whole list, head first.
    pub fn list_items(&self, key: &[u8]) -> StoreResult<Option<Vec<Bytes>>> {
        self.read_entry(key, |value| match value {
            Value::List(list) => Ok(list.iter().cloned().collect()),
            _ => Err(StoreError::WrongType),
        })
    }

    // ========================================================================
    // HASH OPERATIONS
    // ========================================================================

    /// Sets a hash field. Returns `true` if the field is new.
    pub fn hset(&self, key: Bytes, field: Bytes, value: Bytes) -> StoreResult<bool> {
        self.write_entry(key, Value::empty_hash, |entry| {
            Ok(entry.as_hash_mut()?.insert(field, value).is_none())
        })
    }

    /// Gets a hash field.
    pub fn hget(&self, key: &[u8], field: &[u8]) -> StoreResult<Option<Bytes>> {
        self.read_entry(key, |value| Ok(value.as_hash()?.get(field).cloned()))
            .map(Option::flatten)
    }

    // ========================================================================
    // SET OPERATIONS
    // ========================================================================

    /// Adds members to a set. Returns how many were not already present;
    /// repeats within one call count once.
    pub fn sadd(&self, key: Bytes, members: Vec<Bytes>) -> StoreResult<usize> {
        self.write_entry(key, Value::empty_set, |value| {
            let set = value.as_set_mut()?;
            let mut added = 0;
            for member in members {
                if set.insert(member) {
                    added += 1;
                }
            }
            Ok(added)
        })
    }

    /// Removes members from a set. Returns how many were present.
    pub fn srem<M: AsRef<[u8]>>(&self, key: &[u8], members: &[M]) -> StoreResult<usize> {
        self.update_entry(key, |value| {
            let set = value.as_set_mut()?;
            Ok(members
                .iter()
                .filter(|member| set.remove(member.as_ref()))
                .count())
        })
        .map(|removed| removed.unwrap_or(0))
    }

    /// Returns all members of a set, in no particular order.
    ///
    /// `None` if the key doesn't exist; an empty vector for an empty set.
    pub fn smembers(&self, key: &[u8]) -> StoreResult<Option<Vec<Bytes>>> {
        self.read_entry(key, |value| Ok(value.as_set()?.iter().cloned().collect()))
    }

    // ========================================================================
    // MAINTENANCE
    // ========================================================================

    /// Removes every key whose deadline has passed.
    ///
    /// This is called by the background expiry sweeper.
    ///
    /// # Returns
    ///
    /// Returns the number of keys that were cleaned up.
    pub fn cleanup_expired(&self) -> u64 {
        let now = Instant::now();
        let mut keyspace = self.write();
        let mut cleaned = 0u64;

        while let Some(key) = keyspace.expiry.pop_due(now) {
            if keyspace.entries.remove(&key).is_some() {
                cleaned += 1;
            }
        }

        if cleaned > 0 {
            self.expired_count.fetch_add(cleaned, Ordering::Relaxed);
        }
        cleaned
    }

    /// Returns the number of keys, including expired keys not yet swept.
    pub fn len(&self) -> usize {
        self.read().entries.len()
    }

    /// Returns true if the store holds no keys.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns store statistics.
    pub fn stats(&self) -> StorageStats {
        let keyspace = self.read();
        StorageStats {
            keys: keyspace.entries.len() as u64,
            keys_with_ttl: keyspace.expiry.len() as u64,
            get_ops: self.get_count.load(Ordering::Relaxed),
            set_ops: self.set_count.load(Ordering::Relaxed),
            del_ops: self.del_count.load(Ordering::Relaxed),
            expired: self.expired_count.load(Ordering::Relaxed),
        }
    }

    // ========================================================================
    // SNAPSHOTS
    // ========================================================================

    /// Captures every live key.
    ///
    /// Records are sorted by key so that identical contents produce
    /// identical files. Expired keys are left out.
    pub fn snapshot(&self) -> Snapshot {
        let keyspace = self.read();
        let now = Instant::now();
        let wall_now = SystemTime::now();

        let mut keys: Vec<&Bytes> = keyspace
            .entries
            .keys()
            .filter(|key| !keyspace.expiry.is_expired(key, now))
            .collect();
        keys.sort();

        let mut snapshot = Snapshot::default();
        for key in keys {
            let blob = Blob::from(key);
            match &keyspace.entries[key] {
                Value::Scalar(value) => snapshot.strings.push(ScalarRecord {
                    key: blob,
                    value: Blob::from(value),
                    expires_at_ms: keyspace
                        .expiry
                        .deadline(key)
                        .map(|at| {
                            unix_millis(wall_now, at.saturating_duration_since(now))
                                .unwrap_or(u64::MAX)
                        }),
                }),
                Value::List(list) => snapshot.lists.push(ListRecord {
                    key: blob,
                    items: list.iter().map(Blob::from).collect(),
                }),
                Value::Hash(hash) => {
                    let mut fields: Vec<_> = hash.iter().collect();
                    fields.sort();
                    snapshot.hashes.push(HashRecord {
                        key: blob,
                        fields: fields
                            .into_iter()
                            .map(|(field, value)| FieldRecord {
                                field: Blob::from(field),
                                value: Blob::from(value),
                            })
                            .collect(),
                    });
                }
                Value::Set(set) => {
                    let mut members: Vec<_> = set.iter().collect();
                    members.sort();
                    snapshot.sets.push(SetRecord {
                        key: blob,
                        members: members.into_iter().map(Blob::from).collect(),
                    });
                }
            }
        }
        snapshot
    }

    /// Replaces the whole contents of the store with a snapshot.
    ///
    /// Scalars whose deadline has already passed are dropped. Returns the
    /// number of keys loaded.
    pub fn restore(&self, snapshot: Snapshot) -> usize {
        let now = Instant::now();
        let wall_now = SystemTime::now();
        let mut fresh = Keyspace::default();

        for record in snapshot.lists {
            let items: VecDeque<Bytes> = record.items.into_iter().map(Bytes::from).collect();
            fresh.insert(record.key.into(), Value::List(items));
        }
        for record in snapshot.hashes {
            let fields: HashMap<Bytes, Bytes> = record
                .fields
                .into_iter()
                .map(|f| (f.field.into(), f.value.into()))
                .collect();
            fresh.insert(record.key.into(), Value::Hash(fields));
        }
        for record in snapshot.sets {
            let members: HashSet<Bytes> = record.members.into_iter().map(Bytes::from).collect();
            fresh.insert(record.key.into(), Value::Set(members));
        }
        for record in snapshot.strings {
            let key: Bytes = record.key.into();
            let value = Value::Scalar(record.value.into());
            match record.expires_at_ms {
                None => fresh.insert(key, value),
                Some(ms) => {
                    let remaining = UNIX_EPOCH
                        .checked_add(Duration::from_millis(ms))
                        .map(|deadline| deadline.duration_since(wall_now));
                    match remaining {
                        // Already behind us
                        Some(Err(_)) => {
                            fresh.remove(&key);
                        }
                        Some(Ok(remaining)) => match now.checked_add(remaining) {
                            Some(at) => {
                                fresh.entries.insert(key.clone(), value);
                                fresh.expiry.schedule(key, at);
                            }
                            None => fresh.insert(key, value),
                        },
                        // Too far out for this platform's clock
                        None => fresh.insert(key, value),
                    }
                }
            }
        }

        let loaded = fresh.entries.len();
        *self.write() = fresh;
        loaded
    }
}

/// Wall-clock milliseconds since the Unix epoch, `remaining` from `now`.
///
/// `None` if the result doesn't fit in a `u64`.
fn unix_millis(now: SystemTime, remaining: Duration) -> Option<u64> {
    let at = now.checked_add(remaining)?;
    let since_epoch = at.duration_since(UNIX_EPOCH).unwrap_or(Duration::ZERO);
    u64::try_from(since_epoch.as_millis()).ok()
}

/// The deadline `ttl` from `now`, if both the monotonic clock and a snapshot
/// timestamp can represent it.
fn checked_deadline(now: Instant, ttl: Duration) -> Option<Instant> {
    unix_millis(SystemTime::now(), ttl)?;
    now.checked_add(ttl)
}

/// Storage statistics.
#[derive(Debug, Clone, Default)]
pub struct StorageStats {
    pub keys: u64,
    pub keys_with_ttl: u64,
    pub get_ops: u64,
    pub set_ops: u64,
    pub del_ops: u64,
    pub expired: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn b(s: &str) -> Bytes {
        Bytes::from(s.to_string())
    }

    fn bs(items: &[&str]) -> Vec<Bytes> {
        items.iter().map(|s| b(s)).collect()
    }

    #[test]
    fn test_set_and_get() {
        let engine = StorageEngine::new();
        engine.set(b("key"), b("value")).unwrap();
        assert_eq!(engine.get(b"key"), Ok(Some(b("value"))));
        assert_eq!(engine.get(b"missing"), Ok(None));
    }

    #[test]
    fn test_empty_value_is_found() {
        let engine = StorageEngine::new();
        engine.set(b("key"), Bytes::new()).unwrap();
        assert_eq!(engine.get(b"key"), Ok(Some(Bytes::new())));
    }

    #[test]
    fn test_expiry() {
        let engine = StorageEngine::new();
        engine
            .set_with_ttl(b("key"), b("value"), Duration::from_millis(50))
            .unwrap();

        assert_eq!(engine.get(b"key"), Ok(Some(b("value"))));
        assert!(engine.ttl(b"key").is_some());

        thread::sleep(Duration::from_millis(80));

        assert_eq!(engine.get(b"key"), Ok(None));
        assert_eq!(engine.len(), 0);
        assert_eq!(engine.stats().expired, 1);
    }

    #[test]
    fn test_set_without_ttl_clears_deadline() {
        let engine = StorageEngine::new();
        engine
            .set_with_ttl(b("key"), b("v1"), Duration::from_millis(30))
            .unwrap();
        engine.set(b("key"), b("v2")).unwrap();
        assert_eq!(engine.ttl(b"key"), None);

        thread::sleep(Duration::from_millis(50));

        assert_eq!(engine.cleanup_expired(), 0);
        assert_eq!(engine.get(b"key"), Ok(Some(b("v2"))));
    }

    #[test]
    fn test_stale_deadline_does_not_delete_new_value() {
        let engine = StorageEngine::new();
        engine
            .set_with_ttl(b("key"), b("short"), Duration::from_millis(20))
            .unwrap();
        engine
            .set_with_ttl(b("key"), b("long"), Duration::from_secs(60))
            .unwrap();

        thread::sleep(Duration::from_millis(40));

        assert_eq!(engine.cleanup_expired(), 0);
        assert_eq!(engine.get(b"key"), Ok(Some(b("long"))));
    }

    #[test]
    fn test_delete_counts_existing_keys() {
        let engine = StorageEngine::new();
        engine.set(b("k1"), b("v")).unwrap();
        engine.rpush(b("k2"), bs(&["a"])).unwrap();
        engine.sadd(b("k3"), bs(&["m"])).unwrap();

        assert_eq!(engine.delete_many(&[b("k1"), b("k2"), b("k3"), b("nope")]), 3);
        assert!(engine.is_empty());
        assert!(!engine.delete(b"k1"));
    }

    #[test]
    fn test_delete_drops_deadline() {
        let engine = StorageEngine::new();
        engine
            .set_with_ttl(b("key"), b("v"), Duration::from_secs(60))
            .unwrap();
        assert!(engine.delete(b"key"));
        assert_eq!(engine.stats().keys_with_ttl, 0);
    }

    #[test]
    fn test_wrong_type() {
        let engine = StorageEngine::new();
        engine.rpush(b("list"), bs(&["a"])).unwrap();
        engine.set(b("str"), b("v")).unwrap();

        assert_eq!(engine.set(b("list"), b("v")), Err(StoreError::WrongType));
        assert_eq!(engine.get(b"list"), Err(StoreError::WrongType));
        assert_eq!(
            engine.sadd(b("str"), bs(&["m"])),
            Err(StoreError::WrongType)
        );
        assert_eq!(engine.hget(b"list", b"f"), Err(StoreError::WrongType));
        assert_eq!(engine.lpop(b"str"), Err(StoreError::WrongType));

        // Nothing was overwritten
        assert_eq!(engine.key_type(b"list"), Some("list"));
        assert_eq!(engine.get(b"str"), Ok(Some(b("v"))));
    }

    #[test]
    fn test_expired_scalar_frees_key_for_other_families() {
        let engine = StorageEngine::new();
        engine
            .set_with_ttl(b("key"), b("v"), Duration::from_millis(10))
            .unwrap();
        thread::sleep(Duration::from_millis(30));

        assert_eq!(engine.smembers(b"key"), Ok(None));
        assert_eq!(engine.rpush(b("key"), bs(&["a"])), Ok(1));
        assert_eq!(engine.key_type(b"key"), Some("list"));
        assert_eq!(engine.stats().keys_with_ttl, 0);
    }

    #[test]
    fn test_lpush_keeps_argument_order() {
        let engine = StorageEngine::new();

        assert_eq!(engine.rpush(b("list"), bs(&["x"])), Ok(1));
        assert_eq!(engine.lpush(b("list"), bs(&["a", "b"])), Ok(3));
        assert_eq!(engine.rpush(b("list"), bs(&["y", "z"])), Ok(5));

        assert_eq!(
            engine.list_items(b"list"),
            Ok(Some(bs(&["a", "b", "x", "y", "z"])))
        );
    }

    #[test]
    fn test_lpop_rpop() {
        let engine = StorageEngine::new();
        engine.rpush(b("list"), bs(&["a", "b", "c"])).unwrap();

        assert_eq!(engine.lpop(b"list"), Ok(Some(b("a"))));
        assert_eq!(engine.rpop(b"list"), Ok(Some(b("c"))));
        assert_eq!(engine.rpop(b"list"), Ok(Some(b("b"))));
        assert_eq!(engine.lpop(b"list"), Ok(None));
        assert_eq!(engine.lpop(b"missing"), Ok(None));

        // The emptied list is still there
        assert_eq!(engine.key_type(b"list"), Some("list"));
        assert_eq!(engine.list_items(b"list"), Ok(Some(vec![])));
    }

    #[test]
    fn test_hset_hget() {
        let engine = StorageEngine::new();

        assert_eq!(engine.hset(b("h"), b("f"), b("v1")), Ok(true));
        assert_eq!(engine.hset(b("h"), b("f"), b("v2")), Ok(false));
        assert_eq!(engine.hget(b"h", b"f"), Ok(Some(b("v2"))));
        assert_eq!(engine.hget(b"h", b"other"), Ok(None));
        assert_eq!(engine.hget(b"missing", b"f"), Ok(None));
    }

    #[test]
    fn test_sadd_srem_smembers() {
        let engine = StorageEngine::new();

        assert_eq!(engine.sadd(b("s"), bs(&["x", "x", "y"])), Ok(2));
        assert_eq!(engine.sadd(b("s"), bs(&["x"])), Ok(0));

        let mut members = engine.smembers(b"s").unwrap().unwrap();
        members.sort();
        assert_eq!(members, bs(&["x", "y"]));

        assert_eq!(engine.srem(b"s", &[b("x"), b("nope")]), Ok(1));
        assert_eq!(engine.srem(b"s", &[b("y")]), Ok(1));
        assert_eq!(engine.srem(b"missing", &[b("y")]), Ok(0));

        // Present but empty is not the same as absent
        assert_eq!(engine.smembers(b"s"), Ok(Some(vec![])));
        assert_eq!(engine.smembers(b"missing"), Ok(None));
    }

    #[test]
    fn test_cleanup_expired() {
        let engine = StorageEngine::new();

        engine
            .set_with_ttl(b("key1"), b("value1"), Duration::from_millis(10))
            .unwrap();
        engine
            .set_with_ttl(b("key2"), b("value2"), Duration::from_millis(10))
            .unwrap();
        engine.set(b("key3"), b("value3")).unwrap();

        thread::sleep(Duration::from_millis(50));

        assert_eq!(engine.cleanup_expired(), 2);
        assert_eq!(engine.len(), 1);
        assert_eq!(engine.get(b"key3"), Ok(Some(b("value3"))));
    }

    #[test]
    fn test_snapshot_restore() {
        let engine = StorageEngine::new();
        engine.set(b("s"), b("plain")).unwrap();
        engine
            .set_with_ttl(b("t"), b("timed"), Duration::from_secs(60))
            .unwrap();
        engine.rpush(b("l"), bs(&["1", "2"])).unwrap();
        engine.hset(b("h"), b("f"), b("v")).unwrap();
        engine.sadd(b("set"), bs(&["m1", "m2"])).unwrap();
        engine.sadd(b("empty"), bs(&["gone"])).unwrap();
        engine.srem(b"empty", &[b("gone")]).unwrap();

        let restored = StorageEngine::from_snapshot(engine.snapshot());

        assert_eq!(restored.len(), 6);
        assert_eq!(restored.get(b"s"), Ok(Some(b("plain"))));
        assert_eq!(restored.get(b"t"), Ok(Some(b("timed"))));
        assert!(restored.ttl(b"t").unwrap() > Duration::from_secs(50));
        assert_eq!(restored.list_items(b"l"), Ok(Some(bs(&["1", "2"]))));
        assert_eq!(restored.hget(b"h", b"f"), Ok(Some(b("v"))));
        assert_eq!(restored.smembers(b"empty"), Ok(Some(vec![])));

        let (before, after) = (engine.snapshot(), restored.snapshot());
        assert_eq!(after.lists, before.lists);
        assert_eq!(after.hashes, before.hashes);
        assert_eq!(after.sets, before.sets);
    }

    #[test]
    fn test_snapshot_skips_expired_keys() {
        let engine = StorageEngine::new();
        engine
            .set_with_ttl(b("gone"), b("v"), Duration::from_millis(10))
            .unwrap();
        engine.set(b("kept"), b("v")).unwrap();
        thread::sleep(Duration::from_millis(30));

        // Not swept yet, but it must not come back after a restart
        assert_eq!(engine.len(), 2);
        let snapshot = engine.snapshot();
        assert_eq!(snapshot.strings.len(), 1);

        let restored = StorageEngine::from_snapshot(snapshot);
        assert_eq!(restored.get(b"gone"), Ok(None));
        assert_eq!(restored.len(), 1);
    }

    #[test]
    fn test_restore_drops_past_deadlines() {
        let mut snapshot = Snapshot::default();
        snapshot.strings.push(ScalarRecord {
            key: Blob::from(&b("old")),
            value: Blob::from(&b("v")),
            expires_at_ms: Some(1_000),
        });

        let engine = StorageEngine::from_snapshot(snapshot);
        assert!(engine.is_empty());
        assert_eq!(engine.stats().keys_with_ttl, 0);
    }

    #[test]
    fn test_unrepresentable_ttl_is_rejected() {
        let engine = StorageEngine::new();

        for secs in [u64::MAX, 100_000_000_000_000_000] {
            assert_eq!(
                engine.set_with_ttl(b("k"), b("v"), Duration::from_secs(secs)),
                Err(StoreError::InvalidTtl)
            );
        }
        assert!(engine.is_empty());
        assert_eq!(engine.stats().keys_with_ttl, 0);
    }

    #[test]
    fn test_distant_deadline_survives_snapshot() {
        let ttl = Duration::from_secs(1_000_000_000_000_000);
        let engine = StorageEngine::new();
        engine.set_with_ttl(b("k"), b("v"), ttl).unwrap();

        let snapshot = engine.snapshot();
        let expires_at_ms = snapshot.strings[0].expires_at_ms.unwrap();
        assert!(expires_at_ms > 1_000_000_000_000_000_000);

        let restored = StorageEngine::from_snapshot(snapshot);
        let remaining = restored.ttl(b"k").unwrap();
        assert!(remaining > ttl - Duration::from_secs(60));
        assert!(remaining <= ttl);
    }

    #[test]
    fn test_concurrent_access() {
        let engine = Arc::new(StorageEngine::new());
        let mut handles = vec![];

        for i in 0..10 {
            let engine = Arc::clone(&engine);
            handles.push(thread::spawn(move || {
                for j in 0..100 {
                    let key = format!("key-{}-{}", i, j);
                    engine.set(Bytes::from(key.clone()), b("value")).unwrap();
                    engine.get(key.as_bytes()).unwrap();
                    engine.rpush(b("shared-list"), vec![b("x")]).unwrap();
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(engine.len(), 1001);
        assert_eq!(engine.list_items(b"shared-list").unwrap().unwrap().len(), 1000);
    }

    #[test]
    fn test_concurrent_set_same_key() {
        let engine = Arc::new(StorageEngine::new());

        let writers: Vec<_> = ["1", "2"]
            .into_iter()
            .enumerate()
            .map(|(i, value)| {
                let engine = Arc::clone(&engine);
                thread::spawn(move || {
                    for _ in 0..500 {
                        // The first writer uses a short TTL; the other none
                        if i == 0 {
                            engine
                                .set_with_ttl(b("k"), b(value), Duration::from_millis(5))
                                .unwrap();
                        } else {
                            engine.set(b("k"), b(value)).unwrap();
                        }
                    }
                })
            })
            .collect();

        for writer in writers {
            writer.join().unwrap();
        }

        // Make the last write win deterministically
        engine.set(b("k"), b("2")).unwrap();
        thread::sleep(Duration::from_millis(20));
        engine.cleanup_expired();

        assert_eq!(engine.get(b"k"), Ok(Some(b("2"))));
    }
}

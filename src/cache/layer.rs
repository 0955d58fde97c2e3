//! TTL-aware cache primitives over the storage backends.
//!
//! [`CacheContext`] is an explicitly owned object: construct one per process
//! (or per test) and pass it around. There is no module-level singleton, so
//! lifetimes stay visible and tests stay isolated.

use chrono::Utc;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;

use crate::storage::{probe, KvStore, MemoryStore, SqliteStore, StorageKind};

use super::keys::timestamp_key;

/// 1 minute.
pub const TTL_SHORT: i64 = 60 * 1_000;
/// 5 minutes. The default.
pub const TTL_MEDIUM: i64 = 5 * 60 * 1_000;
/// 30 minutes.
pub const TTL_LONG: i64 = 30 * 60 * 1_000;
/// Never expires.
pub const TTL_INFINITE: i64 = -1;

/// Per-call cache options: which backend, and how long entries stay fresh.
#[derive(Debug, Clone, Copy)]
pub struct CacheOptions {
  pub storage: StorageKind,
  /// Max age in milliseconds; [`TTL_INFINITE`] disables expiry.
  pub ttl_ms: i64,
}

impl Default for CacheOptions {
  fn default() -> Self {
    Self {
      storage: StorageKind::Session,
      ttl_ms: TTL_MEDIUM,
    }
  }
}

impl CacheOptions {
  pub fn with_storage(storage: StorageKind) -> Self {
    Self {
      storage,
      ..Self::default()
    }
  }

  pub fn with_ttl(ttl_ms: i64) -> Self {
    Self {
      ttl_ms,
      ..Self::default()
    }
  }

  pub fn new(storage: StorageKind, ttl_ms: i64) -> Self {
    Self { storage, ttl_ms }
  }
}

/// Cache primitives: get/set/remove/clear over a selected backend, with
/// paired timestamp bookkeeping for TTL checks.
///
/// Every payload write is paired with a timestamp write under the companion
/// key; the two are read and removed together. Session and local backends are
/// probed at construction; a backend that fails its probe is simply absent
/// and its traffic lands in the memory store instead. Callers never see a
/// storage error.
pub struct CacheContext {
  memory: MemoryStore,
  session: Option<SqliteStore>,
  local: Option<SqliteStore>,
}

impl CacheContext {
  /// Open the default session and local stores, degrading to memory for any
  /// that fails its liveness probe.
  pub fn open() -> Arc<Self> {
    let session = SqliteStore::open_session()
      .map_err(|e| tracing::warn!("session store unavailable: {e}"))
      .ok()
      .filter(|s| probe(s));
    let local = SqliteStore::open_local()
      .map_err(|e| tracing::warn!("local store unavailable: {e}"))
      .ok()
      .filter(|s| probe(s));

    Arc::new(Self {
      memory: MemoryStore::new(),
      session,
      local,
    })
  }

  /// Like [`Self::open`], with the stores under an explicit directory.
  pub fn open_at(data_dir: &std::path::Path) -> Arc<Self> {
    let session = SqliteStore::open_session_at(&data_dir.join("session.db"))
      .map_err(|e| tracing::warn!("session store unavailable: {e}"))
      .ok()
      .filter(|s| probe(s));
    let local = SqliteStore::open_local_at(&data_dir.join("local.db"))
      .map_err(|e| tracing::warn!("local store unavailable: {e}"))
      .ok()
      .filter(|s| probe(s));

    Arc::new(Self {
      memory: MemoryStore::new(),
      session,
      local,
    })
  }

  /// Context with every storage kind served from memory. Used when no
  /// persistent backend is usable at all.
  pub fn memory_only() -> Arc<Self> {
    Arc::new(Self {
      memory: MemoryStore::new(),
      session: None,
      local: None,
    })
  }

  /// Context backed by in-memory SQLite stores, exercising the real session
  /// and local code paths without touching disk.
  pub fn ephemeral() -> Arc<Self> {
    let session = SqliteStore::open_in_memory().ok();
    let local = SqliteStore::open_in_memory().ok();
    Arc::new(Self {
      memory: MemoryStore::new(),
      session,
      local,
    })
  }

  fn store_for(&self, kind: StorageKind) -> &dyn KvStore {
    match kind {
      StorageKind::Memory => &self.memory,
      StorageKind::Session => self
        .session
        .as_ref()
        .map(|s| s as &dyn KvStore)
        .unwrap_or(&self.memory),
      StorageKind::Local => self
        .local
        .as_ref()
        .map(|s| s as &dyn KvStore)
        .unwrap_or(&self.memory),
    }
  }

  /// Read a cached value.
  ///
  /// Returns `default` when the key is absent, the entry has outlived its
  /// TTL, or the stored JSON no longer deserializes. An expired entry is
  /// removed when observed, so `get` and [`Self::is_valid`] always agree.
  pub fn get<T: DeserializeOwned>(&self, key: &str, default: T, options: CacheOptions) -> T {
    let store = self.store_for(options.storage);
    let Some(raw) = store.get_item(key) else {
      return default;
    };

    if !entry_fresh(store, key, options.ttl_ms) {
      let _ = store.remove_item(key);
      let _ = store.remove_item(&timestamp_key(key));
      return default;
    }

    match serde_json::from_str(&raw) {
      Ok(value) => value,
      Err(e) => {
        tracing::debug!("discarding corrupted cache entry {key}: {e}");
        default
      }
    }
  }

  /// Write a value plus its timestamp companion.
  ///
  /// Never fails from the caller's point of view: a backend write failure
  /// falls back to the memory store.
  pub fn set<T: Serialize>(&self, key: &str, value: &T, options: CacheOptions) {
    let raw = match serde_json::to_string(value) {
      Ok(raw) => raw,
      Err(e) => {
        tracing::warn!("failed to serialize cache entry {key}: {e}");
        return;
      }
    };
    let now = Utc::now().timestamp_millis().to_string();

    let store = self.store_for(options.storage);
    let wrote = store
      .set_item(key, &raw)
      .and_then(|_| store.set_item(&timestamp_key(key), &now));
    if let Err(e) = wrote {
      tracing::debug!("backend write failed for {key}, using memory fallback: {e}");
      let _ = self.memory.set_item(key, &raw);
      let _ = self.memory.set_item(&timestamp_key(key), &now);
    }
  }

  /// Delete a payload and its timestamp together.
  pub fn remove(&self, key: &str, options: CacheOptions) {
    let store = self.store_for(options.storage);
    let _ = store.remove_item(key);
    let _ = store.remove_item(&timestamp_key(key));
  }

  /// Remove every entry whose key starts with `prefix`.
  ///
  /// Explicit prefix match, not substring: callers pass scope prefixes from
  /// [`super::keys`] and an id that happens to be a substring of another id
  /// cannot clear across scopes. Timestamp companions share the payload
  /// prefix and are swept in the same pass.
  pub fn clear_prefix(&self, prefix: &str, options: CacheOptions) {
    let store = self.store_for(options.storage);
    for key in store.keys() {
      if key.starts_with(prefix) {
        let _ = store.remove_item(&key);
      }
    }
  }

  /// True when the entry exists and its age is within the TTL.
  pub fn is_valid(&self, key: &str, options: CacheOptions) -> bool {
    let store = self.store_for(options.storage);
    store.get_item(key).is_some() && entry_fresh(store, key, options.ttl_ms)
  }

  /// Whether a caller should go to the remote store for this key.
  pub fn should_load_from_remote(&self, key: &str, options: CacheOptions) -> bool {
    !self.is_valid(key, options)
  }

  /// Direct access to the memory store, for entries that must never hit a
  /// persistent backend.
  pub(crate) fn memory_store(&self) -> &MemoryStore {
    &self.memory
  }
}

/// Age check against the timestamp companion.
///
/// A missing or unparsable timestamp means the entry predates timestamping
/// and carries no freshness claim; it is treated as always valid.
fn entry_fresh(store: &dyn KvStore, key: &str, ttl_ms: i64) -> bool {
  if ttl_ms == TTL_INFINITE {
    return true;
  }
  let Some(raw) = store.get_item(&timestamp_key(key)) else {
    return true;
  };
  let Ok(stored_at) = raw.parse::<i64>() else {
    return true;
  };
  Utc::now().timestamp_millis() - stored_at <= ttl_ms
}

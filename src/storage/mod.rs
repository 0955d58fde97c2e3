//! Key-value storage backends for the cache layer.
//!
//! Three interchangeable stores: an in-process map ([`MemoryStore`]), a
//! session-scoped SQLite store cleared on open, and a persistent SQLite store.
//! All expose the same synchronous item API; the cache layer picks one by
//! [`StorageKind`] and degrades to memory when a backend fails its liveness
//! probe.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use color_eyre::Result;

/// Which backing store a cache operation should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageKind {
  /// In-process map, lost when the context is dropped.
  Memory,
  /// Cleared at the start of every session.
  #[default]
  Session,
  /// Survives across sessions.
  Local,
}

/// Synchronous key-value store.
///
/// Mirrors the item API of a browser storage object: string keys, string
/// values, enumerable keys. Values are JSON text written by the cache layer.
pub trait KvStore: Send + Sync {
  /// Read a value; `None` when the key is absent.
  fn get_item(&self, key: &str) -> Option<String>;

  /// Write a value, replacing any previous one.
  fn set_item(&self, key: &str, value: &str) -> Result<()>;

  /// Delete a key. Deleting an absent key is not an error.
  fn remove_item(&self, key: &str) -> Result<()>;

  /// Snapshot of all keys currently present.
  fn keys(&self) -> Vec<String>;
}

const PROBE_KEY: &str = "__storage_probe__";

/// Check that a store can actually service writes.
///
/// Writes a sentinel key, reads it back, and removes it. Any failure (quota
/// exceeded, disabled store, poisoned lock) means the store is unusable and
/// the caller must fall back to memory. Errors are absorbed here, never
/// propagated.
pub fn probe(store: &dyn KvStore) -> bool {
  if let Err(e) = store.set_item(PROBE_KEY, "1") {
    tracing::debug!("storage probe write failed: {e}");
    return false;
  }
  let ok = store.get_item(PROBE_KEY).as_deref() == Some("1");
  if let Err(e) = store.remove_item(PROBE_KEY) {
    tracing::debug!("storage probe cleanup failed: {e}");
    return false;
  }
  ok
}

#[cfg(test)]
mod tests {
  use super::*;
  use color_eyre::eyre::eyre;

  struct BrokenStore;

  impl KvStore for BrokenStore {
    fn get_item(&self, _key: &str) -> Option<String> {
      None
    }
    fn set_item(&self, _key: &str, _value: &str) -> Result<()> {
      Err(eyre!("quota exceeded"))
    }
    fn remove_item(&self, _key: &str) -> Result<()> {
      Ok(())
    }
    fn keys(&self) -> Vec<String> {
      Vec::new()
    }
  }

  #[test]
  fn probe_accepts_working_store() {
    let store = MemoryStore::new();
    assert!(probe(&store));
    // The sentinel must not linger
    assert!(store.keys().is_empty());
  }

  #[test]
  fn probe_rejects_failing_store() {
    assert!(!probe(&BrokenStore));
  }
}

//! SQLite-backed key-value store, used for the session and local lifetimes.

use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::KvStore;

/// Schema for the key-value table.
const KV_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS kv (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// SQLite-based key-value store.
///
/// One store instance per lifetime: `open_local` keeps data across sessions,
/// `open_session` truncates the table on open so its contents live exactly one
/// process session.
pub struct SqliteStore {
  conn: Mutex<Connection>,
}

impl SqliteStore {
  /// Open the persistent store at the default location.
  pub fn open_local() -> Result<Self> {
    Self::open_local_at(&Self::default_dir()?.join("local.db"))
  }

  /// Open the session store at the default location, clearing previous
  /// contents.
  pub fn open_session() -> Result<Self> {
    Self::open_session_at(&Self::default_dir()?.join("session.db"))
  }

  /// Open a persistent store at an explicit path.
  pub fn open_local_at(path: &Path) -> Result<Self> {
    Self::open_at(path, false)
  }

  /// Open a session store at an explicit path, clearing previous contents.
  pub fn open_session_at(path: &Path) -> Result<Self> {
    Self::open_at(path, true)
  }

  /// In-memory database, for tests that want the SQLite code path without
  /// touching disk.
  pub fn open_in_memory() -> Result<Self> {
    let conn =
      Connection::open_in_memory().map_err(|e| eyre!("Failed to open in-memory store: {e}"))?;
    let store = Self {
      conn: Mutex::new(conn),
    };
    store.run_migrations()?;
    Ok(store)
  }

  fn open_at(path: &Path, truncate: bool) -> Result<Self> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create storage directory: {e}"))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open store at {}: {e}", path.display()))?;

    let store = Self {
      conn: Mutex::new(conn),
    };
    store.run_migrations()?;
    if truncate {
      store.clear_all()?;
    }

    Ok(store)
  }

  /// Default storage directory.
  pub fn default_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("storysync"))
  }

  fn run_migrations(&self) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {e}"))?;
    conn
      .execute_batch(KV_SCHEMA)
      .map_err(|e| eyre!("Failed to run storage migrations: {e}"))?;
    Ok(())
  }

  /// Delete every row. Session stores call this on open.
  pub fn clear_all(&self) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {e}"))?;
    conn
      .execute("DELETE FROM kv", [])
      .map_err(|e| eyre!("Failed to clear store: {e}"))?;
    Ok(())
  }
}

impl KvStore for SqliteStore {
  fn get_item(&self, key: &str) -> Option<String> {
    let conn = self.conn.lock().ok()?;
    conn
      .query_row("SELECT value FROM kv WHERE key = ?", params![key], |row| {
        row.get(0)
      })
      .ok()
  }

  fn set_item(&self, key: &str, value: &str) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {e}"))?;
    conn
      .execute(
        "INSERT OR REPLACE INTO kv (key, value) VALUES (?, ?)",
        params![key, value],
      )
      .map_err(|e| eyre!("Failed to store value: {e}"))?;
    Ok(())
  }

  fn remove_item(&self, key: &str) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {e}"))?;
    conn
      .execute("DELETE FROM kv WHERE key = ?", params![key])
      .map_err(|e| eyre!("Failed to remove value: {e}"))?;
    Ok(())
  }

  fn keys(&self) -> Vec<String> {
    let Ok(conn) = self.conn.lock() else {
      return Vec::new();
    };
    let Ok(mut stmt) = conn.prepare("SELECT key FROM kv") else {
      return Vec::new();
    };
    let Ok(rows) = stmt.query_map([], |row| row.get::<_, String>(0)) else {
      return Vec::new();
    };
    rows.filter_map(|r| r.ok()).collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn temp_db_path(tag: &str) -> PathBuf {
    let nanos = std::time::SystemTime::now()
      .duration_since(std::time::UNIX_EPOCH)
      .unwrap()
      .as_nanos();
    std::env::temp_dir().join(format!("storysync-test-{tag}-{}-{nanos}.db", std::process::id()))
  }

  #[test]
  fn round_trips_values() {
    let store = SqliteStore::open_in_memory().unwrap();
    store.set_item("k", "v").unwrap();
    assert_eq!(store.get_item("k").as_deref(), Some("v"));
    store.set_item("k", "v2").unwrap();
    assert_eq!(store.get_item("k").as_deref(), Some("v2"));
    store.remove_item("k").unwrap();
    assert_eq!(store.get_item("k"), None);
  }

  #[test]
  fn keys_enumerates_entries() {
    let store = SqliteStore::open_in_memory().unwrap();
    store.set_item("a", "1").unwrap();
    store.set_item("b", "2").unwrap();
    let mut keys = store.keys();
    keys.sort();
    assert_eq!(keys, vec!["a", "b"]);
  }

  #[test]
  fn session_store_clears_on_open() {
    let path = temp_db_path("session");

    {
      let store = SqliteStore::open_session_at(&path).unwrap();
      store.set_item("left-over", "1").unwrap();
    }
    {
      let store = SqliteStore::open_session_at(&path).unwrap();
      assert_eq!(store.get_item("left-over"), None);
    }

    let _ = std::fs::remove_file(&path);
  }

  #[test]
  fn local_store_keeps_data_across_opens() {
    let path = temp_db_path("local");

    {
      let store = SqliteStore::open_local_at(&path).unwrap();
      store.set_item("durable", "1").unwrap();
    }
    {
      let store = SqliteStore::open_local_at(&path).unwrap();
      assert_eq!(store.get_item("durable").as_deref(), Some("1"));
    }

    let _ = std::fs::remove_file(&path);
  }
}

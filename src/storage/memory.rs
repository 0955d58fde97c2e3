//! In-process map backend, the fallback of last resort.

use color_eyre::{eyre::eyre, Result};
use std::collections::HashMap;
use std::sync::Mutex;

use super::KvStore;

/// In-memory key-value store.
///
/// Always available; used directly for memory-kind cache entries and as the
/// degraded target when a persistent backend fails its probe or a write.
#[derive(Default)]
pub struct MemoryStore {
  map: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }
}

impl KvStore for MemoryStore {
  fn get_item(&self, key: &str) -> Option<String> {
    self.map.lock().ok()?.get(key).cloned()
  }

  fn set_item(&self, key: &str, value: &str) -> Result<()> {
    let mut map = self.map.lock().map_err(|e| eyre!("lock poisoned: {e}"))?;
    map.insert(key.to_string(), value.to_string());
    Ok(())
  }

  fn remove_item(&self, key: &str) -> Result<()> {
    let mut map = self.map.lock().map_err(|e| eyre!("lock poisoned: {e}"))?;
    map.remove(key);
    Ok(())
  }

  fn keys(&self) -> Vec<String> {
    match self.map.lock() {
      Ok(map) => map.keys().cloned().collect(),
      Err(_) => Vec::new(),
    }
  }
}

//! Project context cache.
//!
//! Structured context data goes through the normal session-backed path.
//! Formatted context strings are different: they can run to hundreds of
//! kilobytes and are cheap to rebuild from the structured form, so persisting
//! them only risks quota for no durability benefit. They are pinned to the
//! memory store.

use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;

use super::keys::{cache_key, scoped_prefix, scoped_sub_prefix, EntityKind};
use super::layer::{CacheContext, CacheOptions};
use crate::storage::StorageKind;

const FORMATTED: &str = "formatted";

/// Typed facade for cached project context.
#[derive(Clone)]
pub struct ProjectContextCache {
  ctx: Arc<CacheContext>,
  options: CacheOptions,
  memory_options: CacheOptions,
}

impl ProjectContextCache {
  pub fn new(ctx: Arc<CacheContext>) -> Self {
    Self {
      ctx,
      options: CacheOptions::default(),
      memory_options: CacheOptions::with_storage(StorageKind::Memory),
    }
  }

  pub fn get<T: DeserializeOwned>(&self, project_id: &str, default: T) -> T {
    let key = cache_key(EntityKind::Context, project_id, None);
    self.ctx.get(&key, default, self.options)
  }

  pub fn set<T: Serialize>(&self, project_id: &str, value: &T) {
    let key = cache_key(EntityKind::Context, project_id, None);
    self.ctx.set(&key, value, self.options);
  }

  /// Formatted context string, memory-only.
  pub fn get_formatted(&self, project_id: &str) -> Option<String> {
    let key = cache_key(EntityKind::Context, project_id, Some(FORMATTED));
    self.ctx.get(&key, None, self.memory_options)
  }

  /// Store a formatted context string, memory-only.
  pub fn set_formatted(&self, project_id: &str, formatted: &str) {
    let key = cache_key(EntityKind::Context, project_id, Some(FORMATTED));
    self.ctx.set(&key, &formatted, self.memory_options);
  }

  pub fn clear_project(&self, project_id: &str) {
    self
      .ctx
      .clear_prefix(&scoped_prefix(EntityKind::Context, project_id), self.options);
    self.ctx.clear_prefix(
      &scoped_sub_prefix(EntityKind::Context, FORMATTED, project_id),
      self.memory_options,
    );
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::keys::timestamp_key;
  use crate::storage::KvStore;

  #[test]
  fn formatted_strings_never_touch_persistent_storage() {
    let ctx = CacheContext::ephemeral();
    let cache = ProjectContextCache::new(Arc::clone(&ctx));

    cache.set_formatted("p1", "## Project context\nlong formatted text");

    assert_eq!(
      cache.get_formatted("p1").as_deref(),
      Some("## Project context\nlong formatted text")
    );
    // The memory store holds the pair; nothing with the formatted sub-key
    // may appear in a persistent backend.
    let key = cache_key(EntityKind::Context, "p1", Some(FORMATTED));
    assert!(ctx.memory_store().get_item(&key).is_some());
    assert!(ctx.memory_store().get_item(&timestamp_key(&key)).is_some());
  }

  #[test]
  fn clear_project_drops_structured_and_formatted() {
    let cache = ProjectContextCache::new(CacheContext::ephemeral());
    cache.set("p1", &serde_json::json!({"stories": 3}));
    cache.set_formatted("p1", "text");

    cache.clear_project("p1");

    let structured: serde_json::Value = cache.get("p1", serde_json::Value::Null);
    assert!(structured.is_null());
    assert_eq!(cache.get_formatted("p1"), None);
  }
}

//! Project record cache.

use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;

use super::keys::{cache_key, scoped_prefix, EntityKind};
use super::layer::{CacheContext, CacheOptions, TTL_LONG};

/// Typed facade for cached project records.
///
/// Project records change rarely, so they get the long TTL.
#[derive(Clone)]
pub struct ProjectCache {
  ctx: Arc<CacheContext>,
  options: CacheOptions,
}

impl ProjectCache {
  pub fn new(ctx: Arc<CacheContext>) -> Self {
    Self {
      ctx,
      options: CacheOptions::with_ttl(TTL_LONG),
    }
  }

  pub fn get<T: DeserializeOwned>(&self, project_id: &str, default: T) -> T {
    let key = cache_key(EntityKind::Project, project_id, None);
    self.ctx.get(&key, default, self.options)
  }

  pub fn set<T: Serialize>(&self, project_id: &str, value: &T) {
    let key = cache_key(EntityKind::Project, project_id, None);
    self.ctx.set(&key, value, self.options);
  }

  pub fn remove(&self, project_id: &str) {
    let key = cache_key(EntityKind::Project, project_id, None);
    self.ctx.remove(&key, self.options);
  }

  pub fn is_valid(&self, project_id: &str) -> bool {
    let key = cache_key(EntityKind::Project, project_id, None);
    self.ctx.is_valid(&key, self.options)
  }

  pub fn clear_project(&self, project_id: &str) {
    self
      .ctx
      .clear_prefix(&scoped_prefix(EntityKind::Project, project_id), self.options);
  }
}

//! Activity cache, keyed by project + activity.

use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;

use super::keys::{cache_key, scoped_prefix, EntityKind};
use super::layer::{CacheContext, CacheOptions};

/// Typed facade for cached activity data.
#[derive(Clone)]
pub struct ActivityCache {
  ctx: Arc<CacheContext>,
  options: CacheOptions,
}

impl ActivityCache {
  pub fn new(ctx: Arc<CacheContext>) -> Self {
    Self {
      ctx,
      options: CacheOptions::default(),
    }
  }

  fn key(project_id: &str, activity_id: &str) -> String {
    cache_key(
      EntityKind::Activity,
      &format!("{project_id}_{activity_id}"),
      None,
    )
  }

  pub fn get<T: DeserializeOwned>(&self, project_id: &str, activity_id: &str, default: T) -> T {
    self
      .ctx
      .get(&Self::key(project_id, activity_id), default, self.options)
  }

  pub fn set<T: Serialize>(&self, project_id: &str, activity_id: &str, value: &T) {
    self
      .ctx
      .set(&Self::key(project_id, activity_id), value, self.options);
  }

  pub fn remove(&self, project_id: &str, activity_id: &str) {
    self.ctx.remove(&Self::key(project_id, activity_id), self.options);
  }

  /// Drop every activity entry for a project.
  pub fn clear_project(&self, project_id: &str) {
    self
      .ctx
      .clear_prefix(&scoped_prefix(EntityKind::Activity, project_id), self.options);
  }
}

//! Activity response cache with two addressing schemes.
//!
//! Responses are reachable by `(project, activity)` and by the fuller
//! `(project, phase, step, activity)` path. The save path in
//! [`crate::remote::operations`] keeps the two consistent by writing the path
//! key under every historically used phase alias.

use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;

use super::keys::{cache_key, response_path_key, scoped_prefix, EntityKind};
use super::layer::{CacheContext, CacheOptions};

/// Typed facade for cached activity responses.
#[derive(Clone)]
pub struct ResponseCache {
  ctx: Arc<CacheContext>,
  options: CacheOptions,
}

impl ResponseCache {
  pub fn new(ctx: Arc<CacheContext>) -> Self {
    Self {
      ctx,
      options: CacheOptions::default(),
    }
  }

  fn activity_key(project_id: &str, activity_id: &str) -> String {
    cache_key(
      EntityKind::Response,
      &format!("{project_id}_{activity_id}"),
      None,
    )
  }

  /// Read by the short `(project, activity)` address.
  pub fn get<T: DeserializeOwned>(&self, project_id: &str, activity_id: &str, default: T) -> T {
    self
      .ctx
      .get(&Self::activity_key(project_id, activity_id), default, self.options)
  }

  /// Write by the short `(project, activity)` address.
  pub fn set<T: Serialize>(&self, project_id: &str, activity_id: &str, value: &T) {
    self
      .ctx
      .set(&Self::activity_key(project_id, activity_id), value, self.options);
  }

  /// Read by the full `(project, phase, step, activity)` path.
  pub fn get_by_path<T: DeserializeOwned>(
    &self,
    project_id: &str,
    phase_id: &str,
    step_id: &str,
    activity_id: &str,
    default: T,
  ) -> T {
    let key = response_path_key(project_id, phase_id, step_id, activity_id);
    self.ctx.get(&key, default, self.options)
  }

  /// Write by the full path.
  pub fn set_by_path<T: Serialize>(
    &self,
    project_id: &str,
    phase_id: &str,
    step_id: &str,
    activity_id: &str,
    value: &T,
  ) {
    let key = response_path_key(project_id, phase_id, step_id, activity_id);
    self.ctx.set(&key, value, self.options);
  }

  /// Remove a path-addressed entry.
  pub fn remove_by_path(
    &self,
    project_id: &str,
    phase_id: &str,
    step_id: &str,
    activity_id: &str,
  ) {
    let key = response_path_key(project_id, phase_id, step_id, activity_id);
    self.ctx.remove(&key, self.options);
  }

  /// Whether the path-addressed entry is still fresh.
  pub fn is_valid_by_path(
    &self,
    project_id: &str,
    phase_id: &str,
    step_id: &str,
    activity_id: &str,
  ) -> bool {
    let key = response_path_key(project_id, phase_id, step_id, activity_id);
    self.ctx.is_valid(&key, self.options)
  }

  /// Drop every response entry for a project, in both addressing schemes.
  ///
  /// Both key forms start with `response_<project>_`, so one prefix covers
  /// them.
  pub fn clear_project(&self, project_id: &str) {
    self
      .ctx
      .clear_prefix(&scoped_prefix(EntityKind::Response, project_id), self.options);
  }
}

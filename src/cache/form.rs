//! Form settings cache, keyed per project with per-section sub-keys.

use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;

use super::keys::{cache_key, scoped_prefix, scoped_sub_prefix, EntityKind};
use super::layer::{CacheContext, CacheOptions};

/// The form editor sections cached under their own sub-keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormSection {
  Appearance,
  Questions,
  Notifications,
}

impl FormSection {
  const ALL: [FormSection; 3] = [
    FormSection::Appearance,
    FormSection::Questions,
    FormSection::Notifications,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Appearance => "appearance",
      Self::Questions => "questions",
      Self::Notifications => "notifications",
    }
  }
}

/// Typed facade for cached form settings.
#[derive(Clone)]
pub struct FormCache {
  ctx: Arc<CacheContext>,
  options: CacheOptions,
}

impl FormCache {
  pub fn new(ctx: Arc<CacheContext>) -> Self {
    Self {
      ctx,
      options: CacheOptions::default(),
    }
  }

  pub fn get<T: DeserializeOwned>(&self, project_id: &str, default: T) -> T {
    let key = cache_key(EntityKind::Form, project_id, None);
    self.ctx.get(&key, default, self.options)
  }

  pub fn set<T: Serialize>(&self, project_id: &str, value: &T) {
    let key = cache_key(EntityKind::Form, project_id, None);
    self.ctx.set(&key, value, self.options);
  }

  pub fn get_section<T: DeserializeOwned>(
    &self,
    project_id: &str,
    section: FormSection,
    default: T,
  ) -> T {
    let key = cache_key(EntityKind::Form, project_id, Some(section.as_str()));
    self.ctx.get(&key, default, self.options)
  }

  pub fn set_section<T: Serialize>(&self, project_id: &str, section: FormSection, value: &T) {
    let key = cache_key(EntityKind::Form, project_id, Some(section.as_str()));
    self.ctx.set(&key, value, self.options);
  }

  pub fn remove(&self, project_id: &str) {
    let key = cache_key(EntityKind::Form, project_id, None);
    self.ctx.remove(&key, self.options);
  }

  /// Drop every form entry for a project: the base key and each section.
  pub fn clear_project(&self, project_id: &str) {
    self
      .ctx
      .clear_prefix(&scoped_prefix(EntityKind::Form, project_id), self.options);
    for section in FormSection::ALL {
      let prefix = scoped_sub_prefix(EntityKind::Form, section.as_str(), project_id);
      self.ctx.clear_prefix(&prefix, self.options);
    }
  }
}

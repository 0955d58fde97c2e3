//! Story question sync.
//!
//! One question string per project, with a global project-less fallback used
//! before a project has its own. The question is never deleted, only
//! overwritten; a separate "has ever been saved" flag lets the UI tell
//! "never configured" apart from "configured but currently empty".

use serde_json::{json, Value};
use std::sync::Arc;

use crate::cache::keys::{cache_key, EntityKind};
use crate::cache::{CacheContext, CacheOptions, TTL_INFINITE};
use crate::remote::{RemoteStore, ResponsePayload};
use crate::storage::StorageKind;

use super::locations::{Location, STORY_QUESTION};
use super::{write_response, InflightRegistry, SaveOutcome};

const RESPONSE_KEY: &str = "storyQuestion";
const ENTITY: &str = "story-question";
const SAVED_FLAG: &str = "story-question-saved";
const GLOBAL_ID: &str = "global";

/// Local-first sync for a project's story question.
pub struct StoryQuestionSync<R: RemoteStore> {
  ctx: Arc<CacheContext>,
  remote: Arc<R>,
  inflight: Arc<InflightRegistry>,
}

impl<R: RemoteStore> StoryQuestionSync<R> {
  pub fn new(ctx: Arc<CacheContext>, remote: Arc<R>, inflight: Arc<InflightRegistry>) -> Self {
    Self {
      ctx,
      remote,
      inflight,
    }
  }

  fn local_options() -> CacheOptions {
    CacheOptions::new(StorageKind::Local, TTL_INFINITE)
  }

  fn question_key(project_id: &str) -> String {
    cache_key(EntityKind::Form, project_id, Some(ENTITY))
  }

  fn flag_key(project_id: &str) -> String {
    cache_key(EntityKind::Form, project_id, Some(SAVED_FLAG))
  }

  /// The locally stored question: the project's own, else the global
  /// fallback, else empty.
  pub fn local(&self, project_id: &str) -> String {
    let own: Option<String> =
      self
        .ctx
        .get(&Self::question_key(project_id), None, Self::local_options());
    own
      .or_else(|| {
        self
          .ctx
          .get(&Self::question_key(GLOBAL_ID), None, Self::local_options())
      })
      .unwrap_or_default()
  }

  /// Whether a question was ever saved for this project, independent of the
  /// current value.
  pub fn has_been_saved(&self, project_id: &str) -> bool {
    self
      .ctx
      .get(&Self::flag_key(project_id), false, Self::local_options())
  }

  fn store_local(&self, project_id: &str, question: &str) {
    let options = Self::local_options();
    self.ctx.set(&Self::question_key(project_id), &question, options);
    self.ctx.set(&Self::question_key(GLOBAL_ID), &question, options);
    self.ctx.set(&Self::flag_key(project_id), &true, options);
  }

  async fn fetch_location(&self, location: &Location, project_id: &str) -> Option<String> {
    let row = self
      .remote
      .fetch_latest(&location.address(project_id))
      .await
      .map_err(|e| tracing::debug!("story fetch at {location:?} failed: {e}"))
      .ok()??;
    let value = ResponsePayload::decode(row.response).field(RESPONSE_KEY)?;
    let question = value.as_str()?.trim().to_string();
    (!question.is_empty()).then_some(question)
  }

  /// Load the question: canonical, then legacy with migration, then local.
  pub async fn load(&self, project_id: &str) -> String {
    let local = self.local(project_id);
    if !self.remote.is_authenticated() {
      return local;
    }

    let _guard = self.inflight.acquire(project_id, ENTITY).await;

    if let Some(question) = self
      .fetch_location(&STORY_QUESTION.canonical, project_id)
      .await
    {
      self.store_local(project_id, &question);
      return question;
    }

    for location in STORY_QUESTION.legacy {
      if let Some(question) = self.fetch_location(location, project_id).await {
        tracing::info!(
          "migrating story question for {project_id} from {}/{}/{}",
          location.phase,
          location.step,
          location.activity
        );
        let canonical = STORY_QUESTION.canonical.address(project_id);
        let value = json!({ RESPONSE_KEY: question });
        if let Err(e) = write_response(self.remote.as_ref(), &canonical, &value).await {
          tracing::warn!("story migration write failed for {project_id}: {e}");
        }
        self.store_local(project_id, &question);
        return question;
      }
    }

    local
  }

  /// Save locally (project key, global fallback, saved flag) and, when
  /// signed in, replicate to the canonical location.
  pub async fn save(&self, project_id: &str, question: &str) -> SaveOutcome {
    let cleaned = question.trim().to_string();
    self.store_local(project_id, &cleaned);

    if !self.remote.is_authenticated() {
      return SaveOutcome::local_only();
    }

    let canonical = STORY_QUESTION.canonical.address(project_id);
    let value: Value = json!({ RESPONSE_KEY: cleaned });
    match write_response(self.remote.as_ref(), &canonical, &value).await {
      Ok(()) => SaveOutcome::replicated(),
      Err(e) => {
        tracing::warn!("story save failed for {project_id}: {e}");
        SaveOutcome::local_only()
      }
    }
  }
}

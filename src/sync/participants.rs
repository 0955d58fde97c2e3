//! Participant question sync.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::cache::keys::{cache_key, EntityKind};
use crate::cache::{CacheContext, CacheOptions, TTL_INFINITE};
use crate::remote::{RemoteStore, ResponsePayload};
use crate::storage::StorageKind;

use super::locations::{Location, PARTICIPANT_QUESTIONS};
use super::{collapse_ws, write_response, InflightRegistry, SaveOutcome};

const RESPONSE_KEY: &str = "participantQuestions";
const ENTITY: &str = "participant-questions";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantChoice {
  pub id: String,
  pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantQuestion {
  pub id: String,
  pub label: String,
  #[serde(default)]
  pub checked: bool,
  #[serde(default)]
  pub choices: Vec<ParticipantChoice>,
}

fn text_or_number(value: Option<&Value>) -> Option<String> {
  match value? {
    Value::String(s) => Some(s.clone()),
    Value::Number(n) => Some(n.to_string()),
    _ => None,
  }
}

/// Coerce raw records into well-formed questions. Entries without a usable
/// id are dropped; `checked` defaults to false; a malformed choices field
/// becomes an empty list rather than an error.
pub fn clean_participant_questions(raw: &[Value]) -> Vec<ParticipantQuestion> {
  raw
    .iter()
    .filter_map(|value| {
      let obj = value.as_object()?;
      let id = text_or_number(obj.get("id"))?;

      let choices = obj
        .get("choices")
        .and_then(Value::as_array)
        .map(|items| {
          items
            .iter()
            .filter_map(|choice| {
              let choice = choice.as_object()?;
              Some(ParticipantChoice {
                id: text_or_number(choice.get("id"))?,
                label: collapse_ws(choice.get("label")?.as_str()?),
              })
            })
            .collect()
        })
        .unwrap_or_default();

      Some(ParticipantQuestion {
        id,
        label: obj
          .get("label")
          .and_then(Value::as_str)
          .map(collapse_ws)
          .unwrap_or_default(),
        checked: obj.get("checked").and_then(Value::as_bool).unwrap_or(false),
        choices,
      })
    })
    .collect()
}

/// Local-first sync for a project's participant questions.
pub struct ParticipantQuestionSync<R: RemoteStore> {
  ctx: Arc<CacheContext>,
  remote: Arc<R>,
  inflight: Arc<InflightRegistry>,
}

impl<R: RemoteStore> ParticipantQuestionSync<R> {
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

  fn local_key(project_id: &str) -> String {
    cache_key(EntityKind::Form, project_id, Some(ENTITY))
  }

  pub fn local(&self, project_id: &str) -> Vec<ParticipantQuestion> {
    self
      .ctx
      .get(&Self::local_key(project_id), Vec::new(), Self::local_options())
  }

  fn store_local(&self, project_id: &str, questions: &[ParticipantQuestion]) {
    self
      .ctx
      .set(&Self::local_key(project_id), &questions, Self::local_options());
  }

  async fn fetch_location(
    &self,
    location: &Location,
    project_id: &str,
  ) -> Option<Vec<ParticipantQuestion>> {
    let row = self
      .remote
      .fetch_latest(&location.address(project_id))
      .await
      .map_err(|e| tracing::debug!("participant fetch at {location:?} failed: {e}"))
      .ok()??;
    let items = ResponsePayload::decode(row.response).field(RESPONSE_KEY)?;
    let cleaned = clean_participant_questions(items.as_array()?);
    (!cleaned.is_empty()).then_some(cleaned)
  }

  /// Load the questions: canonical, then legacy with migration, then local.
  pub async fn load(&self, project_id: &str) -> Vec<ParticipantQuestion> {
    let local = self.local(project_id);
    if !self.remote.is_authenticated() {
      return local;
    }

    let _guard = self.inflight.acquire(project_id, ENTITY).await;

    if let Some(questions) = self
      .fetch_location(&PARTICIPANT_QUESTIONS.canonical, project_id)
      .await
    {
      self.store_local(project_id, &questions);
      return questions;
    }

    for location in PARTICIPANT_QUESTIONS.legacy {
      if let Some(questions) = self.fetch_location(location, project_id).await {
        tracing::info!(
          "migrating participant questions for {project_id} from {}/{}/{}",
          location.phase,
          location.step,
          location.activity
        );
        let value = json!({ RESPONSE_KEY: questions });
        let canonical = PARTICIPANT_QUESTIONS.canonical.address(project_id);
        if let Err(e) = write_response(self.remote.as_ref(), &canonical, &value).await {
          tracing::warn!("participant migration write failed for {project_id}: {e}");
        }
        self.store_local(project_id, &questions);
        return questions;
      }
    }

    local
  }

  /// Save locally and, when signed in, replicate to the canonical location.
  pub async fn save(&self, project_id: &str, questions: &[ParticipantQuestion]) -> SaveOutcome {
    let raw = match serde_json::to_value(questions) {
      Ok(Value::Array(items)) => items,
      _ => Vec::new(),
    };
    let cleaned = clean_participant_questions(&raw);
    self.store_local(project_id, &cleaned);

    if !self.remote.is_authenticated() {
      return SaveOutcome::local_only();
    }

    let value = json!({ RESPONSE_KEY: cleaned });
    let canonical = PARTICIPANT_QUESTIONS.canonical.address(project_id);
    match write_response(self.remote.as_ref(), &canonical, &value).await {
      Ok(()) => SaveOutcome::replicated(),
      Err(e) => {
        tracing::warn!("participant save failed for {project_id}: {e}");
        SaveOutcome::local_only()
      }
    }
  }
}

//! Slider question sync: canonical/legacy reconciliation plus cleaning.

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::cache::keys::{cache_key, EntityKind};
use crate::cache::{CacheContext, CacheOptions, TTL_INFINITE};
use crate::remote::{RemoteStore, ResponsePayload};
use crate::storage::StorageKind;

use super::locations::{Location, SLIDER_QUESTIONS};
use super::{collapse_ws, write_response, InflightRegistry, SaveOutcome};

const RESPONSE_KEY: &str = "sliderQuestions";
const ENTITY: &str = "slider-questions";
const DEFAULT_LEFT_LABEL: &str = "Not at all";
const DEFAULT_RIGHT_LABEL: &str = "Very much";
const DEFAULT_SLIDER_VALUE: f64 = 50.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SliderQuestion {
  pub id: i64,
  #[serde(default)]
  pub theme: String,
  #[serde(default)]
  pub question: String,
  #[serde(default)]
  pub left_label: String,
  #[serde(default)]
  pub right_label: String,
  #[serde(default = "default_slider_value")]
  pub slider_value: f64,
}

fn default_slider_value() -> f64 {
  DEFAULT_SLIDER_VALUE
}

/// Coerce raw records into well-formed questions.
///
/// Legacy locations hold heterogeneous rows, so this is lenient: non-object
/// entries are dropped, text fields are trimmed and whitespace-collapsed,
/// missing labels get the defaults, a missing slider value becomes the
/// midpoint, and a missing id falls back to the 1-based position.
pub fn clean_slider_questions(raw: &[Value]) -> Vec<SliderQuestion> {
  raw
    .iter()
    .enumerate()
    .filter_map(|(i, value)| {
      let obj = value.as_object()?;
      let text = |key: &str| {
        obj
          .get(key)
          .and_then(Value::as_str)
          .map(collapse_ws)
          .unwrap_or_default()
      };

      let left_label = text("leftLabel");
      let right_label = text("rightLabel");
      Some(SliderQuestion {
        id: obj
          .get("id")
          .and_then(Value::as_i64)
          .unwrap_or((i + 1) as i64),
        theme: text("theme"),
        question: text("question"),
        left_label: if left_label.is_empty() {
          DEFAULT_LEFT_LABEL.to_string()
        } else {
          left_label
        },
        right_label: if right_label.is_empty() {
          DEFAULT_RIGHT_LABEL.to_string()
        } else {
          right_label
        },
        slider_value: obj
          .get("sliderValue")
          .and_then(Value::as_f64)
          .unwrap_or(DEFAULT_SLIDER_VALUE),
      })
    })
    .collect()
}

/// Local-first sync for a project's slider questions.
pub struct SliderQuestionSync<R: RemoteStore> {
  ctx: Arc<CacheContext>,
  remote: Arc<R>,
  inflight: Arc<InflightRegistry>,
}

impl<R: RemoteStore> SliderQuestionSync<R> {
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

  /// The locally cached questions; empty when nothing was ever saved.
  pub fn local(&self, project_id: &str) -> Vec<SliderQuestion> {
    self
      .ctx
      .get(&Self::local_key(project_id), Vec::new(), Self::local_options())
  }

  fn store_local(&self, project_id: &str, questions: &[SliderQuestion]) {
    self
      .ctx
      .set(&Self::local_key(project_id), &questions, Self::local_options());
  }

  async fn fetch_location(
    &self,
    location: &Location,
    project_id: &str,
  ) -> Option<Vec<SliderQuestion>> {
    let row = self
      .remote
      .fetch_latest(&location.address(project_id))
      .await
      .map_err(|e| tracing::debug!("slider fetch at {location:?} failed: {e}"))
      .ok()??;
    let items = ResponsePayload::decode(row.response).field(RESPONSE_KEY)?;
    let cleaned = clean_slider_questions(items.as_array()?);
    (!cleaned.is_empty()).then_some(cleaned)
  }

  /// Load the questions, preferring remote data when signed in.
  ///
  /// Canonical location first, then each legacy location in priority order;
  /// a legacy hit is migrated to the canonical (and public-form) locations
  /// before returning. Concurrent loads for the same project coalesce on the
  /// in-flight registry, so the migration runs once.
  pub async fn load(&self, project_id: &str) -> Vec<SliderQuestion> {
    let local = self.local(project_id);
    if !self.remote.is_authenticated() {
      return local;
    }

    let _guard = self.inflight.acquire(project_id, ENTITY).await;

    // Re-checked under the guard: a coalesced reader sees the migration the
    // first reader just wrote
    if let Some(questions) = self
      .fetch_location(&SLIDER_QUESTIONS.canonical, project_id)
      .await
    {
      self.store_local(project_id, &questions);
      return questions;
    }

    for location in SLIDER_QUESTIONS.legacy {
      if let Some(questions) = self.fetch_location(location, project_id).await {
        tracing::info!(
          "migrating slider questions for {project_id} from {}/{}/{}",
          location.phase,
          location.step,
          location.activity
        );
        self.migrate(project_id, &questions).await;
        self.store_local(project_id, &questions);
        return questions;
      }
    }

    local
  }

  /// Write legacy data forward to the canonical and public-form locations.
  /// Best-effort: a failed migration write leaves the legacy data in place
  /// for the next read to retry.
  async fn migrate(&self, project_id: &str, questions: &[SliderQuestion]) {
    let value = json!({ RESPONSE_KEY: questions });
    let canonical = SLIDER_QUESTIONS.canonical.address(project_id);
    if let Err(e) = write_response(self.remote.as_ref(), &canonical, &value).await {
      tracing::warn!("slider migration write failed for {project_id}: {e}");
      return;
    }

    let secondary = SLIDER_QUESTIONS.secondary.iter().map(|location| {
      let addr = location.address(project_id);
      let value = &value;
      async move { write_response(self.remote.as_ref(), &addr, value).await }
    });
    for result in join_all(secondary).await {
      if let Err(e) = result {
        tracing::warn!("secondary slider write failed for {project_id}: {e}");
      }
    }
  }

  /// Save cleaned questions locally and, when signed in, replicate to the
  /// canonical and public-form locations.
  pub async fn save(&self, project_id: &str, questions: &[SliderQuestion]) -> SaveOutcome {
    let raw = match serde_json::to_value(questions) {
      Ok(Value::Array(items)) => items,
      _ => Vec::new(),
    };
    let cleaned = clean_slider_questions(&raw);
    self.store_local(project_id, &cleaned);

    if !self.remote.is_authenticated() {
      return SaveOutcome::local_only();
    }

    let value = json!({ RESPONSE_KEY: cleaned });
    let targets = std::iter::once(&SLIDER_QUESTIONS.canonical)
      .chain(SLIDER_QUESTIONS.secondary.iter())
      .map(|location| {
        let addr = location.address(project_id);
        let value = &value;
        async move { write_response(self.remote.as_ref(), &addr, value).await }
      });

    let mut remote_ok = true;
    for result in join_all(targets).await {
      if let Err(e) = result {
        tracing::warn!("slider save failed for {project_id}: {e}");
        remote_ok = false;
      }
    }

    SaveOutcome {
      local: true,
      remote: remote_ok,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::remote::fake::FakeRemote;
  use serde_json::json;

  fn service(remote: Arc<FakeRemote>) -> SliderQuestionSync<FakeRemote> {
    SliderQuestionSync::new(
      CacheContext::ephemeral(),
      remote,
      Arc::new(InflightRegistry::new()),
    )
  }

  fn question(id: i64, text: &str) -> SliderQuestion {
    SliderQuestion {
      id,
      theme: "belonging".to_string(),
      question: text.to_string(),
      left_label: DEFAULT_LEFT_LABEL.to_string(),
      right_label: DEFAULT_RIGHT_LABEL.to_string(),
      slider_value: DEFAULT_SLIDER_VALUE,
    }
  }

  #[test]
  fn cleaning_substitutes_defaults_field_by_field() {
    let cleaned = clean_slider_questions(&[
      json!({"id": 1, "theme": "  community \n spirit ", "question": "How connected?"}),
      json!({"question": "No id", "leftLabel": " Never ", "rightLabel": "Always", "sliderValue": 10}),
      json!("not an object"),
    ]);

    assert_eq!(cleaned.len(), 2);
    assert_eq!(cleaned[0].theme, "community spirit");
    assert_eq!(cleaned[0].left_label, DEFAULT_LEFT_LABEL);
    assert_eq!(cleaned[0].right_label, DEFAULT_RIGHT_LABEL);
    assert_eq!(cleaned[0].slider_value, DEFAULT_SLIDER_VALUE);
    // position fallback for the missing id
    assert_eq!(cleaned[1].id, 2);
    assert_eq!(cleaned[1].left_label, "Never");
    assert_eq!(cleaned[1].slider_value, 10.0);
  }

  #[tokio::test]
  async fn unauthenticated_load_and_save_stay_local() {
    let remote = Arc::new(FakeRemote::new());
    let sync = service(Arc::clone(&remote));

    let outcome = sync.save("p1", &[question(1, "How welcome did you feel?")]).await;
    assert_eq!(outcome, SaveOutcome::local_only());

    let loaded = sync.load("p1").await;
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].question, "How welcome did you feel?");
    let canonical = SLIDER_QUESTIONS.canonical.address("p1");
    assert_eq!(remote.saves_of(&canonical), 0);
  }

  #[tokio::test]
  async fn legacy_data_is_returned_cleaned_and_migrated_to_canonical() {
    let remote = Arc::new(FakeRemote::signed_in());
    let legacy_addr = SLIDER_QUESTIONS.legacy[0].address("p1");
    remote.put(
      legacy_addr.clone(),
      json!({"sliderQuestions": [{"id": 7, "question": "  Old   question "}]}),
    );
    let sync = service(Arc::clone(&remote));

    let loaded = sync.load("p1").await;
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].question, "Old question");
    assert_eq!(loaded[0].left_label, DEFAULT_LEFT_LABEL);

    // Canonical and public-form locations now hold the cleaned set
    let canonical = SLIDER_QUESTIONS.canonical.address("p1");
    let public_form = SLIDER_QUESTIONS.secondary[0].address("p1");
    let migrated = remote.get(&canonical).unwrap();
    assert_eq!(migrated["sliderQuestions"][0]["question"], "Old question");
    assert_eq!(remote.get(&public_form), Some(migrated));

    // A second load is served from canonical without re-querying legacy
    let again = sync.load("p1").await;
    assert_eq!(again, loaded);
    assert_eq!(remote.fetches_of(&legacy_addr), 1);
  }

  #[tokio::test]
  async fn legacy_locations_are_tried_in_priority_order() {
    let remote = Arc::new(FakeRemote::signed_in());
    remote.put(
      SLIDER_QUESTIONS.legacy[0].address("p1"),
      json!({"sliderQuestions": [{"id": 1, "question": "first legacy"}]}),
    );
    remote.put(
      SLIDER_QUESTIONS.legacy[1].address("p1"),
      json!({"sliderQuestions": [{"id": 1, "question": "second legacy"}]}),
    );
    let sync = service(Arc::clone(&remote));

    let loaded = sync.load("p1").await;
    assert_eq!(loaded[0].question, "first legacy");
    assert_eq!(remote.fetches_of(&SLIDER_QUESTIONS.legacy[1].address("p1")), 0);
  }

  #[tokio::test]
  async fn empty_remote_falls_back_to_local_without_writing() {
    let remote = Arc::new(FakeRemote::signed_in());
    let sync = service(Arc::clone(&remote));
    sync.store_local("p1", &[question(1, "Local only")]);

    let loaded = sync.load("p1").await;
    assert_eq!(loaded[0].question, "Local only");
    assert_eq!(remote.saves_of(&SLIDER_QUESTIONS.canonical.address("p1")), 0);
  }

  #[tokio::test]
  async fn save_replicates_to_canonical_and_public_form() {
    let remote = Arc::new(FakeRemote::signed_in());
    let sync = service(Arc::clone(&remote));

    let outcome = sync.save("p1", &[question(1, "How connected?")]).await;
    assert_eq!(outcome, SaveOutcome::replicated());

    let canonical = SLIDER_QUESTIONS.canonical.address("p1");
    let public_form = SLIDER_QUESTIONS.secondary[0].address("p1");
    let stored = remote.get(&canonical).unwrap();
    assert_eq!(stored["sliderQuestions"][0]["question"], "How connected?");
    assert_eq!(remote.get(&public_form), Some(stored));
  }

  #[tokio::test]
  async fn remote_failure_does_not_roll_back_the_local_save() {
    let remote = Arc::new(FakeRemote::signed_in());
    remote.set_fail_saves(true);
    let sync = service(Arc::clone(&remote));

    let outcome = sync.save("p1", &[question(1, "Durable")]).await;
    assert!(outcome.local);
    assert!(!outcome.remote);
    assert_eq!(sync.local("p1")[0].question, "Durable");
  }

  #[tokio::test]
  async fn concurrent_loads_coalesce_into_one_migration() {
    let remote = Arc::new(FakeRemote::signed_in());
    let legacy_addr = SLIDER_QUESTIONS.legacy[0].address("p1");
    remote.put(
      legacy_addr.clone(),
      json!({"sliderQuestions": [{"id": 1, "question": "Race me"}]}),
    );

    let ctx = CacheContext::ephemeral();
    let inflight = Arc::new(InflightRegistry::new());
    let a = SliderQuestionSync::new(Arc::clone(&ctx), Arc::clone(&remote), Arc::clone(&inflight));
    let b = SliderQuestionSync::new(ctx, Arc::clone(&remote), inflight);

    let (first, second) = tokio::join!(a.load("p1"), b.load("p1"));
    assert_eq!(first, second);
    assert_eq!(remote.fetches_of(&legacy_addr), 1);
    assert_eq!(remote.saves_of(&SLIDER_QUESTIONS.canonical.address("p1")), 1);
  }
}

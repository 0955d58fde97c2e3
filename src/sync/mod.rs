//! Per-entity reconciliation between the local cache and the remote store.
//!
//! Every service follows the same shape: the local value is the fallback of
//! last resort, unauthenticated callers never touch the remote, reads walk
//! the canonical location then the legacy chain in priority order, and a
//! legacy hit is migrated forward to the canonical location before the read
//! returns. Writes land locally first, unconditionally; the remote write is
//! best-effort replication and its failure never rolls the local write back.

mod inflight;
pub mod locations;
mod participants;
mod sliders;
mod story;

pub use inflight::InflightRegistry;
pub use participants::{
  clean_participant_questions, ParticipantChoice, ParticipantQuestion, ParticipantQuestionSync,
};
pub use sliders::{clean_slider_questions, SliderQuestion, SliderQuestionSync};
pub use story::StoryQuestionSync;

pub(crate) use crate::remote::operations::write_response;

/// What a sync save accomplished. The local half is always true today; it is
/// carried so callers can distinguish "saved everywhere" from "saved locally,
/// remote pending or unavailable".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveOutcome {
  pub local: bool,
  pub remote: bool,
}

impl SaveOutcome {
  pub fn local_only() -> Self {
    Self {
      local: true,
      remote: false,
    }
  }

  pub fn replicated() -> Self {
    Self {
      local: true,
      remote: true,
    }
  }
}

/// Drop every locally persisted sync entry for a project: the question sets
/// and the story-question bookkeeping.
pub fn clear_local(ctx: &crate::cache::CacheContext, project_id: &str) {
  use crate::cache::keys::{scoped_sub_prefix, EntityKind};
  use crate::cache::{CacheOptions, TTL_INFINITE};
  use crate::storage::StorageKind;

  let options = CacheOptions::new(StorageKind::Local, TTL_INFINITE);
  for sub_type in [
    "slider-questions",
    "participant-questions",
    "story-question",
    "story-question-saved",
  ] {
    ctx.clear_prefix(&scoped_sub_prefix(EntityKind::Form, sub_type, project_id), options);
  }
}

/// Collapse runs of whitespace and trim. Applied to every user-visible text
/// field so legacy records with stray newlines come out uniform.
pub(crate) fn collapse_ws(text: &str) -> String {
  text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn collapse_ws_normalizes() {
    assert_eq!(collapse_ws("  a\n b\t\tc  "), "a b c");
    assert_eq!(collapse_ws(""), "");
    assert_eq!(collapse_ws("   "), "");
  }
}

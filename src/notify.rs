//! Typed change broadcasting between concurrently open views.
//!
//! A save publishes an [`ChangeEvent::ActivitySaved`] on the bus for
//! in-process subscribers, and the save path additionally writes a sentinel
//! key to the local store for observers that only watch storage.

use chrono::Utc;
use tokio::sync::broadcast;

/// Changes other views may need to react to.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent {
  ActivitySaved {
    project_id: String,
    phase_id: String,
    step_id: String,
    activity_id: String,
    timestamp_ms: i64,
  },
}

impl ChangeEvent {
  pub fn activity_saved(
    project_id: &str,
    phase_id: &str,
    step_id: &str,
    activity_id: &str,
  ) -> Self {
    Self::ActivitySaved {
      project_id: project_id.to_string(),
      phase_id: phase_id.to_string(),
      step_id: step_id.to_string(),
      activity_id: activity_id.to_string(),
      timestamp_ms: Utc::now().timestamp_millis(),
    }
  }

  pub fn timestamp_ms(&self) -> i64 {
    match self {
      Self::ActivitySaved { timestamp_ms, .. } => *timestamp_ms,
    }
  }
}

/// Sentinel key written to the local store alongside a broadcast, value =
/// milliseconds-since-epoch as a decimal string.
pub fn activity_saved_sentinel(
  project_id: &str,
  phase_id: &str,
  step_id: &str,
  activity_id: &str,
) -> String {
  format!("activity_saved_{project_id}_{phase_id}_{step_id}_{activity_id}")
}

/// Broadcast channel for change events.
///
/// Cloning shares the channel; lagged or absent subscribers are not an error.
#[derive(Clone)]
pub struct ChangeBus {
  tx: broadcast::Sender<ChangeEvent>,
}

impl ChangeBus {
  pub fn new() -> Self {
    let (tx, _rx) = broadcast::channel(64);
    Self { tx }
  }

  pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
    self.tx.subscribe()
  }

  /// Publish an event. A bus with no subscribers swallows it.
  pub fn publish(&self, event: ChangeEvent) {
    let _ = self.tx.send(event);
  }
}

impl Default for ChangeBus {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn subscribers_receive_published_events() {
    let bus = ChangeBus::new();
    let mut rx = bus.subscribe();

    let event = ChangeEvent::activity_saved("p1", "collection", "questions", "story-question");
    bus.publish(event.clone());

    assert_eq!(rx.recv().await.unwrap(), event);
  }

  #[test]
  fn publishing_without_subscribers_is_fine() {
    let bus = ChangeBus::new();
    bus.publish(ChangeEvent::activity_saved("p1", "a", "b", "c"));
  }

  #[test]
  fn sentinel_key_format() {
    assert_eq!(
      activity_saved_sentinel("p1", "collection", "questions", "story-question"),
      "activity_saved_p1_collection_questions_story-question"
    );
  }
}

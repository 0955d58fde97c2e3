//! Per-(project, entity) serialization of fetch-and-migrate operations.
//!
//! Two concurrent reads of the same entity could both observe an empty
//! canonical location, both read the same legacy data, and both issue a
//! migration write. The registry hands out one async mutex per
//! `(project, entity)` pair; the second reader waits, then re-checks the
//! canonical location and finds the first reader's migration already there.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::OwnedMutexGuard;

#[derive(Default)]
pub struct InflightRegistry {
  locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl InflightRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Take the lock for one `(project, entity)` pair, waiting out any
  /// operation already in flight for it. Operations on other pairs are not
  /// blocked.
  pub async fn acquire(&self, project_id: &str, entity: &str) -> OwnedMutexGuard<()> {
    let key = format!("{project_id}:{entity}");
    let lock = {
      let mut locks = match self.locks.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
      };
      Arc::clone(
        locks
          .entry(key)
          .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))),
      )
    };
    lock.lock_owned().await
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::time::Duration;
  use tokio::time::timeout;

  #[tokio::test]
  async fn same_pair_serializes() {
    let registry = InflightRegistry::new();
    let guard = registry.acquire("p1", "slider-questions").await;

    let second = timeout(
      Duration::from_millis(20),
      registry.acquire("p1", "slider-questions"),
    )
    .await;
    assert!(second.is_err(), "second acquire should block");

    drop(guard);
    let third = timeout(
      Duration::from_millis(20),
      registry.acquire("p1", "slider-questions"),
    )
    .await;
    assert!(third.is_ok());
  }

  #[tokio::test]
  async fn different_pairs_do_not_block_each_other() {
    let registry = InflightRegistry::new();
    let _a = registry.acquire("p1", "slider-questions").await;
    let b = timeout(
      Duration::from_millis(20),
      registry.acquire("p1", "participant-questions"),
    )
    .await;
    let c = timeout(Duration::from_millis(20), registry.acquire("p2", "slider-questions")).await;
    assert!(b.is_ok());
    assert!(c.is_ok());
  }
}

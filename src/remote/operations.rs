//! Activity response fetch/save with phase aliasing and cache write-through.
//!
//! Phases have been renamed across schema versions, so a response may have
//! been cached or stored under an older phase id. Reads consult the cache
//! under both the raw and normalized phase; writes purge and then repopulate
//! the cache under every alias so any addressing scheme sees fresh data.

use serde_json::Value;
use std::sync::Arc;

use crate::cache::{CacheContext, CacheOptions, ResponseCache, TTL_INFINITE};
use crate::notify::{activity_saved_sentinel, ChangeBus, ChangeEvent};
use crate::storage::StorageKind;

use super::client::RemoteStore;
use super::types::{ResponseAddress, ResponsePayload};

/// Older phase ids mapped to their current equivalents.
const PHASE_ALIASES: &[(&str, &str)] = &[("design", "build"), ("prepare", "define")];

/// Projects shared read-only across users; their rows sit behind row-level
/// access control and need the privileged RPC path.
const TEMPLATE_PREFIX: &str = "template-";

/// Map an old phase id to its current name. Unknown phases pass through.
pub fn normalize_phase(phase: &str) -> &str {
  PHASE_ALIASES
    .iter()
    .find(|(old, _)| *old == phase)
    .map(|(_, current)| *current)
    .unwrap_or(phase)
}

/// Every id a phase has ever been addressed by, current name first.
pub fn phase_aliases(phase: &str) -> Vec<&str> {
  let current = normalize_phase(phase);
  let mut aliases = vec![current];
  for (old, new) in PHASE_ALIASES {
    if *new == current {
      aliases.push(old);
    }
  }
  aliases
}

fn is_template_project(project_id: &str) -> bool {
  project_id.starts_with(TEMPLATE_PREFIX)
}

/// Write a response record, tolerating deployments without upsert support.
pub(crate) async fn write_response<R: RemoteStore>(
  remote: &R,
  addr: &ResponseAddress,
  value: &Value,
) -> color_eyre::Result<()> {
  match remote.upsert_response(addr, value).await {
    Ok(()) => Ok(()),
    Err(e) => {
      // Some deployments lack upsert; fall back to explicit
      // existence-check + update-or-insert
      tracing::debug!("upsert failed, trying explicit write path: {e}");
      match remote.response_exists(addr).await? {
        true => remote.update_response(addr, value).await,
        false => remote.insert_response(addr, value).await,
      }
    }
  }
}

/// Fetch/save operations for activity responses.
///
/// Fetch failures resolve to the caller-supplied default; save failures
/// report `false`. No retries at this layer.
pub struct ActivityResponseOps<R: RemoteStore> {
  ctx: Arc<CacheContext>,
  cache: ResponseCache,
  remote: Arc<R>,
  bus: ChangeBus,
}

impl<R: RemoteStore> ActivityResponseOps<R> {
  pub fn new(ctx: Arc<CacheContext>, remote: Arc<R>, bus: ChangeBus) -> Self {
    let cache = ResponseCache::new(Arc::clone(&ctx));
    Self {
      ctx,
      cache,
      remote,
      bus,
    }
  }

  pub fn bus(&self) -> &ChangeBus {
    &self.bus
  }

  /// Fetch an activity response.
  ///
  /// Cache is consulted under both the raw and normalized phase keys unless
  /// `force_refresh`. Template projects go through the privileged RPC;
  /// regular projects need an authenticated session and read their own rows.
  /// With `response_key`, only that field of the stored object is returned.
  pub async fn fetch(
    &self,
    project_id: &str,
    phase_id: &str,
    step_id: &str,
    activity_id: &str,
    default: Value,
    response_key: Option<&str>,
    force_refresh: bool,
  ) -> Value {
    let normalized = normalize_phase(phase_id);

    if !force_refresh {
      for phase in [phase_id, normalized] {
        let cached: Value =
          self
            .cache
            .get_by_path(project_id, phase, step_id, activity_id, Value::Null);
        if !cached.is_null() {
          return extract(cached, response_key, default);
        }
      }
    }

    let addr = ResponseAddress::new(project_id, normalized, step_id, activity_id);

    let fetched = if is_template_project(project_id) {
      match self.remote.rpc_fetch(&addr).await {
        Ok(value) => value,
        Err(e) => {
          tracing::warn!("template fetch failed for {project_id}/{normalized}/{step_id}/{activity_id}: {e}");
          return default;
        }
      }
    } else {
      if !self.remote.is_authenticated() {
        return default;
      }
      match self.remote.fetch_latest(&addr).await {
        Ok(row) => row.map(|r| r.response),
        Err(e) => {
          tracing::warn!("fetch failed for {project_id}/{normalized}/{step_id}/{activity_id}: {e}");
          return default;
        }
      }
    };

    let Some(value) = fetched else {
      return default;
    };

    // Write-through under both spellings so either alias hits next time
    self
      .cache
      .set_by_path(project_id, phase_id, step_id, activity_id, &value);
    if normalized != phase_id {
      self
        .cache
        .set_by_path(project_id, normalized, step_id, activity_id, &value);
    }

    extract(value, response_key, default)
  }

  /// Save an activity response. Returns `false` on any remote failure; the
  /// caller decides whether to retry or surface it.
  pub async fn save(
    &self,
    project_id: &str,
    phase_id: &str,
    step_id: &str,
    activity_id: &str,
    value: Value,
    response_key: Option<&str>,
  ) -> bool {
    let aliases = phase_aliases(phase_id);
    let normalized = aliases[0];

    // Purge every alias first so no stale entry survives under a spelling
    // this save does not write
    for phase in &aliases {
      self
        .cache
        .remove_by_path(project_id, phase, step_id, activity_id);
    }

    let addr = ResponseAddress::new(project_id, normalized, step_id, activity_id);
    let stored = match response_key {
      Some(key) => match self.merged_record(&addr, key, value).await {
        Ok(merged) => merged,
        Err(e) => {
          // Merging into an unreadable record would overwrite its sibling
          // fields, so the save must not proceed
          tracing::warn!(
            "keyed save aborted for {project_id}/{normalized}/{step_id}/{activity_id}: {e}"
          );
          return false;
        }
      },
      None => value,
    };

    let written = if is_template_project(project_id) {
      self.remote.rpc_insert(&addr, &stored).await
    } else {
      write_response(self.remote.as_ref(), &addr, &stored).await
    };

    if let Err(e) = written {
      tracing::warn!("save failed for {project_id}/{normalized}/{step_id}/{activity_id}: {e}");
      return false;
    }

    // Repopulate every alias and signal other views
    for phase in &aliases {
      self
        .cache
        .set_by_path(project_id, phase, step_id, activity_id, &stored);
    }

    let event = ChangeEvent::activity_saved(project_id, normalized, step_id, activity_id);
    let sentinel = activity_saved_sentinel(project_id, normalized, step_id, activity_id);
    self.ctx.set(
      &sentinel,
      &event.timestamp_ms(),
      CacheOptions::new(StorageKind::Local, TTL_INFINITE),
    );
    self.bus.publish(event);

    true
  }

  /// Current remote record with one field replaced, so several logical
  /// fields can share a physical record. A read failure is an error here:
  /// without the existing record the merge cannot preserve sibling fields.
  async fn merged_record(
    &self,
    addr: &ResponseAddress,
    key: &str,
    value: Value,
  ) -> color_eyre::Result<Value> {
    let existing = match self.remote.fetch_latest(addr).await? {
      Some(row) => ResponsePayload::decode(row.response),
      None => ResponsePayload::Fields(serde_json::Map::new()),
    };
    let mut map = match existing {
      ResponsePayload::Fields(map) => map,
      _ => serde_json::Map::new(),
    };
    map.insert(key.to_string(), value);
    Ok(Value::Object(map))
  }
}

/// Pick one field out of a stored payload, or the whole payload when no key
/// was requested.
fn extract(value: Value, response_key: Option<&str>, default: Value) -> Value {
  match response_key {
    None => value,
    Some(key) => ResponsePayload::decode(value).field(key).unwrap_or(default),
  }
}

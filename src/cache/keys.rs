//! Deterministic cache-key construction.
//!
//! Keys are readable strings, not hashes, because their format is part of the
//! external interface: other observers (the change sentinel, the CLI) match on
//! them. Format: `<entity>[_<subType>]_<id>_<version>`; response path keys are
//! `response_<project>_<phase>_<step>_<activity>` with no version suffix.

/// Bumping this invalidates every versioned key without an explicit clear.
pub const CACHE_VERSION: &str = "v1";

/// Suffix appended to a payload key to form its timestamp companion.
const TIMESTAMP_SUFFIX: &str = "_timestamp";

/// The cacheable entity kinds. Each has a distinct key prefix, so keys can
/// never collide across kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
  Form,
  Project,
  Context,
  Activity,
  Response,
  Path,
}

impl EntityKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Form => "form",
      Self::Project => "project",
      Self::Context => "context",
      Self::Activity => "activity",
      Self::Response => "response",
      Self::Path => "path",
    }
  }
}

/// Build a versioned cache key from an entity tuple.
///
/// Pure: identical tuples always yield identical strings. The version suffix
/// is injected last so bumping [`CACHE_VERSION`] orphans all prior keys.
pub fn cache_key(entity: EntityKind, id: &str, sub_type: Option<&str>) -> String {
  match sub_type {
    Some(sub) => format!("{}_{}_{}_{}", entity.as_str(), sub, id, CACHE_VERSION),
    None => format!("{}_{}_{}", entity.as_str(), id, CACHE_VERSION),
  }
}

/// Build the composite key for an activity response addressed by its full
/// `(project, phase, step, activity)` path.
pub fn response_path_key(
  project_id: &str,
  phase_id: &str,
  step_id: &str,
  activity_id: &str,
) -> String {
  format!("response_{project_id}_{phase_id}_{step_id}_{activity_id}")
}

/// Timestamp companion key for a payload key.
pub fn timestamp_key(key: &str) -> String {
  format!("{key}{TIMESTAMP_SUFFIX}")
}

/// True when `key` is a timestamp companion rather than a payload.
pub fn is_timestamp_key(key: &str) -> bool {
  key.ends_with(TIMESTAMP_SUFFIX)
}

/// Prefix covering every no-subtype key of `entity` scoped to `id_prefix`.
///
/// Bulk clears match on this with explicit prefix semantics, so an id that is
/// a substring of another id cannot clear across scopes.
pub fn scoped_prefix(entity: EntityKind, id_prefix: &str) -> String {
  format!("{}_{}_", entity.as_str(), id_prefix)
}

/// Prefix covering every `sub_type` key of `entity` scoped to `id_prefix`.
pub fn scoped_sub_prefix(entity: EntityKind, sub_type: &str, id_prefix: &str) -> String {
  format!("{}_{}_{}_", entity.as_str(), sub_type, id_prefix)
}

//! Caching layer: deterministic keys, TTL primitives, and typed per-entity
//! managers.
//!
//! The managers are thin facades: they derive keys via [`keys`], delegate to
//! [`CacheContext`] for the actual reads and writes, and add entity-shaped
//! batch operations such as "clear everything for project X".

pub mod keys;
mod layer;

mod activity;
mod form;
mod project;
mod project_context;
mod response;

pub use activity::ActivityCache;
pub use form::{FormCache, FormSection};
pub use layer::{
  CacheContext, CacheOptions, TTL_INFINITE, TTL_LONG, TTL_MEDIUM, TTL_SHORT,
};
pub use project::ProjectCache;
pub use project_context::ProjectContextCache;
pub use response::ResponseCache;

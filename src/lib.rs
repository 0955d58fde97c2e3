//! Local-first caching and remote synchronization core for story collection
//! projects.
//!
//! The crate is organized in layers, bottom-up:
//! - [`storage`]: interchangeable synchronous key-value backends (memory,
//!   session-scoped, persistent) with a liveness-probed selector.
//! - [`cache`]: TTL-aware cache primitives over a selected backend, a
//!   deterministic cache-key generator, and typed per-entity cache managers.
//! - [`remote`]: the remote table store behind a trait seam, plus the
//!   activity-response fetch/save operations (phase aliasing, template
//!   projects, cache write-through).
//! - [`sync`]: per-entity reconciliation between local cache and remote,
//!   including the canonical-location-with-legacy-fallback read strategy and
//!   migration write-back.
//! - [`notify`]: typed change broadcasting for concurrently open views.

pub mod cache;
pub mod config;
pub mod notify;
pub mod remote;
pub mod storage;
pub mod sync;

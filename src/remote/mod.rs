//! Remote table store access: trait seam, HTTP implementation, and the
//! activity-response fetch/save operations the sync services build on.

mod client;
pub mod operations;
mod types;

#[cfg(test)]
pub(crate) mod fake;

pub use client::{HttpRemote, RemoteStore};
pub use operations::{normalize_phase, phase_aliases, ActivityResponseOps};
pub use types::{ResponseAddress, ResponsePayload, ResponseRow};

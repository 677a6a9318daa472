//! Progress hooks for the per-city geocoding pass.
//!
//! The pass calls [`ProgressCallback::set_total`] once with the number of
//! distinct cities, [`ProgressCallback::inc`] after each city (cached or
//! not), and [`ProgressCallback::finish`] at the end. None of this affects
//! the rendered map.

use std::sync::Arc;

/// Receives progress updates from the geocoding pass.
pub trait ProgressCallback: Send + Sync {
    /// Number of cities the pass will check.
    fn set_total(&self, total: u64);

    /// `delta` more cities have been checked.
    fn inc(&self, delta: u64);

    /// Describes the city currently being geocoded.
    fn set_message(&self, msg: String);

    /// The pass is done; `msg` summarizes it.
    fn finish(&self, msg: String);
}

/// Discards every update.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_total(&self, _total: u64) {}
    fn inc(&self, _delta: u64) {}
    fn set_message(&self, _msg: String) {}
    fn finish(&self, _msg: String) {}
}

#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(NullProgress)
}

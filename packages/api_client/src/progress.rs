//! Progress reporting for fetch dispatch.
//!
//! [`ProgressCallback`] decouples the dispatcher from any rendering backend.
//! The CLI renders it as an `indicatif` bar; library callers and tests pass
//! nothing.

use std::sync::Arc;

/// Receives progress updates from a dispatch call.
///
/// Implementations must be `Send + Sync` because every worker of a dispatch
/// call reports through the same instance.
pub trait ProgressCallback: Send + Sync {
    /// Set the total number of tasks.
    fn set_total(&self, total: u64);

    /// Advance by `delta` completed tasks.
    fn inc(&self, delta: u64);

    /// Update the message shown next to the indicator.
    fn set_message(&self, msg: String);

    /// Mark progress as complete and remove the indicator.
    fn finish_and_clear(&self);
}

/// Ignores all progress updates.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_total(&self, _total: u64) {}
    fn inc(&self, _delta: u64) {}
    fn set_message(&self, _msg: String) {}
    fn finish_and_clear(&self) {}
}

/// Returns a shared [`NullProgress`].
#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(NullProgress)
}

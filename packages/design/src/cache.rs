//! Read-through cache for parsed templates.
//!
//! Templates are edited while a server is running, so a loaded template is
//! only reused for a short time before it is read again.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Default time a loaded template is reused.
pub const DEFAULT_TTL: Duration = Duration::from_secs(10);

/// Holds one loaded value and reloads it once `ttl` has passed.
pub struct TemplateCache<T> {
    ttl: Duration,
    entry: Mutex<Option<(Instant, Arc<T>)>>,
}

impl<T> Default for TemplateCache<T> {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl<T> TemplateCache<T> {
    #[must_use]
    pub const fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entry: Mutex::new(None),
        }
    }

    /// Returns the cached value, or calls `load` if there is none or it has
    /// expired.
    ///
    /// A failed load leaves the previous entry in place.
    ///
    /// # Errors
    ///
    /// Propagates the error returned by `load`.
    pub fn get_or_load<E>(&self, load: impl FnOnce() -> Result<T, E>) -> Result<Arc<T>, E> {
        let mut entry = self.entry.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some((loaded_at, value)) = entry.as_ref()
            && loaded_at.elapsed() < self.ttl
        {
            return Ok(Arc::clone(value));
        }

        log::debug!("Template cache miss, loading");
        let value = Arc::new(load()?);
        *entry = Some((Instant::now(), Arc::clone(&value)));
        Ok(value)
    }

    /// Drops the cached value.
    pub fn invalidate(&self) {
        *self.entry.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

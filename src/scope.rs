//! # Resource Scope
//!
//! Collects the cancellable handles a session acquires (repository and
//! carousel observers, prefetch requests) and releases each of them exactly
//! once on teardown.

use std::panic::{catch_unwind, AssertUnwindSafe};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::{LensKitError, Result};

/// A cancellable handle. Consumed on close so it can only be released once.
pub trait Subscription: Send {
    fn close(self: Box<Self>) -> Result<()>;
}

struct CloseFn<F>(F);

impl<F> Subscription for CloseFn<F>
where
    F: FnOnce() -> Result<()> + Send,
{
    fn close(self: Box<Self>) -> Result<()> {
        (self.0)()
    }
}

/// Wrap a closure as a [`Subscription`]
pub fn on_close<F>(close: F) -> Box<dyn Subscription>
where
    F: FnOnce() -> Result<()> + Send + 'static,
{
    Box::new(CloseFn(close))
}

struct Entry {
    name: &'static str,
    handle: Box<dyn Subscription>,
}

#[derive(Default)]
struct ScopeState {
    closed: bool,
    entries: Vec<Entry>,
}

/// Owns registered subscriptions until [`ResourceScope::release_all`].
#[derive(Default)]
pub struct ResourceScope {
    state: Mutex<ScopeState>,
}

impl std::fmt::Debug for ResourceScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ResourceScope")
            .field("closed", &state.closed)
            .field(
                "entries",
                &state.entries.iter().map(|entry| entry.name).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl ResourceScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handle. Fails with [`LensKitError::ScopeClosed`] once the
    /// scope has been released; the rejected handle is dropped unreleased.
    pub fn register(&self, name: &'static str, handle: Box<dyn Subscription>) -> Result<()> {
        self.try_register(name, handle)
            .map_err(|_rejected| LensKitError::ScopeClosed)
    }

    /// Register a handle, giving it back when the scope is already closed.
    pub fn try_register(
        &self,
        name: &'static str,
        handle: Box<dyn Subscription>,
    ) -> std::result::Result<(), Box<dyn Subscription>> {
        let mut state = self.state.lock();
        if state.closed {
            debug!(name, "rejecting registration on closed scope");
            return Err(handle);
        }
        state.entries.push(Entry { name, handle });
        Ok(())
    }

    /// Release every registered handle in registration order.
    ///
    /// Idempotent: only the first call releases anything. A handle that fails
    /// or panics while closing does not stop the remaining ones. Returns the
    /// number of handles this call attempted to release.
    pub fn release_all(&self) -> usize {
        let entries = {
            let mut state = self.state.lock();
            if state.closed {
                return 0;
            }
            state.closed = true;
            std::mem::take(&mut state.entries)
        };

        let count = entries.len();
        for Entry { name, handle } in entries {
            match catch_unwind(AssertUnwindSafe(move || handle.close())) {
                Ok(Ok(())) => debug!(name, "released subscription"),
                Ok(Err(e)) => warn!(name, error = %e, "failed to release subscription"),
                Err(_) => warn!(name, "subscription panicked while releasing"),
            }
        }
        count
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for ResourceScope {
    fn drop(&mut self) {
        self.release_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn recording(log: &Arc<Mutex<Vec<&'static str>>>, name: &'static str) -> Box<dyn Subscription> {
        let log = Arc::clone(log);
        on_close(move || {
            log.lock().push(name);
            Ok(())
        })
    }

    #[test]
    fn test_releases_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let scope = ResourceScope::new();
        scope.register("repository", recording(&log, "repository")).unwrap();
        scope.register("carousel", recording(&log, "carousel")).unwrap();
        scope.register("prefetch", recording(&log, "prefetch")).unwrap();

        assert_eq!(scope.release_all(), 3);
        assert_eq!(*log.lock(), vec!["repository", "carousel", "prefetch"]);
    }

    #[test]
    fn test_release_all_is_idempotent() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let scope = ResourceScope::new();
        scope.register("repository", recording(&log, "repository")).unwrap();

        assert_eq!(scope.release_all(), 1);
        assert_eq!(scope.release_all(), 0);
        assert_eq!(*log.lock(), vec!["repository"]);
    }

    #[test]
    fn test_failing_release_does_not_stop_others() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let scope = ResourceScope::new();
        scope.register("first", recording(&log, "first")).unwrap();
        scope
            .register(
                "broken",
                on_close(|| Err(LensKitError::Other("engine gone".to_string()))),
            )
            .unwrap();
        scope.register("panicking", on_close(|| panic!("boom"))).unwrap();
        scope.register("last", recording(&log, "last")).unwrap();

        assert_eq!(scope.release_all(), 4);
        assert_eq!(*log.lock(), vec!["first", "last"]);
    }

    #[test]
    fn test_register_after_release_is_rejected() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let scope = ResourceScope::new();
        scope.release_all();

        let result = scope.register("late", recording(&log, "late"));
        assert!(matches!(result, Err(LensKitError::ScopeClosed)));
        assert!(scope.is_closed());
        assert!(scope.is_empty());
        assert!(log.lock().is_empty());
    }

    #[test]
    fn test_try_register_returns_rejected_handle() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let scope = ResourceScope::new();
        scope.release_all();

        let rejected = scope.try_register("late", recording(&log, "late")).unwrap_err();
        rejected.close().unwrap();
        assert_eq!(*log.lock(), vec!["late"]);
    }

    #[test]
    fn test_drop_releases_remaining_handles() {
        let log = Arc::new(Mutex::new(Vec::new()));
        {
            let scope = ResourceScope::new();
            scope.register("repository", recording(&log, "repository")).unwrap();
            assert_eq!(scope.len(), 1);
        }
        assert_eq!(*log.lock(), vec!["repository"]);
    }
}

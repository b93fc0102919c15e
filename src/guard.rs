use std::sync::atomic::{AtomicBool, Ordering};

use crate::engine::Lens;

/// Applies a target lens at most once per session.
///
/// Repository notifications can arrive repeatedly and concurrently with
/// carousel and capture callbacks. A single compare-and-set decides which
/// notification gets to apply; the apply itself runs without any lock held.
#[derive(Debug, Default)]
pub struct LensApplicationGuard {
    target: Option<String>,
    applied: AtomicBool,
}

impl LensApplicationGuard {
    pub fn new(target: Option<String>) -> Self {
        Self {
            target: target.filter(|id| !id.is_empty()),
            applied: AtomicBool::new(false),
        }
    }

    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    pub fn is_applied(&self) -> bool {
        self.applied.load(Ordering::Acquire)
    }

    /// Offer one "available lenses" notification.
    ///
    /// Calls `apply` with the target lens if it is present and no earlier
    /// offer has won. Returns whether this call applied. A target that never
    /// shows up is not an error.
    pub fn offer<F>(&self, available: &[Lens], apply: F) -> bool
    where
        F: FnOnce(&Lens),
    {
        let Some(target) = self.target.as_deref() else {
            return false;
        };
        let Some(lens) = available.iter().find(|lens| lens.id == target) else {
            return false;
        };

        if self
            .applied
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        apply(lens);
        true
    }
}

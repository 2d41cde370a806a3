//! Per-thread recorder slot for hook-style instrumentation
//!
//! Compiler-inserted enter/exit hooks have no context argument, so the
//! recorder lives in a `thread_local!`. The slot refuses re-entrant use: a
//! hook that fires while the recorder is already borrowed, including from
//! inside one of its own operations, is skipped instead of recursing.
//!
//! ```
//! use fiya::local::{self, LocalRecorder};
//! use fiya::recorder::ValueRecorder;
//!
//! thread_local! {
//!     static REC: LocalRecorder<ValueRecorder<usize, u64>> =
//!         LocalRecorder::new(ValueRecorder::from_values(0, 0, 0));
//! }
//!
//! assert_eq!(local::enter(&REC, &0x1000), Ok(true));
//! assert!(local::exit(&REC, &0x1000));
//! ```

use std::cell::RefCell;
use std::thread::LocalKey;

use crate::recorder::{ScopeError, Scoping};

/// Recorder slot that skips re-entrant calls.
#[derive(Debug)]
pub struct LocalRecorder<R> {
    inner: RefCell<R>,
}

impl<R: Scoping> LocalRecorder<R> {
    /// Slot holding `recorder`.
    pub fn new(recorder: R) -> Self {
        Self {
            inner: RefCell::new(recorder),
        }
    }

    /// Run `f` on the recorder, or return `None` if it is already in use on
    /// this thread.
    ///
    /// The recorder is only reachable through the slot, so while one of its
    /// operations runs the slot stays borrowed and this check also covers
    /// the recorder's busy window.
    pub fn with<T>(&self, f: impl FnOnce(&mut R) -> T) -> Option<T> {
        let mut recorder = self.inner.try_borrow_mut().ok()?;
        Some(f(&mut recorder))
    }

    /// Swap in a new recorder, returning the old one. `None` while the slot
    /// is in use.
    pub fn replace(&self, recorder: R) -> Option<R> {
        let mut slot = self.inner.try_borrow_mut().ok()?;
        Some(std::mem::replace(&mut *slot, recorder))
    }

    /// Take the recorder out of the slot.
    pub fn into_inner(self) -> R {
        self.inner.into_inner()
    }
}

/// Enter hook. `Ok(false)` when the call was skipped (re-entrant call, or
/// thread-local already destroyed).
pub fn enter<R: Scoping + 'static>(
    slot: &'static LocalKey<LocalRecorder<R>>,
    label: &R::Label,
) -> Result<bool, ScopeError> {
    match slot.try_with(|local| local.with(|rec| rec.begin_scope(label))) {
        Ok(Some(result)) => result.map(|()| true),
        _ => Ok(false),
    }
}

/// Exit hook, checking that `label` is the open scope. Returns false when
/// the call was skipped.
///
/// # Panics
///
/// On an unbalanced exit or a label mismatch.
pub fn exit<R: Scoping + 'static>(
    slot: &'static LocalKey<LocalRecorder<R>>,
    label: &R::Label,
) -> bool {
    matches!(
        slot.try_with(|local| local.with(|rec| rec.end_scope_checked(label))),
        Ok(Some(()))
    )
}

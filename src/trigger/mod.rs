//! Instrumentation triggers
//!
//! A trigger decides *when* scopes open and close and keeps the measure of
//! the innermost scope up to date around each transition. The transition
//! protocol is the same for every measure:
//!
//! 1. `before_transition` on the measure of the scope being left
//! 2. `begin_scope` / `end_scope` on the recorder
//! 3. `after_transition` on the measure of the scope now innermost
//!
//! [`ScopeGuard`] drives it from RAII scopes, [`Triggered`] from hook-style
//! enter/exit calls (it implements [`Scoping`] itself, so hook code can be
//! written once against the trait).

mod heap;
mod timer;

pub use heap::{flush_pending, suppressed, HeapAttribution, HeapTracking, TrackingAllocator};
pub use timer::Timing;

use std::fmt;
use std::ops::{Deref, DerefMut};

use crate::measure::{Clock, HeapUsage, TimeValue};
use crate::recorder::{Counter, ScopeError, Scoping};

/// Keeps a measure current across scope transitions.
pub trait Accumulator {
    /// Measure type this accumulator feeds.
    type Measure;

    /// Called on the innermost scope's measure just before it stops being
    /// innermost (or just before a child opens).
    fn before_transition(&self, measure: &mut Self::Measure);

    /// Called on the new innermost scope's measure just after a transition.
    fn after_transition(&self, measure: &mut Self::Measure);
}

/// RAII scope timed with `C`.
pub type ScopeTimer<'r, R, C> = ScopeGuard<'r, R, Timing<C>>;

/// RAII scope attributing heap activity.
pub type HeapScope<'r, R> = ScopeGuard<'r, R, HeapAttribution>;

/// Hook-driven recorder timed with `C`.
pub type TimedScopes<R, C> = Triggered<R, Timing<C>>;

fn transition<R, A>(
    recorder: &mut R,
    accumulator: &A,
    op: impl FnOnce(&mut R) -> Result<(), ScopeError>,
) -> Result<(), ScopeError>
where
    R: Counter<Measure = A::Measure>,
    A: Accumulator,
{
    accumulator.before_transition(recorder.cnt_mut());
    let result = op(recorder);
    accumulator.after_transition(recorder.cnt_mut());
    result
}

/// Scope that is open for the guard's lifetime.
///
/// Dereferences to the recorder, so nested scopes are opened through the
/// guard:
///
/// ```
/// use fiya::measure::{TimeValue, WallClock};
/// use fiya::recorder::StrRecorder;
/// use fiya::trigger::ScopeGuard;
///
/// let clock = WallClock::new();
/// let mut rec =
///     StrRecorder::new(TimeValue::default(), "root", TimeValue::started(&clock)).unwrap();
/// {
///     let mut outer = ScopeGuard::timed(&mut rec, "outer", clock).unwrap();
///     let _inner = ScopeGuard::timed(&mut *outer, "inner", clock).unwrap();
/// }
/// assert!(rec.is_at_root());
/// ```
#[must_use = "the scope closes when the guard is dropped"]
pub struct ScopeGuard<'r, R, A>
where
    R: Scoping + Counter<Measure = A::Measure>,
    A: Accumulator,
{
    recorder: &'r mut R,
    accumulator: A,
}

impl<'r, R, A> ScopeGuard<'r, R, A>
where
    R: Scoping + Counter<Measure = A::Measure>,
    A: Accumulator,
{
    /// Open `label` on `recorder` with a custom accumulator.
    pub fn enter(
        recorder: &'r mut R,
        label: &R::Label,
        accumulator: A,
    ) -> Result<Self, ScopeError> {
        transition(recorder, &accumulator, |rec| rec.begin_scope(label))?;
        Ok(Self {
            recorder,
            accumulator,
        })
    }
}

impl<'r, R, C> ScopeGuard<'r, R, Timing<C>>
where
    R: Scoping + Counter<Measure = TimeValue>,
    C: Clock,
{
    /// Open `label`, timing it with `clock`.
    pub fn timed(recorder: &'r mut R, label: &R::Label, clock: C) -> Result<Self, ScopeError> {
        Self::enter(recorder, label, Timing::new(clock))
    }
}

impl<'r, R> ScopeGuard<'r, R, HeapAttribution>
where
    R: Scoping + Counter<Measure = HeapUsage>,
{
    /// Open `label`, attributing heap activity on this thread to it.
    pub fn heap(recorder: &'r mut R, label: &R::Label) -> Result<Self, ScopeError> {
        Self::enter(recorder, label, HeapAttribution)
    }
}

impl<R, A> fmt::Debug for ScopeGuard<'_, R, A>
where
    R: Scoping + Counter<Measure = A::Measure> + fmt::Debug,
    A: Accumulator + fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeGuard")
            .field("recorder", &self.recorder)
            .field("accumulator", &self.accumulator)
            .finish()
    }
}

impl<R, A> Deref for ScopeGuard<'_, R, A>
where
    R: Scoping + Counter<Measure = A::Measure>,
    A: Accumulator,
{
    type Target = R;

    fn deref(&self) -> &R {
        self.recorder
    }
}

impl<R, A> DerefMut for ScopeGuard<'_, R, A>
where
    R: Scoping + Counter<Measure = A::Measure>,
    A: Accumulator,
{
    fn deref_mut(&mut self) -> &mut R {
        self.recorder
    }
}

impl<R, A> Drop for ScopeGuard<'_, R, A>
where
    R: Scoping + Counter<Measure = A::Measure>,
    A: Accumulator,
{
    fn drop(&mut self) {
        let _ = transition(&mut *self.recorder, &self.accumulator, |rec| {
            rec.end_scope();
            Ok(())
        });
    }
}

/// Recorder driven by enter/exit hooks, applying `A` on every transition.
#[derive(Debug)]
pub struct Triggered<R, A> {
    recorder: R,
    accumulator: A,
}

impl<R, A> Triggered<R, A>
where
    R: Scoping + Counter<Measure = A::Measure>,
    A: Accumulator,
{
    /// Wrap `recorder`.
    pub fn new(recorder: R, accumulator: A) -> Self {
        Self {
            recorder,
            accumulator,
        }
    }

    /// Wrapped recorder.
    pub fn recorder(&self) -> &R {
        &self.recorder
    }

    /// Mutable wrapped recorder. Transitions made through it bypass the
    /// accumulator.
    pub fn recorder_mut(&mut self) -> &mut R {
        &mut self.recorder
    }

    /// Bring the innermost measure up to date without a transition, e.g.
    /// before exporting.
    pub fn settle(&mut self) {
        self.accumulator.before_transition(self.recorder.cnt_mut());
        self.accumulator.after_transition(self.recorder.cnt_mut());
    }

    /// Unwrap the recorder.
    pub fn into_inner(self) -> R {
        self.recorder
    }
}

impl<R, A> Scoping for Triggered<R, A>
where
    R: Scoping + Counter<Measure = A::Measure>,
    A: Accumulator,
{
    type Label = R::Label;

    fn begin_scope(&mut self, label: &R::Label) -> Result<(), ScopeError> {
        transition(&mut self.recorder, &self.accumulator, |rec| rec.begin_scope(label))
    }

    fn end_scope(&mut self) {
        let _ = transition(&mut self.recorder, &self.accumulator, |rec| {
            rec.end_scope();
            Ok(())
        });
    }

    fn end_scope_checked(&mut self, label: &R::Label) {
        let _ = transition(&mut self.recorder, &self.accumulator, |rec| {
            rec.end_scope_checked(label);
            Ok(())
        });
    }

    fn recorder_internal_running(&self) -> bool {
        Scoping::recorder_internal_running(&self.recorder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::StrRecorder;
    use crate::tree::NodeId;

    /// Counts transitions into the measure.
    struct Ticks;

    impl Accumulator for Ticks {
        type Measure = u64;

        fn before_transition(&self, measure: &mut u64) {
            *measure += 1;
        }

        fn after_transition(&self, measure: &mut u64) {
            *measure += 100;
        }
    }

    #[test]
    fn test_guard_applies_protocol() {
        let mut rec = StrRecorder::new(0u64, "root", 0).unwrap();
        {
            let guard = ScopeGuard::enter(&mut rec, "a", Ticks).unwrap();
            assert_eq!(*guard.current_measure(), 100);
        }

        // root: before(begin) + after(end); a: after(begin) + before(end)
        assert!(rec.is_at_root());
        assert_eq!(*rec.current_measure(), 101);
        let a = rec.tree().node(NodeId::ROOT).children()[0];
        assert_eq!(*rec.tree().node(a).measure(), 101);
    }

    #[test]
    fn test_nested_guards_through_deref() {
        let mut rec = StrRecorder::new(0u64, "root", 0).unwrap();
        {
            let mut outer = ScopeGuard::enter(&mut rec, "outer", Ticks).unwrap();
            let inner = ScopeGuard::enter(&mut *outer, "inner", Ticks).unwrap();
            assert_eq!(inner.depth(), 2);
        }
        assert_eq!(
            rec.collapsed_with(|l| *l, |_| 0).unwrap(),
            "root 0\nroot;outer 0\nroot;outer;inner 0\n"
        );
    }

    #[test]
    fn test_failed_enter_keeps_cursor() {
        let mut rec = StrRecorder::new(0u64, "root", 0).unwrap();
        let err = ScopeGuard::enter(&mut rec, "nul\0", Ticks).err();

        assert!(matches!(err, Some(ScopeError::Intern(_))));
        assert!(rec.is_at_root());
        assert_eq!(*rec.current_measure(), 101);
    }

    #[test]
    fn test_triggered_scoping() {
        let rec = StrRecorder::new(0u64, "root", 0).unwrap();
        let mut hooks = Triggered::new(rec, Ticks);

        hooks.begin_scope("f").unwrap();
        hooks.begin_scope("g").unwrap();
        hooks.end_scope_checked("g");
        hooks.end_scope();
        assert!(!hooks.recorder_internal_running());

        let rec = hooks.into_inner();
        assert!(rec.is_at_root());
        assert_eq!(rec.tree().len(), 3);
    }
}

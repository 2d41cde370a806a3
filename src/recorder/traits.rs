//! Recorder capabilities seen by instrumentation triggers
//!
//! A trigger that only opens and closes scopes depends on [`Scoping`]; one
//! that only feeds a measure depends on [`Counter`]. [`Recorder`] provides
//! both, and wrappers such as [`Triggered`](crate::trigger::Triggered)
//! provide `Scoping` on top of it.

use super::{Recorder, ScopeError};
use crate::label::LabelStore;

/// Opening and closing scopes.
pub trait Scoping {
    /// Label type accepted by `begin_scope`.
    type Label: ?Sized;

    /// Open a scope under the current one.
    fn begin_scope(&mut self, label: &Self::Label) -> Result<(), ScopeError>;

    /// Close the current scope. Panics if none is open.
    fn end_scope(&mut self);

    /// Close the current scope, asserting it is `label`. Panics on mismatch.
    fn end_scope_checked(&mut self, label: &Self::Label);

    /// True while the recorder is doing internal work.
    fn recorder_internal_running(&self) -> bool;
}

/// Access to the measure of the current scope.
pub trait Counter {
    /// Measure accumulated per node.
    type Measure;

    /// Measure of the current scope.
    fn cnt(&self) -> &Self::Measure;

    /// Mutable measure of the current scope.
    fn cnt_mut(&mut self) -> &mut Self::Measure;

    /// True while the recorder is doing internal work.
    fn recorder_internal_running(&self) -> bool;
}

impl<S: LabelStore, M: Clone> Scoping for Recorder<S, M> {
    type Label = S::Label;

    fn begin_scope(&mut self, label: &S::Label) -> Result<(), ScopeError> {
        Recorder::begin_scope(self, label)
    }

    fn end_scope(&mut self) {
        Recorder::end_scope(self)
    }

    fn end_scope_checked(&mut self, label: &S::Label) {
        Recorder::end_scope_checked(self, label)
    }

    fn recorder_internal_running(&self) -> bool {
        self.is_busy()
    }
}

impl<S: LabelStore, M: Clone> Counter for Recorder<S, M> {
    type Measure = M;

    fn cnt(&self) -> &M {
        self.current_measure()
    }

    fn cnt_mut(&mut self) -> &mut M {
        self.current_measure_mut()
    }

    fn recorder_internal_running(&self) -> bool {
        self.is_busy()
    }
}

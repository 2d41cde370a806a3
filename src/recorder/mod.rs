//! Scope recorder
//!
//! Owns the call tree and a cursor on the node of the innermost open scope.
//! `begin_scope` descends (creating the child on first use), `end_scope`
//! ascends. The tree's shape is the union of every nesting path taken.
//!
//! One recorder serves one thread. Its own work (node allocation, string
//! interning) can trigger the very events being measured, so every public
//! operation raises a busy flag that triggers must check before calling
//! back in; see [`Recorder::is_busy`].

mod traits;

pub use traits::{Counter, Scoping};

use std::cell::Cell;
use std::fmt::{self, Display};
use std::hash::Hash;
use std::io;
use std::ops::Add;

use thiserror::Error;

use crate::collapsed;
use crate::interner::InternError;
use crate::label::{InternedLabels, LabelStore, ValueLabels};
use crate::report::{self, Report};
use crate::tree::{CallTree, NodeId};

/// Scope-balance violations and label storage failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScopeError {
    /// `end_scope` with the cursor already at the root.
    #[error("unbalanced scope: end_scope called with no open scope")]
    Unbalanced,

    /// `end_scope_checked` named a different label than the open scope.
    #[error("scope mismatch: closing {closing} while {open} is open")]
    LabelMismatch {
        /// Label passed to `end_scope_checked`.
        closing: String,
        /// Label of the innermost open scope.
        open: String,
    },

    /// The label could not be stored.
    #[error(transparent)]
    Intern(#[from] InternError),
}

/// Recorder with text labels.
pub type StrRecorder<M> = Recorder<InternedLabels, M>;

/// Recorder with value labels (addresses, enums).
pub type ValueRecorder<L, M> = Recorder<ValueLabels<L>, M>;

/// Records nested scopes into a call tree.
pub struct Recorder<S: LabelStore, M> {
    labels: S,
    /// Initial measure of every node created by `begin_scope`.
    default_measure: M,
    tree: CallTree<S::Handle, M>,
    current: NodeId,
    busy: Cell<bool>,
}

impl<S: LabelStore + Default, M: Clone> Recorder<S, M> {
    /// Create a recorder whose root node carries `root_label` and
    /// `root_measure`.
    pub fn new(
        default_measure: M,
        root_label: &S::Label,
        root_measure: M,
    ) -> Result<Self, ScopeError> {
        Self::with_labels(S::default(), default_measure, root_label, root_measure)
    }
}

impl<L, M> Recorder<ValueLabels<L>, M>
where
    L: Clone + Eq + Hash + fmt::Debug,
    M: Clone,
{
    /// Value labels are stored as-is, so construction cannot fail. Usable
    /// in `thread_local!` initializers.
    pub fn from_values(default_measure: M, root_label: L, root_measure: M) -> Self {
        Self {
            labels: ValueLabels::new(),
            default_measure,
            tree: CallTree::new(root_label, root_measure),
            current: NodeId::ROOT,
            busy: Cell::new(false),
        }
    }
}

impl<S: LabelStore, M: Clone> Recorder<S, M> {
    /// Like [`Recorder::new`] with a pre-configured label store.
    pub fn with_labels(
        mut labels: S,
        default_measure: M,
        root_label: &S::Label,
        root_measure: M,
    ) -> Result<Self, ScopeError> {
        let root = labels.save(root_label)?;
        tracing::debug!(root = ?root_label, "recorder created");
        Ok(Self {
            labels,
            default_measure,
            tree: CallTree::new(root, root_measure),
            current: NodeId::ROOT,
            busy: Cell::new(false),
        })
    }

    /// Open a scope named `label` under the current one.
    ///
    /// Reopening a label under the same parent reuses its node, so the
    /// measure keeps accumulating in the same slot.
    pub fn begin_scope(&mut self, label: &S::Label) -> Result<(), ScopeError> {
        self.internal(|rec| {
            let labels = &rec.labels;
            let existing = rec
                .tree
                .find_child(rec.current, |handle| labels.matches(handle, label));

            let node = match existing {
                Some(node) => node,
                None => {
                    let handle = rec.labels.save(label)?;
                    rec.tree
                        .add_child(rec.current, handle, rec.default_measure.clone())
                }
            };
            tracing::trace!(label = ?label, node = %node, "begin scope");
            rec.current = node;
            Ok(())
        })
    }

    /// Close the innermost scope.
    ///
    /// # Panics
    ///
    /// If no scope is open. Unbalanced begin/end calls leave the cursor
    /// meaningless for every later call, so this is not recoverable.
    pub fn end_scope(&mut self) {
        if let Err(err) = self.try_end_scope() {
            fatal(&err);
        }
    }

    /// Close the innermost scope after checking it is named `label`.
    ///
    /// # Panics
    ///
    /// If no scope is open or the open scope has a different label.
    pub fn end_scope_checked(&mut self, label: &S::Label) {
        if let Err(err) = self.try_end_scope_checked(label) {
            fatal(&err);
        }
    }

    /// Fallible [`Recorder::end_scope`]; the cursor is unchanged on error.
    pub fn try_end_scope(&mut self) -> Result<(), ScopeError> {
        self.internal(|rec| rec.ascend())
    }

    /// Fallible [`Recorder::end_scope_checked`]; the cursor is unchanged on
    /// error.
    pub fn try_end_scope_checked(&mut self, label: &S::Label) -> Result<(), ScopeError> {
        self.internal(|rec| {
            if rec.current == NodeId::ROOT {
                return Err(ScopeError::Unbalanced);
            }
            let handle = rec.tree.node(rec.current).label();
            if !rec.labels.matches(handle, label) {
                return Err(ScopeError::LabelMismatch {
                    closing: format!("{label:?}"),
                    open: format!("{:?}", rec.labels.restore(handle)),
                });
            }
            rec.ascend()
        })
    }

    fn ascend(&mut self) -> Result<(), ScopeError> {
        let parent = self.tree.parent(self.current).ok_or(ScopeError::Unbalanced)?;
        tracing::trace!(node = %self.current, "end scope");
        self.current = parent;
        Ok(())
    }

    /// Measure of the innermost open scope (the root if none is open).
    #[inline]
    pub fn current_measure(&self) -> &M {
        self.tree.node(self.current).measure()
    }

    /// Mutable measure of the innermost open scope.
    #[inline]
    pub fn current_measure_mut(&mut self) -> &mut M {
        self.tree.node_mut(self.current).measure_mut()
    }

    /// Label of the innermost open scope.
    pub fn current_label(&self) -> S::Restored<'_> {
        self.labels.restore(self.tree.node(self.current).label())
    }

    /// Node of the innermost open scope.
    pub fn current_node(&self) -> NodeId {
        self.current
    }

    /// Number of open scopes.
    pub fn depth(&self) -> usize {
        self.tree.depth(self.current)
    }

    /// Whether no scope is open.
    pub fn is_at_root(&self) -> bool {
        self.current == NodeId::ROOT
    }

    /// True while a recorder operation is running. Instrumentation hooks
    /// that fire in that window must not call back into the recorder.
    #[inline]
    pub fn is_busy(&self) -> bool {
        self.busy.get()
    }

    /// Recorded tree.
    pub fn tree(&self) -> &CallTree<S::Handle, M> {
        &self.tree
    }

    /// Label store, for restoring handles found in [`Recorder::tree`].
    pub fn labels(&self) -> &S {
        &self.labels
    }

    /// Self/total report with a caller-supplied `combine`.
    ///
    /// `combine` must be associative and commutative (addition is the
    /// usual choice): occurrences of a label are folded in traversal order.
    pub fn report_with<F>(&self, combine: F) -> Report<S::Restored<'_>, M>
    where
        F: Fn(&M, &M) -> M,
    {
        self.internal_ref(|rec| report::generate(&rec.tree, &rec.labels, combine))
    }

    /// Self/total report combining measures with `+`.
    pub fn report(&self) -> Report<S::Restored<'_>, M>
    where
        M: Add<Output = M>,
    {
        self.report_with(|a, b| a.clone() + b.clone())
    }

    /// Collapsed stacks, one line per node, with caller-supplied formatting.
    pub fn collapsed_with<'a, FL, DL, FM, DM>(
        &'a self,
        label_fmt: FL,
        measure_fmt: FM,
    ) -> Result<String, fmt::Error>
    where
        FL: Fn(&S::Restored<'a>) -> DL,
        DL: Display,
        FM: Fn(&M) -> DM,
        DM: Display,
    {
        self.internal_ref(|rec| {
            collapsed::to_string(&rec.tree, &rec.labels, label_fmt, measure_fmt)
        })
    }

    /// Collapsed stacks using `Display` for labels and measures.
    pub fn collapsed<'a>(&'a self) -> Result<String, fmt::Error>
    where
        S::Restored<'a>: Display,
        M: Display,
    {
        self.collapsed_with(|label| label.clone(), |measure| measure.clone())
    }

    /// Stream collapsed stacks to `out`.
    pub fn write_collapsed<'a, W, FL, DL, FM, DM>(
        &'a self,
        out: W,
        label_fmt: FL,
        measure_fmt: FM,
    ) -> io::Result<()>
    where
        W: io::Write,
        FL: Fn(&S::Restored<'a>) -> DL,
        DL: Display,
        FM: Fn(&M) -> DM,
        DM: Display,
    {
        self.internal_ref(|rec| {
            collapsed::write_to(out, &rec.tree, &rec.labels, label_fmt, measure_fmt)
        })
    }

    fn internal<R>(&mut self, op: impl FnOnce(&mut Self) -> R) -> R {
        self.busy.set(true);
        let result = op(self);
        self.busy.set(false);
        result
    }

    fn internal_ref<'a, R>(&'a self, op: impl FnOnce(&'a Self) -> R) -> R {
        let was_busy = self.busy.replace(true);
        let result = op(self);
        self.busy.set(was_busy);
        result
    }
}

impl<S, M> fmt::Debug for Recorder<S, M>
where
    S: LabelStore + fmt::Debug,
    M: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Recorder")
            .field("labels", &self.labels)
            .field("nodes", &self.tree.len())
            .field("current", &self.current)
            .field("busy", &self.busy.get())
            .finish()
    }
}

#[cold]
#[track_caller]
fn fatal(err: &ScopeError) -> ! {
    tracing::error!(%err, "scope recording aborted");
    panic!("{err}")
}

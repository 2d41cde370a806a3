//! Call-tree node
//!
//! Nodes live in the tree's arena and refer to each other by [`NodeId`].
//! Ownership flows root -> children through the arena; `parent` is a plain
//! index used only to ascend.

use std::fmt;

/// Index of a node in its [`CallTree`](super::CallTree) arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// The root is always the first node allocated.
    pub const ROOT: NodeId = NodeId(0);

    /// Position in the arena (allocation order).
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One scope occurrence path: a label under a specific parent.
#[derive(Debug, Clone)]
pub struct Node<H, M> {
    label: H,
    measure: M,
    parent: Option<NodeId>,
    /// In insertion order (first time each label was opened here).
    children: Vec<NodeId>,
}

impl<H, M> Node<H, M> {
    pub(crate) fn new(label: H, measure: M, parent: Option<NodeId>) -> Self {
        Self {
            label,
            measure,
            parent,
            children: Vec::new(),
        }
    }

    /// Label handle; fixed at construction.
    #[inline]
    pub fn label(&self) -> &H {
        &self.label
    }

    /// Accumulated measure.
    #[inline]
    pub fn measure(&self) -> &M {
        &self.measure
    }

    /// Mutable accumulated measure.
    #[inline]
    pub fn measure_mut(&mut self) -> &mut M {
        &mut self.measure
    }

    /// Parent node; `None` only for the root.
    #[inline]
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Children in insertion order.
    #[inline]
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Check if leaf (no scope was ever opened under it)
    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub(crate) fn push_child(&mut self, child: NodeId) {
        self.children.push(child);
    }
}

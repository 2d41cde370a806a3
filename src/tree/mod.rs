//! Arena-backed call tree
//!
//! Every node is stored in one `Vec`; links are [`NodeId`] indices. The root
//! is allocated with the tree and never removed, so [`NodeId::ROOT`] is
//! always valid. Dropping the tree drops the arena in one go (no recursive
//! destruction).

mod node;
mod traversal;

pub use node::{Node, NodeId};
pub use traversal::{PostOrder, PreOrder};

/// Tree of measure-bearing nodes keyed by label handles.
#[derive(Debug, Clone)]
pub struct CallTree<H, M> {
    nodes: Vec<Node<H, M>>,
}

impl<H, M> CallTree<H, M> {
    /// Create a tree holding only the root.
    pub fn new(root_label: H, root_measure: M) -> Self {
        Self {
            nodes: vec![Node::new(root_label, root_measure, None)],
        }
    }

    /// Root node id.
    #[inline]
    pub fn root(&self) -> NodeId {
        NodeId::ROOT
    }

    /// Node by id.
    ///
    /// Ids are only handed out by this tree, so lookup cannot miss.
    #[inline]
    pub fn node(&self, id: NodeId) -> &Node<H, M> {
        &self.nodes[id.0]
    }

    /// Mutable node by id.
    #[inline]
    pub fn node_mut(&mut self, id: NodeId) -> &mut Node<H, M> {
        &mut self.nodes[id.0]
    }

    /// Append a new child under `parent` and return its id.
    ///
    /// Does not check for an existing child with the same label; that is the
    /// recorder's job.
    pub fn add_child(&mut self, parent: NodeId, label: H, measure: M) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node::new(label, measure, Some(parent)));
        self.nodes[parent.0].push_child(id);
        id
    }

    /// First child of `parent` satisfying `pred`, scanning in insertion order.
    pub fn find_child(&self, parent: NodeId, mut pred: impl FnMut(&H) -> bool) -> Option<NodeId> {
        self.node(parent)
            .children()
            .iter()
            .copied()
            .find(|&child| pred(self.node(child).label()))
    }

    /// Parent of `id` (`None` for the root).
    #[inline]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent()
    }

    /// Number of nodes, root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always false: the root exists for the tree's whole life.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Distance from the root (root = 0).
    pub fn depth(&self, id: NodeId) -> usize {
        std::iter::successors(self.parent(id), |&p| self.parent(p)).count()
    }

    /// Ids from the root down to `id`, both included.
    pub fn path(&self, id: NodeId) -> Vec<NodeId> {
        let mut path: Vec<NodeId> =
            std::iter::successors(Some(id), |&p| self.parent(p)).collect();
        path.reverse();
        path
    }

    /// Depth-first, parents before children.
    pub fn pre_order(&self) -> PreOrder<'_, H, M> {
        PreOrder::new(self)
    }

    /// Depth-first, children before parents.
    pub fn post_order(&self) -> PostOrder<'_, H, M> {
        PostOrder::new(self)
    }

    /// All nodes in allocation order.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node<H, M>)> + '_ {
        self.nodes.iter().enumerate().map(|(i, node)| (NodeId(i), node))
    }
}

//! Depth-first traversals
//!
//! Both orders use an explicit stack, so deep recursion in the profiled
//! program cannot overflow the exporter's stack.
//! Children are always visited in insertion order.

use super::{CallTree, NodeId};

/// Pre-order walk yielding `(node, depth)`; the root has depth 0.
#[derive(Debug)]
pub struct PreOrder<'t, H, M> {
    tree: &'t CallTree<H, M>,
    stack: Vec<(NodeId, usize)>,
}

impl<'t, H, M> PreOrder<'t, H, M> {
    pub(crate) fn new(tree: &'t CallTree<H, M>) -> Self {
        Self {
            tree,
            stack: vec![(NodeId::ROOT, 0)],
        }
    }
}

impl<H, M> Iterator for PreOrder<'_, H, M> {
    type Item = (NodeId, usize);

    fn next(&mut self) -> Option<Self::Item> {
        let (id, depth) = self.stack.pop()?;
        // Reversed so the first child is popped first
        self.stack.extend(
            self.tree
                .node(id)
                .children()
                .iter()
                .rev()
                .map(|&child| (child, depth + 1)),
        );
        Some((id, depth))
    }
}

/// Post-order walk: every node after all of its descendants.
#[derive(Debug)]
pub struct PostOrder<'t, H, M> {
    tree: &'t CallTree<H, M>,
    /// (node, index of the next child to descend into)
    stack: Vec<(NodeId, usize)>,
}

impl<'t, H, M> PostOrder<'t, H, M> {
    pub(crate) fn new(tree: &'t CallTree<H, M>) -> Self {
        Self {
            tree,
            stack: vec![(NodeId::ROOT, 0)],
        }
    }
}

impl<H, M> Iterator for PostOrder<'_, H, M> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (id, next_child) = self.stack.last_mut()?;
            let id = *id;
            match self.tree.node(id).children().get(*next_child) {
                Some(&child) => {
                    *next_child += 1;
                    self.stack.push((child, 0));
                }
                None => {
                    self.stack.pop();
                    return Some(id);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// root -> a -> (b, c); root -> d
    fn sample() -> CallTree<&'static str, u32> {
        let mut tree = CallTree::new("root", 0);
        let a = tree.add_child(NodeId::ROOT, "a", 0);
        tree.add_child(a, "b", 0);
        tree.add_child(a, "c", 0);
        tree.add_child(NodeId::ROOT, "d", 0);
        tree
    }

    #[test]
    fn test_pre_order() {
        let tree = sample();
        let visited: Vec<_> = tree
            .pre_order()
            .map(|(id, depth)| (*tree.node(id).label(), depth))
            .collect();

        assert_eq!(
            visited,
            [("root", 0), ("a", 1), ("b", 2), ("c", 2), ("d", 1)]
        );
    }

    #[test]
    fn test_post_order() {
        let tree = sample();
        let visited: Vec<_> = tree
            .post_order()
            .map(|id| *tree.node(id).label())
            .collect();

        assert_eq!(visited, ["b", "c", "a", "d", "root"]);
    }

    #[test]
    fn test_deep_chain_does_not_recurse() {
        let mut tree = CallTree::new(0u32, 0u8);
        let mut cursor = NodeId::ROOT;
        for depth in 1..=100_000u32 {
            cursor = tree.add_child(cursor, depth, 0);
        }

        assert_eq!(tree.post_order().count(), 100_001);
        assert_eq!(tree.pre_order().last().map(|(_, depth)| depth), Some(100_000));
    }
}

//! Self/total report
//!
//! For every distinct (restored) label:
//!   self  = sum of the label's own node measures
//!   total = sum over the label's nodes of (own measure + all descendants)
//! A label recurring at several places in the tree yields one entry.
//!
//! Nested recursion of the same label counts the inner subtree in both
//! totals, as each occurrence's total is accumulated independently.

use std::collections::HashMap;
use std::hash::Hash;

use crate::label::LabelStore;
use crate::tree::CallTree;

/// Aggregated measures for one label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "visualize", derive(serde::Serialize, serde::Deserialize))]
pub struct ReportEntry<M> {
    /// Measure recorded while the label was the innermost scope.
    pub self_measure: M,
    /// Self plus everything recorded in nested scopes.
    pub total: M,
}

/// Per-label report, keyed by external label value.
#[derive(Debug, Clone)]
pub struct Report<K, M> {
    entries: HashMap<K, ReportEntry<M>>,
}

impl<K: Eq + Hash, M> Report<K, M> {
    /// Entry for `label`.
    pub fn get(&self, label: &K) -> Option<&ReportEntry<M>> {
        self.entries.get(label)
    }

    /// Number of distinct labels.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the report has no entries (never true for a generated one:
    /// the root always contributes).
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &ReportEntry<M>)> {
        self.entries.iter()
    }

    /// Entries ordered by `compare`, e.g. descending total.
    pub fn sorted_by<F>(&self, mut compare: F) -> Vec<(&K, &ReportEntry<M>)>
    where
        F: FnMut(&ReportEntry<M>, &ReportEntry<M>) -> std::cmp::Ordering,
    {
        let mut rows: Vec<_> = self.entries.iter().collect();
        rows.sort_by(|a, b| compare(a.1, b.1));
        rows
    }

    /// Underlying map.
    pub fn into_entries(self) -> HashMap<K, ReportEntry<M>> {
        self.entries
    }
}

impl<K, M> IntoIterator for Report<K, M> {
    type Item = (K, ReportEntry<M>);
    type IntoIter = std::collections::hash_map::IntoIter<K, ReportEntry<M>>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Build the report for `tree` in one post-order pass.
///
/// Node total = `combine(measure, child_total_1)`, then folded with each
/// further child total in insertion order. `combine` must be associative
/// and commutative, otherwise per-label results depend on tree layout.
/// The tree is only read.
pub fn generate<'s, S, M, F>(
    tree: &CallTree<S::Handle, M>,
    labels: &'s S,
    combine: F,
) -> Report<S::Restored<'s>, M>
where
    S: LabelStore,
    M: Clone,
    F: Fn(&M, &M) -> M,
{
    let mut totals: Vec<Option<M>> = vec![None; tree.len()];
    let mut entries: HashMap<S::Restored<'s>, ReportEntry<M>> = HashMap::new();

    for id in tree.post_order() {
        let node = tree.node(id);
        let total = node
            .children()
            .iter()
            .filter_map(|child| totals[child.index()].take())
            .fold(node.measure().clone(), |acc, child_total| {
                combine(&acc, &child_total)
            });

        let label = labels.restore(node.label());
        match entries.get_mut(&label) {
            Some(entry) => {
                entry.self_measure = combine(&entry.self_measure, node.measure());
                entry.total = combine(&entry.total, &total);
            }
            None => {
                entries.insert(
                    label,
                    ReportEntry {
                        self_measure: node.measure().clone(),
                        total: total.clone(),
                    },
                );
            }
        }
        totals[id.index()] = Some(total);
    }

    tracing::debug!(nodes = tree.len(), labels = entries.len(), "report generated");
    Report { entries }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::label::ValueLabels;
    use crate::tree::NodeId;

    fn add(a: &u64, b: &u64) -> u64 {
        a + b
    }

    #[test]
    fn test_root_only() {
        let tree = CallTree::new("root", 7u64);
        let labels = ValueLabels::<&str>::new();
        let report = generate(&tree, &labels, add);

        assert_eq!(report.len(), 1);
        assert_eq!(
            report.get(&"root"),
            Some(&ReportEntry {
                self_measure: 7,
                total: 7
            })
        );
    }

    #[test]
    fn test_recursion_counts_each_occurrence() {
        // root -> f(1) -> f(2)
        let mut tree = CallTree::new("root", 0u64);
        let outer = tree.add_child(NodeId::ROOT, "f", 1);
        tree.add_child(outer, "f", 2);
        let labels = ValueLabels::<&str>::new();

        let report = generate(&tree, &labels, add);
        let f = report.get(&"f").unwrap();
        assert_eq!(f.self_measure, 3);
        assert_eq!(f.total, 3 + 2);
        assert_eq!(report.get(&"root").unwrap().total, 3);
    }

    #[test]
    fn test_custom_combine() {
        let mut tree = CallTree::new("root", 1u64);
        tree.add_child(NodeId::ROOT, "a", 4);
        tree.add_child(NodeId::ROOT, "b", 9);
        let labels = ValueLabels::<&str>::new();

        let report = generate(&tree, &labels, |a: &u64, b: &u64| *a.max(b));
        assert_eq!(report.get(&"root").unwrap().total, 9);
        assert_eq!(report.get(&"a").unwrap().total, 4);
    }

    #[test]
    fn test_sorted_by_total() {
        let mut tree = CallTree::new("root", 0u64);
        tree.add_child(NodeId::ROOT, "small", 1);
        tree.add_child(NodeId::ROOT, "large", 10);
        let labels = ValueLabels::<&str>::new();

        let report = generate(&tree, &labels, add);
        let order: Vec<&str> = report
            .sorted_by(|a, b| b.total.cmp(&a.total))
            .into_iter()
            .map(|(label, _)| *label)
            .collect();
        assert_eq!(order, ["root", "large", "small"]);
    }
}

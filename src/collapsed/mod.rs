//! Collapsed-stack export
//!
//! One line per tree node, pre-order, children in insertion order:
//!
//! ```text
//! root 0
//! root;f1 5
//! root;f1;f2 3
//! ```
//!
//! Labels are written as-is: a `;` inside a label will split it into two
//! frames for any consumer of the format.

use std::fmt::{self, Display, Write as _};
use std::io;

use crate::label::LabelStore;
use crate::tree::CallTree;

/// Write every line to a `fmt::Write` sink.
pub fn write_lines<'s, W, S, M, FL, DL, FM, DM>(
    out: &mut W,
    tree: &CallTree<S::Handle, M>,
    labels: &'s S,
    label_fmt: FL,
    measure_fmt: FM,
) -> fmt::Result
where
    W: fmt::Write + ?Sized,
    S: LabelStore,
    FL: Fn(&S::Restored<'s>) -> DL,
    DL: Display,
    FM: Fn(&M) -> DM,
    DM: Display,
{
    // `path` holds the current line prefix; `ends[d]` is its length once
    // the node at depth d has been appended.
    let mut path = String::new();
    let mut ends: Vec<usize> = Vec::new();

    for (id, depth) in tree.pre_order() {
        let node = tree.node(id);
        ends.truncate(depth);
        path.truncate(ends.last().copied().unwrap_or(0));
        if depth > 0 {
            path.push(';');
        }
        write!(path, "{}", label_fmt(&labels.restore(node.label())))?;
        ends.push(path.len());

        writeln!(out, "{path} {}", measure_fmt(node.measure()))?;
    }
    Ok(())
}

/// Collapsed stacks as a `String`.
pub fn to_string<'s, S, M, FL, DL, FM, DM>(
    tree: &CallTree<S::Handle, M>,
    labels: &'s S,
    label_fmt: FL,
    measure_fmt: FM,
) -> Result<String, fmt::Error>
where
    S: LabelStore,
    FL: Fn(&S::Restored<'s>) -> DL,
    DL: Display,
    FM: Fn(&M) -> DM,
    DM: Display,
{
    let mut out = String::new();
    write_lines(&mut out, tree, labels, label_fmt, measure_fmt)?;
    tracing::debug!(nodes = tree.len(), bytes = out.len(), "collapsed stacks rendered");
    Ok(out)
}

/// Stream collapsed stacks to an `io::Write` sink.
pub fn write_to<'s, W, S, M, FL, DL, FM, DM>(
    out: W,
    tree: &CallTree<S::Handle, M>,
    labels: &'s S,
    label_fmt: FL,
    measure_fmt: FM,
) -> io::Result<()>
where
    W: io::Write,
    S: LabelStore,
    FL: Fn(&S::Restored<'s>) -> DL,
    DL: Display,
    FM: Fn(&M) -> DM,
    DM: Display,
{
    let mut sink = IoSink {
        inner: out,
        error: None,
    };
    match write_lines(&mut sink, tree, labels, label_fmt, measure_fmt) {
        Ok(()) => sink.inner.flush(),
        Err(fmt::Error) => Err(sink
            .error
            .unwrap_or_else(|| io::Error::other("label or measure formatter failed"))),
    }
}

/// Adapts `io::Write` to `fmt::Write`, keeping the first I/O error.
struct IoSink<W> {
    inner: W,
    error: Option<io::Error>,
}

impl<W: io::Write> fmt::Write for IoSink<W> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.inner.write_all(s.as_bytes()).map_err(|err| {
            self.error = Some(err);
            fmt::Error
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::label::ValueLabels;
    use crate::tree::NodeId;

    fn identity(tree: &CallTree<&'static str, u64>) -> String {
        let labels = ValueLabels::<&'static str>::new();
        to_string(tree, &labels, |l| *l, |m| *m).unwrap()
    }

    #[test]
    fn test_chain() {
        let mut tree = CallTree::new("root", 0u64);
        let f1 = tree.add_child(NodeId::ROOT, "f1", 5);
        tree.add_child(f1, "f2", 3);

        assert_eq!(identity(&tree), "root 0\nroot;f1 5\nroot;f1;f2 3\n");
    }

    #[test]
    fn test_siblings_reset_prefix() {
        let mut tree = CallTree::new("r", 0u64);
        let long = tree.add_child(NodeId::ROOT, "a_long_name", 1);
        tree.add_child(long, "x", 2);
        tree.add_child(NodeId::ROOT, "b", 3);

        assert_eq!(identity(&tree), "r 0\nr;a_long_name 1\nr;a_long_name;x 2\nr;b 3\n");
    }

    #[test]
    fn test_semicolon_not_escaped() {
        let mut tree = CallTree::new("root", 0u64);
        tree.add_child(NodeId::ROOT, "a;b", 1);

        assert_eq!(identity(&tree), "root 0\nroot;a;b 1\n");
    }

    #[test]
    fn test_io_sink_matches_string() {
        let mut tree = CallTree::new("root", 0u64);
        tree.add_child(NodeId::ROOT, "f", 2);
        let labels = ValueLabels::<&'static str>::new();

        let mut bytes = Vec::new();
        write_to(&mut bytes, &tree, &labels, |l| *l, |m| m * 10).unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), "root 0\nroot;f 20\n");
    }

    #[test]
    fn test_io_error_is_surfaced() {
        struct Broken;
        impl io::Write for Broken {
            fn write(&mut self, _: &[u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
            }
            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let tree = CallTree::new("root", 0u64);
        let labels = ValueLabels::<&'static str>::new();
        let err = write_to(Broken, &tree, &labels, |l| *l, |m| *m).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }
}

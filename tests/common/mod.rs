#![allow(dead_code)]

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use fiya::label::LabelStore;
use fiya::recorder::StrRecorder;
use proptest::prelude::*;

fn snapshot_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("snapshots")
}

pub fn assert_snapshot(name: &str, actual: &str) {
    let path = snapshot_root().join(name);
    if std::env::var("FIYA_UPDATE_SNAPSHOTS").is_ok() {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create snapshot directory");
        }
        fs::write(&path, actual).expect("write snapshot");
        return;
    }

    let expected =
        fs::read_to_string(&path).unwrap_or_else(|_| panic!("snapshot {:?} not found", path));
    if normalize(&expected) != normalize(actual) {
        panic!(
            "Snapshot mismatch for {:?}. Set FIYA_UPDATE_SNAPSHOTS=1 to regenerate.\nExpected:\n{}\nActual:\n{}",
            path, expected, actual
        );
    }
}

fn normalize(input: &str) -> String {
    input.replace("\r\n", "\n")
}

pub const LABELS: [&str; 4] = ["alpha", "beta", "gamma", "delta"];

/// One begin/end event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Open(usize),
    Close,
}

pub fn ops() -> impl Strategy<Value = Vec<Op>> {
    proptest::collection::vec(
        prop_oneof![(0..LABELS.len()).prop_map(Op::Open), Just(Op::Close)],
        0..64,
    )
}

/// Drop closes that would unbalance the sequence and close whatever is
/// still open at the end.
pub fn balance(ops: &[Op]) -> Vec<Op> {
    let mut depth = 0usize;
    let mut out = Vec::with_capacity(ops.len());
    for &op in ops {
        match op {
            Op::Open(_) => depth += 1,
            Op::Close if depth == 0 => continue,
            Op::Close => depth -= 1,
        }
        out.push(op);
    }
    out.extend(std::iter::repeat(Op::Close).take(depth));
    out
}

/// Distinct nesting paths taken by `ops`, root path included.
pub fn nesting_paths(ops: &[Op]) -> BTreeSet<Vec<String>> {
    let mut stack = vec!["root".to_string()];
    let mut paths = BTreeSet::from([stack.clone()]);
    for &op in ops {
        match op {
            Op::Open(i) => {
                stack.push(LABELS[i].to_string());
                paths.insert(stack.clone());
            }
            Op::Close => {
                stack.pop();
            }
        }
    }
    paths
}

pub fn replay(rec: &mut StrRecorder<u64>, ops: &[Op]) {
    for &op in ops {
        match op {
            Op::Open(i) => {
                rec.begin_scope(LABELS[i]).expect("label interns");
                *rec.current_measure_mut() += 1;
            }
            Op::Close => rec.end_scope(),
        }
    }
}

/// Root-to-node label path of every node in the tree.
pub fn tree_paths<M: Clone>(rec: &StrRecorder<M>) -> BTreeSet<Vec<String>> {
    let tree = rec.tree();
    tree.pre_order()
        .map(|(id, _)| {
            tree.path(id)
                .into_iter()
                .map(|node| rec.labels().restore(tree.node(node).label()).to_string())
                .collect()
        })
        .collect()
}

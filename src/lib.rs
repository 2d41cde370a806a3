//! # fiya: in-process scope profiler
//!
//! Records nested scopes (function calls or labeled regions) into a
//! per-thread call tree, accumulates a caller-chosen measure per node, and
//! exports the tree as collapsed stacks for flame-graph tools or as a flat
//! self/total report.
//!
//! ## Components
//!
//! 1. **Interner**: append-only, deduplicated string arena whose handles
//!    stay valid across growth
//! 2. **Recorder**: call tree plus a cursor on the innermost open scope
//! 3. **Report**: post-order self/total aggregation per distinct label
//! 4. **Collapsed stacks**: `root;f1;f2 <measure>` lines, pre-order
//!
//! Measures and triggers (RAII timers, hook-driven timers, heap tracking
//! through the global allocator) are built on top of the recorder's
//! [`Scoping`] and [`Counter`] traits.
//!
//! ## Usage Example
//!
//! ```
//! use fiya::StrRecorder;
//!
//! let mut rec = StrRecorder::new(0u64, "root", 0).unwrap();
//! rec.begin_scope("f1").unwrap();
//! *rec.current_measure_mut() += 5;
//! rec.begin_scope("f2").unwrap();
//! *rec.current_measure_mut() += 3;
//! rec.end_scope();
//! rec.end_scope();
//!
//! assert_eq!(rec.collapsed().unwrap(), "root 0\nroot;f1 5\nroot;f1;f2 3\n");
//!
//! let report = rec.report();
//! assert_eq!(report.get(&"f1").unwrap().total, 8);
//! ```

#![warn(missing_docs, missing_debug_implementations)]
#![allow(clippy::new_without_default)]

pub mod collapsed;
pub mod interner;
pub mod label;
pub mod local;
pub mod measure;
pub mod recorder;
pub mod report;
pub mod tree;
pub mod trigger;

pub use interner::{InternError, StrHandle, StringInterner};
pub use label::{InternedLabels, LabelStore, ValueLabels};
pub use local::LocalRecorder;
pub use measure::{Clock, HeapUsage, ThreadCpuClock, TimeValue, WallClock};
pub use recorder::{Counter, Recorder, ScopeError, Scoping, StrRecorder, ValueRecorder};
pub use report::{Report, ReportEntry};
pub use tree::{CallTree, Node, NodeId};
pub use trigger::{HeapScope, ScopeGuard, ScopeTimer, TimedScopes, TrackingAllocator, Triggered};

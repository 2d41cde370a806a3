//! Measures accumulated per scope
//!
//! The recorder is generic over its measure; these are the two the
//! bundled triggers know how to feed.

mod heap;
mod time;

pub use heap::HeapUsage;
pub use time::{Clock, ThreadCpuClock, TimeValue, WallClock};

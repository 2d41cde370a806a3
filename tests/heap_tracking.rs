//! Heap attribution through the real global allocator
//!
//! Each test runs on its own thread; tracking state is per thread, so
//! allocations made by the harness on other threads never show up.

use std::alloc::System;
use std::hint::black_box;

use fiya::measure::HeapUsage;
use fiya::recorder::ValueRecorder;
use fiya::trigger::{
    flush_pending, suppressed, HeapScope, HeapTracking, ScopeGuard, TrackingAllocator,
};

#[global_allocator]
static ALLOC: TrackingAllocator<System> = TrackingAllocator::new(System);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Region {
    Root,
    Load,
    Parse,
}

type Rec = ValueRecorder<Region, HeapUsage>;

fn node_usage(rec: &Rec, region: Region) -> HeapUsage {
    let tree = rec.tree();
    tree.nodes()
        .find(|(_, node)| *node.label() == region)
        .map(|(_, node)| *node.measure())
        .unwrap()
}

#[test]
fn test_allocations_land_in_their_scope() {
    let mut rec = Rec::from_values(HeapUsage::default(), Region::Root, HeapUsage::default());
    let session = HeapTracking::start();
    {
        let mut load: HeapScope<'_, Rec> = ScopeGuard::heap(&mut rec, &Region::Load).unwrap();
        let kept = black_box(vec![0u8; 4096]);
        {
            let _parse = ScopeGuard::heap(&mut *load, &Region::Parse).unwrap();
            let scratch = black_box(vec![0u8; 1024]);
            drop(scratch);
        }
        drop(kept);
    }
    flush_pending(rec.current_measure_mut());
    drop(session);

    let load = node_usage(&rec, Region::Load);
    let parse = node_usage(&rec, Region::Parse);

    assert!(load.total_allocations >= 4096);
    assert!(load.peak_allocations >= 4096);
    assert!(parse.total_allocations >= 1024);
    assert!(parse.peak_allocations >= 1024);
    assert_eq!(parse.current_allocations, 0);
    assert_eq!(parse.bad_deallocations, 0);

    // 1 KiB of parse scratch is not load's own activity
    assert!(load.total_allocations < 4096 + 1024);
}

#[test]
fn test_memory_from_before_the_session_is_a_bad_deallocation() {
    let early = black_box(vec![0u8; 256]);
    let mut usage = HeapUsage::default();

    let _session = HeapTracking::start();
    drop(early);
    flush_pending(&mut usage);

    assert!(usage.bad_deallocations >= 1);
    assert_eq!(usage.current_allocations, 0);
}

#[test]
fn test_suppressed_activity_is_invisible() {
    let mut usage = HeapUsage::default();
    let _session = HeapTracking::start();

    suppressed(|| drop(black_box(vec![0u8; 1 << 16])));
    flush_pending(&mut usage);

    assert!(usage.total_allocations < 1 << 16);
}

#[test]
fn test_nothing_tracked_without_session() {
    let mut usage = HeapUsage::default();
    flush_pending(&mut usage);
    drop(black_box(vec![0u8; 512]));
    flush_pending(&mut usage);

    assert!(!HeapTracking::is_active());
    assert_eq!(usage, HeapUsage::default());
}

//! Heap attribution
//!
//! [`TrackingAllocator`] wraps the global allocator and counts every
//! allocation and deallocation made on a thread with an active
//! [`HeapTracking`] session. It never touches a recorder: byte counts go to
//! a per-thread pending tally, and [`HeapAttribution`] folds that tally into
//! the innermost scope's [`HeapUsage`] at each transition.
//!
//! Per-thread state:
//!
//! - inactive: no session on this thread, nothing is counted
//! - ready: counting
//! - busy: a transition is running, the recorder's own allocations are not
//!   counted
//!
//! Both thread-locals are `const`-initialized `Cell`s of `Copy` types, so
//! they register no TLS destructor and are safe to touch from inside the
//! allocator.

use std::alloc::{GlobalAlloc, Layout};
use std::cell::Cell;
use std::marker::PhantomData;

use super::Accumulator;
use crate::measure::HeapUsage;

const INACTIVE: u8 = 0;
const READY: u8 = 1;
const BUSY: u8 = 2;

/// Activity not yet folded into a [`HeapUsage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Pending {
    /// Allocated minus freed since the last flush.
    net: i64,
    /// Highest `net` since the last flush.
    peak_net: i64,
    total: u64,
    bad: u64,
    /// Bytes allocated during the session and not yet freed. Survives
    /// flushes.
    live: u64,
}

impl Pending {
    const ZERO: Pending = Pending {
        net: 0,
        peak_net: 0,
        total: 0,
        bad: 0,
        live: 0,
    };

    fn alloc(&mut self, bytes: u64) {
        let signed = i64::try_from(bytes).unwrap_or(i64::MAX);
        self.net = self.net.saturating_add(signed);
        self.peak_net = self.peak_net.max(self.net);
        self.total = self.total.saturating_add(bytes);
        self.live = self.live.saturating_add(bytes);
    }

    fn dealloc(&mut self, bytes: u64) {
        if bytes > self.live {
            self.bad = self.bad.saturating_add(1);
            return;
        }
        self.live -= bytes;
        self.net = self
            .net
            .saturating_sub(i64::try_from(bytes).unwrap_or(i64::MAX));
    }
}

thread_local! {
    static STATE: Cell<u8> = const { Cell::new(INACTIVE) };
    static PENDING: Cell<Pending> = const { Cell::new(Pending::ZERO) };
}

fn state() -> u8 {
    STATE.try_with(Cell::get).unwrap_or(INACTIVE)
}

fn set_state(value: u8) {
    let _ = STATE.try_with(|state| state.set(value));
}

fn update_pending(f: impl FnOnce(&mut Pending)) {
    if state() != READY {
        return;
    }
    let _ = PENDING.try_with(|cell| {
        let mut pending = cell.get();
        f(&mut pending);
        cell.set(pending);
    });
}

pub(crate) fn record_alloc(bytes: usize) {
    update_pending(|p| p.alloc(bytes as u64));
}

pub(crate) fn record_dealloc(bytes: usize) {
    update_pending(|p| p.dealloc(bytes as u64));
}

/// Fold this thread's pending activity into `usage` and reset the tally.
///
/// Transitions do this automatically; call it on the root (or the open
/// scope) before reading the final numbers.
pub fn flush_pending(usage: &mut HeapUsage) {
    let _ = PENDING.try_with(|cell| {
        let p = cell.get();
        usage.peak_allocations = usage
            .peak_allocations
            .max(usage.current_allocations.saturating_add_signed(p.peak_net));
        usage.current_allocations = usage.current_allocations.saturating_add_signed(p.net);
        usage.total_allocations = usage.total_allocations.saturating_add(p.total);
        usage.bad_deallocations = usage.bad_deallocations.saturating_add(p.bad);
        cell.set(Pending {
            live: p.live,
            ..Pending::ZERO
        });
    });
}

/// Run `f` without counting its heap activity on this thread.
pub fn suppressed<T>(f: impl FnOnce() -> T) -> T {
    let previous = state();
    if previous == READY {
        set_state(BUSY);
    }
    let result = f();
    if previous == READY {
        set_state(READY);
    }
    result
}

/// Heap tracking on the current thread for the guard's lifetime.
///
/// Starting a session discards any earlier tally, including the live bytes
/// used to detect bad deallocations.
#[derive(Debug)]
#[must_use = "tracking stops when the session is dropped"]
pub struct HeapTracking {
    _thread_bound: PhantomData<*const ()>,
}

impl HeapTracking {
    /// Start counting on this thread.
    pub fn start() -> Self {
        tracing::debug!("heap tracking started");
        let _ = PENDING.try_with(|cell| cell.set(Pending::ZERO));
        set_state(READY);
        Self {
            _thread_bound: PhantomData,
        }
    }

    /// Whether this thread is currently counting.
    pub fn is_active() -> bool {
        state() != INACTIVE
    }
}

impl Drop for HeapTracking {
    fn drop(&mut self) {
        set_state(INACTIVE);
    }
}

/// Feeds [`HeapUsage`] from the tracking allocator.
///
/// Before a transition the pending tally goes to the scope being left and
/// counting pauses; after it counting resumes.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeapAttribution;

impl Accumulator for HeapAttribution {
    type Measure = HeapUsage;

    fn before_transition(&self, usage: &mut HeapUsage) {
        flush_pending(usage);
        if state() == READY {
            set_state(BUSY);
        }
    }

    fn after_transition(&self, _usage: &mut HeapUsage) {
        if state() == BUSY {
            set_state(READY);
        }
    }
}

/// Global allocator wrapper that feeds [`HeapAttribution`].
///
/// ```no_run
/// use std::alloc::System;
/// use fiya::trigger::TrackingAllocator;
///
/// #[global_allocator]
/// static ALLOC: TrackingAllocator<System> = TrackingAllocator::new(System);
///
/// fn main() {}
/// ```
#[derive(Debug, Default)]
pub struct TrackingAllocator<A> {
    inner: A,
}

impl<A> TrackingAllocator<A> {
    /// Wrap `inner`.
    pub const fn new(inner: A) -> Self {
        Self { inner }
    }
}

// SAFETY: every call is forwarded unchanged to `inner`; the bookkeeping
// neither allocates nor unwinds.
unsafe impl<A: GlobalAlloc> GlobalAlloc for TrackingAllocator<A> {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        // SAFETY: caller upholds `GlobalAlloc::alloc`'s contract.
        let ptr = unsafe { self.inner.alloc(layout) };
        if !ptr.is_null() {
            record_alloc(layout.size());
        }
        ptr
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        // SAFETY: caller upholds `GlobalAlloc::alloc_zeroed`'s contract.
        let ptr = unsafe { self.inner.alloc_zeroed(layout) };
        if !ptr.is_null() {
            record_alloc(layout.size());
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        // SAFETY: caller upholds `GlobalAlloc::dealloc`'s contract.
        unsafe { self.inner.dealloc(ptr, layout) };
        record_dealloc(layout.size());
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        // SAFETY: caller upholds `GlobalAlloc::realloc`'s contract.
        let new = unsafe { self.inner.realloc(ptr, layout, new_size) };
        if !new.is_null() {
            record_dealloc(layout.size());
            record_alloc(new_size);
        }
        new
    }
}

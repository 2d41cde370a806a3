//! Time accumulation
//!
//! The scope being left is charged up to the transition; the scope becoming
//! innermost is stamped after it. The recorder's own work between the two
//! readings is therefore charged to nobody.

use super::Accumulator;
use crate::measure::{Clock, TimeValue};

/// Charges elapsed time to the innermost scope, read from `C`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Timing<C> {
    clock: C,
}

impl<C: Clock> Timing<C> {
    /// Accumulate with `clock`.
    pub fn new(clock: C) -> Self {
        Self { clock }
    }

    /// Clock in use.
    pub fn clock(&self) -> &C {
        &self.clock
    }
}

impl<C: Clock> Accumulator for Timing<C> {
    type Measure = TimeValue;

    #[inline]
    fn before_transition(&self, measure: &mut TimeValue) {
        measure.charge(self.clock.now());
    }

    #[inline]
    fn after_transition(&self, measure: &mut TimeValue) {
        measure.stamp(self.clock.now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::time::Duration;

    use crate::recorder::StrRecorder;
    use crate::trigger::ScopeGuard;

    /// Advances 10ms on every reading.
    #[derive(Debug, Default)]
    struct Ticker(Cell<u64>);

    impl Clock for &Ticker {
        fn now(&self) -> Duration {
            let t = self.0.get() + 10;
            self.0.set(t);
            Duration::from_millis(t)
        }
    }

    #[test]
    fn test_recorder_work_is_not_charged() {
        let ticker = Ticker::default();
        let mut rec =
            StrRecorder::new(TimeValue::default(), "root", TimeValue::started(&&ticker)).unwrap();

        // root started at 10
        {
            // root charged at 20, f stamped at 30
            let _f = ScopeGuard::timed(&mut rec, "f", &ticker).unwrap();
            // f charged at 40, root stamped at 50
        }

        let f = rec.tree().node(crate::tree::NodeId::ROOT).children()[0];
        assert_eq!(rec.tree().node(f).measure().duration(), Duration::from_millis(10));
        assert_eq!(rec.current_measure().duration(), Duration::from_millis(10));
    }
}

//! Heap usage measure

use std::ops::Add;

/// Heap activity attributed to a scope, in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "visualize", derive(serde::Serialize, serde::Deserialize))]
pub struct HeapUsage {
    /// Highest `current_allocations` reached while the scope was innermost.
    pub peak_allocations: u64,
    /// Everything allocated, as though nothing was ever freed.
    pub total_allocations: u64,
    /// Allocated minus freed. Saturates at zero when a scope frees memory
    /// allocated elsewhere.
    pub current_allocations: u64,
    /// Deallocations of memory that was not allocated while tracking.
    pub bad_deallocations: u64,
}

/// Sums every counter except `peak_allocations`, which takes the maximum.
impl Add for HeapUsage {
    type Output = HeapUsage;

    fn add(self, other: HeapUsage) -> HeapUsage {
        HeapUsage {
            peak_allocations: self.peak_allocations.max(other.peak_allocations),
            total_allocations: self.total_allocations + other.total_allocations,
            current_allocations: self.current_allocations + other.current_allocations,
            bad_deallocations: self.bad_deallocations + other.bad_deallocations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_is_commutative() {
        let a = HeapUsage {
            peak_allocations: 10,
            total_allocations: 12,
            current_allocations: 4,
            bad_deallocations: 1,
        };
        let b = HeapUsage {
            peak_allocations: 30,
            total_allocations: 30,
            current_allocations: 0,
            bad_deallocations: 0,
        };

        assert_eq!(a + b, b + a);
        assert_eq!(
            a + b,
            HeapUsage {
                peak_allocations: 30,
                total_allocations: 42,
                current_allocations: 4,
                bad_deallocations: 1,
            }
        );
    }
}

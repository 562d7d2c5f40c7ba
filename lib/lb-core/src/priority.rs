//! Security rule priority allocation
//!
//! Priorities are a keyspace shared by every service in the security group.
//! Allocation is first-fit over the current occupancy, so callers must
//! serialize allocations against one group.

use std::collections::BTreeSet;

use crate::model::SecurityRule;
use crate::{CloudError, Result};

/// Lowest priority handed out to service rules
pub const MINIMUM_PRIORITY: u16 = 500;
/// Exclusive upper bound of the service rule range
pub const MAXIMUM_PRIORITY: u16 = 4096;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PriorityRange {
    pub min: u16,
    pub max: u16,
}

impl Default for PriorityRange {
    fn default() -> Self {
        Self {
            min: MINIMUM_PRIORITY,
            max: MAXIMUM_PRIORITY,
        }
    }
}

impl PriorityRange {
    /// Lowest priority in `[min, max)` not used by any of `rules`
    pub fn next_available(&self, rules: &[SecurityRule]) -> Result<u16> {
        let taken: BTreeSet<u16> = rules
            .iter()
            .filter_map(|rule| rule.priority)
            .filter(|priority| (self.min..self.max).contains(priority))
            .collect();

        (self.min..self.max)
            .find(|candidate| !taken.contains(candidate))
            .ok_or(CloudError::PriorityRangeExhausted {
                min: self.min,
                max: self.max,
            })
    }
}

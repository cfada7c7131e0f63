//! Worker selection strategies.

use serde::{Deserialize, Serialize};

/// Strategy for picking the worker that receives the next task.
pub trait WorkerSelector: Send + Sync {
    /// Strategy name, for logs.
    fn name(&self) -> &'static str;

    /// Pick an index into `loads`, or `None` when there is nothing to pick.
    ///
    /// `loads[i]` is the current total load of the i-th pooled worker, in pool order.
    fn select(&self, loads: &[u64]) -> Option<usize>;
}

/// Picks the worker with the smallest pending load.
///
/// Ties go to the earliest worker in pool order, which is the one that has
/// waited longest since it last received a task.
#[derive(Debug, Clone, Copy, Default)]
pub struct LeastLoaded;

impl WorkerSelector for LeastLoaded {
    fn name(&self) -> &'static str {
        "least_loaded"
    }

    fn select(&self, loads: &[u64]) -> Option<usize> {
        loads
            .iter()
            .enumerate()
            .min_by_key(|(_, load)| **load)
            .map(|(index, _)| index)
    }
}

/// Selector strategies available.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectorStrategy {
    /// Least-loaded balancing
    #[default]
    LeastLoaded,
}

impl WorkerSelector for SelectorStrategy {
    fn name(&self) -> &'static str {
        match self {
            Self::LeastLoaded => LeastLoaded.name(),
        }
    }

    fn select(&self, loads: &[u64]) -> Option<usize> {
        match self {
            Self::LeastLoaded => LeastLoaded.select(loads),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_pool_selects_nothing() {
        assert_eq!(LeastLoaded.select(&[]), None);
    }

    #[test]
    fn test_picks_smallest_load() {
        assert_eq!(LeastLoaded.select(&[5000, 2000, 3000]), Some(1));
    }

    #[test]
    fn test_ties_go_to_first_in_pool_order() {
        assert_eq!(LeastLoaded.select(&[2000, 1000, 1000]), Some(1));
        assert_eq!(SelectorStrategy::LeastLoaded.select(&[0, 0]), Some(0));
    }
}

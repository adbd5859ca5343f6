//! Epoch clock for the restoration simulation
//!
//! The simulation advances in discrete decision epochs up to a fixed step
//! budget. Running out of budget is a normal end of a run, not an error.

use serde::{Deserialize, Serialize};

/// Tracks the current epoch against the step budget
///
/// # Example
/// ```
/// use repair_planner_core_rs::EpochClock;
///
/// let mut clock = EpochClock::new(10);
/// assert_eq!(clock.current_epoch(), 0);
/// assert_eq!(clock.remaining(), 10);
///
/// clock.advance();
/// assert_eq!(clock.current_epoch(), 1);
/// assert_eq!(clock.remaining(), 9);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochClock {
    /// Epochs elapsed since the run started
    current_epoch: usize,
    /// Maximum number of epochs the run may execute
    max_epochs: usize,
}

impl EpochClock {
    /// Create a new clock with the given step budget
    ///
    /// # Panics
    /// Panics if `max_epochs` is zero
    pub fn new(max_epochs: usize) -> Self {
        assert!(max_epochs > 0, "max_epochs must be positive");
        Self {
            current_epoch: 0,
            max_epochs,
        }
    }

    /// Restore a clock at a given position (checkpoint resume)
    pub fn resume_at(max_epochs: usize, current_epoch: usize) -> Self {
        assert!(max_epochs > 0, "max_epochs must be positive");
        Self {
            current_epoch: current_epoch.min(max_epochs),
            max_epochs,
        }
    }

    /// Advance by one epoch
    pub fn advance(&mut self) {
        self.current_epoch += 1;
    }

    /// Current epoch index (0-based)
    pub fn current_epoch(&self) -> usize {
        self.current_epoch
    }

    /// Step budget
    pub fn max_epochs(&self) -> usize {
        self.max_epochs
    }

    /// Epochs left in the budget, counting the current one
    ///
    /// # Example
    /// ```
    /// use repair_planner_core_rs::EpochClock;
    ///
    /// let mut clock = EpochClock::new(2);
    /// clock.advance();
    /// clock.advance();
    /// assert_eq!(clock.remaining(), 0);
    /// assert!(clock.is_exhausted());
    /// ```
    pub fn remaining(&self) -> usize {
        self.max_epochs.saturating_sub(self.current_epoch)
    }

    /// True once the step budget is spent
    pub fn is_exhausted(&self) -> bool {
        self.current_epoch >= self.max_epochs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[should_panic(expected = "max_epochs must be positive")]
    fn test_zero_budget_panics() {
        EpochClock::new(0);
    }

    #[test]
    fn test_resume_clamps_to_budget() {
        let clock = EpochClock::resume_at(5, 9);
        assert_eq!(clock.current_epoch(), 5);
        assert!(clock.is_exhausted());
    }
}

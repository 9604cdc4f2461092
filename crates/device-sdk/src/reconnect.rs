//! Bounded retry bookkeeping shared by the connect and status loops.

use crate::types::ClientError;

/// Tracks one bounded retry loop: how many attempts were made and the
/// last transient failure seen.
///
/// Starts with no attempts and no failure recorded, so a loop whose body
/// never runs still produces a defined error.
#[derive(Debug)]
pub struct RetryBudget {
    limit: u32,
    made: u32,
    last: Option<ClientError>,
}

impl RetryBudget {
    pub fn new(limit: u32) -> Self {
        Self {
            limit,
            made: 0,
            last: None,
        }
    }

    /// Claim the next attempt, 1-indexed.  `None` once the budget is spent.
    pub fn next_attempt(&mut self) -> Option<u32> {
        if self.made >= self.limit {
            return None;
        }
        self.made += 1;
        Some(self.made)
    }

    pub fn record(&mut self, err: ClientError) {
        self.last = Some(err);
    }

    pub fn attempts_made(&self) -> u32 {
        self.made
    }

    /// Last recorded failure, as-is.
    pub fn into_last(self) -> Option<ClientError> {
        self.last
    }

    /// Last recorded failure annotated with the attempt count.
    pub fn exhausted(self) -> ClientError {
        let made = self.made;
        match self.last {
            Some(err) => err.after_attempts(made),
            None => ClientError::Config(format!("retry budget of {} allows no attempts", self.limit)),
        }
    }
}

//! Sequence over exactly one externally supplied item.

use tracing::debug;

use crate::sequence::{SequenceError, SequenceStats, WorkSequence};
use crate::unit_of_work::UnitOfWork;

/// Yields its item once, then ends. Never talks to a store.
///
/// Lets one-off administrative jobs share the runner's failure isolation.
#[derive(Debug)]
pub struct SingleItemIterator<T, W> {
    item: Option<T>,
    uow: W,
    delivered: u64,
    failed: u64,
}

impl<T, W: UnitOfWork> SingleItemIterator<T, W> {
    pub fn new(item: T, uow: W) -> Self {
        Self {
            item: Some(item),
            uow,
            delivered: 0,
            failed: 0,
        }
    }
}

impl<T, W: UnitOfWork> WorkSequence for SingleItemIterator<T, W> {
    type Item = T;
    type Uow = W;

    fn has_next(&mut self) -> bool {
        self.item.is_some()
    }

    fn next_item(&mut self) -> Result<T, SequenceError> {
        let item = self.item.take().ok_or(SequenceError::Exhausted)?;
        self.delivered += 1;
        Ok(item)
    }

    /// Drops the held item, if any; it is never retried.
    fn mark_failed(&mut self) {
        if self.item.take().is_some() {
            debug!("single item discarded before delivery");
        }
        self.failed += 1;
    }

    fn failed_count(&self) -> u64 {
        self.failed
    }

    fn unit_of_work(&self) -> &W {
        &self.uow
    }

    fn stats(&self) -> SequenceStats {
        SequenceStats {
            delivered: self.delivered,
            failed: self.failed,
            ..SequenceStats::default()
        }
    }
}

impl<T, W: UnitOfWork> Iterator for SingleItemIterator<T, W> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.next_item().ok()
    }
}

//! `regsweep-pipeline` — resumable, fault-isolating sweeps over a paged work queue.
//!
//! A sweep pulls pending items page by page from a [`QueueSource`], hands each
//! one to an [`Action`], and keeps going when individual items fail:
//!
//! - [`QueueIterator`]: lazy paged sequence with a self-adjusting cursor
//! - [`SingleItemIterator`]: the same protocol over one caller-supplied item
//! - [`IteratorFactory`]: the single construction entry point
//! - [`Runner`]: drains a sequence and isolates per-item failures
//!
//! Everything runs synchronously on the caller's thread.

pub mod config;
pub mod cursor;
pub mod factory;
pub mod in_memory;
pub mod queue_iterator;
pub mod retry;
pub mod runner;
pub mod sequence;
pub mod single;
pub mod source;
pub mod unit_of_work;

#[cfg(test)]
mod integration_tests;
#[cfg(test)]
mod test_support;

pub use config::{ConfigError, PipelineConfig};
pub use cursor::{plan_refresh, Cursor, Paging, RefreshPlan};
pub use factory::{IteratorFactory, Selection};
pub use in_memory::{InMemoryQueueSource, InMemoryStoreError};
pub use queue_iterator::{IterState, QueueIterator};
pub use retry::RetryPolicy;
pub use runner::{Action, RunReport, Runner};
pub use sequence::{SequenceError, SequenceStats, WorkSequence};
pub use single::SingleItemIterator;
pub use source::{PageEntry, PageRequest, QueueSource, RecordError, SourceError};
pub use unit_of_work::{UnitOfWork, UnitOfWorkError};

//! Queue source abstraction: the paged store the sweep reads work items from.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use regsweep_core::WorkItem;

/// Window requested from a queue source.
///
/// `offset: None` asks the store for its default window (no explicit skip);
/// `limit: None` leaves the page size to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PageRequest {
    pub offset: Option<u64>,
    pub limit: Option<u32>,
}

impl PageRequest {
    pub fn new(offset: Option<u64>, limit: Option<u32>) -> Self {
        Self { offset, limit }
    }

    /// Offset to skip, treating the store default as zero. Saturates on
    /// targets where the offset does not fit in `usize`.
    pub fn skip(&self) -> usize {
        usize::try_from(self.offset.unwrap_or(0)).unwrap_or(usize::MAX)
    }

    /// Number of entries to take, `None` meaning "everything remaining".
    pub fn take(&self) -> Option<usize> {
        self.limit.map(|l| l as usize)
    }
}

/// A single entry of a fetched page that could not be turned into an item.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    /// The store returned a placeholder for a record that is gone or inconsistent.
    #[error("record missing from page")]
    Missing,
    /// The record exists but could not be read.
    #[error("record unreadable: {0}")]
    Unreadable(String),
}

/// One slot of a page: either a well-formed item or a record-level problem.
pub type PageEntry<T> = Result<T, RecordError>;

/// Failure of a whole `fetch_page` call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    /// Timeout, dropped connection and similar; worth retrying.
    #[error("transient fetch failure: {0}")]
    Transient(String),
    /// The store cannot serve queries at all.
    #[error("source unavailable: {0}")]
    Unavailable(String),
    /// The store rejected the filter or window.
    #[error("invalid page request: {0}")]
    InvalidRequest(String),
}

impl SourceError {
    pub fn transient(msg: impl Into<String>) -> Self {
        Self::Transient(msg.into())
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, SourceError::Transient(_))
    }
}

/// Paged query over pending work items.
///
/// Implementations must tolerate being called repeatedly with different
/// offsets while the items they return are being mutated by the sweep's
/// action. An empty page means "nothing matching right now".
pub trait QueueSource: Send + Sync {
    type Item: WorkItem;
    /// Selection criteria, opaque to the pipeline (e.g. a status set).
    type Filter;

    /// Return up to `request.limit` matching entries starting at `request.offset`,
    /// in the store's order.
    fn fetch_page(
        &self,
        filter: &Self::Filter,
        request: PageRequest,
    ) -> Result<Vec<PageEntry<Self::Item>>, SourceError>;
}

impl<S: QueueSource + ?Sized> QueueSource for Arc<S> {
    type Item = S::Item;
    type Filter = S::Filter;

    fn fetch_page(
        &self,
        filter: &Self::Filter,
        request: PageRequest,
    ) -> Result<Vec<PageEntry<Self::Item>>, SourceError> {
        (**self).fetch_page(filter, request)
    }
}

//! In-memory queue source of pending registrations, for tests/dev.

use std::collections::VecDeque;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use thiserror::Error;

use regsweep_core::{DomainError, PendingRegistration, RegistrationStatus, StatusFilter, WorkItemId};

use crate::source::{PageEntry, PageRequest, QueueSource, RecordError, SourceError};

/// In-memory store error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InMemoryStoreError {
    #[error("record not found: {0}")]
    NotFound(WorkItemId),
    #[error("record already exists: {0}")]
    AlreadyExists(WorkItemId),
    #[error(transparent)]
    Domain(#[from] DomainError),
}

#[derive(Debug, Clone)]
enum Slot {
    Record(PendingRegistration),
    /// Index entry whose record is gone.
    Tombstone,
    /// Record that cannot be read back.
    Corrupt(String),
}

/// Insertion-ordered store of registration records.
///
/// Tombstones and corrupt slots match every filter, the way a stale index
/// row would. Not optimized for performance.
#[derive(Debug, Default)]
pub struct InMemoryQueueSource {
    slots: RwLock<Vec<Slot>>,
    failures: RwLock<VecDeque<SourceError>>,
    requests: RwLock<Vec<PageRequest>>,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

impl InMemoryQueueSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Append a record to the end of the queue.
    pub fn enqueue(&self, record: PendingRegistration) -> Result<WorkItemId, InMemoryStoreError> {
        let mut slots = write(&self.slots);
        let exists = slots
            .iter()
            .any(|s| matches!(s, Slot::Record(r) if r.id == record.id));
        if exists {
            return Err(InMemoryStoreError::AlreadyExists(record.id));
        }
        let id = record.id;
        slots.push(Slot::Record(record));
        Ok(id)
    }

    /// Validate and enqueue a new record for `identifier`.
    pub fn enqueue_identifier(
        &self,
        identifier: &str,
        status: RegistrationStatus,
    ) -> Result<WorkItemId, InMemoryStoreError> {
        self.enqueue(PendingRegistration::new(identifier, status)?)
    }

    pub fn get(&self, id: WorkItemId) -> Option<PendingRegistration> {
        read(&self.slots).iter().find_map(|s| match s {
            Slot::Record(r) if r.id == id => Some(r.clone()),
            _ => None,
        })
    }

    /// Move a record to a new status (usually taking it out of a sweep's filter).
    pub fn set_status(
        &self,
        id: WorkItemId,
        status: RegistrationStatus,
    ) -> Result<(), InMemoryStoreError> {
        let mut slots = write(&self.slots);
        let record = slots
            .iter_mut()
            .find_map(|s| match s {
                Slot::Record(r) if r.id == id => Some(r),
                _ => None,
            })
            .ok_or(InMemoryStoreError::NotFound(id))?;
        record.transition(status)?;
        Ok(())
    }

    /// Append an index entry whose record has disappeared.
    pub fn insert_tombstone(&self) {
        write(&self.slots).push(Slot::Tombstone);
    }

    /// Append a record that fails to load with `reason`.
    pub fn insert_corrupt(&self, reason: impl Into<String>) {
        write(&self.slots).push(Slot::Corrupt(reason.into()));
    }

    /// Make the next `n` fetches fail with `err`.
    pub fn fail_next_fetches(&self, n: usize, err: SourceError) {
        let mut failures = write(&self.failures);
        failures.extend(std::iter::repeat_n(err, n));
    }

    /// Every request received so far, in order.
    pub fn requests(&self) -> Vec<PageRequest> {
        read(&self.requests).clone()
    }

    /// Number of well-formed records matching `filter`.
    pub fn pending_count(&self, filter: &StatusFilter) -> usize {
        read(&self.slots)
            .iter()
            .filter(|s| matches!(s, Slot::Record(r) if filter.matches(r.status)))
            .count()
    }

    pub fn len(&self) -> usize {
        read(&self.slots).len()
    }

    pub fn is_empty(&self) -> bool {
        read(&self.slots).is_empty()
    }
}

impl QueueSource for InMemoryQueueSource {
    type Item = PendingRegistration;
    type Filter = StatusFilter;

    fn fetch_page(
        &self,
        filter: &StatusFilter,
        request: PageRequest,
    ) -> Result<Vec<PageEntry<PendingRegistration>>, SourceError> {
        write(&self.requests).push(request);
        if let Some(err) = write(&self.failures).pop_front() {
            return Err(err);
        }

        let slots = read(&self.slots);
        let matching = slots.iter().filter(|s| match s {
            Slot::Record(r) => filter.matches(r.status),
            Slot::Tombstone | Slot::Corrupt(_) => true,
        });
        let window = matching.skip(request.skip());
        let entries = match request.take() {
            Some(n) => window.take(n).map(to_entry).collect(),
            None => window.map(to_entry).collect(),
        };
        Ok(entries)
    }
}

fn to_entry(slot: &Slot) -> PageEntry<PendingRegistration> {
    match slot {
        Slot::Record(r) => Ok(r.clone()),
        Slot::Tombstone => Err(RecordError::Missing),
        Slot::Corrupt(reason) => Err(RecordError::Unreadable(reason.clone())),
    }
}

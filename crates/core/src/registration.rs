//! Identifier-registration records and their status model.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::id::WorkItemId;
use crate::work_item::WorkItem;

/// Registration status of a persistent identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationStatus {
    /// Waiting to be registered with the agency
    ToBeRegistered,
    /// Waiting to be reserved (metadata sent, not yet resolvable)
    ToBeReserved,
    /// Reserved at the agency
    IsReserved,
    /// Registered, but metadata changed and must be re-sent
    ToBeUpdated,
    /// Registered and up to date
    IsRegistered,
    /// Waiting to be withdrawn from the agency
    ToBeDeleted,
    /// Withdrawn; final
    Deleted,
}

impl RegistrationStatus {
    /// Whether a record in this status still needs work from a sweep.
    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            RegistrationStatus::ToBeRegistered
                | RegistrationStatus::ToBeReserved
                | RegistrationStatus::ToBeUpdated
                | RegistrationStatus::ToBeDeleted
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RegistrationStatus::Deleted)
    }
}

/// Set of statuses a sweep selects records by.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusFilter(BTreeSet<RegistrationStatus>);

impl StatusFilter {
    pub fn new(statuses: impl IntoIterator<Item = RegistrationStatus>) -> Self {
        Self(statuses.into_iter().collect())
    }

    pub fn to_be_registered() -> Self {
        Self::new([RegistrationStatus::ToBeRegistered])
    }

    pub fn to_be_reserved() -> Self {
        Self::new([RegistrationStatus::ToBeReserved])
    }

    pub fn to_be_updated() -> Self {
        Self::new([RegistrationStatus::ToBeUpdated])
    }

    pub fn to_be_deleted() -> Self {
        Self::new([RegistrationStatus::ToBeDeleted])
    }

    /// Every status a sweep may still act on.
    pub fn all_pending() -> Self {
        Self::new([
            RegistrationStatus::ToBeRegistered,
            RegistrationStatus::ToBeReserved,
            RegistrationStatus::ToBeUpdated,
            RegistrationStatus::ToBeDeleted,
        ])
    }

    pub fn matches(&self, status: RegistrationStatus) -> bool {
        self.0.contains(&status)
    }

    pub fn statuses(&self) -> impl Iterator<Item = &RegistrationStatus> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A persistent identifier queued for agency work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingRegistration {
    /// Unique record id
    pub id: WorkItemId,
    /// The identifier itself, e.g. `10.5072/dspace-42`
    pub identifier: String,
    /// Current status
    pub status: RegistrationStatus,
    /// When the record entered the queue
    pub queued_at: DateTime<Utc>,
    /// Number of status transitions applied so far
    pub attempts: u32,
}

impl PendingRegistration {
    /// Create a new record after validating the identifier.
    pub fn new(identifier: impl Into<String>, status: RegistrationStatus) -> DomainResult<Self> {
        let identifier = identifier.into();
        validate_identifier(&identifier)?;
        Ok(Self {
            id: WorkItemId::new(),
            identifier,
            status,
            queued_at: Utc::now(),
            attempts: 0,
        })
    }

    /// Move the record to a new status.
    ///
    /// `Deleted` is final; any transition out of it is rejected.
    pub fn transition(&mut self, to: RegistrationStatus) -> DomainResult<()> {
        if self.status.is_terminal() && to != self.status {
            return Err(DomainError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        self.attempts += 1;
        Ok(())
    }
}

impl WorkItem for PendingRegistration {
    type Id = WorkItemId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// An identifier needs a non-empty prefix and suffix separated by `/`.
fn validate_identifier(identifier: &str) -> DomainResult<()> {
    let trimmed = identifier.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation("identifier must not be empty"));
    }
    match trimmed.split_once('/') {
        Some((prefix, suffix)) if !prefix.is_empty() && !suffix.is_empty() => Ok(()),
        _ => Err(DomainError::validation(format!(
            "identifier `{trimmed}` must have the form <prefix>/<suffix>"
        ))),
    }
}

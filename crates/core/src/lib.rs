//! `regsweep-core` — domain foundation for registration sweeps.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! work-item identity, identifier-registration records and their status model.

pub mod error;
pub mod id;
pub mod registration;
pub mod work_item;

pub use error::{DomainError, DomainResult};
pub use id::WorkItemId;
pub use registration::{PendingRegistration, RegistrationStatus, StatusFilter};
pub use work_item::WorkItem;

//! Unit-of-work handle shared by the iterator and the action.

use std::sync::Arc;

use thiserror::Error;

/// Failure to advance the unit of work at a page boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unit of work could not advance: {0}")]
pub struct UnitOfWorkError(pub String);

impl UnitOfWorkError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// Opaque transaction-like handle.
///
/// The pipeline only calls [`UnitOfWork::advance`] right before fetching a
/// new page; what that means (commit, flush, checkpoint) is up to the host.
/// Actions receive the same handle to do their own work.
pub trait UnitOfWork {
    fn advance(&self) -> Result<(), UnitOfWorkError>;
}

/// No-op unit of work for sweeps without transactional bookkeeping.
impl UnitOfWork for () {
    fn advance(&self) -> Result<(), UnitOfWorkError> {
        Ok(())
    }
}

impl<U: UnitOfWork + ?Sized> UnitOfWork for Arc<U> {
    fn advance(&self) -> Result<(), UnitOfWorkError> {
        (**self).advance()
    }
}

impl<U: UnitOfWork + ?Sized> UnitOfWork for &U {
    fn advance(&self) -> Result<(), UnitOfWorkError> {
        (**self).advance()
    }
}

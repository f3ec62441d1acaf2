//! Construction of work sequences.

use crate::config::{ConfigError, PipelineConfig};
use crate::cursor::Paging;
use crate::queue_iterator::QueueIterator;
use crate::sequence::WorkSequence;
use crate::single::SingleItemIterator;
use crate::source::QueueSource;
use crate::unit_of_work::UnitOfWork;

/// What a sweep should walk over.
#[derive(Debug, Clone, PartialEq)]
pub enum Selection<F, T> {
    /// Every item the source returns for `filter`.
    Queue {
        filter: F,
        offset: Option<u64>,
        limit: Option<u32>,
    },
    /// One item supplied by the caller.
    Single(T),
}

/// Builds queue and single-item sequences from explicit collaborators.
#[derive(Debug, Clone, Default)]
pub struct IteratorFactory {
    config: PipelineConfig,
}

impl IteratorFactory {
    pub fn new(config: PipelineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Sweep the source with the store's default windows.
    pub fn bulk<S, W>(&self, source: S, filter: S::Filter, uow: W) -> QueueIterator<S, W>
    where
        S: QueueSource,
        W: UnitOfWork,
    {
        let paging = Paging::StoreDefault {
            limit: self.config.page_size,
        };
        QueueIterator::new(source, filter, uow, paging)
            .with_retry_policy(self.config.fetch_retry)
    }

    /// Sweep the source starting at an explicit offset and/or with an explicit limit.
    ///
    /// A missing limit falls back to the configured page size; an offset needs one
    /// of the two.
    pub fn paged<S, W>(
        &self,
        source: S,
        filter: S::Filter,
        uow: W,
        offset: Option<u64>,
        limit: Option<u32>,
    ) -> Result<QueueIterator<S, W>, ConfigError>
    where
        S: QueueSource,
        W: UnitOfWork,
    {
        let paging = paging_for(offset, limit.or(self.config.page_size))?;
        Ok(QueueIterator::new(source, filter, uow, paging)
            .with_retry_policy(self.config.fetch_retry))
    }

    pub fn single<T, W: UnitOfWork>(&self, item: T, uow: W) -> SingleItemIterator<T, W> {
        SingleItemIterator::new(item, uow)
    }

    /// Build whichever sequence `selection` asks for, hiding the concrete type.
    pub fn for_selection<'a, S, W>(
        &self,
        source: S,
        uow: W,
        selection: Selection<S::Filter, S::Item>,
    ) -> Result<Box<dyn WorkSequence<Item = S::Item, Uow = W> + 'a>, ConfigError>
    where
        S: QueueSource + 'a,
        W: UnitOfWork + 'a,
    {
        match selection {
            Selection::Queue {
                filter,
                offset,
                limit,
            } => Ok(Box::new(self.paged(source, filter, uow, offset, limit)?)),
            Selection::Single(item) => Ok(Box::new(self.single(item, uow))),
        }
    }
}

fn paging_for(offset: Option<u64>, limit: Option<u32>) -> Result<Paging, ConfigError> {
    if limit == Some(0) {
        return Err(ConfigError::ZeroPageSize);
    }
    match (offset, limit) {
        (Some(start), Some(limit)) => Ok(Paging::Explicit { start, limit }),
        (Some(_), None) => Err(ConfigError::OffsetWithoutLimit),
        (None, limit) => Ok(Paging::StoreDefault { limit }),
    }
}

//! Work-item identity: the only thing the pipeline knows about an item.

/// A unit of pending work pulled from a queue source.
///
/// The pipeline never constructs or destroys items; it reads their identity
/// for logging and to avoid delivering the same item twice in one run.
pub trait WorkItem {
    /// Strongly-typed item identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug + core::fmt::Display;

    /// Returns the item identifier.
    fn id(&self) -> &Self::Id;
}

impl<T: WorkItem + ?Sized> WorkItem for Box<T> {
    type Id = T::Id;

    fn id(&self) -> &Self::Id {
        (**self).id()
    }
}

impl<T: WorkItem + ?Sized> WorkItem for std::sync::Arc<T> {
    type Id = T::Id;

    fn id(&self) -> &Self::Id {
        (**self).id()
    }
}

//! Cursor arithmetic for paged sweeps.
//!
//! Items the action handles successfully are expected to leave the filtered
//! set, so the store's default window naturally moves past them. Items that
//! fail stay pending; the failure count is used as a skip count so the next
//! window steps over them instead of fetching them forever. Items that were
//! delivered but came back in a later window (the action left them pending)
//! are added to the skip count the same way.

use serde::{Deserialize, Serialize};

use crate::source::PageRequest;

/// How the sweep walks the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum Paging {
    /// Let the store pick the window; only failures shift the offset.
    StoreDefault { limit: Option<u32> },
    /// Walk fixed windows of `limit` items starting at `start`.
    Explicit { start: u64, limit: u32 },
}

impl Paging {
    pub fn limit(&self) -> Option<u32> {
        match self {
            Paging::StoreDefault { limit } => *limit,
            Paging::Explicit { limit, .. } => Some(*limit),
        }
    }

    fn start(&self) -> Option<u64> {
        match self {
            Paging::StoreDefault { .. } => None,
            Paging::Explicit { start, .. } => Some(*start),
        }
    }
}

impl Default for Paging {
    fn default() -> Self {
        Paging::StoreDefault { limit: None }
    }
}

/// Outcome of one refresh computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshPlan {
    /// Stored window position after this refresh (`None` in store-default mode).
    pub offset: Option<u64>,
    /// Offset actually sent to the store (`None` = store default).
    pub query: Option<u64>,
}

/// Compute the next window.
///
/// With explicit paging the window starts at `prior_offset` on the first
/// refresh and moves by `limit` on every later one; the query adds `skip`
/// (failures plus stepped-over duplicates) on top. Without explicit paging
/// the store default is used until something is skipped, after which `skip`
/// becomes the offset.
pub fn plan_refresh(
    prior_offset: Option<u64>,
    limit: Option<u32>,
    skip: u64,
    first: bool,
) -> RefreshPlan {
    match prior_offset {
        Some(prior) => {
            let offset = if first {
                prior
            } else {
                prior.saturating_add(u64::from(limit.unwrap_or(0)))
            };
            RefreshPlan {
                offset: Some(offset),
                query: Some(offset.saturating_add(skip)),
            }
        }
        None => RefreshPlan {
            offset: None,
            query: (skip > 0).then_some(skip),
        },
    }
}

/// Mutable cursor owned by a single queue iterator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor {
    offset: Option<u64>,
    limit: Option<u32>,
    failed: u64,
    skipped: u64,
    refreshes: u64,
}

impl Cursor {
    pub fn new(paging: Paging) -> Self {
        Self {
            offset: paging.start(),
            limit: paging.limit(),
            failed: 0,
            skipped: 0,
            refreshes: 0,
        }
    }

    /// Count one item that could not be produced or processed. Never reset.
    pub fn record_failure(&mut self) {
        self.failed += 1;
    }

    /// Count one already-delivered item found in the current window.
    pub fn record_skip(&mut self) {
        self.skipped += 1;
    }

    pub fn failed(&self) -> u64 {
        self.failed
    }

    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    pub fn limit(&self) -> Option<u32> {
        self.limit
    }

    pub fn offset(&self) -> Option<u64> {
        self.offset
    }

    pub fn refreshes(&self) -> u64 {
        self.refreshes
    }

    /// Advance the cursor and return the request for the next page.
    pub fn next_request(&mut self) -> PageRequest {
        let skip = self.failed.saturating_add(self.skipped);
        let plan = plan_refresh(self.offset, self.limit, skip, self.refreshes == 0);
        self.offset = plan.offset;
        self.refreshes += 1;
        PageRequest::new(plan.query, self.limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn explicit_paging_advances_by_limit() {
        let mut cursor = Cursor::new(Paging::Explicit { start: 0, limit: 10 });

        assert_eq!(cursor.next_request(), PageRequest::new(Some(0), Some(10)));
        assert_eq!(cursor.next_request(), PageRequest::new(Some(10), Some(10)));
        assert_eq!(cursor.next_request(), PageRequest::new(Some(20), Some(10)));
    }

    #[test]
    fn explicit_paging_adds_failures_on_top_of_window() {
        let mut cursor = Cursor::new(Paging::Explicit { start: 5, limit: 10 });
        assert_eq!(cursor.next_request().offset, Some(5));

        cursor.record_failure();
        cursor.record_failure();
        assert_eq!(cursor.next_request().offset, Some(17));
        assert_eq!(cursor.offset(), Some(15));
    }

    #[test]
    fn store_default_uses_no_offset_until_something_fails() {
        let mut cursor = Cursor::new(Paging::StoreDefault { limit: Some(50) });

        assert_eq!(cursor.next_request(), PageRequest::new(None, Some(50)));
        assert_eq!(cursor.next_request(), PageRequest::new(None, Some(50)));

        cursor.record_failure();
        assert_eq!(cursor.next_request(), PageRequest::new(Some(1), Some(50)));
        assert_eq!(cursor.offset(), None);
    }

    #[test]
    fn store_default_without_limit_leaves_page_size_to_store() {
        let mut cursor = Cursor::new(Paging::default());
        assert_eq!(cursor.next_request(), PageRequest::default());
        assert_eq!(cursor.refreshes(), 1);
    }

    #[test]
    fn stepped_over_duplicates_shift_the_window_like_failures() {
        let mut cursor = Cursor::new(Paging::StoreDefault { limit: Some(2) });
        assert_eq!(cursor.next_request().offset, None);

        cursor.record_skip();
        cursor.record_skip();
        assert_eq!(cursor.next_request().offset, Some(2));

        cursor.record_failure();
        assert_eq!(cursor.next_request().offset, Some(3));
        assert_eq!(cursor.failed(), 1);
        assert_eq!(cursor.skipped(), 2);
    }

    #[test]
    fn plan_is_pure() {
        let a = plan_refresh(Some(20), Some(10), 3, false);
        let b = plan_refresh(Some(20), Some(10), 3, false);
        assert_eq!(a, b);
        assert_eq!(a, RefreshPlan { offset: Some(30), query: Some(33) });
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: explicit windows never move backwards and never overlap
        /// when nothing fails.
        #[test]
        fn explicit_windows_are_contiguous(
            start in 0u64..10_000,
            limit in 1u32..500,
            refreshes in 1usize..50,
        ) {
            let mut cursor = Cursor::new(Paging::Explicit { start, limit });
            let mut expected = start;
            for _ in 0..refreshes {
                let req = cursor.next_request();
                prop_assert_eq!(req.offset, Some(expected));
                expected += u64::from(limit);
            }
        }

        /// Property: the queried offset never decreases as failures accumulate.
        #[test]
        fn query_offset_is_monotonic(
            paged in any::<bool>(),
            failures in prop::collection::vec(0u8..4, 1..30),
        ) {
            let paging = if paged {
                Paging::Explicit { start: 0, limit: 25 }
            } else {
                Paging::StoreDefault { limit: Some(25) }
            };
            let mut cursor = Cursor::new(paging);
            let mut last = 0u64;
            for fails in failures {
                for _ in 0..fails {
                    cursor.record_failure();
                }
                let offset = cursor.next_request().offset.unwrap_or(0);
                prop_assert!(offset >= last);
                last = offset;
            }
        }
    }
}

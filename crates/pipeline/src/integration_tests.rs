//! End-to-end sweeps: InMemoryQueueSource → IteratorFactory → Runner → action.
//!
//! Verifies:
//! - Successful items leave the filter and the default window follows them
//! - Failed items stay pending and are stepped over, never re-offered
//! - Items the action leaves pending are stepped over without hiding later ones
//! - Placeholders, startup failures and transient errors degrade gracefully

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::time::Duration;

    use anyhow::bail;
    use proptest::prelude::*;
    use regsweep_core::{PendingRegistration, RegistrationStatus, StatusFilter, WorkItemId};

    use crate::config::PipelineConfig;
    use crate::factory::{IteratorFactory, Selection};
    use crate::in_memory::InMemoryQueueSource;
    use crate::retry::RetryPolicy;
    use crate::runner::{RunReport, Runner};
    use crate::sequence::WorkSequence;
    use crate::source::SourceError;
    use crate::test_support::CountingUow;

    fn setup(count: usize, status: RegistrationStatus) -> (Arc<InMemoryQueueSource>, Vec<WorkItemId>) {
        regsweep_observability::init_for_tests();
        let store = InMemoryQueueSource::arc();
        let ids = (0..count)
            .map(|i| {
                store
                    .enqueue_identifier(&format!("10.5072/sweep-{i}"), status)
                    .unwrap()
            })
            .collect();
        (store, ids)
    }

    fn config(page_size: u32) -> PipelineConfig {
        PipelineConfig::default()
            .with_name("register")
            .with_page_size(page_size)
            .with_fetch_retry(RetryPolicy::no_retry())
    }

    /// Registers every offered record unless its id is in `failing`.
    fn sweep(
        store: &Arc<InMemoryQueueSource>,
        page_size: u32,
        failing: &HashSet<WorkItemId>,
    ) -> (RunReport, Vec<WorkItemId>) {
        let factory = IteratorFactory::new(config(page_size)).unwrap();
        let runner = Runner::new(factory.config().clone());
        let mut seq = factory.bulk(store.clone(), StatusFilter::to_be_registered(), ());

        let offered = RefCell::new(Vec::new());
        let action = |_: &(), rec: &PendingRegistration| -> anyhow::Result<()> {
            offered.borrow_mut().push(rec.id);
            if failing.contains(&rec.id) {
                bail!("agency returned 500 for {}", rec.identifier);
            }
            store.set_status(rec.id, RegistrationStatus::IsRegistered)?;
            Ok(())
        };

        let report = runner.run(&mut seq, &action);
        (report, offered.into_inner())
    }

    #[test]
    fn registers_whole_queue_across_pages() {
        let (store, ids) = setup(25, RegistrationStatus::ToBeRegistered);

        let (report, offered) = sweep(&store, 10, &HashSet::new());

        assert_eq!(offered, ids);
        assert_eq!(report.succeeded, 25);
        assert!(report.is_clean());
        assert_eq!(store.pending_count(&StatusFilter::to_be_registered()), 0);
        // 10 + 10 + 5, then the empty page
        assert_eq!(store.requests().len(), 4);
        assert!(store.requests().iter().all(|r| r.offset.is_none()));
    }

    #[test]
    fn failed_records_stay_pending_and_are_offered_once() {
        let (store, ids) = setup(12, RegistrationStatus::ToBeRegistered);
        let failing: HashSet<_> = [ids[0], ids[4], ids[8]].into_iter().collect();

        let (report, offered) = sweep(&store, 5, &failing);

        assert_eq!(offered, ids);
        assert_eq!(report.failed_actions, 3);
        assert_eq!(report.failed_count, 3);
        assert_eq!(store.pending_count(&StatusFilter::to_be_registered()), 3);
        let offsets: Vec<_> = store.requests().iter().map(|r| r.offset).collect();
        assert_eq!(offsets, vec![None, Some(2), Some(3), Some(3)]);
    }

    #[test]
    fn placeholder_records_are_skipped() {
        let store = InMemoryQueueSource::arc();
        let a = store
            .enqueue_identifier("10.5072/a", RegistrationStatus::ToBeRegistered)
            .unwrap();
        store.insert_tombstone();
        store.insert_corrupt("metadata column truncated");
        let d = store
            .enqueue_identifier("10.5072/d", RegistrationStatus::ToBeRegistered)
            .unwrap();

        let (report, offered) = sweep(&store, 10, &HashSet::new());

        assert_eq!(offered, vec![a, d]);
        assert_eq!(report.failed_count, 2);
        assert_eq!(report.failed_actions, 0);
        assert_eq!(store.pending_count(&StatusFilter::to_be_registered()), 0);
    }

    #[test]
    fn unreachable_store_at_startup_is_reported() {
        let (store, _) = setup(3, RegistrationStatus::ToBeRegistered);
        store.fail_next_fetches(1, SourceError::unavailable("connection refused"));

        let (report, offered) = sweep(&store, 10, &HashSet::new());

        assert!(offered.is_empty());
        assert!(report.sequence.first_fetch_failed);
        assert_eq!(store.pending_count(&StatusFilter::to_be_registered()), 3);
    }

    #[test]
    fn transient_store_errors_are_retried_per_config() {
        let (store, ids) = setup(4, RegistrationStatus::ToBeRegistered);
        store.fail_next_fetches(2, SourceError::transient("read timeout"));

        let factory = IteratorFactory::new(
            config(10).with_fetch_retry(RetryPolicy::fixed(2, Duration::ZERO)),
        )
        .unwrap();
        let mut seq = factory.bulk(store.clone(), StatusFilter::to_be_registered(), ());
        let registered: Vec<_> = seq.by_ref().map(|r| r.id).collect();

        assert_eq!(registered, ids);
        assert_eq!(seq.stats().fetch_errors, 0);
    }

    #[test]
    fn sweep_that_leaves_records_pending_still_terminates() {
        let (store, ids) = setup(3, RegistrationStatus::ToBeUpdated);
        let factory = IteratorFactory::new(PipelineConfig::default()).unwrap();
        let mut seq = factory.bulk(store.clone(), StatusFilter::to_be_updated(), ());

        // dry run: nothing changes status
        let action = |_: &(), _: &PendingRegistration| -> anyhow::Result<()> { Ok(()) };
        let report = Runner::default().run(&mut seq, &action);

        assert_eq!(report.offered, ids.len() as u64);
        assert_eq!(report.sequence.duplicates_skipped, 3);
        assert!(report.is_clean());
        // whole queue, the same window again, then past it
        assert_eq!(store.requests().len(), 3);
    }

    #[test]
    fn dry_run_over_small_pages_offers_every_record() {
        let (store, ids) = setup(6, RegistrationStatus::ToBeUpdated);
        let factory = IteratorFactory::new(config(2)).unwrap();
        let mut seq = factory.bulk(store.clone(), StatusFilter::to_be_updated(), ());

        let offered = RefCell::new(Vec::new());
        let action = |_: &(), rec: &PendingRegistration| -> anyhow::Result<()> {
            offered.borrow_mut().push(rec.id);
            Ok(())
        };
        let report = Runner::default().run(&mut seq, &action);

        assert_eq!(offered.into_inner(), ids);
        assert_eq!(report.offered, 6);
        assert!(report.is_clean());
        assert_eq!(store.pending_count(&StatusFilter::to_be_updated()), 6);
        let offsets: Vec<_> = store.requests().iter().map(|r| r.offset).collect();
        assert_eq!(
            offsets,
            vec![None, None, Some(2), Some(2), Some(4), Some(4), Some(6)]
        );
    }

    #[test]
    fn explicit_paging_walks_a_read_only_queue() {
        let (store, ids) = setup(25, RegistrationStatus::IsRegistered);
        let factory = IteratorFactory::default();
        let mut seq = factory
            .paged(
                store.clone(),
                StatusFilter::new([RegistrationStatus::IsRegistered]),
                (),
                Some(0),
                Some(10),
            )
            .unwrap();

        let seen: Vec<_> = seq.by_ref().map(|r| r.id).collect();

        assert_eq!(seen, ids);
        let offsets: Vec<_> = store.requests().iter().map(|r| r.offset).collect();
        assert_eq!(offsets, vec![Some(0), Some(10), Some(20), Some(30)]);
    }

    #[test]
    fn unit_of_work_is_advanced_once_per_page_boundary() {
        let (store, _) = setup(7, RegistrationStatus::ToBeReserved);
        let factory = IteratorFactory::new(config(3)).unwrap();
        let mut seq = factory.bulk(
            store.clone(),
            StatusFilter::to_be_reserved(),
            CountingUow::default(),
        );

        let action = |_: &CountingUow, rec: &PendingRegistration| -> anyhow::Result<()> {
            store.set_status(rec.id, RegistrationStatus::IsReserved)?;
            Ok(())
        };
        let report = Runner::default().run(&mut seq, &action);

        assert_eq!(report.succeeded, 7);
        // pages of 3, 3, 1 and the closing empty page
        assert_eq!(seq.unit_of_work().advances(), 3);
        assert_eq!(report.sequence.pages, 4);
    }

    #[test]
    fn single_selection_shares_the_runner() {
        let (store, ids) = setup(2, RegistrationStatus::ToBeDeleted);
        let target = store.get(ids[1]).unwrap();
        let factory = IteratorFactory::default();

        let mut seq = factory
            .for_selection(store.clone(), (), Selection::Single(target))
            .unwrap();
        let action = |_: &(), rec: &PendingRegistration| -> anyhow::Result<()> {
            store.set_status(rec.id, RegistrationStatus::Deleted)?;
            Ok(())
        };
        let report = Runner::default().run(&mut seq, &action);

        assert_eq!(report.offered, 1);
        assert_eq!(store.get(ids[1]).unwrap().status, RegistrationStatus::Deleted);
        assert_eq!(store.get(ids[0]).unwrap().status, RegistrationStatus::ToBeDeleted);
        assert!(store.requests().is_empty());
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 64,
            ..ProptestConfig::default()
        })]

        /// Property: with store-default paging over a stable order, every record
        /// is offered exactly once and exactly the failing ones stay pending.
        #[test]
        fn every_record_offered_once(
            fail_mask in prop::collection::vec(any::<bool>(), 0..60),
            page_size in 1u32..15,
        ) {
            let (store, ids) = setup(fail_mask.len(), RegistrationStatus::ToBeRegistered);
            let failing: HashSet<_> = ids
                .iter()
                .zip(&fail_mask)
                .filter(|(_, fail)| **fail)
                .map(|(id, _)| *id)
                .collect();

            let (report, offered) = sweep(&store, page_size, &failing);

            prop_assert_eq!(&offered, &ids);
            prop_assert_eq!(report.failed_count, failing.len() as u64);
            prop_assert_eq!(
                store.pending_count(&StatusFilter::to_be_registered()),
                failing.len()
            );
        }
    }
}

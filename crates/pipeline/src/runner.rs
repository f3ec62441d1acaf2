//! Batch driver: drains a sequence, applying an action to every item.
//!
//! A failing action never stops the run. The failure is reported to the
//! sequence through `mark_failed` (which steers the next page fetch) and the
//! run moves on to the next item. Only the end of the sequence stops a run.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use regsweep_core::WorkItem;

use crate::config::PipelineConfig;
use crate::sequence::{SequenceStats, WorkSequence};

/// Operation applied to one work item.
///
/// Errors are caught by the runner; logging detail about them is the
/// action's business.
pub trait Action<T, W: ?Sized> {
    fn apply(&self, uow: &W, item: &T) -> anyhow::Result<()>;
}

impl<T, W: ?Sized, F> Action<T, W> for F
where
    F: Fn(&W, &T) -> anyhow::Result<()>,
{
    fn apply(&self, uow: &W, item: &T) -> anyhow::Result<()> {
        self(uow, item)
    }
}

/// Aggregate outcome of one run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub name: String,
    /// Items offered to the action
    pub offered: u64,
    pub succeeded: u64,
    /// Actions that returned an error
    pub failed_actions: u64,
    /// Actions that panicked (only with panic isolation on)
    pub panicked: u64,
    /// The sequence's failure count at the end of the run
    pub failed_count: u64,
    pub sequence: SequenceStats,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
}

impl RunReport {
    /// Nothing failed, the source answered every fetch and the run reached
    /// the end of the queue.
    pub fn is_clean(&self) -> bool {
        self.failed_count == 0 && self.sequence.fetch_errors == 0 && !self.sequence.stalled
    }
}

enum Outcome {
    Succeeded,
    Failed(anyhow::Error),
    Panicked(String),
}

/// Drives sequences to exhaustion with per-item failure isolation.
#[derive(Debug, Clone, Default)]
pub struct Runner {
    config: PipelineConfig,
}

impl Runner {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Offer every item of `sequence` to `action` exactly once.
    pub fn run<Q, A>(&self, sequence: &mut Q, action: &A) -> RunReport
    where
        Q: WorkSequence + ?Sized,
        Q::Item: WorkItem,
        A: Action<Q::Item, Q::Uow> + ?Sized,
    {
        let name = self.config.name.as_str();
        let started_at = Utc::now();
        info!(run = %name, "sweep started");

        let mut offered = 0u64;
        let mut succeeded = 0u64;
        let mut failed_actions = 0u64;
        let mut panicked = 0u64;

        while sequence.has_next() {
            let Ok(item) = sequence.next_item() else {
                break;
            };
            offered += 1;

            match self.apply_isolated(action, sequence.unit_of_work(), &item) {
                Outcome::Succeeded => {
                    succeeded += 1;
                    debug!(run = %name, item_id = %item.id(), "item processed");
                }
                Outcome::Failed(e) => {
                    failed_actions += 1;
                    sequence.mark_failed();
                    warn!(
                        run = %name,
                        item_id = %item.id(),
                        error = %format!("{e:#}"),
                        "action failed, continuing"
                    );
                }
                Outcome::Panicked(msg) => {
                    panicked += 1;
                    sequence.mark_failed();
                    error!(
                        run = %name,
                        item_id = %item.id(),
                        panic = %msg,
                        "action panicked, continuing"
                    );
                }
            }
        }

        let stats = sequence.stats();
        if stats.first_fetch_failed {
            warn!(
                run = %name,
                "queue source failed on the first fetch; an empty run says nothing about the queue"
            );
        }
        if stats.stalled {
            warn!(
                run = %name,
                duplicates_skipped = stats.duplicates_skipped,
                "queue source stopped honouring offsets; items behind the repeated window were not offered"
            );
        }

        let report = RunReport {
            name: name.to_string(),
            offered,
            succeeded,
            failed_actions,
            panicked,
            failed_count: sequence.failed_count(),
            sequence: stats,
            started_at,
            elapsed_ms: (Utc::now() - started_at).num_milliseconds().max(0) as u64,
        };
        info!(
            run = %name,
            offered = report.offered,
            succeeded = report.succeeded,
            failed_count = report.failed_count,
            fetch_errors = report.sequence.fetch_errors,
            elapsed_ms = report.elapsed_ms,
            "sweep finished"
        );
        report
    }

    fn apply_isolated<T, W, A>(&self, action: &A, uow: &W, item: &T) -> Outcome
    where
        W: ?Sized,
        A: Action<T, W> + ?Sized,
    {
        let result = if self.config.isolate_panics {
            match panic::catch_unwind(AssertUnwindSafe(|| action.apply(uow, item))) {
                Ok(result) => result,
                Err(payload) => return Outcome::Panicked(panic_message(payload.as_ref())),
            }
        } else {
            action.apply(uow, item)
        };

        match result {
            Ok(()) => Outcome::Succeeded,
            Err(e) => Outcome::Failed(e),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

//! Scripted collaborators for unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use regsweep_core::{PendingRegistration, RegistrationStatus};

use crate::source::{PageEntry, PageRequest, QueueSource, SourceError};
use crate::unit_of_work::{UnitOfWork, UnitOfWorkError};

pub(crate) fn item(suffix: &str) -> PendingRegistration {
    PendingRegistration::new(format!("10.5072/{suffix}"), RegistrationStatus::ToBeRegistered)
        .unwrap()
}

#[derive(Debug, Default)]
struct Script {
    pages: VecDeque<Vec<PageEntry<PendingRegistration>>>,
    repeat: Option<Vec<PageEntry<PendingRegistration>>>,
    failures: VecDeque<SourceError>,
    requests: Vec<PageRequest>,
}

/// Source that replays pre-recorded pages regardless of the requested window.
#[derive(Debug, Clone, Default)]
pub(crate) struct ScriptedSource {
    script: Arc<Mutex<Script>>,
}

impl ScriptedSource {
    /// Serve `pages` in order, then empty pages forever.
    pub(crate) fn new(pages: Vec<Vec<PageEntry<PendingRegistration>>>) -> Self {
        let script = Script {
            pages: pages.into(),
            ..Default::default()
        };
        Self {
            script: Arc::new(Mutex::new(script)),
        }
    }

    /// Serve the same page on every call.
    pub(crate) fn repeating(page: Vec<PageEntry<PendingRegistration>>) -> Self {
        let script = Script {
            repeat: Some(page),
            ..Default::default()
        };
        Self {
            script: Arc::new(Mutex::new(script)),
        }
    }

    /// Make the next call fail with `err` (queued before any page).
    pub(crate) fn fail_next(&self, err: SourceError) {
        self.script.lock().unwrap().failures.push_back(err);
    }

    pub(crate) fn requests(&self) -> Vec<PageRequest> {
        self.script.lock().unwrap().requests.clone()
    }
}

impl QueueSource for ScriptedSource {
    type Item = PendingRegistration;
    type Filter = ();

    fn fetch_page(
        &self,
        _filter: &(),
        request: PageRequest,
    ) -> Result<Vec<PageEntry<PendingRegistration>>, SourceError> {
        let mut script = self.script.lock().unwrap();
        script.requests.push(request);
        if let Some(err) = script.failures.pop_front() {
            return Err(err);
        }
        if let Some(page) = &script.repeat {
            return Ok(page.clone());
        }
        Ok(script.pages.pop_front().unwrap_or_default())
    }
}

/// Unit of work that counts page boundaries.
#[derive(Debug, Default)]
pub(crate) struct CountingUow {
    advances: AtomicU64,
    fail: bool,
}

impl CountingUow {
    pub(crate) fn failing() -> Self {
        Self {
            advances: AtomicU64::new(0),
            fail: true,
        }
    }

    pub(crate) fn advances(&self) -> u64 {
        self.advances.load(Ordering::SeqCst)
    }
}

impl UnitOfWork for CountingUow {
    fn advance(&self) -> Result<(), UnitOfWorkError> {
        self.advances.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(UnitOfWorkError::new("commit rejected"));
        }
        Ok(())
    }
}

//! Traits for the external collaborators the core consumes.
//!
//! The retrieval engine never talks to a browser itself. Snapshot capture
//! and action execution are behind these traits; the core calls them with
//! a deadline and treats timeouts as ordinary errors.

use std::time::{Duration, Instant};

use crate::intent::ActionKind;
use crate::locator::Locator;
use crate::snapshot::PageSnapshot;

/// A wall-clock deadline handed to every external call. `unbounded()`
/// means the caller did not ask for a timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    at: Option<Instant>,
}

impl Deadline {
    pub fn unbounded() -> Self {
        Self { at: None }
    }

    pub fn within(timeout: Duration) -> Self {
        Self {
            at: Some(Instant::now() + timeout),
        }
    }

    pub fn expired(&self) -> bool {
        self.at.is_some_and(|at| Instant::now() >= at)
    }

    /// Time left, saturating at zero. `None` when unbounded.
    pub fn remaining(&self) -> Option<Duration> {
        self.at.map(|at| at.saturating_duration_since(Instant::now()))
    }
}

impl Default for Deadline {
    fn default() -> Self {
        Self::unbounded()
    }
}

/// Result of one executor action. `ok == false` carries the executor's
/// explanation; success must be idempotent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionOutcome {
    pub ok: bool,
    pub err: Option<String>,
}

impl ActionOutcome {
    pub fn success() -> Self {
        Self { ok: true, err: None }
    }

    pub fn failure(err: impl Into<String>) -> Self {
        Self {
            ok: false,
            err: Some(err.into()),
        }
    }
}

/// Captures the current page as a flattened descriptor set. Implemented
/// outside the core (CDP bridge, Playwright shim, test fixture).
pub trait SnapshotProvider: Send + Sync {
    /// Capture a snapshot, optionally navigating first.
    fn snapshot(&self, url: Option<&str>, deadline: Deadline) -> Result<PageSnapshot, String>;

    /// Best-effort wait for the page to go idle. A hint, never a
    /// correctness dependency; the default does nothing.
    fn wait_for_idle(&self, _deadline: Deadline) -> bool {
        false
    }
}

/// Executes actions against the live page. Implemented outside the core.
pub trait Executor: Send + Sync {
    /// Does the locator match at least one live node?
    fn exists(&self, locator: &Locator) -> bool;

    /// Does the locator match exactly one live node?
    fn unique(&self, locator: &Locator) -> bool;

    /// Perform `action` on the node `locator` resolves to. `value` carries
    /// the text to type, key to press, or option to select.
    fn perform(&self, action: ActionKind, locator: &Locator, value: Option<&str>)
    -> ActionOutcome;
}

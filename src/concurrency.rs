//! Bounded fail-fast task group
//!
//! Runs units of work on the tokio runtime with at most `limit` in flight.
//! A unit's slot is a semaphore permit acquired before the unit is spawned and
//! owned by the task, so it is released on success, failure, or panic alike.
//! The first unit to fail records its error and cancels the shared token;
//! waiting admissions then stop and admitted units that have not started yet
//! exit without doing anything.

use crate::error::RestoreError;
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub struct TaskGroup {
    limit: usize,
    semaphore: Arc<Semaphore>,
    cancel: CancellationToken,
    tasks: JoinSet<()>,
    first_error: Arc<Mutex<Option<RestoreError>>>,
}

impl TaskGroup {
    /// `limit` is clamped to at least one.
    pub fn new(limit: usize, cancel: CancellationToken) -> Self {
        let limit = limit.max(1);
        Self {
            limit,
            semaphore: Arc::new(Semaphore::new(limit)),
            cancel,
            tasks: JoinSet::new(),
            first_error: Arc::new(Mutex::new(None)),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Wait for a free slot, then start the unit built by `make`.
    ///
    /// Returns `false` without starting anything when the group was cancelled
    /// before a slot became available.
    pub async fn spawn<F, Fut>(&mut self, make: F) -> bool
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = Result<(), RestoreError>> + Send + 'static,
    {
        let permit = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return false,
            permit = self.semaphore.clone().acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => return false,
            },
        };

        while let Some(joined) = self.tasks.try_join_next() {
            self.absorb(joined);
        }

        let cancel = self.cancel.clone();
        let first_error = Arc::clone(&self.first_error);
        let unit = make(cancel.clone());
        self.tasks.spawn(async move {
            let _permit = permit;
            if cancel.is_cancelled() {
                debug!("Unit abandoned before start");
                return;
            }
            if let Err(err) = unit.await {
                record_first(&first_error, &cancel, err);
            }
        });
        true
    }

    /// Wait for every started unit and report the outcome.
    ///
    /// The first recorded error wins. A group cancelled from outside with no
    /// failing unit reports [`RestoreError::Cancelled`].
    pub async fn wait(mut self) -> Result<(), RestoreError> {
        while let Some(joined) = self.tasks.join_next().await {
            self.absorb(joined);
        }
        if let Some(err) = self.first_error.lock().take() {
            return Err(err);
        }
        if self.cancel.is_cancelled() {
            return Err(RestoreError::Cancelled);
        }
        Ok(())
    }

    fn absorb(&self, joined: Result<(), JoinError>) {
        match joined {
            Ok(()) => {}
            Err(e) if e.is_panic() => {
                warn!(error = %e, "Unit panicked");
                record_first(
                    &self.first_error,
                    &self.cancel,
                    RestoreError::TaskFailed(e.to_string()),
                );
            }
            Err(_) => {}
        }
    }
}

/// Keep `err` if nothing failed before it, then cancel the group. The slot is
/// filled before cancelling so a unit that merely observes the cancellation
/// can never be reported first.
fn record_first(slot: &Mutex<Option<RestoreError>>, cancel: &CancellationToken, err: RestoreError) {
    {
        let mut first = slot.lock();
        if first.is_none() {
            *first = Some(err);
        } else {
            debug!(error = %err, "Suppressed error after first failure");
        }
    }
    cancel.cancel();
}

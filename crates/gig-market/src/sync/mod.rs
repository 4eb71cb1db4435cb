//! Polling synchronizer that keeps a dashboard's local copy of applications or jobs consistent with
//! the store without a push channel.
//!
//! A view fetches once when mounted and then on a fixed interval. At most one fetch per view is in
//! flight at any time; ticks and manual refreshes that find a fetch running are skipped. Results
//! carry the store revision they were read at, so an unchanged revision short-circuits the
//! structural comparison, and subscribers are only woken when the data (or the error banner)
//! actually changes. Transport failures keep the last good data.

mod sources;

#[cfg(test)]
mod tests;

pub use sources::{ApplicationsSource, JobSource};

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, warn};

use crate::config::SyncConfig;

/// Result of asking a source for data newer than a known revision.
#[derive(Debug, Clone, PartialEq)]
pub enum Fetch<T> {
    NotModified,
    Updated { revision: u64, data: T },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    #[error("fetch failed: {0}")]
    Fetch(String),
}

/// Anything a view can poll.
#[async_trait]
pub trait SnapshotSource: Send + Sync + 'static {
    type Data: Clone + PartialEq + Send + Sync + 'static;

    async fn fetch(&self, known_revision: Option<u64>) -> Result<Fetch<Self::Data>, SyncError>;
}

/// Locally held copy of server state as seen by one view.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewState<T> {
    pub data: Option<T>,
    /// Revision of the last successful read; bookkeeping only, changes to it alone notify nobody.
    pub revision: Option<u64>,
    pub last_error: Option<SyncError>,
}

impl<T> Default for ViewState<T> {
    fn default() -> Self {
        Self {
            data: None,
            revision: None,
            last_error: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// New data was applied and subscribers were notified.
    Updated,
    /// The fetch succeeded but matched what the view already held.
    Unchanged,
    /// Another fetch for this view was still in flight.
    Skipped,
    /// The fetch failed; the previous data is retained.
    Failed(SyncError),
    /// The view is not mounted.
    Inactive,
    /// The view was torn down while the fetch was running; the response was dropped.
    Discarded,
}

/// Clears the in-flight flag and wakes waiters when a fetch ends, however it ends.
struct InFlight<'a> {
    flag: &'a AtomicBool,
    idle: &'a Notify,
}

impl<'a> InFlight<'a> {
    fn begin(flag: &'a AtomicBool, idle: &'a Notify) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag, idle })
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
        self.idle.notify_waiters();
    }
}

pub struct ViewSynchronizer<S: SnapshotSource> {
    source: Arc<S>,
    config: SyncConfig,
    state: watch::Sender<ViewState<S::Data>>,
    in_flight: AtomicBool,
    idle: Notify,
    active: AtomicBool,
    /// Bumped on every mount and teardown; a fetch from an older mount is discarded.
    generation: AtomicU64,
    poller: Mutex<Option<JoinHandle<()>>>,
    fetches: AtomicU64,
}

impl<S: SnapshotSource> ViewSynchronizer<S> {
    pub fn new(source: Arc<S>, config: SyncConfig) -> Self {
        let (state, _) = watch::channel(ViewState::default());
        Self {
            source,
            config,
            state,
            in_flight: AtomicBool::new(false),
            idle: Notify::new(),
            active: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            poller: Mutex::new(None),
            fetches: AtomicU64::new(0),
        }
    }

    /// Receiver that is marked changed only when the view has something new to render.
    pub fn subscribe(&self) -> watch::Receiver<ViewState<S::Data>> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> ViewState<S::Data> {
        self.state.borrow().clone()
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Number of fetches actually issued to the source.
    pub fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::Relaxed)
    }

    /// Fetch immediately, then keep polling every `poll_interval` until `teardown`. A fetch left over
    /// from an earlier mount is waited out, never reused.
    pub async fn mount(self: &Arc<Self>) -> RefreshOutcome {
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        self.active.store(true, Ordering::Release);
        let outcome = self.refresh_when_idle().await;
        if self.generation.load(Ordering::Acquire) != generation {
            return outcome;
        }

        let period = self.config.poll_interval;
        let weak = Arc::downgrade(self);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(view) = weak.upgrade() else {
                    break;
                };
                if !view.is_active() {
                    break;
                }
                view.refresh_now().await;
            }
        });

        let previous = self
            .poller
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handle);
        if let Some(previous) = previous {
            previous.abort();
        }
        outcome
    }

    /// Stop polling. Responses still in flight are discarded when they land.
    pub fn teardown(&self) {
        self.active.store(false, Ordering::Release);
        self.generation.fetch_add(1, Ordering::AcqRel);
        let handle = self
            .poller
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.abort();
        }
    }

    /// Fetch now, outside the polling cadence, unless a fetch is already running.
    pub async fn refresh_now(&self) -> RefreshOutcome {
        if !self.is_active() {
            return RefreshOutcome::Inactive;
        }
        let Some(_flight) = InFlight::begin(&self.in_flight, &self.idle) else {
            debug!("fetch already in flight, skipping");
            return RefreshOutcome::Skipped;
        };

        self.fetches.fetch_add(1, Ordering::Relaxed);
        let generation = self.generation.load(Ordering::Acquire);
        let known_revision = self.state.borrow().revision;
        let result = self.source.fetch(known_revision).await;

        if !self.is_active() || self.generation.load(Ordering::Acquire) != generation {
            debug!("view torn down during fetch, discarding response");
            return RefreshOutcome::Discarded;
        }

        match result {
            Ok(Fetch::NotModified) => {
                self.state
                    .send_if_modified(|state| state.last_error.take().is_some());
                debug!(revision = ?known_revision, "view not modified");
                RefreshOutcome::Unchanged
            }
            Ok(Fetch::Updated { revision, data }) => {
                let mut data_changed = false;
                self.state.send_if_modified(|state| {
                    let error_cleared = state.last_error.take().is_some();
                    state.revision = Some(revision);
                    if state.data.as_ref() != Some(&data) {
                        state.data = Some(data);
                        data_changed = true;
                    }
                    data_changed || error_cleared
                });
                debug!(revision, data_changed, "view refreshed");
                if data_changed {
                    RefreshOutcome::Updated
                } else {
                    RefreshOutcome::Unchanged
                }
            }
            Err(error) => {
                warn!(%error, "view refresh failed, keeping last known state");
                self.state.send_if_modified(|state| {
                    if state.last_error.as_ref() == Some(&error) {
                        false
                    } else {
                        state.last_error = Some(error.clone());
                        true
                    }
                });
                RefreshOutcome::Failed(error)
            }
        }
    }

    /// Follow-up after a local mutation: wait for the settle delay, then refetch. A fetch that is
    /// already running may predate the mutation, so wait for it and fetch again.
    pub async fn refetch_after_mutation(&self) -> RefreshOutcome {
        tokio::time::sleep(self.config.settle_delay).await;
        self.refresh_when_idle().await
    }

    async fn refresh_when_idle(&self) -> RefreshOutcome {
        loop {
            let idle = self.idle.notified();
            tokio::pin!(idle);
            idle.as_mut().enable();
            match self.refresh_now().await {
                RefreshOutcome::Skipped => idle.await,
                outcome => return outcome,
            }
        }
    }

    /// Fire-and-forget form of `refetch_after_mutation` for UI event handlers.
    pub fn schedule_refetch(self: &Arc<Self>) -> JoinHandle<RefreshOutcome> {
        let view = Arc::clone(self);
        tokio::spawn(async move { view.refetch_after_mutation().await })
    }
}

impl<S: SnapshotSource> Drop for ViewSynchronizer<S> {
    fn drop(&mut self) {
        let handle = self
            .poller
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.abort();
        }
    }
}

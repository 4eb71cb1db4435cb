use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::{Fetch, RefreshOutcome, SnapshotSource, SyncError, ViewSynchronizer};
use crate::config::SyncConfig;

const POLL: Duration = Duration::from_secs(10);
const SETTLE: Duration = Duration::from_millis(500);

fn config() -> SyncConfig {
    SyncConfig {
        poll_interval: POLL,
        settle_delay: SETTLE,
    }
}

struct Script {
    revision: u64,
    data: Vec<String>,
    failing: bool,
    delay: Duration,
}

/// Source whose contents, latency and failures are driven by the test.
struct ScriptedSource {
    script: Mutex<Script>,
    calls: AtomicUsize,
    running: AtomicUsize,
    max_running: AtomicUsize,
}

impl ScriptedSource {
    fn new(items: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(Script {
                revision: 1,
                data: items.iter().map(|item| item.to_string()).collect(),
                failing: false,
                delay: Duration::ZERO,
            }),
            calls: AtomicUsize::new(0),
            running: AtomicUsize::new(0),
            max_running: AtomicUsize::new(0),
        })
    }

    fn publish(&self, items: &[&str]) {
        let mut script = self.script.lock().expect("script lock");
        script.revision += 1;
        script.data = items.iter().map(|item| item.to_string()).collect();
    }

    /// A write elsewhere in the store that leaves this view's data as it was.
    fn touch(&self) {
        self.script.lock().expect("script lock").revision += 1;
    }

    fn set_failing(&self, failing: bool) {
        self.script.lock().expect("script lock").failing = failing;
    }

    fn set_delay(&self, delay: Duration) {
        self.script.lock().expect("script lock").delay = delay;
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SnapshotSource for ScriptedSource {
    type Data = Vec<String>;

    async fn fetch(&self, known_revision: Option<u64>) -> Result<Fetch<Self::Data>, SyncError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now_running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(now_running, Ordering::SeqCst);

        // Read at request time: a slow response reflects the store as it was when sent.
        let (revision, data, failing, delay) = {
            let script = self.script.lock().expect("script lock");
            (
                script.revision,
                script.data.clone(),
                script.failing,
                script.delay,
            )
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.running.fetch_sub(1, Ordering::SeqCst);

        if failing {
            Err(SyncError::Fetch("connection reset".to_string()))
        } else if known_revision == Some(revision) {
            Ok(Fetch::NotModified)
        } else {
            Ok(Fetch::Updated { revision, data })
        }
    }
}

fn view_over(source: &Arc<ScriptedSource>) -> Arc<ViewSynchronizer<ScriptedSource>> {
    Arc::new(ViewSynchronizer::new(Arc::clone(source), config()))
}

fn items(view: &ViewSynchronizer<ScriptedSource>) -> Option<Vec<String>> {
    view.snapshot().data
}

fn owned(values: &[&str]) -> Option<Vec<String>> {
    Some(values.iter().map(|value| value.to_string()).collect())
}

#[tokio::test(start_paused = true)]
async fn refresh_before_mount_is_inactive() {
    let source = ScriptedSource::new(&["a"]);
    let view = view_over(&source);

    assert_eq!(view.refresh_now().await, RefreshOutcome::Inactive);
    assert_eq!(source.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn mount_fetches_immediately_then_polls() {
    let source = ScriptedSource::new(&["a"]);
    let view = view_over(&source);

    assert_eq!(view.mount().await, RefreshOutcome::Updated);
    assert_eq!(items(&view), owned(&["a"]));
    assert_eq!(view.fetch_count(), 1);

    source.publish(&["a", "b"]);
    tokio::time::sleep(POLL + Duration::from_millis(1)).await;
    assert_eq!(view.fetch_count(), 2);
    assert_eq!(items(&view), owned(&["a", "b"]));

    tokio::time::sleep(POLL * 2).await;
    assert_eq!(view.fetch_count(), 4);
    view.teardown();
}

#[tokio::test(start_paused = true)]
async fn unchanged_polls_do_not_notify_subscribers() {
    let source = ScriptedSource::new(&["a"]);
    let view = view_over(&source);
    view.mount().await;

    let mut receiver = view.subscribe();
    receiver.borrow_and_update();

    tokio::time::sleep(POLL + Duration::from_millis(1)).await;
    assert_eq!(view.fetch_count(), 2);
    assert!(!receiver.has_changed().expect("sender alive"));

    // New revision, identical data: the structural comparison suppresses the update.
    source.touch();
    assert_eq!(view.refresh_now().await, RefreshOutcome::Unchanged);
    assert!(!receiver.has_changed().expect("sender alive"));
    assert_eq!(view.snapshot().revision, Some(2));

    source.publish(&["b"]);
    assert_eq!(view.refresh_now().await, RefreshOutcome::Updated);
    assert!(receiver.has_changed().expect("sender alive"));
    assert_eq!(receiver.borrow_and_update().data, owned(&["b"]));
    view.teardown();
}

#[tokio::test(start_paused = true)]
async fn failures_keep_last_known_data() {
    let source = ScriptedSource::new(&["a"]);
    let view = view_over(&source);
    view.mount().await;

    source.set_failing(true);
    let outcome = view.refresh_now().await;
    assert!(matches!(outcome, RefreshOutcome::Failed(SyncError::Fetch(_))));
    let state = view.snapshot();
    assert_eq!(state.data, owned(&["a"]));
    assert!(state.last_error.is_some());

    source.set_failing(false);
    assert_eq!(view.refresh_now().await, RefreshOutcome::Unchanged);
    assert!(view.snapshot().last_error.is_none());
    view.teardown();
}

#[tokio::test(start_paused = true)]
async fn manual_refresh_is_skipped_while_a_fetch_is_in_flight() {
    let source = ScriptedSource::new(&["a"]);
    let view = view_over(&source);
    view.mount().await;

    source.set_delay(Duration::from_secs(3));
    let background = tokio::spawn({
        let view = Arc::clone(&view);
        async move { view.refresh_now().await }
    });
    tokio::task::yield_now().await;

    assert_eq!(view.refresh_now().await, RefreshOutcome::Skipped);
    assert_eq!(
        background.await.expect("task joins"),
        RefreshOutcome::Unchanged
    );
    assert_eq!(source.calls(), 2);
    assert_eq!(source.max_running.load(Ordering::SeqCst), 1);
    view.teardown();
}

#[tokio::test(start_paused = true)]
async fn slow_polls_never_overlap() {
    let source = ScriptedSource::new(&["a"]);
    let view = view_over(&source);
    view.mount().await;

    source.set_delay(POLL * 2 + Duration::from_secs(5));
    tokio::time::sleep(POLL + Duration::from_secs(1)).await;
    assert_eq!(view.refresh_now().await, RefreshOutcome::Skipped);

    tokio::time::sleep(POLL * 6).await;
    assert_eq!(source.max_running.load(Ordering::SeqCst), 1);
    view.teardown();
}

#[tokio::test(start_paused = true)]
async fn teardown_discards_late_responses_and_stops_polling() {
    let source = ScriptedSource::new(&["a"]);
    let view = view_over(&source);
    view.mount().await;

    source.publish(&["late"]);
    source.set_delay(Duration::from_secs(2));
    let background = tokio::spawn({
        let view = Arc::clone(&view);
        async move { view.refresh_now().await }
    });
    tokio::task::yield_now().await;

    view.teardown();
    assert_eq!(
        background.await.expect("task joins"),
        RefreshOutcome::Discarded
    );
    assert_eq!(items(&view), owned(&["a"]));

    let calls = source.calls();
    tokio::time::sleep(POLL * 5).await;
    assert_eq!(source.calls(), calls);
    assert_eq!(view.refresh_now().await, RefreshOutcome::Inactive);
}

#[tokio::test(start_paused = true)]
async fn remount_waits_out_a_fetch_from_the_previous_mount() {
    let source = ScriptedSource::new(&["old"]);
    source.set_delay(Duration::from_secs(3));
    let view = view_over(&source);

    let first_mount = tokio::spawn({
        let view = Arc::clone(&view);
        async move { view.mount().await }
    });
    tokio::time::sleep(Duration::from_secs(1)).await;
    view.teardown();

    source.publish(&["new"]);
    source.set_delay(Duration::ZERO);
    assert_eq!(view.mount().await, RefreshOutcome::Updated);
    assert_eq!(
        first_mount.await.expect("task joins"),
        RefreshOutcome::Discarded
    );
    assert_eq!(items(&view), owned(&["new"]));
    assert_eq!(source.max_running.load(Ordering::SeqCst), 1);

    // Only the second mount polls.
    let calls = source.calls();
    tokio::time::sleep(POLL + Duration::from_millis(1)).await;
    assert_eq!(source.calls(), calls + 1);
    view.teardown();
}

#[tokio::test(start_paused = true)]
async fn refetch_after_mutation_outlasts_an_older_poll() {
    let source = ScriptedSource::new(&["pending"]);
    let view = view_over(&source);
    view.mount().await;

    // A fetch that started before the mutation is still on the wire.
    source.set_delay(Duration::from_secs(2));
    let stale = tokio::spawn({
        let view = Arc::clone(&view);
        async move { view.refresh_now().await }
    });
    tokio::task::yield_now().await;

    source.publish(&["accepted"]);
    let outcome = view.refetch_after_mutation().await;

    assert_eq!(outcome, RefreshOutcome::Updated);
    assert_eq!(items(&view), owned(&["accepted"]));
    assert_eq!(stale.await.expect("task joins"), RefreshOutcome::Unchanged);
    assert_eq!(source.max_running.load(Ordering::SeqCst), 1);
    view.teardown();
}

#[tokio::test(start_paused = true)]
async fn scheduled_refetch_waits_for_the_settle_delay() {
    let source = ScriptedSource::new(&["pending"]);
    let view = view_over(&source);
    view.mount().await;

    source.publish(&["accepted"]);
    let handle = view.schedule_refetch();
    tokio::time::sleep(SETTLE / 2).await;
    assert_eq!(source.calls(), 1);

    assert_eq!(handle.await.expect("task joins"), RefreshOutcome::Updated);
    assert_eq!(source.calls(), 2);
    assert_eq!(items(&view), owned(&["accepted"]));
    view.teardown();
}

#[tokio::test(start_paused = true)]
async fn failed_first_fetch_leaves_view_empty() {
    let source = ScriptedSource::new(&["a"]);
    source.set_failing(true);
    let view = view_over(&source);

    assert!(matches!(view.mount().await, RefreshOutcome::Failed(_)));
    let state = view.snapshot();
    assert_eq!(state.data, None);
    assert_eq!(state.revision, None);
    assert!(state.last_error.is_some());
    view.teardown();
}

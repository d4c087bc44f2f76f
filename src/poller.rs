use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::error::Result;
use crate::model::{GroupId, GroupMap, ProjectIdSet};

/// Fetches every record of one group for a dashboard view.
#[async_trait]
pub trait GroupFetcher: Send + Sync + 'static {
    type Record: Clone + Send + Sync + 'static;

    async fn fetch_group(
        &self,
        group_id: GroupId,
        project_ids: &ProjectIdSet,
    ) -> Result<Vec<Self::Record>>;
}

/// Fetches all groups concurrently and flattens the results.
///
/// Results keep group submission order. The first failure fails the whole
/// round and no partial result is returned.
pub async fn fork_join_flatten<F>(groups: &GroupMap, fetcher: &F) -> Result<Vec<F::Record>>
where
    F: GroupFetcher + ?Sized,
{
    let rounds = groups
        .iter()
        .map(|(group_id, project_ids)| fetcher.fetch_group(*group_id, project_ids));

    let per_group = futures::future::try_join_all(rounds).await?;

    Ok(per_group.into_iter().flatten().collect())
}

/// The records of the last successful fetch round.
#[derive(Debug, Clone)]
pub struct Snapshot<R> {
    /// Number of successful rounds so far, 0 before the first one
    pub round: u64,
    pub fetched_at: Option<DateTime<Utc>>,
    pub records: Arc<Vec<R>>,
}

impl<R> Default for Snapshot<R> {
    fn default() -> Self {
        Self {
            round: 0,
            fetched_at: None,
            records: Arc::new(Vec::new()),
        }
    }
}

/// Polls all groups on a fixed period and publishes snapshots.
pub struct Poller<F: GroupFetcher> {
    fetcher: Arc<F>,
    groups: Arc<GroupMap>,
    period: Duration,
}

impl<F: GroupFetcher> Poller<F> {
    pub fn new(fetcher: Arc<F>, groups: GroupMap, period: Duration) -> Self {
        Self {
            fetcher,
            groups: Arc::new(groups),
            period,
        }
    }

    /// Starts polling on the current tokio runtime.
    ///
    /// The first round runs immediately with the loading flag raised. Later
    /// rounds start one period after the previous round finished ticking and
    /// never overlap.
    pub fn spawn(self) -> PollHandle<F::Record> {
        let (snapshot_tx, snapshot_rx) = watch::channel(Snapshot::default());
        let (loading_tx, loading_rx) = watch::channel(false);
        let cancel = CancellationToken::new();

        let task = tokio::spawn(run_poll_loop(
            self.fetcher,
            self.groups,
            self.period,
            snapshot_tx,
            loading_tx,
            cancel.clone(),
        ));

        PollHandle {
            snapshot: snapshot_rx,
            loading: loading_rx,
            cancel: cancel.clone(),
            task: Some(task),
            _guard: cancel.drop_guard(),
        }
    }
}

/// Owner side of a running poller. Dropping it stops polling.
pub struct PollHandle<R> {
    snapshot: watch::Receiver<Snapshot<R>>,
    loading: watch::Receiver<bool>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
    _guard: DropGuard,
}

impl<R> PollHandle<R> {
    pub fn subscribe(&self) -> watch::Receiver<Snapshot<R>> {
        self.snapshot.clone()
    }

    pub fn loading(&self) -> watch::Receiver<bool> {
        self.loading.clone()
    }

    /// Cancels polling and waits for the task to finish.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("Poller task ended abnormally: {e}");
            }
        }
    }
}

/// Clears the loading flag however the initial round ends.
struct LoadingGuard<'a>(&'a watch::Sender<bool>);

impl<'a> LoadingGuard<'a> {
    fn raise(sender: &'a watch::Sender<bool>) -> Self {
        sender.send_replace(true);
        Self(sender)
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.0.send_replace(false);
    }
}

async fn run_poll_loop<F: GroupFetcher>(
    fetcher: Arc<F>,
    groups: Arc<GroupMap>,
    period: Duration,
    snapshot_tx: watch::Sender<Snapshot<F::Record>>,
    loading_tx: watch::Sender<bool>,
    cancel: CancellationToken,
) {
    info!(
        "Polling {} groups every {}s",
        groups.len(),
        period.as_secs()
    );

    let mut round = 0;

    let initial = {
        let _loading = LoadingGuard::raise(&loading_tx);
        tokio::select! {
            () = cancel.cancelled() => None,
            result = fork_join_flatten(&groups, fetcher.as_ref()) => Some(result),
        }
    };
    match initial {
        Some(result) => publish(&snapshot_tx, result, &mut round),
        None => {
            debug!("Poller cancelled during initial fetch");
            return;
        }
    }

    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let result = tokio::select! {
            () = cancel.cancelled() => break,
            result = fork_join_flatten(&groups, fetcher.as_ref()) => result,
        };

        if cancel.is_cancelled() {
            break;
        }
        publish(&snapshot_tx, result, &mut round);
    }

    debug!("Poller stopped after {round} successful rounds");
}

fn publish<R>(snapshot_tx: &watch::Sender<Snapshot<R>>, result: Result<Vec<R>>, round: &mut u64) {
    match result {
        Ok(records) => {
            *round += 1;
            info!("Fetched {} records (round {round})", records.len());
            snapshot_tx.send_replace(Snapshot {
                round: *round,
                fetched_at: Some(Utc::now()),
                records: Arc::new(records),
            });
        }
        Err(e) => {
            warn!("Refresh failed, keeping previous snapshot: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use indexmap::IndexSet;
    use tokio_test::{assert_err, assert_ok};

    use super::*;
    use crate::error::CidashError;

    /// Returns scripted rounds; each record is `group_id * 100 + call`.
    struct ScriptedFetcher {
        calls: AtomicUsize,
        failures: Mutex<VecDeque<bool>>,
        delay: Duration,
    }

    impl ScriptedFetcher {
        fn new(failures: &[bool]) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                failures: Mutex::new(failures.iter().copied().collect()),
                delay: Duration::ZERO,
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl GroupFetcher for ScriptedFetcher {
        type Record = u64;

        async fn fetch_group(
            &self,
            group_id: GroupId,
            _project_ids: &ProjectIdSet,
        ) -> Result<Vec<u64>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) as u64;
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let fail = self.failures.lock().unwrap().pop_front().unwrap_or(false);
            if fail {
                return Err(CidashError::Api {
                    status: 503,
                    message: "unavailable".into(),
                });
            }
            Ok(vec![group_id * 100 + call])
        }
    }

    fn groups(ids: &[GroupId]) -> GroupMap {
        ids.iter().map(|id| (*id, IndexSet::new())).collect()
    }

    #[tokio::test]
    async fn test_fork_join_keeps_group_order() {
        let fetcher = ScriptedFetcher::new(&[]);
        let records = assert_ok!(fork_join_flatten(&groups(&[3, 1, 2]), &fetcher).await);
        assert_eq!(records.len(), 3);
        assert_eq!(records[0] / 100, 3);
        assert_eq!(records[1] / 100, 1);
        assert_eq!(records[2] / 100, 2);
    }

    #[tokio::test]
    async fn test_fork_join_fails_on_any_group_failure() {
        let fetcher = ScriptedFetcher::new(&[false, true, false]);
        assert_err!(fork_join_flatten(&groups(&[1, 2, 3]), &fetcher).await);
    }

    #[tokio::test]
    async fn test_fork_join_without_groups_is_empty() {
        let fetcher = ScriptedFetcher::new(&[]);
        let records = assert_ok!(fork_join_flatten(&GroupMap::new(), &fetcher).await);
        assert!(records.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_round_publishes_and_clears_loading() {
        let fetcher = Arc::new(ScriptedFetcher::new(&[]));
        let handle = Poller::new(fetcher, groups(&[1, 2]), Duration::from_secs(30)).spawn();

        let mut snapshots = handle.subscribe();
        snapshots.changed().await.unwrap();
        let snapshot = snapshots.borrow_and_update().clone();
        assert_eq!(snapshot.round, 1);
        assert_eq!(snapshot.records.len(), 2);

        let mut loading = handle.loading();
        loading.wait_for(|loading| !loading).await.unwrap();

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_loading_is_raised_during_initial_round() {
        let mut fetcher = ScriptedFetcher::new(&[]);
        fetcher.delay = Duration::from_secs(5);
        let handle = Poller::new(Arc::new(fetcher), groups(&[1]), Duration::from_secs(30)).spawn();

        let mut loading = handle.loading();
        loading.wait_for(|loading| *loading).await.unwrap();
        loading.wait_for(|loading| !loading).await.unwrap();
        assert_eq!(handle.subscribe().borrow().round, 1);

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_replaces_snapshot_each_period() {
        let fetcher = Arc::new(ScriptedFetcher::new(&[]));
        let handle = Poller::new(Arc::clone(&fetcher), groups(&[1]), Duration::from_secs(10)).spawn();

        let mut snapshots = handle.subscribe();
        snapshots.changed().await.unwrap();
        assert_eq!(*snapshots.borrow_and_update().records, vec![100]);

        snapshots.changed().await.unwrap();
        let snapshot = snapshots.borrow_and_update().clone();
        assert_eq!(snapshot.round, 2);
        assert_eq!(*snapshot.records, vec![101]);
        assert_eq!(fetcher.calls(), 2);

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_refresh_keeps_previous_snapshot() {
        let fetcher = Arc::new(ScriptedFetcher::new(&[false, true]));
        let handle = Poller::new(Arc::clone(&fetcher), groups(&[1]), Duration::from_secs(10)).spawn();

        let mut snapshots = handle.subscribe();
        snapshots.changed().await.unwrap();
        let first = snapshots.borrow_and_update().clone();

        tokio::time::sleep(Duration::from_secs(15)).await;
        assert_eq!(fetcher.calls(), 2);
        assert!(!snapshots.has_changed().unwrap());
        let current = snapshots.borrow().clone();
        assert_eq!(current.round, first.round);
        assert_eq!(current.records, first.records);
        assert!(!*handle.loading().borrow());

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_initial_round_clears_loading() {
        let mut fetcher = ScriptedFetcher::new(&[true]);
        fetcher.delay = Duration::from_secs(5);
        let handle = Poller::new(Arc::new(fetcher), groups(&[1]), Duration::from_secs(10)).spawn();

        let mut loading = handle.loading();
        loading.wait_for(|loading| *loading).await.unwrap();
        loading.wait_for(|loading| !loading).await.unwrap();
        assert_eq!(handle.subscribe().borrow().round, 0);

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_emissions_after_cancel() {
        let fetcher = Arc::new(ScriptedFetcher::new(&[]));
        let handle = Poller::new(Arc::clone(&fetcher), groups(&[1]), Duration::from_secs(10)).spawn();

        let mut snapshots = handle.subscribe();
        snapshots.changed().await.unwrap();
        snapshots.borrow_and_update();

        handle.shutdown().await;
        tokio::time::sleep(Duration::from_secs(60)).await;

        assert_eq!(fetcher.calls(), 1);
        assert!(!snapshots.has_changed().unwrap_or(false));
        assert_eq!(snapshots.borrow().round, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_drops_in_flight_round() {
        let mut fetcher = ScriptedFetcher::new(&[]);
        fetcher.delay = Duration::from_secs(20);
        let fetcher = Arc::new(fetcher);
        let handle = Poller::new(Arc::clone(&fetcher), groups(&[1]), Duration::from_secs(10)).spawn();

        let mut snapshots = handle.subscribe();
        snapshots.changed().await.unwrap();
        snapshots.borrow_and_update();

        // First round ends at 20s, the second starts at 30s and would end at 50s
        tokio::time::sleep(Duration::from_secs(15)).await;
        assert_eq!(fetcher.calls(), 2);
        handle.shutdown().await;

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(!snapshots.has_changed().unwrap_or(false));
        assert_eq!(snapshots.borrow().round, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_handle_stops_polling() {
        let fetcher = Arc::new(ScriptedFetcher::new(&[]));
        let handle = Poller::new(Arc::clone(&fetcher), groups(&[1]), Duration::from_secs(10)).spawn();

        let mut snapshots = handle.subscribe();
        snapshots.changed().await.unwrap();
        drop(handle);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(fetcher.calls(), 1);
    }
}

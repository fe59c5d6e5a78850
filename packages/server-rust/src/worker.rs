//! Background maintenance for the registry and the broadcast snapshot.
//!
//! `BackgroundWorker<R>` drives a `BackgroundRunnable` from an mpsc channel
//! plus a periodic tick. `MaintenanceRunnable` is the node's runnable: every
//! tick expires stale operators and installs a fresh snapshot.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use avs_core::RegistryError;

use crate::broadcast::Broadcaster;
use crate::registry::OperatorRegistry;

// ---------------------------------------------------------------------------
// BackgroundRunnable
// ---------------------------------------------------------------------------

/// Task handler driven by [`BackgroundWorker`].
#[async_trait]
pub trait BackgroundRunnable: Send + 'static {
    type Task: Send + 'static;

    async fn run(&mut self, task: Self::Task);

    /// Called on every tick. Default is a no-op.
    async fn on_tick(&mut self) {}

    /// Called once when the worker stops. Default is a no-op.
    async fn shutdown(&mut self) {}
}

// ---------------------------------------------------------------------------
// BackgroundWorker
// ---------------------------------------------------------------------------

const MIN_TICK: Duration = Duration::from_millis(1);

/// Runs a [`BackgroundRunnable`] on its own tokio task.
pub struct BackgroundWorker<R: BackgroundRunnable> {
    tx: Option<mpsc::Sender<R::Task>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl<R: BackgroundRunnable> BackgroundWorker<R> {
    /// Spawns the worker. The task channel holds 256 entries.
    ///
    /// The first tick fires one full `tick_interval` after start. A zero
    /// interval is raised to one millisecond.
    pub fn start(mut runnable: R, tick_interval: Duration) -> Self {
        let tick_interval = tick_interval.max(MIN_TICK);
        let (tx, mut rx) = mpsc::channel::<R::Task>(256);
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            let mut ticks = tokio::time::interval(tick_interval);
            ticks.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // interval() yields immediately once; swallow it.
            ticks.tick().await;

            loop {
                tokio::select! {
                    task = rx.recv() => match task {
                        Some(task) => runnable.run(task).await,
                        None => break,
                    },
                    _ = ticks.tick() => runnable.on_tick().await,
                    _ = &mut shutdown_rx => break,
                }
            }

            runnable.shutdown().await;
        });

        Self {
            tx: Some(tx),
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    /// Queues a task for the worker.
    ///
    /// # Errors
    ///
    /// Fails if the worker has been stopped or its task has exited.
    pub async fn submit(&self, task: R::Task) -> anyhow::Result<()> {
        match &self.tx {
            Some(tx) => tx
                .send(task)
                .await
                .map_err(|_| anyhow::anyhow!("worker channel closed")),
            None => Err(anyhow::anyhow!("worker not running")),
        }
    }

    /// Signals shutdown and waits for the worker task to finish.
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        self.tx.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

// ---------------------------------------------------------------------------
// Maintenance
// ---------------------------------------------------------------------------

/// On-demand maintenance requests.
#[derive(Debug)]
pub enum MaintenanceTask {
    /// Expire stale operators, then refresh the snapshot.
    ExpireNow,
    /// Install a snapshot of the currently active operators.
    RefreshSnapshot,
}

/// Keeps the broadcast snapshot in step with the registry.
#[derive(Debug)]
pub struct MaintenanceRunnable {
    registry: Arc<OperatorRegistry>,
    broadcaster: Arc<Broadcaster>,
}

impl MaintenanceRunnable {
    #[must_use]
    pub fn new(registry: Arc<OperatorRegistry>, broadcaster: Arc<Broadcaster>) -> Self {
        Self {
            registry,
            broadcaster,
        }
    }

    /// One sweep: expiry followed by a snapshot refresh.
    ///
    /// # Errors
    ///
    /// Store failures from the registry. The snapshot is left untouched on
    /// error.
    pub async fn sweep(&self) -> Result<u64, RegistryError> {
        let expired = self.registry.expire_operators().await?;
        if !expired.is_empty() {
            debug!(count = expired.len(), "sweep expired operators");
        }
        self.refresh().await
    }

    /// Installs the registry's active operators as a new snapshot.
    ///
    /// # Errors
    ///
    /// Store failures from the registry.
    pub async fn refresh(&self) -> Result<u64, RegistryError> {
        let active = self.registry.active_operators().await?;
        Ok(self.broadcaster.set_active_operators(active))
    }
}

#[async_trait]
impl BackgroundRunnable for MaintenanceRunnable {
    type Task = MaintenanceTask;

    async fn run(&mut self, task: MaintenanceTask) {
        let result = match task {
            MaintenanceTask::ExpireNow => self.sweep().await,
            MaintenanceTask::RefreshSnapshot => self.refresh().await,
        };
        if let Err(err) = result {
            warn!(error = %err, "maintenance task failed");
        }
    }

    async fn on_tick(&mut self) {
        if let Err(err) = self.sweep().await {
            warn!(error = %err, "maintenance sweep failed");
        }
    }

    async fn shutdown(&mut self) {
        info!("maintenance worker stopped");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use avs_core::{ManualClock, OperatorInfo};

    use super::*;
    use crate::config::BroadcastConfig;
    use crate::storage::MemoryOperatorStore;
    use crate::test_support::{addr, RecordingTransport, UnavailableStore};

    const NOW: u64 = 1_700_000_000_000;

    struct CountingRunnable {
        runs: Arc<AtomicU32>,
        ticks: Arc<AtomicU32>,
        shutdowns: Arc<AtomicU32>,
    }

    #[async_trait]
    impl BackgroundRunnable for CountingRunnable {
        type Task = String;

        async fn run(&mut self, _task: String) {
            self.runs.fetch_add(1, Ordering::SeqCst);
        }

        async fn on_tick(&mut self) {
            self.ticks.fetch_add(1, Ordering::SeqCst);
        }

        async fn shutdown(&mut self) {
            self.shutdowns.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn counting() -> (CountingRunnable, Arc<AtomicU32>, Arc<AtomicU32>, Arc<AtomicU32>) {
        let runs = Arc::new(AtomicU32::new(0));
        let ticks = Arc::new(AtomicU32::new(0));
        let shutdowns = Arc::new(AtomicU32::new(0));
        let runnable = CountingRunnable {
            runs: runs.clone(),
            ticks: ticks.clone(),
            shutdowns: shutdowns.clone(),
        };
        (runnable, runs, ticks, shutdowns)
    }

    #[tokio::test]
    async fn start_submit_and_stop() {
        let (runnable, runs, _ticks, shutdowns) = counting();
        let mut worker = BackgroundWorker::start(runnable, Duration::from_secs(60));

        worker.submit("a".to_string()).await.unwrap();
        worker.submit("b".to_string()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 2);

        worker.stop().await;
        assert_eq!(shutdowns.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_follow_interval() {
        let (runnable, _runs, ticks, _shutdowns) = counting();
        let mut worker = BackgroundWorker::start(runnable, Duration::from_secs(15));

        tokio::time::sleep(Duration::from_secs(46)).await;
        worker.stop().await;
        assert_eq!(ticks.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_interval_does_not_panic() {
        let (runnable, _runs, ticks, shutdowns) = counting();
        let mut worker = BackgroundWorker::start(runnable, Duration::ZERO);

        tokio::time::sleep(Duration::from_millis(5)).await;
        worker.stop().await;
        assert!(ticks.load(Ordering::SeqCst) >= 1);
        assert_eq!(shutdowns.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn submit_after_stop_fails() {
        let (runnable, ..) = counting();
        let mut worker = BackgroundWorker::start(runnable, Duration::from_secs(60));
        worker.stop().await;
        assert!(worker.submit("late".to_string()).await.is_err());
    }

    fn maintenance() -> (MaintenanceRunnable, Arc<OperatorRegistry>, Arc<Broadcaster>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(NOW));
        let registry = Arc::new(OperatorRegistry::new(
            Arc::new(MemoryOperatorStore::new()),
            clock.clone(),
            60_000,
        ));
        let broadcaster = Arc::new(Broadcaster::new(
            Arc::new(RecordingTransport::new()),
            BroadcastConfig::default(),
        ));
        (
            MaintenanceRunnable::new(registry.clone(), broadcaster.clone()),
            registry,
            broadcaster,
            clock,
        )
    }

    #[tokio::test]
    async fn sweep_expires_then_refreshes() {
        let (runnable, registry, broadcaster, clock) = maintenance();
        registry
            .add_operator(OperatorInfo::new(addr(1), "h1", NOW - 61_000))
            .await
            .unwrap();
        registry
            .add_operator(OperatorInfo::new(addr(2), "h2", NOW - 5_000))
            .await
            .unwrap();

        let generation = runnable.sweep().await.unwrap();
        assert_eq!(generation, 1);
        let snapshot = broadcaster.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot.get(&addr(2)).is_some());
        assert_eq!(registry.get_operator_addresses().await.unwrap(), vec![addr(2)]);

        clock.advance(Duration::from_secs(60));
        runnable.sweep().await.unwrap();
        assert!(broadcaster.get_active_operators().is_empty());
        assert_eq!(broadcaster.snapshot().generation(), 2);
    }

    #[tokio::test]
    async fn failed_sweep_keeps_snapshot() {
        let broadcaster = Arc::new(Broadcaster::new(
            Arc::new(RecordingTransport::new()),
            BroadcastConfig::default(),
        ));
        broadcaster.set_active_operators(vec![OperatorInfo::new(addr(1), "h1", NOW)]);
        let registry = Arc::new(OperatorRegistry::new(
            Arc::new(UnavailableStore),
            Arc::new(ManualClock::new(NOW)),
            60_000,
        ));
        let runnable = MaintenanceRunnable::new(registry, broadcaster.clone());

        assert!(runnable.sweep().await.is_err());
        assert_eq!(broadcaster.snapshot().generation(), 1);
        assert_eq!(broadcaster.get_active_operators().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn worker_refreshes_on_tick_and_on_demand() {
        let (runnable, registry, broadcaster, _clock) = maintenance();
        let mut worker = BackgroundWorker::start(runnable, Duration::from_secs(15));

        registry
            .add_operator(OperatorInfo::new(addr(1), "h1", NOW))
            .await
            .unwrap();
        worker.submit(MaintenanceTask::RefreshSnapshot).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(broadcaster.snapshot().generation(), 1);

        tokio::time::sleep(Duration::from_secs(15)).await;
        assert_eq!(broadcaster.snapshot().generation(), 2);

        worker.submit(MaintenanceTask::ExpireNow).await.unwrap();
        worker.stop().await;
        assert!(broadcaster.snapshot().generation() >= 2);
        assert_eq!(broadcaster.get_active_operators().len(), 1);
    }
}

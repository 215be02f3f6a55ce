use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::{interval, timeout, Duration, MissedTickBehavior};

use super::ProjectorController;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Drives [`ProjectorController::poll`] on a fixed interval.
pub struct PollScheduler;

/// Handle to a running poll loop
pub struct SchedulerHandle {
    task_handle: tokio::task::JoinHandle<()>,
    stop_tx: mpsc::Sender<()>,
}

impl PollScheduler {
    /// Spawn the poll loop. It runs until [`SchedulerHandle::stop`] or the
    /// handle is dropped.
    pub fn start(controller: Arc<ProjectorController>, period: Duration) -> SchedulerHandle {
        let (stop_tx, stop_rx) = mpsc::channel(1);
        let task_handle = tokio::spawn(Self::poll_loop(controller, period, stop_rx));
        SchedulerHandle { task_handle, stop_tx }
    }

    async fn poll_loop(controller: Arc<ProjectorController>, period: Duration, mut stop_rx: mpsc::Receiver<()>) {
        log::info!("Starting status polling for {} every {:?}", controller.name(), period);

        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The controller already polled once while connecting
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = stop_rx.recv() => {
                    log::info!("Received stop signal for status polling");
                    break;
                }
                _ = ticker.tick() => {
                    controller.poll().await;
                }
            }
        }

        log::info!("Stopped status polling for {}", controller.name());
    }
}

impl SchedulerHandle {
    /// Ask the loop to stop and wait for it, up to two seconds.
    ///
    /// A poll already in progress finishes first.
    pub async fn stop(self) {
        let _ = self.stop_tx.send(()).await;
        if timeout(Duration::from_secs(2), self.task_handle).await.is_err() {
            log::warn!("Status polling did not stop within 2s");
        }
    }
}

use common::ServiceStatus;
use log::{debug, error, warn};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::store::RoomStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DiscoveryProgress {
    pub counter: u64,
    pub done: bool,
}

/// Periodically asks the adapter to broadcast a discovery advertisement.
pub struct DiscoveryBroadcaster {
    store: RoomStore,
    interval: Duration,
}

impl DiscoveryBroadcaster {
    pub fn new(store: RoomStore, interval: Duration) -> Self {
        Self { store, interval }
    }

    /// Starts ticking. Cancellation is only observed between ticks, so a
    /// broadcast in flight always completes.
    pub fn start(self) -> DiscoveryHandle {
        let (progress_tx, progress_rx) = watch::channel(DiscoveryProgress::default());
        let (cancel_tx, mut cancel_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            let mut ticker = interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut counter = 0u64;

            loop {
                tokio::select! {
                    biased;
                    _ = cancel_rx.changed() => {
                        debug!("Discovery cancelled after {} tick(s)", counter);
                        break;
                    }
                    _ = ticker.tick() => {}
                }

                let adapter = match self.store.adapter() {
                    Ok(adapter) => adapter,
                    Err(e) => {
                        error!("Discovery stopped: {}", e);
                        break;
                    }
                };
                if let Err(e) = adapter.send_discovery().await {
                    warn!("Broadcast channel unusable, stopping discovery: {}", e);
                    self.store.update_service_status(ServiceStatus::Down);
                    break;
                }
                counter += 1;
                let _ = progress_tx.send(DiscoveryProgress { counter, done: false });
            }

            let _ = progress_tx.send(DiscoveryProgress { counter, done: true });
            counter
        });

        DiscoveryHandle {
            progress: progress_rx,
            cancel: cancel_tx,
            task,
        }
    }
}

pub struct DiscoveryHandle {
    progress: watch::Receiver<DiscoveryProgress>,
    cancel: watch::Sender<bool>,
    task: JoinHandle<u64>,
}

impl DiscoveryHandle {
    /// Waits for the next progress update. `None` once the final
    /// (`done`) update has been observed.
    pub async fn next(&mut self) -> Option<DiscoveryProgress> {
        if self.progress.borrow().done {
            return None;
        }
        self.progress.changed().await.ok()?;
        let progress = *self.progress.borrow_and_update();
        Some(progress)
    }

    pub fn latest(&self) -> DiscoveryProgress {
        *self.progress.borrow()
    }

    pub fn cancel(&self) {
        let _ = self.cancel.send(true);
    }

    /// Cancels and waits for the loop to wind down. Returns the number of
    /// completed ticks.
    pub async fn stop(self) -> u64 {
        self.cancel();
        self.task.await.unwrap_or_default()
    }
}

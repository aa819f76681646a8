use chrono::{DateTime, Utc};
use common::{DeviceId, DiscoveryConfig, Result, RoomError};
use log::{debug, info};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::dispatcher::on_device_clean_up;
use crate::store::RoomStore;

/// Ages out devices that stopped answering status requests.
pub struct LivenessMonitor {
    store: RoomStore,
    interval: Duration,
    stale_after: chrono::Duration,
}

impl LivenessMonitor {
    pub fn new(store: RoomStore, config: &DiscoveryConfig) -> Result<Self> {
        Self::with_threshold(store, config.liveness_interval, config.stale_after)
    }

    pub fn with_threshold(
        store: RoomStore,
        interval: Duration,
        stale_after: Duration,
    ) -> Result<Self> {
        let stale_after = chrono::Duration::from_std(stale_after)
            .map_err(|e| RoomError::ConfigError(e.to_string()))?;
        Ok(Self {
            store,
            interval,
            stale_after,
        })
    }

    pub fn sweep(&self) -> Vec<DeviceId> {
        self.sweep_at(Utc::now())
    }

    /// Cleans up every device whose last ping is older than the threshold
    /// at `now` and forgets its liveness entry. One lock for the sweep.
    pub fn sweep_at(&self, now: DateTime<Utc>) -> Vec<DeviceId> {
        let stale_after = self.stale_after;
        let stale = self.store.update(|registry| {
            let stale = registry.stale_devices(now, stale_after);
            for device_id in &stale {
                on_device_clean_up(registry, device_id.as_str());
                registry.remove_liveness(device_id.as_str());
            }
            stale
        });
        if !stale.is_empty() {
            info!("Liveness sweep cleaned up {} device(s)", stale.len());
        }
        stale
    }

    /// Sweeps on every interval until the handle is stopped.
    pub fn spawn(self) -> MonitorHandle {
        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(async move {
            let mut ticker = interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx.changed() => break,
                    _ = ticker.tick() => {
                        self.sweep();
                    }
                }
            }
            debug!("Liveness monitor stopped");
        });
        MonitorHandle { shutdown, task }
    }
}

pub struct MonitorHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl MonitorHandle {
    /// Stops future sweeps. A sweep already running completes.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        let _ = self.task.await;
    }
}

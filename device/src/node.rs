use common::{ConnMethod, DiscoveryConfig, Result, RoomMessage, ServiceStatus};
use log::{debug, error, info, warn};
use room::{
    ConnAdapter, DiscoveryBroadcaster, DiscoveryHandle, EventDispatcher, LivenessMonitor,
    MonitorHandle, RoomRepository, RoomStore,
};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::discovery::{DiscoveryListener, UdpAdapter};
use crate::Role;

/// A device taking part in the room protocol over UDP.
pub struct RoomNode {
    store: RoomStore,
    dispatcher: EventDispatcher,
    adapter: Arc<UdpAdapter>,
    config: DiscoveryConfig,
    role: Role,
}

impl RoomNode {
    pub async fn new(
        adapter: Arc<UdpAdapter>,
        repository: Arc<dyn RoomRepository>,
        config: DiscoveryConfig,
        role: Role,
    ) -> Result<Self> {
        let store = RoomStore::new();
        store.sync_database(repository).await?;
        let conn_adapter: Arc<dyn ConnAdapter> = adapter.clone();
        store.update_connection_method(ConnMethod::Udp, Some(conn_adapter));
        let dispatcher = EventDispatcher::with_local_id(store.clone(), adapter.app_id().clone());

        Ok(Self {
            store,
            dispatcher,
            adapter,
            config,
            role,
        })
    }

    pub fn store(&self) -> &RoomStore {
        &self.store
    }

    /// Spawns the listener, the status pinger, the liveness monitor and,
    /// for receivers, discovery broadcasting.
    pub fn start(&self) -> Result<RunningNode> {
        let listener = DiscoveryListener::new(
            self.adapter.clone(),
            self.dispatcher.clone(),
            self.role,
            &self.config,
        )
        .spawn();
        let pinger = spawn_status_pinger(
            self.store.clone(),
            self.adapter.clone(),
            self.config.ping_interval,
        );
        let monitor = LivenessMonitor::new(self.store.clone(), &self.config)?.spawn();
        let discovery = if self.role.receives() {
            let broadcaster =
                DiscoveryBroadcaster::new(self.store.clone(), self.config.discovery_interval);
            Some(broadcaster.start())
        } else {
            None
        };

        info!("Room node started as {}", self.role.as_str());
        Ok(RunningNode {
            store: self.store.clone(),
            adapter: self.adapter.clone(),
            listener,
            pinger,
            monitor,
            discovery,
        })
    }
}

/// Asks every known room for its status so liveness stays fresh.
fn spawn_status_pinger(
    store: RoomStore,
    adapter: Arc<UdpAdapter>,
    every: std::time::Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let rooms = store.get_merged_rooms();
            debug!("Pinging {} room(s)", rooms.len());
            for room in rooms {
                let message = RoomMessage::StatusRequest {
                    app_id: adapter.app_id().clone(),
                };
                let location = &room.location;
                if let Err(e) = adapter.send_to(location.port, &location.address, message) {
                    warn!("Failed to ping {}: {}", room.device_id, e);
                }
            }
        }
    })
}

pub struct RunningNode {
    store: RoomStore,
    adapter: Arc<UdpAdapter>,
    listener: JoinHandle<()>,
    pinger: JoinHandle<()>,
    monitor: MonitorHandle,
    discovery: Option<DiscoveryHandle>,
}

impl RunningNode {
    pub fn store(&self) -> &RoomStore {
        &self.store
    }

    /// Stops every task, then tells the network this device is leaving.
    pub async fn shutdown(self) {
        if let Some(discovery) = self.discovery {
            let ticks = discovery.stop().await;
            debug!("Discovery sent {} advertisement(s)", ticks);
        }
        self.monitor.stop().await;
        self.pinger.abort();
        self.listener.abort();

        if let Err(e) = self.adapter.broadcast_stop().await {
            error!("Failed to broadcast stop: {}", e);
        }
        self.store.update_service_status(ServiceStatus::Down);
        info!("Room node stopped");
    }
}

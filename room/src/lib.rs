//! Presence protocol core: tracks discovered, listened-to and listening
//! rooms on the local network and keeps their liveness.

pub mod adapter;
pub mod registry;
pub mod dispatcher;
pub mod store;
pub mod liveness;
pub mod broadcaster;
pub mod mock;

pub use adapter::{ConnAdapter, RoomRepository};
pub use registry::RoomRegistry;
pub use dispatcher::{EventDispatcher, RoomEvent};
pub use store::RoomStore;
pub use liveness::{LivenessMonitor, MonitorHandle};
pub use broadcaster::{DiscoveryBroadcaster, DiscoveryHandle, DiscoveryProgress};

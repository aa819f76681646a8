mod adapter;
mod listener;

pub use adapter::UdpAdapter;
pub use listener::DiscoveryListener;

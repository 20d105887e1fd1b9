// Network module
//
// Peer discovery and best-effort propagation to other nodes

pub mod discovery;
pub mod propagation;

pub use discovery::{resolve_host, PeerSource, PortScanner, StaticPeers};
pub use propagation::PeerClient;

use log::{debug, warn};

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, TcpStream};
use std::ops::RangeInclusive;
use std::time::Duration;

/// Supplies the addresses of peer nodes
///
/// Discovery is best effort: an implementation returns whatever it found and
/// never fails the caller.
pub trait PeerSource: Send + Sync {
    fn discover(&self) -> Vec<String>;
}

/// A fixed peer list
#[derive(Debug, Clone, Default)]
pub struct StaticPeers {
    peers: Vec<String>,
}

impl StaticPeers {
    pub fn new(peers: Vec<String>) -> Self {
        StaticPeers { peers }
    }
}

impl PeerSource for StaticPeers {
    fn discover(&self) -> Vec<String> {
        self.peers.clone()
    }
}

/// Finds peers by probing nearby hosts and ports with TCP connects
///
/// Candidates share the first three octets of `host`; the last octet is
/// offset by each value in `ip_offsets`, and every port in `ports` is tried.
#[derive(Debug, Clone)]
pub struct PortScanner {
    host: Ipv4Addr,
    port: u16,
    ip_offsets: RangeInclusive<u8>,
    ports: RangeInclusive<u16>,
    timeout: Duration,
}

impl PortScanner {
    pub fn new(host: Ipv4Addr, port: u16, ip_offsets: RangeInclusive<u8>, ports: RangeInclusive<u16>) -> Self {
        PortScanner {
            host,
            port,
            ip_offsets,
            ports,
            timeout: Duration::from_secs(1),
        }
    }

    /// Sets the connect timeout for each probe
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Every address that would be probed, excluding this node
    pub fn candidates(&self) -> Vec<SocketAddrV4> {
        let [a, b, c, last] = self.host.octets();
        let own = SocketAddrV4::new(self.host, self.port);

        let mut candidates = Vec::new();
        for port in self.ports.clone() {
            for offset in self.ip_offsets.clone() {
                let Some(octet) = last.checked_add(offset) else {
                    continue;
                };
                let target = SocketAddrV4::new(Ipv4Addr::new(a, b, c, octet), port);
                if target != own {
                    candidates.push(target);
                }
            }
        }
        candidates
    }

    fn is_found_host(&self, target: SocketAddrV4) -> bool {
        match TcpStream::connect_timeout(&SocketAddr::V4(target), self.timeout) {
            Ok(_) => true,
            Err(err) => {
                debug!("{} {}", target, err);
                false
            }
        }
    }
}

impl PeerSource for PortScanner {
    fn discover(&self) -> Vec<String> {
        self.candidates()
            .into_iter()
            .filter(|target| self.is_found_host(*target))
            .map(|target| target.to_string())
            .collect()
    }
}

/// Parses a dotted IPv4 host, falling back to loopback
pub fn resolve_host(host: &str) -> Ipv4Addr {
    host.parse().unwrap_or_else(|_| {
        warn!("Host {} is not an IPv4 address, using 127.0.0.1", host);
        Ipv4Addr::LOCALHOST
    })
}

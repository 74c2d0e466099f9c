use smoltcp::wire::EthernetAddress;
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Last-seen record for one peer.
#[derive(Clone, Debug)]
pub struct PeerRecord {
    pub ip: Ipv4Addr,
    pub last_seen: Instant,
}

/// Peers observed on any channel, keyed by hardware address.
///
/// Written by every listener loop; response logic never reads it back.
/// Entries live for the whole process, there is no eviction.
#[derive(Clone, Default)]
pub struct PeerRegistry {
    inner: Arc<Mutex<HashMap<EthernetAddress, PeerRecord>>>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upsert a peer, stamping the current time.
    pub fn record_seen(&self, mac: EthernetAddress, ip: Ipv4Addr) {
        let mut peers = self.inner.lock().unwrap();
        peers.insert(
            mac,
            PeerRecord {
                ip,
                last_seen: Instant::now(),
            },
        );
    }

    pub fn lookup(&self, mac: EthernetAddress) -> Option<PeerRecord> {
        self.inner.lock().unwrap().get(&mac).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

use ipnet::Ipv4Net;
use std::net::Ipv4Addr;

/// Hardware address the responder answers with unless one is configured.
/// The synthetic fixture frames embed this value.
pub const DEFAULT_GATEWAY_MAC: [u8; 6] = [0x11, 0x22, 0x33, 0x44, 0x55, 0x66];

/// Listener configuration. Immutable after startup.
#[derive(Clone, Debug)]
pub struct ResponderConfig {
    /// UDP echo port.
    pub udp_port: u16,
    /// TCP line-protocol port (independent address space from UDP).
    pub tcp_port: u16,
    /// Gateway IP the responder answers as.
    pub gateway_ip: Ipv4Addr,
    /// Gateway MAC stamped into crafted replies.
    pub gateway_mac: [u8; 6],
    /// Address pool advertised for guests.
    pub address_pool: Ipv4Net,
}

impl ResponderConfig {
    /// Broadcast probes use the port right above the echo port. Port 0
    /// derives 0 so tests can bind ephemerally.
    pub fn broadcast_port(&self) -> u16 {
        match self.udp_port {
            0 => 0,
            port => port.saturating_add(1),
        }
    }
}

impl Default for ResponderConfig {
    fn default() -> Self {
        Self {
            udp_port: 6969,
            tcp_port: 6969,
            gateway_ip: Ipv4Addr::new(10, 0, 2, 2),
            gateway_mac: DEFAULT_GATEWAY_MAC,
            address_pool: "10.0.2.100/28".parse().unwrap(),
        }
    }
}

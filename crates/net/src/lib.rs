mod classify;
mod config;
mod error;
mod frame;
mod listener;
mod policy;
mod registry;

pub use classify::{Classification, ProtocolHint, TEST_MARKER, TestPattern, classify};
pub use config::{DEFAULT_GATEWAY_MAC, ResponderConfig};
pub use error::NetError;
pub use frame::{
    ETHERNET_HEADER_LEN, arp_reply, decode_ethernet, icmp_echo_reply, is_arp, is_ipv4_icmp,
    source_identity, synthetic_arp_request, synthetic_dhcp_offer, synthetic_icmp_echo_request,
};
pub use listener::Responder;
pub use policy::{
    BROADCAST_MARKER, RESPONSE_PREFIX, broadcast_reply, datagram_reply, stream_reply,
};
pub use registry::{PeerRecord, PeerRegistry};

// The registry and codec expose smoltcp's address type in their APIs.
pub use smoltcp::wire::EthernetAddress;

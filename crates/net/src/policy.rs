//! Per-channel response policies.
//!
//! The datagram channel runs the full classifier; the stream and broadcast
//! channels use their own, simpler textual policies.

use crate::classify::{self, Classification, ProtocolHint, TestPattern};
use crate::frame;

use smoltcp::wire::EthernetAddress;
use std::net::Ipv4Addr;

/// Prefix on the default echo path.
pub const RESPONSE_PREFIX: &[u8] = b"RESPONSE: ";

/// Marker a broadcast probe must start with to be acknowledged.
pub const BROADCAST_MARKER: &[u8] = b"BROADCAST";

const BROADCAST_ACK: &[u8] = b"BROADCAST_RESPONSE from unified responder";
const HTTP_OK: &[u8] = b"HTTP/1.0 200 OK\r\n\r\n<h1>Test Server</h1>";

/// Reply bytes for a datagram, or `None` when nothing should be sent.
///
/// A codec failure on an already-classified frame falls through to the
/// prefixed echo rather than surfacing.
pub fn datagram_reply(
    buf: &[u8],
    hint: ProtocolHint,
    gateway_mac: EthernetAddress,
    gateway_ip: Ipv4Addr,
) -> Option<Vec<u8>> {
    match classify::classify(buf, hint) {
        Classification::Empty => None,
        Classification::RawEcho => Some(buf.to_vec()),
        Classification::Arp => match frame::arp_reply(buf, gateway_mac, gateway_ip) {
            Ok(reply) => Some(reply),
            Err(_) => Some(prefixed_echo(buf)),
        },
        Classification::IcmpEcho => match frame::icmp_echo_reply(buf) {
            Ok(reply) => Some(reply),
            Err(_) => Some(prefixed_echo(buf)),
        },
        Classification::Test(TestPattern::Arp) => Some(frame::synthetic_arp_request()),
        Classification::Test(TestPattern::Ping) => Some(frame::synthetic_icmp_echo_request()),
        Classification::Test(TestPattern::Dhcp) => Some(frame::synthetic_dhcp_offer()),
        Classification::Unclassified => Some(prefixed_echo(buf)),
    }
}

fn prefixed_echo(buf: &[u8]) -> Vec<u8> {
    let mut reply = Vec::with_capacity(RESPONSE_PREFIX.len() + buf.len());
    reply.extend_from_slice(RESPONSE_PREFIX);
    reply.extend_from_slice(buf);
    reply
}

/// Reply for one message on an open stream connection.
///
/// `PING` (exact) answers `PONG`, a `GET /` prefix answers the canned HTTP
/// body regardless of path, everything else comes back upper-cased.
pub fn stream_reply(msg: &[u8]) -> Vec<u8> {
    if msg == b"PING" {
        return b"PONG".to_vec();
    }
    if msg.starts_with(b"GET /") {
        return HTTP_OK.to_vec();
    }
    msg.to_ascii_uppercase()
}

/// Acknowledgement for a broadcast probe, or `None` for anything else.
pub fn broadcast_reply(msg: &[u8]) -> Option<&'static [u8]> {
    msg.starts_with(BROADCAST_MARKER).then_some(BROADCAST_ACK)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_GATEWAY_MAC;

    fn gateway() -> (EthernetAddress, Ipv4Addr) {
        (
            EthernetAddress(DEFAULT_GATEWAY_MAC),
            Ipv4Addr::new(10, 0, 2, 2),
        )
    }

    #[test]
    fn raw_echo_identity() {
        let (mac, ip) = gateway();
        let arp = frame::synthetic_arp_request();
        for payload in [
            b"anything".as_slice(),
            b"\x00\x01\x02".as_slice(),
            arp.as_slice(),
        ] {
            let reply = datagram_reply(payload, ProtocolHint::RawEcho, mac, ip).unwrap();
            assert_eq!(reply, payload);
        }
    }

    #[test]
    fn empty_datagram_gets_no_reply() {
        let (mac, ip) = gateway();
        assert!(datagram_reply(b"", ProtocolHint::RawEcho, mac, ip).is_none());
    }

    #[test]
    fn arp_frame_answered_as_gateway() {
        let (mac, ip) = gateway();
        let request = frame::synthetic_arp_request();
        let reply = datagram_reply(&request, ProtocolHint::Custom, mac, ip).unwrap();
        assert_eq!(reply, frame::arp_reply(&request, mac, ip).unwrap());
    }

    #[test]
    fn test_markers_return_fixtures() {
        let (mac, ip) = gateway();
        assert_eq!(
            datagram_reply(b"TEST_PING_REQUEST", ProtocolHint::Custom, mac, ip).unwrap(),
            frame::synthetic_icmp_echo_request()
        );
        assert_eq!(
            datagram_reply(b"TEST_DHCP_DISCOVER", ProtocolHint::Custom, mac, ip).unwrap(),
            frame::synthetic_dhcp_offer()
        );
    }

    #[test]
    fn default_path_prefixes_the_echo() {
        let (mac, ip) = gateway();
        let reply = datagram_reply(b"hello", ProtocolHint::Custom, mac, ip).unwrap();
        assert_eq!(reply, b"RESPONSE: hello");
    }

    #[test]
    fn stream_ping_is_exact_match() {
        assert_eq!(stream_reply(b"PING"), b"PONG");
        // A prefix is not enough; longer messages take the uppercase path.
        assert_eq!(stream_reply(b"PING extra"), b"PING EXTRA");
    }

    #[test]
    fn stream_get_returns_canned_body() {
        assert_eq!(stream_reply(b"GET / HTTP/1.0\r\n\r\n"), HTTP_OK);
        assert_eq!(stream_reply(b"GET /anything"), HTTP_OK);
    }

    #[test]
    fn stream_default_uppercases() {
        assert_eq!(stream_reply(b"hello"), b"HELLO");
        assert_eq!(stream_reply(b"abc-123!"), b"ABC-123!");
    }

    #[test]
    fn broadcast_probe_acknowledged() {
        assert_eq!(broadcast_reply(b"BROADCAST-PROBE"), Some(BROADCAST_ACK));
        assert_eq!(broadcast_reply(b"BROADCAST"), Some(BROADCAST_ACK));
        assert_eq!(broadcast_reply(b"hello"), None);
    }
}

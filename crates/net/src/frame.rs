//! Frame decode and synthetic reply encode.
//!
//! Decode goes through smoltcp's wire views. Encode splices bytes at fixed
//! offsets: the reply layouts are part of the test contract, so the crafted
//! ARP reply keeps its synthetic field order and the ICMP reply zeroes the
//! IP header checksum instead of recomputing it.

use crate::config::DEFAULT_GATEWAY_MAC;
use crate::error::NetError;

use smoltcp::wire::{EthernetAddress, EthernetFrame, EthernetProtocol, IpProtocol, Ipv4Packet};
use std::net::Ipv4Addr;
use std::ops::Range;

/// Ethernet header: dst MAC, src MAC, ethertype.
pub const ETHERNET_HEADER_LEN: usize = 14;

/// Minimum length of a frame that can carry ARP or IPv4+ICMP.
const MIN_PROTOCOL_FRAME: usize = 42;

const ETH_DST_MAC: Range<usize> = 0..6;
const ETH_SRC_MAC: Range<usize> = 6..12;
const IP_CHECKSUM: Range<usize> = 24..26;
const IP_SRC: Range<usize> = 26..30;
const IP_DST: Range<usize> = 30..34;
const ICMP_TYPE: usize = 34;
const ARP_SENDER_IP: Range<usize> = 28..32;
// Six bytes starting at the ARP sender IP. The crafted reply copies this
// window verbatim into its trailing field.
const ARP_REPLY_TAIL: Range<usize> = 28..34;

const ETHERTYPE_ARP: [u8; 2] = [0x08, 0x06];
const ETHERTYPE_IPV4: [u8; 2] = [0x08, 0x00];

// Hardware type 1, protocol 0x0800, hlen 6, plen 4, then the opcode.
const ARP_REQUEST_HEADER: [u8; 8] = [0x00, 0x01, 0x08, 0x00, 0x06, 0x04, 0x00, 0x01];
const ARP_REPLY_HEADER: [u8; 8] = [0x00, 0x01, 0x08, 0x00, 0x06, 0x04, 0x00, 0x02];

/// Decode the Ethernet header, returning a view over the buffer.
///
/// Fails with [`NetError::TooShort`] for buffers under 14 bytes; the
/// payload view covers everything past the header without copying.
pub fn decode_ethernet(buf: &[u8]) -> Result<EthernetFrame<&[u8]>, NetError> {
    EthernetFrame::new_checked(buf).map_err(|_| NetError::TooShort {
        len: buf.len(),
        min: ETHERNET_HEADER_LEN,
    })
}

/// True iff the buffer is long enough to carry ARP and has the ARP ethertype.
pub fn is_arp(buf: &[u8]) -> bool {
    if buf.len() < MIN_PROTOCOL_FRAME {
        return false;
    }
    let Ok(frame) = EthernetFrame::new_checked(buf) else {
        return false;
    };
    frame.ethertype() == EthernetProtocol::Arp
}

/// True iff the buffer is long enough, carries IPv4, and the IP protocol
/// byte is ICMP. The IP header is otherwise not validated; classification
/// keys on the protocol byte alone.
pub fn is_ipv4_icmp(buf: &[u8]) -> bool {
    if buf.len() < MIN_PROTOCOL_FRAME {
        return false;
    }
    let Ok(frame) = EthernetFrame::new_checked(buf) else {
        return false;
    };
    if frame.ethertype() != EthernetProtocol::Ipv4 {
        return false;
    }
    Ipv4Packet::new_unchecked(frame.payload()).next_header() == IpProtocol::Icmp
}

/// Craft the synthetic ARP reply for a request frame.
///
/// The reply answers as the gateway: the requester's source MAC becomes the
/// target, the gateway MAC and IP fill the sender fields, and the trailing
/// six bytes mirror the request window at offset 28. Output is 44 bytes.
pub fn arp_reply(
    request: &[u8],
    gateway_mac: EthernetAddress,
    gateway_ip: Ipv4Addr,
) -> Result<Vec<u8>, NetError> {
    if !is_arp(request) {
        return Err(NetError::NotArp);
    }
    let requester_mac = &request[ETH_SRC_MAC];

    let mut reply = Vec::with_capacity(44);
    reply.extend_from_slice(requester_mac);
    reply.extend_from_slice(gateway_mac.as_bytes());
    reply.extend_from_slice(&ETHERTYPE_ARP);
    reply.extend_from_slice(&ARP_REPLY_HEADER);
    reply.extend_from_slice(gateway_mac.as_bytes());
    reply.extend_from_slice(&gateway_ip.octets());
    reply.extend_from_slice(requester_mac);
    reply.extend_from_slice(&request[ARP_REPLY_TAIL]);
    Ok(reply)
}

/// Craft an ICMP echo reply by rewriting the request in place.
///
/// Swaps the MAC and IP pairs, flips the ICMP type to Echo Reply, and
/// zeroes the IP header checksum. Every other byte, including the ICMP
/// checksum, carries over from the request. Output length equals input.
pub fn icmp_echo_reply(request: &[u8]) -> Result<Vec<u8>, NetError> {
    if !is_ipv4_icmp(request) {
        return Err(NetError::NotIcmpEcho);
    }
    let mut reply = request.to_vec();
    swap_ranges(&mut reply, ETH_DST_MAC, ETH_SRC_MAC);
    swap_ranges(&mut reply, IP_SRC, IP_DST);
    reply[ICMP_TYPE] = 0;
    reply[IP_CHECKSUM].fill(0);
    Ok(reply)
}

fn swap_ranges(buf: &mut [u8], a: Range<usize>, b: Range<usize>) {
    debug_assert_eq!(a.len(), b.len());
    for (i, j) in a.zip(b) {
        buf.swap(i, j);
    }
}

/// Source MAC plus claimed IPv4 source of a frame, for peer tracking.
///
/// ARP frames report their sender IP, IPv4 frames their source address.
/// Anything shorter than a protocol-bearing frame reports nothing.
pub fn source_identity(buf: &[u8]) -> Option<(EthernetAddress, Ipv4Addr)> {
    if buf.len() < MIN_PROTOCOL_FRAME {
        return None;
    }
    let frame = decode_ethernet(buf).ok()?;
    let ip = match frame.ethertype() {
        EthernetProtocol::Arp => ipv4_at(buf, ARP_SENDER_IP),
        EthernetProtocol::Ipv4 => ipv4_at(buf, IP_SRC),
        _ => return None,
    };
    Some((frame.src_addr(), ip))
}

fn ipv4_at(buf: &[u8], range: Range<usize>) -> Ipv4Addr {
    let octets = &buf[range];
    Ipv4Addr::new(octets[0], octets[1], octets[2], octets[3])
}

/// Canned ARP request, as a guest probing for the gateway would send it.
pub fn synthetic_arp_request() -> Vec<u8> {
    let mut frame = Vec::with_capacity(42);
    frame.extend_from_slice(&[0xff; 6]);
    frame.extend_from_slice(&DEFAULT_GATEWAY_MAC);
    frame.extend_from_slice(&ETHERTYPE_ARP);
    frame.extend_from_slice(&ARP_REQUEST_HEADER);
    frame.extend_from_slice(&DEFAULT_GATEWAY_MAC);
    frame.extend_from_slice(&[10, 0, 2, 2]);
    frame.extend_from_slice(&[0x00; 6]);
    frame.extend_from_slice(&[10, 0, 2, 100]);
    frame
}

/// Canned ICMP echo request from the pool address to the gateway.
pub fn synthetic_icmp_echo_request() -> Vec<u8> {
    let mut frame = Vec::with_capacity(90);
    frame.extend_from_slice(&[0x52, 0x54, 0x00, 0x12, 0x34, 0x56]);
    frame.extend_from_slice(&DEFAULT_GATEWAY_MAC);
    frame.extend_from_slice(&ETHERTYPE_IPV4);
    frame.extend_from_slice(&[
        0x45, 0x00, 0x00, 0x54, 0x00, 0x00, 0x40, 0x00, 0x40, 0x01, 0x00, 0x00,
    ]);
    frame.extend_from_slice(&[10, 0, 2, 100]);
    frame.extend_from_slice(&[10, 0, 2, 2]);
    frame.extend_from_slice(&[0x08, 0x00, 0xf7, 0xff, 0x00, 0x01, 0x00, 0x00]);
    for _ in 0..3 {
        frame.extend_from_slice(b"PING_TEST_PACKET");
    }
    frame
}

/// Canned textual DHCP offer behind an Ethernet header.
pub fn synthetic_dhcp_offer() -> Vec<u8> {
    let mut frame = Vec::new();
    frame.extend_from_slice(&[0xff; 6]);
    frame.extend_from_slice(&DEFAULT_GATEWAY_MAC);
    frame.extend_from_slice(&ETHERTYPE_IPV4);
    frame.extend_from_slice(b"DHCP_OFFER:10.0.2.100/24,GW:10.0.2.2,DNS:10.0.2.3");
    frame
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gateway() -> (EthernetAddress, Ipv4Addr) {
        (
            EthernetAddress([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]),
            Ipv4Addr::new(192, 168, 7, 1),
        )
    }

    #[test]
    fn decode_ethernet_rejects_short_buffers() {
        for len in [0, 1, 13] {
            let buf = vec![0u8; len];
            match decode_ethernet(&buf) {
                Err(NetError::TooShort { len: got, min }) => {
                    assert_eq!(got, len);
                    assert_eq!(min, ETHERNET_HEADER_LEN);
                }
                other => panic!("expected TooShort, got {other:?}"),
            }
        }
    }

    #[test]
    fn decode_ethernet_payload_view() {
        let buf = vec![0u8; 14];
        let frame = decode_ethernet(&buf).unwrap();
        assert!(frame.payload().is_empty());

        let buf = vec![0u8; 20];
        let frame = decode_ethernet(&buf).unwrap();
        assert_eq!(frame.payload().len(), 6);
    }

    #[test]
    fn is_arp_length_boundary() {
        let request = synthetic_arp_request();
        assert_eq!(request.len(), 42);
        assert!(is_arp(&request));

        // Matching ethertype but one byte short of the threshold.
        assert!(!is_arp(&request[..41]));

        let mut not_arp = request.clone();
        not_arp[12..14].copy_from_slice(&ETHERTYPE_IPV4);
        assert!(!is_arp(&not_arp));
    }

    #[test]
    fn is_ipv4_icmp_checks_protocol_byte() {
        let request = synthetic_icmp_echo_request();
        assert!(is_ipv4_icmp(&request));
        assert!(!is_ipv4_icmp(&request[..41]));

        let mut not_icmp = request.clone();
        not_icmp[23] = 17;
        assert!(!is_ipv4_icmp(&not_icmp));

        assert!(!is_ipv4_icmp(&synthetic_arp_request()));
    }

    #[test]
    fn arp_reply_substitutes_gateway() {
        let (gw_mac, gw_ip) = gateway();
        let request = synthetic_arp_request();
        let reply = arp_reply(&request, gw_mac, gw_ip).unwrap();

        assert_eq!(reply.len(), 44);
        // Target MAC is the requester's source MAC.
        assert_eq!(&reply[0..6], &DEFAULT_GATEWAY_MAC);
        assert_eq!(&reply[6..12], gw_mac.as_bytes());
        assert_eq!(&reply[12..14], &ETHERTYPE_ARP);
        assert_eq!(&reply[14..22], &ARP_REPLY_HEADER);
        assert_eq!(&reply[22..28], gw_mac.as_bytes());
        assert_eq!(&reply[28..32], &gw_ip.octets());
        assert_eq!(&reply[32..38], &DEFAULT_GATEWAY_MAC);
        // Trailing field starts with the request's sender IP (10.0.2.2).
        assert_eq!(&reply[38..42], &[10, 0, 2, 2]);
        assert_eq!(&reply[42..44], &[0, 0]);
    }

    #[test]
    fn arp_reply_rejects_non_arp() {
        let (gw_mac, gw_ip) = gateway();
        assert!(matches!(
            arp_reply(b"hello", gw_mac, gw_ip),
            Err(NetError::NotArp)
        ));
        assert!(matches!(
            arp_reply(&synthetic_icmp_echo_request(), gw_mac, gw_ip),
            Err(NetError::NotArp)
        ));
    }

    #[test]
    fn icmp_echo_reply_swaps_and_zeroes() {
        let request = synthetic_icmp_echo_request();
        let reply = icmp_echo_reply(&request).unwrap();

        assert_eq!(reply.len(), request.len());
        assert_eq!(&reply[0..6], &request[6..12]);
        assert_eq!(&reply[6..12], &request[0..6]);
        assert_eq!(&reply[26..30], &request[30..34]);
        assert_eq!(&reply[30..34], &request[26..30]);
        assert_eq!(reply[34], 0);
        assert_eq!(&reply[24..26], &[0, 0]);
        // ICMP checksum carries over untouched.
        assert_eq!(&reply[36..38], &request[36..38]);
        assert_eq!(&reply[42..], &request[42..]);
    }

    #[test]
    fn icmp_echo_reply_swap_involution_type_asymmetry() {
        let request = synthetic_icmp_echo_request();
        let once = icmp_echo_reply(&request).unwrap();
        let twice = icmp_echo_reply(&once).unwrap();

        // Applying the reply twice restores the MAC and IP fields...
        assert_eq!(&twice[0..12], &request[0..12]);
        assert_eq!(&twice[26..34], &request[26..34]);
        // ...but the type byte stays at Echo Reply, it is not restored.
        assert_eq!(request[34], 8);
        assert_eq!(once[34], 0);
        assert_eq!(twice[34], 0);
    }

    #[test]
    fn source_identity_reads_claimed_addresses() {
        let mac = EthernetAddress(DEFAULT_GATEWAY_MAC);

        let (seen_mac, seen_ip) = source_identity(&synthetic_arp_request()).unwrap();
        assert_eq!(seen_mac, mac);
        assert_eq!(seen_ip, Ipv4Addr::new(10, 0, 2, 2));

        let (seen_mac, seen_ip) = source_identity(&synthetic_icmp_echo_request()).unwrap();
        assert_eq!(seen_mac, mac);
        assert_eq!(seen_ip, Ipv4Addr::new(10, 0, 2, 100));

        assert!(source_identity(b"TEST_ARP_REQUEST").is_none());
    }

    #[test]
    fn synthetic_fixture_shapes() {
        assert!(is_arp(&synthetic_arp_request()));

        let ping = synthetic_icmp_echo_request();
        assert_eq!(ping.len(), 90);
        assert_eq!(ping[34], 8);

        let offer = synthetic_dhcp_offer();
        assert_eq!(&offer[0..6], &[0xff; 6]);
        assert!(offer.ends_with(b"DNS:10.0.2.3"));
    }
}

//! Protocol classification for inbound buffers.
//!
//! One buffer maps to exactly one handling path, decided in a fixed
//! precedence order. The caller-declared hint wins over content sniffing,
//! so transports that declare raw echo never reach the frame checks; those
//! branches stay reachable through this entry point for direct callers.

use crate::frame;

/// Marker prefix for the canned test exchanges.
pub const TEST_MARKER: &[u8] = b"TEST_";

/// Protocol a transport declares for the buffers it hands in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProtocolHint {
    RawEcho,
    Arp,
    Ping,
    Dhcp,
    Custom,
}

/// Which canned fixture a `TEST_` buffer asks for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TestPattern {
    Arp,
    Ping,
    Dhcp,
}

/// The single handling path selected for a buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Classification {
    /// Empty buffer, no reply.
    Empty,
    /// Echo the buffer back unchanged.
    RawEcho,
    /// ARP request frame, answer as the gateway.
    Arp,
    /// IPv4 ICMP frame, answer with an echo reply.
    IcmpEcho,
    /// Canned test exchange.
    Test(TestPattern),
    /// Anything else, echoed back behind a marker prefix.
    Unclassified,
}

/// Select the handling path for a buffer, first match wins:
/// empty, declared raw echo, ARP, IPv4+ICMP, `TEST_` markers, default.
pub fn classify(buf: &[u8], hint: ProtocolHint) -> Classification {
    if buf.is_empty() {
        return Classification::Empty;
    }
    if hint == ProtocolHint::RawEcho {
        return Classification::RawEcho;
    }
    if frame::is_arp(buf) {
        return Classification::Arp;
    }
    if frame::is_ipv4_icmp(buf) {
        return Classification::IcmpEcho;
    }
    if buf.starts_with(TEST_MARKER) {
        if contains(buf, b"ARP") {
            return Classification::Test(TestPattern::Arp);
        }
        if contains(buf, b"PING") {
            return Classification::Test(TestPattern::Ping);
        }
        if contains(buf, b"DHCP") {
            return Classification::Test(TestPattern::Dhcp);
        }
    }
    Classification::Unclassified
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|window| window == needle)
}

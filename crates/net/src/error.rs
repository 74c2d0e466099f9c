use std::io;

#[derive(Debug, thiserror::Error)]
pub enum NetError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("frame too short: {len} bytes, need at least {min}")]
    TooShort { len: usize, min: usize },

    #[error("not an ARP frame")]
    NotArp,

    #[error("not an IPv4 ICMP frame")]
    NotIcmpEcho,
}

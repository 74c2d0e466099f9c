use clap::{Parser, Subcommand};
use ipnet::Ipv4Net;
use nicstand_net::{Responder, ResponderConfig};
use std::net::Ipv4Addr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, UdpSocket};
use tokio::time::timeout;

/// Per-probe wait before giving up on a reply.
const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

const DATAGRAM_PROBES: &[&[u8]] = &[
    b"TEST_ARP_REQUEST",
    b"TEST_PING_REQUEST",
    b"Hello from the datagram probe!",
    b"ECHO_TEST_12345",
];

const STREAM_PROBES: &[&[u8]] = &[
    b"PING",
    b"GET / HTTP/1.0\r\n\r\n",
    b"TEST_MESSAGE",
    b"DRIVER_TEST_PACKET",
];

fn parse_mac(s: &str) -> Result<[u8; 6], String> {
    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() != 6 {
        return Err("MAC must be six ':'-separated hex octets".to_string());
    }
    let mut mac = [0u8; 6];
    for (octet, part) in mac.iter_mut().zip(&parts) {
        *octet = u8::from_str_radix(part, 16).map_err(|_| format!("'{part}' is not a hex octet"))?;
    }
    Ok(mac)
}

#[derive(Parser)]
#[command(name = "nicstand")]
#[command(about = "Host-side stand-in for a virtual machine's NIC backend")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the responder until interrupted
    Serve {
        /// UDP echo port
        #[arg(long, default_value_t = 6969)]
        udp_port: u16,

        /// TCP line-protocol port
        #[arg(long, default_value_t = 6969)]
        tcp_port: u16,

        /// Gateway IP to respond as
        #[arg(long, default_value = "10.0.2.2")]
        gateway: Ipv4Addr,

        /// Gateway MAC stamped into crafted replies
        #[arg(long, value_parser = parse_mac, default_value = "11:22:33:44:55:66")]
        gateway_mac: [u8; 6],

        /// Guest address pool (CIDR)
        #[arg(long, default_value = "10.0.2.100/28")]
        pool: Ipv4Net,
    },

    /// Exercise a running responder with the canned probe sets
    Probe {
        /// Responder host
        #[arg(long, default_value = "127.0.0.1")]
        host: Ipv4Addr,

        /// UDP echo port
        #[arg(long, default_value_t = 6969)]
        udp_port: u16,

        /// TCP line-protocol port
        #[arg(long, default_value_t = 6969)]
        tcp_port: u16,
    },

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    if let Err(e) = run().await {
        eprintln!("Error: {e:?}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            udp_port,
            tcp_port,
            gateway,
            gateway_mac,
            pool,
        } => {
            let config = ResponderConfig {
                udp_port,
                tcp_port,
                gateway_ip: gateway,
                gateway_mac,
                address_pool: pool,
            };
            let responder = Responder::bind(config)?;

            tokio::signal::ctrl_c().await?;
            tracing::info!("interrupt received, shutting down");
            responder.shutdown().await;
        }

        Commands::Probe {
            host,
            udp_port,
            tcp_port,
        } => {
            probe_datagram(host, udp_port).await;
            probe_stream(host, tcp_port).await;
        }

        Commands::Version => {
            println!("nicstand {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}

async fn probe_datagram(host: Ipv4Addr, port: u16) {
    println!("Probing datagram channel at {host}:{port}...");

    let socket = match UdpSocket::bind("0.0.0.0:0").await {
        Ok(socket) => socket,
        Err(e) => {
            eprintln!("  bind failed: {e}");
            return;
        }
    };

    let mut buf = [0u8; 2048];
    for probe in DATAGRAM_PROBES {
        if let Err(e) = socket.send_to(probe, (host, port)).await {
            eprintln!("  send failed: {e}");
            continue;
        }
        match timeout(PROBE_TIMEOUT, socket.recv_from(&mut buf)).await {
            Ok(Ok((len, _))) => {
                println!("  sent {} -> got {}", preview(probe), preview(&buf[..len]));
            }
            Ok(Err(e)) => eprintln!("  receive failed: {e}"),
            Err(_) => println!("  sent {} -> timeout", preview(probe)),
        }
    }
}

async fn probe_stream(host: Ipv4Addr, port: u16) {
    println!("Probing stream channel at {host}:{port}...");

    let mut stream = match TcpStream::connect((host, port)).await {
        Ok(stream) => stream,
        Err(e) => {
            eprintln!("  connect failed: {e}");
            return;
        }
    };

    let mut buf = [0u8; 1024];
    for probe in STREAM_PROBES {
        if let Err(e) = stream.write_all(probe).await {
            eprintln!("  send failed: {e}");
            return;
        }
        match timeout(PROBE_TIMEOUT, stream.read(&mut buf)).await {
            Ok(Ok(0)) => {
                eprintln!("  connection closed by responder");
                return;
            }
            Ok(Ok(len)) => {
                println!("  sent {} -> got {}", preview(probe), preview(&buf[..len]));
            }
            Ok(Err(e)) => eprintln!("  receive failed: {e}"),
            Err(_) => println!("  sent {} -> timeout", preview(probe)),
        }
    }
}

/// Printable preview of a possibly-binary payload.
fn preview(bytes: &[u8]) -> String {
    let shown = &bytes[..bytes.len().min(30)];
    let text: String = shown
        .iter()
        .map(|&b| {
            if b.is_ascii_graphic() || b == b' ' {
                b as char
            } else {
                '.'
            }
        })
        .collect();
    if bytes.len() > shown.len() {
        format!("{text}... ({} bytes)", bytes.len())
    } else {
        text
    }
}

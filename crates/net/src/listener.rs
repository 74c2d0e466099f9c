//! The four listener loops: UDP echo, TCP line protocol, UDP broadcast,
//! and the heartbeat.
//!
//! Every loop observes one shared shutdown channel through `select!`, so a
//! blocked receive is abandoned the moment shutdown is signalled. A failure
//! inside one loop (or one connection) terminates only its owner and is
//! logged; sibling loops keep running.

use crate::classify::ProtocolHint;
use crate::config::ResponderConfig;
use crate::error::NetError;
use crate::frame;
use crate::policy;
use crate::registry::PeerRegistry;

use smoltcp::wire::EthernetAddress;
use socket2::{Domain, Protocol, Socket, Type};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio::sync::{Semaphore, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

/// Receive buffer for the datagram channels.
const DATAGRAM_BUF: usize = 2048;

/// Receive buffer for one stream message.
const STREAM_BUF: usize = 1024;

/// Listen backlog for the stream channel.
const STREAM_BACKLOG: i32 = 5;

/// Upper bound on datagram workers in flight at once.
const MAX_INFLIGHT_DATAGRAMS: usize = 64;

/// Heartbeat period.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10);

/// The running responder: four listener loops plus their shared state.
///
/// `bind` brings up every socket before any loop starts, so a port clash
/// fails the whole responder rather than one silent channel.
pub struct Responder {
    registry: PeerRegistry,
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
    udp_addr: SocketAddr,
    tcp_addr: SocketAddr,
    broadcast_addr: SocketAddr,
    heartbeat_ticks: Arc<AtomicU64>,
}

impl Responder {
    /// Bind all three sockets and spawn the listener loops.
    ///
    /// Must run inside a tokio runtime. Port 0 binds ephemerally; the
    /// actual addresses are available from the accessors.
    pub fn bind(config: ResponderConfig) -> Result<Self, NetError> {
        let udp = bind_udp(config.udp_port, false)?;
        let broadcast = bind_udp(config.broadcast_port(), true)?;
        let tcp = bind_tcp(config.tcp_port)?;

        let udp_addr = udp.local_addr()?;
        let tcp_addr = tcp.local_addr()?;
        let broadcast_addr = broadcast.local_addr()?;

        info!(
            udp = %udp_addr,
            tcp = %tcp_addr,
            broadcast = %broadcast_addr,
            gateway = %config.gateway_ip,
            pool = %config.address_pool,
            "responder listening"
        );

        let registry = PeerRegistry::new();
        let heartbeat_ticks = Arc::new(AtomicU64::new(0));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let tasks = vec![
            tokio::spawn(datagram_loop(
                Arc::new(udp),
                config.clone(),
                registry.clone(),
                shutdown_rx.clone(),
            )),
            tokio::spawn(stream_loop(tcp, shutdown_rx.clone())),
            tokio::spawn(broadcast_loop(broadcast, shutdown_rx.clone())),
            tokio::spawn(heartbeat_loop(heartbeat_ticks.clone(), shutdown_rx)),
        ];

        Ok(Self {
            registry,
            shutdown_tx,
            tasks,
            udp_addr,
            tcp_addr,
            broadcast_addr,
            heartbeat_ticks,
        })
    }

    pub fn udp_addr(&self) -> SocketAddr {
        self.udp_addr
    }

    pub fn tcp_addr(&self) -> SocketAddr {
        self.tcp_addr
    }

    pub fn broadcast_addr(&self) -> SocketAddr {
        self.broadcast_addr
    }

    pub fn registry(&self) -> &PeerRegistry {
        &self.registry
    }

    pub fn heartbeat_ticks(&self) -> u64 {
        self.heartbeat_ticks.load(Ordering::Relaxed)
    }

    /// Signal every loop and wait for them to finish. Each loop closes its
    /// own socket on exit; per-connection tasks observe the same signal.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        for task in self.tasks {
            let _ = task.await;
        }
        debug!("responder stopped");
    }
}

fn bind_udp(port: u16, broadcast: bool) -> Result<UdpSocket, NetError> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    if broadcast {
        socket.set_broadcast(true)?;
    }
    let addr = SocketAddr::from(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port));
    socket.bind(&addr.into())?;
    socket.set_nonblocking(true)?;
    let std_socket: std::net::UdpSocket = socket.into();
    Ok(UdpSocket::from_std(std_socket)?)
}

fn bind_tcp(port: u16) -> Result<TcpListener, NetError> {
    let socket = Socket::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    let addr = SocketAddr::from(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port));
    socket.bind(&addr.into())?;
    socket.listen(STREAM_BACKLOG)?;
    socket.set_nonblocking(true)?;
    let std_listener: std::net::TcpListener = socket.into();
    Ok(TcpListener::from_std(std_listener)?)
}

async fn datagram_loop(
    socket: Arc<UdpSocket>,
    config: ResponderConfig,
    registry: PeerRegistry,
    mut shutdown: watch::Receiver<bool>,
) {
    let workers = Arc::new(Semaphore::new(MAX_INFLIGHT_DATAGRAMS));
    let gateway_mac = EthernetAddress(config.gateway_mac);
    let gateway_ip = config.gateway_ip;
    let mut buf = vec![0u8; DATAGRAM_BUF];

    loop {
        let received = tokio::select! {
            _ = shutdown.changed() => break,
            received = socket.recv_from(&mut buf) => received,
        };
        let (len, peer) = match received {
            Ok(pair) => pair,
            Err(e) => {
                warn!(error = %e, "datagram receive failed");
                break;
            }
        };

        let permit = tokio::select! {
            _ = shutdown.changed() => break,
            permit = workers.clone().acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
        };

        let datagram = buf[..len].to_vec();
        let socket = socket.clone();
        let registry = registry.clone();
        tokio::spawn(async move {
            let _permit = permit;
            handle_datagram(&socket, &registry, &datagram, peer, gateway_mac, gateway_ip).await;
        });
    }
    debug!("datagram loop stopped");
}

async fn handle_datagram(
    socket: &UdpSocket,
    registry: &PeerRegistry,
    datagram: &[u8],
    peer: SocketAddr,
    gateway_mac: EthernetAddress,
    gateway_ip: Ipv4Addr,
) {
    trace!(%peer, len = datagram.len(), "datagram received");

    if let Some((mac, ip)) = frame::source_identity(datagram) {
        registry.record_seen(mac, ip);
    }

    let Some(reply) =
        policy::datagram_reply(datagram, ProtocolHint::RawEcho, gateway_mac, gateway_ip)
    else {
        return;
    };

    // Best effort, no retry.
    if let Err(e) = socket.send_to(&reply, peer).await {
        warn!(%peer, error = %e, "datagram reply failed");
    }
}

async fn stream_loop(listener: TcpListener, mut shutdown: watch::Receiver<bool>) {
    loop {
        let accepted = tokio::select! {
            _ = shutdown.changed() => break,
            accepted = listener.accept() => accepted,
        };
        match accepted {
            Ok((stream, peer)) => {
                debug!(%peer, "stream connection accepted");
                tokio::spawn(stream_connection(stream, peer, shutdown.clone()));
            }
            Err(e) => {
                warn!(error = %e, "stream accept failed");
                break;
            }
        }
    }
    debug!("stream loop stopped");
}

/// One accepted connection: a sequential read/reply loop, so replies on a
/// connection are strictly ordered against its own messages.
async fn stream_connection(
    mut stream: TcpStream,
    peer: SocketAddr,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut buf = vec![0u8; STREAM_BUF];
    loop {
        let read = tokio::select! {
            _ = shutdown.changed() => break,
            read = stream.read(&mut buf) => read,
        };
        match read {
            // Clean close from the peer, not an error.
            Ok(0) => {
                debug!(%peer, "stream peer closed");
                break;
            }
            Ok(len) => {
                let reply = policy::stream_reply(&buf[..len]);
                if let Err(e) = stream.write_all(&reply).await {
                    warn!(%peer, error = %e, "stream reply failed");
                    break;
                }
            }
            Err(e) => {
                warn!(%peer, error = %e, "stream read failed");
                break;
            }
        }
    }
}

async fn broadcast_loop(socket: UdpSocket, mut shutdown: watch::Receiver<bool>) {
    let mut buf = vec![0u8; DATAGRAM_BUF];
    loop {
        let received = tokio::select! {
            _ = shutdown.changed() => break,
            received = socket.recv_from(&mut buf) => received,
        };
        let (len, peer) = match received {
            Ok(pair) => pair,
            Err(e) => {
                warn!(error = %e, "broadcast receive failed");
                break;
            }
        };

        let Some(ack) = policy::broadcast_reply(&buf[..len]) else {
            continue;
        };
        match socket.send_to(ack, peer).await {
            Ok(_) => debug!(%peer, "broadcast probe acknowledged"),
            Err(e) => warn!(%peer, error = %e, "broadcast reply failed"),
        }
    }
    debug!("broadcast loop stopped");
}

/// Periodic internal tick; a placeholder for future announcements.
async fn heartbeat_loop(ticks: Arc<AtomicU64>, mut shutdown: watch::Receiver<bool>) {
    let mut interval = tokio::time::interval(HEARTBEAT_INTERVAL);
    // The first tick of a fresh interval completes immediately.
    interval.tick().await;
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = interval.tick() => {
                let tick = ticks.fetch_add(1, Ordering::Relaxed) + 1;
                trace!(tick, "heartbeat");
            }
        }
    }
    debug!("heartbeat loop stopped");
}

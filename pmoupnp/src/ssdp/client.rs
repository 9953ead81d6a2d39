//! SSDP control point socket

use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, Type};
use tracing::{debug, info, trace, warn};

use super::message::{SsdpMessage, parse_message};
use super::{SSDP_MULTICAST_ADDR, SSDP_PORT};

const MULTICAST_GROUP: Ipv4Addr = Ipv4Addr::new(239, 255, 255, 250);

/// Sends M-SEARCH requests and receives announcements.
///
/// Reception is blocking with a one second timeout so a dedicated thread
/// can poll a stop flag between datagrams.
pub struct SsdpClient {
    socket: UdpSocket,
    user_agent: String,
}

impl SsdpClient {
    pub fn new(user_agent: &str) -> io::Result<Self> {
        let raw = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        raw.set_reuse_address(true)?;
        let bind_addr = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0));
        raw.bind(&bind_addr.into())?;

        let socket: UdpSocket = raw.into();
        socket.set_read_timeout(Some(Duration::from_secs(1)))?;
        socket.set_multicast_loop_v4(true)?;

        // Join the group on every IPv4 interface so NOTIFYs from any LAN reach us.
        for iface in get_if_addrs::get_if_addrs()? {
            if let IpAddr::V4(ipv4) = iface.ip() {
                if ipv4.is_loopback() {
                    continue;
                }
                match socket.join_multicast_v4(&MULTICAST_GROUP, &ipv4) {
                    Ok(()) => debug!("SSDP: joined {} on {} ({})", SSDP_MULTICAST_ADDR, ipv4, iface.name),
                    Err(e) => warn!("SSDP: cannot join {} on {}: {}", SSDP_MULTICAST_ADDR, ipv4, e),
                }
            }
        }

        info!("✅ SSDP client ready on {}", socket.local_addr()?);

        Ok(Self {
            socket,
            user_agent: user_agent.to_string(),
        })
    }

    /// Multicasts an M-SEARCH for `search_target`.
    pub fn search(&self, search_target: &str, mx: u32) -> io::Result<()> {
        let mx = mx.max(1);
        let request = format!(
            "M-SEARCH * HTTP/1.1\r\n\
             HOST: {}:{}\r\n\
             MAN: \"ssdp:discover\"\r\n\
             MX: {}\r\n\
             ST: {}\r\n\
             USER-AGENT: {}\r\n\
             \r\n",
            SSDP_MULTICAST_ADDR, SSDP_PORT, mx, search_target, self.user_agent
        );

        let group = SocketAddr::V4(SocketAddrV4::new(MULTICAST_GROUP, SSDP_PORT));
        self.socket.send_to(request.as_bytes(), group)?;
        debug!("📤 M-SEARCH sent (ST={}, MX={})", search_target, mx);
        Ok(())
    }

    /// Receives datagrams until `stop` is raised, handing every parsed
    /// announcement to `on_message`.
    pub fn listen<F>(&self, stop: &AtomicBool, mut on_message: F)
    where
        F: FnMut(SsdpMessage),
    {
        let mut buf = [0u8; 8192];
        while !stop.load(Ordering::Relaxed) {
            match self.socket.recv_from(&mut buf) {
                Ok((n, from)) => {
                    let data = String::from_utf8_lossy(&buf[..n]);
                    match parse_message(&data, from) {
                        Some(message) => on_message(message),
                        None => trace!("Unhandled SSDP datagram from {}", from),
                    }
                }
                Err(e)
                    if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {}
                Err(e) => {
                    warn!("❌ SSDP read error: {}", e);
                    std::thread::sleep(Duration::from_millis(200));
                }
            }
        }
        debug!("SSDP listener stopped");
    }
}

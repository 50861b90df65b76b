use std::net::{IpAddr, Ipv4Addr, SocketAddr, SocketAddrV4};

use tokio::net::UdpSocket;
use tracing::{debug, info, trace, warn};

use crate::config::{InterfaceSelection, TransportConfig};
use crate::error::TransportError;
use crate::packet::PacketFrame;

/// Interface name prefixes checked in order of preference: wired transports
///  first, since multicast does not work well on wireless networks.
const WIRED_PREFIXES: [&str; 3] = ["eth", "enp", "en"];
const WIRELESS_PREFIXES: [&str; 3] = ["wlan", "wlp", "wl"];

/// Owns the multicast socket and its group join/leave lifecycle, and reads
///  datagrams into fresh frames.
///
/// The receiver is owned exclusively by the transport worker; nothing else
///  touches the socket.
pub struct MulticastReceiver {
    socket: UdpSocket,
    /// `Some((group, interface))` while joined; the group is left on drop
    joined: Option<(Ipv4Addr, Ipv4Addr)>,
    mtu: usize,
}

impl MulticastReceiver {
    /// Sets up the socket and joins the multicast group on the configured or
    ///  auto-detected interface. A non-multicast group address skips the join and
    ///  plainly binds the port.
    pub fn join(config: &TransportConfig) -> Result<MulticastReceiver, TransportError> {
        let bind_addr = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, config.port));

        let raw_socket = socket2::Socket::new(
            socket2::Domain::IPV4,
            socket2::Type::DGRAM,
            Some(socket2::Protocol::UDP),
        )?;
        raw_socket.set_nonblocking(true)?;
        raw_socket.set_reuse_address(true)?;
        #[cfg(unix)]
        raw_socket.set_reuse_port(true)?;
        raw_socket.bind(&bind_addr.into())?;

        let socket = UdpSocket::from_std(raw_socket.into())?;

        let joined = if config.group_addr.is_multicast() {
            let interface_addr = resolve_interface(&config.interface);
            socket.join_multicast_v4(config.group_addr, interface_addr)?;
            info!(
                "joined multicast group {} on port {} via interface {}",
                config.group_addr, config.port, interface_addr
            );
            Some((config.group_addr, interface_addr))
        }
        else {
            debug!(
                "{} is not a multicast address - receiving plain UDP on port {}",
                config.group_addr, config.port
            );
            None
        };

        Ok(MulticastReceiver {
            socket,
            joined,
            mtu: config.mtu,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Performs one blocking receive into a fresh MTU-sized frame.
    pub async fn recv_frame(&self) -> std::io::Result<PacketFrame> {
        let mut frame = PacketFrame::new(self.mtu);
        let (len, from) = self.socket.recv_from(frame.recv_buf()).await?;
        frame.set_received_len(len);
        trace!("received {} byte datagram from {:?}", len, from);
        Ok(frame)
    }
}

impl Drop for MulticastReceiver {
    fn drop(&mut self) {
        if let Some((group, interface)) = self.joined.take() {
            debug!("leaving multicast group {}", group);
            if let Err(e) = self.socket.leave_multicast_v4(group, interface) {
                warn!("could not leave multicast group {}: {}", group, e);
            }
        }
    }
}

/// Resolves the configured interface selection to the IPv4 address the group is
///  joined on. Failure to resolve an explicitly named interface falls back to
///  auto-detection rather than failing the join.
fn resolve_interface(selection: &InterfaceSelection) -> Ipv4Addr {
    match selection {
        InterfaceSelection::Named(name) => match interface_addr_by_name(name) {
            Some(addr) => {
                debug!("using configured interface {} ({})", name, addr);
                addr
            }
            None => {
                warn!("configured interface {:?} not found - falling back to auto-detection", name);
                auto_detect_interface()
            }
        },
        InterfaceSelection::Auto => auto_detect_interface(),
    }
}

/// Wired-preferred auto-detection: the first interface matching a wired name
///  prefix, then wireless, then the first non-loopback interface, and finally
///  `0.0.0.0` which lets the OS pick its default interface.
fn auto_detect_interface() -> Ipv4Addr {
    let interfaces = match local_ip_address::list_afinet_netifas() {
        Ok(interfaces) => interfaces,
        Err(e) => {
            warn!("could not enumerate network interfaces: {}", e);
            return Ipv4Addr::UNSPECIFIED;
        }
    };

    let candidates: Vec<(&str, Ipv4Addr)> = interfaces
        .iter()
        .filter_map(|(name, ip)| match ip {
            IpAddr::V4(v4) if !v4.is_loopback() => Some((name.as_str(), *v4)),
            _ => None,
        })
        .collect();

    for prefix in WIRED_PREFIXES.iter().chain(&WIRELESS_PREFIXES) {
        if let Some((name, addr)) = candidates.iter().find(|(name, _)| name.starts_with(prefix)) {
            debug!("auto-detected multicast interface {} ({})", name, addr);
            return *addr;
        }
    }

    if let Some((name, addr)) = candidates.first() {
        debug!("falling back to first non-loopback interface {} ({})", name, addr);
        return *addr;
    }

    debug!("no usable interface found - using the default interface");
    Ipv4Addr::UNSPECIFIED
}

fn interface_addr_by_name(name: &str) -> Option<Ipv4Addr> {
    let interfaces = local_ip_address::list_afinet_netifas().ok()?;
    interfaces.into_iter().find_map(|(if_name, ip)| match ip {
        IpAddr::V4(v4) if if_name == name => Some(v4),
        _ => None,
    })
}

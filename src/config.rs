use std::net::Ipv4Addr;
use std::time::Duration;

use anyhow::bail;

use crate::packet::DEFAULT_PAYLOAD_TYPES;

/// Which local interface the multicast group is joined on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterfaceSelection {
    /// Auto-detect, preferring wired over wireless transports since multicast
    ///  tends to work poorly on wireless networks.
    Auto,
    /// An explicit interface name, e.g. `eth0`. If the name cannot be resolved
    ///  to an address, the join falls back to the default interface rather than
    ///  failing.
    Named(String),
}

/// Configuration for one stream transport instance.
pub struct TransportConfig {
    /// The multicast group to join. A non-multicast address is accepted and
    ///  simply bound without a group join, which is how the tests drive the
    ///  transport over loopback.
    pub group_addr: Ipv4Addr,
    pub port: u16,
    pub interface: InterfaceSelection,

    /// Per-datagram receive buffer size. One buffer of this size is allocated per
    ///  received datagram; datagrams larger than this are truncated by the OS, so
    ///  this should be the full Ethernet MTU unless the network uses jumbo frames.
    pub mtu: usize,

    /// Maximum number of out-of-order frames held back waiting for a gap to fill.
    ///  When the buffer is full, the lowest-sequence frame is force-delivered and
    ///  the gap is treated as permanent loss.
    pub reorder_capacity: usize,

    /// Capacity of the handoff queue between the receive worker and the reader.
    ///  The worker never blocks on this queue; frames arriving while it is full
    ///  are dropped.
    pub queue_capacity: usize,

    /// How long a read waits for a frame before returning an empty result. Kept
    ///  short so a stalled stream shows up as "no data yet, retry" rather than a
    ///  blocked consumer thread.
    pub poll_timeout: Duration,

    /// The RTP payload types accepted during classification. Defaults to the
    ///  MPEG-TS / MPEG video / MPEG audio profiles.
    pub payload_types: Vec<u8>,
}

impl TransportConfig {
    pub fn new(group_addr: Ipv4Addr, port: u16) -> TransportConfig {
        TransportConfig {
            group_addr,
            port,
            interface: InterfaceSelection::Auto,
            mtu: 1500,
            reorder_capacity: 256,
            queue_capacity: 512,
            poll_timeout: Duration::from_millis(50),
            payload_types: DEFAULT_PAYLOAD_TYPES.to_vec(),
        }
    }

    /// Parses an `rtp://address:port` or `udp://address:port` target, the form
    ///  playlist entries use for multicast channels.
    pub fn from_url(url: &str) -> anyhow::Result<TransportConfig> {
        let rest = url
            .strip_prefix("rtp://")
            .or_else(|| url.strip_prefix("udp://"))
            .ok_or_else(|| anyhow::anyhow!("unsupported scheme in {:?}", url))?;

        let (host, port) = match rest.rsplit_once(':') {
            Some((host, port)) if !host.is_empty() => (host, port),
            _ => bail!("missing address or port in {:?}", url),
        };

        let group_addr: Ipv4Addr = host
            .parse()
            .map_err(|_| anyhow::anyhow!("invalid address in {:?}", url))?;
        let port: u16 = port
            .parse()
            .map_err(|_| anyhow::anyhow!("invalid port in {:?}", url))?;

        Ok(TransportConfig::new(group_addr, port))
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.mtu < 576 {
            bail!("mtu {} is smaller than any realistic datagram", self.mtu);
        }
        if self.reorder_capacity < 2 {
            bail!("reorder capacity must be at least 2");
        }
        if self.queue_capacity < 1 {
            bail!("queue capacity must be at least 1");
        }
        if self.poll_timeout.is_zero() {
            bail!("poll timeout must be non-zero");
        }
        if self.payload_types.is_empty() {
            bail!("payload type allow-list must not be empty");
        }
        Ok(())
    }
}

//! Host address discovery.

use std::net::{IpAddr, Ipv4Addr, UdpSocket};

use tracing::debug;

/// Any routable address; nothing is sent to it.
const PROBE_ADDR: &str = "8.8.8.8:80";

/// The address other machines on the LAN can reach this host at.
///
/// Connecting a UDP socket only selects the outbound interface, no packet
/// leaves the machine. Falls back to loopback when there is no route.
pub fn lan_ip() -> IpAddr {
    probe_local_addr(PROBE_ADDR).unwrap_or_else(|| {
        debug!("No outbound route, using loopback address");
        IpAddr::V4(Ipv4Addr::LOCALHOST)
    })
}

fn probe_local_addr(target: &str) -> Option<IpAddr> {
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect(target).ok()?;
    let ip = socket.local_addr().ok()?.ip();
    (!ip.is_unspecified()).then_some(ip)
}

//! The socket fabric: one UDP socket per (interface, address family,
//! multicast group), joined to that group with loopback delivery left on
//! so a node can see its own announcements in integration tests, the
//! same way `udp_server` in the teacher bound one socket and looped on
//! `recv_from`/`send_to` — just replicated per interface here.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use socket2::{Domain, Protocol as SockProtocol, Socket, Type};
use tokio::net::UdpSocket;
use tracing::{debug, warn};

use crate::collaborators::Interface;
use crate::error::{MdnsError, Result};

pub const MDNS_PORT: u16 = 5353;
pub const MDNS_GROUP_V4: Ipv4Addr = Ipv4Addr::new(224, 0, 0, 251);
pub const MDNS_GROUP_V6: Ipv6Addr = Ipv6Addr::new(0xff02, 0, 0, 0, 0, 0, 0, 0xfb);
const MULTICAST_TTL: u32 = 255;

/// One bound, joined, ready-to-use mDNS socket on a single interface.
pub struct SocketBinding {
    pub interface_name: String,
    pub local_addr: IpAddr,
    /// Subnet prefix length, used by [`SocketBinding::in_scope`] to drop
    /// responses sourced from a different subnet than the interface this
    /// socket is bound to (spec §4.3, invariant I6).
    pub prefix_len: u8,
    pub socket: UdpSocket,
}

impl SocketBinding {
    /// Whether a peer at `addr` is within this binding's own subnet, so a
    /// multi-homed node doesn't cross-pollinate answers between unrelated
    /// links.
    pub fn in_scope(&self, addr: IpAddr) -> bool {
        same_subnet(self.local_addr, self.prefix_len, addr)
    }
}

fn same_subnet(local: IpAddr, prefix_len: u8, peer: IpAddr) -> bool {
    match (local, peer) {
        (IpAddr::V4(local), IpAddr::V4(peer)) => {
            let mask = if prefix_len == 0 {
                0
            } else {
                u32::MAX << (32 - prefix_len as u32)
            };
            (u32::from(local) & mask) == (u32::from(peer) & mask)
        }
        (IpAddr::V6(local), IpAddr::V6(peer)) => {
            let mask = if prefix_len == 0 {
                0
            } else {
                u128::MAX << (128 - prefix_len as u32)
            };
            (u128::from(local) & mask) == (u128::from(peer) & mask)
        }
        _ => false,
    }
}

fn new_v4_socket(iface_addr: Ipv4Addr) -> Result<Socket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(SockProtocol::UDP))
        .map_err(|e| MdnsError::BindFailed(e.to_string()))?;
    socket
        .set_reuse_address(true)
        .map_err(|e| MdnsError::BindFailed(e.to_string()))?;
    #[cfg(unix)]
    socket
        .set_reuse_port(true)
        .map_err(|e| MdnsError::BindFailed(e.to_string()))?;
    socket
        .set_nonblocking(true)
        .map_err(|e| MdnsError::BindFailed(e.to_string()))?;
    socket
        .bind(&SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), MDNS_PORT).into())
        .map_err(|e| MdnsError::BindFailed(e.to_string()))?;
    socket
        .join_multicast_v4(&MDNS_GROUP_V4, &iface_addr)
        .map_err(|e| MdnsError::BindFailed(e.to_string()))?;
    socket
        .set_multicast_loop_v4(true)
        .map_err(|e| MdnsError::BindFailed(e.to_string()))?;
    socket
        .set_multicast_ttl_v4(MULTICAST_TTL)
        .map_err(|e| MdnsError::BindFailed(e.to_string()))?;
    Ok(socket)
}

fn new_v6_socket(iface_index: u32) -> Result<Socket> {
    let socket = Socket::new(Domain::IPV6, Type::DGRAM, Some(SockProtocol::UDP))
        .map_err(|e| MdnsError::BindFailed(e.to_string()))?;
    socket
        .set_reuse_address(true)
        .map_err(|e| MdnsError::BindFailed(e.to_string()))?;
    #[cfg(unix)]
    socket
        .set_reuse_port(true)
        .map_err(|e| MdnsError::BindFailed(e.to_string()))?;
    socket
        .set_only_v6(true)
        .map_err(|e| MdnsError::BindFailed(e.to_string()))?;
    socket
        .set_nonblocking(true)
        .map_err(|e| MdnsError::BindFailed(e.to_string()))?;
    socket
        .bind(&SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), MDNS_PORT).into())
        .map_err(|e| MdnsError::BindFailed(e.to_string()))?;
    socket
        .join_multicast_v6(&MDNS_GROUP_V6, iface_index)
        .map_err(|e| MdnsError::BindFailed(e.to_string()))?;
    socket
        .set_multicast_loop_v6(true)
        .map_err(|e| MdnsError::BindFailed(e.to_string()))?;
    Ok(socket)
}

/// Binds one joined socket per non-loopback interface supplied, for the
/// address family(ies) requested. If any bind fails, every socket opened
/// so far in this call is dropped before returning the error — a partial
/// fabric is never left running (spec §7, `BIND_FAILED`).
pub fn bind_fabric(
    interfaces: &[Interface],
    want_v4: bool,
    want_v6: bool,
) -> Result<Vec<SocketBinding>> {
    let mut bindings = Vec::new();

    for iface in interfaces.iter().filter(|i| !i.is_loopback) {
        let result = match iface.addr {
            IpAddr::V4(addr) if want_v4 => new_v4_socket(addr).map(Some),
            IpAddr::V6(_) if want_v6 => {
                // if-addrs doesn't hand back a scope id; 0 lets the OS
                // pick the default interface for the join, which is
                // correct on a single-homed v6 link and documented as a
                // known limitation for multi-homed v6 hosts.
                new_v6_socket(0).map(Some)
            }
            _ => Ok(None),
        };

        match result {
            Ok(Some(socket)) => {
                let tokio_socket = UdpSocket::from_std(socket.into())
                    .map_err(|e| MdnsError::BindFailed(e.to_string()))?;
                debug!(interface = %iface.name, addr = %iface.addr, "bound mDNS socket");
                bindings.push(SocketBinding {
                    interface_name: iface.name.clone(),
                    local_addr: iface.addr,
                    prefix_len: iface.prefix_len,
                    socket: tokio_socket,
                });
            }
            Ok(None) => {}
            Err(e) => {
                warn!(interface = %iface.name, error = %e, "bind failed, tearing down fabric");
                return Err(e);
            }
        }
    }

    Ok(bindings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_scope_matches_same_v4_subnet() {
        let local: IpAddr = "192.168.1.10".parse().unwrap();
        assert!(same_subnet(local, 24, "192.168.1.200".parse().unwrap()));
        assert!(!same_subnet(local, 24, "10.0.0.5".parse().unwrap()));
    }

    #[test]
    fn in_scope_rejects_mismatched_families() {
        let local: IpAddr = "192.168.1.10".parse().unwrap();
        assert!(!same_subnet(local, 24, "fe80::1".parse().unwrap()));
    }
}

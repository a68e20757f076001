//! Socket construction strategies for datagram receivers.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};

use socket2::{Domain, Protocol, Socket, Type};

use super::ReceiverError;

/// How a receiver obtains its bound socket.
///
/// The receive loop is identical for every variant; only socket setup differs.
pub trait SocketStrategy: fmt::Display + Send + 'static {
    /// Create, configure and bind the socket.
    fn open(&self) -> Result<UdpSocket, ReceiverError>;
}

/// Build a UDP socket with `SO_REUSEADDR` and bind it.
///
/// Address reuse lets the unicast and multicast receivers share port 514.
/// Each socket only sees groups it joined itself, so a datagram sent to a
/// group reaches the multicast receiver alone.
fn bind_reusable(addr: SocketAddr) -> Result<Socket, ReceiverError> {
    let bind_err = |source: std::io::Error| ReceiverError::Bind { addr, source };

    let socket =
        Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP)).map_err(bind_err)?;
    socket.set_reuse_address(true).map_err(bind_err)?;
    if addr.is_ipv6() {
        socket.set_only_v6(true).map_err(bind_err)?;
    }
    joined_groups_only(&socket, addr).map_err(bind_err)?;
    socket.bind(&addr.into()).map_err(bind_err)?;
    Ok(socket)
}

/// Turn off `IP_MULTICAST_ALL`, which otherwise delivers every group joined
/// anywhere on the host to any socket bound to the wildcard address.
#[cfg(target_os = "linux")]
fn joined_groups_only(socket: &Socket, addr: SocketAddr) -> std::io::Result<()> {
    match addr {
        SocketAddr::V4(_) => socket.set_multicast_all_v4(false),
        SocketAddr::V6(_) => socket.set_multicast_all_v6(false),
    }
}

#[cfg(not(target_os = "linux"))]
fn joined_groups_only(_socket: &Socket, _addr: SocketAddr) -> std::io::Result<()> {
    Ok(())
}

/// Where a multicast receiver binds.
///
/// Unix filters on the bound address, so binding the group keeps unicast
/// datagrams for the shared port away from this socket. Windows only
/// accepts a local address here.
fn multicast_bind_addr(group: IpAddr, port: u16) -> SocketAddr {
    if cfg!(unix) {
        SocketAddr::new(group, port)
    } else {
        match group {
            IpAddr::V4(_) => SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port),
            IpAddr::V6(_) => SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), port),
        }
    }
}

/// Plain unicast socket bound to an address and port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnicastSocket {
    bind: SocketAddr,
}

impl UnicastSocket {
    /// Bind to all IPv4 interfaces on `port`.
    pub fn new(port: u16) -> Self {
        Self {
            bind: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port),
        }
    }

    /// Bind to a specific address.
    pub fn with_bind(bind: SocketAddr) -> Self {
        Self { bind }
    }
}

impl fmt::Display for UnicastSocket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unicast {}", self.bind)
    }
}

impl SocketStrategy for UnicastSocket {
    fn open(&self) -> Result<UdpSocket, ReceiverError> {
        Ok(bind_reusable(self.bind)?.into())
    }
}

/// Socket bound to a port that joins a multicast group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MulticastSocket {
    group: IpAddr,
    port: u16,
    interface: Ipv4Addr,
    ipv6_interface: u32,
}

impl MulticastSocket {
    /// Join `group` on `port` using the default interface.
    ///
    /// # Errors
    ///
    /// Returns [`ReceiverError::NotMulticast`] if `group` is not a multicast address.
    pub fn new(group: IpAddr, port: u16) -> Result<Self, ReceiverError> {
        Self::with_interface(group, port, Ipv4Addr::UNSPECIFIED)
    }

    /// Join `group` on `port` via a specific IPv4 interface address.
    ///
    /// `interface` only applies to IPv4 groups; see
    /// [`with_ipv6_interface`](Self::with_ipv6_interface) for IPv6.
    pub fn with_interface(
        group: IpAddr,
        port: u16,
        interface: Ipv4Addr,
    ) -> Result<Self, ReceiverError> {
        if !group.is_multicast() {
            return Err(ReceiverError::NotMulticast(group));
        }
        Ok(Self {
            group,
            port,
            interface,
            ipv6_interface: 0,
        })
    }

    /// Join an IPv6 group on the interface with this index (0 lets the
    /// kernel choose).
    pub fn with_ipv6_interface(mut self, index: u32) -> Self {
        self.ipv6_interface = index;
        self
    }

    /// The multicast group address.
    pub fn group(&self) -> IpAddr {
        self.group
    }

    /// Interface index used for IPv6 groups.
    pub fn ipv6_interface(&self) -> u32 {
        self.ipv6_interface
    }
}

impl fmt::Display for MulticastSocket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "multicast {}:{}", self.group, self.port)
    }
}

impl SocketStrategy for MulticastSocket {
    fn open(&self) -> Result<UdpSocket, ReceiverError> {
        let join_err = |source: std::io::Error| ReceiverError::Join {
            group: self.group,
            source,
        };

        let socket: UdpSocket = bind_reusable(multicast_bind_addr(self.group, self.port))?.into();
        match self.group {
            IpAddr::V4(group) => socket.join_multicast_v4(&group, &self.interface),
            IpAddr::V6(group) => socket.join_multicast_v6(&group, self.ipv6_interface),
        }
        .map_err(join_err)?;
        Ok(socket)
    }
}

use std::{
    fs, io,
    net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs as _},
    path::Path,
};

#[cfg(unix)]
use mio::net::UnixDatagram;
use mio::{net::UdpSocket, Interest, Registry, Token};
use tracing::trace;

use crate::{Error, SourceAddr, Transport};

/// A bound, non-blocking packet socket.
pub(crate) enum PacketSocket {
    Udp(UdpSocket),

    #[cfg(unix)]
    Unixgram(UnixDatagram),
}

impl PacketSocket {
    /// Binds a socket for the given transport.
    ///
    /// For UDP transports, `address` is `<host>:<port>`. For `unixgram`, it is the path of the socket file, which must
    /// not already exist.
    pub fn bind(transport: Transport, address: &str) -> io::Result<Self> {
        match transport {
            Transport::Udp | Transport::Udp4 | Transport::Udp6 => {
                let mut last_err = None;
                for addr in resolve_udp(transport, address)? {
                    match UdpSocket::bind(addr) {
                        Ok(socket) => return Ok(PacketSocket::Udp(socket)),
                        Err(e) => {
                            trace!(%addr, error = %e, "Failed to bind candidate address.");
                            last_err = Some(e);
                        }
                    }
                }

                Err(last_err.unwrap_or_else(|| no_candidates(transport, address)))
            }

            #[cfg(unix)]
            Transport::Unixgram => UnixDatagram::bind(address).map(PacketSocket::Unixgram),

            #[cfg(not(unix))]
            Transport::Unixgram => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "unix domain sockets are not supported on this platform",
            )),
        }
    }

    /// Receives a single datagram into `buf`, returning the number of bytes read and the sender.
    pub fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SourceAddr)> {
        match self {
            PacketSocket::Udp(socket) => socket.recv_from(buf).map(|(n, addr)| (n, addr.into())),

            #[cfg(unix)]
            PacketSocket::Unixgram(socket) => socket.recv_from(buf).map(|(n, addr)| (n, addr.into())),
        }
    }

    /// Returns the address the socket is bound to.
    pub fn local_addr(&self) -> io::Result<SourceAddr> {
        match self {
            PacketSocket::Udp(socket) => socket.local_addr().map(SourceAddr::from),

            #[cfg(unix)]
            PacketSocket::Unixgram(socket) => socket.local_addr().map(SourceAddr::from),
        }
    }

    pub fn register(&mut self, registry: &Registry, token: Token) -> io::Result<()> {
        match self {
            PacketSocket::Udp(socket) => registry.register(socket, token, Interest::READABLE),

            #[cfg(unix)]
            PacketSocket::Unixgram(socket) => registry.register(socket, token, Interest::READABLE),
        }
    }

    pub fn deregister(&mut self, registry: &Registry) -> io::Result<()> {
        match self {
            PacketSocket::Udp(socket) => registry.deregister(socket),

            #[cfg(unix)]
            PacketSocket::Unixgram(socket) => registry.deregister(socket),
        }
    }
}

/// Resolves a UDP listen address into the candidates that match the transport's address family.
///
/// An empty host binds the wildcard address: `0.0.0.0` for `udp4`, `[::]` for `udp6`, and for `udp` a dual-stack
/// `[::]` first, falling back to `0.0.0.0` where IPv6 is unavailable. For a named host over `udp`, IPv4 candidates are
/// tried before IPv6 ones.
fn resolve_udp(transport: Transport, address: &str) -> io::Result<Vec<SocketAddr>> {
    let (host, port) = address
        .rsplit_once(':')
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "missing port in address"))?;

    if host.is_empty() {
        let port = port
            .parse::<u16>()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, format!("invalid port '{port}': {e}")))?;
        let v4 = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port);
        let v6 = SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), port);
        return Ok(match transport {
            Transport::Udp4 => vec![v4],
            Transport::Udp6 => vec![v6],
            _ => vec![v6, v4],
        });
    }

    let mut candidates = address.to_socket_addrs()?.collect::<Vec<_>>();
    candidates.retain(|addr| match transport {
        Transport::Udp4 => addr.is_ipv4(),
        Transport::Udp6 => addr.is_ipv6(),
        _ => true,
    });
    candidates.sort_by_key(SocketAddr::is_ipv6);

    if candidates.is_empty() {
        return Err(no_candidates(transport, address));
    }

    Ok(candidates)
}

fn no_candidates(transport: Transport, address: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::AddrNotAvailable,
        format!("no {transport} address found for '{address}'"),
    )
}

/// Removes the socket file at `path`, if any.
///
/// A missing file is not an error.
pub(crate) fn remove_socket_file(path: &Path) -> Result<(), Error> {
    match fs::remove_file(path) {
        Ok(()) => {
            trace!(path = %path.display(), "Removed socket file.");
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(Error::RemoveSocket { path: path.to_path_buf(), source }),
    }
}

//! Helpers for exercising a receiver in tests.
//!
//! These are not meant for production use: the client sends exactly what it is given, with no batching or retries.
use std::{
    fmt, io,
    net::{Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs as _, UdpSocket},
    path::PathBuf,
};

#[cfg(unix)]
use std::os::unix::net::UnixDatagram;

use crate::{SourceAddr, Transport};

enum Connection {
    Udp(UdpSocket),

    #[cfg(unix)]
    Unixgram(UnixDatagram),
}

/// A minimal StatsD client that writes raw lines to a receiver.
pub struct StatsDTestClient {
    transport: Transport,
    address: String,
    conn: Option<Connection>,
}

impl StatsDTestClient {
    /// Creates a client connected to `address` over `transport`.
    ///
    /// `udp`, `udp4` and `udp6` take a `<host>:<port>` address, and `unixgram` takes the path of the receiver's socket.
    ///
    /// # Errors
    ///
    /// If the transport is unknown, or the client cannot connect, an error is returned.
    pub fn new(transport: &str, address: &str) -> io::Result<Self> {
        let transport = Transport::parse(transport).ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, format!("unknown/unsupported transport: {transport}"))
        })?;

        let mut client = StatsDTestClient { transport, address: address.to_string(), conn: None };
        client.connect()?;
        Ok(client)
    }

    fn connect(&mut self) -> io::Result<()> {
        let conn = match self.transport {
            Transport::Udp | Transport::Udp4 | Transport::Udp6 => {
                let target = self
                    .address
                    .to_socket_addrs()?
                    .find(|addr| match self.transport {
                        Transport::Udp4 => addr.is_ipv4(),
                        Transport::Udp6 => addr.is_ipv6(),
                        _ => true,
                    })
                    .ok_or_else(|| {
                        io::Error::new(
                            io::ErrorKind::AddrNotAvailable,
                            format!("no {} address found for '{}'", self.transport, self.address),
                        )
                    })?;
                let local = match (target.is_ipv4(), target.ip().is_loopback()) {
                    (true, true) => SocketAddr::from((Ipv4Addr::LOCALHOST, 0)),
                    (true, false) => SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)),
                    (false, true) => SocketAddr::from((Ipv6Addr::LOCALHOST, 0)),
                    (false, false) => SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0)),
                };

                let socket = UdpSocket::bind(local)?;
                socket.connect(target)?;
                Connection::Udp(socket)
            }

            #[cfg(unix)]
            Transport::Unixgram => {
                let socket = UnixDatagram::unbound()?;
                socket.connect(&self.address)?;
                Connection::Unixgram(socket)
            }

            #[cfg(not(unix))]
            Transport::Unixgram => {
                return Err(io::Error::new(
                    io::ErrorKind::Unsupported,
                    "unix domain sockets are not supported on this platform",
                ))
            }
        };

        self.conn = Some(conn);
        Ok(())
    }

    /// Returns the address the client sends from, as the receiver will see it.
    ///
    /// # Errors
    ///
    /// If the client is disconnected, or the address cannot be queried, an error is returned.
    pub fn local_addr(&self) -> io::Result<SourceAddr> {
        match self.conn.as_ref().ok_or_else(not_connected)? {
            Connection::Udp(socket) => socket.local_addr().map(SourceAddr::from),

            #[cfg(unix)]
            Connection::Unixgram(socket) => socket.local_addr().map(SourceAddr::from),
        }
    }

    /// Sends a single metric as its own datagram.
    ///
    /// # Errors
    ///
    /// If the client is disconnected, or the datagram cannot be sent, an error is returned.
    pub fn send_metric(&self, metric: &TestMetric) -> io::Result<()> {
        self.send_raw(metric.to_string().as_bytes())
            .map_err(|e| io::Error::new(e.kind(), format!("send metric on test client: {e}")))
    }

    /// Sends `payload` as-is, as a single datagram.
    ///
    /// # Errors
    ///
    /// If the client is disconnected, or the datagram cannot be sent, an error is returned.
    pub fn send_raw(&self, payload: &[u8]) -> io::Result<()> {
        let sent = match self.conn.as_ref().ok_or_else(not_connected)? {
            Connection::Udp(socket) => socket.send(payload)?,

            #[cfg(unix)]
            Connection::Unixgram(socket) => socket.send(payload)?,
        };

        if sent == payload.len() {
            Ok(())
        } else {
            Err(io::Error::new(io::ErrorKind::WriteZero, format!("sent {sent} of {} bytes", payload.len())))
        }
    }

    /// Closes the connection.
    ///
    /// Sending after disconnecting fails with [`io::ErrorKind::NotConnected`].
    pub fn disconnect(&mut self) {
        self.conn = None;
    }
}

fn not_connected() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "test client is disconnected")
}

/// A metric to be sent by a [`StatsDTestClient`], formatted as `<name>:<value>|<type>`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TestMetric {
    /// Metric name.
    pub name: String,

    /// Metric value, as it should appear on the wire.
    pub value: String,

    /// Metric type, such as `c`, `g`, `ms` or `h`.
    pub kind: String,
}

impl TestMetric {
    /// Creates a new `TestMetric`.
    pub fn new(name: impl Into<String>, value: impl Into<String>, kind: impl Into<String>) -> Self {
        TestMetric { name: name.into(), value: value.into(), kind: kind.into() }
    }
}

impl fmt::Display for TestMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}|{}", self.name, self.value, self.kind)
    }
}

/// Returns a fresh path, in the system temporary directory, suitable for binding a Unix socket.
///
/// The file is not created.
pub fn temporary_socket_path() -> PathBuf {
    let name = rand::random::<[u8; 10]>().iter().map(|b| format!("{b:02x}")).collect::<String>();
    std::env::temp_dir().join(name)
}

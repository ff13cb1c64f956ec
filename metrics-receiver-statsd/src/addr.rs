use std::{fmt, net::SocketAddr, path::PathBuf};

const UNIX_PLACEHOLDER: &str = "UDS";

/// The address a datagram was received from.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SourceAddr {
    /// A UDP peer.
    Udp(SocketAddr),

    /// A Unix datagram peer, identified by the path of its socket.
    Unixgram(PathBuf),
}

impl SourceAddr {
    /// Returns the placeholder address used for Unix datagram peers that did not bind a path.
    ///
    /// Unbound Unix datagram sockets have no name, so the receiver tags their datagrams with this address instead so
    /// that downstream code always has something to log or key by.
    pub fn unix_placeholder() -> Self {
        SourceAddr::Unixgram(PathBuf::from(UNIX_PLACEHOLDER))
    }

    /// Returns the name of the network the address belongs to: `udp` or `unixgram`.
    pub const fn network(&self) -> &'static str {
        match self {
            SourceAddr::Udp(_) => "udp",
            SourceAddr::Unixgram(_) => "unixgram",
        }
    }
}

impl From<SocketAddr> for SourceAddr {
    fn from(addr: SocketAddr) -> Self {
        SourceAddr::Udp(addr)
    }
}

#[cfg(unix)]
impl From<std::os::unix::net::SocketAddr> for SourceAddr {
    fn from(addr: std::os::unix::net::SocketAddr) -> Self {
        addr.as_pathname()
            .map_or_else(SourceAddr::unix_placeholder, |path| SourceAddr::Unixgram(path.to_path_buf()))
    }
}

impl fmt::Display for SourceAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceAddr::Udp(addr) => fmt::Display::fmt(addr, f),
            SourceAddr::Unixgram(path) => fmt::Display::fmt(&path.display(), f),
        }
    }
}

/// A single StatsD line, along with the address of the peer that sent it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Metric {
    /// The trimmed, non-empty line.
    pub line: String,

    /// The peer the line was received from.
    pub addr: SourceAddr,
}

impl Metric {
    /// Creates a new `Metric`.
    pub fn new(line: impl Into<String>, addr: SourceAddr) -> Self {
        Metric { line: line.into(), addr }
    }
}

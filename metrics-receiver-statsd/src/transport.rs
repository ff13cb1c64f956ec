use std::{fmt, str::FromStr};

use crate::Error;

/// A transport supported by the receiver.
///
/// Every transport is currently packet-based: each datagram carries one or more complete StatsD lines. The
/// classification predicates exist so that stream-based transports can be told apart without changing call sites.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Transport {
    /// UDP over either IPv4 or IPv6.
    Udp,

    /// UDP over IPv4 only.
    Udp4,

    /// UDP over IPv6 only.
    Udp6,

    /// Unix domain socket in `SOCK_DGRAM` mode.
    Unixgram,
}

impl Transport {
    /// Parses a transport from its canonical name.
    ///
    /// The match is exact and case-sensitive. `None` is returned for anything that is not one of `udp`, `udp4`, `udp6`
    /// or `unixgram`, and callers are expected to check for it.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "udp" => Some(Transport::Udp),
            "udp4" => Some(Transport::Udp4),
            "udp6" => Some(Transport::Udp6),
            "unixgram" => Some(Transport::Unixgram),
            _ => None,
        }
    }

    /// Returns the canonical, lowercase name of the transport.
    pub const fn as_str(self) -> &'static str {
        match self {
            Transport::Udp => "udp",
            Transport::Udp4 => "udp4",
            Transport::Udp6 => "udp6",
            Transport::Unixgram => "unixgram",
        }
    }

    /// Returns `true` if the transport delivers discrete datagrams.
    pub const fn is_packet_transport(self) -> bool {
        match self {
            Transport::Udp | Transport::Udp4 | Transport::Udp6 | Transport::Unixgram => true,
        }
    }

    /// Returns `true` if the transport is backed by a Unix domain socket, and so by a file on disk.
    pub const fn is_unix_transport(self) -> bool {
        matches!(self, Transport::Unixgram)
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Transport {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Transport::parse(s).ok_or_else(|| Error::UnsupportedTransport { transport: s.to_string() })
    }
}

/// Returns the canonical name of a possibly-invalid transport, or an empty string if it is invalid.
pub fn transport_name(transport: Option<Transport>) -> &'static str {
    transport.map_or("", Transport::as_str)
}

/// Returns `true` if the possibly-invalid transport is a valid, packet-based transport.
pub fn is_packet_transport(transport: Option<Transport>) -> bool {
    transport.is_some_and(Transport::is_packet_transport)
}

/// Returns `true` if the possibly-invalid transport is a valid, Unix domain transport.
pub fn is_unix_transport(transport: Option<Transport>) -> bool {
    transport.is_some_and(Transport::is_unix_transport)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    const ALL: [Transport; 4] = [Transport::Udp, Transport::Udp4, Transport::Udp6, Transport::Unixgram];

    #[test]
    fn parse_known_names() {
        for transport in ALL {
            assert_eq!(Transport::parse(transport.as_str()), Some(transport));
            assert_eq!(transport.to_string(), transport.as_str());
            assert!(transport.is_packet_transport());
        }
    }

    #[test]
    fn only_unixgram_is_unix() {
        assert!(Transport::Unixgram.is_unix_transport());
        assert!(!Transport::Udp.is_unix_transport());
        assert!(!Transport::Udp4.is_unix_transport());
        assert!(!Transport::Udp6.is_unix_transport());
    }

    #[test]
    fn parse_is_case_sensitive() {
        assert_eq!(Transport::parse("UDP"), None);
        assert_eq!(Transport::parse(" udp"), None);
        assert_eq!(Transport::parse(""), None);
        assert_eq!(Transport::parse("tcp"), None);
        assert_eq!(Transport::parse("unix"), None);
    }

    #[test]
    fn from_str_reports_unsupported_name() {
        let err = "quic".parse::<Transport>().unwrap_err();
        assert!(matches!(err, Error::UnsupportedTransport { ref transport } if transport == "quic"));
        assert_eq!("udp6".parse::<Transport>().unwrap(), Transport::Udp6);
    }

    #[test]
    fn invalid_sentinel() {
        assert_eq!(transport_name(None), "");
        assert!(!is_packet_transport(None));
        assert!(!is_unix_transport(None));
        assert_eq!(transport_name(Some(Transport::Unixgram)), "unixgram");
        assert!(is_unix_transport(Some(Transport::Unixgram)));
    }

    proptest! {
        #[test]
        fn unknown_names_are_invalid(name in "[a-z0-9]{0,10}") {
            prop_assume!(!["udp", "udp4", "udp6", "unixgram"].contains(&name.as_str()));

            let transport = Transport::parse(&name);
            prop_assert_eq!(transport, None);
            prop_assert!(!is_packet_transport(transport));
            prop_assert!(!is_unix_transport(transport));
            prop_assert_eq!(transport_name(transport), "");
        }
    }
}

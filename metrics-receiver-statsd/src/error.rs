use std::{io, path::PathBuf};

use thiserror::Error;

/// Errors that could occur while binding, serving, or closing a packet server.
#[derive(Debug, Error)]
pub enum Error {
    /// The transport is unknown, or is not packet-based.
    #[error("unsupported packet transport '{transport}'")]
    UnsupportedTransport {
        /// Name of the rejected transport.
        transport: String,
    },

    /// A Unix socket file could not be removed.
    #[error("removing socket '{}' failed: {source}", .path.display())]
    RemoveSocket {
        /// Path of the socket file.
        path: PathBuf,

        /// Underlying filesystem error.
        source: io::Error,
    },

    /// The socket could not be bound to the listen address.
    #[error("starting to listen {transport} on '{address}': {source}")]
    Bind {
        /// Name of the transport being bound.
        transport: &'static str,

        /// Listen address that was requested.
        address: String,

        /// Underlying socket error.
        source: io::Error,
    },

    /// The consumer or the reporter was not provided when starting to serve.
    #[error("invalid nil parameters for listen and serve")]
    InvalidParameters,

    /// Another caller is already serving this server.
    #[error("server is already serving")]
    AlreadyServing,

    /// Reading from the socket failed with an error that is not transient.
    #[error("reading from socket failed: {0}")]
    Read(#[source] io::Error),

    /// The transfer channel was disconnected, so lines can no longer be forwarded.
    #[error("transfer channel disconnected")]
    ChannelClosed,

    /// The server was closed.
    #[error("server closed")]
    Closed,

    /// Releasing the socket failed.
    #[error("closing socket failed: {0}")]
    Close(#[source] io::Error),

    /// Several errors occurred during cleanup.
    #[error("{}", join(.0))]
    Multiple(Vec<Error>),
}

impl Error {
    /// Collapses a list of errors into a single result.
    ///
    /// No errors gives `Ok(())`, a single error is returned as-is, and anything more is wrapped in
    /// [`Error::Multiple`].
    pub(crate) fn aggregate(mut errors: Vec<Error>) -> Result<(), Error> {
        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(Error::Multiple(errors)),
        }
    }
}

fn join(errors: &[Error]) -> String {
    errors.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

/// Classification of a socket read error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadErrorClass {
    /// Expected to resolve on its own: the read can be retried immediately.
    Transient,

    /// Ends the serve loop.
    Fatal,
}

impl ReadErrorClass {
    /// Returns the label used for this class in telemetry.
    pub const fn as_str(self) -> &'static str {
        match self {
            ReadErrorClass::Transient => "transient",
            ReadErrorClass::Fatal => "fatal",
        }
    }
}

/// Classifies a socket read error.
///
/// Timeouts, including the `WouldBlock` that some platforms report for an expired receive timeout, and interrupted
/// calls are transient. Everything else is fatal.
pub fn classify(err: &io::Error) -> ReadErrorClass {
    match err.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted => {
            ReadErrorClass::Transient
        }
        _ => ReadErrorClass::Fatal,
    }
}

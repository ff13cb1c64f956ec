use metrics::{counter, Counter};

use crate::{error::ReadErrorClass, Transport};

/// Receiver telemetry.
///
/// `Telemetry` tracks what the serve loop reads off the socket. The counters are registered against whatever global
/// recorder is installed, and are no-ops when there is none.
pub struct Telemetry {
    packets_received: Counter,
    bytes_received: Counter,
    lines_received: Counter,
    read_errors_transient: Counter,
    read_errors_fatal: Counter,
}

impl Telemetry {
    /// Creates a `Telemetry` instance.
    pub fn new(transport: Transport) -> Self {
        let base_labels = telemetry_tags!("transport" => transport.as_str());
        let transient_labels = telemetry_tags!(
            "transport" => transport.as_str(),
            "class" => ReadErrorClass::Transient.as_str()
        );
        let fatal_labels = telemetry_tags!(
            "transport" => transport.as_str(),
            "class" => ReadErrorClass::Fatal.as_str()
        );

        Self {
            packets_received: counter!("statsd_receiver.packets_received", base_labels.iter()),
            bytes_received: counter!("statsd_receiver.bytes_received", base_labels.iter()),
            lines_received: counter!("statsd_receiver.lines_received", base_labels.iter()),
            read_errors_transient: counter!("statsd_receiver.read_errors", transient_labels.iter()),
            read_errors_fatal: counter!("statsd_receiver.read_errors", fatal_labels.iter()),
        }
    }

    /// Tracks a datagram that was read from the socket.
    pub fn track_packet(&self, bytes_len: usize, lines: usize) {
        self.packets_received.increment(1);
        self.bytes_received.increment(bytes_len as u64);
        self.lines_received.increment(lines as u64);
    }

    /// Tracks a failed read.
    pub fn track_read_error(&self, class: ReadErrorClass) {
        match class {
            ReadErrorClass::Transient => self.read_errors_transient.increment(1),
            ReadErrorClass::Fatal => self.read_errors_fatal.increment(1),
        }
    }
}

macro_rules! _telemetry_tags {
    ($($k:literal => $v:expr),*) => {
        [
            ::metrics::Label::from_static_parts("receiver_version", env!("CARGO_PKG_VERSION")),
            $(::metrics::Label::from_static_parts($k, $v),)*
        ]
    };
}

pub(crate) use _telemetry_tags as telemetry_tags;

//! A packet-based receiver for [StatsD][statsd] metric lines.
//!
//! [statsd]: https://github.com/statsd/statsd/blob/master/docs/metric_types.md
//!
//! The receiver is the network-facing ingress of a metrics pipeline: it binds a UDP or Unix datagram socket, reads
//! datagrams, splits them into lines, and hands each line, along with the address it came from, to a channel. Parsing
//! the lines into metrics is left to whatever drains the channel.
//!
//! # Usage
//!
//! ```no_run
//! # use std::{sync::Arc, thread};
//! # use metrics_receiver_statsd::{Metric, PacketServer, TracingReporter, Transport};
//! // Bind the server. Any stale socket file is removed first when listening on a Unix socket.
//! let server = Arc::new(PacketServer::new(Transport::Udp, "127.0.0.1:8125").expect("failed to bind"));
//!
//! // The channel is bounded: when it fills up, the server stops reading until it drains.
//! let (tx, rx) = crossbeam_channel::bounded::<Metric>(1024);
//!
//! let serving = Arc::clone(&server);
//! let handle = thread::spawn(move || {
//!     let consumer = |metric: Metric| println!("{} from {}", metric.line, metric.addr);
//!     serving.listen_and_serve(Some(&consumer), Some(&TracingReporter), &tx)
//! });
//!
//! for metric in rx.iter().take(10) {
//!     println!("received '{}' from {}", metric.line, metric.addr);
//! }
//!
//! // Closing the server from another thread makes `listen_and_serve` return.
//! server.close().expect("failed to close");
//! let _ = handle.join();
//! ```
//!
//! # Transports
//!
//! The receiver listens on `udp`, `udp4`, `udp6`, or `unixgram` (a Unix domain socket in `SOCK_DGRAM` mode). A single
//! datagram may hold any number of newline-separated lines; blank lines and surrounding whitespace are dropped.
//!
//! Unix datagram peers that never bound a path have no address, so their lines are tagged with a placeholder address
//! instead.
//!
//! # Errors
//!
//! Read timeouts are reported to the [`Reporter`] and retried. Any other read error ends
//! [`listen_and_serve`][PacketServer::listen_and_serve], and it is up to the caller to decide whether that is an
//! expected shutdown or a fault.
//!
//! # Telemetry
//!
//! When enabled, the server counts the packets, bytes, and lines it receives and the read errors it sees, under the
//! `statsd_receiver` namespace, using whichever recorder is installed for the [`metrics`] facade.

#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#![deny(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg), deny(rustdoc::broken_intra_doc_links))]

mod addr;
pub use self::addr::{Metric, SourceAddr};

mod error;
pub use self::error::{classify, Error, ReadErrorClass};

mod framing;
pub use self::framing::split_lines;

mod reporter;
pub use self::reporter::{MetricsConsumer, Reporter, TracingReporter};

mod server;
pub use self::server::{PacketServer, PacketServerBuilder, MAX_DATAGRAM_LEN};

mod socket;
mod telemetry;

#[cfg(any(test, feature = "test-util"))]
#[cfg_attr(docsrs, doc(cfg(feature = "test-util")))]
pub mod test_util;

mod transport;
pub use self::transport::{is_packet_transport, is_unix_transport, transport_name, Transport};

use std::{
    io,
    path::Path,
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};

use crossbeam_channel::Sender;
use mio::{Events, Poll, Registry, Token, Waker};
use parking_lot::Mutex;
use tracing::{debug, info, trace};

use crate::{
    error::{classify, ReadErrorClass},
    framing::split_lines,
    socket::{remove_socket_file, PacketSocket},
    telemetry::Telemetry,
    Error, Metric, MetricsConsumer, Reporter, SourceAddr, Transport,
};

const SOCKET: Token = Token(0);
const WAKER: Token = Token(1);
const EVENTS_CAPACITY: usize = 16;

/// Largest UDP payload that can be carried over IPv6, and the default read buffer size.
pub const MAX_DATAGRAM_LEN: usize = 65527;

const DEFAULT_LISTEN_ADDRESS: &str = "localhost:8125";

/// Builder for a [`PacketServer`].
pub struct PacketServerBuilder {
    transport: Transport,
    address: String,
    buffer_size: usize,
    read_timeout: Option<Duration>,
    telemetry: bool,
}

impl PacketServerBuilder {
    /// Set the transport to listen on.
    ///
    /// Defaults to [`Transport::Udp`].
    #[must_use]
    pub fn with_transport(mut self, transport: Transport) -> Self {
        self.transport = transport;
        self
    }

    /// Set the transport to listen on by its name: `udp`, `udp4`, `udp6` or `unixgram`.
    ///
    /// # Errors
    ///
    /// If the name does not match a supported transport, [`Error::UnsupportedTransport`] is returned.
    pub fn with_transport_name<T>(mut self, transport: T) -> Result<Self, Error>
    where
        T: AsRef<str>,
    {
        self.transport = transport.as_ref().parse()?;
        Ok(self)
    }

    /// Set the listen address.
    ///
    /// For UDP transports, the address is in the format of `<host>:<port>`, where an empty host listens on all
    /// interfaces. For `unixgram`, the address is the path of the socket file. Any file already present at that path is
    /// removed before binding.
    ///
    /// Defaults to `localhost:8125`.
    #[must_use]
    pub fn with_listen_address<A>(mut self, address: A) -> Self
    where
        A: Into<String>,
    {
        self.address = address.into();
        self
    }

    /// Set the size of the buffer that datagrams are read into.
    ///
    /// Datagrams larger than the buffer are truncated by the operating system. A size of zero is ignored.
    ///
    /// Defaults to 65,527 bytes, the largest UDP payload over IPv6.
    #[must_use]
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        if buffer_size > 0 {
            self.buffer_size = buffer_size;
        }
        self
    }

    /// Set the read timeout.
    ///
    /// When no datagram arrives within the timeout, the read is reported to the [`Reporter`] as a timeout and retried.
    /// Timeouts never end the serve loop. A zero timeout is ignored.
    ///
    /// Defaults to no timeout.
    #[must_use]
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        if !timeout.is_zero() {
            self.read_timeout = Some(timeout);
        }
        self
    }

    /// Sets whether or not to enable telemetry for the server.
    ///
    /// When enabled, counters for received packets, bytes, lines, and read errors are registered with the global
    /// recorder when serving starts.
    ///
    /// Defaults to `true`.
    #[must_use]
    pub fn with_telemetry(mut self, telemetry: bool) -> Self {
        self.telemetry = telemetry;
        self
    }

    /// Binds the server.
    ///
    /// # Errors
    ///
    /// If the transport is not packet-based, if a stale Unix socket file cannot be removed, or if the socket cannot be
    /// bound, an error is returned and no socket is left open.
    pub fn build(self) -> Result<PacketServer, Error> {
        PacketServer::bind(self)
    }
}

impl Default for PacketServerBuilder {
    fn default() -> Self {
        PacketServerBuilder {
            transport: Transport::Udp,
            address: DEFAULT_LISTEN_ADDRESS.to_string(),
            buffer_size: MAX_DATAGRAM_LEN,
            read_timeout: None,
            telemetry: true,
        }
    }
}

/// A server that reads StatsD lines from a packet socket.
///
/// The server owns a single bound socket. [`listen_and_serve`][Self::listen_and_serve] reads datagrams from it, splits
/// each one into lines, and sends every line, tagged with its sender, on a channel. Sending blocks when the channel is
/// full, which stops the server from reading until the downstream stage catches up.
///
/// [`close`][Self::close] may be called from any thread, including while another thread is serving, and makes the serve
/// loop return [`Error::Closed`].
pub struct PacketServer {
    transport: Transport,
    address: String,
    local_addr: SourceAddr,
    socket: Mutex<Option<PacketSocket>>,
    poll: Mutex<Poll>,
    registry: Registry,
    waker: Waker,
    closed: AtomicBool,
    buffer_size: usize,
    read_timeout: Option<Duration>,
    telemetry: bool,
}

impl PacketServer {
    /// Binds a server with the default settings for the given transport and listen address.
    ///
    /// # Errors
    ///
    /// See [`PacketServerBuilder::build`].
    pub fn new<A>(transport: Transport, address: A) -> Result<Self, Error>
    where
        A: Into<String>,
    {
        PacketServerBuilder::default().with_transport(transport).with_listen_address(address).build()
    }

    /// Creates a builder for configuring a server.
    pub fn builder() -> PacketServerBuilder {
        PacketServerBuilder::default()
    }

    fn bind(config: PacketServerBuilder) -> Result<Self, Error> {
        let PacketServerBuilder { transport, address, buffer_size, read_timeout, telemetry } = config;

        if !transport.is_packet_transport() {
            return Err(Error::UnsupportedTransport { transport: transport.to_string() });
        }

        if transport.is_unix_transport() {
            remove_socket_file(Path::new(&address))?;
        }

        let bind_error = |source: io::Error| Error::Bind {
            transport: transport.as_str(),
            address: address.clone(),
            source,
        };

        let mut socket = PacketSocket::bind(transport, &address).map_err(bind_error)?;
        let (poll, registry, waker, local_addr) = match register(&mut socket) {
            Ok(parts) => parts,
            Err(source) => {
                drop(socket);
                if transport.is_unix_transport() {
                    let _ = remove_socket_file(Path::new(&address));
                }
                return Err(bind_error(source));
            }
        };

        info!(%transport, %address, %local_addr, "Listening for StatsD datagrams.");

        Ok(PacketServer {
            transport,
            address,
            local_addr,
            socket: Mutex::new(Some(socket)),
            poll: Mutex::new(poll),
            registry,
            waker,
            closed: AtomicBool::new(false),
            buffer_size,
            read_timeout,
            telemetry,
        })
    }

    /// Returns the transport the server listens on.
    pub fn transport(&self) -> Transport {
        self.transport
    }

    /// Returns the listen address the server was created with.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Returns the address the socket is bound to.
    ///
    /// This differs from [`address`][Self::address] when binding to port 0 or to a host name.
    pub fn local_addr(&self) -> &SourceAddr {
        &self.local_addr
    }

    /// Returns `true` if the server has been closed.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Reads datagrams and forwards their lines on `transfer` until the server fails or is closed.
    ///
    /// Lines from a single datagram are sent in order, and datagrams are handled in the order they are read. Sending
    /// blocks while `transfer` is full. Read timeouts are reported to `reporter` and retried.
    ///
    /// This never returns `Ok`: it runs until a fatal condition occurs.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidParameters`] if `consumer` or `reporter` is missing, before anything is read.
    /// - [`Error::AlreadyServing`] if another thread is already serving.
    /// - [`Error::Closed`] once the server is closed, whether before or during serving.
    /// - [`Error::ChannelClosed`] if the receiving side of `transfer` was dropped.
    /// - [`Error::Read`] for any read error that is not transient.
    pub fn listen_and_serve(
        &self,
        consumer: Option<&dyn MetricsConsumer>,
        reporter: Option<&dyn Reporter>,
        transfer: &Sender<Metric>,
    ) -> Result<(), Error> {
        let (Some(_), Some(reporter)) = (consumer, reporter) else {
            return Err(Error::InvalidParameters);
        };

        let mut poll = self.poll.try_lock().ok_or(Error::AlreadyServing)?;
        let telemetry = self.telemetry.then(|| Telemetry::new(self.transport));
        let mut events = Events::with_capacity(EVENTS_CAPACITY);
        let mut buf = vec![0; self.buffer_size];

        debug!(transport = %self.transport, local_addr = %self.local_addr, "Serving.");

        loop {
            if self.is_closed() {
                debug!(transport = %self.transport, local_addr = %self.local_addr, "Server closed, stopping.");
                return Err(Error::Closed);
            }

            if let Err(e) = poll.poll(&mut events, self.read_timeout) {
                self.on_read_error(reporter, telemetry.as_ref(), e)?;
                continue;
            }

            if events.is_empty() {
                let e = io::Error::new(io::ErrorKind::TimedOut, "i/o timeout");
                self.on_read_error(reporter, telemetry.as_ref(), e)?;
                continue;
            }

            for event in &events {
                if event.token() == SOCKET {
                    self.drain(&mut buf, reporter, telemetry.as_ref(), transfer)?;
                }
            }
        }
    }

    /// Reads datagrams until the socket has none left.
    fn drain(
        &self,
        buf: &mut [u8],
        reporter: &dyn Reporter,
        telemetry: Option<&Telemetry>,
        transfer: &Sender<Metric>,
    ) -> Result<(), Error> {
        loop {
            let result = match self.socket.lock().as_ref() {
                Some(socket) => socket.recv_from(buf),
                None => return Err(Error::Closed),
            };

            match result {
                Ok((n, addr)) => {
                    if n > 0 {
                        handle_packet(&buf[..n], &addr, telemetry, transfer)?;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(()),
                Err(e) => self.on_read_error(reporter, telemetry, e)?,
            }
        }
    }

    fn on_read_error(
        &self,
        reporter: &dyn Reporter,
        telemetry: Option<&Telemetry>,
        err: io::Error,
    ) -> Result<(), Error> {
        reporter.on_debug(format_args!(
            "{} Transport ({}) - ReadFrom error: {}",
            self.transport, self.local_addr, err
        ));

        let class = classify(&err);
        if let Some(telemetry) = telemetry {
            telemetry.track_read_error(class);
        }

        match class {
            ReadErrorClass::Transient => Ok(()),
            ReadErrorClass::Fatal => Err(Error::Read(err)),
        }
    }

    /// Closes the server.
    ///
    /// For Unix transports, the socket file is removed first. The socket is then released, and a thread blocked in
    /// [`listen_and_serve`][Self::listen_and_serve] is woken up so that it returns [`Error::Closed`]. Every step is
    /// attempted even if an earlier one fails. Closing an already-closed server does nothing.
    ///
    /// The socket file is only removed here: dropping a `unixgram` server without closing it leaves the file behind,
    /// and it is removed the next time a server binds to the same path.
    ///
    /// # Errors
    ///
    /// Any failure to remove the socket file, release the socket, or wake the serving thread is returned. When more
    /// than one step fails, the errors are returned together as [`Error::Multiple`].
    pub fn close(&self) -> Result<(), Error> {
        let mut errors = Vec::new();

        self.closed.store(true, Ordering::Release);

        if self.transport.is_unix_transport() {
            if let Err(e) = remove_socket_file(Path::new(&self.address)) {
                errors.push(e);
            }
        }

        if let Some(mut socket) = self.socket.lock().take() {
            if let Err(e) = socket.deregister(&self.registry) {
                errors.push(Error::Close(e));
            }
            drop(socket);

            debug!(transport = %self.transport, local_addr = %self.local_addr, "Closed socket.");
        }

        if let Err(e) = self.waker.wake() {
            errors.push(Error::Close(e));
        }

        Error::aggregate(errors)
    }
}

/// Registers a freshly bound socket with a new poller, along with the waker used to interrupt it.
fn register(socket: &mut PacketSocket) -> io::Result<(Poll, Registry, Waker, SourceAddr)> {
    let poll = Poll::new()?;
    let registry = poll.registry().try_clone()?;
    let waker = Waker::new(poll.registry(), WAKER)?;
    socket.register(poll.registry(), SOCKET)?;
    let local_addr = socket.local_addr()?;

    Ok((poll, registry, waker, local_addr))
}

/// Splits a datagram into lines and forwards them, in order, tagged with the sender.
///
/// The lines are owned copies, so `data` may be overwritten by the next read as soon as this returns.
fn handle_packet(
    data: &[u8],
    addr: &SourceAddr,
    telemetry: Option<&Telemetry>,
    transfer: &Sender<Metric>,
) -> Result<(), Error> {
    let lines = split_lines(data);
    trace!(bytes = data.len(), lines = lines.len(), %addr, "Received datagram.");

    if let Some(telemetry) = telemetry {
        telemetry.track_packet(data.len(), lines.len());
    }

    for line in lines {
        transfer.send(Metric::new(line, addr.clone())).map_err(|_| Error::ChannelClosed)?;
    }

    Ok(())
}

//! Connection Handler
//!
//! Runs one client session: the register/login handshake, then the
//! request/response loop.

use std::io::{BufReader, BufWriter, ErrorKind};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use crate::auth::Authenticator;
use crate::engine::Engine;
use crate::error::{GateError, Result};
use crate::protocol::{read_request, write_response, Request, Response};
use crate::store::Cancellation;

/// Handles a single client connection
pub struct Connection {
    /// TCP stream reader (buffered for efficiency)
    reader: BufReader<TcpStream>,

    /// TCP stream writer (buffered for efficiency)
    writer: BufWriter<TcpStream>,

    /// Reference to the shared engine
    engine: Arc<Engine>,

    /// Handshake state for this session
    authenticator: Authenticator,

    /// Fired by shutdown, force-close, or a dead peer
    cancel: Cancellation,

    /// Peer address for logging
    peer_addr: String,
}

impl Connection {
    /// Create a new connection handler
    ///
    /// Sets up buffered I/O and attaches a peer-liveness probe to `cancel`
    pub fn new(stream: TcpStream, engine: Arc<Engine>, cancel: Cancellation) -> Result<Self> {
        let peer_addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        // Disable Nagle's algorithm for low latency
        stream.set_nodelay(true)?;

        let probe_stream = stream.try_clone()?;
        let cancel = cancel.with_peer_probe(move || peer_closed(&probe_stream));

        let read_stream = stream.try_clone()?;
        let write_stream = stream;

        Ok(Self {
            reader: BufReader::new(read_stream),
            writer: BufWriter::new(write_stream),
            engine,
            authenticator: Authenticator::new(),
            cancel,
            peer_addr,
        })
    }

    /// Configure connection timeouts
    pub fn set_timeouts(&mut self, read_ms: u64, write_ms: u64) -> Result<()> {
        if read_ms > 0 {
            self.reader
                .get_ref()
                .set_read_timeout(Some(Duration::from_millis(read_ms)))?;
        }
        if write_ms > 0 {
            self.writer
                .get_ref()
                .set_write_timeout(Some(Duration::from_millis(write_ms)))?;
        }
        Ok(())
    }

    /// Handle the connection (blocking until closed)
    ///
    /// Reads one request, writes exactly one response, repeats.
    /// Returns when the client exits or disconnects, or the session is
    /// cancelled. Protocol errors are returned after a best-effort reply.
    pub fn handle(&mut self) -> Result<()> {
        tracing::debug!("Session started for {}", self.peer_addr);

        loop {
            let request = match self.next_request()? {
                Some(request) => request,
                None => return Ok(()),
            };

            tracing::trace!("Received request from {}: {:?}", self.peer_addr, request);

            if request == Request::Exit {
                tracing::debug!("Client {} sent exit", self.peer_addr);
                return Ok(());
            }

            let response = if request.is_credential() || !self.authenticator.is_authenticated() {
                self.authenticator.handle(self.engine.users(), &request)
            } else {
                self.engine.execute(request, &self.cancel)
            };

            if !self.send_response(&response)? {
                return Ok(());
            }

            if self.cancel.is_cancelled() {
                tracing::debug!("Session for {} cancelled", self.peer_addr);
                return Ok(());
            }
        }
    }

    /// Read the next request; `None` means the session is over
    fn next_request(&mut self) -> Result<Option<Request>> {
        match read_request(&mut self.reader) {
            Ok(Some(request)) => Ok(Some(request)),
            Ok(None) => {
                tracing::debug!("Client {} disconnected", self.peer_addr);
                Ok(None)
            }
            Err(e) if e.is_disconnect() => {
                tracing::debug!("Connection to {} lost: {}", self.peer_addr, e);
                Ok(None)
            }
            Err(GateError::Io(ref e))
                if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) =>
            {
                // Read timeout (Windows uses TimedOut instead of WouldBlock)
                tracing::debug!("Read timeout for client {}", self.peer_addr);
                Ok(None)
            }
            Err(e) => {
                tracing::warn!("Error reading from {}: {}", self.peer_addr, e);
                if matches!(e, GateError::Protocol(_)) {
                    let _ = self.send_response(&Response::error(e.to_string()));
                }
                Err(e)
            }
        }
    }

    /// Send a response; `Ok(false)` if the client is already gone
    fn send_response(&mut self, response: &Response) -> Result<bool> {
        match write_response(&mut self.writer, response) {
            Ok(()) => Ok(true),
            Err(e) if e.is_disconnect() => {
                tracing::debug!(
                    "Client {} disconnected before response could be sent: {}",
                    self.peer_addr,
                    e
                );
                Ok(false)
            }
            Err(e) => {
                tracing::warn!("Error writing to {}: {}", self.peer_addr, e);
                Err(e)
            }
        }
    }

    /// Get the peer address string
    pub fn peer_addr(&self) -> &str {
        &self.peer_addr
    }
}

/// Non-blocking check for an orderly close from the peer.
///
/// Only called from the session's own thread while it is parked in
/// getWhen, so toggling blocking mode cannot race a read.
fn peer_closed(stream: &TcpStream) -> bool {
    if stream.set_nonblocking(true).is_err() {
        return false;
    }

    let mut buf = [0u8; 1];
    let closed = match stream.peek(&mut buf) {
        Ok(0) => true,
        Ok(_) => false,
        Err(e) if e.kind() == ErrorKind::WouldBlock => false,
        Err(_) => true,
    };

    let _ = stream.set_nonblocking(false);
    closed
}

use std::io::ErrorKind;
use std::time::Duration;

use crate::{
    config::Config,
    deadline::{self, Expired},
    error::RconError,
    packet::{self, Packet, PacketType, TERMINATOR},
};
use log::{debug, trace, warn};
use rand::Rng;
use tokio::{io::AsyncWriteExt, net::TcpStream};

/// Largest chunk pulled off the socket in one read. Comfortably above the
/// biggest packet a server sends, so one packet is one chunk unless the
/// network splits it.
const READ_CHUNK_SIZE: usize = 64 * 1024;

/// Request id the server answers with when the password was wrong.
const AUTH_REJECTED_ID: i32 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Authenticating,
    Ready,
}

/// Simple asynchronous rcon client. Create it with a [Config], then call
/// `connect()` to open the connection and authenticate. The client should be
/// `mut` since every operation drives the single socket it owns.
///
/// ## Example
/// ```no_run
/// use sourcon::{client::Client, config::Config};
/// use std::{error::Error, time::Duration};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn Error>> {
///     let config = Config::new("dev.viora.sh", 27016, "<put rcon password here>")
///         .with_command_timeout(Duration::from_secs(5));
///     let mut client = Client::new(config);
///     client.connect().await?;
///
///     let response = client.send("echo hi").await?;
///     assert_eq!(response, "hi\n");
///
///     client.disconnect().await;
///     Ok(())
/// }
/// ```
pub struct Client {
    config: Config,
    state: SessionState,
    stream: Option<TcpStream>,
    pending_request_id: Option<i32>,
}

impl Client {
    pub fn new(config: Config) -> Self {
        Client {
            config,
            state: SessionState::Disconnected,
            stream: None,
            pending_request_id: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_authenticated(&self) -> bool {
        self.state == SessionState::Ready
    }

    /// Id of the request still waiting for its answer. Always `None` between
    /// calls, since every exchange clears it when it ends.
    pub fn pending_request_id(&self) -> Option<i32> {
        self.pending_request_id
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Takes effect on the next `connect()`.
    pub fn set_connect_timeout(&mut self, timeout: Option<Duration>) {
        self.config.connect_timeout = timeout;
    }

    /// Takes effect on the next exchange with the server.
    pub fn set_command_timeout(&mut self, timeout: Option<Duration>) {
        self.config.command_timeout = timeout;
    }

    /// Open the TCP stream and authenticate with the configured password.
    ///
    /// Any previous connection is closed first. On failure the client is
    /// left `Disconnected` with no socket.
    pub async fn connect(&mut self) -> Result<(), RconError> {
        if self.stream.is_some() {
            self.disconnect().await;
        }

        let addr = self.config.addr();
        self.state = SessionState::Connecting;
        debug!("connecting to {}", addr);

        // dropping the connect future on expiry closes the half-open socket
        let attempt = deadline::race(
            self.config.effective_connect_timeout(),
            TcpStream::connect(addr.as_str()),
        )
        .await;
        let stream = match attempt {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => {
                self.state = SessionState::Disconnected;
                return Err(RconError::UnreachableHost { addr, source });
            }
            Err(Expired(timeout)) => {
                self.state = SessionState::Disconnected;
                return Err(RconError::ConnectTimeout { addr, timeout });
            }
        };

        trace!("opened tcp stream to {}, attempting auth", addr);
        self.stream = Some(stream);
        self.state = SessionState::Authenticating;

        let id = next_request_id();
        self.pending_request_id = Some(id);
        let authenticated = self.auth(id).await;
        self.pending_request_id = None;

        match authenticated {
            Ok(()) => {
                trace!("auth complete");
                self.state = SessionState::Ready;
                Ok(())
            }
            Err(RconError::AuthenticationError) => {
                debug!("{} rejected the password", addr);
                self.disconnect().await;
                Err(RconError::AuthenticationError)
            }
            Err(e) => {
                self.abort();
                Err(e)
            }
        }
    }

    /// Run a rcon command and wait for the whole response. Responses split
    /// over several packets or reads are glued back together.
    ///
    /// Fails with [RconError::NotReady] without touching the network unless
    /// `connect()` has succeeded.
    pub async fn send(&mut self, command: &str) -> Result<String, RconError> {
        self.send_raw(command, PacketType::Exec).await
    }

    /// Close the connection politely. Safe to call at any time, any number of
    /// times.
    pub async fn disconnect(&mut self) {
        self.state = SessionState::Disconnected;

        if let Some(mut stream) = self.stream.take() {
            debug!("disconnecting from {}", self.config.addr());
            if let Err(e) = stream.shutdown().await {
                warn!("error while closing rcon stream: {}", e);
            }
        }
    }

    /// Drop the socket without a goodbye.
    fn abort(&mut self) {
        self.state = SessionState::Disconnected;
        self.stream = None;
        self.pending_request_id = None;
    }

    /// The auth reply is matched only by its id, never by body or terminator:
    /// `-1` means the password was rejected, anything else is a success.
    async fn auth(&self, sent: i32) -> Result<(), RconError> {
        let stream = self.stream.as_ref().ok_or(RconError::NotReady)?;

        let exchange = async {
            trace!("sending auth packet to server");
            Self::write_packet(stream, sent, PacketType::Auth, &self.config.password).await?;

            // the id may straddle two reads
            let mut reply = Self::read_chunk(stream).await?;
            while reply.len() < packet::ID_END {
                reply.extend_from_slice(&Self::read_chunk(stream).await?);
            }
            let id = packet::response_id(&reply)?;
            trace!("receive auth response with id {} (sent {})", id, sent);

            if id == AUTH_REJECTED_ID {
                Err(RconError::AuthenticationError)
            } else {
                Ok(())
            }
        };

        match deadline::race(self.config.command_timeout, exchange).await {
            Ok(outcome) => outcome,
            // the password stays out of error messages
            Err(Expired(timeout)) => Err(RconError::CommandTimeout {
                command: String::from("auth"),
                addr: self.config.addr(),
                timeout,
            }),
        }
    }

    async fn send_raw(&mut self, body: &str, packet_type: PacketType) -> Result<String, RconError> {
        let stream = match (self.state, self.stream.as_ref()) {
            (SessionState::Ready, Some(stream)) => stream,
            _ => return Err(RconError::NotReady),
        };
        let id = next_request_id();
        self.pending_request_id = Some(id);

        let exchange = async {
            Self::discard_stale(stream)?;
            Self::write_packet(stream, id, packet_type, body).await?;
            Self::read_response(stream).await
        };

        let outcome = deadline::race(self.config.command_timeout, exchange).await;
        self.pending_request_id = None;

        match outcome {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(e)) => {
                self.abort();
                Err(e)
            }
            Err(Expired(timeout)) => {
                self.abort();
                Err(RconError::CommandTimeout {
                    command: body.to_owned(),
                    addr: self.config.addr(),
                    timeout,
                })
            }
        }
    }

    async fn write_packet(
        stream: &TcpStream,
        id: i32,
        packet_type: PacketType,
        body: &str,
    ) -> Result<(), RconError> {
        let packet = Packet::new(id, packet_type, body);

        trace!("sending packet {} ({} bytes)", id, packet.size() + 4);
        Self::write_to_stream(&packet.pack(), stream).await
    }

    /// Collect chunks until the joined bodies end with the two-null
    /// terminator. The server gives no packet count, so that is the only
    /// signal that the response is complete.
    async fn read_response(stream: &TcpStream) -> Result<String, RconError> {
        let mut fragments = Vec::<u8>::new();

        loop {
            let chunk = Self::read_chunk(stream).await?;
            let fragment = packet::body_fragment(&chunk);
            trace!(
                "receive {} byte chunk carrying {} body bytes",
                chunk.len(),
                fragment.len()
            );
            fragments.extend_from_slice(fragment);

            if let Some(response) = fragments.strip_suffix(&TERMINATOR) {
                return Ok(String::from_utf8_lossy(response).into_owned());
            }
        }
    }

    /// Throw away bytes left over from an earlier exchange so they can't end
    /// up in the next response. Only sees data tokio already knows about.
    fn discard_stale(stream: &TcpStream) -> Result<(), RconError> {
        let mut buf = vec![0u8; READ_CHUNK_SIZE];

        loop {
            match stream.try_read(&mut buf) {
                Ok(0) => return Err(RconError::ReceiveError(ErrorKind::UnexpectedEof.into())),
                Ok(n) => trace!("discarding {} stale bytes", n),
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => return Ok(()),
                Err(e) => return Err(RconError::ReceiveError(e)),
            }
        }
    }

    async fn write_to_stream(bytes: &[u8], stream: &TcpStream) -> Result<(), RconError> {
        let mut written = 0;

        while written < bytes.len() {
            stream.writable().await.map_err(RconError::SendError)?;

            match stream.try_write(&bytes[written..]) {
                Ok(n) => written += n,
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => continue,
                Err(e) => return Err(RconError::SendError(e)),
            }
        }
        Ok(())
    }

    async fn read_chunk(stream: &TcpStream) -> Result<Vec<u8>, RconError> {
        let mut buf = vec![0u8; READ_CHUNK_SIZE];

        loop {
            stream.readable().await.map_err(RconError::ReceiveError)?;
            match stream.try_read(&mut buf) {
                Ok(0) => return Err(RconError::ReceiveError(ErrorKind::UnexpectedEof.into())),
                Ok(n) => {
                    buf.truncate(n);
                    return Ok(buf);
                }
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => continue,
                Err(e) => return Err(RconError::ReceiveError(e)),
            }
        }
    }
}

/// Fresh positive 31-bit request id.
fn next_request_id() -> i32 {
    rand::rng().random_range(1..i32::MAX)
}

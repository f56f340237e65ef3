use std::time::Duration;

use thiserror::Error;

/// Possible errors for the package.
#[derive(Error, Debug)]
pub enum RconError {
    /// Returned if we received a packet that does not have a type known to us.
    #[error("unknown rcon packet type: {0}")]
    UnknownPacketType(i32),
    /// Returned if the header is mangled in some way (bad offsets, incomplete
    /// response)
    #[error("packet header malformed (can't parse size, id or type)")]
    MalformedPacketHeader(#[from] std::array::TryFromSliceError),
    /// The declared size runs past the received bytes, or is too small to
    /// hold id, type and terminator.
    #[error("packet declares {declared} bytes but only {received} arrived")]
    TruncatedPacket { declared: i32, received: usize },
    /// Returned if the body is mangled in some way.
    #[error("packet body malformed (not valid ascii or utf-8)")]
    MalformedPacketBody(#[from] std::str::Utf8Error),
    /// Returned if the host is down, behind a firewall or does not resolve.
    #[error("host {addr} cannot be reached: {source}")]
    UnreachableHost {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    /// The stream was established, but there was a problem writing to the
    /// socket.
    #[error("cannot send message to host: {0}")]
    SendError(#[source] std::io::Error),
    /// The stream was established, but there was a problem reading from the
    /// socket. A peer hanging up mid-response ends up here as well.
    #[error("cannot receive response from host: {0}")]
    ReceiveError(#[source] std::io::Error),
    /// Returned if you can't remember the password.
    #[error("Authentication error")]
    AuthenticationError,
    /// The TCP handshake did not finish in time.
    #[error("Rcon connect to {addr} timed out after {}ms", .timeout.as_millis())]
    ConnectTimeout { addr: String, timeout: Duration },
    /// A command (or the auth exchange) did not get its full response in time.
    #[error("Rcon command \"{command}\" to {addr} timed out after {}ms", .timeout.as_millis())]
    CommandTimeout {
        command: String,
        addr: String,
        timeout: Duration,
    },
    /// `send` was called without an open, authenticated session.
    #[error("not connected or not authenticated")]
    NotReady,
}

impl RconError {
    /// True for both flavours of deadline expiry.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            RconError::ConnectTimeout { .. } | RconError::CommandTimeout { .. }
        )
    }
}

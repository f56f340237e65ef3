use std::time::Duration;

/// Where to connect and how long to wait. The client takes its own copy, so
/// changing a `Config` after handing it over has no effect on the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub password: String,
    /// Bound on the TCP handshake. Falls back to `command_timeout` if unset.
    pub connect_timeout: Option<Duration>,
    /// Bound on every request/response exchange, including the auth reply.
    pub command_timeout: Option<Duration>,
}

impl Config {
    pub fn new(host: impl Into<String>, port: u16, password: impl Into<String>) -> Self {
        Config {
            host: host.into(),
            port,
            password: password.into(),
            connect_timeout: None,
            command_timeout: None,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = Some(timeout);
        self
    }

    /// `host:port`, as used for connecting and in error messages.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn effective_connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout.or(self.command_timeout)
    }
}

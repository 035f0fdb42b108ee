//! Session configuration.

use std::fmt;
use std::time::Duration;

use moshlink_core::constants::{
    CONNECTING_WAIT_CAP, DEFAULT_SEND_DELAY, MSG_INVALID_SIZE, MSG_MISSING_ENDPOINT,
    NETWORK_ERROR_BACKOFF,
};
use moshlink_core::{ConnectParams, Error, Result};

/// Everything needed to create a [`Session`](crate::Session).
///
/// The endpoint and key are fixed for the session's lifetime; a session is
/// never re-targeted.
#[derive(Clone)]
pub struct SessionConfig {
    /// Numeric address of the remote server.
    pub address: String,
    /// UDP port of the remote server.
    pub port: String,
    /// Session key printed by the remote server.
    pub key: String,
    /// Initial terminal width.
    pub cols: u16,
    /// Initial terminal height.
    pub rows: u16,
    /// Keystroke send delay handed to the transport.
    pub send_delay: Duration,
    /// Longest blocking wait before the first remote state arrives.
    pub connecting_wait_cap: Duration,
    /// Pause after a recoverable network failure.
    pub network_error_backoff: Duration,
    /// Zero the core-dump limit when the driver starts.
    pub disable_core_dumps: bool,
}

impl SessionConfig {
    /// Create a configuration with default tunables.
    pub fn new(
        address: impl Into<String>,
        port: impl Into<String>,
        key: impl Into<String>,
        cols: u16,
        rows: u16,
    ) -> Self {
        Self {
            address: address.into(),
            port: port.into(),
            key: key.into(),
            cols,
            rows,
            send_delay: DEFAULT_SEND_DELAY,
            connecting_wait_cap: CONNECTING_WAIT_CAP,
            network_error_backoff: NETWORK_ERROR_BACKOFF,
            disable_core_dumps: true,
        }
    }

    pub fn with_send_delay(mut self, delay: Duration) -> Self {
        self.send_delay = delay;
        self
    }

    pub fn with_connecting_wait_cap(mut self, cap: Duration) -> Self {
        self.connecting_wait_cap = cap;
        self
    }

    pub fn with_network_error_backoff(mut self, backoff: Duration) -> Self {
        self.network_error_backoff = backoff;
        self
    }

    pub fn with_disable_core_dumps(mut self, disable: bool) -> Self {
        self.disable_core_dumps = disable;
        self
    }

    /// Check the endpoint and size.
    ///
    /// Endpoint problems are reported before size problems.
    pub fn validate(&self) -> Result<()> {
        if self.address.is_empty() || self.port.is_empty() || self.key.is_empty() {
            return Err(Error::validation(MSG_MISSING_ENDPOINT));
        }
        if self.cols == 0 || self.rows == 0 {
            return Err(Error::validation(MSG_INVALID_SIZE));
        }
        Ok(())
    }

    /// Parameters handed to the transport connector.
    pub fn connect_params(&self) -> ConnectParams<'_> {
        ConnectParams {
            address: &self.address,
            port: &self.port,
            key: &self.key,
            cols: self.cols,
            rows: self.rows,
        }
    }
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("address", &self.address)
            .field("port", &self.port)
            .field("key", &"[REDACTED]")
            .field("cols", &self.cols)
            .field("rows", &self.rows)
            .field("send_delay", &self.send_delay)
            .field("connecting_wait_cap", &self.connecting_wait_cap)
            .field("network_error_backoff", &self.network_error_backoff)
            .field("disable_core_dumps", &self.disable_core_dumps)
            .finish()
    }
}

//! Collaborator traits consumed by the session driver.
//!
//! moshlink does not implement the state-synchronization protocol or the
//! terminal emulator. A host links a protocol implementation and exposes it
//! through these traits:
//! - [`Transport`]: blocking, single-consumer protocol endpoint
//! - [`Connector`]: builds a transport for an endpoint and session key
//! - [`FrameRenderer`]: turns two snapshots into terminal bytes
//! - [`Snapshot`]: the framebuffer value the transport reconstructs

use std::fmt;
use std::os::fd::RawFd;
use std::time::{Duration, Instant};

use crate::error::Result;

// =============================================================================
// Snapshot Trait
// =============================================================================

/// A terminal framebuffer snapshot.
pub trait Snapshot: Clone + Send + 'static {
    /// A blank snapshot of the given size.
    fn blank(cols: u16, rows: u16) -> Self;
}

// =============================================================================
// Transport Trait
// =============================================================================

/// The state-synchronization transport, driven from a single thread.
///
/// Methods that need the current time take the driver's frozen instant
/// (see [`LoopClock`](crate::timing::LoopClock)) rather than reading the
/// clock themselves.
pub trait Transport: Send + 'static {
    /// The remote framebuffer type this transport reconstructs.
    type Snapshot: Snapshot;

    /// Milliseconds until the transport next needs attention. Negative means
    /// no preference.
    fn wait_time(&self, now: Instant) -> i64;

    /// Descriptors to wait on for incoming data. May be empty.
    fn fds(&self) -> Vec<RawFd>;

    /// Read and process whatever arrived on the descriptors.
    fn recv(&mut self, now: Instant) -> Result<()>;

    /// Retransmission and timer bookkeeping; also flushes pending sends.
    fn tick(&mut self, now: Instant) -> Result<()>;

    /// Last send failure, if one is pending.
    fn send_error(&self) -> Option<&str>;

    /// Forget the pending send failure.
    fn clear_send_error(&mut self);

    /// Append one keystroke byte to the outgoing user stream.
    fn push_user_byte(&mut self, byte: u8) -> Result<()>;

    /// Append a window-size change to the outgoing user stream.
    fn push_resize(&mut self, cols: u16, rows: u16) -> Result<()>;

    /// Latest remote framebuffer reconstructed from peer data.
    fn remote_state(&self) -> &Self::Snapshot;

    /// Number of remote states received so far. Zero while connecting.
    fn remote_state_num(&self) -> u64;

    /// True once the transport has begun an orderly shutdown.
    fn shutdown_in_progress(&self) -> bool;

    /// Delay applied to outgoing keystrokes before sending.
    fn set_send_delay(&mut self, _delay: Duration) {}
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    type Snapshot = T::Snapshot;

    fn wait_time(&self, now: Instant) -> i64 {
        (**self).wait_time(now)
    }

    fn fds(&self) -> Vec<RawFd> {
        (**self).fds()
    }

    fn recv(&mut self, now: Instant) -> Result<()> {
        (**self).recv(now)
    }

    fn tick(&mut self, now: Instant) -> Result<()> {
        (**self).tick(now)
    }

    fn send_error(&self) -> Option<&str> {
        (**self).send_error()
    }

    fn clear_send_error(&mut self) {
        (**self).clear_send_error()
    }

    fn push_user_byte(&mut self, byte: u8) -> Result<()> {
        (**self).push_user_byte(byte)
    }

    fn push_resize(&mut self, cols: u16, rows: u16) -> Result<()> {
        (**self).push_resize(cols, rows)
    }

    fn remote_state(&self) -> &Self::Snapshot {
        (**self).remote_state()
    }

    fn remote_state_num(&self) -> u64 {
        (**self).remote_state_num()
    }

    fn shutdown_in_progress(&self) -> bool {
        (**self).shutdown_in_progress()
    }

    fn set_send_delay(&mut self, delay: Duration) {
        (**self).set_send_delay(delay)
    }
}

// =============================================================================
// Connector Trait
// =============================================================================

/// Everything a connector needs to build a transport.
#[derive(Clone, Copy)]
pub struct ConnectParams<'a> {
    /// Numeric peer address.
    pub address: &'a str,
    /// Peer UDP port.
    pub port: &'a str,
    /// Session key issued by the remote server.
    pub key: &'a str,
    /// Size of the initial blank remote snapshot.
    pub cols: u16,
    pub rows: u16,
}

impl fmt::Debug for ConnectParams<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectParams")
            .field("address", &self.address)
            .field("port", &self.port)
            .field("key", &"[REDACTED]")
            .field("cols", &self.cols)
            .field("rows", &self.rows)
            .finish()
    }
}

/// Builds a transport with a blank user stream and a blank remote snapshot
/// of `(cols, rows)`.
pub trait Connector {
    type Transport: Transport;

    fn connect(&self, params: &ConnectParams<'_>) -> Result<Self::Transport>;
}

impl<F, T> Connector for F
where
    F: Fn(&ConnectParams<'_>) -> Result<T>,
    T: Transport,
{
    type Transport = T;

    fn connect(&self, params: &ConnectParams<'_>) -> Result<T> {
        self(params)
    }
}

// =============================================================================
// Frame Renderer Trait
// =============================================================================

/// Computes the bytes that transform a displayed snapshot into another.
pub trait FrameRenderer<S>: Send + 'static {
    /// With `incremental == false` the output must redraw the whole screen
    /// without relying on `local`.
    fn render(&mut self, incremental: bool, local: &S, remote: &S) -> Vec<u8>;
}

// =============================================================================
// Tests
// =============================================================================

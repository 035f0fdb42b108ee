//! Mock transport for testing without a network peer.
//!
//! [`MockTransport`] is moved into the driver; tests keep the matching
//! [`MockHandle`] to script failures, deliver remote states and inspect
//! what the driver pushed. Remote states set through the handle are adopted
//! on the next `recv()` or `tick()`, the way a real transport only learns of
//! them while processing packets.

use std::collections::VecDeque;
use std::io;
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::net::UnixDatagram;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use moshlink_core::error::{Error, Result};
use moshlink_core::terminal::TerminalState;
use moshlink_core::transport::{ConnectParams, Connector, Transport};

use crate::recorders::wait_until;

/// Wait time a fresh mock suggests, in milliseconds.
const DEFAULT_WAIT_MS: i64 = 5;

#[derive(Debug)]
struct MockState {
    pending_remote: Option<TerminalState>,
    remote_num: u64,
    shutdown: bool,
    wait_time: i64,
    send_error: Option<String>,
    recv_errors: VecDeque<Error>,
    tick_errors: VecDeque<Error>,
    tick_panic: Option<String>,
    user_bytes: Vec<u8>,
    resizes: Vec<(u16, u16)>,
    recv_calls: u64,
    tick_calls: u64,
    send_delay: Option<Duration>,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            pending_remote: None,
            remote_num: 0,
            shutdown: false,
            wait_time: DEFAULT_WAIT_MS,
            send_error: None,
            recv_errors: VecDeque::new(),
            tick_errors: VecDeque::new(),
            tick_panic: None,
            user_bytes: Vec::new(),
            resizes: Vec::new(),
            recv_calls: 0,
            tick_calls: 0,
            send_delay: None,
        }
    }
}

/// In-memory transport driven by a [`MockHandle`].
#[derive(Debug)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
    remote: TerminalState,
    remote_num: u64,
    send_error: Option<String>,
    socket: Option<UnixDatagram>,
}

impl MockTransport {
    /// A transport with no descriptors; the driver sleeps instead of polling.
    pub fn new(cols: u16, rows: u16) -> (Self, MockHandle) {
        let state = Arc::new(Mutex::new(MockState::default()));
        let transport = Self {
            state: state.clone(),
            remote: TerminalState::new(cols, rows),
            remote_num: 0,
            send_error: None,
            socket: None,
        };
        (transport, MockHandle { state, peer: None })
    }

    /// A transport backed by a real datagram socket, so readiness goes
    /// through `poll`. [`MockHandle::wake`] makes it readable.
    pub fn with_socket(cols: u16, rows: u16) -> io::Result<(Self, MockHandle)> {
        let (ours, peer) = UnixDatagram::pair()?;
        ours.set_nonblocking(true)?;
        let (mut transport, mut handle) = Self::new(cols, rows);
        transport.socket = Some(ours);
        handle.peer = Some(Arc::new(peer));
        Ok((transport, handle))
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn adopt_remote(&mut self) {
        let pending = self.lock().pending_remote.take();
        if let Some(remote) = pending {
            self.remote = remote;
            self.remote_num += 1;
            self.lock().remote_num = self.remote_num;
        }
    }

    fn drain_socket(&self) {
        let Some(socket) = &self.socket else {
            return;
        };
        let mut buf = [0u8; 64];
        while socket.recv(&mut buf).is_ok() {}
    }
}

impl Transport for MockTransport {
    type Snapshot = TerminalState;

    fn wait_time(&self, _now: Instant) -> i64 {
        self.lock().wait_time
    }

    fn fds(&self) -> Vec<RawFd> {
        self.socket.iter().map(AsRawFd::as_raw_fd).collect()
    }

    fn recv(&mut self, _now: Instant) -> Result<()> {
        self.drain_socket();
        let scripted = {
            let mut state = self.lock();
            state.recv_calls += 1;
            state.recv_errors.pop_front()
        };
        if let Some(err) = scripted {
            return Err(err);
        }
        self.adopt_remote();
        Ok(())
    }

    fn tick(&mut self, _now: Instant) -> Result<()> {
        let (scripted, panic_message, send_error) = {
            let mut state = self.lock();
            state.tick_calls += 1;
            (
                state.tick_errors.pop_front(),
                state.tick_panic.take(),
                state.send_error.take(),
            )
        };
        if let Some(message) = panic_message {
            panic!("{message}");
        }
        if send_error.is_some() {
            self.send_error = send_error;
        }
        if let Some(err) = scripted {
            return Err(err);
        }
        self.adopt_remote();
        Ok(())
    }

    fn send_error(&self) -> Option<&str> {
        self.send_error.as_deref()
    }

    fn clear_send_error(&mut self) {
        self.send_error = None;
    }

    fn push_user_byte(&mut self, byte: u8) -> Result<()> {
        self.lock().user_bytes.push(byte);
        Ok(())
    }

    fn push_resize(&mut self, cols: u16, rows: u16) -> Result<()> {
        self.lock().resizes.push((cols, rows));
        Ok(())
    }

    fn remote_state(&self) -> &TerminalState {
        &self.remote
    }

    fn remote_state_num(&self) -> u64 {
        self.remote_num
    }

    fn shutdown_in_progress(&self) -> bool {
        self.lock().shutdown
    }

    fn set_send_delay(&mut self, delay: Duration) {
        self.lock().send_delay = Some(delay);
    }
}

/// Test-side view of a [`MockTransport`].
#[derive(Debug, Clone)]
pub struct MockHandle {
    state: Arc<Mutex<MockState>>,
    peer: Option<Arc<UnixDatagram>>,
}

impl MockHandle {
    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue a remote state; the transport adopts it on its next recv/tick.
    pub fn set_remote(&self, remote: TerminalState) {
        self.lock().pending_remote = Some(remote);
    }

    /// [`set_remote`](Self::set_remote) and make the socket readable.
    pub fn deliver(&self, remote: TerminalState) {
        self.set_remote(remote);
        self.wake();
    }

    /// Make the transport's descriptor readable. No-op without a socket.
    pub fn wake(&self) {
        if let Some(peer) = &self.peer {
            let _ = peer.send(b"!");
        }
    }

    pub fn push_recv_error(&self, err: Error) {
        self.lock().recv_errors.push_back(err);
    }

    pub fn push_tick_error(&self, err: Error) {
        self.lock().tick_errors.push_back(err);
    }

    /// Panic with `message` on the next tick.
    pub fn panic_on_tick(&self, message: &str) {
        self.lock().tick_panic = Some(message.to_string());
    }

    /// Report `message` as a send failure after the next tick.
    pub fn set_send_error(&self, message: &str) {
        self.lock().send_error = Some(message.to_string());
    }

    /// True while a send error set here has not yet reached the transport.
    pub fn send_error_pending(&self) -> bool {
        self.lock().send_error.is_some()
    }

    pub fn set_shutdown(&self, shutdown: bool) {
        self.lock().shutdown = shutdown;
    }

    pub fn set_wait_time(&self, wait_ms: i64) {
        self.lock().wait_time = wait_ms;
    }

    pub fn user_bytes(&self) -> Vec<u8> {
        self.lock().user_bytes.clone()
    }

    pub fn resizes(&self) -> Vec<(u16, u16)> {
        self.lock().resizes.clone()
    }

    pub fn recv_calls(&self) -> u64 {
        self.lock().recv_calls
    }

    pub fn tick_calls(&self) -> u64 {
        self.lock().tick_calls
    }

    /// Remote states adopted so far.
    pub fn remote_states(&self) -> u64 {
        self.lock().remote_num
    }

    pub fn send_delay(&self) -> Option<Duration> {
        self.lock().send_delay
    }

    pub fn wait_for_user_bytes(&self, count: usize, timeout: Duration) -> bool {
        wait_until(timeout, || self.lock().user_bytes.len() >= count)
    }

    pub fn wait_for_ticks(&self, count: u64, timeout: Duration) -> bool {
        wait_until(timeout, || self.lock().tick_calls >= count)
    }

    pub fn wait_for_remote_states(&self, count: u64, timeout: Duration) -> bool {
        wait_until(timeout, || self.lock().remote_num >= count)
    }
}

/// Connector producing [`MockTransport`]s.
#[derive(Debug, Clone, Default)]
pub struct MockConnector {
    handles: Arc<Mutex<Vec<MockHandle>>>,
    failure: Arc<Mutex<Option<Error>>>,
    with_socket: bool,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transports get a real socket descriptor.
    pub fn with_socket(mut self) -> Self {
        self.with_socket = true;
        self
    }

    /// The next connect attempt fails with `err`.
    pub fn failing(self, err: Error) -> Self {
        *self.failure.lock().unwrap_or_else(PoisonError::into_inner) = Some(err);
        self
    }

    /// Handle of the most recently built transport.
    pub fn last_handle(&self) -> Option<MockHandle> {
        self.handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }

    pub fn connect_count(&self) -> usize {
        self.handles.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl Connector for MockConnector {
    type Transport = MockTransport;

    fn connect(&self, params: &ConnectParams<'_>) -> Result<MockTransport> {
        if let Some(err) = self.failure.lock().unwrap_or_else(PoisonError::into_inner).take() {
            return Err(err);
        }
        let (transport, handle) = if self.with_socket {
            MockTransport::with_socket(params.cols, params.rows)?
        } else {
            MockTransport::new(params.cols, params.rows)
        };
        self.handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handle.clone());
        Ok(transport)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_adopted_on_tick() {
        let (mut transport, handle) = MockTransport::new(80, 24);
        assert_eq!(transport.remote_state_num(), 0);

        let mut remote = TerminalState::new(80, 24);
        remote.title = Some("shell".into());
        handle.set_remote(remote.clone());
        assert_eq!(transport.remote_state_num(), 0);

        transport.tick(Instant::now()).unwrap();
        assert_eq!(transport.remote_state(), &remote);
        assert_eq!(transport.remote_state_num(), 1);
        assert_eq!(handle.remote_states(), 1);
    }

    #[test]
    fn scripted_errors_pop_in_order() {
        let (mut transport, handle) = MockTransport::new(80, 24);
        handle.push_tick_error(Error::network("first"));
        handle.push_tick_error(Error::crypto("second", false));

        assert_eq!(transport.tick(Instant::now()).unwrap_err().to_string(), "first");
        assert_eq!(transport.tick(Instant::now()).unwrap_err().to_string(), "second");
        assert!(transport.tick(Instant::now()).is_ok());
        assert_eq!(handle.tick_calls(), 3);
    }

    #[test]
    fn send_error_surfaces_after_tick() {
        let (mut transport, handle) = MockTransport::new(80, 24);
        handle.set_send_error("connection refused");
        assert_eq!(transport.send_error(), None);

        transport.tick(Instant::now()).unwrap();
        assert_eq!(transport.send_error(), Some("connection refused"));
        assert!(!handle.send_error_pending());

        transport.clear_send_error();
        assert_eq!(transport.send_error(), None);
    }

    #[test]
    fn socket_wake_and_drain() {
        let (mut transport, handle) = MockTransport::with_socket(80, 24).unwrap();
        assert_eq!(transport.fds().len(), 1);

        handle.wake();
        handle.wake();
        transport.recv(Instant::now()).unwrap();
        // Drained: a second recv finds nothing and does not block.
        transport.recv(Instant::now()).unwrap();
        assert_eq!(handle.recv_calls(), 2);
    }

    #[test]
    fn connector_records_handles_and_failures() {
        let connector = MockConnector::new().failing(Error::network("unreachable"));
        let params = ConnectParams {
            address: "192.0.2.7",
            port: "60001",
            key: "key",
            cols: 100,
            rows: 30,
        };

        assert!(connector.connect(&params).is_err());
        assert_eq!(connector.connect_count(), 0);

        let transport = connector.connect(&params).unwrap();
        assert_eq!(transport.remote_state().size(), (100, 30));
        assert_eq!(connector.connect_count(), 1);
        assert!(connector.last_handle().is_some());
    }
}

//! The session driver loop.
//!
//! A [`Driver`] owns the transport, the frame emitter and the sinks. While
//! a session is running it lives on the worker thread; [`Driver::run`]
//! returns it when the loop ends so the next `start()` resumes with the
//! same transport and local snapshot.
//!
//! One iteration:
//!
//! 1. Freeze the loop clock
//! 2. Drain the input queue into the transport
//! 3. Emit a frame if output is enabled
//! 4. Check for first contact
//! 5. Pick a timeout and wait for readable descriptors
//! 6. Freeze the clock again
//! 7. `recv()` if something was readable, then `tick()`
//! 8. Report a pending send error
//!
//! Failures from any step go through the [`ErrorTranslator`].

use std::cell::Cell;
use std::io;
use std::os::fd::RawFd;
use std::panic::{self, AssertUnwindSafe};
use std::ptr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use moshlink_core::constants::FALLBACK_WAIT;
use moshlink_core::{
    EventSink, FrameRenderer, LoopClock, OutputSink, Result, SessionEvent, Snapshot, Transport,
};
use tracing::{debug, trace, warn};

use crate::config::SessionConfig;
use crate::failure::{ErrorTranslator, LoopAction, panic_error};
use crate::frame::FrameEmitter;
use crate::monitor::ConnectionMonitor;
use crate::queue::{InputQueue, PendingEvent};

thread_local! {
    /// Shared state of the session whose loop is running on this thread.
    static DRIVING: Cell<*const SharedState> = const { Cell::new(ptr::null()) };
}

/// True when called from inside the [`Driver::run`] that owns `shared`,
/// i.e. from one of that session's own callbacks.
pub(crate) fn is_driving(shared: &Arc<SharedState>) -> bool {
    DRIVING.with(|current| ptr::eq(current.get(), Arc::as_ptr(shared)))
}

// =============================================================================
// Shared State
// =============================================================================

/// State shared between producer threads and the driver.
///
/// The flags are hints read with relaxed ordering. A flag flip racing an
/// iteration takes effect one frame late, which the loop tolerates.
#[derive(Debug)]
pub struct SharedState {
    pub(crate) queue: InputQueue,
    running: AtomicBool,
    output_enabled: AtomicBool,
    repaint_requested: AtomicBool,
    connected: AtomicBool,
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedState {
    /// Output enabled, first frame a full redraw.
    pub fn new() -> Self {
        Self {
            queue: InputQueue::new(),
            running: AtomicBool::new(false),
            output_enabled: AtomicBool::new(true),
            repaint_requested: AtomicBool::new(true),
            connected: AtomicBool::new(false),
        }
    }

    pub fn queue(&self) -> &InputQueue {
        &self.queue
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    pub(crate) fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::Relaxed);
    }

    pub fn output_enabled(&self) -> bool {
        self.output_enabled.load(Ordering::Relaxed)
    }

    /// Re-enabling output also requests a full redraw.
    pub fn set_output_enabled(&self, enabled: bool) {
        self.output_enabled.store(enabled, Ordering::Relaxed);
        if enabled {
            self.request_repaint();
        }
    }

    pub fn request_repaint(&self) {
        self.repaint_requested.store(true, Ordering::Relaxed);
    }

    pub fn repaint_requested(&self) -> bool {
        self.repaint_requested.load(Ordering::Relaxed)
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }
}

// =============================================================================
// Driver
// =============================================================================

/// Single-threaded event loop around one transport.
pub struct Driver<T: Transport> {
    transport: T,
    frames: FrameEmitter<T::Snapshot>,
    monitor: ConnectionMonitor,
    translator: ErrorTranslator,
    clock: LoopClock,
    output: Box<dyn OutputSink>,
    events: Box<dyn EventSink>,
    shared: Arc<SharedState>,
    connecting_wait_cap: Duration,
    disable_core_dumps: bool,
    iterations: u64,
}

impl<T: Transport> Driver<T> {
    pub fn new(
        transport: T,
        renderer: Box<dyn FrameRenderer<T::Snapshot>>,
        output: Box<dyn OutputSink>,
        events: Box<dyn EventSink>,
        shared: Arc<SharedState>,
        config: &SessionConfig,
    ) -> Self {
        let blank = <T::Snapshot as Snapshot>::blank(config.cols, config.rows);
        Self {
            transport,
            frames: FrameEmitter::new(renderer, blank),
            monitor: ConnectionMonitor::new(),
            translator: ErrorTranslator::new(config.network_error_backoff),
            clock: LoopClock::new(),
            output,
            events,
            shared,
            connecting_wait_cap: config.connecting_wait_cap,
            disable_core_dumps: config.disable_core_dumps,
            iterations: 0,
        }
    }

    /// Loop until the running flag is cleared or a fatal failure occurs,
    /// then emit `Exit` and hand the driver back.
    ///
    /// A fatal exit clears the running flag itself.
    pub fn run(mut self) -> Self {
        let previous = DRIVING.with(|current| current.replace(Arc::as_ptr(&self.shared)));
        if self.disable_core_dumps {
            disable_core_dumps();
        }
        debug!(iterations = self.iterations, "driver loop starting");

        let exit_message = loop {
            if !self.shared.is_running() {
                break None;
            }
            if let Err(err) = self.iterate_guarded() {
                match self.translator.handle(&err, &mut self.clock, self.events.as_mut()) {
                    LoopAction::Continue => {}
                    LoopAction::Exit(message) => break Some(message),
                }
            }
        };

        self.shared.set_running(false);
        debug!(
            iterations = self.iterations,
            failed = exit_message.is_some(),
            "driver loop exited"
        );
        self.events.on_event(SessionEvent::exit(exit_message));
        DRIVING.with(|current| current.set(previous));
        self
    }

    /// The transport this driver owns.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Snapshot last delivered to the output sink.
    pub fn local_snapshot(&self) -> &T::Snapshot {
        self.frames.local()
    }

    /// Completed and failed iterations across all runs.
    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    fn iterate_guarded(&mut self) -> Result<()> {
        self.iterations += 1;
        match panic::catch_unwind(AssertUnwindSafe(|| self.iterate())) {
            Ok(result) => result,
            Err(payload) => Err(panic_error(payload.as_ref())),
        }
    }

    fn iterate(&mut self) -> Result<()> {
        let now = self.clock.freeze();

        self.drain_input()?;

        if self.shared.output_enabled() {
            self.frames.emit(
                self.transport.remote_state(),
                &self.shared.repaint_requested,
                self.output.as_mut(),
            );
        }

        if !self.monitor.is_reported()
            && self.monitor.check(&self.transport, self.events.as_mut())
        {
            self.shared.connected.store(true, Ordering::Relaxed);
        }

        let timeout = wait_timeout(
            self.transport.wait_time(now),
            self.transport.remote_state_num(),
            self.connecting_wait_cap,
        );
        let readable = self.wait_readable(timeout)?;

        let now = self.clock.freeze();
        if readable {
            self.transport.recv(now)?;
        }
        self.transport.tick(now)?;

        if let Some(message) = self.transport.send_error() {
            let message = message.to_string();
            warn!(error = %message, "send failed");
            self.events.on_event(SessionEvent::network_error(message));
            self.transport.clear_send_error();
        }
        Ok(())
    }

    fn drain_input(&mut self) -> Result<()> {
        let pending = self.shared.queue.drain_all();
        if pending.is_empty() {
            return Ok(());
        }
        if self.transport.shutdown_in_progress() {
            trace!(dropped = pending.len(), "transport shutting down; input dropped");
            return Ok(());
        }

        trace!(events = pending.len(), "forwarding input");
        for event in pending {
            match event {
                PendingEvent::InputByte(byte) => self.transport.push_user_byte(byte)?,
                PendingEvent::Resize { cols, rows } => {
                    self.transport.push_resize(cols, rows)?;
                    self.shared.request_repaint();
                }
            }
        }
        Ok(())
    }

    fn wait_readable(&self, timeout: Duration) -> Result<bool> {
        let fds = self.transport.fds();
        if fds.is_empty() {
            thread::sleep(timeout);
            return Ok(false);
        }
        Ok(poll_readable(&fds, timeout)?)
    }
}

/// Blocking-wait duration for one iteration.
///
/// `wait_ms` is the transport's suggestion. Until the first remote state
/// arrives it is capped at `connecting_cap`; a negative suggestion means
/// [`FALLBACK_WAIT`].
pub fn wait_timeout(wait_ms: i64, received_states: u64, connecting_cap: Duration) -> Duration {
    let mut wait_ms = wait_ms;
    if received_states == 0 {
        let cap_ms = i64::try_from(connecting_cap.as_millis()).unwrap_or(i64::MAX);
        wait_ms = wait_ms.min(cap_ms);
    }
    match u64::try_from(wait_ms) {
        Ok(ms) => Duration::from_millis(ms),
        Err(_) => FALLBACK_WAIT,
    }
}

/// Wait until any of `fds` is readable or `timeout` elapses.
///
/// An interrupted wait counts as "nothing ready".
pub fn poll_readable(fds: &[RawFd], timeout: Duration) -> io::Result<bool> {
    let mut pollfds: Vec<libc::pollfd> = fds
        .iter()
        .map(|&fd| libc::pollfd {
            fd,
            events: libc::POLLIN,
            revents: 0,
        })
        .collect();
    let timeout_ms = libc::c_int::try_from(timeout.as_millis()).unwrap_or(libc::c_int::MAX);

    // SAFETY: pollfds is a live, exclusively borrowed array of pollfd whose
    // length is passed alongside it.
    let result = unsafe {
        libc::poll(
            pollfds.as_mut_ptr(),
            pollfds.len() as libc::nfds_t,
            timeout_ms,
        )
    };
    if result < 0 {
        let err = io::Error::last_os_error();
        if err.kind() == io::ErrorKind::Interrupted {
            return Ok(false);
        }
        return Err(err);
    }

    let ready = libc::POLLIN | libc::POLLHUP | libc::POLLERR;
    Ok(pollfds.iter().any(|p| p.revents & ready != 0))
}

/// Zero the soft core-dump limit so session keys never land on disk.
fn disable_core_dumps() {
    use nix::sys::resource::{Resource, getrlimit, setrlimit};

    let result = getrlimit(Resource::RLIMIT_CORE)
        .and_then(|(_, hard)| setrlimit(Resource::RLIMIT_CORE, 0, hard));
    match result {
        Ok(()) => trace!("core dumps disabled"),
        Err(e) => warn!(error = %e, "failed to disable core dumps"),
    }
}

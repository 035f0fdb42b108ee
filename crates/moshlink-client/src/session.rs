//! Session lifecycle.
//!
//! A [`Session`] binds one remote endpoint and key to one transport for its
//! whole lifetime. The driver runs on a dedicated worker thread between
//! `start()` and `stop()`; producers may call the input methods from any
//! thread at any time.
//!
//! ```text
//! Created --start--> Running --stop--> Stopped --start--> Running ...
//!                       |                 |
//!                       +----drop/destroy-+--> Destroyed
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use moshlink_core::{
    Connector, Display, Error, EventSink, FrameRenderer, OutputSink, Result, TerminalState,
    Transport,
};
use tracing::{debug, error, warn};

use crate::config::SessionConfig;
use crate::driver::{Driver, SharedState, is_driving};

/// Name given to the worker thread.
pub const DRIVER_THREAD_NAME: &str = "moshlink-driver";

enum Worker<T: Transport> {
    /// Not running; the driver is parked here.
    Idle(Driver<T>),
    /// The driver is on the worker thread.
    Running(JoinHandle<Driver<T>>),
    /// The driver was lost to a panic outside the loop or a failed spawn.
    Gone,
}

/// One embedded remote-terminal client.
pub struct Session<T: Transport> {
    config: SessionConfig,
    shared: Arc<SharedState>,
    worker: Mutex<Worker<T>>,
}

impl<T> Session<T>
where
    T: Transport<Snapshot = TerminalState>,
{
    /// Create a session that renders with the built-in [`Display`].
    pub fn create<C, O, E>(config: SessionConfig, connector: &C, output: O, events: E) -> Result<Self>
    where
        C: Connector<Transport = T>,
        O: OutputSink,
        E: EventSink,
    {
        Self::create_with_renderer(config, connector, Box::new(Display::new()), output, events)
    }
}

impl<T: Transport> Session<T> {
    /// Validate `config`, build the transport and announce the initial size.
    ///
    /// Connector failures are returned unchanged. The session starts
    /// stopped.
    pub fn create_with_renderer<C, O, E>(
        config: SessionConfig,
        connector: &C,
        renderer: Box<dyn FrameRenderer<T::Snapshot>>,
        output: O,
        events: E,
    ) -> Result<Self>
    where
        C: Connector<Transport = T>,
        O: OutputSink,
        E: EventSink,
    {
        config.validate()?;

        let mut transport = connector.connect(&config.connect_params())?;
        transport.set_send_delay(config.send_delay);
        transport.push_resize(config.cols, config.rows)?;

        let shared = Arc::new(SharedState::new());
        let driver = Driver::new(
            transport,
            renderer,
            Box::new(output),
            Box::new(events),
            shared.clone(),
            &config,
        );
        debug!(
            address = %config.address,
            port = %config.port,
            cols = config.cols,
            rows = config.rows,
            "session created"
        );

        Ok(Self {
            config,
            shared,
            worker: Mutex::new(Worker::Idle(driver)),
        })
    }

    /// Spawn the worker thread. No-op if already running.
    ///
    /// A worker that ended on its own after a fatal failure is joined first,
    /// so the transport carries over into the new run. Fails only if the
    /// thread cannot be spawned, which also loses the driver.
    pub fn start(&self) -> Result<()> {
        if self.shared.is_running() {
            return Ok(());
        }
        if is_driving(&self.shared) {
            warn!("start() called from this session's own callback; ignored");
            return Ok(());
        }

        let mut worker = self.lock_worker();
        if self.shared.is_running() {
            return Ok(());
        }
        let driver = match std::mem::replace(&mut *worker, Worker::Gone) {
            Worker::Idle(driver) => driver,
            Worker::Running(handle) => match join_worker(handle) {
                Some(driver) => driver,
                None => return Err(Error::internal("session driver was lost")),
            },
            Worker::Gone => return Err(Error::internal("session driver was lost")),
        };

        self.shared.set_running(true);
        let spawned = thread::Builder::new()
            .name(DRIVER_THREAD_NAME.to_string())
            .spawn(move || driver.run());
        match spawned {
            Ok(handle) => {
                debug!("session started");
                *worker = Worker::Running(handle);
                Ok(())
            }
            Err(e) => {
                self.shared.set_running(false);
                error!(error = %e, "failed to spawn driver thread");
                Err(Error::Io(e))
            }
        }
    }

    /// Stop the worker and wait for it to exit. No-op if not running.
    ///
    /// No callback fires after this returns. From inside one of this
    /// session's own callbacks the loop is only told to stop; the join
    /// happens on the next `stop()`, `start()` or drop from outside.
    /// Callbacks of other sessions stop and join normally.
    pub fn stop(&self) {
        if is_driving(&self.shared) {
            self.shared.set_running(false);
            return;
        }

        // Cleared under the lock so a concurrent start() cannot re-arm the
        // flag between the store and the join.
        let mut worker = self.lock_worker();
        self.shared.set_running(false);
        match std::mem::replace(&mut *worker, Worker::Gone) {
            Worker::Running(handle) => {
                if let Some(driver) = join_worker(handle) {
                    *worker = Worker::Idle(driver);
                    debug!("session stopped");
                }
            }
            other => *worker = other,
        }
    }

    /// Stop and release everything. Equivalent to dropping the session.
    pub fn destroy(self) {
        drop(self);
    }

    /// Toggle frame emission. Re-enabling forces the next frame to be a
    /// full redraw of the current remote state.
    pub fn set_output_enabled(&self, enabled: bool) {
        self.shared.set_output_enabled(enabled);
    }

    /// Queue keystrokes. Empty input is ignored.
    pub fn send_input(&self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        self.shared.queue().enqueue_bytes(bytes);
    }

    /// Queue a window-size change. Zero dimensions are ignored.
    pub fn send_resize(&self, cols: u16, rows: u16) {
        if cols == 0 || rows == 0 {
            return;
        }
        self.shared.queue().enqueue_resize(cols, rows);
    }

    pub fn is_running(&self) -> bool {
        self.shared.is_running()
    }

    /// True once the first remote state has been received.
    pub fn is_connected(&self) -> bool {
        self.shared.is_connected()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    fn lock_worker(&self) -> MutexGuard<'_, Worker<T>> {
        self.worker.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Transport> Drop for Session<T> {
    fn drop(&mut self) {
        self.stop();
        debug!("session destroyed");
    }
}

fn join_worker<T: Transport>(handle: JoinHandle<Driver<T>>) -> Option<Driver<T>> {
    match handle.join() {
        Ok(driver) => Some(driver),
        Err(_) => {
            error!("driver thread panicked outside the loop; session unusable");
            None
        }
    }
}

//! First-contact detection.

use moshlink_core::{EventSink, SessionEvent, Transport};
use tracing::debug;

/// Reports `Connected` the first time the transport holds a remote state.
///
/// Lives in the driver, so the reported flag survives stop/start cycles
/// along with the transport.
#[derive(Debug, Default)]
pub struct ConnectionMonitor {
    reported: bool,
}

impl ConnectionMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_reported(&self) -> bool {
        self.reported
    }

    /// Returns true on the observation that emitted `Connected`.
    pub fn check<T>(&mut self, transport: &T, events: &mut dyn EventSink) -> bool
    where
        T: Transport + ?Sized,
    {
        if self.reported || transport.remote_state_num() == 0 {
            return false;
        }
        self.reported = true;
        debug!(states = transport.remote_state_num(), "connected to remote");
        events.on_event(SessionEvent::connected());
        true
    }
}

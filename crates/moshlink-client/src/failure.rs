//! Failure classification for the driver loop.
//!
//! Every failure raised inside a loop iteration ends up here. The
//! translator reports it to the host as an event and decides whether the
//! loop survives.
//!
//! | Failure                   | Event                  | Loop                        |
//! |---------------------------|------------------------|-----------------------------|
//! | `Network`                 | `NetworkError(msg)`    | back off, re-freeze, go on  |
//! | `Crypto { fatal: false }` | `CryptoError(msg)`     | go on                       |
//! | `Crypto { fatal: true }`  | `CryptoError(msg)`     | exit with `msg`             |
//! | anything else             | none                   | exit with `msg`             |

use std::any::Any;
use std::thread;
use std::time::Duration;

use moshlink_core::{Error, EventSink, FailureKind, LoopClock, SessionEvent};
use tracing::{error, warn};

/// What the driver does after a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopAction {
    /// Keep iterating.
    Continue,
    /// Leave the loop; the terminal `Exit` carries this message.
    Exit(String),
}

/// Maps failures to events and loop actions.
#[derive(Debug, Clone)]
pub struct ErrorTranslator {
    backoff: Duration,
}

impl ErrorTranslator {
    /// `backoff` is the pause after a recoverable network failure.
    pub fn new(backoff: Duration) -> Self {
        Self { backoff }
    }

    pub fn handle(
        &self,
        err: &Error,
        clock: &mut LoopClock,
        events: &mut dyn EventSink,
    ) -> LoopAction {
        let message = err.to_string();
        match err.kind() {
            FailureKind::Network => {
                warn!(error = %message, backoff_ms = self.backoff.as_millis() as u64, "network error");
                events.on_event(SessionEvent::network_error(message));
                thread::sleep(self.backoff);
                clock.freeze();
                LoopAction::Continue
            }
            FailureKind::Crypto { fatal: false } => {
                warn!(error = %message, "crypto error");
                events.on_event(SessionEvent::crypto_error(message));
                LoopAction::Continue
            }
            FailureKind::Crypto { fatal: true } => {
                error!(error = %message, "fatal crypto error");
                events.on_event(SessionEvent::crypto_error(message.clone()));
                LoopAction::Exit(message)
            }
            FailureKind::Unclassified => {
                error!(error = %message, "driver loop failed");
                LoopAction::Exit(message)
            }
        }
    }
}

/// Turn a caught panic payload into an [`Error::Internal`].
pub fn panic_error(payload: &(dyn Any + Send)) -> Error {
    let message = if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "driver loop panicked".to_string()
    };
    Error::internal(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use moshlink_core::EventKind;
    use moshlink_test_utils::EventRecorder;
    use std::time::Instant;

    fn translator() -> ErrorTranslator {
        ErrorTranslator::new(Duration::from_millis(20))
    }

    #[test]
    fn network_error_backs_off_and_refreezes() {
        let mut clock = LoopClock::new();
        let mut events = EventRecorder::new();
        let frozen = clock.now();
        let started = Instant::now();

        let action = translator().handle(&Error::network("connection refused"), &mut clock, &mut events);

        assert_eq!(action, LoopAction::Continue);
        assert!(started.elapsed() >= Duration::from_millis(20));
        assert!(clock.now() > frozen);
        assert_eq!(clock.freezes(), 1);
        assert_eq!(
            events.events(),
            vec![SessionEvent::network_error("connection refused")]
        );
    }

    #[test]
    fn recoverable_crypto_error_continues() {
        let mut clock = LoopClock::new();
        let mut events = EventRecorder::new();

        let action = translator().handle(&Error::crypto("replayed packet", false), &mut clock, &mut events);

        assert_eq!(action, LoopAction::Continue);
        assert_eq!(clock.freezes(), 0);
        assert_eq!(events.events(), vec![SessionEvent::crypto_error("replayed packet")]);
    }

    #[test]
    fn fatal_crypto_error_exits_after_event() {
        let mut clock = LoopClock::new();
        let mut events = EventRecorder::new();

        let action = translator().handle(&Error::crypto("key mismatch", true), &mut clock, &mut events);

        assert_eq!(action, LoopAction::Exit("key mismatch".into()));
        assert_eq!(events.kinds(), vec![EventKind::CryptoError]);
    }

    #[test]
    fn unclassified_error_exits_silently() {
        let mut clock = LoopClock::new();
        let mut events = EventRecorder::new();

        let action = translator().handle(&Error::transport("bad state"), &mut clock, &mut events);

        assert_eq!(action, LoopAction::Exit("bad state".into()));
        assert!(events.events().is_empty());
    }

    #[test]
    fn panic_payloads() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_error(payload.as_ref()).to_string(), "boom");

        let payload: Box<dyn Any + Send> = Box::new(String::from("index out of range"));
        assert_eq!(panic_error(payload.as_ref()).to_string(), "index out of range");

        let payload: Box<dyn Any + Send> = Box::new(42u32);
        let err = panic_error(payload.as_ref());
        assert_eq!(err.kind(), FailureKind::Unclassified);
        assert_eq!(err.to_string(), "driver loop panicked");
    }
}

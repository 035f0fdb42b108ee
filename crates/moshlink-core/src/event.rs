//! Session events and the sinks they are delivered to.
//!
//! The driver thread is the only producer for both sinks, so each sink sees
//! an ordered, single-consumer stream: output frames in the order they were
//! rendered, events in the order they happened, with exactly one
//! [`EventKind::Exit`] closing every run.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;

/// Kind of a lifecycle or error event.
///
/// Discriminants match the values exposed through the C ABI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// First remote state received from the peer.
    Connected = 1,
    /// Recoverable transport failure.
    NetworkError = 2,
    /// Crypto-layer failure (fatal or not).
    CryptoError = 3,
    /// The driver loop has ended.
    Exit = 4,
}

impl EventKind {
    /// Short lowercase name, used in logs.
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Connected => "connected",
            EventKind::NetworkError => "network_error",
            EventKind::CryptoError => "crypto_error",
            EventKind::Exit => "exit",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An event delivered to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionEvent {
    pub kind: EventKind,
    pub message: Option<String>,
}

impl SessionEvent {
    pub fn connected() -> Self {
        Self {
            kind: EventKind::Connected,
            message: None,
        }
    }

    pub fn network_error(message: impl Into<String>) -> Self {
        Self {
            kind: EventKind::NetworkError,
            message: Some(message.into()),
        }
    }

    pub fn crypto_error(message: impl Into<String>) -> Self {
        Self {
            kind: EventKind::CryptoError,
            message: Some(message.into()),
        }
    }

    /// Terminal event. `message` is set when a failure ended the loop.
    pub fn exit(message: Option<String>) -> Self {
        Self {
            kind: EventKind::Exit,
            message,
        }
    }
}

// =============================================================================
// Sinks
// =============================================================================

/// Receives rendered terminal diffs.
pub trait OutputSink: Send + 'static {
    /// Called with the raw escape-sequence bytes of one frame.
    fn on_output(&mut self, bytes: &[u8]);
}

/// Receives session events.
pub trait EventSink: Send + 'static {
    fn on_event(&mut self, event: SessionEvent);
}

impl<F> OutputSink for F
where
    F: FnMut(&[u8]) + Send + 'static,
{
    fn on_output(&mut self, bytes: &[u8]) {
        self(bytes)
    }
}

impl<F> EventSink for F
where
    F: FnMut(SessionEvent) + Send + 'static,
{
    fn on_event(&mut self, event: SessionEvent) {
        self(event)
    }
}

impl OutputSink for UnboundedSender<Bytes> {
    fn on_output(&mut self, bytes: &[u8]) {
        if self.send(Bytes::copy_from_slice(bytes)).is_err() {
            tracing::trace!(len = bytes.len(), "output receiver dropped; frame discarded");
        }
    }
}

impl EventSink for UnboundedSender<SessionEvent> {
    fn on_event(&mut self, event: SessionEvent) {
        if let Err(e) = self.send(event) {
            tracing::trace!(kind = %e.0.kind, "event receiver dropped; event discarded");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_set_kind_and_message() {
        assert_eq!(SessionEvent::connected().message, None);
        assert_eq!(
            SessionEvent::network_error("connection refused"),
            SessionEvent {
                kind: EventKind::NetworkError,
                message: Some("connection refused".into()),
            }
        );
        assert_eq!(SessionEvent::exit(None).kind, EventKind::Exit);
    }

    #[test]
    fn discriminants_match_c_values() {
        assert_eq!(EventKind::Connected as i32, 1);
        assert_eq!(EventKind::NetworkError as i32, 2);
        assert_eq!(EventKind::CryptoError as i32, 3);
        assert_eq!(EventKind::Exit as i32, 4);
    }

    #[test]
    fn event_serializes_to_json() {
        let json = serde_json::to_string(&SessionEvent::crypto_error("bad tag")).unwrap();
        assert_eq!(json, r#"{"kind":"crypto_error","message":"bad tag"}"#);

        let back: SessionEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back.kind, EventKind::CryptoError);
    }

    #[test]
    fn closure_sinks() {
        use std::sync::{Arc, Mutex};

        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        let mut events = move |event: SessionEvent| s.lock().unwrap().push(event.kind);
        events.on_event(SessionEvent::connected());
        events.on_event(SessionEvent::exit(None));
        assert_eq!(
            *seen.lock().unwrap(),
            vec![EventKind::Connected, EventKind::Exit]
        );

        let written = Arc::new(Mutex::new(Vec::new()));
        let w = written.clone();
        let mut out = move |bytes: &[u8]| w.lock().unwrap().extend_from_slice(bytes);
        out.on_output(b"abc");
        out.on_output(b"de");
        assert_eq!(*written.lock().unwrap(), b"abcde");
    }

    #[tokio::test]
    async fn channel_sinks_preserve_order() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<SessionEvent>();
        let mut sink = tx;
        sink.on_event(SessionEvent::connected());
        sink.on_event(SessionEvent::network_error("timeout"));
        sink.on_event(SessionEvent::exit(None));
        drop(sink);

        let mut kinds = Vec::new();
        while let Some(event) = rx.recv().await {
            kinds.push(event.kind);
        }
        assert_eq!(
            kinds,
            vec![EventKind::Connected, EventKind::NetworkError, EventKind::Exit]
        );
    }

    #[tokio::test]
    async fn output_channel_copies_frames() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<Bytes>();
        let mut sink = tx;
        sink.on_output(b"\x1b[H");
        assert_eq!(rx.recv().await.unwrap(), Bytes::from_static(b"\x1b[H"));
    }

    #[test]
    fn dropped_receiver_is_ignored() {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel::<SessionEvent>();
        drop(rx);
        let mut sink = tx;
        sink.on_event(SessionEvent::exit(None));
    }
}

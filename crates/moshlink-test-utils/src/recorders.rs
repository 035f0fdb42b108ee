//! Recording doubles for sinks and renderers.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use moshlink_core::event::{EventKind, EventSink, OutputSink, SessionEvent};
use moshlink_core::terminal::TerminalState;
use moshlink_core::transport::FrameRenderer;

/// Poll `condition` every few milliseconds until it holds or `timeout`
/// passes. Returns the final value of the condition.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(2));
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// =============================================================================
// Output
// =============================================================================

/// Output sink that keeps every frame. Clones share the recording.
#[derive(Debug, Clone, Default)]
pub struct OutputRecorder {
    frames: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl OutputRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> Vec<Vec<u8>> {
        lock(&self.frames).clone()
    }

    /// All frames concatenated.
    pub fn bytes(&self) -> Vec<u8> {
        lock(&self.frames).concat()
    }

    pub fn frame_count(&self) -> usize {
        lock(&self.frames).len()
    }

    pub fn wait_for_frames(&self, count: usize, timeout: Duration) -> bool {
        wait_until(timeout, || self.frame_count() >= count)
    }
}

impl OutputSink for OutputRecorder {
    fn on_output(&mut self, bytes: &[u8]) {
        lock(&self.frames).push(bytes.to_vec());
    }
}

// =============================================================================
// Events
// =============================================================================

/// Event sink that keeps every event. Clones share the recording.
#[derive(Debug, Clone, Default)]
pub struct EventRecorder {
    events: Arc<Mutex<Vec<SessionEvent>>>,
}

impl EventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SessionEvent> {
        lock(&self.events).clone()
    }

    pub fn kinds(&self) -> Vec<EventKind> {
        lock(&self.events).iter().map(|e| e.kind).collect()
    }

    pub fn count(&self, kind: EventKind) -> usize {
        lock(&self.events).iter().filter(|e| e.kind == kind).count()
    }

    /// Wait until at least `count` events of `kind` were recorded.
    pub fn wait_for_count(&self, kind: EventKind, count: usize, timeout: Duration) -> bool {
        wait_until(timeout, || self.count(kind) >= count)
    }
}

impl EventSink for EventRecorder {
    fn on_event(&mut self, event: SessionEvent) {
        lock(&self.events).push(event);
    }
}

// =============================================================================
// Renderer
// =============================================================================

/// One `render` call as seen by [`RecordingRenderer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderCall {
    pub incremental: bool,
    pub local: TerminalState,
    pub remote: TerminalState,
}

/// Renderer that records its inputs and returns fixed bytes.
#[derive(Debug, Clone)]
pub struct RecordingRenderer {
    calls: Arc<Mutex<Vec<RenderCall>>>,
    output: Vec<u8>,
}

impl Default for RecordingRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingRenderer {
    /// Returns `b"frame"` for every call.
    pub fn new() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            output: b"frame".to_vec(),
        }
    }

    /// Return `output` for every call instead. Empty means "no diff".
    pub fn with_output(mut self, output: &[u8]) -> Self {
        self.output = output.to_vec();
        self
    }

    pub fn calls(&self) -> usize {
        lock(&self.calls).len()
    }

    pub fn render_calls(&self) -> Vec<RenderCall> {
        lock(&self.calls).clone()
    }

    pub fn incremental_flags(&self) -> Vec<bool> {
        lock(&self.calls).iter().map(|c| c.incremental).collect()
    }

    pub fn wait_for_calls(&self, count: usize, timeout: Duration) -> bool {
        wait_until(timeout, || self.calls() >= count)
    }
}

impl FrameRenderer<TerminalState> for RecordingRenderer {
    fn render(&mut self, incremental: bool, local: &TerminalState, remote: &TerminalState) -> Vec<u8> {
        lock(&self.calls).push(RenderCall {
            incremental,
            local: local.clone(),
            remote: remote.clone(),
        });
        self.output.clone()
    }
}

//! Frame emission.
//!
//! Keeps the snapshot the host is currently displaying and turns the
//! transport's latest remote snapshot into bytes for the output sink.

use std::sync::atomic::{AtomicBool, Ordering};

use moshlink_core::{FrameRenderer, OutputSink, Snapshot};
use tracing::trace;

/// Diffs the displayed snapshot against the remote one.
pub struct FrameEmitter<S> {
    renderer: Box<dyn FrameRenderer<S>>,
    local: S,
    frames: u64,
}

impl<S: Snapshot> FrameEmitter<S> {
    /// `local` is what the host is assumed to display before the first frame.
    pub fn new(renderer: Box<dyn FrameRenderer<S>>, local: S) -> Self {
        Self {
            renderer,
            local,
            frames: 0,
        }
    }

    /// Render one frame and deliver it if it is not empty.
    ///
    /// Consumes the repaint request: the frame is a full redraw if it was
    /// set. The local snapshot becomes `remote` whether or not any bytes
    /// were produced. Returns the number of bytes delivered.
    pub fn emit(&mut self, remote: &S, repaint: &AtomicBool, output: &mut dyn OutputSink) -> usize {
        let incremental = !repaint.swap(false, Ordering::Relaxed);
        let diff = self.renderer.render(incremental, &self.local, remote);
        self.frames += 1;

        if !diff.is_empty() {
            trace!(len = diff.len(), incremental, "emitting frame");
            output.on_output(&diff);
        }
        self.local = remote.clone();
        diff.len()
    }

    /// Snapshot last delivered to the host.
    pub fn local(&self) -> &S {
        &self.local
    }

    /// Number of frames computed so far, including empty ones.
    pub fn frames(&self) -> u64 {
        self.frames
    }
}

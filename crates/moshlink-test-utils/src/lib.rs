//! moshlink-test-utils: Test infrastructure for moshlink.
//!
//! Provides:
//! - MockTransport: Scriptable transport with a shared inspection handle
//! - MockConnector: Connector that builds mock transports and keeps their handles
//! - Recorders: Output, event and renderer doubles that remember every call

mod mock_transport;
mod recorders;

pub use mock_transport::{MockConnector, MockHandle, MockTransport};
pub use recorders::{EventRecorder, OutputRecorder, RecordingRenderer, RenderCall, wait_until};

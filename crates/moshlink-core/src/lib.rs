//! moshlink-core: Shared library for the moshlink embedded terminal client.
//!
//! This crate provides:
//! - Error taxonomy and failure classification
//! - Session events and the output/event sink traits
//! - Transport, connector and frame renderer collaborator traits
//! - Terminal snapshot types and the default ANSI diff renderer
//! - The loop clock used around blocking waits
//! - Logging setup

pub mod constants;
pub mod error;
pub mod event;
pub mod logging;
pub mod terminal;
pub mod timing;
pub mod transport;

pub use error::{Error, FailureKind, Result};
pub use event::{EventKind, EventSink, OutputSink, SessionEvent};
pub use logging::{LogFormat, init_logging};
pub use terminal::{Display, TerminalState};
pub use timing::LoopClock;
pub use transport::{ConnectParams, Connector, FrameRenderer, Snapshot, Transport};

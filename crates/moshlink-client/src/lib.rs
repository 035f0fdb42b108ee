//! moshlink-client: Embeddable session driver for mosh-style remote terminals.
//!
//! Provides:
//! - Session lifecycle (create/start/stop/destroy) with a single worker thread
//! - Thread-safe input and resize ingestion
//! - Frame emission through a pluggable diff renderer
//! - Connection monitoring and failure-to-event translation
//! - A C ABI for non-Rust hosts (`moshlink_client_*`)
//!
//! The state-synchronization protocol itself is supplied by the host through
//! the [`Transport`](moshlink_core::Transport) and
//! [`Connector`](moshlink_core::Connector) traits.

pub mod config;
pub mod driver;
pub mod failure;
pub mod ffi;
pub mod frame;
pub mod monitor;
pub mod queue;
pub mod session;

pub use config::SessionConfig;
pub use driver::{Driver, SharedState};
pub use failure::{ErrorTranslator, LoopAction};
pub use frame::FrameEmitter;
pub use monitor::ConnectionMonitor;
pub use queue::{InputQueue, PendingEvent};
pub use session::Session;

pub use moshlink_core::{
    Error, EventKind, EventSink, OutputSink, Result, SessionEvent, TerminalState,
};

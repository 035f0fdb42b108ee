//! Terminal snapshots and rendering for moshlink.
//!
//! This module provides:
//! - Framebuffer snapshot types (cells, screen, cursor)
//! - The default ANSI diff renderer

mod display;
mod state;

pub use display::Display;
pub use state::{Cell, CellAttrs, Color, Cursor, Screen, TerminalState};

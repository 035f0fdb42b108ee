//! Mosh-style display renderer for terminal snapshots.
//!
//! Converts the difference between two framebuffer snapshots into a minimal
//! stream of ANSI escape sequences. The renderer keeps no history: the
//! caller passes in the snapshot it last delivered and the one to show.

use super::state::{Cell, CellAttrs, Color, TerminalState};
use crate::transport::FrameRenderer;

/// Text rendition (colors and attributes) currently set on the terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct Rendition {
    fg: Color,
    bg: Color,
    attrs: CellAttrs,
}

impl Rendition {
    fn of(cell: &Cell) -> Self {
        Self {
            fg: cell.fg,
            bg: cell.bg,
            attrs: cell.attrs,
        }
    }
}

/// Default ANSI diff renderer.
///
/// Within a frame it tracks where the terminal cursor is and which rendition
/// is active, so it only emits moves and SGR changes that are needed.
///
/// Every cell is assumed to be one column wide: after writing a cell the
/// tracked cursor advances by exactly one column. Snapshots holding
/// double-width characters must carry them as a cell plus a blank
/// continuation cell, or cursor moves after them will be off by one.
#[derive(Debug, Default)]
pub struct Display {
    cursor: Option<(u16, u16)>,
    cursor_visible: Option<bool>,
    rendition: Rendition,
}

impl Display {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate the bytes that turn the screen showing `last` into `new`.
    ///
    /// With `incremental == false`, or when the dimensions differ, the screen
    /// is cleared and redrawn from scratch and `last` is ignored. Otherwise
    /// only changed cells are written, and an unchanged pair of snapshots
    /// produces no output at all.
    pub fn new_frame(
        &mut self,
        incremental: bool,
        last: &TerminalState,
        new: &TerminalState,
    ) -> Vec<u8> {
        let mut output = Vec::new();
        let full = !incremental || last.size() != new.size();

        // Every frame ends with the default rendition.
        self.rendition = Rendition::default();

        if full {
            // Reset scroll region, attributes, then home and clear.
            output.extend_from_slice(b"\x1b[r\x1b[0m\x1b[H\x1b[2J");
            self.cursor = Some((0, 0));
            self.cursor_visible = None;
        } else {
            self.cursor = Some((last.cursor.col, last.cursor.row));
            self.cursor_visible = Some(last.cursor.visible);
        }

        if !full && new.bell_count != last.bell_count {
            output.push(0x07);
        }

        match &new.title {
            Some(title) if full || new.title != last.title => {
                append_osc_title(&mut output, title);
            }
            // Cleared since the last frame: blank the host's title.
            None if !full && last.title.is_some() => append_osc_title(&mut output, ""),
            _ => {}
        }

        for row in 0..new.rows() {
            let Some(new_row) = new.screen().row(row) else {
                continue;
            };
            let old_row = if full { None } else { last.screen().row(row) };
            self.put_row(&mut output, row, new_row, old_row);
        }

        if self.rendition != Rendition::default() {
            output.extend_from_slice(b"\x1b[0m");
            self.rendition = Rendition::default();
        }

        let target = (new.cursor.col, new.cursor.row);
        if self.cursor != Some(target) {
            self.move_to(&mut output, target.0, target.1);
        }

        let visible = new.cursor.visible;
        if self.cursor_visible != Some(visible) {
            output.extend_from_slice(if visible { b"\x1b[?25h" } else { b"\x1b[?25l" });
            self.cursor_visible = Some(visible);
        }

        output
    }

    /// Update a single row with minimal escape sequences.
    ///
    /// Runs of changed blank cells are collected and erased in one go:
    /// with EL when the run reaches the end of the line, ECH when it is
    /// longer than four cells, spaces otherwise.
    fn put_row(
        &mut self,
        output: &mut Vec<u8>,
        row: u16,
        new_cells: &[Cell],
        old_cells: Option<&[Cell]>,
    ) {
        if old_cells == Some(new_cells) {
            return;
        }

        let mut blank_start: Option<u16> = None;
        let cols = new_cells.len() as u16;

        for (col, cell) in new_cells.iter().enumerate() {
            let col = col as u16;
            let changed = match old_cells {
                Some(old) => old.get(col as usize) != Some(cell),
                // Freshly cleared screen: only non-blank cells need drawing.
                None => !cell.is_blank(),
            };

            if changed && cell.is_blank() {
                blank_start.get_or_insert(col);
                continue;
            }

            if let Some(start) = blank_start.take() {
                self.erase(output, row, start, col - start, false);
            }

            if changed {
                if self.cursor != Some((col, row)) {
                    self.move_to(output, col, row);
                }
                self.set_rendition(output, Rendition::of(cell));
                let mut buf = [0u8; 4];
                output.extend_from_slice(cell.ch.encode_utf8(&mut buf).as_bytes());
                self.cursor = Some((col + 1, row));
            }
        }

        if let Some(start) = blank_start {
            self.erase(output, row, start, cols - start, true);
        }
    }

    fn erase(&mut self, output: &mut Vec<u8>, row: u16, col: u16, count: u16, to_eol: bool) {
        if self.cursor != Some((col, row)) {
            self.move_to(output, col, row);
        }
        // Erasures fill with the current background.
        self.set_rendition(output, Rendition::default());

        if to_eol {
            output.extend_from_slice(b"\x1b[K");
        } else if count > 4 {
            output.extend_from_slice(format!("\x1b[{count}X").as_bytes());
        } else {
            output.extend(std::iter::repeat(b' ').take(count as usize));
            self.cursor = Some((col + count, row));
        }
    }

    /// Append a CUP sequence.
    fn move_to(&mut self, output: &mut Vec<u8>, col: u16, row: u16) {
        output.extend_from_slice(format!("\x1b[{};{}H", row as u32 + 1, col as u32 + 1).as_bytes());
        self.cursor = Some((col, row));
    }

    /// Switch to `target` with a single SGR that starts from a reset.
    fn set_rendition(&mut self, output: &mut Vec<u8>, target: Rendition) {
        if self.rendition == target {
            return;
        }

        let mut params = vec!["0".to_string()];
        let attrs = target.attrs;
        for (on, code) in [
            (attrs.bold, "1"),
            (attrs.dim, "2"),
            (attrs.italic, "3"),
            (attrs.underline, "4"),
            (attrs.blink, "5"),
            (attrs.reverse, "7"),
            (attrs.hidden, "8"),
            (attrs.strikethrough, "9"),
        ] {
            if on {
                params.push(code.to_string());
            }
        }
        params.extend(color_to_sgr_params(target.fg, true));
        params.extend(color_to_sgr_params(target.bg, false));

        output.extend_from_slice(b"\x1b[");
        output.extend_from_slice(params.join(";").as_bytes());
        output.push(b'm');
        self.rendition = target;
    }
}

impl FrameRenderer<TerminalState> for Display {
    fn render(
        &mut self,
        incremental: bool,
        local: &TerminalState,
        remote: &TerminalState,
    ) -> Vec<u8> {
        self.new_frame(incremental, local, remote)
    }
}

/// SGR parameters selecting `color`. Default colors need none after a reset.
fn color_to_sgr_params(color: Color, foreground: bool) -> Vec<String> {
    let (base, bright_base, extended) = if foreground { (30, 90, "38") } else { (40, 100, "48") };

    match color {
        Color::Default => Vec::new(),
        Color::Indexed(idx) if idx < 8 => vec![(base + idx as u16).to_string()],
        Color::Indexed(idx) if idx < 16 => vec![(bright_base + (idx as u16 - 8)).to_string()],
        Color::Indexed(idx) => vec![extended.to_string(), "5".to_string(), idx.to_string()],
        Color::Rgb(r, g, b) => vec![
            extended.to_string(),
            "2".to_string(),
            r.to_string(),
            g.to_string(),
            b.to_string(),
        ],
    }
}

/// Append an OSC 0 (icon name and window title) sequence.
fn append_osc_title(output: &mut Vec<u8>, title: &str) {
    output.extend_from_slice(b"\x1b]0;");
    output.extend_from_slice(title.as_bytes());
    output.push(0x07);
}

// =============================================================================
// Tests
// =============================================================================

//! Terminal snapshot types.
//!
//! A [`TerminalState`] is the framebuffer view the driver diffs: a grid of
//! styled cells, the cursor, the window title and a bell counter. It is a
//! passive value type. Transports build it from whatever emulator they run;
//! nothing here interprets escape sequences.

use serde::{Deserialize, Serialize};

use crate::transport::Snapshot;

// =============================================================================
// Color Types
// =============================================================================

/// Terminal color representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Color {
    /// Default foreground/background color.
    #[default]
    Default,
    /// 256-color palette index (0-15 are the standard/bright colors).
    Indexed(u8),
    /// 24-bit RGB color.
    Rgb(u8, u8, u8),
}

// =============================================================================
// Cell Attributes
// =============================================================================

/// Cell display attributes (bold, italic, etc.).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CellAttrs {
    pub bold: bool,
    pub dim: bool,
    pub italic: bool,
    pub underline: bool,
    pub blink: bool,
    pub reverse: bool,
    pub hidden: bool,
    pub strikethrough: bool,
}

impl CellAttrs {
    /// Returns true if all attributes are off.
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }
}

// =============================================================================
// Cell
// =============================================================================

/// A single terminal cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    /// The character displayed (space for empty).
    pub ch: char,
    pub fg: Color,
    pub bg: Color,
    pub attrs: CellAttrs,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            ch: ' ',
            fg: Color::Default,
            bg: Color::Default,
            attrs: CellAttrs::default(),
        }
    }
}

impl Cell {
    /// Create a new cell with a character and default styling.
    pub fn new(ch: char) -> Self {
        Self {
            ch,
            ..Default::default()
        }
    }

    /// Create a cell with full styling.
    pub fn with_style(ch: char, fg: Color, bg: Color, attrs: CellAttrs) -> Self {
        Self { ch, fg, bg, attrs }
    }

    /// A blank cell can be produced by an erase operation: a space with no
    /// attributes and the default background.
    ///
    /// A colored background is not blank, since erasing would lose it.
    pub fn is_blank(&self) -> bool {
        self.ch == ' ' && self.bg == Color::Default && self.attrs.is_default()
    }
}

// =============================================================================
// Cursor
// =============================================================================

/// Cursor state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    pub col: u16,
    pub row: u16,
    pub visible: bool,
}

impl Default for Cursor {
    fn default() -> Self {
        Self {
            col: 0,
            row: 0,
            visible: true,
        }
    }
}

// =============================================================================
// Screen
// =============================================================================

/// A grid of cells, stored row-major.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Screen {
    cells: Vec<Cell>,
    cols: u16,
    rows: u16,
}

impl Screen {
    /// Create a new screen with given dimensions, filled with default cells.
    pub fn new(cols: u16, rows: u16) -> Self {
        Self {
            cells: vec![Cell::default(); cols as usize * rows as usize],
            cols,
            rows,
        }
    }

    pub fn cols(&self) -> u16 {
        self.cols
    }

    pub fn rows(&self) -> u16 {
        self.rows
    }

    fn index(&self, col: u16, row: u16) -> usize {
        row as usize * self.cols as usize + col as usize
    }

    /// Get a cell by position.
    pub fn get(&self, col: u16, row: u16) -> Option<&Cell> {
        if col < self.cols && row < self.rows {
            Some(&self.cells[self.index(col, row)])
        } else {
            None
        }
    }

    /// Set a cell at position. Out-of-bounds writes are ignored.
    pub fn set(&mut self, col: u16, row: u16, cell: Cell) {
        if col < self.cols && row < self.rows {
            let idx = self.index(col, row);
            self.cells[idx] = cell;
        }
    }

    /// Write a string starting at (col, row), clipped at the right edge.
    pub fn put_str(&mut self, col: u16, row: u16, text: &str) {
        for (offset, ch) in text.chars().enumerate() {
            let Ok(offset) = u16::try_from(offset) else {
                break;
            };
            match col.checked_add(offset) {
                Some(c) if c < self.cols => self.set(c, row, Cell::new(ch)),
                _ => break,
            }
        }
    }

    /// Get a row of cells as a slice.
    pub fn row(&self, row: u16) -> Option<&[Cell]> {
        if row < self.rows {
            let start = self.index(0, row);
            Some(&self.cells[start..start + self.cols as usize])
        } else {
            None
        }
    }

    /// Resize the screen, preserving the overlapping region.
    pub fn resize(&mut self, new_cols: u16, new_rows: u16) {
        if new_cols == self.cols && new_rows == self.rows {
            return;
        }

        let mut resized = Screen::new(new_cols, new_rows);
        for row in 0..self.rows.min(new_rows) {
            for col in 0..self.cols.min(new_cols) {
                resized.set(col, row, self.cells[self.index(col, row)].clone());
            }
        }
        *self = resized;
    }
}

// =============================================================================
// Terminal State
// =============================================================================

/// Complete framebuffer snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalState {
    screen: Screen,
    pub cursor: Cursor,
    /// Window/tab title (OSC 0/2).
    pub title: Option<String>,
    /// Number of bells rung so far. A change rings the local bell.
    pub bell_count: u32,
}

impl TerminalState {
    /// Create a blank state with given dimensions.
    pub fn new(cols: u16, rows: u16) -> Self {
        Self {
            screen: Screen::new(cols, rows),
            cursor: Cursor::default(),
            title: None,
            bell_count: 0,
        }
    }

    pub fn screen(&self) -> &Screen {
        &self.screen
    }

    pub fn screen_mut(&mut self) -> &mut Screen {
        &mut self.screen
    }

    pub fn cols(&self) -> u16 {
        self.screen.cols()
    }

    pub fn rows(&self) -> u16 {
        self.screen.rows()
    }

    pub fn size(&self) -> (u16, u16) {
        (self.cols(), self.rows())
    }

    /// Resize the grid and clamp the cursor into it.
    pub fn resize(&mut self, cols: u16, rows: u16) {
        self.screen.resize(cols, rows);
        self.cursor.col = self.cursor.col.min(cols.saturating_sub(1));
        self.cursor.row = self.cursor.row.min(rows.saturating_sub(1));
    }
}

impl Default for TerminalState {
    fn default() -> Self {
        Self::new(80, 24)
    }
}

impl Snapshot for TerminalState {
    fn blank(cols: u16, rows: u16) -> Self {
        Self::new(cols, rows)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn screen_new_creates_correct_size() {
        let screen = Screen::new(80, 24);
        assert_eq!(screen.cols(), 80);
        assert_eq!(screen.rows(), 24);
        assert_eq!(screen.cells.len(), 80 * 24);
    }

    #[test]
    fn screen_get_set_cell() {
        let mut screen = Screen::new(80, 24);
        screen.set(5, 10, Cell::new('X'));
        assert_eq!(screen.get(5, 10).unwrap().ch, 'X');

        assert!(screen.get(100, 0).is_none());
        assert!(screen.get(0, 100).is_none());

        // Out of bounds writes are dropped
        screen.set(80, 0, Cell::new('Y'));
        assert!(screen.iter_chars().all(|c| c != 'Y'));
    }

    #[test]
    fn put_str_clips_at_edge() {
        let mut screen = Screen::new(5, 1);
        screen.put_str(3, 0, "abc");
        assert_eq!(screen.get(3, 0).unwrap().ch, 'a');
        assert_eq!(screen.get(4, 0).unwrap().ch, 'b');
    }

    #[test]
    fn screen_resize_preserves_content() {
        let mut screen = Screen::new(80, 24);
        screen.set(0, 0, Cell::new('A'));
        screen.set(79, 23, Cell::new('Z'));

        screen.resize(100, 30);
        assert_eq!(screen.get(0, 0).unwrap().ch, 'A');
        assert_eq!(screen.get(79, 23).unwrap().ch, 'Z');

        screen.resize(50, 10);
        assert_eq!(screen.cols(), 50);
        assert_eq!(screen.get(0, 0).unwrap().ch, 'A');
    }

    #[test]
    fn blank_cells() {
        assert!(Cell::default().is_blank());
        assert!(!Cell::new('x').is_blank());

        let colored = Cell::with_style(' ', Color::Default, Color::Indexed(4), CellAttrs::default());
        assert!(!colored.is_blank());

        // Foreground color does not show on a space
        let fg_only = Cell::with_style(' ', Color::Indexed(1), Color::Default, CellAttrs::default());
        assert!(fg_only.is_blank());
    }

    #[test]
    fn resize_clamps_cursor() {
        let mut state = TerminalState::new(80, 24);
        state.cursor.col = 79;
        state.cursor.row = 23;
        state.resize(40, 10);
        assert_eq!(state.size(), (40, 10));
        assert_eq!((state.cursor.col, state.cursor.row), (39, 9));
    }

    #[test]
    fn blank_snapshot_matches_new() {
        assert_eq!(<TerminalState as Snapshot>::blank(10, 4), TerminalState::new(10, 4));
    }

    impl Screen {
        fn iter_chars(&self) -> impl Iterator<Item = char> + '_ {
            self.cells.iter().map(|c| c.ch)
        }
    }
}

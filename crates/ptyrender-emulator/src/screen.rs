//! Screen buffer: a fixed-size grid of styled cells plus cursor state.

use std::sync::Arc;

use unicode_width::UnicodeWidthChar;

use ptyrender_core::{BlockMark, Cell, Dimensions, Position, Result, Style};

/// Tab stops every 8 columns.
const TAB_WIDTH: u16 = 8;

/// Cursor state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    /// Current position
    pub position: Position,
    /// Visibility (DECTCEM)
    pub visible: bool,
}

impl Default for Cursor {
    fn default() -> Self {
        Self {
            position: Position::origin(),
            visible: true,
        }
    }
}

/// State restored by DECRC / CSI u.
#[derive(Debug, Clone)]
struct SavedCursor {
    position: Position,
    style: Style,
    pending_wrap: bool,
}

/// Region cleared by erase operations (ED / EL).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EraseRegion {
    /// Cursor to end of line
    LineToEnd,
    /// Start of line to cursor, inclusive
    LineFromStart,
    /// Entire cursor line
    WholeLine,
    /// Cursor to end of screen
    ScreenToEnd,
    /// Start of screen to cursor, inclusive
    ScreenFromStart,
    /// Entire screen
    WholeScreen,
}

/// Terminal screen buffer.
///
/// Cells are stored row-major. After every operation the cursor satisfies
/// `row < rows` and `col < cols`; writing into the last column arms a pending
/// wrap instead of moving the cursor past the edge.
#[derive(Debug, Clone)]
pub struct Screen {
    cells: Vec<Cell>,
    dimensions: Dimensions,
    cursor: Cursor,
    saved_cursor: Option<SavedCursor>,
    /// Scroll region (top, bottom), 0-indexed, inclusive
    scroll_region: (u16, u16),
    pending_wrap: bool,
    autowrap: bool,
    current_style: Style,
    current_link: Option<Arc<str>>,
    current_mark: Option<BlockMark>,
}

impl Screen {
    /// Create a blank screen with the given dimensions.
    ///
    /// Zero rows or columns are raised to one so the cursor invariant holds;
    /// callers validate sizes before reaching this point.
    pub fn new(dimensions: Dimensions) -> Self {
        let dimensions = Dimensions::new(dimensions.rows.max(1), dimensions.cols.max(1));
        Self {
            cells: vec![Cell::default(); dimensions.cell_count()],
            dimensions,
            cursor: Cursor::default(),
            saved_cursor: None,
            scroll_region: (0, dimensions.rows - 1),
            pending_wrap: false,
            autowrap: true,
            current_style: Style::default(),
            current_link: None,
            current_mark: None,
        }
    }

    fn index(&self, row: u16, col: u16) -> usize {
        row as usize * self.dimensions.cols as usize + col as usize
    }

    fn blank(&self) -> Cell {
        Cell::blank_with_background(self.current_style.background)
    }

    /// Get cell at position.
    ///
    /// Returns None if position is out of bounds.
    pub fn cell(&self, row: u16, col: u16) -> Option<&Cell> {
        if row < self.dimensions.rows && col < self.dimensions.cols {
            self.cells.get(self.index(row, col))
        } else {
            None
        }
    }

    /// Get mutable cell at position.
    pub fn cell_mut(&mut self, row: u16, col: u16) -> Option<&mut Cell> {
        if row < self.dimensions.rows && col < self.dimensions.cols {
            let idx = self.index(row, col);
            self.cells.get_mut(idx)
        } else {
            None
        }
    }

    /// Get entire row as a slice.
    pub fn row(&self, row: u16) -> Option<&[Cell]> {
        if row < self.dimensions.rows {
            let start = self.index(row, 0);
            Some(&self.cells[start..start + self.dimensions.cols as usize])
        } else {
            None
        }
    }

    /// Iterate over all rows, top to bottom.
    pub fn rows(&self) -> impl Iterator<Item = &[Cell]> {
        self.cells.chunks(self.dimensions.cols as usize)
    }

    /// Get dimensions.
    pub fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// Get cursor state.
    pub fn cursor(&self) -> &Cursor {
        &self.cursor
    }

    /// Set cursor visibility.
    pub fn set_cursor_visible(&mut self, visible: bool) {
        self.cursor.visible = visible;
    }

    /// Whether a print at the last column is waiting to wrap.
    pub fn pending_wrap(&self) -> bool {
        self.pending_wrap
    }

    /// Enable or disable automatic wrapping at the right margin (DECAWM).
    pub fn set_autowrap(&mut self, enabled: bool) {
        self.autowrap = enabled;
        if !enabled {
            self.pending_wrap = false;
        }
    }

    /// Style applied to the next printed character.
    pub fn current_style(&self) -> &Style {
        &self.current_style
    }

    /// Replace the style applied to subsequently printed characters.
    pub fn set_current_style(&mut self, style: Style) {
        self.current_style = style;
    }

    /// Active hyperlink target.
    pub fn current_link(&self) -> Option<&str> {
        self.current_link.as_deref()
    }

    /// Set or clear the hyperlink applied to subsequently printed characters.
    pub fn set_link(&mut self, link: Option<&str>) {
        self.current_link = link.map(Arc::from);
    }

    /// Active block marker.
    pub fn current_mark(&self) -> Option<BlockMark> {
        self.current_mark
    }

    /// Set or clear the block marker applied to subsequently printed characters.
    pub fn set_mark(&mut self, mark: Option<BlockMark>) {
        self.current_mark = mark;
    }

    /// Scroll region as (top, bottom), inclusive.
    pub fn scroll_region(&self) -> (u16, u16) {
        self.scroll_region
    }

    /// Place a character at the cursor with the current style and advance.
    ///
    /// Wide glyphs occupy two columns, the second being a spacer cell.
    /// Zero-width characters are dropped.
    pub fn write(&mut self, ch: char) {
        let width = match UnicodeWidthChar::width(ch) {
            Some(w) if w > 0 => w as u16,
            _ => return,
        };
        let cols = self.dimensions.cols;
        if width > cols {
            return;
        }

        if self.pending_wrap {
            self.wrap_line();
        }
        if self.cursor.position.col + width > cols {
            if self.autowrap {
                self.wrap_line();
            } else {
                self.cursor.position.col = cols - width;
            }
        }

        let Position { row, col } = self.cursor.position;
        self.clear_wide_overlap(row, col);
        if width == 2 {
            self.clear_wide_overlap(row, col + 1);
        }

        let cell = Cell {
            character: ch,
            style: self.current_style,
            link: self.current_link.clone(),
            mark: self.current_mark,
            spacer: false,
        };
        if width == 2 {
            let spacer = Cell {
                character: ' ',
                spacer: true,
                ..cell.clone()
            };
            let idx = self.index(row, col + 1);
            self.cells[idx] = spacer;
        }
        let idx = self.index(row, col);
        self.cells[idx] = cell;

        let next = col + width;
        if next >= cols {
            self.cursor.position.col = cols - 1;
            self.pending_wrap = self.autowrap;
        } else {
            self.cursor.position.col = next;
        }
    }

    /// Blank the other half of a wide glyph that is about to be overwritten.
    fn clear_wide_overlap(&mut self, row: u16, col: u16) {
        let idx = self.index(row, col);
        if self.cells[idx].spacer && col > 0 {
            let lead = self.index(row, col - 1);
            self.cells[lead].character = ' ';
        } else if !self.cells[idx].spacer && col + 1 < self.dimensions.cols {
            let next = idx + 1;
            if self.cells[next].spacer {
                self.cells[next].spacer = false;
                self.cells[next].character = ' ';
            }
        }
        self.cells[idx].spacer = false;
    }

    fn wrap_line(&mut self) {
        self.pending_wrap = false;
        self.cursor.position.col = 0;
        self.index_down();
    }

    /// Move the cursor, clamping to screen bounds.
    pub fn move_cursor(&mut self, row: u16, col: u16) {
        self.cursor.position = self.dimensions.clamp(Position::new(row, col));
        self.pending_wrap = false;
    }

    /// Move cursor up by n rows, stopping at the top margin when inside the region.
    pub fn cursor_up(&mut self, n: u16) {
        let (top, _) = self.scroll_region;
        let row = self.cursor.position.row;
        let limit = if row >= top { top } else { 0 };
        self.cursor.position.row = row.saturating_sub(n).max(limit);
        self.pending_wrap = false;
    }

    /// Move cursor down by n rows, stopping at the bottom margin when inside the region.
    pub fn cursor_down(&mut self, n: u16) {
        let (_, bottom) = self.scroll_region;
        let row = self.cursor.position.row;
        let limit = if row <= bottom {
            bottom
        } else {
            self.dimensions.rows - 1
        };
        self.cursor.position.row = row.saturating_add(n).min(limit);
        self.pending_wrap = false;
    }

    /// Move cursor forward by n columns.
    pub fn cursor_forward(&mut self, n: u16) {
        let col = self.cursor.position.col.saturating_add(n);
        self.cursor.position.col = col.min(self.dimensions.cols - 1);
        self.pending_wrap = false;
    }

    /// Move cursor backward by n columns.
    pub fn cursor_backward(&mut self, n: u16) {
        self.cursor.position.col = self.cursor.position.col.saturating_sub(n);
        self.pending_wrap = false;
    }

    /// Line feed: move down one row, scrolling at the bottom margin.
    pub fn linefeed(&mut self) {
        self.pending_wrap = false;
        self.index_down();
    }

    fn index_down(&mut self) {
        let (_, bottom) = self.scroll_region;
        let row = self.cursor.position.row;
        if row == bottom {
            self.scroll_up(1);
        } else if row + 1 < self.dimensions.rows {
            self.cursor.position.row = row + 1;
        }
    }

    /// Reverse index: move up one row, scrolling down at the top margin.
    pub fn reverse_index(&mut self) {
        self.pending_wrap = false;
        let (top, _) = self.scroll_region;
        let row = self.cursor.position.row;
        if row == top {
            self.scroll_down(1);
        } else if row > 0 {
            self.cursor.position.row = row - 1;
        }
    }

    /// Carriage return.
    pub fn carriage_return(&mut self) {
        self.cursor.position.col = 0;
        self.pending_wrap = false;
    }

    /// Backspace: move left one column, never past column 0.
    pub fn backspace(&mut self) {
        self.cursor_backward(1);
    }

    /// Horizontal tab to the next 8-column stop.
    pub fn tab(&mut self) {
        let next = (self.cursor.position.col / TAB_WIDTH + 1) * TAB_WIDTH;
        self.cursor.position.col = next.min(self.dimensions.cols - 1);
        self.pending_wrap = false;
    }

    /// Fill `region` with blanks carrying the current background color.
    pub fn erase(&mut self, region: EraseRegion) {
        let Position { row, col } = self.cursor.position;
        let cols = self.dimensions.cols;
        let rows = self.dimensions.rows;
        match region {
            EraseRegion::LineToEnd => self.fill(row, col, row, cols - 1),
            EraseRegion::LineFromStart => self.fill(row, 0, row, col),
            EraseRegion::WholeLine => self.fill(row, 0, row, cols - 1),
            EraseRegion::ScreenToEnd => self.fill(row, col, rows - 1, cols - 1),
            EraseRegion::ScreenFromStart => self.fill(0, 0, row, col),
            EraseRegion::WholeScreen => self.fill(0, 0, rows - 1, cols - 1),
        }
    }

    /// Fill from (start_row, start_col) through (end_row, end_col) in reading order.
    fn fill(&mut self, start_row: u16, start_col: u16, end_row: u16, end_col: u16) {
        let start = self.index(start_row, start_col);
        let end = self.index(end_row, end_col);
        let blank = self.blank();
        for cell in &mut self.cells[start..=end] {
            *cell = blank.clone();
        }
    }

    fn fill_rows(&mut self, first_row: u16, count: u16, blank: &Cell) {
        let start = self.index(first_row, 0);
        let end = start + count as usize * self.dimensions.cols as usize;
        for cell in &mut self.cells[start..end] {
            *cell = blank.clone();
        }
    }

    /// Scroll the scroll region up by n rows; blank rows enter at the bottom.
    pub fn scroll_up(&mut self, n: u16) {
        let (top, bottom) = self.scroll_region;
        self.shift_rows_up(top, bottom, n);
    }

    /// Scroll the scroll region down by n rows; blank rows enter at the top.
    pub fn scroll_down(&mut self, n: u16) {
        let (top, bottom) = self.scroll_region;
        self.shift_rows_down(top, bottom, n);
    }

    fn shift_rows_up(&mut self, top: u16, bottom: u16, n: u16) {
        let height = bottom - top + 1;
        let n = n.min(height);
        if n == 0 {
            return;
        }
        let cols = self.dimensions.cols as usize;
        let start = self.index(top, 0);
        let end = self.index(bottom, 0) + cols;
        self.cells[start..end].rotate_left(n as usize * cols);
        self.fill_rows(bottom + 1 - n, n, &Cell::default());
    }

    fn shift_rows_down(&mut self, top: u16, bottom: u16, n: u16) {
        let height = bottom - top + 1;
        let n = n.min(height);
        if n == 0 {
            return;
        }
        let cols = self.dimensions.cols as usize;
        let start = self.index(top, 0);
        let end = self.index(bottom, 0) + cols;
        self.cells[start..end].rotate_right(n as usize * cols);
        self.fill_rows(top, n, &Cell::default());
    }

    fn cursor_in_scroll_region(&self) -> bool {
        let (top, bottom) = self.scroll_region;
        (top..=bottom).contains(&self.cursor.position.row)
    }

    /// Insert n blank lines at the cursor row, pushing lines below toward the bottom margin.
    pub fn insert_lines(&mut self, n: u16) {
        if !self.cursor_in_scroll_region() {
            return;
        }
        let (_, bottom) = self.scroll_region;
        self.shift_rows_down(self.cursor.position.row, bottom, n);
        self.carriage_return();
    }

    /// Delete n lines at the cursor row, pulling lines up from the bottom margin.
    pub fn delete_lines(&mut self, n: u16) {
        if !self.cursor_in_scroll_region() {
            return;
        }
        let (_, bottom) = self.scroll_region;
        self.shift_rows_up(self.cursor.position.row, bottom, n);
        self.carriage_return();
    }

    fn cursor_row_tail(&mut self) -> &mut [Cell] {
        let Position { row, col } = self.cursor.position;
        let start = self.index(row, col);
        let end = self.index(row, 0) + self.dimensions.cols as usize;
        &mut self.cells[start..end]
    }

    /// Insert n blank cells at the cursor, shifting the rest of the line right.
    pub fn insert_chars(&mut self, n: u16) {
        let blank = self.blank();
        let tail = self.cursor_row_tail();
        let n = (n as usize).min(tail.len());
        tail.rotate_right(n);
        for cell in &mut tail[..n] {
            *cell = blank.clone();
        }
        self.repair_wide_glyphs();
        self.pending_wrap = false;
    }

    /// Delete n cells at the cursor, shifting the rest of the line left.
    pub fn delete_chars(&mut self, n: u16) {
        let blank = self.blank();
        let tail = self.cursor_row_tail();
        let len = tail.len();
        let n = (n as usize).min(len);
        tail.rotate_left(n);
        for cell in &mut tail[len - n..] {
            *cell = blank.clone();
        }
        self.repair_wide_glyphs();
        self.pending_wrap = false;
    }

    /// Erase n cells starting at the cursor without shifting.
    pub fn erase_chars(&mut self, n: u16) {
        let blank = self.blank();
        let tail = self.cursor_row_tail();
        let n = (n as usize).min(tail.len());
        for cell in &mut tail[..n] {
            *cell = blank.clone();
        }
        self.repair_wide_glyphs();
    }

    /// Blank wide-glyph halves on the cursor row that lost their partner.
    fn repair_wide_glyphs(&mut self) {
        let cols = self.dimensions.cols as usize;
        let start = self.index(self.cursor.position.row, 0);
        let line = &mut self.cells[start..start + cols];

        for col in 0..cols {
            if line[col].spacer {
                let has_lead = col > 0 && !line[col - 1].spacer && is_wide(line[col - 1].character);
                if !has_lead {
                    line[col].spacer = false;
                    line[col].character = ' ';
                }
            } else if is_wide(line[col].character)
                && !line.get(col + 1).map_or(false, |next| next.spacer)
            {
                line[col].character = ' ';
            }
        }
    }

    /// Set the scroll region (0-indexed, inclusive) and home the cursor.
    ///
    /// Regions that are empty or out of bounds reset to the full screen.
    pub fn set_scroll_region(&mut self, top: u16, bottom: u16) {
        let last = self.dimensions.rows - 1;
        self.scroll_region = if top < bottom && bottom <= last {
            (top, bottom)
        } else {
            (0, last)
        };
        self.move_cursor(0, 0);
    }

    /// Save cursor position and style.
    pub fn save_cursor(&mut self) {
        self.saved_cursor = Some(SavedCursor {
            position: self.cursor.position,
            style: self.current_style,
            pending_wrap: self.pending_wrap,
        });
    }

    /// Restore saved cursor position and style, or home the cursor if none was saved.
    pub fn restore_cursor(&mut self) {
        match self.saved_cursor.clone() {
            Some(saved) => {
                self.cursor.position = self.dimensions.clamp(saved.position);
                self.current_style = saved.style;
                self.pending_wrap = saved.pending_wrap;
            }
            None => {
                self.move_cursor(0, 0);
                self.current_style = Style::default();
            }
        }
    }

    /// Resize the screen, preserving the top-left overlapping rectangle.
    ///
    /// Newly exposed cells are blank with default style, the cursor is
    /// re-clamped and the scroll region resets to the full screen. Sizes with
    /// zero rows or columns are rejected and the prior state is retained.
    pub fn resize(&mut self, new_dimensions: Dimensions) -> Result<()> {
        new_dimensions.validate()?;
        if new_dimensions == self.dimensions {
            return Ok(());
        }

        let mut new_cells = vec![Cell::default(); new_dimensions.cell_count()];
        let copy_rows = self.dimensions.rows.min(new_dimensions.rows) as usize;
        let copy_cols = self.dimensions.cols.min(new_dimensions.cols) as usize;
        let old_cols = self.dimensions.cols as usize;
        let new_cols = new_dimensions.cols as usize;

        for row in 0..copy_rows {
            let old = &self.cells[row * old_cols..row * old_cols + copy_cols];
            let new = &mut new_cells[row * new_cols..row * new_cols + copy_cols];
            new.clone_from_slice(old);

            // A wide glyph whose spacer fell outside the new width cannot be shown
            let last = &mut new[copy_cols - 1];
            if copy_cols < old_cols && !last.spacer && is_wide(last.character) {
                last.character = ' ';
            }
        }

        self.cells = new_cells;
        self.dimensions = new_dimensions;
        self.cursor.position = new_dimensions.clamp(self.cursor.position);
        self.scroll_region = (0, new_dimensions.rows - 1);
        self.pending_wrap = false;
        Ok(())
    }

    /// Full reset (RIS): blank screen, default style, cursor home.
    pub fn reset(&mut self) {
        *self = Self::new(self.dimensions);
    }

    /// Text of a row up to its last non-blank cell; spacer cells contribute nothing.
    pub fn row_text(&self, row: u16) -> String {
        self.row(row).map(row_text).unwrap_or_default()
    }

    /// Plain-text rendering: one line per row, trailing blank cells trimmed,
    /// no trailing newline after the last row.
    pub fn to_plain_text(&self) -> String {
        self.rows().map(row_text).collect::<Vec<_>>().join("\n")
    }
}

fn is_wide(ch: char) -> bool {
    ch.width().unwrap_or(1) > 1
}

/// Number of leading cells in `cells` that carry visible content or styling.
pub fn significant_len(cells: &[Cell]) -> usize {
    cells
        .iter()
        .rposition(|cell| !cell.is_blank())
        .map_or(0, |last| last + 1)
}

fn row_text(cells: &[Cell]) -> String {
    cells[..significant_len(cells)]
        .iter()
        .filter(|cell| !cell.spacer)
        .map(|cell| cell.character)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ptyrender_core::Color;

    fn write_str(screen: &mut Screen, text: &str) {
        for ch in text.chars() {
            screen.write(ch);
        }
    }

    #[test]
    fn test_screen_new() {
        let screen = Screen::new(Dimensions::new(24, 80));
        assert_eq!(screen.dimensions(), Dimensions::new(24, 80));
        assert_eq!(screen.cursor().position, Position::origin());
        assert!(screen.cursor().visible);
        assert!(screen.rows().all(|row| row.iter().all(Cell::is_blank)));
        assert_eq!(screen.scroll_region(), (0, 23));
    }

    #[test]
    fn test_cell_access() {
        let mut screen = Screen::new(Dimensions::new(10, 10));
        screen.cell_mut(5, 5).unwrap().character = 'X';
        assert_eq!(screen.cell(5, 5).unwrap().character, 'X');
        assert!(screen.cell(10, 10).is_none());
        assert!(screen.row(10).is_none());
        assert_eq!(screen.row(5).unwrap().len(), 10);
    }

    #[test]
    fn test_write_advances_cursor() {
        let mut screen = Screen::new(Dimensions::new(24, 80));
        write_str(&mut screen, "HELLO");
        assert_eq!(screen.row_text(0), "HELLO");
        assert_eq!(screen.cursor().position, Position::new(0, 5));
    }

    #[test]
    fn test_write_uses_current_style() {
        let mut screen = Screen::new(Dimensions::new(5, 10));
        let style = Style::default().with_bold().with_foreground(Color::Palette(2));
        screen.set_current_style(style);
        screen.write('A');
        assert_eq!(screen.cell(0, 0).unwrap().style, style);
    }

    #[test]
    fn test_wrap_at_last_column() {
        let mut screen = Screen::new(Dimensions::new(24, 80));
        write_str(&mut screen, &"x".repeat(80));
        assert_eq!(screen.cursor().position, Position::new(0, 79));
        assert!(screen.pending_wrap());

        screen.write('x');
        assert_eq!(screen.cursor().position, Position::new(1, 1));
        assert_eq!(screen.row_text(0), "x".repeat(80));
        assert_eq!(screen.row_text(1), "x");
    }

    #[test]
    fn test_wrap_scrolls_at_bottom() {
        let mut screen = Screen::new(Dimensions::new(2, 3));
        write_str(&mut screen, "abcdefg");
        assert_eq!(screen.row_text(0), "def");
        assert_eq!(screen.row_text(1), "g");
        assert_eq!(screen.cursor().position, Position::new(1, 1));
    }

    #[test]
    fn test_autowrap_disabled_overwrites_last_column() {
        let mut screen = Screen::new(Dimensions::new(2, 3));
        screen.set_autowrap(false);
        write_str(&mut screen, "abcde");
        assert_eq!(screen.row_text(0), "abe");
        assert_eq!(screen.cursor().position, Position::new(0, 2));
    }

    #[test]
    fn test_wide_glyph_uses_spacer() {
        let mut screen = Screen::new(Dimensions::new(2, 4));
        screen.write('中');
        assert_eq!(screen.cursor().position.col, 2);
        assert!(screen.cell(0, 1).unwrap().spacer);
        assert_eq!(screen.row_text(0), "中");

        // Does not fit in the last column: wraps first
        screen.write('a');
        screen.write('文');
        assert_eq!(screen.row_text(0), "中a");
        assert_eq!(screen.row_text(1), "文");
    }

    #[test]
    fn test_overwriting_half_of_wide_glyph() {
        let mut screen = Screen::new(Dimensions::new(1, 4));
        screen.write('中');
        screen.move_cursor(0, 1);
        screen.write('x');
        assert_eq!(screen.row_text(0), " x");
        assert!(!screen.cell(0, 1).unwrap().spacer);
    }

    #[test]
    fn test_zero_width_dropped() {
        let mut screen = Screen::new(Dimensions::new(1, 4));
        screen.write('\u{301}');
        assert_eq!(screen.cursor().position.col, 0);
        assert!(screen.cell(0, 0).unwrap().is_blank());
    }

    #[test]
    fn test_move_cursor_clamps() {
        let mut screen = Screen::new(Dimensions::new(24, 80));
        screen.move_cursor(100, 200);
        assert_eq!(screen.cursor().position, Position::new(23, 79));
    }

    #[test]
    fn test_erase_uses_current_background() {
        let mut screen = Screen::new(Dimensions::new(3, 4));
        write_str(&mut screen, "abcd");
        screen.set_current_style(Style::default().with_background(Color::Palette(4)).with_bold());
        screen.move_cursor(0, 2);
        screen.erase(EraseRegion::LineToEnd);

        assert_eq!(screen.cell(0, 1).unwrap().character, 'b');
        let erased = screen.cell(0, 2).unwrap();
        assert_eq!(erased.character, ' ');
        assert_eq!(erased.style.background, Color::Palette(4));
        assert!(!erased.style.bold);
    }

    #[test]
    fn test_erase_regions() {
        let filled = || {
            let mut screen = Screen::new(Dimensions::new(3, 3));
            write_str(&mut screen, "abcdefghi");
            screen.move_cursor(1, 1);
            screen
        };

        let mut screen = filled();
        screen.erase(EraseRegion::LineFromStart);
        assert_eq!(screen.to_plain_text(), "abc\n  f\nghi");

        let mut screen = filled();
        screen.erase(EraseRegion::WholeLine);
        assert_eq!(screen.to_plain_text(), "abc\n\nghi");

        let mut screen = filled();
        screen.erase(EraseRegion::ScreenToEnd);
        assert_eq!(screen.to_plain_text(), "abc\nd\n");

        let mut screen = filled();
        screen.erase(EraseRegion::ScreenFromStart);
        assert_eq!(screen.to_plain_text(), "\n  f\nghi");

        let mut screen = filled();
        screen.erase(EraseRegion::WholeScreen);
        assert_eq!(screen.to_plain_text(), "\n\n");
    }

    #[test]
    fn test_linefeed_scrolls_region_only() {
        let mut screen = Screen::new(Dimensions::new(4, 2));
        for (row, text) in ["a", "b", "c", "d"].iter().enumerate() {
            screen.move_cursor(row as u16, 0);
            write_str(&mut screen, text);
        }
        screen.set_scroll_region(1, 2);
        screen.move_cursor(2, 0);
        screen.linefeed();
        assert_eq!(screen.to_plain_text(), "a\nc\n\nd");
    }

    #[test]
    fn test_reverse_index_scrolls_down_at_top() {
        let mut screen = Screen::new(Dimensions::new(3, 2));
        write_str(&mut screen, "a");
        screen.move_cursor(0, 0);
        screen.reverse_index();
        assert_eq!(screen.to_plain_text(), "\na\n");
    }

    #[test]
    fn test_insert_and_delete_lines() {
        let mut screen = Screen::new(Dimensions::new(4, 2));
        for (row, text) in ["a", "b", "c", "d"].iter().enumerate() {
            screen.move_cursor(row as u16, 0);
            write_str(&mut screen, text);
        }
        screen.move_cursor(1, 1);
        screen.insert_lines(1);
        assert_eq!(screen.to_plain_text(), "a\n\nb\nc");
        assert_eq!(screen.cursor().position, Position::new(1, 0));

        screen.delete_lines(2);
        assert_eq!(screen.to_plain_text(), "a\nc\n\n");
    }

    #[test]
    fn test_insert_lines_outside_region_ignored() {
        let mut screen = Screen::new(Dimensions::new(4, 2));
        write_str(&mut screen, "a");
        screen.set_scroll_region(1, 3);
        screen.move_cursor(0, 0);
        screen.insert_lines(1);
        assert_eq!(screen.row_text(0), "a");
    }

    #[test]
    fn test_insert_delete_erase_chars() {
        let mut screen = Screen::new(Dimensions::new(1, 6));
        write_str(&mut screen, "abcdef");
        screen.move_cursor(0, 1);
        screen.insert_chars(2);
        assert_eq!(screen.row_text(0), "a  bcd");

        screen.delete_chars(3);
        assert_eq!(screen.row_text(0), "acd");

        screen.move_cursor(0, 0);
        screen.erase_chars(2);
        assert_eq!(screen.row_text(0), "  d");
    }

    fn assert_wide_glyphs_paired(screen: &Screen, row: u16) {
        let cells = screen.row(row).unwrap();
        for (col, cell) in cells.iter().enumerate() {
            if !cell.spacer && is_wide(cell.character) {
                assert!(
                    cells.get(col + 1).map_or(false, |next| next.spacer),
                    "wide glyph at column {col} has no spacer"
                );
            }
            if cell.spacer {
                assert!(col > 0 && is_wide(cells[col - 1].character));
            }
        }
    }

    #[test]
    fn test_delete_chars_splitting_wide_glyph() {
        let mut screen = Screen::new(Dimensions::new(1, 8));
        write_str(&mut screen, "\u{4e2d}ab");
        screen.move_cursor(0, 1);
        screen.delete_chars(1);

        assert_wide_glyphs_paired(&screen, 0);
        assert_eq!(screen.row_text(0), " ab");
    }

    #[test]
    fn test_insert_chars_pushing_wide_glyph_to_edge() {
        let mut screen = Screen::new(Dimensions::new(1, 4));
        write_str(&mut screen, "ab\u{4e2d}");
        screen.move_cursor(0, 0);
        screen.insert_chars(1);

        assert_wide_glyphs_paired(&screen, 0);
        assert_eq!(screen.row_text(0), " ab");
        assert_eq!(screen.row(0).unwrap()[3].character, ' ');
    }

    #[test]
    fn test_insert_chars_inside_wide_glyph() {
        let mut screen = Screen::new(Dimensions::new(1, 8));
        write_str(&mut screen, "\u{4e2d}x");
        screen.move_cursor(0, 1);
        screen.insert_chars(2);

        assert_wide_glyphs_paired(&screen, 0);
        assert_eq!(screen.row_text(0), "    x");
    }

    #[test]
    fn test_erase_chars_over_half_of_wide_glyph() {
        let mut screen = Screen::new(Dimensions::new(1, 8));
        write_str(&mut screen, "\u{4e2d}\u{6587}z");
        screen.move_cursor(0, 1);
        screen.erase_chars(2);

        assert_wide_glyphs_paired(&screen, 0);
        assert_eq!(screen.row_text(0), "    z");

        // Intact glyphs are untouched
        let mut screen = Screen::new(Dimensions::new(1, 8));
        write_str(&mut screen, "a\u{4e2d}b");
        screen.move_cursor(0, 0);
        screen.erase_chars(1);
        assert_eq!(screen.row_text(0), " \u{4e2d}b");
        assert!(screen.cell(0, 2).unwrap().spacer);
    }

    #[test]
    fn test_invalid_scroll_region_resets() {
        let mut screen = Screen::new(Dimensions::new(10, 10));
        screen.set_scroll_region(2, 5);
        assert_eq!(screen.scroll_region(), (2, 5));
        screen.set_scroll_region(5, 2);
        assert_eq!(screen.scroll_region(), (0, 9));
        screen.set_scroll_region(0, 50);
        assert_eq!(screen.scroll_region(), (0, 9));
    }

    #[test]
    fn test_tab_stops() {
        let mut screen = Screen::new(Dimensions::new(1, 20));
        screen.tab();
        assert_eq!(screen.cursor().position.col, 8);
        screen.tab();
        assert_eq!(screen.cursor().position.col, 16);
        screen.tab();
        assert_eq!(screen.cursor().position.col, 19);
    }

    #[test]
    fn test_cursor_save_restore() {
        let mut screen = Screen::new(Dimensions::new(24, 80));
        screen.move_cursor(10, 20);
        screen.set_current_style(Style::default().with_bold());
        screen.save_cursor();

        screen.move_cursor(5, 5);
        screen.set_current_style(Style::default());
        screen.restore_cursor();
        assert_eq!(screen.cursor().position, Position::new(10, 20));
        assert!(screen.current_style().bold);
    }

    #[test]
    fn test_resize_preserves_overlap() {
        let mut screen = Screen::new(Dimensions::new(5, 5));
        screen.set_current_style(Style::default().with_bold());
        for _ in 0..25 {
            screen.write('A');
        }

        screen.resize(Dimensions::new(10, 10)).unwrap();
        assert_eq!(screen.dimensions(), Dimensions::new(10, 10));
        assert_eq!(screen.cell(4, 4).unwrap().character, 'A');
        assert!(screen.cell(4, 4).unwrap().style.bold);
        assert!(screen.cell(9, 9).unwrap().is_blank());
        assert!(screen.cell(0, 5).unwrap().is_blank());
    }

    #[test]
    fn test_resize_shrink_then_grow() {
        let mut screen = Screen::new(Dimensions::new(24, 80));
        write_str(&mut screen, "HELLO");
        screen.resize(Dimensions::new(12, 40)).unwrap();
        screen.resize(Dimensions::new(24, 80)).unwrap();
        assert_eq!(screen.row_text(0), "HELLO");
    }

    #[test]
    fn test_resize_clamps_cursor() {
        let mut screen = Screen::new(Dimensions::new(24, 80));
        screen.move_cursor(20, 70);
        screen.resize(Dimensions::new(10, 40)).unwrap();
        assert_eq!(screen.cursor().position, Position::new(9, 39));
    }

    #[test]
    fn test_resize_rejects_zero() {
        let mut screen = Screen::new(Dimensions::new(24, 80));
        write_str(&mut screen, "keep");
        assert!(screen.resize(Dimensions::new(0, 80)).is_err());
        assert!(screen.resize(Dimensions::new(24, 0)).is_err());
        assert_eq!(screen.dimensions(), Dimensions::new(24, 80));
        assert_eq!(screen.row_text(0), "keep");
    }

    #[test]
    fn test_reset() {
        let mut screen = Screen::new(Dimensions::new(3, 3));
        write_str(&mut screen, "abc");
        screen.set_link(Some("https://example.com"));
        screen.reset();
        assert_eq!(screen.to_plain_text(), "\n\n");
        assert!(screen.current_link().is_none());
        assert_eq!(screen.dimensions(), Dimensions::new(3, 3));
    }

    #[test]
    fn test_plain_text_trims_trailing_blanks() {
        let mut screen = Screen::new(Dimensions::new(3, 5));
        write_str(&mut screen, "ab");
        screen.move_cursor(2, 0);
        write_str(&mut screen, "c");
        assert_eq!(screen.to_plain_text(), "ab\n\nc");
    }
}

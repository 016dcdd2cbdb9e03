use crossterm::{
    cursor, execute, queue,
    style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    terminal::{
        self, BeginSynchronizedUpdate, Clear, ClearType, DisableLineWrap, EnableLineWrap,
        EndSynchronizedUpdate, EnterAlternateScreen, LeaveAlternateScreen,
    },
};
use std::io::{self, Write};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Cell {
    pub(crate) ch: char,
    pub(crate) fg: Color,
    pub(crate) bg: Color,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            ch: ' ',
            fg: Color::White,
            bg: Color::Black,
        }
    }
}

pub(crate) struct CellBuffer {
    pub(crate) w: u16,
    pub(crate) h: u16,
    cells: Vec<Cell>,
}

impl CellBuffer {
    pub(crate) fn new(w: u16, h: u16) -> Self {
        Self {
            w,
            h,
            cells: vec![Cell::default(); w as usize * h as usize],
        }
    }

    fn idx(&self, x: u16, y: u16) -> usize {
        y as usize * self.w as usize + x as usize
    }

    /// Off-screen writes are silently dropped.
    pub(crate) fn set(&mut self, x: u16, y: u16, cell: Cell) {
        if x < self.w && y < self.h {
            let i = self.idx(x, y);
            self.cells[i] = cell;
        }
    }

    #[cfg(test)]
    pub(crate) fn get(&self, x: u16, y: u16) -> Cell {
        self.cells[self.idx(x, y)]
    }

    pub(crate) fn clear(&mut self, bg: Color) {
        self.cells.fill(Cell {
            ch: ' ',
            fg: Color::White,
            bg,
        });
    }
}

/// Alternate-screen raw-mode terminal with double buffering. `present`
/// diffs against the previous frame and only emits changed cells.
pub(crate) struct Terminal {
    out: io::Stdout,
    pub(crate) cols: u16,
    pub(crate) rows: u16,
    prev: CellBuffer,
    pub(crate) cur: CellBuffer,
}

impl Terminal {
    pub(crate) fn begin() -> io::Result<Self> {
        let mut out = io::stdout();
        terminal::enable_raw_mode()?;
        execute!(
            out,
            EnterAlternateScreen,
            cursor::Hide,
            DisableLineWrap,
            Clear(ClearType::All)
        )?;
        let (cols, rows) = terminal::size()?;
        Ok(Self {
            out,
            cols,
            rows,
            prev: CellBuffer::new(cols, rows),
            cur: CellBuffer::new(cols, rows),
        })
    }

    pub(crate) fn end(&mut self) -> io::Result<()> {
        execute!(
            self.out,
            ResetColor,
            EnableLineWrap,
            cursor::Show,
            LeaveAlternateScreen
        )?;
        terminal::disable_raw_mode()
    }

    /// Re-query the size; on change, reallocate both buffers and wipe the
    /// screen. Returns true when the caller should rebuild its layout.
    pub(crate) fn resize_if_needed(&mut self) -> io::Result<bool> {
        let (cols, rows) = terminal::size()?;
        if cols == self.cols && rows == self.rows {
            return Ok(false);
        }
        self.cols = cols;
        self.rows = rows;
        self.prev = CellBuffer::new(cols, rows);
        self.cur = CellBuffer::new(cols, rows);
        execute!(self.out, Clear(ClearType::All))?;
        Ok(true)
    }

    pub(crate) fn present(&mut self, diff_only: bool) -> io::Result<()> {
        queue!(self.out, BeginSynchronizedUpdate)?;
        let mut last_fg: Option<Color> = None;
        let mut last_bg: Option<Color> = None;
        let mut cursor_at: Option<(u16, u16)> = None;
        for y in 0..self.rows {
            for x in 0..self.cols {
                let i = y as usize * self.cols as usize + x as usize;
                let cell = self.cur.cells[i];
                if diff_only && self.prev.cells[i] == cell {
                    continue;
                }
                if cursor_at != Some((x, y)) {
                    queue!(self.out, cursor::MoveTo(x, y))?;
                }
                if last_fg != Some(cell.fg) {
                    queue!(self.out, SetForegroundColor(cell.fg))?;
                    last_fg = Some(cell.fg);
                }
                if last_bg != Some(cell.bg) {
                    queue!(self.out, SetBackgroundColor(cell.bg))?;
                    last_bg = Some(cell.bg);
                }
                queue!(self.out, Print(cell.ch))?;
                cursor_at = Some((x.saturating_add(1), y));
                self.prev.cells[i] = cell;
            }
        }
        queue!(self.out, ResetColor, EndSynchronizedUpdate)?;
        self.out.flush()
    }
}

/// Write a string left to right, clipped at the buffer edge.
pub(crate) fn draw_text(buf: &mut CellBuffer, x: u16, y: u16, text: &str, fg: Color, bg: Color) {
    let mut cx = x;
    for ch in text.chars() {
        if cx >= buf.w {
            break;
        }
        buf.set(cx, y, Cell { ch, fg, bg });
        cx = cx.saturating_add(1);
    }
}

//! Terminal rendering. Full redraw every frame: gutter with line numbers,
//! visible text window with tab expansion and selection highlighting, and a
//! one-row bottom bar for prompts or status messages.

use std::io::{self, Write, stdout};

use crossterm::{
    cursor::{Hide, MoveTo, Show},
    queue,
    style::{Attribute, Color, Print, ResetColor, SetAttribute, SetForegroundColor},
    terminal::{self, Clear, ClearType},
};
use unicode_width::UnicodeWidthChar;

use crate::document::Document;

pub struct View {
    pub show_line_numbers: bool,
    pub tab_width: usize,
    scroll_line: usize,
    scroll_col: usize,
}

impl View {
    pub fn new(tab_width: usize) -> Self {
        Self {
            show_line_numbers: true,
            tab_width,
            scroll_line: 0,
            scroll_col: 0,
        }
    }

    /// Redraw the whole screen. `info` is the right-hand status segment
    /// (cursor position, file name), `message` the transient left-hand one.
    /// An active `prompt` of (label, input) takes over the bottom row.
    pub fn render(
        &mut self,
        doc: &Document,
        info: &str,
        message: &str,
        prompt: Option<(&str, &str)>,
    ) -> io::Result<()> {
        let (cols, rows) = terminal::size()?;
        let (cols, rows) = (cols as usize, rows as usize);
        if rows < 2 || cols < 2 {
            return Ok(());
        }
        let text_rows = rows - 1;

        let gutter = if self.show_line_numbers {
            digits(doc.line_count()) + 1
        } else {
            0
        };
        let text_cols = cols.saturating_sub(gutter).max(1);

        let (cur_line, _) = doc.cursor_line_col();
        let cur_vcol = self.visual_col(doc, cur_line);
        self.adjust_scroll(cur_line, cur_vcol, text_rows, text_cols);

        let mut out = stdout();
        queue!(out, Hide)?;

        for row in 0..text_rows {
            let line_idx = self.scroll_line + row;
            queue!(out, MoveTo(0, row as u16), Clear(ClearType::UntilNewLine))?;
            if line_idx >= doc.line_count() {
                continue;
            }
            if gutter > 0 {
                queue!(
                    out,
                    SetForegroundColor(Color::DarkGrey),
                    Print(format!("{:>width$} ", line_idx + 1, width = gutter - 1)),
                    ResetColor
                )?;
            }
            self.draw_line(&mut out, doc, line_idx, text_cols)?;
        }

        // bottom row
        queue!(
            out,
            MoveTo(0, text_rows as u16),
            Clear(ClearType::UntilNewLine)
        )?;
        match prompt {
            Some((label, input)) => {
                let line = format!("{label} {input}");
                queue!(out, Print(truncate_to(&line, cols)))?;
                let x = (label.len() + 1 + input.len()).min(cols - 1);
                queue!(out, MoveTo(x as u16, text_rows as u16), Show)?;
            }
            None => {
                let left = truncate_to(message, cols);
                queue!(out, Print(&left))?;
                if info.len() < cols.saturating_sub(left.len() + 1) {
                    let x = cols - info.len();
                    queue!(out, MoveTo(x as u16, text_rows as u16), Print(info))?;
                }
                let x = gutter + cur_vcol.saturating_sub(self.scroll_col);
                let y = cur_line - self.scroll_line;
                queue!(out, MoveTo(x.min(cols - 1) as u16, y as u16), Show)?;
            }
        }
        out.flush()
    }

    fn adjust_scroll(&mut self, line: usize, vcol: usize, rows: usize, cols: usize) {
        if line < self.scroll_line {
            self.scroll_line = line;
        } else if line >= self.scroll_line + rows {
            self.scroll_line = line + 1 - rows;
        }
        if vcol < self.scroll_col {
            self.scroll_col = vcol;
        } else if vcol >= self.scroll_col + cols {
            self.scroll_col = vcol + 1 - cols;
        }
    }

    /// Visual column of the cursor on its line, counting tab stops and
    /// wide chars.
    fn visual_col(&self, doc: &Document, line: usize) -> usize {
        let start = doc.offset_of_line(line);
        let mut vcol = 0;
        for (i, c) in doc.text[start..].char_indices() {
            if start + i >= doc.cursor || c == '\n' {
                break;
            }
            vcol += self.char_width(c, vcol);
        }
        vcol
    }

    fn char_width(&self, c: char, vcol: usize) -> usize {
        if c == '\t' {
            self.tab_width - (vcol % self.tab_width)
        } else {
            c.width().unwrap_or(0)
        }
    }

    fn draw_line(
        &self,
        out: &mut impl Write,
        doc: &Document,
        line: usize,
        width: usize,
    ) -> io::Result<()> {
        let start = doc.offset_of_line(line);
        let selection = doc.selection;
        let mut vcol = 0;
        let mut reversed = false;
        for (i, c) in doc.text[start..].char_indices() {
            if c == '\n' {
                break;
            }
            let pos = start + i;
            let w = self.char_width(c, vcol);
            if vcol + w > self.scroll_col + width {
                break;
            }
            let selected = selection.is_some_and(|(s, e)| pos >= s && pos < e);
            if selected != reversed {
                let attr = if selected {
                    Attribute::Reverse
                } else {
                    Attribute::NoReverse
                };
                queue!(out, SetAttribute(attr))?;
                reversed = selected;
            }
            if vcol >= self.scroll_col {
                if c == '\t' {
                    queue!(out, Print(" ".repeat(w)))?;
                } else {
                    queue!(out, Print(c))?;
                }
            }
            vcol += w;
        }
        if reversed {
            queue!(out, SetAttribute(Attribute::NoReverse))?;
        }
        Ok(())
    }
}

fn digits(mut n: usize) -> usize {
    let mut d = 1;
    while n >= 10 {
        n /= 10;
        d += 1;
    }
    d
}

fn truncate_to(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

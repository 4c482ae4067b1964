//! The text buffer plus its backing file.
//!
//! A single `String` holds the whole document; the cursor and selection are
//! byte offsets into it (always on char boundaries). All file I/O funnels
//! through here: open, reload, save with backup and save-time fixups.

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::normalize;
use crate::watch;

pub struct Document {
    pub text: String,
    pub path: Option<PathBuf>,
    pub dirty: bool,
    /// Mtime of the backing file as of our last read or write, in
    /// microseconds; 0 means unknown (untitled, or the file never existed).
    pub last_known_mtime: u64,
    pub cursor: usize,
    /// Half-open byte range, start < end when present.
    pub selection: Option<(usize, usize)>,
}

impl Document {
    pub fn new() -> Self {
        Self {
            text: String::new(),
            path: None,
            dirty: false,
            last_known_mtime: 0,
            cursor: 0,
            selection: None,
        }
    }

    /// Open `path`. A missing file is not an error: the result is an empty
    /// buffer already named after the path, so the first save creates it.
    pub fn from_file(path: PathBuf) -> io::Result<Self> {
        match fs::read_to_string(&path) {
            Ok(text) => {
                let mtime = watch::file_mtime_us(&path);
                Ok(Self {
                    text,
                    path: Some(path),
                    dirty: false,
                    last_known_mtime: mtime,
                    cursor: 0,
                    selection: None,
                })
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Self {
                text: String::new(),
                path: Some(path),
                dirty: false,
                last_known_mtime: 0,
                cursor: 0,
                selection: None,
            }),
            Err(e) => Err(e),
        }
    }

    /// Re-read the backing file, discarding the buffer. Cursor is clamped
    /// to the new length; selection and the dirty flag are dropped.
    pub fn reload(&mut self) -> io::Result<()> {
        let path = self
            .path
            .clone()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "no file to reload"))?;
        self.text = fs::read_to_string(&path)?;
        self.last_known_mtime = watch::file_mtime_us(&path);
        self.dirty = false;
        self.selection = None;
        self.clamp_cursor();
        Ok(())
    }

    /// Write the buffer to its file, applying the enabled save fixups to the
    /// buffer itself first so the buffer and the disk copy stay identical.
    /// Returns the number of bytes written.
    pub fn save(&mut self, trim_ws: bool, ensure_newline: bool) -> io::Result<usize> {
        let path = self
            .path
            .clone()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "no file name"))?;
        self.write_to(&path, trim_ws, ensure_newline)
    }

    pub fn save_as(
        &mut self,
        path: PathBuf,
        trim_ws: bool,
        ensure_newline: bool,
    ) -> io::Result<usize> {
        let written = self.write_to(&path, trim_ws, ensure_newline)?;
        self.path = Some(path);
        Ok(written)
    }

    fn write_to(&mut self, path: &Path, trim_ws: bool, ensure_newline: bool) -> io::Result<usize> {
        let fixed = normalize::apply_save_fixes(&self.text, trim_ws, ensure_newline);
        if path.exists() {
            // best effort; a failed backup never blocks the save
            let _ = fs::copy(path, backup_path(path));
        }
        fs::write(path, &fixed)?;
        let written = fixed.len();
        self.text = fixed;
        self.last_known_mtime = watch::file_mtime_us(path);
        self.dirty = false;
        self.selection = None;
        self.clamp_cursor();
        Ok(written)
    }

    pub fn file_name(&self) -> String {
        self.path
            .as_ref()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "Untitled".to_string())
    }

    // --- editing ---

    pub fn insert_char(&mut self, c: char) {
        self.delete_selection();
        self.text.insert(self.cursor, c);
        self.cursor += c.len_utf8();
        self.dirty = true;
    }

    pub fn insert_str(&mut self, s: &str) {
        if s.is_empty() {
            return;
        }
        self.delete_selection();
        self.text.insert_str(self.cursor, s);
        self.cursor += s.len();
        self.dirty = true;
    }

    pub fn backspace(&mut self) {
        if self.delete_selection() {
            return;
        }
        if let Some(prev) = prev_boundary(&self.text, self.cursor) {
            self.text.replace_range(prev..self.cursor, "");
            self.cursor = prev;
            self.dirty = true;
        }
    }

    pub fn delete_forward(&mut self) {
        if self.delete_selection() {
            return;
        }
        if let Some(next) = next_boundary(&self.text, self.cursor) {
            self.text.replace_range(self.cursor..next, "");
            self.dirty = true;
        }
    }

    /// Swap in entirely new text (replace-all results and the like),
    /// keeping the cursor valid.
    pub fn set_text(&mut self, text: String) {
        self.text = text;
        self.dirty = true;
        self.selection = None;
        self.clamp_cursor();
    }

    pub fn replace_range(&mut self, start: usize, end: usize, replacement: &str) {
        self.text.replace_range(start..end, replacement);
        self.cursor = start + replacement.len();
        self.selection = None;
        self.dirty = true;
    }

    // --- selection ---

    pub fn select_all(&mut self) {
        if self.text.is_empty() {
            self.selection = None;
        } else {
            self.selection = Some((0, self.text.len()));
            self.cursor = self.text.len();
        }
    }

    pub fn clear_selection(&mut self) {
        self.selection = None;
    }

    pub fn selected_text(&self) -> Option<&str> {
        self.selection.map(|(start, end)| &self.text[start..end])
    }

    /// Remove the selected range, if any. Returns whether anything was
    /// deleted.
    pub fn delete_selection(&mut self) -> bool {
        if let Some((start, end)) = self.selection.take() {
            self.text.replace_range(start..end, "");
            self.cursor = start;
            self.dirty = true;
            true
        } else {
            false
        }
    }

    // --- movement ---

    pub fn move_left(&mut self) {
        self.selection = None;
        if let Some(prev) = prev_boundary(&self.text, self.cursor) {
            self.cursor = prev;
        }
    }

    pub fn move_right(&mut self) {
        self.selection = None;
        if let Some(next) = next_boundary(&self.text, self.cursor) {
            self.cursor = next;
        }
    }

    pub fn move_up(&mut self, lines: usize) {
        self.selection = None;
        let (line, col) = self.cursor_line_col();
        let target = line.saturating_sub(lines);
        self.cursor = self.offset_at(target, col);
    }

    pub fn move_down(&mut self, lines: usize) {
        self.selection = None;
        let (line, col) = self.cursor_line_col();
        let target = (line + lines).min(self.line_count().saturating_sub(1));
        self.cursor = self.offset_at(target, col);
    }

    pub fn move_home(&mut self) {
        self.selection = None;
        self.cursor = line_start(&self.text, self.cursor);
    }

    pub fn move_end(&mut self) {
        self.selection = None;
        self.cursor = line_end(&self.text, self.cursor);
    }

    /// Jump to a 1-based line number, clamped to the document.
    pub fn goto_line(&mut self, line: usize) {
        self.selection = None;
        let target = line.max(1).min(self.line_count()) - 1;
        self.cursor = self.offset_of_line(target);
    }

    // --- geometry ---

    /// 0-based (line, column-in-chars) of the cursor.
    pub fn cursor_line_col(&self) -> (usize, usize) {
        let start = line_start(&self.text, self.cursor);
        let line = self.text[..start].matches('\n').count();
        let col = self.text[start..self.cursor].chars().count();
        (line, col)
    }

    pub fn line_count(&self) -> usize {
        self.text.split('\n').count()
    }

    /// Byte offset of the first char of 0-based line `line` (assumed valid).
    pub fn offset_of_line(&self, line: usize) -> usize {
        let mut offset = 0;
        for _ in 0..line {
            match self.text[offset..].find('\n') {
                Some(pos) => offset += pos + 1,
                None => break,
            }
        }
        offset
    }

    /// Byte offset of (0-based line, char column), column clamped to the
    /// line's length.
    fn offset_at(&self, line: usize, col: usize) -> usize {
        let start = self.offset_of_line(line);
        let end = line_end(&self.text, start);
        let mut offset = start;
        for c in self.text[start..end].chars().take(col) {
            offset += c.len_utf8();
        }
        offset
    }

    fn clamp_cursor(&mut self) {
        if self.cursor > self.text.len() {
            self.cursor = self.text.len();
        }
        while !self.text.is_char_boundary(self.cursor) {
            self.cursor -= 1;
        }
    }
}

/// `file.txt` -> `file.txt.bak`.
pub fn backup_path(path: &Path) -> PathBuf {
    let mut os: OsString = path.as_os_str().to_owned();
    os.push(".bak");
    PathBuf::from(os)
}

fn prev_boundary(text: &str, pos: usize) -> Option<usize> {
    if pos == 0 {
        return None;
    }
    let mut prev = pos - 1;
    while !text.is_char_boundary(prev) {
        prev -= 1;
    }
    Some(prev)
}

fn next_boundary(text: &str, pos: usize) -> Option<usize> {
    if pos >= text.len() {
        return None;
    }
    let mut next = pos + 1;
    while next < text.len() && !text.is_char_boundary(next) {
        next += 1;
    }
    Some(next)
}

fn line_start(text: &str, pos: usize) -> usize {
    text[..pos].rfind('\n').map(|p| p + 1).unwrap_or(0)
}

fn line_end(text: &str, pos: usize) -> usize {
    text[pos..].find('\n').map(|p| pos + p).unwrap_or(text.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_open_missing_file_is_named_empty_buffer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("new.txt");
        let doc = Document::from_file(path.clone()).unwrap();
        assert_eq!(doc.text, "");
        assert_eq!(doc.path, Some(path));
        assert!(!doc.dirty);
        assert_eq!(doc.last_known_mtime, 0);
    }

    #[test]
    fn test_open_reads_content_and_mtime() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.txt");
        fs::write(&path, "hello\n").unwrap();
        let doc = Document::from_file(path).unwrap();
        assert_eq!(doc.text, "hello\n");
        assert!(doc.last_known_mtime > 0);
    }

    #[test]
    fn test_save_applies_fixes_to_buffer_and_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.txt");
        let mut doc = Document::from_file(path.clone()).unwrap();
        doc.insert_str("a \nb\t\nc");
        let written = doc.save(true, true).unwrap();
        assert_eq!(doc.text, "a\nb\nc\n");
        assert_eq!(written, 6);
        assert_eq!(fs::read_to_string(&path).unwrap(), "a\nb\nc\n");
        assert!(!doc.dirty);
        assert!(doc.last_known_mtime > 0);
    }

    #[test]
    fn test_save_backs_up_previous_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.txt");
        fs::write(&path, "old\n").unwrap();
        let mut doc = Document::from_file(path.clone()).unwrap();
        doc.insert_str("new ");
        doc.save(true, true).unwrap();
        // the backup holds the pre-save bytes, untouched by fixups
        assert_eq!(fs::read_to_string(backup_path(&path)).unwrap(), "old\n");
        assert_eq!(fs::read_to_string(&path).unwrap(), "new old\n");
    }

    #[test]
    fn test_first_save_of_new_file_has_no_backup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.txt");
        let mut doc = Document::from_file(path.clone()).unwrap();
        doc.insert_str("x");
        doc.save(true, true).unwrap();
        assert!(!backup_path(&path).exists());
    }

    #[test]
    fn test_reload_discards_edits() {
        let dir = tempfile::tempdir().unwrap();
        let mut f = tempfile::NamedTempFile::new_in(dir.path()).unwrap();
        writeln!(f, "on disk").unwrap();
        f.flush().unwrap();
        let mut doc = Document::from_file(f.path().to_path_buf()).unwrap();
        doc.insert_str("scratch ");
        assert!(doc.dirty);
        doc.reload().unwrap();
        assert_eq!(doc.text, "on disk\n");
        assert!(!doc.dirty);
    }

    #[test]
    fn test_save_without_path_fails() {
        let mut doc = Document::new();
        doc.insert_str("x");
        assert!(doc.save(true, true).is_err());
    }

    #[test]
    fn test_backspace_and_delete_respect_char_boundaries() {
        let mut doc = Document::new();
        doc.insert_str("aé");
        doc.backspace();
        assert_eq!(doc.text, "a");
        doc.move_left();
        doc.delete_forward();
        assert_eq!(doc.text, "");
    }

    #[test]
    fn test_typing_replaces_selection() {
        let mut doc = Document::new();
        doc.insert_str("hello");
        doc.select_all();
        doc.insert_char('x');
        assert_eq!(doc.text, "x");
        assert_eq!(doc.selection, None);
    }

    #[test]
    fn test_goto_line_is_one_based_and_clamped() {
        let mut doc = Document::new();
        doc.insert_str("one\ntwo\nthree");
        doc.goto_line(2);
        assert_eq!(doc.cursor, 4);
        doc.goto_line(0);
        assert_eq!(doc.cursor, 0);
        doc.goto_line(99);
        assert_eq!(doc.cursor, 8);
    }

    #[test]
    fn test_vertical_movement_keeps_column() {
        let mut doc = Document::new();
        doc.insert_str("abcdef\nxy\nabcdef");
        doc.goto_line(1);
        doc.move_end();
        doc.move_down(1);
        // shorter line clamps the column
        let (line, col) = doc.cursor_line_col();
        assert_eq!((line, col), (1, 2));
        doc.move_down(1);
        let (line, col) = doc.cursor_line_col();
        assert_eq!((line, col), (2, 2));
    }

    #[test]
    fn test_backup_path_appends_suffix() {
        assert_eq!(
            backup_path(Path::new("/tmp/notes.txt")),
            PathBuf::from("/tmp/notes.txt.bak")
        );
    }
}

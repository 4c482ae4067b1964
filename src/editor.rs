//! The interactive editor shell: event loop, key dispatch, prompts, and the
//! status line. All user-visible feedback goes through `status_message`.

use std::io::stdout;
use std::path::PathBuf;

use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{
        self, EnterAlternateScreen, LeaveAlternateScreen, SetTitle, disable_raw_mode,
        enable_raw_mode,
    },
};

use crate::config::Config;
use crate::document::Document;
use crate::search::SearchEngine;
use crate::view::View;
use crate::watch::{Decision, FileWatch};

const FONT_PT_MIN: u16 = 7;
const FONT_PT_MAX: u16 = 32;

enum Mode {
    Edit,
    Prompt(Prompt),
}

struct Prompt {
    kind: PromptKind,
    input: String,
}

enum PromptKind {
    OpenPath,
    SaveAsPath,
    FindPattern,
    ReplacePattern,
    ReplaceWith { pattern: String },
    ReplaceAction { pattern: String, replacement: String },
    GotoLine,
    Confirm { question: String, action: PendingAction },
}

impl PromptKind {
    fn label(&self) -> String {
        match self {
            PromptKind::OpenPath => "Open file:".to_string(),
            PromptKind::SaveAsPath => "Save as:".to_string(),
            PromptKind::FindPattern => "Find:".to_string(),
            PromptKind::ReplacePattern => "Replace:".to_string(),
            PromptKind::ReplaceWith { .. } => "With:".to_string(),
            PromptKind::ReplaceAction { .. } => "(r)eplace, (a)ll, Esc:".to_string(),
            PromptKind::GotoLine => "Go to line:".to_string(),
            PromptKind::Confirm { question, .. } => question.clone(),
        }
    }
}

#[derive(Clone)]
enum PendingAction {
    NewFile,
    OpenPrompt,
    Reload,
    ExternalReload,
    Quit,
}

pub struct Editor {
    document: Document,
    search: SearchEngine,
    watch: FileWatch,
    config: Config,
    view: View,
    clipboard: Option<arboard::Clipboard>,
    mode: Mode,
    status_message: String,
    last_title: String,
    pending_external: bool,
    quit: bool,
}

impl Editor {
    pub fn new(config: Config, file: Option<PathBuf>) -> Self {
        let view = View::new(config.tab_width);
        let mut editor = Self {
            document: Document::new(),
            search: SearchEngine::new(),
            watch: FileWatch::new(),
            config,
            view,
            clipboard: arboard::Clipboard::new().ok(),
            mode: Mode::Edit,
            status_message: String::new(),
            last_title: String::new(),
            pending_external: false,
            quit: false,
        };
        if let Some(path) = file {
            editor.open_path(path);
        }
        editor
    }

    pub fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        execute!(stdout(), EnterAlternateScreen)?;
        enable_raw_mode()?;

        struct TerminalGuard;
        impl Drop for TerminalGuard {
            fn drop(&mut self) {
                let _ = disable_raw_mode();
                let _ = execute!(stdout(), LeaveAlternateScreen);
            }
        }
        let _guard = TerminalGuard;

        let result = self.run_loop();

        self.config.last_file = self.document.path.clone();
        let _ = self.config.save();

        result
    }

    fn run_loop(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        while !self.quit {
            self.update_title()?;
            let (line, col) = self.document.cursor_line_col();
            let mut info = format!("Ln {}, Col {}", line + 1, col + 1);
            if let Some(path) = &self.document.path {
                info.push_str(&format!("  {}", path.display()));
            }
            if self.document.dirty {
                info.push_str("  (modified)");
            }
            let prompt = match &self.mode {
                Mode::Edit => None,
                Mode::Prompt(p) => Some((p.kind.label(), p.input.clone())),
            };
            self.view.render(
                &self.document,
                &info,
                &self.status_message,
                prompt.as_ref().map(|(l, i)| (l.as_str(), i.as_str())),
            )?;

            if event::poll(std::time::Duration::from_millis(100))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind != KeyEventKind::Release {
                        self.handle_key(key);
                    }
                }
            }
            self.service_watch();
        }
        Ok(())
    }

    fn update_title(&mut self) -> std::io::Result<()> {
        let star = if self.document.dirty { "*" } else { "" };
        let title = format!("{}{} — quill", star, self.document.file_name());
        if title != self.last_title {
            execute!(stdout(), SetTitle(&title))?;
            self.last_title = title;
        }
        Ok(())
    }

    // --- key dispatch ---

    fn handle_key(&mut self, key: KeyEvent) {
        self.status_message.clear();
        match std::mem::replace(&mut self.mode, Mode::Edit) {
            Mode::Edit => self.handle_edit_key(key),
            Mode::Prompt(prompt) => self.handle_prompt_key(prompt, key),
        }
    }

    fn handle_edit_key(&mut self, key: KeyEvent) {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        let shift = key.modifiers.contains(KeyModifiers::SHIFT);
        match key.code {
            KeyCode::Char(c) if ctrl => self.handle_ctrl_key(c, shift),
            KeyCode::F(5) => self.request_reload(),
            KeyCode::Char(c) => self.document.insert_char(c),
            KeyCode::Enter => self.document.insert_char('\n'),
            KeyCode::Tab => {
                let spaces = " ".repeat(self.config.tab_width);
                self.document.insert_str(&spaces);
            }
            KeyCode::Backspace => self.document.backspace(),
            KeyCode::Delete => self.document.delete_forward(),
            KeyCode::Left => self.document.move_left(),
            KeyCode::Right => self.document.move_right(),
            KeyCode::Up => self.document.move_up(1),
            KeyCode::Down => self.document.move_down(1),
            KeyCode::Home => self.document.move_home(),
            KeyCode::End => self.document.move_end(),
            KeyCode::PageUp => self.document.move_up(self.page_height()),
            KeyCode::PageDown => self.document.move_down(self.page_height()),
            KeyCode::Esc => self.document.clear_selection(),
            _ => {}
        }
    }

    fn handle_ctrl_key(&mut self, c: char, shift: bool) {
        match c.to_ascii_lowercase() {
            'n' => self.request_new(),
            'o' => self.request_open(),
            's' if shift => self.prompt(PromptKind::SaveAsPath),
            's' => self.do_save(),
            'q' => self.request_quit(),
            'f' => self.prompt(PromptKind::FindPattern),
            'g' => self.find_next_cmd(shift),
            'h' => self.prompt(PromptKind::ReplacePattern),
            'l' => self.prompt(PromptKind::GotoLine),
            'a' => self.document.select_all(),
            'c' => self.copy_selection(),
            'x' => self.cut_selection(),
            'v' => self.paste(),
            't' => self.toggle_case_sensitive(),
            '+' | '=' => self.zoom_step(1),
            '-' => self.zoom_step(-1),
            '0' => self.zoom_set(11),
            _ => {}
        }
    }

    fn prompt(&mut self, kind: PromptKind) {
        self.mode = Mode::Prompt(Prompt {
            kind,
            input: String::new(),
        });
    }

    fn handle_prompt_key(&mut self, prompt: Prompt, key: KeyEvent) {
        let Prompt { kind, mut input } = prompt;
        match kind {
            PromptKind::Confirm { action, .. } => match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
                    self.run_action(action);
                }
                _ => self.status_message = "Cancelled".to_string(),
            },
            PromptKind::ReplaceAction {
                pattern,
                replacement,
            } => match key.code {
                KeyCode::Char('r') | KeyCode::Char('R') => {
                    self.replace_one_cmd(&replacement);
                    // stay in the prompt for repeated single replacements
                    self.mode = Mode::Prompt(Prompt {
                        kind: PromptKind::ReplaceAction {
                            pattern,
                            replacement,
                        },
                        input: String::new(),
                    });
                }
                KeyCode::Char('a') | KeyCode::Char('A') => {
                    self.replace_all_cmd(&replacement);
                }
                _ => {}
            },
            kind => match key.code {
                KeyCode::Esc => {}
                KeyCode::Enter => self.submit_prompt(kind, input),
                KeyCode::Backspace => {
                    input.pop();
                    self.mode = Mode::Prompt(Prompt { kind, input });
                }
                KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                    input.push(c);
                    self.mode = Mode::Prompt(Prompt { kind, input });
                }
                _ => self.mode = Mode::Prompt(Prompt { kind, input }),
            },
        }
    }

    fn submit_prompt(&mut self, kind: PromptKind, input: String) {
        match kind {
            PromptKind::OpenPath => {
                if !input.is_empty() {
                    self.open_path(PathBuf::from(input));
                }
            }
            PromptKind::SaveAsPath => {
                if !input.is_empty() {
                    self.do_save_as(PathBuf::from(input));
                }
            }
            PromptKind::FindPattern => {
                if !input.is_empty() {
                    self.search.set_pattern(&input, self.search.case_sensitive);
                    self.find_next_cmd(false);
                }
            }
            PromptKind::ReplacePattern => {
                if !input.is_empty() {
                    self.search.set_pattern(&input, self.search.case_sensitive);
                    self.mode = Mode::Prompt(Prompt {
                        kind: PromptKind::ReplaceWith { pattern: input },
                        input: String::new(),
                    });
                }
            }
            PromptKind::ReplaceWith { pattern } => {
                self.mode = Mode::Prompt(Prompt {
                    kind: PromptKind::ReplaceAction {
                        pattern,
                        replacement: input,
                    },
                    input: String::new(),
                });
            }
            PromptKind::GotoLine => {
                if let Ok(line) = input.parse::<usize>() {
                    self.document.goto_line(line);
                } else {
                    self.status_message = format!("Not a line number: {input}");
                }
            }
            PromptKind::Confirm { .. } | PromptKind::ReplaceAction { .. } => {}
        }
    }

    // --- commands ---

    fn confirm(&mut self, question: &str, action: PendingAction) {
        self.mode = Mode::Prompt(Prompt {
            kind: PromptKind::Confirm {
                question: question.to_string(),
                action,
            },
            input: String::new(),
        });
    }

    fn run_action(&mut self, action: PendingAction) {
        match action {
            PendingAction::NewFile => self.do_new(),
            PendingAction::OpenPrompt => self.prompt(PromptKind::OpenPath),
            PendingAction::Reload | PendingAction::ExternalReload => self.do_reload(),
            PendingAction::Quit => self.quit = true,
        }
    }

    fn request_new(&mut self) {
        if self.document.dirty {
            self.confirm(
                "Discard unsaved changes and start a new file? (y/n)",
                PendingAction::NewFile,
            );
        } else {
            self.do_new();
        }
    }

    fn request_open(&mut self) {
        if self.document.dirty {
            self.confirm(
                "Discard unsaved changes and open another file? (y/n)",
                PendingAction::OpenPrompt,
            );
        } else {
            self.prompt(PromptKind::OpenPath);
        }
    }

    fn request_reload(&mut self) {
        if self.document.path.is_none() {
            self.status_message = "No file to reload".to_string();
            return;
        }
        if self.document.dirty {
            self.confirm(
                "Discard unsaved changes and reload? (y/n)",
                PendingAction::Reload,
            );
        } else {
            self.do_reload();
        }
    }

    fn request_quit(&mut self) {
        if self.document.dirty {
            self.confirm(
                "Discard unsaved changes and quit? (y/n)",
                PendingAction::Quit,
            );
        } else {
            self.quit = true;
        }
    }

    fn do_new(&mut self) {
        self.watch.stop_watching();
        self.pending_external = false;
        self.document = Document::new();
        self.search.reset();
    }

    fn open_path(&mut self, path: PathBuf) {
        match Document::from_file(path) {
            Ok(doc) => {
                let existed = doc.last_known_mtime != 0;
                self.document = doc;
                self.search.reset();
                self.pending_external = false;
                if existed {
                    let path = self.document.path.clone();
                    if let Some(path) = path {
                        self.watch.start_watching(&path);
                    }
                } else {
                    self.watch.stop_watching();
                    self.status_message = format!("New file: {}", self.document.file_name());
                }
            }
            Err(e) => self.status_message = format!("Cannot open: {e}"),
        }
    }

    fn do_reload(&mut self) {
        match self.document.reload() {
            Ok(()) => {
                self.search.reset();
                self.pending_external = false;
                let path = self.document.path.clone();
                if let Some(path) = path {
                    self.watch.start_watching(&path);
                }
                self.status_message = format!("Reloaded \"{}\"", self.document.file_name());
            }
            Err(e) => self.status_message = format!("Reload failed: {e}"),
        }
    }

    fn do_save(&mut self) {
        if self.document.path.is_none() {
            self.prompt(PromptKind::SaveAsPath);
            return;
        }
        self.watch.mark_own_write();
        match self
            .document
            .save(self.config.trim_ws_on_save, self.config.ensure_newline_eof)
        {
            Ok(written) => {
                self.status_message =
                    format!("\"{}\" {}B written", self.document.file_name(), written);
            }
            Err(e) => self.status_message = format!("Save failed: {e}"),
        }
    }

    fn do_save_as(&mut self, path: PathBuf) {
        self.watch.stop_watching();
        match self.document.save_as(
            path,
            self.config.trim_ws_on_save,
            self.config.ensure_newline_eof,
        ) {
            Ok(written) => {
                let path = self.document.path.clone();
                if let Some(path) = path {
                    self.watch.start_watching(&path);
                }
                self.status_message =
                    format!("\"{}\" {}B written", self.document.file_name(), written);
            }
            Err(e) => self.status_message = format!("Save failed: {e}"),
        }
    }

    fn find_next_cmd(&mut self, backwards: bool) {
        if !self.search.has_pattern() {
            self.status_message = "No search pattern".to_string();
            return;
        }
        let cursor = self.document.cursor;
        match self.search.find_next(&self.document.text, cursor, backwards) {
            Some(m) => {
                self.document.selection = Some((m.start, m.end));
                self.document.cursor = if backwards { m.start } else { m.end };
                self.status_message = format!("Found \"{}\"", self.search.pattern);
            }
            None => {
                self.status_message = format!("Pattern not found: {}", self.search.pattern);
            }
        }
    }

    fn replace_one_cmd(&mut self, replacement: &str) {
        let selection = self.document.selection;
        let cursor = self.document.cursor;
        match self
            .search
            .replace_one(&self.document.text, selection, cursor, replacement)
        {
            Some((text, span)) => {
                self.document.set_text(text);
                self.document.cursor = span.end;
                // hand the next occurrence to the user before they decide again
                self.find_next_cmd(false);
            }
            None => {
                self.status_message = format!("Pattern not found: {}", self.search.pattern);
            }
        }
    }

    fn replace_all_cmd(&mut self, replacement: &str) {
        let (text, count) = self.search.replace_all(&self.document.text, replacement);
        if count > 0 {
            self.document.set_text(text);
        }
        self.status_message = format!("Replaced {count} occurrence(s)");
    }

    fn copy_selection(&mut self) {
        let Some(text) = self.document.selected_text().map(str::to_string) else {
            self.status_message = "Nothing selected".to_string();
            return;
        };
        match self.clipboard.as_mut() {
            Some(cb) => {
                if cb.set_text(text).is_err() {
                    self.status_message = "Clipboard unavailable".to_string();
                }
            }
            None => self.status_message = "Clipboard unavailable".to_string(),
        }
    }

    fn cut_selection(&mut self) {
        if self.document.selection.is_none() {
            self.status_message = "Nothing selected".to_string();
            return;
        }
        self.copy_selection();
        self.document.delete_selection();
    }

    fn paste(&mut self) {
        let text = self.clipboard.as_mut().and_then(|cb| cb.get_text().ok());
        match text {
            Some(text) if !text.is_empty() => self.document.insert_str(&text),
            Some(_) => {}
            None => self.status_message = "Clipboard unavailable".to_string(),
        }
    }

    fn toggle_case_sensitive(&mut self) {
        let sensitive = !self.search.case_sensitive;
        let pattern = self.search.pattern.clone();
        self.search.set_pattern(&pattern, sensitive);
        self.status_message = if sensitive {
            "Search is now case-sensitive".to_string()
        } else {
            "Search is now case-insensitive".to_string()
        };
    }

    fn zoom_step(&mut self, delta: i32) {
        let pt = (self.config.font_pt as i32 + delta)
            .clamp(FONT_PT_MIN as i32, FONT_PT_MAX as i32) as u16;
        self.zoom_set(pt);
    }

    fn zoom_set(&mut self, pt: u16) {
        self.config.font_pt = pt.clamp(FONT_PT_MIN, FONT_PT_MAX);
        self.status_message = format!("Font size: {}pt", self.config.font_pt);
    }

    // --- external changes ---

    fn service_watch(&mut self) {
        if self.watch.poll() == Decision::ExternalChange {
            self.pending_external = true;
        }
        // hold the notification while a prompt is open
        if !self.pending_external || !matches!(self.mode, Mode::Edit) {
            return;
        }
        self.pending_external = false;
        if self.document.dirty {
            self.confirm(
                "File changed on disk. Reload and lose unsaved changes? (y/n)",
                PendingAction::ExternalReload,
            );
        } else {
            self.do_reload();
        }
    }

    fn page_height(&self) -> usize {
        terminal::size()
            .map(|(_, rows)| (rows as usize).saturating_sub(2).max(1))
            .unwrap_or(20)
    }
}

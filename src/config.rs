//! Persisted preferences and session state.
//!
//! Stored as a small INI-style file (`[section]` plus `key = value` lines)
//! at `$XDG_CONFIG_HOME/quill/config.ini`, falling back to
//! `~/.config/quill/config.ini`. Unknown keys and malformed lines are
//! ignored; an unreadable file falls back to defaults silently.

use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub trim_ws_on_save: bool,
    pub ensure_newline_eof: bool,
    pub tab_width: usize,
    pub font_pt: u16,
    pub last_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            trim_ws_on_save: true,
            ensure_newline_eof: true,
            tab_width: 4,
            font_pt: 11,
            last_file: None,
        }
    }
}

impl Config {
    pub fn config_dir() -> PathBuf {
        if let Ok(xdg) = env::var("XDG_CONFIG_HOME") {
            if !xdg.is_empty() {
                return PathBuf::from(xdg).join("quill");
            }
        }
        let home = env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(".config").join("quill")
    }

    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.ini")
    }

    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> Self {
        let mut config = Self::default();
        if let Ok(content) = fs::read_to_string(path) {
            config.parse_content(&content);
        }
        config
    }

    fn parse_content(&mut self, content: &str) {
        let mut section = String::new();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }
            if line.starts_with('[') && line.ends_with(']') {
                section = line[1..line.len() - 1].to_string();
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let (key, value) = (key.trim(), value.trim());
            match (section.as_str(), key) {
                ("prefs", "trim_ws_on_save") => {
                    if let Some(b) = parse_bool(value) {
                        self.trim_ws_on_save = b;
                    }
                }
                ("prefs", "ensure_newline_eof") => {
                    if let Some(b) = parse_bool(value) {
                        self.ensure_newline_eof = b;
                    }
                }
                ("prefs", "tab_width") => {
                    if let Ok(n) = value.parse::<usize>() {
                        if (1..=16).contains(&n) {
                            self.tab_width = n;
                        }
                    }
                }
                ("prefs", "font_pt") => {
                    if let Ok(n) = value.parse::<u16>() {
                        if (7..=32).contains(&n) {
                            self.font_pt = n;
                        }
                    }
                }
                ("session", "last_file") => {
                    if !value.is_empty() {
                        self.last_file = Some(PathBuf::from(value));
                    }
                }
                _ => {} // unknown setting, ignore
            }
        }
    }

    fn to_ini(&self) -> String {
        let last_file = self
            .last_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        format!(
            "[prefs]\n\
             trim_ws_on_save = {}\n\
             ensure_newline_eof = {}\n\
             tab_width = {}\n\
             font_pt = {}\n\
             \n\
             [session]\n\
             last_file = {}\n",
            self.trim_ws_on_save, self.ensure_newline_eof, self.tab_width, self.font_pt, last_file
        )
    }

    pub fn save(&self) -> io::Result<()> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> io::Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(path, self.to_ini())
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(config.trim_ws_on_save);
        assert!(config.ensure_newline_eof);
        assert_eq!(config.tab_width, 4);
        assert_eq!(config.font_pt, 11);
        assert_eq!(config.last_file, None);
    }

    #[test]
    fn test_parse_sections_and_keys() {
        let mut config = Config::default();
        config.parse_content(
            "# a comment\n\
             [prefs]\n\
             trim_ws_on_save = false\n\
             ensure_newline_eof = false\n\
             tab_width = 8\n\
             font_pt = 14\n\
             \n\
             [session]\n\
             last_file = /tmp/notes.txt\n",
        );
        assert!(!config.trim_ws_on_save);
        assert!(!config.ensure_newline_eof);
        assert_eq!(config.tab_width, 8);
        assert_eq!(config.font_pt, 14);
        assert_eq!(config.last_file, Some(PathBuf::from("/tmp/notes.txt")));
    }

    #[test]
    fn test_invalid_values_ignored() {
        let mut config = Config::default();
        config.parse_content(
            "[prefs]\n\
             tab_width = 0\n\
             tab_width = notanumber\n\
             font_pt = 200\n\
             trim_ws_on_save = maybe\n\
             unknown_key = 1\n\
             [other]\n\
             tab_width = 9\n",
        );
        // all invalid or out of section: defaults survive
        assert_eq!(config.tab_width, 4);
        assert_eq!(config.font_pt, 11);
        assert!(config.trim_ws_on_save);
    }

    #[test]
    fn test_keys_only_apply_in_their_section() {
        let mut config = Config::default();
        config.parse_content("last_file = /tmp/x\n[prefs]\nlast_file = /tmp/y\n");
        assert_eq!(config.last_file, None);
    }

    #[test]
    fn test_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.ini");
        let config = Config {
            trim_ws_on_save: false,
            ensure_newline_eof: true,
            tab_width: 2,
            font_pt: 13,
            last_file: Some(PathBuf::from("/tmp/a.rs")),
        };
        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path), config);
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let loaded = Config::load_from(Path::new("/no/such/config.ini"));
        assert_eq!(loaded, Config::default());
    }
}

mod config;
mod document;
mod editor;
mod normalize;
mod search;
mod view;
mod watch;

use std::path::PathBuf;

use clap::Parser;

use crate::config::Config;
use crate::editor::Editor;

#[derive(Parser)]
#[command(name = "quill", version, about = "A small plain-text editor")]
struct Args {
    /// File to open; defaults to the file from the last session
    file: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = Config::load();
    let path = args.file.or_else(|| config.last_file.clone());
    let mut editor = Editor::new(config, path);
    editor.run()
}

//! Save-time text fixups. Both transforms are pure and their composition
//! (trim first, then ensure-newline) is idempotent.

/// Strip trailing ASCII whitespace (space, tab, CR, ...) from every line.
/// Lines are split and rejoined on `\n`, so line count and order are
/// preserved, including any trailing newline.
pub fn trim_trailing_whitespace(text: &str) -> String {
    text.split('\n')
        .map(|line| line.trim_end_matches(|c: char| c.is_ascii_whitespace()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Append a single `\n` if the text is non-empty and does not already end
/// with one. Never duplicates an existing trailing newline.
pub fn ensure_trailing_newline(text: &str) -> String {
    if text.is_empty() || text.ends_with('\n') {
        text.to_string()
    } else {
        format!("{text}\n")
    }
}

/// Apply the enabled fixups in order: trim, then ensure-newline.
pub fn apply_save_fixes(text: &str, trim_ws: bool, ensure_newline: bool) -> String {
    let mut out = if trim_ws {
        trim_trailing_whitespace(text)
    } else {
        text.to_string()
    };
    if ensure_newline {
        out = ensure_trailing_newline(&out);
    }
    out
}

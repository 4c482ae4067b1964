//! Literal-substring search and replace over the document text.
//!
//! Patterns are plain substrings, not regexes. Case-insensitive matching
//! folds both sides with a locale-independent ASCII lowering. "No match"
//! is a normal outcome; nothing here returns an error.

/// A located occurrence as a half-open byte range into the text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Match {
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone)]
pub struct SearchEngine {
    pub pattern: String,
    pub case_sensitive: bool,
    pub last_match: Option<Match>,
}

impl SearchEngine {
    pub fn new() -> Self {
        Self {
            pattern: String::new(),
            case_sensitive: false,
            last_match: None,
        }
    }

    /// Replace the active pattern. An empty pattern is legal and matches
    /// nothing.
    pub fn set_pattern(&mut self, pattern: &str, case_sensitive: bool) {
        self.pattern = pattern.to_string();
        self.case_sensitive = case_sensitive;
        self.last_match = None;
    }

    /// Drop the active search entirely. Called when the document text is
    /// replaced wholesale (open/reload), which makes any remembered match
    /// stale.
    pub fn reset(&mut self) {
        self.pattern.clear();
        self.last_match = None;
    }

    pub fn has_pattern(&self) -> bool {
        !self.pattern.is_empty()
    }

    fn fold(&self, s: &str) -> String {
        if self.case_sensitive {
            s.to_string()
        } else {
            s.to_ascii_lowercase()
        }
    }

    /// First occurrence starting at or after `from`. Never wraps.
    fn scan_forward(&self, text: &str, from: usize) -> Option<Match> {
        if self.pattern.is_empty() {
            return None;
        }
        let from = from.min(text.len());
        let hay = self.fold(text);
        let needle = self.fold(&self.pattern);
        hay[from..].find(&needle).map(|pos| {
            let start = from + pos;
            Match {
                start,
                end: start + needle.len(),
            }
        })
    }

    /// Occurrence whose start is nearest-but-before `before`. Never wraps.
    fn scan_backward(&self, text: &str, before: usize) -> Option<Match> {
        if self.pattern.is_empty() {
            return None;
        }
        let hay = self.fold(text);
        let needle = self.fold(&self.pattern);
        // Window the haystack so any hit starts strictly before `before`.
        let mut limit = before
            .saturating_add(needle.len())
            .saturating_sub(1)
            .min(hay.len());
        while !hay.is_char_boundary(limit) {
            limit -= 1;
        }
        hay[..limit].rfind(&needle).map(|start| Match {
            start,
            end: start + needle.len(),
        })
    }

    /// Search from `cursor` in the given direction, wrapping exactly once
    /// from the opposite end of the text when the directional scan comes up
    /// empty. Returns `None` if the pattern is absent (or empty). The caller
    /// moves the selection/cursor to the returned range.
    pub fn find_next(&mut self, text: &str, cursor: usize, backwards: bool) -> Option<Match> {
        let hit = if backwards {
            self.scan_backward(text, cursor)
                .or_else(|| self.scan_backward(text, text.len().saturating_add(1)))
        } else {
            self.scan_forward(text, cursor)
                .or_else(|| self.scan_forward(text, 0))
        };
        if hit.is_some() {
            self.last_match = hit;
        }
        hit
    }

    /// Replace the selection if one exists, otherwise the next forward match
    /// from `cursor`. Returns the new text and the span of the inserted
    /// replacement; `None` means nothing matched and the text is unchanged.
    pub fn replace_one(
        &mut self,
        text: &str,
        selection: Option<(usize, usize)>,
        cursor: usize,
        replacement: &str,
    ) -> Option<(String, Match)> {
        let (start, end) = match selection.filter(|(s, e)| s < e) {
            Some(range) => range,
            None => {
                let m = self.find_next(text, cursor, false)?;
                (m.start, m.end)
            }
        };
        let mut out = String::with_capacity(text.len() - (end - start) + replacement.len());
        out.push_str(&text[..start]);
        out.push_str(replacement);
        out.push_str(&text[end..]);
        let span = Match {
            start,
            end: start + replacement.len(),
        };
        self.last_match = Some(span);
        Some((out, span))
    }

    /// Replace every occurrence in a single forward pass from offset 0 (no
    /// wrap). The scan resumes immediately after each inserted replacement,
    /// so replacement text is never rescanned even when it contains the
    /// pattern.
    pub fn replace_all(&mut self, text: &str, replacement: &str) -> (String, usize) {
        let mut out = text.to_string();
        let mut pos = 0;
        let mut count = 0;
        while let Some(m) = self.scan_forward(&out, pos) {
            out.replace_range(m.start..m.end, replacement);
            pos = m.start + replacement.len();
            count += 1;
        }
        if count > 0 {
            self.last_match = None;
        }
        (out, count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine(pattern: &str, case_sensitive: bool) -> SearchEngine {
        let mut e = SearchEngine::new();
        e.set_pattern(pattern, case_sensitive);
        e
    }

    #[test]
    fn test_forward_finds_leftmost() {
        let mut e = engine("ab", true);
        let m = e.find_next("xxabyyab", 0, false).unwrap();
        assert_eq!((m.start, m.end), (2, 4));
    }

    #[test]
    fn test_empty_pattern_matches_nothing() {
        let mut e = engine("", true);
        assert_eq!(e.find_next("anything", 0, false), None);
        assert_eq!(e.find_next("anything", 0, true), None);
    }

    #[test]
    fn test_case_insensitive_scenario() {
        // "Hello World\nhello again\n", pattern "hello", case-insensitive
        let text = "Hello World\nhello again\n";
        let mut e = engine("hello", false);

        let m = e.find_next(text, 0, false).unwrap();
        assert_eq!((m.start, m.end), (0, 5));

        let m = e.find_next(text, 5, false).unwrap();
        assert_eq!((m.start, m.end), (12, 17));

        // past the last occurrence: wraps to the first
        let m = e.find_next(text, 17, false).unwrap();
        assert_eq!((m.start, m.end), (0, 5));
    }

    #[test]
    fn test_wrap_happens_exactly_once() {
        let mut e = engine("needle", true);
        // no occurrence anywhere: both the scan and the single wrap retry miss
        assert_eq!(e.find_next("haystack without it", 7, false), None);
        assert_eq!(e.find_next("haystack without it", 7, true), None);
    }

    #[test]
    fn test_backward_nearest_before_cursor() {
        let text = "ab..ab..ab";
        let mut e = engine("ab", true);

        let m = e.find_next(text, 9, true).unwrap();
        assert_eq!(m.start, 8);

        let m = e.find_next(text, 8, true).unwrap();
        assert_eq!(m.start, 4);

        // nothing before offset 0: wraps to the last occurrence
        let m = e.find_next(text, 0, true).unwrap();
        assert_eq!(m.start, 8);
    }

    #[test]
    fn test_forward_non_overlapping() {
        let mut e = engine("aa", true);
        let m = e.scan_forward("aaa", 0).unwrap();
        assert_eq!((m.start, m.end), (0, 2));
        // next scan resumes past the first match
        let m = e.scan_forward("aaa", m.end);
        assert_eq!(m, None);
    }

    #[test]
    fn test_set_pattern_clears_last_match() {
        let mut e = engine("ab", true);
        e.find_next("ab", 0, false).unwrap();
        assert!(e.last_match.is_some());
        e.set_pattern("cd", true);
        assert_eq!(e.last_match, None);
    }

    #[test]
    fn test_replace_one_uses_selection() {
        let mut e = engine("xx", true);
        let (out, span) = e.replace_one("hello world", Some((0, 5)), 0, "bye").unwrap();
        assert_eq!(out, "bye world");
        assert_eq!((span.start, span.end), (0, 3));
    }

    #[test]
    fn test_replace_one_finds_match_without_selection() {
        let mut e = engine("world", true);
        let (out, span) = e.replace_one("hello world", None, 0, "there").unwrap();
        assert_eq!(out, "hello there");
        assert_eq!((span.start, span.end), (6, 11));
    }

    #[test]
    fn test_replace_one_no_match_is_noop() {
        let mut e = engine("absent", true);
        assert_eq!(e.replace_one("hello", None, 0, "x"), None);
    }

    #[test]
    fn test_replace_all_never_rescans_replacement() {
        // loop guard: "aaa" / "a" -> "aa" must terminate
        let mut e = engine("a", true);
        let (out, count) = e.replace_all("aaa", "aa");
        assert_eq!(out, "aaaaaa");
        assert_eq!(count, 3);
    }

    #[test]
    fn test_replace_all_counts_and_no_wrap() {
        let mut e = engine("ab", false);
        let (out, count) = e.replace_all("AB ab Ab", "-");
        assert_eq!(out, "- - -");
        assert_eq!(count, 3);

        let (out, count) = e.replace_all("nothing here", "-");
        assert_eq!(out, "nothing here");
        assert_eq!(count, 0);
    }

    #[test]
    fn test_replace_all_empty_pattern() {
        let mut e = engine("", true);
        let (out, count) = e.replace_all("abc", "x");
        assert_eq!(out, "abc");
        assert_eq!(count, 0);
    }

    #[test]
    fn test_scan_backward_with_non_ascii_text() {
        let text = "héllo héllo";
        let mut e = engine("héllo", true);
        let m = e.find_next(text, text.len(), true).unwrap();
        assert_eq!(m.start, 7);
    }
}

//! Textual matching of renamed absolute paths.
//!
//! A path is renamed by text, not by structure. The match rule depends on
//! what was renamed:
//!
//! - [`MatchMode::Leaf`]: `old` matches only when the next character cannot
//!   continue a node name or path (word characters, `-`, `.` and `/`).
//!   Renaming `/a/b` leaves `/a/bx`, `/a/b-c` and `/a/b.c` alone.
//! - [`MatchMode::Subtree`]: the text must continue with `/`. Used for group
//!   kinds, whose descendants all move with them.

/// How a renamed path is matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchMode {
    Leaf,
    Subtree,
}

/// A single `old -> new` path rename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathMatcher {
    old: String,
    new: String,
    mode: MatchMode,
}

fn continues_name(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | '/')
}

impl PathMatcher {
    pub fn new(old: impl Into<String>, new: impl Into<String>, mode: MatchMode) -> Self {
        let (mut old, mut new) = (old.into(), new.into());
        if mode == MatchMode::Subtree {
            old.push('/');
            new.push('/');
        }
        Self { old, new, mode }
    }

    /// Leaf matcher, the common case.
    pub fn leaf(old: impl Into<String>, new: impl Into<String>) -> Self {
        Self::new(old, new, MatchMode::Leaf)
    }

    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    fn matches_at(&self, text: &str, start: usize) -> bool {
        if !text[start..].starts_with(&self.old) {
            return false;
        }
        match self.mode {
            MatchMode::Subtree => true,
            MatchMode::Leaf => !text[start + self.old.len()..]
                .chars()
                .next()
                .is_some_and(continues_name),
        }
    }

    /// Whether `text` starts with the old path.
    pub fn matches_prefix(&self, text: &str) -> bool {
        self.matches_at(text, 0)
    }

    /// Rewrites the old path at the start of `text`.
    ///
    /// Returns `None` when `text` does not start with a match.
    pub fn rewrite_prefix(&self, text: &str) -> Option<String> {
        if self.old.is_empty() || !self.matches_prefix(text) {
            return None;
        }
        Some(format!("{}{}", self.new, &text[self.old.len()..]))
    }

    /// Rewrites every match anywhere in `text`.
    ///
    /// Returns `None` when nothing matched.
    pub fn rewrite_all(&self, text: &str) -> Option<String> {
        if self.old.is_empty() {
            return None;
        }
        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        let mut changed = false;
        for (start, _) in text.match_indices(self.old.as_str()) {
            if start < last || !self.matches_at(text, start) {
                continue;
            }
            out.push_str(&text[last..start]);
            out.push_str(&self.new);
            last = start + self.old.len();
            changed = true;
        }
        if !changed {
            return None;
        }
        out.push_str(&text[last..]);
        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_leaf_word_boundary() {
        let m = PathMatcher::leaf("/a/b", "/a/c");
        assert_eq!(m.rewrite_all("/a/b > 5").as_deref(), Some("/a/c > 5"));
        assert_eq!(m.rewrite_all("/a/bx = 1"), None);
        assert_eq!(m.rewrite_all("/a/b-c"), None);
        assert_eq!(m.rewrite_all("/a/b.c = 2"), None);
        assert_eq!(m.rewrite_all("/a/b/d"), None);
        assert_eq!(m.rewrite_all("/a/b[1]").as_deref(), Some("/a/c[1]"));
        assert_eq!(
            m.rewrite_all("/a/b + /a/b * /a/bb").as_deref(),
            Some("/a/c + /a/c * /a/bb")
        );
    }

    #[test]
    fn test_subtree_requires_slash() {
        let m = PathMatcher::new("/data/g", "/data/h", MatchMode::Subtree);
        assert_eq!(m.rewrite_all("/data/g"), None);
        assert_eq!(m.rewrite_all("/data/gx/q"), None);
        assert_eq!(
            m.rewrite_all("format-date(date(/data/g/dob), '%d')").as_deref(),
            Some("format-date(date(/data/h/dob), '%d')")
        );
    }

    #[test]
    fn test_rewrite_prefix_is_anchored() {
        let m = PathMatcher::leaf("/data/age", "/data/years");
        assert_eq!(
            m.rewrite_prefix("/data/age[. > 1]").as_deref(),
            Some("/data/years[. > 1]")
        );
        assert_eq!(m.rewrite_prefix("count(/data/age)"), None);
        assert!(!m.matches_prefix("/data/ages"));
    }

    proptest! {
        #[test]
        fn prop_leaf_never_matches_longer_name(
            base in "/[a-z]{1,5}/[a-z]{1,5}",
            tail in "[a-z0-9_/.-][a-z0-9]{0,3}",
        ) {
            let m = PathMatcher::leaf(base.clone(), "/renamed");
            let text = format!("{base}{tail} = 1");
            prop_assert_eq!(m.rewrite_all(&text), None);
        }

        #[test]
        fn prop_leaf_matches_before_operator(
            base in "/[a-z]{1,5}/[a-z]{1,5}",
            op in prop::sample::select(vec![" ", "=", ")", "]", ",", "\""]),
        ) {
            let m = PathMatcher::leaf(base.clone(), "/renamed");
            let text = format!("{base}{op}");
            prop_assert_eq!(m.rewrite_all(&text), Some(format!("/renamed{op}")));
        }
    }
}

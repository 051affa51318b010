//! Lazily parsed wrapper around a single expression string.

use std::collections::VecDeque;

use crate::xpath::{self, ExprId, InitialContext, ParsedExpr};

/// Parse state of a [`LogicExpression`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExpressionStatus {
    /// No text at all.
    Empty,
    /// The text did not parse. It is kept verbatim and never rewritten.
    Invalid,
    /// Backed by a parsed expression.
    Valid,
}

/// One expression string and, when it parses, its structural form.
///
/// Rewriting a path overwrites the node stored at that path's [`ExprId`],
/// so handles obtained from [`get_paths`](Self::get_paths) stay valid and
/// observe the new path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicExpression {
    text: String,
    parsed: Option<ParsedExpr>,
}

impl LogicExpression {
    /// Parses `text` once. A parse failure leaves the expression `Invalid`.
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let parsed = if text.is_empty() {
            None
        } else {
            xpath::parse(&text).ok()
        };
        Self { text, parsed }
    }

    pub fn status(&self) -> ExpressionStatus {
        match (&self.parsed, self.text.is_empty()) {
            (Some(_), _) => ExpressionStatus::Valid,
            (None, true) => ExpressionStatus::Empty,
            (None, false) => ExpressionStatus::Invalid,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.parsed.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.status() == ExpressionStatus::Empty
    }

    /// Every path sub-expression, breadth first from the root.
    pub fn get_paths(&self) -> Vec<ExprId> {
        let Some(parsed) = &self.parsed else {
            return Vec::new();
        };
        let mut paths = Vec::new();
        let mut queue = VecDeque::from([parsed.root]);
        while let Some(id) = queue.pop_front() {
            if parsed.arena.path(id).is_some() {
                paths.push(id);
            }
            queue.extend(parsed.arena.children(id));
        }
        paths
    }

    /// Root-anchored paths only. Relative paths are not tracked.
    pub fn absolute_paths(&self) -> Vec<ExprId> {
        let Some(parsed) = &self.parsed else {
            return Vec::new();
        };
        self.get_paths()
            .into_iter()
            .filter(|id| {
                parsed
                    .arena
                    .path(*id)
                    .is_some_and(|p| p.initial_context == InitialContext::Root)
            })
            .collect()
    }

    /// Text of the path at `id`.
    pub fn path_text(&self, id: ExprId) -> Option<String> {
        let parsed = self.parsed.as_ref()?;
        parsed.arena.path(id)?;
        Some(xpath::to_xpath(&parsed.arena, id))
    }

    /// Text of the path at `id` without step predicates.
    pub fn path_text_without_predicates(&self, id: ExprId) -> Option<String> {
        let parsed = self.parsed.as_ref()?;
        let path = parsed.arena.path(id)?;
        Some(xpath::path_without_predicates(&parsed.arena, path))
    }

    /// Replaces every path whose text is exactly `from` with `to`.
    pub fn update_path(&mut self, from: &str, to: &str) -> usize {
        self.rewrite_paths(|text| (text == from).then(|| to.to_string()))
    }

    /// Replaces the `from_prefix` at the start of any path beginning with it.
    pub fn update_path_prefix(&mut self, from_prefix: &str, to_prefix: &str) -> usize {
        if from_prefix.is_empty() {
            return 0;
        }
        self.rewrite_paths(|text| {
            text.strip_prefix(from_prefix)
                .map(|rest| format!("{to_prefix}{rest}"))
        })
    }

    /// Offers the text of every path to `rewrite`, substituting the paths it
    /// returns a replacement for. Returns the number of paths substituted.
    ///
    /// Nested paths are visited before the paths whose predicates hold them,
    /// so a rewritten outer path carries its already rewritten predicates.
    /// A replacement that does not parse as a path is ignored.
    pub fn rewrite_paths(&mut self, mut rewrite: impl FnMut(&str) -> Option<String>) -> usize {
        let paths = self.get_paths();
        let Some(parsed) = self.parsed.as_mut() else {
            return 0;
        };

        let mut substituted = 0;
        for id in paths.into_iter().rev() {
            let current = xpath::to_xpath(&parsed.arena, id);
            let Some(replacement) = rewrite(&current) else {
                continue;
            };
            if replacement == current {
                continue;
            }
            let Ok(fresh) = xpath::parse(&replacement) else {
                continue;
            };
            let Some(fresh_path) = fresh.arena.path(fresh.root) else {
                continue;
            };
            let grafted = parsed.arena.graft_path(&fresh.arena, fresh_path);
            *parsed.arena.get_mut(id) = xpath::Expr::Path(grafted);
            substituted += 1;
        }
        substituted
    }

    /// Current text: re-printed when valid, verbatim otherwise.
    pub fn text(&self) -> String {
        match &self.parsed {
            Some(parsed) => parsed.to_xpath(),
            None => self.text.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status() {
        assert_eq!(LogicExpression::new("").status(), ExpressionStatus::Empty);
        assert_eq!(
            LogicExpression::new("/data/a >").status(),
            ExpressionStatus::Invalid
        );
        assert_eq!(
            LogicExpression::new("/data/a > 1").status(),
            ExpressionStatus::Valid
        );
    }

    #[test]
    fn test_get_paths_breadth_first() {
        let expr = LogicExpression::new("/data/a = 1 or count(/data/r[/data/b = 2]) > ../c");
        let texts: Vec<String> = expr
            .get_paths()
            .into_iter()
            .filter_map(|id| expr.path_text(id))
            .collect();
        assert_eq!(
            texts,
            vec!["/data/a", "../c", "/data/r[/data/b = 2]", "/data/b"]
        );
        assert_eq!(expr.absolute_paths().len(), 3);
    }

    #[test]
    fn test_invalid_text_is_kept_verbatim() {
        let mut expr = LogicExpression::new("/data/a >>");
        assert_eq!(expr.update_path("/data/a", "/data/b"), 0);
        assert_eq!(expr.text(), "/data/a >>");
        assert!(expr.get_paths().is_empty());
    }

    #[test]
    fn test_update_path_exact_only() {
        let mut expr = LogicExpression::new("/a/b > 5 and /a/bx = 1");
        assert_eq!(expr.update_path("/a/b", "/a/c"), 1);
        assert_eq!(expr.text(), "/a/c > 5 and /a/bx = 1");
    }

    #[test]
    fn test_update_path_preserves_handle() {
        let mut expr = LogicExpression::new("/data/age > 5");
        let before = expr.get_paths();
        expr.update_path("/data/age", "/data/years");
        assert_eq!(expr.get_paths(), before);
        assert_eq!(expr.path_text(before[0]).as_deref(), Some("/data/years"));
    }

    #[test]
    fn test_update_path_rejects_non_path_target() {
        let mut expr = LogicExpression::new("/data/age > 5");
        assert_eq!(expr.update_path("/data/age", "1 + 2"), 0);
        assert_eq!(expr.update_path("/data/age", "/data/("), 0);
        assert_eq!(expr.text(), "/data/age > 5");
    }

    #[test]
    fn test_update_path_prefix_rewrites_nested() {
        let mut expr = LogicExpression::new("/data/g/q[/data/g/r = 1] + /data/gx");
        assert_eq!(expr.update_path_prefix("/data/g/", "/data/h/"), 2);
        assert_eq!(expr.text(), "/data/h/q[/data/h/r = 1] + /data/gx");
    }

    #[test]
    fn test_path_text_without_predicates() {
        let expr = LogicExpression::new("/data/r[position() = 1]/q");
        let id = expr.get_paths()[0];
        assert_eq!(
            expr.path_text_without_predicates(id).as_deref(),
            Some("/data/r/q")
        );
    }
}

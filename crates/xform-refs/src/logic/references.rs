//! Registry of absolute-path references found in node properties.
//!
//! Records are recomputed per `(node, property)` pair: every recompute clears
//! the pair's records and parses the property again. Renames are applied in
//! batch by rewriting the expression text of every property that references
//! a renamed node, then writing it back through the tree.

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::error::{Warning, WarningLevel};
use crate::logic::expression::LogicExpression;
use crate::logic::path_match::PathMatcher;
use crate::model::{schema_for, FormTree, Ufid};

/// One occurrence of an absolute path inside a property's text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    /// Node whose property holds the path.
    pub source: Ufid,
    pub property: String,
    /// Node the path resolves to. `None` when it did not resolve.
    pub target: Option<Ufid>,
    /// The path as written, predicates included.
    pub path: String,
    /// Absolute path of `source` when the record was made.
    pub source_path: String,
}

/// New path of a renamed node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameEntry {
    pub from: String,
    pub to: String,
    /// Group kinds also rename every path below them.
    pub is_group: bool,
}

/// Renames applied in one batch, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenameMap {
    entries: Vec<(Ufid, RenameEntry)>,
    index: FxHashMap<Ufid, usize>,
}

impl RenameMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the rename of `node`. Unchanged paths are ignored.
    pub fn insert(&mut self, node: Ufid, from: impl Into<String>, to: impl Into<String>, is_group: bool) {
        let entry = RenameEntry {
            from: from.into(),
            to: to.into(),
            is_group,
        };
        if entry.from == entry.to {
            return;
        }
        match self.index.get(&node) {
            Some(&i) => self.entries[i].1 = entry,
            None => {
                self.index.insert(node, self.entries.len());
                self.entries.push((node, entry));
            }
        }
    }

    /// The rename recorded for `node`.
    pub fn get(&self, node: Ufid) -> Option<&RenameEntry> {
        self.index.get(&node).map(|&i| &self.entries[i].1)
    }

    pub fn contains(&self, node: Ufid) -> bool {
        self.index.contains_key(&node)
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (Ufid, &RenameEntry)> {
        self.entries.iter().map(|(id, e)| (*id, e))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Whether `path` is `scope` itself or lies below it.
fn in_scope(path: &str, scope: &str) -> bool {
    path == scope
        || path
            .strip_prefix(scope)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// The path with its first two segments (`/<root>/`) removed.
fn path_tail(path: &str) -> &str {
    match path.get(1..).and_then(|rest| rest.find('/')) {
        Some(i) => &path[i + 2..],
        None => path,
    }
}

/// Flat registry of every tracked reference in one document.
#[derive(Debug, Clone, Default)]
pub struct ReferenceGraph {
    records: Vec<Reference>,
    warnings: Vec<Warning>,
    config: EngineConfig,
}

impl ReferenceGraph {
    /// An empty graph using the config's tracked properties and allow-list.
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            records: Vec::new(),
            warnings: Vec::new(),
            config: config.clone(),
        }
    }

    /// All records, grouped by the order their properties were computed.
    pub fn records(&self) -> &[Reference] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Unresolved-reference warnings, one per offending property.
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Records whose path resolved to `target`.
    pub fn references_to(&self, target: Ufid) -> impl Iterator<Item = &Reference> {
        self.records
            .iter()
            .filter(move |r| r.target == Some(target))
    }

    /// Records held by properties of `source`.
    pub fn references_from(&self, source: Ufid) -> impl Iterator<Item = &Reference> {
        self.records.iter().filter(move |r| r.source == source)
    }

    /// Drops all records and warnings.
    pub fn reset(&mut self) {
        self.records.clear();
        self.warnings.clear();
    }

    /// Drops every record of `source` and the warnings raised for it.
    pub fn forget_node(&mut self, source: Ufid) {
        self.records.retain(|r| r.source != source);
        let prefix = format!("{source}-");
        self.warnings.retain(|w| !w.key.starts_with(&prefix));
    }

    /// Drops the records of one property. Its warning is left as is.
    pub fn clear_references(&mut self, node: Ufid, property: &str) {
        self.records
            .retain(|r| r.source != node || r.property != property);
    }

    /// Parses the property's current text and records each absolute path.
    ///
    /// Unresolved paths that are not allow-listed are reported in one
    /// warning for the property; the record is kept with no target.
    pub fn add_references<F: FormTree + ?Sized>(&mut self, form: &F, node: Ufid, property: &str) {
        let text = form.property(node, property).unwrap_or_default();
        let expr = LogicExpression::new(text);
        let source_path = form.absolute_path(node).unwrap_or_default();
        let mut messages = Vec::new();

        for id in expr.absolute_paths() {
            let (Some(path), Some(lookup)) = (expr.path_text(id), expr.path_text_without_predicates(id))
            else {
                continue;
            };
            let target = form.resolve_path(&lookup);
            if target.is_none() && !self.config.is_allowed_data_reference(path_tail(&lookup)) {
                let display = form
                    .node_kind(node)
                    .map_or(property, |kind| schema_for(kind).display_name(property));
                messages.push(format!(
                    "The question '{}' references an unknown question {} in its {}.",
                    form.node_name(node).unwrap_or_default(),
                    path,
                    display,
                ));
            }
            self.records.push(Reference {
                source: node,
                property: property.to_string(),
                target,
                path,
                source_path: source_path.clone(),
            });
        }

        let key = format!("{node}-{property}-badpath");
        self.warnings.retain(|w| w.key != key);
        if !messages.is_empty() {
            let warning = Warning {
                level: WarningLevel::ParseWarning,
                key,
                messages,
            };
            warn!(node = %node, property, "{warning}");
            self.warnings.push(warning);
        }
    }

    /// Clears and re-adds the records of one property.
    pub fn update_references<F: FormTree + ?Sized>(
        &mut self,
        form: &F,
        node: Ufid,
        property: &str,
    ) {
        self.clear_references(node, property);
        self.add_references(form, node, property);
    }

    /// Recomputes every reference-bearing property of the node's kind.
    pub fn update_all_references<F: FormTree + ?Sized>(&mut self, form: &F, node: Ufid) {
        let Some(kind) = form.node_kind(node) else {
            return;
        };
        let schema = schema_for(kind);
        let properties: Vec<String> = self
            .config
            .reference_properties
            .iter()
            .filter(|p| schema.is_reference_bearing(p))
            .cloned()
            .collect();
        for property in &properties {
            self.update_references(form, node, property);
        }
    }

    /// Rewrites references to one renamed node.
    pub fn update_path<F: FormTree + ?Sized>(
        &mut self,
        form: &mut F,
        node: Ufid,
        from: &str,
        to: &str,
        subtree: Option<&str>,
    ) -> Vec<(Ufid, String)> {
        let is_group = form.node_kind(node).is_some_and(|k| k.is_group());
        let mut map = RenameMap::new();
        map.insert(node, from, to, is_group);
        self.update_paths(form, &map, subtree)
    }

    /// Rewrites every property that references a renamed node.
    ///
    /// Only properties of nodes inside `subtree` (when given) are touched.
    /// Each `(node, property)` pair is rewritten at most once per call, with
    /// every rename in `map` applied to it in order. A path matches a rename
    /// when it is the old path, optionally followed by predicates; a group
    /// rename also moves every path below the old one. A property is written
    /// back only when its text changed, and is then recomputed. Returns the
    /// rewritten pairs.
    pub fn update_paths<F: FormTree + ?Sized>(
        &mut self,
        form: &mut F,
        map: &RenameMap,
        subtree: Option<&str>,
    ) -> Vec<(Ufid, String)> {
        if map.is_empty() {
            return Vec::new();
        }
        let mut seen: FxHashSet<(Ufid, &str)> = FxHashSet::default();
        let mut pending = Vec::new();
        for record in &self.records {
            let Some(target) = record.target else {
                continue;
            };
            if !map.contains(target) {
                continue;
            }
            if subtree.is_some_and(|scope| !in_scope(&record.source_path, scope)) {
                continue;
            }
            if seen.insert((record.source, record.property.as_str())) {
                pending.push((record.source, record.property.clone()));
            }
        }
        drop(seen);

        let renames: Vec<(PathMatcher, Option<(String, String)>)> = map
            .iter()
            .map(|(_, entry)| {
                let leaf = PathMatcher::leaf(entry.from.as_str(), entry.to.as_str());
                let below = entry
                    .is_group
                    .then(|| (format!("{}/", entry.from), format!("{}/", entry.to)));
                (leaf, below)
            })
            .collect();
        let mut rewritten = Vec::new();
        for (node, property) in pending {
            let Some(text) = form.property(node, &property).map(str::to_string) else {
                continue;
            };
            let mut expr = LogicExpression::new(text);
            let original = expr.text();
            for (leaf, below) in &renames {
                expr.rewrite_paths(|path| leaf.rewrite_prefix(path));
                if let Some((from, to)) = below {
                    expr.update_path_prefix(from, to);
                }
            }
            let updated = expr.text();
            if updated == original {
                continue;
            }
            debug!(node = %node, property = %property, from = %original, to = %updated, "rewrote references");
            if let Err(err) = form.set_property(node, &property, &updated) {
                warn!(node = %node, property = %property, error = %err, "could not write rewritten expression");
                continue;
            }
            self.update_references(&*form, node, &property);
            rewritten.push((node, property));
        }
        rewritten
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Form, NodeKind};

    struct Fixture {
        form: Form,
        graph: ReferenceGraph,
        age: Ufid,
        eligible: Ufid,
    }

    fn fixture() -> Fixture {
        let mut form = Form::new("data");
        let age = form.add_node(None, "age", NodeKind::Question).unwrap();
        let eligible = form.add_node(None, "eligible", NodeKind::DataNode).unwrap();
        form.set_property(eligible, "calculateAttr", "/data/age > 5")
            .unwrap();
        let mut graph = ReferenceGraph::new(&EngineConfig::default());
        graph.update_all_references(&form, eligible);
        Fixture {
            form,
            graph,
            age,
            eligible,
        }
    }

    #[test]
    fn test_single_reference_record() {
        let f = fixture();
        let refs: Vec<_> = f.graph.references_from(f.eligible).collect();
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].property, "calculateAttr");
        assert_eq!(refs[0].target, Some(f.age));
        assert_eq!(refs[0].path, "/data/age");
        assert_eq!(refs[0].source_path, "/data/eligible");
        assert!(f.graph.warnings().is_empty());
    }

    #[test]
    fn test_duplicates_within_property_are_kept() {
        let mut f = fixture();
        f.form
            .set_property(f.eligible, "calculateAttr", "/data/age + /data/age + ../age")
            .unwrap();
        f.graph.update_references(&f.form, f.eligible, "calculateAttr");
        assert_eq!(f.graph.references_to(f.age).count(), 2);
        assert_eq!(f.graph.len(), 2);
    }

    #[test]
    fn test_unresolved_paths_warn_once_per_property() {
        let mut f = fixture();
        f.form
            .set_property(f.eligible, "calculateAttr", "/data/nope + /data/gone")
            .unwrap();
        f.graph.update_references(&f.form, f.eligible, "calculateAttr");
        assert_eq!(f.graph.len(), 2);
        assert!(f.graph.records().iter().all(|r| r.target.is_none()));
        let warnings = f.graph.warnings();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].key, format!("{}-calculateAttr-badpath", f.eligible));
        assert_eq!(warnings[0].messages.len(), 2);
        assert!(warnings[0].messages[0].contains("Calculate Condition"));

        // fixing the text clears the warning
        f.form
            .set_property(f.eligible, "calculateAttr", "/data/age")
            .unwrap();
        f.graph.update_references(&f.form, f.eligible, "calculateAttr");
        assert!(f.graph.warnings().is_empty());
    }

    #[test]
    fn test_allow_listed_tail_does_not_warn() {
        let config = EngineConfig {
            allowed_data_node_references: vec!["meta/deviceID".into()],
            ..EngineConfig::default()
        };
        let mut form = Form::new("data");
        let node = form.add_node(None, "q", NodeKind::Question).unwrap();
        form.set_property(node, "relevantAttr", "/data/meta/deviceID != ''")
            .unwrap();
        let mut graph = ReferenceGraph::new(&config);
        graph.update_all_references(&form, node);
        assert_eq!(graph.len(), 1);
        assert_eq!(graph.records()[0].target, None);
        assert!(graph.warnings().is_empty());
    }

    #[test]
    fn test_invalid_expression_tracks_nothing() {
        let mut f = fixture();
        f.form
            .set_property(f.eligible, "calculateAttr", "/data/age >")
            .unwrap();
        f.graph.update_references(&f.form, f.eligible, "calculateAttr");
        assert!(f.graph.is_empty());
    }

    #[test]
    fn test_rename_rewrites_and_resyncs() {
        let mut f = fixture();
        let change = f.form.rename_node(f.age, "years").unwrap();
        let rewritten = f.graph.update_path(
            &mut f.form,
            f.age,
            &change.old_path,
            &change.new_path,
            None,
        );
        assert_eq!(rewritten, vec![(f.eligible, "calculateAttr".to_string())]);
        assert_eq!(
            f.form.property(f.eligible, "calculateAttr"),
            Some("/data/years > 5")
        );
        let refs: Vec<_> = f.graph.references_from(f.eligible).collect();
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].target, Some(f.age));
        assert_eq!(refs[0].path, "/data/years");
    }

    #[test]
    fn test_word_boundary_leaves_longer_names() {
        let mut form = Form::new("a");
        let b = form.add_node(None, "b", NodeKind::Question).unwrap();
        let bx = form.add_node(None, "bx", NodeKind::Question).unwrap();
        let q = form.add_node(None, "q", NodeKind::Question).unwrap();
        form.set_property(q, "relevantAttr", "/a/b > 5 and /a/bx = 1")
            .unwrap();
        let mut graph = ReferenceGraph::new(&EngineConfig::default());
        graph.update_all_references(&form, q);
        assert_eq!(graph.len(), 2);

        let rewritten = graph.update_path(&mut form, b, "/a/b", "/a/c", None);
        assert_eq!(rewritten.len(), 1);
        assert_eq!(
            form.property(q, "relevantAttr"),
            Some("/a/c > 5 and /a/bx = 1")
        );
        // bx keeps resolving, b's path is stale until the tree is renamed
        assert_eq!(graph.references_to(bx).count(), 1);
    }

    #[test]
    fn test_rename_leaves_dotted_sibling() {
        let mut form = Form::new("data");
        let a = form.add_node(None, "a", NodeKind::Question).unwrap();
        let dotted = form.add_node(None, "a.b", NodeKind::Question).unwrap();
        let q = form.add_node(None, "q", NodeKind::Question).unwrap();
        form.set_property(q, "relevantAttr", "/data/a = 1 and /data/a.b = 2")
            .unwrap();
        let mut graph = ReferenceGraph::new(&EngineConfig::default());
        graph.update_all_references(&form, q);
        assert_eq!(graph.references_to(dotted).count(), 1);

        let change = form.rename_node(a, "x").unwrap();
        graph.update_path(&mut form, a, &change.old_path, &change.new_path, None);
        assert_eq!(
            form.property(q, "relevantAttr"),
            Some("/data/x = 1 and /data/a.b = 2")
        );
        assert_eq!(graph.references_to(a).count(), 1);
        assert_eq!(graph.references_to(dotted).count(), 1);
        assert!(graph.warnings().is_empty());
    }

    #[test]
    fn test_subtree_scope_limits_sources() {
        let mut form = Form::new("data");
        let age = form.add_node(None, "age", NodeKind::Question).unwrap();
        let group = form.add_node(None, "g", NodeKind::Group).unwrap();
        let inside = form.add_node(Some(group), "in", NodeKind::Question).unwrap();
        let outside = form.add_node(None, "out", NodeKind::Question).unwrap();
        for node in [inside, outside] {
            form.set_property(node, "relevantAttr", "/data/age = 1").unwrap();
        }
        let mut graph = ReferenceGraph::new(&EngineConfig::default());
        for node in form.walk() {
            graph.update_all_references(&form, node);
        }

        let rewritten = graph.update_path(&mut form, age, "/data/age", "/data/years", Some("/data/g"));
        assert_eq!(rewritten, vec![(inside, "relevantAttr".to_string())]);
        assert_eq!(form.property(inside, "relevantAttr"), Some("/data/years = 1"));
        assert_eq!(form.property(outside, "relevantAttr"), Some("/data/age = 1"));
        assert!(!in_scope("/data/gx/q", "/data/g"));
    }

    #[test]
    fn test_group_rename_moves_descendant_paths() {
        let mut form = Form::new("data");
        let group = form.add_node(None, "g", NodeKind::Group).unwrap();
        let child = form.add_node(Some(group), "c", NodeKind::Question).unwrap();
        let q = form.add_node(None, "q", NodeKind::Question).unwrap();
        form.set_property(q, "relevantAttr", "count(/data/g) > 0 and /data/g/c = 1")
            .unwrap();
        let mut graph = ReferenceGraph::new(&EngineConfig::default());
        graph.update_all_references(&form, q);

        let change = form.rename_node(group, "h").unwrap();
        let mut map = RenameMap::new();
        map.insert(group, change.old_path.as_str(), change.new_path.as_str(), true);
        graph.update_paths(&mut form, &map, None);

        assert_eq!(
            form.property(q, "relevantAttr"),
            Some("count(/data/h) > 0 and /data/h/c = 1")
        );
        assert_eq!(graph.references_to(child).count(), 1);
        assert_eq!(graph.references_to(group).count(), 1);
    }

    #[test]
    fn test_each_property_rewritten_once_per_batch() {
        let mut form = Form::new("data");
        let a = form.add_node(None, "a", NodeKind::Question).unwrap();
        let b = form.add_node(None, "b", NodeKind::Question).unwrap();
        let q = form.add_node(None, "q", NodeKind::Question).unwrap();
        form.set_property(q, "calculateAttr", "/data/a + /data/b + /data/a")
            .unwrap();
        let mut graph = ReferenceGraph::new(&EngineConfig::default());
        graph.update_all_references(&form, q);

        let mut map = RenameMap::new();
        map.insert(a, "/data/a", "/data/x", false);
        map.insert(b, "/data/b", "/data/y", false);
        let rewritten = graph.update_paths(&mut form, &map, None);
        assert_eq!(rewritten, vec![(q, "calculateAttr".to_string())]);
        assert_eq!(
            form.property(q, "calculateAttr"),
            Some("/data/x + /data/y + /data/x")
        );
    }

    #[test]
    fn test_path_tail() {
        assert_eq!(path_tail("/data/meta/deviceID"), "meta/deviceID");
        assert_eq!(path_tail("/data"), "/data");
    }
}

//! The document tree seen by the engine, and an in-memory implementation.

use rustc_hash::FxHashMap;

use crate::error::FormError;
use crate::itext::ItemKey;
use crate::model::id::Ufid;
use crate::model::node::{ItextSlot, Node, NodeKind};
use crate::model::schema;

/// Operations the engine needs from a document tree.
///
/// Paths are absolute and root-anchored, e.g. `/data/group/question`.
pub trait FormTree {
    fn resolve_path(&self, path: &str) -> Option<Ufid>;

    fn absolute_path(&self, node: Ufid) -> Option<String>;

    fn property(&self, node: Ufid, property: &str) -> Option<&str>;

    /// Writes a property. An empty value unsets it.
    fn set_property(&mut self, node: Ufid, property: &str, value: &str) -> Result<(), FormError>;

    fn node_kind(&self, node: Ufid) -> Option<NodeKind>;

    fn node_name(&self, node: Ufid) -> Option<&str>;

    fn parent(&self, node: Ufid) -> Option<Ufid>;

    /// Every node in depth-first document order.
    fn walk(&self) -> Vec<Ufid>;

    fn itext_slot(&self, node: Ufid, slot: ItextSlot) -> Option<ItemKey>;

    fn set_itext_slot(
        &mut self,
        node: Ufid,
        slot: ItextSlot,
        key: Option<ItemKey>,
    ) -> Result<(), FormError>;
}

/// Old and new absolute path of a node that was renamed or moved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathChange {
    pub node: Ufid,
    pub old_path: String,
    pub new_path: String,
}

/// Whether `name` can be used as a node name (an XML NCName).
pub fn is_valid_node_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

/// An in-memory document tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Form {
    root_name: String,
    nodes: FxHashMap<Ufid, Node>,
    top_level: Vec<Ufid>,
}

impl Default for Form {
    fn default() -> Self {
        Self::new("data")
    }
}

impl Form {
    /// An empty form whose data root is `/<root_name>`.
    pub fn new(root_name: impl Into<String>) -> Self {
        Self {
            root_name: root_name.into(),
            nodes: FxHashMap::default(),
            top_level: Vec::new(),
        }
    }

    pub fn root_name(&self) -> &str {
        &self.root_name
    }

    /// `/<root_name>`
    pub fn base_path(&self) -> String {
        format!("/{}", self.root_name)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: Ufid) -> Option<&Node> {
        self.nodes.get(&id)
    }

    fn get(&self, id: Ufid) -> Result<&Node, FormError> {
        self.nodes.get(&id).ok_or(FormError::UnknownNode { node: id })
    }

    /// Children of `parent`, or the top-level nodes for `None`.
    pub fn children(&self, parent: Option<Ufid>) -> &[Ufid] {
        match parent {
            None => &self.top_level,
            Some(id) => self
                .nodes
                .get(&id)
                .map(|n| n.children.as_slice())
                .unwrap_or_default(),
        }
    }

    fn children_mut(&mut self, parent: Option<Ufid>) -> Result<&mut Vec<Ufid>, FormError> {
        match parent {
            None => Ok(&mut self.top_level),
            Some(id) => self
                .nodes
                .get_mut(&id)
                .map(|n| &mut n.children)
                .ok_or(FormError::UnknownNode { node: id }),
        }
    }

    fn parent_path(&self, parent: Option<Ufid>) -> String {
        parent
            .and_then(|p| self.absolute_path(p))
            .unwrap_or_else(|| self.base_path())
    }

    fn check_name(
        &self,
        parent: Option<Ufid>,
        name: &str,
        except: Option<Ufid>,
    ) -> Result<(), FormError> {
        if !is_valid_node_name(name) {
            return Err(FormError::InvalidNodeName {
                name: name.to_string(),
            });
        }
        let taken = self
            .children(parent)
            .iter()
            .filter(|id| Some(**id) != except)
            .any(|id| self.nodes.get(id).is_some_and(|n| n.name == name));
        if taken {
            return Err(FormError::DuplicateSibling {
                name: name.to_string(),
                parent_path: self.parent_path(parent),
            });
        }
        Ok(())
    }

    /// Adds a node under `parent` (top level for `None`) with a fresh id.
    pub fn add_node(
        &mut self,
        parent: Option<Ufid>,
        name: &str,
        kind: NodeKind,
    ) -> Result<Ufid, FormError> {
        self.add_node_with_id(Ufid::new(), parent, name, kind)
    }

    pub fn add_node_with_id(
        &mut self,
        id: Ufid,
        parent: Option<Ufid>,
        name: &str,
        kind: NodeKind,
    ) -> Result<Ufid, FormError> {
        if let Some(p) = parent {
            self.get(p)?;
        }
        self.check_name(parent, name, None)?;
        let mut node = Node::new(id, name, kind);
        node.parent = parent;
        self.nodes.insert(id, node);
        self.children_mut(parent)?.push(id);
        Ok(id)
    }

    /// The node and all its descendants, in document order.
    pub fn subtree(&self, id: Ufid) -> Vec<Ufid> {
        let mut out = Vec::new();
        if self.nodes.contains_key(&id) {
            self.collect_subtree(id, &mut out);
        }
        out
    }

    fn collect_subtree(&self, id: Ufid, out: &mut Vec<Ufid>) {
        out.push(id);
        for child in self.children(Some(id)) {
            self.collect_subtree(*child, out);
        }
    }

    pub fn rename_node(&mut self, id: Ufid, name: &str) -> Result<PathChange, FormError> {
        let parent = self.get(id)?.parent;
        let old_path = self.absolute_path(id).unwrap_or_default();
        self.check_name(parent, name, Some(id))?;
        if let Some(node) = self.nodes.get_mut(&id) {
            node.name = name.to_string();
        }
        Ok(PathChange {
            node: id,
            new_path: self.absolute_path(id).unwrap_or_default(),
            old_path,
        })
    }

    /// Moves a node under `new_parent`, at `index` among its new siblings
    /// (appended when `None` or out of range).
    pub fn move_node(
        &mut self,
        id: Ufid,
        new_parent: Option<Ufid>,
        index: Option<usize>,
    ) -> Result<PathChange, FormError> {
        let node = self.get(id)?;
        let (name, old_parent) = (node.name.clone(), node.parent);
        if let Some(p) = new_parent {
            self.get(p)?;
            if self.subtree(id).contains(&p) {
                return Err(FormError::CannotMoveIntoSelf { node: id });
            }
        }
        self.check_name(new_parent, &name, Some(id))?;

        let old_path = self.absolute_path(id).unwrap_or_default();
        self.children_mut(old_parent)?.retain(|c| *c != id);
        let siblings = self.children_mut(new_parent)?;
        let at = index.unwrap_or(siblings.len()).min(siblings.len());
        siblings.insert(at, id);
        if let Some(node) = self.nodes.get_mut(&id) {
            node.parent = new_parent;
        }
        Ok(PathChange {
            node: id,
            new_path: self.absolute_path(id).unwrap_or_default(),
            old_path,
        })
    }

    /// Copies a node and its subtree right after the original.
    ///
    /// The copy is named `copy-N-of-<name>` with the first free `N`. Copies
    /// keep the originals' properties and translation slots. Returns
    /// `(original, copy)` pairs in document order.
    pub fn duplicate_node(&mut self, id: Ufid) -> Result<Vec<(Ufid, Ufid)>, FormError> {
        let original = self.get(id)?;
        let parent = original.parent;
        let mut n = 1;
        let name = loop {
            let candidate = format!("copy-{n}-of-{}", original.name);
            if self.check_name(parent, &candidate, None).is_ok() {
                break candidate;
            }
            n += 1;
        };

        let mut pairs = Vec::new();
        let copy = self.copy_subtree(id, parent, &mut pairs)?;
        if let Some(node) = self.nodes.get_mut(&copy) {
            node.name = name;
        }
        let siblings = self.children_mut(parent)?;
        let at = siblings
            .iter()
            .position(|c| *c == id)
            .map_or(siblings.len(), |i| i + 1);
        siblings.insert(at, copy);
        Ok(pairs)
    }

    fn copy_subtree(
        &mut self,
        id: Ufid,
        parent: Option<Ufid>,
        pairs: &mut Vec<(Ufid, Ufid)>,
    ) -> Result<Ufid, FormError> {
        let mut node = self.get(id)?.clone();
        let copy_id = Ufid::new();
        pairs.push((id, copy_id));
        node.id = copy_id;
        node.parent = parent;
        let children = std::mem::take(&mut node.children);
        self.nodes.insert(copy_id, node);
        for child in children {
            let child_copy = self.copy_subtree(child, Some(copy_id), pairs)?;
            self.children_mut(Some(copy_id))?.push(child_copy);
        }
        Ok(copy_id)
    }

    /// Removes a node and its subtree. Returns the removed ids.
    pub fn remove_node(&mut self, id: Ufid) -> Result<Vec<Ufid>, FormError> {
        let parent = self.get(id)?.parent;
        let removed = self.subtree(id);
        self.children_mut(parent)?.retain(|c| *c != id);
        for node in &removed {
            self.nodes.remove(node);
        }
        Ok(removed)
    }
}

impl FormTree for Form {
    fn resolve_path(&self, path: &str) -> Option<Ufid> {
        let rest = path
            .strip_prefix('/')?
            .strip_prefix(self.root_name.as_str())?
            .strip_prefix('/')?;
        let mut parent = None;
        for segment in rest.split('/') {
            let found = self
                .children(parent)
                .iter()
                .copied()
                .find(|id| self.nodes.get(id).is_some_and(|n| n.name == segment))?;
            parent = Some(found);
        }
        parent
    }

    fn absolute_path(&self, node: Ufid) -> Option<String> {
        let mut names = Vec::new();
        let mut current = Some(node);
        while let Some(id) = current {
            let n = self.nodes.get(&id)?;
            names.push(n.name.as_str());
            current = n.parent;
        }
        names.push(&self.root_name);
        names.reverse();
        Some(format!("/{}", names.join("/")))
    }

    fn property(&self, node: Ufid, property: &str) -> Option<&str> {
        self.nodes.get(&node)?.property(property)
    }

    fn set_property(&mut self, node: Ufid, property: &str, value: &str) -> Result<(), FormError> {
        let n = self
            .nodes
            .get_mut(&node)
            .ok_or(FormError::UnknownNode { node })?;
        if value.is_empty() {
            n.properties.remove(property);
        } else {
            n.properties.insert(property.to_string(), value.to_string());
        }
        Ok(())
    }

    fn node_kind(&self, node: Ufid) -> Option<NodeKind> {
        self.nodes.get(&node).map(|n| n.kind)
    }

    fn node_name(&self, node: Ufid) -> Option<&str> {
        self.nodes.get(&node).map(|n| n.name.as_str())
    }

    fn parent(&self, node: Ufid) -> Option<Ufid> {
        self.nodes.get(&node)?.parent
    }

    fn walk(&self) -> Vec<Ufid> {
        let mut out = Vec::with_capacity(self.nodes.len());
        for id in &self.top_level {
            self.collect_subtree(*id, &mut out);
        }
        out
    }

    fn itext_slot(&self, node: Ufid, slot: ItextSlot) -> Option<ItemKey> {
        self.nodes.get(&node)?.itext_slot(slot)
    }

    fn set_itext_slot(
        &mut self,
        node: Ufid,
        slot: ItextSlot,
        key: Option<ItemKey>,
    ) -> Result<(), FormError> {
        let n = self
            .nodes
            .get_mut(&node)
            .ok_or(FormError::UnknownNode { node })?;
        if key.is_some() && !schema::schema_for(n.kind).allows_slot(slot) {
            return Err(FormError::SlotNotAllowed {
                node,
                slot: slot.name(),
            });
        }
        n.itext[slot.index()] = key;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (Form, Ufid, Ufid, Ufid) {
        let mut form = Form::new("data");
        let age = form.add_node(None, "age", NodeKind::Question).unwrap();
        let group = form.add_node(None, "group", NodeKind::Group).unwrap();
        let inner = form
            .add_node(Some(group), "inner", NodeKind::Question)
            .unwrap();
        (form, age, group, inner)
    }

    #[test]
    fn test_paths_resolve_both_ways() {
        let (form, age, group, inner) = sample();
        assert_eq!(form.absolute_path(inner).as_deref(), Some("/data/group/inner"));
        assert_eq!(form.resolve_path("/data/group/inner"), Some(inner));
        assert_eq!(form.resolve_path("/data/age"), Some(age));
        assert_eq!(form.resolve_path("/data/group"), Some(group));
        assert_eq!(form.resolve_path("/data"), None);
        assert_eq!(form.resolve_path("/other/age"), None);
        assert_eq!(form.resolve_path("/data/missing"), None);
    }

    #[test]
    fn test_walk_is_document_order() {
        let (form, age, group, inner) = sample();
        assert_eq!(form.walk(), vec![age, group, inner]);
    }

    #[test]
    fn test_name_validation() {
        let (mut form, age, ..) = sample();
        assert!(matches!(
            form.add_node(None, "1bad", NodeKind::Question),
            Err(FormError::InvalidNodeName { .. })
        ));
        assert!(matches!(
            form.add_node(None, "age", NodeKind::Question),
            Err(FormError::DuplicateSibling { .. })
        ));
        assert!(form.rename_node(age, "age").is_ok());
        assert!(!is_valid_node_name("a:b"));
        assert!(is_valid_node_name("_a-b.c1"));
    }

    #[test]
    fn test_rename_and_move_report_paths() {
        let (mut form, age, group, _) = sample();
        let change = form.rename_node(age, "years").unwrap();
        assert_eq!(change.old_path, "/data/age");
        assert_eq!(change.new_path, "/data/years");

        let change = form.move_node(age, Some(group), Some(0)).unwrap();
        assert_eq!(change.new_path, "/data/group/years");
        assert_eq!(form.children(Some(group))[0], age);
        assert_eq!(form.children(None), &[group]);
    }

    #[test]
    fn test_move_into_own_subtree_is_refused() {
        let (mut form, _, group, inner) = sample();
        assert_eq!(
            form.move_node(group, Some(inner), None),
            Err(FormError::CannotMoveIntoSelf { node: group })
        );
    }

    #[test]
    fn test_duplicate_copies_subtree_after_original() {
        let (mut form, age, group, inner) = sample();
        form.set_property(inner, "relevantAttr", "/data/age > 1")
            .unwrap();
        let pairs = form.duplicate_node(group).unwrap();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].0, group);
        assert_eq!(pairs[1].0, inner);

        let (copy, inner_copy) = (pairs[0].1, pairs[1].1);
        assert_eq!(form.children(None), &[age, group, copy]);
        assert_eq!(
            form.absolute_path(inner_copy).as_deref(),
            Some("/data/copy-1-of-group/inner")
        );
        assert_eq!(form.property(inner_copy, "relevantAttr"), Some("/data/age > 1"));

        let again = form.duplicate_node(group).unwrap();
        assert_eq!(form.node_name(again[0].1), Some("copy-2-of-group"));
    }

    #[test]
    fn test_remove_drops_subtree() {
        let (mut form, age, group, inner) = sample();
        assert_eq!(form.remove_node(group).unwrap(), vec![group, inner]);
        assert_eq!(form.walk(), vec![age]);
        assert!(form.node(inner).is_none());
    }

    #[test]
    fn test_slot_presence_is_enforced() {
        let mut form = Form::default();
        let node = form.add_node(None, "hidden", NodeKind::DataNode).unwrap();
        let key = ItemKey::new(std::num::NonZeroU32::MIN);
        assert!(matches!(
            form.set_itext_slot(node, ItextSlot::Label, Some(key)),
            Err(FormError::SlotNotAllowed { .. })
        ));
        assert!(form
            .set_itext_slot(node, ItextSlot::ConstraintMsg, Some(key))
            .is_ok());
        assert_eq!(form.itext_slot(node, ItextSlot::ConstraintMsg), Some(key));
    }
}

//! The collection pass that produces the canonical item list.
//!
//! Run right before serializing or exporting. Items reachable from the
//! document are gathered in document order and their ids resolved so that
//! no two collected items share one. Ids are written back to the items.

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, warn};

use crate::itext::item::ItemKey;
use crate::itext::model::ItextModel;
use crate::model::{FormTree, ItextSlot, NodeKind, Ufid};

/// Path of `node` without the root element, with no leading `/`.
///
/// Choice nodes are named after their select: `q-yes` for the `yes` choice
/// of question `q`.
pub fn default_itext_root<F: FormTree + ?Sized>(form: &F, node: Ufid) -> String {
    let name = form.node_name(node).unwrap_or_default();
    if form.node_kind(node) == Some(NodeKind::Choice) {
        if let Some(parent) = form.parent(node) {
            return format!("{}-{}", default_itext_root(form, parent), name);
        }
    }
    let path = form
        .absolute_path(node)
        .or_else(|| {
            form.parent(node)
                .and_then(|p| form.absolute_path(p))
                .map(|p| format!("{p}/{name}"))
        })
        .map(|abs| strip_root(&abs).to_string())
        .unwrap_or_else(|| format!("/{name}"));
    path.strip_prefix('/').unwrap_or(&path).to_string()
}

/// `/data/g/q` to `/g/q`.
fn strip_root(path: &str) -> &str {
    match path.get(1..).and_then(|rest| rest.find('/')) {
        Some(i) => &path[i + 1..],
        None => path,
    }
}

/// Id an item in `slot` of `node` gets when its id is automatic.
pub fn default_itext_id<F: FormTree + ?Sized>(form: &F, node: Ufid, slot: ItextSlot) -> String {
    format!("{}-{}", default_itext_root(form, node), slot.name())
}

/// Walks the document and returns the keys of its items in encounter order,
/// each item seen once, with unique ids assigned.
///
/// Empty items are left out unless `include_empty` is set, and an empty item
/// whose id is already taken is always left out. A colliding non-empty item
/// gets the first free id among `id2`, `id3`, and so on.
pub fn collect_items<F: FormTree + ?Sized>(
    form: &F,
    model: &mut ItextModel,
    include_empty: bool,
) -> Vec<ItemKey> {
    let mut seen: FxHashSet<ItemKey> = FxHashSet::default();
    let mut by_id: FxHashMap<String, ItemKey> = FxHashMap::default();
    let mut out = Vec::new();

    for node in form.walk() {
        for slot in ItextSlot::ALL {
            let Some(key) = form.itext_slot(node, slot) else {
                continue;
            };
            if !seen.insert(key) {
                continue;
            }
            let Some(item) = model.item_mut(key) else {
                warn!(node = %node, slot = slot.name(), item = %key, "ignoring translation item missing from the model");
                continue;
            };
            let is_empty = item.is_empty();
            if is_empty && !include_empty {
                continue;
            }
            let candidate = if item.auto_id || item.id.is_empty() {
                default_itext_id(form, node, slot)
            } else {
                item.id.clone()
            };
            if is_empty && by_id.contains_key(&candidate) {
                continue;
            }
            let mut id = candidate.clone();
            let mut count = 2;
            while by_id.contains_key(&id) {
                id = format!("{candidate}{count}");
                count += 1;
            }
            if item.id != id {
                debug!(item = %key, from = %item.id, to = %id, "assigned translation id");
                item.id = id.clone();
            }
            by_id.insert(id, key);
            out.push(key);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::itext::Languages;
    use crate::model::Form;
    use proptest::prelude::*;

    fn model() -> ItextModel {
        ItextModel::with_languages(Languages::new(["en"], "en"))
    }

    fn bind(form: &mut Form, node: Ufid, slot: ItextSlot, key: ItemKey) {
        form.set_itext_slot(node, slot, Some(key)).unwrap();
    }

    #[test]
    fn test_default_ids() {
        let mut form = Form::new("data");
        let group = form.add_node(None, "g", NodeKind::Group).unwrap();
        let q = form.add_node(Some(group), "q", NodeKind::Question).unwrap();
        let yes = form.add_node(Some(q), "yes", NodeKind::Choice).unwrap();
        assert_eq!(default_itext_root(&form, q), "g/q");
        assert_eq!(default_itext_root(&form, yes), "g/q-yes");
        assert_eq!(default_itext_id(&form, q, ItextSlot::ConstraintMsg), "g/q-constraintMsg");
    }

    #[test]
    fn test_auto_ids_follow_paths_and_custom_ids_stay() {
        let mut form = Form::new("data");
        let age = form.add_node(None, "age", NodeKind::Question).unwrap();
        let mut model = model();
        let label = model.create_item("", true);
        let hint = model.create_item("my-hint", false);
        model.set_default_value(label, "Age").unwrap();
        model.set_default_value(hint, "Years").unwrap();
        bind(&mut form, age, ItextSlot::Label, label);
        bind(&mut form, age, ItextSlot::Hint, hint);

        let keys = collect_items(&form, &mut model, false);
        assert_eq!(keys, vec![label, hint]);
        assert_eq!(model.item(label).unwrap().id, "age-label");
        assert_eq!(model.item(hint).unwrap().id, "my-hint");
    }

    #[test]
    fn test_shared_item_collected_once() {
        let mut form = Form::new("data");
        let a = form.add_node(None, "a", NodeKind::Question).unwrap();
        let b = form.add_node(None, "b", NodeKind::Question).unwrap();
        let mut model = model();
        let shared = model.create_item("shared", false);
        model.set_default_value(shared, "Same").unwrap();
        bind(&mut form, a, ItextSlot::Label, shared);
        bind(&mut form, b, ItextSlot::Label, shared);

        assert_eq!(collect_items(&form, &mut model, false), vec![shared]);
        assert_eq!(model.item(shared).unwrap().id, "shared");
    }

    #[test]
    fn test_empty_collisions_are_dropped() {
        let mut form = Form::new("data");
        let a = form.add_node(None, "a", NodeKind::Question).unwrap();
        let b = form.add_node(None, "b", NodeKind::Question).unwrap();
        let mut model = model();
        let first = model.create_item("foo", false);
        let second = model.create_item("foo", false);
        bind(&mut form, a, ItextSlot::Label, first);
        bind(&mut form, b, ItextSlot::Label, second);

        assert!(collect_items(&form, &mut model, false).is_empty());
        assert_eq!(model.item(first).unwrap().id, "foo");
        assert_eq!(model.item(second).unwrap().id, "foo");

        // with empties requested the first claims the id, the second is dropped
        assert_eq!(collect_items(&form, &mut model, true), vec![first]);
        assert_eq!(model.item(second).unwrap().id, "foo");
    }

    #[test]
    fn test_non_empty_collisions_are_suffixed() {
        let mut form = Form::new("data");
        let nodes: Vec<Ufid> = ["a", "b", "c"]
            .iter()
            .map(|n| form.add_node(None, n, NodeKind::Question).unwrap())
            .collect();
        let mut model = model();
        let mut keys = Vec::new();
        for node in &nodes {
            let key = model.create_item("foo", false);
            model.set_default_value(key, "text").unwrap();
            bind(&mut form, *node, ItextSlot::Label, key);
            keys.push(key);
        }

        assert_eq!(collect_items(&form, &mut model, false), keys);
        let ids: Vec<&str> = keys
            .iter()
            .map(|k| model.item(*k).unwrap().id.as_str())
            .collect();
        assert_eq!(ids, ["foo", "foo2", "foo3"]);
    }

    #[test]
    fn test_missing_item_is_skipped() {
        let mut form = Form::new("data");
        let a = form.add_node(None, "a", NodeKind::Question).unwrap();
        let mut model = model();
        let key = model.create_item("x", false);
        model.set_default_value(key, "X").unwrap();
        bind(&mut form, a, ItextSlot::Label, key);
        model.remove_item(key);
        assert!(collect_items(&form, &mut model, true).is_empty());
    }

    proptest! {
        #[test]
        fn prop_collection_is_idempotent(
            specs in prop::collection::vec((0usize..3, any::<bool>(), any::<bool>()), 1..12)
        ) {
            let mut form = Form::new("data");
            let mut model = model();
            for (i, (id_choice, auto, filled)) in specs.iter().enumerate() {
                let node = form
                    .add_node(None, &format!("n{i}"), NodeKind::Question)
                    .unwrap();
                let id = ["", "dup", "n0-label"][*id_choice];
                let key = model.create_item(id, *auto);
                if *filled {
                    model.set_default_value(key, "text").unwrap();
                }
                form.set_itext_slot(node, ItextSlot::Label, Some(key)).unwrap();
            }

            let first = collect_items(&form, &mut model, false);
            let first_ids: Vec<String> = first
                .iter()
                .map(|k| model.item(*k).unwrap().id.clone())
                .collect();
            let second = collect_items(&form, &mut model, false);
            let second_ids: Vec<String> = second
                .iter()
                .map(|k| model.item(*k).unwrap().id.clone())
                .collect();
            prop_assert_eq!(&first, &second);
            prop_assert_eq!(&first_ids, &second_ids);

            let unique: FxHashSet<&String> = first_ids.iter().collect();
            prop_assert_eq!(unique.len(), first_ids.len());
        }
    }
}

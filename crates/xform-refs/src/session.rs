//! One open form document: the tree, its reference graph and its
//! translations, kept consistent across edits.

use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::error::{ExchangeError, FormError, Warning, WarningLevel};
use crate::events::{Emitter, FormEvent, SubscriptionId};
use crate::itext::output_refs::{self, OutputRefChange};
use crate::itext::{
    collect_items, default_itext_id, export_tsv, import_tsv, read_itext_xml, write_itext_xml,
    ImportSummary, ItemKey, ItextModel, LoadSummary, DEFAULT_FORM,
};
use crate::logic::{MatchMode, PathMatcher, ReferenceGraph, RenameMap};
use crate::model::{schema_for, Form, FormTree, ItextSlot, NodeKind, PathChange, Ufid};

/// A property write made on behalf of the reference graph.
struct RecordedWrite {
    node: Ufid,
    property: String,
    previous: Option<String>,
    value: Option<String>,
}

/// Forwards to a [`Form`], remembering every property write so the session
/// can announce it afterwards.
struct Recorder<'a> {
    form: &'a mut Form,
    writes: Vec<RecordedWrite>,
}

impl<'a> Recorder<'a> {
    fn new(form: &'a mut Form) -> Self {
        Self {
            form,
            writes: Vec::new(),
        }
    }
}

impl FormTree for Recorder<'_> {
    fn resolve_path(&self, path: &str) -> Option<Ufid> {
        self.form.resolve_path(path)
    }

    fn absolute_path(&self, node: Ufid) -> Option<String> {
        self.form.absolute_path(node)
    }

    fn property(&self, node: Ufid, property: &str) -> Option<&str> {
        self.form.property(node, property)
    }

    fn set_property(&mut self, node: Ufid, property: &str, value: &str) -> Result<(), FormError> {
        let previous = self.form.property(node, property).map(str::to_string);
        self.form.set_property(node, property, value)?;
        self.writes.push(RecordedWrite {
            node,
            property: property.to_string(),
            previous,
            value: (!value.is_empty()).then(|| value.to_string()),
        });
        Ok(())
    }

    fn node_kind(&self, node: Ufid) -> Option<NodeKind> {
        self.form.node_kind(node)
    }

    fn node_name(&self, node: Ufid) -> Option<&str> {
        self.form.node_name(node)
    }

    fn parent(&self, node: Ufid) -> Option<Ufid> {
        self.form.parent(node)
    }

    fn walk(&self) -> Vec<Ufid> {
        self.form.walk()
    }

    fn itext_slot(&self, node: Ufid, slot: ItextSlot) -> Option<ItemKey> {
        self.form.itext_slot(node, slot)
    }

    fn set_itext_slot(
        &mut self,
        node: Ufid,
        slot: ItextSlot,
        key: Option<ItemKey>,
    ) -> Result<(), FormError> {
        self.form.set_itext_slot(node, slot, key)
    }
}

/// Session context for a single document.
///
/// Every structural edit goes through the session so that references in
/// expressions and in translated text follow the nodes they point at.
#[derive(Debug)]
pub struct FormSession {
    form: Form,
    graph: ReferenceGraph,
    itext: ItextModel,
    config: EngineConfig,
    events: Emitter<FormEvent>,
    /// Document-level warnings from loading and importing translations.
    form_warnings: Vec<Warning>,
}

impl FormSession {
    /// Opens a session over `form` and indexes every reference in it.
    pub fn new(form: Form, config: EngineConfig) -> Self {
        let mut itext = ItextModel::new();
        for lang in &config.languages {
            itext.add_language(lang.as_str());
        }
        if let Some(first) = config.languages.first() {
            itext.set_default_language(first.as_str());
        }
        let mut session = Self {
            graph: ReferenceGraph::new(&config),
            form,
            itext,
            config,
            events: Emitter::new(),
            form_warnings: Vec::new(),
        };
        session.rebuild_references();
        session
    }

    /// The document tree. Edit it through the session.
    pub fn form(&self) -> &Form {
        &self.form
    }

    /// Every tracked reference and its unresolved-path warnings.
    pub fn graph(&self) -> &ReferenceGraph {
        &self.graph
    }

    pub fn itext(&self) -> &ItextModel {
        &self.itext
    }

    /// Direct access to the translations. Changes made here are not
    /// announced.
    pub fn itext_mut(&mut self) -> &mut ItextModel {
        &mut self.itext
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Unresolved-reference warnings followed by document-level warnings.
    pub fn warnings(&self) -> Vec<&Warning> {
        self.graph
            .warnings()
            .iter()
            .chain(self.form_warnings.iter())
            .collect()
    }

    /// Replaces the document-level warning under `key`. No messages clears
    /// it.
    fn set_form_warning(&mut self, key: &str, messages: Vec<String>) {
        self.form_warnings.retain(|w| w.key != key);
        if !messages.is_empty() {
            self.form_warnings.push(Warning {
                level: WarningLevel::FormWarning,
                key: key.to_string(),
                messages,
            });
        }
    }

    /// Registers an observer for every [`FormEvent`] fired from now on.
    pub fn subscribe(&mut self, observer: impl FnMut(&FormEvent) + 'static) -> SubscriptionId {
        self.events.subscribe(observer)
    }

    /// Drops an observer. Returns `false` if it was already gone.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    /// Drops every reference record and recomputes them from the tree.
    pub fn rebuild_references(&mut self) {
        self.graph.reset();
        for node in self.form.walk() {
            self.graph.update_all_references(&self.form, node);
        }
        debug!(records = self.graph.len(), "indexed references");
    }

    fn tracks(&self, node: Ufid, property: &str) -> bool {
        self.form
            .node_kind(node)
            .is_some_and(|kind| schema_for(kind).is_reference_bearing(property))
            && self.config.reference_properties.iter().any(|p| p == property)
    }

    // =========================================================================
    // Properties
    // =========================================================================

    /// Writes a property (an empty value unsets it) and recomputes its
    /// references.
    pub fn set_property(&mut self, node: Ufid, property: &str, value: &str) -> Result<(), FormError> {
        let previous = self.form.property(node, property).map(str::to_string);
        if previous.as_deref().unwrap_or_default() == value {
            return Ok(());
        }
        self.form.set_property(node, property, value)?;
        if self.tracks(node, property) {
            self.graph.update_references(&self.form, node, property);
        }
        self.events.fire(&FormEvent::PropertyChanged {
            node,
            property: property.to_string(),
            previous,
            value: (!value.is_empty()).then(|| value.to_string()),
        });
        Ok(())
    }

    fn announce_writes(&mut self, writes: Vec<RecordedWrite>) {
        for write in writes {
            self.events.fire(&FormEvent::PropertyChanged {
                node: write.node,
                property: write.property,
                previous: write.previous,
                value: write.value,
            });
        }
    }

    // =========================================================================
    // Structure
    // =========================================================================

    /// Adds a node and gives it its translation slots.
    pub fn add_node(
        &mut self,
        parent: Option<Ufid>,
        name: &str,
        kind: NodeKind,
    ) -> Result<Ufid, FormError> {
        let node = self.form.add_node(parent, name, kind)?;
        self.ensure_itext_slots(node)?;
        Ok(node)
    }

    /// Renames a node. Returns the properties rewritten elsewhere.
    pub fn rename_node(&mut self, node: Ufid, name: &str) -> Result<Vec<(Ufid, String)>, FormError> {
        let old_paths = self.subtree_paths(node);
        let change = self.form.rename_node(node, name)?;
        Ok(self.follow_path_change(&change, old_paths))
    }

    /// Moves a node under `parent`. Returns the properties rewritten
    /// elsewhere.
    pub fn move_node(
        &mut self,
        node: Ufid,
        parent: Option<Ufid>,
        index: Option<usize>,
    ) -> Result<Vec<(Ufid, String)>, FormError> {
        let old_paths = self.subtree_paths(node);
        let change = self.form.move_node(node, parent, index)?;
        Ok(self.follow_path_change(&change, old_paths))
    }

    fn subtree_paths(&self, node: Ufid) -> Vec<(Ufid, String)> {
        self.form
            .subtree(node)
            .into_iter()
            .filter_map(|id| self.form.absolute_path(id).map(|path| (id, path)))
            .collect()
    }

    fn rename_map(&self, old_paths: &[(Ufid, String)], new_path: impl Fn(Ufid) -> Option<String>) -> RenameMap {
        let mut map = RenameMap::new();
        for (id, old) in old_paths {
            if let Some(new) = new_path(*id) {
                let is_group = self.form.node_kind(*id).is_some_and(|k| k.is_group());
                map.insert(*id, old.as_str(), new, is_group);
            }
        }
        map
    }

    fn follow_path_change(
        &mut self,
        change: &PathChange,
        old_paths: Vec<(Ufid, String)>,
    ) -> Vec<(Ufid, String)> {
        if change.old_path == change.new_path {
            return Vec::new();
        }
        info!(from = %change.old_path, to = %change.new_path, "node path changed");
        let map = self.rename_map(&old_paths, |id| self.form.absolute_path(id));

        let mut recorder = Recorder::new(&mut self.form);
        let rewritten = self.graph.update_paths(&mut recorder, &map, None);
        let writes = recorder.writes;
        self.announce_writes(writes);

        // records held by the moved subtree still carry its old paths
        for (id, _) in &old_paths {
            self.graph.update_all_references(&self.form, *id);
        }

        let is_group = self
            .form
            .node_kind(change.node)
            .is_some_and(|k| k.is_group());
        let mode = if is_group { MatchMode::Subtree } else { MatchMode::Leaf };
        let matcher = PathMatcher::new(change.old_path.as_str(), change.new_path.as_str(), mode);
        let changes = output_refs::rewrite_model(&mut self.itext, &matcher);
        self.announce_item_changes(changes);

        self.events.fire(&FormEvent::NodeRenamed {
            node: change.node,
            old_path: change.old_path.clone(),
            new_path: change.new_path.clone(),
        });
        rewritten
    }

    fn announce_item_changes(&mut self, changes: Vec<OutputRefChange>) {
        for change in changes {
            self.events.fire(&FormEvent::ItemChanged { key: change.key });
            let Some(text) = change.label_text else {
                continue;
            };
            for node in self.form.walk() {
                if self.form.itext_slot(node, ItextSlot::Label) == Some(change.key) {
                    self.events.fire(&FormEvent::LabelTextChanged {
                        node,
                        text: text.clone(),
                    });
                }
            }
        }
    }

    /// Copies a node and its subtree next to the original.
    ///
    /// Copies get their own translation items. References inside the copy
    /// that pointed into the original subtree are redirected into the copy.
    /// Returns `(original, copy)` pairs in document order.
    pub fn duplicate_node(&mut self, node: Ufid) -> Result<Vec<(Ufid, Ufid)>, FormError> {
        let pairs = self.form.duplicate_node(node)?;
        let Some(&(_, root_copy)) = pairs.first() else {
            return Ok(pairs);
        };

        let mut cloned = Vec::new();
        for (_, copy) in &pairs {
            for slot in ItextSlot::ALL {
                if let Some(key) = self.form.itext_slot(*copy, slot) {
                    let fresh = self.itext.clone_item(key)?;
                    self.form.set_itext_slot(*copy, slot, Some(fresh))?;
                    cloned.push(fresh);
                }
            }
        }
        for (_, copy) in &pairs {
            self.graph.update_all_references(&self.form, *copy);
        }

        let old_paths: Vec<(Ufid, String)> = pairs
            .iter()
            .filter_map(|(orig, _)| self.form.absolute_path(*orig).map(|p| (*orig, p)))
            .collect();
        let map = {
            let form = &self.form;
            self.rename_map(&old_paths, |orig| {
                pairs
                    .iter()
                    .find(|(o, _)| *o == orig)
                    .and_then(|(_, copy)| form.absolute_path(*copy))
            })
        };
        let scope = self.form.absolute_path(root_copy).unwrap_or_default();
        let mut recorder = Recorder::new(&mut self.form);
        self.graph.update_paths(&mut recorder, &map, Some(&scope));
        let writes = recorder.writes;
        self.announce_writes(writes);

        let matchers: Vec<PathMatcher> = map
            .iter()
            .map(|(_, entry)| PathMatcher::leaf(entry.from.as_str(), entry.to.as_str()))
            .collect();
        let default_lang = self.itext.default_language().to_string();
        let mut changes = Vec::new();
        for key in cloned {
            let Some(item) = self.itext.item_mut(key) else {
                continue;
            };
            let mut merged: Option<OutputRefChange> = None;
            for matcher in &matchers {
                let Some(change) = output_refs::rewrite_item(item, &default_lang, matcher) else {
                    continue;
                };
                // a later rename that left the label alone keeps the earlier text
                let label_text = change
                    .label_text
                    .or_else(|| merged.take().and_then(|m| m.label_text));
                merged = Some(OutputRefChange {
                    key: change.key,
                    label_text,
                });
            }
            changes.extend(merged);
        }
        self.announce_item_changes(changes);

        for (original, copy) in &pairs {
            self.events.fire(&FormEvent::NodeDuplicated {
                original: *original,
                copy: *copy,
            });
        }
        Ok(pairs)
    }

    /// Removes a node and its subtree. Their translation items stay in the
    /// model. Properties that referenced a removed node are recomputed and
    /// now report it as unknown.
    pub fn remove_node(&mut self, node: Ufid) -> Result<Vec<Ufid>, FormError> {
        let doomed = self.form.subtree(node);
        let mut referrers: Vec<Ufid> = Vec::new();
        for id in &doomed {
            for reference in self.graph.references_to(*id) {
                if !doomed.contains(&reference.source) && !referrers.contains(&reference.source) {
                    referrers.push(reference.source);
                }
            }
        }

        let removed = self.form.remove_node(node)?;
        for id in &removed {
            self.graph.forget_node(*id);
        }
        for source in referrers {
            self.graph.update_all_references(&self.form, source);
        }
        for id in &removed {
            self.events.fire(&FormEvent::NodeRemoved { node: *id });
        }
        Ok(removed)
    }

    // =========================================================================
    // Translations
    // =========================================================================

    /// Binds the item with display id `id` to a slot, creating it if needed.
    ///
    /// The item is automatic when `id` is empty or equal to the id the slot
    /// would derive. An existing item bound under a custom id stops being
    /// automatic.
    pub fn bind_itext(&mut self, node: Ufid, slot: ItextSlot, id: &str) -> Result<ItemKey, FormError> {
        let auto = id.is_empty() || id == default_itext_id(&self.form, node, slot);
        let existing = (!id.is_empty())
            .then(|| self.itext.get_item(id))
            .flatten();
        let key = match existing {
            Some(key) => {
                if !auto {
                    if let Some(item) = self.itext.item_mut(key) {
                        item.auto_id = false;
                    }
                }
                key
            }
            None => self.itext.create_item(id, auto),
        };
        self.form.set_itext_slot(node, slot, Some(key))?;
        Ok(key)
    }

    /// Gives a node every translation slot its kind allows and lacks. A new
    /// label starts out as the node's name.
    pub fn ensure_itext_slots(&mut self, node: Ufid) -> Result<(), FormError> {
        let kind = self
            .form
            .node_kind(node)
            .ok_or(FormError::UnknownNode { node })?;
        let schema = schema_for(kind);
        let mut slots = Vec::new();
        if !kind.is_data_only() {
            slots.extend([ItextSlot::Label, ItextSlot::Hint, ItextSlot::Help]);
        }
        if !kind.is_control_only() {
            slots.push(ItextSlot::ConstraintMsg);
        }
        for slot in slots {
            if !schema.allows_slot(slot) || self.form.itext_slot(node, slot).is_some() {
                continue;
            }
            let key = self.itext.create_item("", true);
            if slot == ItextSlot::Label {
                let name = self.form.node_name(node).unwrap_or_default().to_string();
                self.itext.set_default_value(key, name)?;
            }
            self.form.set_itext_slot(node, slot, Some(key))?;
        }
        Ok(())
    }

    /// Sets the display id of a slot's item, first giving the slot its own
    /// copy when `unlink` is set. Returns the slot's item afterwards.
    pub fn set_itext_id(
        &mut self,
        node: Ufid,
        slot: ItextSlot,
        id: &str,
        unlink: bool,
    ) -> Result<Option<ItemKey>, FormError> {
        let Some(mut key) = self.form.itext_slot(node, slot) else {
            return Ok(None);
        };
        let current = self.itext.item(key).map(|item| item.id.as_str());
        if current == Some(id) {
            return Ok(Some(key));
        }
        if unlink {
            key = self.itext.clone_item(key)?;
        }
        if let Some(item) = self.itext.item_mut(key) {
            item.id = id.to_string();
        }
        self.form.set_itext_slot(node, slot, Some(key))?;
        self.events.fire(&FormEvent::ItemChanged { key });
        Ok(Some(key))
    }

    /// Text of a slot's `default` form in the configured display language,
    /// falling back to the default language when that text is missing or
    /// empty.
    pub fn display_text(&self, node: Ufid, slot: ItextSlot) -> Option<&str> {
        let item = self
            .form
            .itext_slot(node, slot)
            .and_then(|key| self.itext.item(key))?;
        self.config
            .display_language
            .as_deref()
            .and_then(|lang| item.get(lang, DEFAULT_FORM))
            .filter(|text| !text.is_empty())
            .or_else(|| item.default_value(self.itext.languages()))
    }

    /// First node, in document order, whose label item has display id `id`.
    pub fn node_by_label_itext_id(&self, id: &str) -> Option<Ufid> {
        self.form.walk().into_iter().find(|node| {
            self.form
                .itext_slot(*node, ItextSlot::Label)
                .and_then(|key| self.itext.item(key))
                .is_some_and(|item| item.id == id)
        })
    }

    /// Messages from every validator of the node's kind.
    pub fn validate_node(&self, node: Ufid) -> Result<Vec<String>, FormError> {
        let kind = self
            .form
            .node_kind(node)
            .ok_or(FormError::UnknownNode { node })?;
        Ok(schema_for(kind).validate(&self.form, node, &self.itext))
    }

    /// Runs the collection pass. See [`collect_items`].
    pub fn collect_itext_items(&mut self, include_empty: bool) -> Vec<ItemKey> {
        collect_items(&self.form, &mut self.itext, include_empty)
    }

    /// Loads an `<itext>` block. Translations in languages the config does
    /// not accept are skipped and reported as a document-level warning.
    pub fn load_itext_xml(&mut self, xml: &str) -> Result<LoadSummary, ExchangeError> {
        let summary = read_itext_xml(xml, &mut self.itext, &self.config.languages)?;
        let messages = summary
            .skipped_languages
            .iter()
            .map(|lang| format!("Translations in language '{lang}' were not loaded."))
            .collect();
        self.set_form_warning("itext-skipped-languages", messages);
        self.events.fire(&FormEvent::ItextChanged);
        Ok(summary)
    }

    /// Runs the collection pass and writes the `<itext>` block.
    pub fn write_itext_xml(&mut self) -> Result<String, ExchangeError> {
        write_itext_xml(&self.form, &mut self.itext)
    }

    /// Tab-delimited sheet of every non-empty item, in the configured forms.
    pub fn export_translations(&mut self) -> Result<String, ExchangeError> {
        export_tsv(&self.form, &mut self.itext, &self.config.exchange_forms)
    }

    /// Applies a translation sheet. Rows naming no item are skipped and
    /// reported as a document-level warning.
    pub fn import_translations(&mut self, input: &str) -> Result<ImportSummary, ExchangeError> {
        let summary = import_tsv(&self.form, &mut self.itext, &self.config.exchange_forms, input)?;
        let messages = summary
            .skipped_ids
            .iter()
            .map(|id| format!("No translation item with ID '{id}'; the row was skipped."))
            .collect();
        self.set_form_warning("translations-unknown-ids", messages);
        self.events.fire(&FormEvent::ItextChanged);
        Ok(summary)
    }
}

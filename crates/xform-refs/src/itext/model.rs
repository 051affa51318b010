//! The translation store of one document session.

use std::collections::BTreeMap;
use std::num::NonZeroU32;

use crate::error::ItextError;
use crate::itext::item::{ItemKey, ItextItem, Languages};

/// Languages plus every translation item, keyed by [`ItemKey`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItextModel {
    languages: Languages,
    items: BTreeMap<ItemKey, ItextItem>,
    next_key: NonZeroU32,
}

impl Default for ItextModel {
    fn default() -> Self {
        Self::new()
    }
}

impl ItextModel {
    pub fn new() -> Self {
        Self::with_languages(Languages::default())
    }

    pub fn with_languages(languages: Languages) -> Self {
        Self {
            languages,
            items: BTreeMap::new(),
            next_key: NonZeroU32::MIN,
        }
    }

    // =========================================================================
    // Languages
    // =========================================================================

    /// The languages, lent to item accessors that need the default.
    pub fn languages(&self) -> &Languages {
        &self.languages
    }

    pub fn has_language(&self, lang: &str) -> bool {
        self.languages.contains(lang)
    }

    /// Appends a language. Returns `false` if it was already present.
    pub fn add_language(&mut self, lang: impl Into<String>) -> bool {
        self.languages.add(lang.into())
    }

    /// Removes a language, promoting the first remaining language to
    /// default if the removed one was the default.
    pub fn remove_language(&mut self, lang: &str) -> bool {
        self.languages.remove(lang)
    }

    /// Makes a registered language the default. Returns `false`, changing
    /// nothing, for a language the model does not have.
    pub fn set_default_language(&mut self, lang: impl Into<String>) -> bool {
        self.languages.set_default(lang)
    }

    pub fn default_language(&self) -> &str {
        self.languages.default_language()
    }

    // =========================================================================
    // Items
    // =========================================================================

    fn allocate_key(&mut self) -> ItemKey {
        let key = ItemKey::new(self.next_key);
        self.next_key = self.next_key.saturating_add(1);
        key
    }

    /// Registers an item under a fresh key.
    ///
    /// An item that already carries a key belongs to some other
    /// registration; adding it again is refused with
    /// [`ItextError::DuplicateKey`].
    pub fn add_item(&mut self, mut item: ItextItem) -> Result<ItemKey, ItextError> {
        if let Some(key) = item.key {
            return Err(ItextError::DuplicateKey { key });
        }
        let key = self.allocate_key();
        item.key = Some(key);
        self.items.insert(key, item);
        Ok(key)
    }

    /// Creates and registers an item with one empty `default` form.
    pub fn create_item(&mut self, id: impl Into<String>, auto_id: bool) -> ItemKey {
        let key = self.allocate_key();
        let mut item = ItextItem::new(id, auto_id);
        item.key = Some(key);
        self.items.insert(key, item);
        key
    }

    /// Key of the first item, in key order, whose display id is `id`.
    pub fn get_item(&self, id: &str) -> Option<ItemKey> {
        self.items
            .iter()
            .find(|(_, item)| item.id == id)
            .map(|(key, _)| *key)
    }

    pub fn get_or_create_item(&mut self, id: &str) -> ItemKey {
        match self.get_item(id) {
            Some(key) => key,
            None => self.create_item(id, true),
        }
    }

    /// Registers a deep copy of an item under a fresh key.
    pub fn clone_item(&mut self, key: ItemKey) -> Result<ItemKey, ItextError> {
        let copy = self
            .items
            .get(&key)
            .ok_or(ItextError::UnknownItem { key })?
            .duplicate();
        self.add_item(copy)
    }

    /// The item registered under `key`.
    pub fn item(&self, key: ItemKey) -> Option<&ItextItem> {
        self.items.get(&key)
    }

    pub fn item_mut(&mut self, key: ItemKey) -> Option<&mut ItextItem> {
        self.items.get_mut(&key)
    }

    /// An item together with the languages its value accessors need.
    pub fn item_with_languages_mut(
        &mut self,
        key: ItemKey,
    ) -> Option<(&mut ItextItem, &Languages)> {
        let item = self.items.get_mut(&key)?;
        Some((item, &self.languages))
    }

    /// Splits the model into its languages and its items, in key order.
    pub fn parts_mut(&mut self) -> (&Languages, impl Iterator<Item = &mut ItextItem>) {
        (&self.languages, self.items.values_mut())
    }

    pub fn contains(&self, key: ItemKey) -> bool {
        self.items.contains_key(&key)
    }

    /// Items in key order.
    pub fn items(&self) -> impl Iterator<Item = &ItextItem> {
        self.items.values()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn remove_item(&mut self, key: ItemKey) -> Option<ItextItem> {
        self.items.remove(&key)
    }

    /// Display ids of every item, in key order. May contain duplicates.
    pub fn all_item_ids(&self) -> Vec<&str> {
        self.items.values().map(|item| item.id.as_str()).collect()
    }

    /// Sets the `default` form's text in the default language.
    pub fn set_default_value(
        &mut self,
        key: ItemKey,
        value: impl Into<String>,
    ) -> Result<(), ItextError> {
        let (item, langs) = self
            .item_with_languages_mut(key)
            .ok_or(ItextError::UnknownItem { key })?;
        item.set_default_value(langs, value);
        Ok(())
    }
}

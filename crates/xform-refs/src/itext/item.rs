//! Translation items and their forms.

use std::cell::OnceCell;
use std::fmt;
use std::num::NonZeroU32;

use crate::itext::output_refs;

/// Form names with a built-in meaning.
pub const RESERVED_FORMS: [&str; 6] = ["default", "short", "long", "audio", "video", "image"];

/// Forms that point at media files rather than holding text.
pub const MEDIA_FORMS: [&str; 3] = ["image", "audio", "video"];

pub const DEFAULT_FORM: &str = "default";

/// Identity of an item inside one [`ItextModel`](crate::itext::ItextModel).
///
/// Keys are handed out in increasing order and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemKey(NonZeroU32);

impl ItemKey {
    pub const fn new(value: NonZeroU32) -> Self {
        Self(value)
    }

    pub fn get(self) -> u32 {
        self.0.get()
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Read-only view of the model's languages.
///
/// Items never own this; the model lends it to the value accessors that
/// need the default language.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Languages {
    codes: Vec<String>,
    default: String,
}

impl Languages {
    /// Languages in the given order. A `default` that is not among `codes`
    /// is ignored, leaving the first language as the default.
    pub fn new<I, S>(codes: I, default: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut langs = Self::default();
        for code in codes {
            langs.add(code.into());
        }
        let default = default.into();
        if langs.contains(&default) {
            langs.default = default;
        }
        langs
    }

    /// Language codes in display order.
    pub fn codes(&self) -> &[String] {
        &self.codes
    }

    pub fn contains(&self, lang: &str) -> bool {
        self.codes.iter().any(|c| c == lang)
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// The explicit default, else the first language, else `""`.
    pub fn default_language(&self) -> &str {
        if !self.default.is_empty() {
            &self.default
        } else {
            self.codes.first().map(String::as_str).unwrap_or_default()
        }
    }

    pub(crate) fn add(&mut self, lang: String) -> bool {
        if self.contains(&lang) {
            return false;
        }
        self.codes.push(lang);
        true
    }

    pub(crate) fn remove(&mut self, lang: &str) -> bool {
        let before = self.codes.len();
        self.codes.retain(|c| c != lang);
        let removed = self.codes.len() != before;
        if self.default_language() == lang {
            self.default = self.codes.first().cloned().unwrap_or_default();
        }
        removed
    }

    /// Makes `lang` the default. Unknown languages are refused.
    pub(crate) fn set_default(&mut self, lang: impl Into<String>) -> bool {
        let lang = lang.into();
        if !self.contains(&lang) {
            return false;
        }
        self.default = lang;
        true
    }
}

/// One named text variant of an item, holding text per language.
#[derive(Debug, Clone, Default)]
pub struct ItextForm {
    name: String,
    data: Vec<(String, String)>,
    output_refs: OnceCell<Vec<(String, Vec<String>)>>,
}

impl PartialEq for ItextForm {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.data == other.data
    }
}

impl Eq for ItextForm {}

impl ItextForm {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Form name, e.g. `default` or `image`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `(language, text)` pairs in insertion order.
    pub fn data(&self) -> impl Iterator<Item = (&str, &str)> {
        self.data.iter().map(|(l, t)| (l.as_str(), t.as_str()))
    }

    /// Exact text in `lang`, without fallback.
    pub fn value(&self, lang: &str) -> Option<&str> {
        self.data
            .iter()
            .find(|(l, _)| l == lang)
            .map(|(_, t)| t.as_str())
    }

    /// Sets the text in `lang`, adding the language if needed.
    pub fn set_value(&mut self, lang: &str, value: impl Into<String>) {
        let value = value.into();
        match self.data.iter_mut().find(|(l, _)| l == lang) {
            Some((_, text)) => *text = value,
            None => self.data.push((lang.to_string(), value)),
        }
        self.output_refs.take();
    }

    /// Text for `lang`, falling back to the default language and then to
    /// the first non-empty text.
    pub fn value_or_default(&self, lang: &str, langs: &Languages) -> &str {
        if let Some(text) = self.value(lang).filter(|t| !t.is_empty()) {
            return text;
        }
        let default_lang = langs.default_language();
        if lang != default_lang {
            if let Some(text) = self.value(default_lang).filter(|t| !t.is_empty()) {
                return text;
            }
        }
        self.data
            .iter()
            .map(|(_, t)| t.as_str())
            .find(|t| !t.is_empty())
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.data.iter().all(|(_, t)| t.is_empty())
    }

    /// Paths inside `<output value="..."/>` markup, per language with text.
    ///
    /// Computed on first use and cached until the next
    /// [`set_value`](Self::set_value).
    pub fn output_ref_expressions(&self) -> &[(String, Vec<String>)] {
        self.output_refs.get_or_init(|| {
            self.data
                .iter()
                .filter(|(_, text)| !text.is_empty())
                .map(|(lang, text)| (lang.clone(), output_refs::extract(text)))
                .collect()
        })
    }
}

/// A multilingual, multi-form unit of display text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItextItem {
    pub(crate) key: Option<ItemKey>,
    /// Serialization id. Mutable, and may collide until the collection pass.
    pub id: String,
    /// Whether `id` is regenerated from the owning node's path.
    pub auto_id: bool,
    forms: Vec<ItextForm>,
}

impl Default for ItextItem {
    fn default() -> Self {
        Self::new("", true)
    }
}

impl ItextItem {
    /// An unregistered item with one empty `default` form.
    pub fn new(id: impl Into<String>, auto_id: bool) -> Self {
        Self {
            key: None,
            id: id.into(),
            auto_id,
            forms: vec![ItextForm::new(DEFAULT_FORM)],
        }
    }

    /// An unregistered item with no forms at all.
    pub fn bare(id: impl Into<String>, auto_id: bool) -> Self {
        Self {
            key: None,
            id: id.into(),
            auto_id,
            forms: Vec::new(),
        }
    }

    /// Key in the owning model. `None` until the item is registered.
    pub fn key(&self) -> Option<ItemKey> {
        self.key
    }

    /// A copy of the text and forms that is not registered anywhere.
    pub fn duplicate(&self) -> Self {
        Self {
            key: None,
            ..self.clone()
        }
    }

    /// Forms in insertion order, `default` first for new items.
    pub fn forms(&self) -> &[ItextForm] {
        &self.forms
    }

    pub fn forms_mut(&mut self) -> &mut [ItextForm] {
        &mut self.forms
    }

    pub fn form_names(&self) -> Vec<&str> {
        self.forms.iter().map(ItextForm::name).collect()
    }

    pub fn has_form(&self, name: &str) -> bool {
        self.forms.iter().any(|f| f.name == name)
    }

    pub fn form(&self, name: &str) -> Option<&ItextForm> {
        self.forms.iter().find(|f| f.name == name)
    }

    pub fn form_mut(&mut self, name: &str) -> Option<&mut ItextForm> {
        self.forms.iter_mut().find(|f| f.name == name)
    }

    /// Adds an empty form. Returns `None` if the form already exists.
    pub fn add_form(&mut self, name: &str) -> Option<&mut ItextForm> {
        if self.has_form(name) {
            return None;
        }
        self.forms.push(ItextForm::new(name));
        self.forms.last_mut()
    }

    /// The named form, appended empty when missing.
    pub fn get_or_create_form(&mut self, name: &str) -> &mut ItextForm {
        let index = match self.forms.iter().position(|f| f.name == name) {
            Some(index) => index,
            None => {
                self.forms.push(ItextForm::new(name));
                self.forms.len() - 1
            }
        };
        &mut self.forms[index]
    }

    pub fn remove_form(&mut self, name: &str) -> Option<ItextForm> {
        let index = self.forms.iter().position(|f| f.name == name)?;
        Some(self.forms.remove(index))
    }

    /// Exact text of `form` in `lang`, without fallback.
    pub fn get(&self, lang: &str, form: &str) -> Option<&str> {
        self.form(form)?.value(lang)
    }

    /// Text of the `default` form in the default language.
    pub fn default_value<'a>(&'a self, langs: &Languages) -> Option<&'a str> {
        self.get(langs.default_language(), DEFAULT_FORM)
    }

    /// Sets the `default` form's text in the default language.
    pub fn set_default_value(&mut self, langs: &Languages, value: impl Into<String>) {
        self.get_or_create_form(DEFAULT_FORM)
            .set_value(langs.default_language(), value);
    }

    /// Whether every form is empty. Empty items are not written out.
    pub fn is_empty(&self) -> bool {
        self.forms.iter().all(ItextForm::is_empty)
    }

    /// Whether any built-in text form (as opposed to a media form) exists.
    pub fn has_human_readable_itext(&self) -> bool {
        RESERVED_FORMS
            .iter()
            .filter(|name| !MEDIA_FORMS.contains(*name))
            .any(|name| self.has_form(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn langs() -> Languages {
        Languages::new(["en", "es"], "en")
    }

    #[test]
    fn test_value_or_default_falls_back_to_default_language() {
        let mut form = ItextForm::new("default");
        form.set_value("en", "Hello");
        assert_eq!(form.value_or_default("es", &langs()), "Hello");
        assert_eq!(form.value_or_default("en", &langs()), "Hello");
    }

    #[test]
    fn test_value_or_default_resolution_order() {
        let langs = Languages::new(["en", "es", "fr"], "en");
        let mut form = ItextForm::new("default");
        form.set_value("es", "");
        form.set_value("fr", "Bonjour");
        form.set_value("es", "Hola");
        assert_eq!(form.value_or_default("es", &langs), "Hola");
        // default language missing: first non-empty in insertion order
        form.set_value("es", "");
        assert_eq!(form.value_or_default("de", &langs), "Bonjour");
        assert_eq!(ItextForm::new("x").value_or_default("en", &langs), "");
    }

    #[test]
    fn test_form_emptiness() {
        let mut form = ItextForm::new("default");
        assert!(form.is_empty());
        form.set_value("en", "");
        assert!(form.is_empty());
        form.set_value("es", "x");
        assert!(!form.is_empty());
    }

    #[test]
    fn test_output_refs_cache_invalidated_on_write() {
        let mut form = ItextForm::new("default");
        form.set_value("en", "Age: <output value=\"/data/age\"/>");
        assert_eq!(
            form.output_ref_expressions(),
            &[("en".to_string(), vec!["/data/age".to_string()])]
        );
        form.set_value("en", "Years: <output ref=\"/data/years\"></output>");
        assert_eq!(
            form.output_ref_expressions(),
            &[("en".to_string(), vec!["/data/years".to_string()])]
        );
    }

    #[test]
    fn test_item_forms() {
        let mut item = ItextItem::new("q-label", true);
        assert!(item.is_empty());
        assert!(item.has_human_readable_itext());
        assert!(item.add_form("default").is_none());
        item.get_or_create_form("audio").set_value("en", "jr://file/a.mp3");
        assert_eq!(item.form_names(), ["default", "audio"]);
        assert!(!item.is_empty());
        assert_eq!(item.get("en", "audio"), Some("jr://file/a.mp3"));
        assert!(item.remove_form("audio").is_some());
        assert!(item.is_empty());

        let bare = ItextItem::bare("x", false);
        assert!(!bare.has_human_readable_itext());
        assert!(bare.is_empty());
    }

    #[test]
    fn test_default_value() {
        let langs = langs();
        let mut item = ItextItem::default();
        assert_eq!(item.default_value(&langs), None);
        item.set_default_value(&langs, "Age");
        assert_eq!(item.default_value(&langs), Some("Age"));
        assert_eq!(item.get("en", "default"), Some("Age"));
    }

    #[test]
    fn test_languages_remove_default() {
        let mut langs = langs();
        assert!(langs.remove("en"));
        assert_eq!(langs.default_language(), "es");
        assert!(langs.remove("es"));
        assert_eq!(langs.default_language(), "");
        assert!(!langs.remove("es"));
    }

    #[test]
    fn test_unknown_default_is_ignored() {
        let langs = Languages::new(["en", "es"], "fr");
        assert_eq!(langs.default_language(), "en");

        let mut langs = Languages::new(["en", "es"], "es");
        assert_eq!(langs.default_language(), "es");
        assert!(!langs.set_default("fr"));
        assert_eq!(langs.default_language(), "es");
    }

    #[test]
    fn test_human_readable_forms() {
        let mut item = ItextItem::bare("", true);
        item.add_form("image");
        assert!(!item.has_human_readable_itext());
        item.add_form("long");
        assert!(item.has_human_readable_itext());
    }

    #[test]
    fn test_duplicate_drops_key() {
        let mut item = ItextItem::new("a", false);
        item.key = ItemKey::new(NonZeroU32::MIN).into();
        let copy = item.duplicate();
        assert_eq!(copy.key(), None);
        assert_eq!(copy.id, "a");
        assert!(!copy.auto_id);
    }
}

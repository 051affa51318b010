//! Cross-references embedded in translated text as `<output/>` markup.
//!
//! These live inside opaque strings, so they are found with a lenient
//! pattern instead of an XML parser. Nested or malformed tags may be
//! mis-extracted; the pattern is kept as is because stored documents were
//! written against it.

use lazy_static::lazy_static;
use regex::{Captures, Regex};
use tracing::debug;

use crate::itext::item::{ItemKey, ItextItem, DEFAULT_FORM};
use crate::itext::model::ItextModel;
use crate::logic::PathMatcher;

lazy_static! {
    /// `<output value="PATH"/>`, `<output ref="PATH" />` or
    /// `<output value="PATH"></output>`, case-insensitive.
    pub static ref OUTPUT_REF: Regex =
        Regex::new(r#"(?i)<output (?:value|ref)="(.*?)"\s*(?:/|></output)>"#).unwrap();
}

/// Paths referenced by `<output/>` tags in `text`, in order.
pub fn extract(text: &str) -> Vec<String> {
    OUTPUT_REF
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Canonical tag for a path.
pub fn output_tag(path: &str) -> String {
    format!("<output value=\"{path}\" />")
}

/// Rewrites the tags of `text` whose path matches.
///
/// Rewritten tags are written in canonical form; others are left
/// untouched. Returns `None` when no tag changed.
pub fn rewrite(text: &str, matcher: &PathMatcher) -> Option<String> {
    let mut changed = false;
    let rewritten = OUTPUT_REF.replace_all(text, |caps: &Captures<'_>| {
        let path = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
        match matcher.rewrite_all(path) {
            Some(new_path) => {
                changed = true;
                output_tag(&new_path)
            }
            None => caps[0].to_string(),
        }
    });
    changed.then(|| rewritten.into_owned())
}

/// An item whose text was rewritten by [`rewrite_model`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputRefChange {
    pub key: ItemKey,
    /// New text of the default form in the default language, when that text
    /// changed.
    pub label_text: Option<String>,
}

/// Applies a rename to the output tags of every form and language of one
/// item. Returns `None` when nothing changed.
pub fn rewrite_item(
    item: &mut ItextItem,
    default_lang: &str,
    matcher: &PathMatcher,
) -> Option<OutputRefChange> {
    let key = item.key()?;
    let mut touched = false;
    let mut label_changed = false;
    for form in item.forms_mut() {
        // Only languages whose cached refs show a match need a rewrite.
        let candidates: Vec<String> = form
            .output_ref_expressions()
            .iter()
            .filter(|(_, refs)| refs.iter().any(|r| matcher.rewrite_all(r).is_some()))
            .map(|(lang, _)| lang.clone())
            .collect();
        for lang in candidates {
            let Some(new_text) = form.value(&lang).and_then(|t| rewrite(t, matcher)) else {
                continue;
            };
            debug!(item = %key, form = form.name(), lang = %lang, "rewrote output reference");
            if form.name() == DEFAULT_FORM && lang == default_lang {
                label_changed = true;
            }
            form.set_value(&lang, new_text);
            touched = true;
        }
    }
    touched.then(|| OutputRefChange {
        key,
        label_text: label_changed
            .then(|| item.get(default_lang, DEFAULT_FORM).map(str::to_string))
            .flatten(),
    })
}

/// Applies a rename to the output tags of every item, form and language.
pub fn rewrite_model(model: &mut ItextModel, matcher: &PathMatcher) -> Vec<OutputRefChange> {
    let (langs, items) = model.parts_mut();
    let default_lang = langs.default_language().to_string();
    items
        .filter_map(|item| rewrite_item(item, &default_lang, matcher))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::itext::Languages;
    use crate::logic::MatchMode;

    #[test]
    fn test_extract_variants() {
        let text = concat!(
            "A <output value=\"/data/a\"/> B <OUTPUT REF=\"/data/b\" /> ",
            "C <output value=\"/data/c\"></output> D <output value=\"/data/d\">"
        );
        assert_eq!(extract(text), ["/data/a", "/data/b", "/data/c"]);
    }

    #[test]
    fn test_rewrite_normalizes_tag() {
        let m = PathMatcher::leaf("/data/age", "/data/years");
        assert_eq!(
            rewrite("You are <output ref=\"/data/age\"></output>!", &m).as_deref(),
            Some("You are <output value=\"/data/years\" />!")
        );
        assert_eq!(rewrite("<output value=\"/data/ages\"/>", &m), None);
        assert_eq!(rewrite("/data/age outside any tag", &m), None);
    }

    #[test]
    fn test_rewrite_inside_function_call() {
        let m = PathMatcher::new("/data/g", "/data/h", MatchMode::Subtree);
        assert_eq!(
            rewrite("<output value=\"format-date(date(/data/g/dob), '%d')\"/>", &m).as_deref(),
            Some("<output value=\"format-date(date(/data/h/dob), '%d')\" />")
        );
    }

    #[test]
    fn test_rewrite_model_reports_label_changes() {
        let mut model = ItextModel::with_languages(Languages::new(["en", "es"], "en"));
        let labelled = model.create_item("q-label", true);
        let hinted = model.create_item("q-hint", true);
        {
            let item = model.item_mut(labelled).unwrap();
            let form = item.get_or_create_form("default");
            form.set_value("en", "Age <output value=\"/data/age\"/>");
            form.set_value("es", "Edad <output value=\"/data/age\"/>");
        }
        model
            .item_mut(hinted)
            .unwrap()
            .get_or_create_form("default")
            .set_value("es", "<output value=\"/data/age\"/>");

        let m = PathMatcher::leaf("/data/age", "/data/years");
        let changes = rewrite_model(&mut model, &m);
        assert_eq!(
            changes,
            vec![
                OutputRefChange {
                    key: labelled,
                    label_text: Some("Age <output value=\"/data/years\" />".into()),
                },
                OutputRefChange {
                    key: hinted,
                    label_text: None,
                },
            ]
        );
        assert_eq!(
            model.item(labelled).unwrap().get("es", "default"),
            Some("Edad <output value=\"/data/years\" />")
        );
    }
}

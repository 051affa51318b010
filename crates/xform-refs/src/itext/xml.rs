//! The `<itext>` block of a form document.
//!
//! ```xml
//! <itext>
//!   <translation lang="en" default="">
//!     <text id="age-label">
//!       <value>How old is <output value="/data/name" />?</value>
//!       <value form="image">jr://images/age.png</value>
//!     </text>
//!   </translation>
//! </itext>
//! ```
//!
//! Item text is markup: `<output/>` tags are kept as tags, everything else
//! is character data and is escaped on write.

use quick_xml::escape::partial_escape;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use rustc_hash::FxHashSet;
use tracing::{debug, warn};

use crate::error::ExchangeError;
use crate::itext::collect::collect_items;
use crate::itext::item::{ItemKey, DEFAULT_FORM};
use crate::itext::model::ItextModel;
use crate::itext::output_refs::{output_tag, OUTPUT_REF};
use crate::model::FormTree;

/// Result of [`read_itext_xml`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadSummary {
    /// Distinct item ids read.
    pub items: usize,
    /// Languages present in the block but not accepted by the host.
    pub skipped_languages: Vec<String>,
}

/// Runs the collection pass and writes the `<itext>` block.
pub fn write_itext_xml<F: FormTree + ?Sized>(
    form: &F,
    model: &mut ItextModel,
) -> Result<String, ExchangeError> {
    let keys = collect_items(form, model, false);
    write_items(model, &keys)
}

/// Writes the `<itext>` block for already collected items. Writes nothing
/// when the model has no languages.
pub fn write_items(model: &ItextModel, keys: &[ItemKey]) -> Result<String, ExchangeError> {
    let langs = model.languages();
    if langs.is_empty() {
        return Ok(String::new());
    }
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

    writer.write_event(Event::Start(BytesStart::new("itext")))?;
    for lang in langs.codes() {
        let mut translation = BytesStart::new("translation");
        translation.push_attribute(("lang", lang.as_str()));
        if lang == langs.default_language() {
            translation.push_attribute(("default", ""));
        }
        writer.write_event(Event::Start(translation))?;

        for item in keys.iter().filter_map(|k| model.item(*k)) {
            let mut text = BytesStart::new("text");
            text.push_attribute(("id", item.id.as_str()));
            writer.write_event(Event::Start(text))?;
            for form in item.forms().iter().filter(|f| !f.is_empty()) {
                let mut value = BytesStart::new("value");
                if form.name() != DEFAULT_FORM {
                    value.push_attribute(("form", form.name()));
                }
                writer.write_event(Event::Start(value))?;
                write_markup(&mut writer, form.value_or_default(lang, langs))?;
                writer.write_event(Event::End(BytesEnd::new("value")))?;
            }
            writer.write_event(Event::End(BytesEnd::new("text")))?;
        }
        writer.write_event(Event::End(BytesEnd::new("translation")))?;
    }
    writer.write_event(Event::End(BytesEnd::new("itext")))?;

    String::from_utf8(writer.into_inner()).map_err(|_| ExchangeError::InvalidUtf8)
}

/// Escapes character data. `<output/>` tags stay markup with only their
/// path escaped, since the reader stores it unescaped.
fn write_markup(writer: &mut Writer<Vec<u8>>, text: &str) -> Result<(), ExchangeError> {
    let mut last = 0;
    for caps in OUTPUT_REF.captures_iter(text) {
        let (Some(tag), Some(path)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        if tag.start() > last {
            let escaped = partial_escape(&text[last..tag.start()]);
            writer.write_event(Event::Text(BytesText::from_escaped(escaped)))?;
        }
        let markup = format!(
            "{}{}{}",
            &text[tag.start()..path.start()],
            partial_escape(path.as_str()),
            &text[path.end()..tag.end()],
        );
        writer.write_event(Event::Text(BytesText::from_escaped(markup)))?;
        last = tag.end();
    }
    if last < text.len() {
        let escaped = partial_escape(&text[last..]);
        writer.write_event(Event::Text(BytesText::from_escaped(escaped)))?;
    }
    Ok(())
}

fn required_attr(
    element: &BytesStart<'_>,
    name: &'static str,
    element_name: &'static str,
) -> Result<String, ExchangeError> {
    optional_attr(element, name)?.ok_or(ExchangeError::MissingAttribute {
        element: element_name,
        attr: name,
    })
}

fn optional_attr(element: &BytesStart<'_>, name: &str) -> Result<Option<String>, ExchangeError> {
    match element.try_get_attribute(name)? {
        Some(attr) => Ok(Some(attr.unescape_value()?.into_owned())),
        None => Ok(None),
    }
}

/// Reader position inside the block.
struct ValueState {
    item: ItemKey,
    form: String,
    text: String,
}

/// Loads an `<itext>` block (found anywhere in `xml`) into `model`.
///
/// With `accepted` empty, every language in the block is added and the one
/// marked `default` becomes the default. Otherwise exactly the `accepted`
/// languages are added in order, the first becomes the default, and
/// translations in other languages are skipped.
pub fn read_itext_xml(
    xml: &str,
    model: &mut ItextModel,
    accepted: &[String],
) -> Result<LoadSummary, ExchangeError> {
    let mut reader = Reader::from_str(xml);
    let mut summary = LoadSummary::default();

    if !accepted.is_empty() {
        for lang in accepted {
            model.add_language(lang.as_str());
        }
        model.set_default_language(accepted[0].as_str());
    }

    let mut in_itext = false;
    let mut lang: Option<String> = None;
    let mut item: Option<ItemKey> = None;
    let mut value: Option<ValueState> = None;
    let mut seen_ids: FxHashSet<String> = FxHashSet::default();

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"itext" => in_itext = true,
                b"translation" if in_itext => {
                    let code = required_attr(&e, "lang", "translation")?;
                    lang = if accepted.is_empty() {
                        model.add_language(code.as_str());
                        if optional_attr(&e, "default")?.is_some() {
                            model.set_default_language(code.as_str());
                        }
                        Some(code)
                    } else if accepted.contains(&code) {
                        Some(code)
                    } else {
                        warn!(lang = %code, "skipping translation in a language the host does not accept");
                        summary.skipped_languages.push(code);
                        None
                    };
                }
                b"text" if lang.is_some() => {
                    let id = required_attr(&e, "id", "text")?;
                    item = Some(model.get_or_create_item(&id));
                    if seen_ids.insert(id) {
                        summary.items += 1;
                    }
                }
                b"value" => {
                    if let Some(key) = item {
                        value = Some(ValueState {
                            item: key,
                            form: optional_attr(&e, "form")?
                                .unwrap_or_else(|| DEFAULT_FORM.to_string()),
                            text: String::new(),
                        });
                    }
                }
                b"output" => {
                    if let Some(state) = value.as_mut() {
                        push_output(state, &e)?;
                    }
                }
                _ => {}
            },
            Event::Empty(e) => match e.local_name().as_ref() {
                b"output" => {
                    if let Some(state) = value.as_mut() {
                        push_output(state, &e)?;
                    }
                }
                b"value" => {
                    if let (Some(key), Some(code)) = (item, lang.as_deref()) {
                        let form = optional_attr(&e, "form")?
                            .unwrap_or_else(|| DEFAULT_FORM.to_string());
                        if let Some(entry) = model.item_mut(key) {
                            entry.get_or_create_form(&form).set_value(code, "");
                        }
                    }
                }
                _ => {}
            },
            Event::Text(e) => {
                if let Some(state) = value.as_mut() {
                    state.text.push_str(&e.unescape()?);
                }
            }
            Event::CData(e) => {
                if let Some(state) = value.as_mut() {
                    let raw = String::from_utf8(e.into_inner().into_owned())
                        .map_err(|_| ExchangeError::InvalidUtf8)?;
                    state.text.push_str(&raw);
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"itext" => in_itext = false,
                b"translation" => lang = None,
                b"text" => item = None,
                b"value" => {
                    if let (Some(state), Some(code)) = (value.take(), lang.as_deref()) {
                        if let Some(entry) = model.item_mut(state.item) {
                            entry.get_or_create_form(&state.form).set_value(code, state.text);
                        }
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }
    debug!(items = summary.items, languages = model.languages().len(), "loaded itext block");
    Ok(summary)
}

fn push_output(state: &mut ValueState, element: &BytesStart<'_>) -> Result<(), ExchangeError> {
    let path = match optional_attr(element, "value")? {
        Some(path) => path,
        None => required_attr(element, "ref", "output")?,
    };
    state.text.push_str(&output_tag(&path));
    Ok(())
}

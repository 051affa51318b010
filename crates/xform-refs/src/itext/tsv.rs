//! Bulk translation exchange as tab-delimited text.
//!
//! The header is `label` followed by one `form-lang` column per exchange
//! form and language, forms outermost. Each row starts with an item id.

use csv::{ReaderBuilder, WriterBuilder};
use rustc_hash::FxHashMap;
use tracing::{debug, warn};

use crate::error::ExchangeError;
use crate::itext::collect::collect_items;
use crate::itext::model::ItextModel;
use crate::model::FormTree;

/// Outcome of [`import_tsv`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    /// Data rows read, skipped ones included.
    pub rows: usize,
    /// Cells written to an item.
    pub cells: usize,
    /// Ids of rows that matched no item, in file order.
    pub skipped_ids: Vec<String>,
}

fn column_names(forms: &[String], languages: &[String]) -> Vec<String> {
    forms
        .iter()
        .flat_map(|form| languages.iter().map(move |lang| format!("{form}-{lang}")))
        .collect()
}

/// Exports every non-empty collected item. Writes nothing when the model
/// has no languages.
pub fn export_tsv<F: FormTree + ?Sized>(
    form: &F,
    model: &mut ItextModel,
    forms: &[String],
) -> Result<String, ExchangeError> {
    if model.languages().is_empty() {
        return Ok(String::new());
    }
    let keys = collect_items(form, model, false);
    let languages = model.languages().codes();

    let mut wtr = WriterBuilder::new()
        .delimiter(b'\t')
        .from_writer(Vec::new());
    let mut header = vec!["label".to_string()];
    header.extend(column_names(forms, languages));
    wtr.write_record(&header)?;

    for item in keys.iter().filter_map(|k| model.item(*k)) {
        let mut row = Vec::with_capacity(header.len());
        row.push(item.id.as_str());
        for form in forms {
            for lang in languages {
                let cell = if item.has_form(form) {
                    item.get(lang, form).unwrap_or_default()
                } else {
                    ""
                };
                row.push(cell);
            }
        }
        wtr.write_record(&row)?;
    }

    let bytes = wtr
        .into_inner()
        .map_err(|e| ExchangeError::Io(e.into_error()))?;
    String::from_utf8(bytes).map_err(|_| ExchangeError::InvalidUtf8)
}

/// A recognised header cell.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Column {
    form: String,
    lang: String,
}

fn parse_header(cell: &str, forms: &[String], model: &ItextModel) -> Option<Column> {
    let (form, lang) = cell.split_once('-')?;
    (forms.iter().any(|f| f == form) && model.has_language(lang)).then(|| Column {
        form: form.to_string(),
        lang: lang.to_string(),
    })
}

/// Imports translations for the items collected from `form`, empties
/// included.
///
/// Unknown header cells are ignored. A cell updates a form the item already
/// has even when blank; a missing form is only created for a non-blank cell.
pub fn import_tsv<F: FormTree + ?Sized>(
    form: &F,
    model: &mut ItextModel,
    forms: &[String],
    input: &str,
) -> Result<ImportSummary, ExchangeError> {
    let mut summary = ImportSummary::default();
    let mut rdr = ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .from_reader(input.as_bytes());
    let mut records = rdr.records();

    let Some(header) = records.next().transpose()? else {
        return Ok(summary);
    };
    let columns: Vec<Option<Column>> = header
        .iter()
        .map(|cell| parse_header(cell, forms, model))
        .collect();

    let by_id: FxHashMap<String, _> = collect_items(form, model, true)
        .into_iter()
        .filter_map(|key| model.item(key).map(|item| (item.id.clone(), key)))
        .collect();

    for record in records {
        let record = record?;
        summary.rows += 1;
        let id = record.get(0).unwrap_or_default();
        let Some(&key) = by_id.get(id) else {
            warn!(id, "skipping translation row for unknown item");
            summary.skipped_ids.push(id.to_string());
            continue;
        };
        let Some(item) = model.item_mut(key) else {
            continue;
        };
        for (cell, column) in record.iter().zip(columns.iter()).skip(1) {
            let Some(column) = column else {
                continue;
            };
            if let Some(existing) = item.form_mut(&column.form) {
                existing.set_value(&column.lang, cell);
            } else if !cell.trim().is_empty() {
                item.get_or_create_form(&column.form)
                    .set_value(&column.lang, cell);
            } else {
                continue;
            }
            summary.cells += 1;
        }
    }
    debug!(rows = summary.rows, cells = summary.cells, "imported translations");
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_EXCHANGE_FORMS;
    use crate::itext::Languages;
    use crate::model::{Form, ItextSlot, NodeKind};

    fn forms() -> Vec<String> {
        DEFAULT_EXCHANGE_FORMS.map(String::from).to_vec()
    }

    fn sample() -> (Form, ItextModel) {
        let mut form = Form::new("data");
        let age = form.add_node(None, "age", NodeKind::Question).unwrap();
        let name = form.add_node(None, "name", NodeKind::Question).unwrap();
        let mut model = ItextModel::with_languages(Languages::new(["en", "hin"], "en"));

        let label = model.create_item("", true);
        {
            let item = model.item_mut(label).unwrap();
            item.get_or_create_form("default").set_value("en", "Age");
            item.get_or_create_form("image")
                .set_value("en", "jr://images/age.png");
        }
        form.set_itext_slot(age, ItextSlot::Label, Some(label))
            .unwrap();
        let empty = model.create_item("", true);
        form.set_itext_slot(name, ItextSlot::Label, Some(empty))
            .unwrap();
        (form, model)
    }

    #[test]
    fn test_export_layout() {
        let (form, mut model) = sample();
        let out = export_tsv(&form, &mut model, &forms()).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(
            lines,
            [
                "label\tdefault-en\tdefault-hin\taudio-en\taudio-hin\timage-en\timage-hin\tvideo-en\tvideo-hin",
                "age-label\tAge\t\t\t\tjr://images/age.png\t\t\t",
            ]
        );
    }

    #[test]
    fn test_export_without_languages_is_empty() {
        let mut form = Form::new("data");
        let q = form.add_node(None, "q", NodeKind::Question).unwrap();
        let mut model = ItextModel::new();
        let key = model.create_item("", true);
        form.set_itext_slot(q, ItextSlot::Label, Some(key)).unwrap();
        assert_eq!(export_tsv(&form, &mut model, &forms()).unwrap(), "");
    }

    #[test]
    fn test_import_updates_and_creates_forms() {
        let (form, mut model) = sample();
        let input = "label\tdefault-hin\taudio-en\tvideo-en\tbogus\tdefault-fr\n\
                     age-label\tUmr\t  \tjr://video/age.mp4\tx\tÂge\n\
                     name-label\tNaam\n\
                     ghost-label\tBhoot\n";
        let summary = import_tsv(&form, &mut model, &forms(), input).unwrap();
        assert_eq!(summary.rows, 3);
        assert_eq!(summary.cells, 3);
        assert_eq!(summary.skipped_ids, ["ghost-label"]);

        let age = model.item(model.get_item("age-label").unwrap()).unwrap();
        assert_eq!(age.get("hin", "default"), Some("Umr"));
        // blank cell does not create a form
        assert!(!age.has_form("audio"));
        assert_eq!(age.get("en", "video"), Some("jr://video/age.mp4"));
        assert_eq!(age.get("fr", "default"), None);

        let name = model.item(model.get_item("name-label").unwrap()).unwrap();
        assert_eq!(name.get("hin", "default"), Some("Naam"));
    }

    #[test]
    fn test_blank_cell_clears_existing_form() {
        let (form, mut model) = sample();
        let input = "label\timage-en\nage-label\t\n";
        let summary = import_tsv(&form, &mut model, &forms(), input).unwrap();
        assert_eq!(summary.cells, 1);
        let age = model.item(model.get_item("age-label").unwrap()).unwrap();
        assert_eq!(age.get("en", "image"), Some(""));
    }

    #[test]
    fn test_export_then_import_is_stable() {
        let (form, mut model) = sample();
        let out = export_tsv(&form, &mut model, &forms()).unwrap();
        let before = model.clone();
        import_tsv(&form, &mut model, &forms(), &out).unwrap();
        let key = model.get_item("age-label").unwrap();
        assert_eq!(
            model.item(key).unwrap().get("en", "default"),
            before.item(key).unwrap().get("en", "default")
        );
        assert_eq!(model.item(key).unwrap().get("en", "image"), Some("jr://images/age.png"));
    }

    #[test]
    fn test_empty_input_does_nothing() {
        let (form, mut model) = sample();
        let summary = import_tsv(&form, &mut model, &forms(), "").unwrap();
        assert_eq!(summary, ImportSummary::default());
    }
}

//! Multilingual translation store.
//!
//! [`ItextModel`] owns the languages and every [`ItextItem`]. Nodes refer to
//! items by [`ItemKey`] only; the serialized id on each item is reassigned by
//! [`collect_items`] before the store is written out.

pub mod collect;
pub mod item;
pub mod model;
pub mod output_refs;
pub mod tsv;
pub mod xml;

pub use collect::{collect_items, default_itext_id, default_itext_root};
pub use item::{ItemKey, ItextForm, ItextItem, Languages, DEFAULT_FORM, MEDIA_FORMS, RESERVED_FORMS};
pub use model::ItextModel;
pub use output_refs::{OutputRefChange, OUTPUT_REF};
pub use tsv::{export_tsv, import_tsv, ImportSummary};
pub use xml::{read_itext_xml, write_itext_xml, write_items, LoadSummary};

//! Error types for expression parsing, the translation store, the form
//! document, configuration and the exchange formats.

use std::fmt;

use thiserror::Error;

use crate::itext::ItemKey;
use crate::model::Ufid;

/// Error while lexing or parsing an XPath expression.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("empty expression")]
    Empty,

    #[error("unexpected end of expression while reading {context}")]
    UnexpectedEnd { context: &'static str },

    #[error("unexpected character {found:?} at offset {offset}")]
    UnexpectedChar { found: char, offset: usize },

    #[error("unterminated string literal starting at offset {offset}")]
    UnterminatedString { offset: usize },

    #[error("unexpected {found:?} at offset {offset}, expected {expected}")]
    UnexpectedToken {
        found: String,
        offset: usize,
        expected: &'static str,
    },

    #[error("unknown axis {name:?} at offset {offset}")]
    UnknownAxis { name: String, offset: usize },

    #[error("trailing input {found:?} at offset {offset}")]
    TrailingInput { found: String, offset: usize },
}

/// Error raised by the translation store.
///
/// `DuplicateKey` is an invariant violation, not a user input problem:
/// callers propagate it instead of recovering.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ItextError {
    #[error("cannot add new item with existing key {key}")]
    DuplicateKey { key: ItemKey },

    #[error("no translation item registered under key {key}")]
    UnknownItem { key: ItemKey },
}

/// Error raised by structural edits on the form document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormError {
    #[error("unknown node {node}")]
    UnknownNode { node: Ufid },

    #[error("invalid node name {name:?}")]
    InvalidNodeName { name: String },

    #[error("a sibling named {name:?} already exists under {parent_path}")]
    DuplicateSibling { name: String, parent_path: String },

    #[error("cannot move node {node} into its own subtree")]
    CannotMoveIntoSelf { node: Ufid },

    #[error("{slot} is not allowed on node {node}")]
    SlotNotAllowed { node: Ufid, slot: &'static str },

    #[error(transparent)]
    Itext(#[from] ItextError),
}

/// Error while reading or writing the itext XML block or the bulk
/// translation exchange format.
#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("malformed XML attribute: {0}")]
    Attribute(#[from] quick_xml::events::attributes::AttrError),

    #[error("tab-delimited data error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("missing attribute {attr:?} on <{element}>")]
    MissingAttribute {
        element: &'static str,
        attr: &'static str,
    },

    #[error("output is not valid UTF-8")]
    InvalidUtf8,

    #[error(transparent)]
    Itext(#[from] ItextError),
}

/// Error while loading an [`EngineConfig`](crate::config::EngineConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Severity of a [`Warning`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WarningLevel {
    /// Raised while parsing expressions or documents.
    ParseWarning,
    /// Raised against the form as a whole.
    FormWarning,
}

impl WarningLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            WarningLevel::ParseWarning => "parse-warning",
            WarningLevel::FormWarning => "form-warning",
        }
    }
}

/// A recoverable problem surfaced to the hosting UI.
///
/// Warnings are keyed so that recomputing the same source replaces (or
/// clears) the previous warning instead of piling up duplicates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    pub level: WarningLevel,
    pub key: String,
    pub messages: Vec<String>,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.level.as_str(), self.messages.join(" "))
    }
}

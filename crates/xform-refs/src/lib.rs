//! xform-refs: reference tracking and translation consistency for
//! XForms-style form documents.
//!
//! Form documents embed absolute paths to their own nodes in many places:
//! display conditions, calculations, constraints, and `<output/>` tags
//! inside translated label text. This crate keeps all of them pointing at
//! the right nodes while the document is edited, and manages the
//! multilingual text store the labels live in.
//!
//! # Quick Start
//!
//! ```rust
//! use xform_refs::{EngineConfig, Form, FormSession, FormTree, NodeKind};
//!
//! let mut session = FormSession::new(Form::new("data"), EngineConfig::default());
//! let age = session.add_node(None, "age", NodeKind::Question).unwrap();
//! let eligible = session.add_node(None, "eligible", NodeKind::DataNode).unwrap();
//! session.set_property(eligible, "calculateAttr", "/data/age > 5").unwrap();
//!
//! session.rename_node(age, "years").unwrap();
//! assert_eq!(
//!     session.form().property(eligible, "calculateAttr"),
//!     Some("/data/years > 5")
//! );
//! ```
//!
//! # Modules
//!
//! - [`xpath`]: XPath 1.0 parser and printer over an arena
//! - [`logic`]: Expression wrapper, rename matching, reference graph
//! - [`itext`]: Translation store, collection pass, XML and TSV exchange
//! - [`model`]: The document tree and the per-kind property schema
//! - [`session`]: One open document, driving all of the above
//! - [`events`]: Observer lists for change notifications
//! - [`config`]: Engine configuration
//! - [`error`]: Error and warning types
//!
//! # Limitations
//!
//! Only absolute paths are tracked. Relative paths in expressions are
//! parsed but never rewritten. `<output/>` tags are found with a lenient
//! pattern, so nested or malformed tags may be mis-extracted.

pub mod config;
pub mod error;
pub mod events;
pub mod itext;
pub mod logic;
pub mod model;
pub mod session;
pub mod xpath;

// Re-export commonly used types at crate root
pub use config::EngineConfig;
pub use error::{ConfigError, ExchangeError, FormError, ItextError, ParseError, Warning, WarningLevel};
pub use events::{Emitter, FormEvent, SubscriptionId};
pub use itext::{ImportSummary, ItemKey, ItextForm, ItextItem, ItextModel, Languages, LoadSummary};
pub use logic::{ExpressionStatus, LogicExpression, PathMatcher, Reference, ReferenceGraph, RenameMap};
pub use model::{Form, FormTree, ItextSlot, NodeKind, PathChange, Ufid};
pub use session::FormSession;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
